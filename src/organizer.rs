//! Pure transformations from a task list and a search query into the groups
//! shown on the board.
//!
//! Nothing in here does I/O or fails. Functions that depend on the current
//! date have an `_at` variant taking the reference instant explicitly; the
//! plain variant uses the local clock.

use chrono::{DateTime, Days, Local, TimeZone};

use crate::task::Task;

/// Tasks whose title, description or any tag contains `query`, ignoring
/// case. A blank query keeps every task, in order.
pub fn filter_by_query<'a>(tasks: &'a [Task], query: &str) -> Vec<&'a Task> {
    if query.trim().is_empty() {
        return tasks.iter().collect();
    }

    let needle = query.to_lowercase();
    tasks.iter().filter(|t| matches_query(t, &needle)).collect()
}

fn matches_query(task: &Task, needle: &str) -> bool {
    task.title.to_lowercase().contains(needle)
        || task
            .description
            .as_deref()
            .is_some_and(|d| d.to_lowercase().contains(needle))
        || task.tags.iter().any(|t| t.to_lowercase().contains(needle))
}

/// Display sections, in the order they are shown.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Bucket {
    Today,
    Tomorrow,
    ThisWeek,
    Completed,
}

impl Bucket {
    pub const ALL: [Bucket; 4] = [
        Bucket::Today,
        Bucket::Tomorrow,
        Bucket::ThisWeek,
        Bucket::Completed,
    ];

    pub fn title(self) -> &'static str {
        match self {
            Bucket::Today => "Today",
            Bucket::Tomorrow => "Tomorrow",
            Bucket::ThisWeek => "This Week",
            Bucket::Completed => "Completed",
        }
    }
}

#[derive(Debug, Default, Clone, PartialEq)]
pub struct TaskGroups<'a> {
    pub today: Vec<&'a Task>,
    pub tomorrow: Vec<&'a Task>,
    pub this_week: Vec<&'a Task>,
    pub completed: Vec<&'a Task>,
}

impl<'a> TaskGroups<'a> {
    pub fn bucket(&self, bucket: Bucket) -> &[&'a Task] {
        match bucket {
            Bucket::Today => &self.today,
            Bucket::Tomorrow => &self.tomorrow,
            Bucket::ThisWeek => &self.this_week,
            Bucket::Completed => &self.completed,
        }
    }

    fn bucket_mut(&mut self, bucket: Bucket) -> &mut Vec<&'a Task> {
        match bucket {
            Bucket::Today => &mut self.today,
            Bucket::Tomorrow => &mut self.tomorrow,
            Bucket::ThisWeek => &mut self.this_week,
            Bucket::Completed => &mut self.completed,
        }
    }

    /// Every task in display order, tagged with its bucket.
    pub fn iter(&self) -> impl Iterator<Item = (Bucket, &'a Task)> + '_ {
        Bucket::ALL
            .into_iter()
            .flat_map(move |b| self.bucket(b).iter().map(move |t| (b, *t)))
    }

    pub fn len(&self) -> usize {
        self.today.len() + self.tomorrow.len() + self.this_week.len() + self.completed.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Groups tasks by due-date proximity against the local clock.
pub fn group_by_time_frame<'a, I>(tasks: I) -> TaskGroups<'a>
where
    I: IntoIterator<Item = &'a Task>,
{
    group_by_time_frame_at(tasks, &Local::now())
}

/// Groups tasks against the calendar date of `now` in `now`'s time zone.
///
/// Overdue and far-future tasks both land in `this_week`; overdue is only
/// flagged per item, see [`is_overdue`].
pub fn group_by_time_frame_at<'a, I, Tz>(tasks: I, now: &DateTime<Tz>) -> TaskGroups<'a>
where
    I: IntoIterator<Item = &'a Task>,
    Tz: TimeZone,
{
    let tz = now.timezone();
    let today = now.date_naive();
    let tomorrow = today.checked_add_days(Days::new(1));

    let mut groups = TaskGroups::default();
    for task in tasks {
        let bucket = if task.completed {
            Bucket::Completed
        } else {
            match task.due_date {
                None => Bucket::ThisWeek,
                Some(due) => {
                    let due_day = due.with_timezone(&tz).date_naive();
                    if due_day == today {
                        Bucket::Today
                    } else if Some(due_day) == tomorrow {
                        Bucket::Tomorrow
                    } else {
                        Bucket::ThisWeek
                    }
                }
            }
        };
        groups.bucket_mut(bucket).push(task);
    }

    // sort_by is stable, equal priorities keep input order
    for bucket in [Bucket::Today, Bucket::Tomorrow, Bucket::ThisWeek] {
        groups
            .bucket_mut(bucket)
            .sort_by(|a, b| b.priority.weight().cmp(&a.priority.weight()));
    }
    groups
        .completed
        .sort_by(|a, b| b.last_touched().cmp(&a.last_touched()));

    groups
}

/// Due before `now` and still open.
pub fn is_overdue<Tz: TimeZone>(task: &Task, now: &DateTime<Tz>) -> bool {
    !task.completed && task.due_date.is_some_and(|due| due < *now)
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct TaskCounts {
    pub total: usize,
    pub completed: usize,
}

impl TaskCounts {
    /// Completed share in `0.0..=1.0`; zero for an empty list.
    pub fn ratio(&self) -> f64 {
        if self.total == 0 {
            0.0
        } else {
            self.completed as f64 / self.total as f64
        }
    }
}

pub fn task_counts<'a, I>(tasks: I) -> TaskCounts
where
    I: IntoIterator<Item = &'a Task>,
{
    tasks.into_iter().fold(TaskCounts::default(), |mut acc, t| {
        acc.total += 1;
        if t.completed {
            acc.completed += 1;
        }
        acc
    })
}
