use crate::app::{App, FormField, Mode, TaskForm};
use crate::organizer::{is_overdue, Bucket};
use crate::store::TaskStore;
use crate::task::{Priority, Task};
use chrono::{DateTime, Datelike, Days, Local, Utc};
use crossterm::event::{self, Event};
use ratatui::{
    backend::Backend,
    layout::{Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Clear, Gauge, List, ListItem, ListState, Paragraph},
    Frame, Terminal,
};
use std::io;

pub fn run_app<B: Backend, S: TaskStore>(
    terminal: &mut Terminal<B>,
    app: &mut App<S>,
) -> io::Result<()> {
    loop {
        terminal.draw(|f| draw(f, app))?;

        if let Event::Key(key) = event::read()? {
            app.handle_key(key);
        }
        if app.should_quit {
            return Ok(());
        }
    }
}

pub fn draw<S: TaskStore>(f: &mut Frame, app: &App<S>) {
    let now = Local::now();
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints(vec![
            Constraint::Length(3),
            Constraint::Length(3),
            Constraint::Min(3),
            Constraint::Length(1),
        ])
        .split(f.area());

    draw_progress(f, app, chunks[0]);
    draw_search(f, app, chunks[1]);
    draw_tasks(f, app, &now, chunks[2]);
    draw_footer(f, app, chunks[3]);

    match &app.mode {
        Mode::Form(form) => draw_form(f, form),
        Mode::ConfirmDelete(id) => {
            let title = app
                .board
                .find(*id)
                .map(|t| t.title.as_str())
                .unwrap_or_default();
            draw_confirm(f, title);
        }
        Mode::Normal | Mode::Search => {}
    }
}

fn draw_progress<S: TaskStore>(f: &mut Frame, app: &App<S>, area: Rect) {
    let counts = app.board.counts();
    let title = match &app.user_email {
        Some(email) => format!("Tasks - {email}"),
        None => "Tasks".to_string(),
    };
    let gauge = Gauge::default()
        .block(Block::default().title(title).borders(Borders::ALL))
        .gauge_style(Style::default().fg(Color::Green))
        .ratio(counts.ratio())
        .label(format!("{}/{} completed", counts.completed, counts.total));
    f.render_widget(gauge, area);
}

fn draw_search<S: TaskStore>(f: &mut Frame, app: &App<S>, area: Rect) {
    let searching = app.mode == Mode::Search;
    let query = app.board.query();
    let mut spans = vec![Span::raw(query.to_string())];
    if searching {
        spans.push(Span::styled("_", Style::default().add_modifier(Modifier::SLOW_BLINK)));
    }
    if !query.trim().is_empty() {
        let n = app.board.visible_tasks().len();
        spans.push(Span::styled(
            format!("  {n} result{}", if n == 1 { "" } else { "s" }),
            Style::default().fg(Color::DarkGray),
        ));
    }
    let block = Block::default()
        .title("Search (/)")
        .borders(Borders::ALL)
        .border_style(if searching {
            Style::default().fg(Color::Cyan)
        } else {
            Style::default()
        });
    f.render_widget(Paragraph::new(Line::from(spans)).block(block), area);
}

fn draw_tasks<S: TaskStore>(f: &mut Frame, app: &App<S>, now: &DateTime<Local>, area: Rect) {
    let groups = app.board.groups_at(now);

    let mut items = Vec::new();
    let mut selected_row = None;
    let mut index = 0;
    for bucket in Bucket::ALL {
        let tasks = groups.bucket(bucket);
        if tasks.is_empty() {
            continue;
        }
        items.push(ListItem::new(Line::from(Span::styled(
            format!("{} ({})", bucket.title(), tasks.len()),
            Style::default()
                .fg(Color::Cyan)
                .add_modifier(Modifier::BOLD),
        ))));
        for task in tasks {
            if index == app.selected {
                selected_row = Some(items.len());
            }
            items.push(task_item(task, now));
            index += 1;
        }
    }

    let block = Block::default().title("Board").borders(Borders::ALL);
    if items.is_empty() {
        let hint = if app.board.query().trim().is_empty() {
            "No tasks yet. Press 'a' to add one."
        } else {
            "No tasks match your search."
        };
        f.render_widget(
            Paragraph::new(hint)
                .style(Style::default().fg(Color::DarkGray))
                .block(block),
            area,
        );
        return;
    }

    let list = List::new(items)
        .block(block)
        .highlight_style(Style::default().add_modifier(Modifier::REVERSED));
    let mut state = ListState::default().with_selected(selected_row);
    f.render_stateful_widget(list, area, &mut state);
}

fn priority_color(priority: Priority) -> Color {
    match priority {
        Priority::High => Color::Red,
        Priority::Medium => Color::Yellow,
        Priority::Low => Color::Green,
    }
}

fn task_item<'a>(task: &'a Task, now: &DateTime<Local>) -> ListItem<'a> {
    let check = if task.completed { "[x] " } else { "[ ] " };
    let title_style = if task.completed {
        Style::default()
            .fg(Color::DarkGray)
            .add_modifier(Modifier::CROSSED_OUT)
    } else {
        Style::default().fg(Color::White)
    };

    let mut spans = vec![
        Span::raw(format!("  {check}")),
        Span::styled(task.title.as_str(), title_style),
        Span::styled(
            format!(" [{}]", task.priority.label()),
            Style::default().fg(priority_color(task.priority)),
        ),
    ];
    if let Some(category) = task.category {
        spans.push(Span::styled(
            format!(" {}", category.label()),
            Style::default().fg(Color::Magenta),
        ));
    }
    if let Some(due) = task.due_date {
        spans.push(Span::raw(format!(" (Due: {})", due_label(due, now))));
    }
    if is_overdue(task, now) {
        spans.push(Span::styled(
            " OVERDUE",
            Style::default().fg(Color::Red).add_modifier(Modifier::BOLD),
        ));
    }

    let mut lines = vec![Line::from(spans)];
    if let Some(description) = task.description.as_deref().filter(|d| !d.trim().is_empty()) {
        lines.push(Line::from(Span::styled(
            format!("      {}", preview(description, DESCRIPTION_PREVIEW)),
            Style::default()
                .fg(Color::DarkGray)
                .add_modifier(Modifier::DIM),
        )));
    }
    ListItem::new(lines)
}

const DESCRIPTION_PREVIEW: usize = 60;

/// First line of `text`, cut to `max` characters with a trailing "...".
fn preview(text: &str, max: usize) -> String {
    let first = text.lines().next().unwrap_or_default().trim();
    if first.chars().count() <= max && !text.trim().contains('\n') {
        return first.to_string();
    }
    let cut: String = first.chars().take(max).collect();
    format!("{}...", cut.trim_end())
}

/// "Today", "Tomorrow", or "Mar 9" (with the year when it differs).
pub fn due_label(due: DateTime<Utc>, now: &DateTime<Local>) -> String {
    let day = due.with_timezone(&now.timezone()).date_naive();
    let today = now.date_naive();
    if day == today {
        return "Today".to_string();
    }
    if Some(day) == today.checked_add_days(Days::new(1)) {
        return "Tomorrow".to_string();
    }
    if day.year() == today.year() {
        day.format("%b %-d").to_string()
    } else {
        day.format("%b %-d, %Y").to_string()
    }
}

fn draw_footer<S: TaskStore>(f: &mut Frame, app: &App<S>, area: Rect) {
    let line = match &app.status {
        Some(msg) => Line::from(Span::styled(msg.as_str(), Style::default().fg(Color::Red))),
        None => {
            let help = match app.mode {
                Mode::Search => "type to filter  enter/esc: done",
                Mode::Form(_) => "tab: next field  left/right: change  enter: save  esc: cancel",
                Mode::ConfirmDelete(_) => "y: delete  n: cancel",
                Mode::Normal => {
                    "a: add  e: edit  space: toggle  d: delete  /: search  r: reload  q: quit"
                }
            };
            Line::from(Span::styled(help, Style::default().fg(Color::DarkGray)))
        }
    };
    f.render_widget(Paragraph::new(line), area);
}

fn centered(area: Rect, width: u16, height: u16) -> Rect {
    let width = width.min(area.width);
    let height = height.min(area.height);
    Rect {
        x: area.x + (area.width - width) / 2,
        y: area.y + (area.height - height) / 2,
        width,
        height,
    }
}

fn draw_form(f: &mut Frame, form: &TaskForm) {
    let area = centered(f.area(), 60, FormField::ALL.len() as u16 + 2);
    let lines: Vec<Line> = FormField::ALL
        .iter()
        .map(|field| {
            let value = match field {
                FormField::Title => form.title.clone(),
                FormField::Description => form.description.clone(),
                FormField::DueDate => form.due_date.clone(),
                FormField::Priority => format!("< {} >", form.priority.label()),
                FormField::Category => {
                    format!("< {} >", form.category.map_or("None", |c| c.label()))
                }
                FormField::Tags => form.tags.clone(),
            };
            let style = if *field == form.focus {
                Style::default().fg(Color::Cyan).add_modifier(Modifier::BOLD)
            } else {
                Style::default()
            };
            Line::from(vec![
                Span::styled(format!("{:<18}", field.label()), style),
                Span::raw(value),
            ])
        })
        .collect();

    let title = if form.editing.is_some() {
        "Edit task"
    } else {
        "New task"
    };
    f.render_widget(Clear, area);
    f.render_widget(
        Paragraph::new(lines).block(Block::default().title(title).borders(Borders::ALL)),
        area,
    );
}

fn draw_confirm(f: &mut Frame, title: &str) {
    let area = centered(f.area(), 50, 4);
    f.render_widget(Clear, area);
    f.render_widget(
        Paragraph::new(vec![
            Line::from("Are you sure you want to delete this task?"),
            Line::from(Span::styled(title, Style::default().add_modifier(Modifier::BOLD))),
        ])
        .block(Block::default().title("Delete Task").borders(Borders::ALL)),
        area,
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::board::TaskBoard;
    use crate::store::JsonFileStore;
    use crate::task::{OwnerId, TaskInput};
    use chrono::{Duration, TimeZone};
    use ratatui::backend::TestBackend;

    fn screen_text(terminal: &Terminal<TestBackend>) -> String {
        let buffer = terminal.backend().buffer();
        let mut text = String::new();
        for y in 0..buffer.area.height {
            for x in 0..buffer.area.width {
                text.push_str(buffer[(x, y)].symbol());
            }
            text.push('\n');
        }
        text
    }

    #[test]
    fn due_labels() {
        let now = Local.with_ymd_and_hms(2026, 3, 10, 9, 0, 0).unwrap();
        let utc = |d: DateTime<Local>| d.with_timezone(&Utc);
        assert_eq!(due_label(utc(now), &now), "Today");
        assert_eq!(due_label(utc(now + Duration::days(1)), &now), "Tomorrow");
        assert_eq!(due_label(utc(now + Duration::days(5)), &now), "Mar 15");
        assert_eq!(due_label(utc(now + Duration::days(365)), &now), "Mar 10, 2027");
    }

    #[test]
    fn renders_sections_and_progress() {
        let dir = tempfile::tempdir().unwrap();
        let mut board = TaskBoard::new(
            JsonFileStore::in_dir(dir.path()),
            Some(OwnerId::new("alice")),
        );
        let done = board.save_task(TaskInput::new("Pay rent"), None).unwrap();
        board.toggle_task(done.id).unwrap();
        board.save_task(TaskInput::new("Water plants"), None).unwrap();
        let app = App::new(board, None);

        let mut terminal = Terminal::new(TestBackend::new(80, 20)).unwrap();
        terminal.draw(|f| draw(f, &app)).unwrap();
        let text = screen_text(&terminal);

        assert!(text.contains("1/2 completed"));
        assert!(text.contains("This Week (1)"));
        assert!(text.contains("Completed (1)"));
        assert!(text.contains("Water plants"));
        assert!(!text.contains("Today ("));
    }

    #[test]
    fn description_preview_is_one_short_line() {
        assert_eq!(preview("Milk, eggs", 60), "Milk, eggs");
        assert_eq!(preview(&"x".repeat(70), 60), format!("{}...", "x".repeat(60)));
        assert_eq!(preview("first line\nsecond line", 60), "first line...");
    }

    #[test]
    fn renders_dimmed_description_under_the_title() {
        let dir = tempfile::tempdir().unwrap();
        let mut board = TaskBoard::new(
            JsonFileStore::in_dir(dir.path()),
            Some(OwnerId::new("alice")),
        );
        let input = TaskInput {
            description: Some(format!("Oat milk and {}", "bread ".repeat(20))),
            ..TaskInput::new("Groceries")
        };
        board.save_task(input, None).unwrap();
        let app = App::new(board, None);

        let mut terminal = Terminal::new(TestBackend::new(100, 20)).unwrap();
        terminal.draw(|f| draw(f, &app)).unwrap();
        let text = screen_text(&terminal);

        let rows: Vec<&str> = text.lines().collect();
        let title_row = rows.iter().position(|r| r.contains("Groceries")).unwrap();
        let description_row = rows[title_row + 1];
        assert!(description_row.contains("Oat milk and bread"));
        assert!(description_row.contains("..."));

        let buffer = terminal.backend().buffer();
        let byte = description_row.find("Oat").unwrap();
        let x = description_row[..byte].chars().count() as u16;
        let cell = &buffer[(x, title_row as u16 + 1)];
        assert_eq!(cell.fg, Color::DarkGray);
        assert!(cell.modifier.contains(Modifier::DIM));
    }

    #[test]
    fn renders_empty_hint() {
        let dir = tempfile::tempdir().unwrap();
        let board = TaskBoard::new(
            JsonFileStore::in_dir(dir.path()),
            Some(OwnerId::new("alice")),
        );
        let app = App::new(board, None);
        let mut terminal = Terminal::new(TestBackend::new(60, 12)).unwrap();
        terminal.draw(|f| draw(f, &app)).unwrap();
        assert!(screen_text(&terminal).contains("No tasks yet"));
    }
}
