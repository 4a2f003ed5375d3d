use chrono::{DateTime, Utc};
use serde::{de::DeserializeOwned, Deserialize, Deserializer, Serialize};
use serde_json::Value;
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

use crate::error::ValidationError;

pub const MAX_TITLE_LEN: usize = 100;
pub const MAX_DESCRIPTION_LEN: usize = 500;

/// Store-assigned task identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TaskId(pub Uuid);

impl TaskId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for TaskId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for TaskId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// Identifier of the user a task belongs to. An empty id means nobody is
/// signed in.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct OwnerId(pub String);

impl OwnerId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn is_empty(&self) -> bool {
        self.0.trim().is_empty()
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for OwnerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Priority {
    Low,
    #[default]
    Medium,
    High,
}

impl Priority {
    /// Sort weight: high 3, medium 2, low 1.
    pub fn weight(self) -> u8 {
        match self {
            Priority::Low => 1,
            Priority::Medium => 2,
            Priority::High => 3,
        }
    }

    /// Anything unrecognised is medium.
    pub fn parse_lenient(raw: &str) -> Self {
        raw.parse().unwrap_or_default()
    }

    pub fn label(self) -> &'static str {
        match self {
            Priority::Low => "Low",
            Priority::Medium => "Med",
            Priority::High => "High",
        }
    }

    pub fn next(self) -> Self {
        match self {
            Priority::Low => Priority::Medium,
            Priority::Medium => Priority::High,
            Priority::High => Priority::Low,
        }
    }

    pub fn prev(self) -> Self {
        self.next().next()
    }
}

impl FromStr for Priority {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "low" => Ok(Priority::Low),
            "medium" | "med" => Ok(Priority::Medium),
            "high" => Ok(Priority::High),
            other => Err(ValidationError::UnknownPriority(other.to_string())),
        }
    }
}

impl<'de> Deserialize<'de> for Priority {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        Ok(match Value::deserialize(deserializer)? {
            Value::String(raw) => Priority::parse_lenient(&raw),
            _ => Priority::default(),
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Category {
    Work,
    Personal,
    Study,
    Health,
    Shopping,
    Family,
}

impl Category {
    pub const ALL: [Category; 6] = [
        Category::Work,
        Category::Personal,
        Category::Study,
        Category::Health,
        Category::Shopping,
        Category::Family,
    ];

    pub fn label(self) -> &'static str {
        match self {
            Category::Work => "Work",
            Category::Personal => "Personal",
            Category::Study => "Study",
            Category::Health => "Health",
            Category::Shopping => "Shopping",
            Category::Family => "Family",
        }
    }

    /// Steps through none -> work -> ... -> family -> none.
    pub fn cycle(current: Option<Category>, forward: bool) -> Option<Category> {
        let slots = Category::ALL.len() + 1;
        let pos = current
            .and_then(|c| Category::ALL.iter().position(|x| *x == c))
            .map_or(0, |i| i + 1);
        let next = if forward {
            (pos + 1) % slots
        } else {
            (pos + slots - 1) % slots
        };
        next.checked_sub(1).map(|i| Category::ALL[i])
    }
}

impl FromStr for Category {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Category::ALL
            .iter()
            .copied()
            .find(|c| c.label().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| ValidationError::UnknownCategory(s.to_string()))
    }
}

fn lenient_category<'de, D: Deserializer<'de>>(
    deserializer: D,
) -> Result<Option<Category>, D::Error> {
    Ok(match Value::deserialize(deserializer)? {
        Value::String(raw) => raw.parse().ok(),
        _ => None,
    })
}

/// Null or a value of the wrong shape decodes as the field's default.
fn or_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: DeserializeOwned + Default,
{
    let raw = Value::deserialize(deserializer)?;
    Ok(serde_json::from_value(raw).unwrap_or_default())
}

/// Keeps the string entries of a tag list and drops the rest.
fn lenient_tags<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<String>, D::Error> {
    Ok(match Value::deserialize(deserializer)? {
        Value::Array(items) => items
            .into_iter()
            .filter_map(|item| match item {
                Value::String(tag) => Some(tag),
                _ => None,
            })
            .collect(),
        _ => Vec::new(),
    })
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct Task {
    pub id: TaskId,
    pub owner_id: OwnerId,
    #[serde(default, deserialize_with = "or_default")]
    pub title: String,
    #[serde(default, deserialize_with = "or_default")]
    pub description: Option<String>,
    #[serde(default, deserialize_with = "or_default")]
    pub due_date: Option<DateTime<Utc>>,
    #[serde(default)]
    pub priority: Priority,
    #[serde(default, deserialize_with = "lenient_category")]
    pub category: Option<Category>,
    #[serde(default, deserialize_with = "lenient_tags")]
    pub tags: Vec<String>,
    #[serde(default, deserialize_with = "or_default")]
    pub completed: bool,
    #[serde(default, deserialize_with = "or_default")]
    pub created_at: DateTime<Utc>,
    #[serde(default, deserialize_with = "or_default")]
    pub updated_at: Option<DateTime<Utc>>,
}

impl Task {
    /// When the task last changed; falls back to creation time.
    pub fn last_touched(&self) -> DateTime<Utc> {
        self.updated_at.unwrap_or(self.created_at)
    }

    /// Copies the editable fields of a draft onto this task. Identity,
    /// ownership, completion and timestamps are left alone.
    pub fn apply(&mut self, input: &TaskInput) {
        self.title = input.title.clone();
        self.description = input.description.clone();
        self.due_date = input.due_date;
        self.priority = input.priority;
        self.category = input.category;
        self.tags = input.tags.clone();
    }
}

/// The editable part of a task, as produced by the add/edit form.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TaskInput {
    pub title: String,
    pub description: Option<String>,
    pub due_date: Option<DateTime<Utc>>,
    pub priority: Priority,
    pub category: Option<Category>,
    pub tags: Vec<String>,
}

impl TaskInput {
    pub fn new(title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            ..Self::default()
        }
    }

    /// Trims text fields and checks length limits. A blank description is
    /// dropped, as are blank tags.
    pub fn validate(self) -> Result<TaskInput, ValidationError> {
        let title = self.title.trim().to_string();
        if title.is_empty() {
            return Err(ValidationError::EmptyTitle);
        }
        let title_len = title.chars().count();
        if title_len > MAX_TITLE_LEN {
            return Err(ValidationError::TitleTooLong(title_len));
        }

        let description = self
            .description
            .map(|d| d.trim().to_string())
            .filter(|d| !d.is_empty());
        if let Some(d) = &description {
            let len = d.chars().count();
            if len > MAX_DESCRIPTION_LEN {
                return Err(ValidationError::DescriptionTooLong(len));
            }
        }

        let tags = self
            .tags
            .into_iter()
            .map(|t| t.trim().to_string())
            .filter(|t| !t.is_empty())
            .collect();

        Ok(TaskInput {
            title,
            description,
            due_date: self.due_date,
            priority: self.priority,
            category: self.category,
            tags,
        })
    }
}

impl From<&Task> for TaskInput {
    fn from(task: &Task) -> Self {
        Self {
            title: task.title.clone(),
            description: task.description.clone(),
            due_date: task.due_date,
            priority: task.priority,
            category: task.category,
            tags: task.tags.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn validate_trims_and_drops_blank_description() {
        let input = TaskInput {
            title: "  Buy milk  ".into(),
            description: Some("   ".into()),
            tags: vec![" errand ".into(), "".into()],
            ..TaskInput::default()
        };
        let valid = input.validate().unwrap();
        assert_eq!(valid.title, "Buy milk");
        assert_eq!(valid.description, None);
        assert_eq!(valid.tags, vec!["errand".to_string()]);
    }

    #[test]
    fn validate_rejects_blank_title() {
        let err = TaskInput::new("   ").validate().unwrap_err();
        assert_eq!(err, ValidationError::EmptyTitle);
    }

    #[test]
    fn validate_enforces_length_limits() {
        let long_title = "x".repeat(MAX_TITLE_LEN + 1);
        assert_eq!(
            TaskInput::new(long_title).validate().unwrap_err(),
            ValidationError::TitleTooLong(MAX_TITLE_LEN + 1)
        );
        assert!(TaskInput::new("é".repeat(MAX_TITLE_LEN)).validate().is_ok());

        let input = TaskInput {
            description: Some("d".repeat(MAX_DESCRIPTION_LEN + 1)),
            ..TaskInput::new("ok")
        };
        assert_eq!(
            input.validate().unwrap_err(),
            ValidationError::DescriptionTooLong(MAX_DESCRIPTION_LEN + 1)
        );
    }

    #[test]
    fn decoding_is_permissive() {
        let json = r#"{
            "id": "6f1c3a52-2a4c-4d8e-9c55-0d3c1b0b9a11",
            "owner_id": "u1",
            "priority": "urgent",
            "category": "gardening"
        }"#;
        let task: Task = serde_json::from_str(json).unwrap();
        assert_eq!(task.title, "");
        assert_eq!(task.priority, Priority::Medium);
        assert_eq!(task.category, None);
        assert!(!task.completed);
        assert_eq!(task.updated_at, None);
    }

    #[test]
    fn null_priority_defaults_to_medium() {
        let json = r#"{
            "id": "6f1c3a52-2a4c-4d8e-9c55-0d3c1b0b9a11",
            "owner_id": "u1",
            "title": "t",
            "priority": null,
            "category": "work"
        }"#;
        let task: Task = serde_json::from_str(json).unwrap();
        assert_eq!(task.priority, Priority::Medium);
        assert_eq!(task.category, Some(Category::Work));
    }

    #[test]
    fn null_fields_decode_as_defaults() {
        let json = r#"{
            "id": "6f1c3a52-2a4c-4d8e-9c55-0d3c1b0b9a11",
            "owner_id": "u1",
            "title": null,
            "description": null,
            "due_date": null,
            "tags": null,
            "completed": null,
            "created_at": null,
            "updated_at": null
        }"#;
        let task: Task = serde_json::from_str(json).unwrap();
        assert_eq!(task.title, "");
        assert_eq!(task.description, None);
        assert_eq!(task.due_date, None);
        assert!(task.tags.is_empty());
        assert!(!task.completed);
        assert_eq!(task.created_at, DateTime::<Utc>::default());
    }

    #[test]
    fn mistyped_fields_decode_as_defaults() {
        let json = r#"{
            "id": "6f1c3a52-2a4c-4d8e-9c55-0d3c1b0b9a11",
            "owner_id": "u1",
            "title": 42,
            "priority": 3,
            "category": ["work"],
            "tags": ["home", 7, null],
            "completed": "yes",
            "due_date": "next week",
            "created_at": 1700000000
        }"#;
        let task: Task = serde_json::from_str(json).unwrap();
        assert_eq!(task.title, "");
        assert_eq!(task.priority, Priority::Medium);
        assert_eq!(task.category, None);
        assert_eq!(task.tags, vec!["home".to_string()]);
        assert!(!task.completed);
        assert_eq!(task.due_date, None);
    }

    #[test]
    fn category_cycle_wraps_through_none() {
        assert_eq!(Category::cycle(None, true), Some(Category::Work));
        assert_eq!(Category::cycle(Some(Category::Family), true), None);
        assert_eq!(Category::cycle(None, false), Some(Category::Family));
        assert_eq!(Category::cycle(Some(Category::Work), false), None);
    }

    #[test]
    fn priority_cycles_both_ways() {
        assert_eq!(Priority::Low.next(), Priority::Medium);
        assert_eq!(Priority::High.next(), Priority::Low);
        assert_eq!(Priority::Low.prev(), Priority::High);
        assert_eq!(Priority::Medium.prev(), Priority::Low);
    }
}
