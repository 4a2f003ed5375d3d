use chrono::Utc;
use serde_json::Value;
use std::{
    fs,
    path::{Path, PathBuf},
};
use tracing::{debug, warn};

use crate::error::StoreError;
use crate::task::{OwnerId, Task, TaskId, TaskInput};

/// Owner-scoped task persistence.
///
/// Every call fails with [`StoreError::NotAuthenticated`] when `owner` is
/// empty, and never touches tasks belonging to another owner.
pub trait TaskStore {
    /// The owner's tasks, newest first.
    fn list_tasks(&self, owner: &OwnerId) -> Result<Vec<Task>, StoreError>;

    fn create_task(&self, owner: &OwnerId, input: TaskInput) -> Result<Task, StoreError>;

    /// Replaces the editable fields; keeps `created_at`, owner and completion.
    fn update_task(&self, id: TaskId, owner: &OwnerId, input: TaskInput)
        -> Result<Task, StoreError>;

    fn delete_task(&self, id: TaskId, owner: &OwnerId) -> Result<(), StoreError>;

    fn set_completion(&self, id: TaskId, owner: &OwnerId, completed: bool)
        -> Result<Task, StoreError>;
}

fn require_owner(owner: &OwnerId) -> Result<(), StoreError> {
    if owner.is_empty() {
        return Err(StoreError::NotAuthenticated);
    }
    Ok(())
}

/// All owners' tasks in one pretty-printed JSON array.
#[derive(Debug, Clone)]
pub struct JsonFileStore {
    path: PathBuf,
}

impl JsonFileStore {
    pub const FILE_NAME: &'static str = "tasks.json";

    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn in_dir(dir: &Path) -> Self {
        Self::new(dir.join(Self::FILE_NAME))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Reads the file record by record. A record that cannot be decoded as a
    /// task is skipped for listing but kept so a later save writes it back.
    fn load(&self) -> Result<Records, StoreError> {
        let mut records = Records::default();
        if !self.path.exists() {
            return Ok(records);
        }
        let data = fs::read_to_string(&self.path)?;
        if data.trim().is_empty() {
            return Ok(records);
        }
        let raw: Vec<Value> = serde_json::from_str(&data)?;
        for (index, value) in raw.into_iter().enumerate() {
            match serde_json::from_value::<Task>(value.clone()) {
                Ok(task) => records.tasks.push(task),
                Err(err) => {
                    warn!(
                        path = %self.path.display(),
                        index,
                        error = %err,
                        "skipping unreadable task record"
                    );
                    records.unreadable.push(value);
                }
            }
        }
        Ok(records)
    }

    fn save(&self, records: &Records) -> Result<(), StoreError> {
        let mut out = Vec::with_capacity(records.tasks.len() + records.unreadable.len());
        for task in &records.tasks {
            out.push(serde_json::to_value(task)?);
        }
        out.extend(records.unreadable.iter().cloned());
        write_json_atomic(&self.path, &serde_json::to_string_pretty(&out)?)?;
        Ok(())
    }

    /// Loads, runs `f` on the owner's task with `id`, and saves.
    fn modify<T>(
        &self,
        id: TaskId,
        owner: &OwnerId,
        f: impl FnOnce(&mut Vec<Task>, usize) -> T,
    ) -> Result<T, StoreError> {
        require_owner(owner)?;
        let mut records = self.load()?;
        let index = records
            .tasks
            .iter()
            .position(|t| t.id == id && t.owner_id == *owner)
            .ok_or_else(|| StoreError::NotFound(id.to_string()))?;
        let out = f(&mut records.tasks, index);
        self.save(&records)?;
        Ok(out)
    }
}

#[derive(Debug, Default)]
struct Records {
    tasks: Vec<Task>,
    unreadable: Vec<Value>,
}

/// Writes to a sibling temp file, then renames over `path`.
pub(crate) fn write_json_atomic(path: &Path, contents: &str) -> std::io::Result<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)?;
        }
    }
    let mut tmp = path.as_os_str().to_owned();
    tmp.push(".tmp");
    let tmp = PathBuf::from(tmp);
    fs::write(&tmp, contents)?;
    fs::rename(&tmp, path)
}

impl TaskStore for JsonFileStore {
    fn list_tasks(&self, owner: &OwnerId) -> Result<Vec<Task>, StoreError> {
        require_owner(owner)?;
        let mut tasks: Vec<Task> = self
            .load()?
            .tasks
            .into_iter()
            .filter(|t| t.owner_id == *owner)
            .collect();
        tasks.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        debug!(owner = %owner, count = tasks.len(), "listed tasks");
        Ok(tasks)
    }

    fn create_task(&self, owner: &OwnerId, input: TaskInput) -> Result<Task, StoreError> {
        require_owner(owner)?;
        let input = input.validate()?;
        let now = Utc::now();
        let task = Task {
            id: TaskId::new(),
            owner_id: owner.clone(),
            title: input.title,
            description: input.description,
            due_date: input.due_date,
            priority: input.priority,
            category: input.category,
            tags: input.tags,
            completed: false,
            created_at: now,
            updated_at: Some(now),
        };

        let mut records = self.load()?;
        records.tasks.push(task.clone());
        self.save(&records)?;
        debug!(id = %task.id, owner = %owner, "created task");
        Ok(task)
    }

    fn update_task(
        &self,
        id: TaskId,
        owner: &OwnerId,
        input: TaskInput,
    ) -> Result<Task, StoreError> {
        let input = input.validate()?;
        let task = self.modify(id, owner, |tasks, i| {
            let task = &mut tasks[i];
            task.apply(&input);
            task.updated_at = Some(Utc::now());
            task.clone()
        })?;
        debug!(id = %id, "updated task");
        Ok(task)
    }

    fn delete_task(&self, id: TaskId, owner: &OwnerId) -> Result<(), StoreError> {
        self.modify(id, owner, |tasks, i| {
            tasks.remove(i);
        })?;
        debug!(id = %id, "deleted task");
        Ok(())
    }

    fn set_completion(
        &self,
        id: TaskId,
        owner: &OwnerId,
        completed: bool,
    ) -> Result<Task, StoreError> {
        let task = self.modify(id, owner, |tasks, i| {
            let task = &mut tasks[i];
            task.completed = completed;
            task.updated_at = Some(Utc::now());
            task.clone()
        })?;
        debug!(id = %id, completed, "set completion");
        Ok(task)
    }
}
