use chrono::{DateTime, TimeZone, Utc};
use tracing::{debug, info, warn};

use crate::error::StoreError;
use crate::organizer::{self, TaskCounts, TaskGroups};
use crate::store::TaskStore;
use crate::task::{OwnerId, Task, TaskId, TaskInput};

/// In-memory mirror of the signed-in owner's tasks plus the search query.
///
/// Mutations are applied locally first and then sent to the store. If the
/// store call fails the local list is put back the way it was and the
/// error is returned.
#[derive(Debug)]
pub struct TaskBoard<S> {
    store: S,
    owner: Option<OwnerId>,
    tasks: Vec<Task>,
    query: String,
}

impl<S: TaskStore> TaskBoard<S> {
    pub fn new(store: S, owner: Option<OwnerId>) -> Self {
        Self {
            store,
            owner,
            tasks: Vec::new(),
            query: String::new(),
        }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    fn require_owner(&self) -> Result<OwnerId, StoreError> {
        self.owner
            .clone()
            .filter(|o| !o.is_empty())
            .ok_or(StoreError::NotAuthenticated)
    }

    /// Replaces the mirror with the store's copy.
    pub fn load(&mut self) -> Result<usize, StoreError> {
        let owner = self.require_owner()?;
        self.tasks = self.store.list_tasks(&owner)?;
        info!(owner = %owner, count = self.tasks.len(), "loaded tasks");
        Ok(self.tasks.len())
    }

    pub fn tasks(&self) -> &[Task] {
        &self.tasks
    }

    pub fn find(&self, id: TaskId) -> Option<&Task> {
        self.tasks.iter().find(|t| t.id == id)
    }

    pub fn query(&self) -> &str {
        &self.query
    }

    pub fn set_query(&mut self, query: impl Into<String>) {
        self.query = query.into();
    }

    pub fn visible_tasks(&self) -> Vec<&Task> {
        organizer::filter_by_query(&self.tasks, &self.query)
    }

    pub fn groups(&self) -> TaskGroups<'_> {
        organizer::group_by_time_frame(self.visible_tasks())
    }

    pub fn groups_at<Tz: TimeZone>(&self, now: &DateTime<Tz>) -> TaskGroups<'_> {
        organizer::group_by_time_frame_at(self.visible_tasks(), now)
    }

    /// Progress over the tasks matching the current query.
    pub fn counts(&self) -> TaskCounts {
        organizer::task_counts(self.visible_tasks())
    }

    /// Creates a task, or updates `editing` with the draft.
    pub fn save_task(
        &mut self,
        input: TaskInput,
        editing: Option<TaskId>,
    ) -> Result<Task, StoreError> {
        let owner = self.require_owner()?;
        let input = input.validate()?;

        let Some(id) = editing else {
            // the id comes from the store, so there is nothing to show early
            let task = self.store.create_task(&owner, input)?;
            debug!(id = %task.id, "task added to board");
            self.tasks.insert(0, task.clone());
            return Ok(task);
        };

        let index = self.index_of(id)?;
        let snapshot = self.tasks[index].clone();
        {
            let local = &mut self.tasks[index];
            local.apply(&input);
            local.updated_at = Some(Utc::now());
        }

        match self.store.update_task(id, &owner, input) {
            Ok(stored) => {
                self.tasks[index] = stored.clone();
                Ok(stored)
            }
            Err(err) => {
                warn!(id = %id, error = %err, "update failed, restoring local copy");
                self.tasks[index] = snapshot;
                Err(err)
            }
        }
    }

    /// Flips completion. Returns the new state.
    pub fn toggle_task(&mut self, id: TaskId) -> Result<bool, StoreError> {
        let owner = self.require_owner()?;
        let index = self.index_of(id)?;
        let snapshot = self.tasks[index].clone();
        let completed = !snapshot.completed;
        {
            let local = &mut self.tasks[index];
            local.completed = completed;
            local.updated_at = Some(Utc::now());
        }

        match self.store.set_completion(id, &owner, completed) {
            Ok(stored) => {
                self.tasks[index] = stored;
                Ok(completed)
            }
            Err(err) => {
                warn!(id = %id, error = %err, "toggle failed, restoring local copy");
                self.tasks[index] = snapshot;
                Err(err)
            }
        }
    }

    pub fn delete_task(&mut self, id: TaskId) -> Result<(), StoreError> {
        let owner = self.require_owner()?;
        let index = self.index_of(id)?;
        let removed = self.tasks.remove(index);

        if let Err(err) = self.store.delete_task(id, &owner) {
            warn!(id = %id, error = %err, "delete failed, restoring task");
            self.tasks.insert(index, removed);
            return Err(err);
        }
        debug!(id = %id, "task removed from board");
        Ok(())
    }

    fn index_of(&self, id: TaskId) -> Result<usize, StoreError> {
        self.tasks
            .iter()
            .position(|t| t.id == id)
            .ok_or_else(|| StoreError::NotFound(id.to_string()))
    }
}
