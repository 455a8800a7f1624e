use anyhow::Context;
use chrono::{DateTime, Utc};
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::datastore::{TaskPersistence, decode_tasks};
use crate::filter::{self, ViewCategory};
use crate::notifier::Notifier;
use crate::task::{IdGenerator, Task, TaskId};

pub const COMPLETED_CLEARED_MESSAGE: &str = "All completed tasks have been deleted.";

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("task text is empty")]
    EmptyText,

    #[error("task not found: {0}")]
    NotFound(TaskId),

    #[error(transparent)]
    Storage(#[from] anyhow::Error),
}

impl StoreError {
    /// Rejections the front end swallows without telling the user.
    pub fn is_silent(&self) -> bool {
        matches!(self, StoreError::EmptyText | StoreError::NotFound(_))
    }
}

/// Owner of the task collection.
///
/// Every mutation writes the full snapshot through the persistence adapter
/// before returning, so memory and storage never disagree between calls.
#[derive(Debug)]
pub struct TaskStore<P: TaskPersistence> {
    persistence: P,
    tasks: Vec<Task>,
    ids: IdGenerator,
    notifier: Notifier,
}

impl<P: TaskPersistence> TaskStore<P> {
    /// Opens the store over whatever `persistence` holds. Missing or
    /// unreadable content yields an empty collection.
    #[tracing::instrument(skip_all)]
    pub fn load(persistence: P, notifier: Notifier) -> Self {
        let tasks = load_tasks(&persistence);
        info!(count = tasks.len(), "loaded tasks");
        Self {
            ids: IdGenerator::seeded(&tasks),
            persistence,
            tasks,
            notifier,
        }
    }

    pub fn tasks(&self) -> &[Task] {
        &self.tasks
    }

    pub fn get(&self, id: TaskId) -> Option<&Task> {
        self.tasks.iter().find(|task| task.id == id)
    }

    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }

    pub fn view(&self, category: ViewCategory) -> Vec<&Task> {
        filter::filter(&self.tasks, category)
    }

    pub fn notifier(&self) -> &Notifier {
        &self.notifier
    }

    pub fn notifier_mut(&mut self) -> &mut Notifier {
        &mut self.notifier
    }

    pub fn persistence(&self) -> &P {
        &self.persistence
    }

    #[tracing::instrument(skip(self, text, now))]
    pub fn add(&mut self, text: &str, now: DateTime<Utc>) -> Result<Task, StoreError> {
        let text = text.trim();
        if text.is_empty() {
            debug!("ignoring empty task text");
            return Err(StoreError::EmptyText);
        }

        let task = Task::new_active(self.ids.next(now), text.to_string());
        self.tasks.push(task.clone());
        self.persist()?;

        info!(id = %task.id, count = self.tasks.len(), "task added");
        Ok(task)
    }

    #[tracing::instrument(skip(self), fields(id = %id))]
    pub fn toggle(&mut self, id: TaskId) -> Result<(), StoreError> {
        let task = self
            .tasks
            .iter_mut()
            .find(|task| task.id == id)
            .ok_or(StoreError::NotFound(id))?;
        task.active = !task.active;
        let active = task.active;
        self.persist()?;

        info!(active, "task toggled");
        Ok(())
    }

    #[tracing::instrument(skip(self), fields(id = %id))]
    pub fn delete(&mut self, id: TaskId) -> Result<(), StoreError> {
        let idx = self
            .tasks
            .iter()
            .position(|task| task.id == id)
            .ok_or(StoreError::NotFound(id))?;
        self.tasks.remove(idx);
        self.persist()?;

        info!(count = self.tasks.len(), "task deleted");
        Ok(())
    }

    /// Removes every completed task and raises the cleared notice, even when
    /// nothing was removed.
    #[tracing::instrument(skip(self, now))]
    pub fn delete_completed(&mut self, now: DateTime<Utc>) -> Result<usize, StoreError> {
        let before = self.tasks.len();
        self.tasks.retain(|task| task.active);
        let removed = before - self.tasks.len();
        self.persist()?;
        self.notifier.notify(COMPLETED_CLEARED_MESSAGE, now);

        info!(
            before,
            after = self.tasks.len(),
            removed,
            "deleted completed tasks"
        );
        Ok(removed)
    }

    fn persist(&mut self) -> anyhow::Result<()> {
        self.persistence
            .save(&self.tasks)
            .context("failed to persist task snapshot")
    }
}

/// Reads and decodes the stored collection, falling back to empty.
#[tracing::instrument(skip_all)]
pub fn load_tasks<P: TaskPersistence>(persistence: &P) -> Vec<Task> {
    let raw = match persistence.read() {
        Ok(Some(raw)) => raw,
        Ok(None) => {
            debug!("no stored tasks, starting empty");
            return Vec::new();
        }
        Err(err) => {
            warn!(error = %format!("{err:#}"), "failed reading stored tasks, starting empty");
            return Vec::new();
        }
    };

    match decode_tasks(&raw) {
        Ok(tasks) => tasks,
        Err(err) => {
            warn!(error = %format!("{err:#}"), "stored tasks are malformed, starting empty");
            Vec::new()
        }
    }
}
