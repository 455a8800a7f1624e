use std::fmt;
use std::str::FromStr;

use anyhow::anyhow;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TaskId(u64);

impl TaskId {
    pub fn new(raw: u64) -> Self {
        Self(raw)
    }

    pub fn get(self) -> u64 {
        self.0
    }
}

impl fmt::Display for TaskId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for TaskId {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.trim()
            .parse::<u64>()
            .map(Self)
            .map_err(|err| anyhow!("invalid task id {s:?}: {err}"))
    }
}

/// A single tracked task.
///
/// `active == true` means the task is still open; `active == false` means it
/// has been completed. The stored field keeps this polarity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Task {
    pub id: TaskId,
    pub text: String,
    pub active: bool,
}

impl Task {
    pub fn new_active(id: TaskId, text: String) -> Self {
        Self {
            id,
            text,
            active: true,
        }
    }

    pub fn is_completed(&self) -> bool {
        !self.active
    }

    /// Checkbox state for the task row: checked once the task is done.
    pub fn is_checked(&self) -> bool {
        !self.active
    }

    /// Accessible label for the row's checkbox, naming the state a toggle
    /// would move the task into.
    pub fn toggle_label(&self) -> String {
        let target = if self.active { "completed" } else { "active" };
        format!("Mark task \"{}\" as {target}", self.text)
    }

    pub fn delete_label(&self) -> String {
        format!("Delete task \"{}\"", self.text)
    }
}

/// Issues task ids from the creation wall clock in milliseconds.
///
/// Ids are strictly increasing within a session and always greater than every
/// id the generator was seeded with, so two tasks never share one even when
/// created inside the same millisecond.
#[derive(Debug, Clone, Default)]
pub struct IdGenerator {
    last: Option<u64>,
}

impl IdGenerator {
    pub fn seeded(tasks: &[Task]) -> Self {
        Self {
            last: tasks.iter().map(|task| task.id.get()).max(),
        }
    }

    pub fn next(&mut self, now: DateTime<Utc>) -> TaskId {
        let stamp = u64::try_from(now.timestamp_millis()).unwrap_or(0);
        let raw = match self.last {
            Some(last) if stamp <= last => last.saturating_add(1),
            _ => stamp,
        };
        self.last = Some(raw);
        TaskId(raw)
    }
}
