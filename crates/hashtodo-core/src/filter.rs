use std::convert::Infallible;
use std::fmt;
use std::str::FromStr;

use tracing::{
  debug,
  trace
};

use crate::task::Task;

/// Which slice of the collection the
/// user is looking at. Never persisted.
#[derive(
  Debug,
  Clone,
  Copy,
  PartialEq,
  Eq,
  Default,
)]
pub enum ViewCategory {
  #[default]
  All,
  Active,
  Completed
}

impl ViewCategory {
  pub const TABS: [ViewCategory; 3] = [
    ViewCategory::All,
    ViewCategory::Active,
    ViewCategory::Completed
  ];

  pub fn name(self) -> &'static str {
    match self {
      | ViewCategory::All => "all",
      | ViewCategory::Active => "active",
      | ViewCategory::Completed => {
        "completed"
      }
    }
  }

  pub fn label(self) -> &'static str {
    match self {
      | ViewCategory::All => "All",
      | ViewCategory::Active => "Active",
      | ViewCategory::Completed => {
        "Completed"
      }
    }
  }

  /// Unknown names select `All`.
  pub fn parse_lenient(
    raw: &str
  ) -> Self {
    Self::parse_known(raw)
      .unwrap_or_else(|| {
        debug!(
          category = %raw,
          "unrecognized view \
           category, showing all"
        );
        ViewCategory::All
      })
  }

  pub fn parse_known(
    raw: &str
  ) -> Option<Self> {
    let lowered =
      raw.trim().to_ascii_lowercase();
    Self::TABS
      .into_iter()
      .find(|tab| {
        tab.name() == lowered
      })
  }

  pub fn includes(
    self,
    task: &Task
  ) -> bool {
    match self {
      | ViewCategory::All => true,
      | ViewCategory::Active => {
        task.active
      }
      | ViewCategory::Completed => {
        !task.active
      }
    }
  }

  /// Tabs that offer the add form.
  pub fn accepts_new_tasks(
    self
  ) -> bool {
    matches!(
      self,
      ViewCategory::All
        | ViewCategory::Active
    )
  }

  /// Tabs that offer per-task delete
  /// and the bulk delete action.
  pub fn allows_delete(self) -> bool {
    self == ViewCategory::Completed
  }
}

impl FromStr for ViewCategory {
  type Err = Infallible;

  fn from_str(
    s: &str
  ) -> Result<Self, Self::Err> {
    Ok(Self::parse_lenient(s))
  }
}

impl fmt::Display for ViewCategory {
  fn fmt(
    &self,
    f: &mut fmt::Formatter<'_>
  ) -> fmt::Result {
    f.write_str(self.name())
  }
}

pub fn filter(
  tasks: &[Task],
  category: ViewCategory
) -> Vec<&Task> {
  let visible: Vec<&Task> = tasks
    .iter()
    .filter(|task| {
      category.includes(task)
    })
    .collect();
  trace!(
    %category,
    total = tasks.len(),
    visible = visible.len(),
    "filtered tasks"
  );
  visible
}
