//! Which task is open in a project, and the comments key that follows from it.

use crate::cache::QueryKey;

/// Local, non-persisted selection state
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum Selection {
  #[default]
  NoneSelected,
  TaskSelected(String),
}

impl Selection {
  pub fn task_id(&self) -> Option<&str> {
    match self {
      Selection::NoneSelected => None,
      Selection::TaskSelected(id) => Some(id),
    }
  }
}

/// Result of a `select` call: the comments key that went inactive and the
/// one that became active.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SelectionChange {
  pub disabled: Option<QueryKey>,
  pub enabled: Option<QueryKey>,
}

impl SelectionChange {
  pub fn is_noop(&self) -> bool {
    self.disabled == self.enabled
  }
}

/// Holds the selected task for one project.
///
/// `select(Some(id))` from any state goes to `TaskSelected(id)`,
/// `select(None)` goes to `NoneSelected`. There is no terminal state.
#[derive(Debug, Clone)]
pub struct SelectionController {
  project_id: String,
  selection: Selection,
}

impl SelectionController {
  pub fn new(project_id: impl Into<String>) -> Self {
    Self {
      project_id: project_id.into(),
      selection: Selection::NoneSelected,
    }
  }

  pub fn select(&mut self, task_id: Option<&str>) -> SelectionChange {
    let disabled = self.comments_key();
    self.selection = match task_id {
      Some(id) => Selection::TaskSelected(id.to_string()),
      None => Selection::NoneSelected,
    };
    SelectionChange {
      disabled,
      enabled: self.comments_key(),
    }
  }

  pub fn selection(&self) -> &Selection {
    &self.selection
  }

  pub fn selected_task_id(&self) -> Option<&str> {
    self.selection.task_id()
  }

  /// The comments query is enabled exactly while a task is selected
  pub fn comments_enabled(&self) -> bool {
    matches!(self.selection, Selection::TaskSelected(_))
  }

  /// `(taskComments, project, task)` for the selected task
  pub fn comments_key(&self) -> Option<QueryKey> {
    self
      .selected_task_id()
      .map(|task_id| QueryKey::task_comments(&self.project_id, task_id))
  }
}
