use std::fmt;

/// Identifies one cached remote resource together with its parameters.
///
/// Two keys are equal iff every component matches by value.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum QueryKey {
  /// Projects visible to the signed-in user
  Projects,
  /// A single project, including its members
  Project { project_id: String },
  /// Every task on a project's board
  ProjectTasks { project_id: String },
  /// Comments on one task
  TaskComments { project_id: String, task_id: String },
  /// A project's chat history
  ProjectChat { project_id: String },
}

impl QueryKey {
  pub fn project(project_id: impl Into<String>) -> Self {
    Self::Project {
      project_id: project_id.into(),
    }
  }

  pub fn project_tasks(project_id: impl Into<String>) -> Self {
    Self::ProjectTasks {
      project_id: project_id.into(),
    }
  }

  pub fn task_comments(project_id: impl Into<String>, task_id: impl Into<String>) -> Self {
    Self::TaskComments {
      project_id: project_id.into(),
      task_id: task_id.into(),
    }
  }

  pub fn project_chat(project_id: impl Into<String>) -> Self {
    Self::ProjectChat {
      project_id: project_id.into(),
    }
  }

  /// The project this key is scoped to, if any
  pub fn project_id(&self) -> Option<&str> {
    match self {
      Self::Projects => None,
      Self::Project { project_id }
      | Self::ProjectTasks { project_id }
      | Self::TaskComments { project_id, .. }
      | Self::ProjectChat { project_id } => Some(project_id),
    }
  }

  /// Resource type name, the first tuple component
  pub fn resource(&self) -> &'static str {
    match self {
      Self::Projects => "projects",
      Self::Project { .. } => "project",
      Self::ProjectTasks { .. } => "projectTasks",
      Self::TaskComments { .. } => "taskComments",
      Self::ProjectChat { .. } => "projectChat",
    }
  }

  pub fn description(&self) -> String {
    match self {
      Self::Projects => "all projects".to_string(),
      Self::Project { project_id } => format!("project {}", project_id),
      Self::ProjectTasks { project_id } => format!("tasks of project {}", project_id),
      Self::TaskComments {
        project_id,
        task_id,
      } => format!("comments on task {} in project {}", task_id, project_id),
      Self::ProjectChat { project_id } => format!("chat of project {}", project_id),
    }
  }
}

impl fmt::Display for QueryKey {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "({}", self.resource())?;
    match self {
      Self::Projects => {}
      Self::Project { project_id }
      | Self::ProjectTasks { project_id }
      | Self::ProjectChat { project_id } => write!(f, ", {}", project_id)?,
      Self::TaskComments {
        project_id,
        task_id,
      } => write!(f, ", {}, {}", project_id, task_id)?,
    }
    write!(f, ")")
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_equality_is_by_value() {
    assert_eq!(QueryKey::task_comments("p1", "t1"), QueryKey::task_comments("p1", "t1"));
    assert_ne!(QueryKey::task_comments("p1", "t1"), QueryKey::task_comments("p1", "t2"));
    assert_ne!(QueryKey::project("p1"), QueryKey::project_tasks("p1"));
  }

  #[test]
  fn test_project_scope() {
    assert_eq!(QueryKey::Projects.project_id(), None);
    assert_eq!(QueryKey::task_comments("p1", "t1").project_id(), Some("p1"));
  }

  #[test]
  fn test_display_as_tuple() {
    assert_eq!(QueryKey::project_chat("p1").to_string(), "(projectChat, p1)");
    assert_eq!(
      QueryKey::task_comments("p1", "T1").to_string(),
      "(taskComments, p1, T1)"
    );
    assert_eq!(QueryKey::Projects.to_string(), "(projects)");
  }
}
