//! Domain types shared by the API client, the cache and the views.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A registered user
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
  pub id: String,
  pub name: String,
  pub email: String,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub avatar: Option<String>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UserRole {
  Admin,
  Manager,
  #[default]
  Member,
}

impl UserRole {
  pub fn as_str(self) -> &'static str {
    match self {
      UserRole::Admin => "admin",
      UserRole::Manager => "manager",
      UserRole::Member => "member",
    }
  }
}

/// A user as seen through their membership in a project
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TeamMember {
  #[serde(flatten)]
  pub user: User,
  #[serde(default)]
  pub role: UserRole,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ProjectStatus {
  #[default]
  Active,
  Completed,
  OnHold,
  Archived,
}

impl ProjectStatus {
  pub fn label(self) -> &'static str {
    match self {
      ProjectStatus::Active => "Active",
      ProjectStatus::Completed => "Completed",
      ProjectStatus::OnHold => "On Hold",
      ProjectStatus::Archived => "Archived",
    }
  }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Project {
  pub id: String,
  pub name: String,
  #[serde(default)]
  pub description: String,
  #[serde(default)]
  pub status: ProjectStatus,
  #[serde(default)]
  pub tech_stack: Vec<String>,
  pub created_at: DateTime<Utc>,
  #[serde(default)]
  pub members: Vec<TeamMember>,
}

/// Board column a task lives in
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum TaskStatus {
  #[default]
  Todo,
  InProgress,
  Done,
}

impl TaskStatus {
  /// Board columns, left to right
  pub const ALL: [TaskStatus; 3] = [TaskStatus::Todo, TaskStatus::InProgress, TaskStatus::Done];

  pub fn label(self) -> &'static str {
    match self {
      TaskStatus::Todo => "To Do",
      TaskStatus::InProgress => "In Progress",
      TaskStatus::Done => "Done",
    }
  }

  /// The column to the right, if any
  pub fn next(self) -> Option<TaskStatus> {
    match self {
      TaskStatus::Todo => Some(TaskStatus::InProgress),
      TaskStatus::InProgress => Some(TaskStatus::Done),
      TaskStatus::Done => None,
    }
  }

  /// The column to the left, if any
  pub fn previous(self) -> Option<TaskStatus> {
    match self {
      TaskStatus::Todo => None,
      TaskStatus::InProgress => Some(TaskStatus::Todo),
      TaskStatus::Done => Some(TaskStatus::InProgress),
    }
  }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TaskPriority {
  Low,
  #[default]
  Medium,
  High,
}

impl TaskPriority {
  pub fn label(self) -> &'static str {
    match self {
      TaskPriority::Low => "low",
      TaskPriority::Medium => "medium",
      TaskPriority::High => "high",
    }
  }
}

/// A task on a project board. The owning project is implied by the query key.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Task {
  pub id: String,
  pub title: String,
  #[serde(default)]
  pub description: String,
  #[serde(default)]
  pub status: TaskStatus,
  #[serde(default)]
  pub priority: TaskPriority,
  #[serde(default)]
  pub assignee: Option<TeamMember>,
  #[serde(default)]
  pub due_date: Option<DateTime<Utc>>,
  #[serde(default)]
  pub tags: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Comment {
  pub id: String,
  pub text: String,
  pub author: User,
  pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatMessage {
  pub id: String,
  pub text: String,
  pub sender: User,
  pub timestamp: DateTime<Utc>,
}

impl ChatMessage {
  /// Whether this message was sent by `user`
  pub fn is_from(&self, user: &User) -> bool {
    self.sender.id == user.id
  }
}

/// Group tasks into board columns, in `TaskStatus::ALL` order.
pub fn tasks_by_status(tasks: &[Task]) -> [(TaskStatus, Vec<&Task>); 3] {
  TaskStatus::ALL.map(|status| {
    let column = tasks.iter().filter(|t| t.status == status).collect();
    (status, column)
  })
}

#[cfg(test)]
mod tests {
  use super::*;
  use serde_json::json;

  #[test]
  fn test_task_deserializes_wire_format() {
    let task: Task = serde_json::from_value(json!({
      "id": "t1",
      "title": "Wire up login",
      "description": "",
      "status": "in-progress",
      "priority": "high",
      "dueDate": "2024-05-01T00:00:00Z",
      "tags": ["auth"]
    }))
    .unwrap();

    assert_eq!(task.status, TaskStatus::InProgress);
    assert_eq!(task.priority, TaskPriority::High);
    assert!(task.assignee.is_none());
    assert_eq!(task.tags, vec!["auth".to_string()]);
  }

  #[test]
  fn test_project_status_kebab_case() {
    let status: ProjectStatus = serde_json::from_value(json!("on-hold")).unwrap();
    assert_eq!(status, ProjectStatus::OnHold);
    assert_eq!(status.label(), "On Hold");
  }

  #[test]
  fn test_team_member_flattens_user() {
    let member: TeamMember = serde_json::from_value(json!({
      "id": "u1",
      "name": "Ada",
      "email": "ada@example.com",
      "role": "admin"
    }))
    .unwrap();

    assert_eq!(member.user.name, "Ada");
    assert_eq!(member.role, UserRole::Admin);
  }

  #[test]
  fn test_tasks_by_status_keeps_column_order() {
    let make = |id: &str, status| Task {
      id: id.to_string(),
      title: id.to_string(),
      description: String::new(),
      status,
      priority: TaskPriority::Medium,
      assignee: None,
      due_date: None,
      tags: Vec::new(),
    };
    let tasks = vec![
      make("a", TaskStatus::Done),
      make("b", TaskStatus::Todo),
      make("c", TaskStatus::Done),
    ];

    let columns = tasks_by_status(&tasks);
    assert_eq!(columns[0].0, TaskStatus::Todo);
    assert_eq!(columns[0].1.len(), 1);
    assert!(columns[1].1.is_empty());
    let done: Vec<&str> = columns[2].1.iter().map(|t| t.id.as_str()).collect();
    assert_eq!(done, vec!["a", "c"]);
  }

  #[test]
  fn test_status_neighbours() {
    assert_eq!(TaskStatus::Todo.next(), Some(TaskStatus::InProgress));
    assert_eq!(TaskStatus::Done.next(), None);
    assert_eq!(TaskStatus::Todo.previous(), None);
    assert_eq!(TaskStatus::Done.previous(), Some(TaskStatus::InProgress));
  }
}
