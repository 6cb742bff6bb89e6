//! Request and error payloads exchanged with the ProjectStack API.
//!
//! Response bodies deserialize straight into the domain types in `types`;
//! only the write payloads and the error envelope live here.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::types::{ProjectStatus, TaskPriority, TaskStatus, TeamMember, UserRole};

// ============================================================================
// Write payloads
// ============================================================================

#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NewProject {
  pub name: String,
  pub description: String,
  pub status: ProjectStatus,
  pub tech_stack: Vec<String>,
}

#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NewTask {
  pub title: String,
  pub description: String,
  pub status: TaskStatus,
  pub priority: TaskPriority,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub assignee: Option<TeamMember>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub due_date: Option<DateTime<Utc>>,
  pub tags: Vec<String>,
}

impl NewTask {
  /// A todo/medium task with just a title
  pub fn titled(title: impl Into<String>) -> Self {
    Self {
      title: title.into(),
      ..Self::default()
    }
  }
}

/// Partial task update; absent fields are left untouched by the server.
#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskUpdate {
  #[serde(skip_serializing_if = "Option::is_none")]
  pub title: Option<String>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub description: Option<String>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub status: Option<TaskStatus>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub priority: Option<TaskPriority>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub due_date: Option<DateTime<Utc>>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub tags: Option<Vec<String>>,
}

impl TaskUpdate {
  pub fn status(status: TaskStatus) -> Self {
    Self {
      status: Some(status),
      ..Self::default()
    }
  }
}

/// Body for comment and chat posts
#[derive(Debug, Clone, Serialize)]
pub struct TextBody<'a> {
  pub text: &'a str,
}

#[derive(Debug, Clone, Serialize)]
pub struct InviteRequest {
  pub emails: Vec<String>,
  pub role: UserRole,
}

impl InviteRequest {
  /// Build an invite from user-entered addresses, dropping blank entries.
  pub fn new<I, S>(emails: I, role: UserRole) -> Self
  where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
  {
    let emails = emails
      .into_iter()
      .map(|e| e.as_ref().trim().to_string())
      .filter(|e| !e.is_empty())
      .collect();
    Self { emails, role }
  }
}

// ============================================================================
// Error envelope
// ============================================================================

/// `{ "message": "..." }` body returned alongside failing statuses
#[derive(Debug, Deserialize)]
pub struct ApiErrorBody {
  pub message: Option<String>,
}

/// Pull the `message` out of an error body, if it has one.
pub fn error_message(body: &str) -> Option<String> {
  serde_json::from_str::<ApiErrorBody>(body)
    .ok()
    .and_then(|b| b.message)
    .filter(|m| !m.trim().is_empty())
}

#[cfg(test)]
mod tests {
  use super::*;
  use serde_json::json;

  #[test]
  fn test_task_update_only_sends_set_fields() {
    let body = serde_json::to_value(TaskUpdate::status(TaskStatus::Done)).unwrap();
    assert_eq!(body, json!({ "status": "done" }));
  }

  #[test]
  fn test_new_task_defaults() {
    let body = serde_json::to_value(NewTask::titled("Ship it")).unwrap();
    assert_eq!(body["status"], "todo");
    assert_eq!(body["priority"], "medium");
    assert!(body.get("assignee").is_none());
  }

  #[test]
  fn test_invite_request_drops_blank_emails() {
    let invite = InviteRequest::new(["a@x.io", "  ", " b@x.io "], UserRole::Manager);
    assert_eq!(invite.emails, vec!["a@x.io", "b@x.io"]);
    let body = serde_json::to_value(&invite).unwrap();
    assert_eq!(body["role"], "manager");
  }

  #[test]
  fn test_error_message() {
    assert_eq!(
      error_message(r#"{"message":"Title is required"}"#),
      Some("Title is required".to_string())
    );
    assert_eq!(error_message(r#"{"message":""}"#), None);
    assert_eq!(error_message("<html>oops</html>"), None);
  }
}
