//! In-memory `ProjectApi` with per-operation call counters and injectable
//! failures.

use chrono::{DateTime, Duration, TimeZone, Utc};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;

use super::api_types::{InviteRequest, NewProject, NewTask, TaskUpdate};
use super::error::{ApiError, ApiResult};
use super::types::{
  ChatMessage, Comment, Project, ProjectStatus, Task, TaskPriority, TaskStatus, TeamMember, User,
};
use super::ProjectApi;

#[derive(Default)]
struct FakeState {
  projects: Vec<Project>,
  tasks: HashMap<String, Vec<Task>>,
  comments: HashMap<(String, String), Vec<Comment>>,
  chat: HashMap<String, Vec<ChatMessage>>,
  calls: HashMap<&'static str, usize>,
  failures: HashMap<&'static str, ApiError>,
  next_id: usize,
}

#[derive(Clone, Default)]
pub struct FakeApi {
  state: Arc<Mutex<FakeState>>,
}

pub fn user(id: &str) -> User {
  User {
    id: id.to_string(),
    name: format!("User {}", id),
    email: format!("{}@example.com", id),
    avatar: None,
  }
}

pub fn at(minute: i64) -> DateTime<Utc> {
  Utc.with_ymd_and_hms(2024, 3, 1, 9, 0, 0).unwrap() + Duration::minutes(minute)
}

pub fn task(id: &str, status: TaskStatus) -> Task {
  Task {
    id: id.to_string(),
    title: format!("Task {}", id),
    description: String::new(),
    status,
    priority: TaskPriority::Medium,
    assignee: None,
    due_date: None,
    tags: Vec::new(),
  }
}

pub fn comment(id: &str, text: &str) -> Comment {
  Comment {
    id: id.to_string(),
    text: text.to_string(),
    author: user("u1"),
    created_at: at(0),
  }
}

pub fn message(id: &str, sender: &str, minute: i64) -> ChatMessage {
  ChatMessage {
    id: id.to_string(),
    text: format!("message {}", id),
    sender: user(sender),
    timestamp: at(minute),
  }
}

pub fn project(id: &str) -> Project {
  Project {
    id: id.to_string(),
    name: format!("Project {}", id),
    description: String::new(),
    status: ProjectStatus::Active,
    tech_stack: vec!["rust".to_string()],
    created_at: at(0),
    members: vec![TeamMember {
      user: user("u1"),
      role: Default::default(),
    }],
  }
}

impl FakeApi {
  /// Project `p1` with tasks `T1`/`T2`, a comment on each, and two chat
  /// messages stored out of timestamp order.
  pub fn seeded() -> Self {
    let api = Self::default();
    {
      let mut state = api.state.lock();
      state.projects.push(project("p1"));
      state.tasks.insert(
        "p1".to_string(),
        vec![task("T1", TaskStatus::Todo), task("T2", TaskStatus::InProgress)],
      );
      state.comments.insert(
        ("p1".to_string(), "T1".to_string()),
        vec![comment("c1", "first on T1")],
      );
      state.comments.insert(
        ("p1".to_string(), "T2".to_string()),
        vec![comment("c2", "first on T2")],
      );
      state.chat.insert(
        "p1".to_string(),
        vec![message("m2", "u2", 5), message("m1", "u1", 1)],
      );
    }
    api
  }

  pub fn calls(&self, op: &str) -> usize {
    self.state.lock().calls.get(op).copied().unwrap_or(0)
  }

  pub fn fail(&self, op: &'static str, err: ApiError) {
    self.state.lock().failures.insert(op, err);
  }

  pub fn heal(&self, op: &'static str) {
    self.state.lock().failures.remove(op);
  }

  fn record(&self, op: &'static str) -> ApiResult<()> {
    let mut state = self.state.lock();
    *state.calls.entry(op).or_default() += 1;
    match state.failures.get(op) {
      Some(err) => Err(err.clone()),
      None => Ok(()),
    }
  }

  fn next_id(&self, prefix: &str) -> String {
    let mut state = self.state.lock();
    state.next_id += 1;
    format!("{}{}", prefix, state.next_id)
  }

  fn not_found() -> ApiError {
    ApiError::from_status(404, Some("not found".to_string()))
  }
}

impl ProjectApi for FakeApi {
  async fn list_projects(&self) -> ApiResult<Vec<Project>> {
    self.record("list_projects")?;
    Ok(self.state.lock().projects.clone())
  }

  async fn get_project(&self, project_id: &str) -> ApiResult<Project> {
    self.record("get_project")?;
    let state = self.state.lock();
    state
      .projects
      .iter()
      .find(|p| p.id == project_id)
      .cloned()
      .ok_or_else(Self::not_found)
  }

  async fn create_project(&self, new: &NewProject) -> ApiResult<Project> {
    self.record("create_project")?;
    let mut created = project(&self.next_id("p"));
    created.name = new.name.clone();
    self.state.lock().projects.push(created.clone());
    Ok(created)
  }

  async fn update_project(&self, project_id: &str, update: &NewProject) -> ApiResult<Project> {
    self.record("update_project")?;
    let mut state = self.state.lock();
    let found = state
      .projects
      .iter_mut()
      .find(|p| p.id == project_id)
      .ok_or_else(Self::not_found)?;
    found.name = update.name.clone();
    Ok(found.clone())
  }

  async fn delete_project(&self, project_id: &str) -> ApiResult<()> {
    self.record("delete_project")?;
    self.state.lock().projects.retain(|p| p.id != project_id);
    Ok(())
  }

  async fn list_tasks(&self, project_id: &str) -> ApiResult<Vec<Task>> {
    self.record("list_tasks")?;
    Ok(self.state.lock().tasks.get(project_id).cloned().unwrap_or_default())
  }

  async fn create_task(&self, project_id: &str, new: &NewTask) -> ApiResult<Task> {
    self.record("create_task")?;
    let mut created = task(&self.next_id("t"), new.status);
    created.title = new.title.clone();
    self
      .state
      .lock()
      .tasks
      .entry(project_id.to_string())
      .or_default()
      .push(created.clone());
    Ok(created)
  }

  async fn update_task(&self, project_id: &str, task_id: &str, update: &TaskUpdate) -> ApiResult<Task> {
    self.record("update_task")?;
    let mut state = self.state.lock();
    let found = state
      .tasks
      .get_mut(project_id)
      .and_then(|tasks| tasks.iter_mut().find(|t| t.id == task_id))
      .ok_or_else(Self::not_found)?;
    if let Some(status) = update.status {
      found.status = status;
    }
    if let Some(title) = &update.title {
      found.title = title.clone();
    }
    Ok(found.clone())
  }

  async fn delete_task(&self, project_id: &str, task_id: &str) -> ApiResult<()> {
    self.record("delete_task")?;
    if let Some(tasks) = self.state.lock().tasks.get_mut(project_id) {
      tasks.retain(|t| t.id != task_id);
    }
    Ok(())
  }

  async fn list_comments(&self, project_id: &str, task_id: &str) -> ApiResult<Vec<Comment>> {
    self.record("list_comments")?;
    let key = (project_id.to_string(), task_id.to_string());
    Ok(self.state.lock().comments.get(&key).cloned().unwrap_or_default())
  }

  async fn create_comment(&self, project_id: &str, task_id: &str, text: &str) -> ApiResult<Comment> {
    self.record("create_comment")?;
    let created = comment(&self.next_id("c"), text);
    self
      .state
      .lock()
      .comments
      .entry((project_id.to_string(), task_id.to_string()))
      .or_default()
      .push(created.clone());
    Ok(created)
  }

  async fn delete_comment(&self, project_id: &str, task_id: &str, comment_id: &str) -> ApiResult<()> {
    self.record("delete_comment")?;
    let key = (project_id.to_string(), task_id.to_string());
    if let Some(comments) = self.state.lock().comments.get_mut(&key) {
      comments.retain(|c| c.id != comment_id);
    }
    Ok(())
  }

  async fn list_chat(&self, project_id: &str) -> ApiResult<Vec<ChatMessage>> {
    self.record("list_chat")?;
    Ok(self.state.lock().chat.get(project_id).cloned().unwrap_or_default())
  }

  async fn send_message(&self, project_id: &str, text: &str) -> ApiResult<ChatMessage> {
    self.record("send_message")?;
    let mut sent = message(&self.next_id("m"), "u1", 60);
    sent.text = text.to_string();
    self
      .state
      .lock()
      .chat
      .entry(project_id.to_string())
      .or_default()
      .push(sent.clone());
    Ok(sent)
  }

  async fn invite_members(&self, project_id: &str, invite: &InviteRequest) -> ApiResult<()> {
    self.record("invite_members")?;
    let mut state = self.state.lock();
    let found = state
      .projects
      .iter_mut()
      .find(|p| p.id == project_id)
      .ok_or_else(Self::not_found)?;
    for email in &invite.emails {
      let mut member = user(email);
      member.email = email.clone();
      found.members.push(TeamMember {
        user: member,
        role: invite.role,
      });
    }
    Ok(())
  }
}
