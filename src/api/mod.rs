//! ProjectStack API: transport, wire types and the seam the core talks to.

pub mod api_types;
pub mod client;
pub mod error;
pub mod types;

#[cfg(test)]
pub mod fake;

use std::future::Future;

pub use client::ApiClient;
pub use error::{ApiError, ApiResult};

use api_types::{InviteRequest, NewProject, NewTask, TaskUpdate};
use types::{ChatMessage, Comment, Project, Task};

/// Remote operations the sync layer depends on.
///
/// `ApiClient` is the production implementation; tests substitute an
/// in-memory fake. Every method is a single request: reads may be retried
/// by the implementation, writes never are.
pub trait ProjectApi: Clone + Send + Sync + 'static {
  fn list_projects(&self) -> impl Future<Output = ApiResult<Vec<Project>>> + Send;

  fn get_project(&self, project_id: &str) -> impl Future<Output = ApiResult<Project>> + Send;

  fn create_project(&self, project: &NewProject)
    -> impl Future<Output = ApiResult<Project>> + Send;

  fn update_project(
    &self,
    project_id: &str,
    project: &NewProject,
  ) -> impl Future<Output = ApiResult<Project>> + Send;

  fn delete_project(&self, project_id: &str) -> impl Future<Output = ApiResult<()>> + Send;

  fn list_tasks(&self, project_id: &str) -> impl Future<Output = ApiResult<Vec<Task>>> + Send;

  fn create_task(
    &self,
    project_id: &str,
    task: &NewTask,
  ) -> impl Future<Output = ApiResult<Task>> + Send;

  fn update_task(
    &self,
    project_id: &str,
    task_id: &str,
    update: &TaskUpdate,
  ) -> impl Future<Output = ApiResult<Task>> + Send;

  fn delete_task(
    &self,
    project_id: &str,
    task_id: &str,
  ) -> impl Future<Output = ApiResult<()>> + Send;

  fn list_comments(
    &self,
    project_id: &str,
    task_id: &str,
  ) -> impl Future<Output = ApiResult<Vec<Comment>>> + Send;

  fn create_comment(
    &self,
    project_id: &str,
    task_id: &str,
    text: &str,
  ) -> impl Future<Output = ApiResult<Comment>> + Send;

  fn delete_comment(
    &self,
    project_id: &str,
    task_id: &str,
    comment_id: &str,
  ) -> impl Future<Output = ApiResult<()>> + Send;

  fn list_chat(&self, project_id: &str)
    -> impl Future<Output = ApiResult<Vec<ChatMessage>>> + Send;

  fn send_message(
    &self,
    project_id: &str,
    text: &str,
  ) -> impl Future<Output = ApiResult<ChatMessage>> + Send;

  fn invite_members(
    &self,
    project_id: &str,
    invite: &InviteRequest,
  ) -> impl Future<Output = ApiResult<()>> + Send;
}
