//! Everything one open project page needs: its queries, the task selection,
//! and the write actions with the keys each one invalidates.

use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, info};

use crate::api::api_types::{InviteRequest, NewTask, TaskUpdate};
use crate::api::types::{ChatMessage, Comment, Project, Task, TaskStatus, User};
use crate::api::{ApiError, ProjectApi};
use crate::cache::{Listener, QueryKey, Subscription};
use crate::mutation::MutationRunner;
use crate::query::{QueryBinder, QueryHandle, QueryOptions};
use crate::selection::{Selection, SelectionChange, SelectionController};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum WorkspaceError {
  #[error("no task is selected")]
  NoTaskSelected,
  #[error(transparent)]
  Api(#[from] ApiError),
}

impl WorkspaceError {
  pub fn is_session_terminal(&self) -> bool {
    matches!(self, WorkspaceError::Api(e) if e.is_session_terminal())
  }
}

/// A primary query failed, so the page has nothing meaningful to show.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("failed to load {}: {}", .key.description(), .error)]
pub struct PageError {
  pub key: QueryKey,
  pub error: ApiError,
}

impl PageError {
  pub fn is_not_found(&self) -> bool {
    self.error.status() == Some(404)
  }

  pub fn is_session_expired(&self) -> bool {
    self.error.is_session_terminal()
  }
}

/// What the project page renders.
#[derive(Debug, Clone, Default)]
pub struct WorkspaceSnapshot {
  pub project: Option<Project>,
  pub tasks: Vec<Task>,
  /// Ordered by timestamp
  pub chat_messages: Vec<ChatMessage>,
  /// Empty unless a task is selected
  pub comments: Vec<Comment>,
  pub selected_task: Option<Task>,
  /// Initial load of project, tasks or chat still running
  pub is_loading: bool,
  /// Any primary query re-fetching, including in the background
  pub is_fetching: bool,
  pub comments_loading: bool,
  pub error: Option<PageError>,
}

/// Write actions for one project, detached from the workspace so they can
/// be moved into spawned tasks. Task ids are explicit here.
#[derive(Clone)]
pub struct WorkspaceActions<A> {
  project_id: String,
  api: A,
  runner: MutationRunner,
}

impl<A: ProjectApi> WorkspaceActions<A> {
  pub async fn create_task(&self, task: NewTask) -> Result<Task, WorkspaceError> {
    let tasks_key = QueryKey::project_tasks(&self.project_id);
    let created = self
      .runner
      .run("create_task", self.api.create_task(&self.project_id, &task), move |_| {
        vec![tasks_key]
      })
      .await?;
    Ok(created)
  }

  pub async fn move_task(&self, task_id: &str, status: TaskStatus) -> Result<Task, WorkspaceError> {
    let tasks_key = QueryKey::project_tasks(&self.project_id);
    let update = TaskUpdate::status(status);
    let moved = self
      .runner
      .run(
        "move_task",
        self.api.update_task(&self.project_id, task_id, &update),
        move |_| vec![tasks_key],
      )
      .await?;
    Ok(moved)
  }

  pub async fn delete_task(&self, task_id: &str) -> Result<(), WorkspaceError> {
    let tasks_key = QueryKey::project_tasks(&self.project_id);
    self
      .runner
      .run(
        "delete_task",
        self.api.delete_task(&self.project_id, task_id),
        move |_| vec![tasks_key],
      )
      .await?;
    Ok(())
  }

  pub async fn add_comment(&self, task_id: &str, text: &str) -> Result<Comment, WorkspaceError> {
    let comments_key = QueryKey::task_comments(&self.project_id, task_id);
    let comment = self
      .runner
      .run(
        "add_comment",
        self.api.create_comment(&self.project_id, task_id, text),
        move |_| vec![comments_key],
      )
      .await?;
    Ok(comment)
  }

  pub async fn delete_comment(&self, task_id: &str, comment_id: &str) -> Result<(), WorkspaceError> {
    let comments_key = QueryKey::task_comments(&self.project_id, task_id);
    self
      .runner
      .run(
        "delete_comment",
        self.api.delete_comment(&self.project_id, task_id, comment_id),
        move |_| vec![comments_key],
      )
      .await?;
    Ok(())
  }

  pub async fn send_message(&self, text: &str) -> Result<ChatMessage, WorkspaceError> {
    let chat_key = QueryKey::project_chat(&self.project_id);
    let sent = self
      .runner
      .run("send_message", self.api.send_message(&self.project_id, text), move |_| {
        vec![chat_key]
      })
      .await?;
    Ok(sent)
  }

  /// Membership lives on the project record, so that is what gets re-fetched
  pub async fn invite_members(&self, invite: &InviteRequest) -> Result<(), WorkspaceError> {
    let project_key = QueryKey::project(&self.project_id);
    self
      .runner
      .run(
        "invite_members",
        self.api.invite_members(&self.project_id, invite),
        move |_| vec![project_key],
      )
      .await?;
    Ok(())
  }
}

pub struct ProjectWorkspace<A: ProjectApi> {
  actions: WorkspaceActions<A>,
  binder: QueryBinder,
  options: QueryOptions,
  current_user: Option<User>,
  selection: SelectionController,
  project: QueryHandle<Project>,
  tasks: QueryHandle<Vec<Task>>,
  chat: QueryHandle<Vec<ChatMessage>>,
  comments: Option<QueryHandle<Vec<Comment>>>,
  listener: Option<Listener>,
  subscriptions: Vec<Subscription>,
  comments_subscription: Option<Subscription>,
}

impl<A: ProjectApi> ProjectWorkspace<A> {
  /// Start observing a project's record, tasks and chat. Nothing is
  /// selected, so comments are not fetched yet.
  pub fn open(
    api: A,
    binder: QueryBinder,
    project_id: impl Into<String>,
    options: QueryOptions,
    current_user: Option<User>,
  ) -> Self {
    let project_id = project_id.into();
    info!(project = %project_id, "opening project workspace");

    let project = {
      let (api, id) = (api.clone(), project_id.clone());
      binder.use_query(QueryKey::project(&project_id), options, move || {
        let (api, id) = (api.clone(), id.clone());
        async move { api.get_project(&id).await }
      })
    };
    let tasks = {
      let (api, id) = (api.clone(), project_id.clone());
      binder.use_query(QueryKey::project_tasks(&project_id), options, move || {
        let (api, id) = (api.clone(), id.clone());
        async move { api.list_tasks(&id).await }
      })
    };
    let chat = {
      let (api, id) = (api.clone(), project_id.clone());
      binder.use_query(QueryKey::project_chat(&project_id), options, move || {
        let (api, id) = (api.clone(), id.clone());
        async move { api.list_chat(&id).await }
      })
    };

    Self {
      actions: WorkspaceActions {
        project_id: project_id.clone(),
        api,
        runner: MutationRunner::new(binder.clone()),
      },
      binder,
      options,
      current_user,
      selection: SelectionController::new(project_id),
      project,
      tasks,
      chat,
      comments: None,
      listener: None,
      subscriptions: Vec::new(),
      comments_subscription: None,
    }
  }

  pub fn project_id(&self) -> &str {
    &self.actions.project_id
  }

  pub fn selection(&self) -> &Selection {
    self.selection.selection()
  }

  pub fn selected_task_id(&self) -> Option<&str> {
    self.selection.selected_task_id()
  }

  /// Switch the comments panel to `task_id`, or close it with `None`.
  ///
  /// The previous task's comments stay cached, so switching back within the
  /// stale window shows them without a fetch.
  pub fn select(&mut self, task_id: Option<&str>) -> SelectionChange {
    let change = self.selection.select(task_id);
    if change.is_noop() {
      return change;
    }
    debug!(from = ?change.disabled, to = ?change.enabled, "task selection changed");

    self.comments_subscription = None;
    self.comments = None;
    if let Some(task_id) = self.selection.selected_task_id() {
      let (api, project_id, task_id) = (
        self.actions.api.clone(),
        self.project_id().to_string(),
        task_id.to_string(),
      );
      let key = QueryKey::task_comments(&project_id, &task_id);
      let handle = self.binder.use_query(key.clone(), self.options, move || {
        let (api, project_id, task_id) = (api.clone(), project_id.clone(), task_id.clone());
        async move { api.list_comments(&project_id, &task_id).await }
      });
      self.comments = Some(handle);
      if let Some(listener) = &self.listener {
        self.comments_subscription = Some(self.binder.store().subscribe(&key, Arc::clone(listener)));
      }
    }
    change
  }

  /// Call `listener` on every cache change to one of this page's keys.
  /// Replaces a previously registered listener.
  pub fn on_change(&mut self, listener: Listener) {
    let store = self.binder.store();
    self.subscriptions = [self.project.key(), self.tasks.key(), self.chat.key()]
      .into_iter()
      .map(|key| store.subscribe(key, Arc::clone(&listener)))
      .collect();
    self.comments_subscription = self
      .comments
      .as_ref()
      .map(|comments| store.subscribe(comments.key(), Arc::clone(&listener)));
    self.listener = Some(listener);
  }

  pub fn snapshot(&self) -> WorkspaceSnapshot {
    let project = self.project.state();
    let tasks = self.tasks.state();
    let chat = self.chat.state();
    let comments = self.comments.as_ref().map(|c| c.state());

    let error = [
      (self.project.key(), project.error.clone()),
      (self.tasks.key(), tasks.error.clone()),
      (self.chat.key(), chat.error.clone()),
    ]
    .into_iter()
    .find_map(|(key, error)| {
      error.map(|error| PageError {
        key: key.clone(),
        error,
      })
    });

    let is_loading = project.is_loading() || tasks.is_loading() || chat.is_loading();
    let is_fetching = project.is_fetching() || tasks.is_fetching() || chat.is_fetching();
    let comments_loading = comments.as_ref().is_some_and(|c| c.is_loading());

    let tasks = tasks.data.unwrap_or_default();
    let selected_task = self
      .selection
      .selected_task_id()
      .and_then(|id| tasks.iter().find(|t| t.id == id).cloned());

    let mut chat_messages = chat.data.unwrap_or_default();
    chat_messages.sort_by_key(|m| m.timestamp);

    WorkspaceSnapshot {
      project: project.data,
      tasks,
      chat_messages,
      comments: comments.and_then(|c| c.data).unwrap_or_default(),
      selected_task,
      is_loading,
      is_fetching,
      comments_loading,
      error,
    }
  }

  pub fn is_own_message(&self, message: &ChatMessage) -> bool {
    self
      .current_user
      .as_ref()
      .is_some_and(|user| message.is_from(user))
  }

  /// Re-fetch every active query
  pub fn refresh(&self) {
    info!(project = %self.project_id(), "manual refresh");
    self.project.refetch();
    self.tasks.refetch();
    self.chat.refetch();
    if let Some(comments) = &self.comments {
      comments.refetch();
    }
  }

  /// Wait until the fetches currently in flight have landed.
  pub async fn settled(&self) {
    self.project.settled().await;
    self.tasks.settled().await;
    self.chat.settled().await;
    if let Some(comments) = &self.comments {
      comments.settled().await;
    }
  }

  pub fn actions(&self) -> WorkspaceActions<A> {
    self.actions.clone()
  }

  pub async fn create_task(&self, task: NewTask) -> Result<Task, WorkspaceError> {
    self.actions.create_task(task).await
  }

  pub async fn move_task(&self, task_id: &str, status: TaskStatus) -> Result<Task, WorkspaceError> {
    self.actions.move_task(task_id, status).await
  }

  /// Delete a task, closing its comments first if it is the selected one
  pub async fn delete_task(&mut self, task_id: &str) -> Result<(), WorkspaceError> {
    if self.selected_task_id() == Some(task_id) {
      self.select(None);
    }
    self.actions.delete_task(task_id).await
  }

  /// Comment on the selected task
  pub async fn add_comment(&self, text: &str) -> Result<Comment, WorkspaceError> {
    let task_id = self
      .selection
      .selected_task_id()
      .ok_or(WorkspaceError::NoTaskSelected)?;
    self.actions.add_comment(task_id, text).await
  }

  pub async fn delete_comment(&self, comment_id: &str) -> Result<(), WorkspaceError> {
    let task_id = self
      .selection
      .selected_task_id()
      .ok_or(WorkspaceError::NoTaskSelected)?;
    self.actions.delete_comment(task_id, comment_id).await
  }

  pub async fn send_message(&self, text: &str) -> Result<ChatMessage, WorkspaceError> {
    self.actions.send_message(text).await
  }

  pub async fn invite_member(&self, invite: &InviteRequest) -> Result<(), WorkspaceError> {
    self.actions.invite_members(invite).await
  }
}

impl<A: ProjectApi> Drop for ProjectWorkspace<A> {
  fn drop(&mut self) {
    let project_id = self.actions.project_id.clone();
    let evicted = self
      .binder
      .store()
      .evict(|key| key.project_id() == Some(project_id.as_str()));
    debug!(project = %project_id, evicted, "closed project workspace");
  }
}
