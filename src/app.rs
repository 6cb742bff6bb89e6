use crate::api::types::User;
use crate::api::ProjectApi;
use crate::cache::CacheStore;
use crate::config::Config;
use crate::event::{ActionKind, ActionOutcome, Event, EventHandler};
use crate::query::{QueryBinder, QueryOptions};
use crate::ui;
use crate::ui::renderfns::extract_domain;
use crate::ui::view::{Shortcut, View, ViewAction};
use crate::ui::views::{ProjectListView, ProjectView};
use crate::workspace::WorkspaceError;
use color_eyre::Result;
use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};
use crossterm::terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen};
use crossterm::ExecutableCommand;
use ratatui::prelude::*;
use std::future::Future;
use std::io::stdout;
use std::time::{Duration, Instant};
use tokio::sync::mpsc;
use tracing::{debug, error, info};

/// Shared by every view: the API, the one query binder, and a way back into
/// the event loop
#[derive(Clone)]
pub struct AppContext<A> {
  pub api: A,
  pub binder: QueryBinder,
  pub options: QueryOptions,
  pub current_user: Option<User>,
  pub events: mpsc::UnboundedSender<Event>,
}

impl<A: ProjectApi> AppContext<A> {
  /// Run a write in the background; its outcome comes back as `Event::Action`
  pub fn spawn_action<T, Fut>(&self, kind: ActionKind, action: Fut)
  where
    T: Send + 'static,
    Fut: Future<Output = Result<T, WorkspaceError>> + Send + 'static,
  {
    let tx = self.events.clone();
    tokio::spawn(async move {
      let result = action.await;
      let _ = tx.send(Event::Action(ActionOutcome::new(kind, result)));
    });
  }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NotificationLevel {
  Info,
  Error,
}

/// Transient status bar message
#[derive(Debug, Clone)]
pub struct Notification {
  pub message: String,
  pub level: NotificationLevel,
  /// `None` stays until replaced
  expires_at: Option<Instant>,
}

impl Notification {
  pub fn info(message: impl Into<String>) -> Self {
    Self {
      message: message.into(),
      level: NotificationLevel::Info,
      expires_at: Some(Instant::now() + Duration::from_secs(3)),
    }
  }

  pub fn error(message: impl Into<String>) -> Self {
    Self {
      message: message.into(),
      level: NotificationLevel::Error,
      expires_at: Some(Instant::now() + Duration::from_secs(8)),
    }
  }

  pub fn sticky_error(message: impl Into<String>) -> Self {
    Self {
      message: message.into(),
      level: NotificationLevel::Error,
      expires_at: None,
    }
  }

  pub fn is_expired(&self, now: Instant) -> bool {
    self.expires_at.is_some_and(|at| now >= at)
  }

  pub fn is_sticky(&self) -> bool {
    self.expires_at.is_none()
  }
}

/// What to tell the user about a finished write
pub fn notification_for(outcome: &ActionOutcome) -> Notification {
  match &outcome.result {
    Ok(()) => Notification::info(outcome.kind.success_message()),
    Err(e) if e.is_session_terminal() => Notification::sticky_error(e.to_string()),
    Err(e) => Notification::error(format!("{}: {}", outcome.kind.failure_prefix(), e)),
  }
}

/// Main application state
pub struct App {
  /// Header title: configured, or the API host
  title: String,

  /// Navigation stack - root is always at index 0
  view_stack: Vec<Box<dyn View>>,

  notification: Option<Notification>,

  events: EventHandler,

  should_quit: bool,
}

impl App {
  /// Must be called from within the tokio runtime.
  pub fn new<A: ProjectApi>(config: &Config, api: A) -> Self {
    let events = EventHandler::new(Duration::from_millis(250));
    let ctx = AppContext {
      api,
      binder: QueryBinder::new(CacheStore::new()),
      options: QueryOptions::default().with_stale_time(config.query.stale_time()),
      current_user: config.user.clone(),
      events: events.sender(),
    };

    let mut view_stack: Vec<Box<dyn View>> = vec![Box::new(ProjectListView::new(ctx.clone()))];
    if let Some(project_id) = &config.default_project {
      view_stack.push(Box::new(ProjectView::open(ctx.clone(), project_id.clone())));
    }

    let title = config
      .title
      .clone()
      .unwrap_or_else(|| extract_domain(&config.api.url).to_string());

    let notification = config
      .user
      .is_none()
      .then(|| Notification::error("No user configured; chat ownership is unavailable"));

    Self {
      title,
      view_stack,
      notification,
      events,
      should_quit: false,
    }
  }

  pub async fn run(&mut self) -> Result<()> {
    // Setup terminal
    enable_raw_mode()?;
    stdout().execute(EnterAlternateScreen)?;
    let mut terminal = Terminal::new(CrosstermBackend::new(stdout()))?;

    let result = self.event_loop(&mut terminal).await;

    // Restore the terminal even if the loop failed
    disable_raw_mode()?;
    stdout().execute(LeaveAlternateScreen)?;
    terminal.show_cursor()?;

    result
  }

  async fn event_loop(&mut self, terminal: &mut Terminal<CrosstermBackend<std::io::Stdout>>) -> Result<()> {
    while !self.should_quit {
      terminal.draw(|frame| ui::draw(frame, self))?;

      match self.events.next().await {
        Some(event) => self.handle_event(event),
        None => break,
      }
    }
    info!("event loop finished");
    Ok(())
  }

  fn handle_event(&mut self, event: Event) {
    match event {
      Event::Key(key) => self.handle_key(key),
      Event::Tick => {
        if self
          .notification
          .as_ref()
          .is_some_and(|n| n.is_expired(Instant::now()))
        {
          self.notification = None;
        }
      }
      // Redraw happens at the top of the loop
      Event::CacheUpdated => {}
      Event::Action(outcome) => self.handle_action(outcome),
    }
  }

  fn handle_key(&mut self, key: KeyEvent) {
    if key.code == KeyCode::Char('c') && key.modifiers.contains(KeyModifiers::CONTROL) {
      self.should_quit = true;
      return;
    }

    let action = match self.view_stack.last_mut() {
      Some(view) => view.handle_key(key),
      None => ViewAction::Pop,
    };

    match action {
      ViewAction::None => {}
      ViewAction::Push(view) => {
        debug!(view = %view.breadcrumb_label(), "push view");
        self.view_stack.push(view);
      }
      ViewAction::Pop => {
        self.view_stack.pop();
        if self.view_stack.is_empty() {
          self.should_quit = true;
        }
      }
    }
  }

  fn handle_action(&mut self, outcome: ActionOutcome) {
    let notification = notification_for(&outcome);
    if let Err(e) = &outcome.result {
      if e.is_session_terminal() {
        error!(action = ?outcome.kind, "session expired");
      }
    }

    // A sticky session error is not replaced by later outcomes
    if !self.notification.as_ref().is_some_and(|n| n.is_sticky()) {
      self.notification = Some(notification);
    }
    if let Some(view) = self.view_stack.last_mut() {
      view.on_action(&outcome);
    }
  }

  // Accessors for UI rendering

  pub fn title(&self) -> &str {
    &self.title
  }

  pub fn current_view_mut(&mut self) -> Option<&mut Box<dyn View>> {
    self.view_stack.last_mut()
  }

  pub fn current_project(&self) -> Option<String> {
    self.view_stack.last().and_then(|v| v.project())
  }

  pub fn shortcuts(&self) -> Vec<Shortcut> {
    self
      .view_stack
      .last()
      .map(|v| v.shortcuts())
      .unwrap_or_default()
  }

  pub fn view_breadcrumb(&self) -> Vec<String> {
    self
      .view_stack
      .iter()
      .map(|v| v.breadcrumb_label())
      .collect()
  }

  pub fn notification(&self) -> Option<&Notification> {
    self.notification.as_ref()
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::api::ApiError;

  #[test]
  fn test_success_notification_expires() {
    let outcome = ActionOutcome::new(ActionKind::AddComment, Ok::<_, WorkspaceError>(()));
    let notification = notification_for(&outcome);

    assert_eq!(notification.level, NotificationLevel::Info);
    assert_eq!(notification.message, "Comment added");
    assert!(!notification.is_expired(Instant::now()));
    assert!(notification.is_expired(Instant::now() + Duration::from_secs(10)));
  }

  #[test]
  fn test_failure_notification_names_action() {
    let outcome = ActionOutcome::new::<()>(
      ActionKind::CreateTask,
      Err(WorkspaceError::Api(ApiError::ValidationRejected {
        message: Some("title is required".to_string()),
      })),
    );
    let notification = notification_for(&outcome);

    assert_eq!(notification.level, NotificationLevel::Error);
    assert_eq!(notification.message, "Could not create task: title is required");
  }

  #[test]
  fn test_session_expiry_is_sticky() {
    let outcome = ActionOutcome::new::<()>(
      ActionKind::SendMessage,
      Err(WorkspaceError::Api(ApiError::Unauthorized)),
    );
    let notification = notification_for(&outcome);

    assert!(notification.is_sticky());
    assert!(!notification.is_expired(Instant::now() + Duration::from_secs(3600)));
  }

  #[test]
  fn test_no_selection_error_message() {
    let outcome = ActionOutcome::new::<()>(ActionKind::AddComment, Err(WorkspaceError::NoTaskSelected));
    assert_eq!(
      notification_for(&outcome).message,
      "Could not add comment: no task is selected"
    );
  }
}
