use crossterm::event::{self, Event as CrosstermEvent, KeyEvent, KeyEventKind};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::{trace, warn};

use crate::cache::{CacheEntry, Listener, QueryKey};
use crate::workspace::WorkspaceError;

/// Application events
#[derive(Debug)]
pub enum Event {
  /// Terminal key press
  Key(KeyEvent),
  /// Periodic tick for expiring notifications
  Tick,
  /// An observed cache entry changed; redraw
  CacheUpdated,
  /// A spawned write finished
  Action(ActionOutcome),
}

/// Writes the UI can trigger
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActionKind {
  CreateProject,
  RenameProject,
  DeleteProject,
  CreateTask,
  MoveTask,
  DeleteTask,
  AddComment,
  DeleteComment,
  SendMessage,
  InviteMembers,
}

impl ActionKind {
  pub fn success_message(self) -> &'static str {
    match self {
      ActionKind::CreateProject => "Project created",
      ActionKind::RenameProject => "Project renamed",
      ActionKind::DeleteProject => "Project deleted",
      ActionKind::CreateTask => "Task created",
      ActionKind::MoveTask => "Task moved",
      ActionKind::DeleteTask => "Task deleted",
      ActionKind::AddComment => "Comment added",
      ActionKind::DeleteComment => "Comment deleted",
      ActionKind::SendMessage => "Message sent",
      ActionKind::InviteMembers => "Invitations sent",
    }
  }

  pub fn failure_prefix(self) -> &'static str {
    match self {
      ActionKind::CreateProject => "Could not create project",
      ActionKind::RenameProject => "Could not rename project",
      ActionKind::DeleteProject => "Could not delete project",
      ActionKind::CreateTask => "Could not create task",
      ActionKind::MoveTask => "Could not move task",
      ActionKind::DeleteTask => "Could not delete task",
      ActionKind::AddComment => "Could not add comment",
      ActionKind::DeleteComment => "Could not delete comment",
      ActionKind::SendMessage => "Could not send message",
      ActionKind::InviteMembers => "Could not send invitations",
    }
  }
}

#[derive(Debug)]
pub struct ActionOutcome {
  pub kind: ActionKind,
  pub result: Result<(), WorkspaceError>,
}

impl ActionOutcome {
  pub fn new<T>(kind: ActionKind, result: Result<T, WorkspaceError>) -> Self {
    Self {
      kind,
      result: result.map(|_| ()),
    }
  }

  pub fn is_ok(&self) -> bool {
    self.result.is_ok()
  }
}

/// Event handler that produces events from terminal input, a tick timer and
/// anything holding a `sender()`
pub struct EventHandler {
  tx: mpsc::UnboundedSender<Event>,
  rx: mpsc::UnboundedReceiver<Event>,
}

impl EventHandler {
  /// Create a new event handler with the given tick rate
  pub fn new(tick_rate: Duration) -> Self {
    let (tx, rx) = mpsc::unbounded_channel();

    // Terminal reads block, so they get their own thread and the runtime
    // stays free for fetches
    let input_tx = tx.clone();
    std::thread::spawn(move || loop {
      match event::poll(Duration::from_millis(100)) {
        Ok(true) => match event::read() {
          Ok(CrosstermEvent::Key(key)) if key.kind == KeyEventKind::Press => {
            if input_tx.send(Event::Key(key)).is_err() {
              break;
            }
          }
          Ok(_) => {}
          Err(e) => {
            warn!(error = %e, "terminal read failed");
            break;
          }
        },
        Ok(false) => {
          if input_tx.is_closed() {
            break;
          }
        }
        Err(e) => {
          warn!(error = %e, "terminal poll failed");
          break;
        }
      }
    });

    let tick_tx = tx.clone();
    tokio::spawn(async move {
      let mut interval = tokio::time::interval(tick_rate);
      loop {
        interval.tick().await;
        if tick_tx.send(Event::Tick).is_err() {
          break;
        }
      }
    });

    Self { tx, rx }
  }

  pub fn sender(&self) -> mpsc::UnboundedSender<Event> {
    self.tx.clone()
  }

  /// Receive the next event
  pub async fn next(&mut self) -> Option<Event> {
    self.rx.recv().await
  }
}

/// A cache listener that wakes the event loop
pub fn cache_listener(tx: mpsc::UnboundedSender<Event>) -> Listener {
  Arc::new(move |key: &QueryKey, entry: &CacheEntry| {
    trace!(%key, status = ?entry.status, "cache entry changed");
    let _ = tx.send(Event::CacheUpdated);
  })
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::api::ApiError;

  #[test]
  fn test_cache_listener_wakes_loop() {
    let (tx, mut rx) = mpsc::unbounded_channel();
    let listener = cache_listener(tx);

    listener(&QueryKey::Projects, &CacheEntry::default());

    assert!(matches!(rx.try_recv(), Ok(Event::CacheUpdated)));
  }

  #[test]
  fn test_outcome_drops_value() {
    let ok = ActionOutcome::new(ActionKind::SendMessage, Ok::<_, WorkspaceError>(42));
    assert!(ok.is_ok());

    let failed = ActionOutcome::new::<()>(
      ActionKind::AddComment,
      Err(WorkspaceError::Api(ApiError::Unauthorized)),
    );
    assert!(!failed.is_ok());
    assert_eq!(failed.kind.failure_prefix(), "Could not add comment");
  }
}
