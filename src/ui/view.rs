use crossterm::event::KeyEvent;
use ratatui::prelude::*;

use crate::event::ActionOutcome;

/// A keyboard shortcut hint for display in the header
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Shortcut {
  pub key: &'static str,
  pub label: &'static str,
  pub priority: u8, // Lower = shown first
}

impl Shortcut {
  pub const fn new(key: &'static str, label: &'static str) -> Self {
    Self {
      key,
      label,
      priority: 100,
    }
  }

  pub const fn with_priority(mut self, priority: u8) -> Self {
    self.priority = priority;
    self
  }
}

/// Actions that a view can request in response to user input
pub enum ViewAction {
  /// No action needed
  None,
  /// Push a new view onto the stack
  Push(Box<dyn View>),
  /// Pop current view from stack (go back); popping the root quits
  Pop,
}

/// Trait for view behavior
///
/// Views own their workspace or directory, handle their own input modes
/// (composers, focus) and return actions for the App to execute:
/// App → View → Components
pub trait View {
  /// Handle a key event, returning an action for App to execute
  fn handle_key(&mut self, key: KeyEvent) -> ViewAction;

  /// Render the view to the frame
  fn render(&mut self, frame: &mut Frame, area: Rect);

  /// Get the breadcrumb label for this view
  fn breadcrumb_label(&self) -> String;

  /// Name of the project this view shows, for the header
  fn project(&self) -> Option<String> {
    None
  }

  /// A write this view spawned has finished
  fn on_action(&mut self, _outcome: &ActionOutcome) {}

  /// Get keyboard shortcuts to display in the header
  fn shortcuts(&self) -> Vec<Shortcut> {
    vec![
      Shortcut::new("r", "refresh").with_priority(20),
      Shortcut::new("q", "back").with_priority(30),
    ]
  }
}
