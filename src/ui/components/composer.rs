use super::input::{InputResult, TextInput};
use crate::event::ActionKind;
use crossterm::event::KeyEvent;
use ratatui::prelude::*;
use ratatui::widgets::{Block, Borders, Paragraph};

/// What a composer's text becomes when submitted
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ComposerTarget {
  NewProject,
  RenameProject,
  NewTask,
  Comment,
  ChatMessage,
  /// Comma separated email addresses
  Invite,
}

impl ComposerTarget {
  pub fn title(self) -> &'static str {
    match self {
      ComposerTarget::NewProject => "New project name",
      ComposerTarget::RenameProject => "Rename project",
      ComposerTarget::NewTask => "New task title",
      ComposerTarget::Comment => "Comment",
      ComposerTarget::ChatMessage => "Message",
      ComposerTarget::Invite => "Invite (emails, comma separated)",
    }
  }

  pub fn action(self) -> ActionKind {
    match self {
      ComposerTarget::NewProject => ActionKind::CreateProject,
      ComposerTarget::RenameProject => ActionKind::RenameProject,
      ComposerTarget::NewTask => ActionKind::CreateTask,
      ComposerTarget::Comment => ActionKind::AddComment,
      ComposerTarget::ChatMessage => ActionKind::SendMessage,
      ComposerTarget::Invite => ActionKind::InviteMembers,
    }
  }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ComposerEvent {
  /// Trimmed, non-empty text to send
  Submit(String),
  Closed,
}

/// A text input bound to one write.
///
/// The text survives a failed submission so the user can fix it and retry;
/// it is cleared only by `finish(true)`.
#[derive(Debug, Clone)]
pub struct Composer {
  target: ComposerTarget,
  input: TextInput,
  submitting: bool,
}

impl Composer {
  pub fn new(target: ComposerTarget) -> Self {
    Self {
      target,
      input: TextInput::new(),
      submitting: false,
    }
  }

  pub fn target(&self) -> ComposerTarget {
    self.target
  }

  pub fn value(&self) -> &str {
    self.input.value()
  }

  pub fn is_submitting(&self) -> bool {
    self.submitting
  }

  pub fn handle_key(&mut self, key: KeyEvent) -> Option<ComposerEvent> {
    if self.submitting {
      return None;
    }
    match self.input.handle_key(key) {
      InputResult::Submitted(text) => {
        let text = text.trim();
        if text.is_empty() {
          return None;
        }
        self.submitting = true;
        Some(ComposerEvent::Submit(text.to_string()))
      }
      InputResult::Cancelled => Some(ComposerEvent::Closed),
      InputResult::Consumed | InputResult::NotHandled => None,
    }
  }

  /// Record the outcome of the submission; true means the composer is done.
  pub fn finish(&mut self, succeeded: bool) -> bool {
    self.submitting = false;
    if succeeded {
      self.input.clear();
    }
    succeeded
  }

  pub fn render(&self, frame: &mut Frame, area: Rect) {
    let title = if self.submitting {
      format!(" {} (sending...) ", self.target.title())
    } else {
      format!(" {} (Enter: send, Esc: close) ", self.target.title())
    };
    let block = Block::default()
      .title(title)
      .borders(Borders::ALL)
      .border_style(Style::default().fg(Color::Yellow));

    let paragraph = Paragraph::new(self.input.value()).block(block);
    frame.render_widget(paragraph, area);

    if !self.submitting {
      let x = area.x + 1 + self.input.cursor_position() as u16;
      frame.set_cursor_position((x.min(area.right().saturating_sub(2)), area.y + 1));
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crossterm::event::{KeyCode, KeyModifiers};

  fn key(code: KeyCode) -> KeyEvent {
    KeyEvent::new(code, KeyModifiers::NONE)
  }

  fn type_text(composer: &mut Composer, text: &str) {
    for c in text.chars() {
      composer.handle_key(key(KeyCode::Char(c)));
    }
  }

  #[test]
  fn test_blank_text_is_not_submitted() {
    let mut composer = Composer::new(ComposerTarget::Comment);
    type_text(&mut composer, "  ");
    assert_eq!(composer.handle_key(key(KeyCode::Enter)), None);
    assert!(!composer.is_submitting());
  }

  #[test]
  fn test_failed_submission_keeps_text() {
    let mut composer = Composer::new(ComposerTarget::ChatMessage);
    type_text(&mut composer, " hello ");
    assert_eq!(
      composer.handle_key(key(KeyCode::Enter)),
      Some(ComposerEvent::Submit("hello".to_string()))
    );

    // Typing is ignored while the request is out
    type_text(&mut composer, "x");
    assert_eq!(composer.value(), " hello ");

    assert!(!composer.finish(false));
    assert_eq!(composer.value(), " hello ");
    assert!(!composer.is_submitting());
  }

  #[test]
  fn test_successful_submission_clears() {
    let mut composer = Composer::new(ComposerTarget::NewTask);
    type_text(&mut composer, "Write docs");
    composer.handle_key(key(KeyCode::Enter));

    assert!(composer.finish(true));
    assert_eq!(composer.value(), "");
  }

  #[test]
  fn test_escape_closes() {
    let mut composer = Composer::new(ComposerTarget::Invite);
    assert_eq!(composer.handle_key(key(KeyCode::Esc)), Some(ComposerEvent::Closed));
    assert_eq!(composer.target().action(), ActionKind::InviteMembers);
  }
}
