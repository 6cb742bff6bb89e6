use chrono::{DateTime, Local, Utc};
use ratatui::prelude::Color;

use crate::api::types::{ProjectStatus, TaskPriority, TaskStatus};

/// Truncate to at most `max_len` characters, ending in "..." when cut
pub fn truncate(s: &str, max_len: usize) -> String {
  if s.chars().count() <= max_len {
    s.to_string()
  } else {
    let kept: String = s.chars().take(max_len.saturating_sub(3)).collect();
    format!("{}...", kept)
  }
}

pub fn task_status_color(status: TaskStatus) -> Color {
  match status {
    TaskStatus::Todo => Color::White,
    TaskStatus::InProgress => Color::Yellow,
    TaskStatus::Done => Color::Green,
  }
}

pub fn priority_color(priority: TaskPriority) -> Color {
  match priority {
    TaskPriority::Low => Color::DarkGray,
    TaskPriority::Medium => Color::Blue,
    TaskPriority::High => Color::Red,
  }
}

pub fn project_status_color(status: ProjectStatus) -> Color {
  match status {
    ProjectStatus::Active => Color::Green,
    ProjectStatus::Completed => Color::Cyan,
    ProjectStatus::OnHold => Color::Yellow,
    ProjectStatus::Archived => Color::DarkGray,
  }
}

/// Short local time for chat and comment lines
pub fn format_timestamp(at: &DateTime<Utc>) -> String {
  at.with_timezone(&Local).format("%b %d %H:%M").to_string()
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_truncate_short_string() {
    assert_eq!(truncate("hello", 10), "hello");
    assert_eq!(truncate("hello", 5), "hello");
  }

  #[test]
  fn test_truncate_long_string() {
    assert_eq!(truncate("hello world", 8), "hello...");
  }

  #[test]
  fn test_truncate_counts_characters() {
    assert_eq!(truncate("ééééé", 4), "é...");
  }

  #[test]
  fn test_status_colors() {
    assert_eq!(task_status_color(TaskStatus::Done), Color::Green);
    assert_eq!(task_status_color(TaskStatus::InProgress), Color::Yellow);
    assert_eq!(priority_color(TaskPriority::High), Color::Red);
    assert_eq!(project_status_color(ProjectStatus::Archived), Color::DarkGray);
  }
}
