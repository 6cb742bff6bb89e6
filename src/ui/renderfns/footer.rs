use ratatui::prelude::*;
use ratatui::widgets::Paragraph;

use crate::app::{Notification, NotificationLevel};

/// Draw the footer bar: view breadcrumb on the left, the current
/// notification (if any) after it
pub fn draw_footer(frame: &mut Frame, area: Rect, breadcrumb: &[String], notification: Option<&Notification>) {
  let mut spans = vec![Span::raw(" ")];

  for (i, part) in breadcrumb.iter().enumerate() {
    if i > 0 {
      spans.push(Span::styled(" > ", Style::default().fg(Color::DarkGray)));
    }
    let style = if i == breadcrumb.len() - 1 {
      Style::default().fg(Color::Cyan).bold()
    } else {
      Style::default().fg(Color::White)
    };
    spans.push(Span::styled(part.clone(), style));
  }

  if let Some(notification) = notification {
    let color = match notification.level {
      NotificationLevel::Info => Color::Green,
      NotificationLevel::Error => Color::Red,
    };
    spans.push(Span::styled("   │ ", Style::default().fg(Color::DarkGray)));
    spans.push(Span::styled(notification.message.clone(), Style::default().fg(color)));
  }

  let paragraph = Paragraph::new(Line::from(spans)).style(Style::default().bg(Color::Black));
  frame.render_widget(paragraph, area);
}
