use ratatui::prelude::*;
use ratatui::widgets::Paragraph;

use crate::ui::view::Shortcut;

/// Draw the header bar with logo, context, and the active view's shortcuts
pub fn draw_header(frame: &mut Frame, area: Rect, title: &str, project: Option<&str>, shortcuts: &[Shortcut]) {
  let mut spans = vec![
    Span::styled(" pstack ", Style::default().fg(Color::Cyan).bold()),
    Span::styled("│", Style::default().fg(Color::DarkGray)),
    Span::styled(format!(" {} ", title), Style::default().fg(Color::White)),
  ];
  if let Some(project) = project {
    spans.push(Span::styled("│", Style::default().fg(Color::DarkGray)));
    spans.push(Span::styled(
      format!(" {} ", project),
      Style::default().fg(Color::Yellow).bold(),
    ));
  }
  spans.push(Span::raw("  "));

  let mut shortcuts = shortcuts.to_vec();
  shortcuts.sort_by_key(|s| s.priority);
  for shortcut in shortcuts {
    spans.push(Span::styled(
      format!("<{}>", shortcut.key),
      Style::default().fg(Color::Cyan),
    ));
    spans.push(Span::styled(
      format!(" {}   ", shortcut.label),
      Style::default().fg(Color::DarkGray),
    ));
  }

  let paragraph = Paragraph::new(Line::from(spans)).style(Style::default().bg(Color::Black));
  frame.render_widget(paragraph, area);
}

/// Host part of the API URL, shown when no title is configured
pub fn extract_domain(url: &str) -> &str {
  url
    .strip_prefix("https://")
    .or_else(|| url.strip_prefix("http://"))
    .unwrap_or(url)
    .split('/')
    .next()
    .unwrap_or(url)
}
