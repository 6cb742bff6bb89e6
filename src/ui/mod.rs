pub mod components;
pub mod renderfns;
pub mod view;
pub mod views;

use crate::app::App;
use ratatui::prelude::*;
use ratatui::widgets::ListState;
use renderfns::{draw_footer, draw_header};

/// Main draw function
pub fn draw(frame: &mut Frame, app: &mut App) {
  let [header_area, content_area, footer_area] = Layout::vertical([
    Constraint::Length(1), // Header
    Constraint::Min(1),    // Main content
    Constraint::Length(1), // Breadcrumb and notifications
  ])
  .areas(frame.area());

  let project = app.current_project();
  let shortcuts = app.shortcuts();
  draw_header(frame, header_area, app.title(), project.as_deref(), &shortcuts);

  if let Some(view) = app.current_view_mut() {
    view.render(frame, content_area);
  }

  draw_footer(frame, footer_area, &app.view_breadcrumb(), app.notification());
}

/// Keep a list selection inside `0..len`, selecting the first row when
/// there is something to select
pub fn ensure_valid_selection(state: &mut ListState, len: usize) {
  match state.selected() {
    _ if len == 0 => state.select(None),
    None => state.select(Some(0)),
    Some(i) if i >= len => state.select(Some(len - 1)),
    Some(_) => {}
  }
}
