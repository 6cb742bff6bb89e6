use crate::api::api_types::{InviteRequest, NewTask};
use crate::api::types::{tasks_by_status, Task, TaskStatus, UserRole};
use crate::api::ProjectApi;
use crate::app::AppContext;
use crate::event::{cache_listener, ActionKind, ActionOutcome, Event};
use crate::ui::components::{Composer, ComposerEvent, ComposerTarget};
use crate::ui::ensure_valid_selection;
use crate::ui::renderfns::{format_timestamp, priority_color, project_status_color, task_status_color, truncate};
use crate::ui::view::{Shortcut, View, ViewAction};
use crate::workspace::{PageError, ProjectWorkspace, WorkspaceError, WorkspaceSnapshot};
use crossterm::event::{KeyCode, KeyEvent};
use ratatui::prelude::*;
use ratatui::widgets::{Block, Borders, List, ListItem, ListState, Paragraph, Wrap};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Pane {
  Board,
  Comments,
  Chat,
}

impl Pane {
  fn next(self) -> Self {
    match self {
      Pane::Board => Pane::Comments,
      Pane::Comments => Pane::Chat,
      Pane::Chat => Pane::Board,
    }
  }
}

/// One project: task board, comments for the selected task, and chat
pub struct ProjectView<A: ProjectApi> {
  ctx: AppContext<A>,
  workspace: ProjectWorkspace<A>,
  focus: Pane,
  column: usize,
  rows: [usize; 3],
  comment_state: ListState,
  composer: Option<Composer>,
}

impl<A: ProjectApi> ProjectView<A> {
  pub fn open(ctx: AppContext<A>, project_id: String) -> Self {
    let mut workspace = ProjectWorkspace::open(
      ctx.api.clone(),
      ctx.binder.clone(),
      project_id,
      ctx.options,
      ctx.current_user.clone(),
    );
    workspace.on_change(cache_listener(ctx.events.clone()));
    Self {
      ctx,
      workspace,
      focus: Pane::Board,
      column: 0,
      rows: [0; 3],
      comment_state: ListState::default(),
      composer: None,
    }
  }

  /// The task under the board cursor
  fn cursor_task(&self, snapshot: &WorkspaceSnapshot) -> Option<Task> {
    let columns = tasks_by_status(&snapshot.tasks);
    let (_, tasks) = columns.get(self.column)?;
    tasks.get(self.rows[self.column]).map(|t| (*t).clone())
  }

  fn move_cursor(&mut self, delta: isize, horizontal: bool) {
    if horizontal {
      let n = TaskStatus::ALL.len() as isize;
      self.column = (self.column as isize + delta).rem_euclid(n) as usize;
      return;
    }
    let snapshot = self.workspace.snapshot();
    let columns = tasks_by_status(&snapshot.tasks);
    let len = columns[self.column].1.len() as isize;
    if len > 0 {
      let row = &mut self.rows[self.column];
      *row = (*row as isize + delta).rem_euclid(len) as usize;
    }
  }

  fn report(&self, kind: ActionKind, error: WorkspaceError) {
    let _ = self
      .ctx
      .events
      .send(Event::Action(ActionOutcome::new::<()>(kind, Err(error))));
  }

  fn submit(&mut self, target: ComposerTarget, text: String) {
    let actions = self.workspace.actions();
    match target {
      ComposerTarget::NewTask => {
        self.ctx.spawn_action(ActionKind::CreateTask, async move {
          actions.create_task(NewTask::titled(text)).await
        });
      }
      ComposerTarget::Comment => match self.workspace.selected_task_id() {
        Some(task_id) => {
          let task_id = task_id.to_string();
          self.ctx.spawn_action(ActionKind::AddComment, async move {
            actions.add_comment(&task_id, &text).await
          });
        }
        None => self.report(ActionKind::AddComment, WorkspaceError::NoTaskSelected),
      },
      ComposerTarget::ChatMessage => {
        self.ctx.spawn_action(ActionKind::SendMessage, async move {
          actions.send_message(&text).await
        });
      }
      ComposerTarget::Invite => {
        let invite = InviteRequest::new(text.split(','), UserRole::Member);
        self.ctx.spawn_action(ActionKind::InviteMembers, async move {
          actions.invite_members(&invite).await
        });
      }
      ComposerTarget::NewProject | ComposerTarget::RenameProject => {}
    }
  }

  fn move_task(&self, forward: bool) {
    let snapshot = self.workspace.snapshot();
    let Some(task) = self.cursor_task(&snapshot) else {
      return;
    };
    let target = if forward {
      task.status.next()
    } else {
      task.status.previous()
    };
    if let Some(status) = target {
      let actions = self.workspace.actions();
      self.ctx.spawn_action(ActionKind::MoveTask, async move {
        actions.move_task(&task.id, status).await
      });
    }
  }

  fn delete_cursor_task(&mut self) {
    let snapshot = self.workspace.snapshot();
    let Some(task) = self.cursor_task(&snapshot) else {
      return;
    };
    if self.workspace.selected_task_id() == Some(task.id.as_str()) {
      self.workspace.select(None);
    }
    let actions = self.workspace.actions();
    self.ctx.spawn_action(ActionKind::DeleteTask, async move {
      actions.delete_task(&task.id).await
    });
  }

  fn delete_highlighted_comment(&self) {
    let snapshot = self.workspace.snapshot();
    let (Some(task_id), Some(index)) = (self.workspace.selected_task_id(), self.comment_state.selected()) else {
      return;
    };
    let Some(comment) = snapshot.comments.get(index) else {
      return;
    };
    let (actions, task_id, comment_id) = (self.workspace.actions(), task_id.to_string(), comment.id.clone());
    self.ctx.spawn_action(ActionKind::DeleteComment, async move {
      actions.delete_comment(&task_id, &comment_id).await
    });
  }

  fn render_error(&self, frame: &mut Frame, area: Rect, error: &PageError) {
    let message = if error.is_session_expired() {
      "Your session has expired. Sign in again and restart pstack.".to_string()
    } else if error.is_not_found() {
      "Project not found. Press 'q' to go back.".to_string()
    } else {
      format!("{}. Press 'r' to retry or 'q' to go back.", error)
    };
    let block = Block::default()
      .title(" Project ")
      .borders(Borders::ALL)
      .border_style(Style::default().fg(Color::Red));
    let paragraph = Paragraph::new(message)
      .block(block)
      .style(Style::default().fg(Color::Red))
      .wrap(Wrap { trim: true });
    frame.render_widget(paragraph, area);
  }

  fn render_summary(&self, frame: &mut Frame, area: Rect, snapshot: &WorkspaceSnapshot) {
    let Some(project) = &snapshot.project else {
      return;
    };
    let mut spans = vec![
      Span::styled(
        project.status.label(),
        Style::default().fg(project_status_color(project.status)),
      ),
      Span::styled("  │  ", Style::default().fg(Color::DarkGray)),
      Span::raw(format!("{} members", project.members.len())),
      Span::styled("  │  ", Style::default().fg(Color::DarkGray)),
      Span::raw(project.tech_stack.join(", ")),
    ];
    if snapshot.is_fetching {
      spans.push(Span::styled("  (refreshing)", Style::default().fg(Color::DarkGray)));
    }
    let block = Block::default()
      .title(format!(" {} ", project.name))
      .borders(Borders::ALL)
      .border_style(Style::default().fg(Color::Blue));
    frame.render_widget(Paragraph::new(Line::from(spans)).block(block), area);
  }

  fn render_board(&self, frame: &mut Frame, area: Rect, snapshot: &WorkspaceSnapshot) {
    let columns = tasks_by_status(&snapshot.tasks);
    let col_areas = Layout::horizontal([Constraint::Ratio(1, 3); 3]).split(area);
    let selected_id = self.workspace.selected_task_id();

    for (col_idx, (status, tasks)) in columns.iter().enumerate() {
      let is_cursor_column = self.focus == Pane::Board && col_idx == self.column;
      let border_color = if is_cursor_column {
        Color::Yellow
      } else {
        Color::Blue
      };
      let block = Block::default()
        .title(format!(" {} ({}) ", status.label(), tasks.len()))
        .title_alignment(Alignment::Center)
        .borders(Borders::ALL)
        .border_style(Style::default().fg(border_color));

      let width = col_areas[col_idx].width.saturating_sub(8) as usize;
      let items: Vec<ListItem> = tasks
        .iter()
        .map(|task| {
          let marker = if Some(task.id.as_str()) == selected_id {
            "● "
          } else {
            "  "
          };
          ListItem::new(Line::from(vec![
            Span::styled(marker, Style::default().fg(Color::Cyan)),
            Span::styled(
              task.priority.label().chars().next().unwrap_or(' ').to_string(),
              Style::default().fg(priority_color(task.priority)),
            ),
            Span::raw(" "),
            Span::styled(
              truncate(&task.title, width),
              Style::default().fg(task_status_color(task.status)),
            ),
          ]))
        })
        .collect();

      let list = List::new(items)
        .block(block)
        .highlight_style(
          Style::default()
            .bg(Color::DarkGray)
            .add_modifier(Modifier::BOLD),
        )
        .highlight_symbol("> ");

      if col_idx == self.column {
        let mut state = ListState::default();
        if !tasks.is_empty() {
          state.select(Some(self.rows[col_idx].min(tasks.len() - 1)));
        }
        frame.render_stateful_widget(list, col_areas[col_idx], &mut state);
      } else {
        frame.render_widget(list, col_areas[col_idx]);
      }
    }
  }

  fn render_comments(&mut self, frame: &mut Frame, area: Rect, snapshot: &WorkspaceSnapshot) {
    let border_color = if self.focus == Pane::Comments {
      Color::Yellow
    } else {
      Color::Blue
    };
    let title = match &snapshot.selected_task {
      Some(task) => format!(" {} ", truncate(&task.title, 40)),
      None => " Comments ".to_string(),
    };
    let block = Block::default()
      .title(title)
      .borders(Borders::ALL)
      .border_style(Style::default().fg(border_color));

    let Some(task) = &snapshot.selected_task else {
      let hint = Paragraph::new("Press Enter on a task to see its comments.")
        .block(block)
        .style(Style::default().fg(Color::DarkGray));
      frame.render_widget(hint, area);
      return;
    };

    let inner = block.inner(area);
    frame.render_widget(block, area);
    let [detail_area, list_area] = Layout::vertical([Constraint::Length(3), Constraint::Min(0)]).areas(inner);

    let due = task
      .due_date
      .map(|d| format!("  due {}", format_timestamp(&d)))
      .unwrap_or_default();
    let assignee = task
      .assignee
      .as_ref()
      .map(|m| format!("  @{}", m.user.name))
      .unwrap_or_default();
    let detail = vec![
      Line::from(vec![
        Span::styled(task.status.label(), Style::default().fg(task_status_color(task.status))),
        Span::raw("  "),
        Span::styled(task.priority.label(), Style::default().fg(priority_color(task.priority))),
        Span::styled(format!("{}{}", assignee, due), Style::default().fg(Color::DarkGray)),
      ]),
      Line::from(task.description.clone()),
    ];
    frame.render_widget(Paragraph::new(detail).wrap(Wrap { trim: true }), detail_area);

    if snapshot.comments_loading {
      frame.render_widget(
        Paragraph::new("Loading comments...").style(Style::default().fg(Color::DarkGray)),
        list_area,
      );
      return;
    }
    if snapshot.comments.is_empty() {
      frame.render_widget(
        Paragraph::new("No comments yet. Press 'c' to add one.").style(Style::default().fg(Color::DarkGray)),
        list_area,
      );
      return;
    }

    ensure_valid_selection(&mut self.comment_state, snapshot.comments.len());
    let items: Vec<ListItem> = snapshot
      .comments
      .iter()
      .map(|comment| {
        ListItem::new(Line::from(vec![
          Span::styled(comment.author.name.clone(), Style::default().fg(Color::Cyan)),
          Span::styled(
            format!(" {}  ", format_timestamp(&comment.created_at)),
            Style::default().fg(Color::DarkGray),
          ),
          Span::raw(comment.text.clone()),
        ]))
      })
      .collect();
    let list = List::new(items).highlight_style(Style::default().bg(Color::DarkGray));
    if self.focus == Pane::Comments {
      frame.render_stateful_widget(list, list_area, &mut self.comment_state);
    } else {
      frame.render_widget(list, list_area);
    }
  }

  fn render_chat(&self, frame: &mut Frame, area: Rect, snapshot: &WorkspaceSnapshot) {
    let border_color = if self.focus == Pane::Chat {
      Color::Yellow
    } else {
      Color::Blue
    };
    let block = Block::default()
      .title(format!(" Chat ({}) ", snapshot.chat_messages.len()))
      .borders(Borders::ALL)
      .border_style(Style::default().fg(border_color));

    // Newest at the bottom; only what fits
    let visible = area.height.saturating_sub(2) as usize;
    let skip = snapshot.chat_messages.len().saturating_sub(visible);
    let lines: Vec<Line> = snapshot
      .chat_messages
      .iter()
      .skip(skip)
      .map(|message| {
        let (name, color) = if self.workspace.is_own_message(message) {
          ("you".to_string(), Color::Green)
        } else {
          (message.sender.name.clone(), Color::Cyan)
        };
        Line::from(vec![
          Span::styled(
            format!("{} ", format_timestamp(&message.timestamp)),
            Style::default().fg(Color::DarkGray),
          ),
          Span::styled(format!("{}: ", name), Style::default().fg(color)),
          Span::raw(message.text.clone()),
        ])
      })
      .collect();

    frame.render_widget(Paragraph::new(lines).block(block), area);
  }
}

impl<A: ProjectApi> View for ProjectView<A> {
  fn handle_key(&mut self, key: KeyEvent) -> ViewAction {
    if let Some(composer) = self.composer.as_mut() {
      let target = composer.target();
      match composer.handle_key(key) {
        Some(ComposerEvent::Submit(text)) => self.submit(target, text),
        Some(ComposerEvent::Closed) => self.composer = None,
        None => {}
      }
      return ViewAction::None;
    }

    match key.code {
      KeyCode::Tab => self.focus = self.focus.next(),
      KeyCode::Char('h') | KeyCode::Left => self.move_cursor(-1, true),
      KeyCode::Char('l') | KeyCode::Right => self.move_cursor(1, true),
      KeyCode::Char('j') | KeyCode::Down => match self.focus {
        Pane::Comments => self.comment_state.select_next(),
        _ => self.move_cursor(1, false),
      },
      KeyCode::Char('k') | KeyCode::Up => match self.focus {
        Pane::Comments => self.comment_state.select_previous(),
        _ => self.move_cursor(-1, false),
      },
      KeyCode::Enter => {
        let snapshot = self.workspace.snapshot();
        if let Some(task) = self.cursor_task(&snapshot) {
          self.workspace.select(Some(&task.id));
          self.comment_state = ListState::default();
        }
      }
      KeyCode::Char('>') => self.move_task(true),
      KeyCode::Char('<') => self.move_task(false),
      KeyCode::Char('n') => self.composer = Some(Composer::new(ComposerTarget::NewTask)),
      KeyCode::Char('c') => {
        if self.workspace.selected_task_id().is_some() {
          self.composer = Some(Composer::new(ComposerTarget::Comment));
        }
      }
      KeyCode::Char('m') => self.composer = Some(Composer::new(ComposerTarget::ChatMessage)),
      KeyCode::Char('i') => self.composer = Some(Composer::new(ComposerTarget::Invite)),
      KeyCode::Char('d') if self.focus == Pane::Comments => self.delete_highlighted_comment(),
      KeyCode::Char('x') if self.focus == Pane::Board => self.delete_cursor_task(),
      KeyCode::Char('r') => self.workspace.refresh(),
      KeyCode::Esc => {
        if self.workspace.selected_task_id().is_some() {
          self.workspace.select(None);
        } else {
          return ViewAction::Pop;
        }
      }
      KeyCode::Char('q') => return ViewAction::Pop,
      _ => {}
    }
    ViewAction::None
  }

  fn render(&mut self, frame: &mut Frame, area: Rect) {
    let snapshot = self.workspace.snapshot();

    if let Some(error) = &snapshot.error {
      self.render_error(frame, area, error);
      return;
    }
    if snapshot.is_loading {
      let block = Block::default().borders(Borders::ALL).title(" Project ");
      frame.render_widget(
        Paragraph::new("Loading project...")
          .block(block)
          .style(Style::default().fg(Color::DarkGray)),
        area,
      );
      return;
    }

    let composer_height = if self.composer.is_some() { 3 } else { 0 };
    let [summary_area, body_area, composer_area] = Layout::vertical([
      Constraint::Length(3),
      Constraint::Min(0),
      Constraint::Length(composer_height),
    ])
    .areas(area);
    let [board_area, side_area] =
      Layout::horizontal([Constraint::Percentage(60), Constraint::Percentage(40)]).areas(body_area);
    let [comments_area, chat_area] =
      Layout::vertical([Constraint::Percentage(50), Constraint::Percentage(50)]).areas(side_area);

    self.render_summary(frame, summary_area, &snapshot);
    self.render_board(frame, board_area, &snapshot);
    self.render_comments(frame, comments_area, &snapshot);
    self.render_chat(frame, chat_area, &snapshot);
    if let Some(composer) = &self.composer {
      composer.render(frame, composer_area);
    }
  }

  fn breadcrumb_label(&self) -> String {
    let snapshot = self.workspace.snapshot();
    let name = snapshot
      .project
      .map(|p| p.name)
      .unwrap_or_else(|| self.workspace.project_id().to_string());
    match snapshot.selected_task {
      Some(task) => format!("{} > {}", name, truncate(&task.title, 30)),
      None => name,
    }
  }

  fn project(&self) -> Option<String> {
    Some(self.workspace.project_id().to_string())
  }

  fn on_action(&mut self, outcome: &ActionOutcome) {
    if let Some(composer) = self.composer.as_mut() {
      if composer.target().action() == outcome.kind && composer.finish(outcome.is_ok()) {
        self.composer = None;
      }
    }
  }

  fn shortcuts(&self) -> Vec<Shortcut> {
    if self.composer.is_some() {
      return vec![Shortcut::new("Enter", "send"), Shortcut::new("Esc", "close")];
    }
    let mut shortcuts = vec![
      Shortcut::new("Tab", "pane").with_priority(5),
      Shortcut::new("Enter", "open task").with_priority(10),
      Shortcut::new("</>", "move").with_priority(12),
      Shortcut::new("n", "task").with_priority(14),
      Shortcut::new("m", "message").with_priority(16),
      Shortcut::new("i", "invite").with_priority(18),
      Shortcut::new("r", "refresh").with_priority(20),
      Shortcut::new("q", "back").with_priority(30),
    ];
    if self.workspace.selected_task_id().is_some() {
      shortcuts.push(Shortcut::new("c", "comment").with_priority(15));
    }
    match self.focus {
      Pane::Comments => shortcuts.push(Shortcut::new("d", "delete comment").with_priority(17)),
      Pane::Board => shortcuts.push(Shortcut::new("x", "delete task").with_priority(17)),
      Pane::Chat => {}
    }
    shortcuts
  }
}
