use crate::api::api_types::NewProject;
use crate::api::types::Project;
use crate::api::ProjectApi;
use crate::app::AppContext;
use crate::directory::ProjectDirectory;
use crate::event::{cache_listener, ActionKind, ActionOutcome};
use crate::ui::components::{Composer, ComposerEvent, ComposerTarget};
use crate::ui::ensure_valid_selection;
use crate::ui::renderfns::{project_status_color, truncate};
use crate::ui::view::{Shortcut, View, ViewAction};
use crate::ui::views::ProjectView;
use crossterm::event::{KeyCode, KeyEvent};
use ratatui::prelude::*;
use ratatui::widgets::{Block, Borders, List, ListItem, ListState, Paragraph};

/// Root view: every project the user can see
pub struct ProjectListView<A: ProjectApi> {
  ctx: AppContext<A>,
  directory: ProjectDirectory<A>,
  list_state: ListState,
  composer: Option<Composer>,
  /// The project an open rename composer applies to
  renaming: Option<Project>,
}

impl<A: ProjectApi> ProjectListView<A> {
  pub fn new(ctx: AppContext<A>) -> Self {
    let mut directory = ProjectDirectory::open(ctx.api.clone(), ctx.binder.clone(), ctx.options);
    directory.on_change(cache_listener(ctx.events.clone()));
    Self {
      ctx,
      directory,
      list_state: ListState::default(),
      composer: None,
      renaming: None,
    }
  }

  fn projects(&self) -> Vec<Project> {
    self.directory.projects().data.unwrap_or_default()
  }

  fn highlighted(&self) -> Option<Project> {
    let index = self.list_state.selected()?;
    self.projects().into_iter().nth(index)
  }

  fn submit(&mut self, target: ComposerTarget, text: String) {
    match (target, self.renaming.clone()) {
      (ComposerTarget::RenameProject, Some(project)) => self.rename_project(project, text),
      (ComposerTarget::NewProject, _) => self.create_project(text),
      _ => {}
    }
  }

  fn rename_project(&self, project: Project, name: String) {
    let actions = self.directory.actions();
    self.ctx.spawn_action(ActionKind::RenameProject, async move {
      actions.rename_project(&project, name).await.map_err(Into::into)
    });
  }

  fn delete_project(&self, project_id: String) {
    let actions = self.directory.actions();
    self.ctx.spawn_action(ActionKind::DeleteProject, async move {
      actions.delete_project(&project_id).await.map_err(Into::into)
    });
  }

  fn create_project(&self, name: String) {
    let actions = self.directory.actions();
    self.ctx.spawn_action(ActionKind::CreateProject, async move {
      let project = NewProject {
        name,
        ..Default::default()
      };
      actions.create_project(project).await.map_err(Into::into)
    });
  }

  fn render_list(&mut self, frame: &mut Frame, area: Rect) {
    let view = self.directory.projects();
    let projects = view.data.clone().unwrap_or_default();
    ensure_valid_selection(&mut self.list_state, projects.len());

    let title = if view.is_loading() {
      " Projects (loading...) ".to_string()
    } else if view.is_fetching() {
      format!(" Projects ({}, refreshing) ", projects.len())
    } else {
      format!(" Projects ({}) ", projects.len())
    };
    let block = Block::default()
      .title(title)
      .title_alignment(Alignment::Center)
      .borders(Borders::ALL)
      .border_style(Style::default().fg(Color::Blue));

    if projects.is_empty() {
      let content = match &view.error {
        Some(e) if view.is_error() => format!("Failed to load projects: {}. Press 'r' to retry.", e),
        _ if view.is_loading() => "Loading projects...".to_string(),
        _ => "No projects yet. Press 'n' to create one.".to_string(),
      };
      let paragraph = Paragraph::new(content)
        .block(block)
        .style(Style::default().fg(Color::DarkGray));
      frame.render_widget(paragraph, area);
      return;
    }

    let items: Vec<ListItem> = projects
      .iter()
      .map(|project| {
        let line = Line::from(vec![
          Span::styled(
            format!("{:<30}", truncate(&project.name, 30)),
            Style::default().fg(Color::Cyan),
          ),
          Span::raw(" "),
          Span::styled(
            format!("{:<10}", project.status.label()),
            Style::default().fg(project_status_color(project.status)),
          ),
          Span::raw(" "),
          Span::styled(
            format!("{:>3} members", project.members.len()),
            Style::default().fg(Color::DarkGray),
          ),
          Span::raw("  "),
          Span::raw(truncate(&project.tech_stack.join(", "), 40)),
        ]);
        ListItem::new(line)
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

    frame.render_stateful_widget(list, area, &mut self.list_state);
  }
}

impl<A: ProjectApi> View for ProjectListView<A> {
  fn handle_key(&mut self, key: KeyEvent) -> ViewAction {
    if let Some(composer) = self.composer.as_mut() {
      let target = composer.target();
      match composer.handle_key(key) {
        Some(ComposerEvent::Submit(text)) => self.submit(target, text),
        Some(ComposerEvent::Closed) => {
          self.composer = None;
          self.renaming = None;
        }
        None => {}
      }
      return ViewAction::None;
    }

    match key.code {
      KeyCode::Char('j') | KeyCode::Down => self.list_state.select_next(),
      KeyCode::Char('k') | KeyCode::Up => self.list_state.select_previous(),
      KeyCode::Char('r') => self.directory.refresh(),
      KeyCode::Char('n') => self.composer = Some(Composer::new(ComposerTarget::NewProject)),
      KeyCode::Char('e') => {
        if let Some(project) = self.highlighted() {
          self.renaming = Some(project);
          self.composer = Some(Composer::new(ComposerTarget::RenameProject));
        }
      }
      KeyCode::Char('x') => {
        if let Some(project) = self.highlighted() {
          self.delete_project(project.id);
        }
      }
      KeyCode::Enter => {
        if let Some(project) = self.highlighted() {
          return ViewAction::Push(Box::new(ProjectView::open(self.ctx.clone(), project.id)));
        }
      }
      KeyCode::Char('q') | KeyCode::Esc => return ViewAction::Pop,
      _ => {}
    }
    ViewAction::None
  }

  fn render(&mut self, frame: &mut Frame, area: Rect) {
    let (list_area, composer_area) = if self.composer.is_some() {
      let chunks = Layout::vertical([Constraint::Min(0), Constraint::Length(3)]).split(area);
      (chunks[0], Some(chunks[1]))
    } else {
      (area, None)
    };

    self.render_list(frame, list_area);
    if let (Some(composer), Some(area)) = (&self.composer, composer_area) {
      composer.render(frame, area);
    }
  }

  fn breadcrumb_label(&self) -> String {
    "Projects".to_string()
  }

  fn on_action(&mut self, outcome: &ActionOutcome) {
    if let Some(composer) = self.composer.as_mut() {
      if composer.target().action() == outcome.kind && composer.finish(outcome.is_ok()) {
        self.composer = None;
        self.renaming = None;
      }
    }
  }

  fn shortcuts(&self) -> Vec<Shortcut> {
    if self.composer.is_some() {
      return vec![
        Shortcut::new("Enter", "save"),
        Shortcut::new("Esc", "close"),
      ];
    }
    vec![
      Shortcut::new("Enter", "open").with_priority(10),
      Shortcut::new("n", "new project").with_priority(15),
      Shortcut::new("e", "rename").with_priority(16),
      Shortcut::new("x", "delete").with_priority(17),
      Shortcut::new("r", "refresh").with_priority(20),
      Shortcut::new("q", "quit").with_priority(30),
    ]
  }
}
