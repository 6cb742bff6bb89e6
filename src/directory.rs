//! The project list shown before a project is opened.

use tracing::info;

use crate::api::api_types::NewProject;
use crate::api::types::Project;
use crate::api::{ApiError, ProjectApi};
use crate::cache::{Listener, QueryKey, Subscription};
use crate::mutation::MutationRunner;
use crate::query::{QueryBinder, QueryHandle, QueryOptions, QueryView};

/// Owned handle for writes on the project list, so they can be spawned
#[derive(Clone)]
pub struct DirectoryActions<A> {
  api: A,
  runner: MutationRunner,
}

impl<A: ProjectApi> DirectoryActions<A> {
  pub async fn create_project(&self, project: NewProject) -> Result<Project, ApiError> {
    let created = self
      .runner
      .run("create_project", self.api.create_project(&project), |_| {
        vec![QueryKey::Projects]
      })
      .await?;
    info!(project = %created.id, name = %created.name, "project created");
    Ok(created)
  }

  /// Rename `project`, keeping its other fields
  pub async fn rename_project(&self, project: &Project, name: String) -> Result<Project, ApiError> {
    let update = NewProject {
      name,
      description: project.description.clone(),
      status: project.status,
      tech_stack: project.tech_stack.clone(),
    };
    let project_key = QueryKey::project(&project.id);
    let renamed = self
      .runner
      .run(
        "rename_project",
        self.api.update_project(&project.id, &update),
        move |_| vec![QueryKey::Projects, project_key],
      )
      .await?;
    info!(project = %renamed.id, name = %renamed.name, "project renamed");
    Ok(renamed)
  }

  pub async fn delete_project(&self, project_id: &str) -> Result<(), ApiError> {
    self
      .runner
      .run("delete_project", self.api.delete_project(project_id), |_| {
        vec![QueryKey::Projects]
      })
      .await?;
    info!(project = %project_id, "project deleted");
    Ok(())
  }
}

pub struct ProjectDirectory<A: ProjectApi> {
  actions: DirectoryActions<A>,
  binder: QueryBinder,
  projects: QueryHandle<Vec<Project>>,
  subscription: Option<Subscription>,
}

impl<A: ProjectApi> ProjectDirectory<A> {
  pub fn open(api: A, binder: QueryBinder, options: QueryOptions) -> Self {
    let projects = {
      let api = api.clone();
      binder.use_query(QueryKey::Projects, options, move || {
        let api = api.clone();
        async move { api.list_projects().await }
      })
    };
    Self {
      actions: DirectoryActions {
        api,
        runner: MutationRunner::new(binder.clone()),
      },
      binder,
      projects,
      subscription: None,
    }
  }

  pub fn projects(&self) -> QueryView<Vec<Project>> {
    self.projects.state()
  }

  pub fn on_change(&mut self, listener: Listener) {
    self.subscription = Some(self.binder.store().subscribe(self.projects.key(), listener));
  }

  pub fn refresh(&self) {
    self.projects.refetch();
  }

  pub async fn settled(&self) {
    self.projects.settled().await;
  }

  pub fn actions(&self) -> DirectoryActions<A> {
    self.actions.clone()
  }

  pub async fn create_project(&self, project: NewProject) -> Result<Project, ApiError> {
    self.actions.create_project(project).await
  }
}
