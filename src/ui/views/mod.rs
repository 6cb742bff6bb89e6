mod project;
mod project_list;

pub use project::ProjectView;
pub use project_list::ProjectListView;
