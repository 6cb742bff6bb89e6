mod api;
mod app;
mod cache;
mod config;
mod directory;
mod event;
mod logging;
mod mutation;
mod query;
mod selection;
mod ui;
mod workspace;

use clap::Parser;
use color_eyre::Result;
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "pstack")]
#[command(about = "A terminal client for ProjectStack team workspaces")]
#[command(version)]
struct Args {
  /// Path to config file (default: ./pstack.yaml, then $XDG_CONFIG_HOME/pstack/config.yaml)
  #[arg(short, long)]
  config: Option<PathBuf>,

  /// Open this project directly instead of the project list
  #[arg(short, long)]
  project: Option<String>,

  /// Write logs here instead of the configured or default log file
  #[arg(long)]
  log_file: Option<PathBuf>,
}

// One thread: fetches and the UI loop interleave cooperatively
#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
  color_eyre::install()?;

  let args = Args::parse();

  // Load configuration
  let mut config = config::Config::load(args.config.as_deref())?;

  // Override project if specified on command line
  if let Some(project) = args.project {
    config.default_project = Some(project);
  }

  let log_path = args
    .log_file
    .or_else(|| config.log.file.clone())
    .unwrap_or_else(logging::default_log_path);
  let _log_guard = logging::init_logging(&config.log.level, &log_path);
  tracing::info!(api = %config.api.url, "pstack starting");

  let token = config::Config::get_api_token()?;
  let client = api::ApiClient::new(&config.api, &token)?;

  // Initialize and run the app
  let mut app = app::App::new(&config, client);
  app.run().await?;

  tracing::info!("pstack exiting");
  Ok(())
}
