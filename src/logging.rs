use std::path::{Path, PathBuf};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::EnvFilter;

/// Where logs go when neither the CLI nor the config names a file
pub fn default_log_path() -> PathBuf {
  dirs::state_dir()
    .or_else(dirs::cache_dir)
    .map(|dir| dir.join("pstack"))
    .unwrap_or_else(std::env::temp_dir)
    .join("pstack.log")
}

/// Install a file-backed subscriber. The terminal belongs to the UI, so
/// nothing is ever written to stdout.
///
/// `RUST_LOG` overrides `level`. Keep the returned guard alive until exit
/// or buffered lines are lost. Returns `None` if the path has no usable
/// file name or its directory cannot be created.
pub fn init_logging(level: &str, file_path: &Path) -> Option<WorkerGuard> {
  let log_dir = file_path.parent()?;
  let file_name = file_path.file_name()?.to_str()?;
  std::fs::create_dir_all(log_dir).ok()?;

  let file_appender = tracing_appender::rolling::never(log_dir, file_name);
  let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);

  let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

  tracing_subscriber::fmt()
    .with_writer(non_blocking)
    .with_env_filter(env_filter)
    .with_ansi(false)
    .with_target(true)
    .init();

  Some(guard)
}
