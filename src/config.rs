use color_eyre::{eyre::eyre, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::api::types::User;

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
  pub api: ApiConfig,
  /// Signed-in user; the single source of identity for ownership checks
  pub user: Option<User>,
  /// Project opened on startup instead of the project list
  pub default_project: Option<String>,
  /// Custom title for header (defaults to the API host if not set)
  pub title: Option<String>,
  #[serde(default)]
  pub query: QueryConfig,
  #[serde(default)]
  pub log: LogConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ApiConfig {
  pub url: String,
  #[serde(default = "default_timeout_ms")]
  pub timeout_ms: u64,
  /// Read requests are retried this many times on transient failures
  #[serde(default = "default_max_retries")]
  pub max_retries: u32,
  #[serde(default = "default_retry_backoff_ms")]
  pub retry_backoff_ms: u64,
}

impl ApiConfig {
  pub fn timeout(&self) -> Duration {
    Duration::from_millis(self.timeout_ms)
  }

  pub fn retry_backoff(&self) -> Duration {
    Duration::from_millis(self.retry_backoff_ms)
  }
}

#[derive(Debug, Clone, Deserialize)]
pub struct QueryConfig {
  #[serde(default = "default_stale_time_secs")]
  pub stale_time_secs: u64,
}

impl Default for QueryConfig {
  fn default() -> Self {
    Self {
      stale_time_secs: default_stale_time_secs(),
    }
  }
}

impl QueryConfig {
  pub fn stale_time(&self) -> Duration {
    Duration::from_secs(self.stale_time_secs)
  }
}

#[derive(Debug, Clone, Deserialize)]
pub struct LogConfig {
  #[serde(default = "default_log_level")]
  pub level: String,
  pub file: Option<PathBuf>,
}

impl Default for LogConfig {
  fn default() -> Self {
    Self {
      level: default_log_level(),
      file: None,
    }
  }
}

fn default_timeout_ms() -> u64 {
  10_000
}

fn default_max_retries() -> u32 {
  3
}

fn default_retry_backoff_ms() -> u64 {
  250
}

fn default_stale_time_secs() -> u64 {
  30
}

fn default_log_level() -> String {
  "info".to_string()
}

impl Config {
  /// Load configuration from file.
  ///
  /// Search order:
  /// 1. Explicit path if provided
  /// 2. ./pstack.yaml (current directory)
  /// 3. $XDG_CONFIG_HOME/pstack/config.yaml
  pub fn load(explicit_path: Option<&Path>) -> Result<Self> {
    let path = if let Some(p) = explicit_path {
      if p.exists() {
        Some(p.to_path_buf())
      } else {
        return Err(eyre!("Config file not found: {}", p.display()));
      }
    } else {
      Self::find_config_file()
    };

    match path {
      Some(p) => Self::load_from_path(&p),
      None => Err(eyre!(
        "No configuration file found. Create one at ~/.config/pstack/config.yaml"
      )),
    }
  }

  fn find_config_file() -> Option<PathBuf> {
    let local = PathBuf::from("pstack.yaml");
    if local.exists() {
      return Some(local);
    }

    if let Some(config_dir) = dirs::config_dir() {
      let xdg_path = config_dir.join("pstack").join("config.yaml");
      if xdg_path.exists() {
        return Some(xdg_path);
      }
    }

    None
  }

  fn load_from_path(path: &Path) -> Result<Self> {
    let contents = std::fs::read_to_string(path)
      .map_err(|e| eyre!("Failed to read config file {}: {}", path.display(), e))?;

    Self::from_yaml(&contents)
      .map_err(|e| eyre!("Failed to parse config file {}: {}", path.display(), e))
  }

  pub fn from_yaml(contents: &str) -> std::result::Result<Self, serde_yaml::Error> {
    serde_yaml::from_str(contents)
  }

  /// Get the API bearer token from environment variables.
  ///
  /// Checks PSTACK_TOKEN first, then PROJECTSTACK_TOKEN as fallback.
  pub fn get_api_token() -> Result<String> {
    std::env::var("PSTACK_TOKEN")
      .or_else(|_| std::env::var("PROJECTSTACK_TOKEN"))
      .map_err(|_| {
        eyre!("API token not found. Set PSTACK_TOKEN or PROJECTSTACK_TOKEN environment variable.")
      })
  }
}
