//! Cache entries and the transitions applied to them.

use serde_json::Value;
use std::time::{Duration, Instant};

use crate::api::ApiError;

/// Lifecycle of a cached query
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum QueryStatus {
  /// Never fetched, or invalidated and waiting for the next observation
  #[default]
  Idle,
  /// A fetch is in flight
  Loading,
  /// The last applied fetch succeeded
  Success,
  /// The last applied fetch failed
  Error,
}

/// One cached resource.
///
/// `data` survives invalidation and failed re-fetches so it can be served
/// while a refresh is running; whether it is shown is decided by the reader.
#[derive(Debug, Clone, Default)]
pub struct CacheEntry {
  pub data: Option<Value>,
  pub status: QueryStatus,
  pub error: Option<ApiError>,
  pub fetched_at: Option<Instant>,
  /// Bumped on every fetch start and every invalidation
  pub request_version: u64,
  /// Set by invalidation, cleared once a fetch result is applied
  pub invalidated: bool,
}

impl CacheEntry {
  /// Whether the entry should be re-fetched on its next observation.
  pub fn is_stale(&self, stale_time: Duration) -> bool {
    if self.invalidated {
      return true;
    }
    self
      .fetched_at
      .map(|t| t.elapsed() >= stale_time)
      .unwrap_or(true)
  }

  pub fn is_loading(&self) -> bool {
    self.status == QueryStatus::Loading
  }
}

/// A write to one entry. `CacheStore::set` is the only way entries change.
#[derive(Debug, Clone)]
pub enum EntryPatch {
  /// A fetch is starting: status becomes loading and the version is bumped
  FetchStarted,
  /// A fetch issued at `version` settled
  Resolved {
    version: u64,
    result: Result<Value, ApiError>,
  },
  /// Replace the data directly without touching the version
  Data(Value),
}

/// What `CacheStore::set` did with a patch
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Resolution {
  /// A fetch started under this version
  Started(u64),
  /// The patch was merged into the entry
  Applied,
  /// The result belonged to a superseded version and was dropped
  Discarded,
}

impl CacheEntry {
  /// Apply a patch in place.
  pub(super) fn apply(&mut self, patch: EntryPatch) -> Resolution {
    match patch {
      EntryPatch::FetchStarted => {
        self.request_version += 1;
        self.status = QueryStatus::Loading;
        Resolution::Started(self.request_version)
      }
      EntryPatch::Resolved { version, result } => {
        if version != self.request_version {
          return Resolution::Discarded;
        }
        match result {
          Ok(data) => {
            self.data = Some(data);
            self.status = QueryStatus::Success;
            self.error = None;
            self.fetched_at = Some(Instant::now());
            self.invalidated = false;
          }
          Err(e) => {
            self.status = QueryStatus::Error;
            self.error = Some(e);
          }
        }
        Resolution::Applied
      }
      EntryPatch::Data(data) => {
        self.data = Some(data);
        self.status = QueryStatus::Success;
        self.error = None;
        self.fetched_at = Some(Instant::now());
        self.invalidated = false;
        Resolution::Applied
      }
    }
  }

  /// Mark stale: keep data, drop back to idle and orphan any in-flight fetch.
  pub(super) fn invalidate(&mut self) {
    self.request_version += 1;
    self.status = QueryStatus::Idle;
    self.invalidated = true;
  }
}
