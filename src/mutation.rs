//! Runs writes and invalidates what they affect.
//!
//! No optimistic merging: a successful write invalidates its affected keys
//! and the binder re-fetches the observed ones, so what is shown afterwards
//! is always server state. A failed write touches nothing in the cache.

use std::future::Future;
use tracing::{debug, warn};

use crate::api::ApiError;
use crate::cache::QueryKey;
use crate::query::QueryBinder;

#[derive(Clone)]
pub struct MutationRunner {
  binder: QueryBinder,
}

impl MutationRunner {
  pub fn new(binder: QueryBinder) -> Self {
    Self { binder }
  }

  /// Await `executor`; on success invalidate `affected_keys(&result)`.
  ///
  /// Mutations are not queued. When two writes touching the same key race,
  /// the later invalidation supersedes the earlier re-fetch. Errors are
  /// returned untouched and never retried.
  pub async fn run<T, Fut, K>(&self, label: &str, executor: Fut, affected_keys: K) -> Result<T, ApiError>
  where
    Fut: Future<Output = Result<T, ApiError>>,
    K: FnOnce(&T) -> Vec<QueryKey>,
  {
    let result = match executor.await {
      Ok(result) => result,
      Err(e) => {
        warn!(mutation = label, error = %e, "mutation failed");
        return Err(e);
      }
    };

    for key in affected_keys(&result) {
      let invalidated = self.binder.invalidate(|k| k == &key);
      debug!(mutation = label, %key, hit = !invalidated.is_empty(), "invalidated after mutation");
    }
    Ok(result)
  }
}
