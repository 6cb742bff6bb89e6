//! Query binder: ties query keys to the cache store and decides when to fetch.
//!
//! Inspired by TanStack Query. A view declares interest in a key with
//! `use_query`, gets back a `QueryHandle<T>`, and reads typed snapshots from
//! it. The binder makes sure that:
//!
//! - a key is fetched on its first active observation, when it has gone
//!   stale, or when it is invalidated while observed
//! - concurrent observers of one key share a single in-flight request
//! - a response only lands if its request version is still current
//!
//! # Example
//!
//! ```ignore
//! let api = api.clone();
//! let tasks: QueryHandle<Vec<Task>> = binder.use_query(
//!     QueryKey::project_tasks("p1"),
//!     QueryOptions::default(),
//!     move || {
//!         let api = api.clone();
//!         async move { api.list_tasks("p1").await }
//!     },
//! );
//!
//! // In render
//! let view = tasks.state();
//! if view.is_loading() {
//!     render_spinner();
//! } else if let Some(tasks) = view.data {
//!     render_tasks(&tasks);
//! }
//! ```

use futures::future::{FutureExt, Shared};
use parking_lot::Mutex;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;
use std::future::Future;
use std::marker::PhantomData;
use std::pin::Pin;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, warn};

use crate::api::ApiError;
use crate::cache::{CacheEntry, CacheStore, ChangeNotice, EntryPatch, QueryKey, QueryStatus, Resolution};

/// A boxed, sendable future
type BoxFuture<T> = Pin<Box<dyn Future<Output = T> + Send>>;

/// A factory for fetch futures, erased to JSON so one binder serves every type
type FetcherFn = Arc<dyn Fn() -> BoxFuture<Result<Value, ApiError>> + Send + Sync>;

/// A fetch in flight. Observers of the same key await clones of it.
pub type PendingFetch = Shared<BoxFuture<Resolution>>;

/// Per-observation settings
#[derive(Debug, Clone, Copy)]
pub struct QueryOptions {
  /// When false the query does nothing and the entry is left alone
  pub enabled: bool,
  /// Data older than this is re-fetched on the next observation
  pub stale_time: Duration,
  /// Keep serving cached data while a re-fetch is running
  pub keep_previous_data: bool,
}

impl Default for QueryOptions {
  fn default() -> Self {
    Self {
      enabled: true,
      stale_time: Duration::from_secs(60),
      keep_previous_data: true,
    }
  }
}

impl QueryOptions {
  pub fn with_stale_time(mut self, stale_time: Duration) -> Self {
    self.stale_time = stale_time;
    self
  }

  pub fn enabled(mut self, enabled: bool) -> Self {
    self.enabled = enabled;
    self
  }

  pub fn keep_previous_data(mut self, keep: bool) -> Self {
    self.keep_previous_data = keep;
    self
  }
}

struct Observer {
  count: usize,
  fetcher: FetcherFn,
}

#[derive(Default)]
struct BinderState {
  observers: HashMap<QueryKey, Observer>,
  pending: HashMap<QueryKey, (u64, PendingFetch)>,
}

/// Binds query keys to the cache store.
///
/// Cheap to clone; clones share observers and in-flight fetches. Must be used
/// from within a tokio runtime since fetches are spawned.
#[derive(Clone)]
pub struct QueryBinder {
  store: CacheStore,
  state: Arc<Mutex<BinderState>>,
}

impl QueryBinder {
  pub fn new(store: CacheStore) -> Self {
    Self {
      store,
      state: Arc::new(Mutex::new(BinderState::default())),
    }
  }

  pub fn store(&self) -> &CacheStore {
    &self.store
  }

  /// Register interest in `key`, fetching it if needed.
  ///
  /// The returned handle keeps the key observed until it is dropped. With
  /// `options.enabled == false` nothing is registered or fetched.
  pub fn use_query<T, F, Fut>(&self, key: QueryKey, options: QueryOptions, fetcher: F) -> QueryHandle<T>
  where
    T: Serialize + Send + 'static,
    F: Fn() -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<T, ApiError>> + Send + 'static,
  {
    if !options.enabled {
      return QueryHandle::new(self.clone(), key, options);
    }

    let fetcher: FetcherFn = Arc::new(move || {
      let request = fetcher();
      Box::pin(async move {
        let data = request.await?;
        serde_json::to_value(data).map_err(ApiError::from)
      })
    });

    let mut state = self.state.lock();
    let observer = state.observers.entry(key.clone()).or_insert_with(|| Observer {
      count: 0,
      fetcher: Arc::clone(&fetcher),
    });
    observer.count += 1;
    observer.fetcher = Arc::clone(&fetcher);

    let notice = self.ensure_fresh(&mut state, &key, options.stale_time, fetcher);
    drop(state);
    if let Some(notice) = notice {
      notice.send();
    }

    QueryHandle::new(self.clone(), key, options)
  }

  /// Invalidate matching entries and immediately re-fetch the observed ones.
  ///
  /// Unobserved keys are only marked stale; they are fetched on their next
  /// observation.
  pub fn invalidate<P>(&self, predicate: P) -> Vec<QueryKey>
  where
    P: Fn(&QueryKey) -> bool,
  {
    let keys = self.store.invalidate(predicate);

    let mut notices = Vec::new();
    let mut state = self.state.lock();
    for key in &keys {
      let Some(fetcher) = state.observers.get(key).map(|o| Arc::clone(&o.fetcher)) else {
        continue;
      };
      debug!(%key, "re-fetching invalidated query");
      let (_, notice) = self.start_fetch(&mut state, key, fetcher);
      notices.extend(notice);
    }
    drop(state);

    for notice in notices {
      notice.send();
    }
    keys
  }

  /// Force a new fetch for an observed key, superseding any in flight.
  pub fn refetch(&self, key: &QueryKey) -> Option<PendingFetch> {
    let mut state = self.state.lock();
    let fetcher = state.observers.get(key).map(|o| Arc::clone(&o.fetcher))?;
    let (pending, notice) = self.start_fetch(&mut state, key, fetcher);
    drop(state);
    if let Some(notice) = notice {
      notice.send();
    }
    Some(pending)
  }

  /// The current in-flight fetch for `key`, if any.
  pub fn pending(&self, key: &QueryKey) -> Option<PendingFetch> {
    self
      .state
      .lock()
      .pending
      .get(key)
      .map(|(_, pending)| pending.clone())
  }

  pub fn is_observed(&self, key: &QueryKey) -> bool {
    self.state.lock().observers.contains_key(key)
  }

  fn release(&self, key: &QueryKey) {
    let mut state = self.state.lock();
    if let Some(observer) = state.observers.get_mut(key) {
      observer.count = observer.count.saturating_sub(1);
      if observer.count == 0 {
        state.observers.remove(key);
        debug!(%key, "query no longer observed");
      }
    }
  }

  fn ensure_fresh(
    &self,
    state: &mut BinderState,
    key: &QueryKey,
    stale_time: Duration,
    fetcher: FetcherFn,
  ) -> Option<ChangeNotice> {
    let entry = self.store.get(key);

    let in_flight = state
      .pending
      .get(key)
      .is_some_and(|(version, _)| *version == entry.request_version);
    if entry.is_loading() && in_flight {
      debug!(%key, "attaching to in-flight fetch");
      return None;
    }

    let needs_fetch = match entry.status {
      QueryStatus::Idle | QueryStatus::Error | QueryStatus::Loading => true,
      QueryStatus::Success => entry.is_stale(stale_time),
    };
    if !needs_fetch {
      return None;
    }
    let (_, notice) = self.start_fetch(state, key, fetcher);
    notice
  }

  /// Start a fetch under the binder lock. Listener calls for the loading
  /// transition are returned so the caller can make them once unlocked.
  fn start_fetch(
    &self,
    state: &mut BinderState,
    key: &QueryKey,
    fetcher: FetcherFn,
  ) -> (PendingFetch, Option<ChangeNotice>) {
    let (resolution, notice) = self.store.set_deferred(key, EntryPatch::FetchStarted);
    let version = match resolution {
      Resolution::Started(version) => version,
      _ => self.store.get(key).request_version,
    };
    debug!(%key, version, "fetch started");

    let request = fetcher();
    let store = self.store.clone();
    let binder_state = Arc::downgrade(&self.state);
    let task_key = key.clone();

    let fetch: BoxFuture<Resolution> = Box::pin(async move {
      let result = request.await;
      if let Err(e) = &result {
        warn!(key = %task_key, error = %e, "fetch failed");
      }

      let resolution = store.set(&task_key, EntryPatch::Resolved { version, result });

      if let Some(binder_state) = binder_state.upgrade() {
        let mut state = binder_state.lock();
        if state
          .pending
          .get(&task_key)
          .is_some_and(|(v, _)| *v == version)
        {
          state.pending.remove(&task_key);
        }
      }
      resolution
    });

    let pending = fetch.shared();
    state.pending.insert(key.clone(), (version, pending.clone()));
    tokio::spawn(pending.clone());
    (pending, notice)
  }
}

/// A typed snapshot of one query, as a view should render it.
#[derive(Debug, Clone)]
pub struct QueryView<T> {
  pub status: QueryStatus,
  /// Visible data: present on success, and while re-fetching if the query
  /// keeps previous data. Never present in the error state.
  pub data: Option<T>,
  pub error: Option<ApiError>,
  pub fetched_at: Option<Instant>,
}

impl<T> QueryView<T> {
  fn idle() -> Self {
    Self {
      status: QueryStatus::Idle,
      data: None,
      error: None,
      fetched_at: None,
    }
  }

  /// Loading with nothing to show yet
  pub fn is_loading(&self) -> bool {
    self.status == QueryStatus::Loading && self.data.is_none()
  }

  /// Any fetch in flight, including background re-fetches
  pub fn is_fetching(&self) -> bool {
    self.status == QueryStatus::Loading
  }

  pub fn is_success(&self) -> bool {
    self.status == QueryStatus::Success
  }

  pub fn is_error(&self) -> bool {
    self.status == QueryStatus::Error
  }
}

impl<T: DeserializeOwned> QueryView<T> {
  fn from_entry(key: &QueryKey, entry: &CacheEntry, keep_previous_data: bool) -> Self {
    let visible = match entry.status {
      QueryStatus::Success => true,
      QueryStatus::Loading | QueryStatus::Idle => keep_previous_data,
      QueryStatus::Error => false,
    };

    let data = if visible {
      entry.data.as_ref().and_then(|value| {
        T::deserialize(value)
          .map_err(|e| warn!(%key, error = %e, "cached data has unexpected shape"))
          .ok()
      })
    } else {
      None
    };

    Self {
      status: entry.status,
      data,
      error: entry.error.clone(),
      fetched_at: entry.fetched_at,
    }
  }
}

/// An active observation of one query key.
///
/// Dropping the handle stops observing the key; the cache entry is kept.
pub struct QueryHandle<T> {
  binder: QueryBinder,
  key: QueryKey,
  options: QueryOptions,
  _marker: PhantomData<fn() -> T>,
}

impl<T> QueryHandle<T> {
  fn new(binder: QueryBinder, key: QueryKey, options: QueryOptions) -> Self {
    Self {
      binder,
      key,
      options,
      _marker: PhantomData,
    }
  }

  pub fn key(&self) -> &QueryKey {
    &self.key
  }

  /// Start a new fetch, superseding one in flight. No-op when disabled.
  pub fn refetch(&self) {
    if self.options.enabled {
      self.binder.refetch(&self.key);
    }
  }

  /// Wait for the fetch in flight (if any) to land in the cache.
  pub async fn settled(&self) -> Option<Resolution> {
    let pending = self.binder.pending(&self.key)?;
    Some(pending.await)
  }
}

impl<T: for<'de> Deserialize<'de>> QueryHandle<T> {
  pub fn state(&self) -> QueryView<T> {
    if !self.options.enabled {
      return QueryView::idle();
    }
    let entry = self.binder.store.get(&self.key);
    QueryView::from_entry(&self.key, &entry, self.options.keep_previous_data)
  }

  pub fn data(&self) -> Option<T> {
    self.state().data
  }

  pub fn is_loading(&self) -> bool {
    self.state().is_loading()
  }
}

impl<T> Drop for QueryHandle<T> {
  fn drop(&mut self) {
    if self.options.enabled {
      self.binder.release(&self.key);
    }
  }
}

impl<T> std::fmt::Debug for QueryHandle<T> {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    f.debug_struct("QueryHandle")
      .field("key", &self.key)
      .field("options", &self.options)
      .finish_non_exhaustive()
  }
}
