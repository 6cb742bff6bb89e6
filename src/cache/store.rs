//! In-memory keyed store with per-key subscriptions.

use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::{Arc, Weak};
use tracing::{debug, trace};

use super::entry::{CacheEntry, EntryPatch, Resolution};
use super::key::QueryKey;

/// Callback invoked after every change to a subscribed entry.
///
/// Listeners run synchronously on the task that made the change, after the
/// store lock and the binder's lock are released, so they may read back into
/// either. They must not block; posting an event to a channel is the
/// expected use.
pub type Listener = Arc<dyn Fn(&QueryKey, &CacheEntry) + Send + Sync>;

#[derive(Default)]
struct StoreInner {
  entries: HashMap<QueryKey, CacheEntry>,
  listeners: HashMap<QueryKey, Vec<(u64, Listener)>>,
  next_listener_id: u64,
  /// Last request version of evicted keys. A recreated entry continues from
  /// here so a fetch issued before the eviction can never match again.
  retired_versions: HashMap<QueryKey, u64>,
}

/// Listener calls for one change, held until the caller's locks are released
#[must_use = "listeners are only called by `send`"]
pub struct ChangeNotice {
  key: QueryKey,
  entry: CacheEntry,
  listeners: Vec<Listener>,
}

impl ChangeNotice {
  pub fn send(self) {
    for listener in &self.listeners {
      listener(&self.key, &self.entry);
    }
  }
}

/// The single source of truth for fetched data.
///
/// Cheap to clone; clones share the same entries.
#[derive(Clone, Default)]
pub struct CacheStore {
  inner: Arc<Mutex<StoreInner>>,
}

impl CacheStore {
  pub fn new() -> Self {
    Self::default()
  }

  /// Snapshot of the entry for `key`; an idle default if never seen.
  pub fn get(&self, key: &QueryKey) -> CacheEntry {
    self
      .inner
      .lock()
      .entries
      .get(key)
      .cloned()
      .unwrap_or_default()
  }

  /// Apply a patch to `key` and notify its listeners.
  ///
  /// A `Resolved` patch for a key that has been evicted is discarded rather
  /// than resurrecting the entry.
  pub fn set(&self, key: &QueryKey, patch: EntryPatch) -> Resolution {
    let (resolution, notification) = self.set_deferred(key, patch);
    if let Some(notification) = notification {
      notification.send();
    }
    resolution
  }

  /// Like `set`, but hands back the listener calls instead of making them.
  pub fn set_deferred(&self, key: &QueryKey, patch: EntryPatch) -> (Resolution, Option<ChangeNotice>) {
    let mut guard = self.inner.lock();
    let inner = &mut *guard;
    if !inner.entries.contains_key(key) {
      if matches!(patch, EntryPatch::Resolved { .. }) {
        return (Resolution::Discarded, None);
      }
      let request_version = inner.retired_versions.remove(key).unwrap_or(0);
      inner.entries.insert(
        key.clone(),
        CacheEntry {
          request_version,
          ..CacheEntry::default()
        },
      );
    }
    let Some(entry) = inner.entries.get_mut(key) else {
      return (Resolution::Discarded, None);
    };
    let resolution = entry.apply(patch);
    if resolution == Resolution::Discarded {
      debug!(%key, version = entry.request_version, "discarded stale response");
      return (resolution, None);
    }
    let snapshot = entry.clone();
    trace!(%key, ?resolution, "cache entry updated");

    let notification = Self::listeners_for(inner, key).map(|listeners| ChangeNotice {
      key: key.clone(),
      entry: snapshot,
      listeners,
    });
    (resolution, notification)
  }

  /// Mark every entry matching `predicate` stale and return their keys.
  ///
  /// Data is retained for stale-while-revalidate. Fetches that were in
  /// flight for these keys will be discarded when they land.
  pub fn invalidate<P>(&self, predicate: P) -> Vec<QueryKey>
  where
    P: Fn(&QueryKey) -> bool,
  {
    let mut notifications = Vec::new();
    let keys = {
      let mut inner = self.inner.lock();
      let mut keys = Vec::new();
      for (key, entry) in inner.entries.iter_mut() {
        if predicate(key) {
          entry.invalidate();
          keys.push((key.clone(), entry.clone()));
        }
      }
      for (key, snapshot) in &keys {
        if let Some(listeners) = Self::listeners_for(&inner, key) {
          notifications.push(ChangeNotice {
            key: key.clone(),
            entry: snapshot.clone(),
            listeners,
          });
        }
      }
      keys.into_iter().map(|(k, _)| k).collect::<Vec<_>>()
    };

    debug!(count = keys.len(), "invalidated cache entries");
    for notice in notifications {
      notice.send();
    }
    keys
  }

  /// Drop every entry matching `predicate`. Listeners stay registered and
  /// request versions keep counting up if the key is fetched again.
  pub fn evict<P>(&self, predicate: P) -> usize
  where
    P: Fn(&QueryKey) -> bool,
  {
    let mut guard = self.inner.lock();
    let inner = &mut *guard;
    let before = inner.entries.len();
    let retired = &mut inner.retired_versions;
    inner.entries.retain(|key, entry| {
      if predicate(key) {
        retired.insert(key.clone(), entry.request_version);
        false
      } else {
        true
      }
    });
    let evicted = before - inner.entries.len();
    debug!(evicted, "evicted cache entries");
    evicted
  }

  /// Register `listener` for changes to `key`.
  ///
  /// The returned guard unsubscribes when dropped.
  pub fn subscribe(&self, key: &QueryKey, listener: Listener) -> Subscription {
    let mut inner = self.inner.lock();
    let id = inner.next_listener_id;
    inner.next_listener_id += 1;
    inner
      .listeners
      .entry(key.clone())
      .or_default()
      .push((id, listener));

    Subscription {
      store: Arc::downgrade(&self.inner),
      key: key.clone(),
      id,
    }
  }

  pub fn contains(&self, key: &QueryKey) -> bool {
    self.inner.lock().entries.contains_key(key)
  }

  fn listeners_for(inner: &StoreInner, key: &QueryKey) -> Option<Vec<Listener>> {
    inner
      .listeners
      .get(key)
      .filter(|l| !l.is_empty())
      .map(|l| l.iter().map(|(_, listener)| Arc::clone(listener)).collect())
  }
}

/// Keeps a listener registered; dropping it unsubscribes.
#[must_use = "dropping a Subscription unsubscribes immediately"]
pub struct Subscription {
  store: Weak<Mutex<StoreInner>>,
  key: QueryKey,
  id: u64,
}

impl Subscription {
  pub fn key(&self) -> &QueryKey {
    &self.key
  }

  pub fn unsubscribe(self) {}
}

impl Drop for Subscription {
  fn drop(&mut self) {
    let Some(store) = self.store.upgrade() else {
      return;
    };
    let mut inner = store.lock();
    if let Some(listeners) = inner.listeners.get_mut(&self.key) {
      listeners.retain(|(id, _)| *id != self.id);
      if listeners.is_empty() {
        inner.listeners.remove(&self.key);
      }
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::cache::entry::QueryStatus;
  use serde_json::json;
  use std::sync::atomic::{AtomicUsize, Ordering};

  fn counting_listener() -> (Listener, Arc<AtomicUsize>) {
    let count = Arc::new(AtomicUsize::new(0));
    let c = Arc::clone(&count);
    let listener: Listener = Arc::new(move |_: &QueryKey, _: &CacheEntry| {
      c.fetch_add(1, Ordering::SeqCst);
    });
    (listener, count)
  }

  #[test]
  fn test_get_unseen_key_is_idle() {
    let store = CacheStore::new();
    let entry = store.get(&QueryKey::project("p1"));
    assert_eq!(entry.status, QueryStatus::Idle);
    assert!(entry.data.is_none());
    assert!(!store.contains(&QueryKey::project("p1")));
  }

  #[test]
  fn test_listener_sees_every_change() {
    let store = CacheStore::new();
    let key = QueryKey::project_chat("p1");
    let (listener, count) = counting_listener();
    let _sub = store.subscribe(&key, listener);

    let Resolution::Started(v) = store.set(&key, EntryPatch::FetchStarted) else {
      panic!("expected a started fetch");
    };
    store.set(
      &key,
      EntryPatch::Resolved {
        version: v,
        result: Ok(json!([])),
      },
    );
    store.invalidate(|k| k == &key);

    assert_eq!(count.load(Ordering::SeqCst), 3);
  }

  #[test]
  fn test_listener_not_called_for_other_keys_or_discards() {
    let store = CacheStore::new();
    let key = QueryKey::project_tasks("p1");
    let (listener, count) = counting_listener();
    let _sub = store.subscribe(&key, listener);

    store.set(&QueryKey::project("p1"), EntryPatch::FetchStarted);
    store.set(&key, EntryPatch::FetchStarted);
    store.set(&key, EntryPatch::FetchStarted);
    let stale = store.set(
      &key,
      EntryPatch::Resolved {
        version: 1,
        result: Ok(json!([])),
      },
    );

    assert_eq!(stale, Resolution::Discarded);
    assert_eq!(count.load(Ordering::SeqCst), 2);
  }

  #[test]
  fn test_dropping_subscription_unsubscribes() {
    let store = CacheStore::new();
    let key = QueryKey::project("p1");
    let (listener, count) = counting_listener();
    let sub = store.subscribe(&key, listener);

    store.set(&key, EntryPatch::Data(json!({})));
    sub.unsubscribe();
    store.set(&key, EntryPatch::Data(json!({})));

    assert_eq!(count.load(Ordering::SeqCst), 1);
  }

  #[test]
  fn test_invalidate_returns_matching_keys_and_keeps_data() {
    let store = CacheStore::new();
    store.set(&QueryKey::project("p1"), EntryPatch::Data(json!({"id": "p1"})));
    store.set(&QueryKey::project_tasks("p1"), EntryPatch::Data(json!([])));
    store.set(&QueryKey::project_tasks("p2"), EntryPatch::Data(json!([])));

    let keys = store.invalidate(|k| k.project_id() == Some("p1"));

    assert_eq!(keys.len(), 2);
    assert!(keys.contains(&QueryKey::project("p1")));
    let entry = store.get(&QueryKey::project("p1"));
    assert_eq!(entry.status, QueryStatus::Idle);
    assert!(entry.invalidated);
    assert_eq!(entry.data, Some(json!({"id": "p1"})));
    assert!(!store.get(&QueryKey::project_tasks("p2")).invalidated);
  }

  #[test]
  fn test_resolution_after_evict_is_discarded() {
    let store = CacheStore::new();
    let key = QueryKey::task_comments("p1", "t1");
    let Resolution::Started(v) = store.set(&key, EntryPatch::FetchStarted) else {
      panic!("expected a started fetch");
    };

    assert_eq!(store.evict(|k| k.project_id() == Some("p1")), 1);
    let late = store.set(
      &key,
      EntryPatch::Resolved {
        version: v,
        result: Ok(json!([])),
      },
    );

    assert_eq!(late, Resolution::Discarded);
    assert!(!store.contains(&key));
  }

  #[test]
  fn test_versions_keep_rising_across_evict() {
    let store = CacheStore::new();
    let key = QueryKey::project("p1");
    let Resolution::Started(before) = store.set(&key, EntryPatch::FetchStarted) else {
      panic!("expected a started fetch");
    };

    store.evict(|k| k == &key);
    let Resolution::Started(after) = store.set(&key, EntryPatch::FetchStarted) else {
      panic!("expected a started fetch");
    };
    assert!(after > before);

    let late = store.set(
      &key,
      EntryPatch::Resolved {
        version: before,
        result: Ok(json!({"name": "old"})),
      },
    );
    assert_eq!(late, Resolution::Discarded);
    assert!(store.get(&key).data.is_none());
  }

  #[test]
  fn test_deferred_notification_waits_for_send() {
    let store = CacheStore::new();
    let key = QueryKey::project_tasks("p1");
    let (listener, count) = counting_listener();
    let _sub = store.subscribe(&key, listener);

    let (resolution, notification) = store.set_deferred(&key, EntryPatch::FetchStarted);
    assert_eq!(resolution, Resolution::Started(1));
    assert_eq!(count.load(Ordering::SeqCst), 0);

    notification.expect("subscribed key notifies").send();
    assert_eq!(count.load(Ordering::SeqCst), 1);
  }
}
