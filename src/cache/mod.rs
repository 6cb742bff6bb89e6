//! Keyed, versioned in-memory cache for remote resources.
//!
//! - Entries are addressed by `QueryKey` (resource type + parameters)
//! - Each entry tracks data, status, last error, fetch time and a request version
//! - A response is applied only if its version is still current
//! - Listeners subscribe per key and are notified on every change

mod entry;
mod key;
mod store;

pub use entry::{CacheEntry, EntryPatch, QueryStatus, Resolution};
pub use key::QueryKey;
pub use store::{CacheStore, Listener, ChangeNotice, Subscription};
