//! Entity cache: query results keyed by entity kind and parameters.
//!
//! This module provides a process-wide cache that:
//! - Keys results by (entity kind, endpoint, canonical parameters)
//! - Tracks per-key loading/error/data state and subscriber counts
//! - Indexes entries by semantic tags so a mutation can invalidate exactly
//!   the results it affects
//! - De-duplicates concurrent fetches for the same key
//! - Keeps the last good payload visible when a refresh fails

mod entry;
mod key;
mod store;

pub use entry::{Fetcher, QuerySource, QueryStatus, Snapshot, TagFn};
pub use key::{EntityKind, QueryKey, Tag};
pub use store::CacheStore;
