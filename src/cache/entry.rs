use std::collections::BTreeSet;
use std::fmt;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde_json::Value;

use crate::transport::{ErrorInfo, TransportFuture};

use super::key::{QueryKey, Tag};

/// Creates the network future for one fetch of an entry.
pub type Fetcher = Arc<dyn Fn() -> TransportFuture + Send + Sync>;

/// Derives an entry's tags. Called with `None` at creation and with the
/// payload on every successful fetch.
pub type TagFn = Arc<dyn Fn(Option<&Value>) -> BTreeSet<Tag> + Send + Sync>;

/// Everything the store needs to (re)fetch an entry without the caller present.
#[derive(Clone)]
pub struct QuerySource {
  pub fetch: Fetcher,
  pub tags: TagFn,
}

impl QuerySource {
  pub fn new(fetch: Fetcher, tags: TagFn) -> Self {
    Self { fetch, tags }
  }
}

impl fmt::Debug for QuerySource {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("QuerySource").finish_non_exhaustive()
  }
}

/// Network lifecycle of an entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FetchStatus {
  Idle,
  Loading,
  Success,
  Error,
}

/// What a consumer is allowed to believe about an entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueryStatus {
  /// Never fetched.
  Idle,
  /// First fetch in flight, nothing to show yet.
  Loading,
  /// Data present but invalidated, a fetch is in flight.
  Refetching,
  /// Data present but invalidated, no fetch until the next access.
  Stale,
  /// Data is current.
  Success,
  /// The last fetch failed. Previous data, if any, is kept.
  Error,
}

/// Point-in-time copy of an entry for consumers.
#[derive(Debug, Clone)]
pub struct Snapshot {
  pub status: QueryStatus,
  pub data: Option<Value>,
  pub error: Option<ErrorInfo>,
  pub version: u64,
  pub fetched_at: Option<DateTime<Utc>>,
}

impl Snapshot {
  /// Data that may be shown as current. `None` while stale or refetching.
  pub fn fresh_data(&self) -> Option<&Value> {
    match self.status {
      QueryStatus::Success => self.data.as_ref(),
      _ => None,
    }
  }

  /// An access should start a fetch: never fetched, failed, or invalidated while cold.
  pub fn needs_fetch(&self) -> bool {
    matches!(
      self.status,
      QueryStatus::Idle | QueryStatus::Stale | QueryStatus::Error
    )
  }
}

/// One cached result.
#[derive(Debug)]
pub struct CacheEntry {
  pub(super) key: QueryKey,
  pub(super) status: FetchStatus,
  pub(super) data: Option<Value>,
  pub(super) error: Option<ErrorInfo>,
  pub(super) subscribers: usize,
  pub(super) tags: BTreeSet<Tag>,
  pub(super) stale: bool,
  pub(super) refetch_pending: bool,
  pub(super) version: u64,
  pub(super) fetched_at: Option<DateTime<Utc>>,
  pub(super) released_at: Option<DateTime<Utc>>,
  pub(super) source: QuerySource,
}

impl CacheEntry {
  pub(super) fn new(key: QueryKey, source: QuerySource, now: DateTime<Utc>) -> Self {
    let tags = (source.tags)(None);
    Self {
      key,
      status: FetchStatus::Idle,
      data: None,
      error: None,
      subscribers: 0,
      tags,
      stale: false,
      refetch_pending: false,
      version: 0,
      fetched_at: None,
      released_at: Some(now),
      source,
    }
  }

  pub fn key(&self) -> &QueryKey {
    &self.key
  }

  pub fn status(&self) -> FetchStatus {
    self.status
  }

  pub fn tags(&self) -> &BTreeSet<Tag> {
    &self.tags
  }

  pub fn subscribers(&self) -> usize {
    self.subscribers
  }

  pub fn query_status(&self) -> QueryStatus {
    match self.status {
      FetchStatus::Idle if self.stale => QueryStatus::Stale,
      FetchStatus::Idle => QueryStatus::Idle,
      FetchStatus::Loading if self.data.is_some() => QueryStatus::Refetching,
      FetchStatus::Loading => QueryStatus::Loading,
      FetchStatus::Error => QueryStatus::Error,
      FetchStatus::Success if self.stale => QueryStatus::Stale,
      FetchStatus::Success => QueryStatus::Success,
    }
  }

  pub fn snapshot(&self) -> Snapshot {
    Snapshot {
      status: self.query_status(),
      data: self.data.clone(),
      error: self.error.clone(),
      version: self.version,
      fetched_at: self.fetched_at,
    }
  }
}
