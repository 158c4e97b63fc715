use std::collections::{BTreeSet, HashMap, HashSet};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use chrono::{DateTime, Duration, Utc};
use futures::future::{BoxFuture, FutureExt, Shared};
use serde_json::Value;
use tracing::{debug, info, warn};

use crate::transport::ErrorInfo;

use super::entry::{CacheEntry, FetchStatus, QuerySource, Snapshot};
use super::key::{QueryKey, Tag};

/// A fetch in flight. Every caller asking for the same key gets a clone.
pub type FetchHandle = Shared<BoxFuture<'static, Result<Value, ErrorInfo>>>;

#[derive(Default)]
struct StoreInner {
  entries: HashMap<QueryKey, CacheEntry>,
  tag_index: HashMap<Tag, HashSet<QueryKey>>,
  in_flight: HashMap<QueryKey, FetchHandle>,
}

/// The single source of truth mapping query keys to results and tags to keys.
///
/// All state lives behind one lock that is only ever held for a synchronous
/// step, never across an await. Each operation below is therefore atomic with
/// respect to every other, which is what makes fetch de-duplication a plain
/// check-and-insert.
#[derive(Clone)]
pub struct CacheStore {
  inner: Arc<Mutex<StoreInner>>,
  /// How long an entry without subscribers survives before eviction
  eviction_grace: Duration,
}

impl Default for CacheStore {
  fn default() -> Self {
    Self::new()
  }
}

impl CacheStore {
  pub fn new() -> Self {
    Self {
      inner: Arc::new(Mutex::new(StoreInner::default())),
      eviction_grace: Duration::seconds(60),
    }
  }

  pub fn with_eviction_grace(mut self, grace: Duration) -> Self {
    self.eviction_grace = grace;
    self
  }

  fn lock(&self) -> MutexGuard<'_, StoreInner> {
    self.inner.lock().unwrap_or_else(PoisonError::into_inner)
  }

  /// Return the entry for `key`, creating an idle one if missing.
  ///
  /// Registers the source's static tags. Never touches the network.
  pub fn get_or_create(&self, key: &QueryKey, source: QuerySource) -> Snapshot {
    let mut guard = self.lock();
    let inner = &mut *guard;

    if let Some(entry) = inner.entries.get(key) {
      return entry.snapshot();
    }

    let entry = CacheEntry::new(key.clone(), source, Utc::now());
    index_tags(&mut inner.tag_index, key, &entry.tags);
    let snapshot = entry.snapshot();
    inner.entries.insert(key.clone(), entry);
    debug!(key = %key, "cache entry created");
    snapshot
  }

  /// Start fetching `key`, or join the fetch already in flight.
  ///
  /// Returns `None` when the key has no entry. The fetch runs on its own task,
  /// so it completes and caches its result even if every caller goes away.
  pub fn begin_fetch(&self, key: &QueryKey) -> Option<FetchHandle> {
    let mut guard = self.lock();
    let (handle, started) = self.begin_fetch_locked(&mut guard, key)?;
    drop(guard);

    if started {
      tokio::spawn(handle.clone());
    }
    Some(handle)
  }

  fn begin_fetch_locked(&self, inner: &mut StoreInner, key: &QueryKey) -> Option<(FetchHandle, bool)> {
    if let Some(existing) = inner.in_flight.get(key) {
      debug!(key = %key, "joining in-flight fetch");
      return Some((existing.clone(), false));
    }

    let entry = inner.entries.get_mut(key)?;
    entry.status = FetchStatus::Loading;
    entry.refetch_pending = false;
    entry.version += 1;

    let request = (entry.source.fetch)();
    let store = self.clone();
    let settle_key = key.clone();
    let handle = async move {
      let result = request.await;
      store.settle(&settle_key, &result);
      result
    }
    .boxed()
    .shared();

    inner.in_flight.insert(key.clone(), handle.clone());
    let hash = key.cache_hash();
    debug!(key = %key, hash = &hash[..12], "fetch started");
    Some((handle, true))
  }

  /// Record a successful payload and re-derive the entry's tags from it.
  pub fn resolve(&self, key: &QueryKey, data: Value) {
    let mut guard = self.lock();
    resolve_locked(&mut guard, key, data);
  }

  /// Record a failure. Previous data stays in place.
  pub fn reject(&self, key: &QueryKey, error: ErrorInfo) {
    let mut guard = self.lock();
    reject_locked(&mut guard, key, error);
  }

  /// Completion of a fetch started by `begin_fetch`.
  fn settle(&self, key: &QueryKey, result: &Result<Value, ErrorInfo>) {
    let mut guard = self.lock();
    let inner = &mut *guard;
    inner.in_flight.remove(key);

    if !inner.entries.contains_key(key) {
      debug!(key = %key, "fetch settled for an evicted entry");
      return;
    }

    match result {
      Ok(data) => resolve_locked(inner, key, data.clone()),
      Err(err) => {
        warn!(key = %key, error = %err, "fetch failed");
        reject_locked(inner, key, err.clone());
      }
    }

    let Some(entry) = inner.entries.get_mut(key) else {
      return;
    };
    if !std::mem::take(&mut entry.refetch_pending) {
      return;
    }

    // Invalidated while this fetch was in flight: its result predates the change.
    entry.stale = true;
    entry.version += 1;
    if entry.subscribers == 0 {
      return;
    }

    let restarted = self.begin_fetch_locked(inner, key);
    drop(guard);
    if let Some((handle, true)) = restarted {
      tokio::spawn(handle);
    }
  }

  /// Mark every entry under any of `tags` stale and refetch the ones in use.
  ///
  /// Entries without subscribers stay stale until their next access. Entries
  /// already fetching get one more fetch once the current one settles.
  /// Returns the affected keys.
  pub fn invalidate(&self, tags: &BTreeSet<Tag>) -> Vec<QueryKey> {
    let mut guard = self.lock();
    let inner = &mut *guard;

    let keys: BTreeSet<QueryKey> = tags
      .iter()
      .filter_map(|tag| inner.tag_index.get(tag))
      .flatten()
      .cloned()
      .collect();

    let mut started = Vec::new();
    for key in &keys {
      let in_flight = inner.in_flight.contains_key(key);
      let Some(entry) = inner.entries.get_mut(key) else {
        continue;
      };
      entry.stale = true;
      entry.version += 1;

      if in_flight {
        entry.refetch_pending = true;
        continue;
      }
      if entry.subscribers == 0 {
        continue;
      }
      if let Some((handle, true)) = self.begin_fetch_locked(inner, key) {
        started.push(handle);
      }
    }
    drop(guard);

    info!(
      tags = ?tags.iter().map(Tag::to_string).collect::<Vec<_>>(),
      affected = keys.len(),
      refetching = started.len(),
      "cache invalidated"
    );
    for handle in started {
      tokio::spawn(handle);
    }
    keys.into_iter().collect()
  }

  /// Register one consumer of `key`.
  pub fn subscribe(&self, key: &QueryKey) {
    let mut guard = self.lock();
    match guard.entries.get_mut(key) {
      Some(entry) => {
        entry.subscribers += 1;
        entry.released_at = None;
      }
      None => warn!(key = %key, "subscribe to unknown cache entry"),
    }
  }

  /// Drop one consumer of `key`. In-flight fetches keep running.
  pub fn unsubscribe(&self, key: &QueryKey) {
    let mut guard = self.lock();
    if let Some(entry) = guard.entries.get_mut(key) {
      entry.subscribers = entry.subscribers.saturating_sub(1);
      if entry.subscribers == 0 {
        entry.released_at = Some(Utc::now());
      }
    }
  }

  pub fn snapshot(&self, key: &QueryKey) -> Option<Snapshot> {
    self.lock().entries.get(key).map(CacheEntry::snapshot)
  }

  /// The fetch currently in flight for `key`, if any.
  pub fn in_flight(&self, key: &QueryKey) -> Option<FetchHandle> {
    self.lock().in_flight.get(key).cloned()
  }

  pub fn subscriber_count(&self, key: &QueryKey) -> usize {
    self
      .lock()
      .entries
      .get(key)
      .map(CacheEntry::subscribers)
      .unwrap_or(0)
  }

  pub fn tags_of(&self, key: &QueryKey) -> BTreeSet<Tag> {
    self
      .lock()
      .entries
      .get(key)
      .map(|entry| entry.tags.clone())
      .unwrap_or_default()
  }

  pub fn keys_for_tag(&self, tag: &Tag) -> Vec<QueryKey> {
    let guard = self.lock();
    let mut keys: Vec<QueryKey> = guard
      .tag_index
      .get(tag)
      .map(|keys| keys.iter().cloned().collect())
      .unwrap_or_default();
    keys.sort();
    keys
  }

  pub fn len(&self) -> usize {
    self.lock().entries.len()
  }

  pub fn is_empty(&self) -> bool {
    self.len() == 0
  }

  /// Evict unused entries whose grace period has elapsed.
  pub fn collect_garbage(&self) -> usize {
    self.collect_garbage_at(Utc::now())
  }

  pub(crate) fn collect_garbage_at(&self, now: DateTime<Utc>) -> usize {
    let mut guard = self.lock();
    let inner = &mut *guard;

    let expired: Vec<QueryKey> = inner
      .entries
      .iter()
      .filter(|(key, entry)| {
        entry.subscribers == 0
          && !inner.in_flight.contains_key(*key)
          && entry
            .released_at
            .is_some_and(|released| now - released >= self.eviction_grace)
      })
      .map(|(key, _)| key.clone())
      .collect();

    for key in &expired {
      if let Some(entry) = inner.entries.remove(key) {
        unindex_tags(&mut inner.tag_index, key, &entry.tags);
        debug!(key = %key, "cache entry evicted");
      }
    }
    expired.len()
  }
}

fn resolve_locked(inner: &mut StoreInner, key: &QueryKey, data: Value) {
  let Some(entry) = inner.entries.get_mut(key) else {
    return;
  };

  let tags = (entry.source.tags)(Some(&data));
  entry.status = FetchStatus::Success;
  entry.data = Some(data);
  entry.error = None;
  entry.stale = false;
  entry.fetched_at = Some(Utc::now());
  entry.version += 1;

  let previous = std::mem::replace(&mut entry.tags, tags);
  unindex_tags(&mut inner.tag_index, key, &previous);
  index_tags(&mut inner.tag_index, key, &entry.tags);
  debug!(key = %key, tags = entry.tags.len(), "fetch resolved");
}

fn reject_locked(inner: &mut StoreInner, key: &QueryKey, error: ErrorInfo) {
  if let Some(entry) = inner.entries.get_mut(key) {
    entry.status = FetchStatus::Error;
    entry.error = Some(error);
    entry.version += 1;
  }
}

fn index_tags(index: &mut HashMap<Tag, HashSet<QueryKey>>, key: &QueryKey, tags: &BTreeSet<Tag>) {
  for tag in tags {
    index.entry(tag.clone()).or_default().insert(key.clone());
  }
}

fn unindex_tags(index: &mut HashMap<Tag, HashSet<QueryKey>>, key: &QueryKey, tags: &BTreeSet<Tag>) {
  for tag in tags {
    if let Some(keys) = index.get_mut(tag) {
      keys.remove(key);
      if keys.is_empty() {
        index.remove(tag);
      }
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::cache::{EntityKind, Fetcher, QueryStatus, TagFn};
  use crate::transport::mock::MockTransport;
  use crate::transport::{Request, Transport};
  use reqwest::Method;
  use serde_json::json;

  const PATH: &str = "/categories";

  fn list_source(transport: &MockTransport) -> QuerySource {
    let transport = transport.clone();
    let fetch: Fetcher = Arc::new(move || transport.request(Request::get(PATH)));
    let tags: TagFn = Arc::new(|data: Option<&Value>| {
      let mut tags = BTreeSet::from([Tag::list(EntityKind::Category)]);
      let items = data.and_then(|d| d.get("data")).and_then(Value::as_array);
      for item in items.into_iter().flatten() {
        if let Some(id) = item.get("id").and_then(Value::as_str) {
          tags.insert(Tag::item(EntityKind::Category, id));
        }
      }
      tags
    });
    QuerySource::new(fetch, tags)
  }

  fn key() -> QueryKey {
    QueryKey::new(EntityKind::Category, "categories", &json!({"page": 1, "limit": 10}))
  }

  fn page(ids: &[&str]) -> Value {
    let data: Vec<Value> = ids.iter().map(|id| json!({"id": id, "name": id})).collect();
    json!({"success": true, "data": data, "meta": {"pagination": {"total": ids.len()}}})
  }

  async fn settle(store: &CacheStore, key: &QueryKey) {
    while let Some(handle) = store.in_flight(key) {
      let _ = handle.await;
    }
  }

  #[tokio::test]
  async fn test_concurrent_fetches_are_deduplicated() {
    let transport = MockTransport::new();
    transport.respond(Method::GET, PATH, 200, page(&["c1"]));
    transport.close_gate();

    let store = CacheStore::new();
    let key = key();
    store.get_or_create(&key, list_source(&transport));
    store.get_or_create(&key, list_source(&transport));

    let first = store.begin_fetch(&key).unwrap();
    let second = store.begin_fetch(&key).unwrap();
    assert_eq!(transport.calls(Method::GET, PATH), 1);
    assert_eq!(store.snapshot(&key).unwrap().status, QueryStatus::Loading);

    transport.open_gate();
    let (a, b) = tokio::join!(first, second);
    assert_eq!(a.unwrap(), b.unwrap());
    assert_eq!(transport.calls(Method::GET, PATH), 1);
    assert_eq!(store.snapshot(&key).unwrap().status, QueryStatus::Success);
  }

  #[tokio::test]
  async fn test_invalidate_refetches_subscribed_entries() {
    let transport = MockTransport::new();
    transport.respond_once(Method::GET, PATH, 200, page(&["c1"]));
    transport.respond(Method::GET, PATH, 200, page(&["c1", "c2"]));

    let store = CacheStore::new();
    let key = key();
    store.get_or_create(&key, list_source(&transport));
    store.subscribe(&key);
    store.begin_fetch(&key).unwrap().await.unwrap();

    let affected = store.invalidate(&BTreeSet::from([Tag::list(EntityKind::Category)]));
    assert_eq!(affected, vec![key.clone()]);

    let snapshot = store.snapshot(&key).unwrap();
    assert_eq!(snapshot.status, QueryStatus::Refetching);
    assert!(snapshot.fresh_data().is_none());
    assert_eq!(transport.calls(Method::GET, PATH), 2);

    settle(&store, &key).await;
    let snapshot = store.snapshot(&key).unwrap();
    assert_eq!(snapshot.status, QueryStatus::Success);
    assert_eq!(snapshot.data.unwrap()["data"].as_array().unwrap().len(), 2);
  }

  #[tokio::test]
  async fn test_invalidate_leaves_cold_entries_stale() {
    let transport = MockTransport::new();
    transport.respond(Method::GET, PATH, 200, page(&["c1"]));

    let store = CacheStore::new();
    let key = key();
    store.get_or_create(&key, list_source(&transport));
    store.begin_fetch(&key).unwrap().await.unwrap();

    store.invalidate(&BTreeSet::from([Tag::item(EntityKind::Category, "c1")]));
    let snapshot = store.snapshot(&key).unwrap();
    assert_eq!(snapshot.status, QueryStatus::Stale);
    assert!(snapshot.needs_fetch());
    assert_eq!(transport.calls(Method::GET, PATH), 1);
    assert!(store.in_flight(&key).is_none());
  }

  #[tokio::test]
  async fn test_unrelated_tags_are_untouched() {
    let transport = MockTransport::new();
    transport.respond(Method::GET, PATH, 200, page(&["c1"]));

    let store = CacheStore::new();
    let key = key();
    store.get_or_create(&key, list_source(&transport));
    store.begin_fetch(&key).unwrap().await.unwrap();

    let affected = store.invalidate(&BTreeSet::from([Tag::list(EntityKind::Product)]));
    assert!(affected.is_empty());
    assert_eq!(store.snapshot(&key).unwrap().status, QueryStatus::Success);
  }

  #[tokio::test]
  async fn test_failed_refresh_keeps_previous_data() {
    let transport = MockTransport::new();
    transport.respond_once(Method::GET, PATH, 200, page(&["c1"]));
    transport.respond(Method::GET, PATH, 500, json!({"message": "database unavailable"}));

    let store = CacheStore::new();
    let key = key();
    store.get_or_create(&key, list_source(&transport));
    store.subscribe(&key);
    store.begin_fetch(&key).unwrap().await.unwrap();

    store.invalidate(&BTreeSet::from([Tag::list(EntityKind::Category)]));
    settle(&store, &key).await;

    let snapshot = store.snapshot(&key).unwrap();
    assert_eq!(snapshot.status, QueryStatus::Error);
    assert_eq!(snapshot.error.unwrap().message(), "database unavailable");
    assert_eq!(snapshot.data.unwrap()["data"][0]["id"], "c1");
  }

  #[tokio::test]
  async fn test_unsubscribe_during_fetch_still_caches_result() {
    let transport = MockTransport::new();
    transport.respond(Method::GET, PATH, 200, page(&["c1"]));
    transport.close_gate();

    let store = CacheStore::new();
    let key = key();
    store.get_or_create(&key, list_source(&transport));
    store.subscribe(&key);
    let handle = store.begin_fetch(&key).unwrap();
    store.unsubscribe(&key);
    assert_eq!(store.subscriber_count(&key), 0);

    transport.open_gate();
    assert!(handle.await.is_ok());
    assert_eq!(store.snapshot(&key).unwrap().status, QueryStatus::Success);
  }

  #[tokio::test]
  async fn test_invalidate_during_fetch_schedules_another() {
    let transport = MockTransport::new();
    transport.respond_once(Method::GET, PATH, 200, page(&["old"]));
    transport.respond(Method::GET, PATH, 200, page(&["new"]));
    transport.close_gate();

    let store = CacheStore::new();
    let key = key();
    store.get_or_create(&key, list_source(&transport));
    store.subscribe(&key);
    let first = store.begin_fetch(&key).unwrap();

    store.invalidate(&BTreeSet::from([Tag::list(EntityKind::Category)]));
    assert_eq!(transport.calls(Method::GET, PATH), 1);

    transport.open_gate();
    first.await.unwrap();
    settle(&store, &key).await;
    let snapshot = store.snapshot(&key).unwrap();
    assert_eq!(transport.calls(Method::GET, PATH), 2);
    assert_eq!(snapshot.status, QueryStatus::Success);
    assert_eq!(snapshot.data.unwrap()["data"][0]["id"], "new");
  }

  #[tokio::test]
  async fn test_invalidate_during_cold_fetch_leaves_result_stale() {
    let transport = MockTransport::new();
    transport.respond(Method::GET, PATH, 200, page(&["c1"]));
    transport.close_gate();

    let store = CacheStore::new();
    let key = key();
    store.get_or_create(&key, list_source(&transport));
    let handle = store.begin_fetch(&key).unwrap();
    store.invalidate(&BTreeSet::from([Tag::list(EntityKind::Category)]));

    transport.open_gate();
    handle.await.unwrap();
    assert_eq!(store.snapshot(&key).unwrap().status, QueryStatus::Stale);
    assert_eq!(transport.calls(Method::GET, PATH), 1);
  }

  #[tokio::test]
  async fn test_item_tags_follow_response() {
    let transport = MockTransport::new();
    transport.respond_once(Method::GET, PATH, 200, page(&["c1", "c2"]));
    transport.respond(Method::GET, PATH, 200, page(&["c2"]));

    let store = CacheStore::new();
    let key = key();
    store.get_or_create(&key, list_source(&transport));
    store.begin_fetch(&key).unwrap().await.unwrap();
    assert_eq!(store.keys_for_tag(&Tag::item(EntityKind::Category, "c1")), vec![key.clone()]);

    store.begin_fetch(&key).unwrap().await.unwrap();
    assert!(store.keys_for_tag(&Tag::item(EntityKind::Category, "c1")).is_empty());
    assert!(store.tags_of(&key).contains(&Tag::item(EntityKind::Category, "c2")));
  }

  #[tokio::test]
  async fn test_resolve_and_reject_directly() {
    let transport = MockTransport::new();
    let store = CacheStore::new();
    let key = key();
    store.get_or_create(&key, list_source(&transport));

    store.resolve(&key, page(&["c9"]));
    assert_eq!(store.snapshot(&key).unwrap().status, QueryStatus::Success);

    store.reject(&key, ErrorInfo::transport("offline"));
    let snapshot = store.snapshot(&key).unwrap();
    assert_eq!(snapshot.status, QueryStatus::Error);
    assert!(snapshot.data.is_some());
    assert_eq!(transport.requests().len(), 0);
  }

  #[tokio::test]
  async fn test_garbage_collection_respects_grace_and_subscribers() {
    let transport = MockTransport::new();
    let store = CacheStore::new().with_eviction_grace(Duration::seconds(30));
    let used = key();
    let unused = QueryKey::new(EntityKind::Category, "categories", &json!({"page": 2, "limit": 10}));
    store.get_or_create(&used, list_source(&transport));
    store.get_or_create(&unused, list_source(&transport));
    store.subscribe(&used);

    assert_eq!(store.collect_garbage_at(Utc::now()), 0);
    assert_eq!(store.collect_garbage_at(Utc::now() + Duration::seconds(31)), 1);
    assert_eq!(store.len(), 1);
    assert!(store.snapshot(&unused).is_none());
    assert_eq!(store.keys_for_tag(&Tag::list(EntityKind::Category)), vec![used.clone()]);

    store.unsubscribe(&used);
    assert_eq!(store.collect_garbage_at(Utc::now() + Duration::seconds(31)), 1);
    assert!(store.is_empty());
  }

  #[test]
  fn test_begin_fetch_unknown_key() {
    let store = CacheStore::new();
    assert!(store.begin_fetch(&key()).is_none());
  }
}
