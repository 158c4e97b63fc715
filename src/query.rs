//! Read endpoints bound to the entity cache.
//!
//! A [`QueryEndpoint`] is a `const` declaration: entity kind, request builder
//! and the tags its results provide. Mounting one with parameters yields a
//! [`Query`] handle that holds a subscription on the cache entry for as long
//! as it lives, in the same spirit as a data-fetching hook.
//!
//! # Example
//!
//! ```ignore
//! let mut query = categories::LIST.query(&client, ListParams::page(1, 10));
//!
//! // In event loop tick
//! if query.poll() {
//!     // Entry changed, trigger re-render
//! }
//!
//! // In render
//! match query.state() {
//!     QueryState::Loading => render_spinner(),
//!     QueryState::Success(data) | QueryState::Refetching(data) => render_data(data),
//!     QueryState::Error { error, .. } => render_error(error),
//!     _ => {}
//! }
//! ```

use std::collections::BTreeSet;
use std::marker::PhantomData;
use std::sync::Arc;

use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use tracing::debug;

use crate::cache::{EntityKind, Fetcher, QueryKey, QuerySource, QueryStatus, Snapshot, Tag, TagFn};
use crate::client::ApiClient;
use crate::transport::{ErrorInfo, Request};

/// Which tags a query's cache entry is indexed under.
pub enum Provides<P> {
  /// Only the kind-level LIST tag.
  List,
  /// The LIST tag plus one instance tag per `data[].id` in the response.
  ListItems,
  /// One instance tag whose id is known from the parameters.
  Item(fn(&P) -> String),
  /// One instance tag taken from `data.id` in the response (lookups by slug).
  Entity,
}

impl<P> Clone for Provides<P> {
  fn clone(&self) -> Self {
    *self
  }
}

impl<P> Copy for Provides<P> {}

impl<P> Provides<P> {
  fn tag_fn(self, kind: EntityKind, params: &P) -> TagFn {
    match self {
      Provides::List => Arc::new(move |_: Option<&Value>| BTreeSet::from([Tag::list(kind)])),
      Provides::ListItems => Arc::new(move |data: Option<&Value>| -> BTreeSet<Tag> {
        let mut tags = BTreeSet::from([Tag::list(kind)]);
        let items = data.and_then(|d| d.get("data")).and_then(Value::as_array);
        for id in items.into_iter().flatten().filter_map(item_id) {
          tags.insert(Tag::item(kind, id));
        }
        tags
      }),
      Provides::Item(id_of) => {
        let tag = Tag::item(kind, id_of(params));
        Arc::new(move |_: Option<&Value>| BTreeSet::from([tag.clone()]))
      }
      Provides::Entity => Arc::new(move |data: Option<&Value>| -> BTreeSet<Tag> {
        data
          .and_then(|d| d.get("data"))
          .and_then(item_id)
          .map(|id| Tag::item(kind, id))
          .into_iter()
          .collect()
      }),
    }
  }
}

/// The `id` of a record, accepting string or numeric ids.
pub fn item_id(item: &Value) -> Option<String> {
  match item.get("id")? {
    Value::String(id) => Some(id.clone()),
    Value::Number(id) => Some(id.to_string()),
    _ => None,
  }
}

/// A declared read operation: `P` are its parameters, `T` the decoded response.
pub struct QueryEndpoint<P, T> {
  pub name: &'static str,
  pub kind: EntityKind,
  request: fn(&P) -> Request,
  provides: Provides<P>,
  _response: PhantomData<fn() -> T>,
}

impl<P, T> Clone for QueryEndpoint<P, T> {
  fn clone(&self) -> Self {
    *self
  }
}

impl<P, T> Copy for QueryEndpoint<P, T> {}

impl<P, T> QueryEndpoint<P, T> {
  pub const fn new(
    name: &'static str,
    kind: EntityKind,
    request: fn(&P) -> Request,
    provides: Provides<P>,
  ) -> Self {
    Self {
      name,
      kind,
      request,
      provides,
      _response: PhantomData,
    }
  }

  pub fn request(&self, params: &P) -> Request {
    (self.request)(params)
  }
}

impl<P: Serialize, T> QueryEndpoint<P, T> {
  /// Cache slot for `params`. Field order never affects the key.
  pub fn key(&self, params: &P) -> QueryKey {
    let value = serde_json::to_value(params).unwrap_or(Value::Null);
    QueryKey::new(self.kind, self.name, &value)
  }

  /// Everything the store needs to refetch this query on its own.
  pub fn source(&self, client: &ApiClient, params: &P) -> QuerySource {
    let request = self.request(params);
    let transport = Arc::clone(client.transport());
    let fetch: Fetcher = Arc::new(move || transport.request(request.clone()));
    QuerySource::new(fetch, self.provides.tag_fn(self.kind, params))
  }
}

impl<P, T> QueryEndpoint<P, T>
where
  P: Serialize + Clone,
  T: DeserializeOwned,
{
  /// Mount this endpoint with `params`.
  pub fn query(&self, client: &ApiClient, params: P) -> Query<P, T> {
    Query::new(client.clone(), *self, params)
  }
}

/// What a mounted query currently shows.
#[derive(Debug, Clone, PartialEq)]
pub enum QueryState<T> {
  /// Never fetched
  Idle,
  /// First fetch in flight
  Loading,
  /// Invalidated, refetch in flight. The data is the last good payload.
  Refetching(T),
  /// Invalidated and not yet refetched
  Stale(T),
  Success(T),
  /// Last fetch failed. `data` is the last good payload, if any.
  Error { error: ErrorInfo, data: Option<T> },
}

impl<T> QueryState<T> {
  pub fn is_loading(&self) -> bool {
    matches!(self, QueryState::Loading)
  }

  /// A fetch is in flight, with or without data to show.
  pub fn is_fetching(&self) -> bool {
    matches!(self, QueryState::Loading | QueryState::Refetching(_))
  }

  pub fn is_success(&self) -> bool {
    matches!(self, QueryState::Success(_))
  }

  pub fn is_error(&self) -> bool {
    matches!(self, QueryState::Error { .. })
  }

  /// Last known payload, including stale and refetching data.
  pub fn data(&self) -> Option<&T> {
    match self {
      QueryState::Refetching(data) | QueryState::Stale(data) | QueryState::Success(data) => {
        Some(data)
      }
      QueryState::Error { data, .. } => data.as_ref(),
      QueryState::Idle | QueryState::Loading => None,
    }
  }

  /// Payload that may be presented as current.
  pub fn fresh_data(&self) -> Option<&T> {
    match self {
      QueryState::Success(data) => Some(data),
      _ => None,
    }
  }

  pub fn error(&self) -> Option<&ErrorInfo> {
    match self {
      QueryState::Error { error, .. } => Some(error),
      _ => None,
    }
  }
}

/// A mounted query: one subscription on one cache entry.
///
/// Changing parameters moves the subscription to the new key. Dropping the
/// handle releases it; a fetch still in flight keeps running and caches its
/// result for the next consumer.
pub struct Query<P, T> {
  client: ApiClient,
  endpoint: QueryEndpoint<P, T>,
  params: P,
  key: QueryKey,
  seen_version: Option<u64>,
  state: QueryState<T>,
}

impl<P, T> Query<P, T>
where
  P: Serialize + Clone,
  T: DeserializeOwned,
{
  pub fn new(client: ApiClient, endpoint: QueryEndpoint<P, T>, params: P) -> Self {
    let key = endpoint.key(&params);
    let mut query = Self {
      client,
      endpoint,
      params,
      key,
      seen_version: None,
      state: QueryState::Idle,
    };
    query.mount();
    query
  }

  fn mount(&mut self) {
    let store = self.client.store();
    let source = self.endpoint.source(&self.client, &self.params);
    let snapshot = store.get_or_create(&self.key, source);
    store.subscribe(&self.key);
    if snapshot.needs_fetch() {
      store.begin_fetch(&self.key);
    }
    self.seen_version = None;
    self.poll();
  }

  pub fn params(&self) -> &P {
    &self.params
  }

  pub fn key(&self) -> &QueryKey {
    &self.key
  }

  /// Point the query at new parameters, releasing the previous key.
  pub fn set_params(&mut self, params: P) {
    let key = self.endpoint.key(&params);
    self.params = params;
    if key == self.key {
      return;
    }

    debug!(from = %self.key, to = %key, "query params changed");
    self.client.store().unsubscribe(&self.key);
    self.key = key;
    self.mount();
  }

  /// Fetch again, or join the fetch already in flight.
  pub fn refetch(&mut self) {
    self.client.store().begin_fetch(&self.key);
    self.poll();
  }

  /// Pick up changes to the cache entry.
  ///
  /// Returns `true` if the state changed. Call this in the event loop tick.
  pub fn poll(&mut self) -> bool {
    let Some(snapshot) = self.client.store().snapshot(&self.key) else {
      // Evicted from under a live subscription; mount it again.
      self.mount();
      return true;
    };
    if self.seen_version == Some(snapshot.version) {
      return false;
    }
    self.seen_version = Some(snapshot.version);
    self.state = decode(snapshot);
    true
  }

  /// Wait until no fetch is in flight for this query, then poll.
  pub async fn settled(&mut self) {
    while let Some(handle) = self.client.store().in_flight(&self.key) {
      let _ = handle.await;
    }
    self.poll();
  }

  pub fn state(&self) -> &QueryState<T> {
    &self.state
  }

  pub fn data(&self) -> Option<&T> {
    self.state.data()
  }

  pub fn fresh_data(&self) -> Option<&T> {
    self.state.fresh_data()
  }

  pub fn is_loading(&self) -> bool {
    self.state.is_loading()
  }

  pub fn is_fetching(&self) -> bool {
    self.state.is_fetching()
  }

  pub fn is_error(&self) -> bool {
    self.state.is_error()
  }

  pub fn error(&self) -> Option<&ErrorInfo> {
    self.state.error()
  }
}

impl<P, T> Drop for Query<P, T> {
  fn drop(&mut self) {
    self.client.store().unsubscribe(&self.key);
  }
}

fn decode<T: DeserializeOwned>(snapshot: Snapshot) -> QueryState<T> {
  let data = match snapshot.data.map(serde_json::from_value::<T>).transpose() {
    Ok(data) => data,
    Err(err) => {
      return QueryState::Error {
        error: ErrorInfo::decode(err),
        data: None,
      }
    }
  };

  match (snapshot.status, data) {
    (QueryStatus::Idle, _) => QueryState::Idle,
    (QueryStatus::Loading, _) | (QueryStatus::Refetching, None) => QueryState::Loading,
    (QueryStatus::Refetching, Some(data)) => QueryState::Refetching(data),
    (QueryStatus::Stale, Some(data)) => QueryState::Stale(data),
    (QueryStatus::Stale, None) => QueryState::Idle,
    (QueryStatus::Success, Some(data)) => QueryState::Success(data),
    (QueryStatus::Success, None) => QueryState::Idle,
    (QueryStatus::Error, data) => QueryState::Error {
      error: snapshot
        .error
        .unwrap_or_else(|| ErrorInfo::transport("request failed")),
      data,
    },
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::cache::CacheStore;
  use crate::transport::mock::MockTransport;
  use reqwest::Method;
  use serde::Deserialize;
  use serde_json::json;

  #[derive(Debug, Clone, Serialize)]
  struct PageParams {
    page: u32,
  }

  #[derive(Debug, Clone, PartialEq, Deserialize)]
  struct Envelope {
    data: Vec<Record>,
  }

  #[derive(Debug, Clone, PartialEq, Deserialize)]
  struct Record {
    id: String,
  }

  fn orders_request(params: &PageParams) -> Request {
    Request::get("/orders").with_params(json!({ "page": params.page }))
  }

  fn order_request(id: &String) -> Request {
    Request::get(format!("/orders/{}", id))
  }

  fn order_id(id: &String) -> String {
    id.clone()
  }

  fn slug_request(slug: &String) -> Request {
    Request::get(format!("/orders/slug/{}", slug))
  }

  const ORDERS: QueryEndpoint<PageParams, Envelope> =
    QueryEndpoint::new("orders", EntityKind::Order, orders_request, Provides::ListItems);
  const ORDER: QueryEndpoint<String, Value> =
    QueryEndpoint::new("order", EntityKind::Order, order_request, Provides::Item(order_id));
  const ORDER_BY_SLUG: QueryEndpoint<String, Value> =
    QueryEndpoint::new("order_by_slug", EntityKind::Order, slug_request, Provides::Entity);

  fn client(transport: &MockTransport) -> ApiClient {
    ApiClient::new(CacheStore::new(), Arc::new(transport.clone()))
  }

  fn orders_page() -> Value {
    json!({ "success": true, "data": [{ "id": "o1" }, { "id": "o2" }] })
  }

  #[tokio::test]
  async fn test_two_mounts_share_one_fetch() {
    let transport = MockTransport::new();
    transport.respond(Method::GET, "/orders", 200, orders_page());
    transport.close_gate();
    let client = client(&transport);

    let mut first = ORDERS.query(&client, PageParams { page: 1 });
    let mut second = ORDERS.query(&client, PageParams { page: 1 });
    assert_eq!(transport.calls(Method::GET, "/orders"), 1);
    assert!(first.is_loading());
    assert_eq!(client.store().subscriber_count(first.key()), 2);

    transport.open_gate();
    first.settled().await;
    second.settled().await;
    assert_eq!(transport.calls(Method::GET, "/orders"), 1);
    assert!(first.data().is_some());
    assert_eq!(first.data(), second.data());
    assert_eq!(first.fresh_data().map(|e| e.data.len()), Some(2));
  }

  #[tokio::test]
  async fn test_cached_result_served_without_fetch() {
    let transport = MockTransport::new();
    transport.respond(Method::GET, "/orders", 200, orders_page());
    let client = client(&transport);

    let mut first = ORDERS.query(&client, PageParams { page: 1 });
    first.settled().await;
    drop(first);

    let second = ORDERS.query(&client, PageParams { page: 1 });
    assert!(second.state().is_success());
    assert_eq!(transport.calls(Method::GET, "/orders"), 1);
  }

  #[tokio::test]
  async fn test_set_params_moves_subscription() {
    let transport = MockTransport::new();
    transport.respond(Method::GET, "/orders", 200, orders_page());
    let client = client(&transport);

    let mut query = ORDERS.query(&client, PageParams { page: 1 });
    query.settled().await;
    let old_key = query.key().clone();

    query.set_params(PageParams { page: 2 });
    assert_ne!(query.key(), &old_key);
    assert_eq!(client.store().subscriber_count(&old_key), 0);
    assert_eq!(client.store().subscriber_count(query.key()), 1);
    assert!(query.is_loading());

    query.settled().await;
    assert_eq!(transport.calls(Method::GET, "/orders"), 2);
    assert_eq!(query.params().page, 2);
  }

  #[tokio::test]
  async fn test_drop_releases_subscription() {
    let transport = MockTransport::new();
    let client = client(&transport);

    let query = ORDER.query(&client, "o1".to_string());
    let key = query.key().clone();
    assert_eq!(client.store().subscriber_count(&key), 1);
    drop(query);
    assert_eq!(client.store().subscriber_count(&key), 0);
  }

  #[tokio::test]
  async fn test_list_items_provide_instance_tags() {
    let transport = MockTransport::new();
    transport.respond(Method::GET, "/orders", 200, orders_page());
    let client = client(&transport);

    let mut query = ORDERS.query(&client, PageParams { page: 1 });
    query.settled().await;
    let tags = client.store().tags_of(query.key());
    assert!(tags.contains(&Tag::list(EntityKind::Order)));
    assert!(tags.contains(&Tag::item(EntityKind::Order, "o2")));
  }

  #[tokio::test]
  async fn test_item_and_entity_tags() {
    let transport = MockTransport::new();
    transport.respond(Method::GET, "/orders/slug/blue-mug", 200, json!({ "data": { "id": 7 } }));
    let client = client(&transport);

    let item = ORDER.query(&client, "o1".to_string());
    assert_eq!(
      client.store().tags_of(item.key()),
      BTreeSet::from([Tag::item(EntityKind::Order, "o1")])
    );

    let mut by_slug = ORDER_BY_SLUG.query(&client, "blue-mug".to_string());
    by_slug.settled().await;
    assert_eq!(
      client.store().tags_of(by_slug.key()),
      BTreeSet::from([Tag::item(EntityKind::Order, "7")])
    );
  }

  #[tokio::test]
  async fn test_error_state_and_refetch() {
    let transport = MockTransport::new();
    let client = client(&transport);

    let mut query = ORDER.query(&client, "missing".to_string());
    query.settled().await;
    assert!(query.is_error());
    assert!(query.error().is_some_and(ErrorInfo::is_not_found));

    transport.respond(Method::GET, "/orders/missing", 200, json!({ "data": { "id": "missing" } }));
    query.refetch();
    query.settled().await;
    assert!(query.state().is_success());
  }

  #[tokio::test]
  async fn test_shape_mismatch_is_decode_error() {
    let transport = MockTransport::new();
    transport.respond(Method::GET, "/orders", 200, json!({ "data": "not a list" }));
    let client = client(&transport);

    let mut query = ORDERS.query(&client, PageParams { page: 1 });
    query.settled().await;
    assert!(matches!(
      query.error(),
      Some(ErrorInfo::Decode { .. })
    ));
  }

  #[test]
  fn test_item_id_accepts_numbers() {
    assert_eq!(item_id(&json!({ "id": 12 })), Some("12".to_string()));
    assert_eq!(item_id(&json!({ "id": "p1" })), Some("p1".to_string()));
    assert_eq!(item_id(&json!({ "name": "x" })), None);
  }
}
