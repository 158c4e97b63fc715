//! Write endpoints that invalidate the cache once the server confirms.

use std::collections::BTreeSet;
use std::future::Future;
use std::marker::PhantomData;

use serde::de::DeserializeOwned;
use tokio::sync::oneshot;
use tracing::{info, warn};

use crate::cache::{EntityKind, Tag};
use crate::client::ApiClient;
use crate::transport::{ErrorInfo, Request};

/// The kind-level LIST tag alone.
pub fn list_tags(kind: EntityKind) -> BTreeSet<Tag> {
  BTreeSet::from([Tag::list(kind)])
}

/// One record plus the LIST it appears in.
pub fn item_tags(kind: EntityKind, id: impl Into<String>) -> BTreeSet<Tag> {
  BTreeSet::from([Tag::item(kind, id), Tag::list(kind)])
}

/// A declared write operation.
///
/// `invalidates` is a pure function of the input and the decoded result, so
/// the invalidation graph can be inspected without touching the network.
pub struct MutationEndpoint<I, R> {
  pub name: &'static str,
  pub kind: EntityKind,
  request: fn(&I) -> Request,
  invalidates: fn(&I, &R) -> BTreeSet<Tag>,
  _result: PhantomData<fn() -> R>,
}

impl<I, R> Clone for MutationEndpoint<I, R> {
  fn clone(&self) -> Self {
    *self
  }
}

impl<I, R> Copy for MutationEndpoint<I, R> {}

impl<I, R> MutationEndpoint<I, R> {
  pub const fn new(
    name: &'static str,
    kind: EntityKind,
    request: fn(&I) -> Request,
    invalidates: fn(&I, &R) -> BTreeSet<Tag>,
  ) -> Self {
    Self {
      name,
      kind,
      request,
      invalidates,
      _result: PhantomData,
    }
  }

  pub fn request(&self, input: &I) -> Request {
    (self.request)(input)
  }

  pub fn invalidated_tags(&self, input: &I, result: &R) -> BTreeSet<Tag> {
    (self.invalidates)(input, result)
  }
}

impl<I, R: DeserializeOwned> MutationEndpoint<I, R> {
  /// Send the write and, on success, invalidate before returning.
  ///
  /// A failed request invalidates nothing. A confirmed write whose response
  /// cannot be decoded still happened, so the kind's LIST is invalidated
  /// before the decode error is returned.
  pub async fn mutate(&self, client: &ApiClient, input: &I) -> Result<R, ErrorInfo> {
    let request = self.request(input);
    let path = request.path.clone();

    let value = match client.transport().request(request).await {
      Ok(value) => value,
      Err(err) => {
        warn!(mutation = self.name, path = %path, error = %err, "mutation failed");
        return Err(err);
      }
    };

    match serde_json::from_value::<R>(value) {
      Ok(result) => {
        let tags = self.invalidated_tags(input, &result);
        info!(mutation = self.name, path = %path, "mutation succeeded");
        client.store().invalidate(&tags);
        Ok(result)
      }
      Err(err) => {
        warn!(mutation = self.name, path = %path, error = %err, "mutation response not understood");
        client.store().invalidate(&list_tags(self.kind));
        Err(ErrorInfo::decode(err))
      }
    }
  }
}

impl<I, R> MutationEndpoint<I, R>
where
  I: Send + Sync + 'static,
  R: DeserializeOwned + Send + 'static,
{
  /// Run the mutation on its own task so a view can keep drawing.
  pub fn spawn(&self, client: &ApiClient, input: I) -> PendingMutation<R> {
    let endpoint = *self;
    let client = client.clone();
    PendingMutation::spawn(async move { endpoint.mutate(&client, &input).await })
  }
}

/// A mutation running in the background, polled from the event loop tick.
pub struct PendingMutation<R> {
  receiver: oneshot::Receiver<Result<R, ErrorInfo>>,
}

impl<R: Send + 'static> PendingMutation<R> {
  pub fn spawn<F>(future: F) -> Self
  where
    F: Future<Output = Result<R, ErrorInfo>> + Send + 'static,
  {
    let (tx, rx) = oneshot::channel();
    tokio::spawn(async move {
      // Receiver may have been dropped
      let _ = tx.send(future.await);
    });
    Self { receiver: rx }
  }

  /// The outcome once available. Yields `Some` exactly once.
  pub fn poll(&mut self) -> Option<Result<R, ErrorInfo>> {
    match self.receiver.try_recv() {
      Ok(result) => Some(result),
      Err(oneshot::error::TryRecvError::Empty) => None,
      Err(oneshot::error::TryRecvError::Closed) => {
        Some(Err(ErrorInfo::transport("mutation was cancelled")))
      }
    }
  }

  pub async fn wait(self) -> Result<R, ErrorInfo> {
    self
      .receiver
      .await
      .unwrap_or_else(|_| Err(ErrorInfo::transport("mutation was cancelled")))
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::cache::{CacheStore, QueryStatus};
  use crate::query::{Provides, QueryEndpoint};
  use crate::transport::mock::MockTransport;
  use reqwest::Method;
  use serde_json::{json, Value};
  use std::sync::Arc;

  fn list_request(_: &()) -> Request {
    Request::get("/widgets")
  }

  fn rename_request(id: &String) -> Request {
    Request::put(format!("/widgets/{}", id), json!({ "name": "renamed" }))
  }

  fn rename_tags(id: &String, _: &Value) -> BTreeSet<Tag> {
    item_tags(EntityKind::Category, id.as_str())
  }

  const WIDGETS: QueryEndpoint<(), Value> =
    QueryEndpoint::new("widgets", EntityKind::Category, list_request, Provides::ListItems);
  const RENAME: MutationEndpoint<String, Value> =
    MutationEndpoint::new("rename_widget", EntityKind::Category, rename_request, rename_tags);

  #[derive(Debug, serde::Deserialize)]
  struct Strict {
    #[allow(dead_code)]
    data: Vec<String>,
  }

  fn rename_strict_tags(id: &String, _: &Strict) -> BTreeSet<Tag> {
    item_tags(EntityKind::Category, id.as_str())
  }

  const RENAME_STRICT: MutationEndpoint<String, Strict> = MutationEndpoint::new(
    "rename_widget_strict",
    EntityKind::Category,
    rename_request,
    rename_strict_tags,
  );

  fn setup() -> (MockTransport, ApiClient) {
    let transport = MockTransport::new();
    transport.respond(
      Method::GET,
      "/widgets",
      200,
      json!({ "success": true, "data": [{ "id": "w1" }] }),
    );
    let client = ApiClient::new(CacheStore::new(), Arc::new(transport.clone()));
    (transport, client)
  }

  #[test]
  fn test_item_tags_include_list() {
    let tags = item_tags(EntityKind::Product, "p1");
    assert!(tags.contains(&Tag::item(EntityKind::Product, "p1")));
    assert!(tags.contains(&Tag::list(EntityKind::Product)));
    assert_eq!(list_tags(EntityKind::Plan).len(), 1);
  }

  #[test]
  fn test_invalidated_tags_are_pure() {
    let tags = RENAME.invalidated_tags(&"w9".to_string(), &Value::Null);
    assert_eq!(tags, item_tags(EntityKind::Category, "w9"));
    assert_eq!(RENAME.request(&"w9".to_string()).path, "/widgets/w9");
  }

  #[tokio::test]
  async fn test_success_invalidates_before_returning() {
    let (transport, client) = setup();
    transport.respond(Method::PUT, "/widgets/w1", 200, json!({ "success": true }));

    let mut query = WIDGETS.query(&client, ());
    query.settled().await;
    assert!(query.state().is_success());

    RENAME.mutate(&client, &"w1".to_string()).await.unwrap();

    // The refetch has been issued by the time mutate returns.
    assert_eq!(transport.calls(Method::GET, "/widgets"), 2);
    let snapshot = client.store().snapshot(query.key()).unwrap();
    assert_ne!(snapshot.status, QueryStatus::Success);

    query.settled().await;
    assert!(query.state().is_success());
  }

  #[tokio::test]
  async fn test_failure_invalidates_nothing() {
    let (transport, client) = setup();
    transport.respond(
      Method::PUT,
      "/widgets/w1",
      422,
      json!({ "success": false, "message": "Name already exists" }),
    );

    let mut query = WIDGETS.query(&client, ());
    query.settled().await;

    let err = RENAME.mutate(&client, &"w1".to_string()).await.unwrap_err();
    assert_eq!(err.status(), Some(422));
    assert_eq!(err.message(), "Name already exists");
    assert_eq!(transport.calls(Method::GET, "/widgets"), 1);
    assert_eq!(
      client.store().snapshot(query.key()).unwrap().status,
      QueryStatus::Success
    );
  }

  #[tokio::test]
  async fn test_undecodable_result_still_invalidates_list() {
    let (transport, client) = setup();
    transport.respond(Method::PUT, "/widgets/w1", 200, json!({ "success": true }));

    let mut query = WIDGETS.query(&client, ());
    query.settled().await;

    let err = RENAME_STRICT.mutate(&client, &"w1".to_string()).await.unwrap_err();
    assert!(matches!(err, ErrorInfo::Decode { .. }));
    assert_eq!(transport.calls(Method::GET, "/widgets"), 2);
  }

  #[tokio::test]
  async fn test_spawned_mutation_polls_once() {
    let (transport, client) = setup();
    transport.respond(Method::PUT, "/widgets/w1", 200, json!({ "success": true }));
    transport.close_gate();

    let mut pending = RENAME.spawn(&client, "w1".to_string());
    assert!(pending.poll().is_none());

    transport.open_gate();
    let result = pending.wait().await.unwrap();
    assert_eq!(result["success"], true);
  }
}
