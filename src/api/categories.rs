use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::cache::{EntityKind, Tag};
use crate::mutation::{item_tags, list_tags, MutationEndpoint};
use crate::query::{Provides, QueryEndpoint};
use crate::transport::Request;

use super::types::{ListParams, ListResponse, MutationResponse, StatusInput, UpdateInput};
use super::body;

const KIND: EntityKind = EntityKind::Category;

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Category {
  pub id: String,
  pub name: String,
  #[serde(default)]
  pub slug: String,
  #[serde(default)]
  pub description: Option<String>,
  #[serde(default)]
  pub image_url: Option<String>,
  #[serde(default)]
  pub parent_id: Option<String>,
  #[serde(default)]
  pub is_active: bool,
  #[serde(default)]
  pub created_at: Option<DateTime<Utc>>,
  #[serde(default)]
  pub updated_at: Option<DateTime<Utc>>,
  #[serde(default, rename = "_count")]
  pub count: Option<ProductCount>,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct ProductCount {
  #[serde(default)]
  pub products: u64,
}

impl Category {
  pub fn product_count(&self) -> u64 {
    self.count.as_ref().map(|c| c.products).unwrap_or(0)
  }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CategoryInput {
  pub name: String,
  #[serde(default)]
  pub description: String,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub image_url: Option<String>,
}

fn list_request(params: &ListParams) -> Request {
  Request::get("/categories").with_params(params.to_query())
}

fn create_request(input: &CategoryInput) -> Request {
  Request::post("/categories", body(input))
}

fn update_request(input: &UpdateInput<CategoryInput>) -> Request {
  Request::put(format!("/categories/{}", input.id), body(&input.data))
}

fn toggle_request(input: &StatusInput<bool>) -> Request {
  Request::patch(
    format!("/categories/{}/toggle-active", input.id),
    serde_json::json!({ "status": input.status }),
  )
}

fn delete_request(id: &String) -> Request {
  Request::delete(format!("/categories/{}", id))
}

fn created(_: &CategoryInput, _: &MutationResponse) -> BTreeSet<Tag> {
  list_tags(KIND)
}

fn updated(input: &UpdateInput<CategoryInput>, _: &MutationResponse) -> BTreeSet<Tag> {
  item_tags(KIND, input.id.as_str())
}

fn toggled(input: &StatusInput<bool>, _: &MutationResponse) -> BTreeSet<Tag> {
  item_tags(KIND, input.id.as_str())
}

fn deleted(id: &String, _: &MutationResponse) -> BTreeSet<Tag> {
  item_tags(KIND, id.as_str())
}

/// Server-paginated: `page, limit, search, sortBy, order`.
pub const LIST: QueryEndpoint<ListParams, ListResponse<Category>> =
  QueryEndpoint::new("categories", KIND, list_request, Provides::ListItems);

pub const CREATE: MutationEndpoint<CategoryInput, MutationResponse> =
  MutationEndpoint::new("create_category", KIND, create_request, created);

pub const UPDATE: MutationEndpoint<UpdateInput<CategoryInput>, MutationResponse> =
  MutationEndpoint::new("update_category", KIND, update_request, updated);

/// Body `{status}` carries the new active flag.
pub const TOGGLE_ACTIVE: MutationEndpoint<StatusInput<bool>, MutationResponse> =
  MutationEndpoint::new("toggle_category", KIND, toggle_request, toggled);

pub const DELETE: MutationEndpoint<String, MutationResponse> =
  MutationEndpoint::new("delete_category", KIND, delete_request, deleted);

#[cfg(test)]
mod tests {
  use super::*;
  use crate::cache::{CacheStore, QueryStatus};
  use crate::client::ApiClient;
  use crate::transport::mock::MockTransport;
  use reqwest::Method;
  use serde_json::json;
  use std::sync::Arc;

  fn setup() -> (MockTransport, ApiClient) {
    let transport = MockTransport::new();
    let client = ApiClient::new(CacheStore::new(), Arc::new(transport.clone()));
    (transport, client)
  }

  fn page(name: &str) -> serde_json::Value {
    json!({
      "success": true,
      "data": [{
        "id": "c1",
        "name": name,
        "slug": "mugs",
        "isActive": true,
        "createdAt": "2025-01-02T03:04:05Z",
        "_count": { "products": 4 }
      }],
      "meta": { "pagination": { "total": 1, "totalPages": 1, "page": 1, "limit": 10 } }
    })
  }

  #[test]
  fn test_decode_category() {
    let list: ListResponse<Category> = serde_json::from_value(page("Mugs")).unwrap();
    let category = &list.data[0];
    assert_eq!(category.slug, "mugs");
    assert!(category.is_active);
    assert_eq!(category.product_count(), 4);
    assert!(category.created_at.is_some());
  }

  #[test]
  fn test_requests() {
    let toggle = TOGGLE_ACTIVE.request(&StatusInput {
      id: "c1".to_string(),
      status: false,
    });
    assert_eq!(toggle.method, Method::PATCH);
    assert_eq!(toggle.path, "/categories/c1/toggle-active");
    assert_eq!(toggle.body, Some(json!({ "status": false })));

    let update = UPDATE.request(&UpdateInput {
      id: "c1".to_string(),
      data: CategoryInput {
        name: "X".to_string(),
        description: "Cups".to_string(),
        image_url: None,
      },
    });
    assert_eq!(update.method, Method::PUT);
    assert_eq!(update.body, Some(json!({ "name": "X", "description": "Cups" })));
  }

  #[test]
  fn test_invalidation_graph() {
    let response = MutationResponse {
      success: true,
      message: None,
      data: None,
    };
    assert_eq!(
      DELETE.invalidated_tags(&"c1".to_string(), &response),
      BTreeSet::from([Tag::item(KIND, "c1"), Tag::list(KIND)])
    );
    let input = CategoryInput {
      name: "New".to_string(),
      description: "New".to_string(),
      image_url: None,
    };
    assert_eq!(CREATE.invalidated_tags(&input, &response), list_tags(KIND));
  }

  #[tokio::test]
  async fn test_update_refetches_list() {
    let (transport, client) = setup();
    transport.respond_once(Method::GET, "/categories", 200, page("Mugs"));
    transport.respond(Method::GET, "/categories", 200, page("X"));
    transport.respond(Method::PUT, "/categories/c1", 200, json!({ "success": true }));

    let mut query = LIST.query(&client, ListParams::page(1, 10));
    query.settled().await;
    assert_eq!(query.fresh_data().unwrap().data[0].name, "Mugs");

    let input = UpdateInput {
      id: "c1".to_string(),
      data: CategoryInput {
        name: "X".to_string(),
        description: "Cups".to_string(),
        image_url: None,
      },
    };
    UPDATE.mutate(&client, &input).await.unwrap();

    // Success -> Refetching -> Success: the old array is never served as fresh.
    let snapshot = client.store().snapshot(query.key()).unwrap();
    assert_eq!(snapshot.status, QueryStatus::Refetching);
    assert!(snapshot.fresh_data().is_none());
    assert_eq!(transport.calls(Method::GET, "/categories"), 2);

    query.settled().await;
    assert_eq!(query.fresh_data().unwrap().data[0].name, "X");
  }
}
