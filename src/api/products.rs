use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::cache::{EntityKind, Tag};
use crate::mutation::{item_tags, list_tags, MutationEndpoint};
use crate::query::{Provides, QueryEndpoint};
use crate::transport::Request;

use super::body;
use super::types::{
  amount, ItemResponse, ListParams, ListResponse, MutationResponse, NamedRef, StatusInput,
  UpdateInput,
};

const KIND: EntityKind = EntityKind::Product;

/// Column the product table sorts by unless told otherwise.
pub const DEFAULT_SORT_COLUMN: &str = "createdAt";

pub const IN_STOCK: &str = "in_stock";
pub const OUT_OF_STOCK: &str = "out_of_stock";

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Product {
  pub id: String,
  pub name: String,
  #[serde(default)]
  pub slug: Option<String>,
  #[serde(default)]
  pub description: String,
  #[serde(default)]
  pub short_description: Option<String>,
  #[serde(default, deserialize_with = "amount")]
  pub price: f64,
  #[serde(default, deserialize_with = "amount")]
  pub discount_price: f64,
  #[serde(default)]
  pub stock: i64,
  #[serde(default)]
  pub sku: String,
  #[serde(default)]
  pub images: Vec<String>,
  #[serde(default)]
  pub featured_image: Option<String>,
  #[serde(default)]
  pub is_featured: bool,
  #[serde(default)]
  pub is_new_arrival: bool,
  #[serde(default)]
  pub status: String,
  #[serde(default)]
  pub category: Option<NamedRef>,
  #[serde(default)]
  pub avg_rating: f64,
  #[serde(default)]
  pub review_count: u64,
  #[serde(default)]
  pub created_at: Option<DateTime<Utc>>,
  #[serde(default)]
  pub updated_at: Option<DateTime<Utc>>,
}

impl Product {
  pub fn category_name(&self) -> &str {
    self.category.as_ref().map(|c| c.name.as_str()).unwrap_or("-")
  }

  /// Stock status the stock toggle moves this product to.
  pub fn next_stock_status(&self) -> &'static str {
    if self.status == IN_STOCK {
      OUT_OF_STOCK
    } else {
      IN_STOCK
    }
  }

  /// Price after discount, when a discount is set.
  pub fn effective_price(&self) -> f64 {
    if self.discount_price > 0.0 && self.discount_price < self.price {
      self.discount_price
    } else {
      self.price
    }
  }
}

/// Create/update payload. Unset members are left out of the body.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProductInput {
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub name: Option<String>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub description: Option<String>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub price: Option<f64>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub discount_price: Option<f64>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub stock: Option<i64>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub sku: Option<String>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub featured_image: Option<String>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub is_featured: Option<bool>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub category_id: Option<String>,
}

fn list_request(params: &ListParams) -> Request {
  Request::get("/products").with_params(params.to_query())
}

fn get_request(id: &String) -> Request {
  Request::get(format!("/products/{}", id))
}

fn same_id(id: &String) -> String {
  id.clone()
}

fn slug_request(slug: &String) -> Request {
  Request::get(format!("/products/slug/{}", slug))
}

fn featured_request(_: &()) -> Request {
  Request::get("/products/featured")
}

fn new_arrivals_request(_: &()) -> Request {
  Request::get("/products/new-arrivals")
}

fn top_rated_request(_: &()) -> Request {
  Request::get("/products/top-rated")
}

fn related_request(id: &String) -> Request {
  Request::get(format!("/products/{}/related", id))
}

fn create_request(input: &ProductInput) -> Request {
  Request::post("/products", body(input))
}

fn update_request(input: &UpdateInput<ProductInput>) -> Request {
  Request::put(format!("/products/{}", input.id), body(&input.data))
}

fn stock_request(input: &StatusInput<String>) -> Request {
  Request::patch(
    format!("/products/{}/stock", input.id),
    json!({ "status": input.status }),
  )
}

fn delete_request(id: &String) -> Request {
  Request::delete(format!("/products/{}", id))
}

fn created(_: &ProductInput, _: &MutationResponse) -> BTreeSet<Tag> {
  list_tags(KIND)
}

fn updated(input: &UpdateInput<ProductInput>, _: &MutationResponse) -> BTreeSet<Tag> {
  item_tags(KIND, input.id.as_str())
}

fn stock_updated(input: &StatusInput<String>, _: &MutationResponse) -> BTreeSet<Tag> {
  item_tags(KIND, input.id.as_str())
}

fn deleted(id: &String, _: &MutationResponse) -> BTreeSet<Tag> {
  item_tags(KIND, id.as_str())
}

/// Server-paginated, sorted by `createdAt desc` by default.
pub const LIST: QueryEndpoint<ListParams, ListResponse<Product>> =
  QueryEndpoint::new("products", KIND, list_request, Provides::ListItems);

pub const GET: QueryEndpoint<String, ItemResponse<Product>> =
  QueryEndpoint::new("product", KIND, get_request, Provides::Item(same_id));

pub const BY_SLUG: QueryEndpoint<String, ItemResponse<Product>> =
  QueryEndpoint::new("product_by_slug", KIND, slug_request, Provides::Entity);

pub const FEATURED: QueryEndpoint<(), ListResponse<Product>> =
  QueryEndpoint::new("featured_products", KIND, featured_request, Provides::ListItems);

pub const NEW_ARRIVALS: QueryEndpoint<(), ListResponse<Product>> =
  QueryEndpoint::new("new_arrival_products", KIND, new_arrivals_request, Provides::ListItems);

pub const TOP_RATED: QueryEndpoint<(), ListResponse<Product>> =
  QueryEndpoint::new("top_rated_products", KIND, top_rated_request, Provides::ListItems);

/// Products in the same category as the given product.
pub const RELATED: QueryEndpoint<String, ListResponse<Product>> =
  QueryEndpoint::new("related_products", KIND, related_request, Provides::ListItems);

pub const CREATE: MutationEndpoint<ProductInput, MutationResponse> =
  MutationEndpoint::new("create_product", KIND, create_request, created);

pub const UPDATE: MutationEndpoint<UpdateInput<ProductInput>, MutationResponse> =
  MutationEndpoint::new("update_product", KIND, update_request, updated);

pub const UPDATE_STOCK: MutationEndpoint<StatusInput<String>, MutationResponse> =
  MutationEndpoint::new("update_product_stock", KIND, stock_request, stock_updated);

pub const DELETE: MutationEndpoint<String, MutationResponse> =
  MutationEndpoint::new("delete_product", KIND, delete_request, deleted);

#[cfg(test)]
mod tests {
  use super::*;
  use crate::cache::{CacheStore, QueryStatus};
  use crate::client::ApiClient;
  use crate::query::QueryState;
  use crate::transport::mock::MockTransport;
  use reqwest::Method;
  use std::sync::Arc;

  fn setup() -> (MockTransport, ApiClient) {
    let transport = MockTransport::new();
    let client = ApiClient::new(CacheStore::new(), Arc::new(transport.clone()));
    (transport, client)
  }

  fn product_json(id: &str) -> serde_json::Value {
    json!({
      "id": id,
      "name": "Blue mug",
      "price": "12.00",
      "discountPrice": 9.5,
      "stock": 3,
      "status": "in_stock",
      "category": { "id": "c1", "name": "Mugs", "slug": "mugs" }
    })
  }

  #[test]
  fn test_decode_product() {
    let product: Product = serde_json::from_value(product_json("p1")).unwrap();
    assert_eq!(product.price, 12.0);
    assert_eq!(product.effective_price(), 9.5);
    assert_eq!(product.category_name(), "Mugs");
  }

  #[test]
  fn test_sibling_endpoints_never_share_a_slot() {
    assert_ne!(FEATURED.key(&()), TOP_RATED.key(&()));
    assert_ne!(GET.key(&"p1".to_string()), RELATED.key(&"p1".to_string()));
  }

  #[test]
  fn test_update_body_omits_unset_fields() {
    let request = UPDATE.request(&UpdateInput {
      id: "p1".to_string(),
      data: ProductInput {
        stock: Some(10),
        is_featured: Some(true),
        ..ProductInput::default()
      },
    });
    assert_eq!(request.path, "/products/p1");
    assert_eq!(request.body, Some(json!({ "stock": 10, "isFeatured": true })));
  }

  #[tokio::test]
  async fn test_delete_refetches_mounted_item_into_not_found() {
    let (transport, client) = setup();
    transport.respond(
      Method::GET,
      "/products/p1",
      200,
      json!({ "success": true, "data": product_json("p1") }),
    );
    transport.respond(Method::DELETE, "/products/p1", 200, json!({ "success": true }));

    let mut detail = GET.query(&client, "p1".to_string());
    detail.settled().await;
    assert!(detail.state().is_success());

    transport.respond(Method::GET, "/products", 200, json!({ "success": true, "data": [] }));
    let mut list = LIST.query(&client, ListParams::page(1, 10));
    list.settled().await;

    transport.respond(
      Method::GET,
      "/products/p1",
      404,
      json!({ "success": false, "message": "Product not found" }),
    );
    let response = DELETE.mutate(&client, &"p1".to_string()).await.unwrap();
    assert!(response.success);

    assert_eq!(
      client.store().snapshot(detail.key()).unwrap().status,
      QueryStatus::Refetching
    );
    assert_eq!(transport.calls(Method::GET, "/products/p1"), 2);

    detail.settled().await;
    match detail.state() {
      QueryState::Error { error, data } => {
        assert!(error.is_not_found());
        assert_eq!(error.message(), "Product not found");
        // Last good record stays available alongside the error.
        assert_eq!(data.as_ref().map(|d| d.data.id.as_str()), Some("p1"));
      }
      other => panic!("expected error state, got {:?}", other),
    }
  }

  #[tokio::test]
  async fn test_by_slug_is_invalidated_by_item_tag() {
    let (transport, client) = setup();
    transport.respond(
      Method::GET,
      "/products/slug/blue-mug",
      200,
      json!({ "success": true, "data": product_json("p7") }),
    );
    transport.respond(Method::PATCH, "/products/p7/stock", 200, json!({ "success": true }));

    let mut by_slug = BY_SLUG.query(&client, "blue-mug".to_string());
    by_slug.settled().await;

    UPDATE_STOCK
      .mutate(
        &client,
        &StatusInput {
          id: "p7".to_string(),
          status: "out_of_stock".to_string(),
        },
      )
      .await
      .unwrap();
    assert_eq!(transport.calls(Method::GET, "/products/slug/blue-mug"), 2);
  }
}
