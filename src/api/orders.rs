use std::collections::BTreeSet;
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::cache::{EntityKind, Tag};
use crate::mutation::{item_tags, MutationEndpoint};
use crate::query::{Provides, QueryEndpoint};
use crate::transport::Request;

use super::types::{amount, ListParams, ListResponse, MutationResponse, StatusInput};

const KIND: EntityKind = EntityKind::Order;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OrderStatus {
  Pending,
  Processing,
  Shipped,
  Delivered,
  Cancelled,
}

impl OrderStatus {
  pub fn as_str(self) -> &'static str {
    match self {
      OrderStatus::Pending => "pending",
      OrderStatus::Processing => "processing",
      OrderStatus::Shipped => "shipped",
      OrderStatus::Delivered => "delivered",
      OrderStatus::Cancelled => "cancelled",
    }
  }

  pub fn parse(status: &str) -> Option<Self> {
    match status.to_ascii_lowercase().as_str() {
      "pending" => Some(OrderStatus::Pending),
      "processing" => Some(OrderStatus::Processing),
      "shipped" => Some(OrderStatus::Shipped),
      "delivered" => Some(OrderStatus::Delivered),
      "cancelled" => Some(OrderStatus::Cancelled),
      _ => None,
    }
  }

  /// Delivered and cancelled orders take no further admin transitions.
  pub fn is_terminal(self) -> bool {
    matches!(self, OrderStatus::Delivered | OrderStatus::Cancelled)
  }
}

impl fmt::Display for OrderStatus {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(self.as_str())
  }
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Customer {
  #[serde(default)]
  pub display_name: Option<String>,
  #[serde(default)]
  pub email: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Order {
  pub id: String,
  #[serde(default)]
  pub order_number: String,
  #[serde(default)]
  pub user: Option<Customer>,
  #[serde(default, deserialize_with = "amount")]
  pub grand_total: f64,
  #[serde(default)]
  pub payment_status: String,
  #[serde(default)]
  pub status: String,
  #[serde(default)]
  pub created_at: Option<DateTime<Utc>>,
}

impl Order {
  pub fn customer_name(&self) -> &str {
    self
      .user
      .as_ref()
      .and_then(|u| u.display_name.as_deref())
      .unwrap_or("N/A")
  }

  pub fn customer_email(&self) -> &str {
    self
      .user
      .as_ref()
      .and_then(|u| u.email.as_deref())
      .unwrap_or("N/A")
  }

  pub fn status(&self) -> Option<OrderStatus> {
    OrderStatus::parse(&self.status)
  }

  /// Status changes an admin may apply from the order table.
  pub fn admin_transitions(&self) -> Vec<OrderStatus> {
    match self.status() {
      Some(status) if status.is_terminal() => Vec::new(),
      _ => vec![OrderStatus::Delivered, OrderStatus::Processing],
    }
  }
}

/// The admin listing returns every order; the table pages it locally.
fn list_request(_: &ListParams) -> Request {
  Request::get("/orders/admin/all")
}

fn status_request(input: &StatusInput<OrderStatus>) -> Request {
  Request::patch(
    format!("/orders/{}/status", input.id),
    json!({ "status": input.status }),
  )
}

fn status_updated(input: &StatusInput<OrderStatus>, _: &MutationResponse) -> BTreeSet<Tag> {
  item_tags(KIND, input.id.as_str())
}

pub const LIST: QueryEndpoint<ListParams, ListResponse<Order>> =
  QueryEndpoint::new("orders", KIND, list_request, Provides::ListItems);

pub const UPDATE_STATUS: MutationEndpoint<StatusInput<OrderStatus>, MutationResponse> =
  MutationEndpoint::new("update_order_status", KIND, status_request, status_updated);
