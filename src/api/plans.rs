use std::collections::{BTreeMap, BTreeSet};

use chrono::{DateTime, Utc};
use serde::Deserialize;
use serde_json::Value;

use crate::cache::{EntityKind, Tag};
use crate::mutation::{item_tags, list_tags, MutationEndpoint};
use crate::query::{Provides, QueryEndpoint};
use crate::transport::Request;

use super::types::{amount, ItemResponse, ListParams, ListResponse, MutationResponse, UpdateInput};

const KIND: EntityKind = EntityKind::Plan;

/// Numeric plan limits and their display labels, in display order.
pub const LIMIT_LABELS: [(&str, &str); 6] = [
  ("maxClients", "Clients"),
  ("maxEmployees", "Employees"),
  ("maxTools", "Tools"),
  ("maxVehicles", "Vehicles"),
  ("maxInspectionsPerMonth", "Inspections / Month"),
  ("onboardingFee", "Onboarding Fee ($)"),
];

/// Feature switches stored among the limits.
pub const LIMIT_BOOL_LABELS: [(&str, &str); 6] = [
  ("enableSMS", "Enable SMS"),
  ("enableMultiSite", "Multi-site"),
  ("enableAdvancedAnalytics", "Analytics"),
  ("enablePrioritySupport", "Priority Support"),
  ("enableAPI", "API Access"),
  ("enableIntegrations", "Integrations"),
];

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Plan {
  pub id: String,
  pub name: String,
  #[serde(default)]
  pub description: Option<String>,
  #[serde(default, deserialize_with = "amount")]
  pub price: f64,
  #[serde(default)]
  pub billing_cycle: String,
  #[serde(default)]
  pub features: Vec<String>,
  #[serde(default)]
  pub limits: BTreeMap<String, Value>,
  #[serde(default)]
  pub status: String,
  #[serde(default)]
  pub created_at: Option<DateTime<Utc>>,
}

impl Plan {
  /// Compact one-line rendering of the known limits, e.g.
  /// `Clients: 10, Tools: 50, API Access`.
  pub fn limits_summary(&self) -> String {
    let numbers = LIMIT_LABELS.iter().filter_map(|(key, label)| {
      match self.limits.get(*key) {
        Some(Value::Number(n)) => Some(format!("{}: {}", label, n)),
        Some(Value::String(s)) if !s.is_empty() => Some(format!("{}: {}", label, s)),
        _ => None,
      }
    });
    let switches = LIMIT_BOOL_LABELS
      .iter()
      .filter(|(key, _)| self.limits.get(*key) == Some(&Value::Bool(true)))
      .map(|(_, label)| label.to_string());

    let parts: Vec<String> = numbers.chain(switches).collect();
    if parts.is_empty() {
      "-".to_string()
    } else {
      parts.join(", ")
    }
  }
}

/// Every plan arrives in one response; paging happens in the table.
fn list_request(_: &ListParams) -> Request {
  Request::get("/plans")
}

fn get_request(id: &String) -> Request {
  Request::get(format!("/plans/{}", id))
}

fn same_id(id: &String) -> String {
  id.clone()
}

fn create_request(input: &Value) -> Request {
  Request::post("/plans", input.clone())
}

/// The server rejects bodies that repeat the path id.
fn update_request(input: &UpdateInput<Value>) -> Request {
  let mut data = input.data.clone();
  if let Some(object) = data.as_object_mut() {
    object.remove("id");
  }
  Request::put(format!("/plans/{}", input.id), data)
}

fn delete_request(id: &String) -> Request {
  Request::delete(format!("/plans/{}", id))
}

fn created(_: &Value, _: &MutationResponse) -> BTreeSet<Tag> {
  list_tags(KIND)
}

fn updated(input: &UpdateInput<Value>, _: &MutationResponse) -> BTreeSet<Tag> {
  item_tags(KIND, input.id.as_str())
}

fn deleted(id: &String, _: &MutationResponse) -> BTreeSet<Tag> {
  item_tags(KIND, id.as_str())
}

pub const LIST: QueryEndpoint<ListParams, ListResponse<Plan>> =
  QueryEndpoint::new("plans", KIND, list_request, Provides::ListItems);

pub const GET: QueryEndpoint<String, ItemResponse<Plan>> =
  QueryEndpoint::new("plan", KIND, get_request, Provides::Item(same_id));

pub const CREATE: MutationEndpoint<Value, MutationResponse> =
  MutationEndpoint::new("create_plan", KIND, create_request, created);

pub const UPDATE: MutationEndpoint<UpdateInput<Value>, MutationResponse> =
  MutationEndpoint::new("update_plan", KIND, update_request, updated);

pub const DELETE: MutationEndpoint<String, MutationResponse> =
  MutationEndpoint::new("delete_plan", KIND, delete_request, deleted);
