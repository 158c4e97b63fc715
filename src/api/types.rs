//! Wire envelopes shared by every entity endpoint.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{de, Deserialize, Deserializer, Serialize};
use serde_json::Value;

/// `{ success, data: [...], meta: { pagination } }`
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ListResponse<T> {
  #[serde(default)]
  pub success: bool,
  pub data: Vec<T>,
  #[serde(default)]
  pub meta: Option<ListMeta>,
}

impl<T> ListResponse<T> {
  /// Server-reported total, if the endpoint paginates.
  pub fn total(&self) -> Option<u64> {
    self
      .meta
      .as_ref()
      .and_then(|meta| meta.pagination.as_ref())
      .map(|pagination| pagination.total)
  }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ListMeta {
  #[serde(default)]
  pub pagination: Option<PaginationMeta>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaginationMeta {
  pub total: u64,
  #[serde(default)]
  pub total_pages: Option<u64>,
  #[serde(default)]
  pub page: Option<u64>,
  #[serde(default)]
  pub limit: Option<u64>,
}

/// `{ success, data: {...} }`
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ItemResponse<T> {
  #[serde(default)]
  pub success: bool,
  pub data: T,
}

/// `{ success, message?, data? }`
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct MutationResponse<T = Value> {
  #[serde(default)]
  pub success: bool,
  #[serde(default)]
  pub message: Option<String>,
  #[serde(default = "Option::default")]
  pub data: Option<T>,
}

impl<T> MutationResponse<T> {
  /// The server's message, or `fallback` when it sent none.
  pub fn message_or(&self, fallback: &str) -> String {
    self
      .message
      .clone()
      .filter(|m| !m.trim().is_empty())
      .unwrap_or_else(|| fallback.to_string())
  }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortOrder {
  Asc,
  #[default]
  Desc,
}

impl SortOrder {
  pub fn flip(self) -> Self {
    match self {
      SortOrder::Asc => SortOrder::Desc,
      SortOrder::Desc => SortOrder::Asc,
    }
  }

  pub fn as_str(self) -> &'static str {
    match self {
      SortOrder::Asc => "asc",
      SortOrder::Desc => "desc",
    }
  }
}

/// Conventional list query parameters. Unset members are not sent.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ListParams {
  /// 1-based
  #[serde(skip_serializing_if = "Option::is_none")]
  pub page: Option<usize>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub limit: Option<usize>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub search: Option<String>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub sort_by: Option<String>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub order: Option<SortOrder>,
  /// Entity-specific filters such as `isApproved`.
  #[serde(flatten)]
  pub filters: BTreeMap<String, Value>,
}

impl ListParams {
  pub fn page(page: usize, limit: usize) -> Self {
    Self {
      page: Some(page),
      limit: Some(limit),
      ..Self::default()
    }
  }

  pub fn to_query(&self) -> Value {
    serde_json::to_value(self).unwrap_or(Value::Null)
  }
}

/// `{ id, data }` input of the update mutations.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct UpdateInput<D> {
  pub id: String,
  pub data: D,
}

/// `{ id, status }` input of the status mutations.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StatusInput<S> {
  pub id: String,
  pub status: S,
}

/// Shorthand for the pieces of a record the console only displays.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NamedRef {
  #[serde(default)]
  pub id: String,
  #[serde(default)]
  pub name: String,
  #[serde(default)]
  pub slug: Option<String>,
}

/// Money fields arrive as numbers or as decimal strings.
pub fn amount<'de, D: Deserializer<'de>>(deserializer: D) -> Result<f64, D::Error> {
  #[derive(Deserialize)]
  #[serde(untagged)]
  enum Amount {
    Number(f64),
    Text(String),
  }

  match Option::<Amount>::deserialize(deserializer)? {
    None => Ok(0.0),
    Some(Amount::Number(n)) => Ok(n),
    Some(Amount::Text(s)) => s.trim().parse().map_err(de::Error::custom),
  }
}

/// Short display date such as `Mar 04, 2025`, or a dash when unknown.
pub fn format_date(date: Option<&DateTime<Utc>>) -> String {
  date
    .map(|d| d.format("%b %d, %Y").to_string())
    .unwrap_or_else(|| "-".to_string())
}

/// Two-decimal amount with a dollar sign.
pub fn money(amount: f64) -> String {
  format!("${:.2}", amount)
}
