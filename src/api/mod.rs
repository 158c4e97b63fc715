//! Endpoint catalogue of the commerce API.
//!
//! Each entity module declares its records and its `const` query and
//! mutation endpoints. Every endpoint tags per id plus the kind's LIST.

pub mod categories;
pub mod orders;
pub mod plans;
pub mod products;
pub mod reviews;
pub mod types;

use serde::Serialize;
use serde_json::Value;

pub use types::{ItemResponse, ListParams, ListResponse, MutationResponse, SortOrder, StatusInput, UpdateInput};

/// JSON body for a request. Inputs are plain data, so this never fails in practice.
pub(crate) fn body<T: Serialize>(value: &T) -> Value {
  serde_json::to_value(value).unwrap_or(Value::Null)
}
