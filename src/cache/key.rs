use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use sha2::{Digest, Sha256};

/// A named domain collection served by the API.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntityKind {
  Category,
  Product,
  Order,
  Review,
  Plan,
  User,
  Client,
  Employee,
}

impl EntityKind {
  pub const ALL: [EntityKind; 8] = [
    EntityKind::Category,
    EntityKind::Product,
    EntityKind::Order,
    EntityKind::Review,
    EntityKind::Plan,
    EntityKind::User,
    EntityKind::Client,
    EntityKind::Employee,
  ];

  pub fn as_str(self) -> &'static str {
    match self {
      EntityKind::Category => "Category",
      EntityKind::Product => "Product",
      EntityKind::Order => "Order",
      EntityKind::Review => "Review",
      EntityKind::Plan => "Plan",
      EntityKind::User => "User",
      EntityKind::Client => "Client",
      EntityKind::Employee => "Employee",
    }
  }
}

impl fmt::Display for EntityKind {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(self.as_str())
  }
}

/// Label grouping cache entries for bulk invalidation.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Tag {
  /// Any list result of this kind.
  List(EntityKind),
  /// One record of this kind.
  Item(EntityKind, String),
}

impl Tag {
  pub fn list(kind: EntityKind) -> Self {
    Tag::List(kind)
  }

  pub fn item(kind: EntityKind, id: impl Into<String>) -> Self {
    Tag::Item(kind, id.into())
  }

  pub fn kind(&self) -> EntityKind {
    match self {
      Tag::List(kind) | Tag::Item(kind, _) => *kind,
    }
  }
}

impl fmt::Display for Tag {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      Tag::List(kind) => write!(f, "{}:LIST", kind),
      Tag::Item(kind, id) => write!(f, "{}:{}", kind, id),
    }
  }
}

/// Identity of one cached result.
///
/// Two reads of the same endpoint with equal parameters resolve to the same
/// key no matter how the parameter object was built: member order is ignored
/// and `null` members are treated as absent.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct QueryKey {
  kind: EntityKind,
  endpoint: &'static str,
  params: String,
}

impl QueryKey {
  pub fn new(kind: EntityKind, endpoint: &'static str, params: &Value) -> Self {
    Self {
      kind,
      endpoint,
      params: canonicalize(params),
    }
  }

  pub fn kind(&self) -> EntityKind {
    self.kind
  }

  pub fn endpoint(&self) -> &'static str {
    self.endpoint
  }

  /// Canonical JSON text of the parameters.
  pub fn params(&self) -> &str {
    &self.params
  }

  /// Stable fixed-length digest, used to identify the key in logs.
  pub fn cache_hash(&self) -> String {
    let mut hasher = Sha256::new();
    hasher.update(self.kind.as_str().as_bytes());
    hasher.update(b":");
    hasher.update(self.endpoint.as_bytes());
    hasher.update(b":");
    hasher.update(self.params.as_bytes());
    hex::encode(hasher.finalize())
  }
}

impl fmt::Display for QueryKey {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "{}({})", self.endpoint, self.params)
  }
}

/// Serialize a JSON value with object keys sorted and `null` members removed.
pub fn canonicalize(value: &Value) -> String {
  let mut out = String::new();
  write_canonical(value, &mut out);
  out
}

fn write_canonical(value: &Value, out: &mut String) {
  match value {
    Value::Object(map) => {
      let mut members: Vec<(&String, &Value)> = map.iter().filter(|(_, v)| !v.is_null()).collect();
      members.sort_by(|a, b| a.0.cmp(b.0));

      out.push('{');
      for (i, (name, member)) in members.into_iter().enumerate() {
        if i > 0 {
          out.push(',');
        }
        out.push_str(&Value::String(name.clone()).to_string());
        out.push(':');
        write_canonical(member, out);
      }
      out.push('}');
    }
    Value::Array(items) => {
      out.push('[');
      for (i, item) in items.iter().enumerate() {
        if i > 0 {
          out.push(',');
        }
        write_canonical(item, out);
      }
      out.push(']');
    }
    scalar => out.push_str(&scalar.to_string()),
  }
}
