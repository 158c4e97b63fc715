//! Transport adapter for the commerce REST API.
//!
//! Every read and write in the console goes through a [`Transport`]. The
//! adapter attaches the bearer credential, issues the request, and folds
//! every failure (network, non-2xx, `success: false` envelopes) into a single
//! [`ErrorInfo`] before anything reaches the cache.

mod error;
mod http;
#[cfg(test)]
pub mod mock;

pub use error::ErrorInfo;
pub use http::HttpTransport;

use futures::future::BoxFuture;
use reqwest::Method;
use serde_json::Value;

/// A single JSON request against the API, relative to the configured base URL.
#[derive(Debug, Clone, PartialEq)]
pub struct Request {
  pub method: Method,
  pub path: String,
  pub params: Option<Value>,
  pub body: Option<Value>,
}

impl Request {
  pub fn new(method: Method, path: impl Into<String>) -> Self {
    Self {
      method,
      path: path.into(),
      params: None,
      body: None,
    }
  }

  pub fn get(path: impl Into<String>) -> Self {
    Self::new(Method::GET, path)
  }

  pub fn post(path: impl Into<String>, body: Value) -> Self {
    Self::new(Method::POST, path).with_body(body)
  }

  pub fn put(path: impl Into<String>, body: Value) -> Self {
    Self::new(Method::PUT, path).with_body(body)
  }

  pub fn patch(path: impl Into<String>, body: Value) -> Self {
    Self::new(Method::PATCH, path).with_body(body)
  }

  pub fn delete(path: impl Into<String>) -> Self {
    Self::new(Method::DELETE, path)
  }

  /// Attach query-string parameters. `null` or an empty object sends none.
  pub fn with_params(mut self, params: Value) -> Self {
    let empty = match &params {
      Value::Null => true,
      Value::Object(map) => map.is_empty(),
      _ => false,
    };
    self.params = if empty { None } else { Some(params) };
    self
  }

  pub fn with_body(mut self, body: Value) -> Self {
    self.body = Some(body);
    self
  }
}

/// Future returned by a transport: the decoded JSON body or a normalized error.
pub type TransportFuture = BoxFuture<'static, Result<Value, ErrorInfo>>;

/// Issues requests against the remote source of truth.
///
/// Implementations must be cheap to call from a synchronous context: the
/// returned future is what performs I/O, so the cache can create it while
/// holding its lock and spawn it afterwards.
pub trait Transport: Send + Sync {
  fn request(&self, request: Request) -> TransportFuture;
}

/// Source of the bearer credential, consulted on every request.
pub trait TokenSource: Send + Sync {
  fn token(&self) -> Option<String>;
}

impl TokenSource for Option<String> {
  fn token(&self) -> Option<String> {
    self.clone()
  }
}

/// Turn an HTTP status and decoded body into the transport contract.
///
/// Non-2xx statuses become `ErrorInfo::Server`. So does a 2xx body carrying
/// `"success": false`, which the backend uses for soft failures.
pub fn normalize(status: u16, body: Value) -> Result<Value, ErrorInfo> {
  if !(200..300).contains(&status) {
    return Err(ErrorInfo::from_response(status, body));
  }
  if body.get("success").and_then(Value::as_bool) == Some(false) {
    return Err(ErrorInfo::from_response(status, body));
  }
  Ok(body)
}

/// Flatten a JSON object of parameters into query-string pairs.
///
/// Keys come out sorted, `null` members are dropped, arrays repeat the key,
/// and nested objects are sent as their JSON text.
pub fn query_pairs(params: &Value) -> Vec<(String, String)> {
  let Value::Object(map) = params else {
    return Vec::new();
  };

  let mut keys: Vec<&String> = map.keys().collect();
  keys.sort();

  let mut pairs = Vec::new();
  for key in keys {
    match &map[key] {
      Value::Null => {}
      Value::Array(items) => {
        for item in items.iter().filter(|v| !v.is_null()) {
          pairs.push((key.clone(), scalar_text(item)));
        }
      }
      other => pairs.push((key.clone(), scalar_text(other))),
    }
  }
  pairs
}

fn scalar_text(value: &Value) -> String {
  match value {
    Value::String(s) => s.clone(),
    other => other.to_string(),
  }
}
