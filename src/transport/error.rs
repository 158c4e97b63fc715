use serde_json::Value;

/// Uniform error shape for everything that can go wrong talking to the API.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ErrorInfo {
  /// The request never produced an HTTP response (DNS, connect, timeout).
  #[error("network error: {message}")]
  Transport { message: String, timed_out: bool },

  /// The server answered with a failure status or a `success: false` envelope.
  #[error("server error {status}: {message}")]
  Server {
    status: u16,
    message: String,
    payload: Value,
  },

  /// The response did not have the shape the endpoint declared.
  #[error("unexpected response: {message}")]
  Decode { message: String },
}

impl ErrorInfo {
  pub fn transport(message: impl Into<String>) -> Self {
    Self::Transport {
      message: message.into(),
      timed_out: false,
    }
  }

  pub fn decode(err: impl std::fmt::Display) -> Self {
    Self::Decode {
      message: err.to_string(),
    }
  }

  /// Build a server error, pulling the human message out of the payload.
  pub fn from_response(status: u16, payload: Value) -> Self {
    let message = server_message(&payload)
      .unwrap_or_else(|| format!("request failed with status {}", status));
    Self::Server {
      status,
      message,
      payload,
    }
  }

  pub fn status(&self) -> Option<u16> {
    match self {
      Self::Server { status, .. } => Some(*status),
      _ => None,
    }
  }

  pub fn message(&self) -> &str {
    match self {
      Self::Transport { message, .. } | Self::Server { message, .. } | Self::Decode { message } => {
        message
      }
    }
  }

  pub fn payload(&self) -> Option<&Value> {
    match self {
      Self::Server { payload, .. } => Some(payload),
      _ => None,
    }
  }

  pub fn is_not_found(&self) -> bool {
    self.status() == Some(404)
  }

  pub fn is_timeout(&self) -> bool {
    matches!(self, Self::Transport { timed_out: true, .. })
  }
}

impl From<reqwest::Error> for ErrorInfo {
  fn from(err: reqwest::Error) -> Self {
    if err.is_decode() {
      return Self::decode(err);
    }
    Self::Transport {
      message: err.to_string(),
      timed_out: err.is_timeout(),
    }
  }
}

/// The backend reports errors as `{message}`, `{error: {message}}` or `{error: "..."}`.
fn server_message(payload: &Value) -> Option<String> {
  if let Some(text) = payload.as_str().filter(|s| !s.trim().is_empty()) {
    return Some(text.trim().to_string());
  }
  payload
    .get("message")
    .and_then(Value::as_str)
    .or_else(|| payload.pointer("/error/message").and_then(Value::as_str))
    .or_else(|| payload.get("error").and_then(Value::as_str))
    .map(String::from)
}
