use std::sync::Arc;
use std::time::Duration;

use color_eyre::{eyre::eyre, Result};
use serde_json::Value;
use tracing::{debug, warn};
use url::Url;

use crate::config::ApiConfig;

use super::{normalize, query_pairs, ErrorInfo, Request, TokenSource, Transport, TransportFuture};

/// reqwest-backed transport for the commerce API.
#[derive(Clone)]
pub struct HttpTransport {
  client: reqwest::Client,
  base_url: Url,
  credentials: Arc<dyn TokenSource>,
}

impl HttpTransport {
  pub fn new(config: &ApiConfig, credentials: Arc<dyn TokenSource>) -> Result<Self> {
    let base_url = Url::parse(&config.url)
      .map_err(|e| eyre!("Invalid API url '{}': {}", config.url, e))?;

    let client = reqwest::Client::builder()
      .timeout(Duration::from_millis(config.timeout_ms))
      .build()
      .map_err(|e| eyre!("Failed to create HTTP client: {}", e))?;

    Ok(Self {
      client,
      base_url,
      credentials,
    })
  }

  pub fn base_url(&self) -> &Url {
    &self.base_url
  }

  /// Resolve an API path against the base URL, keeping the base's own path prefix.
  fn url_for(&self, path: &str) -> Result<Url, ErrorInfo> {
    let joined = format!(
      "{}/{}",
      self.base_url.as_str().trim_end_matches('/'),
      path.trim_start_matches('/')
    );
    Url::parse(&joined).map_err(|e| ErrorInfo::transport(format!("invalid url {}: {}", joined, e)))
  }

  async fn send(&self, request: Request) -> Result<Value, ErrorInfo> {
    let url = self.url_for(&request.path)?;
    let mut builder = self.client.request(request.method.clone(), url);

    if let Some(params) = &request.params {
      builder = builder.query(&query_pairs(params));
    }
    if let Some(body) = &request.body {
      builder = builder.json(body);
    }
    if let Some(token) = self.credentials.token() {
      builder = builder.bearer_auth(token);
    }

    debug!(method = %request.method, path = %request.path, "sending request");

    let response = builder.send().await.map_err(|e| {
      let err = ErrorInfo::from(e);
      warn!(method = %request.method, path = %request.path, error = %err, "request failed");
      err
    })?;

    let status = response.status().as_u16();
    let text = response.text().await?;

    let body = if text.trim().is_empty() {
      Value::Null
    } else {
      match serde_json::from_str(&text) {
        Ok(value) => value,
        Err(e) if (200..300).contains(&status) => return Err(ErrorInfo::decode(e)),
        Err(_) => Value::String(text),
      }
    };

    normalize(status, body).inspect_err(|err| {
      warn!(method = %request.method, path = %request.path, status, error = %err, "request rejected");
    })
  }
}

impl Transport for HttpTransport {
  fn request(&self, request: Request) -> TransportFuture {
    let this = self.clone();
    Box::pin(async move { this.send(request).await })
  }
}
