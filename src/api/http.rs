//! reqwest-backed transport for the clinic REST API.

use chrono::Utc;
use color_eyre::{eyre::eyre, Result};
use futures::future::BoxFuture;
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT};
use reqwest::StatusCode;
use serde::Deserialize;
use serde_json::Value;
use std::time::Duration;
use tracing::{debug, error, warn};

use super::credentials::Credentials;
use super::error::{ApiError, FieldErrors};
use super::transport::{ApiRequest, Method, Transport};
use crate::config::ApiConfig;

/// HTTP transport wrapper
#[derive(Clone)]
pub struct HttpTransport {
  client: reqwest::Client,
  base_url: String,
  cache_buster: bool,
  credentials: Credentials,
}

impl HttpTransport {
  pub fn new(config: &ApiConfig, credentials: Credentials) -> Result<Self> {
    let base = url::Url::parse(&config.url)
      .map_err(|e| eyre!("Invalid API url {}: {}", config.url, e))?;

    let mut headers = HeaderMap::new();
    headers.insert(ACCEPT, HeaderValue::from_static("application/json"));

    let client = reqwest::Client::builder()
      .timeout(Duration::from_secs(config.timeout_secs))
      .default_headers(headers)
      .build()
      .map_err(|e| eyre!("Failed to create HTTP client: {}", e))?;

    Ok(Self {
      client,
      base_url: base.as_str().trim_end_matches('/').to_string(),
      cache_buster: config.cache_buster,
      credentials,
    })
  }

  pub fn credentials(&self) -> &Credentials {
    &self.credentials
  }

  pub fn url_for(&self, path: &str) -> String {
    format!("{}{}", self.base_url, path)
  }

  async fn send(&self, request: ApiRequest) -> Result<Value, ApiError> {
    let url = self.url_for(&request.path);
    debug!(method = %request.method, %url, "Sending request");

    let mut builder = self
      .client
      .request(to_reqwest_method(request.method), &url)
      .query(&request.query);

    if self.cache_buster {
      builder = builder.query(&[("_t", Utc::now().timestamp_millis().to_string())]);
    }
    if let Some(token) = self.credentials.token() {
      builder = builder.bearer_auth(token);
    }
    for (name, value) in &request.headers {
      builder = builder.header(name.as_str(), value.as_str());
    }
    if let Some(body) = &request.body {
      builder = builder.json(body);
    }

    let response = builder.send().await.map_err(map_reqwest_error)?;
    let status = response.status();

    if status.is_success() {
      if status == StatusCode::NO_CONTENT {
        return Ok(Value::Null);
      }
      let bytes = response.bytes().await.map_err(map_reqwest_error)?;
      if bytes.is_empty() {
        return Ok(Value::Null);
      }
      return serde_json::from_slice(&bytes)
        .map_err(|e| ApiError::transport(format!("Invalid response body from {}: {}", url, e)));
    }

    let text = response.text().await.unwrap_or_default();
    Err(self.handle_failure(status, &text))
  }

  /// Map a failed response and apply the global side effects.
  fn handle_failure(&self, status: StatusCode, body: &str) -> ApiError {
    let err = error_from_body(status, body);
    match &err {
      ApiError::Auth { status: 401, .. } => self.credentials.clear(),
      ApiError::Auth { .. } => warn!("Access denied"),
      ApiError::Server { status, .. } => error!(status, "Server error occurred"),
      _ => {}
    }
    err
  }
}

impl Transport for HttpTransport {
  fn execute(&self, request: ApiRequest) -> BoxFuture<'_, Result<Value, ApiError>> {
    Box::pin(self.send(request))
  }
}

/// Error body shape used by the API (`{ success: false, message, errors }`).
#[derive(Debug, Deserialize)]
struct ErrorBody {
  message: Option<String>,
  #[serde(default)]
  errors: FieldErrors,
}

fn error_from_body(status: StatusCode, body: &str) -> ApiError {
  let fallback = || {
    if body.trim().is_empty() {
      status
        .canonical_reason()
        .unwrap_or("Request failed")
        .to_string()
    } else {
      body.trim().to_string()
    }
  };

  let (message, fields) = match serde_json::from_str::<ErrorBody>(body) {
    Ok(parsed) => (parsed.message.unwrap_or_else(fallback), parsed.errors),
    Err(_) => (fallback(), FieldErrors::new()),
  };

  ApiError::from_status(status.as_u16(), message, fields)
}

fn map_reqwest_error(err: reqwest::Error) -> ApiError {
  if err.is_timeout() {
    ApiError::transport(format!("Request timed out: {}", err))
  } else if err.is_connect() {
    ApiError::transport(format!("Connection failed: {}", err))
  } else {
    ApiError::transport(err.to_string())
  }
}

fn to_reqwest_method(method: Method) -> reqwest::Method {
  match method {
    Method::Get => reqwest::Method::GET,
    Method::Post => reqwest::Method::POST,
    Method::Put => reqwest::Method::PUT,
    Method::Patch => reqwest::Method::PATCH,
    Method::Delete => reqwest::Method::DELETE,
  }
}
