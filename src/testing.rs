//! Scripted in-memory transport for tests.

use futures::future::BoxFuture;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Mutex;
use std::time::Duration;

use crate::api::{ApiError, ApiRequest, Method, Transport};

type Responder = Box<dyn Fn(usize) -> Result<Value, ApiError> + Send + Sync>;

/// Answers requests by `METHOD path`. Unrouted requests fail with `NotFound`.
#[derive(Default)]
pub struct MockTransport {
  routes: Mutex<HashMap<String, Responder>>,
  requests: Mutex<Vec<ApiRequest>>,
  delay: Option<Duration>,
}

fn route_key(method: Method, path: &str) -> String {
  format!("{} {}", method, path)
}

impl MockTransport {
  pub fn new() -> Self {
    Self::default()
  }

  /// Sleep before answering, so concurrent callers overlap.
  pub fn with_delay(mut self, delay: Duration) -> Self {
    self.delay = Some(delay);
    self
  }

  pub fn respond(self, method: Method, path: &str, value: Value) -> Self {
    self.respond_with(method, path, move |_| Ok(value.clone()))
  }

  pub fn fail(self, method: Method, path: &str, error: ApiError) -> Self {
    self.respond_with(method, path, move |_| Err(error.clone()))
  }

  /// Answer with `f(n)`, where `n` counts earlier calls to the same route.
  pub fn respond_with<F>(self, method: Method, path: &str, f: F) -> Self
  where
    F: Fn(usize) -> Result<Value, ApiError> + Send + Sync + 'static,
  {
    self
      .routes
      .lock()
      .unwrap()
      .insert(route_key(method, path), Box::new(f));
    self
  }

  pub fn calls(&self) -> usize {
    self.requests.lock().unwrap().len()
  }

  pub fn calls_to(&self, method: Method, path: &str) -> usize {
    self
      .requests
      .lock()
      .unwrap()
      .iter()
      .filter(|r| r.method == method && r.path == path)
      .count()
  }

  pub fn requests(&self) -> Vec<ApiRequest> {
    self.requests.lock().unwrap().clone()
  }
}

impl Transport for MockTransport {
  fn execute(&self, request: ApiRequest) -> BoxFuture<'_, Result<Value, ApiError>> {
    let key = route_key(request.method, &request.path);
    let previous = self.calls_to(request.method, &request.path);
    self.requests.lock().unwrap().push(request);

    let outcome = match self.routes.lock().unwrap().get(&key) {
      Some(responder) => responder(previous),
      None => Err(ApiError::NotFound {
        message: format!("No route for {}", key),
      }),
    };

    let delay = self.delay;
    Box::pin(async move {
      if let Some(delay) = delay {
        tokio::time::sleep(delay).await;
      }
      outcome
    })
  }
}
