//! Consumer handle for one cache entry.
//!
//! A `Subscription` keeps its entry alive and refreshed while held. UI loops
//! call `poll()` on every tick; async consumers await `changed()`.
//!
//! # Example
//!
//! ```ignore
//! let mut clinics = layer.subscribe(
//!     &clinics::GET_CLINICS,
//!     Params::new(),
//!     SubscribeOptions::default().with_polling_interval(Duration::from_secs(30)),
//! )?;
//!
//! // In event loop tick
//! if clinics.poll() {
//!     // State changed, trigger re-render
//! }
//!
//! // In render
//! match clinics.status() {
//!     QueryState::Loading => render_spinner(),
//!     QueryState::Success(result) => render_data(&result),
//!     QueryState::Error(e) => render_error(&e),
//!     QueryState::Idle => {}
//! }
//! ```

use serde::de::DeserializeOwned;
use std::fmt;
use tokio::sync::watch;

use crate::api::ApiError;
use crate::cache::{CacheLayer, EntryId, QueryResult, QueryState, QuerySignature, SubscriptionId};

/// Interest in one query signature. Dropping it releases the entry and stops
/// its polling.
pub struct Subscription {
  layer: CacheLayer,
  id: SubscriptionId,
  entry_id: EntryId,
  signature: QuerySignature,
  receiver: watch::Receiver<QueryState>,
}

impl Subscription {
  pub(crate) fn new(
    layer: CacheLayer,
    id: SubscriptionId,
    entry_id: EntryId,
    signature: QuerySignature,
    receiver: watch::Receiver<QueryState>,
  ) -> Self {
    Self {
      layer,
      id,
      entry_id,
      signature,
      receiver,
    }
  }

  pub fn id(&self) -> SubscriptionId {
    self.id
  }

  pub fn entry_id(&self) -> EntryId {
    self.entry_id
  }

  pub fn signature(&self) -> &QuerySignature {
    &self.signature
  }

  /// Latest state published for the entry.
  pub fn status(&self) -> QueryState {
    self.receiver.borrow().clone()
  }

  /// Returns `true` if the state changed since the last `poll`, `changed` or
  /// subscribe. Never blocks.
  pub fn poll(&mut self) -> bool {
    match self.receiver.has_changed() {
      Ok(true) => {
        self.receiver.borrow_and_update();
        true
      }
      _ => false,
    }
  }

  /// Wait for the next state. `None` once the entry is gone (cache reset).
  pub async fn changed(&mut self) -> Option<QueryState> {
    self.receiver.changed().await.ok()?;
    Some(self.receiver.borrow_and_update().clone())
  }

  /// Refetch now, or join the fetch already running.
  pub fn refetch(&self) -> Result<(), ApiError> {
    self.layer.refetch(&self.signature)
  }

  pub fn data(&self) -> Option<QueryResult> {
    self.receiver.borrow().result().cloned()
  }

  /// Latest data deserialized into `T`.
  pub fn decode<T: DeserializeOwned>(&self) -> Option<Result<T, ApiError>> {
    self.data().map(|result| result.decode())
  }

  pub fn error(&self) -> Option<ApiError> {
    self.receiver.borrow().error().cloned()
  }

  pub fn is_loading(&self) -> bool {
    self.receiver.borrow().is_loading()
  }

  pub fn is_success(&self) -> bool {
    self.receiver.borrow().is_success()
  }

  pub fn is_error(&self) -> bool {
    self.receiver.borrow().is_error()
  }
}

impl Drop for Subscription {
  fn drop(&mut self) {
    self.layer.release(self.id, self.entry_id, &self.signature);
  }
}

impl fmt::Debug for Subscription {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("Subscription")
      .field("id", &self.id)
      .field("entry_id", &self.entry_id)
      .field("query", &self.signature.description())
      .finish_non_exhaustive()
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::api::endpoints::clinics;
  use crate::api::{Method, Params};
  use crate::cache::SubscribeOptions;
  use crate::config::CacheConfig;
  use crate::testing::MockTransport;
  use serde::Deserialize;
  use serde_json::json;
  use std::sync::Arc;
  use std::time::Duration;

  fn layer(transport: MockTransport) -> CacheLayer {
    CacheLayer::new(Arc::new(transport), CacheConfig::default())
  }

  #[tokio::test]
  async fn test_poll_reports_each_change_once() {
    let cache = layer(
      MockTransport::new().respond(Method::Get, "/clinics/3", json!({"id": "3", "name": "North"})),
    );
    let mut sub = cache
      .subscribe(
        &clinics::GET_CLINIC,
        Params::new().with("id", "3"),
        SubscribeOptions::default(),
      )
      .unwrap();

    assert!(sub.is_loading());
    assert!(!sub.poll());

    tokio::time::sleep(Duration::from_millis(10)).await;
    assert!(sub.poll());
    assert!(sub.is_success());
    assert!(!sub.poll());

    #[derive(Debug, Deserialize)]
    struct Named {
      name: String,
    }
    let clinic: Named = sub.decode().unwrap().unwrap();
    assert_eq!(clinic.name, "North");
  }

  #[tokio::test]
  async fn test_error_is_published() {
    let cache = layer(MockTransport::new().fail(
      Method::Get,
      "/clinics/3",
      ApiError::Server {
        status: 503,
        message: "maintenance".to_string(),
      },
    ));
    let mut sub = cache
      .subscribe(
        &clinics::GET_CLINIC,
        Params::new().with("id", "3"),
        SubscribeOptions::default(),
      )
      .unwrap();

    let state = sub.changed().await.unwrap();
    assert!(state.is_error());
    assert_eq!(sub.error().and_then(|e| e.status()), Some(503));
    assert!(sub.data().is_none());
  }

  #[tokio::test]
  async fn test_fresh_entry_is_visible_immediately() {
    let transport = Arc::new(MockTransport::new().respond(Method::Get, "/clinics", json!([])));
    let cache = CacheLayer::new(transport.clone(), CacheConfig::default());
    cache.query(&clinics::GET_CLINICS, Params::new()).await.unwrap();

    let mut sub = cache
      .subscribe(&clinics::GET_CLINICS, Params::new(), SubscribeOptions::default())
      .unwrap();
    assert!(sub.is_success());
    assert!(!sub.poll());
    assert_eq!(transport.calls(), 1);
  }

  #[tokio::test]
  async fn test_changed_ends_after_reset() {
    let cache = layer(MockTransport::new().respond(Method::Get, "/clinics", json!([])));
    let mut sub = cache
      .subscribe(&clinics::GET_CLINICS, Params::new(), SubscribeOptions::default())
      .unwrap();
    sub.changed().await.unwrap();

    cache.reset();
    assert!(sub.changed().await.is_none());
  }
}
