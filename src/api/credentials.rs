//! Bearer credential shared between the transport and the session owner.

use std::sync::{Arc, RwLock};
use tokio::sync::watch;
use tracing::{info, warn};

/// Whether a credential is currently held.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthState {
  SignedIn,
  SignedOut,
}

/// Process-wide credential store.
///
/// Cloning shares the same token. A 401 from the transport clears it and
/// publishes [`AuthState::SignedOut`] so consumers can force re-authentication.
#[derive(Clone)]
pub struct Credentials {
  token: Arc<RwLock<Option<String>>>,
  state: Arc<watch::Sender<AuthState>>,
}

impl Credentials {
  pub fn new(token: Option<String>) -> Self {
    let initial = if token.is_some() {
      AuthState::SignedIn
    } else {
      AuthState::SignedOut
    };
    let (tx, _rx) = watch::channel(initial);
    Self {
      token: Arc::new(RwLock::new(token)),
      state: Arc::new(tx),
    }
  }

  /// Read the token from `CLINIC_API_TOKEN`, if set.
  pub fn from_env() -> Self {
    let token = std::env::var("CLINIC_API_TOKEN")
      .ok()
      .filter(|t| !t.trim().is_empty());
    Self::new(token)
  }

  pub fn token(&self) -> Option<String> {
    self
      .token
      .read()
      .unwrap_or_else(|e| e.into_inner())
      .clone()
  }

  pub fn set(&self, token: impl Into<String>) {
    *self.token.write().unwrap_or_else(|e| e.into_inner()) = Some(token.into());
    self.state.send_replace(AuthState::SignedIn);
    info!("Credential stored");
  }

  pub fn clear(&self) {
    let had_token = self
      .token
      .write()
      .unwrap_or_else(|e| e.into_inner())
      .take()
      .is_some();
    self.state.send_replace(AuthState::SignedOut);
    if had_token {
      warn!("Credential cleared, re-authentication required");
    }
  }

  pub fn state(&self) -> AuthState {
    *self.state.borrow()
  }

  /// Watch sign-in/sign-out transitions.
  pub fn watch(&self) -> watch::Receiver<AuthState> {
    self.state.subscribe()
  }
}

impl Default for Credentials {
  fn default() -> Self {
    Self::new(None)
  }
}

impl std::fmt::Debug for Credentials {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    f.debug_struct("Credentials")
      .field("state", &self.state())
      .finish_non_exhaustive()
  }
}
