//! Error taxonomy for API calls.
//!
//! Errors are values: the cache layer hands them back to consumers as-is and a
//! shared in-flight request clones the same error to every waiter.

use std::collections::BTreeMap;

/// Field name -> validation messages, as returned in the `errors` body field.
pub type FieldErrors = BTreeMap<String, Vec<String>>;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ApiError {
  /// Connectivity, timeout, or an unreadable response body.
  #[error("Transport error: {message}")]
  Transport { message: String },

  /// 401 or 403.
  #[error("Authorization failed ({status}): {message}")]
  Auth { status: u16, message: String },

  /// Any 5xx response.
  #[error("Server error ({status}): {message}")]
  Server { status: u16, message: String },

  /// 4xx with optional field-level detail. Also raised before sending when a
  /// request cannot be built from its params.
  #[error("Validation failed ({status}): {message}")]
  Validation {
    status: u16,
    message: String,
    fields: FieldErrors,
  },

  /// 404.
  #[error("Not found: {message}")]
  NotFound { message: String },
}

impl ApiError {
  pub fn transport(message: impl Into<String>) -> Self {
    Self::Transport {
      message: message.into(),
    }
  }

  /// Client-side validation failure (no request was sent).
  pub fn invalid_request(field: &str, message: impl Into<String>) -> Self {
    let message = message.into();
    let mut fields = FieldErrors::new();
    fields.insert(field.to_string(), vec![message.clone()]);
    Self::Validation {
      status: 400,
      message,
      fields,
    }
  }

  /// Classify a non-success HTTP status.
  pub fn from_status(status: u16, message: impl Into<String>, fields: FieldErrors) -> Self {
    let message = message.into();
    match status {
      401 | 403 => Self::Auth { status, message },
      404 => Self::NotFound { message },
      500..=599 => Self::Server { status, message },
      _ => Self::Validation {
        status,
        message,
        fields,
      },
    }
  }

  /// HTTP status carried by the error, if any.
  pub fn status(&self) -> Option<u16> {
    match self {
      Self::Transport { .. } => None,
      Self::Auth { status, .. } | Self::Server { status, .. } | Self::Validation { status, .. } => {
        Some(*status)
      }
      Self::NotFound { .. } => Some(404),
    }
  }

  /// Whether the stored credential should be dropped.
  pub fn is_unauthorized(&self) -> bool {
    matches!(self, Self::Auth { status: 401, .. })
  }
}
