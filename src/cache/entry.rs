//! Core types for cache entries and the results handed to consumers.

use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::fmt;
use std::sync::Arc;

use super::tags::TagSet;
use crate::api::ApiError;

/// Identity of one cache entry. A signature that is evicted and queried again
/// gets a new id.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct EntryId(pub u64);

impl fmt::Display for EntryId {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "#{}", self.0)
  }
}

/// Lifecycle of an entry:
/// `Empty -> Loading -> Fresh -> Stale -> Loading -> Fresh | Evicted`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryState {
  /// No data yet (never fetched, or the first fetch failed).
  Empty,
  /// A fetch is in flight.
  Loading,
  Fresh,
  /// Invalidated or past its stale time; the next read refetches.
  Stale,
  /// Removed from the store. Terminal.
  Evicted,
}

impl fmt::Display for EntryState {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    let s = match self {
      EntryState::Empty => "empty",
      EntryState::Loading => "loading",
      EntryState::Fresh => "fresh",
      EntryState::Stale => "stale",
      EntryState::Evicted => "evicted",
    };
    f.write_str(s)
  }
}

/// Indicates where returned data came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheSource {
  /// Fetched from the transport for this call (or a call it joined).
  Network,
  /// Served from a fresh entry.
  Cache,
}

/// Result of a query, including data and metadata about the entry.
#[derive(Debug, Clone)]
pub struct QueryResult {
  pub entry_id: EntryId,
  /// Shared with the entry; two hits on the same entry return the same `Arc`.
  pub data: Arc<Value>,
  /// Tags the entry provides.
  pub tags: TagSet,
  pub fetched_at: DateTime<Utc>,
  pub source: CacheSource,
}

impl QueryResult {
  /// Deserialize the payload into a typed value.
  pub fn decode<T: DeserializeOwned>(&self) -> Result<T, ApiError> {
    T::deserialize(self.data.as_ref())
      .map_err(|e| ApiError::transport(format!("Unexpected response shape: {}", e)))
  }

  /// Whether both results point at the same stored payload.
  pub fn same_entry(&self, other: &QueryResult) -> bool {
    self.entry_id == other.entry_id && Arc::ptr_eq(&self.data, &other.data)
  }
}

/// What a subscriber currently sees for its entry.
#[derive(Debug, Clone)]
pub enum QueryState {
  /// Nothing requested yet
  Idle,
  /// Fetch in progress with no data to show
  Loading,
  /// Latest successful result
  Success(QueryResult),
  /// Latest fetch failed
  Error(ApiError),
}

impl QueryState {
  pub fn is_loading(&self) -> bool {
    matches!(self, QueryState::Loading)
  }

  pub fn is_success(&self) -> bool {
    matches!(self, QueryState::Success(_))
  }

  pub fn is_error(&self) -> bool {
    matches!(self, QueryState::Error(_))
  }

  pub fn result(&self) -> Option<&QueryResult> {
    match self {
      QueryState::Success(result) => Some(result),
      _ => None,
    }
  }

  pub fn error(&self) -> Option<&ApiError> {
    match self {
      QueryState::Error(e) => Some(e),
      _ => None,
    }
  }
}
