//! Tag-based resource cache.
//!
//! This module provides the in-memory cache behind every read of the clinic
//! API:
//! - Entries are keyed by query signature (endpoint + normalized params)
//! - Each entry carries the resource tags its result provides
//! - Mutations invalidate tags; matching entries go stale and subscribed ones
//!   are refetched
//! - Identical reads in flight share one transport call

mod entry;
mod layer;
mod scheduler;
mod signature;
mod stats;
mod storage;
pub mod tags;

pub use entry::{CacheSource, EntryId, EntryState, QueryResult, QueryState};
pub use layer::{CacheLayer, InvalidationReport, SubscribeOptions};
pub use scheduler::{PollScheduler, SubscriptionId};
pub use signature::QuerySignature;
pub use stats::{CacheStats, StatsSnapshot};
pub use tags::{ResourceType, Tag, TagKey, TagSet};
