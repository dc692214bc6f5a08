//! Tag-invalidated resource cache for the clinic management REST API.

pub mod api;
pub mod cache;
pub mod client;
pub mod commands;
pub mod config;
pub mod logging;
pub mod query;

#[cfg(test)]
mod testing;

pub use cache::{CacheLayer, QueryResult, QueryState, SubscribeOptions};
pub use client::ClinicClient;
pub use config::Config;
pub use query::Subscription;
