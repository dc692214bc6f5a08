//! Cache layer that maps queries to tagged entries and mutations to
//! invalidation waves.
//!
//! The store, tag index and in-flight map sit behind one synchronous lock that
//! is never held across an `.await`. Fetches run on spawned tasks and are
//! shared between every reader of the same signature.

use chrono::Utc;
use futures::future::BoxFuture;
use futures::FutureExt;
use serde_json::Value;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

use super::entry::{CacheSource, EntryId, EntryState, QueryResult, QueryState};
use super::scheduler::{PollScheduler, SubscriptionId};
use super::signature::QuerySignature;
use super::stats::{CacheStats, StatsSnapshot};
use super::storage::{CacheStore, EntryRecord, Marked, SharedFetch};
use super::tags::{Tag, TagSet};
use crate::api::{ApiError, MutationEndpoint, Params, QueryEndpoint, Transport};
use crate::config::CacheConfig;
use crate::query::Subscription;

/// Entries touched by one invalidation.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct InvalidationReport {
  /// Marked stale immediately
  pub stale: usize,
  /// Fetch in flight; lands stale
  pub deferred: usize,
  /// Stale entries with subscribers that are being refetched
  pub refetching: usize,
}

impl InvalidationReport {
  pub fn is_empty(&self) -> bool {
    self.stale == 0 && self.deferred == 0
  }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SubscribeOptions {
  /// Refetch on this interval while subscribed
  pub polling_interval: Option<Duration>,
  /// Refetch even when a fresh entry exists
  pub refetch_on_subscribe: bool,
}

impl SubscribeOptions {
  pub fn with_polling_interval(mut self, interval: Duration) -> Self {
    self.polling_interval = Some(interval);
    self
  }

  pub fn with_refetch_on_subscribe(mut self, refetch: bool) -> Self {
    self.refetch_on_subscribe = refetch;
    self
  }
}

/// Shared handle to the cache. Clones point at the same store.
#[derive(Clone)]
pub struct CacheLayer {
  inner: Arc<Inner>,
}

struct Inner {
  store: Mutex<CacheStore>,
  transport: Arc<dyn Transport>,
  config: CacheConfig,
  stats: CacheStats,
  scheduler: PollScheduler,
  next_subscription: AtomicU64,
}

enum Lookup {
  Hit(QueryResult),
  Wait(BoxFuture<'static, Result<QueryResult, ApiError>>),
}

enum Decision {
  Join(SharedFetch),
  /// The in-flight fetch may predate an invalidation: wait for it, then
  /// look again.
  JoinThenLookup(SharedFetch),
  Hit(QueryResult),
  Refetch,
  EvictAndFetch,
  Miss,
}

impl CacheLayer {
  pub fn new(transport: Arc<dyn Transport>, config: CacheConfig) -> Self {
    Self {
      inner: Arc::new(Inner {
        store: Mutex::new(CacheStore::new()),
        transport,
        config,
        stats: CacheStats::new(),
        scheduler: PollScheduler::new(),
        next_subscription: AtomicU64::new(0),
      }),
    }
  }

  pub fn config(&self) -> &CacheConfig {
    &self.inner.config
  }

  /// Read through the cache.
  ///
  /// A fresh entry is returned as is. Otherwise the read joins the in-flight
  /// fetch for the same signature or starts one. A fetch that was in flight
  /// when an invalidation arrived is never handed to a later reader.
  pub async fn query(
    &self,
    endpoint: &'static QueryEndpoint,
    params: Params,
  ) -> Result<QueryResult, ApiError> {
    let signature = QuerySignature::new(endpoint, params);
    let fetch = {
      let mut store = self.inner.lock();
      self.inner.sweep(&mut store);
      match self.inner.lookup(&mut store, &signature)? {
        Lookup::Hit(result) => return Ok(result),
        Lookup::Wait(fetch) => fetch,
      }
    };
    fetch.await
  }

  /// Run a write. On success every entry providing one of the endpoint's
  /// invalidated tags is marked stale. On failure the cache is untouched and
  /// the error is returned unchanged.
  pub async fn mutate(
    &self,
    endpoint: &'static MutationEndpoint,
    params: Params,
  ) -> Result<Value, ApiError> {
    let request = endpoint.request(&params)?;
    debug!(mutation = endpoint.name, %request, "Running mutation");

    match self.inner.transport.execute(request).await {
      Ok(value) => {
        let tags = endpoint.invalidated_tags(&params);
        self.invalidate(&tags);
        Ok(value)
      }
      Err(err) => {
        warn!(mutation = endpoint.name, error = %err, "Mutation failed");
        Err(err)
      }
    }
  }

  /// Mark every entry providing any of `tags` stale and refetch the subscribed
  /// ones. Applied under one lock acquisition.
  pub fn invalidate(&self, tags: &TagSet) -> InvalidationReport {
    let mut report = InvalidationReport::default();
    if tags.is_empty() {
      return report;
    }

    let mut store = self.inner.lock();
    for (hash, marked) in store.mark_invalidated(tags) {
      match marked {
        Marked::Deferred => report.deferred += 1,
        Marked::Stale => {
          report.stale += 1;
          let subscribed = store
            .get(&hash)
            .filter(|r| r.subscribers > 0)
            .map(|r| r.signature.clone());
          if let Some(signature) = subscribed {
            match self.inner.start_fetch(&mut store, &signature) {
              Ok(_) => report.refetching += 1,
              Err(e) => warn!(query = %signature.description(), error = %e, "Refetch failed to start"),
            }
          }
        }
      }
    }
    drop(store);

    if report.is_empty() {
      debug!(tags = %tag_list(tags), "Invalidation matched no entries");
    } else {
      self
        .inner
        .stats
        .record_invalidation((report.stale + report.deferred) as u64);
      info!(
        tags = %tag_list(tags),
        stale = report.stale,
        deferred = report.deferred,
        refetching = report.refetching,
        "Invalidated entries"
      );
    }
    report
  }

  /// Register interest in one signature.
  ///
  /// Starts a fetch when there is no usable entry. Dropping the returned
  /// handle releases the interest and stops its polling.
  pub fn subscribe(
    &self,
    endpoint: &'static QueryEndpoint,
    params: Params,
    options: SubscribeOptions,
  ) -> Result<Subscription, ApiError> {
    let signature = QuerySignature::new(endpoint, params);
    let id = SubscriptionId(self.inner.next_subscription.fetch_add(1, Ordering::Relaxed) + 1);

    let (entry_id, receiver) = {
      let mut store = self.inner.lock();
      self.inner.sweep(&mut store);
      let hash = signature.hash();

      let needs_fetch = match store.get(hash) {
        None => true,
        Some(record) => {
          record.in_flight.is_none()
            && (options.refetch_on_subscribe
              || record.state != EntryState::Fresh
              || self.inner.is_expired(record))
        }
      };
      if needs_fetch {
        let evict = store
          .get(hash)
          .is_some_and(|r| r.state == EntryState::Stale && r.subscribers == 0);
        if evict {
          store.evict(hash);
          self.inner.stats.record_evictions(1);
        }
        self.inner.start_fetch(&mut store, &signature)?;
      }

      let record = store.entry_or_insert(&signature);
      record.subscribers += 1;
      record.last_used = Instant::now();

      let current = match record.snapshot(CacheSource::Cache) {
        Some(result) => QueryState::Success(result),
        None if record.in_flight.is_some() => QueryState::Loading,
        None => QueryState::Idle,
      };
      record.notifier.send_replace(current);
      (record.id, record.notifier.subscribe())
    };

    if let Some(interval) = options.polling_interval {
      let weak = Arc::downgrade(&self.inner);
      let polled = signature.clone();
      self.inner.scheduler.start(id, interval, move || match weak.upgrade() {
        Some(inner) => {
          inner.poll(&polled);
          true
        }
        None => false,
      });
    }

    debug!(subscription = id.0, query = %signature.description(), "Subscribed");
    Ok(Subscription::new(self.clone(), id, entry_id, signature, receiver))
  }

  /// Start a refetch of `signature`, or join the one in flight.
  pub(crate) fn refetch(&self, signature: &QuerySignature) -> Result<(), ApiError> {
    let mut store = self.inner.lock();
    self.inner.start_fetch(&mut store, signature).map(|_| ())
  }

  /// Drop one subscriber of the entry. A no-op when the entry was replaced
  /// since subscribing (reset or eviction).
  pub(crate) fn release(&self, id: SubscriptionId, entry_id: EntryId, signature: &QuerySignature) {
    self.inner.scheduler.stop(id);
    let mut store = self.inner.lock();
    if let Some(record) = store.get_mut(signature.hash()) {
      if record.id == entry_id {
        record.subscribers = record.subscribers.saturating_sub(1);
        record.last_used = Instant::now();
      }
    }
    debug!(subscription = id.0, query = %signature.description(), "Unsubscribed");
  }

  /// Evict unsubscribed entries unused for longer than the retention window.
  pub fn evict_expired(&self) -> usize {
    let mut store = self.inner.lock();
    self.inner.sweep(&mut store)
  }

  /// Drop every entry and stop all polling. Fetches still in flight finish
  /// but their results are discarded.
  pub fn reset(&self) {
    let dropped = {
      let mut store = self.inner.lock();
      let dropped = store.len();
      store.clear();
      dropped
    };
    self.inner.scheduler.stop_all();
    info!(entries = dropped, "Cache reset");
  }

  /// State of the entry for this signature. Absent entries are `Empty`.
  pub fn entry_state(&self, endpoint: &'static QueryEndpoint, params: Params) -> EntryState {
    let signature = QuerySignature::new(endpoint, params);
    let store = self.inner.lock();
    match store.get(signature.hash()) {
      None => EntryState::Empty,
      Some(record) if record.state == EntryState::Fresh && self.inner.is_expired(record) => {
        EntryState::Stale
      }
      Some(record) => record.state,
    }
  }

  /// Number of subscribers of the entry for this signature.
  pub fn subscriber_count(&self, endpoint: &'static QueryEndpoint, params: Params) -> usize {
    let signature = QuerySignature::new(endpoint, params);
    self
      .inner
      .lock()
      .get(signature.hash())
      .map_or(0, |r| r.subscribers)
  }

  /// Ids of the entries currently providing `tag`.
  pub fn tagged_entries(&self, tag: &Tag) -> Vec<EntryId> {
    let mut ids: Vec<EntryId> = self
      .inner
      .lock()
      .entries_for_tag(tag)
      .into_iter()
      .map(|r| r.id)
      .collect();
    ids.sort();
    ids
  }

  pub fn len(&self) -> usize {
    self.inner.lock().len()
  }

  pub fn is_empty(&self) -> bool {
    self.inner.lock().is_empty()
  }

  /// Live polling tasks.
  pub fn polling_tasks(&self) -> usize {
    self.inner.scheduler.active()
  }

  pub fn stats(&self) -> StatsSnapshot {
    self.inner.stats.snapshot()
  }
}

impl Inner {
  fn lock(&self) -> MutexGuard<'_, CacheStore> {
    self.store.lock().unwrap_or_else(PoisonError::into_inner)
  }

  fn is_expired(&self, record: &EntryRecord) -> bool {
    match (self.config.stale_time(), record.fetched_at) {
      (Some(stale_time), Some(fetched_at)) => Utc::now() - fetched_at > stale_time,
      _ => false,
    }
  }

  fn sweep(&self, store: &mut CacheStore) -> usize {
    let evicted = store.evict_expired(self.config.keep_unused_for());
    if evicted > 0 {
      self.stats.record_evictions(evicted as u64);
      debug!(evicted, "Evicted unused entries");
    }
    evicted
  }

  fn lookup(
    self: &Arc<Self>,
    store: &mut CacheStore,
    signature: &QuerySignature,
  ) -> Result<Lookup, ApiError> {
    let hash = signature.hash();
    let wave = store.wave();
    let decision = match store.get_mut(hash) {
      None => Decision::Miss,
      Some(record) => {
        record.last_used = Instant::now();
        if let Some(fetch) = &record.in_flight {
          if record.invalidated_during_fetch || record.fetch_wave < wave {
            Decision::JoinThenLookup(fetch.clone())
          } else {
            Decision::Join(fetch.clone())
          }
        } else {
          match record.state {
            EntryState::Fresh if !self.is_expired(record) => record
              .snapshot(CacheSource::Cache)
              .map_or(Decision::Miss, Decision::Hit),
            // Unsubscribed stale entries are evicted on next access
            EntryState::Stale if record.subscribers == 0 => Decision::EvictAndFetch,
            EntryState::Fresh | EntryState::Stale => Decision::Refetch,
            EntryState::Empty | EntryState::Loading | EntryState::Evicted => Decision::Miss,
          }
        }
      }
    };

    match decision {
      Decision::Hit(result) => {
        self.stats.record_hit();
        debug!(query = %signature.description(), entry = %result.entry_id, "Cache hit");
        if self.config.refetch_on_hit {
          if let Err(e) = self.start_fetch(store, signature) {
            warn!(query = %signature.description(), error = %e, "Background refetch failed to start");
          }
        }
        Ok(Lookup::Hit(result))
      }
      Decision::Join(fetch) => {
        self.stats.record_dedup();
        debug!(query = %signature.description(), "Joining in-flight fetch");
        Ok(Lookup::Wait(fetch.boxed()))
      }
      Decision::JoinThenLookup(fetch) => {
        debug!(query = %signature.description(), "Waiting for fetch that predates an invalidation");
        let inner = Arc::clone(self);
        let signature = signature.clone();
        let wait = async move {
          // Its outcome is stored by `finish_fetch`; only the next look matters
          let _ = fetch.await;
          let next = {
            let mut store = inner.lock();
            inner.lookup(&mut store, &signature)
          };
          match next {
            Ok(Lookup::Hit(result)) => Ok(result),
            Ok(Lookup::Wait(fetch)) => fetch.await,
            Err(e) => Err(e),
          }
        };
        Ok(Lookup::Wait(wait.boxed()))
      }
      Decision::EvictAndFetch => {
        store.evict(hash);
        self.stats.record_evictions(1);
        self.stats.record_miss();
        self.start_fetch(store, signature).map(|f| Lookup::Wait(f.boxed()))
      }
      Decision::Refetch | Decision::Miss => {
        self.stats.record_miss();
        self.start_fetch(store, signature).map(|f| Lookup::Wait(f.boxed()))
      }
    }
  }

  /// Spawn the transport call for `signature` unless one is already in flight.
  fn start_fetch(
    self: &Arc<Self>,
    store: &mut CacheStore,
    signature: &QuerySignature,
  ) -> Result<SharedFetch, ApiError> {
    let request = signature.endpoint.request(&signature.params)?;
    let wave = store.wave();

    let record = store.entry_or_insert(signature);
    if let Some(fetch) = &record.in_flight {
      return Ok(fetch.clone());
    }

    record.fetch_wave = wave;
    record.resume_state = record.state;
    record.state = EntryState::Loading;
    if record.data.is_none() {
      record.notify(QueryState::Loading);
    }
    let entry_id = record.id;
    self.stats.record_fetch();
    debug!(query = %signature.description(), entry = %entry_id, %request, "Fetching");

    let inner = Arc::clone(self);
    let fetched = signature.clone();
    let task = tokio::spawn(async move {
      let outcome = inner.transport.execute(request).await;
      inner.finish_fetch(&fetched, entry_id, outcome)
    });

    let fetch = async move {
      task
        .await
        .unwrap_or_else(|e| Err(ApiError::transport(format!("Fetch task failed: {}", e))))
    }
    .boxed()
    .shared();

    record.in_flight = Some(fetch.clone());
    Ok(fetch)
  }

  /// Store the outcome of a fetch and notify subscribers.
  fn finish_fetch(
    self: &Arc<Self>,
    signature: &QuerySignature,
    entry_id: EntryId,
    outcome: Result<Value, ApiError>,
  ) -> Result<QueryResult, ApiError> {
    let hash = signature.hash();
    let mut store = self.lock();

    let (flagged, fetch_wave) = match store.get_mut(hash) {
      Some(record) if record.id == entry_id => {
        record.in_flight = None;
        (
          std::mem::take(&mut record.invalidated_during_fetch),
          record.fetch_wave,
        )
      }
      _ => {
        store.prune_waves();
        debug!(query = %signature.description(), entry = %entry_id, "Discarding result for dropped entry");
        return outcome.map(|data| {
          let tags = signature.endpoint.provided_tags(&data, &signature.params);
          QueryResult {
            entry_id,
            data: Arc::new(data),
            tags,
            fetched_at: Utc::now(),
            source: CacheSource::Network,
          }
        });
      }
    };

    let mut subscribed = false;
    let mut invalidated = flagged;
    let outcome = match outcome {
      Ok(data) => {
        let tags = signature.endpoint.provided_tags(&data, &signature.params);
        // Covers entries that were not indexed under these tags yet
        invalidated |= store.invalidated_since(&tags, fetch_wave);
        let data = Arc::new(data);
        let result = QueryResult {
          entry_id,
          data: Arc::clone(&data),
          tags: tags.clone(),
          fetched_at: Utc::now(),
          source: CacheSource::Network,
        };

        if let Some(record) = store.complete(hash, data, tags, invalidated) {
          record.fetched_at = Some(result.fetched_at);
          record.notify(QueryState::Success(result.clone()));
          subscribed = record.subscribers > 0;
        }
        debug!(
          query = %signature.description(),
          entry = %entry_id,
          tags = %tag_list(&result.tags),
          stale = invalidated,
          "Fetch complete"
        );
        Ok(result)
      }
      Err(err) => {
        let mut remove = false;
        if let Some(record) = store.get_mut(hash) {
          record.state = if invalidated && record.data.is_some() {
            EntryState::Stale
          } else {
            record.resume_state
          };
          record.notify(QueryState::Error(err.clone()));
          subscribed = record.subscribers > 0;
          remove = record.state == EntryState::Empty && !subscribed;
        }
        if remove {
          store.evict(hash);
        }
        self.stats.record_failure();
        warn!(query = %signature.description(), error = %err, "Fetch failed");
        Err(err)
      }
    };
    store.prune_waves();

    // A single follow-up covers every invalidation that arrived while in flight
    if invalidated && subscribed {
      debug!(query = %signature.description(), "Refetching after invalidation during fetch");
      if let Err(e) = self.start_fetch(&mut store, signature) {
        warn!(query = %signature.description(), error = %e, "Follow-up refetch failed to start");
      }
    }

    outcome
  }

  /// Polling tick: refetch unless a fetch is already running.
  fn poll(self: &Arc<Self>, signature: &QuerySignature) {
    let mut store = self.lock();
    let idle = store
      .get(signature.hash())
      .is_some_and(|r| r.in_flight.is_none());
    if idle {
      if let Err(e) = self.start_fetch(&mut store, signature) {
        warn!(query = %signature.description(), error = %e, "Polling refetch failed to start");
      }
    }
  }
}

fn tag_list(tags: &TagSet) -> String {
  tags
    .iter()
    .map(|t| t.to_string())
    .collect::<Vec<_>>()
    .join(",")
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::api::endpoints::{appointments, clinics, patients};
  use crate::api::Method;
  use crate::cache::tags::ResourceType;
  use crate::testing::MockTransport;
  use serde_json::json;

  fn clinic_page() -> Value {
    let clinics: Vec<Value> = (1..=6)
      .map(|i| json!({"id": i.to_string(), "name": format!("Clinic {}", i)}))
      .collect();
    json!({
      "data": clinics,
      "pagination": {"page": 1, "limit": 10, "total": 6, "totalPages": 1}
    })
  }

  fn layer_with(transport: Arc<MockTransport>, config: CacheConfig) -> CacheLayer {
    CacheLayer::new(transport, config)
  }

  fn layer(transport: Arc<MockTransport>) -> CacheLayer {
    layer_with(transport, CacheConfig::default())
  }

  fn tags(list: &[Tag]) -> TagSet {
    list.iter().cloned().collect()
  }

  #[tokio::test]
  async fn test_second_query_is_a_hit_on_the_same_entry() {
    let transport = Arc::new(MockTransport::new().respond(Method::Get, "/clinics", clinic_page()));
    let cache = layer(transport.clone());

    let first = cache.query(&clinics::GET_CLINICS, Params::new()).await.unwrap();
    let second = cache.query(&clinics::GET_CLINICS, Params::new()).await.unwrap();

    assert_eq!(transport.calls(), 1);
    assert_eq!(first.source, CacheSource::Network);
    assert_eq!(second.source, CacheSource::Cache);
    assert!(first.same_entry(&second));
    assert_eq!(cache.stats().hits, 1);
    assert_eq!(cache.stats().misses, 1);
  }

  #[tokio::test]
  async fn test_list_is_tagged_per_entity_and_invalidated_by_review() {
    let transport = Arc::new(
      MockTransport::new()
        .respond(Method::Get, "/clinics", clinic_page())
        .respond(Method::Post, "/clinics/3/reviews", json!({"success": true})),
    );
    let cache = layer(transport.clone());

    let result = cache.query(&clinics::GET_CLINICS, Params::new()).await.unwrap();
    let mut expected: TagSet = (1..=6)
      .map(|i| Tag::id(ResourceType::Clinic, i.to_string()))
      .collect();
    expected.insert(Tag::list(ResourceType::Clinic));
    assert_eq!(result.tags, expected);

    let params = Params::new()
      .with("clinicId", "3")
      .with("rating", 5)
      .with("comment", "Great");
    cache
      .mutate(&clinics::CREATE_CLINIC_REVIEW, params)
      .await
      .unwrap();

    assert_eq!(
      cache.entry_state(&clinics::GET_CLINICS, Params::new()),
      EntryState::Stale
    );

    let again = cache.query(&clinics::GET_CLINICS, Params::new()).await.unwrap();
    assert_eq!(transport.calls_to(Method::Get, "/clinics"), 2);
    assert_eq!(again.source, CacheSource::Network);
    assert_eq!(
      cache.entry_state(&clinics::GET_CLINICS, Params::new()),
      EntryState::Fresh
    );
  }

  #[tokio::test]
  async fn test_concurrent_identical_queries_share_one_call() {
    let transport = Arc::new(
      MockTransport::new()
        .with_delay(Duration::from_millis(20))
        .respond(
          Method::Get,
          "/appointments",
          json!({"data": [{"id": "a1"}, {"id": "a2"}]}),
        ),
    );
    let cache = layer(transport.clone());
    let params = || Params::new().with("patientId", "p1");

    let (a, b) = tokio::join!(
      cache.query(&appointments::GET_APPOINTMENTS, params()),
      cache.query(&appointments::GET_APPOINTMENTS, params()),
    );
    let (a, b) = (a.unwrap(), b.unwrap());

    assert_eq!(transport.calls(), 1);
    assert!(a.same_entry(&b));
    assert_eq!(cache.stats().deduplicated, 1);
  }

  #[tokio::test]
  async fn test_failed_mutation_leaves_cache_untouched() {
    let server_error = ApiError::Server {
      status: 500,
      message: "boom".to_string(),
    };
    let transport = Arc::new(
      MockTransport::new()
        .respond(Method::Get, "/appointments/a1", json!({"id": "a1"}))
        .respond(Method::Get, "/appointments", json!({"data": [{"id": "a1"}]}))
        .fail(Method::Put, "/appointments/a1/cancel", server_error.clone()),
    );
    let cache = layer(transport.clone());
    let detail = || Params::new().with("id", "a1");

    cache
      .query(&appointments::GET_APPOINTMENT, detail())
      .await
      .unwrap();
    cache
      .query(&appointments::GET_APPOINTMENTS, Params::new())
      .await
      .unwrap();

    let err = cache
      .mutate(&appointments::CANCEL_APPOINTMENT, detail())
      .await
      .unwrap_err();
    assert_eq!(err, server_error);

    assert_eq!(
      cache.entry_state(&appointments::GET_APPOINTMENT, detail()),
      EntryState::Fresh
    );
    assert_eq!(
      cache.entry_state(&appointments::GET_APPOINTMENTS, Params::new()),
      EntryState::Fresh
    );
    assert_eq!(cache.stats().invalidations, 0);
  }

  #[tokio::test]
  async fn test_unmatched_invalidation_is_noop() {
    let transport = Arc::new(MockTransport::new());
    let cache = layer(transport.clone());

    let report = cache.invalidate(&tags(&[Tag::list(ResourceType::Patient)]));
    assert!(report.is_empty());
    assert_eq!(transport.calls(), 0);
    assert_eq!(cache.stats().invalidations, 0);
  }

  #[tokio::test]
  async fn test_empty_list_still_provides_list_tag() {
    let transport = Arc::new(MockTransport::new().respond(
      Method::Get,
      "/patients",
      json!({"data": [], "pagination": {"page": 1, "limit": 10, "total": 0, "totalPages": 0}}),
    ));
    let cache = layer(transport);

    let result = cache.query(&patients::GET_PATIENTS, Params::new()).await.unwrap();
    assert_eq!(result.tags, tags(&[Tag::list(ResourceType::Patient)]));
  }

  #[tokio::test]
  async fn test_failed_query_is_returned_and_not_stored() {
    let transport = Arc::new(MockTransport::new());
    let cache = layer(transport.clone());

    let err = cache
      .query(&clinics::GET_CLINIC, Params::new().with("id", "9"))
      .await
      .unwrap_err();
    assert!(matches!(err, ApiError::NotFound { .. }));
    assert_eq!(
      cache.entry_state(&clinics::GET_CLINIC, Params::new().with("id", "9")),
      EntryState::Empty
    );
    assert!(cache.is_empty());
    assert_eq!(cache.stats().failures, 1);
  }

  #[tokio::test]
  async fn test_missing_path_param_fails_before_sending() {
    let transport = Arc::new(MockTransport::new());
    let cache = layer(transport.clone());

    let err = cache
      .query(&clinics::GET_CLINIC, Params::new())
      .await
      .unwrap_err();
    assert!(matches!(err, ApiError::Validation { status: 400, .. }));
    assert_eq!(transport.calls(), 0);
    assert!(cache.is_empty());
  }

  #[tokio::test]
  async fn test_evicted_entry_comes_back_with_new_id() {
    let transport = Arc::new(MockTransport::new().respond(Method::Get, "/clinics", clinic_page()));
    let cache = layer_with(
      transport.clone(),
      CacheConfig::default().with_keep_unused_secs(0),
    );

    let first = cache.query(&clinics::GET_CLINICS, Params::new()).await.unwrap();
    assert_eq!(cache.evict_expired(), 1);
    assert_eq!(
      cache.entry_state(&clinics::GET_CLINICS, Params::new()),
      EntryState::Empty
    );

    let second = cache.query(&clinics::GET_CLINICS, Params::new()).await.unwrap();
    assert_ne!(first.entry_id, second.entry_id);
    assert_eq!(transport.calls(), 2);
  }

  #[tokio::test]
  async fn test_expired_entry_is_refetched_in_place() {
    let transport = Arc::new(MockTransport::new().respond(Method::Get, "/clinics", clinic_page()));
    let cache = layer_with(transport.clone(), CacheConfig::default().with_stale_secs(Some(0)));

    let first = cache.query(&clinics::GET_CLINICS, Params::new()).await.unwrap();
    tokio::time::sleep(Duration::from_millis(5)).await;
    let second = cache.query(&clinics::GET_CLINICS, Params::new()).await.unwrap();

    assert_eq!(transport.calls(), 2);
    assert_eq!(first.entry_id, second.entry_id);
    assert_eq!(second.source, CacheSource::Network);
  }

  #[tokio::test]
  async fn test_refetch_on_hit_runs_in_background() {
    let transport = Arc::new(MockTransport::new().respond(Method::Get, "/clinics", clinic_page()));
    let cache = layer_with(transport.clone(), CacheConfig::default().with_refetch_on_hit(true));

    cache.query(&clinics::GET_CLINICS, Params::new()).await.unwrap();
    let hit = cache.query(&clinics::GET_CLINICS, Params::new()).await.unwrap();
    assert_eq!(hit.source, CacheSource::Cache);

    tokio::time::sleep(Duration::from_millis(20)).await;
    assert_eq!(transport.calls(), 2);
    assert_eq!(
      cache.entry_state(&clinics::GET_CLINICS, Params::new()),
      EntryState::Fresh
    );
  }

  #[tokio::test]
  async fn test_subscribed_entry_is_refetched_on_invalidation() {
    let transport = Arc::new(
      MockTransport::new().respond_with(Method::Get, "/clinics", |n| {
        Ok(json!({"data": [{"id": "1", "version": n}]}))
      }),
    );
    let cache = layer(transport.clone());

    let mut sub = cache
      .subscribe(&clinics::GET_CLINICS, Params::new(), SubscribeOptions::default())
      .unwrap();
    assert!(sub.is_loading());
    let state = sub.changed().await.unwrap();
    assert!(state.is_success());

    let report = cache.invalidate(&tags(&[Tag::id(ResourceType::Clinic, "1")]));
    assert_eq!(
      report,
      InvalidationReport {
        stale: 1,
        deferred: 0,
        refetching: 1
      }
    );

    let state = sub.changed().await.unwrap();
    let data = state.result().unwrap().data.clone();
    assert_eq!(data["data"][0]["version"], 1);
    assert_eq!(transport.calls(), 2);
  }

  #[tokio::test]
  async fn test_invalidation_during_fetch_gets_one_follow_up() {
    let transport = Arc::new(
      MockTransport::new()
        .with_delay(Duration::from_millis(20))
        .respond(Method::Get, "/clinics", clinic_page()),
    );
    let cache = layer(transport.clone());

    let mut sub = cache
      .subscribe(&clinics::GET_CLINICS, Params::new(), SubscribeOptions::default())
      .unwrap();
    sub.changed().await.unwrap();

    sub.refetch().unwrap();
    let first = cache.invalidate(&tags(&[Tag::list(ResourceType::Clinic)]));
    let second = cache.invalidate(&tags(&[Tag::id(ResourceType::Clinic, "2")]));
    assert_eq!(first.deferred, 1);
    assert_eq!(second.deferred, 1);

    tokio::time::sleep(Duration::from_millis(100)).await;
    assert_eq!(transport.calls(), 3);
    assert_eq!(
      cache.entry_state(&clinics::GET_CLINICS, Params::new()),
      EntryState::Fresh
    );
  }

  fn versioned_clinics(delay: Duration) -> Arc<MockTransport> {
    Arc::new(
      MockTransport::new()
        .with_delay(delay)
        .respond_with(Method::Get, "/clinics", |n| {
          Ok(json!({"data": [{"id": "3", "version": n}]}))
        }),
    )
  }

  #[tokio::test]
  async fn test_read_after_invalidation_does_not_join_older_fetch() {
    let transport = versioned_clinics(Duration::from_millis(20));
    let cache = layer_with(transport.clone(), CacheConfig::default().with_refetch_on_hit(true));

    cache.query(&clinics::GET_CLINICS, Params::new()).await.unwrap();
    // Hit; starts a background refetch
    cache.query(&clinics::GET_CLINICS, Params::new()).await.unwrap();

    let review = Params::new().with("clinicId", "3");
    let report = cache.invalidate(&clinics::CREATE_CLINIC_REVIEW.invalidated_tags(&review));
    assert_eq!(report.deferred, 1);

    let after = cache.query(&clinics::GET_CLINICS, Params::new()).await.unwrap();
    assert_eq!(after.data["data"][0]["version"], 2);
    assert_eq!(after.source, CacheSource::Network);
    assert_eq!(transport.calls(), 3);
    assert_eq!(
      cache.entry_state(&clinics::GET_CLINICS, Params::new()),
      EntryState::Fresh
    );
  }

  #[tokio::test]
  async fn test_invalidation_during_first_fetch_lands_stale() {
    let transport = versioned_clinics(Duration::from_millis(50));
    let cache = layer(transport.clone());

    let first = tokio::spawn({
      let cache = cache.clone();
      async move { cache.query(&clinics::GET_CLINICS, Params::new()).await }
    });
    tokio::time::sleep(Duration::from_millis(5)).await;
    cache.invalidate(&tags(&[
      Tag::id(ResourceType::Clinic, "3"),
      Tag::derived(ResourceType::Clinic, "3", "reviews"),
      Tag::list(ResourceType::Clinic),
    ]));

    let first = first.await.unwrap().unwrap();
    assert_eq!(first.data["data"][0]["version"], 0);
    assert_eq!(
      cache.entry_state(&clinics::GET_CLINICS, Params::new()),
      EntryState::Stale
    );

    let again = cache.query(&clinics::GET_CLINICS, Params::new()).await.unwrap();
    assert_eq!(again.data["data"][0]["version"], 1);
    assert_eq!(transport.calls(), 2);
  }

  #[tokio::test]
  async fn test_reader_during_first_fetch_waits_for_newer_data() {
    let transport = versioned_clinics(Duration::from_millis(50));
    let cache = layer(transport.clone());

    let first = tokio::spawn({
      let cache = cache.clone();
      async move { cache.query(&clinics::GET_CLINICS, Params::new()).await }
    });
    tokio::time::sleep(Duration::from_millis(5)).await;
    cache.invalidate(&tags(&[Tag::list(ResourceType::Clinic)]));

    let second = cache.query(&clinics::GET_CLINICS, Params::new()).await.unwrap();
    assert_eq!(second.data["data"][0]["version"], 1);
    assert_eq!(first.await.unwrap().unwrap().data["data"][0]["version"], 0);
    assert_eq!(transport.calls(), 2);
    assert_eq!(
      cache.entry_state(&clinics::GET_CLINICS, Params::new()),
      EntryState::Fresh
    );
  }

  #[tokio::test]
  async fn test_unrelated_invalidation_does_not_refetch_joined_read() {
    let transport = versioned_clinics(Duration::from_millis(30));
    let cache = layer(transport.clone());

    let first = tokio::spawn({
      let cache = cache.clone();
      async move { cache.query(&clinics::GET_CLINICS, Params::new()).await }
    });
    tokio::time::sleep(Duration::from_millis(5)).await;
    cache.invalidate(&tags(&[Tag::list(ResourceType::Patient)]));

    let second = cache.query(&clinics::GET_CLINICS, Params::new()).await.unwrap();
    let first = first.await.unwrap().unwrap();
    assert_eq!(second.data["data"][0]["version"], 0);
    assert_eq!(second.entry_id, first.entry_id);
    assert_eq!(transport.calls(), 1);
  }

  #[tokio::test]
  async fn test_dropping_subscription_stops_polling() {
    let transport = Arc::new(MockTransport::new().respond(Method::Get, "/clinics", clinic_page()));
    let cache = layer(transport.clone());

    let sub = cache
      .subscribe(
        &clinics::GET_CLINICS,
        Params::new(),
        SubscribeOptions::default().with_polling_interval(Duration::from_millis(10)),
      )
      .unwrap();
    tokio::time::sleep(Duration::from_millis(45)).await;
    assert!(transport.calls() >= 2);
    assert_eq!(cache.polling_tasks(), 1);
    assert_eq!(cache.subscriber_count(&clinics::GET_CLINICS, Params::new()), 1);

    drop(sub);
    assert_eq!(cache.polling_tasks(), 0);
    assert_eq!(cache.subscriber_count(&clinics::GET_CLINICS, Params::new()), 0);

    let seen = transport.calls();
    tokio::time::sleep(Duration::from_millis(40)).await;
    assert_eq!(transport.calls(), seen);
  }

  #[tokio::test]
  async fn test_unsubscribed_refetch_result_is_still_stored() {
    let transport = Arc::new(
      MockTransport::new()
        .with_delay(Duration::from_millis(20))
        .respond(Method::Get, "/clinics", clinic_page()),
    );
    let cache = layer(transport.clone());

    let sub = cache
      .subscribe(&clinics::GET_CLINICS, Params::new(), SubscribeOptions::default())
      .unwrap();
    drop(sub);

    tokio::time::sleep(Duration::from_millis(50)).await;
    assert_eq!(
      cache.entry_state(&clinics::GET_CLINICS, Params::new()),
      EntryState::Fresh
    );
    let hit = cache.query(&clinics::GET_CLINICS, Params::new()).await.unwrap();
    assert_eq!(hit.source, CacheSource::Cache);
    assert_eq!(transport.calls(), 1);
  }

  #[tokio::test]
  async fn test_reset_drops_entries_and_polling() {
    let transport = Arc::new(MockTransport::new().respond(Method::Get, "/clinics", clinic_page()));
    let cache = layer(transport.clone());

    let sub = cache
      .subscribe(
        &clinics::GET_CLINICS,
        Params::new(),
        SubscribeOptions::default().with_polling_interval(Duration::from_secs(60)),
      )
      .unwrap();
    tokio::time::sleep(Duration::from_millis(10)).await;

    cache.reset();
    assert!(cache.is_empty());
    assert_eq!(cache.polling_tasks(), 0);

    // Releasing after reset does not touch the next entry
    cache.query(&clinics::GET_CLINICS, Params::new()).await.unwrap();
    drop(sub);
    assert_eq!(cache.subscriber_count(&clinics::GET_CLINICS, Params::new()), 0);
    assert_eq!(cache.len(), 1);
  }
}
