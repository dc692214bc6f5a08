//! Cache statistics tracking

use std::sync::atomic::{AtomicU64, Ordering};

/// Counters for cache behaviour, updated without taking the store lock.
#[derive(Debug, Default)]
pub struct CacheStats {
  hits: AtomicU64,
  misses: AtomicU64,
  /// Transport calls issued for reads
  fetches: AtomicU64,
  /// Reads that joined an in-flight fetch
  deduplicated: AtomicU64,
  failures: AtomicU64,
  invalidations: AtomicU64,
  /// Entries marked stale by invalidation
  entries_invalidated: AtomicU64,
  evictions: AtomicU64,
}

impl CacheStats {
  pub fn new() -> Self {
    Self::default()
  }

  pub fn record_hit(&self) {
    self.hits.fetch_add(1, Ordering::Relaxed);
  }

  pub fn record_miss(&self) {
    self.misses.fetch_add(1, Ordering::Relaxed);
  }

  pub fn record_fetch(&self) {
    self.fetches.fetch_add(1, Ordering::Relaxed);
  }

  pub fn record_dedup(&self) {
    self.deduplicated.fetch_add(1, Ordering::Relaxed);
  }

  pub fn record_failure(&self) {
    self.failures.fetch_add(1, Ordering::Relaxed);
  }

  pub fn record_invalidation(&self, entries: u64) {
    self.invalidations.fetch_add(1, Ordering::Relaxed);
    self.entries_invalidated.fetch_add(entries, Ordering::Relaxed);
  }

  pub fn record_evictions(&self, count: u64) {
    self.evictions.fetch_add(count, Ordering::Relaxed);
  }

  pub fn snapshot(&self) -> StatsSnapshot {
    StatsSnapshot {
      hits: self.hits.load(Ordering::Relaxed),
      misses: self.misses.load(Ordering::Relaxed),
      fetches: self.fetches.load(Ordering::Relaxed),
      deduplicated: self.deduplicated.load(Ordering::Relaxed),
      failures: self.failures.load(Ordering::Relaxed),
      invalidations: self.invalidations.load(Ordering::Relaxed),
      entries_invalidated: self.entries_invalidated.load(Ordering::Relaxed),
      evictions: self.evictions.load(Ordering::Relaxed),
    }
  }

  pub fn reset(&self) {
    for counter in [
      &self.hits,
      &self.misses,
      &self.fetches,
      &self.deduplicated,
      &self.failures,
      &self.invalidations,
      &self.entries_invalidated,
      &self.evictions,
    ] {
      counter.store(0, Ordering::Relaxed);
    }
  }
}

/// Point-in-time copy of [`CacheStats`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StatsSnapshot {
  pub hits: u64,
  pub misses: u64,
  pub fetches: u64,
  pub deduplicated: u64,
  pub failures: u64,
  pub invalidations: u64,
  pub entries_invalidated: u64,
  pub evictions: u64,
}

impl StatsSnapshot {
  /// Hit ratio over hits and misses (0.0 when nothing was read).
  pub fn hit_rate(&self) -> f64 {
    let total = self.hits + self.misses;
    if total == 0 {
      0.0
    } else {
      self.hits as f64 / total as f64
    }
  }
}
