//! In-memory entry store with a tag index.
//!
//! All methods are synchronous; the layer holds the store behind one lock so a
//! reader never sees half of an invalidation.

use chrono::{DateTime, Utc};
use futures::future::{BoxFuture, Shared};
use serde_json::Value;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::watch;

use super::entry::{CacheSource, EntryId, EntryState, QueryResult, QueryState};
use super::signature::QuerySignature;
use super::tags::{Tag, TagSet};
use crate::api::ApiError;

/// A fetch that any number of readers can await.
pub type SharedFetch = Shared<BoxFuture<'static, Result<QueryResult, ApiError>>>;

/// One stored entry.
pub struct EntryRecord {
  pub id: EntryId,
  pub signature: QuerySignature,
  pub state: EntryState,
  /// State to return to if the in-flight fetch fails
  pub resume_state: EntryState,
  pub data: Option<Arc<Value>>,
  pub tags: TagSet,
  pub fetched_at: Option<DateTime<Utc>>,
  pub subscribers: usize,
  pub last_used: Instant,
  /// Invalidated while a fetch was in flight; that fetch lands as stale.
  pub invalidated_during_fetch: bool,
  /// Invalidation wave current when the in-flight fetch started
  pub fetch_wave: u64,
  pub in_flight: Option<SharedFetch>,
  pub notifier: watch::Sender<QueryState>,
}

impl EntryRecord {
  fn new(id: EntryId, signature: QuerySignature) -> Self {
    let (notifier, _rx) = watch::channel(QueryState::Idle);
    Self {
      id,
      signature,
      state: EntryState::Empty,
      resume_state: EntryState::Empty,
      data: None,
      tags: TagSet::new(),
      fetched_at: None,
      subscribers: 0,
      last_used: Instant::now(),
      invalidated_during_fetch: false,
      fetch_wave: 0,
      in_flight: None,
      notifier,
    }
  }

  /// Consumer view of the stored data, if any.
  pub fn snapshot(&self, source: CacheSource) -> Option<QueryResult> {
    let data = self.data.as_ref()?;
    Some(QueryResult {
      entry_id: self.id,
      data: Arc::clone(data),
      tags: self.tags.clone(),
      fetched_at: self.fetched_at.unwrap_or_else(Utc::now),
      source,
    })
  }

  /// Publish a new state to subscribers. Skipped when nobody is subscribed.
  pub fn notify(&self, state: QueryState) {
    if self.subscribers > 0 {
      self.notifier.send_replace(state);
    }
  }
}

/// How an entry reacted to an invalidation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Marked {
  /// Now stale.
  Stale,
  /// A fetch is in flight; it will land stale.
  Deferred,
}

#[derive(Default)]
pub struct CacheStore {
  entries: HashMap<String, EntryRecord>,
  tag_index: HashMap<Tag, HashSet<String>>,
  next_id: u64,
  /// Bumped by every invalidation
  wave: u64,
  /// Last wave that named each tag. Only kept while a fetch is in flight,
  /// since only in-flight fetches can have started before it.
  tag_waves: HashMap<Tag, u64>,
}

impl CacheStore {
  pub fn new() -> Self {
    Self::default()
  }

  pub fn len(&self) -> usize {
    self.entries.len()
  }

  pub fn is_empty(&self) -> bool {
    self.entries.is_empty()
  }

  pub fn get(&self, hash: &str) -> Option<&EntryRecord> {
    self.entries.get(hash)
  }

  pub fn get_mut(&mut self, hash: &str) -> Option<&mut EntryRecord> {
    self.entries.get_mut(hash)
  }

  /// Existing record for the signature, or a new `Empty` one.
  pub fn entry_or_insert(&mut self, signature: &QuerySignature) -> &mut EntryRecord {
    let next_id = &mut self.next_id;
    self
      .entries
      .entry(signature.hash().to_string())
      .or_insert_with(|| {
        *next_id += 1;
        EntryRecord::new(EntryId(*next_id), signature.clone())
      })
  }

  /// Store a successful fetch and re-index the entry under its new tags.
  pub fn complete(
    &mut self,
    hash: &str,
    data: Arc<Value>,
    tags: TagSet,
    stale: bool,
  ) -> Option<&mut EntryRecord> {
    let old_tags = {
      let record = self.entries.get_mut(hash)?;
      record.data = Some(data);
      record.fetched_at = Some(Utc::now());
      record.state = if stale {
        EntryState::Stale
      } else {
        EntryState::Fresh
      };
      std::mem::replace(&mut record.tags, tags.clone())
    };

    self.unindex(hash, &old_tags);
    for tag in tags {
      self
        .tag_index
        .entry(tag)
        .or_default()
        .insert(hash.to_string());
    }
    self.entries.get_mut(hash)
  }

  /// Current invalidation wave.
  pub fn wave(&self) -> u64 {
    self.wave
  }

  /// Whether any of `tags` was invalidated after `wave`.
  pub fn invalidated_since(&self, tags: &TagSet, wave: u64) -> bool {
    tags
      .iter()
      .any(|tag| self.tag_waves.get(tag).is_some_and(|w| *w > wave))
  }

  /// Forget tag waves once no fetch is left that could predate them.
  pub fn prune_waves(&mut self) {
    if self.entries.values().all(|r| r.in_flight.is_none()) {
      self.tag_waves.clear();
    }
  }

  /// Mark every entry providing any of `tags`. Each entry is reported once no
  /// matter how many of its tags match.
  ///
  /// Opens a new wave. Fetches in flight that provide one of `tags` when they
  /// land are stored stale, even when the entry was not indexed yet.
  pub fn mark_invalidated(&mut self, tags: &TagSet) -> Vec<(String, Marked)> {
    self.wave += 1;
    if self.entries.values().any(|r| r.in_flight.is_some()) {
      for tag in tags {
        self.tag_waves.insert(tag.clone(), self.wave);
      }
    }

    let mut hashes: Vec<String> = tags
      .iter()
      .filter_map(|tag| self.tag_index.get(tag))
      .flatten()
      .cloned()
      .collect::<HashSet<_>>()
      .into_iter()
      .collect();
    hashes.sort();

    let mut marked = Vec::with_capacity(hashes.len());
    for hash in hashes {
      let Some(record) = self.entries.get_mut(&hash) else {
        continue;
      };
      if record.in_flight.is_some() {
        record.invalidated_during_fetch = true;
        marked.push((hash, Marked::Deferred));
      } else {
        record.state = EntryState::Stale;
        marked.push((hash, Marked::Stale));
      }
    }
    marked
  }

  /// Remove an entry. The returned record is in the terminal `Evicted` state.
  pub fn evict(&mut self, hash: &str) -> Option<EntryRecord> {
    let mut record = self.entries.remove(hash)?;
    self.unindex(hash, &record.tags);
    record.state = EntryState::Evicted;
    record.in_flight = None;
    Some(record)
  }

  /// Evict unsubscribed, idle entries unused for at least `keep_unused_for`.
  pub fn evict_expired(&mut self, keep_unused_for: Duration) -> usize {
    let expired: Vec<String> = self
      .entries
      .iter()
      .filter(|(_, r)| {
        r.subscribers == 0 && r.in_flight.is_none() && r.last_used.elapsed() >= keep_unused_for
      })
      .map(|(hash, _)| hash.clone())
      .collect();

    for hash in &expired {
      self.evict(hash);
    }
    expired.len()
  }

  pub fn clear(&mut self) {
    self.entries.clear();
    self.tag_index.clear();
    self.tag_waves.clear();
  }

  /// Entries currently indexed under `tag`.
  pub fn entries_for_tag(&self, tag: &Tag) -> Vec<&EntryRecord> {
    self
      .tag_index
      .get(tag)
      .into_iter()
      .flatten()
      .filter_map(|hash| self.entries.get(hash))
      .collect()
  }

  fn unindex(&mut self, hash: &str, tags: &TagSet) {
    for tag in tags {
      if let Some(set) = self.tag_index.get_mut(tag) {
        set.remove(hash);
        if set.is_empty() {
          self.tag_index.remove(tag);
        }
      }
    }
  }
}
