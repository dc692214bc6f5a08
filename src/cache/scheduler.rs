//! Polling scheduler: one cancelable tick task per subscription.

use std::collections::HashMap;
use std::sync::Mutex;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::debug;

/// Identity of one subscription.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SubscriptionId(pub u64);

/// Owns the polling tasks of all subscriptions.
#[derive(Default)]
pub struct PollScheduler {
  tasks: Mutex<HashMap<SubscriptionId, JoinHandle<()>>>,
}

impl PollScheduler {
  pub fn new() -> Self {
    Self::default()
  }

  /// Call `tick` every `interval`, starting one interval from now, until it
  /// returns `false` or the task is stopped. Replaces any task already running
  /// for `id`.
  pub fn start<F>(&self, id: SubscriptionId, interval: Duration, mut tick: F)
  where
    F: FnMut() -> bool + Send + 'static,
  {
    let handle = tokio::spawn(async move {
      let mut ticker = tokio::time::interval(interval);
      ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
      // First tick completes immediately
      ticker.tick().await;

      loop {
        ticker.tick().await;
        if !tick() {
          break;
        }
      }
    });

    debug!(subscription = id.0, ?interval, "Polling started");
    if let Some(previous) = self.lock().insert(id, handle) {
      previous.abort();
    }
  }

  /// Stop the task for `id`. Returns whether one was running.
  pub fn stop(&self, id: SubscriptionId) -> bool {
    match self.lock().remove(&id) {
      Some(handle) => {
        handle.abort();
        debug!(subscription = id.0, "Polling stopped");
        true
      }
      None => false,
    }
  }

  pub fn stop_all(&self) {
    for (_, handle) in self.lock().drain() {
      handle.abort();
    }
  }

  /// Number of live polling tasks.
  pub fn active(&self) -> usize {
    let mut tasks = self.lock();
    tasks.retain(|_, handle| !handle.is_finished());
    tasks.len()
  }

  fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<SubscriptionId, JoinHandle<()>>> {
    self.tasks.lock().unwrap_or_else(|e| e.into_inner())
  }
}

impl Drop for PollScheduler {
  fn drop(&mut self) {
    self.stop_all();
  }
}
