//! The progress store: the single owner of learner stats and unlocks.
//!
//! All mutation goes through `dispatch`, which applies the reducer, persists
//! the three storage keys before returning, and then broadcasts notices so
//! views can redraw. `AppState` keeps one instance behind an async mutex.

use serde::{de::DeserializeOwned, Serialize};
use tokio::sync::broadcast;
use tracing::{error, info, instrument, warn};

use crate::domain::Module;
use crate::progression::{apply, ProgressEvent, Transition, UnlockSet, UserStats};
use crate::storage::KeyValueStore;

pub const KEY_ASSESSMENT_DONE: &str = "assessment_done";
pub const KEY_STATS: &str = "stats";
pub const KEY_UNLOCKS: &str = "unlocks";

const NOTICE_CAPACITY: usize = 64;

/// Change notifications for subscribers (WebSocket clients).
#[derive(Clone, Debug, PartialEq)]
pub enum StoreNotice {
  StatsChanged(UserStats),
  UnlocksChanged(Vec<Module>),
  ModuleMastered(Module),
  AllBucketsComplete,
}

/// Read-only view of everything the store holds.
#[derive(Clone, Debug, Serialize, PartialEq)]
pub struct ProgressSnapshot {
  pub stats: UserStats,
  pub unlocks: Vec<Module>,
  pub assessment_done: bool,
  pub buckets_full: usize,
}

pub struct ProgressStore {
  stats: UserStats,
  unlocks: UnlockSet,
  assessment_done: bool,
  storage: Box<dyn KeyValueStore>,
  notices: broadcast::Sender<StoreNotice>,
}

/// Decode a JSON value from storage, falling back to the default on any problem.
fn load_or_default<T: DeserializeOwned + Default>(storage: &dyn KeyValueStore, key: &str) -> T {
  match storage.get(key) {
    None => T::default(),
    Some(raw) => serde_json::from_str(&raw).unwrap_or_else(|e| {
      warn!(target: "progress", %key, error = %e, "Malformed persisted value; using default");
      T::default()
    }),
  }
}

impl ProgressStore {
  /// Read persisted state, failing soft to defaults per key.
  #[instrument(level = "info", skip_all)]
  pub fn load(storage: Box<dyn KeyValueStore>) -> Self {
    let mut stats: UserStats = load_or_default(storage.as_ref(), KEY_STATS);
    stats.sanitize();
    let unlocks: UnlockSet = load_or_default(storage.as_ref(), KEY_UNLOCKS);
    let assessment_done = storage.get(KEY_ASSESSMENT_DONE).as_deref() == Some("true");
    info!(target: "progress", points = stats.points, level = stats.level, unlocks = ?unlocks.modules(), assessment_done, "Progress loaded");

    let (notices, _) = broadcast::channel(NOTICE_CAPACITY);
    Self { stats, unlocks, assessment_done, storage, notices }
  }

  pub fn subscribe(&self) -> broadcast::Receiver<StoreNotice> {
    self.notices.subscribe()
  }

  pub fn stats(&self) -> &UserStats {
    &self.stats
  }

  pub fn assessment_done(&self) -> bool {
    self.assessment_done
  }

  pub fn is_unlocked(&self, m: Module) -> bool {
    self.unlocks.contains(m)
  }

  pub fn snapshot(&self) -> ProgressSnapshot {
    ProgressSnapshot {
      stats: self.stats.clone(),
      unlocks: self.unlocks.modules(),
      assessment_done: self.assessment_done,
      buckets_full: self.stats.bucket_xp.full_count(),
    }
  }

  /// Apply one event, persist, then notify.
  #[instrument(level = "info", skip(self), target = "progress")]
  pub fn dispatch(&mut self, event: ProgressEvent) -> Transition {
    let t = apply(&mut self.stats, &mut self.unlocks, &event);
    if matches!(event, ProgressEvent::AssessmentCompleted { .. }) {
      self.assessment_done = true;
    }
    if !t.revoked.is_empty() {
      warn!(target: "progress", revoked = ?t.revoked, "Assessment retake revoked unlocks");
    }
    info!(target: "progress", points = self.stats.points, level = self.stats.level, points_gained = t.points_gained, xp_gained = t.xp_gained, "Progress updated");

    self.persist();

    self.notify(StoreNotice::StatsChanged(self.stats.clone()));
    if t.unlocks_changed {
      self.notify(StoreNotice::UnlocksChanged(self.unlocks.modules()));
    }
    for m in &t.mastered {
      info!(target: "progress", module = %m, "Bucket mastered");
      self.notify(StoreNotice::ModuleMastered(*m));
    }
    if t.all_buckets_completed {
      info!(target: "progress", "All buckets complete");
      self.notify(StoreNotice::AllBucketsComplete);
    }
    t
  }

  fn persist(&mut self) {
    let mut write = |key: &str, value: Result<String, serde_json::Error>| {
      let res = match value {
        Ok(v) => self.storage.set(key, v),
        Err(e) => Err(e.into()),
      };
      if let Err(e) = res {
        error!(target: "progress", %key, error = %e, "Failed to persist progress");
      }
    };
    write(KEY_STATS, serde_json::to_string(&self.stats));
    write(KEY_UNLOCKS, serde_json::to_string(&self.unlocks));
    if self.assessment_done {
      write(KEY_ASSESSMENT_DONE, Ok("true".to_string()));
    }
  }

  fn notify(&self, notice: StoreNotice) {
    // No subscribers is fine.
    let _ = self.notices.send(notice);
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::storage::MemoryStore;

  fn seeded(pairs: &[(&str, &str)]) -> MemoryStore {
    let mut s = MemoryStore::default();
    for (k, v) in pairs {
      s.set(k, v.to_string()).unwrap();
    }
    s
  }

  #[test]
  fn empty_storage_loads_defaults() {
    let store = ProgressStore::load(Box::new(MemoryStore::default()));
    let snap = store.snapshot();
    assert_eq!(snap.stats, UserStats::default());
    assert_eq!(snap.unlocks, vec![Module::Creativity]);
    assert!(!snap.assessment_done);
  }

  #[test]
  fn malformed_values_fail_soft_per_key() {
    let storage = seeded(&[
      (KEY_STATS, "{\"points\": \"lots\""),
      (KEY_UNLOCKS, r#"["creativity","prompting"]"#),
      (KEY_ASSESSMENT_DONE, "true"),
    ]);
    let store = ProgressStore::load(Box::new(storage));
    let snap = store.snapshot();
    assert_eq!(snap.stats, UserStats::default());
    assert_eq!(snap.unlocks, vec![Module::Creativity, Module::Prompting]);
    assert!(snap.assessment_done);
  }

  #[test]
  fn dispatch_persists_every_key() {
    let mut store = ProgressStore::load(Box::new(MemoryStore::default()));
    store.dispatch(ProgressEvent::AssessmentCompleted { total_points: 30 });

    let stats: UserStats = serde_json::from_str(&store.storage.get(KEY_STATS).unwrap()).unwrap();
    assert_eq!(stats.points, 30);
    assert_eq!(store.storage.get(KEY_UNLOCKS).as_deref(), Some(r#"["creativity","prompting"]"#));
    assert_eq!(store.storage.get(KEY_ASSESSMENT_DONE).as_deref(), Some("true"));
  }

  #[test]
  fn assessment_flag_not_written_before_assessment() {
    let mut store = ProgressStore::load(Box::new(MemoryStore::default()));
    store.dispatch(ProgressEvent::ModuleEntered { module: Module::Creativity });
    assert_eq!(store.storage.get(KEY_ASSESSMENT_DONE), None);
  }

  #[test]
  fn subscribers_see_mastery_and_completion_notices() {
    let mut store = ProgressStore::load(Box::new(MemoryStore::default()));
    let mut rx = store.subscribe();
    for m in Module::ALL {
      for _ in 0..4 {
        store.dispatch(ProgressEvent::FeedbackAccepted { module: m, score: 10.0 });
      }
    }
    let mut mastered = vec![];
    let mut completions = 0;
    while let Ok(n) = rx.try_recv() {
      match n {
        StoreNotice::ModuleMastered(m) => mastered.push(m),
        StoreNotice::AllBucketsComplete => completions += 1,
        _ => {}
      }
    }
    assert_eq!(mastered, Module::ALL.to_vec());
    assert_eq!(completions, 1);
  }
}
