//! Progression reducer: XP buckets, level, unlocks and mastery flags.
//!
//! Every mutation of `UserStats`/`UnlockSet` goes through `apply`, which is a
//! plain function so the accounting rules can be tested without any I/O.
//! The `store` module wraps it with persistence and change notifications.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use crate::domain::Module;

pub const BUCKET_CAP: u32 = 50;
pub const POINTS_PER_LEVEL: u32 = 50;
/// Per-quiz cap on bucket XP gained from a module quiz.
pub const QUIZ_XP_CAP: u32 = 20;
pub const MIN_FEEDBACK_XP: u32 = 5;
pub const PROMPTING_UNLOCK_POINTS: u32 = 30;
pub const CODE_ONRAMP_UNLOCK_POINTS: u32 = 50;

/// Per-module XP, persisted as `{"creativity":..,"prompting":..,"code_onramp":..}`.
#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct BucketXp {
  #[serde(default)]
  pub creativity: u32,
  #[serde(default)]
  pub prompting: u32,
  #[serde(default)]
  pub code_onramp: u32,
}

impl BucketXp {
  pub fn get(&self, m: Module) -> u32 {
    match m {
      Module::Creativity => self.creativity,
      Module::Prompting => self.prompting,
      Module::CodeOnramp => self.code_onramp,
    }
  }

  fn slot(&mut self, m: Module) -> &mut u32 {
    match m {
      Module::Creativity => &mut self.creativity,
      Module::Prompting => &mut self.prompting,
      Module::CodeOnramp => &mut self.code_onramp,
    }
  }

  /// Add XP to a bucket, saturating at the cap.
  pub fn add(&mut self, m: Module, xp: u32) {
    let slot = self.slot(m);
    *slot = slot.saturating_add(xp).min(BUCKET_CAP);
  }

  pub fn is_full(&self, m: Module) -> bool {
    self.get(m) >= BUCKET_CAP
  }

  pub fn full_count(&self) -> usize {
    Module::ALL.iter().filter(|m| self.is_full(**m)).count()
  }
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct UserStats {
  #[serde(default)]
  pub points: u32,
  #[serde(default, rename = "bucketXP")]
  pub bucket_xp: BucketXp,
  #[serde(default)]
  pub completed_modules: BTreeSet<Module>,
  #[serde(default)]
  pub current_module: Option<Module>,
  #[serde(default = "first_level")]
  pub level: u32,
  #[serde(default)]
  pub all_buckets_complete: bool,
}

fn first_level() -> u32 {
  1
}

impl Default for UserStats {
  fn default() -> Self {
    Self {
      points: 0,
      bucket_xp: BucketXp::default(),
      completed_modules: BTreeSet::new(),
      current_module: None,
      level: first_level(),
      all_buckets_complete: false,
    }
  }
}

pub fn level_for(points: u32) -> u32 {
  points / POINTS_PER_LEVEL + 1
}

impl UserStats {
  /// Clamp values that may come from a hand-edited or older persisted blob.
  pub fn sanitize(&mut self) {
    for m in Module::ALL {
      let slot = self.bucket_xp.slot(m);
      *slot = (*slot).min(BUCKET_CAP);
    }
    self.level = level_for(self.points);
    for m in Module::ALL {
      if self.bucket_xp.is_full(m) {
        self.completed_modules.insert(m);
      }
    }
    if Module::ALL.iter().all(|m| self.bucket_xp.is_full(*m)) {
      self.all_buckets_complete = true;
    }
  }

  fn add_points(&mut self, gained: u32) {
    self.points = self.points.saturating_add(gained);
    self.level = level_for(self.points);
  }
}

/// Modules the learner may enter. Always contains `Creativity`.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(from = "Vec<Module>", into = "Vec<Module>")]
pub struct UnlockSet(BTreeSet<Module>);

impl Default for UnlockSet {
  fn default() -> Self {
    Self(BTreeSet::from([Module::Creativity]))
  }
}

impl From<Vec<Module>> for UnlockSet {
  fn from(mods: Vec<Module>) -> Self {
    let mut set: BTreeSet<Module> = mods.into_iter().collect();
    set.insert(Module::Creativity);
    Self(set)
  }
}

impl From<UnlockSet> for Vec<Module> {
  fn from(u: UnlockSet) -> Self {
    u.0.into_iter().collect()
  }
}

impl UnlockSet {
  /// Placement result: a pure function of the assessment total.
  pub fn from_assessment(total_points: u32) -> Self {
    let mut mods = vec![Module::Creativity];
    if total_points >= PROMPTING_UNLOCK_POINTS {
      mods.push(Module::Prompting);
    }
    if total_points >= CODE_ONRAMP_UNLOCK_POINTS {
      mods.push(Module::CodeOnramp);
    }
    mods.into()
  }

  pub fn contains(&self, m: Module) -> bool {
    self.0.contains(&m)
  }

  pub fn modules(&self) -> Vec<Module> {
    self.0.iter().copied().collect()
  }
}

/// XP gained from one accepted feedback score.
pub fn feedback_xp(score: f32) -> u32 {
  let score = if score.is_finite() { score.clamp(0.0, 10.0) } else { 0.0 };
  ((score * 1.5).floor() as u32).max(MIN_FEEDBACK_XP)
}

/// XP a module quiz adds to its bucket.
pub fn quiz_xp(total_points: u32) -> u32 {
  (total_points / 2).min(QUIZ_XP_CAP)
}

#[derive(Clone, Debug, PartialEq)]
pub enum ProgressEvent {
  QuizCompleted { module: Module, total_points: u32 },
  AssessmentCompleted { total_points: u32 },
  FeedbackAccepted { module: Module, score: f32 },
  FinalQuizCompleted { total_points: u32 },
  ModuleEntered { module: Module },
}

/// What changed, for notifications and logging.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Transition {
  pub points_gained: u32,
  pub xp_gained: u32,
  pub unlocks_changed: bool,
  /// Unlocks that an assessment retake took away.
  pub revoked: Vec<Module>,
  /// Buckets that reached the cap for the first time.
  pub mastered: Vec<Module>,
  /// Set exactly once, on the event that filled the last bucket.
  pub all_buckets_completed: bool,
}

/// Apply one event. Unlocks are replaced (not merged) on assessment completion.
pub fn apply(stats: &mut UserStats, unlocks: &mut UnlockSet, event: &ProgressEvent) -> Transition {
  let mut t = Transition::default();
  let before = stats.bucket_xp.clone();

  match *event {
    ProgressEvent::QuizCompleted { module, total_points } => {
      let xp = quiz_xp(total_points);
      stats.add_points(total_points);
      stats.bucket_xp.add(module, xp);
      t.points_gained = total_points;
      t.xp_gained = stats.bucket_xp.get(module) - before.get(module);
    }
    ProgressEvent::AssessmentCompleted { total_points } => {
      stats.add_points(total_points);
      t.points_gained = total_points;
      let next = UnlockSet::from_assessment(total_points);
      t.revoked = unlocks.0.difference(&next.0).copied().collect();
      t.unlocks_changed = *unlocks != next;
      *unlocks = next;
    }
    ProgressEvent::FeedbackAccepted { module, score } => {
      let xp = feedback_xp(score);
      stats.add_points(xp);
      stats.bucket_xp.add(module, xp);
      t.points_gained = xp;
      t.xp_gained = stats.bucket_xp.get(module) - before.get(module);
    }
    ProgressEvent::FinalQuizCompleted { total_points } => {
      stats.add_points(total_points);
      t.points_gained = total_points;
    }
    ProgressEvent::ModuleEntered { module } => {
      stats.current_module = Some(module);
    }
  }

  for m in Module::ALL {
    if stats.bucket_xp.is_full(m) && !before.is_full(m) {
      stats.completed_modules.insert(m);
      t.mastered.push(m);
    }
  }

  if !stats.all_buckets_complete && Module::ALL.iter().all(|m| stats.bucket_xp.is_full(*m)) {
    stats.all_buckets_complete = true;
    t.all_buckets_completed = true;
  }

  t
}

#[cfg(test)]
mod tests {
  use super::*;

  fn fresh() -> (UserStats, UnlockSet) {
    (UserStats::default(), UnlockSet::default())
  }

  #[test]
  fn feedback_xp_matches_table() {
    assert_eq!(feedback_xp(6.0), 9);
    assert_eq!(feedback_xp(1.0), 5);
    assert_eq!(feedback_xp(10.0), 15);
    assert_eq!(feedback_xp(-3.0), 5);
    assert_eq!(feedback_xp(f32::NAN), 5);
    assert_eq!(feedback_xp(99.0), 15);
  }

  #[test]
  fn quiz_completion_adds_points_and_capped_xp() {
    let (mut s, mut u) = fresh();
    let t = apply(&mut s, &mut u, &ProgressEvent::QuizCompleted { module: Module::Prompting, total_points: 60 });
    assert_eq!(s.points, 60);
    assert_eq!(s.bucket_xp.prompting, 20);
    assert_eq!(s.level, 2);
    assert_eq!(t.xp_gained, 20);
  }

  #[test]
  fn assessment_unlocks_follow_thresholds() {
    let cases = [
      (10, vec![Module::Creativity]),
      (29, vec![Module::Creativity]),
      (30, vec![Module::Creativity, Module::Prompting]),
      (50, vec![Module::Creativity, Module::Prompting, Module::CodeOnramp]),
    ];
    for (total, want) in cases {
      let (mut s, mut u) = fresh();
      apply(&mut s, &mut u, &ProgressEvent::AssessmentCompleted { total_points: total });
      assert_eq!(u.modules(), want, "total={total}");
      assert_eq!(s.points, total);
    }
  }

  #[test]
  fn assessment_retake_replaces_unlocks() {
    let (mut s, mut u) = fresh();
    apply(&mut s, &mut u, &ProgressEvent::AssessmentCompleted { total_points: 60 });
    let t = apply(&mut s, &mut u, &ProgressEvent::AssessmentCompleted { total_points: 20 });
    assert_eq!(u.modules(), vec![Module::Creativity]);
    assert_eq!(t.revoked, vec![Module::Prompting, Module::CodeOnramp]);
    assert!(t.unlocks_changed);
  }

  #[test]
  fn buckets_stay_in_range_and_level_tracks_points() {
    let (mut s, mut u) = fresh();
    let events = [
      ProgressEvent::FeedbackAccepted { module: Module::Creativity, score: 10.0 },
      ProgressEvent::QuizCompleted { module: Module::Creativity, total_points: 40 },
      ProgressEvent::FeedbackAccepted { module: Module::Creativity, score: 9.5 },
      ProgressEvent::QuizCompleted { module: Module::Creativity, total_points: 1000 },
      ProgressEvent::FeedbackAccepted { module: Module::CodeOnramp, score: -4.0 },
      ProgressEvent::FinalQuizCompleted { total_points: 70 },
    ];
    for e in &events {
      apply(&mut s, &mut u, e);
      for m in Module::ALL {
        assert!(s.bucket_xp.get(m) <= BUCKET_CAP);
      }
      assert_eq!(s.level, s.points / 50 + 1);
    }
    assert_eq!(s.bucket_xp.creativity, 50);
  }

  #[test]
  fn mastery_is_reported_once_per_bucket() {
    let (mut s, mut u) = fresh();
    let e = ProgressEvent::QuizCompleted { module: Module::Creativity, total_points: 40 };
    let mut mastered = vec![];
    for _ in 0..5 {
      mastered.extend(apply(&mut s, &mut u, &e).mastered);
    }
    assert_eq!(mastered, vec![Module::Creativity]);
    assert!(s.completed_modules.contains(&Module::Creativity));
  }

  #[test]
  fn all_buckets_complete_flips_once_and_sticks() {
    let (mut s, mut u) = fresh();
    let mut flips = 0;
    for m in Module::ALL {
      for _ in 0..4 {
        let t = apply(&mut s, &mut u, &ProgressEvent::FeedbackAccepted { module: m, score: 10.0 });
        if t.all_buckets_completed {
          flips += 1;
        }
      }
    }
    assert_eq!(flips, 1);
    assert!(s.all_buckets_complete);

    // Even a stats blob with a lowered bucket keeps the flag.
    s.bucket_xp.prompting = 10;
    let t = apply(&mut s, &mut u, &ProgressEvent::ModuleEntered { module: Module::Prompting });
    assert!(s.all_buckets_complete);
    assert!(!t.all_buckets_completed);
    assert_eq!(s.current_module, Some(Module::Prompting));
  }

  #[test]
  fn unlock_set_always_keeps_creativity() {
    let u: UnlockSet = serde_json::from_str(r#"["code_onramp"]"#).unwrap();
    assert!(u.contains(Module::Creativity));
    assert_eq!(serde_json::to_string(&u).unwrap(), r#"["creativity","code_onramp"]"#);
  }

  #[test]
  fn stats_json_uses_persisted_field_names() {
    let v = serde_json::to_value(UserStats::default()).unwrap();
    assert_eq!(v["bucketXP"]["code_onramp"], 0);
    assert_eq!(v["level"], 1);
    assert_eq!(v["allBucketsComplete"], false);
    assert!(v["currentModule"].is_null());
  }

  #[test]
  fn sanitize_clamps_buckets_and_recomputes_level() {
    let mut s: UserStats =
      serde_json::from_str(r#"{"points":120,"bucketXP":{"creativity":80},"level":9}"#).unwrap();
    s.sanitize();
    assert_eq!(s.bucket_xp.creativity, 50);
    assert_eq!(s.level, 3);
    assert!(s.completed_modules.contains(&Module::Creativity));
    assert!(!s.all_buckets_complete);
  }
}
