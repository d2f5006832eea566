//! Core behaviors shared by both HTTP and WebSocket handlers.
//!
//! This includes:
//!   - Opening, answering and completing quizzes (module, assessment, final)
//!   - Folding quiz totals and feedback scores into the progress store
//!   - Entering modules and fetching challenges (with static fallback)
//!   - Submitting free-text answers for feedback
//!
//! Locks are never held across a generator call. When both are needed, the
//! lab lock is taken before the store lock.

use rand::seq::SliceRandom;
use tracing::{debug, info, instrument, warn};
use uuid::Uuid;

use crate::assessment::select_assessment;
use crate::domain::{Module, QuizQuestion};
use crate::errors::{AppError, AppResult};
use crate::lab::{LabError, Resolution};
use crate::progression::ProgressEvent;
use crate::protocol::{ChallengeOut, NextOut, ProgressOut, QuizOut, QuizStartIn, SubmitOut};
use crate::scoring::{Advance, QuizKind, QuizSession, Reveal};
use crate::state::AppState;
use crate::store::ProgressSnapshot;

/// Score awarded when the learner skips placement and starts in the first studio.
pub const SKIP_ASSESSMENT_POINTS: u32 = 10;

pub async fn get_progress(state: &AppState) -> ProgressOut {
  let progress = state.store.lock().await.snapshot();
  let lab = state.lab.lock().await.snapshot();
  ProgressOut { progress, lab }
}

fn quiz_out(session: &QuizSession) -> QuizOut {
  QuizOut { quiz_id: session.id.clone(), kind: session.kind, question: session.view() }
}

async fn open_quiz(state: &AppState, kind: QuizKind, questions: Vec<QuizQuestion>) -> AppResult<QuizOut> {
  let session = QuizSession::new(Uuid::new_v4().to_string(), kind, questions, &mut rand::thread_rng())?;
  let out = quiz_out(&session);
  info!(target: "quiz", quiz_id = %session.id, kind = ?kind, questions = session.len(), "Quiz opened");
  state.quizzes.write().await.insert(session.id.clone(), session);
  Ok(out)
}

/// Draw a fresh placement quiz. Retakes are always allowed.
#[instrument(level = "info", skip(state))]
pub async fn start_assessment(state: &AppState) -> AppResult<QuizOut> {
  let questions = select_assessment(&state.assessment_pool, state.assessment_size, &mut rand::thread_rng());
  open_quiz(state, QuizKind::Assessment, questions).await
}

/// Skip placement: counts as an assessment scored at the minimum.
/// Only offered before any assessment; afterwards progress is returned unchanged.
#[instrument(level = "info", skip(state))]
pub async fn skip_assessment(state: &AppState) -> ProgressSnapshot {
  let mut store = state.store.lock().await;
  if store.assessment_done() {
    debug!(target: "progress", "Assessment already taken; skip ignored");
    return store.snapshot();
  }
  store.dispatch(ProgressEvent::AssessmentCompleted { total_points: SKIP_ASSESSMENT_POINTS });
  store.snapshot()
}

#[instrument(level = "info", skip(state))]
pub async fn start_quiz(state: &AppState, req: QuizStartIn) -> AppResult<QuizOut> {
  match req {
    QuizStartIn::Module { module } => {
      if !state.store.lock().await.is_unlocked(module) {
        return Err(AppError::Locked(module));
      }
      let questions = state.quiz_banks.get(&module).cloned().unwrap_or_default();
      open_quiz(state, QuizKind::Module { module }, questions).await
    }
    QuizStartIn::Final => {
      if !state.store.lock().await.stats().all_buckets_complete {
        return Err(AppError::FinalLocked);
      }
      let mut questions = state.all_questions();
      questions.shuffle(&mut rand::thread_rng());
      open_quiz(state, QuizKind::Final, questions).await
    }
  }
}

fn unknown_quiz(quiz_id: &str) -> AppError {
  AppError::NotFound(format!("quiz {}", quiz_id))
}

pub async fn get_quiz(state: &AppState, quiz_id: &str) -> AppResult<QuizOut> {
  let quizzes = state.quizzes.read().await;
  quizzes.get(quiz_id).map(quiz_out).ok_or_else(|| unknown_quiz(quiz_id))
}

#[instrument(level = "debug", skip(state))]
pub async fn select_option(state: &AppState, quiz_id: &str, index: usize) -> AppResult<QuizOut> {
  let mut quizzes = state.quizzes.write().await;
  let session = quizzes.get_mut(quiz_id).ok_or_else(|| unknown_quiz(quiz_id))?;
  session.select(index)?;
  Ok(quiz_out(session))
}

#[instrument(level = "debug", skip(state))]
pub async fn check_answer(state: &AppState, quiz_id: &str) -> AppResult<Reveal> {
  let mut quizzes = state.quizzes.write().await;
  let session = quizzes.get_mut(quiz_id).ok_or_else(|| unknown_quiz(quiz_id))?;
  Ok(session.check()?)
}

/// Score the current question and move on; on the last one, fold the total into progress.
#[instrument(level = "info", skip(state))]
pub async fn next_question(state: &AppState, quiz_id: &str) -> AppResult<NextOut> {
  let (step, kind) = {
    let mut quizzes = state.quizzes.write().await;
    let session = quizzes.get_mut(quiz_id).ok_or_else(|| unknown_quiz(quiz_id))?;
    let step = session.advance(&mut rand::thread_rng())?;
    let kind = session.kind;
    if matches!(step, Advance::Completed { .. }) {
      quizzes.remove(quiz_id);
    }
    (step, kind)
  };

  match step {
    Advance::Next(question) => Ok(NextOut::Next { question }),
    Advance::Completed { total } => {
      let event = match kind {
        QuizKind::Module { module } => ProgressEvent::QuizCompleted { module, total_points: total },
        QuizKind::Assessment => ProgressEvent::AssessmentCompleted { total_points: total },
        QuizKind::Final => ProgressEvent::FinalQuizCompleted { total_points: total },
      };
      info!(target: "quiz", %quiz_id, kind = ?kind, total, "Quiz completed");
      let mut store = state.store.lock().await;
      let t = store.dispatch(event);
      Ok(NextOut::Completed {
        total,
        points_gained: t.points_gained,
        xp_gained: t.xp_gained,
        mastered: t.mastered,
        all_buckets_complete: store.stats().all_buckets_complete,
        progress: store.snapshot(),
      })
    }
  }
}

#[instrument(level = "debug", skip(state))]
pub async fn restart_quiz(state: &AppState, quiz_id: &str) -> AppResult<QuizOut> {
  let mut quizzes = state.quizzes.write().await;
  let session = quizzes.get_mut(quiz_id).ok_or_else(|| unknown_quiz(quiz_id))?;
  session.restart(&mut rand::thread_rng());
  Ok(quiz_out(session))
}

/// Discard an open quiz without scoring it.
pub async fn close_quiz(state: &AppState, quiz_id: &str) -> AppResult<()> {
  match state.quizzes.write().await.remove(quiz_id) {
    Some(_) => {
      debug!(target: "quiz", %quiz_id, "Quiz closed");
      Ok(())
    }
    None => Err(unknown_quiz(quiz_id)),
  }
}

/// Fetch a challenge for the ticket's attempt and install it unless the learner moved on.
async fn fetch_challenge(state: &AppState, module: Module) -> ChallengeOut {
  let ticket = state.lab.lock().await.begin_challenge(module);
  let (challenge, origin) = state.choose_challenge(module).await;
  let current = state.lab.lock().await.finish_challenge(ticket, challenge.clone());
  if current {
    info!(target: "challenge", %module, id = %challenge.id, %origin, "Challenge installed");
  } else {
    debug!(target: "challenge", %module, id = %challenge.id, "Dropped stale challenge");
  }
  ChallengeOut { challenge, current }
}

#[instrument(level = "info", skip(state))]
pub async fn enter_module(state: &AppState, module: Module) -> AppResult<ChallengeOut> {
  {
    let mut store = state.store.lock().await;
    if !store.is_unlocked(module) {
      return Err(AppError::Locked(module));
    }
    store.dispatch(ProgressEvent::ModuleEntered { module });
  }
  Ok(fetch_challenge(state, module).await)
}

/// "Next step": replace the active module's challenge.
#[instrument(level = "info", skip(state))]
pub async fn next_challenge(state: &AppState) -> AppResult<ChallengeOut> {
  let module = state
    .lab
    .lock()
    .await
    .active_module()
    .ok_or(LabError::NoActiveModule)?;
  if !state.store.lock().await.is_unlocked(module) {
    return Err(AppError::Locked(module));
  }
  Ok(fetch_challenge(state, module).await)
}

pub async fn draft_edited(state: &AppState) {
  state.lab.lock().await.draft_edited();
}

/// Send a free-text answer for feedback. Stats only change when feedback
/// arrives for the attempt that is still current.
#[instrument(level = "info", skip(state, answer), fields(answer_len = answer.len()))]
pub async fn submit_answer(state: &AppState, answer: &str) -> AppResult<SubmitOut> {
  let answer = answer.trim();
  if answer.is_empty() {
    return Err(AppError::ValidationError("answer is empty".into()));
  }

  let ticket = state.lab.lock().await.begin_feedback()?;
  let feedback = match state.generator.feedback(&state.prompts, answer, ticket.module).await {
    Ok(f) => Some(f),
    Err(e) => {
      warn!(target: "challenge", module = %ticket.module, error = %e, "Feedback unavailable");
      None
    }
  };

  let mut lab = state.lab.lock().await;
  match (lab.finish_feedback(ticket, feedback.clone()), feedback) {
    (Resolution::Accepted, Some(fb)) => {
      let mut store = state.store.lock().await;
      let t = store.dispatch(ProgressEvent::FeedbackAccepted { module: ticket.module, score: fb.score });
      info!(target: "challenge", module = %ticket.module, score = fb.score, xp = t.xp_gained, "Feedback accepted");
      Ok(SubmitOut::Scored {
        feedback: fb.into(),
        xp_gained: t.xp_gained,
        points_gained: t.points_gained,
        stats: store.stats().clone(),
      })
    }
    (Resolution::Stale, _) => {
      debug!(target: "challenge", module = %ticket.module, "Dropped stale feedback");
      Ok(SubmitOut::Stale)
    }
    _ => Ok(SubmitOut::Unavailable { message: "No feedback available right now. Try again.".into() }),
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use std::collections::VecDeque;
  use std::sync::{Arc, Mutex};

  use async_trait::async_trait;
  use tokio::sync::Notify;

  use crate::config::{AgentConfig, Prompts};
  use crate::domain::{Challenge, ChallengeSource, Feedback};
  use crate::generator::Generator;
  use crate::storage::MemoryStore;

  /// Replays queued results; an empty queue means failure.
  #[derive(Default)]
  struct Scripted {
    feedback: Mutex<VecDeque<Result<Feedback, String>>>,
    challenges: Mutex<VecDeque<Result<Challenge, String>>>,
    gate: Option<Arc<Notify>>,
  }

  #[async_trait]
  impl Generator for Scripted {
    async fn feedback(&self, _p: &Prompts, _s: &str, _m: Module) -> Result<Feedback, String> {
      if let Some(gate) = &self.gate {
        gate.notified().await;
      }
      let next = self.feedback.lock().unwrap().pop_front();
      next.unwrap_or_else(|| Err("script exhausted".into()))
    }

    async fn challenge(&self, _p: &Prompts, _m: Module) -> Result<Challenge, String> {
      let next = self.challenges.lock().unwrap().pop_front();
      next.unwrap_or_else(|| Err("script exhausted".into()))
    }

    fn name(&self) -> &'static str {
      "scripted"
    }
  }

  fn fb(score: f32) -> Feedback {
    Feedback { score, suggestions: vec!["⭐ nice".into()], encouragement: "go on".into() }
  }

  fn state_with(gen: Scripted) -> AppState {
    AppState::from_parts(AgentConfig::default(), Box::new(MemoryStore::default()), Arc::new(gen))
  }

  async fn answer_all(state: &AppState, quiz: &QuizOut, correct: bool) -> NextOut {
    let id = quiz.quiz_id.clone();
    loop {
      let pick = {
        let quizzes = state.quizzes.read().await;
        let s = &quizzes[&id];
        let view = s.view();
        // Find the presented index of the right option via a reveal on a clone.
        let mut trial = s.clone();
        trial.select(0).unwrap();
        let right = trial.check().unwrap().correct_index;
        if correct { right } else { (right + 1) % view.options.len() }
      };
      select_option(state, &id, pick).await.unwrap();
      match next_question(state, &id).await.unwrap() {
        NextOut::Next { .. } => continue,
        done => return done,
      }
    }
  }

  #[tokio::test]
  async fn perfect_assessment_unlocks_everything() {
    let state = state_with(Scripted::default());
    let quiz = start_assessment(&state).await.unwrap();
    assert_eq!(quiz.question.total, 6);
    match answer_all(&state, &quiz, true).await {
      NextOut::Completed { total, progress, .. } => {
        assert_eq!(total, 60);
        assert!(progress.assessment_done);
        assert_eq!(progress.unlocks, Module::ALL.to_vec());
        assert_eq!(progress.stats.level, 2);
      }
      other => panic!("unexpected {other:?}"),
    }
    assert!(state.quizzes.read().await.is_empty());
  }

  #[tokio::test]
  async fn skipping_assessment_keeps_only_creativity() {
    let state = state_with(Scripted::default());
    let snap = skip_assessment(&state).await;
    assert_eq!(snap.unlocks, vec![Module::Creativity]);
    assert_eq!(snap.stats.points, 10);
    assert!(snap.assessment_done);
  }

  #[tokio::test]
  async fn skip_after_assessment_changes_nothing() {
    let state = state_with(Scripted::default());
    state.store.lock().await.dispatch(ProgressEvent::AssessmentCompleted { total_points: 60 });
    let before = state.store.lock().await.snapshot();
    let after = skip_assessment(&state).await;
    assert_eq!(after, before);
    assert_eq!(after.unlocks, Module::ALL.to_vec());
    assert_eq!(after.stats.points, 60);
  }

  #[tokio::test]
  async fn final_quiz_awards_points_only() {
    let state = state_with(Scripted::default());
    {
      let mut store = state.store.lock().await;
      for m in Module::ALL {
        for _ in 0..4 {
          store.dispatch(ProgressEvent::FeedbackAccepted { module: m, score: 10.0 });
        }
      }
      assert!(store.stats().all_buckets_complete);
    }
    let before = state.store.lock().await.stats().clone();

    let quiz = start_quiz(&state, QuizStartIn::Final).await.unwrap();
    assert_eq!(quiz.kind, QuizKind::Final);
    let expected = state.all_questions().len();
    assert_eq!(quiz.question.total, expected);
    assert_eq!(expected, Module::ALL.iter().map(|m| state.quiz_banks[m].len()).sum::<usize>());

    match answer_all(&state, &quiz, true).await {
      NextOut::Completed { total, points_gained, xp_gained, progress, .. } => {
        assert_eq!(total, 10 * expected as u32);
        assert_eq!(points_gained, total);
        assert_eq!(xp_gained, 0);
        assert_eq!(progress.stats.points, before.points + total);
        assert_eq!(progress.stats.bucket_xp, before.bucket_xp);
      }
      other => panic!("unexpected {other:?}"),
    }
  }

  #[tokio::test]
  async fn locked_module_and_final_quiz_are_refused() {
    let state = state_with(Scripted::default());
    assert_eq!(enter_module(&state, Module::Prompting).await.unwrap_err(), AppError::Locked(Module::Prompting));
    let err = start_quiz(&state, QuizStartIn::Module { module: Module::CodeOnramp }).await.unwrap_err();
    assert_eq!(err, AppError::Locked(Module::CodeOnramp));
    assert_eq!(start_quiz(&state, QuizStartIn::Final).await.unwrap_err(), AppError::FinalLocked);
  }

  #[tokio::test]
  async fn module_quiz_feeds_its_bucket() {
    let state = state_with(Scripted::default());
    let quiz = start_quiz(&state, QuizStartIn::Module { module: Module::Creativity }).await.unwrap();
    match answer_all(&state, &quiz, true).await {
      NextOut::Completed { total, xp_gained, progress, .. } => {
        assert_eq!(total, 20);
        assert_eq!(xp_gained, 10);
        assert_eq!(progress.stats.bucket_xp.creativity, 10);
      }
      other => panic!("unexpected {other:?}"),
    }
  }

  #[tokio::test]
  async fn next_without_selection_is_rejected() {
    let state = state_with(Scripted::default());
    let quiz = start_assessment(&state).await.unwrap();
    let err = next_question(&state, &quiz.quiz_id).await.unwrap_err();
    assert!(matches!(err, AppError::ValidationError(_)));
    assert!(matches!(next_question(&state, "nope").await.unwrap_err(), AppError::NotFound(_)));
  }

  #[tokio::test]
  async fn failed_challenge_serves_fallback() {
    let state = state_with(Scripted::default());
    let out = enter_module(&state, Module::Creativity).await.unwrap();
    assert!(out.current);
    assert_eq!(out.challenge.source, ChallengeSource::Fallback);
    assert!(!out.challenge.hints.is_empty());
    let progress = get_progress(&state).await;
    assert_eq!(progress.progress.stats.current_module, Some(Module::Creativity));
    assert_eq!(progress.lab.challenge.unwrap().id, out.challenge.id);
  }

  #[tokio::test]
  async fn accepted_feedback_awards_xp() {
    let gen = Scripted::default();
    gen.feedback.lock().unwrap().push_back(Ok(fb(6.0)));
    let state = state_with(gen);
    enter_module(&state, Module::Creativity).await.unwrap();
    match submit_answer(&state, "A pet dinosaur helper app").await.unwrap() {
      SubmitOut::Scored { feedback, xp_gained, stats, .. } => {
        assert!(feedback.passed);
        assert_eq!(xp_gained, 9);
        assert_eq!(stats.bucket_xp.creativity, 9);
        assert_eq!(stats.points, 9);
      }
      other => panic!("unexpected {other:?}"),
    }
  }

  #[tokio::test]
  async fn failed_feedback_leaves_stats_untouched() {
    let state = state_with(Scripted::default());
    enter_module(&state, Module::Creativity).await.unwrap();
    let before = state.store.lock().await.stats().clone();
    let out = submit_answer(&state, "my idea").await.unwrap();
    assert!(matches!(out, SubmitOut::Unavailable { .. }));
    assert_eq!(state.store.lock().await.stats(), &before);
    assert!(!state.lab.lock().await.snapshot().feedback_pending);
  }

  #[tokio::test]
  async fn empty_or_moduleless_submission_is_rejected() {
    let state = state_with(Scripted::default());
    assert!(matches!(submit_answer(&state, "   ").await.unwrap_err(), AppError::ValidationError(_)));
    assert!(matches!(submit_answer(&state, "idea").await.unwrap_err(), AppError::ValidationError(_)));
  }

  #[tokio::test]
  async fn feedback_for_abandoned_attempt_is_dropped() {
    let gate = Arc::new(Notify::new());
    let gen = Scripted { gate: Some(gate.clone()), ..Default::default() };
    gen.feedback.lock().unwrap().push_back(Ok(fb(10.0)));
    let state = Arc::new(state_with(gen));
    enter_module(&state, Module::Creativity).await.unwrap();

    let pending = {
      let state = state.clone();
      tokio::spawn(async move { submit_answer(&state, "robot pet").await })
    };
    while !state.lab.lock().await.snapshot().feedback_pending {
      tokio::task::yield_now().await;
    }
    assert_eq!(submit_answer(&state, "again").await.unwrap_err(), AppError::Busy("feedback already in progress".into()));

    // The learner asks for a new challenge before feedback arrives.
    next_challenge(&state).await.unwrap();
    gate.notify_one();

    assert_eq!(pending.await.unwrap().unwrap(), SubmitOut::Stale);
    assert_eq!(state.store.lock().await.stats().points, 0);
  }
}
