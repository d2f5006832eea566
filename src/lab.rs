//! Ephemeral lab workspace: the active module, its current challenge and the
//! feedback for the learner's latest submission.
//!
//! Every challenge request starts a new attempt with a fresh token. Results of
//! external calls carry the token they were started with; a result whose token
//! no longer matches is stale and gets dropped.

use serde::Serialize;
use thiserror::Error;

use crate::domain::{Challenge, Feedback, Module};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Ticket {
  pub module: Module,
  pub token: u64,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum LabError {
  #[error("enter a module first")]
  NoActiveModule,
  #[error("feedback already in progress")]
  FeedbackPending,
}

/// How a finished feedback call was taken in.
#[derive(Debug, PartialEq)]
pub enum Resolution {
  Accepted,
  Unavailable,
  Stale,
}

#[derive(Clone, Debug, Serialize, PartialEq)]
pub struct LabSnapshot {
  pub active_module: Option<Module>,
  pub challenge: Option<Challenge>,
  pub challenge_loading: bool,
  pub feedback: Option<Feedback>,
  pub feedback_pending: bool,
}

#[derive(Debug, Default)]
pub struct Lab {
  active: Option<Module>,
  token: u64,
  challenge: Option<Challenge>,
  challenge_loading: bool,
  feedback: Option<Feedback>,
  feedback_pending: bool,
}

impl Lab {
  pub fn active_module(&self) -> Option<Module> {
    self.active
  }

  /// Start a new attempt in `module`; anything still in flight becomes stale.
  pub fn begin_challenge(&mut self, module: Module) -> Ticket {
    self.token += 1;
    self.active = Some(module);
    self.challenge = None;
    self.challenge_loading = true;
    self.feedback = None;
    self.feedback_pending = false;
    Ticket { module, token: self.token }
  }

  /// Install a challenge. Returns false if the ticket is stale.
  pub fn finish_challenge(&mut self, ticket: Ticket, challenge: Challenge) -> bool {
    if ticket.token != self.token {
      return false;
    }
    self.challenge = Some(challenge);
    self.challenge_loading = false;
    true
  }

  /// Mark a submission as in flight. Only one may be pending at a time.
  pub fn begin_feedback(&mut self) -> Result<Ticket, LabError> {
    let module = self.active.ok_or(LabError::NoActiveModule)?;
    if self.feedback_pending {
      return Err(LabError::FeedbackPending);
    }
    self.feedback_pending = true;
    self.feedback = None;
    Ok(Ticket { module, token: self.token })
  }

  pub fn finish_feedback(&mut self, ticket: Ticket, result: Option<Feedback>) -> Resolution {
    if ticket.token != self.token {
      return Resolution::Stale;
    }
    self.feedback_pending = false;
    match result {
      Some(fb) => {
        self.feedback = Some(fb);
        Resolution::Accepted
      }
      None => Resolution::Unavailable,
    }
  }

  /// The learner changed their answer; old feedback no longer applies.
  pub fn draft_edited(&mut self) {
    self.feedback = None;
  }

  pub fn snapshot(&self) -> LabSnapshot {
    LabSnapshot {
      active_module: self.active,
      challenge: self.challenge.clone(),
      challenge_loading: self.challenge_loading,
      feedback: self.feedback.clone(),
      feedback_pending: self.feedback_pending,
    }
  }
}
