//! Boundary to the external text generator (feedback + challenges).
//!
//! The generator is opaque: we only rely on the JSON shapes below, and every
//! response is validated here before it can touch learner state.

use async_trait::async_trait;
use serde::Deserialize;
use uuid::Uuid;

use crate::config::Prompts;
use crate::domain::{Challenge, ChallengeSource, Feedback, Module};

#[async_trait]
pub trait Generator: Send + Sync {
  /// Evaluate a free-text submission for `module`.
  async fn feedback(&self, prompts: &Prompts, submission: &str, module: Module) -> Result<Feedback, String>;

  /// Produce a fresh practice task for `module`.
  async fn challenge(&self, prompts: &Prompts, module: Module) -> Result<Challenge, String>;

  fn name(&self) -> &'static str;
}

/// Feedback exactly as the generator is asked to return it.
#[derive(Debug, Deserialize)]
pub struct RawFeedback {
  pub score: f64,
  pub suggestions: Vec<String>,
  pub encouragement: String,
}

impl RawFeedback {
  /// Coerce into domain feedback: score clamped to 0..=10, blank suggestions dropped.
  pub fn validate(self) -> Result<Feedback, String> {
    if !self.score.is_finite() {
      return Err("feedback score is not a finite number".into());
    }
    let suggestions: Vec<String> = self
      .suggestions
      .into_iter()
      .map(|s| s.trim().to_string())
      .filter(|s| !s.is_empty())
      .collect();
    Ok(Feedback {
      score: self.score.clamp(0.0, 10.0) as f32,
      suggestions,
      encouragement: self.encouragement.trim().to_string(),
    })
  }
}

#[derive(Debug, Deserialize)]
pub struct RawChallenge {
  pub challenge: String,
  #[serde(default)]
  pub hints: Vec<String>,
}

impl RawChallenge {
  pub fn validate(self, module: Module) -> Result<Challenge, String> {
    let challenge = self.challenge.trim().to_string();
    if challenge.is_empty() {
      return Err("generated challenge is empty".into());
    }
    Ok(Challenge {
      id: Uuid::new_v4().to_string(),
      module,
      source: ChallengeSource::Generated,
      challenge,
      hints: self.hints.into_iter().filter(|h| !h.trim().is_empty()).collect(),
    })
  }
}

/// Used when no generator is configured: every call fails, so callers take
/// their fallback path (static challenge, "no feedback available").
pub struct Offline;

#[async_trait]
impl Generator for Offline {
  async fn feedback(&self, _prompts: &Prompts, _submission: &str, _module: Module) -> Result<Feedback, String> {
    Err("generator disabled (no OPENAI_API_KEY)".into())
  }

  async fn challenge(&self, _prompts: &Prompts, _module: Module) -> Result<Challenge, String> {
    Err("generator disabled (no OPENAI_API_KEY)".into())
  }

  fn name(&self) -> &'static str {
    "offline"
  }
}
