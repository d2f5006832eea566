//! Domain models: skill modules, quiz questions, challenges and feedback.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// One of the three fixed skill buckets, in unlock order.
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(rename_all = "snake_case")]
pub enum Module {
  Creativity,
  Prompting,
  CodeOnramp,
}

impl Module {
  pub const ALL: [Module; 3] = [Module::Creativity, Module::Prompting, Module::CodeOnramp];

  /// Wire id used in URLs, persisted unlocks and prompts.
  pub fn id(self) -> &'static str {
    match self {
      Module::Creativity => "creativity",
      Module::Prompting => "prompting",
      Module::CodeOnramp => "code_onramp",
    }
  }

  /// Studio name shown to learners.
  pub fn title(self) -> &'static str {
    match self {
      Module::Creativity => "Design Studio",
      Module::Prompting => "Comm Studio",
      Module::CodeOnramp => "Logic Studio",
    }
  }
}

impl fmt::Display for Module {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(self.id())
  }
}

impl FromStr for Module {
  type Err = String;

  fn from_str(s: &str) -> Result<Self, Self::Err> {
    Module::ALL
      .into_iter()
      .find(|m| m.id() == s.trim())
      .ok_or_else(|| format!("unknown module '{}'", s))
  }
}

/// Immutable quiz content. `correct_answer` indexes the original option list.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct QuizQuestion {
  pub id: String,
  pub question: String,
  pub options: Vec<String>,
  pub correct_answer: usize,
  #[serde(default)]
  pub explanation: String,
}

impl QuizQuestion {
  /// A question is playable when it has options and its key points at one of them.
  pub fn is_well_formed(&self) -> bool {
    !self.options.is_empty() && self.correct_answer < self.options.len()
  }
}

/// Where did the current challenge come from?
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ChallengeSource {
  Generated, // produced by the external generator
  Fallback,  // static fallback for the module
}

/// A practice task shown in a module's lab. Replaced wholesale on every request.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct Challenge {
  pub id: String,
  pub module: Module,
  pub source: ChallengeSource,
  pub challenge: String,
  #[serde(default)]
  pub hints: Vec<String>,
}

/// Scores at or above this are treated as a pass by the lab.
pub const PASSING_SCORE: f32 = 6.0;

/// Validated evaluation of one free-text submission.
#[derive(Clone, Debug, Serialize, PartialEq)]
pub struct Feedback {
  /// Always finite and within 0..=10.
  pub score: f32,
  pub suggestions: Vec<String>,
  pub encouragement: String,
}

impl Feedback {
  pub fn passed(&self) -> bool {
    self.score >= PASSING_SCORE
  }
}
