//! Loading configuration (settings, prompts, quiz content) from TOML.
//!
//! See `AgentConfig` and `Prompts` for the expected schema. Every section is
//! optional; anything missing falls back to the built-in seeds.

use serde::Deserialize;
use tracing::{error, info};

use crate::domain::{Module, QuizQuestion};

#[derive(Clone, Debug, Deserialize, Default)]
pub struct AgentConfig {
  #[serde(default)]
  pub settings: Settings,
  #[serde(default)]
  pub prompts: Prompts,
  /// Module quiz banks; entries for the same module are concatenated.
  #[serde(default)]
  pub quiz: Vec<QuizBankCfg>,
  /// Placement pool.
  #[serde(default)]
  pub assessment: Vec<QuizQuestion>,
  /// Static challenges used when generation fails.
  #[serde(default)]
  pub fallback: Vec<FallbackCfg>,
}

#[derive(Clone, Debug, Deserialize, Default)]
pub struct Settings {
  #[serde(default)] pub assessment_size: Option<usize>,
  #[serde(default)] pub data_path: Option<String>,
}

#[derive(Clone, Debug, Deserialize)]
pub struct QuizBankCfg {
  pub module: Module,
  #[serde(default)]
  pub questions: Vec<QuizQuestion>,
}

#[derive(Clone, Debug, Deserialize)]
pub struct FallbackCfg {
  pub module: Module,
  pub challenge: String,
  #[serde(default)]
  pub hints: Vec<String>,
}

/// Prompts used by the generator client.
/// Placeholders: `{submission}`, `{module}`, `{studio}`, `{focus}`.
#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct Prompts {
  pub feedback_system: String,
  pub feedback_user_template: String,
  pub challenge_system: String,
  pub challenge_user_template: String,
  pub creativity_focus: String,
  pub prompting_focus: String,
  pub code_onramp_focus: String,
}

impl Prompts {
  pub fn focus(&self, m: Module) -> &str {
    match m {
      Module::Creativity => &self.creativity_focus,
      Module::Prompting => &self.prompting_focus,
      Module::CodeOnramp => &self.code_onramp_focus,
    }
  }
}

impl Default for Prompts {
  fn default() -> Self {
    Self {
      feedback_system: "You are an encouraging mentor for builders aged 10-15. Speak at a 6th grade reading level. Respond ONLY with strict JSON.".into(),
      feedback_user_template: "Studio: {studio} ({module})\nSubmission: {submission}\n\n{focus}\nScore 1-10 (6+ passes). Return JSON {\"score\": number, \"suggestions\": string[], \"encouragement\": string}.".into(),
      challenge_system: "You create short builder challenges for a 12-year-old. Respond ONLY with strict JSON.".into(),
      challenge_user_template: "Studio: {studio} ({module})\n{focus}\nReturn JSON {\"challenge\": string, \"hints\": string[]}.".into(),
      creativity_focus: "Focus on the vision and the vibe of the idea. Ideas can start as drawings, stories or a chat with the AI.".into(),
      prompting_focus: "Focus on how clear and specific the prompt is. Challenges give a vague prompt to rewrite.".into(),
      code_onramp_focus: "Focus on the logic: conditions, steps and spotting bugs.".into(),
    }
  }
}

/// Attempt to load `AgentConfig` from CULTIVATOR_CONFIG_PATH. On any parsing/IO error, returns None.
pub fn load_agent_config_from_env() -> Option<AgentConfig> {
  let path = std::env::var("CULTIVATOR_CONFIG_PATH").ok()?;
  match std::fs::read_to_string(&path) {
    Ok(s) => match toml::from_str::<AgentConfig>(&s) {
      Ok(cfg) => {
        info!(target: "cultivator", %path, "Loaded config (TOML)");
        Some(cfg)
      }
      Err(e) => {
        error!(target: "cultivator", %path, error = %e, "Failed to parse TOML config");
        None
      }
    },
    Err(e) => {
      error!(target: "cultivator", %path, error = %e, "Failed to read TOML config file");
      None
    }
  }
}
