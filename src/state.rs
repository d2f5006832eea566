//! Application state: the progress store, lab workspace, open quizzes,
//! quiz content, prompts and the generator client.
//!
//! Content comes from the TOML config when present and from built-in seeds
//! otherwise. The generator is OpenAI when a key is configured; without one the
//! offline generator makes every call take its fallback path.

use std::{collections::HashMap, path::PathBuf, sync::Arc};
use tokio::sync::{Mutex, RwLock};
use tracing::{error, info, instrument, warn};

use crate::assessment::DEFAULT_ASSESSMENT_SIZE;
use crate::config::{load_agent_config_from_env, AgentConfig, Prompts};
use crate::domain::{Challenge, Module, QuizQuestion};
use crate::generator::{Generator, Offline};
use crate::lab::Lab;
use crate::openai::OpenAI;
use crate::scoring::QuizSession;
use crate::seeds::{fallback_challenge, make_fallback, seed_assessment_pool, seed_quiz_bank};
use crate::storage::{JsonFileStore, KeyValueStore};
use crate::store::ProgressStore;

const DEFAULT_DATA_PATH: &str = "./data/progress.json";

pub struct AppState {
    pub store: Arc<Mutex<ProgressStore>>,
    pub lab: Arc<Mutex<Lab>>,
    pub quizzes: Arc<RwLock<HashMap<String, QuizSession>>>,
    pub quiz_banks: HashMap<Module, Vec<QuizQuestion>>,
    pub assessment_pool: Vec<QuizQuestion>,
    pub assessment_size: usize,
    pub fallbacks: HashMap<Module, (String, Vec<String>)>,
    pub generator: Arc<dyn Generator>,
    pub prompts: Prompts,
}

/// Keep only playable questions, logging the rest.
fn playable(questions: Vec<QuizQuestion>, bank: &str) -> Vec<QuizQuestion> {
    questions
        .into_iter()
        .filter(|q| {
            let ok = q.is_well_formed();
            if !ok {
                error!(target: "cultivator", id = %q.id, %bank, "Skipping question: answer key out of range.");
            }
            ok
        })
        .collect()
}

impl AppState {
    /// Build state from env: load config, open storage, init the generator.
    #[instrument(level = "info", skip_all)]
    pub fn new() -> Self {
        let cfg = load_agent_config_from_env().unwrap_or_default();

        let data_path: PathBuf = std::env::var("CULTIVATOR_DATA_PATH")
            .ok()
            .or_else(|| cfg.settings.data_path.clone())
            .unwrap_or_else(|| DEFAULT_DATA_PATH.into())
            .into();
        let storage = JsonFileStore::open(data_path);
        info!(target: "cultivator", path = %storage.path().display(), "Progress storage ready");

        let generator: Arc<dyn Generator> = match OpenAI::from_env() {
            Some(oa) => {
                info!(target: "cultivator", base_url = %oa.base_url, fast_model = %oa.fast_model, strong_model = %oa.strong_model, "OpenAI enabled.");
                Arc::new(oa)
            }
            None => {
                info!(target: "cultivator", "OpenAI disabled (no OPENAI_API_KEY). Using fallback challenges; feedback unavailable.");
                Arc::new(Offline)
            }
        };

        Self::from_parts(cfg, Box::new(storage), generator)
    }

    /// Assemble state from explicit parts (used by `new` and by tests).
    pub fn from_parts(
        cfg: AgentConfig,
        storage: Box<dyn KeyValueStore>,
        generator: Arc<dyn Generator>,
    ) -> Self {
        let mut quiz_banks: HashMap<Module, Vec<QuizQuestion>> = HashMap::new();
        for bank in cfg.quiz {
            quiz_banks
                .entry(bank.module)
                .or_default()
                .extend(playable(bank.questions, bank.module.id()));
        }
        for m in Module::ALL {
            let bank = quiz_banks.entry(m).or_default();
            if bank.is_empty() {
                *bank = seed_quiz_bank(m);
            }
        }

        let mut assessment_pool = playable(cfg.assessment, "assessment");
        if assessment_pool.is_empty() {
            assessment_pool = seed_assessment_pool();
        }
        let assessment_size = cfg.settings.assessment_size.unwrap_or(DEFAULT_ASSESSMENT_SIZE);
        if assessment_pool.len() < assessment_size {
            warn!(target: "cultivator", pool = assessment_pool.len(), assessment_size, "Assessment pool smaller than sample size; every question will be used");
        }

        let mut fallbacks: HashMap<Module, (String, Vec<String>)> =
            Module::ALL.into_iter().map(|m| (m, fallback_challenge(m))).collect();
        for f in cfg.fallback {
            if !f.challenge.trim().is_empty() {
                fallbacks.insert(f.module, (f.challenge, f.hints));
            }
        }

        for m in Module::ALL {
            info!(target: "cultivator", module = %m, questions = quiz_banks[&m].len(), "Quiz bank ready");
        }
        info!(target: "cultivator", pool = assessment_pool.len(), assessment_size, generator = generator.name(), "Startup content inventory");

        Self {
            store: Arc::new(Mutex::new(ProgressStore::load(storage))),
            lab: Arc::new(Mutex::new(Lab::default())),
            quizzes: Arc::new(RwLock::new(HashMap::new())),
            quiz_banks,
            assessment_pool,
            assessment_size,
            fallbacks,
            generator,
            prompts: cfg.prompts,
        }
    }

    /// Every module bank in unlock order, for the final quiz.
    pub fn all_questions(&self) -> Vec<QuizQuestion> {
        Module::ALL
            .iter()
            .flat_map(|m| self.quiz_banks.get(m).cloned().unwrap_or_default())
            .collect()
    }

    /// Selection policy: ask the generator; on failure serve the module's static fallback.
    #[instrument(level = "info", skip(self), fields(%module))]
    pub async fn choose_challenge(&self, module: Module) -> (Challenge, &'static str) {
        match self.generator.challenge(&self.prompts, module).await {
            Ok(c) => {
                info!(target: "challenge", %module, id = %c.id, source = "generated", "Generated fresh challenge");
                (c, "generated")
            }
            Err(e) => {
                warn!(target: "challenge", %module, error = %e, "Challenge generation failed; using fallback");
                let (task, hints) = self
                    .fallbacks
                    .get(&module)
                    .cloned()
                    .unwrap_or_else(|| fallback_challenge(module));
                (make_fallback(module, task, hints), "fallback")
            }
        }
    }
}
