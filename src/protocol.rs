//! Public protocol structs for WebSocket and HTTP endpoints (serde ready).
//! Keep this small and stable to evolve backend and frontend independently.

use serde::{Deserialize, Serialize};

use crate::domain::{Challenge, Feedback, Module};
use crate::lab::LabSnapshot;
use crate::progression::UserStats;
use crate::scoring::{QuestionView, QuizKind, Reveal};
use crate::store::{ProgressSnapshot, StoreNotice};

/// Messages the client can send over WebSocket.
#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientWsMessage {
    Ping,
    GetProgress,
    StartAssessment,
    SkipAssessment,
    StartModuleQuiz {
        module: Module,
    },
    StartFinalQuiz,
    SelectOption {
        #[serde(rename = "quizId")]
        quiz_id: String,
        index: usize,
    },
    CheckAnswer {
        #[serde(rename = "quizId")]
        quiz_id: String,
    },
    NextQuestion {
        #[serde(rename = "quizId")]
        quiz_id: String,
    },
    RestartQuiz {
        #[serde(rename = "quizId")]
        quiz_id: String,
    },
    CloseQuiz {
        #[serde(rename = "quizId")]
        quiz_id: String,
    },
    EnterModule {
        module: Module,
    },
    NextChallenge,
    DraftEdited,
    SubmitAnswer {
        answer: String,
    },
}

impl ClientWsMessage {
    /// True for requests whose reply depends on a generator call.
    pub fn waits_on_generator(&self) -> bool {
        matches!(
            self,
            ClientWsMessage::EnterModule { .. } | ClientWsMessage::NextChallenge | ClientWsMessage::SubmitAnswer { .. }
        )
    }
}

/// Messages the server sends back over WebSocket.
/// The last four are pushed whenever the progress store changes.
#[derive(Debug, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerWsMessage {
    Pong,
    Progress {
        progress: ProgressOut,
    },
    Quiz {
        quiz: QuizOut,
    },
    Reveal {
        reveal: Reveal,
    },
    QuizStep {
        step: NextOut,
    },
    QuizClosed {
        #[serde(rename = "quizId")]
        quiz_id: String,
    },
    Challenge {
        challenge: ChallengeOut,
    },
    Feedback {
        result: SubmitOut,
    },
    DraftCleared,
    Error {
        message: String,
        code: u16,
    },
    StatsChanged {
        stats: UserStats,
    },
    UnlocksChanged {
        unlocks: Vec<Module>,
    },
    ModuleMastered {
        module: Module,
    },
    AllBucketsComplete,
}

impl From<StoreNotice> for ServerWsMessage {
    fn from(n: StoreNotice) -> Self {
        match n {
            StoreNotice::StatsChanged(stats) => ServerWsMessage::StatsChanged { stats },
            StoreNotice::UnlocksChanged(unlocks) => ServerWsMessage::UnlocksChanged { unlocks },
            StoreNotice::ModuleMastered(module) => ServerWsMessage::ModuleMastered { module },
            StoreNotice::AllBucketsComplete => ServerWsMessage::AllBucketsComplete,
        }
    }
}

//
// HTTP request/response DTOs
//

#[derive(Serialize)]
pub struct HealthOut {
    pub ok: bool,
}

#[derive(Debug, Serialize)]
pub struct ProgressOut {
    #[serde(flatten)]
    pub progress: ProgressSnapshot,
    pub lab: LabSnapshot,
}

#[derive(Debug, Clone, Copy, Deserialize, PartialEq)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum QuizStartIn {
    Module { module: Module },
    Final,
}

#[derive(Debug, Serialize)]
pub struct QuizOut {
    #[serde(rename = "quizId")]
    pub quiz_id: String,
    #[serde(flatten)]
    pub kind: QuizKind,
    pub question: QuestionView,
}

#[derive(Debug, Deserialize)]
pub struct SelectIn {
    pub index: usize,
}

/// Outcome of moving past the current question.
#[derive(Debug, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum NextOut {
    Next {
        question: QuestionView,
    },
    Completed {
        total: u32,
        points_gained: u32,
        xp_gained: u32,
        mastered: Vec<Module>,
        all_buckets_complete: bool,
        progress: ProgressSnapshot,
    },
}

#[derive(Debug, Serialize)]
pub struct ChallengeOut {
    #[serde(flatten)]
    pub challenge: Challenge,
    /// False when the learner moved on before this challenge arrived.
    pub current: bool,
}

#[derive(Debug, Deserialize)]
pub struct SubmitIn {
    pub answer: String,
}

#[derive(Debug, Serialize, PartialEq)]
pub struct FeedbackOut {
    pub score: f32,
    pub suggestions: Vec<String>,
    pub encouragement: String,
    pub passed: bool,
}

impl From<Feedback> for FeedbackOut {
    fn from(f: Feedback) -> Self {
        let passed = f.passed();
        FeedbackOut { score: f.score, suggestions: f.suggestions, encouragement: f.encouragement, passed }
    }
}

#[derive(Debug, Serialize, PartialEq)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum SubmitOut {
    Scored {
        feedback: FeedbackOut,
        xp_gained: u32,
        points_gained: u32,
        stats: UserStats,
    },
    /// The generator failed; nothing changed, the learner can retry.
    Unavailable {
        message: String,
    },
    /// The learner moved on while this was in flight; the result was dropped.
    Stale,
}

impl SubmitOut {
    pub fn status(&self) -> &'static str {
        match self {
            SubmitOut::Scored { .. } => "scored",
            SubmitOut::Unavailable { .. } => "unavailable",
            SubmitOut::Stale => "stale",
        }
    }
}
