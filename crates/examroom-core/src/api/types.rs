//! Wire types and errors for the persistence/catalog service contract.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use crate::answers::{Aggregates, AnswerState, AttemptStatus};

/// Whether the server considers the attempt still open.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AttemptProgress {
    InProgress,
    Submitted,
}

/// Server-confirmed answer state for one question.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuestionAnswerRecord {
    pub question_id: String,
    pub selected: BTreeSet<usize>,
    pub status: AttemptStatus,
    pub time_spent_secs: u64,
}

impl QuestionAnswerRecord {
    pub fn into_state(self) -> (String, AnswerState) {
        (
            self.question_id,
            AnswerState {
                selected: self.selected,
                status: self.status,
                time_spent_secs: self.time_spent_secs,
            },
        )
    }
}

/// Server-confirmed mirror of the whole attempt. The aggregate counters
/// here are authoritative and replace any locally computed count.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AttemptRecord {
    pub attempt_id: String,
    pub exam_id: String,
    pub progress: AttemptProgress,
    #[serde(default)]
    pub answers: Vec<QuestionAnswerRecord>,
    pub questions_attempted: u32,
    pub questions_left: u32,
    pub total_questions: u32,
}

impl AttemptRecord {
    pub fn aggregates(&self) -> Aggregates {
        Aggregates {
            attempted: self.questions_attempted,
            left: self.questions_left,
            total: self.total_questions,
        }
    }
}

/// Full current state of one question, sent on every save. Never a diff;
/// the server is the merge point across questions.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SavePayload {
    pub selected: BTreeSet<usize>,
    pub status: AttemptStatus,
    pub time_spent_secs: u64,
}

impl From<AnswerState> for SavePayload {
    fn from(state: AnswerState) -> Self {
        Self {
            selected: state.selected,
            status: state.status,
            time_spent_secs: state.time_spent_secs,
        }
    }
}

/// Terminal result of a submitted attempt.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SubmitResult {
    pub score: f64,
}

/// Backend error taxonomy.
///
/// `AlreadySubmitted` is terminal for the attempt; everything else is
/// transient and retryable at the caller's pace.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("Request timed out")]
    Timeout,

    #[error("Attempt already submitted")]
    AlreadySubmitted,

    #[error("Server error ({status}): {message}")]
    Server { status: u16, message: String },

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Invalid backend URL: {0}")]
    InvalidUrl(#[from] url::ParseError),

    #[error("Runtime error: {0}")]
    Runtime(#[from] std::io::Error),
}

impl ApiError {
    /// True for errors that end the attempt rather than inviting a retry.
    pub fn is_terminal(&self) -> bool {
        matches!(self, ApiError::AlreadySubmitted)
    }
}
