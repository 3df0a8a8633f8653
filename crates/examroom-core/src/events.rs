use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::answers::Aggregates;
use crate::attempt::Phase;
use crate::integrity::IntegrityEvent;

/// Every observable state change in the engine produces an Event.
/// The hosting UI (or the CLI) renders them; nothing in the engine
/// depends on whether anyone listens.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum Event {
    PhaseChanged {
        from: Phase,
        to: Phase,
        at: DateTime<Utc>,
    },
    AttemptStarted {
        exam_id: String,
        deadline: DateTime<Utc>,
        /// True when an open attempt was resumed with saved answers.
        resumed: bool,
        at: DateTime<Utc>,
    },
    TimerTick {
        remaining_secs: u64,
        at: DateTime<Utc>,
    },
    TimerExpired {
        at: DateTime<Utc>,
    },
    QuestionChanged {
        index: usize,
        question_id: String,
        at: DateTime<Utc>,
    },
    AnswerSaved {
        question_id: String,
        aggregates: Aggregates,
        at: DateTime<Utc>,
    },
    /// A save failed; the next scheduled save is the retry.
    SaveFailed {
        question_id: String,
        message: String,
        at: DateTime<Utc>,
    },
    IntegrityViolation {
        event: IntegrityEvent,
    },
    /// Non-blocking banner: fullscreen was left, re-entry offered.
    FullscreenWarning {
        at: DateTime<Utc>,
    },
    SubmitSucceeded {
        score: f64,
        at: DateTime<Utc>,
    },
    SubmitFailed {
        message: String,
        /// Terminal failures redirect out of the attempt; transient ones
        /// leave it retryable.
        terminal: bool,
        at: DateTime<Utc>,
    },
}
