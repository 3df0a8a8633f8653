//! Backend trait - the seam between the engine and the persistence and
//! catalog services.
//!
//! The engine only ever talks to this trait; the HTTP implementation
//! lives in [`super::http`] and tests substitute scripted fakes.

use crate::api::types::{ApiError, AttemptRecord, SavePayload, SubmitResult};
use crate::catalog::{ExamDescriptor, Question};
use crate::integrity::IntegrityEvent;

pub trait ExamBackend {
    /// Exams visible to the current user.
    fn list_exams(&self) -> Result<Vec<ExamDescriptor>, ApiError>;

    fn fetch_exam(&self, exam_id: &str) -> Result<ExamDescriptor, ApiError>;

    /// Ordered question set. When `randomize` is set the server shuffles
    /// within section groupings; grouping order itself is fixed.
    fn fetch_questions(&self, exam_id: &str, randomize: bool) -> Result<Vec<Question>, ApiError>;

    /// Idempotent per user+exam: an existing open attempt is resumed,
    /// never duplicated. A submitted attempt yields `AlreadySubmitted`
    /// or a record with `progress == Submitted`.
    fn start_attempt(&self, exam_id: &str) -> Result<AttemptRecord, ApiError>;

    /// Send the full current state of one question. The returned record's
    /// aggregate counters are authoritative.
    fn save_answer(
        &self,
        exam_id: &str,
        question_id: &str,
        payload: &SavePayload,
    ) -> Result<AttemptRecord, ApiError>;

    /// Terminal, single call. The caller must have flushed the last save
    /// and left fullscreen first.
    fn submit(&self, exam_id: &str) -> Result<SubmitResult, ApiError>;

    /// Fire-and-forget audit log. Callers tolerate failure; there is no
    /// retry beyond this one delivery attempt.
    fn log_integrity_event(&self, exam_id: &str, event: &IntegrityEvent) -> Result<(), ApiError>;

    /// Whether the current user already completed this exam. Used at
    /// exam-list time to disable re-entry.
    fn has_attempted(&self, exam_id: &str) -> Result<bool, ApiError>;
}
