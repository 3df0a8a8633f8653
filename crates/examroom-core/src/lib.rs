//! # Examroom Core Library
//!
//! This library provides the client-side engine for taking a timed,
//! proctored exam: the attempt state machine, deadline countdown,
//! integrity monitoring, per-question answer state and the contract with
//! the persistence/catalog services. The CLI binary is a thin layer over
//! this crate; a GUI shell would sit on the same surface.
//!
//! ## Architecture
//!
//! - **AttemptController**: a wall-clock-based state machine that
//!   requires the caller to periodically invoke `tick()` and to forward
//!   environment signals
//! - **Countdown**: remaining time recomputed from the absolute deadline
//!   each tick, so it self-corrects against drift
//! - **IntegrityMonitor**: turns focus/fullscreen/clipboard/keyboard
//!   signals into a typed, append-only violation log
//! - **AnswerStore**: per-question selection, status and cumulative time
//!   with dirty tracking for the autosave pass
//! - **ExamBackend**: trait seam over the remote persistence and catalog
//!   services, with a reqwest implementation
//!
//! ## Key Components
//!
//! - [`AttemptController`]: attempt phase machine
//! - [`ExamSession`]: composition root, the only place wall-clock time
//!   and real I/O enter
//! - [`Config`]: application configuration management

pub mod answers;
pub mod api;
pub mod attempt;
pub mod catalog;
pub mod environment;
pub mod error;
pub mod events;
pub mod integrity;
pub mod session;
pub mod storage;
pub mod timer;

pub use answers::{Aggregates, AnswerState, AnswerStore, AttemptStatus};
pub use api::{
    ApiError, AttemptProgress, AttemptRecord, ExamBackend, HttpBackend, QuestionAnswerRecord,
    SavePayload, SubmitResult,
};
pub use attempt::{AttemptController, AttemptTuning, Phase, SignalResponse};
pub use catalog::{
    shuffle_within_sections, ChoiceOption, Difficulty, ExamDescriptor, Question, Section,
    Visibility,
};
pub use environment::{Environment, EnvironmentError, NoopEnvironment};
pub use error::{ConfigError, CoreError, ValidationError};
pub use events::Event;
pub use integrity::{
    ClipboardAction, EnvSignal, IntegrityEvent, IntegrityKind, IntegrityMonitor, SignalOutcome,
};
pub use session::ExamSession;
pub use storage::Config;
pub use timer::{Countdown, TickOutcome, TimerHandle};
