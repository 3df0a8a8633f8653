//! Attempt state machine.
//!
//! The controller is a wall-clock-based state machine with no internal
//! threads: the host calls `tick()` roughly once per second and forwards
//! environment signals as they arrive, so every source of mutation is
//! serialized by construction. Within one navigation action, the save of
//! the departing question is always sequenced before the index moves.
//!
//! ## Phase transitions
//!
//! ```text
//! Instructions --begin--> Active --submit/expiry--> Submitting --ok--> Ended
//!      |                    ^                          |
//!      |                    +-----(transient fail)-----+
//!      +--(already submitted)--> Blocked
//! ```

use chrono::{DateTime, Duration, Utc};
use log::{debug, warn};
use serde::{Deserialize, Serialize};

use crate::answers::{Aggregates, AnswerStore};
use crate::api::types::SavePayload;
use crate::api::{ApiError, AttemptProgress, ExamBackend};
use crate::attempt::Phase;
use crate::catalog::{ExamDescriptor, Question};
use crate::environment::Environment;
use crate::error::{Result, ValidationError};
use crate::events::Event;
use crate::integrity::{EnvSignal, IntegrityEvent, IntegrityKind, IntegrityMonitor};
use crate::timer::{Countdown, TimerHandle};

/// Engine knobs, embedded in the application config.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AttemptTuning {
    /// Wall-clock autosave period in seconds.
    #[serde(default = "default_autosave_secs")]
    pub autosave_secs: u64,
    /// Request fullscreen at attempt start and warn on exit.
    #[serde(default = "default_true")]
    pub enforce_fullscreen: bool,
    /// Tab switches tolerated before the excessive-switching event.
    #[serde(default = "default_tab_switch_limit")]
    pub tab_switch_limit: u32,
}

fn default_autosave_secs() -> u64 {
    30
}
fn default_true() -> bool {
    true
}
fn default_tab_switch_limit() -> u32 {
    3
}

impl Default for AttemptTuning {
    fn default() -> Self {
        Self {
            autosave_secs: default_autosave_secs(),
            enforce_fullscreen: true,
            tab_switch_limit: default_tab_switch_limit(),
        }
    }
}

/// Engine response to one forwarded environment signal.
///
/// `suppress_default` carries the monitor's verdict out to the host:
/// when set, the host must cancel its default handling of the signal
/// (clipboard write, context menu, key dispatch).
#[derive(Debug, Default)]
pub struct SignalResponse {
    pub events: Vec<Event>,
    pub suppress_default: bool,
}

/// State machine for one attempt.
///
/// Owns the countdown, the integrity monitor and the answer store; talks
/// to the persistence service through [`ExamBackend`]. All methods take
/// `now` explicitly so the machine stays deterministic under test.
pub struct AttemptController {
    backend: Box<dyn ExamBackend>,
    env: Box<dyn Environment>,
    exam: ExamDescriptor,
    questions: Vec<Question>,
    store: AnswerStore,
    countdown: Countdown,
    monitor: IntegrityMonitor,
    tuning: AttemptTuning,
    phase: Phase,
    current_index: usize,
    timer_handle: Option<TimerHandle>,
    last_autosave_at: Option<DateTime<Utc>>,
    last_accrual_at: Option<DateTime<Utc>>,
    hidden: bool,
    aggregates: Aggregates,
    score: Option<f64>,
}

impl AttemptController {
    pub fn new(
        backend: Box<dyn ExamBackend>,
        env: Box<dyn Environment>,
        exam: ExamDescriptor,
        questions: Vec<Question>,
        tuning: AttemptTuning,
    ) -> Self {
        let monitor = IntegrityMonitor::new(tuning.tab_switch_limit);
        let total = questions.len() as u32;
        Self {
            backend,
            env,
            exam,
            questions,
            store: AnswerStore::new(),
            countdown: Countdown::new(),
            monitor,
            tuning,
            phase: Phase::Instructions,
            current_index: 0,
            timer_handle: None,
            last_autosave_at: None,
            last_accrual_at: None,
            hidden: false,
            aggregates: Aggregates {
                attempted: 0,
                left: total,
                total,
            },
            score: None,
        }
    }

    // ── Queries ──────────────────────────────────────────────────────

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn exam(&self) -> &ExamDescriptor {
        &self.exam
    }

    pub fn questions(&self) -> &[Question] {
        &self.questions
    }

    pub fn current_index(&self) -> usize {
        self.current_index
    }

    pub fn current_question(&self) -> Option<&Question> {
        self.questions.get(self.current_index)
    }

    pub fn answers(&self) -> &AnswerStore {
        &self.store
    }

    /// Last server-confirmed aggregate counters.
    pub fn aggregates(&self) -> Aggregates {
        self.aggregates
    }

    pub fn score(&self) -> Option<f64> {
        self.score
    }

    pub fn deadline(&self) -> Option<DateTime<Utc>> {
        self.countdown.deadline()
    }

    pub fn remaining_secs(&self, now: DateTime<Utc>) -> Option<u64> {
        self.countdown.remaining_secs(now)
    }

    pub fn is_timer_running(&self) -> bool {
        self.countdown.is_running()
    }

    pub fn monitor(&self) -> &IntegrityMonitor {
        &self.monitor
    }

    // ── Commands ─────────────────────────────────────────────────────

    /// `Instructions -> Active`: request fullscreen, start (or resume)
    /// the server-side attempt, seed saved answers, arm the countdown
    /// at `min(exam end, now + duration)` and attach the monitor.
    ///
    /// A transient backend failure leaves the phase at `Instructions`
    /// and is returned as an error; an already-submitted attempt
    /// short-circuits to `Blocked` with nothing started.
    pub fn begin(&mut self, now: DateTime<Utc>) -> Result<Vec<Event>> {
        if self.phase != Phase::Instructions {
            return Err(ValidationError::WrongPhase {
                operation: "begin".into(),
                phase: self.phase.name().into(),
            }
            .into());
        }

        let mut events = Vec::new();
        if self.tuning.enforce_fullscreen {
            if !self.env.fullscreen_supported() {
                events.push(self.integrity_note(
                    "fullscreen unsupported; proceeding without enforcement",
                    now,
                ));
            } else if let Err(e) = self.env.enter_fullscreen() {
                events.push(self.integrity_note(&format!("fullscreen request failed: {e}"), now));
            }
        }

        let record = match self.backend.start_attempt(&self.exam.id) {
            Ok(record) => record,
            Err(ApiError::AlreadySubmitted) => {
                events.push(self.set_phase(Phase::Blocked, now));
                return Ok(events);
            }
            Err(e) => return Err(e.into()),
        };

        if record.progress == AttemptProgress::Submitted {
            events.push(self.set_phase(Phase::Blocked, now));
            return Ok(events);
        }

        let resumed = !record.answers.is_empty();
        self.aggregates = record.aggregates();
        for rec in record.answers {
            let (id, state) = rec.into_state();
            self.store.seed(&id, state);
        }

        let deadline = self
            .exam
            .ends_at
            .min(now + Duration::minutes(self.exam.duration_min as i64));
        self.timer_handle = Some(self.countdown.start(deadline));
        self.monitor.attach();
        self.last_autosave_at = Some(now);
        self.last_accrual_at = Some(now);
        self.hidden = false;

        events.push(self.set_phase(Phase::Active, now));
        events.push(Event::AttemptStarted {
            exam_id: self.exam.id.clone(),
            deadline,
            resumed,
            at: now,
        });
        Ok(events)
    }

    /// Advance against the wall clock: accrue time on the visible
    /// question, tick the countdown (expiry forces submission with no
    /// confirmation), and run the periodic autosave.
    pub fn tick(&mut self, now: DateTime<Utc>) -> Vec<Event> {
        let mut events = Vec::new();
        if self.phase != Phase::Active {
            return events;
        }

        self.accrue(now);

        if let Some(out) = self.countdown.tick(now) {
            events.push(Event::TimerTick {
                remaining_secs: out.remaining_secs,
                at: now,
            });
            if out.expired {
                events.push(Event::TimerExpired { at: now });
                events.extend(self.finish(now));
                return events;
            }
        }

        if let Some(last) = self.last_autosave_at {
            if now - last >= Duration::seconds(self.tuning.autosave_secs as i64) {
                self.last_autosave_at = Some(now);
                events.extend(self.autosave(now));
            }
        }
        events
    }

    /// Toggle one option on the current question.
    pub fn toggle_option(&mut self, option_index: usize) -> Result<()> {
        self.require_active("select")?;
        let (id, options_len) = match self.questions.get(self.current_index) {
            Some(q) => (q.id.clone(), q.options.len()),
            None => {
                return Err(ValidationError::OutOfBounds {
                    collection: "questions".into(),
                    index: self.current_index,
                    len: self.questions.len(),
                }
                .into())
            }
        };
        if option_index >= options_len {
            return Err(ValidationError::OutOfBounds {
                collection: "options".into(),
                index: option_index,
                len: options_len,
            }
            .into());
        }
        self.store.select(&id, option_index);
        Ok(())
    }

    /// Mark the current question for review. Selection is preserved.
    pub fn mark_current_for_review(&mut self) -> Result<()> {
        self.require_active("mark for review")?;
        let id = match self.questions.get(self.current_index) {
            Some(q) => q.id.clone(),
            None => {
                return Err(ValidationError::OutOfBounds {
                    collection: "questions".into(),
                    index: self.current_index,
                    len: self.questions.len(),
                }
                .into())
            }
        };
        self.store.mark_for_review(&id);
        Ok(())
    }

    /// Jump to a question. The departing question's accumulated time and
    /// selection are flushed to the server before the index advances; a
    /// failed save is absorbed (the next save is the retry) and the move
    /// still happens.
    pub fn goto(&mut self, index: usize, now: DateTime<Utc>) -> Result<Vec<Event>> {
        self.require_active("navigate")?;
        if index >= self.questions.len() {
            return Err(ValidationError::OutOfBounds {
                collection: "questions".into(),
                index,
                len: self.questions.len(),
            }
            .into());
        }

        let mut events = Vec::new();
        if index != self.current_index {
            self.accrue(now);
            let departing = self.questions[self.current_index].id.clone();
            events.push(self.save_question(&departing, now));
            self.current_index = index;
            events.push(Event::QuestionChanged {
                index,
                question_id: self.questions[index].id.clone(),
                at: now,
            });
        }
        Ok(events)
    }

    pub fn next(&mut self, now: DateTime<Utc>) -> Result<Vec<Event>> {
        if self.current_index + 1 < self.questions.len() {
            self.goto(self.current_index + 1, now)
        } else {
            Ok(Vec::new())
        }
    }

    pub fn previous(&mut self, now: DateTime<Utc>) -> Result<Vec<Event>> {
        if self.current_index > 0 {
            self.goto(self.current_index - 1, now)
        } else {
            Ok(Vec::new())
        }
    }

    /// Explicit, user-confirmed submission.
    pub fn submit(&mut self, now: DateTime<Utc>) -> Vec<Event> {
        if self.phase != Phase::Active {
            return Vec::new();
        }
        self.finish(now)
    }

    /// Forward one raw environment signal. Only meaningful while
    /// `Active`; each resulting integrity event is delivered to the
    /// backend exactly once, and delivery failure is dropped. The
    /// response tells the host whether to suppress its default action.
    pub fn signal(&mut self, signal: &EnvSignal, now: DateTime<Utc>) -> SignalResponse {
        let mut response = SignalResponse::default();
        if self.phase != Phase::Active {
            return response;
        }

        if let EnvSignal::VisibilityChanged { hidden } = signal {
            // Accrue up to the transition so hidden time never counts.
            self.accrue(now);
            self.hidden = *hidden;
        }

        let outcome = self.monitor.observe(signal, now);
        response.suppress_default = outcome.suppress_default;
        for ev in outcome.events {
            self.forward_integrity(&ev);
            let kind = ev.kind;
            response.events.push(Event::IntegrityViolation { event: ev });
            if kind == IntegrityKind::FullscreenExit {
                // Phase does not change: a visible, non-blocking banner
                // with a re-enter action is all that happens.
                response.events.push(Event::FullscreenWarning { at: now });
            }
        }
        response
    }

    /// Re-enter fullscreen from the warning banner.
    pub fn reenter_fullscreen(&mut self) -> Result<()> {
        self.env.enter_fullscreen()?;
        Ok(())
    }

    /// Navigate away from the attempt without submitting. Tears down the
    /// countdown, the monitor and the autosave clock so nothing keeps
    /// firing against a dead attempt.
    pub fn leave(&mut self, now: DateTime<Utc>) -> Vec<Event> {
        match self.phase {
            Phase::Active => {
                self.teardown();
                vec![self.set_phase(Phase::ListingExams, now)]
            }
            Phase::Instructions | Phase::Ended | Phase::Blocked => {
                vec![self.set_phase(Phase::ListingExams, now)]
            }
            _ => Vec::new(),
        }
    }

    // ── Internal ─────────────────────────────────────────────────────

    /// `Active -> Submitting -> (Ended | Active | Blocked)`.
    fn finish(&mut self, now: DateTime<Utc>) -> Vec<Event> {
        let mut events = Vec::new();
        events.push(self.set_phase(Phase::Submitting, now));

        self.accrue(now);
        // Final flush of the current question. A failure is absorbed;
        // the server already holds the last periodic save.
        let current = self.questions.get(self.current_index).map(|q| q.id.clone());
        if let Some(id) = current {
            events.push(self.save_question(&id, now));
        }

        if self.env.is_fullscreen() {
            if let Err(e) = self.env.exit_fullscreen() {
                warn!("fullscreen exit failed: {e}");
            }
        }

        match self.backend.submit(&self.exam.id) {
            Ok(result) => {
                self.score = Some(result.score);
                self.teardown();
                events.push(Event::SubmitSucceeded {
                    score: result.score,
                    at: now,
                });
                events.push(self.set_phase(Phase::Ended, now));
            }
            Err(e) if e.is_terminal() => {
                self.teardown();
                events.push(Event::SubmitFailed {
                    message: e.to_string(),
                    terminal: true,
                    at: now,
                });
                events.push(self.set_phase(Phase::Blocked, now));
            }
            Err(e) => {
                warn!("submit failed, attempt stays open: {e}");
                events.push(Event::SubmitFailed {
                    message: e.to_string(),
                    terminal: false,
                    at: now,
                });
                events.push(self.set_phase(Phase::Active, now));
            }
        }
        events
    }

    /// Save current question plus any other dirty questions.
    fn autosave(&mut self, now: DateTime<Utc>) -> Vec<Event> {
        let mut ids: Vec<String> = self
            .questions
            .get(self.current_index)
            .map(|q| vec![q.id.clone()])
            .unwrap_or_default();
        for id in self.store.dirty() {
            if !ids.contains(&id) {
                ids.push(id);
            }
        }
        ids.into_iter()
            .map(|id| self.save_question(&id, now))
            .collect()
    }

    fn save_question(&mut self, question_id: &str, now: DateTime<Utc>) -> Event {
        let payload = SavePayload::from(self.store.snapshot(question_id));
        match self.backend.save_answer(&self.exam.id, question_id, &payload) {
            Ok(record) => {
                self.aggregates = record.aggregates();
                self.store.mark_saved(question_id);
                Event::AnswerSaved {
                    question_id: question_id.to_string(),
                    aggregates: self.aggregates,
                    at: now,
                }
            }
            Err(e) => {
                warn!("save failed for {question_id}: {e}");
                Event::SaveFailed {
                    question_id: question_id.to_string(),
                    message: e.to_string(),
                    at: now,
                }
            }
        }
    }

    /// Accrue wall-clock time on the visible question. Nothing accrues
    /// while the page is hidden; the accrual clock still advances so
    /// hidden time is never counted retroactively.
    fn accrue(&mut self, now: DateTime<Utc>) {
        let Some(last) = self.last_accrual_at else {
            self.last_accrual_at = Some(now);
            return;
        };
        let delta = (now - last).num_seconds();
        self.last_accrual_at = Some(now);
        if delta <= 0 || self.hidden {
            return;
        }
        if let Some(id) = self.questions.get(self.current_index).map(|q| q.id.clone()) {
            self.store.accumulate_time(&id, delta as u64);
        }
    }

    fn teardown(&mut self) {
        if let Some(handle) = self.timer_handle.take() {
            self.countdown.cancel(handle);
        }
        self.monitor.detach();
        self.last_autosave_at = None;
        self.last_accrual_at = None;
    }

    fn set_phase(&mut self, to: Phase, now: DateTime<Utc>) -> Event {
        let from = self.phase;
        self.phase = to;
        debug!("phase {} -> {}", from.name(), to.name());
        Event::PhaseChanged { from, to, at: now }
    }

    fn require_active(&self, operation: &str) -> Result<()> {
        if self.phase != Phase::Active {
            return Err(ValidationError::WrongPhase {
                operation: operation.into(),
                phase: self.phase.name().into(),
            }
            .into());
        }
        Ok(())
    }

    fn integrity_note(&mut self, description: &str, now: DateTime<Utc>) -> Event {
        let ev = IntegrityEvent {
            kind: IntegrityKind::Other,
            description: description.to_string(),
            at: now,
        };
        self.forward_integrity(&ev);
        Event::IntegrityViolation { event: ev }
    }

    fn forward_integrity(&self, event: &IntegrityEvent) {
        if let Err(e) = self.backend.log_integrity_event(&self.exam.id, event) {
            warn!("integrity log dropped after one attempt: {e}");
        }
    }
}
