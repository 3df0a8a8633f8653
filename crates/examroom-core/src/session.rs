//! Attempt session composition.
//!
//! `ExamSession` wires the catalog fetch, the optional client-side
//! reshuffle and the controller together, and is the one place the real
//! wall clock enters the engine: every `*_now` method injects
//! `Utc::now()` into the otherwise deterministic controller.

use chrono::Utc;

use crate::api::ExamBackend;
use crate::attempt::{AttemptController, SignalResponse};
use crate::catalog::{shuffle_within_sections, ExamDescriptor};
use crate::environment::Environment;
use crate::error::Result;
use crate::events::Event;
use crate::integrity::EnvSignal;
use crate::storage::Config;

pub struct ExamSession {
    controller: AttemptController,
}

impl ExamSession {
    /// Fetch the exam and its question set and build a controller in the
    /// `Instructions` phase.
    ///
    /// When the server issued a shuffle seed the reshuffle runs
    /// client-side (so a resumed attempt reproduces its order);
    /// otherwise the `randomize` flag is delegated to the server.
    pub fn load(
        backend: Box<dyn ExamBackend>,
        env: Box<dyn Environment>,
        exam_id: &str,
        config: &Config,
    ) -> Result<Self> {
        let exam = backend.fetch_exam(exam_id)?;
        let server_side = exam.randomize && exam.shuffle_seed.is_none();
        let mut questions = backend.fetch_questions(exam_id, server_side)?;
        if exam.randomize {
            if let Some(seed) = exam.shuffle_seed {
                questions = shuffle_within_sections(questions, seed);
            }
        }

        let controller = AttemptController::new(
            backend,
            env,
            exam,
            questions,
            config.attempt.clone(),
        );
        Ok(Self { controller })
    }

    /// Exams visible to the user, paired with whether each was already
    /// attempted (used to disable re-entry at list time).
    pub fn list(backend: &dyn ExamBackend) -> Result<Vec<(ExamDescriptor, bool)>> {
        let exams = backend.list_exams()?;
        let mut out = Vec::with_capacity(exams.len());
        for exam in exams {
            let attempted = backend.has_attempted(&exam.id)?;
            out.push((exam, attempted));
        }
        Ok(out)
    }

    pub fn controller(&self) -> &AttemptController {
        &self.controller
    }

    pub fn controller_mut(&mut self) -> &mut AttemptController {
        &mut self.controller
    }

    pub fn begin_now(&mut self) -> Result<Vec<Event>> {
        self.controller.begin(Utc::now())
    }

    pub fn tick_now(&mut self) -> Vec<Event> {
        self.controller.tick(Utc::now())
    }

    pub fn goto_now(&mut self, index: usize) -> Result<Vec<Event>> {
        self.controller.goto(index, Utc::now())
    }

    pub fn next_now(&mut self) -> Result<Vec<Event>> {
        self.controller.next(Utc::now())
    }

    pub fn previous_now(&mut self) -> Result<Vec<Event>> {
        self.controller.previous(Utc::now())
    }

    pub fn submit_now(&mut self) -> Vec<Event> {
        self.controller.submit(Utc::now())
    }

    pub fn signal_now(&mut self, signal: &EnvSignal) -> SignalResponse {
        self.controller.signal(signal, Utc::now())
    }

    pub fn leave_now(&mut self) -> Vec<Event> {
        self.controller.leave(Utc::now())
    }

    pub fn toggle_option(&mut self, option_index: usize) -> Result<()> {
        self.controller.toggle_option(option_index)
    }

    pub fn mark_current_for_review(&mut self) -> Result<()> {
        self.controller.mark_current_for_review()
    }

    /// Remaining seconds against the live clock, if the timer runs.
    pub fn remaining_secs_now(&self) -> Option<u64> {
        self.controller.remaining_secs(Utc::now())
    }
}

impl std::fmt::Debug for ExamSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ExamSession")
            .field("exam", &self.controller.exam().id)
            .field("phase", &self.controller.phase())
            .finish()
    }
}
