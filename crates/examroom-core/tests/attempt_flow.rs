//! End-to-end attempt flow tests against a scripted backend.
//!
//! The controller takes `now` explicitly, so these tests drive the whole
//! machine with synthetic clocks and assert on backend call ordering.

use std::cell::{Cell, RefCell};
use std::collections::BTreeSet;
use std::rc::Rc;

use chrono::{DateTime, Duration, Utc};

use examroom_core::{
    shuffle_within_sections, AnswerState, ApiError, AttemptController, AttemptProgress,
    AttemptRecord, AttemptStatus, AttemptTuning, ChoiceOption, ClipboardAction, Config,
    Difficulty, EnvSignal, Event, ExamBackend, ExamDescriptor, ExamSession, IntegrityEvent,
    IntegrityKind, NoopEnvironment, Phase, Question, QuestionAnswerRecord, SavePayload, Section,
    SubmitResult, Visibility,
};

#[derive(Debug, Clone, PartialEq)]
enum Call {
    FetchExam,
    FetchQuestions { randomize: bool },
    StartAttempt,
    SaveAnswer {
        question_id: String,
        selected: Vec<usize>,
        status: AttemptStatus,
        time_spent_secs: u64,
    },
    Submit,
    LogIntegrity { kind: IntegrityKind },
}

/// Scripted in-memory backend. All state is behind `Rc` so a test keeps
/// a handle after the controller takes ownership of its clone.
#[derive(Clone, Default)]
struct MockBackend {
    calls: Rc<RefCell<Vec<Call>>>,
    exam: Rc<RefCell<Option<ExamDescriptor>>>,
    questions: Rc<RefCell<Vec<Question>>>,
    start_submitted: Rc<Cell<bool>>,
    start_conflict: Rc<Cell<bool>>,
    start_answers: Rc<RefCell<Vec<QuestionAnswerRecord>>>,
    save_failures: Rc<Cell<u32>>,
    submit_failures: Rc<Cell<u32>>,
    submit_timeouts: Rc<Cell<u32>>,
}

impl MockBackend {
    fn calls(&self) -> Vec<Call> {
        self.calls.borrow().clone()
    }

    fn saves(&self) -> Vec<Call> {
        self.calls()
            .into_iter()
            .filter(|c| matches!(c, Call::SaveAnswer { .. }))
            .collect()
    }

    fn submits(&self) -> usize {
        self.calls()
            .iter()
            .filter(|c| matches!(c, Call::Submit))
            .count()
    }

    fn logged_kinds(&self) -> Vec<IntegrityKind> {
        self.calls()
            .into_iter()
            .filter_map(|c| match c {
                Call::LogIntegrity { kind } => Some(kind),
                _ => None,
            })
            .collect()
    }

    fn record(&self) -> AttemptRecord {
        AttemptRecord {
            attempt_id: "a1".into(),
            exam_id: "e1".into(),
            progress: if self.start_submitted.get() {
                AttemptProgress::Submitted
            } else {
                AttemptProgress::InProgress
            },
            answers: self.start_answers.borrow().clone(),
            questions_attempted: 7,
            questions_left: 3,
            total_questions: 10,
        }
    }
}

impl ExamBackend for MockBackend {
    fn list_exams(&self) -> Result<Vec<ExamDescriptor>, ApiError> {
        Ok(self.exam.borrow().clone().into_iter().collect())
    }

    fn fetch_exam(&self, _exam_id: &str) -> Result<ExamDescriptor, ApiError> {
        self.calls.borrow_mut().push(Call::FetchExam);
        Ok(self.exam.borrow().clone().expect("exam scripted"))
    }

    fn fetch_questions(&self, _exam_id: &str, randomize: bool) -> Result<Vec<Question>, ApiError> {
        self.calls
            .borrow_mut()
            .push(Call::FetchQuestions { randomize });
        Ok(self.questions.borrow().clone())
    }

    fn start_attempt(&self, _exam_id: &str) -> Result<AttemptRecord, ApiError> {
        self.calls.borrow_mut().push(Call::StartAttempt);
        if self.start_conflict.get() {
            return Err(ApiError::AlreadySubmitted);
        }
        Ok(self.record())
    }

    fn save_answer(
        &self,
        _exam_id: &str,
        question_id: &str,
        payload: &SavePayload,
    ) -> Result<AttemptRecord, ApiError> {
        self.calls.borrow_mut().push(Call::SaveAnswer {
            question_id: question_id.to_string(),
            selected: payload.selected.iter().copied().collect(),
            status: payload.status,
            time_spent_secs: payload.time_spent_secs,
        });
        if self.save_failures.get() > 0 {
            self.save_failures.set(self.save_failures.get() - 1);
            return Err(ApiError::Server {
                status: 500,
                message: "save rejected".into(),
            });
        }
        Ok(self.record())
    }

    fn submit(&self, _exam_id: &str) -> Result<SubmitResult, ApiError> {
        self.calls.borrow_mut().push(Call::Submit);
        if self.submit_timeouts.get() > 0 {
            self.submit_timeouts.set(self.submit_timeouts.get() - 1);
            return Err(ApiError::Timeout);
        }
        if self.submit_failures.get() > 0 {
            self.submit_failures.set(self.submit_failures.get() - 1);
            return Err(ApiError::Server {
                status: 500,
                message: "submit rejected".into(),
            });
        }
        Ok(SubmitResult { score: 42.5 })
    }

    fn log_integrity_event(
        &self,
        _exam_id: &str,
        event: &IntegrityEvent,
    ) -> Result<(), ApiError> {
        self.calls
            .borrow_mut()
            .push(Call::LogIntegrity { kind: event.kind });
        Ok(())
    }

    fn has_attempted(&self, _exam_id: &str) -> Result<bool, ApiError> {
        Ok(self.start_submitted.get())
    }
}

fn sample_exam(now: DateTime<Utc>, duration_min: u64, window_min: i64) -> ExamDescriptor {
    ExamDescriptor {
        id: "e1".into(),
        title: "Mock Entrance Test".into(),
        starts_at: now - Duration::minutes(5),
        ends_at: now + Duration::minutes(window_min),
        duration_min,
        visibility: Visibility::Public,
        randomize: false,
        shuffle_seed: None,
    }
}

fn sample_questions(n: usize) -> Vec<Question> {
    (0..n)
        .map(|i| Question {
            id: format!("q{i}"),
            section: Section::Physics,
            prompt: format!("prompt {i}"),
            options: (0..4)
                .map(|o| ChoiceOption {
                    text: format!("option {o}"),
                    image_url: None,
                })
                .collect(),
            correct: BTreeSet::from([0]),
            marks: 4.0,
            negative_marks: 1.0,
            difficulty: Difficulty::Medium,
            tags: vec![],
        })
        .collect()
}

fn controller(mock: &MockBackend, exam: ExamDescriptor, n_questions: usize) -> AttemptController {
    AttemptController::new(
        Box::new(mock.clone()),
        Box::new(NoopEnvironment),
        exam,
        sample_questions(n_questions),
        AttemptTuning {
            enforce_fullscreen: false,
            ..Default::default()
        },
    )
}

fn phase_changes(events: &[Event]) -> Vec<(Phase, Phase)> {
    events
        .iter()
        .filter_map(|e| match e {
            Event::PhaseChanged { from, to, .. } => Some((*from, *to)),
            _ => None,
        })
        .collect()
}

#[test]
fn deadline_is_capped_by_exam_end() {
    let t0 = Utc::now();
    let mock = MockBackend::default();
    // 10 minute duration but the window closes in 3 minutes
    let mut ctrl = controller(&mock, sample_exam(t0, 10, 3), 2);

    let events = ctrl.begin(t0).unwrap();
    assert_eq!(ctrl.phase(), Phase::Active);
    assert_eq!(ctrl.deadline(), Some(t0 + Duration::minutes(3)));

    let started = events.iter().any(|e| {
        matches!(e, Event::AttemptStarted { deadline, .. } if *deadline == t0 + Duration::minutes(3))
    });
    assert!(started);
}

#[test]
fn deadline_uses_duration_inside_a_wide_window() {
    let t0 = Utc::now();
    let mock = MockBackend::default();
    let mut ctrl = controller(&mock, sample_exam(t0, 10, 60), 2);

    ctrl.begin(t0).unwrap();
    assert_eq!(ctrl.deadline(), Some(t0 + Duration::minutes(10)));
}

#[test]
fn navigation_saves_departing_question_before_moving() {
    let t0 = Utc::now();
    let mock = MockBackend::default();
    let mut ctrl = controller(&mock, sample_exam(t0, 10, 60), 2);
    ctrl.begin(t0).unwrap();

    ctrl.toggle_option(0).unwrap();
    ctrl.toggle_option(2).unwrap();
    let events = ctrl.goto(1, t0 + Duration::seconds(5)).unwrap();

    // exactly one save, for q0, with its full state including accrued time
    let saves = mock.saves();
    assert_eq!(
        saves,
        vec![Call::SaveAnswer {
            question_id: "q0".into(),
            selected: vec![0, 2],
            status: AttemptStatus::Attempted,
            time_spent_secs: 5,
        }]
    );

    // and the save is sequenced before the question change
    let save_idx = events
        .iter()
        .position(|e| matches!(e, Event::AnswerSaved { .. }))
        .expect("save event");
    let move_idx = events
        .iter()
        .position(|e| matches!(e, Event::QuestionChanged { index: 1, .. }))
        .expect("move event");
    assert!(save_idx < move_idx);
    assert_eq!(ctrl.current_index(), 1);
}

#[test]
fn server_aggregates_replace_local_estimate() {
    let t0 = Utc::now();
    let mock = MockBackend::default();
    let mut ctrl = controller(&mock, sample_exam(t0, 10, 60), 2);
    ctrl.begin(t0).unwrap();

    ctrl.toggle_option(0).unwrap();
    ctrl.goto(1, t0 + Duration::seconds(1)).unwrap();

    let agg = ctrl.aggregates();
    assert_eq!((agg.attempted, agg.left, agg.total), (7, 3, 10));
}

#[test]
fn expiry_forces_exactly_one_submit_without_confirmation() {
    let t0 = Utc::now();
    let mock = MockBackend::default();
    let mut ctrl = controller(&mock, sample_exam(t0, 10, 3), 2);
    ctrl.begin(t0).unwrap();

    let events = ctrl.tick(t0 + Duration::seconds(181));
    assert!(events.iter().any(|e| matches!(e, Event::TimerExpired { .. })));
    assert_eq!(
        phase_changes(&events),
        vec![
            (Phase::Active, Phase::Submitting),
            (Phase::Submitting, Phase::Ended),
        ]
    );
    assert_eq!(ctrl.phase(), Phase::Ended);
    assert_eq!(ctrl.score(), Some(42.5));
    assert_eq!(mock.submits(), 1);

    // later ticks are inert
    assert!(ctrl.tick(t0 + Duration::seconds(240)).is_empty());
    assert_eq!(mock.submits(), 1);
}

#[test]
fn rejected_submit_reverts_to_active_and_retry_succeeds() {
    let t0 = Utc::now();
    let mock = MockBackend::default();
    mock.submit_failures.set(1);
    let mut ctrl = controller(&mock, sample_exam(t0, 10, 60), 2);
    ctrl.begin(t0).unwrap();
    ctrl.toggle_option(1).unwrap();

    let events = ctrl.submit(t0 + Duration::seconds(30));
    assert_eq!(ctrl.phase(), Phase::Active);
    assert!(events.iter().any(
        |e| matches!(e, Event::SubmitFailed { terminal: false, .. })
    ));
    // prior answers intact
    assert!(ctrl.answers().snapshot("q0").selected.contains(&1));

    let events = ctrl.submit(t0 + Duration::seconds(40));
    assert_eq!(ctrl.phase(), Phase::Ended);
    assert!(events.iter().any(|e| matches!(e, Event::SubmitSucceeded { .. })));
    assert_eq!(mock.submits(), 2);
}

#[test]
fn submit_timeout_reverts_to_active() {
    let t0 = Utc::now();
    let mock = MockBackend::default();
    mock.submit_timeouts.set(1);
    let mut ctrl = controller(&mock, sample_exam(t0, 10, 60), 2);
    ctrl.begin(t0).unwrap();

    ctrl.submit(t0 + Duration::seconds(10));
    assert_eq!(ctrl.phase(), Phase::Active);
    assert!(ctrl.is_timer_running());
}

#[test]
fn ended_attempt_accepts_no_further_mutation() {
    let t0 = Utc::now();
    let mock = MockBackend::default();
    let mut ctrl = controller(&mock, sample_exam(t0, 10, 60), 2);
    ctrl.begin(t0).unwrap();
    ctrl.submit(t0 + Duration::seconds(5));
    assert_eq!(ctrl.phase(), Phase::Ended);

    let saves_before = mock.saves().len();
    assert!(ctrl.toggle_option(0).is_err());
    assert!(ctrl.mark_current_for_review().is_err());
    assert!(ctrl.goto(1, t0 + Duration::seconds(6)).is_err());
    assert!(ctrl.tick(t0 + Duration::seconds(120)).is_empty());
    let response = ctrl.signal(
        &EnvSignal::VisibilityChanged { hidden: true },
        t0 + Duration::seconds(7),
    );
    assert!(response.events.is_empty());
    assert!(!response.suppress_default);

    assert_eq!(mock.saves().len(), saves_before);
    assert!(!ctrl.is_timer_running());
    assert!(!ctrl.monitor().is_attached());
}

#[test]
fn already_submitted_conflict_blocks_without_starting_anything() {
    let t0 = Utc::now();
    let mock = MockBackend::default();
    mock.start_conflict.set(true);
    let mut ctrl = controller(&mock, sample_exam(t0, 10, 60), 2);

    let events = ctrl.begin(t0).unwrap();
    assert_eq!(ctrl.phase(), Phase::Blocked);
    assert_eq!(
        phase_changes(&events),
        vec![(Phase::Instructions, Phase::Blocked)]
    );
    assert!(!ctrl.is_timer_running());
    assert!(!ctrl.monitor().is_attached());
    assert!(ctrl.tick(t0 + Duration::seconds(31)).is_empty());
}

#[test]
fn submitted_record_also_blocks() {
    let t0 = Utc::now();
    let mock = MockBackend::default();
    mock.start_submitted.set(true);
    let mut ctrl = controller(&mock, sample_exam(t0, 10, 60), 2);

    ctrl.begin(t0).unwrap();
    assert_eq!(ctrl.phase(), Phase::Blocked);
    assert!(!ctrl.is_timer_running());
}

#[test]
fn resume_seeds_previously_saved_answers() {
    let t0 = Utc::now();
    let mock = MockBackend::default();
    mock.start_answers.borrow_mut().push(QuestionAnswerRecord {
        question_id: "q1".into(),
        selected: BTreeSet::from([1, 3]),
        status: AttemptStatus::MarkedForReview,
        time_spent_secs: 77,
    });
    let mut ctrl = controller(&mock, sample_exam(t0, 10, 60), 2);

    let events = ctrl.begin(t0).unwrap();
    assert!(events
        .iter()
        .any(|e| matches!(e, Event::AttemptStarted { resumed: true, .. })));
    assert_eq!(
        ctrl.answers().snapshot("q1"),
        AnswerState {
            selected: BTreeSet::from([1, 3]),
            status: AttemptStatus::MarkedForReview,
            time_spent_secs: 77,
        }
    );
}

#[test]
fn four_tab_switches_log_one_excessive_event() {
    let t0 = Utc::now();
    let mock = MockBackend::default();
    let mut ctrl = controller(&mock, sample_exam(t0, 10, 60), 2);
    ctrl.begin(t0).unwrap();

    for i in 0..4 {
        let at = t0 + Duration::seconds(10 * (i + 1));
        ctrl.signal(&EnvSignal::VisibilityChanged { hidden: true }, at);
        ctrl.signal(
            &EnvSignal::VisibilityChanged { hidden: false },
            at + Duration::seconds(2),
        );
    }

    let kinds = mock.logged_kinds();
    let tab_switches = kinds
        .iter()
        .filter(|k| **k == IntegrityKind::TabSwitch)
        .count();
    let excessive = kinds.iter().filter(|k| **k == IntegrityKind::Other).count();
    assert_eq!(tab_switches, 4);
    assert_eq!(excessive, 1);
}

#[test]
fn clipboard_and_context_menu_ask_the_host_to_suppress_defaults() {
    let t0 = Utc::now();
    let mock = MockBackend::default();
    let mut ctrl = controller(&mock, sample_exam(t0, 10, 60), 2);
    ctrl.begin(t0).unwrap();

    let response = ctrl.signal(
        &EnvSignal::Clipboard {
            action: ClipboardAction::Paste,
        },
        t0 + Duration::seconds(1),
    );
    assert!(response.suppress_default);
    assert!(response
        .events
        .iter()
        .any(|e| matches!(e, Event::IntegrityViolation { .. })));

    let response = ctrl.signal(&EnvSignal::ContextMenu, t0 + Duration::seconds(2));
    assert!(response.suppress_default);

    // a plain visibility change is logged but nothing is suppressed
    let response = ctrl.signal(
        &EnvSignal::VisibilityChanged { hidden: true },
        t0 + Duration::seconds(3),
    );
    assert!(!response.suppress_default);
    assert!(mock.logged_kinds().contains(&IntegrityKind::CopyPasteAttempt));
}

#[test]
fn hidden_time_does_not_accrue() {
    let t0 = Utc::now();
    let mock = MockBackend::default();
    let mut ctrl = controller(&mock, sample_exam(t0, 10, 60), 2);
    ctrl.begin(t0).unwrap();

    // 5 visible seconds, then 20 hidden seconds, then 5 visible again
    ctrl.tick(t0 + Duration::seconds(5));
    ctrl.signal(
        &EnvSignal::VisibilityChanged { hidden: true },
        t0 + Duration::seconds(5),
    );
    ctrl.tick(t0 + Duration::seconds(25));
    ctrl.signal(
        &EnvSignal::VisibilityChanged { hidden: false },
        t0 + Duration::seconds(25),
    );
    ctrl.tick(t0 + Duration::seconds(30));

    assert_eq!(ctrl.answers().snapshot("q0").time_spent_secs, 10);
}

#[test]
fn autosave_fires_on_the_interval() {
    let t0 = Utc::now();
    let mock = MockBackend::default();
    let mut ctrl = controller(&mock, sample_exam(t0, 10, 60), 2);
    ctrl.begin(t0).unwrap();
    ctrl.toggle_option(0).unwrap();

    assert!(mock.saves().is_empty());
    ctrl.tick(t0 + Duration::seconds(29));
    assert!(mock.saves().is_empty());

    ctrl.tick(t0 + Duration::seconds(31));
    assert_eq!(mock.saves().len(), 1);
}

#[test]
fn failed_save_is_retried_by_the_next_autosave() {
    let t0 = Utc::now();
    let mock = MockBackend::default();
    mock.save_failures.set(1);
    let mut ctrl = controller(&mock, sample_exam(t0, 10, 60), 2);
    ctrl.begin(t0).unwrap();

    ctrl.toggle_option(0).unwrap();
    let events = ctrl.goto(1, t0 + Duration::seconds(2)).unwrap();
    assert!(events.iter().any(|e| matches!(e, Event::SaveFailed { .. })));
    assert!(ctrl.answers().is_dirty("q0"));

    // the 30s interval is the natural retry: current question plus the
    // still-dirty departed one
    ctrl.tick(t0 + Duration::seconds(32));
    let saved: Vec<String> = mock
        .saves()
        .into_iter()
        .filter_map(|c| match c {
            Call::SaveAnswer { question_id, .. } => Some(question_id),
            _ => None,
        })
        .collect();
    assert!(saved.contains(&"q0".to_string()));
    assert!(saved.contains(&"q1".to_string()));
    assert!(!ctrl.answers().is_dirty("q0"));
}

#[test]
fn fullscreen_exit_warns_without_changing_phase() {
    let t0 = Utc::now();
    let mock = MockBackend::default();
    let mut ctrl = controller(&mock, sample_exam(t0, 10, 60), 2);
    ctrl.begin(t0).unwrap();

    let response = ctrl.signal(
        &EnvSignal::FullscreenChanged { fullscreen: false },
        t0 + Duration::seconds(3),
    );
    assert_eq!(ctrl.phase(), Phase::Active);
    assert!(response
        .events
        .iter()
        .any(|e| matches!(e, Event::FullscreenWarning { .. })));
    assert!(!response.suppress_default);
    assert_eq!(mock.logged_kinds(), vec![IntegrityKind::FullscreenExit]);
}

#[test]
fn unsupported_fullscreen_degrades_with_a_logged_note() {
    let t0 = Utc::now();
    let mock = MockBackend::default();
    let mut ctrl = AttemptController::new(
        Box::new(mock.clone()),
        Box::new(NoopEnvironment),
        sample_exam(t0, 10, 60),
        sample_questions(2),
        AttemptTuning::default(), // enforcement on
    );

    ctrl.begin(t0).unwrap();
    assert_eq!(ctrl.phase(), Phase::Active);
    assert_eq!(mock.logged_kinds(), vec![IntegrityKind::Other]);
}

#[test]
fn leaving_active_tears_everything_down() {
    let t0 = Utc::now();
    let mock = MockBackend::default();
    let mut ctrl = controller(&mock, sample_exam(t0, 10, 60), 2);
    ctrl.begin(t0).unwrap();

    let events = ctrl.leave(t0 + Duration::seconds(10));
    assert_eq!(
        phase_changes(&events),
        vec![(Phase::Active, Phase::ListingExams)]
    );
    assert!(!ctrl.is_timer_running());
    assert!(!ctrl.monitor().is_attached());
    assert!(ctrl.tick(t0 + Duration::seconds(60)).is_empty());
}

#[test]
fn session_load_applies_the_server_seed_client_side() {
    let t0 = Utc::now();
    let mock = MockBackend::default();
    let mut exam = sample_exam(t0, 10, 60);
    exam.randomize = true;
    exam.shuffle_seed = Some(99);
    *mock.exam.borrow_mut() = Some(exam);
    let questions = sample_questions(6);
    *mock.questions.borrow_mut() = questions.clone();

    let session = ExamSession::load(
        Box::new(mock.clone()),
        Box::new(NoopEnvironment),
        "e1",
        &Config::default(),
    )
    .unwrap();

    // seed present, so the server was asked for the canonical order
    assert!(mock
        .calls()
        .contains(&Call::FetchQuestions { randomize: false }));

    let expected: Vec<String> = shuffle_within_sections(questions, 99)
        .into_iter()
        .map(|q| q.id)
        .collect();
    let actual: Vec<String> = session
        .controller()
        .questions()
        .iter()
        .map(|q| q.id.clone())
        .collect();
    assert_eq!(actual, expected);
}
