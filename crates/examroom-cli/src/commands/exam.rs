use std::io::{self, BufRead, Write};

use clap::Subcommand;
use examroom_core::{
    Config, Event, ExamSession, HttpBackend, NoopEnvironment, Phase, Question,
};

#[derive(Subcommand)]
pub enum ExamAction {
    /// List available exams
    List,
    /// Show one exam's details
    Show {
        /// Exam id
        id: String,
    },
    /// Take an exam interactively
    Take {
        /// Exam id
        id: String,
    },
}

pub fn run(action: ExamAction) -> Result<(), Box<dyn std::error::Error>> {
    let config = Config::load();
    let backend = HttpBackend::from_config(&config)?;

    match action {
        ExamAction::List => {
            for (exam, attempted) in ExamSession::list(&backend)? {
                let marker = if attempted { " (completed)" } else { "" };
                println!(
                    "{}  {}  {} min  {} - {}{}",
                    exam.id,
                    exam.title,
                    exam.duration_min,
                    exam.starts_at.format("%Y-%m-%d %H:%M"),
                    exam.ends_at.format("%H:%M"),
                    marker
                );
            }
        }
        ExamAction::Show { id } => {
            let exam = {
                use examroom_core::ExamBackend;
                backend.fetch_exam(&id)?
            };
            println!("{}", serde_json::to_string_pretty(&exam)?);
        }
        ExamAction::Take { id } => {
            take(Box::new(backend), &id, &config)?;
        }
    }
    Ok(())
}

/// Interactive attempt loop. Each iteration ticks the engine against the
/// live clock and then handles one command line; the countdown
/// self-corrects from the absolute deadline, so a slow reader loses no
/// time to tick skew.
fn take(
    backend: Box<HttpBackend>,
    exam_id: &str,
    config: &Config,
) -> Result<(), Box<dyn std::error::Error>> {
    let mut session = ExamSession::load(backend, Box::new(NoopEnvironment), exam_id, config)?;

    {
        let exam = session.controller().exam();
        println!("{} -- {} min, {} questions", exam.title, exam.duration_min, session.controller().questions().len());
    }
    println!("type 'start' to begin the attempt, or 'quit' to leave:");

    let stdin = io::stdin();
    let mut lines = stdin.lock().lines();
    loop {
        match lines.next() {
            Some(line) => match line?.trim() {
                "start" => break,
                "quit" => return Ok(()),
                _ => println!("type 'start' or 'quit':"),
            },
            None => return Ok(()),
        }
    }

    for event in session.begin_now()? {
        render_event(&event);
    }
    match session.controller().phase() {
        Phase::Blocked => {
            println!("this exam was already submitted; returning to the list.");
            return Ok(());
        }
        Phase::Active => {}
        other => {
            println!("cannot start attempt (phase: {other:?})");
            return Ok(());
        }
    }

    println!("the deadline is absolute: time keeps running while you type,");
    println!("is checked after each command, and expiry submits automatically.");

    render_current(&session);
    while session.controller().phase() == Phase::Active {
        prompt(&session)?;
        let Some(line) = lines.next() else { break };
        let line = line?;

        // catch up on elapsed time first - this is where expiry lands
        for event in session.tick_now() {
            render_event(&event);
        }
        if session.controller().phase() != Phase::Active {
            break;
        }

        if let Err(e) = dispatch(&mut session, line.trim()) {
            println!("{e}");
        }
    }

    match session.controller().phase() {
        Phase::Ended => match session.controller().score() {
            Some(score) => println!("submitted. score: {score}"),
            None => println!("submitted."),
        },
        Phase::Active => {
            // EOF or quit without submitting: tear down cleanly
            session.leave_now();
            println!("attempt left open; your saved answers are kept.");
        }
        _ => {}
    }
    Ok(())
}

fn dispatch(
    session: &mut ExamSession,
    line: &str,
) -> Result<(), Box<dyn std::error::Error>> {
    let mut parts = line.split_whitespace();
    let command = parts.next().unwrap_or("");
    match command {
        "" => {}
        "a" => {
            let index: usize = parts
                .next()
                .ok_or("usage: a <option>")?
                .parse()
                .map_err(|_| "usage: a <option>")?;
            session.toggle_option(index)?;
            render_current(session);
        }
        "m" => {
            session.mark_current_for_review()?;
            println!("marked for review");
        }
        "n" => {
            for event in session.next_now()? {
                render_event(&event);
            }
            render_current(session);
        }
        "p" => {
            for event in session.previous_now()? {
                render_event(&event);
            }
            render_current(session);
        }
        "g" => {
            let number: usize = parts
                .next()
                .ok_or("usage: g <question number>")?
                .parse()
                .map_err(|_| "usage: g <question number>")?;
            if number == 0 {
                return Err("question numbers start at 1".into());
            }
            for event in session.goto_now(number - 1)? {
                render_event(&event);
            }
            render_current(session);
        }
        "s" => {
            let agg = session.controller().aggregates();
            println!(
                "attempted {} / {} ({} left)",
                agg.attempted, agg.total, agg.left
            );
        }
        "submit" => {
            for event in session.submit_now() {
                render_event(&event);
            }
        }
        "quit" => {
            for event in session.leave_now() {
                render_event(&event);
            }
        }
        "help" => {
            println!("a <n> toggle option | m mark for review | n/p next/prev");
            println!("g <n> go to question | s status | submit | quit | help");
        }
        other => println!("unknown command '{other}' (try 'help')"),
    }
    Ok(())
}

fn prompt(session: &ExamSession) -> io::Result<()> {
    let remaining = session.remaining_secs_now().unwrap_or(0);
    print!(
        "[{:02}:{:02} left, q{}] > ",
        remaining / 60,
        remaining % 60,
        session.controller().current_index() + 1
    );
    io::stdout().flush()
}

fn render_current(session: &ExamSession) {
    let Some(question) = session.controller().current_question() else {
        return;
    };
    let state = session.controller().answers().snapshot(&question.id);
    println!();
    println!(
        "Q{} [{:?}] {}",
        session.controller().current_index() + 1,
        question.section,
        question.prompt
    );
    render_options(question, &state.selected);
    println!("status: {:?}", state.status);
}

fn render_options(question: &Question, selected: &std::collections::BTreeSet<usize>) {
    for (i, option) in question.options.iter().enumerate() {
        let marker = if selected.contains(&i) { "[x]" } else { "[ ]" };
        println!("  {marker} {i}. {}", option.text);
    }
}

fn render_event(event: &Event) {
    match event {
        Event::TimerExpired { .. } => println!("time is up - submitting."),
        Event::SaveFailed { question_id, .. } => {
            println!("(save of {question_id} failed; it will retry)")
        }
        Event::SubmitFailed {
            message, terminal, ..
        } => {
            if *terminal {
                println!("submission rejected permanently: {message}");
            } else {
                println!("submission failed ({message}); you may retry with 'submit'");
            }
        }
        Event::FullscreenWarning { .. } => {
            println!("warning: fullscreen was left during the attempt")
        }
        Event::IntegrityViolation { event } => {
            log::debug!("integrity: {:?} {}", event.kind, event.description)
        }
        _ => {}
    }
}
