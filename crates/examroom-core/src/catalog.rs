//! Exam and question catalog types.
//!
//! Everything here is immutable for the duration of an attempt: the
//! descriptor and question set are fetched once from the catalog service
//! and never mutated client-side. The only transformation the client
//! performs is the seeded within-section reshuffle.

use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use rand::prelude::*;
use rand_pcg::Mcg128Xsl64;
use serde::{Deserialize, Serialize};

/// Who can see and take an exam.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Visibility {
    Public,
    Restricted,
}

/// Immutable description of a scheduled exam.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExamDescriptor {
    pub id: String,
    pub title: String,
    /// Scheduled window start.
    pub starts_at: DateTime<Utc>,
    /// Scheduled window end. The attempt deadline never exceeds this.
    pub ends_at: DateTime<Utc>,
    /// Attempt duration in minutes.
    pub duration_min: u64,
    pub visibility: Visibility,
    /// Whether question order is reshuffled per attempt.
    #[serde(default)]
    pub randomize: bool,
    /// Server-issued shuffle seed. When present the client applies the
    /// reshuffle itself so a resumed attempt sees the same order.
    #[serde(default)]
    pub shuffle_seed: Option<u64>,
}

/// Fixed topical grouping that bounds randomization scope.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Section {
    Physics,
    Chemistry,
    Mathematics,
    General,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Difficulty {
    Easy,
    Medium,
    Hard,
}

/// One selectable answer option.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChoiceOption {
    pub text: String,
    #[serde(default)]
    pub image_url: Option<String>,
}

/// A single question, identity stable by id across reshuffles.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Question {
    pub id: String,
    pub section: Section,
    pub prompt: String,
    pub options: Vec<ChoiceOption>,
    /// Correct option indices. Present in the payload; grading itself is
    /// server-side.
    #[serde(default)]
    pub correct: BTreeSet<usize>,
    pub marks: f64,
    #[serde(default)]
    pub negative_marks: f64,
    pub difficulty: Difficulty,
    #[serde(default)]
    pub tags: Vec<String>,
}

/// Reshuffle question order within each maximal run of same-section
/// questions. Section grouping order is preserved; question identity is
/// untouched. Deterministic for a given seed, so a resumed attempt can
/// reproduce the order it started with.
pub fn shuffle_within_sections(questions: Vec<Question>, seed: u64) -> Vec<Question> {
    let mut rng = Mcg128Xsl64::seed_from_u64(seed);
    let mut out = Vec::with_capacity(questions.len());

    let mut run: Vec<Question> = Vec::new();
    let mut run_section: Option<Section> = None;
    for q in questions {
        if run_section.is_some() && run_section != Some(q.section) {
            run.shuffle(&mut rng);
            out.append(&mut run);
        }
        run_section = Some(q.section);
        run.push(q);
    }
    run.shuffle(&mut rng);
    out.append(&mut run);
    out
}
