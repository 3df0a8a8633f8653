//! In-memory per-question answer state.
//!
//! The store is the single mutable model behind the attempt screen:
//! selection sets, attempt status, and cumulative time per question.
//! It tracks which questions changed since their last successful save so
//! the autosave pass can re-send exactly the stale state. The server is
//! the merge point: each save sends the full state of one question, and
//! the aggregate counters returned by the server replace any local count.

use std::collections::{BTreeSet, HashMap, HashSet};

use serde::{Deserialize, Serialize};

/// Per-question attempt status.
///
/// `Attempted` tracks the selection set (non-empty iff attempted) unless
/// the student explicitly marks the question for review.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AttemptStatus {
    NotAttempted,
    Attempted,
    MarkedForReview,
}

/// Mutable answer state for one question.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnswerState {
    /// Selected option indices, unordered, multi-select allowed.
    pub selected: BTreeSet<usize>,
    pub status: AttemptStatus,
    /// Cumulative time spent on this question, in seconds.
    pub time_spent_secs: u64,
}

impl Default for AnswerState {
    fn default() -> Self {
        Self {
            selected: BTreeSet::new(),
            status: AttemptStatus::NotAttempted,
            time_spent_secs: 0,
        }
    }
}

/// Server-owned aggregate counters, overwritten on every save response.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Aggregates {
    pub attempted: u32,
    pub left: u32,
    pub total: u32,
}

/// Map of question id to answer state with dirty tracking.
///
/// Entries are created lazily on first interaction and never deleted
/// during an attempt.
#[derive(Debug, Default)]
pub struct AnswerStore {
    entries: HashMap<String, AnswerState>,
    dirty: HashSet<String>,
}

impl AnswerStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Toggle membership of `option_index` in the question's selection
    /// set, then recompute status per the invariant: `Attempted` iff the
    /// selection is non-empty, unless the question is explicitly marked
    /// for review.
    pub fn select(&mut self, question_id: &str, option_index: usize) -> &AnswerState {
        let entry = self.entries.entry(question_id.to_string()).or_default();
        if !entry.selected.remove(&option_index) {
            entry.selected.insert(option_index);
        }
        if entry.status != AttemptStatus::MarkedForReview {
            entry.status = if entry.selected.is_empty() {
                AttemptStatus::NotAttempted
            } else {
                AttemptStatus::Attempted
            };
        }
        self.dirty.insert(question_id.to_string());
        entry
    }

    /// Set status to `MarkedForReview` unconditionally. Selection is
    /// preserved.
    pub fn mark_for_review(&mut self, question_id: &str) -> &AnswerState {
        let entry = self.entries.entry(question_id.to_string()).or_default();
        entry.status = AttemptStatus::MarkedForReview;
        self.dirty.insert(question_id.to_string());
        entry
    }

    /// Monotonically increase the per-question time counter.
    pub fn accumulate_time(&mut self, question_id: &str, delta_secs: u64) {
        let entry = self.entries.entry(question_id.to_string()).or_default();
        entry.time_spent_secs = entry.time_spent_secs.saturating_add(delta_secs);
    }

    /// Read-only snapshot used by the save path. Returns the default
    /// (untouched) state for questions never interacted with.
    pub fn snapshot(&self, question_id: &str) -> AnswerState {
        self.entries.get(question_id).cloned().unwrap_or_default()
    }

    /// Replace local state for one question with server-confirmed state.
    /// Supersedes, never merges.
    pub fn seed(&mut self, question_id: &str, state: AnswerState) {
        self.entries.insert(question_id.to_string(), state);
        self.dirty.remove(question_id);
    }

    /// Mark a question as saved (its state reached the server).
    pub fn mark_saved(&mut self, question_id: &str) {
        self.dirty.remove(question_id);
    }

    /// Question ids changed since their last successful save.
    pub fn dirty(&self) -> Vec<String> {
        let mut ids: Vec<String> = self.dirty.iter().cloned().collect();
        ids.sort();
        ids
    }

    pub fn is_dirty(&self, question_id: &str) -> bool {
        self.dirty.contains(question_id)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
