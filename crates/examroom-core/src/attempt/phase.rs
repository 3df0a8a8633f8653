use serde::{Deserialize, Serialize};

/// The single enum driving the attempt UI. Owned exclusively by the
/// controller; every transition goes through a controller method.
///
/// ```text
/// ListingExams -> Instructions -> Active <-> Submitting -> Ended
///                       \-> Blocked (attempt already submitted)
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    /// Entry point: browsing available exams, outside any attempt.
    ListingExams,
    /// Exam loaded, instructions shown, attempt not yet started.
    Instructions,
    /// Attempt running: timer, monitor and autosave are live.
    Active,
    /// Final submission in flight.
    Submitting,
    /// Attempt finished this session; score available on success.
    Ended,
    /// Server reported the attempt as already submitted; nothing was
    /// started this session.
    Blocked,
}

impl Phase {
    /// Terminal phases allow no further mutation or navigation.
    pub fn is_terminal(self) -> bool {
        matches!(self, Phase::Ended | Phase::Blocked)
    }

    pub fn name(self) -> &'static str {
        match self {
            Phase::ListingExams => "listing_exams",
            Phase::Instructions => "instructions",
            Phase::Active => "active",
            Phase::Submitting => "submitting",
            Phase::Ended => "ended",
            Phase::Blocked => "blocked",
        }
    }
}
