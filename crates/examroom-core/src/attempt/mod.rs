mod controller;
mod phase;

pub use controller::{AttemptController, AttemptTuning, SignalResponse};
pub use phase::Phase;
