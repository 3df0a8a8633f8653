mod countdown;

pub use countdown::{Countdown, TickOutcome, TimerHandle};
