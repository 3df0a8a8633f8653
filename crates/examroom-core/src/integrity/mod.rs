mod monitor;

pub use monitor::{
    ClipboardAction, EnvSignal, IntegrityEvent, IntegrityKind, IntegrityMonitor, SignalOutcome,
};
