//! Proctoring signal monitor.
//!
//! The monitor turns raw host-environment signals (fullscreen state,
//! page visibility, clipboard, keyboard) into typed integrity events
//! consumed by the attempt controller. It holds no ambient state: the
//! tab-switch counter lives on the instance, and `attach`/`detach`
//! bound its lifetime to one attempt. A detached monitor observes
//! nothing, so no handler survives past the attempt.
//!
//! Detection is a logging contract, not a security boundary: the events
//! say what was observed, they do not stop a determined attacker.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Tab switches tolerated before each further one raises an extra
/// "excessive tab switching" event.
pub const DEFAULT_TAB_SWITCH_LIMIT: u32 = 3;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ClipboardAction {
    Copy,
    Paste,
    Cut,
}

impl ClipboardAction {
    fn name(self) -> &'static str {
        match self {
            ClipboardAction::Copy => "copy",
            ClipboardAction::Paste => "paste",
            ClipboardAction::Cut => "cut",
        }
    }
}

/// Raw host-environment signal, abstracted from any concrete API.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum EnvSignal {
    FullscreenChanged { fullscreen: bool },
    VisibilityChanged { hidden: bool },
    Clipboard { action: ClipboardAction },
    ContextMenu,
    KeyDown {
        key: String,
        ctrl: bool,
        shift: bool,
        alt: bool,
        meta: bool,
    },
}

/// Violation category in the logging contract.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IntegrityKind {
    FullscreenExit,
    TabSwitch,
    CopyPasteAttempt,
    Other,
}

/// Append-only log entry, forwarded to the persistence service once.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IntegrityEvent {
    pub kind: IntegrityKind,
    pub description: String,
    pub at: DateTime<Utc>,
}

/// What the controller should do with one observed signal.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SignalOutcome {
    pub events: Vec<IntegrityEvent>,
    /// Whether the host's default action (clipboard write, context menu,
    /// key handling) should be suppressed.
    pub suppress_default: bool,
}

/// Per-attempt monitor with an explicit attach/detach lifecycle.
#[derive(Debug, Clone)]
pub struct IntegrityMonitor {
    attached: bool,
    tab_switches: u32,
    tab_switch_limit: u32,
}

impl IntegrityMonitor {
    pub fn new(tab_switch_limit: u32) -> Self {
        Self {
            attached: false,
            tab_switches: 0,
            tab_switch_limit,
        }
    }

    /// Begin observing. Resets the per-attempt counters.
    pub fn attach(&mut self) {
        self.attached = true;
        self.tab_switches = 0;
    }

    /// Stop observing. After this, `observe` reports nothing.
    pub fn detach(&mut self) {
        self.attached = false;
    }

    pub fn is_attached(&self) -> bool {
        self.attached
    }

    pub fn tab_switches(&self) -> u32 {
        self.tab_switches
    }

    /// Classify one signal. Returns the events to report and whether the
    /// host default should be suppressed.
    pub fn observe(&mut self, signal: &EnvSignal, now: DateTime<Utc>) -> SignalOutcome {
        if !self.attached {
            return SignalOutcome::default();
        }

        let mut outcome = SignalOutcome::default();
        match signal {
            EnvSignal::FullscreenChanged { fullscreen } => {
                if !fullscreen {
                    outcome.events.push(IntegrityEvent {
                        kind: IntegrityKind::FullscreenExit,
                        description: "exited fullscreen during attempt".into(),
                        at: now,
                    });
                }
            }
            EnvSignal::VisibilityChanged { hidden } => {
                if *hidden {
                    self.tab_switches += 1;
                    outcome.events.push(IntegrityEvent {
                        kind: IntegrityKind::TabSwitch,
                        description: format!("page hidden (switch #{})", self.tab_switches),
                        at: now,
                    });
                    if self.tab_switches > self.tab_switch_limit {
                        outcome.events.push(IntegrityEvent {
                            kind: IntegrityKind::Other,
                            description: format!(
                                "excessive tab switching ({} switches)",
                                self.tab_switches
                            ),
                            at: now,
                        });
                    }
                }
            }
            EnvSignal::Clipboard { action } => {
                outcome.suppress_default = true;
                outcome.events.push(IntegrityEvent {
                    kind: IntegrityKind::CopyPasteAttempt,
                    description: format!("{} attempt blocked", action.name()),
                    at: now,
                });
            }
            EnvSignal::ContextMenu => {
                outcome.suppress_default = true;
                outcome.events.push(IntegrityEvent {
                    kind: IntegrityKind::Other,
                    description: "context menu blocked".into(),
                    at: now,
                });
            }
            EnvSignal::KeyDown {
                key,
                ctrl,
                shift,
                alt,
                meta,
            } => {
                if let Some(what) = blocked_shortcut(key, *ctrl, *shift, *alt, *meta) {
                    outcome.suppress_default = true;
                    outcome.events.push(IntegrityEvent {
                        kind: IntegrityKind::Other,
                        description: format!("{what} blocked"),
                        at: now,
                    });
                }
            }
        }
        outcome
    }
}

impl Default for IntegrityMonitor {
    fn default() -> Self {
        Self::new(DEFAULT_TAB_SWITCH_LIMIT)
    }
}

/// Dev-tools shortcuts and task-switch combinations worth reporting.
fn blocked_shortcut(key: &str, ctrl: bool, shift: bool, alt: bool, meta: bool) -> Option<&'static str> {
    let key_upper = key.to_ascii_uppercase();
    if key_upper == "F12" {
        return Some("dev-tools shortcut (F12)");
    }
    if ctrl && shift && matches!(key_upper.as_str(), "I" | "J" | "C") {
        return Some("dev-tools shortcut (ctrl+shift)");
    }
    if ctrl && !shift && key_upper == "U" {
        return Some("view-source shortcut (ctrl+U)");
    }
    if alt && key_upper == "TAB" {
        return Some("task-switch combination (alt+tab)");
    }
    if meta {
        return Some("meta key combination");
    }
    None
}
