//! Turn reconciliation
//!
//! Decides when a speaker's utterance is complete and guarantees each
//! completed utterance is emitted once. Two completion paths feed the same
//! dedup guard:
//!
//! - in-band: a transcript event carrying the finality flag
//! - out-of-band: an end-of-speech lifecycle event flushing the buffer
//!
//! Dedup compares trimmed text exactly. A user who deliberately repeats the
//! same sentence back to back is indistinguishable from an upstream re-send
//! and is dropped.

use std::collections::HashMap;

use tracing::debug;
use voice_session_core::{Role, TranscriptEvent};

use crate::buffer::TranscriptBuffer;

/// Why a final event produced no turn
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SuppressReason {
    /// Final text was empty after trimming
    Empty,
    /// Same text as the last turn emitted for this role
    Duplicate,
}

/// Outcome of feeding one transcript event to the reconciler
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Reconciliation {
    /// In-progress update; `changed` is false for a repeated partial
    Partial { role: Role, changed: bool },
    /// A turn completed with this trimmed text
    Completed { role: Role, text: String },
    /// Final signal that must not produce a turn
    Suppressed { role: Role, reason: SuppressReason },
}

/// Converts transcript events into completed turns
#[derive(Debug, Default)]
pub struct TurnReconciler {
    buffer: TranscriptBuffer,
    /// Dedup guard: last emitted text per role
    last_emitted: HashMap<Role, String>,
}

impl TurnReconciler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Reconcile one transcript event.
    ///
    /// The buffer is updated unconditionally before the finality check.
    pub fn reconcile(&mut self, event: &TranscriptEvent) -> Reconciliation {
        let changed = self.buffer.update(event.role, &event.text);

        if !event.is_final {
            return Reconciliation::Partial {
                role: event.role,
                changed,
            };
        }

        self.complete(event.role, event.text.trim())
    }

    /// Secondary completion path for end-of-speech signals.
    ///
    /// Returns `None` when nothing is pending for `role`.
    pub fn flush_role(&mut self, role: Role) -> Option<Reconciliation> {
        let text = self.buffer.pending(role)?.to_string();
        Some(self.complete(role, &text))
    }

    /// Drop the in-progress text for a role without emitting it
    pub fn clear_buffer(&mut self, role: Role) -> Option<String> {
        self.buffer.clear(role)
    }

    /// Clear buffers and the dedup guard
    pub fn reset(&mut self) {
        let discarded = self.buffer.pending_roles();
        if !discarded.is_empty() {
            debug!(roles = ?discarded, "Discarding unfinished partial transcripts");
        }
        self.buffer.clear_all();
        self.last_emitted.clear();
    }

    /// Text of the last turn emitted for `role`
    pub fn last_emitted(&self, role: Role) -> Option<&str> {
        self.last_emitted.get(&role).map(String::as_str)
    }

    fn complete(&mut self, role: Role, text: &str) -> Reconciliation {
        let outcome = if text.is_empty() {
            Reconciliation::Suppressed {
                role,
                reason: SuppressReason::Empty,
            }
        } else if self.last_emitted(role) == Some(text) {
            Reconciliation::Suppressed {
                role,
                reason: SuppressReason::Duplicate,
            }
        } else {
            self.last_emitted.insert(role, text.to_string());
            Reconciliation::Completed {
                role,
                text: text.to_string(),
            }
        };

        self.buffer.clear(role);
        outcome
    }
}
