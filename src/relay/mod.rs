//! Diagnostics Relay.
//!
//! Inbound half of the guest/host protocol. Each raw message goes through:
//!
//! ```text
//! source check (live handle only) -> shape check (GuestMessage) -> classify -> counters
//! ```
//!
//! Stale or foreign messages and malformed payloads are dropped with a
//! local log line; they never surface as guest diagnostics.

pub mod message;

use serde::Serialize;
use thiserror::Error;

use crate::host::HandleId;
pub use message::{ClientHello, ConsoleLevel, GuestMessage};

/// A structured console or error report from the guest.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "kebab-case")]
pub enum DiagnosticEvent {
    Console {
        level: ConsoleLevel,
        parts: Vec<String>,
        /// Milliseconds since the Unix epoch.
        at: u64,
    },
    RuntimeError {
        message: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        stack: Option<String>,
        #[serde(skip_serializing_if = "Option::is_none")]
        line: Option<u32>,
        #[serde(skip_serializing_if = "Option::is_none")]
        column: Option<u32>,
        at: u64,
    },
}

impl DiagnosticEvent {
    pub fn is_error(&self) -> bool {
        matches!(
            self,
            Self::RuntimeError { .. }
                | Self::Console {
                    level: ConsoleLevel::Error,
                    ..
                }
        )
    }

    pub fn is_warning(&self) -> bool {
        matches!(
            self,
            Self::Console {
                level: ConsoleLevel::Warn,
                ..
            }
        )
    }
}

/// Running error/warning counts of the current run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct Counters {
    pub errors: usize,
    pub warnings: usize,
}

/// What an accepted message turned out to be.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Intake {
    /// The guest's shim is up and connected.
    Ready,
    Diagnostic(DiagnosticEvent),
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum Rejection {
    #[error("message from stale or foreign context {0}")]
    NotActive(HandleId),

    #[error("malformed message: {0}")]
    Malformed(String),
}

/// Validates, classifies and counts guest messages.
#[derive(Debug, Default)]
pub struct DiagnosticsRelay {
    counters: Counters,
    /// Messages dropped since the relay was created.
    dropped: usize,
}

impl DiagnosticsRelay {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start a fresh run: counters back to zero.
    pub fn reset(&mut self) {
        self.counters = Counters::default();
    }

    pub fn counters(&self) -> Counters {
        self.counters
    }

    pub fn dropped(&self) -> usize {
        self.dropped
    }

    /// Accept one raw message declared as coming from `source`.
    ///
    /// `active` is the currently live handle; `now` stamps events the guest
    /// did not timestamp itself.
    pub fn on_event(
        &mut self,
        active: Option<&HandleId>,
        source: &HandleId,
        raw: &str,
        now: u64,
    ) -> Result<Intake, Rejection> {
        let result = self.accept(active, source, raw, now);
        match &result {
            Ok(Intake::Diagnostic(event)) => {
                if event.is_error() {
                    self.counters.errors += 1;
                } else if event.is_warning() {
                    self.counters.warnings += 1;
                }
            }
            Ok(Intake::Ready) => {}
            Err(rejection @ Rejection::NotActive(_)) => {
                self.dropped += 1;
                crate::debug!("relay"; "dropped: {}", rejection);
            }
            Err(rejection @ Rejection::Malformed(_)) => {
                self.dropped += 1;
                crate::log!("warning"; "relay dropped guest message from {}: {}", source.short(), rejection);
            }
        }
        result
    }

    fn accept(
        &self,
        active: Option<&HandleId>,
        source: &HandleId,
        raw: &str,
        now: u64,
    ) -> Result<Intake, Rejection> {
        if active != Some(source) {
            return Err(Rejection::NotActive(source.clone()));
        }

        let message: GuestMessage =
            serde_json::from_str(raw).map_err(|e| Rejection::Malformed(e.to_string()))?;

        Ok(match message {
            GuestMessage::Ready => Intake::Ready,
            GuestMessage::Console {
                level,
                parts,
                timestamp,
            } => Intake::Diagnostic(DiagnosticEvent::Console {
                level,
                parts,
                at: timestamp.unwrap_or(now),
            }),
            GuestMessage::Error {
                message,
                stack,
                line,
                column,
            } => Intake::Diagnostic(DiagnosticEvent::RuntimeError {
                message,
                stack: stack.filter(|s| !s.is_empty()),
                line,
                column,
                at: now,
            }),
        })
    }
}
