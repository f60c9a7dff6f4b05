//! Outbound host events.
//!
//! Sent to every WebSocket client that announced itself as `host`.
//!
//! - `run_started`: a new document is live; the shell points its iframe at `url`
//! - `run_loaded`: the guest shim connected
//! - `run_failed`: the run could not be published
//! - `diagnostic`: one guest console/error event plus current counters

use serde::Serialize;

use crate::host::HandleId;
use crate::relay::DiagnosticEvent;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum HostEvent {
    RunStarted {
        run: u64,
        handle: HandleId,
        url: String,
    },

    RunLoaded {
        run: u64,
        handle: HandleId,
    },

    RunFailed {
        run: u64,
        error: String,
    },

    Diagnostic {
        handle: HandleId,
        event: DiagnosticEvent,
        errors: usize,
        warnings: usize,
    },
}

impl HostEvent {
    /// Serialize to JSON string
    pub fn to_json(&self) -> String {
        serde_json::to_string(self).unwrap_or_else(|_| r#"{"type":"error"}"#.to_string())
    }

    /// Handle that became live, for `run_started`.
    pub fn started_handle(&self) -> Option<&HandleId> {
        match self {
            Self::RunStarted { handle, .. } => Some(handle),
            _ => None,
        }
    }
}
