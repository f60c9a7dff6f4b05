//! Execution handles and their lifecycle.
//!
//! ```text
//! Pending --load--> Active --dispose--> Disposed
//!    |                                     ^
//!    +-------------- failed load ----------+
//! ```

use std::borrow::Borrow;
use std::fmt;
use std::time::{SystemTime, UNIX_EPOCH};

use serde::Serialize;

use super::HostError;

/// Opaque id of one execution handle (32 lowercase hex chars).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(transparent)]
pub struct HandleId(String);

impl HandleId {
    /// Derive a fresh, unguessable id for run number `seq`.
    pub fn generate(seq: u64) -> Self {
        let nanos = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_nanos())
            .unwrap_or_default();

        let mut hasher = blake3::Hasher::new();
        hasher.update(&seq.to_le_bytes());
        hasher.update(&nanos.to_le_bytes());
        hasher.update(&std::process::id().to_le_bytes());
        let hash = hasher.finalize();
        Self(hex::encode(&hash.as_bytes()[..16]))
    }

    /// Accept an id received from outside (URL path, guest hello).
    pub fn parse(raw: &str) -> Option<Self> {
        let valid = raw.len() == 32 && raw.bytes().all(|b| matches!(b, b'0'..=b'9' | b'a'..=b'f'));
        valid.then(|| Self(raw.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// First eight characters, for log lines.
    pub fn short(&self) -> &str {
        &self.0[..8.min(self.0.len())]
    }
}

impl Borrow<str> for HandleId {
    fn borrow(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for HandleId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum HandleState {
    /// Assembled, not yet published.
    Pending,
    /// Published; the guest may be executing.
    Active,
    /// Resource released. Terminal.
    Disposed,
}

impl HandleState {
    fn can_become(self, next: Self) -> bool {
        matches!(
            (self, next),
            (Self::Pending, Self::Active) | (Self::Pending | Self::Active, Self::Disposed)
        )
    }
}

/// One load of the isolated context.
#[derive(Debug, PartialEq, Eq)]
pub struct ExecutionHandle {
    id: HandleId,
    /// Run number, starting at 1.
    run: u64,
    state: HandleState,
    /// Guest-origin URL serving this handle's document.
    url: String,
}

impl ExecutionHandle {
    pub(super) fn new(id: HandleId, run: u64, url: String) -> Self {
        Self {
            id,
            run,
            state: HandleState::Pending,
            url,
        }
    }

    pub fn id(&self) -> &HandleId {
        &self.id
    }

    pub fn run(&self) -> u64 {
        self.run
    }

    pub fn state(&self) -> HandleState {
        self.state
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    pub(super) fn transition(&mut self, next: HandleState) -> Result<(), HostError> {
        if !self.state.can_become(next) {
            return Err(HostError::InvalidTransition {
                handle: self.id.clone(),
                from: self.state,
                to: next,
            });
        }
        self.state = next;
        Ok(())
    }
}
