//! Actor Message Definitions
//!
//! ```text
//! HTTP API ─┐
//! FsActor  ─┼──EngineMsg──> EngineActor ──WsMsg::Publish──> WsActor ──> host pages
//! WsActor  ─┘  (guest msgs)                                        └──> guest sockets
//! ```

use std::net::TcpStream;

use tokio::sync::oneshot;

use crate::engine::{EngineStatus, HostEvent, SourceSummary};
use crate::host::HandleId;
use crate::source::SourceError;

/// One-shot reply channel for request/response messages.
pub type Reply<T> = oneshot::Sender<T>;

// =============================================================================
// EngineActor Messages
// =============================================================================

/// Messages to Engine Actor
#[derive(Debug)]
pub enum EngineMsg {
    /// New content for a source (API PUT or file change on disk)
    Edit {
        name: String,
        content: String,
        /// Milliseconds since the Unix epoch
        at: u64,
        reply: Option<Reply<Result<bool, SourceError>>>,
    },
    /// Source deleted
    Remove {
        name: String,
        reply: Option<Reply<bool>>,
    },
    /// File focused in the editing surface
    SwitchActive {
        name: String,
        reply: Reply<Result<bool, SourceError>>,
    },
    /// Explicit run: skip the debounce
    Run,
    /// Raw message from a guest socket that announced `handle`
    Guest { handle: HandleId, raw: String },
    Status(Reply<EngineStatus>),
    Sources(Reply<Vec<SourceSummary>>),
    Shutdown,
}

// =============================================================================
// WsActor Messages
// =============================================================================

/// Messages to WebSocket Actor
pub enum WsMsg {
    /// Send an event to every host client
    Publish(HostEvent),
    /// Accepted TCP connection awaiting the WebSocket handshake
    AddClient(TcpStream),
    Shutdown,
}
