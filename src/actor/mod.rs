//! Actor System for Serve Mode
//!
//! Message-passing concurrency around the single-owner engine:
//!
//! ```text
//! FsActor ----------+
//! HTTP API ---------+--> EngineActor --> WsActor --> host pages
//! WsActor (guests) -+
//! ```
//!
//! # Module Structure
//!
//! - `messages` - Message types for inter-actor communication
//! - `engine` - Owns the engine and the refresh scheduler
//! - `fs` - Workspace watcher
//! - `ws` - WebSocket connections for host pages and guest shims
//! - `coordinator` - Wires up and runs actors

pub mod coordinator;
pub mod engine;
pub mod fs;
pub mod messages;
pub mod ws;

pub use coordinator::Coordinator;
pub use ws::ClientOrigins;
