//! Actor Coordinator - Wires up the Actor System
//!
//! The Coordinator is a thin orchestrator that:
//! - Creates communication channels
//! - Wires up actors
//! - Runs them until the shutdown signal

use std::net::TcpListener;
use std::path::PathBuf;
use std::time::Duration;

use anyhow::Result;
use crossbeam::channel::Receiver;
use tokio::sync::mpsc;

use super::engine::EngineActor;
use super::fs::FsActor;
use super::messages::{EngineMsg, WsMsg};
use super::ws::{self, ClientOrigins, WsActor};
use crate::engine::Engine;
use crate::scheduler::RefreshScheduler;

const CHANNEL_BUFFER: usize = 32;

/// Coordinator - wires up and runs the actor system.
pub struct Coordinator {
    engine: Engine,
    scheduler: RefreshScheduler,
    engine_tx: mpsc::Sender<EngineMsg>,
    engine_rx: mpsc::Receiver<EngineMsg>,
    ws_listener: TcpListener,
    origins: ClientOrigins,
    /// Workspace to watch, if watching is enabled
    watch_root: Option<PathBuf>,
    shutdown_rx: Option<Receiver<()>>,
}

impl Coordinator {
    pub fn new(
        engine: Engine,
        scheduler: RefreshScheduler,
        ws_listener: TcpListener,
        origins: ClientOrigins,
    ) -> Self {
        let (engine_tx, engine_rx) = mpsc::channel(CHANNEL_BUFFER);
        Self {
            engine,
            scheduler,
            engine_tx,
            engine_rx,
            ws_listener,
            origins,
            watch_root: None,
            shutdown_rx: None,
        }
    }

    /// Sender for the HTTP API; valid before [`run`](Self::run) starts.
    pub fn engine_sender(&self) -> mpsc::Sender<EngineMsg> {
        self.engine_tx.clone()
    }

    /// Watch `root` for source changes.
    pub fn with_watch(mut self, root: PathBuf) -> Self {
        self.watch_root = Some(root);
        self
    }

    /// Set shutdown signal receiver.
    pub fn with_shutdown_signal(mut self, rx: Receiver<()>) -> Self {
        self.shutdown_rx = Some(rx);
        self
    }

    /// Run the actor system.
    pub async fn run(self) -> Result<()> {
        let Self {
            engine,
            scheduler,
            engine_tx,
            engine_rx,
            ws_listener,
            origins,
            watch_root,
            shutdown_rx,
        } = self;

        let (ws_tx, ws_rx) = mpsc::channel::<WsMsg>(CHANNEL_BUFFER);
        ws::spawn_acceptor(ws_listener, ws_tx.clone())?;

        // A failed watcher degrades to API-only editing.
        let fs_actor = match watch_root {
            Some(root) => match FsActor::new(root, engine_tx.clone()) {
                Ok(actor) => Some(actor),
                Err(e) => {
                    crate::log!("watch"; "watcher failed: {}", e);
                    None
                }
            },
            None => None,
        };

        let engine_actor = EngineActor::new(engine_rx, ws_tx.clone(), engine, scheduler);
        let ws_actor = WsActor::new(ws_rx, engine_tx.clone(), origins);

        crate::debug!("actor"; "start");
        let engine_handle = tokio::spawn(engine_actor.run());
        let ws_handle = tokio::spawn(ws_actor.run());
        let fs_handle = fs_actor.map(|actor| tokio::spawn(actor.run()));

        match shutdown_rx {
            Some(rx) => loop {
                if rx.try_recv().is_ok() {
                    crate::debug!("actor"; "shutdown signal received");
                    break;
                }
                tokio::time::sleep(Duration::from_millis(100)).await;
            },
            None => {
                let _ = tokio::join!(engine_handle);
                return Ok(());
            }
        }

        // Engine first: disposing runs must happen before sockets close.
        let _ = engine_tx.send(EngineMsg::Shutdown).await;
        let _ = tokio::time::timeout(Duration::from_millis(500), engine_handle).await;

        let _ = ws_tx.send(WsMsg::Shutdown).await;
        let _ = tokio::time::timeout(Duration::from_millis(500), ws_handle).await;

        if let Some(handle) = fs_handle {
            handle.abort();
        }

        crate::debug!("actor"; "stopped");
        Ok(())
    }
}
