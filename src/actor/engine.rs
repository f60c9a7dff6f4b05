//! Engine Actor
//!
//! Owns the [`Engine`] and the [`RefreshScheduler`] and processes one
//! message at a time, which gives every engine operation exclusive access
//! to preview state.
//!
//! ```text
//! loop {
//!     select! {
//!         msg      = inbox           => handle(msg)
//!         deadline = scheduler timer => refresh()
//!     }
//! }
//! ```

use std::time::Instant;

use tokio::sync::mpsc;

use super::messages::{EngineMsg, WsMsg};
use crate::engine::{Engine, HostEvent};
use crate::scheduler::{RefreshDue, RefreshScheduler};
use crate::utils::time::now_millis;

pub struct EngineActor {
    rx: mpsc::Receiver<EngineMsg>,
    ws_tx: mpsc::Sender<WsMsg>,
    engine: Engine,
    scheduler: RefreshScheduler,
}

impl EngineActor {
    pub fn new(
        rx: mpsc::Receiver<EngineMsg>,
        ws_tx: mpsc::Sender<WsMsg>,
        engine: Engine,
        scheduler: RefreshScheduler,
    ) -> Self {
        Self {
            rx,
            ws_tx,
            engine,
            scheduler,
        }
    }

    /// Run the actor event loop
    pub async fn run(mut self) {
        crate::debug!("engine"; "refresh debounce {:?}", self.scheduler.window());
        // First run so the shell page has a document to show.
        self.refresh(RefreshDue::Requested).await;
        crate::core::set_serving(true);

        loop {
            let sleep = self.scheduler.sleep_duration(Instant::now());
            tokio::select! {
                biased;
                msg = self.rx.recv() => {
                    let Some(msg) = msg else { break };
                    if !self.handle(msg).await {
                        break;
                    }
                }
                _ = tokio::time::sleep(sleep), if self.scheduler.is_pending() => {
                    if let Some(due) = self.scheduler.poll(Instant::now()) {
                        self.refresh(due).await;
                    }
                }
            }
        }

        crate::core::set_serving(false);
        self.engine.shutdown();
        crate::debug!("engine"; "stopped");
    }

    /// Returns `false` to stop the loop.
    async fn handle(&mut self, msg: EngineMsg) -> bool {
        match msg {
            EngineMsg::Edit {
                name,
                content,
                at,
                reply,
            } => {
                let result = self.engine.apply_edit(&name, content, at);
                if let Err(e) = &result {
                    crate::debug!("engine"; "edit rejected: {}", e);
                }
                if matches!(result, Ok(true)) {
                    self.scheduler.notify_edit(Instant::now());
                }
                if let Some(reply) = reply {
                    let _ = reply.send(result);
                }
            }

            EngineMsg::Remove { name, reply } => {
                let removed = self.engine.remove_source(&name);
                if removed {
                    self.scheduler.notify_edit(Instant::now());
                }
                if let Some(reply) = reply {
                    let _ = reply.send(removed);
                }
            }

            EngineMsg::SwitchActive { name, reply } => {
                let result = self.engine.switch_active(&name);
                if matches!(result, Ok(true)) {
                    self.scheduler.notify_edit(Instant::now());
                }
                let _ = reply.send(result);
            }

            EngineMsg::Run => {
                let due = self.scheduler.request_run();
                self.refresh(due).await;
            }

            EngineMsg::Guest { handle, raw } => {
                if let Some(event) = self.engine.on_guest_message(&handle, &raw, now_millis()) {
                    self.publish(event).await;
                }
            }

            EngineMsg::Status(reply) => {
                let _ = reply.send(self.engine.status());
            }

            EngineMsg::Sources(reply) => {
                let _ = reply.send(self.engine.sources());
            }

            EngineMsg::Shutdown => {
                crate::debug!("engine"; "shutting down");
                return false;
            }
        }
        true
    }

    async fn refresh(&mut self, due: RefreshDue) {
        if let RefreshDue::Debounced { edits } = due {
            crate::debug!("engine"; "refresh after {} edit(s)", edits);
        }
        let event = self.engine.refresh();
        self.publish(event).await;
    }

    async fn publish(&self, event: HostEvent) {
        if self.ws_tx.send(WsMsg::Publish(event)).await.is_err() {
            crate::debug!("engine"; "ws actor gone, event dropped");
        }
    }
}
