//! Process state for serve mode.
//!
//! Two flags:
//! - `SERVING`: the initial scan is done and the engine actor is running
//! - `SHUTDOWN`: Ctrl+C received

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, OnceLock};

use tiny_http::Server;

/// Engine actor is running
/// - `false`: API requests answer 503
/// - `true`: Serve normally
static SERVING: AtomicBool = AtomicBool::new(false);

/// Shutdown has been requested (Ctrl+C received)
static SHUTDOWN: AtomicBool = AtomicBool::new(false);

/// HTTP servers (host origin, guest origin) to unblock on shutdown
static SERVERS: OnceLock<Vec<Arc<Server>>> = OnceLock::new();

/// Shutdown signal sender for actor system
static SHUTDOWN_TX: OnceLock<crossbeam::channel::Sender<()>> = OnceLock::new();

// =============================================================================
// SERVING state
// =============================================================================

pub fn is_serving() -> bool {
    SERVING.load(Ordering::SeqCst)
}

pub fn set_serving(serving: bool) {
    SERVING.store(serving, Ordering::SeqCst);
}

// =============================================================================
// SHUTDOWN state
// =============================================================================

/// Setup the global Ctrl+C handler. Call once at program start
///
/// - Before `register_servers()`: exit immediately
/// - After `register_servers()`: graceful shutdown (unblock servers, notify actors)
pub fn setup_shutdown_handler() -> anyhow::Result<()> {
    ctrlc::set_handler(|| {
        SHUTDOWN.store(true, Ordering::SeqCst);

        if let Some(tx) = SHUTDOWN_TX.get() {
            let _ = tx.send(());
        }

        match SERVERS.get() {
            Some(servers) => {
                crate::log!("serve"; "shutting down...");
                for server in servers {
                    server.unblock();
                }
            }
            None => std::process::exit(0),
        }
    })
    .map_err(|e| anyhow::anyhow!("failed to set Ctrl+C handler: {}", e))
}

/// Register the HTTP servers for graceful shutdown
///
/// Call this after binding, before entering the request loops
pub fn register_servers(servers: Vec<Arc<Server>>, shutdown_tx: crossbeam::channel::Sender<()>) {
    let _ = SERVERS.set(servers);
    let _ = SHUTDOWN_TX.set(shutdown_tx);
}

/// Check if shutdown has been requested
pub fn is_shutdown() -> bool {
    SHUTDOWN.load(Ordering::Relaxed)
}

// =============================================================================
// Tests
// =============================================================================
