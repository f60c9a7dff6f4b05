//! Preview server: host origin, guest origin and the message channel.
//!
//! ```text
//! host origin  http://<host_name>:<port>         shell page + editing API
//! guest origin http://<guest_host>:<guest_port>  /run/<handle> documents
//! channel      ws://<host_name>:<ws_port>/       host events, guest diagnostics
//! ```

mod api;
mod guest;
mod lifecycle;
mod response;

use std::sync::Arc;

use anyhow::{Context, Result};
use crossbeam::channel;
use tiny_http::Server;

use crate::{
    actor::{ClientOrigins, Coordinator},
    config::{PreviewConfig, http_origin},
    core::register_servers,
    engine::{Engine, EngineSettings},
    host::DocumentStore,
    log,
    scheduler::RefreshScheduler,
    source::scan_workspace,
};
use api::{ApiContext, EngineHandle};

/// Number of threads answering host-origin requests.
const REQUEST_THREADS: usize = 4;

/// Bind all listeners, start the actors and serve until Ctrl+C.
pub fn serve(config: &PreviewConfig) -> Result<()> {
    let serve = &config.serve;
    let root = config.get_root();

    let (host_server, host_addr) = lifecycle::bind_with_retry(serve.interface, serve.port)?;
    let (guest_server, guest_addr) =
        lifecycle::bind_with_retry(serve.interface, serve.guest_port)?;
    let (ws_listener, ws_addr) = lifecycle::bind_listener(serve.interface, serve.ws_port)?;

    let host_origin = http_origin(&serve.host_name, host_addr.port());
    let guest_origin = http_origin(&serve.guest_host, guest_addr.port());
    let ws_url = format!("ws://{}:{}/", serve.host_name, ws_addr.port());

    let store = DocumentStore::default();
    let mut engine = Engine::new(
        EngineSettings {
            entry: config.preview.entry.clone(),
            guest_origin: guest_origin.clone(),
            ws_url: ws_url.clone(),
            max_document_bytes: config.preview.max_document_bytes,
        },
        Arc::clone(&store),
    );
    let count = scan_workspace(root, engine.registry_mut())
        .with_context(|| format!("Failed to scan {}", root.display()))?;
    log!("serve"; "{} source file(s) in {}", count, root.display());

    let (shutdown_tx, shutdown_rx) = channel::unbounded::<()>();
    let scheduler = RefreshScheduler::new(config.preview.debounce());
    let origins = ClientOrigins {
        host: host_origin.clone(),
        guest: guest_origin.clone(),
    };
    let mut coordinator = Coordinator::new(engine, scheduler, ws_listener, origins)
        .with_shutdown_signal(shutdown_rx);
    if serve.watch {
        coordinator = coordinator.with_watch(root.to_path_buf());
    }

    let ctx = ApiContext {
        engine: EngineHandle::new(coordinator.engine_sender()),
        host_origin: host_origin.clone(),
        ws_url,
        max_document_bytes: config.preview.max_document_bytes,
    };

    let host_server = Arc::new(host_server);
    let guest_server = Arc::new(guest_server);
    register_servers(
        vec![Arc::clone(&host_server), Arc::clone(&guest_server)],
        shutdown_tx,
    );

    log!("serve"; "{}", host_origin);
    crate::debug!("serve"; "guest origin {}", guest_origin);

    let actor_handle = lifecycle::spawn_actors(coordinator);

    let guest_thread = std::thread::spawn(move || guest::run_guest_loop(&guest_server, &store));
    run_request_loop(&host_server, ctx)?;

    let _ = guest_thread.join();
    lifecycle::wait_for_shutdown(actor_handle);
    Ok(())
}

fn run_request_loop(server: &Server, ctx: ApiContext) -> Result<()> {
    // Requests block on engine replies; a pool keeps one slow request from
    // stalling the rest.
    let pool = rayon::ThreadPoolBuilder::new()
        .num_threads(REQUEST_THREADS)
        .build()
        .context("failed to create request thread pool")?;

    for request in server.incoming_requests() {
        if crate::core::is_shutdown() || !crate::core::is_serving() {
            let _ = response::respond_unavailable(request);
            continue;
        }

        let ctx = ctx.clone();
        pool.spawn(move || {
            if let Err(e) = api::handle_request(request, &ctx) {
                log!("serve"; "request error: {e}");
            }
        });
    }
    Ok(())
}
