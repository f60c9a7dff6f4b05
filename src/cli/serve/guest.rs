//! Guest-origin server: serves published run documents.
//!
//! Only `GET /run/<handle>` exists here. A handle that was never published,
//! or whose run was released, answers `410 Gone`.

use anyhow::Result;
use tiny_http::{Method, Request, Server};

use super::response::{is_head_request, respond_error, respond_not_found, send_body};
use crate::host::{DocumentStore, HandleId, PREVIEW_SANDBOX};
use crate::utils::mime::types::HTML;

/// Serve requests until the server is unblocked.
pub fn run_guest_loop(server: &Server, store: &DocumentStore) {
    for request in server.incoming_requests() {
        if let Err(e) = handle_request(request, store) {
            crate::log!("serve"; "guest request error: {e}");
        }
    }
}

fn handle_request(request: Request, store: &DocumentStore) -> Result<()> {
    if request.method() != &Method::Get && !is_head_request(&request) {
        return respond_error(request, 405, "405 Method Not Allowed");
    }

    let Some(raw) = run_id(request.url()) else {
        return respond_not_found(request);
    };

    // Clone out of the map so the shard lock is not held while writing.
    let document =
        HandleId::parse(raw).and_then(|id| store.get(&id).map(|doc| doc.value().clone()));
    let Some(document) = document else {
        crate::debug!("serve"; "gone: {}", raw);
        return respond_error(request, 410, "410 Gone");
    };

    let csp = PREVIEW_SANDBOX.csp_header();
    send_body(
        request,
        200,
        HTML,
        document.as_bytes().to_vec(),
        &[
            ("Content-Security-Policy", &csp),
            ("Cache-Control", "no-store"),
            ("X-Content-Type-Options", "nosniff"),
        ],
    )
}

/// `/run/<id>` (query string ignored) -> `<id>`.
fn run_id(url: &str) -> Option<&str> {
    let path = url.split(['?', '#']).next().unwrap_or(url);
    let id = path.strip_prefix("/run/")?;
    (!id.is_empty() && !id.contains('/')).then_some(id)
}
