//! HTTP response helpers.

use anyhow::Result;
use serde::Serialize;
use tiny_http::{Header, Method, Request, Response, StatusCode};

use crate::utils::mime::types::{HTML, JSON, PLAIN};

/// Respond with a rendered HTML page.
pub fn respond_html(request: Request, body: String) -> Result<()> {
    send_body(request, 200, HTML, body.into_bytes(), &[])
}

/// Respond with a JSON body.
pub fn respond_json<T: Serialize>(request: Request, status: u16, value: &T) -> Result<()> {
    let body = serde_json::to_vec(value)?;
    send_body(request, status, JSON, body, &[])
}

/// Respond with a plain-text error body.
pub fn respond_error(request: Request, status: u16, message: &str) -> Result<()> {
    send_body(request, status, PLAIN, message.as_bytes().to_vec(), &[])
}

/// Respond with 404 Not Found.
pub fn respond_not_found(request: Request) -> Result<()> {
    respond_error(request, 404, "404 Not Found")
}

/// Respond with 503 Service Unavailable (starting up or shutting down).
pub fn respond_unavailable(request: Request) -> Result<()> {
    respond_error(request, 503, "503 Service Unavailable")
}

pub fn is_head_request(request: &Request) -> bool {
    request.method() == &Method::Head
}

/// Send `body`, or only the headers for HEAD requests.
pub fn send_body(
    request: Request,
    status: u16,
    content_type: &str,
    body: Vec<u8>,
    extra: &[(&str, &str)],
) -> Result<()> {
    let mut headers = vec![make_header("Content-Type", content_type)?];
    for (key, value) in extra {
        headers.push(make_header(key, value)?);
    }

    if is_head_request(&request) {
        let mut response = Response::empty(StatusCode(status));
        for header in headers {
            response.add_header(header);
        }
        request.respond(response)?;
        return Ok(());
    }

    let mut response = Response::from_data(body).with_status_code(StatusCode(status));
    for header in headers {
        response.add_header(header);
    }
    request.respond(response)?;
    Ok(())
}

pub fn make_header(key: &str, value: &str) -> Result<Header> {
    Header::from_bytes(key.as_bytes(), value.as_bytes())
        .map_err(|_| anyhow::anyhow!("invalid header {key}: {value}"))
}
