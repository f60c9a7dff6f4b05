//! Host-origin routes: the preview shell page and the editing API.
//!
//! | Method   | Path                  | Effect                                  |
//! |----------|-----------------------|-----------------------------------------|
//! | `GET`    | `/`                   | preview shell page                      |
//! | `GET`    | `/api/sources`        | list sources                            |
//! | `GET`    | `/api/status`         | entry, live run, diagnostic counters    |
//! | `PUT`    | `/api/sources/<name>` | edit (body = new content)               |
//! | `DELETE` | `/api/sources/<name>` | remove                                  |
//! | `POST`   | `/api/active/<name>`  | focus a file                            |
//! | `POST`   | `/api/run`            | explicit run                            |
//!
//! Requests that change state carry no `Origin` (scripted clients) or the
//! host origin. Every request becomes one [`EngineMsg`]; the reply travels
//! back on a oneshot channel. Request threads are plain OS threads, so they use the
//! blocking channel calls.

use std::io::Read;

use anyhow::Result;
use percent_encoding::percent_decode_str;
use serde::Serialize;
use thiserror::Error;
use tiny_http::{Method, Request};
use tokio::sync::{mpsc, oneshot};

use super::response::{respond_error, respond_html, respond_json, respond_not_found};
use crate::actor::messages::{EngineMsg, Reply};
use crate::embed::serve::{HOST_HTML, HostVars};
use crate::engine::{EngineStatus, SourceSummary};
use crate::host::PREVIEW_SANDBOX;
use crate::source::SourceError;
use crate::utils::time::now_millis;

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("{0}")]
    Source(#[from] SourceError),

    #[error("no source named `{0}`")]
    NotFound(String),

    #[error("request body is over the {0} byte limit")]
    TooLarge(usize),

    #[error("request body is not valid UTF-8")]
    BadBody,

    #[error("{0} not allowed here")]
    MethodNotAllowed(Method),

    #[error("requests from {0} may not change state")]
    Forbidden(String),

    #[error("engine is not running")]
    Unavailable,
}

impl ApiError {
    pub fn status(&self) -> u16 {
        match self {
            Self::Source(_) | Self::BadBody => 400,
            Self::Forbidden(_) => 403,
            Self::NotFound(_) => 404,
            Self::MethodNotAllowed(_) => 405,
            Self::TooLarge(_) => 413,
            Self::Unavailable => 503,
        }
    }
}

/// Request/response access to the engine actor.
#[derive(Clone)]
pub struct EngineHandle {
    tx: mpsc::Sender<EngineMsg>,
}

impl EngineHandle {
    pub fn new(tx: mpsc::Sender<EngineMsg>) -> Self {
        Self { tx }
    }

    fn request<T>(&self, make: impl FnOnce(Reply<T>) -> EngineMsg) -> Result<T, ApiError> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.tx
            .blocking_send(make(reply_tx))
            .map_err(|_| ApiError::Unavailable)?;
        reply_rx.blocking_recv().map_err(|_| ApiError::Unavailable)
    }

    fn send(&self, msg: EngineMsg) -> Result<(), ApiError> {
        self.tx.blocking_send(msg).map_err(|_| ApiError::Unavailable)
    }

    pub fn status(&self) -> Result<EngineStatus, ApiError> {
        self.request(EngineMsg::Status)
    }

    pub fn sources(&self) -> Result<Vec<SourceSummary>, ApiError> {
        self.request(EngineMsg::Sources)
    }

    pub fn edit(&self, name: String, content: String) -> Result<bool, ApiError> {
        let changed = self.request(|reply| EngineMsg::Edit {
            name,
            content,
            at: now_millis(),
            reply: Some(reply),
        })??;
        Ok(changed)
    }

    pub fn remove(&self, name: String) -> Result<(), ApiError> {
        let removed = self.request(|reply| EngineMsg::Remove {
            name: name.clone(),
            reply: Some(reply),
        })?;
        if removed {
            Ok(())
        } else {
            Err(ApiError::NotFound(name))
        }
    }

    pub fn switch_active(&self, name: String) -> Result<bool, ApiError> {
        Ok(self.request(|reply| EngineMsg::SwitchActive { name, reply })??)
    }

    pub fn run(&self) -> Result<(), ApiError> {
        self.send(EngineMsg::Run)
    }
}

/// Everything a host-origin request needs.
#[derive(Clone)]
pub struct ApiContext {
    pub engine: EngineHandle,
    pub host_origin: String,
    pub ws_url: String,
    pub max_document_bytes: usize,
}

/// Parsed route of a host-origin request.
#[derive(Debug, PartialEq, Eq)]
enum Route {
    Shell,
    Sources,
    Source(String),
    Active(String),
    Status,
    Run,
    NotFound,
}

impl Route {
    fn parse(url: &str) -> Self {
        let path = url.split(['?', '#']).next().unwrap_or(url);
        match path {
            "/" | "/index.html" => Self::Shell,
            "/api/sources" => Self::Sources,
            "/api/status" => Self::Status,
            "/api/run" => Self::Run,
            _ => {
                if let Some(name) = path.strip_prefix("/api/sources/") {
                    Self::Source(decode(name))
                } else if let Some(name) = path.strip_prefix("/api/active/") {
                    Self::Active(decode(name))
                } else {
                    Self::NotFound
                }
            }
        }
    }
}

fn decode(raw: &str) -> String {
    percent_decode_str(raw).decode_utf8_lossy().into_owned()
}

#[derive(Serialize)]
struct EditReply<'a> {
    name: &'a str,
    changed: bool,
}

#[derive(Serialize)]
struct ActiveReply<'a> {
    active: &'a str,
    entry_changed: bool,
}

/// Handle a single host-origin request.
pub fn handle_request(mut request: Request, ctx: &ApiContext) -> Result<()> {
    let route = Route::parse(request.url());
    let method = request.method().clone();

    if matches!(route, Route::NotFound) {
        return respond_not_found(request);
    }
    if let Err(e) = check_origin(&request, &ctx.host_origin) {
        crate::log!("serve"; "rejected {} {}: {}", method, request.url(), e);
        return respond_error(request, e.status(), &e.to_string());
    }

    let outcome = match (&method, route) {
        (Method::Get | Method::Head, Route::Shell) => {
            return respond_html(request, render_shell(ctx));
        }
        (Method::Get, Route::Sources) => ctx.engine.sources().map(|list| (200, json(&list))),
        (Method::Get, Route::Status) => ctx.engine.status().map(|status| (200, json(&status))),
        (Method::Put, Route::Source(name)) => read_body(&mut request, ctx.max_document_bytes)
            .and_then(|content| {
                let changed = ctx.engine.edit(name.clone(), content)?;
                Ok((200, json(&EditReply { name: &name, changed })))
            }),
        (Method::Delete, Route::Source(name)) => {
            ctx.engine.remove(name).map(|()| (200, serde_json::json!({})))
        }
        (Method::Post, Route::Active(name)) => {
            ctx.engine.switch_active(name.clone()).map(|entry_changed| {
                let reply = ActiveReply {
                    active: &name,
                    entry_changed,
                };
                (200, json(&reply))
            })
        }
        (Method::Post, Route::Run) => ctx.engine.run().map(|()| (202, serde_json::json!({}))),
        (method, _) => Err(ApiError::MethodNotAllowed(method.clone())),
    };

    match outcome {
        Ok((status, body)) => respond_json(request, status, &body),
        Err(e) => {
            crate::debug!("serve"; "{} {}: {}", method, request.url(), e);
            respond_error(request, e.status(), &e.to_string())
        }
    }
}

/// Reject state-changing requests whose `Origin` is not the host origin.
fn check_origin(request: &Request, host_origin: &str) -> Result<(), ApiError> {
    if matches!(request.method(), Method::Get | Method::Head) {
        return Ok(());
    }
    let origin = request
        .headers()
        .iter()
        .find(|h| h.field.equiv("Origin"))
        .map(|h| h.value.as_str());

    match origin {
        Some(origin) if origin != host_origin => Err(ApiError::Forbidden(origin.to_string())),
        _ => Ok(()),
    }
}

fn json<T: Serialize>(value: &T) -> serde_json::Value {
    serde_json::to_value(value).unwrap_or(serde_json::Value::Null)
}

/// Preview shell page, pointing at the live run if there is one.
fn render_shell(ctx: &ApiContext) -> String {
    let initial_src = ctx
        .engine
        .status()
        .ok()
        .and_then(|status| status.live)
        .map(|live| live.url)
        .unwrap_or_else(|| "about:blank".to_string());

    HOST_HTML.render(&HostVars {
        ws_url: ctx.ws_url.clone(),
        sandbox: PREVIEW_SANDBOX.attribute(),
        initial_src,
    })
}

/// Read at most `limit` bytes of UTF-8 body.
fn read_body(request: &mut Request, limit: usize) -> Result<String, ApiError> {
    if request.body_length().is_some_and(|len| len > limit) {
        return Err(ApiError::TooLarge(limit));
    }

    let mut bytes = Vec::new();
    request
        .as_reader()
        .take(limit as u64 + 1)
        .read_to_end(&mut bytes)
        .map_err(|_| ApiError::BadBody)?;
    if bytes.len() > limit {
        return Err(ApiError::TooLarge(limit));
    }
    String::from_utf8(bytes).map_err(|_| ApiError::BadBody)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tiny_http::{Header, TestRequest};

    #[test]
    fn test_route_parse() {
        assert_eq!(Route::parse("/"), Route::Shell);
        assert_eq!(Route::parse("/api/status?x=1"), Route::Status);
        assert_eq!(Route::parse("/api/run"), Route::Run);
        assert_eq!(
            Route::parse("/api/sources/lib%2Futil.js"),
            Route::Source("lib/util.js".into())
        );
        assert_eq!(
            Route::parse("/api/active/index.html"),
            Route::Active("index.html".into())
        );
        assert_eq!(Route::parse("/favicon.ico"), Route::NotFound);
    }

    #[test]
    fn test_error_status() {
        assert_eq!(
            ApiError::Source(SourceError::InvalidName("..".into())).status(),
            400
        );
        assert_eq!(ApiError::Forbidden("null".into()).status(), 403);
        assert_eq!(ApiError::NotFound("a.js".into()).status(), 404);
        assert_eq!(ApiError::TooLarge(10).status(), 413);
        assert_eq!(ApiError::Unavailable.status(), 503);
    }

    fn request(method: Method, origin: Option<&str>) -> Request {
        let mut test = TestRequest::new().with_method(method).with_path("/api/run");
        if let Some(origin) = origin {
            test = test.with_header(Header::from_bytes("Origin", origin).unwrap());
        }
        test.into()
    }

    #[test]
    fn test_guest_origin_cannot_change_state() {
        let host = "http://localhost:5310";
        for method in [Method::Post, Method::Put, Method::Delete] {
            let err = check_origin(&request(method, Some("http://127.0.0.1:5311")), host);
            assert!(matches!(
                err,
                Err(ApiError::Forbidden(origin)) if origin == "http://127.0.0.1:5311"
            ));
        }
        assert!(check_origin(&request(Method::Post, Some("null")), host).is_err());
    }

    #[test]
    fn test_host_origin_and_scripted_clients_may_change_state() {
        let host = "http://localhost:5310";
        assert!(check_origin(&request(Method::Post, Some(host)), host).is_ok());
        assert!(check_origin(&request(Method::Put, None), host).is_ok());
    }

    #[test]
    fn test_reads_skip_origin_check() {
        let host = "http://localhost:5310";
        assert!(check_origin(&request(Method::Get, Some("http://127.0.0.1:5311")), host).is_ok());
    }

    #[test]
    fn test_engine_handle_without_actor_is_unavailable() {
        let (tx, rx) = mpsc::channel(1);
        drop(rx);
        let handle = EngineHandle::new(tx);
        assert!(matches!(handle.status(), Err(ApiError::Unavailable)));
        assert!(matches!(handle.run(), Err(ApiError::Unavailable)));
    }

    #[test]
    fn test_engine_handle_round_trip() {
        let (tx, mut rx) = mpsc::channel(1);
        let handle = EngineHandle::new(tx);

        let actor = std::thread::spawn(move || {
            if let Some(EngineMsg::Remove { name, reply }) = rx.blocking_recv() {
                let _ = reply.unwrap().send(name == "style.css");
            }
        });

        assert!(handle.remove("style.css".into()).is_ok());
        actor.join().unwrap();
    }

    #[test]
    fn test_remove_missing_is_not_found() {
        let (tx, mut rx) = mpsc::channel(1);
        let handle = EngineHandle::new(tx);

        let actor = std::thread::spawn(move || {
            if let Some(EngineMsg::Remove { reply, .. }) = rx.blocking_recv() {
                let _ = reply.unwrap().send(false);
            }
        });

        assert!(matches!(
            handle.remove("gone.js".into()),
            Err(ApiError::NotFound(name)) if name == "gone.js"
        ));
        actor.join().unwrap();
    }
}
