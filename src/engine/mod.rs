//! Preview engine: one session's worth of state.
//!
//! Wires the components together for the engine actor:
//!
//! ```text
//! apply_edit ──> SourceRegistry
//! refresh    ──> snapshot ─> assemble ─> instrument ─> IsolationHost::load ─> HostEvent
//! guest msg  ──> DiagnosticsRelay ─> HostEvent
//! ```
//!
//! Plain synchronous code; the actor owns the only instance and calls it
//! one message at a time.

mod event;

pub use event::HostEvent;

use serde::Serialize;

use crate::assemble::assemble;
use crate::embed::guest::ShimVars;
use crate::host::{DocumentStore, HandleId, IsolationHost};
use crate::instrument::instrument;
use crate::logger::{status_failed, status_loaded};
use crate::relay::{Counters, DiagnosticEvent, DiagnosticsRelay, Intake};
use crate::source::{SourceError, SourceKind, SourceRegistry};

/// Settings fixed for the lifetime of a session.
#[derive(Debug, Clone)]
pub struct EngineSettings {
    /// Entry-point markup file.
    pub entry: String,
    /// `scheme://host:port` of the guest-origin server.
    pub guest_origin: String,
    /// WebSocket endpoint the shim connects to.
    pub ws_url: String,
    pub max_document_bytes: usize,
}

/// One row of `GET /api/sources`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SourceSummary {
    pub name: String,
    pub kind: SourceKind,
    pub last_modified: u64,
    pub bytes: usize,
}

/// Live run, as reported by `GET /api/status`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LiveRun {
    pub run: u64,
    pub handle: HandleId,
    pub url: String,
    /// Whether the guest shim has connected.
    pub loaded: bool,
}

/// Response of `GET /api/status`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EngineStatus {
    pub entry: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub active_file: Option<String>,
    pub sources: usize,
    pub runs: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub live: Option<LiveRun>,
    #[serde(flatten)]
    pub counters: Counters,
    /// Guest messages rejected as stale, foreign or malformed.
    pub dropped: usize,
}

pub struct Engine {
    registry: SourceRegistry,
    host: IsolationHost,
    relay: DiagnosticsRelay,
    ws_url: String,
    /// Handle whose `ready` has been seen.
    loaded: Option<HandleId>,
}

impl Engine {
    pub fn new(settings: EngineSettings, store: DocumentStore) -> Self {
        Self {
            registry: SourceRegistry::new(settings.entry),
            host: IsolationHost::new(store, settings.guest_origin, settings.max_document_bytes),
            relay: DiagnosticsRelay::new(),
            ws_url: settings.ws_url,
            loaded: None,
        }
    }

    pub fn registry_mut(&mut self) -> &mut SourceRegistry {
        &mut self.registry
    }

    /// Store new content for a source. Returns whether anything changed.
    pub fn apply_edit(&mut self, name: &str, content: String, at: u64) -> Result<bool, SourceError> {
        let changed = self.registry.upsert(name, content, at)?;
        if changed {
            crate::debug!("engine"; "edit {}", name);
        }
        Ok(changed)
    }

    /// Remove a source. Returns whether it existed.
    pub fn remove_source(&mut self, name: &str) -> bool {
        let removed = self.registry.remove(name);
        if removed {
            crate::debug!("engine"; "removed {}", name);
        }
        removed
    }

    /// Focus a file; a markup file becomes the entry point.
    pub fn switch_active(&mut self, name: &str) -> Result<bool, SourceError> {
        let entry_changed = self.registry.switch_active(name)?;
        if entry_changed {
            crate::log!("engine"; "entry point is now {}", self.registry.entry());
        }
        Ok(entry_changed)
    }

    /// Run one execution cycle against the current sources.
    ///
    /// Assembles, instruments and loads a new document. The previous run is
    /// released by the load; on failure it stays live.
    pub fn refresh(&mut self) -> HostEvent {
        let snapshot = self.registry.snapshot();
        let document = assemble(&snapshot);
        let pending = self.host.prepare();
        let run = pending.run();

        let shim = ShimVars {
            handle: pending.id().to_string(),
            ws_url: self.ws_url.clone(),
        };
        let instrumented = instrument(&document, &shim);

        match self.host.load(pending, instrumented) {
            Ok(live) => {
                let event = HostEvent::RunStarted {
                    run,
                    handle: live.id().clone(),
                    url: live.url().to_string(),
                };
                self.relay.reset();
                self.loaded = None;
                crate::debug!("engine"; "run {} started ({} sources)", run, snapshot.files().len());
                event
            }
            Err(e) => {
                status_failed(&format!("run {run} failed"), &e.to_string());
                HostEvent::RunFailed {
                    run,
                    error: e.to_string(),
                }
            }
        }
    }

    /// Feed one raw guest message through the relay.
    ///
    /// `None` when the message was dropped or carries nothing to publish.
    pub fn on_guest_message(&mut self, source: &HandleId, raw: &str, now: u64) -> Option<HostEvent> {
        let intake = self
            .relay
            .on_event(self.host.active_id(), source, raw, now)
            .ok()?;

        match intake {
            Intake::Ready => self.on_guest_ready(source),
            Intake::Diagnostic(event) => {
                mirror(&event);
                let Counters { errors, warnings } = self.relay.counters();
                Some(HostEvent::Diagnostic {
                    handle: source.clone(),
                    event,
                    errors,
                    warnings,
                })
            }
        }
    }

    /// `run_loaded` once per handle.
    fn on_guest_ready(&mut self, source: &HandleId) -> Option<HostEvent> {
        if self.loaded.as_ref() == Some(source) {
            return None;
        }
        let run = self.host.active()?.run();
        self.loaded = Some(source.clone());

        let Counters { errors, warnings } = self.relay.counters();
        status_loaded(&format!("run {run} loaded"), errors, warnings);
        Some(HostEvent::RunLoaded {
            run,
            handle: source.clone(),
        })
    }

    pub fn sources(&self) -> Vec<SourceSummary> {
        self.registry
            .iter()
            .map(|file| SourceSummary {
                name: file.name.clone(),
                kind: file.kind,
                last_modified: file.last_modified,
                bytes: file.bytes(),
            })
            .collect()
    }

    pub fn status(&self) -> EngineStatus {
        EngineStatus {
            entry: self.registry.entry().to_string(),
            active_file: self.registry.active().map(str::to_string),
            sources: self.registry.len(),
            runs: self.host.runs(),
            live: self.host.active().map(|h| LiveRun {
                run: h.run(),
                handle: h.id().clone(),
                url: h.url().to_string(),
                loaded: self.loaded.as_ref() == Some(h.id()),
            }),
            counters: self.relay.counters(),
            dropped: self.relay.dropped(),
        }
    }

    /// Dispose the live run.
    pub fn shutdown(&mut self) {
        self.host.shutdown();
        self.loaded = None;
    }
}

/// Echo a guest diagnostic to the terminal.
fn mirror(event: &DiagnosticEvent) {
    match event {
        DiagnosticEvent::Console { level, parts, .. } => {
            let module = format!("console.{}", level.label());
            crate::logger::log(&module, &parts.join(" "));
        }
        DiagnosticEvent::RuntimeError {
            message,
            line,
            column,
            ..
        } => match (line, column) {
            (Some(line), Some(column)) => crate::log!("error"; "{} ({}:{})", message, line, column),
            (Some(line), None) => crate::log!("error"; "{} (line {})", message, line),
            _ => crate::log!("error"; "{}", message),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn engine(limit: usize) -> Engine {
        Engine::new(
            EngineSettings {
                entry: "index.html".into(),
                guest_origin: "http://127.0.0.1:5311".into(),
                ws_url: "ws://127.0.0.1:5312/".into(),
                max_document_bytes: limit,
            },
            DocumentStore::default(),
        )
    }

    fn started(event: HostEvent) -> HandleId {
        match event {
            HostEvent::RunStarted { handle, .. } => handle,
            other => panic!("expected run_started, got {other:?}"),
        }
    }

    #[test]
    fn test_refresh_publishes_instrumented_document() {
        let mut engine = engine(1 << 20);
        engine
            .apply_edit("index.html", "<html><head></head><body></body></html>".into(), 1)
            .unwrap();
        engine.apply_edit("app.js", "console.log('hi');".into(), 1).unwrap();

        let handle = started(engine.refresh());
        let store = engine.host.store().clone();
        let doc = store.get(handle.as_str()).unwrap();
        assert!(doc.contains(handle.as_str()));
        assert!(doc.contains("console.log('hi');"));
        assert_eq!(engine.status().live.unwrap().handle, handle);
    }

    #[test]
    fn test_throw_yields_one_runtime_error_and_engine_stays_usable() {
        let mut engine = engine(1 << 20);
        engine.apply_edit("boom.js", "throw new Error(\"x\");".into(), 1).unwrap();
        let handle = started(engine.refresh());

        let event = engine
            .on_guest_message(&handle, r#"{"kind":"error","message":"x","line":1,"column":7}"#, 10)
            .unwrap();
        match event {
            HostEvent::Diagnostic { event, errors, warnings, .. } => {
                assert!(matches!(event, DiagnosticEvent::RuntimeError { ref message, .. } if message == "x"));
                assert_eq!((errors, warnings), (1, 0));
            }
            other => panic!("expected diagnostic, got {other:?}"),
        }

        engine.apply_edit("boom.js", "console.log('fixed');".into(), 2).unwrap();
        let next = started(engine.refresh());
        assert_ne!(next, handle);
        assert_eq!(engine.status().counters, Counters::default());
    }

    #[test]
    fn test_messages_from_previous_run_are_dropped() {
        let mut engine = engine(1 << 20);
        let first = started(engine.refresh());
        let second = started(engine.refresh());

        assert!(engine
            .on_guest_message(&first, r#"{"kind":"error","message":"late"}"#, 0)
            .is_none());
        assert_eq!(engine.status().counters, Counters::default());
        let status = engine.status();
        assert_eq!(status.live.unwrap().handle, second);
        assert_eq!(status.dropped, 1);
    }

    #[test]
    fn test_no_events_after_shutdown() {
        let mut engine = engine(1 << 20);
        let handle = started(engine.refresh());
        engine.shutdown();

        assert!(engine
            .on_guest_message(&handle, r#"{"kind":"console","level":"error","parts":["x"]}"#, 0)
            .is_none());
        assert!(engine.status().live.is_none());
    }

    #[test]
    fn test_run_loaded_emitted_once_per_handle() {
        let mut engine = engine(1 << 20);
        let handle = started(engine.refresh());

        let ready = r#"{"kind":"ready"}"#;
        assert!(matches!(
            engine.on_guest_message(&handle, ready, 0),
            Some(HostEvent::RunLoaded { run: 1, .. })
        ));
        assert!(engine.on_guest_message(&handle, ready, 0).is_none());
        assert!(engine.status().live.unwrap().loaded);
    }

    #[test]
    fn test_oversized_document_fails_run() {
        let mut engine = engine(64);
        engine.apply_edit("index.html", "<p>small</p>".into(), 1).unwrap();

        let event = engine.refresh();
        assert!(matches!(event, HostEvent::RunFailed { run: 1, .. }));
        assert!(engine.status().live.is_none());

        // Shrinking is not enough (the shim alone is over 64 bytes), but the
        // engine keeps accepting runs.
        assert!(matches!(engine.refresh(), HostEvent::RunFailed { run: 2, .. }));
    }

    #[test]
    fn test_switch_active_changes_entry() {
        let mut engine = engine(1 << 20);
        engine.apply_edit("index.html", "<p>index</p>".into(), 1).unwrap();
        engine.apply_edit("about.html", "<p>about</p>".into(), 1).unwrap();

        assert!(engine.switch_active("about.html").unwrap());
        assert!(!engine.switch_active("app.js").unwrap());

        let handle = started(engine.refresh());
        let doc = engine.host.store().get(handle.as_str()).unwrap().clone();
        assert!(doc.contains("<p>about</p>"));
        assert!(!doc.contains("<p>index</p>"));

        let status = engine.status();
        assert_eq!(status.entry, "about.html");
        assert_eq!(status.active_file.as_deref(), Some("app.js"));
    }

    #[test]
    fn test_sources_listing() {
        let mut engine = engine(1 << 20);
        engine.apply_edit("b.css", "p{}".into(), 5).unwrap();
        engine.apply_edit("a.js", "x()".into(), 7).unwrap();
        assert!(engine.remove_source("b.css"));
        assert!(!engine.remove_source("b.css"));

        let sources = engine.sources();
        assert_eq!(
            sources,
            vec![SourceSummary {
                name: "a.js".into(),
                kind: SourceKind::Script,
                last_modified: 7,
                bytes: 3,
            }]
        );
    }
}
