//! Instrumentation Injector.
//!
//! Turns an [`AssembledDocument`] into the document the guest actually runs:
//!
//! 1. the concatenated guest script payload is wrapped in one guarded
//!    `try`/`catch` block that reports through the diagnostics shim;
//! 2. the shim itself is inserted as the first script of the document,
//!    so it is installed before any guest code runs.
//!
//! The shim position is the end of the `<head>` open tag, else the end of
//! the `<html>` open tag, else just past a leading doctype, else offset 0.
//! It is then clamped to the first `<script` of the document.

use crate::assemble::{AssembledDocument, SCRIPT_BLOCK_OPEN, markers};
use crate::embed::guest::{SHIM_JS, ShimVars};

/// Opening line of the guarded guest block.
const GUARD_OPEN: &str = "try {\n";
/// Closing lines of the guarded guest block.
const GUARD_CLOSE: &str = "} catch (__livepadError) {\n  window.__livepad.report(__livepadError);\n}\n";

/// Produce the instrumented document text.
pub fn instrument(doc: &AssembledDocument, shim: &ShimVars) -> String {
    let mut text = doc.as_str().to_string();

    // Later edit first so earlier offsets stay valid.
    if let Some(range) = doc.script_range() {
        text.insert_str(range.end, GUARD_CLOSE);
        text.insert_str(range.start, GUARD_OPEN);
    }

    let pos = shim_position(&text);
    text.insert_str(pos, &shim_tag(shim));
    text
}

/// The shim wrapped in its own `<script>` element.
fn shim_tag(shim: &ShimVars) -> String {
    format!("{SCRIPT_BLOCK_OPEN}{}</script>\n", SHIM_JS.render(shim))
}

/// Where the shim goes: nearest the top, never after any script.
fn shim_position(html: &str) -> usize {
    let top = markers::head_open_end(html)
        .or_else(|| markers::html_open_end(html))
        .or_else(|| markers::doctype_end(html))
        .unwrap_or(0);

    match markers::first_script(html) {
        Some(script) => top.min(script),
        None => top,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::assemble::assemble;
    use crate::source::SourceRegistry;

    fn vars() -> ShimVars {
        ShimVars {
            handle: "feedface".into(),
            ws_url: "ws://127.0.0.1:5312/".into(),
        }
    }

    fn build(files: &[(&str, &str)]) -> String {
        let mut registry = SourceRegistry::default();
        for (name, content) in files {
            registry.upsert(name, *content, 0).unwrap();
        }
        instrument(&assemble(&registry.snapshot()), &vars())
    }

    fn shim_offset(html: &str) -> usize {
        html.find("var HANDLE = \"feedface\"").unwrap()
    }

    #[test]
    fn test_shim_precedes_guest_script() {
        let html = build(&[
            ("index.html", "<html><head></head><body><p>x</p></body></html>"),
            ("app.js", "console.log('guest');"),
        ]);
        assert!(shim_offset(&html) < html.find("console.log('guest')").unwrap());
        assert!(html.starts_with("<html><head><script>\n"));
    }

    #[test]
    fn test_shim_precedes_inline_guest_script_in_markup() {
        let html = build(&[(
            "index.html",
            "<script>window.early = 1;</script><html><head></head><body></body></html>",
        )]);
        assert!(html.starts_with("<script>\n(function () {"));
        assert!(shim_offset(&html) < html.find("window.early").unwrap());
    }

    #[test]
    fn test_shim_precedes_script_without_head_or_html() {
        let html = build(&[("index.html", "<!DOCTYPE html><p>x</p>"), ("a.js", "a();")]);
        assert!(html.starts_with("<!DOCTYPE html><script>\n"));
        assert!(shim_offset(&html) < html.find("a();").unwrap());
    }

    #[test]
    fn test_shim_precedes_styles_prepended_to_document() {
        let html = build(&[("index.html", "<p>x</p>"), ("s.css", "p{}"), ("a.js", "a();")]);
        assert!(html.starts_with("<script>\n"));
        assert!(shim_offset(&html) < html.find("<style>").unwrap());
    }

    #[test]
    fn test_throwing_script_is_guarded() {
        let html = build(&[
            ("index.html", "<body></body>"),
            ("boom.js", "throw new Error(\"x\");"),
        ]);

        let guard_open = html.rfind(GUARD_OPEN).unwrap();
        assert!(shim_offset(&html) < guard_open);
        let throw = html.find("throw new Error(\"x\");").unwrap();
        let guard_close = html.find(GUARD_CLOSE).unwrap();
        assert!(guard_open < throw && throw < guard_close);
        assert_eq!(html.matches("catch (__livepadError)").count(), 1);
    }

    #[test]
    fn test_document_without_scripts_gets_shim_only() {
        let html = build(&[("index.html", "<html><head></head><body></body></html>")]);
        assert!(!html.contains(GUARD_CLOSE));
        assert_eq!(html.matches("<script>").count(), 1);
    }

    #[test]
    fn test_instrument_is_deterministic() {
        let files = [("index.html", "<head></head><body></body>"), ("a.js", "a();")];
        assert_eq!(build(&files), build(&files));
    }
}
