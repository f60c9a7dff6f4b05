//! Insertion-point lookup in guest markup.
//!
//! All matching is case-insensitive and always takes the first
//! occurrence. `<header>` and friends never match the `<head>` markers.

use std::ops::Range;
use std::sync::LazyLock;

use regex::Regex;

macro_rules! marker {
    ($name:ident, $pattern:expr) => {
        static $name: LazyLock<Regex> =
            LazyLock::new(|| Regex::new($pattern).expect("marker pattern is valid"));
    };
}

marker!(STYLE_OPEN, r"(?i)<style\b[^>]*>");
marker!(STYLE_CLOSE, r"(?i)</style\s*>");
marker!(HEAD_OPEN, r"(?i)<head\b[^>]*>");
marker!(HEAD_CLOSE, r"(?i)</head\s*>");
marker!(BODY_CLOSE, r"(?i)</body\s*>");
marker!(HTML_OPEN, r"(?i)<html\b[^>]*>");
marker!(DOCTYPE, r"(?i)\A\s*<!doctype\b[^>]*>");
marker!(SCRIPT_OPEN, r"(?i)<script\b");
marker!(SCRIPT_END_TAG, r"(?i)</(script)");
marker!(STYLE_END_TAG, r"(?i)</(style)");

/// First complete `<style>...</style>` block: range of its inner text.
pub fn first_style_block(html: &str) -> Option<Range<usize>> {
    let open = STYLE_OPEN.find(html)?;
    let close = STYLE_CLOSE.find_at(html, open.end())?;
    Some(open.end()..close.start())
}

/// Offset of the first `</head>`.
pub fn head_close(html: &str) -> Option<usize> {
    HEAD_CLOSE.find(html).map(|m| m.start())
}

/// Offset just past the first `<head ...>` open tag.
pub fn head_open_end(html: &str) -> Option<usize> {
    HEAD_OPEN.find(html).map(|m| m.end())
}

/// Offset of the first `</body>`.
pub fn body_close(html: &str) -> Option<usize> {
    BODY_CLOSE.find(html).map(|m| m.start())
}

/// Offset just past the first `<html ...>` open tag.
pub fn html_open_end(html: &str) -> Option<usize> {
    HTML_OPEN.find(html).map(|m| m.end())
}

/// Offset just past a leading `<!doctype ...>`.
pub fn doctype_end(html: &str) -> Option<usize> {
    DOCTYPE.find(html).map(|m| m.end())
}

/// Offset of the first `<script` tag, guest-authored or injected.
pub fn first_script(html: &str) -> Option<usize> {
    SCRIPT_OPEN.find(html).map(|m| m.start())
}

/// Neutralize `</script` inside script payload, keeping the original case.
pub fn escape_script_end(payload: &str) -> String {
    SCRIPT_END_TAG.replace_all(payload, r"<\/$1").into_owned()
}

/// Neutralize `</style` inside style payload. CSS reads `\/` as `/`.
pub fn escape_style_end(payload: &str) -> String {
    STYLE_END_TAG.replace_all(payload, r"<\/$1").into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_all_markers_compile() {
        for marker in [
            &STYLE_OPEN,
            &STYLE_CLOSE,
            &HEAD_OPEN,
            &HEAD_CLOSE,
            &BODY_CLOSE,
            &HTML_OPEN,
            &DOCTYPE,
            &SCRIPT_OPEN,
            &SCRIPT_END_TAG,
            &STYLE_END_TAG,
        ] {
            assert!(!marker.as_str().is_empty());
        }
        assert_eq!(first_script("<p></p><SCRIPT src=x>"), Some(7));
        assert_eq!(body_close("<body></Body >"), Some(6));
    }

    #[test]
    fn test_first_style_block() {
        let html = "<head><STYLE media=\"all\">a{}</Style><style>b{}</style></head>";
        let range = first_style_block(html).unwrap();
        assert_eq!(&html[range], "a{}");
    }

    #[test]
    fn test_unclosed_style_is_not_a_block() {
        assert_eq!(first_style_block("<head><style>a{}</head>"), None);
    }

    #[test]
    fn test_header_is_not_head() {
        let html = "<body><header>x</header></body>";
        assert_eq!(head_open_end(html), None);
        assert_eq!(head_close(html), None);
    }

    #[test]
    fn test_doctype_only_at_start() {
        assert_eq!(doctype_end("<!DOCTYPE html><p>"), Some(15));
        assert_eq!(doctype_end("\n  <!doctype html>"), Some(18));
        assert_eq!(doctype_end("<p><!doctype html>"), None);
    }

    #[test]
    fn test_escape_script_end() {
        assert_eq!(
            escape_script_end(r#"s = "</script>"; t = "</SCRIPT>";"#),
            r#"s = "<\/script>"; t = "<\/SCRIPT>";"#
        );
        assert_eq!(escape_script_end("a < b"), "a < b");
    }

    #[test]
    fn test_escape_style_end() {
        assert_eq!(
            escape_style_end("/* </style> */ a::after{content:\"</STYLE\"}"),
            "/* <\\/style> */ a::after{content:\"<\\/STYLE\"}"
        );
        assert_eq!(escape_style_end("/* </body> */"), "/* </body> */");
    }
}
