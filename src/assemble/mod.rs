//! Content Assembler.
//!
//! Composes one self-contained document from a registry [`Snapshot`]:
//!
//! ```text
//! entry markup (or placeholder)
//!   + style sources  -> first <style> block | new block in <head> | prepended
//!   + script sources -> one <script> block before </body> | appended
//! ```
//!
//! Assembly is a pure function of the snapshot. Sources are concatenated in
//! name order, and only the first eligible insertion point of each step is
//! used, so the same snapshot always yields byte-identical output.

pub(crate) mod markers;

use std::ops::Range;

use crate::embed::guest::PLACEHOLDER_HTML;
use crate::source::{Snapshot, SourceKind};

/// Opening tag of the injected guest script block.
pub const SCRIPT_BLOCK_OPEN: &str = "<script>\n";
/// Closing tag of the injected guest script block.
pub const SCRIPT_BLOCK_CLOSE: &str = "</script>\n";

/// The document for one execution cycle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AssembledDocument {
    text: String,
    /// Byte range of the concatenated script payload inside `text`.
    script: Option<Range<usize>>,
}

impl AssembledDocument {
    pub fn as_str(&self) -> &str {
        &self.text
    }

    pub fn into_string(self) -> String {
        self.text
    }

    /// Range of the concatenated guest script payload.
    pub fn script_range(&self) -> Option<Range<usize>> {
        self.script.clone()
    }
}

/// Assemble the executable document from a snapshot.
pub fn assemble(snapshot: &Snapshot) -> AssembledDocument {
    let mut text = match snapshot.entry_markup() {
        Some(markup) => markup.content.clone(),
        None => PLACEHOLDER_HTML.to_string(),
    };

    // Located before style goes in, so nothing in the css can move it.
    let mut body_close = markers::body_close(&text);

    if let Some(css) = concat_sources(snapshot, SourceKind::Style) {
        let inserted = inject_style(&mut text, &markers::escape_style_end(&css));
        if let Some(pos) = body_close.as_mut()
            && inserted.start <= *pos
        {
            *pos += inserted.len();
        }
    }

    let script = concat_sources(snapshot, SourceKind::Script).map(|js| {
        let pos = body_close.unwrap_or(text.len());
        inject_script(&mut text, pos, &markers::escape_script_end(&js))
    });

    AssembledDocument { text, script }
}

/// Concatenate all sources of one kind, each under a name header.
fn concat_sources(snapshot: &Snapshot, kind: SourceKind) -> Option<String> {
    let mut out = String::new();
    for file in snapshot.of_kind(kind) {
        out.push_str("/* ");
        out.push_str(&file.name.replace("*/", "* /"));
        out.push_str(" */\n");
        out.push_str(&file.content);
        if !file.content.ends_with('\n') {
            out.push('\n');
        }
    }
    (!out.is_empty()).then_some(out)
}

/// Insert style text: existing block, then head section, then document start.
///
/// Returns the byte range of the inserted text.
fn inject_style(text: &mut String, css: &str) -> Range<usize> {
    let (pos, insert) = match markers::first_style_block(text) {
        Some(block) => {
            let mut insert = String::with_capacity(css.len() + 1);
            if !text[..block.end].ends_with('\n') {
                insert.push('\n');
            }
            insert.push_str(css);
            (block.end, insert)
        }
        None => {
            let pos = markers::head_close(text)
                .or_else(|| markers::head_open_end(text))
                .unwrap_or(0);
            (pos, format!("<style>\n{css}</style>\n"))
        }
    };
    text.insert_str(pos, &insert);
    pos..pos + insert.len()
}

/// Insert the script block at `pos`, the body close or the end of the text.
///
/// Returns the byte range of the payload within the final text.
fn inject_script(text: &mut String, pos: usize, js: &str) -> Range<usize> {
    let block = format!("{SCRIPT_BLOCK_OPEN}{js}{SCRIPT_BLOCK_CLOSE}");
    text.insert_str(pos, &block);

    let start = pos + SCRIPT_BLOCK_OPEN.len();
    start..start + js.len()
}
