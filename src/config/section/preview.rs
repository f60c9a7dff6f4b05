//! `[preview]` section configuration.
//!
//! # Example
//!
//! ```toml
//! [preview]
//! entry = "index.html"          # Markup file the document is built from
//! debounce_ms = 300             # Quiet period before an edit triggers a run
//! max_document_bytes = 4194304  # Runs producing larger documents fail
//! ```

use std::ops::RangeInclusive;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::config::{ConfigDiagnostics, FieldPath};
use crate::source::{DEFAULT_ENTRY, SourceKind, normalize_name};

/// Accepted debounce window, in milliseconds.
const DEBOUNCE_RANGE: RangeInclusive<u64> = 10..=10_000;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PreviewSection {
    pub entry: String,
    pub debounce_ms: u64,
    pub max_document_bytes: usize,
}

impl PreviewSection {
    pub const ENTRY: FieldPath = FieldPath::new("preview.entry");
    pub const DEBOUNCE_MS: FieldPath = FieldPath::new("preview.debounce_ms");
    pub const MAX_DOCUMENT_BYTES: FieldPath = FieldPath::new("preview.max_document_bytes");

    pub fn debounce(&self) -> Duration {
        Duration::from_millis(self.debounce_ms)
    }

    pub fn validate(&self, diag: &mut ConfigDiagnostics) {
        match normalize_name(&self.entry) {
            Ok(name) if SourceKind::from_name(&name) == Some(SourceKind::Markup) => {}
            _ => diag.error_with_hint(
                Self::ENTRY,
                format!("`{}` is not a markup file", self.entry),
                "use a workspace-relative .html file",
            ),
        }

        if !DEBOUNCE_RANGE.contains(&self.debounce_ms) {
            diag.error(
                Self::DEBOUNCE_MS,
                format!(
                    "{} ms is outside {}..={} ms",
                    self.debounce_ms,
                    DEBOUNCE_RANGE.start(),
                    DEBOUNCE_RANGE.end()
                ),
            );
        }

        if self.max_document_bytes == 0 {
            diag.error(Self::MAX_DOCUMENT_BYTES, "must be greater than zero");
        }
    }
}

impl Default for PreviewSection {
    fn default() -> Self {
        Self {
            entry: DEFAULT_ENTRY.to_string(),
            debounce_ms: 300,
            max_document_bytes: 4 * 1024 * 1024,
        }
    }
}
