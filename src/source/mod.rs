//! Source Registry.
//!
//! Holds the current content of every virtual source file of the preview
//! workspace. The registry is the only state shared between the editing
//! surface and the preview engine, and the assembler only ever sees it
//! through an immutable [`Snapshot`].
//!
//! ```text
//! editing surface --upsert/remove--> SourceRegistry --snapshot()--> assemble
//! ```

pub mod scan;

pub use scan::scan_workspace;

use std::collections::BTreeMap;
use std::fmt;
use std::path::Path;

use serde::Serialize;
use thiserror::Error;

/// Default entry-point markup file.
pub const DEFAULT_ENTRY: &str = "index.html";

/// The role a source file plays in the assembled document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceKind {
    Markup,
    Style,
    Script,
}

impl SourceKind {
    /// Classify a logical file name by its extension.
    pub fn from_name(name: &str) -> Option<Self> {
        let ext = Path::new(name).extension()?.to_str()?.to_ascii_lowercase();
        match ext.as_str() {
            "html" | "htm" => Some(Self::Markup),
            "css" => Some(Self::Style),
            "js" | "mjs" => Some(Self::Script),
            _ => None,
        }
    }

    pub const fn label(self) -> &'static str {
        match self {
            Self::Markup => "markup",
            Self::Style => "style",
            Self::Script => "script",
        }
    }
}

impl fmt::Display for SourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// One virtual source file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SourceFile {
    pub name: String,
    pub kind: SourceKind,
    #[serde(skip)]
    pub content: String,
    /// Milliseconds since the Unix epoch.
    pub last_modified: u64,
}

impl SourceFile {
    pub fn bytes(&self) -> usize {
        self.content.len()
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum SourceError {
    #[error("unsupported source file `{0}` (expected .html, .css or .js)")]
    UnsupportedKind(String),

    #[error("invalid source name `{0}`")]
    InvalidName(String),
}

/// Normalize a logical source name: forward slashes, no leading `./` or `/`.
///
/// Rejects empty names and names escaping the workspace via `..`.
pub fn normalize_name(name: &str) -> Result<String, SourceError> {
    let unified = name.replace('\\', "/");
    let parts: Vec<&str> = unified
        .split('/')
        .filter(|part| !part.is_empty() && *part != ".")
        .collect();

    if parts.is_empty() || parts.contains(&"..") {
        return Err(SourceError::InvalidName(name.to_string()));
    }
    Ok(parts.join("/"))
}

/// Current content of each source file, keyed by logical name.
#[derive(Debug, Clone)]
pub struct SourceRegistry {
    files: BTreeMap<String, SourceFile>,
    entry: String,
    /// File focused in the editing surface, if any.
    active: Option<String>,
}

impl Default for SourceRegistry {
    fn default() -> Self {
        Self::new(DEFAULT_ENTRY)
    }
}

impl SourceRegistry {
    pub fn new(entry: impl Into<String>) -> Self {
        Self {
            files: BTreeMap::new(),
            entry: entry.into(),
            active: None,
        }
    }

    /// Insert or replace a source.
    ///
    /// Returns `Ok(false)` when the content is unchanged, so callers can
    /// skip a refresh that would produce an identical document.
    pub fn upsert(
        &mut self,
        name: &str,
        content: impl Into<String>,
        last_modified: u64,
    ) -> Result<bool, SourceError> {
        let name = normalize_name(name)?;
        let kind =
            SourceKind::from_name(&name).ok_or_else(|| SourceError::UnsupportedKind(name.clone()))?;
        let content = content.into();

        if let Some(existing) = self.files.get_mut(&name) {
            if existing.content == content {
                return Ok(false);
            }
            existing.content = content;
            existing.last_modified = last_modified;
            return Ok(true);
        }

        self.files.insert(
            name.clone(),
            SourceFile {
                name,
                kind,
                content,
                last_modified,
            },
        );
        Ok(true)
    }

    /// Remove a source. Returns whether it existed.
    pub fn remove(&mut self, name: &str) -> bool {
        let Ok(name) = normalize_name(name) else {
            return false;
        };
        if self.active.as_deref() == Some(name.as_str()) {
            self.active = None;
        }
        self.files.remove(&name).is_some()
    }

    pub fn get(&self, name: &str) -> Option<&SourceFile> {
        self.files.get(normalize_name(name).ok()?.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = &SourceFile> {
        self.files.values()
    }

    pub fn len(&self) -> usize {
        self.files.len()
    }

    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }

    pub fn entry(&self) -> &str {
        &self.entry
    }

    pub fn active(&self) -> Option<&str> {
        self.active.as_deref()
    }

    /// Record the file focused in the editing surface.
    ///
    /// A markup file becomes the entry point of the next assembly.
    /// Returns whether the entry point changed.
    pub fn switch_active(&mut self, name: &str) -> Result<bool, SourceError> {
        let name = normalize_name(name)?;
        let kind =
            SourceKind::from_name(&name).ok_or_else(|| SourceError::UnsupportedKind(name.clone()))?;

        let entry_changed = kind == SourceKind::Markup && self.entry != name;
        if entry_changed {
            self.entry = name.clone();
        }
        self.active = Some(name);
        Ok(entry_changed)
    }

    /// Immutable copy of the current state for one assembly.
    pub fn snapshot(&self) -> Snapshot {
        Snapshot {
            entry: self.entry.clone(),
            files: self.files.values().cloned().collect(),
        }
    }
}

/// Name-ordered, immutable view of the registry at one point in time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Snapshot {
    entry: String,
    files: Vec<SourceFile>,
}

impl Snapshot {
    pub fn entry(&self) -> &str {
        &self.entry
    }

    /// The entry-point markup source, if present.
    pub fn entry_markup(&self) -> Option<&SourceFile> {
        self.files
            .iter()
            .find(|f| f.kind == SourceKind::Markup && f.name == self.entry)
    }

    /// Sources of one kind, in name order.
    pub fn of_kind(&self, kind: SourceKind) -> impl Iterator<Item = &SourceFile> {
        self.files.iter().filter(move |f| f.kind == kind)
    }

    pub fn files(&self) -> &[SourceFile] {
        &self.files
    }
}
