//! Workspace directory scanning.

use std::fs;
use std::path::Path;

use anyhow::Result;
use jwalk::WalkDir;

use super::{SourceKind, SourceRegistry, normalize_name};
use crate::utils::time::millis_since_epoch;

/// Directories never treated as part of the preview workspace.
const IGNORED_DIRS: &[&str] = &["node_modules", "target", "dist"];

/// Load every supported source file under `root` into the registry.
///
/// Returns the number of files loaded. Unreadable or unsupported files are
/// skipped; the walk itself failing to start is an error.
pub fn scan_workspace(root: &Path, registry: &mut SourceRegistry) -> Result<usize> {
    if !root.is_dir() {
        anyhow::bail!("workspace `{}` is not a directory", root.display());
    }

    let mut loaded = 0;
    let walker = WalkDir::new(root).sort(true).process_read_dir(|_, _, _, children| {
        children.retain(|entry| {
            entry.as_ref().map_or(true, |e| {
                !(e.file_type().is_dir()
                    && IGNORED_DIRS.contains(&e.file_name().to_str().unwrap_or_default()))
            })
        });
    });

    for entry in walker.into_iter().filter_map(Result::ok) {
        if !entry.file_type().is_file() {
            continue;
        }
        let path = entry.path();
        let Some(name) = source_name_for(root, &path) else {
            continue;
        };

        let content = match fs::read_to_string(&path) {
            Ok(content) => content,
            Err(e) => {
                crate::log!("scan"; "skipping {}: {}", path.display(), e);
                continue;
            }
        };
        registry.upsert(&name, content, modified_millis(&path))?;
        crate::debug!("scan"; "loaded {}", name);
        loaded += 1;
    }

    Ok(loaded)
}

/// Logical source name of a workspace file, if it is a supported source.
pub fn source_name_for(root: &Path, path: &Path) -> Option<String> {
    let rel = path.strip_prefix(root).ok()?;
    let name = normalize_name(rel.to_str()?).ok()?;
    SourceKind::from_name(&name)?;

    // Hidden files, editor artifacts and ignored directories never count.
    let skipped = name.split('/').any(|part| {
        part.starts_with('.') || part.ends_with('~') || IGNORED_DIRS.contains(&part)
    });
    (!skipped).then_some(name)
}

/// File modification time in milliseconds since the Unix epoch (0 if unknown).
pub fn modified_millis(path: &Path) -> u64 {
    fs::metadata(path)
        .and_then(|m| m.modified())
        .map(millis_since_epoch)
        .unwrap_or(0)
}
