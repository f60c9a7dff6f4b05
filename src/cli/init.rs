//! `livepad init`: write a starter workspace.

use std::fs;
use std::path::Path;

use anyhow::{Context, Result, bail};

use crate::config::PreviewConfig;
use crate::embed::init::STARTER_FILES;
use crate::log;

/// Write the starter files into the workspace root.
///
/// Fails without touching anything if any of them already exists.
pub fn init_workspace(config: &PreviewConfig) -> Result<()> {
    let root = config.get_root();
    check_target(root)?;

    fs::create_dir_all(root)
        .with_context(|| format!("Failed to create {}", root.display()))?;

    for (name, content) in STARTER_FILES {
        let path = root.join(name);
        fs::write(&path, content).with_context(|| format!("Failed to write {}", path.display()))?;
        crate::debug!("init"; "wrote {}", name);
    }

    log!("init"; "workspace ready in {}", root.display());
    log!("init"; "run `livepad serve` to start previewing");
    Ok(())
}

fn check_target(root: &Path) -> Result<()> {
    if root.exists() && !root.is_dir() {
        bail!("{} exists and is not a directory", root.display());
    }

    let existing: Vec<&str> = STARTER_FILES
        .iter()
        .map(|(name, _)| *name)
        .filter(|name| root.join(name).exists())
        .collect();

    if !existing.is_empty() {
        bail!(
            "refusing to overwrite existing file(s) in {}: {}",
            root.display(),
            existing.join(", ")
        );
    }
    Ok(())
}
