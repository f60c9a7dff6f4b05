//! `livepad assemble`: one-shot assembly of a workspace.

use std::fs;
use std::io::Write;
use std::path::Path;

use anyhow::{Context, Result};

use crate::assemble::assemble;
use crate::config::PreviewConfig;
use crate::embed::guest::ShimVars;
use crate::instrument::instrument;
use crate::log;
use crate::source::{SourceRegistry, scan_workspace};

/// Handle id baked into documents assembled outside a serve session.
const OFFLINE_HANDLE: &str = "preview";

/// Assemble the workspace and write the document to `output` or stdout.
pub fn assemble_workspace(
    config: &PreviewConfig,
    instrumented: bool,
    output: Option<&Path>,
) -> Result<()> {
    let document = render(config, instrumented)?;

    match output {
        Some(path) => {
            fs::write(path, &document)
                .with_context(|| format!("Failed to write {}", path.display()))?;
            log!("assemble"; "{} ({} bytes)", path.display(), document.len());
        }
        None => {
            let mut stdout = std::io::stdout().lock();
            stdout.write_all(document.as_bytes())?;
            stdout.flush()?;
        }
    }
    Ok(())
}

fn render(config: &PreviewConfig, instrumented: bool) -> Result<String> {
    let root = config.get_root();
    let mut registry = SourceRegistry::new(config.preview.entry.clone());
    scan_workspace(root, &mut registry)
        .with_context(|| format!("Failed to scan {}", root.display()))?;

    let document = assemble(&registry.snapshot());
    if !instrumented {
        return Ok(document.into_string());
    }

    let shim = ShimVars {
        handle: OFFLINE_HANDLE.to_string(),
        ws_url: format!(
            "ws://{}:{}/",
            config.serve.host_name, config.serve.ws_port
        ),
    };
    Ok(instrument(&document, &shim))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn workspace() -> (TempDir, PreviewConfig) {
        let temp = TempDir::new().unwrap();
        fs::write(
            temp.path().join("index.html"),
            "<html><head></head><body><p>hi</p></body></html>",
        )
        .unwrap();
        fs::write(temp.path().join("app.js"), "console.log(1);").unwrap();

        let config = PreviewConfig {
            root: temp.path().to_path_buf(),
            ..Default::default()
        };
        (temp, config)
    }

    #[test]
    fn test_render_plain() {
        let (_temp, config) = workspace();
        let text = render(&config, false).unwrap();
        assert!(text.contains("console.log(1);"));
        assert!(!text.contains("__livepad"));
    }

    #[test]
    fn test_render_instrumented_uses_offline_handle() {
        let (_temp, config) = workspace();
        let text = render(&config, true).unwrap();
        assert!(text.contains(r#""preview""#));
        assert!(text.contains("try {"));
        assert!(text.find("__livepad").unwrap() < text.find("console.log(1);").unwrap());
    }

    #[test]
    fn test_writes_output_file() {
        let (temp, config) = workspace();
        let out = temp.path().join("out.html");
        assemble_workspace(&config, false, Some(&out)).unwrap();
        assert!(fs::read_to_string(out).unwrap().contains("<p>hi</p>"));
    }
}
