//! Workspace configuration: `livepad.toml`.
//!
//! # Module Structure
//!
//! ```text
//! config/
//! ├── section/       # Configuration section definitions
//! │   ├── preview    # [preview]
//! │   └── serve      # [serve]
//! ├── types/         # Utility types
//! │   ├── error      # ConfigError, ConfigDiagnostics
//! │   └── field      # FieldPath
//! └── mod.rs         # PreviewConfig (this file)
//! ```
//!
//! The file is optional: a workspace without one runs on defaults. CLI
//! flags override file values, and validation reports every problem at once.

pub mod section;
pub mod types;

pub use section::{PreviewSection, ServeConfig, http_origin};
pub use types::{ConfigDiagnostics, ConfigError, FieldPath};

use crate::cli::{Cli, Commands, ServeArgs};
use crate::log;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::{
    fs,
    path::{Path, PathBuf},
};

// ============================================================================
// root configuration
// ============================================================================

/// Root configuration structure representing livepad.toml
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PreviewConfig {
    /// Absolute path of the config file, whether or not it exists
    #[serde(skip)]
    pub config_path: PathBuf,

    /// Workspace directory
    #[serde(skip)]
    pub root: PathBuf,

    #[serde(default)]
    pub serve: ServeConfig,

    #[serde(default)]
    pub preview: PreviewSection,
}

impl PreviewConfig {
    /// Load configuration for the invoked command.
    ///
    /// The workspace is the command's `DIR` argument or the current
    /// directory; the config file is resolved against it.
    pub fn load(cli: &Cli) -> Result<Self> {
        let root = Self::resolve_root(cli.workspace_arg())?;
        let config_path = expand(&cli.config);
        let config_path = if config_path.is_absolute() {
            config_path
        } else {
            root.join(config_path)
        };

        let mut config = if config_path.is_file() && !cli.is_init() {
            Self::from_path(&config_path)?
        } else {
            Self::default()
        };

        config.root = root;
        config.config_path = config_path;

        if let Commands::Serve { args, .. } = &cli.command {
            config.apply_serve_args(args);
        }

        if !cli.is_init() {
            config.validate()?;
        }
        Ok(config)
    }

    /// Absolute workspace directory.
    fn resolve_root(arg: Option<&PathBuf>) -> Result<PathBuf> {
        let cwd = std::env::current_dir().context("Failed to get current working directory")?;
        let root = match arg {
            Some(dir) => cwd.join(expand(dir)),
            None => cwd,
        };
        Ok(std::path::absolute(&root).unwrap_or(root))
    }

    /// Parse configuration from TOML string
    pub fn from_str(content: &str) -> Result<Self> {
        let config: Self = toml::from_str(content).map_err(ConfigError::Toml)?;
        Ok(config)
    }

    /// Load configuration from file path with unknown field detection.
    fn from_path(path: &Path) -> Result<Self> {
        let content =
            fs::read_to_string(path).map_err(|err| ConfigError::Io(path.to_path_buf(), err))?;

        let (config, ignored) = Self::parse_with_ignored(&content)
            .with_context(|| format!("in {}", path.display()))?;

        if !ignored.is_empty() {
            Self::print_unknown_fields_warning(&ignored, path);
        }

        Ok(config)
    }

    /// Parse TOML content, collecting any unknown fields.
    fn parse_with_ignored(content: &str) -> Result<(Self, Vec<String>), ConfigError> {
        let mut ignored = Vec::new();
        let deserializer = toml::Deserializer::new(content);
        let config = serde_ignored::deserialize(deserializer, |path: serde_ignored::Path| {
            ignored.push(path.to_string());
        })?;
        Ok((config, ignored))
    }

    fn print_unknown_fields_warning(fields: &[String], path: &Path) {
        let display_path = path
            .file_name()
            .map(|n| n.to_string_lossy())
            .unwrap_or_else(|| path.to_string_lossy());
        log!("warning"; "unknown fields in {} (ignored): {}", display_path, fields.join(", "));
    }

    pub fn get_root(&self) -> &Path {
        &self.root
    }

    // ========================================================================
    // cli configuration updates
    // ========================================================================

    fn apply_serve_args(&mut self, args: &ServeArgs) {
        Self::update_option(&mut self.serve.interface, args.interface.as_ref());
        Self::update_option(&mut self.serve.port, args.port.as_ref());
        Self::update_option(&mut self.serve.guest_port, args.guest_port.as_ref());
        Self::update_option(&mut self.serve.ws_port, args.ws_port.as_ref());
        Self::update_option(&mut self.serve.watch, args.watch.as_ref());
        Self::update_option(&mut self.preview.entry, args.entry.as_ref());
        Self::update_option(&mut self.preview.debounce_ms, args.debounce.as_ref());
    }

    /// Update config option if CLI value is provided.
    fn update_option<T: Clone>(config_option: &mut T, cli_option: Option<&T>) {
        if let Some(option) = cli_option {
            *config_option = option.clone();
        }
    }

    // ========================================================================
    // validation
    // ========================================================================

    /// Validate all sections, collecting every error before failing.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let mut diag = ConfigDiagnostics::new();

        self.serve.validate(&mut diag);
        self.preview.validate(&mut diag);

        diag.print_warnings();
        diag.into_result().map_err(ConfigError::Diagnostics)
    }
}

/// Expand a leading `~` in a user-supplied path.
fn expand(path: &Path) -> PathBuf {
    let raw = path.to_string_lossy();
    PathBuf::from(shellexpand::tilde(&raw).into_owned())
}

// ============================================================================
// Test Helpers (available to all modules via `use crate::config::test_*`)
// ============================================================================

/// Parse config, panicking on unknown fields (to catch typos in tests).
#[cfg(test)]
pub fn test_parse_config(content: &str) -> PreviewConfig {
    let (parsed, ignored) = PreviewConfig::parse_with_ignored(content).unwrap();
    assert!(
        ignored.is_empty(),
        "test config has unknown fields: {:?}",
        ignored
    );
    parsed
}

// ============================================================================
// tests
// ============================================================================
