//! Command-line interface definitions.

use clap::{ColorChoice, Parser, Subcommand};
use std::net::IpAddr;
use std::path::PathBuf;

/// Live preview server for HTML/CSS/JS workspaces
#[derive(Parser, Debug, Clone)]
#[command(version, about, long_about = None, arg_required_else_help = true, disable_version_flag = true)]
pub struct Cli {
    /// Print version
    #[arg(long, action = clap::ArgAction::Version)]
    version: Option<bool>,

    /// Control colored output (auto, always, never)
    #[arg(long, global = true, default_value = "auto")]
    pub color: ColorChoice,

    /// Config file path, relative to the workspace (default: livepad.toml)
    #[arg(short = 'C', long, global = true, default_value = "livepad.toml", value_hint = clap::ValueHint::FilePath)]
    pub config: PathBuf,

    /// Enable verbose output for debugging
    #[arg(short = 'V', long, global = true)]
    pub verbose: bool,

    /// subcommands
    #[command(subcommand)]
    pub command: Commands,
}

/// Available subcommands
#[derive(Subcommand, Debug, Clone)]
pub enum Commands {
    /// Write a starter workspace
    #[command(visible_alias = "i")]
    Init {
        /// Workspace directory (default: current directory)
        #[arg(value_hint = clap::ValueHint::DirPath)]
        dir: Option<PathBuf>,
    },

    /// Start the live preview server
    #[command(visible_alias = "s")]
    Serve {
        /// Workspace directory (default: current directory)
        #[arg(value_hint = clap::ValueHint::DirPath)]
        dir: Option<PathBuf>,

        #[command(flatten)]
        args: ServeArgs,
    },

    /// Assemble the workspace into one document
    #[command(visible_alias = "a")]
    Assemble {
        /// Workspace directory (default: current directory)
        #[arg(value_hint = clap::ValueHint::DirPath)]
        dir: Option<PathBuf>,

        /// Include the diagnostics shim and guarded script block
        #[arg(short, long)]
        instrument: bool,

        /// Write to a file instead of stdout
        #[arg(short, long, value_hint = clap::ValueHint::FilePath)]
        output: Option<PathBuf>,
    },
}

/// `serve` overrides for `[serve]` and `[preview]` config values.
#[derive(clap::Args, Debug, Clone, Default)]
pub struct ServeArgs {
    /// Network interface to bind (e.g., 127.0.0.1, 0.0.0.0)
    #[arg(short, long)]
    pub interface: Option<IpAddr>,

    /// Host-origin port
    #[arg(short, long)]
    pub port: Option<u16>,

    /// Guest-origin port
    #[arg(short, long)]
    pub guest_port: Option<u16>,

    /// WebSocket port
    #[arg(long)]
    pub ws_port: Option<u16>,

    /// Watch the workspace directory for changes
    #[arg(short, long, action = clap::ArgAction::Set, num_args = 0..=1, default_missing_value = "true", require_equals = false)]
    pub watch: Option<bool>,

    /// Entry-point markup file
    #[arg(short, long)]
    pub entry: Option<String>,

    /// Debounce window in milliseconds
    #[arg(short, long)]
    pub debounce: Option<u64>,
}

impl Cli {
    /// Workspace directory named on the command line, if any.
    pub fn workspace_arg(&self) -> Option<&PathBuf> {
        match &self.command {
            Commands::Init { dir } | Commands::Serve { dir, .. } | Commands::Assemble { dir, .. } => {
                dir.as_ref()
            }
        }
    }

    pub const fn is_init(&self) -> bool {
        matches!(self.command, Commands::Init { .. })
    }
}
