//! livepad - live preview engine for HTML/CSS/JS workspaces.

mod actor;
mod assemble;
mod cli;
mod config;
mod core;
mod embed;
mod engine;
mod host;
mod instrument;
mod logger;
mod relay;
mod scheduler;
mod source;
mod utils;

use anyhow::Result;
use clap::{ColorChoice, Parser};
use cli::{Cli, Commands};
use config::PreviewConfig;

fn main() -> Result<()> {
    // Setup global Ctrl+C handler (before any blocking operations)
    core::setup_shutdown_handler()?;

    let cli = Cli::parse();

    // Set global color override based on CLI option
    match cli.color {
        ColorChoice::Always => owo_colors::set_override(true),
        ColorChoice::Never => owo_colors::set_override(false),
        ColorChoice::Auto => {} // owo-colors auto-detects TTY
    }
    logger::set_verbose(cli.verbose);

    let config = PreviewConfig::load(&cli)?;

    match &cli.command {
        Commands::Init { .. } => cli::init::init_workspace(&config),
        Commands::Serve { .. } => cli::serve::serve(&config),
        Commands::Assemble {
            instrument, output, ..
        } => cli::assemble::assemble_workspace(&config, *instrument, output.as_deref()),
    }
}
