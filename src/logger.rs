//! Logging utilities with colored output and run status display.
//!
//! This module provides:
//! - `log!` macro for formatted terminal output with colored prefixes
//! - `debug!` macro, only printed with `--verbose`
//! - `RunStatus` for the single-block "latest run" status line
//!
//! # Example
//!
//! ```ignore
//! log!("serve"; "http://{}", addr);
//! debug!("relay"; "dropped stale message from {}", handle);
//! status_loaded("run 3 loaded", 0, 1);
//! ```

use crossterm::{
    cursor, execute,
    terminal::{Clear, ClearType},
};
use owo_colors::OwoColorize;
use parking_lot::Mutex;
use std::{
    io::{Write, stdout},
    sync::LazyLock,
    sync::atomic::{AtomicBool, Ordering},
};

/// Global verbose flag (set by --verbose CLI argument)
static VERBOSE: AtomicBool = AtomicBool::new(false);

/// Set verbose mode globally
pub fn set_verbose(v: bool) {
    VERBOSE.store(v, Ordering::SeqCst);
}

/// Check if verbose mode is enabled
pub fn is_verbose() -> bool {
    VERBOSE.load(Ordering::SeqCst)
}

// ============================================================================
// Log Macro
// ============================================================================

/// Log a message with a colored module prefix
///
/// # Usage
/// ```ignore
/// log!("module"; "message with {} formatting", args);
/// ```
#[macro_export]
macro_rules! log {
    ($module:expr; $($arg:tt)*) => {{
        $crate::logger::log($module, &format!($($arg)*))
    }};
}

/// Log a debug message (only shown when --verbose is enabled)
///
/// # Usage
/// ```ignore
/// debug!("module"; "debug info: {}", value);
/// ```
#[macro_export]
macro_rules! debug {
    ($module:expr; $($arg:tt)*) => {{
        if $crate::logger::is_verbose() {
            $crate::logger::log($module, &format!($($arg)*))
        }
    }};
}

// ============================================================================
// Helper Functions
// ============================================================================

/// Log a message with a colored module prefix
#[inline]
pub fn log(module: &str, message: &str) {
    let module_lower = module.to_ascii_lowercase();
    let prefix = colorize_prefix(module, &module_lower);

    let mut stdout = stdout().lock();
    execute!(stdout, Clear(ClearType::UntilNewLine)).ok();
    writeln!(stdout, "{prefix} {message}").ok();
    stdout.flush().ok();

    // A plain log line breaks the status block; the next status starts fresh.
    RUN_STATUS.lock().detach();
}

/// Apply color to a module prefix based on module type
#[inline]
fn colorize_prefix(module: &str, module_lower: &str) -> String {
    let prefix = format!("[{module}]");
    match module_lower {
        "serve" => prefix.bright_blue().bold().to_string(),
        "watch" => prefix.bright_green().bold().to_string(),
        "error" | "console.error" => prefix.bright_red().bold().to_string(),
        "console.warn" | "warning" => prefix.yellow().bold().to_string(),
        "console.log" | "console.info" => prefix.bright_cyan().to_string(),
        _ => prefix.bright_yellow().bold().to_string(),
    }
}

// ============================================================================
// Run Status (single-block status with overwrite)
// ============================================================================

/// Get current time formatted as HH:MM:SS (UTC)
fn now() -> String {
    use std::time::SystemTime;
    let secs = SystemTime::now()
        .duration_since(SystemTime::UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0);
    let hours = (secs / 3600) % 24;
    let minutes = (secs / 60) % 60;
    let seconds = secs % 60;
    format!("{hours:02}:{minutes:02}:{seconds:02}")
}

/// Format the `(N errors, M warnings)` suffix.
fn counts_suffix(errors: usize, warnings: usize) -> String {
    let errors = match errors {
        1 => "1 error".to_string(),
        n => format!("{n} errors"),
    };
    let warnings = match warnings {
        1 => "1 warning".to_string(),
        n => format!("{n} warnings"),
    };
    format!("({errors}, {warnings})")
}

/// Single-block status display for the latest preview run.
///
/// Each new status overwrites the previous one, so the terminal shows
/// one line per run rather than a growing log. Any `log!` output in
/// between detaches the block and the next status is printed below it.
pub struct RunStatus {
    /// Lines of previous output to clear
    last_lines: usize,
}

static RUN_STATUS: LazyLock<Mutex<RunStatus>> = LazyLock::new(|| Mutex::new(RunStatus::new()));

impl RunStatus {
    pub const fn new() -> Self {
        Self { last_lines: 0 }
    }

    /// Display success message (✓ prefix, green).
    pub fn success(&mut self, message: &str) {
        self.display(format!("{}", "✓".green()), message);
    }

    /// Display error message (✗ prefix, red) with optional detail.
    pub fn error(&mut self, summary: &str, detail: &str) {
        let message = if detail.is_empty() {
            summary.to_string()
        } else {
            format!("{summary}\n{detail}")
        };
        self.display(format!("{}", "✗".red()), &message);
    }

    /// Display warning message (⚠ prefix, yellow).
    pub fn warning(&mut self, message: &str) {
        self.display(format!("{}", "⚠".yellow()), message);
    }

    /// Forget the previous block without clearing it.
    fn detach(&mut self) {
        self.last_lines = 0;
    }

    fn display(&mut self, symbol: String, message: &str) {
        let mut stdout = stdout().lock();

        if self.last_lines > 0 {
            #[allow(clippy::cast_possible_truncation)]
            let lines = self.last_lines as u16;
            execute!(stdout, cursor::MoveUp(lines)).ok();
            execute!(stdout, Clear(ClearType::FromCursorDown)).ok();
        }

        let timestamp = format!("[{}]", now()).dimmed().to_string();
        writeln!(stdout, "{timestamp} {symbol} {message}").ok();
        stdout.flush().ok();

        self.last_lines = line_count(message);
    }
}

/// Number of terminal lines a status message occupies.
fn line_count(message: &str) -> usize {
    message.matches('\n').count() + 1
}

/// Global run status: the run finished loading.
pub fn status_loaded(summary: &str, errors: usize, warnings: usize) {
    let message = format!("{summary} {}", counts_suffix(errors, warnings).dimmed());
    let mut status = RUN_STATUS.lock();
    if errors > 0 {
        status.error(&message, "");
    } else if warnings > 0 {
        status.warning(&message);
    } else {
        status.success(&message);
    }
}

/// Global run status: the run could not be started.
pub fn status_failed(summary: &str, detail: &str) {
    RUN_STATUS.lock().error(summary, detail);
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_run_status_new() {
        let status = RunStatus::new();
        assert_eq!(status.last_lines, 0);
    }

    #[test]
    fn test_line_count() {
        assert_eq!(line_count("run 1 loaded"), 1);
        assert_eq!(line_count("run failed\ndocument too large\n  limit: 4 MiB"), 3);
    }

    #[test]
    fn test_counts_suffix_pluralization() {
        assert_eq!(counts_suffix(0, 0), "(0 errors, 0 warnings)");
        assert_eq!(counts_suffix(1, 1), "(1 error, 1 warning)");
        assert_eq!(counts_suffix(3, 2), "(3 errors, 2 warnings)");
    }
}
