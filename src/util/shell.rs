//! Centralized shell output and progress management.
//!
//! All human-facing output goes to stderr so that stdout carries only the
//! command result (a table, or a JSON document in JSON mode).
//!
//! - Status messages with consistent formatting
//! - Download progress bars (via indicatif)
//! - Scoped timing spans
//!
//! Quiet and JSON mode suppress every human message; fatal errors are
//! reported separately through [`crate::util::diagnostic`].

use std::fmt::Display;
use std::io::{self, IsTerminal};
use std::sync::Arc;
use std::time::{Duration, Instant};

use indicatif::{ProgressBar, ProgressStyle};

/// Shell output mode - Human and Json are mutually exclusive.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ShellMode {
    /// Human-readable output with optional colors and progress bars.
    Human {
        verbosity: Verbosity,
        color: ColorChoice,
    },
    /// Results are printed as JSON; status output is silenced.
    Json,
}

impl Default for ShellMode {
    fn default() -> Self {
        ShellMode::Human {
            verbosity: Verbosity::Normal,
            color: ColorChoice::Auto,
        }
    }
}

/// Output verbosity level (Human mode only).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Verbosity {
    /// --quiet: errors only, no progress
    Quiet,
    /// Default: status messages + progress bars
    #[default]
    Normal,
    /// --verbose: immediate status lines, no progress bars
    Verbose,
}

/// Color output mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ColorChoice {
    /// Detect TTY and use colors if available.
    #[default]
    Auto,
    /// Always use ANSI colors.
    Always,
    /// Never use ANSI colors.
    Never,
}

impl std::str::FromStr for ColorChoice {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "auto" => Ok(ColorChoice::Auto),
            "always" => Ok(ColorChoice::Always),
            "never" => Ok(ColorChoice::Never),
            _ => Err(format!(
                "invalid color choice '{}'; expected 'auto', 'always', or 'never'",
                s
            )),
        }
    }
}

impl ColorChoice {
    /// Resolve the choice against the stderr terminal.
    pub fn enabled(self) -> bool {
        match self {
            ColorChoice::Auto => io::stderr().is_terminal(),
            ColorChoice::Always => true,
            ColorChoice::Never => false,
        }
    }
}

/// Status types for output messages.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Status {
    // Success statuses (green)
    Installed,

    // In-progress statuses (cyan)
    Downloading,
    Installing,

    // Warning statuses (yellow)
    Warning,
}

impl Status {
    fn as_str(&self) -> &'static str {
        match self {
            Status::Installed => "Installed",
            Status::Downloading => "Downloading",
            Status::Installing => "Installing",
            Status::Warning => "Warning",
        }
    }

    fn color_code(&self) -> &'static str {
        match self {
            Status::Installed => "\x1b[1;32m",
            Status::Downloading | Status::Installing => "\x1b[1;36m",
            Status::Warning => "\x1b[1;33m",
        }
    }
}

/// Width the status word is right-aligned to.
const STATUS_WIDTH: usize = 12;

/// Central shell for all CLI output.
#[derive(Debug)]
pub struct Shell {
    mode: ShellMode,
    use_color: bool,
}

impl Shell {
    /// Create a new shell with the given mode.
    pub fn new(mode: ShellMode) -> Self {
        let use_color = match &mode {
            ShellMode::Json => false,
            ShellMode::Human { color, .. } => color.enabled(),
        };

        Shell { mode, use_color }
    }

    /// Create a shell from CLI flags with proper precedence.
    ///
    /// JSON mode takes precedence over quiet/verbose.
    pub fn from_flags(quiet: bool, verbose: bool, color: ColorChoice, json: bool) -> Self {
        let mode = if json {
            ShellMode::Json
        } else {
            let verbosity = if quiet {
                Verbosity::Quiet
            } else if verbose {
                Verbosity::Verbose
            } else {
                Verbosity::Normal
            };
            ShellMode::Human { verbosity, color }
        };

        Shell::new(mode)
    }

    /// Get the current shell mode.
    pub fn mode(&self) -> &ShellMode {
        &self.mode
    }

    /// Check if shell is in quiet mode.
    pub fn is_quiet(&self) -> bool {
        matches!(
            self.mode,
            ShellMode::Human {
                verbosity: Verbosity::Quiet,
                ..
            }
        )
    }

    /// Check if shell is in verbose mode.
    pub fn is_verbose(&self) -> bool {
        matches!(
            self.mode,
            ShellMode::Human {
                verbosity: Verbosity::Verbose,
                ..
            }
        )
    }

    /// Check if shell is in JSON mode.
    pub fn is_json(&self) -> bool {
        matches!(self.mode, ShellMode::Json)
    }

    /// Check if colors are enabled.
    pub fn use_color(&self) -> bool {
        self.use_color
    }

    /// Print a status message to stderr.
    ///
    /// Format: `{status:>12} {message}`. Silent in quiet and JSON mode.
    pub fn status(&self, status: Status, msg: impl Display) {
        if self.is_quiet() || self.is_json() {
            return;
        }

        eprintln!("{} {}", self.format_status(status), msg);
    }

    fn format_status(&self, status: Status) -> String {
        let text = status.as_str();

        if self.use_color {
            format!(
                "{}{:>width$}\x1b[0m",
                status.color_code(),
                text,
                width = STATUS_WIDTH
            )
        } else {
            format!("{:>width$}", text, width = STATUS_WIDTH)
        }
    }

    /// Create a scoped span for timing operations.
    ///
    /// The start message is only printed if the operation takes longer than
    /// a short delay (or immediately in verbose mode).
    pub fn span(self: &Arc<Self>, status: Status, msg: impl Display) -> Span {
        Span::new(Arc::clone(self), status, msg.to_string())
    }

    /// Create a byte-based progress bar for downloads.
    ///
    /// A `total_bytes` of zero means the size is unknown and a spinner is shown.
    pub fn bytes_progress(self: &Arc<Self>, msg: impl Display, total_bytes: u64) -> Progress {
        Progress::new(self, total_bytes, msg.to_string())
    }
}

impl Default for Shell {
    fn default() -> Self {
        Shell::new(ShellMode::default())
    }
}

/// A scoped timing span. The start line is only printed in verbose mode.
pub struct Span {
    shell: Arc<Shell>,
    message: String,
    start: Instant,
    start_printed: bool,
    finished: bool,
}

impl Span {
    fn new(shell: Arc<Shell>, status: Status, message: String) -> Self {
        let start_printed = shell.is_verbose();
        if start_printed {
            shell.status(status, &message);
        }

        Span {
            shell,
            message,
            start: Instant::now(),
            start_printed,
            finished: false,
        }
    }

    /// Finish the span, printing `msg` with the elapsed time.
    pub fn finish_with_message(mut self, status: Status, msg: impl Display) {
        self.finished = true;
        let elapsed = format_duration(self.start.elapsed());
        self.shell.status(status, format!("{} in {}", msg, elapsed));
    }
}

impl Drop for Span {
    fn drop(&mut self) {
        if self.finished {
            return;
        }

        // Abandoned spans (error paths) only report if the start was shown.
        if self.start_printed {
            let elapsed = format_duration(self.start.elapsed());
            self.shell
                .status(Status::Warning, format!("{} aborted after {}", self.message, elapsed));
        }
    }
}

/// Download progress bar that respects the shell mode.
pub struct Progress {
    pb: Option<ProgressBar>,
    current: u64,
}

impl Progress {
    fn new(shell: &Shell, total: u64, message: String) -> Self {
        let pb = if shell.is_quiet() || shell.is_verbose() || shell.is_json() {
            None
        } else if total > 0 {
            let pb = ProgressBar::new(total);
            if let Ok(style) = ProgressStyle::default_bar()
                .template("{spinner:.green} {msg} [{bar:40.cyan/blue}] {bytes}/{total_bytes}")
            {
                pb.set_style(style.progress_chars("#>-"));
            }
            pb.set_message(message);
            Some(pb)
        } else {
            let pb = ProgressBar::new_spinner();
            if let Ok(style) = ProgressStyle::default_spinner().template("{spinner:.green} {msg} {bytes}")
            {
                pb.set_style(style);
            }
            pb.set_message(message);
            Some(pb)
        };

        Progress { pb, current: 0 }
    }

    /// Advance by `delta` bytes.
    pub fn inc(&mut self, delta: u64) {
        self.current += delta;
        if let Some(pb) = &self.pb {
            pb.inc(delta);
        }
    }

    /// Finish and remove the bar.
    pub fn finish(&self) {
        if let Some(pb) = &self.pb {
            pb.finish_and_clear();
        }
    }

    /// Bytes seen so far.
    pub fn position(&self) -> u64 {
        self.current
    }
}

/// Format a duration in a human-readable way.
fn format_duration(duration: Duration) -> String {
    let secs = duration.as_secs_f64();
    if secs < 60.0 {
        format!("{:.2}s", secs)
    } else {
        format!("{:.1}m", secs / 60.0)
    }
}
