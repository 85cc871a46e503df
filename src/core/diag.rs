//! Diagnostics sink
//!
//! The transaction engine and cache manager report progress and recovered
//! failures through an explicit sink supplied at construction time; there
//! is no process-global logger. The default sink discards everything, and
//! the CLI installs a stderr sink wired to --verbose/--quiet/--no-color.
//! Diagnostics never change behavior.

use colored::Colorize;

/// Destination for diagnostic messages.
///
/// `info` carries progress chatter, `warn` carries recovered failures
/// (failed rollback actions, skipped evictions). Implementations must not
/// panic; callers treat emission as infallible.
pub trait DiagSink: Send + Sync {
    fn info(&self, scope: &str, message: &str);
    fn warn(&self, scope: &str, message: &str);
}

/// Sink that discards all diagnostics. The library default.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullSink;

impl DiagSink for NullSink {
    fn info(&self, _scope: &str, _message: &str) {}
    fn warn(&self, _scope: &str, _message: &str) {}
}

/// Sink that writes to stderr, honoring verbosity and color switches.
///
/// `info` messages appear only in verbose mode; `warn` messages appear
/// unless quiet mode is on.
#[derive(Debug, Clone, Copy)]
pub struct StderrSink {
    verbose: bool,
    quiet: bool,
    color: bool,
}

impl StderrSink {
    pub fn new(verbose: bool, quiet: bool, color: bool) -> Self {
        Self {
            verbose,
            quiet,
            color,
        }
    }
}

impl DiagSink for StderrSink {
    fn info(&self, scope: &str, message: &str) {
        if self.verbose && !self.quiet {
            eprintln!("[{}] {}", scope, message);
        }
    }

    fn warn(&self, scope: &str, message: &str) {
        if self.quiet {
            return;
        }
        if self.color {
            eprintln!("[{}] {}", scope, format!("warning: {}", message).yellow());
        } else {
            eprintln!("[{}] warning: {}", scope, message);
        }
    }
}
