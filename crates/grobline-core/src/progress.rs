//! Progress reporting for TTY and non-TTY environments.
//!
//! TTY mode: one indicatif bar per pipeline pass.
//! Non-TTY mode: log-based output (no progress bars).

use std::io::IsTerminal;
use std::sync::Arc;
use std::time::Duration;

use indicatif::{MultiProgress, ProgressBar, ProgressStyle};

/// Per-pass row counter (green bar, rows done / total)
fn pass_style() -> ProgressStyle {
    ProgressStyle::default_bar()
        .template("{prefix:<12.cyan.bold} {bar:30.green/dim} {pos:>5}/{len:5} {eta:>4} {wide_msg:.dim}")
        .expect("invalid template")
        .progress_chars("--")
}

/// Central progress context managing multi-progress bars.
pub struct ProgressContext {
    multi: MultiProgress,
    is_tty: bool,
}

impl ProgressContext {
    /// Create new context, detecting TTY automatically.
    pub fn new() -> Self {
        Self::with_tty(std::io::stderr().is_terminal())
    }

    /// Context that never draws bars (tests, piped output).
    pub fn hidden() -> Self {
        Self::with_tty(false)
    }

    fn with_tty(is_tty: bool) -> Self {
        Self {
            multi: MultiProgress::new(),
            is_tty,
        }
    }

    /// Create a bar counting rows through one pass.
    ///
    /// TTY: visible bar with `total` steps.
    /// Non-TTY: hidden (no-op).
    ///
    /// Update the current row with `pb.set_message(...)`, advance with
    /// `pb.inc(1)`, and call `pb.finish()` once the pass is over.
    pub fn pass_bar(&self, name: &str, total: usize) -> ProgressBar {
        if !self.is_tty {
            return ProgressBar::hidden();
        }
        let pb = self.multi.add(ProgressBar::new(total as u64));
        pb.set_style(pass_style());
        pb.set_prefix(name.to_string());
        pb.enable_steady_tick(Duration::from_millis(120));
        pb
    }

    /// Print a line above managed progress bars, whatever the log level.
    ///
    /// Off a TTY this is a plain `eprintln!`.
    pub fn println(&self, msg: impl AsRef<str>) {
        if self.is_tty {
            let _ = self.multi.println(msg);
        } else {
            eprintln!("{}", msg.as_ref());
        }
    }

    /// Whether running in TTY mode.
    pub fn is_tty(&self) -> bool {
        self.is_tty
    }

    /// Get reference to `MultiProgress` for log bridge.
    pub fn multi(&self) -> &MultiProgress {
        &self.multi
    }
}

impl Default for ProgressContext {
    fn default() -> Self {
        Self::new()
    }
}

/// Thread-safe wrapper for `ProgressContext`.
pub type SharedProgress = Arc<ProgressContext>;

/// Format number with thousand separators.
pub fn fmt_num(n: usize) -> String {
    let s = n.to_string();
    let mut result = String::with_capacity(s.len() + s.len() / 3);
    for (i, c) in s.chars().rev().enumerate() {
        if i > 0 && i % 3 == 0 {
            result.push(',');
        }
        result.push(c);
    }
    result.chars().rev().collect()
}
