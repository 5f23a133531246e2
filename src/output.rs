//! # Output Configuration
//!
//! This module provides utilities for controlling CLI output appearance:
//! colored status labels, emoji, aligned tables and the scan spinner.
//!
//! ## Respecting User Preferences
//!
//! The module respects the following environment variables and flags:
//! - `--color=never|always|auto` - CLI flag for color control
//! - `NO_COLOR` - Disables colors when set (per https://no-color.org/)
//! - `CLICOLOR=0` - Disables colors
//! - `CLICOLOR_FORCE=1` - Forces colors even in non-TTY
//! - `TERM=dumb` - Disables colors for dumb terminals
//!
//! ## Usage
//!
//! ```rust,ignore
//! use metarepo::output::{self, OutputConfig};
//!
//! let config = OutputConfig::from_env_and_flag("auto");
//! println!("  {} {} (no remote)", output::skip(&config), "tools");
//! ```

use std::env;
use std::io::IsTerminal;
use std::time::Duration;

use console::{measure_text_width, pad_str, style, Alignment};
use indicatif::{ProgressBar, ProgressStyle};

/// Output configuration for controlling colors and emojis.
#[derive(Debug, Clone)]
pub struct OutputConfig {
    /// Whether colors and emojis should be used in output.
    pub use_color: bool,
}

impl OutputConfig {
    /// Create an output configuration from environment and CLI flag.
    ///
    /// # Behavior
    /// - `always`: Force colors on (overrides NO_COLOR)
    /// - `never`: Force colors off
    /// - `auto`: Detect based on environment
    ///
    /// In auto mode, colors are disabled if:
    /// - `NO_COLOR` environment variable is set (any value, including empty)
    /// - `CLICOLOR=0` is set
    /// - `TERM=dumb` is set
    /// - stdout is not a TTY (unless `CLICOLOR_FORCE=1`)
    pub fn from_env_and_flag(color_flag: &str) -> Self {
        let use_color = match color_flag.to_lowercase().as_str() {
            "always" => true,
            "never" => false,
            _ => Self::detect_color_support(),
        };

        Self { use_color }
    }

    fn detect_color_support() -> bool {
        if env::var_os("NO_COLOR").is_some() {
            return false;
        }

        if env::var("CLICOLOR").is_ok_and(|v| v == "0") {
            return false;
        }

        if env::var("CLICOLOR_FORCE").is_ok_and(|v| v != "0" && !v.is_empty()) {
            return true;
        }

        if env::var("TERM").is_ok_and(|v| v == "dumb") {
            return false;
        }

        console::Term::stdout().features().colors_supported()
    }

    /// Create a configuration with colors always enabled.
    pub fn with_color() -> Self {
        Self { use_color: true }
    }

    /// Create a configuration with colors always disabled.
    pub fn without_color() -> Self {
        Self { use_color: false }
    }
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self::from_env_and_flag("auto")
    }
}

/// Returns the emoji when colors are enabled, the plain text otherwise.
pub fn emoji<'a>(config: &OutputConfig, emoji_str: &'a str, plain: &'a str) -> &'a str {
    if config.use_color {
        emoji_str
    } else {
        plain
    }
}

/// Text colors used by the labels.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Tone {
    Good,
    Bad,
    Muted,
    Info,
    Action,
}

/// Style `text` with `tone` when colors are enabled.
pub fn paint(config: &OutputConfig, text: &str, tone: Tone) -> String {
    if !config.use_color {
        return text.to_string();
    }
    let styled = style(text).force_styling(true);
    let styled = match tone {
        Tone::Good => styled.green(),
        Tone::Bad => styled.red().bold(),
        Tone::Muted => styled.yellow(),
        Tone::Info => styled.cyan(),
        Tone::Action => styled.blue().bold(),
    };
    styled.to_string()
}

pub fn skip(config: &OutputConfig) -> String {
    paint(config, "[SKIP]", Tone::Muted)
}

pub fn dry(config: &OutputConfig) -> String {
    paint(config, "[DRY]", Tone::Info)
}

/// An action label such as `[PUSH]`.
pub fn action(config: &OutputConfig, label: &str) -> String {
    paint(config, label, Tone::Action)
}

pub fn ok(config: &OutputConfig) -> String {
    paint(config, "OK", Tone::Good)
}

pub fn failed(config: &OutputConfig) -> String {
    paint(config, "FAILED", Tone::Bad)
}

/// Render rows as left-aligned columns separated by two spaces. Widths are
/// measured without color codes. Trailing whitespace is trimmed.
pub fn table(headers: &[&str], rows: &[Vec<String>]) -> String {
    let columns = headers.len();
    let mut widths: Vec<usize> = headers.iter().map(|h| measure_text_width(h)).collect();
    for row in rows {
        for (i, cell) in row.iter().enumerate().take(columns) {
            widths[i] = widths[i].max(measure_text_width(cell));
        }
    }

    let mut out = render_row(headers.iter().copied(), &widths);
    out.push('\n');
    for row in rows {
        out.push_str(&render_row(row.iter().map(String::as_str), &widths));
        out.push('\n');
    }
    out
}

fn render_row<'a>(cells: impl Iterator<Item = &'a str>, widths: &[usize]) -> String {
    let line: Vec<String> = cells
        .zip(widths)
        .map(|(cell, width)| pad_str(cell, *width, Alignment::Left, None).into_owned())
        .collect();
    line.join("  ").trim_end().to_string()
}

/// A spinner on stderr, or `None` when stderr is not a terminal.
pub fn spinner(message: &str) -> Option<ProgressBar> {
    if !std::io::stderr().is_terminal() {
        return None;
    }
    let bar = ProgressBar::new_spinner();
    if let Ok(template) = ProgressStyle::with_template("{spinner} {msg}") {
        bar.set_style(template);
    }
    bar.set_message(message.to_string());
    bar.enable_steady_tick(Duration::from_millis(100));
    Some(bar)
}
