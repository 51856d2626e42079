//! Output functions for consistent CLI formatting
//!
//! Interactive terminals get cliclack log lines; pipes and CI get a
//! bracketed tag per line so output stays greppable.

use super::context::UiContext;
use console::{style, StyledObject};

fn plain_line(tag: StyledObject<&str>, message: &str) {
    println!("  {} {}", tag, message);
}

/// Display a title above a listing
pub fn intro(ctx: &UiContext, title: &str) {
    let title = style(title).cyan().bold();
    if ctx.use_fancy_output() {
        cliclack::intro(title).ok();
    } else {
        println!("{}\n", title);
    }
}

/// Close a command that changed something
pub fn outro_success(ctx: &UiContext, message: &str) {
    if ctx.use_fancy_output() {
        cliclack::outro(style(message).green().bold()).ok();
    } else {
        println!("\n{} {}", style("[OK]").green(), message);
    }
}

/// Completed step with a dimmed detail, e.g. a path or a hash
pub fn step_ok_detail(ctx: &UiContext, message: &str, detail: &str) {
    if ctx.use_fancy_output() {
        cliclack::log::success(format!("{} ({})", message, style(detail).dim())).ok();
    } else {
        plain_line(style("[OK]").green(), &format!("{} ({})", message, detail));
    }
}

/// Warning with a suggested next step
pub fn step_warn_hint(ctx: &UiContext, message: &str, hint: &str) {
    if ctx.use_fancy_output() {
        cliclack::log::warning(format!("{} - {}", message, style(hint).dim())).ok();
    } else {
        plain_line(style("[WARN]").yellow(), &format!("{} - {}", message, hint));
    }
}

pub fn step_info(ctx: &UiContext, message: &str) {
    if ctx.use_fancy_output() {
        cliclack::log::info(message).ok();
    } else {
        plain_line(style("[INFO]").cyan(), message);
    }
}

pub fn remark(ctx: &UiContext, message: &str) {
    if ctx.use_fancy_output() {
        cliclack::log::remark(message).ok();
    } else {
        println!("  {}", style(message).dim());
    }
}

/// Indented `key: value` line, key dimmed on a terminal
pub fn key_value(ctx: &UiContext, key: &str, value: &str) {
    if ctx.use_fancy_output() {
        println!("  {}: {}", style(key).dim(), value);
    } else {
        println!("  {}: {}", key, value);
    }
}

/// Human-readable size with binary units
pub fn format_bytes(bytes: u64) -> String {
    const UNITS: [(u64, &str); 3] = [(1 << 30, "GB"), (1 << 20, "MB"), (1 << 10, "KB")];

    UNITS
        .iter()
        .find(|(size, _)| bytes >= *size)
        .map(|(size, unit)| format!("{:.1} {}", bytes as f64 / *size as f64, unit))
        .unwrap_or_else(|| format!("{} B", bytes))
}
