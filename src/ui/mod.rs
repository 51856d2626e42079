//! UI helpers for consistent CLI output
//!
//! Uses `cliclack` log lines on an interactive terminal and falls back to
//! plain bracketed prefixes in CI and when output is piped.
//!
//! # Example
//!
//! ```rust,ignore
//! use bundle_cache::ui::{self, UiContext};
//!
//! let ctx = UiContext::detect();
//! ui::intro(&ctx, "Garbage collection");
//! ui::step_ok_detail(&ctx, "Removed session", "0192...");
//! ui::outro_success(&ctx, "Done");
//! ```

mod context;
mod output;

pub use context::UiContext;
pub use output::{
    format_bytes, intro, key_value, outro_success, remark, step_info, step_ok_detail,
    step_warn_hint,
};
