//! Sessions command - show sessions under the cache root

use crate::cache::{list_sessions, Liveness, SessionSummary};
use crate::cli::args::{OutputFormat, SessionsArgs};
use crate::config::Config;
use crate::error::CacheResult;
use crate::store::Location;
use crate::ui::{self, format_bytes, UiContext};
use console::style;

/// Execute the sessions command
pub async fn execute(args: SessionsArgs, config: &Config) -> CacheResult<()> {
    let root = Location::local(config.cache.resolved_root());
    let sessions = list_sessions(&root, config.cache.cleanup_period()).await?;

    if sessions.is_empty() {
        match args.format {
            OutputFormat::Json => println!("[]"),
            OutputFormat::Plain => {}
            OutputFormat::Table => {
                let ctx = UiContext::detect();
                ui::step_info(&ctx, &format!("No sessions under {}", root));
            }
        }
        return Ok(());
    }

    match args.format {
        OutputFormat::Table => print_table(&root, &sessions),
        OutputFormat::Json => print_json(&sessions)?,
        OutputFormat::Plain => print_plain(&sessions),
    }

    Ok(())
}

fn print_table(root: &Location, sessions: &[SessionSummary]) {
    let ctx = UiContext::detect();
    ui::intro(&ctx, &format!("Sessions in {}", root));

    println!(
        "{:<38} {:<10} {:<18} {:>8} {:>10}",
        style("SESSION").bold(),
        style("STATE").bold(),
        style("HEARTBEAT").bold(),
        style("ENTRIES").bold(),
        style("SIZE").bold()
    );
    println!("{}", "-".repeat(88));

    for session in sessions {
        let state = match session.liveness {
            Liveness::Live => style("live").green(),
            Liveness::Stale => style("stale").yellow(),
            Liveness::Orphaned => style("orphaned").dim(),
        };

        let heartbeat = session
            .heartbeat
            .map(|t| t.format("%Y-%m-%d %H:%M").to_string())
            .unwrap_or_else(|| "-".to_string());

        println!(
            "{:<38} {:<10} {:<18} {:>8} {:>10}",
            session.id,
            state,
            heartbeat,
            session.entries,
            format_bytes(session.bytes)
        );
    }

    let total: u64 = sessions.iter().map(|s| s.bytes).sum();
    println!();
    println!("{} session(s), {}", sessions.len(), format_bytes(total));
}

fn print_json(sessions: &[SessionSummary]) -> CacheResult<()> {
    let json = serde_json::to_string_pretty(sessions)?;
    println!("{}", json);
    Ok(())
}

fn print_plain(sessions: &[SessionSummary]) {
    for session in sessions {
        println!("{}", session.id);
    }
}
