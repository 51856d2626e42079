//! Gc command - remove dead sessions without starting one

use crate::cache::{find_dead_sessions, reap_sessions, CycleReport};
use crate::cli::args::GcArgs;
use crate::config::Config;
use crate::error::{CacheError, CacheResult};
use crate::store::Location;
use crate::ui::{self, UiContext};
use chrono::Utc;

/// Execute the gc command
pub async fn execute(args: GcArgs, config: &Config) -> CacheResult<()> {
    let ctx = UiContext::detect();
    let root = Location::local(config.cache.resolved_root());

    let exists = root
        .exists()
        .await
        .map_err(|e| CacheError::io(format!("checking cache root {}", root), e))?;
    if !exists {
        ui::step_info(&ctx, &format!("No cache root at {}", root));
        return Ok(());
    }

    // No session of our own, so nothing is exempt and nothing heartbeats
    let dead = find_dead_sessions(&root, None, config.cache.cleanup_period(), Utc::now()).await?;

    if dead.is_empty() {
        ui::step_info(&ctx, "No dead sessions found");
        return Ok(());
    }

    if args.dry_run {
        ui::intro(&ctx, "Would remove");
        for session in &dead {
            let heartbeat = session
                .heartbeat
                .map(|t| t.format("%Y-%m-%d %H:%M").to_string())
                .unwrap_or_else(|| "never".to_string());
            ui::key_value(
                &ctx,
                session.id(),
                &format!("{} (last heartbeat {})", session.liveness, heartbeat),
            );
        }
        ui::remark(&ctx, "Run without --dry-run to remove");
        return Ok(());
    }

    let mut report = CycleReport::default();
    reap_sessions(&dead, &mut report).await;

    for id in &report.reaped {
        ui::step_ok_detail(&ctx, "Removed session", id);
    }
    if report.failures > 0 {
        ui::step_warn_hint(
            &ctx,
            &format!("{} session(s) could not be removed", report.failures),
            "Run with -v for details",
        );
    }
    ui::outro_success(&ctx, &format!("Removed {} session(s)", report.reaped.len()));

    Ok(())
}
