//! Produce command - build one bundle through the cache

use crate::bundle::{class_set, ArchiveBundler};
use crate::cache::BundleCache;
use crate::cli::args::ProduceArgs;
use crate::config::Config;
use crate::error::CacheResult;
use crate::store::Location;
use crate::ui::{self, UiContext};
use std::sync::Arc;
use tracing::debug;

/// Execute the produce command
pub async fn execute(args: ProduceArgs, config: &Config) -> CacheResult<()> {
    let ctx = UiContext::detect();

    let cache = BundleCache::from_config(&config.cache, Arc::new(ArchiveBundler::new())).await?;
    if let (Some(id), Some(root)) = (cache.session_id(), cache.root()) {
        debug!("Using cache session {} under {}", id, root);
    }

    let target = Location::local(args.target);
    let classes = class_set(args.classes);
    let resources: Vec<Location> = args.resources.into_iter().map(Location::local).collect();

    // Always close the session, even when the build failed
    let result = cache.produce(&target, &classes, &resources).await;
    let closed = cache.shutdown().await;
    let produced = result?;
    closed?;

    let detail = match &produced.hash {
        Some(hash) if produced.cache_hit => format!("cache hit {}", hash.short()),
        Some(hash) => format!("built {}", hash.short()),
        None => "cache disabled".to_string(),
    };
    ui::step_ok_detail(&ctx, &format!("Bundle written to {}", target), &detail);

    Ok(())
}
