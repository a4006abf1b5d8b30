//! Ingest stdin through the debounce cache

use anyhow::{Context, Result};
use cache::{DebounceCache, TokioScheduler};
use cli_lib::{ingest, Settings, SledStore};
use std::sync::Arc;
use tokio::io::BufReader;
use tracing::{info, warn};

pub async fn run(settings: Settings) -> Result<()> {
    let store = Arc::new(SledStore::open(&settings.store.path)?);
    let scheduler = TokioScheduler::try_current()
        .context("Failed to attach to the Tokio runtime")?;

    let sink = Arc::clone(&store);
    let cache = DebounceCache::from_config(
        &settings.cache,
        move |key: &String, value: String| -> Result<()> { sink.put(key, &value) },
        scheduler,
    );

    info!(
        "Persisting to {} (cooldown: {:?})",
        settings.store.path.display(),
        cache.cooldown()
    );

    let stop = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!("Failed to listen for Ctrl-C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    let report = ingest(BufReader::new(tokio::io::stdin()), &cache, stop).await?;
    store.flush().context("Failed to flush store")?;

    if report.skipped > 0 {
        warn!("{} malformed lines skipped", report.skipped);
    }
    Ok(())
}
