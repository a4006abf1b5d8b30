//! Ingest loop: input lines in, debounced writes out

use crate::input::parse_line;
use anyhow::{Context, Result};
use cache::{DebounceCache, TokioScheduler};
use std::future::Future;
use tokio::io::{AsyncBufRead, AsyncBufReadExt};
use tracing::{debug, info, warn};

/// What an ingest run did
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IngestReport {
    /// Lines read
    pub lines: usize,
    /// Writes handed to the cache
    pub writes: usize,
    /// Malformed lines skipped
    pub skipped: usize,
    /// Pending persists run by the final drain
    pub flushed: usize,
    /// Distinct keys seen
    pub keys: usize,
}

/// Read `key=value` lines from `reader` into `cache` until EOF or `stop` resolves
///
/// Either way the cache is drained before returning: the scheduler stops
/// accepting work, every pending persist runs on the calling task, and
/// persists already running elsewhere are waited for.
pub async fn ingest<R, F>(
    reader: R,
    cache: &DebounceCache<String, String, TokioScheduler>,
    stop: F,
) -> Result<IngestReport>
where
    R: AsyncBufRead + Unpin,
    F: Future<Output = ()>,
{
    let mut report = IngestReport::default();
    let mut lines = reader.lines();
    tokio::pin!(stop);

    loop {
        tokio::select! {
            line = lines.next_line() => {
                let Some(line) = line.context("Failed to read input")? else {
                    debug!("End of input");
                    break;
                };
                report.lines += 1;

                match parse_line(&line) {
                    Ok(Some((key, value))) => {
                        cache.write(key, value);
                        report.writes += 1;
                    }
                    Ok(None) => {}
                    Err(e) => {
                        warn!("Skipping line {}: {}", report.lines, e);
                        report.skipped += 1;
                    }
                }
            }
            _ = &mut stop => {
                info!("Stop requested, draining cache");
                break;
            }
        }
    }

    let scheduler = cache.scheduler();
    scheduler.shutdown();
    report.flushed = cache.flush_all();
    scheduler.drain().await;
    report.keys = cache.len();

    info!(
        lines = report.lines,
        writes = report.writes,
        keys = report.keys,
        flushed = report.flushed,
        "Ingest finished"
    );
    Ok(report)
}
