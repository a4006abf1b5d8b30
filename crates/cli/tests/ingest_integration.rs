//! End-to-end ingest into a sled store through the Tokio scheduler

use anyhow::Result;
use cache::{DebounceCache, HostScheduler, TokioScheduler};
use cli_lib::{ingest, SledStore};
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;
use tokio::io::{AsyncWriteExt, BufReader};
use tokio::sync::oneshot;

const COOLDOWN: Duration = Duration::from_secs(60);

fn cache_into(store: &Arc<SledStore>) -> Result<DebounceCache<String, String, TokioScheduler>> {
    let sink = Arc::clone(store);
    Ok(DebounceCache::new(
        COOLDOWN,
        move |key: &String, value: String| -> Result<()> { sink.put(key, &value) },
        TokioScheduler::try_current()?,
    ))
}

#[tokio::test]
async fn test_ingest_persists_last_write_per_key() -> Result<()> {
    let temp_dir = TempDir::new()?;
    let store = Arc::new(SledStore::open(temp_dir.path())?);
    let cache = cache_into(&store)?;

    let input: &[u8] = b"# scores\nalice=1\nalice=2\nbob=7\n\nnot a pair\nalice=3\n";
    let report = ingest(input, &cache, std::future::pending()).await?;

    assert_eq!(report.lines, 7);
    assert_eq!(report.writes, 4);
    assert_eq!(report.skipped, 1);
    assert_eq!(report.keys, 2);
    // alice=2 scheduled a deferred persist, alice=3 coalesced into it
    assert_eq!(report.flushed, 1);
    assert_eq!(cache.pending_count(), 0);

    assert_eq!(store.get("alice")?.map(|e| e.value), Some("3".to_string()));
    assert_eq!(store.get("bob")?.map(|e| e.value), Some("7".to_string()));
    Ok(())
}

#[tokio::test]
async fn test_ingest_waits_for_running_persists() -> Result<()> {
    let temp_dir = TempDir::new()?;
    let store = Arc::new(SledStore::open(temp_dir.path())?);
    let sink = Arc::clone(&store);
    let cache = DebounceCache::new(
        COOLDOWN,
        move |key: &String, value: String| -> Result<()> {
            std::thread::sleep(Duration::from_millis(200));
            sink.put(key, &value)
        },
        TokioScheduler::try_current()?,
    );

    // First write for the key goes straight to the blocking pool
    let input: &[u8] = b"bob=7\n";
    let report = ingest(input, &cache, std::future::pending()).await?;

    assert_eq!(report.writes, 1);
    assert_eq!(report.flushed, 0);
    assert_eq!(cache.scheduler().in_flight(), 0);
    assert_eq!(store.get("bob")?.map(|e| e.value), Some("7".to_string()));
    Ok(())
}

#[tokio::test]
async fn test_stop_signal_drains_pending_writes() -> Result<()> {
    let temp_dir = TempDir::new()?;
    let store = Arc::new(SledStore::open(temp_dir.path())?);
    let cache = cache_into(&store)?;

    // Input that stays open until the stop signal
    let (mut writer, reader) = tokio::io::duplex(1024);
    let (stop_tx, stop_rx) = oneshot::channel::<()>();

    let ingest_cache = cache.clone();
    let task = tokio::spawn(async move {
        ingest(BufReader::new(reader), &ingest_cache, async {
            let _ = stop_rx.await;
        })
        .await
    });

    writer.write_all(b"k=first\nk=second\n").await?;
    writer.flush().await?;
    while cache.get(&"k".to_string()).as_deref() != Some("second") {
        tokio::task::yield_now().await;
    }
    assert!(cache.is_pending(&"k".to_string()));

    stop_tx.send(()).ok();
    let report = task.await??;

    assert_eq!(report.writes, 2);
    assert_eq!(report.flushed, 1);
    assert!(!cache.scheduler().is_accepting());
    assert_eq!(store.get("k")?.map(|e| e.value), Some("second".to_string()));

    // After the drain, writes persist inline
    cache.write("k".to_string(), "third".to_string());
    assert_eq!(store.get("k")?.map(|e| e.value), Some("third".to_string()));
    drop(writer);
    Ok(())
}
