//! Replay command: feed a recorded event log through a fresh store.

use std::path::Path;

use miette::Result;
use tracing::info;

use tideline_core::{EngineConfig, Event, Store, StoreSnapshot, parse_event_log};

/// Read and validate a JSON configuration file.
pub async fn load_config(path: &Path) -> Result<EngineConfig> {
    let raw = tokio::fs::read_to_string(path)
        .await
        .map_err(|e| miette::miette!("failed to read {}: {}", path.display(), e))?;
    EngineConfig::from_json(&raw).map_err(|e| miette::miette!("{}: {}", path.display(), e))
}

/// Read a JSON-lines event log.
pub async fn load_events(path: &Path) -> Result<Vec<Event>> {
    let raw = tokio::fs::read_to_string(path)
        .await
        .map_err(|e| miette::miette!("failed to read {}: {}", path.display(), e))?;
    parse_event_log(&raw).map_err(|e| miette::miette!("{}: {}", path.display(), e))
}

/// Apply every event in `path` and return the final snapshot, restricted to
/// `feeds` unless that is empty.
pub async fn run(path: &Path, config: EngineConfig, feeds: &[String]) -> Result<StoreSnapshot> {
    let events = load_events(path).await?;
    info!(count = events.len(), path = %path.display(), "replaying events");

    let mut store = Store::new(config);
    store.apply_all(events);

    let mut snapshot = store.snapshot();
    if !feeds.is_empty() {
        snapshot.retain_feeds(feeds);
    }
    info!(
        feeds = snapshot.feeds.len(),
        pending = snapshot.pending_writes.len(),
        "replay finished"
    );
    Ok(snapshot)
}
