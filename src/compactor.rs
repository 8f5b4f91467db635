use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, info};

use crate::service::Service;

/// Background task that rewrites the WAL once enough appends have piled up
/// since the last compaction.
pub async fn run_compactor(service: Arc<Service>, threshold: u64) {
    let mut interval = tokio::time::interval(Duration::from_secs(60));
    loop {
        interval.tick().await;
        let appends = service.wal_appends_since_compact().await;
        if appends < threshold {
            continue;
        }
        match service.compact_wal().await {
            Ok(()) => info!("compacted WAL after {appends} appends"),
            Err(e) => debug!("compaction skipped: {e}"),
        }
    }
}
