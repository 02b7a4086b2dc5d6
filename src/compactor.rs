use std::sync::Arc;
use std::time::Duration;

use tracing::info;

use crate::error::Error;
use crate::ledger::Ledger;

pub const COMPACT_CHECK_PERIOD: Duration = Duration::from_secs(30);

/// Background task that rewrites the WAL once enough appends pile up.
pub async fn run_compactor(ledger: Arc<Ledger>, threshold: u64, period: Duration) {
    let mut interval = tokio::time::interval(period);
    loop {
        interval.tick().await;
        if let Err(e) = compact_if_needed(&ledger, threshold).await {
            tracing::error!("WAL compaction failed: {e}");
        }
    }
}

/// Compact when at least `threshold` events were appended since the last
/// compaction. Returns whether it did.
pub async fn compact_if_needed(ledger: &Ledger, threshold: u64) -> Result<bool, Error> {
    let appends = ledger.wal_appends_since_compact().await;
    if appends < threshold {
        return Ok(false);
    }
    ledger.compact_wal().await?;
    info!("compacted WAL after {appends} appends");
    Ok(true)
}
