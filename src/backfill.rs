// One-time backfill: roll up the previous hour at startup, so a restart across the top of
// the hour does not leave a gap in metrics_hourly.

use crate::aggregation_worker::run_hourly_rollup;
use crate::metrics_store::MetricsStore;
use std::sync::Arc;
use tracing::info;

pub async fn run_backfill(store: Arc<MetricsStore>) {
    let now_ms = chrono::Utc::now().timestamp_millis();
    if let Some(report) = run_hourly_rollup(store.as_ref(), now_ms).await {
        info!(rows_written = report.rows_written, "backfill complete");
    }
}
