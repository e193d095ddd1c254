// Background scheduler: hourly rollup of raw records, then retention cleanup on a slower clock.
// Cleanup runs on a cron expression (local time) when configured, else every cleanup_interval_secs.

use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use crate::metrics_store::aggregation::{MS_PER_DAY, MS_PER_HOUR, bucket_start};
use crate::metrics_store::{CleanupReport, MetricsStore, RetentionPolicy, RollupReport};
use tokio::sync::watch;
use tokio::time::Instant;
use tracing::{info, instrument, warn};

/// Config for the aggregation worker.
#[derive(Debug, Clone)]
pub struct AggregationWorkerConfig {
    pub rollup_interval_secs: u64,
    /// Delay past the top of the hour before the first rollup, so the record writer has
    /// flushed the hour's tail. Set from the writer's flush interval.
    pub flush_grace_secs: u64,
    pub cleanup_interval_secs: u64,
    /// Optional cron expression for cleanup (e.g. "0 0 3 * * *" = 03:00 daily). Uses local time.
    pub cleanup_schedule: Option<String>,
    pub vacuum_after_cleanup: bool,
    pub retention: RetentionPolicy,
}

/// Spawns the aggregation worker. Returns a join handle; the task ends when shutdown is signalled.
pub fn spawn(
    store: Arc<MetricsStore>,
    config: AggregationWorkerConfig,
    shutdown_rx: watch::Receiver<bool>,
) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        run(store, config, shutdown_rx).await;
    })
}

#[instrument(skip(store, shutdown_rx), fields(rollup_interval_secs = config.rollup_interval_secs))]
async fn run(
    store: Arc<MetricsStore>,
    config: AggregationWorkerConfig,
    mut shutdown_rx: watch::Receiver<bool>,
) {
    let rollup_period = Duration::from_secs(config.rollup_interval_secs.max(1));
    let first_delay = first_rollup_delay(now_ms(), config.flush_grace_secs);
    let mut rollup_interval = tokio::time::interval_at(Instant::now() + first_delay, rollup_period);
    rollup_interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

    let schedule = config.cleanup_schedule.as_deref().and_then(|s| {
        match cron::Schedule::from_str(s) {
            Ok(schedule) => Some(schedule),
            Err(e) => {
                warn!(cron = %s, error = %e, "invalid cleanup_schedule; using cleanup_interval_secs");
                None
            }
        }
    });

    let mut cleanup_at = next_cleanup(schedule.as_ref(), config.cleanup_interval_secs);

    loop {
        tokio::select! {
            _ = rollup_interval.tick() => {
                run_hourly_rollup(&store, now_ms()).await;
            }
            _ = tokio::time::sleep_until(cleanup_at) => {
                run_cleanup(&store, &config, now_ms()).await;
                cleanup_at = next_cleanup(schedule.as_ref(), config.cleanup_interval_secs);
            }
            changed = shutdown_rx.changed() => {
                if changed.is_err() || *shutdown_rx.borrow() {
                    tracing::debug!("Aggregation worker shutting down");
                    break;
                }
            }
        }
    }
}

/// Time from `now_ms` to the next top of the hour (UTC), plus `grace_secs`. Exactly on the
/// hour counts as the start of a new hour, so the wait is a full hour.
pub fn first_rollup_delay(now_ms: i64, grace_secs: u64) -> Duration {
    let next_hour = bucket_start(now_ms, MS_PER_HOUR) + MS_PER_HOUR;
    let until_hour = u64::try_from(next_hour - now_ms).unwrap_or(0);
    Duration::from_millis(until_hour) + Duration::from_secs(grace_secs)
}

/// Next cleanup deadline: the next cron fire time in local time, or now + interval.
fn next_cleanup(schedule: Option<&cron::Schedule>, interval_secs: u64) -> Instant {
    if let Some(schedule) = schedule {
        let now = chrono::Local::now();
        if let Some(next) = schedule.after(&now).next() {
            let delay = (next - now).to_std().unwrap_or(Duration::from_secs(1));
            return Instant::now() + delay;
        }
        return Instant::now() + Duration::from_secs(3600);
    }
    Instant::now() + Duration::from_secs(interval_secs.max(1))
}

/// Rolls up the last complete hour before `now_ms`. Used by the worker loop and by backfill.
pub async fn run_hourly_rollup(store: &MetricsStore, now_ms: i64) -> Option<RollupReport> {
    let hour_start = bucket_start(now_ms, MS_PER_HOUR) - MS_PER_HOUR;
    match store.rollup_hour(hour_start).await {
        Ok(report) => {
            if report.rows_written > 0 || report.failures > 0 {
                info!(
                    hour_start,
                    agents = report.agents,
                    rows_written = report.rows_written,
                    failures = report.failures,
                    "hourly rollup"
                );
            }
            Some(report)
        }
        Err(e) => {
            warn!(error = %e, hour_start, "hourly rollup failed");
            None
        }
    }
}

/// One cleanup cycle: daily rollup of the previous UTC day, retention pruning, optional VACUUM.
pub async fn run_cleanup(
    store: &MetricsStore,
    config: &AggregationWorkerConfig,
    now_ms: i64,
) -> CleanupReport {
    let day_start = bucket_start(now_ms, MS_PER_DAY) - MS_PER_DAY;
    match store.rollup_day(day_start).await {
        Ok(report) => {
            if report.rows_written > 0 {
                info!(day_start, rows_written = report.rows_written, "daily rollup");
            }
        }
        Err(e) => warn!(error = %e, day_start, "daily rollup failed"),
    }

    let report = store.cleanup(now_ms, &config.retention).await;
    info!(
        shards_dropped = report.shards_dropped,
        raw_rows_deleted = report.raw_rows_deleted,
        hourly_rows_deleted = report.hourly_rows_deleted,
        daily_rows_deleted = report.daily_rows_deleted,
        failures = report.failures,
        "retention cleanup"
    );

    if config.vacuum_after_cleanup {
        if let Err(e) = store.vacuum().await {
            warn!(error = %e, "vacuum failed");
        } else {
            info!("vacuum complete");
        }
    }
    report
}

fn now_ms() -> i64 {
    chrono::Utc::now().timestamp_millis()
}
