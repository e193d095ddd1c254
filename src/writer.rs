// Record writer: persistence runs in a dedicated task fed through a bounded channel.
// Ingestion never waits on SQLite; a full channel drops the point at the sender.

use crate::metrics_store::MetricsStore;
use crate::models::MetricsRecord;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::sync::{mpsc, watch};
use tokio::time::{Duration, interval};

/// Channel capacity for the record writer (room for two flushes before senders start dropping).
pub fn writer_channel_capacity(flush_rate: u64) -> usize {
    (flush_rate as usize * 2).max(32)
}

/// Batching for the record writer task.
#[derive(Debug, Clone)]
pub struct RecordWriterConfig {
    pub flush_rate: u64,
    pub flush_interval_secs: u64,
}

/// Spawns the task that receives records and flushes them to the store.
/// Flushes when buffer len >= flush_rate, every flush_interval_secs, and on exit.
/// Exits when every sender is dropped or shutdown is signalled; on shutdown the channel is
/// closed and drained first so nothing already accepted is lost.
pub fn spawn_record_writer(
    mut write_rx: mpsc::Receiver<MetricsRecord>,
    store: Arc<MetricsStore>,
    config: RecordWriterConfig,
    records_saved_total: Arc<AtomicU64>,
    mut shutdown_rx: watch::Receiver<bool>,
) -> tokio::task::JoinHandle<()> {
    let flush_interval = Duration::from_secs(config.flush_interval_secs.max(1));
    let flush_rate = (config.flush_rate as usize).max(1);
    tokio::spawn(async move {
        let mut buffer: Vec<MetricsRecord> = Vec::with_capacity(flush_rate);
        let mut flush_tick = interval(flush_interval);
        flush_tick.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

        loop {
            tokio::select! {
                result = write_rx.recv() => {
                    match result {
                        Some(record) => {
                            buffer.push(record);
                            if buffer.len() >= flush_rate {
                                flush_buffer(&store, &mut buffer, &records_saved_total).await;
                            }
                        }
                        None => break,
                    }
                }
                _ = flush_tick.tick() => {
                    flush_buffer(&store, &mut buffer, &records_saved_total).await;
                }
                changed = shutdown_rx.changed() => {
                    if changed.is_err() || *shutdown_rx.borrow() {
                        write_rx.close();
                        while let Some(record) = write_rx.recv().await {
                            buffer.push(record);
                        }
                        break;
                    }
                }
            }
        }
        flush_buffer(&store, &mut buffer, &records_saved_total).await;
        tracing::debug!("Record writer shutting down");
    })
}

async fn flush_buffer(
    store: &MetricsStore,
    buffer: &mut Vec<MetricsRecord>,
    records_saved_total: &AtomicU64,
) {
    if buffer.is_empty() {
        return;
    }
    let n = buffer.len();
    let saved = store.save_records(buffer).await;
    records_saved_total.fetch_add(saved as u64, Ordering::Relaxed);
    buffer.clear();
    if saved < n {
        tracing::warn!(
            operation = "save_records",
            records_count = n,
            records_saved = saved,
            "some records were dropped"
        );
    } else {
        tracing::debug!(
            operation = "save_records",
            records_count = n,
            "Records saved"
        );
    }
}
