use anyhow::Result;
use fleetstat::*;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::sync::{mpsc, watch};
use tracing_subscriber::EnvFilter;
use tracing_subscriber::fmt::time::FormatTime;

#[global_allocator]
static GLOBAL: tikv_jemallocator::Jemalloc = tikv_jemallocator::Jemalloc;

struct LocalTimer;

impl FormatTime for LocalTimer {
    fn format_time(&self, w: &mut tracing_subscriber::fmt::format::Writer<'_>) -> std::fmt::Result {
        write!(
            w,
            "{}",
            chrono::Local::now().format("%Y-%m-%dT%H:%M:%S%.3f%:z")
        )
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_timer(LocalTimer)
        .with_env_filter(filter)
        .init();

    let app_config = config::AppConfig::load()?;

    let store = Arc::new(
        metrics_store::MetricsStore::connect(
            &app_config.database.path,
            app_config.database.max_pool_size,
        )
        .await?,
    );
    store.init().await?;

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let records_saved_total = Arc::new(AtomicU64::new(0));

    let (write_tx, writer_handle) = if app_config.database.persist_enabled {
        let (tx, rx) = mpsc::channel(writer::writer_channel_capacity(
            app_config.database.flush_rate,
        ));
        let handle = writer::spawn_record_writer(
            rx,
            store.clone(),
            app_config.writer_config(),
            records_saved_total.clone(),
            shutdown_rx.clone(),
        );
        (Some(tx), Some(handle))
    } else {
        tracing::info!("persistence disabled; history is kept in memory only");
        (None, None)
    };

    let cache = live_cache::LiveCache::new(app_config.cache.history_capacity);
    let service = Arc::new(service::MetricsService::new(cache, store.clone(), write_tx));
    service.set_broadcast_callback(|agent_id, snapshot| {
        tracing::trace!(
            agent_id = %agent_id,
            timestamp = snapshot.timestamp,
            "snapshot updated"
        );
    });

    backfill::run_backfill(store.clone()).await;
    let aggregation_handle = aggregation_worker::spawn(
        store.clone(),
        app_config.aggregation_worker_config(),
        shutdown_rx.clone(),
    );

    let app = routes::app(service);
    let addr = format!("{}:{}", app_config.server.host, app_config.server.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!("Listening on http://{}", addr);

    tokio::select! {
        result = axum::serve(listener, app) => {
            result?;
        }
        _ = async {
            #[cfg(unix)]
            {
                let mut sigterm = match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
                    Ok(s) => s,
                    Err(_) => {
                        let _ = tokio::signal::ctrl_c().await;
                        return;
                    }
                };
                tokio::select! {
                    _ = tokio::signal::ctrl_c() => {}
                    _ = sigterm.recv() => {}
                }
            }
            #[cfg(not(unix))]
            {
                let _ = tokio::signal::ctrl_c().await;
            }
        } => {
            tracing::info!("Received shutdown signal");
        }
    }

    let _ = shutdown_tx.send(true);
    let _ = aggregation_handle.await;
    if let Some(handle) = writer_handle {
        let _ = handle.await;
    }
    tracing::info!(
        records_saved_total = records_saved_total.load(Ordering::Relaxed),
        "shutdown complete"
    );

    Ok(())
}
