use anyhow::Result;
use dashsync::config::{AppConfig, DEFAULT_USER_AGENT};
use dashsync::fetcher::HttpFetcher;
use dashsync::series::Series;
use dashsync::{Handlers, SyncLoop};
use std::sync::Arc;
use tokio::time::{Duration, MissedTickBehavior, interval};
use tracing_subscriber::EnvFilter;
use tracing_subscriber::fmt::time::FormatTime;

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

    let app_config = AppConfig::load()?;
    tracing::info!(
        build = DEFAULT_USER_AGENT,
        resources = app_config.resources.len(),
        "Starting sync"
    );

    let fetcher = Arc::new(HttpFetcher::new(
        app_config.client.connect_timeout(),
        app_config.client.user_agent(),
    )?);
    let handlers = Handlers::new()
        .on_update(|name, snapshot| {
            let series = Series::from(snapshot);
            tracing::info!(
                resource = name,
                entries = snapshot.len(),
                version = snapshot.version(),
                latest = ?series.points.last().map(|p| p.value),
                "snapshot updated"
            );
        })
        .on_error(|name, error| {
            tracing::debug!(resource = name, kind = ?error.kind(), "fetch error reported");
        });
    let sync_loop = SyncLoop::new(app_config.resources()?, fetcher, handlers)?;
    sync_loop.start().await?;

    let mut stats_log_tick = interval(Duration::from_secs(
        app_config.monitoring.stats_log_interval_secs,
    ));
    stats_log_tick.set_missed_tick_behavior(MissedTickBehavior::Skip);
    // The first tick completes immediately; nothing to report yet.
    stats_log_tick.tick().await;

    let shutdown = shutdown_signal();
    tokio::pin!(shutdown);
    loop {
        tokio::select! {
            _ = stats_log_tick.tick() => log_stats(&sync_loop).await,
            _ = &mut shutdown => {
                tracing::info!("Received shutdown signal");
                break;
            }
        }
    }
    sync_loop.stop().await;
    Ok(())
}

async fn log_stats(sync_loop: &SyncLoop) {
    for resource in sync_loop.resources() {
        let Some(state) = sync_loop.state(&resource.name).await else {
            continue;
        };
        tracing::info!(
            resource = %resource.name,
            successful_fetches = state.successful_fetches,
            failed_fetches = state.failed_fetches,
            consecutive_failures = state.consecutive_failures,
            skipped_ticks = state.skipped_ticks,
            last_success = ?state.last_success_timestamp,
            "sync stats"
        );
    }
}

async fn shutdown_signal() {
    #[cfg(unix)]
    {
        let mut sigterm =
            match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
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
}
