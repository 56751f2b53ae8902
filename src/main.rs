//! Dashboard Sync demo client
//!
//! Subscribes to the notification feed and unread counter of a dashboard API
//! and logs every state change until shut down.

use std::sync::Arc;

use anyhow::Context;
use tokio::signal;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use dashboard_sync::cache::{Filters, QueryState};
use dashboard_sync::models::{NotificationPage, UnreadCount};
use dashboard_sync::{spawn_eviction_task, Config, DashboardApi, HttpTransport, QueryCache};

/// Main entry point for the demo client.
///
/// # Startup Sequence
/// 1. Initialize tracing subscriber for logging
/// 2. Load configuration from environment variables
/// 3. Build the HTTP transport and query cache
/// 4. Start background eviction task
/// 5. Subscribe to notifications and the unread counter
/// 6. Log changes until SIGINT/SIGTERM, then shut the cache down
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Defaults to "info" level, can be overridden with RUST_LOG env var
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "dashboard_sync=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting Dashboard Sync client");

    let config = Config::from_env();
    info!(
        "Configuration loaded: api_base_url={}, max_entries={}, stale_time={}ms, poll={}ms",
        config.api_base_url, config.max_entries, config.stale_time_ms, config.notifications_poll_ms
    );

    let transport = HttpTransport::from_config(&config).context("building HTTP transport")?;
    let cache = QueryCache::from_config(&config);
    let eviction_handle = spawn_eviction_task(&cache, config.eviction_interval());
    info!("Background eviction task started");

    let api = DashboardApi::new(Arc::new(transport), cache.clone(), &config);
    let mut notifications = api.notifications(&Filters::new());
    let mut unread = api.unread_count();

    let shutdown = shutdown_signal();
    tokio::pin!(shutdown);

    loop {
        tokio::select! {
            _ = &mut shutdown => break,
            state = notifications.changed() => match state {
                Some(state) => log_notifications(&state),
                None => break,
            },
            state = unread.changed() => match state {
                Some(state) => log_unread(&state),
                None => break,
            },
        }
    }

    drop(notifications);
    drop(unread);
    eviction_handle.abort();
    warn!("Eviction task aborted");

    let stats = cache.stats();
    info!(
        fetches = stats.fetches,
        failures = stats.failures,
        hit_rate = stats.hit_rate(),
        "Cache statistics"
    );
    cache.shutdown();
    info!("Client shutdown complete");
    Ok(())
}

fn log_notifications(state: &QueryState<NotificationPage>) {
    match (&state.data, &state.error) {
        (_, Some(err)) => warn!(status = ?state.status, error = %err, "Notifications failed"),
        (Some(page), None) => info!(
            status = ?state.status,
            items = page.page.items.len(),
            total = page.page.total,
            unread = page.unread_count,
            "Notifications updated"
        ),
        (None, None) => info!(status = ?state.status, "Notifications loading"),
    }
}

fn log_unread(state: &QueryState<UnreadCount>) {
    if let Some(count) = &state.data {
        info!(status = ?state.status, unread = count.unread_count, "Unread count updated");
    } else if let Some(err) = &state.error {
        warn!(error = %err, "Unread count failed");
    }
}

/// Waits for shutdown signal (Ctrl+C or SIGTERM).
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(err) = signal::ctrl_c().await {
            warn!(error = %err, "Failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(err) => {
                warn!(error = %err, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C, initiating shutdown...");
        }
        _ = terminate => {
            info!("Received SIGTERM, initiating shutdown...");
        }
    }
}
