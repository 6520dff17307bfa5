//! beads-live - follow a seeBeads server from the terminal
//!
//! Logs connection changes and every stats snapshot, and refetches the
//! epic list whenever the server asks clients to invalidate their caches.

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use tokio::sync::{mpsc, Notify};
use tracing::{debug, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use beads_live::api::ReleaseChecker;
use beads_live::config::DEFAULT_BASE_URL;
use beads_live::{
    ApiClient, CacheInvalidator, HttpTransport, LiveConfig, LiveState, LiveUpdater, QueryCache,
    QueryKey,
};

#[derive(Debug, Parser)]
#[command(name = "beads-live", version, about = "Follow a seeBeads server's live event stream")]
struct Cli {
    /// Base URL of the seeBeads server
    #[arg(long, env = "BEADS_URL", default_value = DEFAULT_BASE_URL)]
    url: String,

    /// Delay before reconnecting a failed stream, in milliseconds
    #[arg(long, env = "BEADS_RECONNECT_MS", default_value_t = 2000)]
    reconnect_ms: u64,

    /// Quiet window for coalescing reload bursts, in milliseconds (300-500)
    #[arg(long, env = "BEADS_DEBOUNCE_MS", default_value_t = 400)]
    debounce_ms: u64,

    /// Seconds without any stream data before the connection is considered dead
    #[arg(long, env = "BEADS_IDLE_TIMEOUT_SECS", default_value_t = 90)]
    idle_timeout_secs: u64,

    /// Set the server's agent mode before following
    #[arg(long)]
    agent_mode: Option<bool>,

    /// Check the published tags for a newer server release on startup
    #[arg(long)]
    check_updates: bool,

    /// Emit logs as JSON
    #[arg(long)]
    json: bool,
}

impl Cli {
    fn config(&self) -> LiveConfig {
        LiveConfig::new(self.url.clone())
            .with_reconnect_delay(Duration::from_millis(self.reconnect_ms))
            .with_debounce_window(Duration::from_millis(self.debounce_ms))
            .with_idle_timeout(Duration::from_secs(self.idle_timeout_secs))
    }
}

fn init_tracing(json: bool) {
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "beads_live=info".into());

    if json {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(tracing_subscriber::fmt::layer().json())
            .init();
    } else {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(tracing_subscriber::fmt::layer())
            .init();
    }
}

/// Invalidates the cache and wakes the refetch loop
struct NotifyingCache {
    cache: Arc<QueryCache>,
    notify: Arc<Notify>,
}

impl CacheInvalidator for NotifyingCache {
    fn invalidate_all(&self) {
        self.cache.invalidate_all();
        self.notify.notify_one();
    }
}

fn log_state(previous: &LiveState, current: &LiveState) {
    if previous.connected != current.connected {
        if current.connected {
            info!("connected");
        } else {
            warn!("disconnected");
        }
    }
    if previous.stats != current.stats {
        if let Some(stats) = &current.stats {
            info!(
                total = stats.total,
                open = stats.status_count("open"),
                in_progress = stats.status_count("in_progress"),
                blocked = stats.blocked,
                ready = stats.ready,
                stale = stats.stale,
                "stats"
            );
            for (label, count) in stats.priority_breakdown() {
                debug!(priority = label, count, "beads by priority");
            }
        }
    }
}

async fn refetch_epics(api: &ApiClient, cache: &QueryCache) {
    match cache.get_or_fetch(QueryKey::Epics, move || api.epics()).await {
        Ok(epics) => {
            for epic in &epics {
                info!(
                    id = %epic.id,
                    title = %epic.title,
                    status = epic.status.label(),
                    closed = epic.closed_children,
                    total = epic.total_children,
                    "epic"
                );
            }
        }
        Err(e) => warn!(error = %e, "failed to refetch epics"),
    }
}

async fn check_updates(api: &ApiClient) {
    let checker = match ReleaseChecker::new() {
        Ok(checker) => checker,
        Err(e) => {
            warn!(error = %e, "update check unavailable");
            return;
        }
    };
    match checker.check(api).await {
        Ok(info) if info.update_available => warn!(
            current = info.current.as_deref().unwrap_or("unknown"),
            latest = info.latest.as_deref().unwrap_or("unknown"),
            "a newer seeBeads release is available"
        ),
        Ok(info) => debug!(current = info.current.as_deref().unwrap_or("unknown"), "server is up to date"),
        Err(e) => warn!(error = %e, "update check failed"),
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.json);

    let config = cli.config();
    config.validate().context("invalid configuration")?;

    let api = ApiClient::from_config(&config)?;
    if let Some(enabled) = cli.agent_mode {
        let mode = api
            .set_agent_mode(enabled)
            .await
            .context("failed to set agent mode")?;
        info!(agent_mode = mode, "agent mode updated");
    }
    if cli.check_updates {
        check_updates(&api).await;
    }

    let cache = Arc::new(QueryCache::new());
    let notify = Arc::new(Notify::new());
    let invalidator = Arc::new(NotifyingCache {
        cache: cache.clone(),
        notify: notify.clone(),
    });

    let (shutdown_tx, mut shutdown_rx) = mpsc::unbounded_channel();
    ctrlc::set_handler(move || {
        let _ = shutdown_tx.send(());
    })
    .context("failed to install Ctrl-C handler")?;

    info!(url = %config.base_url, "following event stream");
    let transport = Arc::new(HttpTransport::new(&config)?);
    let handle = LiveUpdater::spawn(config, transport, invalidator)?;

    let mut state_rx = handle.subscribe();
    let mut last = state_rx.borrow_and_update().clone();

    loop {
        tokio::select! {
            _ = shutdown_rx.recv() => {
                info!("shutting down");
                handle.stop().await;
                break;
            }
            changed = state_rx.changed() => {
                if changed.is_err() {
                    break;
                }
                let current = state_rx.borrow_and_update().clone();
                log_state(&last, &current);
                last = current;
            }
            _ = notify.notified() => {
                refetch_epics(&api, &cache).await;
            }
        }
    }

    Ok(())
}
