//! Client configuration
//!
//! Defaults match the seeBeads server: it listens on `127.0.0.1:3456`,
//! sends a heartbeat every 30 seconds and expects clients to retry two
//! seconds after a dropped stream.

use std::env;
use std::time::Duration;

use url::Url;

use crate::error::{LiveError, LiveResult};

/// Default seeBeads server address
pub const DEFAULT_BASE_URL: &str = "http://127.0.0.1:3456";

/// Fixed delay before reopening a failed event stream
pub const DEFAULT_RECONNECT_DELAY: Duration = Duration::from_millis(2000);

/// Quiet window for coalescing `reload` bursts
pub const DEFAULT_DEBOUNCE_WINDOW: Duration = Duration::from_millis(400);

/// Accepted range for the debounce window
pub const MIN_DEBOUNCE_WINDOW: Duration = Duration::from_millis(300);
pub const MAX_DEBOUNCE_WINDOW: Duration = Duration::from_millis(500);

/// Three missed heartbeats
pub const DEFAULT_IDLE_TIMEOUT: Duration = Duration::from_secs(90);

/// Path of the push endpoint relative to the base URL
pub const EVENTS_PATH: &str = "api/events";

/// Configuration for the live-update client
#[derive(Debug, Clone)]
pub struct LiveConfig {
    /// Base URL of the seeBeads server
    pub base_url: String,
    /// Delay between a transport error and the next connection attempt
    pub reconnect_delay: Duration,
    /// Trailing-edge debounce window for cache invalidation
    pub debounce_window: Duration,
    /// Maximum silence on an open stream before it is treated as dead
    pub idle_timeout: Duration,
}

impl Default for LiveConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            reconnect_delay: DEFAULT_RECONNECT_DELAY,
            debounce_window: DEFAULT_DEBOUNCE_WINDOW,
            idle_timeout: DEFAULT_IDLE_TIMEOUT,
        }
    }
}

impl LiveConfig {
    /// Create config pointing at a custom server
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            ..Default::default()
        }
    }

    /// Default config with `BEADS_*` environment overrides applied
    pub fn from_env() -> LiveResult<Self> {
        let mut config = Self::default();

        if let Ok(url) = env::var("BEADS_URL") {
            config.base_url = url;
        }
        if let Some(ms) = env_u64("BEADS_RECONNECT_MS")? {
            config.reconnect_delay = Duration::from_millis(ms);
        }
        if let Some(ms) = env_u64("BEADS_DEBOUNCE_MS")? {
            config.debounce_window = Duration::from_millis(ms);
        }
        if let Some(secs) = env_u64("BEADS_IDLE_TIMEOUT_SECS")? {
            config.idle_timeout = Duration::from_secs(secs);
        }

        config.validate()?;
        Ok(config)
    }

    pub fn with_reconnect_delay(mut self, delay: Duration) -> Self {
        self.reconnect_delay = delay;
        self
    }

    pub fn with_debounce_window(mut self, window: Duration) -> Self {
        self.debounce_window = window;
        self
    }

    pub fn with_idle_timeout(mut self, timeout: Duration) -> Self {
        self.idle_timeout = timeout;
        self
    }

    /// Check that the configuration is usable
    pub fn validate(&self) -> LiveResult<()> {
        if self.reconnect_delay.is_zero() {
            return Err(LiveError::InvalidConfig(
                "reconnect delay must be non-zero".to_string(),
            ));
        }
        if self.debounce_window < MIN_DEBOUNCE_WINDOW || self.debounce_window > MAX_DEBOUNCE_WINDOW {
            return Err(LiveError::InvalidConfig(format!(
                "debounce window must be between {} and {} ms, got {} ms",
                MIN_DEBOUNCE_WINDOW.as_millis(),
                MAX_DEBOUNCE_WINDOW.as_millis(),
                self.debounce_window.as_millis()
            )));
        }
        if self.idle_timeout.is_zero() {
            return Err(LiveError::InvalidConfig(
                "idle timeout must be non-zero".to_string(),
            ));
        }
        self.base()?;
        Ok(())
    }

    /// Parsed base URL, always ending in `/` so relative joins keep any mount prefix
    pub fn base(&self) -> LiveResult<Url> {
        let mut raw = self.base_url.trim().to_string();
        if !raw.ends_with('/') {
            raw.push('/');
        }
        let url = Url::parse(&raw)?;
        match url.scheme() {
            "http" | "https" => Ok(url),
            other => Err(LiveError::InvalidConfig(format!(
                "unsupported URL scheme: {}",
                other
            ))),
        }
    }

    /// Full URL of the push endpoint
    pub fn events_url(&self) -> LiveResult<Url> {
        Ok(self.base()?.join(EVENTS_PATH)?)
    }
}

fn env_u64(key: &str) -> LiveResult<Option<u64>> {
    match env::var(key) {
        Ok(raw) => raw
            .trim()
            .parse()
            .map(Some)
            .map_err(|_| LiveError::InvalidConfig(format!("{} must be an integer, got {:?}", key, raw))),
        Err(_) => Ok(None),
    }
}
