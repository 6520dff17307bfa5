//! beads-live
//!
//! Live-update client for the seeBeads issue-tracker dashboard.
//!
//! # Features
//!
//! - **Push stream**: one `text/event-stream` subscription with a fixed
//!   2 s reconnect after any failure
//! - **Observable state**: `{connected, stats, last_update}` through a
//!   `tokio::sync::watch` channel
//! - **Debounced invalidation**: bursts of `reload` events coalesce into a
//!   single cache invalidation
//! - **REST client**: typed access to stats, issues, epics and health
//!
//! # Modules
//!
//! - `live`: SSE decoding, the connection state machine and its tokio driver
//! - `cache`: request cache and the invalidation seam
//! - `api`: REST client
//! - `types`: wire data model
//! - `config`: client configuration
//! - `error`: error type
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use beads_live::{HttpTransport, LiveConfig, LiveUpdater, QueryCache};
//!
//! # async fn run() -> beads_live::LiveResult<()> {
//! let config = LiveConfig::from_env()?;
//! let cache = Arc::new(QueryCache::new());
//! let transport = Arc::new(HttpTransport::new(&config)?);
//! let handle = LiveUpdater::spawn(config, transport, cache.clone())?;
//!
//! let mut state = handle.subscribe();
//! while state.changed().await.is_ok() {
//!     println!("{:?}", *state.borrow());
//! }
//! handle.stop().await;
//! # Ok(())
//! # }
//! ```

pub mod api;
pub mod cache;
pub mod config;
pub mod error;
pub mod live;
pub mod types;

// Re-export commonly used items at crate root
pub use api::ApiClient;
pub use cache::{CacheInvalidator, QueryCache, QueryKey};
pub use config::LiveConfig;
pub use error::{LiveError, LiveResult};
pub use live::{HttpTransport, LiveClient, LiveHandle, LiveUpdater, ServerEvent, Transport};
pub use types::{ConnectionPhase, Filter, LiveState, Stats};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Library name
pub const NAME: &str = env!("CARGO_PKG_NAME");
