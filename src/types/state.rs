//! Observable live-update state

use chrono::{DateTime, Utc};
use serde::Serialize;

use super::stats::Stats;

/// Where the event-stream connection currently is
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ConnectionPhase {
    Disconnected,
    Connecting,
    Connected,
    /// Terminal; reached only through `stop()`
    Stopped,
}

/// What views read: connection flag, latest snapshot and when it arrived
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LiveState {
    pub connected: bool,
    pub stats: Option<Stats>,
    pub last_update: Option<DateTime<Utc>>,
}
