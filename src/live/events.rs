//! Typed events carried by the seeBeads push stream

use serde::Deserialize;
use serde_json::Value;

use super::sse::SseFrame;
use crate::error::LiveResult;
use crate::types::Stats;

/// Event names the client acts on
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventKind {
    Init,
    Update,
    Reload,
    Heartbeat,
}

impl EventKind {
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "init" => Some(EventKind::Init),
            "update" => Some(EventKind::Update),
            "reload" => Some(EventKind::Reload),
            "heartbeat" => Some(EventKind::Heartbeat),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            EventKind::Init => "init",
            EventKind::Update => "update",
            EventKind::Reload => "reload",
            EventKind::Heartbeat => "heartbeat",
        }
    }
}

/// A decoded push event
#[derive(Debug, Clone, PartialEq)]
pub enum ServerEvent {
    /// First event on every connection
    Init { stats: Stats },
    /// Legacy change notification; only `kind == "stats"` carries a snapshot
    Update { kind: String, stats: Option<Stats> },
    /// Records beyond the aggregate changed; dependent views must refetch
    Reload { stats: Stats },
    /// Keep-alive
    Heartbeat,
}

#[derive(Deserialize)]
struct StatsPayload {
    stats: Stats,
}

#[derive(Deserialize)]
struct UpdatePayload {
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    stats: Option<Stats>,
}

impl ServerEvent {
    /// Decode a frame. `Ok(None)` means the event name is not one this
    /// client handles; `Err` means the payload is malformed.
    pub fn decode(frame: &SseFrame) -> LiveResult<Option<Self>> {
        let kind = match EventKind::from_name(&frame.event) {
            Some(kind) => kind,
            None => return Ok(None),
        };

        let event = match kind {
            EventKind::Heartbeat => ServerEvent::Heartbeat,
            EventKind::Init => {
                let payload: StatsPayload = serde_json::from_value(unwrap_envelope(&frame.data)?)?;
                ServerEvent::Init {
                    stats: payload.stats,
                }
            }
            EventKind::Reload => {
                let payload: StatsPayload = serde_json::from_value(unwrap_envelope(&frame.data)?)?;
                ServerEvent::Reload {
                    stats: payload.stats,
                }
            }
            EventKind::Update => {
                let payload: UpdatePayload = serde_json::from_value(unwrap_envelope(&frame.data)?)?;
                ServerEvent::Update {
                    kind: payload.kind,
                    stats: payload.stats,
                }
            }
        };

        Ok(Some(event))
    }

    pub fn kind(&self) -> EventKind {
        match self {
            ServerEvent::Init { .. } => EventKind::Init,
            ServerEvent::Update { .. } => EventKind::Update,
            ServerEvent::Reload { .. } => EventKind::Reload,
            ServerEvent::Heartbeat => EventKind::Heartbeat,
        }
    }
}

/// The server writes its first frame as `{"type": .., "data": {..}}` and
/// later frames as the bare payload. Accept both.
fn unwrap_envelope(data: &str) -> LiveResult<Value> {
    let value: Value = serde_json::from_str(data)?;
    if let Value::Object(map) = &value {
        if !map.contains_key("stats") {
            if let Some(inner @ Value::Object(_)) = map.get("data") {
                return Ok(inner.clone());
            }
        }
    }
    Ok(value)
}
