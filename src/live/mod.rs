//! Live-update client for the seeBeads push stream
//!
//! Keeps one subscription to `GET /api/events` open, mirrors the latest
//! stats snapshot into an observable [`LiveState`](crate::types::LiveState)
//! and invalidates the request cache when the server reports a bulk change.
//!
//! ## Layers
//! - [`sse`]: byte chunks to frames
//! - [`events`]: frames to typed [`ServerEvent`]s
//! - [`client`]: sans-IO state machine (connection lifecycle, reconnect
//!   delay, debounced invalidation)
//! - [`transport`]: the network seam and its HTTP implementation
//! - [`runtime`]: tokio task driving the state machine
//!
//! ## Timing
//! - Reconnect 2000 ms after any transport error
//! - `reload` bursts coalesce into one invalidation 400 ms after the last one

pub mod client;
pub mod debounce;
pub mod events;
pub mod runtime;
pub mod sse;
pub mod transport;

pub use client::{Directive, LiveClient, TransportId};
pub use debounce::{Debounce, Debouncer};
pub use events::{EventKind, ServerEvent};
pub use runtime::{LiveHandle, LiveUpdater};
pub use sse::{SseDecoder, SseFrame};
pub use transport::{FrameStream, HttpTransport, Transport};
