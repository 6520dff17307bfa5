//! Connection state machine for the push stream
//!
//! `LiveClient` performs no I/O and reads no clock. The driver feeds it
//! transport callbacks and the current time; the client answers with
//! [`Directive`]s telling the driver which transports to open or close.
//!
//! ```text
//! Disconnected ──start──► Connecting ──open──► Connected
//!      ▲                      │                    │
//!      └──── error ◄──────────┴────────────────────┘
//!      │
//!      └── reconnect deadline ──► Connecting ...
//!
//! any state ──stop──► Stopped (terminal)
//! ```

use std::sync::Arc;

use tokio::sync::watch;
use tokio::time::Instant;
use tracing::{debug, info, trace, warn};

use super::debounce::Debouncer;
use super::events::ServerEvent;
use super::sse::SseFrame;
use crate::cache::CacheInvalidator;
use crate::config::LiveConfig;
use crate::error::{LiveError, LiveResult};
use crate::types::{ConnectionPhase, LiveState, Stats};

/// Identity of one opened transport. Callbacks from any other id are stale.
pub type TransportId = u64;

/// Instruction from the state machine to the driver
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Directive {
    Open(TransportId),
    Close(TransportId),
}

/// Live-update client core
pub struct LiveClient {
    phase: ConnectionPhase,
    state: LiveState,
    current: Option<TransportId>,
    next_id: TransportId,
    reconnect: Debouncer,
    invalidation: Debouncer,
    invalidator: Arc<dyn CacheInvalidator>,
    state_tx: watch::Sender<LiveState>,
    invalidations: u64,
}

impl LiveClient {
    pub fn new(config: &LiveConfig, invalidator: Arc<dyn CacheInvalidator>) -> Self {
        let (state_tx, _) = watch::channel(LiveState::default());
        Self {
            phase: ConnectionPhase::Disconnected,
            state: LiveState::default(),
            current: None,
            next_id: 0,
            reconnect: Debouncer::new(config.reconnect_delay),
            invalidation: Debouncer::new(config.debounce_window),
            invalidator,
            state_tx,
            invalidations: 0,
        }
    }

    pub fn phase(&self) -> ConnectionPhase {
        self.phase
    }

    pub fn state(&self) -> &LiveState {
        &self.state
    }

    /// Receiver that observes every published state change
    pub fn subscribe(&self) -> watch::Receiver<LiveState> {
        self.state_tx.subscribe()
    }

    pub fn current_transport(&self) -> Option<TransportId> {
        self.current
    }

    pub fn is_current(&self, id: TransportId) -> bool {
        self.phase != ConnectionPhase::Stopped && self.current == Some(id)
    }

    /// Cache invalidations issued so far, debounced and manual
    pub fn invalidation_count(&self) -> u64 {
        self.invalidations
    }

    pub fn reconnect_pending(&self) -> bool {
        self.reconnect.is_pending()
    }

    pub fn invalidation_pending(&self) -> bool {
        self.invalidation.is_pending()
    }

    /// Open a new subscription, closing the current one first
    pub fn start(&mut self, _now: Instant) -> LiveResult<Vec<Directive>> {
        if self.phase == ConnectionPhase::Stopped {
            return Err(LiveError::Stopped);
        }
        Ok(self.open_transport())
    }

    /// The transport `id` is established
    pub fn on_open(&mut self, id: TransportId, _now: Instant) {
        if !self.is_current(id) {
            trace!(transport = id, "ignoring open from stale transport");
            return;
        }
        self.phase = ConnectionPhase::Connected;
        self.state.connected = true;
        self.publish();
        info!(transport = id, "event stream connected");
    }

    /// The transport `id` failed or ended. Schedules a reconnect and asks the
    /// driver to close it.
    pub fn on_error(&mut self, id: TransportId, now: Instant) -> Vec<Directive> {
        if !self.is_current(id) {
            trace!(transport = id, "ignoring error from stale transport");
            return Vec::new();
        }

        self.current = None;
        self.phase = ConnectionPhase::Disconnected;
        self.state.connected = false;
        self.publish();

        self.reconnect.trigger(now);
        debug!(
            transport = id,
            delay_ms = self.reconnect.window().as_millis() as u64,
            "reconnect scheduled"
        );

        vec![Directive::Close(id)]
    }

    /// A frame arrived on transport `id`. Malformed payloads are logged and dropped.
    pub fn on_frame(&mut self, id: TransportId, frame: &SseFrame, now: Instant) {
        if !self.is_current(id) {
            trace!(transport = id, event = %frame.event, "ignoring frame from stale transport");
            return;
        }

        match ServerEvent::decode(frame) {
            Ok(Some(event)) => self.apply(event, now),
            Ok(None) => debug!(event = %frame.event, "ignoring unhandled event"),
            Err(e) => warn!(event = %frame.event, error = %e, "dropping malformed event"),
        }
    }

    /// Apply a decoded event
    pub fn apply(&mut self, event: ServerEvent, now: Instant) {
        if self.phase == ConnectionPhase::Stopped {
            return;
        }

        match event {
            ServerEvent::Init { stats } => self.replace_stats(stats),
            ServerEvent::Update { kind, stats } => match stats {
                Some(stats) if kind == "stats" => self.replace_stats(stats),
                _ => debug!(kind = %kind, "ignoring update without stats snapshot"),
            },
            ServerEvent::Reload { stats } => {
                self.replace_stats(stats);
                self.invalidation.trigger(now);
            }
            ServerEvent::Heartbeat => trace!("heartbeat"),
        }
    }

    /// Fire whichever timers are due
    pub fn poll(&mut self, now: Instant) -> Vec<Directive> {
        if self.phase == ConnectionPhase::Stopped {
            return Vec::new();
        }

        if self.invalidation.poll(now) {
            self.invalidate();
        }

        if self.reconnect.poll(now) {
            debug!("reconnecting event stream");
            return self.open_transport();
        }

        Vec::new()
    }

    /// Earliest pending timer deadline
    pub fn next_deadline(&self) -> Option<Instant> {
        match (self.reconnect.deadline(), self.invalidation.deadline()) {
            (Some(a), Some(b)) => Some(a.min(b)),
            (a, b) => a.or(b),
        }
    }

    /// Invalidate the cache now, bypassing the debounce. No-op once stopped.
    pub fn refresh(&mut self) -> bool {
        if self.phase == ConnectionPhase::Stopped {
            return false;
        }
        self.invalidation.cancel();
        self.invalidate();
        true
    }

    /// Cancel both timers, close the transport and enter the terminal state
    pub fn stop(&mut self) -> Vec<Directive> {
        if self.phase == ConnectionPhase::Stopped {
            return Vec::new();
        }

        self.reconnect.cancel();
        self.invalidation.cancel();
        let directives = self.current.take().map(Directive::Close).into_iter().collect();
        self.phase = ConnectionPhase::Stopped;

        if self.state.connected {
            self.state.connected = false;
            self.publish();
        }
        info!("live client stopped");

        directives
    }

    fn open_transport(&mut self) -> Vec<Directive> {
        let mut directives = Vec::with_capacity(2);

        self.reconnect.cancel();
        if let Some(old) = self.current.take() {
            directives.push(Directive::Close(old));
        }
        if self.state.connected {
            self.state.connected = false;
            self.publish();
        }

        self.next_id += 1;
        let id = self.next_id;
        self.current = Some(id);
        self.phase = ConnectionPhase::Connecting;
        directives.push(Directive::Open(id));

        debug!(transport = id, "opening event stream");
        directives
    }

    fn replace_stats(&mut self, stats: Stats) {
        self.state.stats = Some(stats);
        self.state.last_update = Some(chrono::Utc::now());
        self.publish();
    }

    fn invalidate(&mut self) {
        self.invalidations += 1;
        debug!(count = self.invalidations, "invalidating request cache");
        self.invalidator.invalidate_all();
    }

    fn publish(&self) {
        self.state_tx.send_replace(self.state.clone());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    const RECONNECT: Duration = Duration::from_millis(2000);
    const WINDOW: Duration = Duration::from_millis(400);

    struct Harness {
        client: LiveClient,
        hits: Arc<AtomicUsize>,
        t0: Instant,
    }

    impl Harness {
        fn new() -> Self {
            let hits = Arc::new(AtomicUsize::new(0));
            let counter = hits.clone();
            let config = LiveConfig::default()
                .with_reconnect_delay(RECONNECT)
                .with_debounce_window(WINDOW);
            let client = LiveClient::new(
                &config,
                Arc::new(move || {
                    counter.fetch_add(1, Ordering::SeqCst);
                }),
            );
            Self {
                client,
                hits,
                t0: Instant::now(),
            }
        }

        fn at(&self, ms: u64) -> Instant {
            self.t0 + Duration::from_millis(ms)
        }

        fn hits(&self) -> usize {
            self.hits.load(Ordering::SeqCst)
        }

        /// Start and open, returning the transport id
        fn connect(&mut self, ms: u64) -> TransportId {
            let now = self.at(ms);
            let directives = self.client.start(now).unwrap();
            let id = match directives.last() {
                Some(Directive::Open(id)) => *id,
                other => panic!("expected open, got {:?}", other),
            };
            self.client.on_open(id, now);
            id
        }

        fn frame(&mut self, id: TransportId, event: &str, data: &str, ms: u64) {
            let now = self.at(ms);
            self.client.on_frame(id, &SseFrame::new(event, data), now);
        }

        fn total(&self) -> Option<u64> {
            self.client.state().stats.as_ref().map(|s| s.total)
        }
    }

    #[test]
    fn test_initial_state() {
        let h = Harness::new();
        assert_eq!(h.client.phase(), ConnectionPhase::Disconnected);
        assert!(!h.client.state().connected);
        assert!(h.client.next_deadline().is_none());
    }

    #[test]
    fn test_start_then_open() {
        let mut h = Harness::new();
        let directives = h.client.start(h.at(0)).unwrap();
        assert_eq!(directives, vec![Directive::Open(1)]);
        assert_eq!(h.client.phase(), ConnectionPhase::Connecting);
        assert!(!h.client.state().connected);

        h.client.on_open(1, h.at(5));
        assert_eq!(h.client.phase(), ConnectionPhase::Connected);
        assert!(h.client.state().connected);
    }

    #[test]
    fn test_reconnect_scenario() {
        let mut h = Harness::new();
        let id = h.connect(0);
        h.frame(id, "init", r#"{"stats":{"total":10}}"#, 10);
        assert_eq!(h.total(), Some(10));
        assert!(h.client.state().connected);
        assert!(h.client.state().last_update.is_some());

        let directives = h.client.on_error(id, h.at(100));
        assert_eq!(directives, vec![Directive::Close(id)]);
        assert!(!h.client.state().connected);
        assert_eq!(h.client.phase(), ConnectionPhase::Disconnected);
        assert_eq!(h.client.next_deadline(), Some(h.at(2100)));

        assert!(h.client.poll(h.at(2099)).is_empty());
        let directives = h.client.poll(h.at(2100));
        assert_eq!(directives, vec![Directive::Open(id + 1)]);
        assert_eq!(h.client.phase(), ConnectionPhase::Connecting);

        h.client.on_open(id + 1, h.at(2110));
        h.frame(id + 1, "init", r#"{"stats":{"total":12}}"#, 2120);
        assert_eq!(h.total(), Some(12));
        assert!(h.client.state().connected);
    }

    #[test]
    fn test_connected_flag_tracks_every_error_and_open() {
        let mut h = Harness::new();
        let mut id = h.connect(0);
        let mut t = 0;

        for _ in 0..5 {
            t += 50;
            h.client.on_error(id, h.at(t));
            assert!(!h.client.state().connected);

            t += 2000;
            let directives = h.client.poll(h.at(t));
            id = match directives.as_slice() {
                [Directive::Open(next)] => *next,
                other => panic!("expected a single open, got {:?}", other),
            };
            assert!(!h.client.state().connected);

            h.client.on_open(id, h.at(t));
            assert!(h.client.state().connected);
        }
    }

    #[test]
    fn test_repeated_errors_keep_one_reconnect_timer() {
        let mut h = Harness::new();
        let directives = h.client.start(h.at(0)).unwrap();
        assert_eq!(directives, vec![Directive::Open(1)]);

        h.client.on_error(1, h.at(0));
        // A second error from the same (now stale) transport changes nothing
        assert!(h.client.on_error(1, h.at(1500)).is_empty());
        assert_eq!(h.client.next_deadline(), Some(h.at(2000)));
    }

    #[test]
    fn test_failed_connect_attempts_keep_retrying() {
        let mut h = Harness::new();
        h.client.start(h.at(0)).unwrap();
        h.client.on_error(1, h.at(10));

        let directives = h.client.poll(h.at(2010));
        assert_eq!(directives, vec![Directive::Open(2)]);
        h.client.on_error(2, h.at(2020));

        assert_eq!(h.client.next_deadline(), Some(h.at(4020)));
        assert_eq!(h.client.poll(h.at(4020)), vec![Directive::Open(3)]);
    }

    #[test]
    fn test_start_twice_keeps_one_transport() {
        let mut h = Harness::new();
        let first = h.connect(0);
        let directives = h.client.start(h.at(10)).unwrap();
        assert_eq!(directives, vec![Directive::Close(first), Directive::Open(first + 1)]);
        assert!(!h.client.state().connected);

        let second = first + 1;
        h.client.on_open(second, h.at(20));

        // Late traffic from the first transport is ignored
        h.client.on_open(first, h.at(25));
        h.frame(first, "reload", r#"{"stats":{"total":99}}"#, 30);
        assert_eq!(h.total(), None);
        assert!(!h.client.invalidation_pending());

        h.frame(second, "reload", r#"{"stats":{"total":5}}"#, 40);
        assert_eq!(h.total(), Some(5));
        h.client.poll(h.at(1000));
        assert_eq!(h.hits(), 1);
    }

    #[test]
    fn test_start_cancels_pending_reconnect() {
        let mut h = Harness::new();
        let id = h.connect(0);
        h.client.on_error(id, h.at(10));
        assert!(h.client.reconnect_pending());

        let directives = h.client.start(h.at(20)).unwrap();
        assert_eq!(directives, vec![Directive::Open(id + 1)]);
        assert!(!h.client.reconnect_pending());
        assert!(h.client.poll(h.at(5000)).is_empty());
    }

    #[test]
    fn test_update_stats_replaces_snapshot() {
        let mut h = Harness::new();
        let id = h.connect(0);
        h.frame(id, "init", r#"{"stats":{"total":1,"ready":1}}"#, 1);
        h.frame(id, "update", r#"{"type":"stats","stats":{"total":4}}"#, 2);

        let stats = h.client.state().stats.clone().unwrap();
        assert_eq!(stats.total, 4);
        // Full replacement, no merge
        assert_eq!(stats.ready, 0);

        h.frame(id, "update", r#"{"type":"other","stats":{"total":50}}"#, 3);
        h.frame(id, "update", r#"{"type":"stats"}"#, 4);
        assert_eq!(h.total(), Some(4));
        assert_eq!(h.hits(), 0);
    }

    #[test]
    fn test_heartbeat_changes_nothing() {
        let mut h = Harness::new();
        let id = h.connect(0);
        h.frame(id, "init", r#"{"stats":{"total":2}}"#, 1);
        let before = h.client.state().clone();

        h.frame(id, "heartbeat", r#"{"timestamp":"2026-01-01T00:00:00Z"}"#, 2);
        assert_eq!(h.client.state(), &before);
        assert!(h.client.next_deadline().is_none());
    }

    #[test]
    fn test_reload_burst_coalesces_into_one_invalidation() {
        let mut h = Harness::new();
        let id = h.connect(0);

        for i in 0..50u64 {
            let data = format!(r#"{{"stats":{{"total":{}}}}}"#, i);
            h.frame(id, "reload", &data, 100 + i * 100);
            // Counters are never stale
            assert_eq!(h.total(), Some(i));
            assert!(h.client.poll(h.at(100 + i * 100 + 99)).is_empty());
        }
        assert_eq!(h.hits(), 0);

        let last = 100 + 49 * 100;
        assert_eq!(h.client.next_deadline(), Some(h.at(last + 400)));
        h.client.poll(h.at(last + 399));
        assert_eq!(h.hits(), 0);
        h.client.poll(h.at(last + 400));
        assert_eq!(h.hits(), 1);
        h.client.poll(h.at(last + 5000));
        assert_eq!(h.hits(), 1);
    }

    #[test]
    fn test_spaced_reloads_each_invalidate() {
        let mut h = Harness::new();
        let id = h.connect(0);

        for i in 0..3u64 {
            let t = i * 1000;
            h.frame(id, "reload", r#"{"stats":{"total":1}}"#, t);
            h.client.poll(h.at(t + 400));
        }
        assert_eq!(h.hits(), 3);
        assert_eq!(h.client.invalidation_count(), 3);
    }

    #[test]
    fn test_refresh_bypasses_debounce() {
        let mut h = Harness::new();
        let id = h.connect(0);
        assert!(h.client.refresh());
        assert_eq!(h.hits(), 1);

        h.frame(id, "reload", r#"{"stats":{"total":1}}"#, 10);
        assert!(h.client.refresh());
        assert_eq!(h.hits(), 2);
        // The pending debounced invalidation was absorbed by the refresh
        h.client.poll(h.at(1000));
        assert_eq!(h.hits(), 2);
    }

    #[test]
    fn test_malformed_event_is_dropped() {
        let mut h = Harness::new();
        let id = h.connect(0);
        h.frame(id, "init", r#"{"stats":{"total":3}}"#, 1);
        let before = h.client.state().clone();

        h.frame(id, "update", "{this is not json", 2);
        h.frame(id, "reload", r#"{"stats": 17}"#, 3);
        assert_eq!(h.client.state(), &before);
        assert!(!h.client.invalidation_pending());

        h.frame(id, "update", r#"{"type":"stats","stats":{"total":8}}"#, 4);
        assert_eq!(h.total(), Some(8));
        assert!(h.client.state().connected);
    }

    #[test]
    fn test_stop_cancels_timers_and_freezes_state() {
        let mut h = Harness::new();
        let id = h.connect(0);
        h.frame(id, "reload", r#"{"stats":{"total":1}}"#, 10);
        h.client.on_error(id, h.at(20));
        assert!(h.client.invalidation_pending());
        assert!(h.client.reconnect_pending());

        assert!(h.client.stop().is_empty());
        assert_eq!(h.client.phase(), ConnectionPhase::Stopped);
        let frozen = h.client.state().clone();

        assert!(h.client.poll(h.at(10_000)).is_empty());
        assert_eq!(h.hits(), 0);
        assert!(h.client.next_deadline().is_none());

        h.client.on_open(id + 1, h.at(10_001));
        h.frame(id, "init", r#"{"stats":{"total":42}}"#, 10_002);
        h.client.apply(
            ServerEvent::Init {
                stats: Stats::default(),
            },
            h.at(10_003),
        );
        assert!(!h.client.refresh());
        assert_eq!(h.client.state(), &frozen);
        assert!(matches!(h.client.start(h.at(10_004)), Err(LiveError::Stopped)));
    }

    #[test]
    fn test_stop_closes_transport_and_is_idempotent() {
        let mut h = Harness::new();
        let id = h.connect(0);
        let mut rx = h.client.subscribe();

        assert_eq!(h.client.stop(), vec![Directive::Close(id)]);
        assert!(!h.client.state().connected);
        assert!(rx.has_changed().unwrap());
        assert!(!rx.borrow_and_update().connected);

        assert!(h.client.stop().is_empty());
        assert!(!rx.has_changed().unwrap());
    }

    #[test]
    fn test_subscribers_see_updates() {
        let mut h = Harness::new();
        let rx = h.client.subscribe();
        let id = h.connect(0);
        h.frame(id, "init", r#"{"stats":{"total":6}}"#, 1);

        let seen = rx.borrow().clone();
        assert!(seen.connected);
        assert_eq!(seen.stats.map(|s| s.total), Some(6));
    }
}
