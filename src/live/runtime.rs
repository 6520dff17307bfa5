//! tokio driver for [`LiveClient`]
//!
//! One task owns the client. It multiplexes control requests, transport
//! messages and the client's next timer deadline in a single `select!`, so
//! every state transition happens in arrival order on that task.

use std::collections::HashMap;
use std::sync::Arc;

use futures::StreamExt;
use tokio::sync::{mpsc, oneshot, watch};
use tokio::task::JoinHandle;
use tokio::time::{sleep_until, Instant};
use tracing::{error, warn};

use super::client::{Directive, LiveClient, TransportId};
use super::sse::SseFrame;
use super::transport::Transport;
use crate::cache::CacheInvalidator;
use crate::config::LiveConfig;
use crate::error::{LiveError, LiveResult};
use crate::types::LiveState;

/// Message from a transport reader task
#[derive(Debug)]
enum TransportMessage {
    Opened(TransportId),
    Frame(TransportId, SseFrame),
    Failed(TransportId, LiveError),
}

enum Control {
    Restart,
    Refresh,
    Stop(oneshot::Sender<()>),
}

/// Spawns the live-update driver
pub struct LiveUpdater;

impl LiveUpdater {
    /// Validate `config`, start the driver task and open the first connection
    pub fn spawn(
        config: LiveConfig,
        transport: Arc<dyn Transport>,
        invalidator: Arc<dyn CacheInvalidator>,
    ) -> LiveResult<LiveHandle> {
        config.validate()?;

        let client = LiveClient::new(&config, invalidator);
        let state_rx = client.subscribe();
        let (control_tx, control_rx) = mpsc::unbounded_channel();
        let (msg_tx, msg_rx) = mpsc::unbounded_channel();

        let driver = Driver {
            client,
            transport,
            readers: HashMap::new(),
            msg_tx,
            msg_rx,
        };
        let task = tokio::spawn(driver.run(control_rx));

        Ok(LiveHandle {
            control_tx,
            state_rx,
            task,
        })
    }
}

/// Owner-side handle of a running live client.
///
/// Dropping the handle stops the client.
pub struct LiveHandle {
    control_tx: mpsc::UnboundedSender<Control>,
    state_rx: watch::Receiver<LiveState>,
    task: JoinHandle<()>,
}

impl LiveHandle {
    /// Current state snapshot
    pub fn state(&self) -> LiveState {
        self.state_rx.borrow().clone()
    }

    /// Observe state changes
    pub fn subscribe(&self) -> watch::Receiver<LiveState> {
        self.state_rx.clone()
    }

    /// Close the current connection and open a fresh one
    pub fn restart(&self) -> LiveResult<()> {
        self.control_tx
            .send(Control::Restart)
            .map_err(|_| LiveError::Stopped)
    }

    /// Invalidate the request cache immediately
    pub fn refresh(&self) -> LiveResult<()> {
        self.control_tx
            .send(Control::Refresh)
            .map_err(|_| LiveError::Stopped)
    }

    /// Stop the client and wait for the driver to finish teardown.
    /// Safe to call more than once.
    pub async fn stop(&self) {
        let (ack_tx, ack_rx) = oneshot::channel();
        if self.control_tx.send(Control::Stop(ack_tx)).is_ok() {
            let _ = ack_rx.await;
        }
    }

    pub fn is_stopped(&self) -> bool {
        self.control_tx.is_closed() || self.task.is_finished()
    }
}

struct Driver {
    client: LiveClient,
    transport: Arc<dyn Transport>,
    readers: HashMap<TransportId, JoinHandle<()>>,
    msg_tx: mpsc::UnboundedSender<TransportMessage>,
    msg_rx: mpsc::UnboundedReceiver<TransportMessage>,
}

impl Driver {
    async fn run(mut self, mut control_rx: mpsc::UnboundedReceiver<Control>) {
        match self.client.start(Instant::now()) {
            Ok(directives) => self.execute(directives),
            Err(e) => {
                error!(error = %e, "live client failed to start");
                return;
            }
        }

        loop {
            let deadline = self.client.next_deadline();

            tokio::select! {
                biased;

                control = control_rx.recv() => match control {
                    Some(Control::Restart) => {
                        if let Ok(directives) = self.client.start(Instant::now()) {
                            self.execute(directives);
                        }
                    }
                    Some(Control::Refresh) => {
                        self.client.refresh();
                    }
                    Some(Control::Stop(ack)) => {
                        self.shutdown();
                        let _ = ack.send(());
                        break;
                    }
                    None => {
                        self.shutdown();
                        break;
                    }
                },

                Some(msg) = self.msg_rx.recv() => self.handle_message(msg),

                _ = sleep_until_deadline(deadline) => {
                    let directives = self.client.poll(Instant::now());
                    self.execute(directives);
                }
            }
        }
    }

    fn handle_message(&mut self, msg: TransportMessage) {
        let now = Instant::now();
        match msg {
            TransportMessage::Opened(id) => self.client.on_open(id, now),
            TransportMessage::Frame(id, frame) => self.client.on_frame(id, &frame, now),
            TransportMessage::Failed(id, e) => {
                if self.client.is_current(id) {
                    if e.is_retryable() {
                        warn!(transport = id, error = %e, "event stream failed");
                    } else {
                        error!(transport = id, error = %e, "event stream failed");
                    }
                }
                let directives = self.client.on_error(id, now);
                self.execute(directives);
            }
        }
    }

    fn execute(&mut self, directives: Vec<Directive>) {
        for directive in directives {
            match directive {
                Directive::Open(id) => {
                    let reader = tokio::spawn(read_transport(
                        id,
                        self.transport.clone(),
                        self.msg_tx.clone(),
                    ));
                    self.readers.insert(id, reader);
                }
                Directive::Close(id) => {
                    if let Some(reader) = self.readers.remove(&id) {
                        reader.abort();
                    }
                }
            }
        }
    }

    fn shutdown(&mut self) {
        let directives = self.client.stop();
        self.execute(directives);
        for (_, reader) in self.readers.drain() {
            reader.abort();
        }
    }
}

/// Connect and forward everything the connection produces, tagged with `id`
async fn read_transport(
    id: TransportId,
    transport: Arc<dyn Transport>,
    tx: mpsc::UnboundedSender<TransportMessage>,
) {
    let mut frames = match transport.connect().await {
        Ok(frames) => frames,
        Err(e) => {
            let _ = tx.send(TransportMessage::Failed(id, e));
            return;
        }
    };

    if tx.send(TransportMessage::Opened(id)).is_err() {
        return;
    }

    while let Some(item) = frames.next().await {
        match item {
            Ok(frame) => {
                if tx.send(TransportMessage::Frame(id, frame)).is_err() {
                    return;
                }
            }
            Err(e) => {
                let _ = tx.send(TransportMessage::Failed(id, e));
                return;
            }
        }
    }

    let _ = tx.send(TransportMessage::Failed(id, LiveError::StreamEnded));
}

async fn sleep_until_deadline(deadline: Option<Instant>) {
    match deadline {
        Some(deadline) => sleep_until(deadline).await,
        None => std::future::pending().await,
    }
}
