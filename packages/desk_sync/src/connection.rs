//! ConnectionManager — lifecycle of the single multiplexed connection.
//!
//! One background task owns the websocket and runs the state machine
//! `Disconnected → Connecting → Connected → Disconnected → …`, reconnecting
//! after a fixed delay, indefinitely. A support console stays up for the
//! whole shift, so there is no backoff cap and no retry limit; the loop is
//! terminal only on explicit shutdown via the cancellation token.
//!
//! Inbound frames become engine events. Outbound frames flow through a
//! bounded mpsc drained by a per-connection writer; `publish` refuses frames
//! while disconnected rather than queueing them.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use futures_util::{Sink, SinkExt, StreamExt};
use tokio::sync::{mpsc, watch};
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::Message;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::config::SyncConfig;
use crate::engine::Event;
use crate::error::{SyncError, TransportError};
use crate::protocol::{ClientFrame, ServerFrame};

/// Observable connectivity state, published through a watch channel so the
/// presentation layer can show its offline banner.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnState {
    Disconnected,
    Connecting,
    Connected,
}

/// Publish seam between the engine and the transport. The engine (and the
/// dispatcher behind it) only ever sees this trait; tests substitute an
/// in-memory sink.
pub trait FrameSink: Send + Sync {
    fn state(&self) -> ConnState;

    /// Enqueue a frame if and only if currently connected.
    fn publish(&self, frame: ClientFrame) -> Result<(), SyncError>;
}

impl<T: FrameSink + ?Sized> FrameSink for Arc<T> {
    fn state(&self) -> ConnState {
        (**self).state()
    }

    fn publish(&self, frame: ClientFrame) -> Result<(), SyncError> {
        (**self).publish(frame)
    }
}

/// Cloneable handle onto the connection task.
#[derive(Clone)]
pub struct ConnectionHandle {
    state_rx: watch::Receiver<ConnState>,
    outbound_tx: mpsc::Sender<ClientFrame>,
}

impl ConnectionHandle {
    /// Watch connectivity transitions.
    pub fn state_watch(&self) -> watch::Receiver<ConnState> {
        self.state_rx.clone()
    }
}

impl FrameSink for ConnectionHandle {
    fn state(&self) -> ConnState {
        *self.state_rx.borrow()
    }

    fn publish(&self, frame: ClientFrame) -> Result<(), SyncError> {
        if self.state() != ConnState::Connected {
            return Err(SyncError::Transport(TransportError::NotConnected));
        }
        self.outbound_tx
            .try_send(frame)
            .map_err(|_| SyncError::Transport(TransportError::QueueFull))
    }
}

pub struct ConnectionManager;

impl ConnectionManager {
    /// Spawn the connection task. Events (connects, disconnects, inbound
    /// frames) are delivered to `events`; the returned handle publishes
    /// outbound frames and exposes the state watch.
    pub fn spawn(
        config: SyncConfig,
        events: mpsc::Sender<Event>,
        cancel: CancellationToken,
    ) -> ConnectionHandle {
        let (state_tx, state_rx) = watch::channel(ConnState::Disconnected);
        let (outbound_tx, outbound_rx) = mpsc::channel(config.outbound_capacity);

        tokio::spawn(run(config, events, cancel, state_tx, outbound_rx));

        ConnectionHandle {
            state_rx,
            outbound_tx,
        }
    }
}

async fn run(
    config: SyncConfig,
    events: mpsc::Sender<Event>,
    cancel: CancellationToken,
    state_tx: watch::Sender<ConnState>,
    mut outbound_rx: mpsc::Receiver<ClientFrame>,
) {
    let url = config.ws_url();
    // Each successful connect gets a new epoch; async completions started
    // under an older epoch are discarded by the engine.
    let epoch = Arc::new(AtomicU64::new(0));

    loop {
        if cancel.is_cancelled() {
            break;
        }

        state_tx.send_replace(ConnState::Connecting);
        debug!(%url, "connecting");

        let ws = tokio::select! {
            _ = cancel.cancelled() => break,
            result = connect_async(&url) => match result {
                Ok((ws, _response)) => ws,
                Err(e) => {
                    warn!(%url, error = %e, "connect failed, retrying after delay");
                    state_tx.send_replace(ConnState::Disconnected);
                    tokio::select! {
                        _ = cancel.cancelled() => break,
                        _ = tokio::time::sleep(config.reconnect_delay) => continue,
                    }
                }
            },
        };

        // Frames accepted during the gap would be stale; drop them before
        // announcing the new connection.
        while outbound_rx.try_recv().is_ok() {}

        let current_epoch = epoch.fetch_add(1, Ordering::Relaxed) + 1;
        state_tx.send_replace(ConnState::Connected);
        info!(epoch = current_epoch, "connected");
        if events
            .send(Event::Connected {
                epoch: current_epoch,
            })
            .await
            .is_err()
        {
            break; // engine gone
        }

        let (sink, mut stream) = ws.split();
        let (pong_tx, pong_rx) = mpsc::channel::<Message>(4);
        let writer = tokio::spawn(write_loop(sink, outbound_rx, pong_rx, cancel.clone()));

        // Read loop: parse frames, forward to the engine. A malformed frame
        // is logged and dropped; it never ends the connection.
        loop {
            let msg = tokio::select! {
                _ = cancel.cancelled() => None,
                msg = stream.next() => msg,
            };
            match msg {
                Some(Ok(Message::Text(text))) => match serde_json::from_str::<ServerFrame>(
                    text.as_str(),
                ) {
                    Ok(ServerFrame::Message { topic, body }) => {
                        if events.send(Event::Frame { topic, body }).await.is_err() {
                            break;
                        }
                    }
                    Err(e) => {
                        warn!(error = %e, "malformed inbound frame dropped");
                    }
                },
                Some(Ok(Message::Ping(payload))) => {
                    let _ = pong_tx.send(Message::Pong(payload)).await;
                }
                Some(Ok(Message::Close(_))) | None => break,
                Some(Ok(_)) => {}
                Some(Err(e)) => {
                    warn!(error = %e, "websocket read error");
                    break;
                }
            }
        }

        // Closing the pong channel tells the writer to wind down and hand
        // the outbound receiver back for the next connection.
        drop(pong_tx);
        outbound_rx = match writer.await {
            Ok(rx) => rx,
            Err(_) => break,
        };

        state_tx.send_replace(ConnState::Disconnected);
        if events.send(Event::Disconnected).await.is_err() {
            break;
        }
        if cancel.is_cancelled() {
            break;
        }
        info!(
            delay_secs = config.reconnect_delay.as_secs(),
            "disconnected, will reconnect"
        );
        tokio::select! {
            _ = cancel.cancelled() => break,
            _ = tokio::time::sleep(config.reconnect_delay) => {}
        }
    }

    state_tx.send_replace(ConnState::Disconnected);
    debug!("connection task stopped");
}

/// Drain outbound frames (and pong replies) into the socket until the
/// connection dies or shutdown is requested. Returns the outbound receiver
/// so the next connection can reuse it.
async fn write_loop<S>(
    mut sink: S,
    mut outbound_rx: mpsc::Receiver<ClientFrame>,
    mut pong_rx: mpsc::Receiver<Message>,
    cancel: CancellationToken,
) -> mpsc::Receiver<ClientFrame>
where
    S: Sink<Message> + Unpin + Send,
{
    loop {
        tokio::select! {
            _ = cancel.cancelled() => break,
            pong = pong_rx.recv() => match pong {
                Some(msg) => {
                    if sink.send(msg).await.is_err() {
                        break;
                    }
                }
                None => break, // reader ended the connection
            },
            frame = outbound_rx.recv() => match frame {
                Some(frame) => {
                    let text = match serde_json::to_string(&frame) {
                        Ok(text) => text,
                        Err(e) => {
                            warn!(error = %e, "unserializable outbound frame dropped");
                            continue;
                        }
                    };
                    if sink.send(Message::Text(text.into())).await.is_err() {
                        warn!("websocket write failed");
                        break;
                    }
                }
                None => break, // handle dropped
            },
        }
    }
    outbound_rx
}
