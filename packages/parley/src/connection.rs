//! ConnectionManager: WebSocket lifecycle with bounded reconnection.
//!
//! Owns at most one active socket. On loss, reconnects with a linearly
//! growing delay (attempt × step, capped) until the retry budget is
//! exhausted; after that the client stays visibly disconnected until an
//! external trigger (`notify_foreground`) restarts the cycle. The pending
//! reconnect timer is a single slot: starting a new connect cycle cancels
//! any timer already scheduled.

use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use futures_util::{SinkExt, StreamExt};
use tokio::sync::{Mutex, broadcast, mpsc, watch};
use tokio_tungstenite::tungstenite::Message as WsFrame;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::config::ConnectionConfig;
use crate::protocol::{self, ClientMessage, ServerMessage};

/// Connection lifecycle states, published on the status watch channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Connecting,
    Connected,
    Disconnected,
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConnectionState::Connecting => write!(f, "Connecting..."),
            ConnectionState::Connected => write!(f, "Connected"),
            ConnectionState::Disconnected => write!(f, "Disconnected"),
        }
    }
}

/// Reconnect delay for a 1-based attempt number: attempt × step, capped.
fn backoff_delay(attempt: u32, step: Duration, cap: Duration) -> Duration {
    step.saturating_mul(attempt).min(cap)
}

/// Socket-scoped state behind one lock.
struct Inner {
    /// Consecutive failed-connection count. Reset only by a successful open.
    attempts: u32,
    /// Cancellation handle for the pending reconnect timer. Single slot.
    pending_retry: Option<CancellationToken>,
    /// Hand-off channel to the active socket's writer task. `None` while
    /// no socket is up.
    writer: Option<mpsc::Sender<WsFrame>>,
}

/// Manages the one socket connection to the message-exchange server.
///
/// Cheap to clone; all clones share the same session state. Inbound
/// envelopes fan out through [`subscribe`](Self::subscribe), status through
/// [`watch_state`](Self::watch_state).
#[derive(Clone)]
pub struct ConnectionManager {
    config: ConnectionConfig,
    state_tx: watch::Sender<ConnectionState>,
    events: broadcast::Sender<ServerMessage>,
    inner: Arc<Mutex<Inner>>,
    shutdown: CancellationToken,
}

impl ConnectionManager {
    pub fn new(config: ConnectionConfig) -> Self {
        let (state_tx, _) = watch::channel(ConnectionState::Disconnected);
        let (events, _) = broadcast::channel(256);
        Self {
            config,
            state_tx,
            events,
            inner: Arc::new(Mutex::new(Inner {
                attempts: 0,
                pending_retry: None,
                writer: None,
            })),
            shutdown: CancellationToken::new(),
        }
    }

    /// Subscribe to inbound server envelopes.
    pub fn subscribe(&self) -> broadcast::Receiver<ServerMessage> {
        self.events.subscribe()
    }

    /// Subscribe to connection status changes.
    pub fn watch_state(&self) -> watch::Receiver<ConnectionState> {
        self.state_tx.subscribe()
    }

    pub fn state(&self) -> ConnectionState {
        *self.state_tx.borrow()
    }

    /// Start a connect cycle: clear any pending reconnect timer, open the
    /// socket, and on success sync state with a `get_messages` request.
    /// Failure is handled like a connection loss (backoff reconnect).
    pub async fn connect(&self) {
        {
            let mut inner = self.inner.lock().await;
            if let Some(token) = inner.pending_retry.take() {
                token.cancel();
            }
        }
        // Claim the cycle atomically: only one connect runs at a time
        let mut claimed = false;
        self.state_tx.send_if_modified(|state| {
            if *state == ConnectionState::Disconnected {
                *state = ConnectionState::Connecting;
                claimed = true;
            }
            claimed
        });
        if !claimed {
            return;
        }
        info!(url = %self.config.server_url, "connecting");

        let ws = match tokio_tungstenite::connect_async(self.config.server_url.as_str()).await {
            Ok((ws, _response)) => ws,
            Err(e) => {
                warn!(error = %e, "connect failed");
                self.state_tx.send_replace(ConnectionState::Disconnected);
                self.schedule_reconnect().await;
                return;
            }
        };

        self.state_tx.send_replace(ConnectionState::Connected);
        self.inner.lock().await.attempts = 0;
        info!("connected");

        let (mut sink, mut stream) = ws.split();
        let (writer_tx, mut writer_rx) = mpsc::channel::<WsFrame>(64);
        self.inner.lock().await.writer = Some(writer_tx);

        // Writer task: drain channel → socket sink
        let writer_shutdown = self.shutdown.clone();
        tokio::spawn(async move {
            loop {
                tokio::select! {
                    _ = writer_shutdown.cancelled() => {
                        let _ = sink.close().await;
                        break;
                    }
                    frame = writer_rx.recv() => match frame {
                        Some(frame) => {
                            if let Err(e) = sink.send(frame).await {
                                error!(error = %e, "socket write failed");
                                break;
                            }
                        }
                        None => {
                            let _ = sink.close().await;
                            break;
                        }
                    }
                }
            }
        });

        // Sync after any gap, including first load
        if let Err(e) = self.send(&ClientMessage::GetMessages).await {
            warn!(error = %e, "initial message fetch failed");
        }

        // Reader task: socket → event fan-out; on end, recover
        let mgr = self.clone();
        tokio::spawn(async move {
            loop {
                tokio::select! {
                    _ = mgr.shutdown.cancelled() => return,
                    frame = stream.next() => match frame {
                        Some(Ok(WsFrame::Text(text))) => {
                            if let Some(msg) = protocol::parse_frame(&text) {
                                let _ = mgr.events.send(msg);
                            }
                        }
                        Some(Ok(WsFrame::Close(_))) => {
                            info!("server closed the connection");
                            break;
                        }
                        // Binary/ping/pong carry nothing for this protocol
                        Some(Ok(_)) => {}
                        Some(Err(e)) => {
                            warn!(error = %e, "socket error");
                            break;
                        }
                        None => {
                            info!("socket closed");
                            break;
                        }
                    }
                }
            }
            mgr.state_tx.send_replace(ConnectionState::Disconnected);
            mgr.inner.lock().await.writer = None;
            mgr.schedule_reconnect().await;
        });
    }

    /// Serialize and transmit an envelope, only while connected. Otherwise
    /// the frame is silently dropped (no queue, no retry) and the status is
    /// surfaced as disconnected; returns whether the frame was handed to
    /// the transport.
    pub async fn send(&self, msg: &ClientMessage) -> Result<bool> {
        let writer = self.inner.lock().await.writer.clone();
        let writer = match writer {
            Some(writer) if self.state() == ConnectionState::Connected => writer,
            _ => {
                warn!("not connected, dropping outbound message");
                self.state_tx.send_replace(ConnectionState::Disconnected);
                return Ok(false);
            }
        };

        let json = serde_json::to_string(msg).context("serialize outbound message")?;
        let handoff = writer.send(WsFrame::Text(json.into()));
        let delivered = match self.config.send_timeout {
            Some(limit) => match tokio::time::timeout(limit, handoff).await {
                Ok(result) => result.is_ok(),
                Err(_) => {
                    warn!(timeout_ms = limit.as_millis() as u64, "send timed out");
                    false
                }
            },
            None => handoff.await.is_ok(),
        };
        Ok(delivered)
    }

    /// Opportunistic recovery when the app regains the foreground: retry
    /// immediately if not connected. Deliberately does not reset the
    /// attempt counter; only a successful open does.
    pub async fn notify_foreground(&self) {
        if self.state() == ConnectionState::Connected {
            return;
        }
        info!("foreground regained while not connected, retrying");
        self.connect().await;
    }

    /// Deterministic teardown: cancel tasks and timers, close the socket.
    pub async fn shutdown(&self) {
        self.shutdown.cancel();
        let mut inner = self.inner.lock().await;
        if let Some(token) = inner.pending_retry.take() {
            token.cancel();
        }
        // Dropping the writer handle lets the writer task close the sink
        inner.writer = None;
        drop(inner);
        self.state_tx.send_replace(ConnectionState::Disconnected);
        info!("connection manager shut down");
    }

    /// Schedule the next reconnect attempt, if budget remains. The timer
    /// occupies the single pending-retry slot; anything already there is
    /// cancelled first so cycles never stack.
    async fn schedule_reconnect(&self) {
        if self.shutdown.is_cancelled() {
            return;
        }

        let mut inner = self.inner.lock().await;
        if inner.attempts >= self.config.max_reconnect_attempts {
            warn!(
                attempts = inner.attempts,
                "reconnect budget exhausted, staying disconnected"
            );
            return;
        }
        inner.attempts += 1;
        let attempt = inner.attempts;
        let delay = backoff_delay(attempt, self.config.backoff_step, self.config.backoff_cap);

        if let Some(token) = inner.pending_retry.take() {
            token.cancel();
        }
        let token = self.shutdown.child_token();
        inner.pending_retry = Some(token.clone());
        drop(inner);

        info!(attempt, delay_ms = delay.as_millis() as u64, "reconnect scheduled");
        let mgr = self.clone();
        tokio::spawn(async move {
            tokio::select! {
                _ = token.cancelled() => {
                    debug!("pending reconnect cancelled");
                }
                _ = tokio::time::sleep(delay) => {
                    mgr.connect_boxed().await;
                }
            }
        });
    }

    /// Type-erased, explicitly-`Send` forwarder to [`connect`](Self::connect).
    /// Breaks the recursive-async `Send` inference cycle between `connect` and
    /// `schedule_reconnect` so the reconnect timer task can be spawned.
    fn connect_boxed(self) -> Pin<Box<dyn Future<Output = ()> + Send>> {
        Box::pin(async move { self.connect().await })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn secs(n: u64) -> Duration {
        Duration::from_secs(n)
    }

    #[test]
    fn backoff_grows_linearly_with_attempt() {
        for attempt in 1..=5u32 {
            assert_eq!(
                backoff_delay(attempt, secs(1), secs(30)),
                Duration::from_millis(u64::from(attempt) * 1000)
            );
        }
    }

    #[test]
    fn backoff_is_capped() {
        assert_eq!(backoff_delay(40, secs(1), secs(30)), secs(30));
        assert_eq!(backoff_delay(3, secs(10), secs(15)), secs(15));
    }

    #[test]
    fn starts_disconnected() {
        let mgr = ConnectionManager::new(ConnectionConfig::default());
        assert_eq!(mgr.state(), ConnectionState::Disconnected);
    }

    #[tokio::test]
    async fn send_while_disconnected_is_a_dropped_no_op() {
        let mgr = ConnectionManager::new(ConnectionConfig::default());
        let delivered = mgr
            .send(&ClientMessage::SendMessage {
                content: "hello".to_string(),
            })
            .await
            .unwrap();
        assert!(!delivered);
        assert_eq!(mgr.state(), ConnectionState::Disconnected);
    }

    #[test]
    fn status_display_strings() {
        assert_eq!(ConnectionState::Connected.to_string(), "Connected");
        assert_eq!(ConnectionState::Connecting.to_string(), "Connecting...");
        assert_eq!(ConnectionState::Disconnected.to_string(), "Disconnected");
    }
}
