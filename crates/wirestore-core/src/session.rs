//! Transport session
//!
//! One WebSocket connection per client session, shared by every synchronized
//! store. Inbound frames are demultiplexed by store key to registered
//! handlers; outbound sends are multiplexed onto the same socket. The
//! connection task reconnects automatically with exponential backoff, but
//! never replays missed messages: callers resynchronize with
//! [`Session::request_full_state`] after observing the Connected transition.

use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use anyhow::Result;
use futures_util::{SinkExt, StreamExt};
use serde_json::Value;
use tokio::net::TcpStream;
use tokio::sync::{mpsc, watch};
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};
use tracing::{debug, info, warn};

use crate::config::Config;
use crate::error::{SyncError, SyncResult};
use crate::message::Envelope;

/// Connection status
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionStatus {
    /// Not connected, not trying
    Disconnected,
    /// First connection attempt in progress
    Connecting,
    /// Connected and ready
    Connected,
    /// Transport lost, attempting to reconnect
    Reconnecting,
}

impl SessionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            SessionStatus::Disconnected => "disconnected",
            SessionStatus::Connecting => "connecting",
            SessionStatus::Connected => "connected",
            SessionStatus::Reconnecting => "reconnecting",
        }
    }
}

impl fmt::Display for SessionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Events emitted by the session
#[derive(Debug, Clone)]
pub enum SessionEvent {
    /// Connection status changed
    StatusChanged(SessionStatus),
    /// Human-readable status notice, also delivered to the notification sink
    Notice(String),
    /// Error occurred
    Error(String),
}

/// Pluggable sink for human-readable status strings.
///
/// This is the only coupling to the presentation layer; rendering the
/// strings (toast, log line) is the caller's business.
pub type NotifySink = Arc<dyn Fn(&str) + Send + Sync>;

/// Inbound handler for one store key, invoked once per addressed patch
pub type StoreHandler = Box<dyn Fn(Value) + Send + Sync>;

/// Commands sent to the connection task
enum Command {
    Send(Envelope),
    Shutdown,
}

struct SessionInner {
    url: String,
    name: String,
    initial_reconnect_delay: Duration,
    max_reconnect_delay: Duration,
    registry: Mutex<HashMap<String, StoreHandler>>,
    command_tx: mpsc::UnboundedSender<Command>,
    command_rx: Mutex<Option<mpsc::UnboundedReceiver<Command>>>,
    status_tx: watch::Sender<SessionStatus>,
    status_rx: watch::Receiver<SessionStatus>,
    event_tx: mpsc::UnboundedSender<SessionEvent>,
    event_rx: Mutex<Option<mpsc::UnboundedReceiver<SessionEvent>>>,
    notify_sink: Mutex<NotifySink>,
    started: AtomicBool,
}

/// The multiplexed transport session.
///
/// Create one per process at startup, pass it explicitly to every store and
/// delegate set, and tear it down with [`Session::shutdown`]. Cloning is
/// cheap and shares the same connection.
#[derive(Clone)]
pub struct Session {
    inner: Arc<SessionInner>,
}

impl Session {
    /// Create a new session for `url`.
    ///
    /// `name` is the client-visible display name used in notification
    /// strings. No connection is made until [`Session::connect`].
    pub fn new(url: &str, name: &str) -> Self {
        Self::with_delays(url, name, Duration::from_secs(1), Duration::from_secs(30))
    }

    /// Create a session from configuration
    pub fn from_config(config: &Config) -> Self {
        Self::with_delays(
            &config.endpoint,
            &config.client_name,
            config.initial_reconnect_delay(),
            config.max_reconnect_delay(),
        )
    }

    fn with_delays(
        url: &str,
        name: &str,
        initial_reconnect_delay: Duration,
        max_reconnect_delay: Duration,
    ) -> Self {
        let (command_tx, command_rx) = mpsc::unbounded_channel();
        let (status_tx, status_rx) = watch::channel(SessionStatus::Disconnected);
        let (event_tx, event_rx) = mpsc::unbounded_channel();

        let default_sink: NotifySink = Arc::new(|msg: &str| info!("{msg}"));

        Self {
            inner: Arc::new(SessionInner {
                url: url.to_string(),
                name: name.to_string(),
                initial_reconnect_delay,
                max_reconnect_delay,
                registry: Mutex::new(HashMap::new()),
                command_tx,
                command_rx: Mutex::new(Some(command_rx)),
                status_tx,
                status_rx,
                event_tx,
                event_rx: Mutex::new(Some(event_rx)),
                notify_sink: Mutex::new(default_sink),
                started: AtomicBool::new(false),
            }),
        }
    }

    /// Replace the notification sink (defaults to tracing)
    pub fn with_notify(self, sink: NotifySink) -> Self {
        *self.inner.notify_sink.lock().unwrap() = sink;
        self
    }

    /// The endpoint address this session connects to
    pub fn url(&self) -> &str {
        &self.inner.url
    }

    /// The client-visible display name
    pub fn name(&self) -> &str {
        &self.inner.name
    }

    /// Current connection status
    pub fn status(&self) -> SessionStatus {
        *self.inner.status_rx.borrow()
    }

    /// Whether the transport is currently up
    pub fn is_connected(&self) -> bool {
        self.status() == SessionStatus::Connected
    }

    /// Subscribe to status changes
    pub fn subscribe_status(&self) -> watch::Receiver<SessionStatus> {
        self.inner.status_rx.clone()
    }

    /// Take the event receiver (can only be taken once)
    pub fn take_events(&self) -> Option<mpsc::UnboundedReceiver<SessionEvent>> {
        self.inner.event_rx.lock().unwrap().take()
    }

    /// Establish the connection.
    ///
    /// Idempotent: calling while already connected or connecting spawns no
    /// second connection. Must be called from within a tokio runtime. After
    /// [`Session::shutdown`] the session stays closed.
    pub fn connect(&self) {
        if self.inner.started.swap(true, Ordering::SeqCst) {
            return;
        }
        let Some(command_rx) = self.inner.command_rx.lock().unwrap().take() else {
            return;
        };
        tokio::spawn(session_task(self.inner.clone(), command_rx));
    }

    /// Bind a store key to an inbound handler.
    ///
    /// Fails with [`SyncError::DuplicateKey`] if the key is already bound;
    /// a key maps to at most one live store per session.
    pub fn register_store(&self, key: &str, handler: StoreHandler) -> SyncResult<()> {
        let mut registry = self.inner.registry.lock().unwrap();
        if registry.contains_key(key) {
            return Err(SyncError::DuplicateKey {
                key: key.to_string(),
            });
        }
        registry.insert(key.to_string(), handler);
        Ok(())
    }

    /// Send a state payload tagged with `key`.
    ///
    /// Fails with [`SyncError::NotConnected`] when the transport is down;
    /// nothing is queued.
    pub fn send(&self, key: &str, payload: Value) -> SyncResult<()> {
        self.send_envelope(Envelope::patch(key, payload))
    }

    /// Send a pre-built envelope
    pub fn send_envelope(&self, envelope: Envelope) -> SyncResult<()> {
        if !self.is_connected() {
            return Err(SyncError::NotConnected);
        }
        self.inner
            .command_tx
            .send(Command::Send(envelope))
            .map_err(|_| SyncError::ChannelClosed)
    }

    /// Ask the remote side to re-emit the complete state for `key`.
    ///
    /// Used after reconnect or on explicit user request; the snapshot
    /// arrives later as an ordinary inbound patch.
    pub fn request_full_state(&self, key: &str) -> SyncResult<()> {
        self.send_envelope(Envelope::request_full_state(key))
    }

    /// Close the connection and end the session task
    pub fn shutdown(&self) {
        let _ = self.inner.command_tx.send(Command::Shutdown);
    }

    /// Surface a store-level error through the sink and event channel
    pub(crate) fn report_error(&self, message: String) {
        self.inner.error(message);
    }
}

impl SessionInner {
    fn set_status(&self, status: SessionStatus) {
        let _ = self.status_tx.send(status);
        let _ = self.event_tx.send(SessionEvent::StatusChanged(status));
    }

    fn notify(&self, message: &str) {
        let sink = self.notify_sink.lock().unwrap().clone();
        sink(message);
        let _ = self.event_tx.send(SessionEvent::Notice(message.to_string()));
    }

    fn error(&self, message: String) {
        warn!("{message}");
        let sink = self.notify_sink.lock().unwrap().clone();
        sink(&message);
        let _ = self.event_tx.send(SessionEvent::Error(message));
    }

    /// Route one inbound frame to its store handler.
    ///
    /// Runs on the session task, so handlers for one session execute
    /// sequentially in arrival order.
    fn dispatch(&self, data: &[u8]) {
        let envelope = match Envelope::decode(data) {
            Ok(env) => env,
            Err(e) => {
                self.error(format!("{}: undecodable inbound frame: {e}", self.name));
                return;
            }
        };

        match envelope {
            Envelope::Patch { key, payload } => {
                let registry = self.registry.lock().unwrap();
                match registry.get(&key) {
                    Some(handler) => handler(payload),
                    None => warn!("Inbound patch for unregistered store key '{key}'"),
                }
            }
            other => {
                warn!(
                    "Unexpected inbound envelope kind for key '{}'",
                    other.key()
                );
            }
        }
    }
}

/// Connection task: connect, run, reconnect with backoff until shutdown
async fn session_task(inner: Arc<SessionInner>, mut command_rx: mpsc::UnboundedReceiver<Command>) {
    let mut reconnect_delay = inner.initial_reconnect_delay;
    let mut first_attempt = true;

    loop {
        if first_attempt {
            inner.set_status(SessionStatus::Connecting);
        } else {
            inner.set_status(SessionStatus::Reconnecting);
            inner.notify(&format!("{}: reconnecting to {}", inner.name, inner.url));
        }

        match connect_async(&inner.url).await {
            Ok((ws_stream, _response)) => {
                reconnect_delay = inner.initial_reconnect_delay;
                inner.set_status(SessionStatus::Connected);
                inner.notify(&format!("{}: connected to {}", inner.name, inner.url));

                match run_connection(&inner, ws_stream, &mut command_rx).await {
                    Ok(true) => break,
                    Ok(false) => {
                        inner.notify(&format!("{}: connection lost", inner.name));
                    }
                    Err(e) => {
                        inner.error(format!("{}: connection error: {e}", inner.name));
                    }
                }
            }
            Err(e) => {
                debug!("Connect attempt to {} failed: {}", inner.url, e);
                if first_attempt {
                    inner.error(format!(
                        "{}: failed to connect to {}: {e}",
                        inner.name, inner.url
                    ));
                }
            }
        }

        first_attempt = false;
        inner.set_status(SessionStatus::Reconnecting);

        // Wait before reconnecting, but honor shutdown
        tokio::select! {
            _ = tokio::time::sleep(reconnect_delay) => {
                reconnect_delay = (reconnect_delay * 2).min(inner.max_reconnect_delay);
            }
            cmd = command_rx.recv() => {
                match cmd {
                    Some(Command::Shutdown) | None => break,
                    Some(Command::Send(_)) => {
                        // Raced a disconnect; the frame is dropped. New sends
                        // observe NotConnected until the transport is back.
                    }
                }
            }
        }
    }

    inner.set_status(SessionStatus::Disconnected);
    inner.notify(&format!("{}: session closed", inner.name));
}

/// Run one live connection until shutdown (Ok(true)) or transport loss
async fn run_connection(
    inner: &Arc<SessionInner>,
    ws_stream: WebSocketStream<MaybeTlsStream<TcpStream>>,
    command_rx: &mut mpsc::UnboundedReceiver<Command>,
) -> Result<bool> {
    let (mut write, mut read) = ws_stream.split();

    loop {
        tokio::select! {
            cmd = command_rx.recv() => {
                match cmd {
                    Some(Command::Send(envelope)) => {
                        match envelope.encode() {
                            Ok(bytes) => write.send(Message::Binary(bytes)).await?,
                            Err(e) => {
                                inner.error(format!("dropping outbound frame: {e}"));
                            }
                        }
                    }
                    Some(Command::Shutdown) | None => {
                        write.close().await.ok();
                        return Ok(true);
                    }
                }
            }
            msg = read.next() => {
                match msg {
                    Some(Ok(Message::Binary(data))) => inner.dispatch(&data),
                    Some(Ok(Message::Close(_))) | None => return Ok(false),
                    Some(Err(e)) => return Err(e.into()),
                    _ => {}
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_new_session_is_disconnected() {
        let session = Session::new("ws://localhost:9999/ws", "Backend");
        assert_eq!(session.status(), SessionStatus::Disconnected);
        assert!(!session.is_connected());
        assert_eq!(session.name(), "Backend");
    }

    #[test]
    fn test_duplicate_key_registration() {
        let session = Session::new("ws://localhost:9999/ws", "Backend");
        session
            .register_store("Orders", Box::new(|_| {}))
            .unwrap();

        let err = session
            .register_store("Orders", Box::new(|_| {}))
            .unwrap_err();
        assert!(matches!(err, SyncError::DuplicateKey { key } if key == "Orders"));
    }

    #[test]
    fn test_send_while_disconnected() {
        let session = Session::new("ws://localhost:9999/ws", "Backend");
        let err = session.send("Orders", json!({ "n": 1 })).unwrap_err();
        assert!(matches!(err, SyncError::NotConnected));

        let err = session.request_full_state("Orders").unwrap_err();
        assert!(matches!(err, SyncError::NotConnected));
    }

    #[test]
    fn test_take_events_once() {
        let session = Session::new("ws://localhost:9999/ws", "Backend");
        assert!(session.take_events().is_some());
        assert!(session.take_events().is_none());
    }

    #[test]
    fn test_status_display() {
        assert_eq!(SessionStatus::Reconnecting.to_string(), "reconnecting");
        assert_eq!(SessionStatus::Connected.as_str(), "connected");
    }
}
