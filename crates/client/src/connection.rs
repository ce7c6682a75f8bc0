// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Chat gateway connection manager.
//!
//! One [`ChatConnection`] per authenticated session owns the WebSocket link:
//! it opens the socket with credentials embedded in the handshake query,
//! runs the keep-alive ping/pong exchange, reconnects with linear backoff on
//! abnormal closure, and fans inbound traffic out as [`ChatEvent`]s. No
//! other component ever touches the raw socket — commands go in through
//! [`ChatConnection::send_message`] / [`ChatConnection::join_conversation`],
//! events come out of [`ChatConnection::subscribe`].
//!
//! All operations return immediately; completion or failure is observed via
//! the state watch and the event channel, never by blocking.

use std::time::Instant;

use futures_util::{SinkExt, StreamExt};
use parking_lot::Mutex;
use percent_encoding::{utf8_percent_encode, AsciiSet, NON_ALPHANUMERIC};
use tokio::sync::{broadcast, mpsc, watch};
use tokio_tungstenite::tungstenite::protocol::frame::coding::CloseCode;
use tokio_tungstenite::tungstenite::protocol::CloseFrame;
use tokio_tungstenite::tungstenite::Message as WsMessage;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use crate::config::TransportConfig;
use crate::error::{ConnectError, SendError};
use crate::lifecycle::{CloseDisposition, Lifecycle, LinkState, ABNORMAL_CLOSURE, NORMAL_CLOSURE};
use crate::models::{Attachment, Message};
use crate::protocol::Outbound;
use crate::router::{route, RouterVerdict};

/// Credentials carried in the handshake query. The transport supports no
/// custom headers at connect time, so the URL is the only vehicle.
#[derive(Debug, Clone)]
pub struct Credentials {
    pub token: String,
    pub user_id: u64,
}

/// Events fanned out to the application layer.
#[derive(Debug, Clone)]
pub enum ChatEvent {
    /// Connection state changed; drives the UI status indicator.
    State(LinkState),
    /// Messages delivered for a conversation, already stamped with the
    /// authoritative conversation id.
    Messages { conversation_id: u64, messages: Vec<Message> },
    /// Join acknowledged by the gateway.
    Joined { conversation_id: Option<u64>, success: bool },
}

/// Handles for one spawned link. Superseding or disconnecting cancels the
/// token, which is the only way the task's timers and socket can outlive
/// their connection.
struct Link {
    cancel: CancellationToken,
    outbound_tx: mpsc::UnboundedSender<Outbound>,
}

impl Drop for Link {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

/// Singleton connection manager for one authenticated session.
pub struct ChatConnection {
    endpoint: String,
    credentials: Credentials,
    config: TransportConfig,
    state_tx: watch::Sender<LinkState>,
    events_tx: broadcast::Sender<ChatEvent>,
    link: Mutex<Option<Link>>,
}

impl ChatConnection {
    /// Create a manager in the `Disconnected` state. Nothing touches the
    /// network until [`ChatConnection::connect`].
    pub fn new(endpoint: &str, credentials: Credentials, config: TransportConfig) -> Self {
        let (state_tx, _) = watch::channel(LinkState::Disconnected);
        let (events_tx, _) = broadcast::channel(256);
        Self {
            endpoint: endpoint.to_owned(),
            credentials,
            config,
            state_tx,
            events_tx,
            link: Mutex::new(None),
        }
    }

    /// Open the gateway link. Any prior link is torn down first — at most
    /// one live socket exists at a time.
    ///
    /// Fails fast without touching the network when credentials are absent;
    /// that precondition cannot self-heal, so no retry is scheduled.
    pub fn connect(&self) -> Result<(), ConnectError> {
        if self.credentials.token.is_empty() {
            return Err(ConnectError::MissingToken);
        }
        if self.credentials.user_id == 0 {
            return Err(ConnectError::MissingUserId);
        }

        // Tear down any prior link before opening a new one.
        self.drop_link();

        let cancel = CancellationToken::new();
        let (outbound_tx, outbound_rx) = mpsc::unbounded_channel();
        *self.link.lock() = Some(Link { cancel: cancel.clone(), outbound_tx });

        let url = gateway_ws_url(&self.endpoint, &self.credentials);
        let config = self.config.clone();
        let state_tx = self.state_tx.clone();
        let events_tx = self.events_tx.clone();
        tokio::spawn(async move {
            run_link(url, config, state_tx, events_tx, outbound_rx, cancel).await;
        });
        Ok(())
    }

    /// Intentional shutdown: close with the normal-closure code so no
    /// automatic reconnection is attempted, cancel all timers, clear the
    /// stored handle.
    pub fn disconnect(&self) {
        if self.drop_link() {
            set_state(&self.state_tx, &self.events_tx, LinkState::Closing);
        }
        set_state(&self.state_tx, &self.events_tx, LinkState::Disconnected);
    }

    /// Manual recovery: tear down and immediately reconnect, bypassing
    /// backoff. Used by the UI retry action once automatic attempts are
    /// exhausted.
    pub fn reconnect(&self) -> Result<(), ConnectError> {
        self.disconnect();
        self.connect()
    }

    /// Current connection state.
    pub fn state(&self) -> LinkState {
        *self.state_tx.borrow()
    }

    /// Watch connection state transitions (for the UI status indicator).
    pub fn watch_state(&self) -> watch::Receiver<LinkState> {
        self.state_tx.subscribe()
    }

    /// Subscribe to chat events.
    pub fn subscribe(&self) -> broadcast::Receiver<ChatEvent> {
        self.events_tx.subscribe()
    }

    /// Send a chat message. Fire-and-forget: returns the client correlation
    /// reference for the caller's optimistic echo; delivery confirmation
    /// arrives later through the event channel.
    ///
    /// Fails fast with no transport write unless the connection is open.
    pub fn send_message(
        &self,
        conversation_id: u64,
        receiver_id: u64,
        text: &str,
        attachments: Vec<Attachment>,
    ) -> Result<Uuid, SendError> {
        let client_ref = Uuid::new_v4();
        self.command(Outbound::SendMessage {
            conversation_id,
            receiver_id,
            text: text.to_owned(),
            data: attachments,
            client_ref: client_ref.to_string(),
        })?;
        Ok(client_ref)
    }

    /// Join a conversation's channel. Safe to call on every selection — the
    /// gateway treats a repeated join as a no-op.
    pub fn join_conversation(&self, conversation_id: u64) -> Result<(), SendError> {
        self.command(Outbound::JoinConversation { conversation_id })
    }

    fn command(&self, frame: Outbound) -> Result<(), SendError> {
        if !self.state().is_open() {
            return Err(SendError::NotConnected);
        }
        let guard = self.link.lock();
        match guard.as_ref() {
            Some(link) => link.outbound_tx.send(frame).map_err(|_| SendError::LinkClosed),
            None => Err(SendError::NotConnected),
        }
    }

    /// Cancel and clear the current link, if any. Returns whether one existed.
    fn drop_link(&self) -> bool {
        self.link.lock().take().is_some()
    }
}

impl Drop for ChatConnection {
    fn drop(&mut self) {
        self.drop_link();
    }
}

/// Query-value encoding: everything but RFC 3986 unreserved characters.
/// Tokens can carry `&`, `#`, `+`, or spaces and must not corrupt the URL.
const QUERY_VALUE: &AsciiSet =
    &NON_ALPHANUMERIC.remove(b'-').remove(b'_').remove(b'.').remove(b'~');

/// Build the gateway WebSocket URL with the bearer token and user id as
/// query parameters.
fn gateway_ws_url(endpoint: &str, credentials: &Credentials) -> String {
    let base = endpoint.trim_end_matches('/');
    let ws_base = if let Some(rest) = base.strip_prefix("https://") {
        format!("wss://{rest}")
    } else if let Some(rest) = base.strip_prefix("http://") {
        format!("ws://{rest}")
    } else {
        base.to_owned()
    };
    let token = utf8_percent_encode(&credentials.token, QUERY_VALUE);
    format!("{ws_base}/chat?token={token}&user_id={}", credentials.user_id)
}

fn set_state(
    state_tx: &watch::Sender<LinkState>,
    events_tx: &broadcast::Sender<ChatEvent>,
    next: LinkState,
) {
    let prev = *state_tx.borrow();
    if prev != next {
        state_tx.send_replace(next);
        tracing::debug!(prev = %prev, next = %next, "link state");
        let _ = events_tx.send(ChatEvent::State(next));
    }
}

/// Connect-and-retry loop for one logical link. Runs until cancelled, an
/// intentional close, or the retry budget is spent.
///
/// State writes are gated on this link's own cancel token: a superseded
/// link must never stamp its state over the one that replaced it.
async fn run_link(
    url: String,
    config: TransportConfig,
    state_tx: watch::Sender<LinkState>,
    events_tx: broadcast::Sender<ChatEvent>,
    mut outbound_rx: mpsc::UnboundedReceiver<Outbound>,
    cancel: CancellationToken,
) {
    let mut lifecycle = Lifecycle::new(&config);
    let set = |next: LinkState| {
        if !cancel.is_cancelled() {
            set_state(&state_tx, &events_tx, next);
        }
    };

    loop {
        if cancel.is_cancelled() {
            break;
        }
        set(LinkState::Connecting);

        let connected = tokio::select! {
            _ = cancel.cancelled() => break,
            result = tokio_tungstenite::connect_async(&url) => result,
        };

        let close_code = match connected {
            Ok((stream, _response)) => {
                lifecycle.on_open();
                set(LinkState::Open);
                tracing::info!("chat gateway connected");
                let code =
                    drive_open_link(stream, &config, &events_tx, &mut outbound_rx, &cancel).await;
                set(LinkState::Disconnected);
                code
            }
            Err(e) => {
                tracing::warn!(err = %e, "chat gateway connect failed");
                set(LinkState::Disconnected);
                ABNORMAL_CLOSURE
            }
        };

        match lifecycle.on_close(close_code) {
            CloseDisposition::Finished => break,
            CloseDisposition::GiveUp => {
                tracing::warn!(
                    attempts = lifecycle.attempts(),
                    "reconnect attempts exhausted; waiting for manual reconnect"
                );
                break;
            }
            CloseDisposition::Retry { attempt, delay } => {
                set(LinkState::Reconnecting);
                tracing::info!(
                    attempt,
                    delay_ms = delay.as_millis() as u64,
                    "reconnecting after abnormal closure"
                );
                tokio::select! {
                    _ = cancel.cancelled() => break,
                    _ = tokio::time::sleep(delay) => {}
                }
            }
        }
    }

    set(LinkState::Disconnected);
}

/// I/O loop for one open socket. Returns the close code that ended it.
async fn drive_open_link(
    stream: tokio_tungstenite::WebSocketStream<
        tokio_tungstenite::MaybeTlsStream<tokio::net::TcpStream>,
    >,
    config: &TransportConfig,
    events_tx: &broadcast::Sender<ChatEvent>,
    outbound_rx: &mut mpsc::UnboundedReceiver<Outbound>,
    cancel: &CancellationToken,
) -> u16 {
    let (mut ws_tx, mut ws_rx) = stream.split();

    let mut ping_interval = tokio::time::interval(config.ping_interval());
    ping_interval.tick().await; // Consume the immediate first tick.

    let mut last_pong = Instant::now();
    // Armed after each ping; a pong (bare or enveloped) disarms it. Overdue
    // pongs are advisory — logged, not escalated.
    let mut pong_deadline: Option<tokio::time::Instant> = None;

    loop {
        let deadline = pong_deadline;
        tokio::select! {
            _ = cancel.cancelled() => {
                let _ = ws_tx
                    .send(WsMessage::Close(Some(CloseFrame {
                        code: CloseCode::Normal,
                        reason: "".into(),
                    })))
                    .await;
                return NORMAL_CLOSURE;
            }

            frame = outbound_rx.recv() => {
                match frame {
                    Some(out) => {
                        if send_frame(&mut ws_tx, &out).await.is_err() {
                            return ABNORMAL_CLOSURE;
                        }
                    }
                    // Handle dropped without a cancel: treat as shutdown.
                    None => {
                        let _ = ws_tx
                            .send(WsMessage::Close(Some(CloseFrame {
                                code: CloseCode::Normal,
                                reason: "".into(),
                            })))
                            .await;
                        return NORMAL_CLOSURE;
                    }
                }
            }

            msg = ws_rx.next() => {
                match msg {
                    Some(Ok(WsMessage::Text(text))) => match route(&text) {
                        RouterVerdict::PongReceived => {
                            last_pong = Instant::now();
                            pong_deadline = None;
                        }
                        RouterVerdict::ReplyPong => {
                            if send_frame(&mut ws_tx, &Outbound::Pong {}).await.is_err() {
                                return ABNORMAL_CLOSURE;
                            }
                        }
                        RouterVerdict::Deliver { conversation_id, messages } => {
                            let _ = events_tx
                                .send(ChatEvent::Messages { conversation_id, messages });
                        }
                        RouterVerdict::JoinAck { conversation_id, success } => {
                            tracing::debug!(?conversation_id, success, "join acknowledged");
                            let _ = events_tx.send(ChatEvent::Joined { conversation_id, success });
                        }
                        RouterVerdict::Ignored => {}
                    },
                    // Transport-level keep-alive, for gateways that use
                    // native ping/pong frames instead of the JSON tokens.
                    Some(Ok(WsMessage::Ping(payload))) => {
                        let _ = ws_tx.send(WsMessage::Pong(payload)).await;
                    }
                    Some(Ok(WsMessage::Pong(_))) => {
                        last_pong = Instant::now();
                        pong_deadline = None;
                    }
                    Some(Ok(WsMessage::Close(frame))) => {
                        let code = frame.map(|f| u16::from(f.code)).unwrap_or(ABNORMAL_CLOSURE);
                        tracing::info!(code, "chat gateway closed the connection");
                        return code;
                    }
                    Some(Ok(_)) => {} // Binary frames ignored.
                    Some(Err(e)) => {
                        // Errors are logged but it is the stream ending that
                        // drives the state machine; tungstenite yields no
                        // further frames after an error, so record an
                        // abnormal closure here.
                        tracing::warn!(err = %e, "chat gateway socket error");
                        return ABNORMAL_CLOSURE;
                    }
                    None => {
                        tracing::info!("chat gateway stream ended without close frame");
                        return ABNORMAL_CLOSURE;
                    }
                }
            }

            _ = ping_interval.tick() => {
                if send_frame(&mut ws_tx, &Outbound::Ping {}).await.is_err() {
                    return ABNORMAL_CLOSURE;
                }
                pong_deadline = Some(tokio::time::Instant::now() + config.pong_timeout());
            }

            _ = async {
                match deadline {
                    Some(at) => tokio::time::sleep_until(at).await,
                    None => std::future::pending::<()>().await,
                }
            } => {
                tracing::warn!(
                    since_last_pong_ms = last_pong.elapsed().as_millis() as u64,
                    "pong overdue; connection suspect"
                );
                pong_deadline = None;
            }
        }
    }
}

/// Serialize and transmit one outbound frame.
async fn send_frame<S>(ws_tx: &mut S, frame: &Outbound) -> Result<(), ()>
where
    S: SinkExt<WsMessage> + Unpin,
{
    let text = match serde_json::to_string(frame) {
        Ok(text) => text,
        Err(e) => {
            tracing::error!(err = %e, "failed to serialize outbound frame");
            return Ok(()); // Drop the frame; the link itself is fine.
        }
    };
    ws_tx.send(WsMessage::Text(text.into())).await.map_err(|_| {
        tracing::warn!("chat gateway send failed");
    })
}

#[cfg(test)]
#[path = "connection_tests.rs"]
mod tests;
