// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Test harness for end-to-end transport tests.
//!
//! Runs an in-process fake chat gateway: a real WebSocket listener that
//! captures handshake URIs, records the frames each client sends, and lets
//! tests script deliveries, clean closes, and abrupt drops.

use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use futures_util::{SinkExt, StreamExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::{mpsc, watch};
use tokio_tungstenite::tungstenite::protocol::frame::coding::CloseCode;
use tokio_tungstenite::tungstenite::protocol::CloseFrame;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::WebSocketStream;

use parley_client::LinkState;

const RECV_TIMEOUT: Duration = Duration::from_secs(5);

/// Wait until the connection reports `want`, or fail after `timeout`.
pub async fn wait_for_state(
    rx: &mut watch::Receiver<LinkState>,
    want: LinkState,
    timeout: Duration,
) -> anyhow::Result<()> {
    let result = tokio::time::timeout(timeout, rx.wait_for(|s| *s == want))
        .await
        .map_err(|_| anyhow::anyhow!("timed out waiting for state {want}"))?;
    result.map_err(|_| anyhow::anyhow!("state channel closed"))?;
    Ok(())
}

enum Directive {
    Text(String),
    /// Close handshake with the normal-closure code.
    CloseNormal,
    /// Drop the TCP stream without a close frame (simulates a network drop).
    Abort,
}

/// One accepted gateway-side connection.
pub struct GatewayConn {
    /// Handshake request URI, including the auth query parameters.
    pub uri: String,
    directives: mpsc::UnboundedSender<Directive>,
    inbound: mpsc::UnboundedReceiver<String>,
}

impl GatewayConn {
    /// Deliver a raw text frame to the client.
    pub fn send(&self, text: &str) {
        let _ = self.directives.send(Directive::Text(text.to_owned()));
    }

    /// Close cleanly with the normal-closure code.
    pub fn close_normal(&self) {
        let _ = self.directives.send(Directive::CloseNormal);
    }

    /// Drop the connection abruptly, as a network failure would.
    pub fn abort(&self) {
        let _ = self.directives.send(Directive::Abort);
    }

    /// Next raw text frame received from the client.
    pub async fn recv(&mut self) -> Option<String> {
        tokio::time::timeout(RECV_TIMEOUT, self.inbound.recv()).await.ok().flatten()
    }

    /// Next command frame from the client, skipping keep-alive pings.
    pub async fn recv_command(&mut self) -> Option<serde_json::Value> {
        while let Some(text) = self.recv().await {
            let Ok(value) = serde_json::from_str::<serde_json::Value>(&text) else {
                continue;
            };
            if value.get("type").and_then(|t| t.as_str()) == Some("ping") {
                continue;
            }
            return Some(value);
        }
        None
    }

    /// True if no frame arrives within `window`.
    pub async fn silent_for(&mut self, window: Duration) -> bool {
        tokio::time::timeout(window, self.inbound.recv()).await.is_err()
    }
}

/// An in-process fake chat gateway, torn down on drop.
pub struct FakeGateway {
    addr: SocketAddr,
    conns: mpsc::UnboundedReceiver<GatewayConn>,
    rejecting: Arc<AtomicBool>,
}

impl FakeGateway {
    pub async fn spawn() -> anyhow::Result<Self> {
        let listener = TcpListener::bind("127.0.0.1:0").await?;
        let addr = listener.local_addr()?;
        let (conns_tx, conns) = mpsc::unbounded_channel();
        let rejecting = Arc::new(AtomicBool::new(false));
        let reject_flag = rejecting.clone();

        tokio::spawn(async move {
            loop {
                let Ok((stream, _peer)) = listener.accept().await else {
                    break;
                };
                let conns_tx = conns_tx.clone();
                let reject_flag = reject_flag.clone();
                tokio::spawn(async move {
                    accept_conn(stream, conns_tx, reject_flag.load(Ordering::SeqCst)).await;
                });
            }
        });

        Ok(Self { addr, conns, rejecting })
    }

    /// While set, handshakes are answered with an HTTP error. Each rejected
    /// attempt still surfaces through `next_conn` with its URI, but with no
    /// live frame channels.
    pub fn reject_handshakes(&self, on: bool) {
        self.rejecting.store(on, Ordering::SeqCst);
    }

    /// Base URL the client should be pointed at.
    pub fn url(&self) -> String {
        format!("http://{}", self.addr)
    }

    /// Next accepted connection, or an error after a generous timeout.
    pub async fn next_conn(&mut self) -> anyhow::Result<GatewayConn> {
        tokio::time::timeout(RECV_TIMEOUT, self.conns.recv())
            .await
            .map_err(|_| anyhow::anyhow!("no connection arrived"))?
            .context("gateway accept loop ended")
    }

    /// Assert-style helper: true if no new connection arrives within `window`.
    pub async fn no_conn_within(&mut self, window: Duration) -> bool {
        tokio::time::timeout(window, self.conns.recv()).await.is_err()
    }
}

async fn accept_conn(stream: TcpStream, conns_tx: mpsc::UnboundedSender<GatewayConn>, reject: bool) {
    use tokio_tungstenite::tungstenite::handshake::server::{ErrorResponse, Request, Response};
    use tokio_tungstenite::tungstenite::http::StatusCode;

    let mut uri = String::new();

    if reject {
        let callback = |req: &Request, _resp: Response| {
            uri = req.uri().to_string();
            let mut err = ErrorResponse::new(None);
            *err.status_mut() = StatusCode::SERVICE_UNAVAILABLE;
            Err(err)
        };
        let _ = tokio_tungstenite::accept_hdr_async(stream, callback).await;
        // Report the attempt with dead channels so tests can count it.
        let (directives_tx, _) = mpsc::unbounded_channel();
        let (_, inbound_rx) = mpsc::unbounded_channel();
        let _ = conns_tx.send(GatewayConn { uri, directives: directives_tx, inbound: inbound_rx });
        return;
    }

    let callback = |req: &Request, resp: Response| {
        uri = req.uri().to_string();
        Ok(resp)
    };
    let Ok(ws) = tokio_tungstenite::accept_hdr_async(stream, callback).await else {
        return;
    };

    let (directives_tx, directives_rx) = mpsc::unbounded_channel();
    let (inbound_tx, inbound_rx) = mpsc::unbounded_channel();
    if conns_tx
        .send(GatewayConn { uri, directives: directives_tx, inbound: inbound_rx })
        .is_err()
    {
        return;
    }
    run_conn(ws, directives_rx, inbound_tx).await;
}

async fn run_conn(
    ws: WebSocketStream<TcpStream>,
    mut directives: mpsc::UnboundedReceiver<Directive>,
    inbound_tx: mpsc::UnboundedSender<String>,
) {
    let (mut tx, mut rx) = ws.split();
    loop {
        tokio::select! {
            directive = directives.recv() => match directive {
                Some(Directive::Text(text)) => {
                    if tx.send(Message::Text(text.into())).await.is_err() {
                        break;
                    }
                }
                Some(Directive::CloseNormal) => {
                    let _ = tx
                        .send(Message::Close(Some(CloseFrame {
                            code: CloseCode::Normal,
                            reason: "".into(),
                        })))
                        .await;
                    break;
                }
                // Dropping both halves without a close frame resets the TCP
                // stream, which the client observes as an abnormal closure.
                Some(Directive::Abort) | None => break,
            },
            msg = rx.next() => match msg {
                Some(Ok(Message::Text(text))) => {
                    let _ = inbound_tx.send(text.to_string());
                }
                Some(Ok(Message::Close(_))) | None => break,
                Some(Ok(_)) => {}
                Some(Err(_)) => break,
            },
        }
    }
}
