// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Parley client core: realtime chat transport for the dashboard.
//!
//! One [`connection::ChatConnection`] per authenticated session owns the
//! WebSocket link to the message gateway — handshake auth via query
//! parameters, ping/pong keep-alive, linear-backoff reconnection on abnormal
//! closure — and fans inbound traffic out as typed [`connection::ChatEvent`]s.
//! Conversation history arrives over REST ([`rest::ChatApi`]); the
//! [`store::ChatStore`] holds the normalized conversation and message state
//! the UI renders from, including optimistic local echoes.

pub mod config;
pub mod connection;
pub mod error;
pub mod lifecycle;
pub mod models;
pub mod protocol;
pub mod rest;
pub mod router;
pub mod store;

pub use config::TransportConfig;
pub use connection::{ChatConnection, ChatEvent, Credentials};
pub use error::{ConnectError, SendError};
pub use lifecycle::LinkState;
pub use store::ChatStore;
