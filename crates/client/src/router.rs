// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Inbound frame routing.
//!
//! Turns one raw gateway frame into a [`RouterVerdict`] for the link task to
//! act on. Protocol-level problems (malformed frames, unknown types,
//! gateway-reported errors) are logged and absorbed here — a parse failure
//! never escalates into a connection-level failure.

use crate::models::Message;
use crate::protocol::{parse_frame, Inbound, ParsedFrame};

/// What the link task should do with one inbound frame.
#[derive(Debug, Clone, PartialEq)]
pub enum RouterVerdict {
    /// Keep-alive acknowledged; refresh the last-pong timestamp.
    PongReceived,
    /// Server-initiated keep-alive; reply with a pong frame immediately.
    ReplyPong,
    /// Messages to push into the store, already stamped with the envelope's
    /// authoritative conversation id.
    Deliver { conversation_id: u64, messages: Vec<Message> },
    /// Join acknowledged by the gateway; informational.
    JoinAck { conversation_id: Option<u64>, success: bool },
    /// Nothing to do.
    Ignored,
}

/// Route one raw text frame.
pub fn route(text: &str) -> RouterVerdict {
    match parse_frame(text) {
        ParsedFrame::KeepAlive | ParsedFrame::Envelope(Inbound::Pong {}) => {
            RouterVerdict::PongReceived
        }
        ParsedFrame::Envelope(Inbound::Ping {}) => RouterVerdict::ReplyPong,
        ParsedFrame::Envelope(Inbound::ReceiveMessage { success, data }) => {
            if !success {
                tracing::debug!(
                    conversation_id = data.conversation_id,
                    "receive_message envelope flagged unsuccessful"
                );
            }
            let conversation_id = data.conversation_id;
            let mut messages = data.messages;
            for message in &mut messages {
                // The envelope's conversation id wins over whatever the
                // payload carries (it may carry nothing).
                message.conversation_id = conversation_id;
            }
            RouterVerdict::Deliver { conversation_id, messages }
        }
        ParsedFrame::Envelope(Inbound::JoinedConversation { success, conversation_id }) => {
            RouterVerdict::JoinAck { conversation_id, success }
        }
        ParsedFrame::Envelope(Inbound::Error { message }) => {
            tracing::warn!(err = %message, "gateway reported an error");
            RouterVerdict::Ignored
        }
        ParsedFrame::Unknown(kind) => {
            tracing::debug!(kind = %kind, "ignoring unrecognized gateway frame");
            RouterVerdict::Ignored
        }
        ParsedFrame::Malformed => {
            tracing::debug!("ignoring malformed gateway frame");
            RouterVerdict::Ignored
        }
    }
}

#[cfg(test)]
#[path = "router_tests.rs"]
mod tests;
