// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Wire frames exchanged with the chat gateway.
//!
//! Inbound traffic is either the bare keep-alive token `"pong"` or a JSON
//! envelope discriminated by its `type` field. Everything the gateway might
//! send that we do not recognize must parse into [`ParsedFrame::Unknown`]
//! rather than an error — unknown shapes never crash the router.

use serde::{Deserialize, Serialize};

use crate::models::{Attachment, Message};

/// Bare keep-alive token the gateway sends outside any envelope.
pub const KEEP_ALIVE_TOKEN: &str = "pong";

/// Recognized inbound envelopes.
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Inbound {
    /// Enveloped keep-alive response.
    Pong {},
    /// Server-initiated keep-alive request; answered with a pong frame.
    Ping {},
    /// One or more delivered messages for a conversation.
    ReceiveMessage {
        #[serde(default)]
        success: bool,
        data: MessageBatch,
    },
    /// Acknowledgment of a `join_conversation` command.
    JoinedConversation {
        #[serde(default)]
        success: bool,
        #[serde(default)]
        conversation_id: Option<u64>,
    },
    /// Gateway-reported error; logged and absorbed.
    Error {
        #[serde(default)]
        message: String,
    },
}

/// Payload of a `receive_message` envelope. The envelope-level
/// `conversation_id` is authoritative for every message in the batch.
#[derive(Debug, Clone, Deserialize)]
pub struct MessageBatch {
    pub conversation_id: u64,
    #[serde(default)]
    pub messages: Vec<Message>,
}

/// Outbound command frames.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Outbound {
    Ping {},
    Pong {},
    SendMessage {
        conversation_id: u64,
        receiver_id: u64,
        text: String,
        data: Vec<Attachment>,
        /// Client-minted correlation reference. The current gateway does not
        /// echo it back; it is carried for forward compatibility (see
        /// DESIGN.md on reconciliation).
        client_ref: String,
    },
    JoinConversation {
        conversation_id: u64,
    },
}

/// Result of parsing one raw inbound frame.
#[derive(Debug)]
pub enum ParsedFrame {
    /// The bare, non-enveloped keep-alive token.
    KeepAlive,
    /// A recognized envelope.
    Envelope(Inbound),
    /// Valid JSON with an unrecognized or malformed `type`/payload shape;
    /// carries the `type` value for diagnostics.
    Unknown(String),
    /// Not valid JSON and not the bare keep-alive token.
    Malformed,
}

/// Parse a raw text frame from the gateway. Never fails: anything that is
/// not a recognized shape comes back as `Unknown` or `Malformed`.
pub fn parse_frame(text: &str) -> ParsedFrame {
    if text.trim() == KEEP_ALIVE_TOKEN {
        return ParsedFrame::KeepAlive;
    }
    match serde_json::from_str::<Inbound>(text) {
        Ok(envelope) => ParsedFrame::Envelope(envelope),
        // Distinguish unrecognized envelopes from non-JSON noise so the
        // router can log something useful.
        Err(_) => match serde_json::from_str::<serde_json::Value>(text) {
            Ok(value) => {
                let kind = value
                    .get("type")
                    .and_then(|t| t.as_str())
                    .unwrap_or("<missing type>")
                    .to_owned();
                ParsedFrame::Unknown(kind)
            }
            Err(_) => ParsedFrame::Malformed,
        },
    }
}

#[cfg(test)]
#[path = "protocol_tests.rs"]
mod tests;
