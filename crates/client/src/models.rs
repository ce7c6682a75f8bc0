// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Chat domain types shared between the transport, store, and REST layers.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// One participant in a conversation.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Participant {
    pub user_id: u64,
    #[serde(default)]
    pub display_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub avatar_url: Option<String>,
}

/// Metadata present only on group conversations.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct GroupInfo {
    #[serde(default)]
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub avatar_url: Option<String>,
}

/// A chat thread between two or more participants.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Conversation {
    pub id: u64,
    #[serde(default)]
    pub participants: Vec<Participant>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub group: Option<GroupInfo>,
    /// Most recent message, for list previews.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_message: Option<Message>,
    #[serde(default)]
    pub unread: u32,
}

impl Conversation {
    /// True for threads with group metadata (more than two participants).
    pub fn is_group(&self) -> bool {
        self.group.is_some()
    }

    /// The other party in a two-person thread, from `self_id`'s perspective.
    pub fn counterpart(&self, self_id: u64) -> Option<&Participant> {
        self.participants.iter().find(|p| p.user_id != self_id)
    }
}

/// A file attached to a message.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Attachment {
    #[serde(default)]
    pub name: String,
    pub url: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mime: Option<String>,
}

/// A single chat message.
///
/// `id` is server-assigned. An optimistic local echo has no `id` yet: it
/// carries a client-minted `local_ref` and the `pending` flag until the
/// confirmed copy arrives and the store reconciles the two. `local_ref` and
/// `pending` never travel on the wire.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Message {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<u64>,
    #[serde(skip)]
    pub local_ref: Option<Uuid>,
    #[serde(default)]
    pub conversation_id: u64,
    #[serde(default)]
    pub sender_id: u64,
    #[serde(default)]
    pub text: String,
    #[serde(default)]
    pub attachments: Vec<Attachment>,
    #[serde(default)]
    pub created_at_ms: u64,
    #[serde(default)]
    pub updated_at_ms: u64,
    #[serde(skip)]
    pub pending: bool,
}

/// Return current epoch millis.
pub fn epoch_ms() -> u64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as u64
}
