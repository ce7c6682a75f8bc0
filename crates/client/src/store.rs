// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Normalized conversation and message state.
//!
//! The store keeps the conversation list in server order (most recent
//! activity first) and each conversation's message log newest-first.
//! Display-order sorting is a presentation concern layered on top.
//!
//! Sends are echoed optimistically: [`ChatStore::push_optimistic`] inserts a
//! pending message under a client-minted reference, and the server-confirmed
//! copy later replaces it — by `local_ref` when the caller still has it, or
//! by the heuristic in [`ChatStore::append_message`] otherwise. Either way a
//! logical send ends up as exactly one stored message.

use std::collections::HashMap;

use indexmap::IndexMap;
use uuid::Uuid;

use crate::models::{epoch_ms, Attachment, Conversation, Message};

/// How far apart (ms) a pending echo and a confirmed copy may be created and
/// still match heuristically. The gateway does not echo `client_ref`, so
/// conversation + sender + text + temporal proximity is the fallback key.
const RECONCILE_WINDOW_MS: u64 = 30_000;

/// Client-side conversation and message state for one signed-in user.
#[derive(Debug, Default)]
pub struct ChatStore {
    /// Signed-in user id; own messages never bump unread counters.
    self_id: u64,
    /// Conversations in server order.
    conversations: IndexMap<u64, Conversation>,
    /// Per-conversation message logs, newest first.
    messages: HashMap<u64, Vec<Message>>,
    active: Option<u64>,
}

impl ChatStore {
    pub fn new(self_id: u64) -> Self {
        Self { self_id, ..Self::default() }
    }

    // -- Conversations -------------------------------------------------------

    /// Replace the known conversation set with a freshly fetched list,
    /// preserving the server's ordering. Message logs for conversations that
    /// survive the replacement are kept.
    pub fn replace_conversations(&mut self, list: Vec<Conversation>) {
        self.conversations = list.into_iter().map(|c| (c.id, c)).collect();
        self.messages.retain(|id, _| self.conversations.contains_key(id));
        if let Some(active) = self.active {
            if !self.conversations.contains_key(&active) {
                self.active = None;
            }
        }
    }

    pub fn conversations(&self) -> impl Iterator<Item = &Conversation> {
        self.conversations.values()
    }

    pub fn conversation(&self, id: u64) -> Option<&Conversation> {
        self.conversations.get(&id)
    }

    /// Set the active conversation pointer and clear its unread counter.
    /// Returns false if the conversation is unknown. Fetching the message
    /// log is the caller's job.
    pub fn select_conversation(&mut self, id: u64) -> bool {
        match self.conversations.get_mut(&id) {
            Some(conversation) => {
                conversation.unread = 0;
                self.active = Some(id);
                true
            }
            None => false,
        }
    }

    pub fn active_conversation(&self) -> Option<u64> {
        self.active
    }

    // -- Messages ------------------------------------------------------------

    /// Adopt a REST-fetched message log for one conversation, newest first.
    pub fn set_messages(&mut self, conversation_id: u64, mut log: Vec<Message>) {
        log.sort_by(|a, b| b.created_at_ms.cmp(&a.created_at_ms));
        self.messages.insert(conversation_id, log);
    }

    /// Message log for a conversation, newest first.
    pub fn messages(&self, conversation_id: u64) -> &[Message] {
        self.messages.get(&conversation_id).map(Vec::as_slice).unwrap_or_default()
    }

    /// Insert an inbound message, reconciling against any matching pending
    /// echo instead of double-inserting. Updates the conversation's
    /// last-message preview and unread counter.
    pub fn append_message(&mut self, conversation_id: u64, message: Message) {
        let log = self.messages.entry(conversation_id).or_default();

        // A message we already hold by server id is an update, not a new entry.
        if let Some(id) = message.id {
            if let Some(existing) = log.iter_mut().find(|m| m.id == Some(id)) {
                *existing = message;
                return;
            }
        }

        // Heuristic reconciliation with an optimistic echo.
        if let Some(pending) = log.iter_mut().find(|m| {
            m.pending
                && m.sender_id == message.sender_id
                && m.text == message.text
                && m.created_at_ms.abs_diff(message.created_at_ms) <= RECONCILE_WINDOW_MS
        }) {
            *pending = message;
            self.refresh_preview(conversation_id);
            return;
        }

        let from_self = message.sender_id == self.self_id;
        log.insert(0, message);
        self.refresh_preview(conversation_id);
        if !from_self && self.active != Some(conversation_id) {
            if let Some(conversation) = self.conversations.get_mut(&conversation_id) {
                conversation.unread = conversation.unread.saturating_add(1);
            }
        }
    }

    /// Insert a pending local echo for an outgoing send. `local_ref` is the
    /// correlation reference minted for the outbound frame.
    pub fn push_optimistic(
        &mut self,
        conversation_id: u64,
        text: &str,
        attachments: Vec<Attachment>,
        local_ref: Uuid,
    ) {
        let now = epoch_ms();
        let message = Message {
            id: None,
            local_ref: Some(local_ref),
            conversation_id,
            sender_id: self.self_id,
            text: text.to_owned(),
            attachments,
            created_at_ms: now,
            updated_at_ms: now,
            pending: true,
        };
        self.messages.entry(conversation_id).or_default().insert(0, message);
        self.refresh_preview(conversation_id);
    }

    /// Replace the pending echo identified by `local_ref` with the
    /// server-confirmed copy. Falls back to a plain append when the echo is
    /// no longer present (already reconciled heuristically, or dropped).
    pub fn confirm(&mut self, local_ref: Uuid, server_message: Message) {
        let conversation_id = server_message.conversation_id;
        let log = self.messages.entry(conversation_id).or_default();
        match log.iter_mut().find(|m| m.local_ref == Some(local_ref)) {
            Some(pending) => {
                *pending = server_message;
                self.refresh_preview(conversation_id);
            }
            None => self.append_message(conversation_id, server_message),
        }
    }

    /// True while any message in the conversation still awaits confirmation.
    pub fn has_pending(&self, conversation_id: u64) -> bool {
        self.messages(conversation_id).iter().any(|m| m.pending)
    }

    /// Recompute the conversation's last-message preview from the newest
    /// entry by created timestamp.
    fn refresh_preview(&mut self, conversation_id: u64) {
        let newest = self
            .messages
            .get(&conversation_id)
            .and_then(|log| log.iter().max_by_key(|m| m.created_at_ms))
            .cloned();
        if let Some(conversation) = self.conversations.get_mut(&conversation_id) {
            conversation.last_message = newest;
        }
    }
}

#[cfg(test)]
#[path = "store_tests.rs"]
mod tests;
