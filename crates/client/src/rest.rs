// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! REST collaborators consumed by the chat core.
//!
//! Message history lives server-side: the conversation list is fetched in
//! bulk on startup and a thread's log lazily on first selection. Both are
//! simple bearer-authenticated request/response calls — retry policy is the
//! caller's concern, not the transport core's.

use std::time::Duration;

use anyhow::Context;

use crate::models::{Conversation, Message};

/// Thin client for the chat REST endpoints.
pub struct ChatApi {
    http: reqwest::Client,
    base_url: String,
    token: String,
}

impl ChatApi {
    /// Fails when the underlying HTTP client cannot be built, typically
    /// because no TLS crypto provider has been installed.
    pub fn new(base_url: &str, token: &str) -> anyhow::Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(10))
            .build()
            .context("failed to build the chat REST client")?;
        Ok(Self {
            http,
            base_url: base_url.trim_end_matches('/').to_owned(),
            token: token.to_owned(),
        })
    }

    /// Fetch the signed-in user's conversations, in the server's order
    /// (most recent activity first).
    pub async fn my_conversations(&self) -> anyhow::Result<Vec<Conversation>> {
        let url = format!("{}/api/v1/chat/conversations", self.base_url);
        let resp = self.http.get(&url).bearer_auth(&self.token).send().await?;
        Ok(resp.error_for_status()?.json().await?)
    }

    /// Fetch the full message log for one conversation.
    pub async fn conversation_messages(
        &self,
        conversation_id: u64,
    ) -> anyhow::Result<Vec<Message>> {
        let url =
            format!("{}/api/v1/chat/conversations/{conversation_id}/messages", self.base_url);
        let resp = self.http.get(&url).bearer_auth(&self.token).send().await?;
        Ok(resp.error_for_status()?.json().await?)
    }
}

#[cfg(test)]
#[path = "rest_tests.rs"]
mod tests;
