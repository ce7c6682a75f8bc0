// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Interactive terminal chat loop.
//!
//! Wires the transport together the way the dashboard does: connect on
//! start, fetch the conversation list over REST, join a conversation on
//! selection, send with an optimistic local echo, and render inbound
//! messages and connection-state changes as they arrive.
//!
//! Commands: `/list`, `/join <id>`, `/reconnect`, `/quit`; anything else is
//! sent to the active conversation.

use anyhow::Context;
use tokio::io::AsyncBufReadExt;
use tokio::sync::broadcast;
use tracing::{debug, warn};

use parley_client::rest::ChatApi;
use parley_client::{
    ChatConnection, ChatEvent, ChatStore, Credentials, LinkState, TransportConfig,
};

use crate::config::Config;

/// One parsed input line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    List,
    Join(u64),
    Reconnect,
    Quit,
    Say(String),
    /// Empty line or a malformed slash command.
    Nothing,
}

/// Parse one line of user input.
pub fn parse_command(line: &str) -> Command {
    let line = line.trim();
    if line.is_empty() {
        return Command::Nothing;
    }
    if let Some(rest) = line.strip_prefix('/') {
        let mut parts = rest.split_whitespace();
        return match (parts.next(), parts.next()) {
            (Some("list"), _) => Command::List,
            (Some("join"), Some(id)) => match id.parse() {
                Ok(id) => Command::Join(id),
                Err(_) => Command::Nothing,
            },
            (Some("reconnect"), _) => Command::Reconnect,
            (Some("quit") | Some("q"), _) => Command::Quit,
            _ => Command::Nothing,
        };
    }
    Command::Say(line.to_owned())
}

/// Pick the receiver for a send in the given conversation: the counterpart
/// in a two-person thread, 0 (broadcast to the channel) for groups.
pub fn receiver_for(store: &ChatStore, conversation_id: u64, self_id: u64) -> u64 {
    store
        .conversation(conversation_id)
        .filter(|c| !c.is_group())
        .and_then(|c| c.counterpart(self_id))
        .map(|p| p.user_id)
        .unwrap_or(0)
}

/// Run the chat client until `/quit`. Returns a process exit code.
pub async fn run(config: Config) -> anyhow::Result<i32> {
    let token = config.token.clone().unwrap_or_default();
    let user_id = config.user_id.unwrap_or_default();
    let credentials = Credentials { token: token.clone(), user_id };

    let api = ChatApi::new(&config.api_url, &token)
        .context("failed to set up the chat REST client")?;
    let conn = ChatConnection::new(&config.gateway_url, credentials, TransportConfig::default());
    let mut events = conn.subscribe();
    conn.connect().context("failed to start the gateway connection")?;

    let mut store = ChatStore::new(user_id);
    match api.my_conversations().await {
        Ok(list) => {
            store.replace_conversations(list);
            print_conversations(&store);
        }
        Err(e) => warn!(err = %e, "could not fetch conversations; continuing without a list"),
    }

    let mut lines = tokio::io::BufReader::new(tokio::io::stdin()).lines();

    loop {
        tokio::select! {
            line = lines.next_line() => {
                let Ok(Some(line)) = line else { break };
                match parse_command(&line) {
                    Command::Quit => break,
                    Command::Nothing => {}
                    Command::List => print_conversations(&store),
                    Command::Reconnect => {
                        if let Err(e) = conn.reconnect() {
                            println!("! cannot reconnect: {e}");
                        }
                    }
                    Command::Join(id) => {
                        if !store.select_conversation(id) {
                            println!("! unknown conversation {id}");
                            continue;
                        }
                        if let Err(e) = conn.join_conversation(id) {
                            println!("! cannot join: {e}");
                            continue;
                        }
                        match api.conversation_messages(id).await {
                            Ok(log) => {
                                store.set_messages(id, log);
                                print_log(&store, id);
                            }
                            Err(e) => warn!(err = %e, conversation_id = id, "history fetch failed"),
                        }
                    }
                    Command::Say(text) => {
                        let Some(active) = store.active_conversation() else {
                            println!("! no conversation selected (use /join <id>)");
                            continue;
                        };
                        let receiver_id = receiver_for(&store, active, user_id);
                        match conn.send_message(active, receiver_id, &text, vec![]) {
                            Ok(local_ref) => store.push_optimistic(active, &text, vec![], local_ref),
                            // No queueing while disconnected: surface the
                            // failure and let the user retry.
                            Err(e) => println!("! cannot send: {e}"),
                        }
                    }
                }
            }

            event = events.recv() => {
                match event {
                    Ok(ChatEvent::State(state)) => print_state(state),
                    Ok(ChatEvent::Messages { conversation_id, messages }) => {
                        for message in messages {
                            println!(
                                "[{}] {}: {}",
                                conversation_id, message.sender_id, message.text
                            );
                            store.append_message(conversation_id, message);
                        }
                    }
                    Ok(ChatEvent::Joined { conversation_id, success }) => {
                        debug!(?conversation_id, success, "join acknowledged");
                    }
                    Err(broadcast::error::RecvError::Lagged(n)) => {
                        warn!(lagged = n, "event stream lagged, some messages were skipped");
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                }
            }
        }
    }

    conn.disconnect();
    Ok(0)
}

fn print_state(state: LinkState) {
    match state {
        LinkState::Open => println!("* connected"),
        LinkState::Connecting => println!("* connecting..."),
        LinkState::Reconnecting => println!("* connection lost, retrying..."),
        LinkState::Disconnected => println!("* disconnected (use /reconnect to retry)"),
        LinkState::Closing => {}
    }
}

fn print_conversations(store: &ChatStore) {
    for conversation in store.conversations() {
        let who: Vec<&str> =
            conversation.participants.iter().map(|p| p.display_name.as_str()).collect();
        let preview = conversation
            .last_message
            .as_ref()
            .map(|m| m.text.as_str())
            .unwrap_or("(no messages)");
        let unread = if conversation.unread > 0 {
            format!(" [{} unread]", conversation.unread)
        } else {
            String::new()
        };
        println!("  #{} {} — {}{}", conversation.id, who.join(", "), preview, unread);
    }
}

fn print_log(store: &ChatStore, conversation_id: u64) {
    // Stored newest-first; print oldest-first for reading order.
    for message in store.messages(conversation_id).iter().rev() {
        let marker = if message.pending { " (sending)" } else { "" };
        println!("[{}] {}: {}{}", conversation_id, message.sender_id, message.text, marker);
    }
}

#[cfg(test)]
#[path = "app_tests.rs"]
mod tests;
