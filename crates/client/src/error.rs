// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use std::fmt;

/// Why a connect attempt was refused before any socket was opened.
///
/// These are precondition failures — the credentials cannot self-heal, so no
/// retry is scheduled for them.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectError {
    /// No auth token available for the handshake.
    MissingToken,
    /// No user identifier available for the handshake.
    MissingUserId,
}

impl ConnectError {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::MissingToken => "MISSING_TOKEN",
            Self::MissingUserId => "MISSING_USER_ID",
        }
    }
}

impl fmt::Display for ConnectError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::MissingToken => f.write_str("no auth token available"),
            Self::MissingUserId => f.write_str("no user id available"),
        }
    }
}

impl std::error::Error for ConnectError {}

/// Why an outbound command was rejected without a transport write.
///
/// Commands are fire-and-forget and never queued: callers observe the
/// failure and re-issue on explicit user action.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SendError {
    /// The connection is not open.
    NotConnected,
    /// The link task has already gone away (shutdown race).
    LinkClosed,
}

impl fmt::Display for SendError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NotConnected => f.write_str("connection is not open"),
            Self::LinkClosed => f.write_str("connection link has shut down"),
        }
    }
}

impl std::error::Error for SendError {}
