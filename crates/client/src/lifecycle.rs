// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Connection lifecycle state machine.
//!
//! Pure bookkeeping, no I/O. The link task in `connection.rs` feeds open and
//! close events into a [`Lifecycle`] and acts on the returned disposition;
//! keeping the retry arithmetic here makes the backoff contract directly
//! testable.

use std::fmt;
use std::time::Duration;

use crate::config::TransportConfig;

/// WebSocket close code for an intentional, clean shutdown. A close with
/// this code suppresses automatic reconnection.
pub const NORMAL_CLOSURE: u16 = 1000;

/// Close code recorded for abnormal terminations (network drop, socket
/// error, stream ended without a close frame).
pub const ABNORMAL_CLOSURE: u16 = 1006;

/// Connection states as observed by the UI layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkState {
    Disconnected,
    Connecting,
    Open,
    Closing,
    /// Waiting out the backoff delay before the next automatic attempt.
    Reconnecting,
}

impl LinkState {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Disconnected => "disconnected",
            Self::Connecting => "connecting",
            Self::Open => "open",
            Self::Closing => "closing",
            Self::Reconnecting => "reconnecting",
        }
    }

    pub fn is_open(&self) -> bool {
        matches!(self, Self::Open)
    }
}

impl fmt::Display for LinkState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// What the link task should do after a close event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CloseDisposition {
    /// Intentional shutdown; stay disconnected.
    Finished,
    /// Abnormal closure with retry budget left; reconnect after `delay`.
    Retry { attempt: u32, delay: Duration },
    /// Retry budget exhausted; stay disconnected until a manual reconnect.
    GiveUp,
}

/// Reconnect bookkeeping for one logical connection.
#[derive(Debug)]
pub struct Lifecycle {
    attempts: u32,
    max_attempts: u32,
    base_ms: u64,
    cap_ms: u64,
}

impl Lifecycle {
    pub fn new(config: &TransportConfig) -> Self {
        Self {
            attempts: 0,
            max_attempts: config.max_reconnect_attempts,
            base_ms: config.reconnect_base_ms,
            cap_ms: config.reconnect_cap_ms,
        }
    }

    /// A successful open resets the retry budget.
    pub fn on_open(&mut self) {
        self.attempts = 0;
    }

    /// Decide what to do after the socket closed with `code`.
    pub fn on_close(&mut self, code: u16) -> CloseDisposition {
        if code == NORMAL_CLOSURE {
            return CloseDisposition::Finished;
        }
        if self.attempts >= self.max_attempts {
            return CloseDisposition::GiveUp;
        }
        self.attempts += 1;
        let ms = self.base_ms.saturating_mul(u64::from(self.attempts)).min(self.cap_ms);
        CloseDisposition::Retry { attempt: self.attempts, delay: Duration::from_millis(ms) }
    }

    /// Consecutive abnormal closures since the last successful open.
    pub fn attempts(&self) -> u32 {
        self.attempts
    }
}

#[cfg(test)]
#[path = "lifecycle_tests.rs"]
mod tests;
