// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use std::time::Duration;

/// Timing knobs for the chat transport.
///
/// Defaults match the gateway contract: 30s ping cadence with a 10s pong
/// grace window, and a linear reconnect backoff of `min(3s * attempt, 15s)`
/// capped at 5 automatic attempts.
#[derive(Debug, Clone)]
pub struct TransportConfig {
    /// Keep-alive ping cadence in milliseconds.
    pub ping_interval_ms: u64,

    /// How long after a ping before a missing pong is flagged, in milliseconds.
    pub pong_timeout_ms: u64,

    /// Base reconnect delay in milliseconds (multiplied by the attempt number).
    pub reconnect_base_ms: u64,

    /// Ceiling on the reconnect delay in milliseconds.
    pub reconnect_cap_ms: u64,

    /// Max automatic reconnect attempts before requiring a manual reconnect.
    pub max_reconnect_attempts: u32,
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            ping_interval_ms: 30_000,
            pong_timeout_ms: 10_000,
            reconnect_base_ms: 3_000,
            reconnect_cap_ms: 15_000,
            max_reconnect_attempts: 5,
        }
    }
}

impl TransportConfig {
    pub fn ping_interval(&self) -> Duration {
        Duration::from_millis(self.ping_interval_ms)
    }

    pub fn pong_timeout(&self) -> Duration {
        Duration::from_millis(self.pong_timeout_ms)
    }

    /// Delay before reconnect attempt `attempt` (1-based): linear backoff
    /// with a ceiling, not exponential.
    pub fn reconnect_delay(&self, attempt: u32) -> Duration {
        let ms = self.reconnect_base_ms.saturating_mul(u64::from(attempt));
        Duration::from_millis(ms.min(self.reconnect_cap_ms))
    }
}

#[cfg(test)]
#[path = "config_tests.rs"]
mod tests;
