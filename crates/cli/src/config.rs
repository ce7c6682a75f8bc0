// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

/// Configuration for the parley terminal chat client.
#[derive(Debug, Clone, clap::Parser)]
#[command(
    name = "parley",
    about = "Terminal client for the dashboard chat gateway.\nQuit with /quit."
)]
pub struct Config {
    /// Chat gateway base URL (http(s):// or ws(s)://).
    #[arg(long, default_value = "http://127.0.0.1:9443", env = "PARLEY_GATEWAY_URL")]
    pub gateway_url: String,

    /// REST API base URL for conversation and message history.
    #[arg(long, default_value = "http://127.0.0.1:9090", env = "PARLEY_API_URL")]
    pub api_url: String,

    /// Bearer token for gateway and API auth.
    #[arg(long, env = "PARLEY_TOKEN")]
    pub token: Option<String>,

    /// Numeric user id of the signed-in user.
    #[arg(long, env = "PARLEY_USER_ID")]
    pub user_id: Option<u64>,

    /// Log level (trace, debug, info, warn, error) or a tracing filter.
    #[arg(long, default_value = "info", env = "PARLEY_LOG_LEVEL")]
    pub log_level: String,

    /// Log format (text, json).
    #[arg(long, default_value = "text", env = "PARLEY_LOG_FORMAT")]
    pub log_format: String,
}

impl Config {
    /// Validate before the runtime starts; credentials are required up
    /// front because the handshake itself carries them.
    pub fn validate(&self) -> Result<(), String> {
        match self.log_format.as_str() {
            "text" | "json" => {}
            other => return Err(format!("invalid log format: {other} (expected text or json)")),
        }
        if self.token.as_deref().unwrap_or("").is_empty() {
            return Err("an auth token is required (--token or PARLEY_TOKEN)".to_owned());
        }
        if self.user_id.unwrap_or(0) == 0 {
            return Err("a user id is required (--user-id or PARLEY_USER_ID)".to_owned());
        }
        Ok(())
    }
}

#[cfg(test)]
#[path = "config_tests.rs"]
mod tests;
