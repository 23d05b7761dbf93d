//! Server configuration loaded from environment variables.
//!
//! All settings have sensible defaults so the server can start with zero
//! configuration for local development.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

use natter_proto::constants::{
    DEFAULT_PORT, DEFAULT_READ_TIMEOUT_SECS, DEFAULT_WRITE_TIMEOUT_SECS, MAX_FRAME_LEN,
};

/// Server configuration.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Socket address for the binary protocol listener.
    /// Env: `LISTEN_ADDR`
    /// Default: `0.0.0.0:5035`
    pub listen_addr: SocketAddr,

    /// SQLite database file.
    /// Env: `DATABASE_PATH`
    /// Default: `./natter.db`
    pub database_path: PathBuf,

    /// Longest a connection may stay silent before it is dropped.
    /// Env: `READ_TIMEOUT_SECS`
    /// Default: 60 s
    pub read_timeout: Duration,

    /// Longest a single outgoing frame may take to write.
    /// Env: `WRITE_TIMEOUT_SECS`
    /// Default: 30 s
    pub write_timeout: Duration,

    /// Largest accepted frame payload. Never above the protocol maximum.
    /// Env: `MAX_FRAME_LEN`
    /// Default: 20,000,000
    pub max_frame_len: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            listen_addr: ([0, 0, 0, 0], DEFAULT_PORT).into(),
            database_path: PathBuf::from("./natter.db"),
            read_timeout: Duration::from_secs(DEFAULT_READ_TIMEOUT_SECS),
            write_timeout: Duration::from_secs(DEFAULT_WRITE_TIMEOUT_SECS),
            max_frame_len: MAX_FRAME_LEN,
        }
    }
}

impl ServerConfig {
    /// Load configuration from environment variables, falling back to defaults.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let mut config = Self::default();

        if let Some(addr) = lookup("LISTEN_ADDR") {
            if let Ok(parsed) = addr.parse::<SocketAddr>() {
                config.listen_addr = parsed;
            } else {
                tracing::warn!(value = %addr, "Invalid LISTEN_ADDR, using default");
            }
        }

        if let Some(path) = lookup("DATABASE_PATH") {
            if !path.is_empty() {
                config.database_path = PathBuf::from(path);
            }
        }

        if let Some(secs) = parse_secs(&lookup, "READ_TIMEOUT_SECS") {
            config.read_timeout = secs;
        }

        if let Some(secs) = parse_secs(&lookup, "WRITE_TIMEOUT_SECS") {
            config.write_timeout = secs;
        }

        if let Some(val) = lookup("MAX_FRAME_LEN") {
            match val.parse::<usize>() {
                Ok(n) if n > MAX_FRAME_LEN => {
                    tracing::warn!(value = n, max = MAX_FRAME_LEN, "MAX_FRAME_LEN clamped");
                    config.max_frame_len = MAX_FRAME_LEN;
                }
                Ok(n) => config.max_frame_len = n,
                Err(_) => tracing::warn!(value = %val, "Invalid MAX_FRAME_LEN, using default"),
            }
        }

        // RUST_LOG is handled directly by tracing-subscriber's EnvFilter,
        // so we do not store it here.

        config
    }
}

/// Positive whole seconds. Zero would disable the liveness bound, so it is rejected.
fn parse_secs(lookup: &impl Fn(&str) -> Option<String>, key: &str) -> Option<Duration> {
    let val = lookup(key)?;
    match val.parse::<u64>() {
        Ok(n) if n > 0 => Some(Duration::from_secs(n)),
        _ => {
            tracing::warn!(key, value = %val, "Invalid timeout, using default");
            None
        }
    }
}
