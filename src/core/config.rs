//! Configuration management for the MCP server.
//!
//! This module provides a centralized configuration structure that can be
//! populated from environment variables (and a `.env` file), with command
//! line overrides applied on top by the binary.

use super::error::{Error, Result};
use super::transport::TransportConfig;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{info, warn};

/// Main configuration structure for the MCP server.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Server identification and metadata.
    pub server: ServerConfig,

    /// Logging configuration.
    pub logging: LoggingConfig,

    /// Transport configuration.
    pub transport: TransportConfig,

    /// Tool dispatch configuration.
    pub dispatch: DispatchConfig,

    /// Session lifecycle configuration.
    pub session: SessionConfig,
}

/// Server identification configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// The name of the server as reported to clients.
    pub name: String,

    /// The version of the server.
    pub version: String,
}

/// Logging configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level filter (e.g., "info", "debug", "trace").
    pub level: String,
}

/// Configuration for tool invocation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DispatchConfig {
    /// Per-invocation deadline in milliseconds. `None` waits indefinitely.
    pub timeout_ms: Option<u64>,

    /// Capacity of each invocation's outbound event queue.
    pub event_queue_capacity: usize,
}

/// Configuration for session lifecycle.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionConfig {
    /// Sessions idle longer than this are torn down.
    pub idle_timeout_secs: u64,

    /// How often idle sessions are looked for.
    pub reap_interval_secs: u64,
}

impl DispatchConfig {
    pub fn timeout(&self) -> Option<Duration> {
        self.timeout_ms.map(Duration::from_millis)
    }
}

impl SessionConfig {
    pub fn idle_timeout(&self) -> Duration {
        Duration::from_secs(self.idle_timeout_secs)
    }

    pub fn reap_interval(&self) -> Duration {
        Duration::from_secs(self.reap_interval_secs.max(1))
    }
}

impl Default for DispatchConfig {
    fn default() -> Self {
        Self {
            timeout_ms: None,
            event_queue_capacity: 64,
        }
    }
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            idle_timeout_secs: 30 * 60,
            reap_interval_secs: 60,
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            server: ServerConfig {
                name: "ContainerMCPServer".to_string(),
                version: env!("CARGO_PKG_VERSION").to_string(),
            },
            logging: LoggingConfig {
                level: "info".to_string(),
            },
            transport: TransportConfig::default(),
            dispatch: DispatchConfig::default(),
            session: SessionConfig::default(),
        }
    }
}

/// Parse a numeric environment variable, warning on garbage.
fn env_number<T: std::str::FromStr>(key: &str) -> Option<T> {
    let raw = std::env::var(key).ok()?;
    match raw.trim().parse() {
        Ok(value) => Some(value),
        Err(_) => {
            warn!("Ignoring invalid value for {}: '{}'", key, raw);
            None
        }
    }
}

impl Config {
    /// Reject settings the server cannot run with.
    pub fn validate(&self) -> Result<()> {
        if !self.transport.rpc_path.starts_with('/') {
            return Err(Error::config(format!(
                "RPC path must start with '/': {}",
                self.transport.rpc_path
            )));
        }
        if self.dispatch.event_queue_capacity == 0 {
            return Err(Error::config("event queue capacity must be at least 1"));
        }
        if self.dispatch.timeout_ms == Some(0) {
            return Err(Error::config("tool timeout must be greater than zero"));
        }
        Ok(())
    }

    /// Create a new configuration with default values.
    pub fn new() -> Self {
        Self::default()
    }

    /// Load configuration from environment variables.
    ///
    /// Environment variables are expected to be prefixed with `MCP_`.
    /// For example: `MCP_SERVER_NAME`, `MCP_LOG_LEVEL`. `LOG_LEVEL`, `HOST`
    /// and `PORT` are honoured as container-friendly fallbacks.
    pub fn from_env() -> Self {
        dotenvy::dotenv().ok();

        let mut config = Self::default();

        if let Ok(name) = std::env::var("MCP_SERVER_NAME") {
            config.server.name = name;
        }

        if let Ok(level) = std::env::var("MCP_LOG_LEVEL").or_else(|_| std::env::var("LOG_LEVEL")) {
            config.logging.level = level;
        }

        config.transport = TransportConfig::from_env();

        if let Some(timeout_ms) = env_number::<u64>("MCP_TOOL_TIMEOUT_MS") {
            config.dispatch.timeout_ms = Some(timeout_ms);
            info!("Tool invocation deadline set to {}ms", timeout_ms);
        }

        if let Some(capacity) = env_number::<usize>("MCP_EVENT_QUEUE_CAPACITY") {
            config.dispatch.event_queue_capacity = capacity.max(1);
        }

        if let Some(idle) = env_number::<u64>("MCP_SESSION_IDLE_TIMEOUT_SECS") {
            config.session.idle_timeout_secs = idle;
        }

        config
    }
}
