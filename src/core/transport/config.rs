//! Transport configuration types.

use serde::{Deserialize, Serialize};
use tracing::warn;

/// How invocation events reach the client.
///
/// Chosen once at startup; never changes per request.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DeliveryMode {
    /// One JSON response per invocation; log/progress events are attached
    /// as metadata.
    Buffered,
    /// Server-sent events: log/progress/result pushed as they happen.
    #[default]
    Streaming,
}

impl DeliveryMode {
    /// Mode selected by the `json_response` flag.
    pub fn from_json_response(json_response: bool) -> Self {
        if json_response {
            Self::Buffered
        } else {
            Self::Streaming
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Buffered => "buffered",
            Self::Streaming => "streaming",
        }
    }
}

/// HTTP transport configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransportConfig {
    /// Port number to listen on.
    pub port: u16,

    /// Host address to bind to.
    #[serde(default = "default_host")]
    pub host: String,

    /// Path of the MCP endpoint.
    #[serde(default = "default_rpc_path")]
    pub rpc_path: String,

    /// Enable CORS for browser clients.
    #[serde(default = "default_cors")]
    pub enable_cors: bool,

    /// Event delivery mode.
    #[serde(default)]
    pub delivery: DeliveryMode,
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_rpc_path() -> String {
    "/mcp".to_string()
}

fn default_cors() -> bool {
    true
}

const DEFAULT_PORT: u16 = 8000;

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            port: DEFAULT_PORT,
            host: default_host(),
            rpc_path: default_rpc_path(),
            enable_cors: default_cors(),
            delivery: DeliveryMode::default(),
        }
    }
}

impl TransportConfig {
    /// Create an HTTP transport config.
    pub fn http(port: u16, host: impl Into<String>) -> Self {
        Self {
            port,
            host: host.into(),
            ..Default::default()
        }
    }

    /// Load transport config from environment variables.
    pub fn from_env() -> Self {
        let port = match std::env::var("MCP_HTTP_PORT").or_else(|_| std::env::var("PORT")) {
            Ok(raw) => raw.parse().unwrap_or_else(|_| {
                warn!("Invalid port '{}', using {}", raw, DEFAULT_PORT);
                DEFAULT_PORT
            }),
            Err(_) => DEFAULT_PORT,
        };
        let host = std::env::var("MCP_HTTP_HOST")
            .or_else(|_| std::env::var("HOST"))
            .unwrap_or_else(|_| default_host());
        let rpc_path = std::env::var("MCP_HTTP_PATH").unwrap_or_else(|_| default_rpc_path());
        let enable_cors = std::env::var("MCP_HTTP_CORS")
            .map(|v| v.to_lowercase() != "false" && v != "0")
            .unwrap_or(true);
        let json_response = std::env::var("MCP_JSON_RESPONSE")
            .map(|v| v.to_lowercase() == "true" || v == "1")
            .unwrap_or(false);

        Self {
            port,
            host,
            rpc_path,
            enable_cors,
            delivery: DeliveryMode::from_json_response(json_response),
        }
    }

    /// Get the bind address.
    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// Get a description of this transport for logging.
    pub fn description(&self) -> String {
        format!(
            "streamable HTTP on {}:{}{} ({} delivery)",
            self.host,
            self.port,
            self.rpc_path,
            self.delivery.as_str()
        )
    }
}
