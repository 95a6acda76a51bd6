//! Transport service - owns the HTTP transport lifecycle.
//!
//! Builds the session manager, starts the idle-session reaper and serves
//! until a shutdown signal arrives.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use tracing::{info, warn};

use super::http::HttpTransport;
use super::session::SessionManager;
use super::{TransportConfig, TransportResult};
use crate::core::McpServer;
use crate::core::config::Config;

/// Transport service - manages the transport layer for the MCP server.
pub struct TransportService {
    config: TransportConfig,
    queue_capacity: usize,
    idle_timeout: Duration,
    reap_interval: Duration,
}

impl TransportService {
    /// Create a new transport service from the server configuration.
    pub fn new(config: &Config) -> Self {
        Self {
            config: config.transport.clone(),
            queue_capacity: config.dispatch.event_queue_capacity,
            idle_timeout: config.session.idle_timeout(),
            reap_interval: config.session.reap_interval(),
        }
    }

    /// Get the transport configuration.
    pub fn config(&self) -> &TransportConfig {
        &self.config
    }

    /// Log information about the configured transport.
    pub fn log_info(&self) {
        info!("Starting transport: {}", self.config.description());
    }

    fn session_manager(&self) -> Arc<SessionManager> {
        Arc::new(SessionManager::new(
            self.config.delivery,
            self.queue_capacity,
            self.idle_timeout,
        ))
    }

    /// Serve until Ctrl-C.
    pub async fn run(self, server: McpServer) -> TransportResult<()> {
        self.run_until(server, shutdown_signal()).await
    }

    /// Serve until `shutdown` resolves.
    pub async fn run_until<F>(self, server: McpServer, shutdown: F) -> TransportResult<()>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        self.log_info();

        let sessions = self.session_manager();
        let reaper = sessions.spawn_reaper(self.reap_interval);

        let result = HttpTransport::new(self.config)
            .run(server, sessions.clone(), shutdown)
            .await;

        reaper.abort();
        let open = sessions.len().await;
        if open > 0 {
            info!("Closing {} open session(s)", open);
        }
        sessions.close_all().await;

        result
    }
}

async fn shutdown_signal() {
    match tokio::signal::ctrl_c().await {
        Ok(()) => info!("Shutdown signal received"),
        Err(e) => {
            warn!("Unable to listen for shutdown signal: {}", e);
            std::future::pending::<()>().await;
        }
    }
}
