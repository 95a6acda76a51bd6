//! MCP server facade.
//!
//! [`McpServer`] owns the tool and prompt registries and the dispatcher, and
//! answers the protocol-level questions (discovery, prompt rendering, server
//! info) that the transport forwards to it. Tool invocations go through
//! [`Dispatcher`] so that events flow to the caller's session.
//!
//! Tools are defined in `domains/tools/definitions/` and prompts in
//! `domains/prompts/definitions/`. Adding either does not touch this file.

use std::sync::Arc;

use rmcp::model::{GetPromptResult, Prompt, ServerCapabilities, ServerInfo};
use serde_json::{Value, json};
use tracing::{info, instrument};

use super::config::Config;
use super::error::Result;
use super::transport::{DeliveryMode, Session};
use crate::domains::prompts::{PromptError, PromptRegistry};
use crate::domains::tools::{
    Dispatcher, EventKind, InvocationRequest, InvocationResult, RequestId, ToolDescriptor,
    ToolRegistry,
};

/// MCP protocol revision spoken by the HTTP transport.
pub const PROTOCOL_VERSION: &str = "2025-03-26";

/// Transport label reported by the introspection endpoints.
pub const TRANSPORT_NAME: &str = "streamable-http";

/// The main MCP server.
#[derive(Clone)]
pub struct McpServer {
    config: Arc<Config>,
    tools: Arc<ToolRegistry>,
    prompts: Arc<PromptRegistry>,
    dispatcher: Dispatcher,
}

impl McpServer {
    /// Create a server with every built-in tool and prompt registered.
    pub fn new(config: Config) -> Result<Self> {
        config.validate()?;
        let tools = ToolRegistry::with_builtin_tools()?;
        let prompts = PromptRegistry::with_builtin_prompts()?;
        Ok(Self::with_registries(config, tools, prompts))
    }

    /// Create a server over caller-built registries.
    pub fn with_registries(config: Config, tools: ToolRegistry, prompts: PromptRegistry) -> Self {
        let tools = Arc::new(tools);
        let dispatcher = Dispatcher::new(tools.clone())
            .with_timeout(config.dispatch.timeout());
        info!(
            "Server {} ready with {} tool(s) and {} prompt(s)",
            config.server.name,
            tools.len(),
            prompts.len()
        );

        Self {
            config: Arc::new(config),
            tools,
            prompts: Arc::new(prompts),
            dispatcher,
        }
    }

    /// Get the server name.
    pub fn name(&self) -> &str {
        &self.config.server.name
    }

    /// Get the server version.
    pub fn version(&self) -> &str {
        &self.config.server.version
    }

    pub fn config(&self) -> &Arc<Config> {
        &self.config
    }

    pub fn dispatcher(&self) -> &Dispatcher {
        &self.dispatcher
    }

    /// Capabilities and instructions advertised on `initialize`.
    pub fn get_info(&self) -> ServerInfo {
        ServerInfo {
            instructions: Some(
                "Container MCP server exposing weather, arithmetic and context demonstration tools plus weather and calculation prompts."
                    .to_string(),
            ),
            capabilities: ServerCapabilities::builder()
                .enable_tools()
                .enable_prompts()
                .enable_logging()
                .build(),
            ..Default::default()
        }
    }

    /// `initialize` result body.
    pub fn initialize_result(&self) -> Value {
        let mut result = serde_json::to_value(self.get_info())
            .unwrap_or_else(|_| json!({}));
        if let Some(obj) = result.as_object_mut() {
            obj.insert("protocolVersion".into(), json!(PROTOCOL_VERSION));
            obj.insert(
                "serverInfo".into(),
                json!({ "name": self.name(), "version": self.version() }),
            );
        }
        result
    }

    // ========================================================================
    // Discovery
    // ========================================================================

    pub fn list_tools(&self) -> Vec<ToolDescriptor> {
        self.tools.list()
    }

    pub fn list_prompts(&self) -> Vec<Prompt> {
        self.prompts.list()
    }

    pub fn tool_names(&self) -> Vec<&str> {
        self.tools.names()
    }

    pub fn prompt_names(&self) -> Vec<&str> {
        self.prompts.names()
    }

    // ========================================================================
    // Operations
    // ========================================================================

    /// Render a prompt.
    #[instrument(skip(self, arguments))]
    pub fn get_prompt(
        &self,
        name: &str,
        arguments: Option<&Value>,
    ) -> std::result::Result<GetPromptResult, PromptError> {
        info!("Getting prompt: {}", name);
        self.prompts.render(name, arguments)
    }

    /// Invoke a tool outside any client session and return its outcome.
    ///
    /// Log and progress events are discarded.
    pub async fn call_tool(&self, name: &str, arguments: Value) -> Result<InvocationResult> {
        let session = Session::new(
            DeliveryMode::Buffered,
            self.config.dispatch.event_queue_capacity,
        );
        let request = InvocationRequest::new(name, arguments, RequestId::new(session.id()));
        let event = self.dispatcher.dispatch(request, &session).await;
        session.close();

        match event?.kind {
            EventKind::Result(outcome) => Ok(outcome),
            other => Err(super::error::Error::fatal(format!(
                "dispatcher returned a {} event instead of a result",
                other.label()
            ))),
        }
    }

    // ========================================================================
    // Introspection
    // ========================================================================

    /// Body of the health endpoint.
    pub fn health(&self) -> Value {
        json!({
            "status": "healthy",
            "server": self.name(),
            "transport": TRANSPORT_NAME,
            "tools_count": self.tools.len(),
            "prompts_count": self.prompts.len(),
            "timestamp": chrono::Utc::now().to_rfc3339(),
        })
    }

    /// Body of the root endpoint.
    pub fn info(&self) -> Value {
        json!({
            "name": "Container MCP Server",
            "version": self.version(),
            "transport": TRANSPORT_NAME,
            "mcp_endpoint": self.config.transport.rpc_path,
            "health_endpoint": "/health",
            "tools": self.tool_names(),
            "prompts": self.prompt_names(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domains::tools::ToolError;

    fn server() -> McpServer {
        McpServer::new(Config::new()).unwrap()
    }

    #[test]
    fn test_discovery_counts_match_registrations() {
        let server = server();
        assert_eq!(server.list_tools().len(), 3);
        assert_eq!(server.list_prompts().len(), 2);
        assert_eq!(
            server.tool_names(),
            vec!["get_weather", "sum_numbers", "context_info"]
        );
    }

    #[test]
    fn test_health_and_info() {
        let server = server();
        let health = server.health();
        assert_eq!(health["status"], "healthy");
        assert_eq!(health["tools_count"], 3);
        assert_eq!(health["prompts_count"], 2);
        assert_eq!(health["transport"], "streamable-http");

        let info = server.info();
        assert_eq!(info["name"], "Container MCP Server");
        assert_eq!(info["mcp_endpoint"], "/mcp");
        assert_eq!(info["prompts"][0], "weather_report");
    }

    #[test]
    fn test_initialize_result() {
        let result = server().initialize_result();
        assert_eq!(result["protocolVersion"], PROTOCOL_VERSION);
        assert_eq!(result["serverInfo"]["name"], "ContainerMCPServer");
        assert!(result["capabilities"]["tools"].is_object());
        assert!(result["capabilities"]["prompts"].is_object());
    }

    #[tokio::test]
    async fn test_call_tool() {
        let server = server();
        let outcome = server
            .call_tool("sum_numbers", json!({ "a": 2, "b": 3 }))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(outcome.structured.unwrap()["result"].as_f64(), Some(5.0));

        let missing = server.call_tool("missing", json!({})).await.unwrap();
        assert!(matches!(missing, Err(ToolError::NotFound(_))));
    }

    #[test]
    fn test_get_prompt() {
        let server = server();
        let result = server.get_prompt("weather_report", None).unwrap();
        assert_eq!(result.messages.len(), 1);
        assert!(server.get_prompt("missing", None).is_err());
    }
}
