//! Container MCP Server Library
//!
//! A Model Context Protocol server exposing named, schema-validated tools and
//! prompt templates over streamable HTTP. Tools may report log and progress
//! events while they run; every invocation ends in exactly one result.
//!
//! # Architecture
//!
//! - **core**: configuration, error handling, the server facade and the
//!   HTTP transport with its sessions
//! - **domains**: business logic organized by bounded contexts
//!   - **schema**: parameter declarations, JSON Schema generation, validation
//!   - **tools**: registry, dispatcher, invocation context, built-in tools
//!   - **prompts**: registry and built-in prompt templates
//!
//! # Example
//!
//! ```rust,no_run
//! use container_mcp_server::core::{Config, McpServer, TransportService};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = Config::from_env();
//!     let server = McpServer::new(config.clone())?;
//!     TransportService::new(&config).run(server).await?;
//!     Ok(())
//! }
//! ```

pub mod core;
pub mod domains;

// Re-export commonly used types for convenience
pub use core::{Config, Error, McpServer, Result};
