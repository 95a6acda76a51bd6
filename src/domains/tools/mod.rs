//! Tools domain module.
//!
//! Tools are named functions that MCP clients invoke with JSON arguments.
//! A tool declares its parameters once; the schema published to clients and
//! the argument validation both come from that declaration.
//!
//! ## Architecture
//!
//! - `definitions/` - Built-in tool implementations (one file per tool)
//! - `registry.rs` - Name → entry table, output shaping
//! - `dispatcher.rs` - Resolve, validate, invoke, publish the result
//! - `context.rs` - Per-invocation handle for log/progress events
//! - `handler.rs` - Sync and async callable adapters
//! - `events.rs` - Event model shared with the transport
//! - `error.rs` - Tool-specific error types
//!
//! ## Adding a New Tool
//!
//! 1. Create a new file in `definitions/` (e.g., `my_tool.rs`)
//! 2. Define its params, `execute()` and `entry()`
//! 3. Export it in `definitions/mod.rs`
//! 4. Register it in `ToolRegistry::with_builtin_tools()`

mod context;
pub mod definitions;
mod dispatcher;
mod error;
mod events;
mod handler;
mod registry;

pub use context::InvocationContext;
pub use dispatcher::{Dispatcher, InvocationRequest};
pub use error::ToolError;
pub use events::{Event, EventKind, InvocationResult, LogLevel, RequestId, ToolOutput};
pub use handler::{AsyncHandler, SyncHandler, ToolArguments, ToolHandler};
pub use registry::{OutputKind, ToolDescriptor, ToolEntry, ToolEntryBuilder, ToolRegistry};
