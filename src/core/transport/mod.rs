//! Transport layer for the MCP server.
//!
//! A single transport is provided: streamable HTTP, JSON-RPC over `POST`
//! with either server-sent-event or buffered JSON delivery of invocation
//! events. Sessions and their per-invocation event queues live in
//! [`session`]; the transport drains them onto the wire.

mod config;
mod error;
pub mod http;
mod service;
pub mod session;

pub use config::{DeliveryMode, TransportConfig};
pub use error::{TransportError, TransportResult};
pub use http::HttpTransport;
pub use service::TransportService;
pub use session::{Delivery, EventQueue, Session, SessionManager};
