//! Prompts domain module.
//!
//! Prompts are named, parameterized text templates. They are rendered, never
//! executed: a client supplies arguments and receives the resulting message.
//! Parameters are declared with the same [`SchemaDescriptor`] tools use, so
//! prompt arguments get the same validation and defaulting.
//!
//! ## Architecture
//!
//! - `definitions/` - Individual prompt definitions (one file per prompt)
//! - `registry.rs` - Central prompt registration and rendering
//! - `error.rs` - Prompt-specific error types
//!
//! [`SchemaDescriptor`]: crate::domains::schema::SchemaDescriptor

pub mod definitions;
mod error;
mod registry;

pub use definitions::PromptDefinition;
pub use error::PromptError;
pub use registry::{PromptEntry, PromptRegistry};
