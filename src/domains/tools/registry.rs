//! Tool Registry - central registration and lookup for all tools.
//!
//! This module provides:
//! - [`ToolEntry`]: a named callable with its parameter schema and output type
//! - [`ToolRegistry`]: the append-only, name-unique collection of entries
//! - Tool descriptors for discovery
//!
//! The registry is built once at startup and is read-only afterwards; share
//! it behind an `Arc`.

use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;

use schemars::JsonSchema;
use serde::Serialize;
use serde_json::{Value, json};
use tracing::{debug, info};

use super::context::InvocationContext;
use super::definitions::{ContextInfoTool, GetWeatherTool, SumNumbersTool};
use super::error::ToolError;
use super::events::ToolOutput;
use super::handler::{AsyncHandler, SyncHandler, ToolArguments, ToolHandler};
use crate::domains::schema::{ParamSpec, ParamType, SchemaDescriptor};

// ============================================================================
// Output types
// ============================================================================

/// The declared output type of a tool, which decides how its return value
/// is serialized.
#[derive(Debug, Clone, PartialEq)]
pub enum OutputKind {
    /// A single value of the given type, wrapped as `{"result": value}` in
    /// structured output.
    Scalar(ParamType),
    /// A JSON object described by the given schema.
    Structured(Value),
    /// Free text, delivered as text content only.
    Text,
}

impl OutputKind {
    /// Structured output whose schema is derived from `T`.
    pub fn structured<T: JsonSchema>() -> Self {
        let schema = schemars::schema_for!(T);
        Self::Structured(serde_json::to_value(schema).unwrap_or(Value::Null))
    }

    /// Output schema advertised in discovery.
    pub fn output_schema(&self) -> Option<Value> {
        match self {
            Self::Scalar(ty) => {
                let mut result = json!({ "title": "Result" });
                if let Some(name) = ty.json_type() {
                    result["type"] = json!(name);
                }
                Some(json!({
                    "type": "object",
                    "properties": { "result": result },
                    "required": ["result"],
                }))
            }
            Self::Structured(schema) => Some(schema.clone()),
            Self::Text => None,
        }
    }

    /// Shape a raw return value according to the declared type.
    pub fn package(&self, value: Value) -> Result<ToolOutput, ToolError> {
        match self {
            Self::Scalar(ty) => {
                let value = ty.coerce(&value).map_err(|reason| {
                    ToolError::execution_failed(format!("unexpected return value: {}", reason))
                })?;
                let text = match &value {
                    Value::String(s) => s.clone(),
                    other => other.to_string(),
                };
                Ok(ToolOutput {
                    text,
                    structured: Some(json!({ "result": value })),
                })
            }
            Self::Structured(_) => match value {
                Value::Object(_) => Ok(ToolOutput {
                    text: serde_json::to_string_pretty(&value)
                        .unwrap_or_else(|_| value.to_string()),
                    structured: Some(value),
                }),
                other => Err(ToolError::execution_failed(format!(
                    "unexpected return value: expected object, got {}",
                    other
                ))),
            },
            Self::Text => match value {
                Value::String(text) => Ok(ToolOutput {
                    text,
                    structured: None,
                }),
                other => Err(ToolError::execution_failed(format!(
                    "unexpected return value: expected text, got {}",
                    other
                ))),
            },
        }
    }
}

// ============================================================================
// Tool entry
// ============================================================================

/// A registered tool.
pub struct ToolEntry {
    name: String,
    description: Option<String>,
    schema: SchemaDescriptor,
    output: OutputKind,
    handler: Arc<dyn ToolHandler>,
}

impl ToolEntry {
    /// Start building an entry with the required name.
    pub fn builder(name: impl Into<String>) -> ToolEntryBuilder {
        ToolEntryBuilder::new(name)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn description(&self) -> Option<&str> {
        self.description.as_deref()
    }

    pub fn schema(&self) -> &SchemaDescriptor {
        &self.schema
    }

    pub fn output(&self) -> &OutputKind {
        &self.output
    }

    pub fn handler(&self) -> Arc<dyn ToolHandler> {
        self.handler.clone()
    }

    /// Discovery view of this entry.
    pub fn descriptor(&self) -> ToolDescriptor {
        ToolDescriptor {
            name: self.name.clone(),
            description: self.description.clone(),
            input_schema: self.schema.to_json_schema(),
            output_schema: self.output.output_schema(),
        }
    }
}

impl std::fmt::Debug for ToolEntry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ToolEntry")
            .field("name", &self.name)
            .field("schema", &self.schema)
            .field("output", &self.output)
            .finish_non_exhaustive()
    }
}

/// Builder for [`ToolEntry`].
pub struct ToolEntryBuilder {
    name: String,
    description: Option<String>,
    schema: SchemaDescriptor,
    output: OutputKind,
}

impl ToolEntryBuilder {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: None,
            schema: SchemaDescriptor::default(),
            output: OutputKind::Scalar(ParamType::Any),
        }
    }

    /// Set the description.
    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    /// Add a parameter.
    pub fn param(mut self, param: ParamSpec) -> Self {
        self.schema.push(param);
        self
    }

    /// Add a required parameter.
    pub fn required(self, name: &str, ty: ParamType, description: &str) -> Self {
        self.param(ParamSpec::required(name, ty).describe(description))
    }

    /// Add an optional parameter with a default value.
    pub fn optional(
        self,
        name: &str,
        ty: ParamType,
        default: impl Into<Value>,
        description: &str,
    ) -> Self {
        let spec = ParamSpec::with_default(name, ty, default).describe(description);
        self.param(spec)
    }

    /// Declare the output type.
    pub fn returns(mut self, output: OutputKind) -> Self {
        self.output = output;
        self
    }

    /// Finish with any [`ToolHandler`].
    pub fn handler(self, handler: impl ToolHandler) -> ToolEntry {
        ToolEntry {
            name: self.name,
            description: self.description,
            schema: self.schema,
            output: self.output,
            handler: Arc::new(handler),
        }
    }

    /// Finish with a plain function.
    pub fn sync<F, T>(self, func: F) -> ToolEntry
    where
        F: Fn(ToolArguments) -> anyhow::Result<T> + Send + Sync + 'static,
        T: Serialize + Send + 'static,
    {
        self.handler(SyncHandler::new(func))
    }

    /// Finish with an async closure.
    pub fn asynchronous<F, Fut, T>(self, func: F) -> ToolEntry
    where
        F: Fn(ToolArguments, InvocationContext) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = anyhow::Result<T>> + Send + 'static,
        T: Serialize + Send + 'static,
    {
        self.handler(AsyncHandler::new(func))
    }
}

/// Tool metadata returned by discovery.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ToolDescriptor {
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub input_schema: Value,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub output_schema: Option<Value>,
}

// ============================================================================
// Tool Registry
// ============================================================================

/// Append-only registry of tools. Listing order is registration order.
#[derive(Default)]
pub struct ToolRegistry {
    entries: Vec<Arc<ToolEntry>>,
    index: HashMap<String, usize>,
}

impl ToolRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a registry holding the built-in tools.
    ///
    /// This is the central place where built-in tools are registered.
    pub fn with_builtin_tools() -> Result<Self, ToolError> {
        let mut registry = Self::new();
        registry.register(GetWeatherTool::entry())?;
        registry.register(SumNumbersTool::entry())?;
        registry.register(ContextInfoTool::entry())?;
        Ok(registry)
    }

    /// Register a tool. Names are unique; re-registration fails.
    pub fn register(&mut self, entry: ToolEntry) -> Result<(), ToolError> {
        if self.index.contains_key(entry.name()) {
            return Err(ToolError::duplicate(entry.name()));
        }
        info!("Registering tool: {}", entry.name());
        self.index.insert(entry.name().to_string(), self.entries.len());
        self.entries.push(Arc::new(entry));
        Ok(())
    }

    /// Resolve a tool by name.
    pub fn resolve(&self, name: &str) -> Result<Arc<ToolEntry>, ToolError> {
        let entry = self
            .index
            .get(name)
            .and_then(|&i| self.entries.get(i))
            .cloned();
        if entry.is_none() {
            debug!("Unknown tool requested: {}", name);
        }
        entry.ok_or_else(|| ToolError::not_found(name))
    }

    /// Descriptors of every tool, in registration order.
    pub fn list(&self) -> Vec<ToolDescriptor> {
        self.entries.iter().map(|e| e.descriptor()).collect()
    }

    /// Get all tool names.
    pub fn names(&self) -> Vec<&str> {
        self.entries.iter().map(|e| e.name()).collect()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
