//! Prompt Registry - central registration of all prompts.
//!
//! When adding a new prompt:
//! 1. Create the prompt file in `definitions/`
//! 2. Export it in `definitions/mod.rs`
//! 3. Register it in `with_builtin_prompts()`

use std::collections::HashMap;
use std::sync::Arc;

use rmcp::model::{GetPromptResult, Prompt, PromptArgument, PromptMessage, PromptMessageRole};
use serde_json::{Map, Value};
use tracing::{debug, info};

use super::definitions::{CalculationHelperPrompt, PromptDefinition, WeatherReportPrompt};
use super::error::PromptError;
use crate::domains::schema::SchemaDescriptor;

type Renderer = dyn Fn(&Map<String, Value>) -> Result<String, PromptError> + Send + Sync;

/// A named prompt template.
#[derive(Clone)]
pub struct PromptEntry {
    name: String,
    description: Option<String>,
    schema: SchemaDescriptor,
    renderer: Arc<Renderer>,
}

impl PromptEntry {
    pub fn new<F>(name: impl Into<String>, schema: SchemaDescriptor, renderer: F) -> Self
    where
        F: Fn(&Map<String, Value>) -> Result<String, PromptError> + Send + Sync + 'static,
    {
        Self {
            name: name.into(),
            description: None,
            schema,
            renderer: Arc::new(renderer),
        }
    }

    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    /// Build an entry from a [`PromptDefinition`].
    pub fn from_definition<P: PromptDefinition>() -> Self {
        Self::new(P::NAME, SchemaDescriptor::new(P::params()), P::render)
            .description(P::DESCRIPTION)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn schema(&self) -> &SchemaDescriptor {
        &self.schema
    }

    /// MCP descriptor advertised by `prompts/list`.
    pub fn descriptor(&self) -> Prompt {
        let arguments = self
            .schema
            .params()
            .iter()
            .map(|p| PromptArgument {
                name: p.name.clone(),
                title: None,
                description: p.description.clone(),
                required: Some(p.required),
            })
            .collect();

        Prompt {
            name: self.name.clone(),
            title: None,
            description: self.description.clone(),
            arguments: Some(arguments),
            icons: None,
            meta: None,
        }
    }
}

impl std::fmt::Debug for PromptEntry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PromptEntry")
            .field("name", &self.name)
            .field("params", &self.schema.params().len())
            .finish()
    }
}

/// Registry of prompt templates, keyed by unique name.
#[derive(Debug, Default)]
pub struct PromptRegistry {
    entries: Vec<PromptEntry>,
    index: HashMap<String, usize>,
}

impl PromptRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry with every built-in prompt.
    pub fn with_builtin_prompts() -> Result<Self, PromptError> {
        let mut registry = Self::new();
        registry.register(PromptEntry::from_definition::<WeatherReportPrompt>())?;
        registry.register(PromptEntry::from_definition::<CalculationHelperPrompt>())?;
        Ok(registry)
    }

    /// Register a prompt. Names are write-once.
    pub fn register(&mut self, entry: PromptEntry) -> Result<(), PromptError> {
        if self.index.contains_key(entry.name()) {
            return Err(PromptError::duplicate(entry.name()));
        }
        info!("Registering prompt: {}", entry.name());
        self.index.insert(entry.name().to_string(), self.entries.len());
        self.entries.push(entry);
        Ok(())
    }

    pub fn resolve(&self, name: &str) -> Result<&PromptEntry, PromptError> {
        self.index
            .get(name)
            .map(|&i| &self.entries[i])
            .ok_or_else(|| PromptError::not_found(name))
    }

    /// Descriptors in registration order.
    pub fn list(&self) -> Vec<Prompt> {
        self.entries.iter().map(PromptEntry::descriptor).collect()
    }

    /// Validate `arguments` and render the named prompt as a single user
    /// message.
    pub fn render(
        &self,
        name: &str,
        arguments: Option<&Value>,
    ) -> Result<GetPromptResult, PromptError> {
        let entry = self.resolve(name)?;
        let arguments = entry.schema.validate(arguments)?;
        let text = (entry.renderer)(&arguments)?;
        debug!("Rendered prompt {} ({} bytes)", name, text.len());

        Ok(GetPromptResult {
            description: entry.description.clone(),
            messages: vec![PromptMessage::new_text(PromptMessageRole::User, text)],
        })
    }

    pub fn names(&self) -> Vec<&str> {
        self.entries.iter().map(PromptEntry::name).collect()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
