//! Prompt definitions module.
//!
//! Each prompt is defined in its own file with:
//! - Metadata (name, description, parameters)
//! - A render function over validated arguments
//!
//! ## Adding a New Prompt
//!
//! 1. Create a new file (e.g., `my_prompt.rs`)
//! 2. Implement the `PromptDefinition` trait
//! 3. Export it here
//! 4. Register it in `PromptRegistry::with_builtin_prompts()`

mod calculation_helper;
mod weather_report;

use serde_json::{Map, Value};

use super::error::PromptError;
use crate::domains::schema::ParamSpec;

pub use calculation_helper::CalculationHelperPrompt;
pub use weather_report::WeatherReportPrompt;

/// Trait for prompt definitions.
pub trait PromptDefinition: 'static {
    /// The unique name of the prompt.
    const NAME: &'static str;

    /// A description of what the prompt does.
    const DESCRIPTION: &'static str;

    /// The parameters this prompt accepts.
    fn params() -> Vec<ParamSpec>;

    /// Render the prompt text. `arguments` has already been validated and
    /// has every defaulted parameter filled in.
    fn render(arguments: &Map<String, Value>) -> Result<String, PromptError>;
}

/// Fetch a string argument that validation guarantees is present.
pub(crate) fn string_arg<'a>(
    arguments: &'a Map<String, Value>,
    name: &str,
) -> Result<&'a str, PromptError> {
    arguments
        .get(name)
        .and_then(Value::as_str)
        .ok_or_else(|| PromptError::render(format!("argument '{}' is not a string", name)))
}
