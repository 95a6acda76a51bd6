//! Calculation helper prompt definition.

use serde_json::{Map, Value};

use super::{PromptDefinition, string_arg};
use crate::domains::prompts::PromptError;
use crate::domains::schema::{ParamSpec, ParamType};

/// Asks for help with an arithmetic operation.
pub struct CalculationHelperPrompt;

impl CalculationHelperPrompt {
    fn text(operation: &str, context: &str) -> String {
        let mut prompt = format!("Please help me with a {} calculation.", operation);
        if !context.is_empty() {
            prompt.push_str(&format!(" Context: {}", context));
        }

        prompt.push_str(match operation {
            "addition" => " Please add the numbers and show your work.",
            "subtraction" => " Please subtract the numbers and explain the process.",
            "multiplication" => " Please multiply the numbers and show intermediate steps.",
            "division" => " Please divide the numbers and handle any remainders appropriately.",
            _ => " Please perform the calculation and explain your approach.",
        });
        prompt
    }
}

impl PromptDefinition for CalculationHelperPrompt {
    const NAME: &'static str = "calculation_helper";
    const DESCRIPTION: &'static str = "Generate a prompt for mathematical calculations.";

    fn params() -> Vec<ParamSpec> {
        vec![
            ParamSpec::with_default("operation", ParamType::String, "addition")
                .describe("Type of mathematical operation"),
            ParamSpec::with_default("context", ParamType::String, "")
                .describe("Additional context for the calculation"),
        ]
    }

    fn render(arguments: &Map<String, Value>) -> Result<String, PromptError> {
        Ok(Self::text(
            string_arg(arguments, "operation")?,
            string_arg(arguments, "context")?,
        ))
    }
}
