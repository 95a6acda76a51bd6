//! Sum tool definition.

use serde::Deserialize;

use crate::domains::schema::ParamType;
use crate::domains::tools::{OutputKind, ToolArguments, ToolEntry};

/// Parameters for the sum tool.
#[derive(Debug, Clone, Copy, Deserialize)]
pub struct SumNumbersParams {
    pub a: f64,
    pub b: f64,
}

/// Sum tool - adds two numbers together.
pub struct SumNumbersTool;

impl SumNumbersTool {
    pub const NAME: &'static str = "sum_numbers";
    pub const DESCRIPTION: &'static str = "Add two numbers together.";

    /// Fails when the sum does not fit in an `f64`.
    pub fn execute(params: SumNumbersParams) -> anyhow::Result<f64> {
        let sum = params.a + params.b;
        anyhow::ensure!(
            sum.is_finite(),
            "sum of {} and {} is out of range",
            params.a,
            params.b
        );
        Ok(sum)
    }

    pub fn entry() -> ToolEntry {
        ToolEntry::builder(Self::NAME)
            .description(Self::DESCRIPTION)
            .required("a", ParamType::Number, "First number")
            .required("b", ParamType::Number, "Second number")
            .returns(OutputKind::Scalar(ParamType::Number))
            .sync(|args: ToolArguments| Self::execute(args.parse()?))
    }
}
