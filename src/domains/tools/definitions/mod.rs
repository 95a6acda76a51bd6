//! Tool definitions module.
//!
//! Each tool is defined in its own file with:
//! - Its parameter/result types
//! - The core logic
//! - An `entry()` function producing the registry entry
//!
//! ## Adding a New Tool
//!
//! 1. Create a new file (e.g., `my_tool.rs`)
//! 2. Export it here
//! 3. Register it in `ToolRegistry::with_builtin_tools()`

pub mod context_info;
pub mod sum;
pub mod weather;

pub use context_info::ContextInfoTool;
pub use sum::{SumNumbersParams, SumNumbersTool};
pub use weather::{GetWeatherParams, GetWeatherTool, WeatherData};
