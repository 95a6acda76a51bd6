//! Weather lookup tool definition.
//!
//! Returns canned weather data for a handful of cities. Unknown cities get a
//! neutral default reading rather than an error.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use tracing::{info, instrument};

use crate::domains::schema::ParamType;
use crate::domains::tools::{OutputKind, ToolArguments, ToolEntry};

/// Parameters for the weather tool.
#[derive(Debug, Clone, Deserialize)]
pub struct GetWeatherParams {
    /// The city name to get weather for.
    pub city: String,
}

/// Weather reading returned to clients.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct WeatherData {
    pub temperature: f64,
    pub condition: String,
    pub humidity: i64,
    pub city: String,
}

/// Weather tool - mock weather information for a city.
pub struct GetWeatherTool;

impl GetWeatherTool {
    /// Tool name as registered in MCP.
    pub const NAME: &'static str = "get_weather";

    /// Tool description shown to clients.
    pub const DESCRIPTION: &'static str =
        "Get mock weather information for a city. Returns temperature, condition and humidity.";

    /// City used when the caller does not name one.
    pub const DEFAULT_CITY: &'static str = "San Francisco";

    /// Look up the weather for a city.
    #[instrument]
    pub fn execute(city: &str) -> WeatherData {
        let (temperature, condition, humidity) = match city {
            "San Francisco" => (18.5, "foggy", 85),
            "New York" => (22.0, "sunny", 60),
            "London" => (12.0, "rainy", 90),
            "Tokyo" => (25.0, "partly cloudy", 70),
            _ => {
                info!("No weather data for {}, using default reading", city);
                (20.0, "unknown", 50)
            }
        };

        WeatherData {
            temperature,
            condition: condition.to_string(),
            humidity,
            city: city.to_string(),
        }
    }

    /// Registry entry for this tool.
    pub fn entry() -> ToolEntry {
        ToolEntry::builder(Self::NAME)
            .description(Self::DESCRIPTION)
            .optional(
                "city",
                ParamType::String,
                Self::DEFAULT_CITY,
                "The city name to get weather for",
            )
            .returns(OutputKind::structured::<WeatherData>())
            .sync(|args: ToolArguments| {
                let params: GetWeatherParams = args.parse()?;
                Ok(Self::execute(&params.city))
            })
    }
}
