//! Weather report prompt definition.

use serde_json::{Map, Value};

use super::{PromptDefinition, string_arg};
use crate::domains::prompts::PromptError;
use crate::domains::schema::{ParamSpec, ParamType};

/// Asks for a weather report in one of three levels of detail.
pub struct WeatherReportPrompt;

impl WeatherReportPrompt {
    fn text(city: &str, format: &str) -> String {
        match format {
            "detailed" => format!(
                "Please provide a detailed weather report for {city}. Include:\n\
                 - Current temperature and conditions\n\
                 - Humidity levels\n\
                 - Wind speed and direction\n\
                 - UV index\n\
                 - Air quality\n\
                 - Extended forecast for the next 3 days"
            ),
            "forecast" => format!(
                "Please provide a 5-day weather forecast for {city} including:\n\
                 - Daily high and low temperatures\n\
                 - Precipitation probability\n\
                 - Weather conditions\n\
                 - Any weather alerts or advisories"
            ),
            _ => format!(
                "What's the current weather in {city}? Please provide temperature, conditions, and humidity."
            ),
        }
    }
}

impl PromptDefinition for WeatherReportPrompt {
    const NAME: &'static str = "weather_report";
    const DESCRIPTION: &'static str = "Generate a weather report prompt for the specified city.";

    fn params() -> Vec<ParamSpec> {
        vec![
            ParamSpec::with_default("city", ParamType::String, "San Francisco")
                .describe("City name for the weather report"),
            ParamSpec::with_default("format", ParamType::String, "brief")
                .describe("Report format (brief, detailed, or forecast)"),
        ]
    }

    fn render(arguments: &Map<String, Value>) -> Result<String, PromptError> {
        Ok(Self::text(
            string_arg(arguments, "city")?,
            string_arg(arguments, "format")?,
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_formats() {
        let brief = WeatherReportPrompt::text("Paris", "brief");
        assert!(brief.contains("Paris"));
        assert!(brief.contains("current weather"));

        let detailed = WeatherReportPrompt::text("London", "detailed");
        assert!(detailed.contains("detailed weather report"));
        assert!(detailed.contains("UV index"));

        let forecast = WeatherReportPrompt::text("Tokyo", "forecast");
        assert!(forecast.contains("5-day weather forecast"));
    }

    #[test]
    fn test_unknown_format_is_brief() {
        assert_eq!(
            WeatherReportPrompt::text("Oslo", "haiku"),
            WeatherReportPrompt::text("Oslo", "brief")
        );
    }
}
