use agent_core::error::AgentError;
use agent_core::state::{LAST_CITY_CHECKED_KEY, TEMPERATURE_UNIT_KEY};
use agent_core::tool_registry::{ParamSpec, ParamType, Tool, ToolContext, ToolResult};
use async_trait::async_trait;
use serde_json::{Map, Value};

/// Unit used when the session has no preference recorded.
pub const DEFAULT_UNIT: &str = "Celsius";

struct CityWeather {
    key: &'static str,
    temp_c: f64,
    condition: &'static str,
}

/// Known cities, keyed by lowercase name with spaces removed. Temperatures in Celsius.
const WEATHER_TABLE: &[CityWeather] = &[
    CityWeather { key: "newyork", temp_c: 25.0, condition: "sunny" },
    CityWeather { key: "london", temp_c: 15.0, condition: "cloudy" },
    CityWeather { key: "tokyo", temp_c: 18.0, condition: "light rain" },
];

fn normalize_city(city: &str) -> String {
    city.to_lowercase().chars().filter(|c| !c.is_whitespace()).collect()
}

/// First letter upper-cased, the rest lower-cased.
fn capitalize(s: &str) -> String {
    let mut chars = s.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars.flat_map(|c| c.to_lowercase())).collect(),
        None => String::new(),
    }
}

pub fn celsius_to_fahrenheit(c: f64) -> f64 {
    c * 9.0 / 5.0 + 32.0
}

/// Mock weather lookup that honors the session's temperature unit preference.
pub struct WeatherTool;

#[async_trait]
impl Tool for WeatherTool {
    fn name(&self) -> &str {
        "get_weather"
    }

    fn description(&self) -> &str {
        "Retrieve the current weather report for a city. The temperature is given in the \
         user's preferred unit (Celsius unless they asked for Fahrenheit)."
    }

    fn parameters(&self) -> Vec<ParamSpec> {
        vec![ParamSpec::required(
            "city",
            ParamType::String,
            "Name of the city, e.g. \"New York\"",
        )]
    }

    async fn execute(&self, args: Map<String, Value>, ctx: &ToolContext) -> Result<ToolResult, AgentError> {
        let city = args.get("city").and_then(Value::as_str).unwrap_or_default();
        tracing::debug!("Tool: get_weather called for {}", city);

        let unit = ctx
            .state()
            .map(|s| s.get_str_or(TEMPERATURE_UNIT_KEY, DEFAULT_UNIT))
            .unwrap_or_else(|| DEFAULT_UNIT.to_string());
        tracing::debug!("Tool: read state '{}': {}", TEMPERATURE_UNIT_KEY, unit);

        let normalized = normalize_city(city);
        let Some(entry) = WEATHER_TABLE.iter().find(|w| w.key == normalized) else {
            tracing::debug!("Tool: city '{}' not found", city);
            return Ok(ToolResult::error(format!(
                "Sorry, I don't have weather information for '{}'.",
                city
            )));
        };

        let (value, symbol) = if unit == "Fahrenheit" {
            (celsius_to_fahrenheit(entry.temp_c), "°F")
        } else {
            (entry.temp_c, "°C")
        };
        let temperature = value.round() as i64;

        let report = format!(
            "The weather in {} is {} with a temperature of {}{}.",
            capitalize(city),
            entry.condition,
            temperature,
            symbol
        );

        if let Some(state) = ctx.state() {
            state.set(LAST_CITY_CHECKED_KEY, city);
            tracing::debug!("Tool: updated state '{}': {}", LAST_CITY_CHECKED_KEY, city);
        }

        Ok(ToolResult::success_report(report)
            .with_field("temperature", temperature)
            .with_field("unit", if symbol == "°F" { "Fahrenheit" } else { "Celsius" }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use agent_core::state::StateStore;
    use serde_json::json;

    async fn weather(city: &str, ctx: &ToolContext) -> ToolResult {
        let mut args = Map::new();
        args.insert("city".into(), json!(city));
        WeatherTool.execute(args, ctx).await.unwrap()
    }

    #[tokio::test]
    async fn test_defaults_to_celsius_for_all_cities() {
        let state = StateStore::new();
        let ctx = ToolContext::new(state, "inv");
        for (city, expected) in [("New York", 25), ("London", 15), ("Tokyo", 18)] {
            let result = weather(city, &ctx).await;
            assert!(result.is_success());
            let report = result.report().unwrap().as_str().unwrap().to_string();
            assert!(report.contains(&format!("{expected}°C")), "got: {report}");
        }
    }

    #[tokio::test]
    async fn test_fahrenheit_preference() {
        let state = StateStore::new();
        state.set(TEMPERATURE_UNIT_KEY, "Fahrenheit");
        let ctx = ToolContext::new(state, "inv");

        for (city, expected) in [("New York", 77), ("London", 59), ("Tokyo", 64)] {
            let result = weather(city, &ctx).await;
            let v = result.to_value();
            assert_eq!(v["temperature"], json!(expected), "{city}");
            assert!(v["report"].as_str().unwrap().ends_with(&format!("{expected}°F.")));
        }
    }

    #[tokio::test]
    async fn test_city_matching_ignores_case_and_spaces() {
        let ctx = ToolContext::new(StateStore::new(), "inv");
        let reports: Vec<Value> = weather_all(&ctx, &["NewYork", "new york", "New York", " NEW  YORK "]).await;
        for r in &reports {
            assert_eq!(r["status"], "success");
            assert_eq!(r["temperature"], json!(25));
        }
    }

    async fn weather_all(ctx: &ToolContext, cities: &[&str]) -> Vec<Value> {
        let mut out = Vec::new();
        for city in cities {
            out.push(weather(city, ctx).await.to_value());
        }
        out
    }

    #[tokio::test]
    async fn test_unknown_city_is_error_naming_city() {
        let state = StateStore::new();
        let ctx = ToolContext::new(state.clone(), "inv");
        let result = weather("Atlantis", &ctx).await;
        let v = result.to_value();
        assert_eq!(v["status"], "error");
        assert!(v["error_message"].as_str().unwrap().contains("Atlantis"));
        assert_eq!(state.get(LAST_CITY_CHECKED_KEY), None);
    }

    #[tokio::test]
    async fn test_records_last_city_checked() {
        let state = StateStore::new();
        let ctx = ToolContext::new(state.clone(), "inv");
        weather("london", &ctx).await;
        assert_eq!(state.get(LAST_CITY_CHECKED_KEY), Some(json!("london")));
    }

    #[tokio::test]
    async fn test_report_format() {
        let result = weather("new york", &ToolContext::stateless()).await;
        assert_eq!(
            result.report().unwrap(),
            "The weather in New york is sunny with a temperature of 25°C."
        );
    }

    #[test]
    fn test_conversion_rounding() {
        assert_eq!(celsius_to_fahrenheit(18.0).round() as i64, 64);
        assert_eq!(capitalize("tOKYO"), "Tokyo");
        assert_eq!(capitalize(""), "");
    }
}
