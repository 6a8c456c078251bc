use agent_core::error::AgentError;
use agent_core::state::TEMPERATURE_UNIT_KEY;
use agent_core::tool_registry::{ParamSpec, ParamType, Tool, ToolContext, ToolResult};
use async_trait::async_trait;
use serde_json::{Map, Value};

/// Canonical spelling of a temperature unit, if recognised.
pub fn parse_unit(raw: &str) -> Option<&'static str> {
    match raw.trim().to_lowercase().as_str() {
        "celsius" | "c" | "°c" => Some("Celsius"),
        "fahrenheit" | "f" | "°f" => Some("Fahrenheit"),
        _ => None,
    }
}

/// Record the user's preferred temperature unit in session state.
pub struct SetTemperatureUnitTool;

#[async_trait]
impl Tool for SetTemperatureUnitTool {
    fn name(&self) -> &str {
        "set_temperature_unit"
    }

    fn description(&self) -> &str {
        "Remember whether the user wants temperatures in Celsius or Fahrenheit."
    }

    fn parameters(&self) -> Vec<ParamSpec> {
        vec![ParamSpec::required(
            "unit",
            ParamType::String,
            "\"Celsius\" or \"Fahrenheit\"",
        )]
    }

    async fn execute(&self, args: Map<String, Value>, ctx: &ToolContext) -> Result<ToolResult, AgentError> {
        let raw = args.get("unit").and_then(Value::as_str).unwrap_or_default();
        let Some(unit) = parse_unit(raw) else {
            return Ok(ToolResult::error(format!(
                "Unsupported temperature unit '{}'. Use Celsius or Fahrenheit.",
                raw
            )));
        };
        let Some(state) = ctx.state() else {
            return Ok(ToolResult::error("No session state available to store the preference."));
        };

        state.set(TEMPERATURE_UNIT_KEY, unit);
        tracing::debug!("Tool: updated state '{}': {}", TEMPERATURE_UNIT_KEY, unit);
        Ok(ToolResult::success_report(format!("Temperatures will be shown in {}.", unit))
            .with_field("unit", unit))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::weather::WeatherTool;
    use agent_core::state::StateStore;
    use serde_json::json;

    fn unit_args(unit: &str) -> Map<String, Value> {
        let mut m = Map::new();
        m.insert("unit".into(), json!(unit));
        m
    }

    #[test]
    fn test_parse_unit() {
        assert_eq!(parse_unit("fahrenheit"), Some("Fahrenheit"));
        assert_eq!(parse_unit(" CELSIUS "), Some("Celsius"));
        assert_eq!(parse_unit("F"), Some("Fahrenheit"));
        assert_eq!(parse_unit("kelvin"), None);
    }

    #[tokio::test]
    async fn test_preference_reaches_weather_tool() {
        let state = StateStore::new();
        let ctx = ToolContext::new(state.clone(), "inv");

        let set = SetTemperatureUnitTool.execute(unit_args("fahrenheit"), &ctx).await.unwrap();
        assert!(set.is_success());
        assert_eq!(state.get(TEMPERATURE_UNIT_KEY), Some(json!("Fahrenheit")));

        let mut args = Map::new();
        args.insert("city".into(), json!("London"));
        let weather = WeatherTool.execute(args, &ctx).await.unwrap().to_value();
        assert_eq!(weather["temperature"], json!(59));
    }

    #[tokio::test]
    async fn test_rejects_unknown_unit_without_touching_state() {
        let state = StateStore::new();
        let ctx = ToolContext::new(state.clone(), "inv");
        let result = SetTemperatureUnitTool.execute(unit_args("kelvin"), &ctx).await.unwrap();
        assert!(result.error_message().unwrap().contains("kelvin"));
        assert!(state.is_empty());
    }

    #[tokio::test]
    async fn test_needs_session_state() {
        let result = SetTemperatureUnitTool
            .execute(unit_args("Celsius"), &ToolContext::stateless())
            .await
            .unwrap();
        assert!(!result.is_success());
    }
}
