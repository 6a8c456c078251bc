use agent_core::error::AgentError;
use agent_core::tool_registry::{ParamSpec, ParamType, Tool, ToolContext, ToolResult};
use async_trait::async_trait;
use chrono::Utc;
use chrono_tz::Tz;
use serde_json::{Map, Value};
use std::sync::OnceLock;

/// All IANA zone names, sorted lexicographically so the first match is stable.
fn sorted_zones() -> &'static [Tz] {
    static ZONES: OnceLock<Vec<Tz>> = OnceLock::new();
    ZONES.get_or_init(|| {
        let mut zones = chrono_tz::TZ_VARIANTS.to_vec();
        zones.sort_by_key(|tz| tz.name());
        zones
    })
}

/// Trimmed, spaces replaced by underscores, lower-cased.
pub fn normalize_city(city: &str) -> String {
    city.trim().replace(' ', "_").to_lowercase()
}

/// First zone (in lexicographic order) whose name contains the normalized city.
pub fn resolve_timezone(city: &str) -> Option<Tz> {
    let needle = normalize_city(city);
    if needle.is_empty() {
        return None;
    }
    sorted_zones()
        .iter()
        .copied()
        .find(|tz| tz.name().to_lowercase().contains(&needle))
}

/// Current local time in a city, resolved through the timezone database.
pub struct CurrentTimeTool;

#[async_trait]
impl Tool for CurrentTimeTool {
    fn name(&self) -> &str {
        "get_current_time"
    }

    fn description(&self) -> &str {
        "Get the current date and time in a city."
    }

    fn parameters(&self) -> Vec<ParamSpec> {
        vec![ParamSpec::required(
            "city",
            ParamType::String,
            "Name of the city, e.g. \"Tokyo\" or \"New York\"",
        )]
    }

    async fn execute(&self, args: Map<String, Value>, _ctx: &ToolContext) -> Result<ToolResult, AgentError> {
        let city = args.get("city").and_then(Value::as_str).unwrap_or_default();
        tracing::debug!("Tool: get_current_time called for {}", city);

        let Some(tz) = resolve_timezone(city) else {
            return Ok(ToolResult::error(format!(
                "Sorry, I don't have timezone information for {}.",
                city
            )));
        };

        let now = Utc::now().with_timezone(&tz);
        let formatted = now.format("%Y-%m-%d %H:%M:%S").to_string();
        let report = format!(
            "The current time in {} is {} (Timezone: {})",
            city,
            formatted,
            tz.name()
        );

        Ok(ToolResult::success_report(report)
            .with_field("timezone", tz.name())
            .with_field("current_time", formatted))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_normalize() {
        assert_eq!(normalize_city("  New York "), "new_york");
        assert_eq!(normalize_city("Los Angeles"), "los_angeles");
    }

    #[test]
    fn test_resolves_known_cities() {
        assert_eq!(resolve_timezone("New York").unwrap().name(), "America/New_York");
        assert_eq!(resolve_timezone("tokyo").unwrap().name(), "Asia/Tokyo");
        assert_eq!(resolve_timezone("London").unwrap().name(), "Europe/London");
        assert_eq!(resolve_timezone(" paris ").unwrap().name(), "Europe/Paris");
    }

    #[test]
    fn test_first_match_is_lexicographic() {
        // "america" matches many zones; the lexicographically smallest wins.
        let first = sorted_zones()
            .iter()
            .map(|tz| tz.name())
            .filter(|n| n.to_lowercase().contains("america"))
            .min()
            .unwrap();
        assert_eq!(resolve_timezone("America").unwrap().name(), first);
        assert_eq!(resolve_timezone("America"), resolve_timezone("america"));
    }

    #[test]
    fn test_no_match_and_empty() {
        assert!(resolve_timezone("Atlantis").is_none());
        assert!(resolve_timezone("   ").is_none());
    }

    #[tokio::test]
    async fn test_success_payload() {
        let mut args = Map::new();
        args.insert("city".into(), json!("Tokyo"));
        let result = CurrentTimeTool.execute(args, &ToolContext::stateless()).await.unwrap();
        let v = result.to_value();
        assert_eq!(v["status"], "success");
        assert_eq!(v["timezone"], "Asia/Tokyo");
        let report = v["report"].as_str().unwrap();
        assert!(report.starts_with("The current time in Tokyo is "));
        assert!(report.ends_with("(Timezone: Asia/Tokyo)"));
        // YYYY-MM-DD HH:MM:SS
        assert_eq!(v["current_time"].as_str().unwrap().len(), 19);
    }

    #[tokio::test]
    async fn test_unknown_city_error() {
        let mut args = Map::new();
        args.insert("city".into(), json!("Atlantis"));
        let result = CurrentTimeTool.execute(args, &ToolContext::stateless()).await.unwrap();
        assert_eq!(
            result.error_message(),
            Some("Sorry, I don't have timezone information for Atlantis.")
        );
    }
}
