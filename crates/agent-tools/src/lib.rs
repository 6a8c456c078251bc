pub mod http;
pub mod preferences;
pub mod time;
pub mod translate;
pub mod voice;
pub mod weather;

use agent_core::config::AppConfig;
use agent_core::error::Result;
use agent_core::tool_registry::ToolRegistry;
use std::sync::Arc;
use std::time::Duration;

/// Build the registry holding every callback tool, in the order they are
/// declared to the model.
pub fn register_all(config: &AppConfig) -> Result<ToolRegistry> {
    // Registry bound sits above the HTTP timeout so the tool reports its own.
    let bound = Duration::from_secs(config.tools.timeout_secs.saturating_add(5));
    let mut registry = ToolRegistry::new().with_timeout(bound);

    registry.register(Arc::new(weather::WeatherTool))?;
    registry.register(Arc::new(preferences::SetTemperatureUnitTool))?;
    registry.register(Arc::new(time::CurrentTimeTool))?;
    registry.register(Arc::new(translate::TranslateTool::new(&config.tools, &config.provider)))?;
    registry.register(Arc::new(voice::VoiceTool::new(&config.tools)))?;

    tracing::debug!("Registered tools: {:?}", registry.list_names());
    Ok(registry)
}
