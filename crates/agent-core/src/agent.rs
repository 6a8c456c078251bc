use crate::config::AgentConfig;
use crate::tool_registry::ToolRegistry;
use serde::Serialize;
use std::sync::Arc;

/// Instruction used when the configuration does not supply one.
pub const DEFAULT_INSTRUCTION: &str = "\
You are a skilled assistant that provides general and support information to users.

Your process:
1. Understand the user's request. If it is unclear, ask for more information.
2. Pick the tool (or tools) that can answer it.
3. Check the parameters before calling a tool.
4. Call the tool.
5. Report the result in a human-readable way and say which tools you used.
   Format timestamps and code with markdown backticks.
6. Ask whether the user needs anything else.

Tools:
- get_weather: current weather for a city. Honors the user's temperature unit preference.
- set_temperature_unit: records whether the user wants Celsius or Fahrenheit.
- get_current_time: current time in a city.
- translate_response: translates text into a requested language.
- get_voice_response: turns text into speech. The user's message ends with
  `with voice_id:<id>`; pass that id as the voice_id parameter.
";

/// The conversational agent: model, instruction, and a fixed tool set.
pub struct Agent {
    pub name: String,
    pub description: String,
    pub model: String,
    pub instruction: String,
    tools: Arc<ToolRegistry>,
}

/// Public summary served on `/agent-info`.
#[derive(Debug, Clone, Serialize)]
pub struct AgentInfo {
    pub agent_name: String,
    pub description: String,
    pub model: String,
}

impl Agent {
    pub fn new(config: &AgentConfig, tools: ToolRegistry) -> Self {
        Self {
            name: config.name.clone(),
            description: config.description.clone(),
            model: config.model.clone(),
            instruction: config
                .instruction
                .clone()
                .unwrap_or_else(|| DEFAULT_INSTRUCTION.to_string()),
            tools: Arc::new(tools),
        }
    }

    pub fn tools(&self) -> &ToolRegistry {
        &self.tools
    }

    pub fn info(&self) -> AgentInfo {
        AgentInfo {
            agent_name: self.name.clone(),
            description: self.description.clone(),
            model: self.model.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_fill_instruction() {
        let agent = Agent::new(&AgentConfig::default(), ToolRegistry::new());
        assert_eq!(agent.instruction, DEFAULT_INSTRUCTION);
        let info = agent.info();
        assert_eq!(info.agent_name, "support_info_agent");
        assert_eq!(info.model, "gemini-2.5-flash");
        assert!(agent.tools().is_empty());
    }
}
