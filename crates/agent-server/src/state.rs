use agent_core::agent::Agent;
use agent_core::config::AppConfig;
use agent_core::model::{ModelBackend, OpenAiCompatBackend};
use agent_core::runner::Runner;
use agent_core::session::SessionManager;
use agent_core::tool_registry::ToolRegistry;
use std::sync::Arc;
use tokio::sync::RwLock;

/// Shared application state for the server.
#[derive(Clone)]
pub struct AppState {
    pub config: AppConfig,
    pub sessions: Arc<RwLock<SessionManager>>,
    pub runner: Arc<Runner>,
}

impl AppState {
    /// Assemble state from explicit parts.
    pub fn new(
        config: AppConfig,
        tools: ToolRegistry,
        sessions: SessionManager,
        model: Arc<dyn ModelBackend>,
    ) -> Self {
        let agent = Arc::new(Agent::new(&config.agent, tools));
        let sessions = Arc::new(RwLock::new(sessions));
        let runner = Runner::new(agent, sessions.clone(), model)
            .with_max_iterations(config.agent.max_tool_iterations);

        Self {
            config,
            sessions,
            runner: Arc::new(runner),
        }
    }

    /// Build the production state: every tool, the session backend named by
    /// the configuration, and the OpenAI-compatible model backend.
    pub fn from_config(config: AppConfig) -> anyhow::Result<Self> {
        let tools = agent_tools::register_all(&config)?;
        let sessions = SessionManager::from_uri(config.session.service_uri.as_deref())?;
        if config.provider.api_key.is_none() {
            tracing::warn!("GOOGLE_API_KEY is not set; model calls will fail");
        }
        let model: Arc<dyn ModelBackend> = Arc::new(OpenAiCompatBackend::new(&config.provider));
        Ok(Self::new(config, tools, sessions, model))
    }

    pub fn app_name(&self) -> &str {
        &self.config.agent.app_name
    }
}
