use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Top-level application configuration, loaded from TOML and then
/// overridden from the environment.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub agent: AgentConfig,
    pub provider: ProviderConfig,
    pub tools: ToolsConfig,
    pub server: ServerConfig,
    pub session: SessionConfig,
    pub client: ClientConfig,
}

impl AppConfig {
    /// Load configuration from default path (~/.config/multi-tools-agent/config.toml),
    /// falling back to defaults if the file doesn't exist.
    pub fn load() -> anyhow::Result<Self> {
        let path = Self::default_path();
        if path.exists() {
            Self::load_from(&path)
        } else {
            Ok(Self::default())
        }
    }

    /// Load configuration from a specific path.
    pub fn load_from(path: &Path) -> anyhow::Result<Self> {
        let contents = std::fs::read_to_string(path)?;
        let config: Self = toml::from_str(&contents)?;
        Ok(config)
    }

    /// Write current configuration to the default path.
    pub fn save(&self) -> anyhow::Result<()> {
        let path = Self::default_path();
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let contents = toml::to_string_pretty(self)?;
        std::fs::write(&path, contents)?;
        Ok(())
    }

    /// Default config file path.
    pub fn default_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("multi-tools-agent")
            .join("config.toml")
    }

    /// Apply overrides from the process environment, reading `.env` first.
    pub fn apply_env(&mut self) {
        if let Ok(path) = dotenvy::dotenv() {
            tracing::debug!("Loaded environment from {}", path.display());
        }
        self.apply_env_from(|key| std::env::var(key).ok());
    }

    /// Apply overrides using `lookup` to resolve variable names. Empty values
    /// are ignored.
    pub fn apply_env_from<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        if let Some(uri) = get("SESSION_SERVICE_URI") {
            self.session.service_uri = Some(uri);
        }
        if let Some(model) = get("AGENT_MODEL") {
            self.agent.model = model;
        }
        if let Some(key) = get("GOOGLE_API_KEY") {
            self.provider.api_key = Some(key);
        }
        if let Some(key) = get("ELEVENLABS_API_KEY") {
            self.tools.speech.api_key = Some(key);
        }
        if let Some(url) = get("API_BASE_URL") {
            self.client.api_base_url = url;
        }
        if let Some(app) = get("AGENT_APP_NAME") {
            self.agent.app_name = app.clone();
            self.client.app_name = app;
        }
    }
}

/// Identity of the hosted agent.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AgentConfig {
    /// Application name sessions are registered under.
    pub app_name: String,
    pub name: String,
    pub description: String,
    /// Model identifier passed to the provider.
    pub model: String,
    /// Overrides the built-in instruction text.
    pub instruction: Option<String>,
    /// Model round-trips allowed per user turn.
    pub max_tool_iterations: usize,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            app_name: "multi_tools_agent".into(),
            name: "support_info_agent".into(),
            description: "Agent to answer questions about time and weather, translate text, \
                          and provide voice responses."
                .into(),
            model: "gemini-2.5-flash".into(),
            instruction: None,
            max_tool_iterations: 20,
        }
    }
}

/// LLM provider configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ProviderConfig {
    /// Base URL for the OpenAI-compatible API.
    pub api_base: String,
    /// API key (`GOOGLE_API_KEY`). Shared with the translation tool.
    pub api_key: Option<String>,
    /// Maximum tokens to generate.
    pub max_tokens: u32,
    /// Sampling temperature.
    pub temperature: f32,
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            api_base: "https://generativelanguage.googleapis.com/v1beta/openai".into(),
            api_key: None,
            max_tokens: 4096,
            temperature: 0.7,
        }
    }
}

/// Settings shared by the callback tools.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ToolsConfig {
    /// Timeout for every outbound HTTP call, in seconds.
    pub timeout_secs: u64,
    /// Directory generated audio is written to.
    pub output_dir: PathBuf,
    pub translation: TranslationConfig,
    pub speech: SpeechConfig,
}

impl Default for ToolsConfig {
    fn default() -> Self {
        Self {
            timeout_secs: 30,
            output_dir: PathBuf::from("output"),
            translation: TranslationConfig::default(),
            speech: SpeechConfig::default(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TranslationConfig {
    /// Base URL of the generative-language API.
    pub api_base: String,
    pub model: String,
}

impl Default for TranslationConfig {
    fn default() -> Self {
        Self {
            api_base: "https://generativelanguage.googleapis.com/v1beta".into(),
            model: "gemini-2.0-flash".into(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SpeechConfig {
    /// Base URL of the speech-synthesis API.
    pub api_base: String,
    /// API key (`ELEVENLABS_API_KEY`).
    pub api_key: Option<String>,
    pub model_id: String,
    pub output_format: String,
    pub default_voice_id: String,
    pub stability: f32,
    pub similarity_boost: f32,
    pub style: f32,
    pub speed: f32,
    pub use_speaker_boost: bool,
}

impl Default for SpeechConfig {
    fn default() -> Self {
        Self {
            api_base: "https://api.elevenlabs.io/v1".into(),
            api_key: None,
            model_id: "eleven_multilingual_v2".into(),
            output_format: "mp3_44100_128".into(),
            default_voice_id: "JBFqnCBsd6RMkjVDRZzb".into(),
            stability: 0.5,
            similarity_boost: 0.75,
            style: 0.0,
            speed: 1.0,
            use_speaker_boost: true,
        }
    }
}

/// HTTP server configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Bind address.
    pub host: String,
    /// Port.
    pub port: u16,
    /// Enable CORS.
    pub cors: bool,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".into(),
            port: 8000,
            cors: true,
        }
    }
}

/// Session persistence configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    /// Backing store URI (`SESSION_SERVICE_URI`). `None` keeps sessions in memory.
    pub service_uri: Option<String>,
}

/// Settings for the terminal chat client.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    pub api_base_url: String,
    pub app_name: String,
    /// Audio played when the path returned by the server is not accessible.
    pub default_audio_path: PathBuf,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            api_base_url: "http://localhost:8000".into(),
            app_name: "multi_tools_agent".into(),
            default_audio_path: PathBuf::from("output/audio-test.mp3"),
        }
    }
}
