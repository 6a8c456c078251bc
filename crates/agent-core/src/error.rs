use thiserror::Error;

#[derive(Error, Debug)]
pub enum AgentError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Provider error: {0}")]
    Provider(String),

    #[error("Tool execution error: {tool_name}: {message}")]
    ToolExecution { tool_name: String, message: String },

    #[error("Tool not found: {0}")]
    ToolNotFound(String),

    #[error("Duplicate tool name: {0}")]
    DuplicateTool(String),

    #[error("Invalid arguments for {tool_name}: {message}")]
    InvalidArguments { tool_name: String, message: String },

    #[error("Session not found: {app_name}/{user_id}/{session_id}")]
    SessionNotFound {
        app_name: String,
        user_id: String,
        session_id: String,
    },

    #[error("Session already exists: {app_name}/{user_id}/{session_id}")]
    DuplicateSession {
        app_name: String,
        user_id: String,
        session_id: String,
    },

    #[error("Invalid identifier '{0}'")]
    InvalidId(String),

    #[error("Unknown app: {0}")]
    UnknownApp(String),

    #[error("Timed out after {0}s")]
    Timeout(u64),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("{0}")]
    Other(#[from] anyhow::Error),
}

impl AgentError {
    /// Shorthand for a tool-scoped execution failure.
    pub fn tool(tool_name: impl Into<String>, message: impl Into<String>) -> Self {
        Self::ToolExecution {
            tool_name: tool_name.into(),
            message: message.into(),
        }
    }
}

pub type Result<T> = std::result::Result<T, AgentError>;
