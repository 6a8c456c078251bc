pub mod agent;
pub mod config;
pub mod error;
pub mod model;
pub mod runner;
pub mod session;
pub mod state;
pub mod tool_registry;
pub mod types;

pub use agent::Agent;
pub use config::AppConfig;
pub use error::AgentError;
pub use runner::Runner;
pub use session::{Session, SessionKey, SessionManager};
pub use state::StateStore;
pub use tool_registry::{Tool, ToolRegistry, ToolResult};
