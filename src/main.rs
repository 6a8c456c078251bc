mod client;
mod repl;

use agent_core::config::AppConfig;
use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(
    name = "multi-tools-agent",
    about = "A tool-calling assistant for weather, time, translation and speech",
    version,
    author
)]
struct Cli {
    /// Path to config file (default: ~/.config/multi-tools-agent/config.toml)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Override the model name
    #[arg(short, long, global = true)]
    model: Option<String>,

    /// Override the model provider base URL
    #[arg(long, global = true)]
    api_base: Option<String>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Emit logs as JSON
    #[arg(long, global = true)]
    json_logs: bool,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the HTTP server (default)
    Serve {
        /// Bind host
        #[arg(long)]
        host: Option<String>,
        /// Bind port
        #[arg(long)]
        port: Option<u16>,
        /// Session store URI (memory:// or file:///path)
        #[arg(long)]
        session_uri: Option<String>,
    },

    /// Chat with a running server from the terminal
    Chat {
        /// Server URL (default: API_BASE_URL or http://localhost:8000)
        #[arg(long)]
        server: Option<String>,
        /// Voice id for spoken replies
        #[arg(long)]
        voice: Option<String>,
    },

    /// Show or manage configuration
    Config {
        #[command(subcommand)]
        action: Option<ConfigAction>,
    },
}

#[derive(Subcommand)]
enum ConfigAction {
    /// Show current configuration
    Show,
    /// Initialize default configuration file
    Init,
    /// Print config file path
    Path,
}

fn init_tracing(verbose: bool, json: bool) {
    let filter = if verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| {
            EnvFilter::new("multi_tools_agent=info,agent_core=info,agent_server=info,agent_tools=info,warn")
        })
    };
    let builder = tracing_subscriber::fmt().with_env_filter(filter).with_target(false);
    if json {
        builder.json().init();
    } else {
        builder.init();
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose, cli.json_logs);

    // File, then environment, then flags.
    let mut config = match &cli.config {
        Some(path) => AppConfig::load_from(path)?,
        None => AppConfig::load()?,
    };
    config.apply_env();

    if let Some(model) = &cli.model {
        config.agent.model = model.clone();
    }
    if let Some(api_base) = &cli.api_base {
        config.provider.api_base = api_base.clone();
    }

    match cli.command {
        Some(Commands::Serve { host, port, session_uri }) => {
            if let Some(h) = host {
                config.server.host = h;
            }
            if let Some(p) = port {
                config.server.port = p;
            }
            if let Some(uri) = session_uri {
                config.session.service_uri = Some(uri);
            }
            agent_server::serve(config).await?;
        }
        None => {
            agent_server::serve(config).await?;
        }
        Some(Commands::Chat { server, voice }) => {
            if let Some(url) = server {
                config.client.api_base_url = url;
            }
            repl::run(config, voice).await?;
        }
        Some(Commands::Config { action }) => {
            handle_config_command(action, &config)?;
        }
    }

    Ok(())
}

fn handle_config_command(action: Option<ConfigAction>, config: &AppConfig) -> Result<()> {
    match action {
        Some(ConfigAction::Show) | None => {
            let toml_str = toml::to_string_pretty(&redacted(config))?;
            println!("{}", toml_str);
        }
        Some(ConfigAction::Init) => {
            let path = AppConfig::default_path();
            if path.exists() {
                println!("Config already exists at: {}", path.display());
            } else {
                redacted(config).save()?;
                println!("Created default config at: {}", path.display());
            }
        }
        Some(ConfigAction::Path) => {
            println!("{}", AppConfig::default_path().display());
        }
    }
    Ok(())
}

/// Copy of the configuration without API keys, for display and for files.
fn redacted(config: &AppConfig) -> AppConfig {
    let mut copy = config.clone();
    copy.provider.api_key = None;
    copy.tools.speech.api_key = None;
    copy
}
