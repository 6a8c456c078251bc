//! HTTP client for a running agent server, plus the helpers that pull the
//! reply text and generated audio path out of a turn's events.

use agent_core::types::{Event, NewMessage, Role};
use anyhow::{anyhow, Context, Result};
use regex::Regex;
use serde_json::{json, Value};
use std::path::{Path, PathBuf};
use std::sync::OnceLock;
use std::time::Duration;

const VOICE_TOOL: &str = "get_voice_response";

/// Talks to the agent server's session and run endpoints as one user.
pub struct ApiClient {
    http: reqwest::Client,
    base_url: String,
    app_name: String,
    user_id: String,
}

impl ApiClient {
    /// A client with a fresh `user-<uuid>` identity.
    pub fn new(base_url: impl Into<String>, app_name: impl Into<String>) -> Self {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(300))
            .build()
            .unwrap_or_default();
        Self {
            http,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            app_name: app_name.into(),
            user_id: format!("user-{}", uuid::Uuid::new_v4()),
        }
    }

    pub fn user_id(&self) -> &str {
        &self.user_id
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub async fn health(&self) -> Result<Value> {
        let resp = self
            .http
            .get(format!("{}/health", self.base_url))
            .send()
            .await
            .with_context(|| format!("Cannot reach {}", self.base_url))?;
        parse_response(resp).await
    }

    pub async fn create_session(&self, session_id: &str) -> Result<Value> {
        let url = format!(
            "{}/apps/{}/users/{}/sessions/{}",
            self.base_url, self.app_name, self.user_id, session_id
        );
        let resp = self
            .http
            .post(url)
            .json(&json!({}))
            .send()
            .await
            .with_context(|| format!("Cannot reach {}", self.base_url))?;
        parse_response(resp).await
    }

    /// Send one user message and return the events the agent produced.
    pub async fn send_message(&self, session_id: &str, text: &str) -> Result<Vec<Event>> {
        let body = json!({
            "app_name": self.app_name,
            "user_id": self.user_id,
            "session_id": session_id,
            "new_message": NewMessage::user(text),
        });
        let resp = self
            .http
            .post(format!("{}/run", self.base_url))
            .json(&body)
            .send()
            .await
            .with_context(|| format!("Cannot reach {}", self.base_url))?;
        let value = parse_response(resp).await?;
        serde_json::from_value(value).context("Unexpected /run response")
    }
}

async fn parse_response(resp: reqwest::Response) -> Result<Value> {
    let status = resp.status();
    let body = resp.text().await?;
    if !status.is_success() {
        let detail = serde_json::from_str::<Value>(&body)
            .ok()
            .and_then(|v| v.get("detail").and_then(Value::as_str).map(str::to_string))
            .unwrap_or(body);
        return Err(anyhow!("Server returned {}: {}", status.as_u16(), detail));
    }
    if body.trim().is_empty() {
        return Ok(Value::Null);
    }
    serde_json::from_str(&body).context("Response is not JSON")
}

/// Session ids are `session-<unix seconds>`.
pub fn new_session_id() -> String {
    format!("session-{}", chrono::Utc::now().timestamp())
}

/// Append the voice selection the agent's instruction looks for.
pub fn with_voice(message: &str, voice_id: &str) -> String {
    format!("{} with voice_id:{}", message, voice_id)
}

/// Text of the last model event that carries text.
pub fn extract_reply(events: &[Event]) -> Option<String> {
    events
        .iter()
        .rev()
        .filter_map(|e| e.content.as_ref())
        .filter(|c| c.role == Role::Model)
        .find_map(|c| c.text())
}

fn saved_at_pattern() -> Option<&'static Regex> {
    static PATTERN: OnceLock<Option<Regex>> = OnceLock::new();
    PATTERN
        .get_or_init(|| Regex::new(r"saved at:\s*(.+)").ok())
        .as_ref()
}

/// Path reported by the first voice tool response, if any.
pub fn extract_audio_path(events: &[Event]) -> Option<String> {
    let response = events
        .iter()
        .filter_map(|e| e.content.as_ref())
        .flat_map(|c| c.function_responses())
        .find(|r| r.name == VOICE_TOOL)?;

    let path = match response.response.get("report").and_then(Value::as_str) {
        Some(report) => saved_at_pattern()?
            .captures(report)?
            .get(1)?
            .as_str()
            .trim_end_matches(|c: char| c.is_whitespace() || c == '.'),
        None => response.response.get("audio_path")?.as_str()?,
    };
    (!path.is_empty()).then(|| path.to_string())
}

/// The reported path when it exists locally, else the fallback when that exists.
pub fn resolve_playable(path: Option<&str>, fallback: &Path) -> Option<PathBuf> {
    if let Some(p) = path.map(Path::new) {
        if p.exists() {
            return Some(p.to_path_buf());
        }
    }
    fallback.exists().then(|| fallback.to_path_buf())
}
