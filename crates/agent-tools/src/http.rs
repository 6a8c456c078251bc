use agent_core::error::AgentError;
use std::time::Duration;

/// Build the HTTP client shared by the network-backed tools.
pub fn build_client(timeout_secs: u64) -> reqwest::Client {
    reqwest::Client::builder()
        .timeout(Duration::from_secs(timeout_secs))
        .user_agent(concat!("multi-tools-agent/", env!("CARGO_PKG_VERSION")))
        .build()
        .unwrap_or_default()
}

/// Describe a failed request, calling out timeouts. The URL is dropped from
/// the message so query credentials never reach the model or the logs.
pub fn request_error(tool_name: &str, e: reqwest::Error, timeout_secs: u64) -> AgentError {
    if e.is_timeout() {
        AgentError::tool(tool_name, AgentError::Timeout(timeout_secs).to_string())
    } else {
        AgentError::tool(tool_name, format!("Request failed: {}", e.without_url()))
    }
}

/// Describe a response body that could not be decoded, without its URL.
pub fn decode_error(tool_name: &str, e: reqwest::Error) -> AgentError {
    AgentError::tool(tool_name, format!("Invalid response body: {}", e.without_url()))
}

/// Fail on non-2xx responses, keeping a short excerpt of the body.
pub async fn ensure_success(tool_name: &str, response: reqwest::Response) -> Result<reqwest::Response, AgentError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    let excerpt: String = body.chars().take(300).collect();
    Err(AgentError::tool(
        tool_name,
        format!("HTTP {}: {}", status.as_u16(), excerpt),
    ))
}
