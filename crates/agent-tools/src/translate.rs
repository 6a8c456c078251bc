use crate::http::{build_client, decode_error, ensure_success, request_error};
use agent_core::config::{ProviderConfig, ToolsConfig};
use agent_core::error::AgentError;
use agent_core::tool_registry::{ParamSpec, ParamType, Tool, ToolContext, ToolResult};
use async_trait::async_trait;
use serde_json::{json, Map, Value};

const TOOL_NAME: &str = "translate_response";
const API_KEY_HEADER: &str = "x-goog-api-key";

/// Prompt sent to the generative-language API.
pub fn translation_prompt(lang: &str, text: &str) -> String {
    format!("Convert the following text in {}: {}", lang, text)
}

/// Translate text by asking the generative-language API.
pub struct TranslateTool {
    client: reqwest::Client,
    api_base: String,
    model: String,
    api_key: Option<String>,
    timeout_secs: u64,
}

impl TranslateTool {
    pub fn new(tools: &ToolsConfig, provider: &ProviderConfig) -> Self {
        Self {
            client: build_client(tools.timeout_secs),
            api_base: tools.translation.api_base.trim_end_matches('/').to_string(),
            model: tools.translation.model.clone(),
            api_key: provider.api_key.clone(),
            timeout_secs: tools.timeout_secs,
        }
    }

    async fn translate(&self, text: &str, lang: &str) -> Result<Value, AgentError> {
        let api_key = self
            .api_key
            .as_deref()
            .filter(|k| !k.trim().is_empty())
            .ok_or_else(|| AgentError::tool(TOOL_NAME, "GOOGLE_API_KEY is not configured"))?;

        let url = format!("{}/models/{}:generateContent", self.api_base, self.model);
        let body = json!({
            "contents": [{
                "parts": [{"text": translation_prompt(lang, text)}]
            }]
        });

        let response = self
            .client
            .post(&url)
            .header(API_KEY_HEADER, api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| request_error(TOOL_NAME, e, self.timeout_secs))?;
        let response = ensure_success(TOOL_NAME, response).await?;

        response
            .json::<Value>()
            .await
            .map_err(|e| decode_error(TOOL_NAME, e))
    }
}

#[async_trait]
impl Tool for TranslateTool {
    fn name(&self) -> &str {
        TOOL_NAME
    }

    fn description(&self) -> &str {
        "Translate a piece of text into the requested language."
    }

    fn parameters(&self) -> Vec<ParamSpec> {
        vec![
            ParamSpec::required("originalText", ParamType::String, "The text to translate"),
            ParamSpec::required("lang", ParamType::String, "Target language, e.g. \"French\""),
        ]
    }

    async fn execute(&self, args: Map<String, Value>, _ctx: &ToolContext) -> Result<ToolResult, AgentError> {
        let text = args.get("originalText").and_then(Value::as_str).unwrap_or_default();
        let lang = args.get("lang").and_then(Value::as_str).unwrap_or_default();
        tracing::debug!("Tool: translate_response called for lang {}", lang);

        match self.translate(text, lang).await {
            Ok(raw) => Ok(ToolResult::success_report(raw)),
            Err(e) => {
                tracing::warn!("Error fetching translation: {}", e);
                Ok(ToolResult::error(e.to_string()))
            }
        }
    }
}
