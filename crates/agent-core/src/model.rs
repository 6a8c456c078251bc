//! Model backends the runner asks for the next step of a turn.

use crate::config::ProviderConfig;
use crate::error::AgentError;
use crate::types::{Content, FunctionCall, Role, ToolSchema};

use async_openai::config::OpenAIConfig;
use async_openai::types::{
    ChatCompletionMessageToolCall, ChatCompletionRequestAssistantMessageArgs,
    ChatCompletionRequestMessage, ChatCompletionRequestSystemMessageArgs,
    ChatCompletionRequestToolMessageArgs, ChatCompletionRequestUserMessageArgs,
    ChatCompletionToolArgs, ChatCompletionToolType, CreateChatCompletionRequestArgs,
    FunctionObjectArgs,
};
use async_openai::Client;
use async_trait::async_trait;
use serde_json::Value;
use tracing::debug;
use uuid::Uuid;

/// Everything the model needs to pick the next step.
#[derive(Debug, Clone)]
pub struct ModelRequest {
    pub model: String,
    pub instruction: String,
    /// Conversation so far, oldest first.
    pub history: Vec<Content>,
    pub tools: Vec<ToolSchema>,
}

/// The model's answer: text, tool calls, or both.
#[derive(Debug, Clone, Default)]
pub struct ModelTurn {
    pub text: Option<String>,
    pub function_calls: Vec<FunctionCall>,
}

impl ModelTurn {
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            text: Some(text.into()),
            function_calls: Vec::new(),
        }
    }

    pub fn calls(function_calls: Vec<FunctionCall>) -> Self {
        Self {
            text: None,
            function_calls,
        }
    }
}

#[async_trait]
pub trait ModelBackend: Send + Sync {
    async fn generate(&self, request: ModelRequest) -> Result<ModelTurn, AgentError>;
}

/// Chat-completions backend for any OpenAI-compatible endpoint. The default
/// configuration targets Gemini's compatibility layer.
pub struct OpenAiCompatBackend {
    client: Client<OpenAIConfig>,
    max_tokens: u32,
    temperature: f32,
}

impl OpenAiCompatBackend {
    pub fn new(config: &ProviderConfig) -> Self {
        let openai_config = OpenAIConfig::new()
            .with_api_base(&config.api_base)
            .with_api_key(config.api_key.clone().unwrap_or_default());
        Self {
            client: Client::with_config(openai_config),
            max_tokens: config.max_tokens,
            temperature: config.temperature,
        }
    }
}

fn provider_err(e: impl std::fmt::Display) -> AgentError {
    AgentError::Provider(e.to_string())
}

/// Convert the instruction and history to chat-completion messages.
pub(crate) fn build_messages(
    instruction: &str,
    history: &[Content],
) -> Result<Vec<ChatCompletionRequestMessage>, AgentError> {
    let mut result = Vec::new();

    let sys_msg = ChatCompletionRequestSystemMessageArgs::default()
        .content(instruction)
        .build()
        .map_err(provider_err)?;
    result.push(ChatCompletionRequestMessage::System(sys_msg));

    for content in history {
        match content.role {
            Role::User => {
                for response in content.function_responses() {
                    let m = ChatCompletionRequestToolMessageArgs::default()
                        .tool_call_id(response.id.as_str())
                        .content(response.response.to_string())
                        .build()
                        .map_err(provider_err)?;
                    result.push(ChatCompletionRequestMessage::Tool(m));
                }
                if let Some(text) = content.text() {
                    let m = ChatCompletionRequestUserMessageArgs::default()
                        .content(text)
                        .build()
                        .map_err(provider_err)?;
                    result.push(ChatCompletionRequestMessage::User(m));
                }
            }
            Role::Model => {
                let mut builder = ChatCompletionRequestAssistantMessageArgs::default();
                if let Some(text) = content.text() {
                    builder.content(text);
                }
                let calls: Vec<ChatCompletionMessageToolCall> = content
                    .function_calls()
                    .map(|fc| ChatCompletionMessageToolCall {
                        id: fc.id.clone(),
                        r#type: ChatCompletionToolType::Function,
                        function: async_openai::types::FunctionCall {
                            name: fc.name.clone(),
                            arguments: fc.args.to_string(),
                        },
                    })
                    .collect();
                if !calls.is_empty() {
                    builder.tool_calls(calls);
                }
                let m = builder.build().map_err(provider_err)?;
                result.push(ChatCompletionRequestMessage::Assistant(m));
            }
        }
    }

    Ok(result)
}

/// Parse the model's argument string. Unparseable arguments are passed on
/// as a raw string so argument validation reports them.
pub(crate) fn parse_arguments(raw: &str) -> Value {
    if raw.trim().is_empty() {
        return Value::Object(Default::default());
    }
    serde_json::from_str(raw).unwrap_or_else(|_| Value::String(raw.to_string()))
}

#[async_trait]
impl ModelBackend for OpenAiCompatBackend {
    async fn generate(&self, request: ModelRequest) -> Result<ModelTurn, AgentError> {
        let messages = build_messages(&request.instruction, &request.history)?;

        let mut request_builder = CreateChatCompletionRequestArgs::default();
        request_builder
            .model(&request.model)
            .messages(messages)
            .temperature(self.temperature)
            .max_completion_tokens(self.max_tokens);

        if !request.tools.is_empty() {
            let tools: Vec<_> = request
                .tools
                .iter()
                .map(|s| {
                    let func = FunctionObjectArgs::default()
                        .name(&s.name)
                        .description(&s.description)
                        .parameters(s.parameters.clone())
                        .build()
                        .map_err(|e| AgentError::Provider(format!("function '{}': {}", s.name, e)))?;
                    ChatCompletionToolArgs::default()
                        .r#type(ChatCompletionToolType::Function)
                        .function(func)
                        .build()
                        .map_err(|e| AgentError::Provider(format!("tool '{}': {}", s.name, e)))
                })
                .collect::<Result<Vec<_>, _>>()?;
            request_builder.tools(tools);
        }

        let chat_request = request_builder.build().map_err(provider_err)?;
        debug!(model = %request.model, "requesting completion");

        let response = self
            .client
            .chat()
            .create(chat_request)
            .await
            .map_err(provider_err)?;

        let choice = response
            .choices
            .first()
            .ok_or_else(|| AgentError::Provider("No choices in response".into()))?;

        let text = choice.message.content.clone().filter(|t| !t.is_empty());
        let function_calls = choice
            .message
            .tool_calls
            .as_deref()
            .unwrap_or_default()
            .iter()
            .map(|tc| FunctionCall {
                id: if tc.id.is_empty() {
                    format!("call-{}", Uuid::new_v4())
                } else {
                    tc.id.clone()
                },
                name: tc.function.name.clone(),
                args: parse_arguments(&tc.function.arguments),
            })
            .collect();

        Ok(ModelTurn { text, function_calls })
    }
}
