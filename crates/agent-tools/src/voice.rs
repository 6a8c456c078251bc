use crate::http::{build_client, ensure_success, request_error};
use agent_core::config::{SpeechConfig, ToolsConfig};
use agent_core::error::AgentError;
use agent_core::tool_registry::{ParamSpec, ParamType, Tool, ToolContext, ToolResult};
use async_trait::async_trait;
use serde::Serialize;
use serde_json::{json, Map, Value};
use std::path::{Path, PathBuf};
use url::Url;

const TOOL_NAME: &str = "get_voice_response";

/// Marker the client splits on to find the generated file.
pub const SAVED_AT_MARKER: &str = "saved at:";

/// A voice offered by the speech-synthesis service.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Voice {
    pub id: &'static str,
    pub name: &'static str,
    pub gender: &'static str,
    pub age: &'static str,
    pub accent: &'static str,
    pub tone: &'static str,
    pub use_case: &'static str,
}

macro_rules! voice {
    ($id:literal, $name:literal, $gender:literal, $age:literal, $accent:literal, $tone:literal, $use_case:literal) => {
        Voice {
            id: $id,
            name: $name,
            gender: $gender,
            age: $age,
            accent: $accent,
            tone: $tone,
            use_case: $use_case,
        }
    };
}

pub const VOICE_CATALOG: &[Voice] = &[
    voice!("Xb7hH8MSUJpSbSDYk0k2", "Alice", "female", "middle-aged", "British", "confident", "news"),
    voice!("9BWtsMINqrJLrRacOk9x", "Aria", "female", "middle-aged", "American", "expressive", "social-media"),
    voice!("pqHfZKP75CvOlQylNhV4", "Bill", "male", "old", "American", "trustworthy", "narration"),
    voice!("nPczCjzI2devNBz1zQrb", "Brian", "male", "middle-aged", "American", "deep", "narration"),
    voice!("N2lVS1w4EtoT3dr4eOWO", "Callum", "male", "middle-aged", "Transatlantic", "intense", "characters"),
    voice!("IKne3meq5aSn9XLyUdCD", "Charlie", "male", "middle-aged", "Australian", "natural", "conversational"),
    voice!("XB0fDUnXU5powFXDhCwa", "Charlotte", "female", "young", "Swedish", "seductive", "characters"),
    voice!("iP95p4xoKVk53GoZ742B", "Chris", "male", "middle-aged", "American", "casual", "conversational"),
    voice!("onwK4e9ZLuTAKqWW03F9", "Daniel", "male", "middle-aged", "British", "authoritative", "news"),
    voice!("cjVigY5qzO86Huf0OWal", "Eric", "male", "middle-aged", "American", "friendly", "conversational"),
    voice!("JBFqnCBsd6RMkjVDRZzb", "George", "male", "middle-aged", "British", "warm", "narration"),
    voice!("cgSgspJ2msm6clMCkdW9", "Jessica", "female", "young", "American", "expressive", "conversational"),
    voice!("FGY2WhTYpPnrIDTdsKH5", "Laura", "female", "young", "American", "upbeat", "social-media"),
    voice!("TX3LPaxmHKxFdv7VOQHJ", "Liam", "male", "young", "American", "articulate", "narration"),
    voice!("pFZP5JQG7iQjIQuC4Bku", "Lily", "female", "middle-aged", "British", "warm", "narration"),
    voice!("XrExE9yKIg1WjnnlVkGX", "Matilda", "female", "middle-aged", "American", "friendly", "narration"),
    voice!("SAz9YHcvj6GT2YYXdXww", "River", "non-binary", "middle-aged", "American", "confident", "social-media"),
    voice!("CwhRBWXzGAHq8TQ4Fs17", "Roger", "male", "middle-aged", "American", "confident", "social-media"),
    voice!("EXAVITQu4vr4xnSDxMaL", "Sarah", "female", "young", "American", "soft", "news"),
    voice!("bIHbv24MWmeRgasZH58o", "Will", "male", "young", "American", "friendly", "social-media"),
];

pub const DEFAULT_VOICE_ID: &str = "JBFqnCBsd6RMkjVDRZzb";

pub fn find_voice(id: &str) -> Option<&'static Voice> {
    VOICE_CATALOG.iter().find(|v| v.id == id)
}

/// Fresh collision-free file path for one synthesis result.
fn new_audio_path(output_dir: &Path) -> PathBuf {
    output_dir.join(format!("{}.mp3", uuid::Uuid::new_v4()))
}

/// `<base>/text-to-speech/<voice_id>`, with the id encoded as one path segment.
fn speech_url(api_base: &str, voice_id: &str) -> Result<Url, AgentError> {
    let mut url = Url::parse(api_base)
        .map_err(|e| AgentError::tool(TOOL_NAME, format!("Invalid speech API base '{}': {}", api_base, e)))?;
    url.path_segments_mut()
        .map_err(|_| AgentError::tool(TOOL_NAME, format!("Invalid speech API base '{}'", api_base)))?
        .pop_if_empty()
        .push("text-to-speech")
        .push(voice_id);
    Ok(url)
}

/// Text-to-speech through the ElevenLabs API. Audio is written to the
/// output directory and the path returned to the caller.
pub struct VoiceTool {
    client: reqwest::Client,
    speech: SpeechConfig,
    output_dir: PathBuf,
    timeout_secs: u64,
}

impl VoiceTool {
    pub fn new(tools: &ToolsConfig) -> Self {
        Self {
            client: build_client(tools.timeout_secs),
            speech: tools.speech.clone(),
            output_dir: tools.output_dir.clone(),
            timeout_secs: tools.timeout_secs,
        }
    }

    async fn synthesize(&self, text: &str, voice_id: &str) -> Result<PathBuf, AgentError> {
        let api_key = self
            .speech
            .api_key
            .as_deref()
            .filter(|k| !k.trim().is_empty())
            .ok_or_else(|| AgentError::tool(TOOL_NAME, "ELEVENLABS_API_KEY is not configured"))?;

        let url = speech_url(&self.speech.api_base, voice_id)?;
        let body = json!({
            "text": text,
            "model_id": self.speech.model_id,
            "voice_settings": {
                "stability": self.speech.stability,
                "similarity_boost": self.speech.similarity_boost,
                "style": self.speech.style,
                "speed": self.speech.speed,
                "use_speaker_boost": self.speech.use_speaker_boost,
            }
        });

        let response = self
            .client
            .post(url)
            .query(&[("output_format", self.speech.output_format.as_str())])
            .header("xi-api-key", api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| request_error(TOOL_NAME, e, self.timeout_secs))?;
        let response = ensure_success(TOOL_NAME, response).await?;
        let audio = response
            .bytes()
            .await
            .map_err(|e| request_error(TOOL_NAME, e, self.timeout_secs))?;

        tokio::fs::create_dir_all(&self.output_dir).await?;
        let path = new_audio_path(&self.output_dir);
        tokio::fs::write(&path, &audio).await?;
        tracing::info!("{}: {} bytes written to {}", TOOL_NAME, audio.len(), path.display());
        Ok(path)
    }
}

#[async_trait]
impl Tool for VoiceTool {
    fn name(&self) -> &str {
        TOOL_NAME
    }

    fn description(&self) -> &str {
        "Convert text to spoken audio. Pass the voice id the user asked for (the text \
         after `voice_id:` in their message); the result names the saved audio file."
    }

    fn parameters(&self) -> Vec<ParamSpec> {
        vec![
            ParamSpec::required("text", ParamType::String, "The text to speak"),
            ParamSpec::optional("voice_id", ParamType::String, "Voice identifier")
                .with_default(self.speech.default_voice_id.clone()),
        ]
    }

    async fn execute(&self, args: Map<String, Value>, _ctx: &ToolContext) -> Result<ToolResult, AgentError> {
        let text = args.get("text").and_then(Value::as_str).unwrap_or_default();
        let voice_id = args
            .get("voice_id")
            .and_then(Value::as_str)
            .filter(|v| !v.trim().is_empty())
            .unwrap_or(self.speech.default_voice_id.as_str())
            .trim()
            .to_string();

        match find_voice(&voice_id) {
            Some(voice) => tracing::debug!("Tool: get_voice_response with voice {} ({})", voice.name, voice_id),
            None => tracing::debug!("Tool: get_voice_response with uncatalogued voice {}", voice_id),
        }

        match self.synthesize(text, &voice_id).await {
            Ok(path) => {
                let path = path.display().to_string();
                Ok(ToolResult::success_report(format!("{}{}", SAVED_AT_MARKER, path))
                    .with_field("audio_path", path)
                    .with_field("voice_id", voice_id))
            }
            Err(e) => {
                tracing::warn!("Error in text to speech conversion: {}", e);
                Ok(ToolResult::error(e.to_string()))
            }
        }
    }
}
