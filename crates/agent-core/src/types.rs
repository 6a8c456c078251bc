use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use uuid::Uuid;

/// Role of a [`Content`] block. Function responses travel back to the model
/// under the `user` role.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Model,
}

/// A tool call requested by the model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FunctionCall {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub args: Value,
}

/// The structured result of a tool call, keyed back to the call by id and name.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FunctionResponse {
    pub id: String,
    pub name: String,
    pub response: Value,
}

/// One part of a content block. Exactly one field is set.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Part {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub function_call: Option<FunctionCall>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub function_response: Option<FunctionResponse>,
}

impl Part {
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            text: Some(text.into()),
            ..Default::default()
        }
    }

    pub fn function_call(call: FunctionCall) -> Self {
        Self {
            function_call: Some(call),
            ..Default::default()
        }
    }

    pub fn function_response(response: FunctionResponse) -> Self {
        Self {
            function_response: Some(response),
            ..Default::default()
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Content {
    pub role: Role,
    #[serde(default)]
    pub parts: Vec<Part>,
}

impl Content {
    pub fn user_text(text: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            parts: vec![Part::text(text)],
        }
    }

    pub fn model_text(text: impl Into<String>) -> Self {
        Self {
            role: Role::Model,
            parts: vec![Part::text(text)],
        }
    }

    /// Concatenated text of all text parts, if there are any.
    pub fn text(&self) -> Option<String> {
        let texts: Vec<&str> = self.parts.iter().filter_map(|p| p.text.as_deref()).collect();
        if texts.is_empty() {
            None
        } else {
            Some(texts.concat())
        }
    }

    pub fn function_calls(&self) -> impl Iterator<Item = &FunctionCall> {
        self.parts.iter().filter_map(|p| p.function_call.as_ref())
    }

    pub fn function_responses(&self) -> impl Iterator<Item = &FunctionResponse> {
        self.parts.iter().filter_map(|p| p.function_response.as_ref())
    }
}

/// A single entry in a session's history, as returned by `/run`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Event {
    pub id: String,
    pub invocation_id: String,
    /// `"user"` or the name of the agent that produced the event.
    pub author: String,
    pub timestamp: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content: Option<Content>,
}

impl Event {
    pub fn new(invocation_id: impl Into<String>, author: impl Into<String>, content: Content) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            invocation_id: invocation_id.into(),
            author: author.into(),
            timestamp: Utc::now(),
            content: Some(content),
        }
    }

    /// Text of the first part, when that part is text.
    pub fn first_text(&self) -> Option<&str> {
        self.content
            .as_ref()
            .and_then(|c| c.parts.first())
            .and_then(|p| p.text.as_deref())
    }
}

/// Schema definition for a tool's parameters, sent to the model.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolSchema {
    pub name: String,
    pub description: String,
    pub parameters: Value,
}

/// Incoming user message on `/run`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewMessage {
    pub role: String,
    pub parts: Vec<Part>,
}

impl NewMessage {
    pub fn user(text: impl Into<String>) -> Self {
        Self {
            role: "user".into(),
            parts: vec![Part::text(text)],
        }
    }

    pub fn into_content(self) -> Content {
        Content {
            role: Role::User,
            parts: self.parts,
        }
    }
}

/// Convert a JSON value known to be an object into a map, treating
/// `null` as empty.
pub fn object_or_empty(value: Value) -> Option<Map<String, Value>> {
    match value {
        Value::Object(map) => Some(map),
        Value::Null => Some(Map::new()),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_event_wire_shape() {
        let event = Event::new(
            "inv-1",
            "support_info_agent",
            Content {
                role: Role::User,
                parts: vec![Part::function_response(FunctionResponse {
                    id: "call-1".into(),
                    name: "get_weather".into(),
                    response: json!({"status": "success"}),
                })],
            },
        );
        let v = serde_json::to_value(&event).unwrap();
        assert_eq!(v["invocationId"], "inv-1");
        assert_eq!(
            v["content"]["parts"][0]["functionResponse"]["name"],
            "get_weather"
        );
        assert!(v["content"]["parts"][0].get("text").is_none());
    }

    #[test]
    fn test_content_text_concatenates_text_parts() {
        let content = Content {
            role: Role::Model,
            parts: vec![Part::text("Hello, "), Part::text("world")],
        };
        assert_eq!(content.text().as_deref(), Some("Hello, world"));
        assert!(Content { role: Role::Model, parts: vec![] }.text().is_none());
    }

    #[test]
    fn test_new_message_parses_client_payload() {
        let msg: NewMessage =
            serde_json::from_value(json!({"role": "user", "parts": [{"text": "hi"}]})).unwrap();
        let content = msg.into_content();
        assert_eq!(content.role, Role::User);
        assert_eq!(content.text().as_deref(), Some("hi"));
    }

    #[test]
    fn test_object_or_empty() {
        assert!(object_or_empty(Value::Null).unwrap().is_empty());
        assert_eq!(object_or_empty(json!({"a": 1})).unwrap().len(), 1);
        assert!(object_or_empty(json!([1])).is_none());
    }
}
