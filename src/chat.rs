//! Type definitions for chat primitives
//!

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// The author of a `Message`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// A `System` message is an authoritative message which is used to
    /// instruct the model. Usually, it appears as the first message
    /// in a dialog.
    System,

    /// A message authored by the user
    User,

    /// A message authored by the model
    Assistant,

    /// The result of a tool invocation. A `Tool` message answers a
    /// tool call by `tool_call_id`.
    Tool,

    /// A message that is never sent upstream. `Comment` messages carry
    /// annotations for the hosting application and are stripped before
    /// dispatch.
    Comment,
}

/// A single tool invocation requested by an assistant message.
///
/// `arguments` is a JSON-encoded string, as the wire formats define it.
/// Providers with per-call side-channel data (see the gemini adapter)
/// rewrite the arguments document and `extra_content` in tandem.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolCall {
    pub id: String,
    pub function: FunctionCall,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub extra_content: Option<Value>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FunctionCall {
    pub name: String,
    pub arguments: String,
}

/// A `Message` in a chat conversation
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    /// The author of the message
    pub role: Role,
    /// The contents of the message: a string, a content-part array, or
    /// null. Kept as a raw value since providers disagree on the shape.
    #[serde(default)]
    pub content: Value,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_call_id: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tool_calls: Vec<ToolCall>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Message {
    pub fn new(role: Role, content: impl Into<String>) -> Message {
        Message {
            role,
            content: Value::String(content.into()),
            name: None,
            tool_call_id: None,
            tool_calls: Vec::new(),
            extra: Map::new(),
        }
    }
}

/// A chat-completion style request as supplied by the caller.
///
/// Fields the router does not interpret (temperature, tools, ...) ride
/// along in `extra` and are flattened back into the wire body.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ChatPayload {
    #[serde(default)]
    pub messages: Vec<Message>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stream: Option<bool>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl ChatPayload {
    pub fn from_messages(messages: Vec<Message>) -> ChatPayload {
        ChatPayload {
            messages,
            ..ChatPayload::default()
        }
    }
}
