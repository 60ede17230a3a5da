//! Conversation types for Lapka
//!
//! This module defines the core types for conversation history: messages,
//! roles, multi-part content and tool calls. These are the records the
//! context manager owns and the checkpoint file stores.

use serde::{Deserialize, Serialize};

/// Text used when an image arrives without a caption.
pub const DEFAULT_IMAGE_PROMPT: &str = "What's in this image?";

/// A single message in a conversation.
///
/// Messages can be from users, assistants, system prompts, or tool results.
/// A message with role [`Role::Tool`] always carries `tool_call_id`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    /// The role of the message sender
    pub role: Role,
    /// Plain text, or ordered parts when an image is attached
    pub content: MessageContent,
    /// Tool calls made by the assistant (if any)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_calls: Option<Vec<ToolCall>>,
    /// ID of the tool call this message is responding to (for tool results)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_call_id: Option<String>,
}

impl Message {
    fn with_role(role: Role, content: &str) -> Self {
        Self {
            role,
            content: MessageContent::Text(content.to_string()),
            tool_calls: None,
            tool_call_id: None,
        }
    }

    /// Create a new user message.
    ///
    /// # Example
    /// ```
    /// use lapka::session::{Message, Role};
    ///
    /// let msg = Message::user("Hello, assistant!");
    /// assert_eq!(msg.role, Role::User);
    /// assert_eq!(msg.text(), "Hello, assistant!");
    /// ```
    pub fn user(content: &str) -> Self {
        Self::with_role(Role::User, content)
    }

    /// Create a multi-part user message carrying a base64 JPEG image.
    ///
    /// An empty `text` is replaced by [`DEFAULT_IMAGE_PROMPT`].
    ///
    /// # Example
    /// ```
    /// use lapka::session::{ContentPart, Message, MessageContent};
    ///
    /// let msg = Message::user_with_image("", "aGVsbG8=");
    /// match &msg.content {
    ///     MessageContent::Parts(parts) => {
    ///         assert_eq!(parts.len(), 2);
    ///         assert!(matches!(parts[1], ContentPart::ImageUrl { .. }));
    ///     }
    ///     _ => panic!("expected parts"),
    /// }
    /// assert_eq!(msg.text(), "What's in this image?");
    /// ```
    pub fn user_with_image(text: &str, image_b64: &str) -> Self {
        let text = if text.is_empty() {
            DEFAULT_IMAGE_PROMPT
        } else {
            text
        };
        Self {
            role: Role::User,
            content: MessageContent::Parts(vec![
                ContentPart::Text {
                    text: text.to_string(),
                },
                ContentPart::ImageUrl {
                    image_url: ImageUrl {
                        url: format!("data:image/jpeg;base64,{}", image_b64),
                    },
                },
            ]),
            tool_calls: None,
            tool_call_id: None,
        }
    }

    /// Create a new assistant message.
    pub fn assistant(content: &str) -> Self {
        Self::with_role(Role::Assistant, content)
    }

    /// Create a new system message.
    pub fn system(content: &str) -> Self {
        Self::with_role(Role::System, content)
    }

    /// Create a new tool result message.
    ///
    /// # Arguments
    /// * `tool_call_id` - The ID of the tool call this is responding to
    /// * `content` - The result content from the tool
    ///
    /// # Example
    /// ```
    /// use lapka::session::{Message, Role};
    ///
    /// let msg = Message::tool_result("call_123", "Tool executed successfully");
    /// assert_eq!(msg.role, Role::Tool);
    /// assert_eq!(msg.tool_call_id, Some("call_123".to_string()));
    /// ```
    pub fn tool_result(tool_call_id: &str, content: &str) -> Self {
        Self {
            role: Role::Tool,
            content: MessageContent::Text(content.to_string()),
            tool_calls: None,
            tool_call_id: Some(tool_call_id.to_string()),
        }
    }

    /// Create an assistant message with tool calls.
    ///
    /// # Example
    /// ```
    /// use lapka::session::{Message, ToolCall};
    ///
    /// let tool_call = ToolCall::new("call_1", "bash", r#"{"command": "ls"}"#);
    /// let msg = Message::assistant_with_tools("", vec![tool_call]);
    /// assert!(msg.has_tool_calls());
    /// ```
    pub fn assistant_with_tools(content: &str, tool_calls: Vec<ToolCall>) -> Self {
        Self {
            role: Role::Assistant,
            content: MessageContent::Text(content.to_string()),
            tool_calls: Some(tool_calls),
            tool_call_id: None,
        }
    }

    /// Concatenated text of this message (image parts are skipped).
    pub fn text(&self) -> String {
        self.content.text()
    }

    /// Check if this message has tool calls.
    pub fn has_tool_calls(&self) -> bool {
        self.tool_calls
            .as_ref()
            .map(|tc| !tc.is_empty())
            .unwrap_or(false)
    }

    /// Check if this is a tool result message.
    pub fn is_tool_result(&self) -> bool {
        self.role == Role::Tool && self.tool_call_id.is_some()
    }
}

/// Message body: a plain string or an ordered list of parts.
///
/// Serializes untagged, so it matches the chat-completions `content` field
/// in both shapes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum MessageContent {
    Text(String),
    Parts(Vec<ContentPart>),
}

impl MessageContent {
    /// Text of the content; parts are joined with newlines.
    pub fn text(&self) -> String {
        match self {
            MessageContent::Text(text) => text.clone(),
            MessageContent::Parts(parts) => parts
                .iter()
                .filter_map(|p| match p {
                    ContentPart::Text { text } => Some(text.as_str()),
                    ContentPart::ImageUrl { .. } => None,
                })
                .collect::<Vec<_>>()
                .join("\n"),
        }
    }

    /// True for an empty string or an empty part list.
    pub fn is_empty(&self) -> bool {
        match self {
            MessageContent::Text(text) => text.is_empty(),
            MessageContent::Parts(parts) => parts.is_empty(),
        }
    }
}

impl Default for MessageContent {
    fn default() -> Self {
        MessageContent::Text(String::new())
    }
}

/// One part of a multi-part message.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ContentPart {
    Text { text: String },
    ImageUrl { image_url: ImageUrl },
}

/// Image reference, usually a `data:` URL.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImageUrl {
    pub url: String,
}

/// The role of a message sender in a conversation.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// Messages from the user
    User,
    /// Messages from the AI assistant
    Assistant,
    /// System prompts and instructions
    System,
    /// Results from tool executions
    Tool,
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Role::User => write!(f, "user"),
            Role::Assistant => write!(f, "assistant"),
            Role::System => write!(f, "system"),
            Role::Tool => write!(f, "tool"),
        }
    }
}

/// A tool call requested by the model.
///
/// `arguments` is the raw JSON string exactly as the model produced it;
/// only the tool parses it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ToolCall {
    /// Unique identifier for this tool call
    pub id: String,
    /// Name of the tool to call
    pub name: String,
    /// JSON-encoded arguments for the tool
    pub arguments: String,
}

impl ToolCall {
    /// Create a new tool call.
    pub fn new(id: &str, name: &str, arguments: &str) -> Self {
        Self {
            id: id.to_string(),
            name: name.to_string(),
            arguments: arguments.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_message_constructors() {
        assert_eq!(Message::user("u").role, Role::User);
        assert_eq!(Message::assistant("a").role, Role::Assistant);
        assert_eq!(Message::system("s").role, Role::System);

        let tool = Message::tool_result("call_1", "done");
        assert!(tool.is_tool_result());
        assert_eq!(tool.text(), "done");
    }

    #[test]
    fn test_has_tool_calls_empty_vec() {
        let msg = Message::assistant_with_tools("", vec![]);
        assert!(!msg.has_tool_calls());
    }

    #[test]
    fn test_role_display() {
        assert_eq!(Role::User.to_string(), "user");
        assert_eq!(Role::Tool.to_string(), "tool");
    }

    #[test]
    fn test_text_content_serializes_as_string() {
        let json = serde_json::to_value(Message::user("hi")).unwrap();
        assert_eq!(json["role"], "user");
        assert_eq!(json["content"], "hi");
        assert!(json.get("tool_calls").is_none());
        assert!(json.get("tool_call_id").is_none());
    }

    #[test]
    fn test_image_content_serializes_as_parts() {
        let msg = Message::user_with_image("describe", "QUJD");
        let json = serde_json::to_value(&msg).unwrap();
        let parts = json["content"].as_array().unwrap();
        assert_eq!(parts[0]["type"], "text");
        assert_eq!(parts[0]["text"], "describe");
        assert_eq!(parts[1]["type"], "image_url");
        assert_eq!(parts[1]["image_url"]["url"], "data:image/jpeg;base64,QUJD");
    }

    #[test]
    fn test_message_deserializes_both_content_shapes() {
        let text: Message = serde_json::from_str(r#"{"role":"user","content":"hey"}"#).unwrap();
        assert_eq!(text.content, MessageContent::Text("hey".into()));

        let parts: Message = serde_json::from_str(
            r#"{"role":"user","content":[{"type":"text","text":"a"},{"type":"image_url","image_url":{"url":"data:x"}}]}"#,
        )
        .unwrap();
        assert_eq!(parts.text(), "a");
    }

    #[test]
    fn test_tool_call_roundtrip_in_history() {
        let msg = Message::assistant_with_tools(
            "",
            vec![ToolCall::new("call_1", "bash", r#"{"command":"ls"}"#)],
        );
        let json = serde_json::to_string(&msg).unwrap();
        let back: Message = serde_json::from_str(&json).unwrap();
        assert_eq!(back, msg);
    }

    #[test]
    fn test_content_is_empty() {
        assert!(MessageContent::default().is_empty());
        assert!(MessageContent::Parts(vec![]).is_empty());
        assert!(!MessageContent::Text("x".into()).is_empty());
    }
}
