//! Model client types for Lapka
//!
//! This module defines the [`ModelClient`] trait and the values that cross
//! it: tool definitions, responses, usage accounting, stream events and the
//! connection profile.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;

use crate::error::Result;
use crate::session::{Message, ToolCall};

/// Default OpenAI-compatible endpoint.
pub const DEFAULT_API_BASE: &str = "https://openrouter.ai/api/v1";

/// Default model for the agent.
pub const DEFAULT_MODEL: &str = "google/gemini-2.0-flash-001";

/// Default (cheap) model for compaction.
pub const DEFAULT_COMPACT_MODEL: &str = "qwen/qwen3-235b-a22b-2507";

/// Connection profile for one chat-completions endpoint.
///
/// Immutable once a client is built from it; switching models means
/// constructing a new client.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModelProfile {
    /// Base URL, e.g. `https://openrouter.ai/api/v1`
    pub api_base: String,
    /// Bearer credential; empty means no `Authorization` header
    pub api_key: String,
    /// Model identifier sent in every request
    pub model: String,
}

impl ModelProfile {
    /// Create a new profile.
    ///
    /// # Example
    /// ```
    /// use lapka::providers::ModelProfile;
    ///
    /// let profile = ModelProfile::new("https://api.openai.com/v1/", "sk-xxx", "gpt-4o");
    /// assert_eq!(profile.chat_url(), "https://api.openai.com/v1/chat/completions");
    /// ```
    pub fn new(api_base: &str, api_key: &str, model: &str) -> Self {
        Self {
            api_base: api_base.to_string(),
            api_key: api_key.to_string(),
            model: model.to_string(),
        }
    }

    /// Full chat-completions URL (`{base}/chat/completions`).
    pub fn chat_url(&self) -> String {
        format!("{}/chat/completions", self.api_base.trim_end_matches('/'))
    }

    /// Whether this profile targets OpenRouter.
    pub fn is_openrouter(&self) -> bool {
        self.api_base.contains("openrouter.ai")
    }
}

impl Default for ModelProfile {
    fn default() -> Self {
        Self::new(DEFAULT_API_BASE, "", DEFAULT_MODEL)
    }
}

/// Definition of a tool as advertised to the model.
///
/// Tool definitions describe the available tools, their parameters,
/// and how the model should invoke them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolDefinition {
    /// The name of the tool (must be unique)
    pub name: String,
    /// Human-readable description of what the tool does
    pub description: String,
    /// JSON Schema describing the tool's parameters
    pub parameters: serde_json::Value,
}

impl ToolDefinition {
    /// Create a new tool definition.
    ///
    /// # Arguments
    /// * `name` - Unique identifier for the tool
    /// * `description` - Human-readable description
    /// * `parameters` - JSON Schema for the tool's parameters
    pub fn new(name: &str, description: &str, parameters: serde_json::Value) -> Self {
        Self {
            name: name.to_string(),
            description: description.to_string(),
            parameters,
        }
    }
}

/// Token accounting attached to one model response.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Usage {
    pub prompt_tokens: u32,
    pub completion_tokens: u32,
    pub total_tokens: u32,
}

impl Usage {
    /// Create usage from prompt and completion counts.
    pub fn new(prompt_tokens: u32, completion_tokens: u32) -> Self {
        Self {
            prompt_tokens,
            completion_tokens,
            total_tokens: prompt_tokens.saturating_add(completion_tokens),
        }
    }
}

/// Parsed chat completion.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LLMResponse {
    /// Text content; `None` when the model sent `null`
    pub content: Option<String>,
    /// Requested tool calls, in the order the model returned them
    pub tool_calls: Vec<ToolCall>,
    /// Token usage, when the endpoint reports it
    pub usage: Option<Usage>,
    /// Why generation stopped (`stop`, `tool_calls`, `length`, ...)
    pub finish_reason: Option<String>,
}

impl LLMResponse {
    /// A plain text response.
    ///
    /// # Example
    /// ```
    /// use lapka::providers::LLMResponse;
    ///
    /// let response = LLMResponse::text("Hello");
    /// assert!(!response.has_tool_calls());
    /// assert_eq!(response.text_or_empty(), "Hello");
    /// ```
    pub fn text(content: &str) -> Self {
        Self {
            content: Some(content.to_string()),
            finish_reason: Some("stop".to_string()),
            ..Default::default()
        }
    }

    /// A response requesting tool calls.
    pub fn with_tools(content: &str, tool_calls: Vec<ToolCall>) -> Self {
        Self {
            content: if content.is_empty() {
                None
            } else {
                Some(content.to_string())
            },
            tool_calls,
            usage: None,
            finish_reason: Some("tool_calls".to_string()),
        }
    }

    /// Attach usage accounting.
    pub fn with_usage(mut self, usage: Usage) -> Self {
        self.usage = Some(usage);
        self
    }

    /// Check if the response contains tool calls.
    pub fn has_tool_calls(&self) -> bool {
        !self.tool_calls.is_empty()
    }

    /// Content as a string, empty when absent.
    pub fn text_or_empty(&self) -> &str {
        self.content.as_deref().unwrap_or("")
    }
}

/// One event of a streamed completion.
#[derive(Debug)]
pub enum StreamEvent {
    /// Incremental text fragment
    Delta(String),
    /// The stream reached `[DONE]` or the connection closed cleanly
    Done,
    /// Transport failure mid-stream; no further events follow
    Error(crate::error::LapkaError),
}

/// A chat-completions client.
///
/// Implementations own retries; callers see either a parsed response or a
/// terminal error.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ModelClient: Send + Sync {
    /// Send a chat completion request.
    ///
    /// # Arguments
    /// * `messages` - The assembled conversation
    /// * `tools` - Tool schemas; empty means no `tools`/`tool_choice` fields
    /// * `temperature` - Sampling temperature
    async fn chat(
        &self,
        messages: Vec<Message>,
        tools: Vec<ToolDefinition>,
        temperature: f32,
    ) -> Result<LLMResponse>;

    /// Stream a chat completion as text fragments.
    ///
    /// The default implementation performs a regular [`chat`](Self::chat)
    /// and emits its content as a single fragment.
    async fn chat_stream(
        &self,
        messages: Vec<Message>,
        tools: Vec<ToolDefinition>,
        temperature: f32,
    ) -> Result<mpsc::Receiver<StreamEvent>> {
        let response = self.chat(messages, tools, temperature).await?;
        let (tx, rx) = mpsc::channel(2);
        if let Some(content) = response.content.filter(|c| !c.is_empty()) {
            let _ = tx.send(StreamEvent::Delta(content)).await;
        }
        let _ = tx.send(StreamEvent::Done).await;
        Ok(rx)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_usage_total() {
        let usage = Usage::new(10, 5);
        assert_eq!(usage.total_tokens, 15);
    }

    #[test]
    fn test_profile_chat_url_trims_slash() {
        let p = ModelProfile::new("https://x.test/v1/", "", "m");
        assert_eq!(p.chat_url(), "https://x.test/v1/chat/completions");
        let p = ModelProfile::new("https://x.test/v1", "", "m");
        assert_eq!(p.chat_url(), "https://x.test/v1/chat/completions");
    }

    #[test]
    fn test_profile_openrouter_detection() {
        assert!(ModelProfile::default().is_openrouter());
        assert!(!ModelProfile::new("https://api.openai.com/v1", "", "m").is_openrouter());
    }

    #[test]
    fn test_response_with_tools() {
        let r = LLMResponse::with_tools("", vec![ToolCall::new("1", "bash", "{}")]);
        assert!(r.has_tool_calls());
        assert!(r.content.is_none());
        assert_eq!(r.text_or_empty(), "");
        assert_eq!(r.finish_reason.as_deref(), Some("tool_calls"));
    }

    struct FixedClient;

    #[async_trait]
    impl ModelClient for FixedClient {
        async fn chat(
            &self,
            _messages: Vec<Message>,
            _tools: Vec<ToolDefinition>,
            _temperature: f32,
        ) -> Result<LLMResponse> {
            Ok(LLMResponse::text("whole answer"))
        }
    }

    #[tokio::test]
    async fn test_default_chat_stream_emits_single_fragment() {
        let mut rx = FixedClient
            .chat_stream(vec![Message::user("hi")], vec![], 0.2)
            .await
            .unwrap();
        match rx.recv().await {
            Some(StreamEvent::Delta(text)) => assert_eq!(text, "whole answer"),
            other => panic!("unexpected event: {:?}", other),
        }
        assert!(matches!(rx.recv().await, Some(StreamEvent::Done)));
        assert!(rx.recv().await.is_none());
    }
}
