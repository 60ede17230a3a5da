//! OpenAI-compatible chat completions client
//!
//! This module implements [`ModelClient`] for any endpoint that speaks the
//! OpenAI Chat Completions protocol (OpenRouter, OpenAI, vLLM, Ollama, ...),
//! handling message conversion, tool calls, retries and server-sent events.
//!
//! # Example
//!
//! ```rust,ignore
//! use lapka::providers::{ModelClient, ModelProfile, OpenAIClient};
//! use lapka::session::Message;
//!
//! async fn example() {
//!     let client = OpenAIClient::new(ModelProfile::new(
//!         "https://openrouter.ai/api/v1",
//!         "your-api-key",
//!         "google/gemini-2.0-flash-001",
//!     ))
//!     .unwrap();
//!
//!     let messages = vec![
//!         Message::system("You are a helpful assistant."),
//!         Message::user("Hello!"),
//!     ];
//!
//!     let response = client.chat(messages, vec![], 0.2).await.unwrap();
//!     println!("{}", response.text_or_empty());
//! }
//! ```

use std::time::Duration;

use async_trait::async_trait;
use futures::StreamExt;
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION, CONTENT_TYPE, RETRY_AFTER};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tracing::{debug, info};

use crate::error::{LapkaError, Result};
use crate::session::{Message, MessageContent, ToolCall};

use super::parse_provider_error;
use super::retry::{parse_retry_after, AttemptError, RetrySchedule};
use super::{LLMResponse, ModelClient, ModelProfile, StreamEvent, ToolDefinition, Usage};

/// HTTP client timeout for model requests.
const REQUEST_TIMEOUT: Duration = Duration::from_secs(120);

/// Referer sent to OpenRouter.
const OPENROUTER_REFERER: &str = "https://github.com/make-ai-great-again/lapka";

/// Application title sent to OpenRouter.
const OPENROUTER_TITLE: &str = "Lapka";

/// Stream end sentinel.
const SSE_DONE: &str = "[DONE]";

// ============================================================================
// OpenAI API Request Types
// ============================================================================

/// OpenAI API request body.
#[derive(Debug, Serialize)]
struct OpenAIRequest {
    /// Model identifier
    model: String,
    /// Conversation messages (including system)
    messages: Vec<OpenAIMessage>,
    /// Temperature for sampling
    temperature: f32,
    /// Available tools
    #[serde(skip_serializing_if = "Option::is_none")]
    tools: Option<Vec<OpenAITool>>,
    /// Always "auto" when tools are present
    #[serde(skip_serializing_if = "Option::is_none")]
    tool_choice: Option<&'static str>,
    /// Request server-sent events
    #[serde(skip_serializing_if = "Option::is_none")]
    stream: Option<bool>,
}

/// A message in OpenAI's format.
#[derive(Debug, Serialize)]
struct OpenAIMessage {
    /// Role: "system", "user", "assistant", or "tool"
    role: String,
    /// Message content (null for assistant with tool_calls and no text)
    content: Option<MessageContent>,
    /// Tool calls made by the assistant
    #[serde(skip_serializing_if = "Option::is_none")]
    tool_calls: Option<Vec<OpenAIToolCallRequest>>,
    /// ID of the tool call this message is responding to
    #[serde(skip_serializing_if = "Option::is_none")]
    tool_call_id: Option<String>,
}

/// A tool call in a request (assistant requesting tool execution).
#[derive(Debug, Serialize)]
struct OpenAIToolCallRequest {
    id: String,
    r#type: &'static str,
    function: OpenAIFunctionCall,
}

/// Function call details.
#[derive(Debug, Serialize, Deserialize)]
struct OpenAIFunctionCall {
    /// Name of the function to call
    name: String,
    /// JSON-encoded arguments
    #[serde(default)]
    arguments: String,
}

/// OpenAI tool definition.
#[derive(Debug, Serialize)]
struct OpenAITool {
    r#type: &'static str,
    function: OpenAIFunctionDef,
}

/// OpenAI function definition.
#[derive(Debug, Serialize)]
struct OpenAIFunctionDef {
    name: String,
    description: String,
    parameters: serde_json::Value,
}

// ============================================================================
// OpenAI API Response Types
// ============================================================================

/// OpenAI API response body.
#[derive(Debug, Deserialize)]
struct OpenAIResponse {
    #[serde(default)]
    choices: Vec<OpenAIChoice>,
    usage: Option<OpenAIUsage>,
}

/// A choice in the response.
#[derive(Debug, Deserialize)]
struct OpenAIChoice {
    message: OpenAIResponseMessage,
    finish_reason: Option<String>,
}

/// A message in the response.
#[derive(Debug, Deserialize)]
struct OpenAIResponseMessage {
    /// Text content (may be null if tool_calls present)
    content: Option<String>,
    /// Tool calls made by the model
    tool_calls: Option<Vec<OpenAIToolCallResponse>>,
}

/// A tool call in the response.
#[derive(Debug, Deserialize)]
struct OpenAIToolCallResponse {
    /// Some gateways omit the id
    id: Option<String>,
    function: OpenAIFunctionCall,
}

/// OpenAI token usage.
#[derive(Debug, Deserialize)]
struct OpenAIUsage {
    #[serde(default)]
    prompt_tokens: u32,
    #[serde(default)]
    completion_tokens: u32,
    total_tokens: Option<u32>,
}

/// OpenAI API error response.
#[derive(Debug, Deserialize)]
struct OpenAIErrorResponse {
    error: OpenAIError,
}

/// OpenAI API error details.
#[derive(Debug, Deserialize)]
struct OpenAIError {
    message: String,
}

/// One streamed chunk.
#[derive(Debug, Deserialize)]
struct OpenAIStreamChunk {
    #[serde(default)]
    choices: Vec<OpenAIStreamChoice>,
}

#[derive(Debug, Deserialize)]
struct OpenAIStreamChoice {
    #[serde(default)]
    delta: OpenAIStreamDelta,
}

#[derive(Debug, Default, Deserialize)]
struct OpenAIStreamDelta {
    content: Option<String>,
}

// ============================================================================
// OpenAI Client
// ============================================================================

/// Client for one OpenAI-compatible endpoint.
///
/// Holds an immutable [`ModelProfile`] and a pooled `reqwest` client;
/// dropping it releases the connections.
pub struct OpenAIClient {
    profile: ModelProfile,
    client: Client,
    retry: RetrySchedule,
}

impl std::fmt::Debug for OpenAIClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OpenAIClient")
            .field("api_base", &self.profile.api_base)
            .field("model", &self.profile.model)
            .field("retry", &self.retry)
            .finish()
    }
}

impl OpenAIClient {
    /// Create a client with the default timeout and retry schedule.
    pub fn new(profile: ModelProfile) -> Result<Self> {
        let client = Client::builder().timeout(REQUEST_TIMEOUT).build()?;
        Ok(Self::with_client(profile, client))
    }

    /// Create a client with a custom HTTP client.
    ///
    /// This is useful for testing or when you need custom client configuration
    /// (e.g., proxies).
    pub fn with_client(profile: ModelProfile, client: Client) -> Self {
        Self {
            profile,
            client,
            retry: RetrySchedule::default(),
        }
    }

    /// Replace the retry schedule.
    pub fn with_retry(mut self, retry: RetrySchedule) -> Self {
        self.retry = retry;
        self
    }

    /// The profile this client was built from.
    pub fn profile(&self) -> &ModelProfile {
        &self.profile
    }

    /// Headers for every request: JSON content type, bearer credential when
    /// configured, attribution headers for OpenRouter.
    fn headers(&self) -> Result<HeaderMap> {
        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        if !self.profile.api_key.is_empty() {
            let bearer = HeaderValue::from_str(&format!("Bearer {}", self.profile.api_key))
                .map_err(|e| LapkaError::Config(format!("Invalid API key header: {}", e)))?;
            headers.insert(AUTHORIZATION, bearer);
        }
        if self.profile.is_openrouter() {
            headers.insert("HTTP-Referer", HeaderValue::from_static(OPENROUTER_REFERER));
            headers.insert("X-Title", HeaderValue::from_static(OPENROUTER_TITLE));
        }
        Ok(headers)
    }

    fn build_request(
        &self,
        messages: Vec<Message>,
        tools: Vec<ToolDefinition>,
        temperature: f32,
        stream: bool,
    ) -> OpenAIRequest {
        let (tools, tool_choice) = if tools.is_empty() {
            (None, None)
        } else {
            (Some(convert_tools(tools)), Some("auto"))
        };
        OpenAIRequest {
            model: self.profile.model.clone(),
            messages: convert_messages(messages),
            temperature,
            tools,
            tool_choice,
            stream: stream.then_some(true),
        }
    }

    /// One POST attempt, classified for the retry schedule.
    async fn send_once(
        &self,
        request: &OpenAIRequest,
        headers: &HeaderMap,
    ) -> std::result::Result<reqwest::Response, AttemptError> {
        let response = self
            .client
            .post(self.profile.chat_url())
            .headers(headers.clone())
            .json(request)
            .send()
            .await
            .map_err(LapkaError::from)?;

        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let retry_after = response
            .headers()
            .get(RETRY_AFTER)
            .and_then(|v| v.to_str().ok())
            .and_then(parse_retry_after);
        let body = response.text().await.unwrap_or_default();
        let message = match serde_json::from_str::<OpenAIErrorResponse>(&body) {
            Ok(parsed) => parsed.error.message,
            Err(_) => body,
        };
        let error = LapkaError::from(parse_provider_error(status.as_u16(), &message));

        if status.as_u16() == 429 {
            Err(AttemptError::RateLimited { retry_after, error })
        } else {
            Err(AttemptError::Failed(error))
        }
    }

    async fn send_with_retry(&self, request: &OpenAIRequest) -> Result<reqwest::Response> {
        let headers = self.headers()?;
        self.retry
            .run(|| self.send_once(request, &headers))
            .await
    }
}

// ============================================================================
// Conversion Functions
// ============================================================================

/// Convert conversation messages to OpenAI API format.
fn convert_messages(messages: Vec<Message>) -> Vec<OpenAIMessage> {
    messages
        .into_iter()
        .map(|msg| {
            let tool_calls = msg.tool_calls.map(|tcs| {
                tcs.into_iter()
                    .map(|tc| OpenAIToolCallRequest {
                        id: tc.id,
                        r#type: "function",
                        function: OpenAIFunctionCall {
                            name: tc.name,
                            arguments: tc.arguments,
                        },
                    })
                    .collect::<Vec<_>>()
            });

            let content = if msg.content.is_empty() && tool_calls.is_some() {
                None
            } else {
                Some(msg.content)
            };

            OpenAIMessage {
                role: msg.role.to_string(),
                content,
                tool_calls,
                tool_call_id: msg.tool_call_id,
            }
        })
        .collect()
}

/// Convert tool definitions to OpenAI API format.
fn convert_tools(tools: Vec<ToolDefinition>) -> Vec<OpenAITool> {
    tools
        .into_iter()
        .map(|t| OpenAITool {
            r#type: "function",
            function: OpenAIFunctionDef {
                name: t.name,
                description: t.description,
                parameters: t.parameters,
            },
        })
        .collect()
}

/// Convert an OpenAI API response to an [`LLMResponse`].
///
/// Tool calls without an id get `call_{name}`.
fn convert_response(response: OpenAIResponse) -> LLMResponse {
    let usage = response.usage.map(|u| Usage {
        prompt_tokens: u.prompt_tokens,
        completion_tokens: u.completion_tokens,
        total_tokens: u
            .total_tokens
            .unwrap_or_else(|| u.prompt_tokens.saturating_add(u.completion_tokens)),
    });

    let Some(choice) = response.choices.into_iter().next() else {
        return LLMResponse {
            usage,
            ..Default::default()
        };
    };

    let tool_calls = choice
        .message
        .tool_calls
        .unwrap_or_default()
        .into_iter()
        .map(|tc| {
            let id = tc
                .id
                .filter(|id| !id.is_empty())
                .unwrap_or_else(|| format!("call_{}", tc.function.name));
            ToolCall::new(&id, &tc.function.name, &tc.function.arguments)
        })
        .collect();

    LLMResponse {
        content: choice.message.content,
        tool_calls,
        usage,
        finish_reason: choice.finish_reason,
    }
}

/// Classification of one line of a server-sent event stream.
#[derive(Debug, PartialEq, Eq)]
pub enum SseLine {
    /// A text fragment to forward
    Delta(String),
    /// The `[DONE]` sentinel
    Done,
    /// Blank lines, comments, non-data fields, malformed JSON, empty deltas
    Skip,
}

/// Parse a single SSE line.
///
/// # Example
/// ```
/// use lapka::providers::openai::{parse_sse_line, SseLine};
///
/// let line = r#"data: {"choices":[{"delta":{"content":"Hel"}}]}"#;
/// assert_eq!(parse_sse_line(line), SseLine::Delta("Hel".to_string()));
/// assert_eq!(parse_sse_line("data: [DONE]"), SseLine::Done);
/// assert_eq!(parse_sse_line("data: {oops"), SseLine::Skip);
/// ```
pub fn parse_sse_line(line: &str) -> SseLine {
    let Some(data) = line.trim_end_matches('\r').strip_prefix("data: ") else {
        return SseLine::Skip;
    };
    if data.trim() == SSE_DONE {
        return SseLine::Done;
    }
    match serde_json::from_str::<OpenAIStreamChunk>(data) {
        Ok(chunk) => chunk
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.delta.content)
            .filter(|text| !text.is_empty())
            .map(SseLine::Delta)
            .unwrap_or(SseLine::Skip),
        Err(_) => SseLine::Skip,
    }
}

// ============================================================================
// ModelClient Implementation
// ============================================================================

#[async_trait]
impl ModelClient for OpenAIClient {
    async fn chat(
        &self,
        messages: Vec<Message>,
        tools: Vec<ToolDefinition>,
        temperature: f32,
    ) -> Result<LLMResponse> {
        let request = self.build_request(messages, tools, temperature, false);
        debug!(
            model = %self.profile.model,
            messages = request.messages.len(),
            "Sending chat request"
        );

        let response = self.send_with_retry(&request).await?;
        let parsed: OpenAIResponse = response.json().await.map_err(|e| {
            LapkaError::Provider(format!("Failed to parse chat completion: {}", e))
        })?;

        let response = convert_response(parsed);
        info!(
            model = %self.profile.model,
            tool_calls = response.tool_calls.len(),
            total_tokens = response.usage.map(|u| u.total_tokens).unwrap_or(0),
            "Chat response received"
        );
        Ok(response)
    }

    async fn chat_stream(
        &self,
        messages: Vec<Message>,
        tools: Vec<ToolDefinition>,
        temperature: f32,
    ) -> Result<mpsc::Receiver<StreamEvent>> {
        let request = self.build_request(messages, tools, temperature, true);
        let response = self.send_with_retry(&request).await?;

        let (tx, rx) = mpsc::channel::<StreamEvent>(32);
        let byte_stream = response.bytes_stream();

        tokio::spawn(async move {
            // Raw bytes: a chunk may end inside a multi-byte character.
            let mut buffer: Vec<u8> = Vec::new();
            tokio::pin!(byte_stream);

            while let Some(chunk_result) = byte_stream.next().await {
                let chunk = match chunk_result {
                    Ok(bytes) => bytes,
                    Err(e) => {
                        let _ = tx
                            .send(StreamEvent::Error(LapkaError::Provider(format!(
                                "Stream read error: {}",
                                e
                            ))))
                            .await;
                        return;
                    }
                };

                buffer.extend_from_slice(&chunk);

                while let Some(newline_pos) = buffer.iter().position(|&b| b == b'\n') {
                    let line: Vec<u8> = buffer.drain(..=newline_pos).collect();
                    let line = String::from_utf8_lossy(&line);
                    match parse_sse_line(line.trim_end_matches('\n')) {
                        SseLine::Delta(text) => {
                            if tx.send(StreamEvent::Delta(text)).await.is_err() {
                                return;
                            }
                        }
                        SseLine::Done => {
                            let _ = tx.send(StreamEvent::Done).await;
                            return;
                        }
                        SseLine::Skip => {}
                    }
                }
            }

            if let SseLine::Delta(text) = parse_sse_line(&String::from_utf8_lossy(&buffer)) {
                let _ = tx.send(StreamEvent::Delta(text)).await;
            }
            let _ = tx.send(StreamEvent::Done).await;
        });

        Ok(rx)
    }
}

// ============================================================================
// Tests
// ============================================================================
