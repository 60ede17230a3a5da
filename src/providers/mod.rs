//! Providers module - model clients for chat-completion endpoints
//!
//! This module defines the [`ModelClient`] trait and the OpenAI-compatible
//! implementation the agent uses for both its main and compaction profiles.
//! The client alone performs retries; see [`retry`].
//!
//! # Example
//!
//! ```rust,ignore
//! use lapka::providers::{ModelClient, ModelProfile, OpenAIClient};
//! use lapka::session::Message;
//!
//! async fn example() {
//!     let client = OpenAIClient::new(ModelProfile::default()).unwrap();
//!     let response = client.chat(vec![Message::user("Hello!")], vec![], 0.2).await.unwrap();
//!     println!("Response: {}", response.text_or_empty());
//! }
//! ```

pub mod openai;
pub mod retry;
mod types;

use crate::error::ProviderError;

pub use openai::OpenAIClient;
pub use retry::RetrySchedule;
pub use types::{
    LLMResponse, ModelClient, ModelProfile, StreamEvent, ToolDefinition, Usage, DEFAULT_API_BASE,
    DEFAULT_COMPACT_MODEL, DEFAULT_MODEL,
};

#[cfg(test)]
pub use types::MockModelClient;

/// Parse an HTTP status code and response body into a structured [`ProviderError`].
pub fn parse_provider_error(status: u16, body: &str) -> ProviderError {
    match status {
        401 | 403 => ProviderError::Auth(body.to_string()),
        402 => ProviderError::Billing(body.to_string()),
        404 => ProviderError::ModelNotFound(body.to_string()),
        408 => ProviderError::Timeout(body.to_string()),
        429 => ProviderError::RateLimit(body.to_string()),
        400 | 422 => ProviderError::InvalidRequest(body.to_string()),
        500..=599 => ProviderError::ServerError(body.to_string()),
        _ => ProviderError::Unknown(format!("HTTP {}: {}", status, body)),
    }
}
