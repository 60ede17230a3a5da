//! Lapka - Ultra-lightweight task-execution AI agent with context compaction

pub mod agent;
pub mod config;
pub mod error;
pub mod providers;
pub mod session;
pub mod tools;
pub mod utils;

pub use agent::{Agent, AgentConfig, ContextManager, ContextStats};
pub use config::Config;
pub use error::{LapkaError, ProviderError, Result};
pub use providers::{LLMResponse, ModelClient, ModelProfile, OpenAIClient, ToolDefinition, Usage};
pub use session::{Message, Role, SessionStore, ToolCall};
pub use tools::{builtin_registry, Tool, ToolRegistry};
