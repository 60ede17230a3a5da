//! Agent module - Core AI agent logic and conversation handling
//!
//! This module provides the agent loop and the conversation context for
//! Lapka. The agent is responsible for:
//!
//! - Recording the user's message in the session's context
//! - Compacting the context when it nears its token budget
//! - Calling the model client with the assembled messages and tool schemas
//! - Executing tool calls in order and feeding results back to the model
//! - Stopping at a plain-text answer or the iteration cap
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────┐     ┌─────────────┐     ┌─────────────┐
//! │  Connector  │────>│    Agent    │────>│ ModelClient │
//! │ (CLI, bot)  │     │  run(text)  │     │ (main/cmp)  │
//! └─────────────┘     └─────────────┘     └─────────────┘
//!                            │                   ▲
//!                            │                   │ compact()
//!                            ▼                   │
//!                     ┌─────────────┐     ┌─────────────┐
//!                     │    Tool     │     │   Context   │
//!                     │  Registry   │     │   Manager   │
//!                     └─────────────┘     └─────────────┘
//! ```
//!
//! # Example
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use lapka::agent::Agent;
//! use lapka::config::Config;
//! use lapka::tools::builtin_registry;
//!
//! async fn run_agent() -> lapka::error::Result<()> {
//!     let config = Config::load()?;
//!     let tools = Arc::new(builtin_registry());
//!     let mut agent = Agent::from_config(&config, tools)?;
//!
//!     let progress = |line: &str| eprintln!("{}", line);
//!     let answer = agent.run("List the files here", Some(&progress), None).await?;
//!     println!("{}", answer);
//!     agent.close();
//!     Ok(())
//! }
//! ```

pub mod compaction;
mod context;
mod r#loop;

pub use context::{
    Checkpoint, ContextManager, ContextStats, DEFAULT_COMPACT_THRESHOLD, DEFAULT_MAX_TOKENS,
    SYSTEM_PROMPT,
};
pub use r#loop::{
    parse_tool_arguments, summarize_args, Agent, AgentConfig, OnOutput, COMPACTING_NOTICE,
    FAILURE_HINT, ITERATION_LIMIT_MESSAGE,
};
