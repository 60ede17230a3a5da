//! Configuration type definitions for Lapka
//!
//! The config file is flat: model endpoints, context budget and execution
//! settings sit at the top level. Every key is optional and falls back to the
//! defaults defined here.

use serde::{Deserialize, Serialize};

use crate::agent::compaction::DEFAULT_KEEP_RECENT;
use crate::agent::{DEFAULT_COMPACT_THRESHOLD, DEFAULT_MAX_TOKENS};
use crate::providers::{DEFAULT_API_BASE, DEFAULT_COMPACT_MODEL, DEFAULT_MODEL};
use crate::tools::shell::{DEFAULT_BLOCKED_COMMANDS, DEFAULT_TIMEOUT_SECS};

/// Main configuration struct for Lapka
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Base URL of the main chat-completions endpoint
    pub api_base: String,
    /// Bearer credential for the main endpoint
    pub api_key: String,
    /// Main model identifier
    pub model: String,
    /// Model used for context compaction
    pub compact_model: String,
    /// Compaction endpoint; falls back to `api_base`
    pub compact_api_base: Option<String>,
    /// Compaction credential; falls back to `api_key`
    pub compact_api_key: Option<String>,
    /// Token budget of the assembled context
    pub max_context_tokens: usize,
    /// Fraction of the budget that triggers compaction
    pub compact_threshold: f64,
    /// Messages kept verbatim after a compaction
    pub keep_recent: usize,
    /// Default working directory for shell commands
    pub working_directory: String,
    /// Model round-trips allowed per user message
    pub max_tool_iterations: usize,
    /// Default shell command timeout in seconds
    pub command_timeout: u64,
    /// Sampling temperature of the main model
    pub temperature: f32,
    /// Substrings that make a shell command refuse to run
    pub blocked_commands: Vec<String>,
    /// Logging output
    pub logging: LoggingConfig,
    /// Session store limits and checkpoint location
    pub sessions: SessionConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            api_base: DEFAULT_API_BASE.to_string(),
            api_key: String::new(),
            model: DEFAULT_MODEL.to_string(),
            compact_model: DEFAULT_COMPACT_MODEL.to_string(),
            compact_api_base: None,
            compact_api_key: None,
            max_context_tokens: DEFAULT_MAX_TOKENS,
            compact_threshold: DEFAULT_COMPACT_THRESHOLD,
            keep_recent: DEFAULT_KEEP_RECENT,
            working_directory: ".".to_string(),
            max_tool_iterations: 25,
            command_timeout: DEFAULT_TIMEOUT_SECS,
            temperature: 0.2,
            blocked_commands: DEFAULT_BLOCKED_COMMANDS
                .iter()
                .map(|s| s.to_string())
                .collect(),
            logging: LoggingConfig::default(),
            sessions: SessionConfig::default(),
        }
    }
}

/// Log output format.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    /// Human-readable multi-line output
    Pretty,
    /// Compact single-line text, one event per line
    #[default]
    Component,
    /// JSON lines for log aggregators
    Json,
}

/// Logging configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Output format
    pub format: LogFormat,
    /// Filter directive used when `RUST_LOG` is unset
    pub level: String,
    /// Append logs to this file instead of stderr
    pub file: Option<String>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            format: LogFormat::default(),
            level: "warn".to_string(),
            file: None,
        }
    }
}

/// Session store configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    /// Maximum live sessions; the least recently used is evicted beyond it.
    /// 0 = unlimited.
    pub max_sessions: usize,
    /// Sessions idle longer than this are saved and dropped
    pub idle_timeout_secs: u64,
    /// Checkpoint directory; defaults to `~/.lapka/sessions`
    pub dir: Option<String>,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            max_sessions: 100,
            idle_timeout_secs: 3600,
            dir: None,
        }
    }
}
