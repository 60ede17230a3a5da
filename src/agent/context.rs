//! Conversation context with checkpoint-style compaction.
//!
//! [`ContextManager`] owns the canonical history of one session, the current
//! compaction summary and the usage counters. It assembles the message list
//! sent to the model, decides when the estimated size crosses the budget,
//! performs compaction through a [`ModelClient`], and persists the whole
//! state as a JSON checkpoint.

use std::fmt;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::error::{LapkaError, Result};
use crate::providers::{ModelClient, Usage};
use crate::session::Message;

use super::compaction::{
    build_summary_request, checkpoint_block, estimate_messages_tokens, leading_orphan_count,
    retained_start, COMPACTION_TEMPERATURE, DEFAULT_KEEP_RECENT, EMPTY_SUMMARY,
};

/// System prompt sent first in every request. Kept short: it is paid for on
/// every model call.
pub const SYSTEM_PROMPT: &str = "You are Lapka 🐾, a task-execution AI. Use tools, be concise.

Rules:
- Prefer bash for system ops. patch_file for edits (saves context).
- On failure: ALWAYS try 2-3 alternatives before reporting failure.
  Fallback chain: http_request → curl -sL → different API/source.
- Never run destructive commands (rm -rf /, mkfs, etc).
- Brief summary after task completion.

Tools: bash, read_file, write_file, patch_file, list_dir, http_request.
";

/// Default token budget.
pub const DEFAULT_MAX_TOKENS: usize = 4000;

/// Default fraction of the budget that triggers compaction.
pub const DEFAULT_COMPACT_THRESHOLD: f64 = 0.8;

// ============================================================================
// Checkpoint record
// ============================================================================

/// On-disk snapshot of one session, fully overwritten on each save.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Checkpoint {
    pub session_id: String,
    /// Unix time in seconds
    pub timestamp: f64,
    #[serde(default)]
    pub compaction_summary: Option<String>,
    #[serde(default)]
    pub compaction_count: u32,
    #[serde(default)]
    pub total_tokens_used: u64,
    #[serde(default)]
    pub history: Vec<Message>,
}

/// Snapshot of context size and accounting.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ContextStats {
    pub history_messages: usize,
    pub estimated_tokens: usize,
    pub compaction_count: u32,
    pub total_tokens_used: u64,
    /// Prompt tokens reported by the last model call
    pub last_prompt_tokens: u32,
    pub has_checkpoint: bool,
}

impl fmt::Display for ContextStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "messages={} est_tokens={} compactions={} tokens_used={} last_prompt={} checkpoint={}",
            self.history_messages,
            self.estimated_tokens,
            self.compaction_count,
            self.total_tokens_used,
            self.last_prompt_tokens,
            if self.has_checkpoint { "yes" } else { "no" }
        )
    }
}

// ============================================================================
// Context manager
// ============================================================================

/// Conversation state of a single session.
///
/// # Example
/// ```
/// use lapka::agent::ContextManager;
/// use lapka::session::Message;
///
/// let mut ctx = ContextManager::new(4000, 0.8);
/// ctx.add(Message::user("Hi"));
/// let messages = ctx.get_messages();
/// assert_eq!(messages.len(), 2); // system + user
/// assert!(!ctx.needs_compaction());
/// ```
#[derive(Debug, Clone)]
pub struct ContextManager {
    max_tokens: usize,
    compact_threshold: f64,
    keep_recent: usize,
    system_prompt: String,
    session_dir: Option<PathBuf>,

    history: Vec<Message>,
    compaction_summary: Option<String>,
    compaction_count: u32,
    total_tokens_used: u64,
    last_prompt_tokens: u32,
}

impl Default for ContextManager {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_TOKENS, DEFAULT_COMPACT_THRESHOLD)
    }
}

impl ContextManager {
    /// Create an empty context.
    ///
    /// # Arguments
    /// * `max_tokens` - Token budget for the assembled view
    /// * `compact_threshold` - Fraction of the budget (0 < t <= 1) that triggers compaction
    pub fn new(max_tokens: usize, compact_threshold: f64) -> Self {
        Self {
            max_tokens,
            compact_threshold,
            keep_recent: DEFAULT_KEEP_RECENT,
            system_prompt: SYSTEM_PROMPT.to_string(),
            session_dir: None,
            history: Vec::new(),
            compaction_summary: None,
            compaction_count: 0,
            total_tokens_used: 0,
            last_prompt_tokens: 0,
        }
    }

    /// Directory for checkpoint files; without one, `save`/`load` are no-ops.
    pub fn with_session_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.session_dir = Some(dir.into());
        self
    }

    /// Number of recent messages kept by a compaction.
    pub fn with_keep_recent(mut self, keep_recent: usize) -> Self {
        self.keep_recent = keep_recent;
        self
    }

    /// Replace the system prompt.
    pub fn with_system_prompt(mut self, prompt: &str) -> Self {
        self.system_prompt = prompt.to_string();
        self
    }

    /// Clear history, summary and counters.
    pub fn reset(&mut self) {
        self.history.clear();
        self.compaction_summary = None;
        self.compaction_count = 0;
        self.total_tokens_used = 0;
        self.last_prompt_tokens = 0;
    }

    /// Append a message to the history.
    pub fn add(&mut self, message: Message) {
        self.history.push(message);
    }

    /// The canonical (possibly truncated) history.
    pub fn history(&self) -> &[Message] {
        &self.history
    }

    /// Current compaction summary, if any.
    pub fn summary(&self) -> Option<&str> {
        self.compaction_summary.as_deref()
    }

    pub fn compaction_count(&self) -> u32 {
        self.compaction_count
    }

    pub fn total_tokens_used(&self) -> u64 {
        self.total_tokens_used
    }

    pub fn system_prompt(&self) -> &str {
        &self.system_prompt
    }

    /// Add a model call's usage to the running totals.
    pub fn record_usage(&mut self, usage: &Usage) {
        self.total_tokens_used += u64::from(usage.total_tokens);
        self.last_prompt_tokens = usage.prompt_tokens;
    }

    /// Assemble the list sent to the model: system prompt, checkpoint block
    /// (when a summary exists), then the history.
    ///
    /// Tool results at the very start of the history that lost their
    /// assistant message to truncation are left out.
    pub fn get_messages(&self) -> Vec<Message> {
        let skip = leading_orphan_count(&self.history);
        let mut messages = Vec::with_capacity(self.history.len() + 2 - skip);
        messages.push(Message::system(&self.system_prompt));
        if let Some(summary) = &self.compaction_summary {
            messages.push(Message::user(&checkpoint_block(summary)));
        }
        messages.extend_from_slice(&self.history[skip..]);
        messages
    }

    /// Estimated size of the assembled view.
    pub fn estimated_tokens(&self) -> usize {
        estimate_messages_tokens(&self.get_messages())
    }

    /// True when the assembled view exceeds `max_tokens × compact_threshold`.
    pub fn needs_compaction(&self) -> bool {
        let limit = self.max_tokens as f64 * self.compact_threshold;
        self.estimated_tokens() as f64 > limit
    }

    /// Replace older turns with a model-written summary.
    ///
    /// No-op on an empty history. On failure the error is returned and the
    /// history, summary and counters are left untouched.
    pub async fn compact(&mut self, client: &dyn ModelClient) -> Result<()> {
        if self.history.is_empty() {
            return Ok(());
        }

        info!(
            compaction = self.compaction_count + 1,
            messages = self.history.len(),
            "Compacting context"
        );

        let request = build_summary_request(
            &self.system_prompt,
            self.compaction_summary.as_deref(),
            &self.history,
        );
        let response = client
            .chat(request, Vec::new(), COMPACTION_TEMPERATURE)
            .await?;

        let summary = response
            .content
            .filter(|s| !s.trim().is_empty())
            .unwrap_or_else(|| EMPTY_SUMMARY.to_string());
        if let Some(usage) = &response.usage {
            self.total_tokens_used += u64::from(usage.total_tokens);
        }

        let start = retained_start(&self.history, self.keep_recent);
        self.history.drain(..start);
        self.compaction_count += 1;

        info!(
            summary_chars = summary.chars().count(),
            kept = self.history.len(),
            "Compaction done"
        );
        self.compaction_summary = Some(summary);
        Ok(())
    }

    pub fn keep_recent(&self) -> usize {
        self.keep_recent
    }

    /// Current counters.
    pub fn stats(&self) -> ContextStats {
        ContextStats {
            history_messages: self.history.len(),
            estimated_tokens: self.estimated_tokens(),
            compaction_count: self.compaction_count,
            total_tokens_used: self.total_tokens_used,
            last_prompt_tokens: self.last_prompt_tokens,
            has_checkpoint: self.compaction_summary.is_some(),
        }
    }

    // ------------------------------------------------------------------------
    // Checkpoints
    // ------------------------------------------------------------------------

    /// Build the checkpoint record for `session_id`.
    pub fn to_checkpoint(&self, session_id: &str) -> Checkpoint {
        Checkpoint {
            session_id: session_id.to_string(),
            timestamp: chrono::Utc::now().timestamp_millis() as f64 / 1000.0,
            compaction_summary: self.compaction_summary.clone(),
            compaction_count: self.compaction_count,
            total_tokens_used: self.total_tokens_used,
            history: self.history.clone(),
        }
    }

    /// Replace the state with a checkpoint's contents.
    pub fn restore(&mut self, checkpoint: Checkpoint) {
        self.compaction_summary = checkpoint.compaction_summary;
        self.compaction_count = checkpoint.compaction_count;
        self.total_tokens_used = checkpoint.total_tokens_used;
        self.history = checkpoint.history;
        self.last_prompt_tokens = 0;
    }

    /// Path of the checkpoint file for `session_id`, if a session dir is set.
    pub fn checkpoint_path(&self, session_id: &str) -> Option<PathBuf> {
        self.session_dir
            .as_ref()
            .map(|dir| dir.join(format!("{}.json", sanitize_session_id(session_id))))
    }

    /// Write the checkpoint, creating the session dir as needed.
    ///
    /// Returns the written path, or `None` without a session dir.
    pub async fn save(&self, session_id: &str) -> Result<Option<PathBuf>> {
        let Some(path) = self.checkpoint_path(session_id) else {
            return Ok(None);
        };
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        let content = serde_json::to_string_pretty(&self.to_checkpoint(session_id))?;
        tokio::fs::write(&path, content).await?;
        info!(path = %path.display(), "Checkpoint saved");
        Ok(Some(path))
    }

    /// Restore from the checkpoint for `session_id`.
    ///
    /// Returns `false` when there is no session dir or no file.
    pub async fn load(&mut self, session_id: &str) -> Result<bool> {
        let Some(path) = self.checkpoint_path(session_id) else {
            return Ok(false);
        };
        if !tokio::fs::try_exists(&path).await? {
            debug!(session_id, "No checkpoint found");
            return Ok(false);
        }
        let checkpoint = read_checkpoint(&path).await?;
        info!(
            session_id,
            messages = checkpoint.history.len(),
            "Checkpoint loaded"
        );
        self.restore(checkpoint);
        Ok(true)
    }

    /// Restore from the checkpoint for `session_id`, starting fresh when the
    /// file cannot be read.
    ///
    /// An unreadable checkpoint is renamed to `<name>.json.corrupt` so later
    /// loads for the same id succeed. Returns whether a checkpoint was restored.
    pub async fn load_or_discard(&mut self, session_id: &str) -> bool {
        let err = match self.load(session_id).await {
            Ok(loaded) => return loaded,
            Err(e) => e,
        };
        warn!(session_id, error = %err, "Discarding unreadable checkpoint");
        if let Some(path) = self.checkpoint_path(session_id) {
            let aside = path.with_extension("json.corrupt");
            if let Err(e) = tokio::fs::rename(&path, &aside).await {
                warn!(path = %path.display(), error = %e, "Failed to move checkpoint aside");
            }
        }
        false
    }
}

async fn read_checkpoint(path: &Path) -> Result<Checkpoint> {
    let content = tokio::fs::read_to_string(path).await?;
    serde_json::from_str(&content).map_err(|e| {
        LapkaError::Checkpoint(format!("Invalid checkpoint {}: {}", path.display(), e))
    })
}

/// Percent-encode characters that are unsafe in file names.
///
/// - "telegram:42" → "telegram%3A42"
/// - "a/b" → "a%2Fb"
fn sanitize_session_id(id: &str) -> String {
    let mut result = String::with_capacity(id.len() * 3);
    for c in id.chars() {
        match c {
            '/' => result.push_str("%2F"),
            '\\' => result.push_str("%5C"),
            ':' => result.push_str("%3A"),
            '*' => result.push_str("%2A"),
            '?' => result.push_str("%3F"),
            '"' => result.push_str("%22"),
            '<' => result.push_str("%3C"),
            '>' => result.push_str("%3E"),
            '|' => result.push_str("%7C"),
            '%' => result.push_str("%25"),
            '.' if result.is_empty() => result.push_str("%2E"),
            c => result.push(c),
        }
    }
    result
}
