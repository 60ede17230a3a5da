//! Checkpoint-style compaction helpers.
//!
//! Pure functions used by [`ContextManager`](super::ContextManager):
//!
//! - **Estimation**: a character-count heuristic (~3.5 chars per token for
//!   mixed-language text). Not tied to any tokenizer; only monotonic in
//!   text length.
//! - **Summary request**: the message list sent to the compaction model.
//! - **Checkpoint framing**: how a stored summary is presented back to the
//!   main model.
//! - **Retention**: which tail of the history survives a compaction.

use crate::session::{Message, Role};

/// Characters per estimated token.
pub const CHARS_PER_TOKEN: f64 = 3.5;

/// Number of most recent messages kept after a compaction.
pub const DEFAULT_KEEP_RECENT: usize = 6;

/// Sampling temperature for the summarization call.
pub const COMPACTION_TEMPERATURE: f32 = 0.1;

/// Stored when the compaction model returns no text.
pub const EMPTY_SUMMARY: &str = "No summary generated.";

/// Instruction appended to the history when asking for a checkpoint summary.
pub const COMPACTION_PROMPT: &str = "CONTEXT CHECKPOINT. Summarize conversation for another LLM to continue.\n\
Include: progress, decisions, constraints, next steps, critical paths/data.\n\
Bullet points. Max 400 tokens.";

/// Rough token estimate for a piece of text.
///
/// # Examples
/// ```
/// use lapka::agent::compaction::estimate_tokens;
///
/// assert_eq!(estimate_tokens(""), 1);
/// assert_eq!(estimate_tokens("abcdefg"), 2);
/// assert_eq!(estimate_tokens(&"x".repeat(35)), 10);
/// ```
pub fn estimate_tokens(text: &str) -> usize {
    let chars = text.chars().count();
    ((chars as f64 / CHARS_PER_TOKEN) as usize).max(1)
}

/// Estimate one message: its text plus its serialized tool calls.
pub fn estimate_message_tokens(message: &Message) -> usize {
    let mut total = estimate_tokens(&message.text());
    if let Some(tool_calls) = message.tool_calls.as_ref().filter(|tc| !tc.is_empty()) {
        let encoded = serde_json::to_string(tool_calls).unwrap_or_default();
        total += estimate_tokens(&encoded);
    }
    total
}

/// Estimate a whole message list.
pub fn estimate_messages_tokens(messages: &[Message]) -> usize {
    messages.iter().map(estimate_message_tokens).sum()
}

/// Wrap a compaction summary for the main model.
pub fn checkpoint_block(summary: &str) -> String {
    format!(
        "[CONTEXT CHECKPOINT — previous conversation summary]\n{}\n[END CHECKPOINT — continue from here]",
        summary
    )
}

/// Build the summarization request.
///
/// Order: system prompt, previous summary (framed as a prior checkpoint),
/// the full history, then [`COMPACTION_PROMPT`].
pub fn build_summary_request(
    system_prompt: &str,
    previous_summary: Option<&str>,
    history: &[Message],
) -> Vec<Message> {
    let mut messages = Vec::with_capacity(history.len() + 3);
    messages.push(Message::system(system_prompt));
    if let Some(summary) = previous_summary {
        messages.push(Message::user(&format!("[Previous checkpoint]\n{}", summary)));
    }
    messages.extend_from_slice(history);
    messages.push(Message::user(COMPACTION_PROMPT));
    messages
}

/// Index where the retained tail of `history` starts when keeping
/// `keep_recent` messages.
pub fn retained_start(history: &[Message], keep_recent: usize) -> usize {
    history.len().saturating_sub(keep_recent)
}

/// Number of leading tool-result messages in `messages` whose originating
/// assistant message is not part of the slice.
///
/// Truncation can cut between an assistant's tool calls and their results;
/// such orphans are left out of the assembled view because chat endpoints
/// reject a tool message with no preceding tool call.
///
/// # Examples
/// ```
/// use lapka::agent::compaction::leading_orphan_count;
/// use lapka::session::{Message, ToolCall};
///
/// let history = vec![
///     Message::tool_result("call_1", "stale"),
///     Message::assistant_with_tools("", vec![ToolCall::new("call_2", "bash", "{}")]),
///     Message::tool_result("call_2", "fresh"),
/// ];
/// assert_eq!(leading_orphan_count(&history), 1);
/// ```
pub fn leading_orphan_count(messages: &[Message]) -> usize {
    messages
        .iter()
        .take_while(|m| m.role == Role::Tool)
        .count()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::ToolCall;

    #[test]
    fn test_estimate_is_monotonic() {
        let mut previous = 0;
        for len in 0..200 {
            let estimate = estimate_tokens(&"a".repeat(len));
            assert!(estimate >= previous);
            previous = estimate;
        }
    }

    #[test]
    fn test_estimate_counts_chars_not_bytes() {
        // 7 Cyrillic chars are 14 bytes
        assert_eq!(estimate_tokens("привет!"), 2);
    }

    #[test]
    fn test_estimate_message_includes_tool_calls() {
        let plain = Message::assistant("");
        let with_calls = Message::assistant_with_tools(
            "",
            vec![ToolCall::new("call_1", "bash", r#"{"command":"ls -la /tmp"}"#)],
        );
        assert_eq!(estimate_message_tokens(&plain), 1);
        assert!(estimate_message_tokens(&with_calls) > 1);
    }

    #[test]
    fn test_estimate_image_counts_text_only() {
        let msg = Message::user_with_image("abcdefg", &"A".repeat(10_000));
        assert_eq!(estimate_message_tokens(&msg), 2);
    }

    #[test]
    fn test_estimate_messages_sums() {
        let msgs = vec![Message::user(&"a".repeat(35)), Message::assistant(&"b".repeat(70))];
        assert_eq!(estimate_messages_tokens(&msgs), 30);
    }

    #[test]
    fn test_checkpoint_block_markers() {
        let block = checkpoint_block("- did X");
        assert!(block.starts_with("[CONTEXT CHECKPOINT — previous conversation summary]\n"));
        assert!(block.contains("- did X"));
        assert!(block.ends_with("[END CHECKPOINT — continue from here]"));
    }

    #[test]
    fn test_summary_request_without_previous() {
        let history = vec![Message::user("a"), Message::assistant("b")];
        let request = build_summary_request("SYS", None, &history);

        assert_eq!(request.len(), 4);
        assert_eq!(request[0].role, Role::System);
        assert_eq!(request[0].text(), "SYS");
        assert_eq!(request[1].text(), "a");
        assert_eq!(request[3].role, Role::User);
        assert_eq!(request[3].text(), COMPACTION_PROMPT);
    }

    #[test]
    fn test_summary_request_with_previous() {
        let history = vec![Message::user("a")];
        let request = build_summary_request("SYS", Some("old summary"), &history);

        assert_eq!(request.len(), 4);
        assert_eq!(request[1].text(), "[Previous checkpoint]\nold summary");
        assert_eq!(request[2].text(), "a");
    }

    #[test]
    fn test_retained_start() {
        let history: Vec<Message> = (0..8).map(|i| Message::user(&i.to_string())).collect();
        assert_eq!(retained_start(&history, 6), 2);
        assert_eq!(retained_start(history.get(..4).unwrap(), 6), 0);
        assert_eq!(retained_start(&history, 0), 8);
    }

    #[test]
    fn test_leading_orphans_none() {
        let history = vec![Message::user("hi"), Message::tool_result("x", "y")];
        assert_eq!(leading_orphan_count(&history), 0);
        assert_eq!(leading_orphan_count(&[]), 0);
    }

    #[test]
    fn test_compaction_prompt_text() {
        assert!(COMPACTION_PROMPT.starts_with("CONTEXT CHECKPOINT."));
        assert!(COMPACTION_PROMPT.contains("next steps"));
        assert!(COMPACTION_PROMPT.ends_with("Max 400 tokens."));
    }
}
