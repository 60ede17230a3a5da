//! Agent loop implementation
//!
//! One [`Agent`] serves one session. A call to [`Agent::run`] appends the
//! user's message, then alternates model calls and sequential tool execution
//! until the model answers in plain text or the iteration cap is hit.

use std::collections::HashSet;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use serde_json::{json, Map, Value};
use tracing::{debug, info, warn};

use crate::config::Config;
use crate::error::Result;
use crate::providers::{ModelClient, OpenAIClient, ToolDefinition};
use crate::session::{Message, ToolCall};
use crate::tools::shell::{DEFAULT_BLOCKED_COMMANDS, DEFAULT_TIMEOUT_SECS};
use crate::tools::ToolRegistry;
use crate::utils::string::preview;

use super::{ContextManager, ContextStats};

/// Emitted through the progress callback before a compaction.
pub const COMPACTING_NOTICE: &str = "🗜️ Compacting context...";

/// Final answer when the iteration cap is reached.
pub const ITERATION_LIMIT_MESSAGE: &str = "⚠️ Max tool iterations reached. Stopping.";

/// Appended to tool results that start with a failure marker.
pub const FAILURE_HINT: &str =
    "\n[Hint: try an alternative approach — different tool, command, or source.]";

const FAILURE_MARKERS: [&str; 2] = ["❌", "⏰"];

/// Best-effort progress sink. Panics inside it are caught and logged.
pub type OnOutput = dyn Fn(&str) + Send + Sync;

/// Per-agent execution settings.
#[derive(Debug, Clone, PartialEq)]
pub struct AgentConfig {
    /// Model round-trips allowed per `run`
    pub max_tool_iterations: usize,
    /// Sampling temperature for the main model
    pub temperature: f32,
    /// Default `working_directory` for `bash`
    pub working_directory: String,
    /// Default `timeout` for `bash`, in seconds
    pub command_timeout: u64,
    /// Default `blocked_commands` for `bash`
    pub blocked_commands: Vec<String>,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            max_tool_iterations: 25,
            temperature: 0.2,
            working_directory: ".".to_string(),
            command_timeout: DEFAULT_TIMEOUT_SECS,
            blocked_commands: DEFAULT_BLOCKED_COMMANDS
                .iter()
                .map(|s| s.to_string())
                .collect(),
        }
    }
}

impl AgentConfig {
    /// Execution settings from the process configuration.
    pub fn from_config(config: &Config) -> Self {
        Self {
            max_tool_iterations: config.max_tool_iterations,
            temperature: config.temperature,
            working_directory: config.working_directory.clone(),
            command_timeout: config.command_timeout,
            blocked_commands: config.blocked_commands.clone(),
        }
    }
}

/// The agent: conversation state plus the clients and tools it drives.
///
/// # Example
/// ```rust,ignore
/// use std::sync::Arc;
/// use lapka::agent::Agent;
/// use lapka::config::Config;
/// use lapka::tools::builtin_registry;
///
/// async fn example() -> lapka::error::Result<()> {
///     let config = Config::load()?;
///     let mut agent = Agent::from_config(&config, Arc::new(builtin_registry()))?;
///     let answer = agent.run("How much disk space is free?", None, None).await?;
///     println!("{}", answer);
///     Ok(())
/// }
/// ```
pub struct Agent {
    config: AgentConfig,
    context: ContextManager,
    main_client: Arc<dyn ModelClient>,
    compact_client: Arc<dyn ModelClient>,
    tools: Arc<ToolRegistry>,
    tool_definitions: Vec<ToolDefinition>,
}

impl std::fmt::Debug for Agent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Agent")
            .field("config", &self.config)
            .field("context", &self.context)
            .field("tools", &self.tools)
            .finish_non_exhaustive()
    }
}

impl Agent {
    /// Create an agent that uses `client` for both answering and compaction.
    pub fn new(client: Arc<dyn ModelClient>, tools: Arc<ToolRegistry>) -> Self {
        let tool_definitions = tools.definitions();
        Self {
            config: AgentConfig::default(),
            context: ContextManager::default(),
            compact_client: Arc::clone(&client),
            main_client: client,
            tools,
            tool_definitions,
        }
    }

    /// Use a separate (usually cheaper) client for compaction.
    pub fn with_compact_client(mut self, client: Arc<dyn ModelClient>) -> Self {
        self.compact_client = client;
        self
    }

    /// Replace the conversation context.
    pub fn with_context(mut self, context: ContextManager) -> Self {
        self.context = context;
        self
    }

    /// Replace the execution settings.
    pub fn with_config(mut self, config: AgentConfig) -> Self {
        self.config = config;
        self
    }

    /// Build an agent with OpenAI-compatible clients for the main and
    /// compaction profiles of `config`.
    ///
    /// When both profiles are identical a single client is shared.
    pub fn from_config(config: &Config, tools: Arc<ToolRegistry>) -> Result<Self> {
        let main_profile = config.main_profile();
        let compact_profile = config.compact_profile();

        let main_client: Arc<dyn ModelClient> = Arc::new(OpenAIClient::new(main_profile.clone())?);
        let compact_client: Arc<dyn ModelClient> = if compact_profile == main_profile {
            Arc::clone(&main_client)
        } else {
            Arc::new(OpenAIClient::new(compact_profile)?)
        };

        let context = ContextManager::new(config.max_context_tokens, config.compact_threshold)
            .with_session_dir(config.sessions_dir())
            .with_keep_recent(config.keep_recent);

        Ok(Self::new(main_client, tools)
            .with_compact_client(compact_client)
            .with_context(context)
            .with_config(AgentConfig::from_config(config)))
    }

    /// Process one user message and return the final answer.
    ///
    /// # Arguments
    /// * `text` - The user's message
    /// * `on_output` - Optional progress callback (compaction notice, tool
    ///   progress); its failures never affect the loop
    /// * `image_b64` - Optional base64 JPEG attached to the message
    ///
    /// # Errors
    /// Returns an error if a model call fails after retries, or if a
    /// compaction fails (the history is left intact in that case).
    /// Tool failures never surface here; they become result text.
    pub async fn run(
        &mut self,
        text: &str,
        on_output: Option<&OnOutput>,
        image_b64: Option<&str>,
    ) -> Result<String> {
        let user_message = match image_b64 {
            Some(image) => Message::user_with_image(text, image),
            None => Message::user(text),
        };
        self.context.add(user_message);

        let max_iterations = self.config.max_tool_iterations;
        for iteration in 1..=max_iterations {
            debug!("Tool iteration {} of {}", iteration, max_iterations);

            if self.context.needs_compaction() {
                emit(on_output, COMPACTING_NOTICE);
                self.context.compact(self.compact_client.as_ref()).await?;
            }

            let messages = self.context.get_messages();
            let response = self
                .main_client
                .chat(
                    messages,
                    self.tool_definitions.clone(),
                    self.config.temperature,
                )
                .await?;

            if let Some(usage) = &response.usage {
                debug!(
                    prompt_tokens = usage.prompt_tokens,
                    completion_tokens = usage.completion_tokens,
                    "Model usage"
                );
                self.context.record_usage(usage);
            }

            if !response.has_tool_calls() {
                let answer = response.content.unwrap_or_default();
                self.context.add(Message::assistant(&answer));
                return Ok(answer);
            }

            let tool_calls = normalize_tool_call_ids(response.tool_calls);
            self.context.add(Message::assistant_with_tools(
                response.content.as_deref().unwrap_or(""),
                tool_calls.clone(),
            ));

            for call in &tool_calls {
                info!(tool = %call.name, id = %call.id, "Executing tool");
                let mut args = parse_tool_arguments(&call.arguments);
                emit(
                    on_output,
                    &format!("🔧 {}: {}", call.name, summarize_args(&args)),
                );

                self.inject_defaults(&call.name, &mut args);
                let mut result = self.tools.execute(&call.name, args).await;
                if FAILURE_MARKERS.iter().any(|m| result.starts_with(m)) {
                    result.push_str(FAILURE_HINT);
                }

                emit(on_output, &format!("   → {}", preview(&result, 200)));
                self.context.add(Message::tool_result(&call.id, &result));
            }
        }

        info!(
            iterations = max_iterations,
            "Tool loop reached maximum iterations"
        );
        self.context.add(Message::assistant(ITERATION_LIMIT_MESSAGE));
        Ok(ITERATION_LIMIT_MESSAGE.to_string())
    }

    /// Fill in caller-scoped defaults the model left out.
    ///
    /// Only `bash` receives defaults: `working_directory`, `timeout` and
    /// `blocked_commands`.
    fn inject_defaults(&self, tool_name: &str, args: &mut Value) {
        if tool_name != "bash" {
            return;
        }
        if let Value::Object(map) = args {
            map.entry("working_directory")
                .or_insert_with(|| json!(self.config.working_directory));
            map.entry("timeout")
                .or_insert_with(|| json!(self.config.command_timeout));
            map.entry("blocked_commands")
                .or_insert_with(|| json!(self.config.blocked_commands));
        }
    }

    /// Clear the conversation.
    pub fn reset(&mut self) {
        self.context.reset();
    }

    /// Current context statistics.
    pub fn stats(&self) -> ContextStats {
        self.context.stats()
    }

    /// Force a compaction with the compaction client.
    pub async fn compact(&mut self) -> Result<()> {
        self.context.compact(self.compact_client.as_ref()).await
    }

    /// Save the conversation checkpoint for `session_id`.
    pub async fn save(&self, session_id: &str) -> Result<Option<std::path::PathBuf>> {
        self.context.save(session_id).await
    }

    /// Restore the conversation checkpoint for `session_id`, if one exists.
    pub async fn load(&mut self, session_id: &str) -> Result<bool> {
        self.context.load(session_id).await
    }

    /// Like [`Agent::load`], but an unreadable checkpoint is moved aside and
    /// the session starts fresh.
    pub async fn resume(&mut self, session_id: &str) -> bool {
        self.context.load_or_discard(session_id).await
    }

    pub fn context(&self) -> &ContextManager {
        &self.context
    }

    pub fn config(&self) -> &AgentConfig {
        &self.config
    }

    /// Shut the agent down, releasing both model clients.
    pub fn close(self) {
        debug!(
            messages = self.context.history().len(),
            "Closing agent"
        );
    }
}

/// Invoke the progress callback, containing any panic it raises.
fn emit(on_output: Option<&OnOutput>, text: &str) {
    if let Some(callback) = on_output {
        if std::panic::catch_unwind(AssertUnwindSafe(|| callback(text))).is_err() {
            warn!("Progress callback panicked");
        }
    }
}

/// Decode the model's raw argument string.
///
/// Empty input becomes `{}`. Anything that is not a JSON object is passed on
/// as `{"command": raw}`, which is what models usually mean when they send a
/// bare string to `bash`.
pub fn parse_tool_arguments(raw: &str) -> Value {
    if raw.trim().is_empty() {
        return Value::Object(Map::new());
    }
    match serde_json::from_str::<Value>(raw) {
        Ok(value @ Value::Object(_)) => value,
        Ok(_) | Err(_) => {
            warn!("Tool arguments are not a JSON object, passing as command");
            json!({ "command": raw })
        }
    }
}

/// Short one-line description of tool arguments for progress output.
pub fn summarize_args(args: &Value) -> String {
    for key in ["command", "path", "url"] {
        if let Some(value) = args.get(key) {
            let text = match value {
                Value::String(s) => s.clone(),
                other => other.to_string(),
            };
            return if key == "command" {
                preview(&text, 80)
            } else {
                text
            };
        }
    }
    crate::utils::string::prefix_chars(&args.to_string(), 80)
}

/// Give every call in one response a non-empty id, unique within the
/// response, so each tool result pairs with exactly one call.
fn normalize_tool_call_ids(calls: Vec<ToolCall>) -> Vec<ToolCall> {
    let mut seen = HashSet::new();
    calls
        .into_iter()
        .map(|mut call| {
            if call.id.is_empty() || seen.contains(&call.id) {
                let base = format!("call_{}", call.name);
                let mut candidate = base.clone();
                let mut n = 1;
                while seen.contains(&candidate) {
                    n += 1;
                    candidate = format!("{}_{}", base, n);
                }
                call.id = candidate;
            }
            seen.insert(call.id.clone());
            call
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::LapkaError;
    use crate::providers::{LLMResponse, Usage};
    use crate::session::Role;
    use crate::tools::Tool;
    use async_trait::async_trait;
    use std::collections::VecDeque;
    use std::sync::Mutex;

    /// Replays canned responses and records every request.
    struct ScriptedClient {
        responses: Mutex<VecDeque<Result<LLMResponse>>>,
        fallback: Option<LLMResponse>,
        requests: Mutex<Vec<Vec<Message>>>,
    }

    impl ScriptedClient {
        fn new(responses: Vec<LLMResponse>) -> Self {
            Self {
                responses: Mutex::new(responses.into_iter().map(Ok).collect()),
                fallback: None,
                requests: Mutex::new(Vec::new()),
            }
        }

        fn always(response: LLMResponse) -> Self {
            Self {
                responses: Mutex::new(VecDeque::new()),
                fallback: Some(response),
                requests: Mutex::new(Vec::new()),
            }
        }

        fn failing() -> Self {
            Self {
                responses: Mutex::new(VecDeque::from(vec![Err(LapkaError::Provider(
                    "boom".into(),
                ))])),
                fallback: None,
                requests: Mutex::new(Vec::new()),
            }
        }

        fn calls(&self) -> usize {
            self.requests.lock().unwrap().len()
        }

        fn request(&self, i: usize) -> Vec<Message> {
            self.requests.lock().unwrap()[i].clone()
        }
    }

    #[async_trait]
    impl ModelClient for ScriptedClient {
        async fn chat(
            &self,
            messages: Vec<Message>,
            _tools: Vec<ToolDefinition>,
            _temperature: f32,
        ) -> Result<LLMResponse> {
            self.requests.lock().unwrap().push(messages);
            if let Some(next) = self.responses.lock().unwrap().pop_front() {
                return next;
            }
            match &self.fallback {
                Some(r) => Ok(r.clone()),
                None => Err(LapkaError::Provider("script exhausted".into())),
            }
        }
    }

    /// Records the arguments it was called with.
    struct RecordingTool {
        name: &'static str,
        seen: Arc<Mutex<Vec<Value>>>,
    }

    #[async_trait]
    impl Tool for RecordingTool {
        fn name(&self) -> &str {
            self.name
        }
        fn description(&self) -> &str {
            "records arguments"
        }
        fn parameters(&self) -> Value {
            json!({"type": "object"})
        }
        async fn execute(&self, args: Value) -> Result<String> {
            self.seen.lock().unwrap().push(args);
            Ok(format!("{} ok", self.name))
        }
    }

    fn agent_with(client: Arc<ScriptedClient>, registry: ToolRegistry) -> Agent {
        Agent::new(client, Arc::new(registry))
    }

    #[tokio::test]
    async fn test_plain_answer() {
        let client = Arc::new(ScriptedClient::new(vec![LLMResponse::text("Hello")]));
        let mut agent = agent_with(client.clone(), ToolRegistry::new());

        let answer = agent.run("Hi", None, None).await.unwrap();
        assert_eq!(answer, "Hello");
        assert_eq!(agent.context().history().len(), 2);
        assert_eq!(agent.stats().compaction_count, 0);
        assert_eq!(client.calls(), 1);
    }

    #[tokio::test]
    async fn test_usage_is_accumulated() {
        let client = Arc::new(ScriptedClient::new(vec![
            LLMResponse::text("Hello").with_usage(Usage::new(100, 20))
        ]));
        let mut agent = agent_with(client, ToolRegistry::new());

        agent.run("Hi", None, None).await.unwrap();
        let stats = agent.stats();
        assert_eq!(stats.total_tokens_used, 120);
        assert_eq!(stats.last_prompt_tokens, 100);
    }

    #[tokio::test]
    async fn test_unknown_tool_then_answer() {
        let client = Arc::new(ScriptedClient::new(vec![
            LLMResponse::with_tools("", vec![ToolCall::new("call_1", "no_such_tool", "{}")]),
            LLMResponse::text("done"),
        ]));
        let mut agent = agent_with(client.clone(), ToolRegistry::new());

        let answer = agent.run("go", None, None).await.unwrap();
        assert_eq!(answer, "done");
        assert_eq!(client.calls(), 2);

        let second = client.request(1);
        let tool_msg = second.iter().find(|m| m.role == Role::Tool).unwrap();
        assert_eq!(
            tool_msg.text(),
            format!("❌ Unknown tool: no_such_tool{}", FAILURE_HINT)
        );
        assert_eq!(tool_msg.tool_call_id.as_deref(), Some("call_1"));
    }

    #[tokio::test]
    async fn test_iteration_cap() {
        let client = Arc::new(ScriptedClient::always(LLMResponse::with_tools(
            "",
            vec![ToolCall::new("call_1", "no_such_tool", "{}")],
        )));
        let mut agent = agent_with(client.clone(), ToolRegistry::new()).with_config(AgentConfig {
            max_tool_iterations: 1,
            ..AgentConfig::default()
        });

        let answer = agent.run("loop forever", None, None).await.unwrap();
        assert_eq!(answer, ITERATION_LIMIT_MESSAGE);
        assert_eq!(client.calls(), 1);

        let last = agent.context().history().last().unwrap();
        assert_eq!(last.role, Role::Assistant);
        assert_eq!(last.text(), ITERATION_LIMIT_MESSAGE);
    }

    #[tokio::test]
    async fn test_tool_calls_run_in_order() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let registry = ToolRegistry::new()
            .with_tool(RecordingTool { name: "first", seen: seen.clone() })
            .with_tool(RecordingTool { name: "second", seen: seen.clone() });
        let client = Arc::new(ScriptedClient::new(vec![
            LLMResponse::with_tools(
                "",
                vec![
                    ToolCall::new("a", "second", r#"{"n": 1}"#),
                    ToolCall::new("b", "first", r#"{"n": 2}"#),
                    ToolCall::new("c", "second", r#"{"n": 3}"#),
                ],
            ),
            LLMResponse::text("ok"),
        ]));
        let mut agent = agent_with(client, registry);
        agent.run("go", None, None).await.unwrap();

        let order: Vec<i64> = seen
            .lock()
            .unwrap()
            .iter()
            .map(|v| v["n"].as_i64().unwrap())
            .collect();
        assert_eq!(order, vec![1, 2, 3]);

        let history = agent.context().history();
        assert_eq!(history[1].tool_calls.as_ref().unwrap().len(), 3);
        let ids: Vec<_> = history
            .iter()
            .skip(2)
            .take(3)
            .map(|m| m.tool_call_id.clone().unwrap())
            .collect();
        assert_eq!(ids, vec!["a", "b", "c"]);
        assert_eq!(history[2].text(), "second ok");
        assert_eq!(history[3].text(), "first ok");
    }

    #[tokio::test]
    async fn test_bash_defaults_injected() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let registry = ToolRegistry::new().with_tool(RecordingTool { name: "bash", seen: seen.clone() });
        let client = Arc::new(ScriptedClient::new(vec![
            LLMResponse::with_tools(
                "",
                vec![ToolCall::new("c1", "bash", r#"{"command": "ls", "timeout": 5}"#)],
            ),
            LLMResponse::text("ok"),
        ]));
        let mut agent = agent_with(client, registry).with_config(AgentConfig {
            working_directory: "/srv".into(),
            command_timeout: 99,
            blocked_commands: vec!["curl".into()],
            ..AgentConfig::default()
        });
        agent.run("list", None, None).await.unwrap();

        let args = seen.lock().unwrap()[0].clone();
        assert_eq!(args["command"], "ls");
        assert_eq!(args["timeout"], 5);
        assert_eq!(args["working_directory"], "/srv");
        assert_eq!(args["blocked_commands"], json!(["curl"]));
    }

    #[tokio::test]
    async fn test_other_tools_get_no_defaults() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let registry =
            ToolRegistry::new().with_tool(RecordingTool { name: "read_file", seen: seen.clone() });
        let client = Arc::new(ScriptedClient::new(vec![
            LLMResponse::with_tools("", vec![ToolCall::new("c1", "read_file", r#"{"path": "x"}"#)]),
            LLMResponse::text("ok"),
        ]));
        let mut agent = agent_with(client, registry);
        agent.run("read", None, None).await.unwrap();
        assert_eq!(seen.lock().unwrap()[0], json!({"path": "x"}));
    }

    #[tokio::test]
    async fn test_progress_callback_and_panics_contained() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let registry = ToolRegistry::new().with_tool(RecordingTool { name: "bash", seen });
        let client = Arc::new(ScriptedClient::new(vec![
            LLMResponse::with_tools("", vec![ToolCall::new("c1", "bash", r#"{"command": "ls"}"#)]),
            LLMResponse::text("ok"),
        ]));
        let lines = Arc::new(Mutex::new(Vec::<String>::new()));
        let sink = lines.clone();
        let callback = move |line: &str| {
            sink.lock().unwrap().push(line.to_string());
            panic!("callback failure");
        };

        let mut agent = agent_with(client, registry);
        let answer = agent.run("go", Some(&callback), None).await.unwrap();
        assert_eq!(answer, "ok");

        let lines = lines.lock().unwrap();
        assert_eq!(lines[0], "🔧 bash: ls");
        assert_eq!(lines[1], "   → bash ok");
    }

    #[tokio::test]
    async fn test_model_failure_propagates() {
        let client = Arc::new(ScriptedClient::failing());
        let mut agent = agent_with(client, ToolRegistry::new());
        assert!(agent.run("Hi", None, None).await.is_err());
        // the user message stays in history
        assert_eq!(agent.context().history().len(), 1);
    }

    #[tokio::test]
    async fn test_image_message() {
        let client = Arc::new(ScriptedClient::new(vec![LLMResponse::text("a cat")]));
        let mut agent = agent_with(client.clone(), ToolRegistry::new());
        agent.run("", None, Some("aGVsbG8=")).await.unwrap();

        let first = &agent.context().history()[0];
        assert_eq!(first.text(), "What's in this image?");
        assert!(serde_json::to_string(first)
            .unwrap()
            .contains("data:image/jpeg;base64,aGVsbG8="));
    }

    #[tokio::test]
    async fn test_compaction_before_call() {
        let main = Arc::new(ScriptedClient::new(vec![LLMResponse::text("fine")]));
        let compactor = Arc::new(ScriptedClient::new(vec![LLMResponse::text("- summary")]));
        let lines = Arc::new(Mutex::new(Vec::<String>::new()));
        let sink = lines.clone();
        let callback = move |line: &str| sink.lock().unwrap().push(line.to_string());

        let mut context = ContextManager::new(50, 0.5);
        for i in 0..8 {
            context.add(Message::user(&format!("message number {} {}", i, "x".repeat(40))));
        }
        let mut agent = agent_with(main.clone(), ToolRegistry::new())
            .with_compact_client(compactor.clone())
            .with_context(context);

        agent.run("next", Some(&callback), None).await.unwrap();

        assert_eq!(compactor.calls(), 1);
        assert_eq!(main.calls(), 1);
        assert_eq!(agent.stats().compaction_count, 1);
        assert_eq!(lines.lock().unwrap()[0], COMPACTING_NOTICE);
        assert_eq!(agent.context().summary(), Some("- summary"));
    }

    #[tokio::test]
    async fn test_failed_compaction_keeps_history() {
        let main = Arc::new(ScriptedClient::new(vec![LLMResponse::text("unused")]));
        let compactor = Arc::new(ScriptedClient::failing());

        let mut context = ContextManager::new(10, 0.5);
        context.add(Message::user(&"y".repeat(200)));
        let mut agent = agent_with(main.clone(), ToolRegistry::new())
            .with_compact_client(compactor)
            .with_context(context);

        assert!(agent.run("more", None, None).await.is_err());
        assert_eq!(agent.context().history().len(), 2);
        assert_eq!(agent.stats().compaction_count, 0);
        assert!(agent.context().summary().is_none());
        assert_eq!(main.calls(), 0);
    }

    #[tokio::test]
    async fn test_reset_clears_history() {
        let client = Arc::new(ScriptedClient::new(vec![LLMResponse::text("Hello")]));
        let mut agent = agent_with(client, ToolRegistry::new());
        agent.run("Hi", None, None).await.unwrap();
        agent.reset();
        assert!(agent.context().history().is_empty());
        assert_eq!(agent.stats().total_tokens_used, 0);
        agent.close();
    }

    #[test]
    fn test_parse_tool_arguments() {
        assert_eq!(parse_tool_arguments(""), json!({}));
        assert_eq!(parse_tool_arguments("  "), json!({}));
        assert_eq!(parse_tool_arguments(r#"{"a": 1}"#), json!({"a": 1}));
        assert_eq!(parse_tool_arguments("ls -la"), json!({"command": "ls -la"}));
        assert_eq!(parse_tool_arguments("[1,2]"), json!({"command": "[1,2]"}));
    }

    #[test]
    fn test_summarize_args() {
        assert_eq!(summarize_args(&json!({"command": "ls"})), "ls");
        let long = "x".repeat(100);
        assert_eq!(
            summarize_args(&json!({"command": long})),
            format!("{}...", "x".repeat(80))
        );
        assert_eq!(summarize_args(&json!({"path": "/etc/hosts"})), "/etc/hosts");
        assert_eq!(summarize_args(&json!({"url": "https://x.test"})), "https://x.test");
        assert_eq!(summarize_args(&json!({"q": 1})), r#"{"q":1}"#);
    }

    #[test]
    fn test_normalize_tool_call_ids() {
        let calls = normalize_tool_call_ids(vec![
            ToolCall::new("", "bash", "{}"),
            ToolCall::new("", "bash", "{}"),
            ToolCall::new("x", "read_file", "{}"),
            ToolCall::new("x", "read_file", "{}"),
        ]);
        let ids: Vec<_> = calls.iter().map(|c| c.id.as_str()).collect();
        assert_eq!(ids, vec!["call_bash", "call_bash_2", "x", "call_read_file"]);
    }

    #[test]
    fn test_from_config_applies_context_settings() {
        let dir = tempfile::tempdir().unwrap();
        let config = crate::config::Config {
            keep_recent: 3,
            max_context_tokens: 2000,
            sessions: crate::config::SessionConfig {
                dir: Some(dir.path().to_string_lossy().into_owned()),
                ..Default::default()
            },
            ..Default::default()
        };
        let agent = Agent::from_config(&config, Arc::new(ToolRegistry::new())).unwrap();
        assert_eq!(agent.context().keep_recent(), 3);
        assert_eq!(agent.config().max_tool_iterations, 25);
    }
}
