//! Tool registry for Lapka
//!
//! The registry is an explicit value built once at startup and shared
//! read-only (behind an `Arc`) by every agent. It is also the dispatch
//! boundary: whatever a tool does, a call through [`ToolRegistry::execute`]
//! yields text.

use std::collections::HashMap;
use std::panic::AssertUnwindSafe;
use std::time::Instant;

use futures::FutureExt;
use serde_json::Value;
use tracing::{debug, error, info};

use crate::providers::ToolDefinition;

use super::Tool;

/// Result text for a call to an unregistered tool.
pub fn unknown_tool_message(name: &str) -> String {
    format!("❌ Unknown tool: {}", name)
}

/// A registry that holds tools in registration order.
///
/// # Example
///
/// ```rust
/// use lapka::tools::{ListDirTool, ToolRegistry};
/// use serde_json::json;
///
/// # tokio_test::block_on(async {
/// let registry = ToolRegistry::new().with_tool(ListDirTool);
/// assert!(registry.has("list_dir"));
///
/// let result = registry.execute("no_such_tool", json!({})).await;
/// assert_eq!(result, "❌ Unknown tool: no_such_tool");
/// # });
/// ```
#[derive(Default)]
pub struct ToolRegistry {
    tools: Vec<Box<dyn Tool>>,
    index: HashMap<String, usize>,
}

impl std::fmt::Debug for ToolRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ToolRegistry")
            .field("tools", &self.names())
            .finish()
    }
}

impl ToolRegistry {
    /// Create a new empty tool registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a tool.
    ///
    /// If a tool with the same name already exists, it is replaced in place.
    pub fn register(&mut self, tool: Box<dyn Tool>) {
        let name = tool.name().to_string();
        info!(tool = %name, "Registering tool");
        match self.index.get(&name) {
            Some(&i) => self.tools[i] = tool,
            None => {
                self.index.insert(name, self.tools.len());
                self.tools.push(tool);
            }
        }
    }

    /// Builder form of [`register`](Self::register).
    pub fn with_tool(mut self, tool: impl Tool + 'static) -> Self {
        self.register(Box::new(tool));
        self
    }

    /// Get a tool by name.
    pub fn get(&self, name: &str) -> Option<&dyn Tool> {
        self.index.get(name).map(|&i| self.tools[i].as_ref())
    }

    /// Execute a tool by name.
    ///
    /// Never fails: an unknown name yields `❌ Unknown tool: {name}`, and a
    /// tool error or panic yields `❌ Tool error: {e}`.
    pub async fn execute(&self, name: &str, args: Value) -> String {
        let Some(tool) = self.get(name) else {
            debug!(tool = name, "Unknown tool requested");
            return unknown_tool_message(name);
        };

        let start = Instant::now();
        match AssertUnwindSafe(tool.execute(args)).catch_unwind().await {
            Ok(Ok(output)) => {
                info!(
                    tool = name,
                    duration_ms = start.elapsed().as_millis() as u64,
                    "Tool executed successfully"
                );
                output
            }
            Ok(Err(e)) => {
                error!(
                    tool = name,
                    error = %e,
                    duration_ms = start.elapsed().as_millis() as u64,
                    "Tool execution failed"
                );
                format!("❌ Tool error: {}", e)
            }
            Err(_) => {
                error!(tool = name, "Tool panicked");
                format!("❌ Tool error: {} panicked", name)
            }
        }
    }

    /// Tool definitions in registration order.
    pub fn definitions(&self) -> Vec<ToolDefinition> {
        self.tools.iter().map(|t| t.definition()).collect()
    }

    /// Registered names in registration order.
    pub fn names(&self) -> Vec<&str> {
        self.tools.iter().map(|t| t.name()).collect()
    }

    pub fn has(&self, name: &str) -> bool {
        self.index.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.tools.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }
}
