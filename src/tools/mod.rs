//! Tools module - Tool definitions and execution for LLM function calling
//!
//! This module provides the infrastructure for defining and executing tools
//! the model can call during a turn.
//!
//! # Overview
//!
//! - `Tool` trait: The interface that all tools must implement
//! - `ToolRegistry`: Ordered registry that dispatches calls and turns every
//!   failure into result text
//!
//! # Built-in Tools
//!
//! - `BashTool`: Execute shell commands
//! - `ReadFileTool`: Read file contents with line numbers
//! - `WriteFileTool`: Write content to a file
//! - `PatchFileTool`: Replace one exact occurrence in a file
//! - `ListDirTool`: List directory contents
//! - `HttpRequestTool`: Perform an HTTP request
//!
//! # Example
//!
//! ```rust
//! use lapka::tools::builtin_registry;
//! use serde_json::json;
//!
//! # tokio_test::block_on(async {
//! let registry = builtin_registry();
//! assert_eq!(registry.len(), 6);
//!
//! let result = registry.execute("bash", json!({"command": "echo Hello!"})).await;
//! assert_eq!(result, "Hello!");
//! # });
//! ```

pub mod filesystem;
pub mod http_request;
mod registry;
pub mod shell;
mod types;

pub use filesystem::{ListDirTool, PatchFileTool, ReadFileTool, WriteFileTool};
pub use http_request::HttpRequestTool;
pub use registry::{unknown_tool_message, ToolRegistry};
pub use shell::BashTool;
pub use types::{expand_home, parse_args, Tool};

/// Registry holding the six built-in tools in advertisement order.
pub fn builtin_registry() -> ToolRegistry {
    ToolRegistry::new()
        .with_tool(BashTool)
        .with_tool(ReadFileTool)
        .with_tool(WriteFileTool)
        .with_tool(PatchFileTool)
        .with_tool(ListDirTool)
        .with_tool(HttpRequestTool::new())
}
