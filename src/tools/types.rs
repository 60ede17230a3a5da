//! Tool contract for Lapka
//!
//! A tool declares a unique name, a description and a JSON-schema parameter
//! description that only the model reads. Arguments arrive as untrusted JSON;
//! each tool decodes them into its own argument struct with [`parse_args`].

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::error::{LapkaError, Result};
use crate::providers::ToolDefinition;

/// A capability the model can call.
///
/// Implementations should report ordinary failures (missing file, non-zero
/// exit) as text in `Ok`; an `Err` is turned into a `❌ Tool error: ...`
/// result by the registry.
///
/// # Example
/// ```
/// use async_trait::async_trait;
/// use lapka::error::Result;
/// use lapka::tools::{parse_args, Tool};
/// use serde::Deserialize;
/// use serde_json::{json, Value};
///
/// #[derive(Deserialize)]
/// struct EchoArgs {
///     message: String,
/// }
///
/// struct EchoTool;
///
/// #[async_trait]
/// impl Tool for EchoTool {
///     fn name(&self) -> &str {
///         "echo"
///     }
///
///     fn description(&self) -> &str {
///         "Echo the message back"
///     }
///
///     fn parameters(&self) -> Value {
///         json!({
///             "type": "object",
///             "properties": {"message": {"type": "string"}},
///             "required": ["message"]
///         })
///     }
///
///     async fn execute(&self, args: Value) -> Result<String> {
///         let args: EchoArgs = parse_args(self.name(), args)?;
///         Ok(args.message)
///     }
/// }
///
/// # tokio_test::block_on(async {
/// let out = EchoTool.execute(json!({"message": "hi"})).await.unwrap();
/// assert_eq!(out, "hi");
/// # });
/// ```
#[async_trait]
pub trait Tool: Send + Sync {
    /// Unique registry key.
    fn name(&self) -> &str;

    /// Human-readable description shown to the model.
    fn description(&self) -> &str;

    /// JSON Schema of the parameters.
    fn parameters(&self) -> Value;

    /// Run the tool.
    async fn execute(&self, args: Value) -> Result<String>;

    /// Definition advertised to the model.
    fn definition(&self) -> ToolDefinition {
        ToolDefinition::new(self.name(), self.description(), self.parameters())
    }
}

/// Decode untrusted JSON arguments into a typed argument struct.
///
/// Missing required fields and wrong types become [`LapkaError::Tool`].
pub fn parse_args<T: DeserializeOwned>(tool: &str, args: Value) -> Result<T> {
    serde_json::from_value(args)
        .map_err(|e| LapkaError::Tool(format!("invalid arguments for {}: {}", tool, e)))
}

/// Expand a leading `~` to the home directory.
pub fn expand_home(path: &str) -> std::path::PathBuf {
    if path == "~" {
        if let Some(home) = dirs::home_dir() {
            return home;
        }
    } else if let Some(rest) = path.strip_prefix("~/") {
        if let Some(home) = dirs::home_dir() {
            return home.join(rest);
        }
    }
    std::path::PathBuf::from(path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;
    use serde_json::json;

    #[derive(Debug, Deserialize)]
    struct Args {
        path: String,
        #[serde(default)]
        start_line: Option<usize>,
    }

    #[test]
    fn test_parse_args_ok() {
        let args: Args = parse_args("read_file", json!({"path": "a.txt", "start_line": 3})).unwrap();
        assert_eq!(args.path, "a.txt");
        assert_eq!(args.start_line, Some(3));
    }

    #[test]
    fn test_parse_args_missing_field() {
        let err = parse_args::<Args>("read_file", json!({})).unwrap_err();
        assert!(matches!(err, LapkaError::Tool(_)));
        assert!(err.to_string().contains("read_file"));
        assert!(err.to_string().contains("path"));
    }

    #[test]
    fn test_parse_args_wrong_type() {
        let err = parse_args::<Args>("read_file", json!({"path": 42})).unwrap_err();
        assert!(matches!(err, LapkaError::Tool(_)));
    }

    #[test]
    fn test_expand_home() {
        assert_eq!(expand_home("/tmp/x"), std::path::PathBuf::from("/tmp/x"));
        assert_eq!(expand_home("rel/x"), std::path::PathBuf::from("rel/x"));
        if let Some(home) = dirs::home_dir() {
            assert_eq!(expand_home("~/notes"), home.join("notes"));
            assert_eq!(expand_home("~"), home);
        }
    }
}
