//! Shell tool for Lapka
//!
//! Runs a command through `sh -c` with a substring blocklist, a timeout and
//! output compression so long listings do not flood the context.

use std::process::Stdio;
use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{json, Value};
use tokio::process::Command;
use tracing::{debug, warn};

use crate::error::Result;
use crate::utils::string::truncate_with_total;

use super::{expand_home, parse_args, Tool};

/// Patterns refused when no blocklist is configured.
pub const DEFAULT_BLOCKED_COMMANDS: &[&str] = &[
    "rm -rf /",
    "rm -rf /*",
    "mkfs",
    "dd if=",
    ":(){:|:&};:",
    "chmod -R 777 /",
    "shutdown",
    "reboot",
    "init 0",
    "init 6",
];

/// Default command timeout in seconds.
pub const DEFAULT_TIMEOUT_SECS: u64 = 30;

const STDOUT_BUDGET: usize = 2000;
const STDERR_BUDGET: usize = 500;
const HEAD_LINES: usize = 10;
const TAIL_LINES: usize = 20;

#[derive(Debug, Deserialize)]
struct BashArgs {
    command: String,
    #[serde(default)]
    working_directory: Option<String>,
    #[serde(default)]
    timeout: Option<u64>,
    #[serde(default)]
    blocked_commands: Option<Vec<String>>,
}

/// Tool for executing shell commands.
///
/// # Parameters
/// - `command`: The shell command to execute (required)
/// - `working_directory`, `timeout`, `blocked_commands`: filled in by the
///   agent from configuration when the model leaves them out
///
/// # Example
/// ```rust
/// use lapka::tools::{BashTool, Tool};
/// use serde_json::json;
///
/// # tokio_test::block_on(async {
/// let result = BashTool.execute(json!({"command": "echo hello"})).await.unwrap();
/// assert_eq!(result, "hello");
/// # });
/// ```
pub struct BashTool;

/// Whether `command` contains any blocklisted pattern, case-insensitively.
pub fn is_blocked<S: AsRef<str>>(command: &str, blocklist: &[S]) -> bool {
    let lowered = command.trim().to_lowercase();
    blocklist
        .iter()
        .any(|pattern| lowered.contains(&pattern.as_ref().to_lowercase()))
}

/// Shorten long output.
///
/// Output within `max_chars` is returned unchanged. Longer output keeps the
/// first 10 and last 20 lines when it has more than 30 lines, and is cut at
/// `max_chars` characters otherwise.
pub fn compress_output(text: &str, max_chars: usize) -> String {
    if text.chars().count() <= max_chars {
        return text.to_string();
    }

    let lines: Vec<&str> = text.split('\n').collect();
    if lines.len() <= HEAD_LINES + TAIL_LINES {
        return truncate_with_total(text, max_chars);
    }

    let head = lines[..HEAD_LINES].join("\n");
    let tail = lines[lines.len() - TAIL_LINES..].join("\n");
    format!(
        "{}\n... ({} lines total, showing head {} + tail {}) ...\n{}",
        head,
        lines.len(),
        HEAD_LINES,
        TAIL_LINES,
        tail
    )
}

#[async_trait]
impl Tool for BashTool {
    fn name(&self) -> &str {
        "bash"
    }

    fn description(&self) -> &str {
        "Execute a shell command. Returns stdout/stderr."
    }

    fn parameters(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "command": {
                    "type": "string",
                    "description": "Shell command to execute."
                }
            },
            "required": ["command"]
        })
    }

    async fn execute(&self, args: Value) -> Result<String> {
        let args: BashArgs = parse_args(self.name(), args)?;
        let command = args.command;
        let timeout_secs = args.timeout.unwrap_or(DEFAULT_TIMEOUT_SECS);

        let blocked = match args.blocked_commands {
            Some(list) if !list.is_empty() => is_blocked(&command, &list),
            _ => is_blocked(&command, DEFAULT_BLOCKED_COMMANDS),
        };
        if blocked {
            warn!(command = %command, "Blocked shell command");
            return Ok(format!("⛔ BLOCKED: '{}' matches safety blocklist.", command));
        }

        let workdir = expand_home(args.working_directory.as_deref().unwrap_or("."));
        debug!(command = %command, workdir = %workdir.display(), "Running shell command");

        let mut cmd = Command::new("sh");
        cmd.arg("-c")
            .arg(&command)
            .current_dir(&workdir)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        // Own process group, so a timeout reaches background children too.
        #[cfg(unix)]
        cmd.process_group(0);

        let child = match cmd.spawn() {
            Ok(child) => child,
            Err(e) => return Ok(format!("❌ ERROR: {}", e)),
        };
        let pid = child.id();

        let output = match tokio::time::timeout(
            Duration::from_secs(timeout_secs),
            child.wait_with_output(),
        )
        .await
        {
            Ok(Ok(output)) => output,
            Ok(Err(e)) => return Ok(format!("❌ ERROR: {}", e)),
            Err(_) => {
                kill_process_group(pid);
                warn!(command = %command, timeout_secs, "Shell command timed out");
                return Ok(format!("⏰ TIMEOUT after {}s: '{}'", timeout_secs, command));
            }
        };

        let stdout = String::from_utf8_lossy(&output.stdout);
        let stderr = String::from_utf8_lossy(&output.stderr);
        let stdout = stdout.trim();
        let stderr = stderr.trim();

        let mut parts = Vec::new();
        match output.status.code() {
            Some(0) => {}
            Some(code) => parts.push(format!("exit code: {}", code)),
            None => parts.push("exit code: -1".to_string()),
        }
        if !stdout.is_empty() {
            parts.push(compress_output(stdout, STDOUT_BUDGET));
        }
        if !stderr.is_empty() {
            parts.push(format!("stderr: {}", compress_output(stderr, STDERR_BUDGET)));
        }
        if parts.is_empty() {
            parts.push("✓ (no output)".to_string());
        }

        Ok(parts.join("\n"))
    }
}

/// SIGKILL every process in the group led by `pid`.
#[cfg(unix)]
fn kill_process_group(pid: Option<u32>) {
    let Some(pgid) = pid.and_then(|p| libc::pid_t::try_from(p).ok()) else {
        return;
    };
    // SAFETY: killpg only sends a signal; the group was created at spawn.
    if unsafe { libc::killpg(pgid, libc::SIGKILL) } != 0 {
        debug!(pgid, error = %std::io::Error::last_os_error(), "killpg failed");
    }
}

#[cfg(not(unix))]
fn kill_process_group(_pid: Option<u32>) {}
