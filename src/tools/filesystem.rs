//! Filesystem tools for Lapka
//!
//! This module provides tools for file system operations including reading,
//! writing, patching and listing files. Paths may start with `~`. Missing
//! files and similar conditions are reported as `❌` result text so the model
//! can recover; only malformed arguments produce an `Err`.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{json, Value};

use crate::error::Result;

use super::{expand_home, parse_args, Tool};

/// Files longer than this are shown as head + tail.
const FULL_VIEW_MAX_LINES: usize = 100;
const HEAD_LINES: usize = 50;
const TAIL_LINES: usize = 20;
/// Maximum entries shown by `list_dir`.
const MAX_DIR_ENTRIES: usize = 100;

/// Expand `~` and make the path absolute, resolving symlinks when it exists.
fn resolve_path(path: &str) -> PathBuf {
    let expanded = expand_home(path);
    std::fs::canonicalize(&expanded)
        .or_else(|_| std::path::absolute(&expanded))
        .unwrap_or(expanded)
}

/// Final path component used in result text.
fn display_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}

fn numbered(lines: &[&str], first_line: usize) -> String {
    lines
        .iter()
        .enumerate()
        .map(|(i, line)| format!("{}: {}", first_line + i, line))
        .collect::<Vec<_>>()
        .join("\n")
}

/// Human-readable size: bytes up to 1000, then K and M with one decimal.
fn format_size(size: u64) -> String {
    if size > 1_000_000 {
        format!("{:.1}M", size as f64 / 1_000_000.0)
    } else if size > 1000 {
        format!("{:.1}K", size as f64 / 1000.0)
    } else {
        format!("{}B", size)
    }
}

// ============================================================================
// read_file
// ============================================================================

#[derive(Debug, Deserialize)]
struct ReadFileArgs {
    path: String,
    #[serde(default)]
    start_line: Option<i64>,
    #[serde(default)]
    end_line: Option<i64>,
}

/// Tool for reading file contents with line numbers.
///
/// # Parameters
/// - `path`: The path to the file to read (required)
/// - `start_line`, `end_line`: 1-indexed inclusive range (optional)
pub struct ReadFileTool;

#[async_trait]
impl Tool for ReadFileTool {
    fn name(&self) -> &str {
        "read_file"
    }

    fn description(&self) -> &str {
        "Read a file content. Optionally specify line range."
    }

    fn parameters(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "path": {"type": "string", "description": "File path to read."},
                "start_line": {"type": "integer", "description": "Start line (1-indexed). Optional."},
                "end_line": {"type": "integer", "description": "End line (1-indexed, inclusive). Optional."}
            },
            "required": ["path"]
        })
    }

    async fn execute(&self, args: Value) -> Result<String> {
        let args: ReadFileArgs = parse_args(self.name(), args)?;
        let path = resolve_path(&args.path);

        let metadata = match tokio::fs::metadata(&path).await {
            Ok(m) => m,
            Err(_) => return Ok(format!("❌ File not found: {}", args.path)),
        };
        if !metadata.is_file() {
            return Ok(format!("❌ Not a file: {}", args.path));
        }

        let bytes = match tokio::fs::read(&path).await {
            Ok(b) => b,
            Err(e) => return Ok(format!("❌ Error reading file: {}", e)),
        };
        let text = String::from_utf8_lossy(&bytes);
        let lines: Vec<&str> = text.split('\n').collect();
        let total = lines.len();
        let name = display_name(&path);

        if args.start_line.is_some() || args.end_line.is_some() {
            let start = args.start_line.unwrap_or(1).max(1) as usize - 1;
            let end = args
                .end_line
                .map(|e| e.max(0) as usize)
                .unwrap_or(total)
                .min(total);
            let selected: &[&str] = if start < end { &lines[start..end] } else { &[] };
            return Ok(format!(
                "[{} lines {}-{} of {}]\n{}",
                name,
                start + 1,
                end,
                total,
                numbered(selected, start + 1)
            ));
        }

        if total > FULL_VIEW_MAX_LINES {
            let head = numbered(&lines[..HEAD_LINES], 1);
            let tail = numbered(&lines[total - TAIL_LINES..], total - TAIL_LINES + 1);
            return Ok(format!(
                "[{} — {} lines, showing head {} + tail {}]\n{}\n...\n{}",
                name, total, HEAD_LINES, TAIL_LINES, head, tail
            ));
        }

        Ok(format!("[{} — {} lines]\n{}", name, total, numbered(&lines, 1)))
    }
}

// ============================================================================
// write_file
// ============================================================================

#[derive(Debug, Deserialize)]
struct WriteFileArgs {
    path: String,
    content: String,
}

/// Tool for writing content to a file, creating parent directories.
pub struct WriteFileTool;

#[async_trait]
impl Tool for WriteFileTool {
    fn name(&self) -> &str {
        "write_file"
    }

    fn description(&self) -> &str {
        "Write content to a file. Creates parent dirs if needed."
    }

    fn parameters(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "path": {"type": "string", "description": "File path to write."},
                "content": {"type": "string", "description": "Content to write."}
            },
            "required": ["path", "content"]
        })
    }

    async fn execute(&self, args: Value) -> Result<String> {
        let args: WriteFileArgs = parse_args(self.name(), args)?;
        let path = resolve_path(&args.path);

        if let Some(parent) = path.parent() {
            if let Err(e) = tokio::fs::create_dir_all(parent).await {
                return Ok(format!("❌ Error writing file: {}", e));
            }
        }
        if let Err(e) = tokio::fs::write(&path, &args.content).await {
            return Ok(format!("❌ Error writing file: {}", e));
        }

        Ok(format!(
            "✓ Written {} chars to {}",
            args.content.chars().count(),
            display_name(&path)
        ))
    }
}

// ============================================================================
// patch_file
// ============================================================================

#[derive(Debug, Deserialize)]
struct PatchFileArgs {
    path: String,
    search: String,
    replace: String,
}

/// Tool for replacing one exact occurrence of a string in a file.
///
/// The search string must match exactly once; otherwise the file is left
/// untouched and the result explains why.
pub struct PatchFileTool;

#[async_trait]
impl Tool for PatchFileTool {
    fn name(&self) -> &str {
        "patch_file"
    }

    fn description(&self) -> &str {
        "Edit a file by replacing a search string with replacement. More token-efficient than rewriting the whole file."
    }

    fn parameters(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "path": {"type": "string", "description": "File path to edit."},
                "search": {"type": "string", "description": "Exact string to find."},
                "replace": {"type": "string", "description": "Replacement string."}
            },
            "required": ["path", "search", "replace"]
        })
    }

    async fn execute(&self, args: Value) -> Result<String> {
        let args: PatchFileArgs = parse_args(self.name(), args)?;
        let path = resolve_path(&args.path);

        if !path.exists() {
            return Ok(format!("❌ File not found: {}", args.path));
        }
        let text = match tokio::fs::read_to_string(&path).await {
            Ok(t) => t,
            Err(e) => return Ok(format!("❌ Error reading file: {}", e)),
        };
        let name = display_name(&path);

        let count = if args.search.is_empty() {
            0
        } else {
            text.matches(&args.search).count()
        };
        match count {
            0 => Ok(format!(
                "❌ Search string not found in {}. Check exact whitespace/content.",
                name
            )),
            1 => {
                let patched = text.replacen(&args.search, &args.replace, 1);
                if let Err(e) = tokio::fs::write(&path, patched).await {
                    return Ok(format!("❌ Error writing file: {}", e));
                }
                Ok(format!("✓ Patched {} (1 replacement)", name))
            }
            n => Ok(format!(
                "❌ Found {} occurrences in {}. Make the search string unique; file unchanged.",
                n, name
            )),
        }
    }
}

// ============================================================================
// list_dir
// ============================================================================

#[derive(Debug, Deserialize)]
struct ListDirArgs {
    path: String,
}

/// Tool for listing directory contents, directories first.
pub struct ListDirTool;

#[async_trait]
impl Tool for ListDirTool {
    fn name(&self) -> &str {
        "list_dir"
    }

    fn description(&self) -> &str {
        "List contents of a directory."
    }

    fn parameters(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "path": {"type": "string", "description": "Directory path."}
            },
            "required": ["path"]
        })
    }

    async fn execute(&self, args: Value) -> Result<String> {
        let args: ListDirArgs = parse_args(self.name(), args)?;
        let path = resolve_path(&args.path);

        let metadata = match tokio::fs::metadata(&path).await {
            Ok(m) => m,
            Err(_) => return Ok(format!("❌ Path not found: {}", args.path)),
        };
        if !metadata.is_dir() {
            return Ok(format!("❌ Not a directory: {}", args.path));
        }

        let mut reader = match tokio::fs::read_dir(&path).await {
            Ok(r) => r,
            Err(_) => return Ok(format!("❌ Permission denied: {}", args.path)),
        };

        // (is_dir, name, size)
        let mut entries: Vec<(bool, String, u64)> = Vec::new();
        while let Ok(Some(entry)) = reader.next_entry().await {
            let name = entry.file_name().to_string_lossy().into_owned();
            let meta = tokio::fs::metadata(entry.path()).await.ok();
            let is_dir = meta.as_ref().map(|m| m.is_dir()).unwrap_or(false);
            let size = meta.map(|m| m.len()).unwrap_or(0);
            entries.push((is_dir, name, size));
        }
        entries.sort_by(|a, b| {
            b.0.cmp(&a.0)
                .then_with(|| a.1.to_lowercase().cmp(&b.1.to_lowercase()))
        });

        let name = display_name(&path);
        if entries.is_empty() {
            return Ok(format!("[{}/] (empty)", name));
        }

        let lines: Vec<String> = entries
            .iter()
            .take(MAX_DIR_ENTRIES)
            .map(|(is_dir, entry_name, size)| {
                if *is_dir {
                    format!("  📁 {}/", entry_name)
                } else {
                    format!("  📄 {} ({})", entry_name, format_size(*size))
                }
            })
            .collect();

        let mut header = format!("[{}/] {} items", name, entries.len());
        if entries.len() > MAX_DIR_ENTRIES {
            header.push_str(&format!(" (showing first {})", MAX_DIR_ENTRIES));
        }
        Ok(format!("{}\n{}", header, lines.join("\n")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::tempdir;

    fn path_str(p: &Path) -> String {
        p.to_string_lossy().into_owned()
    }

    #[tokio::test]
    async fn test_read_file_small() {
        let dir = tempdir().unwrap();
        let file = dir.path().join("notes.txt");
        fs::write(&file, "alpha\nbeta").unwrap();

        let result = ReadFileTool
            .execute(json!({"path": path_str(&file)}))
            .await
            .unwrap();
        assert_eq!(result, "[notes.txt — 2 lines]\n1: alpha\n2: beta");
    }

    #[tokio::test]
    async fn test_read_file_range() {
        let dir = tempdir().unwrap();
        let file = dir.path().join("r.txt");
        fs::write(&file, "a\nb\nc\nd\ne").unwrap();

        let result = ReadFileTool
            .execute(json!({"path": path_str(&file), "start_line": 2, "end_line": 3}))
            .await
            .unwrap();
        assert_eq!(result, "[r.txt lines 2-3 of 5]\n2: b\n3: c");
    }

    #[tokio::test]
    async fn test_read_file_range_clamped() {
        let dir = tempdir().unwrap();
        let file = dir.path().join("r.txt");
        fs::write(&file, "a\nb\nc").unwrap();

        let result = ReadFileTool
            .execute(json!({"path": path_str(&file), "start_line": 2, "end_line": 99}))
            .await
            .unwrap();
        assert_eq!(result, "[r.txt lines 2-3 of 3]\n2: b\n3: c");
    }

    #[tokio::test]
    async fn test_read_file_long_shows_head_and_tail() {
        let dir = tempdir().unwrap();
        let file = dir.path().join("long.txt");
        let content: Vec<String> = (1..=150).map(|i| format!("row{}", i)).collect();
        fs::write(&file, content.join("\n")).unwrap();

        let result = ReadFileTool
            .execute(json!({"path": path_str(&file)}))
            .await
            .unwrap();
        assert!(result.starts_with("[long.txt — 150 lines, showing head 50 + tail 20]\n1: row1\n"));
        assert!(result.contains("50: row50\n...\n131: row131"));
        assert!(!result.contains("51: row51"));
        assert!(result.ends_with("150: row150"));
    }

    #[tokio::test]
    async fn test_read_file_not_found() {
        let result = ReadFileTool
            .execute(json!({"path": "/nonexistent/file.txt"}))
            .await
            .unwrap();
        assert_eq!(result, "❌ File not found: /nonexistent/file.txt");
    }

    #[tokio::test]
    async fn test_read_file_on_directory() {
        let dir = tempdir().unwrap();
        let result = ReadFileTool
            .execute(json!({"path": path_str(dir.path())}))
            .await
            .unwrap();
        assert!(result.starts_with("❌ Not a file:"));
    }

    #[tokio::test]
    async fn test_read_file_missing_path() {
        assert!(ReadFileTool.execute(json!({})).await.is_err());
    }

    #[tokio::test]
    async fn test_write_file_creates_parent_dirs() {
        let dir = tempdir().unwrap();
        let file = dir.path().join("a/b/c.txt");

        let result = WriteFileTool
            .execute(json!({"path": path_str(&file), "content": "héllo"}))
            .await
            .unwrap();
        assert_eq!(result, "✓ Written 5 chars to c.txt");
        assert_eq!(fs::read_to_string(&file).unwrap(), "héllo");
    }

    #[tokio::test]
    async fn test_write_file_missing_content() {
        let result = WriteFileTool.execute(json!({"path": "/tmp/x.txt"})).await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn test_patch_file_single_match() {
        let dir = tempdir().unwrap();
        let file = dir.path().join("p.rs");
        fs::write(&file, "fn main() { old(); }").unwrap();

        let result = PatchFileTool
            .execute(json!({"path": path_str(&file), "search": "old()", "replace": "new()"}))
            .await
            .unwrap();
        assert_eq!(result, "✓ Patched p.rs (1 replacement)");
        assert_eq!(fs::read_to_string(&file).unwrap(), "fn main() { new(); }");
    }

    #[tokio::test]
    async fn test_patch_file_not_found_text() {
        let dir = tempdir().unwrap();
        let file = dir.path().join("p.txt");
        fs::write(&file, "hello").unwrap();

        let result = PatchFileTool
            .execute(json!({"path": path_str(&file), "search": "bye", "replace": "x"}))
            .await
            .unwrap();
        assert_eq!(
            result,
            "❌ Search string not found in p.txt. Check exact whitespace/content."
        );
    }

    #[tokio::test]
    async fn test_patch_file_multiple_matches_untouched() {
        let dir = tempdir().unwrap();
        let file = dir.path().join("p.txt");
        fs::write(&file, "a a a").unwrap();

        let result = PatchFileTool
            .execute(json!({"path": path_str(&file), "search": "a", "replace": "b"}))
            .await
            .unwrap();
        assert!(result.starts_with("❌ Found 3 occurrences"));
        assert_eq!(fs::read_to_string(&file).unwrap(), "a a a");
    }

    #[tokio::test]
    async fn test_patch_file_missing_file() {
        let result = PatchFileTool
            .execute(json!({"path": "/nonexistent/p.txt", "search": "a", "replace": "b"}))
            .await
            .unwrap();
        assert_eq!(result, "❌ File not found: /nonexistent/p.txt");
    }

    #[tokio::test]
    async fn test_list_dir_sorted_dirs_first() {
        let dir = tempdir().unwrap();
        fs::create_dir(dir.path().join("zeta")).unwrap();
        fs::write(dir.path().join("Beta.txt"), "x".repeat(1500)).unwrap();
        fs::write(dir.path().join("alpha.txt"), "abc").unwrap();

        let result = ListDirTool
            .execute(json!({"path": path_str(dir.path())}))
            .await
            .unwrap();
        let lines: Vec<&str> = result.lines().collect();
        assert!(lines[0].ends_with("/] 3 items"));
        assert_eq!(lines[1], "  📁 zeta/");
        assert_eq!(lines[2], "  📄 alpha.txt (3B)");
        assert_eq!(lines[3], "  📄 Beta.txt (1.5K)");
    }

    #[tokio::test]
    async fn test_list_dir_empty() {
        let dir = tempdir().unwrap();
        let sub = dir.path().join("void");
        fs::create_dir(&sub).unwrap();

        let result = ListDirTool
            .execute(json!({"path": path_str(&sub)}))
            .await
            .unwrap();
        assert_eq!(result, "[void/] (empty)");
    }

    #[tokio::test]
    async fn test_list_dir_caps_entries() {
        let dir = tempdir().unwrap();
        for i in 0..105 {
            fs::write(dir.path().join(format!("f{:03}", i)), "").unwrap();
        }
        let result = ListDirTool
            .execute(json!({"path": path_str(dir.path())}))
            .await
            .unwrap();
        assert!(result.lines().next().unwrap().ends_with("105 items (showing first 100)"));
        assert_eq!(result.lines().count(), 101);
    }

    #[tokio::test]
    async fn test_list_dir_errors() {
        let result = ListDirTool
            .execute(json!({"path": "/nonexistent/dir"}))
            .await
            .unwrap();
        assert_eq!(result, "❌ Path not found: /nonexistent/dir");

        let dir = tempdir().unwrap();
        let file = dir.path().join("f.txt");
        fs::write(&file, "").unwrap();
        let result = ListDirTool
            .execute(json!({"path": path_str(&file)}))
            .await
            .unwrap();
        assert!(result.starts_with("❌ Not a directory:"));
    }

    #[test]
    fn test_format_size() {
        assert_eq!(format_size(0), "0B");
        assert_eq!(format_size(1000), "1000B");
        assert_eq!(format_size(1500), "1.5K");
        assert_eq!(format_size(2_500_000), "2.5M");
    }
}
