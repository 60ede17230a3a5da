//! Guard against literal-range string slices in `src/`.
//!
//! Tool output and model text are arbitrary UTF-8, so `text[..80]` can panic
//! on a character boundary. Shortening goes through `utils::string` instead.
//! Only numeric literal ranges are flagged; `&buf[..n]` is left alone.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::Context;
use regex::Regex;

fn collect_sources(dir: &Path, out: &mut Vec<PathBuf>) -> anyhow::Result<()> {
    for entry in fs::read_dir(dir).with_context(|| format!("read_dir failed: {}", dir.display()))? {
        let path = entry?.path();
        if path.is_dir() {
            collect_sources(&path, out)?;
        } else if path.extension().is_some_and(|ext| ext == "rs") {
            out.push(path);
        }
    }
    Ok(())
}

#[test]
fn no_literal_range_string_slices() -> anyhow::Result<()> {
    let src = Path::new(env!("CARGO_MANIFEST_DIR")).join("src");

    // `[..80]`, `[0..80]`, `[3..]`
    let patterns = [
        Regex::new(r"\[\s*\d*\s*\.\.\s*\d+\s*\]")?,
        Regex::new(r"\[\s*\d+\s*\.\.\s*\]")?,
    ];

    let mut files = Vec::new();
    collect_sources(&src, &mut files)?;

    let mut offenders = Vec::new();
    for path in files {
        let text = fs::read_to_string(&path)
            .with_context(|| format!("failed to read {}", path.display()))?;
        for (i, line) in text.lines().enumerate() {
            let code = line.trim_start();
            if code.starts_with("//") {
                continue;
            }
            if patterns.iter().any(|re| re.is_match(code)) {
                offenders.push(format!("{}:{}: {}", path.display(), i + 1, code));
            }
        }
    }

    anyhow::ensure!(
        offenders.is_empty(),
        "Found literal-range slices in source files:\n{}",
        offenders.join("\n")
    );
    Ok(())
}
