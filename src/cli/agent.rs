//! Agent command handler (interactive REPL + one-shot message).

use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::warn;

use lapka::agent::Agent;
use lapka::config::Config;
use lapka::tools::builtin_registry;

const DIM: &str = "\x1b[2m";
const BOLD: &str = "\x1b[1m";
const CYAN: &str = "\x1b[36m";
const RED: &str = "\x1b[31m";
const RESET: &str = "\x1b[0m";

/// REPL commands.
#[derive(Debug, PartialEq, Eq)]
enum ReplCommand {
    Quit,
    Reset,
    Stats,
    Compact,
    Save,
    Message,
}

fn parse_repl_command(input: &str) -> ReplCommand {
    match input {
        "/quit" | "/exit" | "/q" => ReplCommand::Quit,
        "/reset" => ReplCommand::Reset,
        "/stats" => ReplCommand::Stats,
        "/compact" => ReplCommand::Compact,
        "/save" => ReplCommand::Save,
        _ => ReplCommand::Message,
    }
}

fn print_progress(line: &str) {
    eprintln!("{}{}{}", DIM, line, RESET);
}

fn read_image(path: &Path) -> Result<String> {
    let bytes =
        std::fs::read(path).with_context(|| format!("Failed to read image {}", path.display()))?;
    Ok(STANDARD.encode(bytes))
}

/// Interactive or single-message agent mode.
pub(crate) async fn cmd_agent(
    config: Config,
    message: Option<String>,
    image: Option<PathBuf>,
    session: Option<String>,
) -> Result<()> {
    if !config.has_api_key() {
        bail!(
            "No API key configured. Set LAPKA_API_KEY or add \"api_key\" to {}",
            Config::path().display()
        );
    }

    let tools = Arc::new(builtin_registry());
    let mut agent = Agent::from_config(&config, tools).with_context(|| "Failed to create agent")?;

    if let Some(id) = &session {
        if agent.resume(id).await {
            lapka::log_component!(info, "cli", "Session resumed", session = id.as_str());
            print_progress(&format!("Resumed session {}: {}", id, agent.stats()));
        }
    }

    if let Some(msg) = message {
        let image_b64 = image.as_deref().map(read_image).transpose()?;
        let answer = agent
            .run(&msg, Some(&print_progress), image_b64.as_deref())
            .await;
        if let Some(id) = &session {
            agent.save(id).await?;
        }
        println!("{}", answer?);
        agent.close();
        return Ok(());
    }

    let session_id = session
        .clone()
        .unwrap_or_else(|| uuid::Uuid::new_v4().to_string());

    println!("{}Lapka{} {}", BOLD, RESET, env!("CARGO_PKG_VERSION"));
    println!(
        "{}model: {} | /reset /stats /compact /save /quit{}",
        DIM, config.model, RESET
    );
    println!();

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        print!("{}> {}", CYAN, RESET);
        io::stdout().flush()?;

        let Some(line) = lines.next_line().await? else {
            println!();
            break;
        };
        let input = line.trim();
        if input.is_empty() {
            continue;
        }

        match parse_repl_command(input) {
            ReplCommand::Quit => break,
            ReplCommand::Reset => {
                agent.reset();
                println!("{}Context cleared.{}", DIM, RESET);
            }
            ReplCommand::Stats => println!("{}{}{}", DIM, agent.stats(), RESET),
            ReplCommand::Compact => match agent.compact().await {
                Ok(()) => println!("{}Compacted. {}{}", DIM, agent.stats(), RESET),
                Err(e) => eprintln!("{}Compaction failed: {}{}", RED, e, RESET),
            },
            ReplCommand::Save => match agent.save(&session_id).await {
                Ok(Some(path)) => println!(
                    "{}Saved to {} (resume with --session {}){}",
                    DIM,
                    path.display(),
                    session_id,
                    RESET
                ),
                Ok(None) => println!("{}Nothing to save.{}", DIM, RESET),
                Err(e) => eprintln!("{}Save failed: {}{}", RED, e, RESET),
            },
            ReplCommand::Message => {
                match agent.run(input, Some(&print_progress), None).await {
                    Ok(answer) => {
                        println!();
                        println!("{}", answer);
                        println!();
                    }
                    Err(e) => {
                        eprintln!("{}Error: {}{}", RED, e, RESET);
                        eprintln!();
                    }
                }
                if let Some(id) = &session {
                    if let Err(e) = agent.save(id).await {
                        warn!(session = %id, error = %e, "Failed to save session");
                    }
                }
            }
        }
    }

    agent.close();
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_repl_command() {
        assert_eq!(parse_repl_command("/q"), ReplCommand::Quit);
        assert_eq!(parse_repl_command("/exit"), ReplCommand::Quit);
        assert_eq!(parse_repl_command("/quit"), ReplCommand::Quit);
        assert_eq!(parse_repl_command("/reset"), ReplCommand::Reset);
        assert_eq!(parse_repl_command("/stats"), ReplCommand::Stats);
        assert_eq!(parse_repl_command("/compact"), ReplCommand::Compact);
        assert_eq!(parse_repl_command("/save"), ReplCommand::Save);
        assert_eq!(parse_repl_command("list files"), ReplCommand::Message);
        assert_eq!(parse_repl_command("/unknown"), ReplCommand::Message);
    }

    #[test]
    fn test_read_image_encodes_base64() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("pixel.jpg");
        std::fs::write(&path, [0xFFu8, 0xD8, 0xFF]).unwrap();
        assert_eq!(read_image(&path).unwrap(), "/9j/");
    }

    #[test]
    fn test_read_image_missing() {
        assert!(read_image(Path::new("/nonexistent/x.jpg")).is_err());
    }
}
