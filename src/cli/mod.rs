//! CLI module: command parsing and dispatch
//!
//! All CLI logic lives here. `main.rs` calls `cli::run()`.

pub mod agent;

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};

use lapka::config::Config;

#[derive(Parser)]
#[command(name = "lapka")]
#[command(version)]
#[command(about = "Ultra-lightweight task-execution AI agent", long_about = None)]
struct Cli {
    /// Config file (default: ~/.lapka/config.json)
    #[arg(long, global = true, value_name = "PATH")]
    config: Option<PathBuf>,
    /// Override the main model
    #[arg(long, global = true)]
    model: Option<String>,
    /// Override the chat-completions base URL
    #[arg(long, global = true, value_name = "URL")]
    api_base: Option<String>,
    /// Log at debug level
    #[arg(short, long, global = true)]
    verbose: bool,
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Start interactive agent mode (default)
    Agent {
        /// Direct message to process (non-interactive mode)
        #[arg(short, long)]
        message: Option<String>,
        /// JPEG image attached to the message
        #[arg(long, value_name = "PATH", requires = "message")]
        image: Option<PathBuf>,
        /// Resume and save the conversation under this session id
        #[arg(long, value_name = "ID")]
        session: Option<String>,
    },
    /// Show version information
    Version,
}

pub async fn run() -> Result<()> {
    let cli = Cli::parse();

    if let Some(Commands::Version) = cli.command {
        cmd_version();
        return Ok(());
    }

    let mut config = match &cli.config {
        Some(path) => Config::load_from_path(path),
        None => Config::load(),
    }
    .with_context(|| "Failed to load configuration")?;

    if let Some(model) = cli.model {
        config.model = model;
    }
    if let Some(api_base) = cli.api_base {
        config.api_base = api_base;
    }
    if cli.verbose {
        config.logging.level = "debug".to_string();
    }

    if let Err(e) = lapka::utils::init_logging(&config.logging) {
        eprintln!("Warning: {}", e);
    }

    config.validate().with_context(|| "Invalid configuration")?;

    match cli.command {
        Some(Commands::Agent {
            message,
            image,
            session,
        }) => agent::cmd_agent(config, message, image, session).await,
        Some(Commands::Version) => Ok(()),
        None => agent::cmd_agent(config, None, None, None).await,
    }
}

fn cmd_version() {
    println!("lapka {}", env!("CARGO_PKG_VERSION"));
    println!();
    println!("Ultra-lightweight task-execution AI agent");
}
