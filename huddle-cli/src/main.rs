//! Huddle CLI - Command line interface for Huddle
//!
//! Turn-based group chats between Claude-backed agents and a human.

mod commands;

use clap::{Parser, Subcommand};
use huddle_core::Config;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use commands::{ChatArgs, RosterArgs};

/// Huddle: turn-based multi-agent group chat
#[derive(Parser, Debug)]
#[command(name = "huddle")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Path to claude executable (overrides config and env)
    #[arg(long, global = true, env = "HUDDLE_CLAUDE_PATH")]
    claude_path: Option<String>,

    /// Model for advanced-tier agents (overrides config and env)
    #[arg(long, global = true, env = "HUDDLE_MODEL")]
    model: Option<String>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Show version information
    Version,

    /// Run a group chat from a roster file
    #[command(visible_alias = "c")]
    Chat(ChatArgs),

    /// Validate a roster file and show its speaking order
    Roster(RosterArgs),

    /// Show current configuration
    Config,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing on stderr
    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();

    if cli.verbose {
        tracing::info!("Verbose mode enabled");
    }

    let config = Config::load_with_overrides(cli.claude_path.clone(), cli.model.clone())?;

    if cli.verbose {
        tracing::info!(
            claude_path = %config.model.claude_path,
            model = ?config.model.advanced,
            rounds = config.chat.rounds,
            "Configuration loaded"
        );
    }

    match cli.command {
        Some(Commands::Version) => {
            println!("huddle {}", env!("CARGO_PKG_VERSION"));
        }
        Some(Commands::Chat(args)) => {
            args.execute(cli.verbose, &config).await?;
        }
        Some(Commands::Roster(args)) => {
            args.execute(&config)?;
        }
        Some(Commands::Config) => {
            println!("Huddle Configuration");
            println!("====================");
            println!();
            println!("Model Settings:");
            println!("  claude_path: {}", config.model.claude_path);
            println!("  advanced: {}", config.model.advanced.as_deref().unwrap_or("(default)"));
            println!("  basic: {}", config.model.basic.as_deref().unwrap_or("(same as advanced)"));
            println!();
            println!("Chat Settings:");
            println!("  rounds: {}", config.chat.rounds);
            println!("  stop_phrase: {}", config.chat.stop_phrase);
            println!("  topology: {}", config.chat.topology);
            println!();
            println!("Human Input:");
            match config.human.input_timeout {
                Some(timeout) => println!("  input_timeout: {}s", timeout.as_secs()),
                None => println!("  input_timeout: (none)"),
            }
            println!();
            if let Some(path) = Config::default_config_path() {
                println!("Config file: {}", path.display());
                if path.exists() {
                    println!("  (exists)");
                } else {
                    println!("  (not found - using defaults)");
                }
            }
        }
        None => {
            println!("Huddle - turn-based multi-agent group chat");
            println!();
            println!("Use --help for usage information");
        }
    }

    Ok(())
}
