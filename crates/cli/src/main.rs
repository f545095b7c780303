//! StudyHall CLI: the main entry point.
//!
//! Commands:
//! - `decide`: Show whether and how the assistant would respond
//! - `ask`:    Run a message through the full pipeline and print the reply
//! - `config`: Show, validate or locate the configuration

use std::path::PathBuf;

use clap::{Parser, Subcommand};

mod commands;

#[derive(Parser)]
#[command(
    name = "studyhall",
    about = "StudyHall: response orchestration for an AI study assistant",
    version,
    author
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Read configuration from this file instead of ~/.studyhall/config.toml
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Print the decision and priority for a message, without calling a model
    Decide {
        /// The incoming message
        text: String,

        /// Number of people in the thread
        #[arg(short, long, default_value_t = 1)]
        participants: usize,

        /// JSON file with the thread's recent messages, oldest first
        #[arg(long)]
        history: Option<PathBuf>,
    },

    /// Send a message through decision, queue, completion and delivery
    Ask {
        /// The incoming message
        text: String,

        /// Number of people in the thread
        #[arg(short, long, default_value_t = 1)]
        participants: usize,

        /// Learner level used to tailor the reply
        #[arg(short, long)]
        level: Option<String>,
    },

    /// Configuration management
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Subcommand)]
enum ConfigAction {
    /// Print the effective configuration as TOML
    Show,
    /// Check the configuration for errors
    Validate,
    /// Print the default config file path
    Path,
    /// Print a config file with every default filled in
    Init,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let filter = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(filter)),
        )
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let config_path = cli.config.as_deref();
    match cli.command {
        Commands::Decide {
            text,
            participants,
            history,
        } => commands::decide::run(config_path, &text, participants, history.as_deref())?,
        Commands::Ask {
            text,
            participants,
            level,
        } => commands::ask::run(config_path, &text, participants, level).await?,
        Commands::Config { action } => match action {
            ConfigAction::Show => commands::config_cmd::show(config_path)?,
            ConfigAction::Validate => commands::config_cmd::validate(config_path)?,
            ConfigAction::Path => commands::config_cmd::path(),
            ConfigAction::Init => commands::config_cmd::init(),
        },
    }

    Ok(())
}
