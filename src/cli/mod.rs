//! CLI module for Concierge
//!
//! Command-line front end over the [`Orchestrator`](crate::orchestrator::Orchestrator).
//!
//! # Commands
//!
//! - `chat` - Ask the concierge a question
//! - `embed` - Embed a piece of text
//! - `analyze` - Extract fields from a document URL
//! - `config` - Configuration utilities (init)
//! - `completions` - Generate shell completions
//!
//! # Example
//!
//! ```bash
//! # Ask a lending question
//! concierge chat "What documents do I need for a refinance?" --division lending
//!
//! # Continue a conversation
//! concierge chat "And the down payment?" --division lending --history turns.json
//!
//! # Read a pay stub
//! concierge analyze https://files.example.com/stub.pdf --kind pay-stub --mime application/pdf
//!
//! # Generate shell completions
//! concierge completions bash > ~/.bash_completion.d/concierge
//! ```

pub mod analyze;
pub mod chat;
pub mod completions;
pub mod config;
pub mod embed;
pub mod output;

pub use completions::handle_completions;
pub use config::handle_config_init;

use crate::config::{ConciergeConfig, ConfigError};
use crate::orchestrator::{Division, DocumentKind};
use clap::{Args, Parser, Subcommand};
use std::path::{Path, PathBuf};

/// Concierge - resilient AI front desk
#[derive(Parser, Debug)]
#[command(
    name = "concierge",
    version,
    about = "Resilient AI request orchestration for client conversations"
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Send a chat message through the fallback chain
    Chat(ChatArgs),
    /// Embed text with the configured embedding model
    Embed(EmbedArgs),
    /// Extract structured fields from a document
    Analyze(AnalyzeArgs),
    /// Configuration utilities
    #[command(subcommand)]
    Config(ConfigCommands),
    /// Generate shell completions
    Completions(CompletionsArgs),
}

/// Options shared by every command that talks to a provider.
#[derive(Args, Debug, Clone)]
pub struct CommonArgs {
    /// Path to configuration file (defaults apply when it does not exist)
    #[arg(short, long, default_value = "concierge.toml")]
    pub config: PathBuf,

    /// Set log level (trace, debug, info, warn, error)
    #[arg(short, long, env = "CONCIERGE_LOG_LEVEL")]
    pub log_level: Option<String>,

    /// Output as JSON
    #[arg(long)]
    pub json: bool,
}

#[derive(Args, Debug)]
pub struct ChatArgs {
    /// Message from the client
    pub message: String,

    /// Business division (lending, investment, real-estate, none)
    #[arg(short, long, default_value = "none")]
    pub division: Division,

    /// Conversation stage, e.g. "pre-qualification"
    #[arg(short, long)]
    pub stage: Option<String>,

    /// Answer as if the user were staff
    #[arg(long)]
    pub admin: bool,

    /// JSON file with prior turns: [{"role": "user", "content": "..."}, ...]
    #[arg(long, value_name = "FILE")]
    pub history: Option<PathBuf>,

    /// Print call metrics (Prometheus exposition and a summary table)
    #[arg(long)]
    pub metrics: bool,

    #[command(flatten)]
    pub common: CommonArgs,
}

#[derive(Args, Debug)]
pub struct EmbedArgs {
    /// Text to embed
    pub text: String,

    #[command(flatten)]
    pub common: CommonArgs,
}

#[derive(Args, Debug)]
pub struct AnalyzeArgs {
    /// Document URL (image or PDF)
    pub url: String,

    /// Document type hint (bank-statement, pay-stub, tax-return, identification, property-appraisal, other)
    #[arg(short, long, default_value = "other")]
    pub kind: DocumentKind,

    /// MIME type, e.g. application/pdf
    #[arg(short, long)]
    pub mime: Option<String>,

    #[command(flatten)]
    pub common: CommonArgs,
}

#[derive(Subcommand, Debug)]
pub enum ConfigCommands {
    /// Initialize a new configuration file
    Init(ConfigInitArgs),
}

#[derive(Args, Debug)]
pub struct ConfigInitArgs {
    /// Output file path
    #[arg(short, long, default_value = "concierge.toml")]
    pub output: PathBuf,

    /// Overwrite existing file
    #[arg(short, long)]
    pub force: bool,
}

#[derive(Args, Debug)]
pub struct CompletionsArgs {
    /// Shell to generate completions for
    #[arg(value_enum)]
    pub shell: clap_complete::Shell,
}

/// Resolve configuration: file (when present) < env < CLI flags, then validate.
pub fn load_config(path: &Path, log_level: Option<&str>) -> Result<ConciergeConfig, ConfigError> {
    let file = path.exists().then_some(path);
    let mut config = ConciergeConfig::load(file)?.with_env_overrides();

    if let Some(level) = log_level {
        config.logging.level = level.to_string();
    }

    config.validate()?;
    Ok(config)
}
