//! CLI commands implementation.
//!
//! This module contains the CLI parser and dispatches to command-specific modules.

mod extract;
mod models;
mod state;

use std::path::PathBuf;

use clap::{Parser, Subcommand};

use crate::config::{Config, ExtractArgs, LlmOverrides};
use crate::llm::LlmProvider;

#[derive(Parser)]
#[command(name = "docextract")]
#[command(about = "Extract structured fields from a directory of documents with an LLM")]
#[command(version)]
pub struct Cli {
    /// Config file path (overrides auto-discovery)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// LLM provider: openai (any OpenAI-compatible API) or ollama
    #[arg(long, value_enum, global = true)]
    provider: Option<LlmProvider>,

    /// LLM API endpoint (e.g., https://api.lambdalabs.com/v1)
    #[arg(long, visible_alias = "url", global = true)]
    endpoint: Option<String>,

    /// API key for OpenAI-compatible providers
    #[arg(long, visible_alias = "token", global = true)]
    api_key: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

/// Check if verbose mode is enabled (for early logging setup).
pub fn is_verbose() -> bool {
    std::env::args().any(|arg| arg == "-v" || arg == "--verbose")
}

#[derive(Subcommand)]
enum Commands {
    /// Extract fields from every new document in a directory
    Extract {
        /// Directory where the documents are located
        #[arg(short, long)]
        dir: Option<PathBuf>,
        /// Text file with the base prompt
        #[arg(short, long)]
        base_prompt_file: Option<PathBuf>,
        /// Comma-separated list of fields the LLM must return
        #[arg(short, long)]
        fields: Option<String>,
        /// Model to use for generation
        #[arg(short, long)]
        model: Option<String>,
        /// Document extension to process (default: pdf)
        #[arg(short, long)]
        extension: Option<String>,
        /// CSV output path (default: all.csv)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// List the models available from the LLM service
    Models,

    /// Show processed, failed and pending documents for a directory
    Status {
        /// Directory where the documents are located
        #[arg(short, long)]
        dir: Option<PathBuf>,
        /// Document extension to count as pending (default: pdf)
        #[arg(short, long)]
        extension: Option<String>,
    },

    /// Rewrite the CSV export from saved state without processing documents
    Export {
        /// Directory where the documents are located
        #[arg(short, long)]
        dir: Option<PathBuf>,
        /// Comma-separated list of fields (export column order)
        #[arg(short, long)]
        fields: Option<String>,
        /// CSV output path (default: all.csv)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Check if required text extraction tools are installed
    Check,
}

pub async fn run() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let config = match cli.config {
        Some(ref path) => Config::load_from_path(path).await?,
        None => Config::load().await,
    };

    let mut llm = LlmOverrides {
        provider: cli.provider,
        endpoint: cli.endpoint,
        api_key: cli.api_key,
        model: None,
    };

    match cli.command {
        Commands::Extract {
            dir,
            base_prompt_file,
            fields,
            model,
            extension,
            output,
        } => {
            llm.model = model;
            let args = ExtractArgs {
                dir,
                base_prompt_file,
                fields,
                extension,
                output,
            };
            extract::cmd_extract(&config, &args, &llm).await
        }
        Commands::Models => models::cmd_models(&config, &llm).await,
        Commands::Status { dir, extension } => {
            state::cmd_status(&config, dir.as_deref(), extension.as_deref()).await
        }
        Commands::Export {
            dir,
            fields,
            output,
        } => {
            state::cmd_export(
                &config,
                dir.as_deref(),
                fields.as_deref(),
                output.as_deref(),
            )
            .await
        }
        Commands::Check => extract::cmd_check().await,
    }
}
