//! formsensectl - CLI for the trust-cascade field classifier.
//!
//! Classifies field descriptor files, inspects the caches and
//! question bank, and drives the review-queue workflow.

mod commands;

use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};
use formsense::ClassifierConfig;

#[derive(Parser)]
#[command(name = "formsensectl")]
#[command(about = "Trust-cascade form field classifier", long_about = None)]
#[command(version)]
struct Cli {
    /// Config file (defaults to the XDG config location)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Classify fields from a JSON descriptor file
    Classify {
        /// JSON file holding an array of field descriptors
        #[arg(long)]
        file: PathBuf,

        /// Applicant profile JSON for answer resolution
        #[arg(long)]
        profile: Option<PathBuf>,
    },

    /// Inspect and act on the review queue
    Review {
        #[command(subcommand)]
        action: ReviewAction,
    },

    /// Show cache statistics
    Cache,

    /// List the question bank
    Bank,
}

#[derive(Subcommand)]
enum ReviewAction {
    /// List queued items
    List,

    /// Approve an item by id
    Approve { id: String },

    /// Reject an item by id
    Reject { id: String },
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .init();

    let cli = Cli::parse();
    let config = match &cli.config {
        Some(path) => ClassifierConfig::load(path)?,
        None => ClassifierConfig::load_default()?,
    };

    match cli.command {
        Commands::Classify { file, profile } => {
            commands::classify(config, &file, profile.as_deref())
        }
        Commands::Review { action } => match action {
            ReviewAction::List => commands::review_list(&config),
            ReviewAction::Approve { id } => commands::review_set(&config, &id, true),
            ReviewAction::Reject { id } => commands::review_set(&config, &id, false),
        },
        Commands::Cache => commands::cache_stats(&config),
        Commands::Bank => commands::bank_list(&config),
    }
}
