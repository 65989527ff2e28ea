//! Swipe CLI - command-line driver for the recommendation engine.
//!
//! # Usage
//!
//! ```bash
//! # Load posts and embed them
//! swipe ingest posts.json
//!
//! # Record an interaction
//! swipe interact user-1 post-42 like
//!
//! # Recommend posts
//! swipe recommend user-1 -n 5
//! swipe recommend user-1 --json
//!
//! # Maintenance
//! swipe cluster
//! swipe batch
//! ```

mod config;
mod engine;
mod output;

use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

/// Swipe recommendation engine CLI.
///
/// State lives in a redb database under the data directory.
#[derive(Parser)]
#[command(name = "swipe", version, about)]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// Custom data directory (default: platform standard location)
    #[arg(long, global = true)]
    data_dir: Option<PathBuf>,

    /// Engine configuration file (JSON); missing fields use defaults
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Command {
    /// Load posts from a JSON array and embed them
    Ingest {
        /// Path to a JSON file holding an array of posts
        file: PathBuf,
    },
    /// Record a user interaction
    Interact {
        user: String,
        entity: String,
        /// short_view, long_view, like, dislike, like_comment, comment,
        /// share, save or report
        #[arg(value_name = "TYPE")]
        interaction_type: String,
        /// Kind of the entity interacted with
        #[arg(long, default_value = "post")]
        entity_type: String,
    },
    /// Recommend posts for a user
    Recommend {
        user: String,
        /// Maximum number of recommendations
        #[arg(short = 'n', long, default_value = "10")]
        limit: usize,
        /// Output recommendations as JSON
        #[arg(long)]
        json: bool,
    },
    /// Run one re-clustering pass
    Cluster {
        /// Output the report as JSON
        #[arg(long)]
        json: bool,
    },
    /// Run the embedding refresh and re-clustering jobs once
    Batch {
        /// Output the reports as JSON
        #[arg(long)]
        json: bool,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let filter = if cli.verbose {
        EnvFilter::new("info")
    } else {
        EnvFilter::new("warn")
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();

    let engine = engine::open(cli.data_dir.as_ref(), cli.config.as_ref())?;

    let output = match cli.command {
        Command::Ingest { file } => {
            let summary = engine::ingest(&engine, &file).await?;
            output::format_ingest(&summary)
        }
        Command::Interact {
            user,
            entity,
            interaction_type,
            entity_type,
        } => {
            let logged =
                engine::interact(&engine, &user, &entity, &entity_type, &interaction_type).await?;
            output::format_interaction(&logged)
        }
        Command::Recommend { user, limit, json } => {
            let recs = engine::recommend(&engine, &user, limit).await?;
            if json {
                output::format_json(&user, &recs)
            } else {
                output::format_human(&user, &recs)
            }
        }
        Command::Cluster { json } => {
            let report = engine::cluster(&engine).await?;
            output::format_report("clustering", report.as_ref(), json)
        }
        Command::Batch { json } => {
            let update = engine::batch(&engine).await?;
            let mut out = output::format_report("embeddings", update.embeddings.as_ref(), json);
            out.push('\n');
            out.push_str(&output::format_report(
                "clustering",
                update.clustering.as_ref(),
                json,
            ));
            out
        }
    };

    println!("{}", output);
    Ok(())
}
