mod cli;
mod config;
mod memory;

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "engram", version, about = "Persistent, relevance-scored memory store for AI agents")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Record a new memory
    Add {
        content: String,
        /// Short human-readable title
        #[arg(long)]
        summary: String,
        /// Memory type (breakthrough, decision, feedback, error_recovery, pattern, user_preference)
        #[arg(long = "type")]
        memory_type: String,
        /// Confidence estimate in [0, 1]
        #[arg(long, default_value_t = 1.0)]
        confidence: f64,
        /// Tag (repeatable)
        #[arg(long)]
        tag: Vec<String>,
        /// Entity reference such as a file path or symbol (repeatable)
        #[arg(long)]
        entity: Vec<String>,
        /// Owning project id
        #[arg(long)]
        project: Option<String>,
        /// Originating task id
        #[arg(long)]
        task: Option<String>,
        /// Who recorded this memory
        #[arg(long, default_value = "cli")]
        author: String,
    },
    /// Search memories by free text
    Search {
        text: String,
        /// Restrict to one project
        #[arg(long)]
        project: Option<String>,
        /// Restrict to one memory type (e.g. decision, pattern)
        #[arg(long = "type")]
        memory_type: Option<String>,
        /// Restrict to a tag (repeatable)
        #[arg(long)]
        tag: Vec<String>,
        /// Sort order: relevance, recency, or access_count
        #[arg(long)]
        sort: Option<String>,
        /// Maximum number of results
        #[arg(long)]
        limit: Option<usize>,
        /// Include archived memories
        #[arg(long)]
        archived: bool,
    },
    /// Show one memory in full, optionally with its relationship chain
    Inspect {
        id: String,
        /// Hops of related memories to display
        #[arg(long, default_value_t = 0)]
        chain_depth: u32,
    },
    /// Display store statistics
    Stats,
    /// Run a maintenance pass
    Maintenance {
        #[command(subcommand)]
        action: MaintenanceAction,
    },
    /// Merge near-duplicate memories
    Consolidate {
        /// Restrict to one memory type
        #[arg(long = "type")]
        memory_type: Option<String>,
        /// Restrict to one tag
        #[arg(long)]
        tag: Option<String>,
    },
    /// Permanently delete a memory
    Forget { id: String },
}

#[derive(Subcommand)]
enum MaintenanceAction {
    /// Decay relevance scores by idle time
    Decay,
    /// Archive old, low-relevance, rarely-used memories
    Archive {
        /// Minimum age in days (defaults to the configured value)
        #[arg(long)]
        days: Option<u64>,
    },
    /// Rebuild the index from a full records scan
    Reindex,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Load config (for the data dir and log level)
    let config = config::EngramConfig::load()?;

    // Initialize tracing with the configured log level, to stderr so stdout
    // stays clean for command output.
    let filter = EnvFilter::try_new(&config.logging.level)
        .unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    match cli.command {
        Command::Add {
            content,
            summary,
            memory_type,
            confidence,
            tag,
            entity,
            project,
            task,
            author,
        } => {
            cli::add::add(
                &config,
                &content,
                &summary,
                &memory_type,
                confidence,
                &tag,
                &entity,
                project.as_deref(),
                task.as_deref(),
                &author,
            )
            .await?;
        }
        Command::Search {
            text,
            project,
            memory_type,
            tag,
            sort,
            limit,
            archived,
        } => {
            cli::search::search(
                &config,
                &text,
                project.as_deref(),
                memory_type.as_deref(),
                &tag,
                sort.as_deref(),
                limit,
                archived,
            )
            .await?;
        }
        Command::Inspect { id, chain_depth } => {
            cli::inspect::inspect(&config, &id, chain_depth).await?;
        }
        Command::Stats => {
            cli::stats::stats(&config).await?;
        }
        Command::Maintenance { action } => match action {
            MaintenanceAction::Decay => cli::maintenance::decay(&config).await?,
            MaintenanceAction::Archive { days } => {
                cli::maintenance::archive(&config, days).await?;
            }
            MaintenanceAction::Reindex => cli::maintenance::reindex(&config).await?,
        },
        Command::Consolidate { memory_type, tag } => {
            cli::consolidate::run(&config, memory_type.as_deref(), tag.as_deref()).await?;
        }
        Command::Forget { id } => {
            cli::forget::forget(&config, &id).await?;
        }
    }

    Ok(())
}
