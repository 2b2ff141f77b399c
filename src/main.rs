mod chat;
mod commands;
mod triage;

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use crate::triage::Email;

#[derive(Parser)]
#[command(name = "trellis", version, about = "Stage routing graphs for short automation pipelines")]
struct Cli {
    /// Path to config file
    #[arg(short, long, default_value = "trellis.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Triage one email through the routing graph
    Triage {
        #[arg(long)]
        sender: String,
        #[arg(long)]
        subject: String,
        #[arg(long)]
        body: String,
    },
    /// Send a single prompt through the chat graph
    Chat {
        /// The prompt to send
        #[arg(trailing_var_arg = true, required = true)]
        prompt: Vec<String>,
    },
    /// Convert a PDF to markdown with page markers
    Convert {
        /// Path to the PDF
        pdf: PathBuf,
        /// Output directory for markdown and images
        #[arg(short, long, default_value = "data/unprocessed_md")]
        out_dir: PathBuf,
    },
    /// Ingest a directory of markdown files into the vector store
    Ingest {
        /// Directory of .md files
        dir: PathBuf,
        /// Vector database path (defaults to the configured store)
        #[arg(long)]
        db: Option<PathBuf>,
    },
    /// Search the vector store
    Search {
        /// The query text
        query: String,
        /// Vector database path (defaults to the configured store)
        #[arg(long)]
        db: Option<PathBuf>,
        /// Number of results
        #[arg(long, default_value = "5")]
        limit: usize,
    },
    /// Show the resolved configuration
    Config,
}

fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();
    let config = commands::load_config(&cli.config)?;

    match cli.command {
        Commands::Triage {
            sender,
            subject,
            body,
        } => commands::triage(
            &config,
            Email {
                sender,
                subject,
                body,
            },
        ),
        Commands::Chat { prompt } => commands::chat(&config, &prompt.join(" ")),
        Commands::Convert { pdf, out_dir } => commands::convert(&config, &pdf, &out_dir),
        Commands::Ingest { dir, db } => commands::ingest(&config, &dir, db),
        Commands::Search { query, db, limit } => commands::search(&config, &query, db, limit),
        Commands::Config => commands::show_config(&config),
    }
}
