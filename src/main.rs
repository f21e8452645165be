//! # ragchat CLI
//!
//! Driver for the RAG pipeline. All commands accept a `--config` flag
//! pointing to a TOML configuration file.
//!
//! ```bash
//! ragchat init                                  # create database
//! ragchat ingest --chat c1 notes.pdf data.csv   # ingest files
//! ragchat ingest --chat c1 https://example.com  # ingest a web page
//! ragchat ask --chat c1 "What does it say?"     # ask a question
//! ragchat documents --chat c1                   # list ingested sources
//! ragchat forget --chat c1                      # drop the collection
//! ```

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use ragchat::config::{load_config, Config};
use ragchat::ingest::IngestionPipeline;
use ragchat::models::{ChatMessage, SourceInput};
use ragchat::query::QueryPipeline;
use ragchat::{db, embedding, generation, index::VectorIndex, migrate, store};

#[derive(Parser)]
#[command(
    name = "ragchat",
    about = "Chat with your documents — conversation-scoped retrieval-augmented generation",
    version
)]
struct Cli {
    /// Path to configuration file (TOML).
    #[arg(long, global = true, default_value = "./config/ragchat.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Initialize the database schema. Idempotent.
    Init,

    /// Ingest files or URLs into a conversation's knowledge scope.
    ///
    /// Each input is processed independently; a failure aborts that
    /// input only and the rest of the batch continues.
    Ingest {
        /// Conversation id the inputs belong to.
        #[arg(long)]
        chat: String,

        /// File paths (pdf, docx, csv, anything else as plain text)
        /// or http(s) URLs.
        #[arg(required = true)]
        inputs: Vec<String>,
    },

    /// Ask a question against a conversation's ingested knowledge.
    Ask {
        /// Conversation id to search in.
        #[arg(long)]
        chat: String,

        /// The question.
        question: String,

        /// Optional JSON file with prior turns:
        /// `[{"role":"user","content":"..."}, ...]`.
        #[arg(long)]
        history: Option<PathBuf>,
    },

    /// List the documents ingested into a conversation.
    Documents {
        #[arg(long)]
        chat: String,
    },

    /// Delete a conversation's vectors and document records.
    Forget {
        #[arg(long)]
        chat: String,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| {
            EnvFilter::new("ragchat=info")
        }))
        .init();

    let cli = Cli::parse();
    let config = if cli.config.exists() {
        load_config(&cli.config)?
    } else {
        Config::default()
    };

    match cli.command {
        Commands::Init => {
            let pool = db::connect(&config.db).await?;
            migrate::run_migrations(&pool).await?;
            println!("initialized {}", config.db.path.display());
            pool.close().await;
        }

        Commands::Ingest { chat, inputs } => {
            let pool = db::connect(&config.db).await?;
            migrate::run_migrations(&pool).await?;
            let embedder = embedding::create_provider(&config.embedding)?;
            let index = Arc::new(VectorIndex::new(pool.clone(), embedder));
            let documents = Arc::new(store::SqliteDocumentStore::new(pool.clone()));
            let pipeline = IngestionPipeline::new(
                index,
                documents,
                config.chunking.clone(),
                config.fetch.clone(),
            );

            let mut failed = 0usize;
            for arg in &inputs {
                let input = SourceInput::parse(arg);
                match pipeline.ingest(&chat, &input).await {
                    Ok(doc_id) => println!("ingested {} -> {}", input.display_name(), doc_id),
                    Err(e) => {
                        failed += 1;
                        eprintln!("failed {}: {}", input.display_name(), e);
                    }
                }
            }
            if failed == inputs.len() {
                anyhow::bail!("all {} inputs failed", failed);
            }
            pool.close().await;
        }

        Commands::Ask {
            chat,
            question,
            history,
        } => {
            let pool = db::connect(&config.db).await?;
            migrate::run_migrations(&pool).await?;
            let embedder = embedding::create_provider(&config.embedding)?;
            let generator = generation::create_provider(&config.generation)?;
            let index = Arc::new(VectorIndex::new(pool.clone(), embedder));
            let pipeline = QueryPipeline::new(index, generator, config.retrieval.clone());

            let messages: Vec<ChatMessage> = match history {
                Some(path) => {
                    let raw = std::fs::read_to_string(&path)
                        .with_context(|| format!("Failed to read {}", path.display()))?;
                    serde_json::from_str(&raw)
                        .with_context(|| format!("Failed to parse {}", path.display()))?
                }
                None => Vec::new(),
            };

            let reply = pipeline.answer(&chat, &messages, &question).await;
            println!("{}", reply);
            pool.close().await;
        }

        Commands::Documents { chat } => {
            use ragchat::store::DocumentStore;

            let pool = db::connect(&config.db).await?;
            migrate::run_migrations(&pool).await?;
            let documents = store::SqliteDocumentStore::new(pool.clone());
            let records = documents.find_for_conversation(&chat).await?;
            if records.is_empty() {
                println!("No documents.");
            }
            for record in records {
                let date = chrono::DateTime::from_timestamp(record.processed_at, 0)
                    .map(|dt| dt.format("%Y-%m-%d %H:%M").to_string())
                    .unwrap_or_default();
                println!(
                    "{}  {}  [{}] {} chunks  {}",
                    record.id, record.name, record.kind, record.chunk_count, date
                );
            }
            pool.close().await;
        }

        Commands::Forget { chat } => {
            let pool = db::connect(&config.db).await?;
            migrate::run_migrations(&pool).await?;
            let embedder = embedding::create_provider(&config.embedding)?;
            let index = Arc::new(VectorIndex::new(pool.clone(), embedder));
            let documents = Arc::new(store::SqliteDocumentStore::new(pool.clone()));
            let pipeline = IngestionPipeline::new(
                index,
                documents,
                config.chunking.clone(),
                config.fetch.clone(),
            );
            pipeline.delete_conversation(&chat).await?;
            println!("forgot {}", chat);
            pool.close().await;
        }
    }

    Ok(())
}
