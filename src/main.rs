//! # pdfrag CLI
//!
//! The `pdfrag` binary indexes PDFs, answers questions over them, and runs
//! the HTTP server.
//!
//! ## Usage
//!
//! ```bash
//! pdfrag --config ./config/pdfrag.toml <command>
//! ```
//!
//! ## Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `pdfrag init` | Create the vector-store collection if missing |
//! | `pdfrag ingest <file>` | Extract, chunk, embed and index a PDF |
//! | `pdfrag search "<query>"` | Retrieve matching chunks |
//! | `pdfrag ask "<question>"` | Answer a question from retrieved chunks |
//! | `pdfrag serve` | Start the HTTP server |
//!
//! ## Examples
//!
//! ```bash
//! # Ingest a handbook under a project
//! pdfrag ingest handbook.pdf --project-id acme --tags hr,policy
//!
//! # Retry the chunks that failed last time
//! pdfrag ingest handbook.pdf --document-id 6f1c... --only 5,7
//!
//! # Ask, restricted to one project
//! pdfrag ask "What is the parental leave policy?" --project-id acme
//! ```

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use pdfrag::ingest::IngestArgs;
use pdfrag::{ask, config, ingest, search, server, services};

#[derive(Parser)]
#[command(
    name = "pdfrag",
    about = "Question answering over uploaded PDFs",
    version,
    long_about = "pdfrag chunks and embeds PDF text into a vector store, retrieves the \
    passages nearest to a question (optionally filtered by project and tags), and asks a \
    language model to answer from those passages only."
)]
struct Cli {
    /// Path to configuration file (TOML).
    ///
    /// Defaults to `./config/pdfrag.toml` when that file exists, otherwise
    /// built-in defaults. Environment variables such as `WEAVIATE_URL` and
    /// `EMBED_MODEL` override either.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

/// Top-level CLI commands.
#[derive(Subcommand)]
enum Commands {
    /// Create the vector-store collection schema if it does not exist.
    ///
    /// Safe to run repeatedly.
    Init,

    /// Ingest a PDF.
    ///
    /// Prints a per-chunk report. When some chunks fail, the report ends with
    /// the command that retries only those chunks under the same document id.
    Ingest {
        /// Path to the PDF.
        file: PathBuf,

        /// Project the document belongs to.
        #[arg(long)]
        project_id: Option<String>,

        /// Comma-separated tags.
        #[arg(long)]
        tags: Option<String>,

        /// Reuse an existing document id (for resuming).
        #[arg(long)]
        document_id: Option<String>,

        /// Only process these chunk indices, e.g. `5,7`. Requires `--document-id`.
        #[arg(long)]
        only: Option<String>,
    },

    /// Retrieve the chunks nearest to a query, without generation.
    Search {
        /// The search query string.
        query: String,

        /// Number of chunks to return.
        #[arg(long)]
        top_k: Option<usize>,

        /// Restrict to one project.
        #[arg(long)]
        project_id: Option<String>,

        /// Restrict to chunks carrying any of these comma-separated tags.
        #[arg(long)]
        tags: Option<String>,
    },

    /// Answer a question from the indexed PDFs.
    Ask {
        /// The question.
        question: String,

        /// Number of chunks used as context.
        #[arg(long)]
        top_k: Option<usize>,

        /// Restrict to one project.
        #[arg(long)]
        project_id: Option<String>,

        /// Restrict to chunks carrying any of these comma-separated tags.
        #[arg(long)]
        tags: Option<String>,
    },

    /// Start the HTTP server on `[server].bind`.
    Serve,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("pdfrag=info,pdfrag_core=info,tower_http=info")),
        )
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let cfg = config::resolve_config(cli.config.as_deref())?;

    match cli.command {
        Commands::Init => {
            let status = services::prepare_store(&cfg.store).await?;
            println!("{}", status);
        }
        Commands::Ingest {
            file,
            project_id,
            tags,
            document_id,
            only,
        } => {
            let args = IngestArgs {
                project_id,
                tags,
                document_id,
                only,
            };
            ingest::run_ingest(&cfg, &file, args).await?;
        }
        Commands::Search {
            query,
            top_k,
            project_id,
            tags,
        } => {
            search::run_search(&cfg, &query, top_k, project_id, tags).await?;
        }
        Commands::Ask {
            question,
            top_k,
            project_id,
            tags,
        } => {
            ask::run_ask(&cfg, &question, top_k, project_id, tags).await?;
        }
        Commands::Serve => {
            server::run_server(&cfg).await?;
        }
    }

    Ok(())
}
