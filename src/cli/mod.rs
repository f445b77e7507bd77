//! CLI command definitions and parsing
use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(
    name = "hybrag",
    version,
    author = "neur0map",
    about = "Hybrid dense + lexical passage retrieval for RAG pipelines",
    long_about = "hybrag chunks a folder of documents, keeps a dense vector index and a BM25 index \
                  over the chunks in sync, and retrieves passages with similarity, MMR, weighted \
                  hybrid, reciprocal rank fusion or cross-encoder reranking."
)]
pub struct Cli {
    /// Global config file path (defaults to ~/.config/hybrag/config.toml)
    #[arg(short, long, global = true, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Configuration profile to apply
    #[arg(short, long, global = true)]
    pub profile: Option<String>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

/// Retrieval options shared by `query` and `context`
#[derive(Args, Debug, Clone)]
pub struct RetrievalArgs {
    /// Strategy: similarity, mmr, hybrid, rrf, rerank or rerank:<base>
    #[arg(short, long)]
    pub strategy: Option<String>,

    /// Number of passages to return
    #[arg(short = 'k', long)]
    pub top_k: Option<usize>,

    /// MMR relevance weight (0 = diverse, 1 = similar)
    #[arg(long)]
    pub lambda: Option<f32>,

    /// Weighted hybrid dense weight
    #[arg(long)]
    pub alpha: Option<f32>,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Rebuild both indexes from the documents folder
    Rebuild,

    /// Copy documents into the documents folder and index them incrementally
    Add {
        /// Text or markdown files to add
        #[arg(required = true)]
        files: Vec<PathBuf>,
    },

    /// Retrieve ranked passages for a query
    Query {
        /// Search query text
        query: String,

        #[command(flatten)]
        retrieval: RetrievalArgs,

        /// Show results in JSON format
        #[arg(long)]
        json: bool,
    },

    /// Print the generator prompt built from retrieved passages
    Context {
        /// Question to answer
        question: String,

        #[command(flatten)]
        retrieval: RetrievalArgs,

        /// Instruction placed before the context block
        #[arg(long)]
        system_hint: Option<String>,
    },

    /// Show index status
    Status,

    /// Manage configuration
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Subcommand, Debug)]
pub enum ConfigAction {
    /// Show current configuration
    Show,

    /// Validate configuration file
    Validate {
        /// Path to config file (defaults to standard location)
        #[arg(short, long)]
        file: Option<PathBuf>,
    },

    /// Initialize default configuration
    Init {
        /// Force overwrite existing config
        #[arg(short, long)]
        force: bool,
    },
}

impl Cli {
    /// Parse CLI arguments from command line
    pub fn parse_args() -> Self {
        Self::parse()
    }
}
