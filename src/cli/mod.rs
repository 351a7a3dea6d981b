//! CLI module - command definitions and handlers

mod concordance;
mod config_cmd;
mod ingest;
mod related;
mod search;
mod stats;
mod terms;

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

use corpusflower::embedding::{EmbeddingMode, EmbeddingProvider, ProviderOptions};
use corpusflower::index::{find_index, CorpusIndex};

use crate::config::Config;

pub use concordance::ConcordanceArgs;
pub use config_cmd::ConfigArgs;
pub use ingest::IngestArgs;
pub use related::RelatedArgs;
pub use search::SearchArgs;
pub use stats::StatsArgs;
pub use terms::TermsArgs;

/// corpusflower - concordance and semantic search over document corpora
#[derive(Parser)]
#[command(name = "corpusflower")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Suppress non-essential output
    #[arg(short, long, global = true)]
    pub quiet: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Ingest documents into a corpus (incremental)
    Ingest(IngestArgs),

    /// Semantic or hybrid search
    Search(SearchArgs),

    /// Every occurrence of a term with surrounding context
    Concordance(ConcordanceArgs),

    /// Browse the term index
    Terms(TermsArgs),

    /// Documents linked to a document in the semantic graph
    Related(RelatedArgs),

    /// Show corpus statistics
    Stats(StatsArgs),

    /// Manage configuration
    Config(ConfigArgs),
}

impl Cli {
    pub async fn run(self) -> anyhow::Result<()> {
        let config = Config::load();
        match self.command {
            Commands::Ingest(args) => ingest::run(args, &config, self.quiet).await,
            Commands::Search(args) => search::run(args, &config).await,
            Commands::Concordance(args) => concordance::run(args, &config).await,
            Commands::Terms(args) => terms::run(args).await,
            Commands::Related(args) => related::run(args).await,
            Commands::Stats(args) => stats::run(args).await,
            Commands::Config(args) => config_cmd::run(args, &config).await,
        }
    }
}

/// Embedding provider flags; unset flags fall back to the config file
#[derive(Args, Debug, Clone, Default)]
pub struct EmbeddingArgs {
    /// Embedding provider (ollama, openai, hash)
    #[arg(long, value_parser = ["ollama", "openai", "hash"])]
    pub embedding_mode: Option<String>,

    /// Embedding model name
    #[arg(long)]
    pub embedding_model: Option<String>,

    /// Ollama host for embeddings
    #[arg(long, env = "OLLAMA_HOST")]
    pub embedding_host: Option<String>,

    /// OpenAI API base URL
    #[arg(long, env = "OPENAI_BASE_URL")]
    pub embedding_api_base: Option<String>,

    /// API key for embedding service
    #[arg(long, env = "OPENAI_API_KEY", hide_env_values = true)]
    pub embedding_api_key: Option<String>,

    /// Seconds to wait for one provider call
    #[arg(long)]
    pub timeout_secs: Option<u64>,
}

impl EmbeddingArgs {
    /// Provider mode and model after applying config defaults
    pub fn resolve(&self, config: &Config) -> (String, String) {
        let mode = self
            .embedding_mode
            .clone()
            .unwrap_or_else(|| config.embedding.provider.clone());
        let model = self
            .embedding_model
            .clone()
            .unwrap_or_else(|| config.embedding.model.clone());
        (mode, model)
    }

    pub fn options(&self, config: &Config) -> ProviderOptions {
        ProviderOptions {
            batch_size: config.embedding.batch_size.unwrap_or(32),
            timeout: self
                .timeout_secs
                .map(std::time::Duration::from_secs)
                .unwrap_or_else(|| config.embedding.timeout()),
        }
    }
}

/// Create the embedding provider for `mode`/`model`.
///
/// `dimensions` pins the hash provider to a stored corpus's vector length.
pub async fn build_provider(
    mode: &str,
    model: &str,
    dimensions: Option<usize>,
    args: &EmbeddingArgs,
    config: &Config,
) -> anyhow::Result<EmbeddingProvider> {
    let embedding_mode = match mode {
        "openai" => EmbeddingMode::OpenAI {
            api_key: args
                .embedding_api_key
                .clone()
                .or_else(|| config.embedding.api_key.clone()),
            base_url: args
                .embedding_api_base
                .clone()
                .or_else(|| config.embedding.base_url.clone()),
        },
        "ollama" => EmbeddingMode::Ollama {
            host: args
                .embedding_host
                .clone()
                .or_else(|| config.embedding.host.clone()),
        },
        "hash" => EmbeddingMode::Hash {
            dimensions: dimensions.unwrap_or(config.embedding.hash_dimensions),
        },
        _ => anyhow::bail!("Unknown embedding mode: {}", mode),
    };

    let options = args.options(config);
    let provider = corpusflower::embedding::with_deadline(
        Some(options.timeout),
        EmbeddingProvider::new(model.to_string(), embedding_mode, options),
    )
    .await?;
    Ok(provider)
}

/// Locate and open a saved corpus by name or path
pub fn open_corpus(name: &str) -> anyhow::Result<CorpusIndex> {
    let dir: PathBuf = find_index(name)?;
    Ok(CorpusIndex::open(&dir)?)
}

/// Shorten `text` to at most `max` chars for terminal display
pub fn truncate_chars(text: &str, max: usize) -> String {
    match text.char_indices().nth(max) {
        Some((b, _)) => format!("{}...", &text[..b]),
        None => text.to_string(),
    }
}

/// Single-line rendering of a context string
pub fn one_line(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}
