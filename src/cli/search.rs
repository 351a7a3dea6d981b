//! Search command - semantic or hybrid query against a corpus

use clap::Args;
use tracing::info;

use corpusflower::chunker::LengthUnit;
use corpusflower::embedding::with_deadline;
use corpusflower::retriever::{Query, RetrievalResult};

use super::{build_provider, one_line, open_corpus, truncate_chars, EmbeddingArgs};
use crate::config::Config;

#[derive(Args)]
pub struct SearchArgs {
    /// Corpus name or path
    pub index_name: String,

    /// Search query
    pub query: String,

    /// Number of results to return
    #[arg(short = 'k', long)]
    pub top_k: Option<usize>,

    /// Rank by similarity, then by how often the query terms occur
    #[arg(long)]
    pub hybrid: bool,

    /// Restrict results to these documents (comma-separated ids)
    #[arg(long, value_delimiter = ',')]
    pub documents: Vec<String>,

    /// Context on each side of the strongest term occurrence
    #[arg(long)]
    pub context: Option<usize>,

    /// Unit for --context (chars, tokens)
    #[arg(long)]
    pub unit: Option<LengthUnit>,

    /// Show passage metadata
    #[arg(long)]
    pub show_metadata: bool,

    /// Output format (text, json)
    #[arg(long, default_value = "text", value_parser = ["text", "json"])]
    pub format: String,

    #[command(flatten)]
    pub embedding: EmbeddingArgs,
}

impl SearchArgs {
    fn to_query(&self, config: &Config) -> Query {
        let query = if self.hybrid {
            Query::hybrid(&self.query)
        } else {
            Query::semantic(&self.query)
        };
        let query = query
            .with_k(self.top_k.unwrap_or(config.retrieval.top_k))
            .with_context(
                self.context.unwrap_or(config.retrieval.context_size),
                self.unit.unwrap_or(config.retrieval.context_unit),
            );
        if self.documents.is_empty() {
            query
        } else {
            query.with_documents(self.documents.clone())
        }
    }
}

pub async fn run(args: SearchArgs, config: &Config) -> anyhow::Result<()> {
    let corpus = open_corpus(&args.index_name)?;
    let meta = corpus.meta().clone();
    let query = args.to_query(config);

    info!(
        "Searching corpus '{}' ({} passages, {} dims)",
        args.index_name,
        meta.passage_count,
        meta.dimensions.unwrap_or(0)
    );

    let results = if query.text.trim().is_empty() || query.k == 0 {
        RetrievalResult::default()
    } else {
        let provider = build_provider(
            &meta.embedding_mode,
            &meta.embedding_model,
            meta.dimensions,
            &args.embedding,
            config,
        )
        .await?;
        let timeout = args.embedding.options(config).timeout;
        let embedding = with_deadline(Some(timeout), provider.embed_query(&query.text)).await?;
        corpus.retriever().retrieve_with_embedding(&query, &embedding)?
    };

    print_results(&args, &results)
}

fn print_results(args: &SearchArgs, results: &RetrievalResult) -> anyhow::Result<()> {
    if args.format == "json" {
        println!("{}", serde_json::to_string_pretty(results)?);
        return Ok(());
    }

    println!("\nSearch results for '{}' (top {}):\n", args.query, results.len());

    for (i, item) in results.iter().enumerate() {
        let score = item.score.similarity().unwrap_or(0.0);
        println!("{}. Score: {:.4}  [{}]", i + 1, score, item.passage.id);

        if args.show_metadata {
            for (key, value) in &item.passage.metadata {
                println!("   {}: {}", key, value);
            }
            println!("   chars: {}..{}", item.passage.start, item.passage.end);
        }

        match &item.context {
            Some(hit) => {
                println!(
                    "   ...{} [{}] {}...",
                    one_line(&hit.left),
                    hit.matched,
                    one_line(&hit.right)
                );
                if item.lexical_hits > 1 {
                    println!("   ({} term occurrences)", item.lexical_hits);
                }
            }
            None => println!("   {}", truncate_chars(&one_line(&item.passage.text), 200)),
        }
        println!();
    }

    Ok(())
}
