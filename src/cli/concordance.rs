//! Concordance command - every occurrence of a term with its context

use clap::Args;

use corpusflower::chunker::LengthUnit;
use corpusflower::retriever::Query;

use super::{one_line, open_corpus};
use crate::config::Config;

#[derive(Args)]
pub struct ConcordanceArgs {
    /// Corpus name or path
    pub index_name: String,

    /// Word or phrase to look up (case-insensitive, whole words)
    pub term: String,

    /// Maximum number of occurrences to show
    #[arg(short = 'n', long, default_value = "50")]
    pub limit: usize,

    /// Context on each side of a match
    #[arg(long)]
    pub context: Option<usize>,

    /// Unit for --context (chars, tokens)
    #[arg(long)]
    pub unit: Option<LengthUnit>,

    /// Restrict to these documents (comma-separated ids)
    #[arg(long, value_delimiter = ',')]
    pub documents: Vec<String>,

    /// Output format (text, json)
    #[arg(long, default_value = "text", value_parser = ["text", "json"])]
    pub format: String,
}

pub async fn run(args: ConcordanceArgs, config: &Config) -> anyhow::Result<()> {
    let corpus = open_corpus(&args.index_name)?;

    let mut query = Query::lexical(&args.term).with_k(args.limit).with_context(
        args.context.unwrap_or(config.retrieval.context_size),
        args.unit.unwrap_or(config.retrieval.context_unit),
    );
    if !args.documents.is_empty() {
        query = query.with_documents(args.documents.clone());
    }

    let results = corpus.retriever().retrieve(&query)?;

    if args.format == "json" {
        let hits: Vec<_> = results.iter().filter_map(|item| item.context.as_ref()).collect();
        println!("{}", serde_json::to_string_pretty(&hits)?);
        return Ok(());
    }

    if results.is_empty() {
        println!("No occurrences of '{}'", args.term);
        return Ok(());
    }

    // Right-align the left context so the matches line up
    let width = results
        .iter()
        .filter_map(|item| item.context.as_ref())
        .map(|hit| one_line(&hit.left).chars().count())
        .max()
        .unwrap_or(0);

    let mut current_doc = "";
    for item in results.iter() {
        let Some(hit) = &item.context else { continue };
        if hit.document_id != current_doc {
            println!("\n{}", hit.document_id);
            current_doc = hit.document_id.as_str();
        }
        println!(
            "  {:>6}  {:>width$} [{}] {}",
            hit.document_offset,
            one_line(&hit.left),
            hit.matched,
            one_line(&hit.right),
            width = width
        );
    }
    println!("\n{} occurrences", results.len());

    Ok(())
}
