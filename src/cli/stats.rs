//! Stats command - summary of a stored corpus

use std::collections::BTreeMap;

use clap::Args;

use super::open_corpus;

#[derive(Args)]
pub struct StatsArgs {
    /// Corpus name or path
    pub index_name: String,

    /// Number of top terms to show
    #[arg(long, default_value = "10")]
    pub top_terms: usize,

    /// Output format (text, json)
    #[arg(long, default_value = "text", value_parser = ["text", "json"])]
    pub format: String,
}

pub async fn run(args: StatsArgs) -> anyhow::Result<()> {
    let corpus = open_corpus(&args.index_name)?;
    let meta = corpus.meta();
    let top = corpus.terms().top_terms(args.top_terms);

    let mut languages: BTreeMap<String, usize> = BTreeMap::new();
    let mut symbol_passages = 0;
    for passage in corpus.passages().passages_for(None) {
        let language = passage.metadata.get("language").and_then(|v| v.as_str()).unwrap_or("unknown");
        *languages.entry(language.to_string()).or_default() += 1;
        if passage.metadata.get("symbol_hint").and_then(|v| v.as_bool()) == Some(true) {
            symbol_passages += 1;
        }
    }

    if args.format == "json" {
        let stats = serde_json::json!({
            "path": corpus.dir(),
            "meta": meta,
            "documents": corpus.passages().document_ids(),
            "distinct_terms": corpus.terms().len(),
            "top_terms": top,
            "languages": languages,
            "symbol_passages": symbol_passages,
            "graph_links": corpus.graph().edge_count(),
        });
        println!("{}", serde_json::to_string_pretty(&stats)?);
        return Ok(());
    }

    println!("Corpus: {}", corpus.dir().display());
    println!("  Documents:  {}", corpus.passages().document_count());
    println!("  Passages:   {}", corpus.passages().len());
    match corpus.vectors().dimensions() {
        Some(d) => println!("  Dimensions: {}", d),
        None => println!("  Dimensions: (unset)"),
    }
    println!("  Embedding:  {} / {}", meta.embedding_mode, meta.embedding_model);
    println!(
        "  Chunking:   {} {:?}, overlap {}, tolerance {}",
        meta.chunking.target_length,
        meta.chunking.unit,
        meta.chunking.overlap,
        meta.chunking.boundary_tolerance
    );
    println!("  Terms:      {}", corpus.terms().len());
    println!("  Links:      {}", corpus.graph().edge_count());
    println!("  Symbols:    {} passages", symbol_passages);
    let languages: Vec<String> = languages.iter().map(|(l, n)| format!("{} ({})", l, n)).collect();
    println!("  Languages:  {}", languages.join(", "));

    if !top.is_empty() {
        println!("\nMost widespread terms:");
        for stats in &top {
            println!("  {:<24} {} docs, {} passages", stats.term, stats.documents, stats.passages);
        }
    }

    Ok(())
}
