//! Terms command - browse the term index of a corpus

use clap::Args;

use corpusflower::concordance::normalize_token;

use super::{open_corpus, truncate_chars};

#[derive(Args)]
pub struct TermsArgs {
    /// Corpus name or path
    pub index_name: String,

    /// Term to look up; omit to list the most widespread terms
    pub term: Option<String>,

    /// Maximum number of rows
    #[arg(short = 'n', long, default_value = "25")]
    pub limit: usize,

    /// Output format (text, json)
    #[arg(long, default_value = "text", value_parser = ["text", "json"])]
    pub format: String,
}

pub async fn run(args: TermsArgs) -> anyhow::Result<()> {
    let corpus = open_corpus(&args.index_name)?;
    let terms = corpus.terms();

    let Some(term) = &args.term else {
        let top = terms.top_terms(args.limit);
        if args.format == "json" {
            println!("{}", serde_json::to_string_pretty(&top)?);
        } else {
            println!("{:<24} {:>9} {:>9}", "TERM", "DOCUMENTS", "PASSAGES");
            for stats in &top {
                println!("{:<24} {:>9} {:>9}", stats.term, stats.documents, stats.passages);
            }
            println!("\n{} distinct terms", terms.len());
        }
        return Ok(());
    };

    let key = normalize_token(term);
    let occurrences: Vec<_> = terms.lookup(&key).iter().take(args.limit).collect();

    if args.format == "json" {
        println!("{}", serde_json::to_string_pretty(&occurrences)?);
        return Ok(());
    }

    let Some(stats) = terms.stats(&key) else {
        println!("Term '{}' is not indexed", key);
        return Ok(());
    };
    println!(
        "'{}' appears in {} passages across {} documents\n",
        stats.term, stats.passages, stats.documents
    );
    for occurrence in occurrences {
        let preview = corpus
            .passages()
            .get(&occurrence.passage_id)
            .map(|p| truncate_chars(&p.text.replace('\n', " "), 80))
            .unwrap_or_default();
        println!("  {}  {}", occurrence.passage_id, preview);
    }

    Ok(())
}
