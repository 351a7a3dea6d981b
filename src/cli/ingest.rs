//! Ingest command - build or update a corpus from document files

use std::path::PathBuf;

use clap::Args;
use tracing::{info, warn};

use corpusflower::chunker::{ChunkerConfig, LengthUnit};
use corpusflower::index::{local_index_path, CorpusIndex, IndexMeta};
use corpusflower::ingest::{ingest_paths, IngestOptions};

use super::{build_provider, EmbeddingArgs};
use crate::config::Config;

#[derive(Args)]
pub struct IngestArgs {
    /// Corpus name (default: current directory name)
    #[arg()]
    pub index_name: Option<String>,

    /// Document directories and/or files
    #[arg(long, default_value = ".")]
    pub docs: Vec<PathBuf>,

    #[command(flatten)]
    pub embedding: EmbeddingArgs,

    /// Target passage length
    #[arg(long)]
    pub target_length: Option<usize>,

    /// Overlap between consecutive passages
    #[arg(long)]
    pub overlap: Option<usize>,

    /// How far a passage end may move to reach a sentence or paragraph break
    #[arg(long)]
    pub boundary_tolerance: Option<usize>,

    /// Unit for passage lengths (chars, tokens)
    #[arg(long)]
    pub unit: Option<LengthUnit>,

    /// Documents chunked and embedded concurrently
    #[arg(long, default_value = "4")]
    pub workers: usize,

    /// Re-ingest files even when unchanged
    #[arg(short, long)]
    pub force: bool,

    /// Include hidden files
    #[arg(long)]
    pub include_hidden: bool,

    /// Output format (text, json)
    #[arg(long, default_value = "text", value_parser = ["text", "json"])]
    pub format: String,
}

impl IngestArgs {
    fn chunking(&self, config: &Config) -> ChunkerConfig {
        let base = &config.chunking;
        ChunkerConfig::new(
            self.target_length.unwrap_or(base.target_length),
            self.overlap.unwrap_or(base.overlap),
        )
        .with_tolerance(self.boundary_tolerance.unwrap_or(base.boundary_tolerance))
        .with_unit(self.unit.unwrap_or(base.unit))
    }
}

pub async fn run(args: IngestArgs, config: &Config, quiet: bool) -> anyhow::Result<()> {
    let index_name = args.index_name.clone().unwrap_or_else(|| {
        std::env::current_dir()
            .ok()
            .and_then(|p| p.file_name().map(|n| n.to_string_lossy().to_string()))
            .unwrap_or_else(|| "corpus".to_string())
    });
    let index_dir = local_index_path(&index_name);
    let (mode, model) = args.embedding.resolve(config);

    let mut corpus = if CorpusIndex::exists(&index_dir) {
        let corpus = CorpusIndex::open(&index_dir)?;
        let explicit = args.embedding.embedding_mode.is_some() || args.embedding.embedding_model.is_some();
        if explicit && !corpus.meta().same_provider(&mode, &model) {
            anyhow::bail!(
                "Corpus '{}' was built with {}/{}; refusing to mix in {}/{}",
                index_name,
                corpus.meta().embedding_mode,
                corpus.meta().embedding_model,
                mode,
                model
            );
        }
        if args.target_length.is_some() || args.overlap.is_some() || args.unit.is_some() {
            warn!("Chunking flags ignored: corpus keeps its stored chunking settings");
        }
        info!("Updating corpus '{}' ({} passages)", index_name, corpus.passages().len());
        corpus
    } else {
        let chunking = args.chunking(config);
        chunking.validate()?;
        info!("Creating corpus '{}' at {}", index_name, index_dir.display());
        CorpusIndex::create(&index_dir, IndexMeta::new(&mode, &model, chunking))
    };

    // A stored corpus keeps its provider; flags only override connection details
    let meta = corpus.meta().clone();
    let provider = build_provider(
        &meta.embedding_mode,
        &meta.embedding_model,
        meta.dimensions,
        &args.embedding,
        config,
    )
    .await?;

    let options = IngestOptions {
        workers: args.workers,
        timeout: Some(args.embedding.options(config).timeout),
        force: args.force,
        include_hidden: args.include_hidden,
        show_progress: !quiet && args.format == "text",
    };
    let report = ingest_paths(&mut corpus, &args.docs, &provider, &options).await?;

    if report.changed() || !CorpusIndex::exists(&index_dir) {
        corpus.save()?;
    }

    if args.format == "json" {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        println!("Corpus '{}' at {}", index_name, index_dir.display());
        println!("  Added:     {}", report.added.len());
        println!("  Updated:   {}", report.updated.len());
        println!("  Unchanged: {}", report.unchanged.len());
        println!("  Removed:   {}", report.removed.len());
        println!("  Passages written: {}", report.passages_written);
        println!(
            "  Total: {} documents, {} passages",
            corpus.passages().document_ids().len(),
            corpus.passages().len()
        );
        for (id, reason) in &report.failed {
            println!("  Failed: {} ({})", id, reason);
        }
    }

    if !report.failed.is_empty() {
        warn!("{} documents failed to ingest", report.failed.len());
        anyhow::bail!("{} documents failed to ingest", report.failed.len());
    }

    Ok(())
}
