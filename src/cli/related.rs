//! Related command - browse the semantic document graph

use clap::Args;

use super::open_corpus;

#[derive(Args)]
pub struct RelatedArgs {
    /// Corpus name or path
    pub index_name: String,

    /// Document to show neighbours for (default: every link in the graph)
    pub document: Option<String>,

    /// Output format (text, json)
    #[arg(long, default_value = "text", value_parser = ["text", "json"])]
    pub format: String,
}

pub async fn run(args: RelatedArgs) -> anyhow::Result<()> {
    let corpus = open_corpus(&args.index_name)?;
    let graph = corpus.graph();

    let Some(document) = &args.document else {
        if args.format == "json" {
            println!("{}", serde_json::to_string_pretty(graph)?);
            return Ok(());
        }
        println!("{} documents, {} links", graph.node_count(), graph.edge_count());
        for edge in graph.edges() {
            println!("  {:.3}  {} <-> {}", edge.weight, edge.source, edge.target);
        }
        return Ok(());
    };

    let Some(node) = graph.node(document) else {
        anyhow::bail!("Document '{}' is not in corpus '{}'", document, args.index_name);
    };
    let neighbors = graph.neighbors(document);

    if args.format == "json" {
        let related: Vec<_> = neighbors
            .iter()
            .map(|(id, weight)| serde_json::json!({ "document_id": id, "weight": weight }))
            .collect();
        let out = serde_json::json!({ "document": node, "related": related });
        println!("{}", serde_json::to_string_pretty(&out)?);
        return Ok(());
    }

    let language = node.language.as_deref().unwrap_or("unknown");
    println!("{} ({}, {})", node.id, node.title, language);
    if neighbors.is_empty() {
        println!("  No related documents");
    }
    for (id, weight) in neighbors {
        println!("  {:.3}  {}", weight, id);
    }

    Ok(())
}
