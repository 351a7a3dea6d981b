//! Known embedding models: vector length and asymmetric prompt prefixes

/// What we know about a named embedding model
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ModelProfile {
    /// Prefix added to passages during ingestion
    pub document_prefix: &'static str,
    /// Prefix added to queries at search time
    pub query_prefix: &'static str,
    pub dimensions: usize,
}

const fn symmetric(dimensions: usize) -> ModelProfile {
    ModelProfile {
        document_prefix: "",
        query_prefix: "",
        dimensions,
    }
}

/// Profile for a known model; version tags like `:latest` are ignored
pub fn model_profile(model_name: &str) -> Option<ModelProfile> {
    let base_name = model_name.split(':').next().unwrap_or(model_name);

    let profile = match base_name {
        "nomic-embed-text" | "nomic-embed-text-v1" | "nomic-embed-text-v1.5" => ModelProfile {
            document_prefix: "search_document: ",
            query_prefix: "search_query: ",
            dimensions: 768,
        },
        "mxbai-embed-large" | "mxbai-embed-large-v1" => ModelProfile {
            document_prefix: "",
            query_prefix: "Represent this sentence for searching relevant passages: ",
            dimensions: 1024,
        },
        "bge-m3" | "snowflake-arctic-embed" => symmetric(1024),
        "all-minilm" | "all-MiniLM-L6-v2" | "all-MiniLM-L12-v2" => symmetric(384),
        "text-embedding-3-small" | "text-embedding-ada-002" => symmetric(1536),
        "text-embedding-3-large" => symmetric(3072),
        _ => return None,
    };

    Some(profile)
}

/// Vector length of a known model
pub fn known_dimensions(model_name: &str) -> Option<usize> {
    model_profile(model_name).map(|p| p.dimensions)
}
