//! Index module - passage storage, vector search, the document graph and
//! the on-disk corpus

mod corpus;
mod graph;
mod locate;
mod meta;
mod passages;
mod vector;

pub use corpus::{
    CorpusIndex, CENTROIDS_FILE, GRAPH_FILE, MANIFEST_FILE, META_FILE, PASSAGES_FILE, TERMS_FILE, VECTORS_FILE,
};
pub use graph::{GraphEdge, GraphNode, SemanticGraph, GRAPH_NEIGHBORS};
pub use locate::{find_index, local_index_path, STATE_DIR};
pub use meta::{IndexMeta, META_VERSION};
pub use passages::{Metadata, Passage, PassageStore};
pub use vector::{cosine, IndexEntry, ScoredPassage, VectorIndex, FORMAT_VERSION};
