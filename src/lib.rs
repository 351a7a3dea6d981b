//! corpusflower - passage index for document corpora
//!
//! Documents are split into overlapping, addressable passages
//! ([`chunker`]), embedded and stored in an exact cosine index ([`index`]),
//! and queried either lexically, as a concordance of every occurrence of a
//! term with its context ([`concordance`]), or semantically
//! ([`retriever`]).
//!
//! ```no_run
//! use std::sync::Arc;
//! use corpusflower::embedding::HashEmbedder;
//! use corpusflower::index::{PassageStore, VectorIndex};
//! use corpusflower::retriever::{Query, Retriever};
//!
//! # fn main() -> corpusflower::Result<()> {
//! let retriever = Retriever::new(Arc::new(VectorIndex::new()), Arc::new(PassageStore::new()))
//!     .with_embedder(Arc::new(HashEmbedder::default()));
//! let result = retriever.retrieve(&Query::lexical("seal").with_k(10))?;
//! # Ok(())
//! # }
//! ```

pub mod chunker;
pub mod concordance;
pub mod embedding;
pub mod error;
pub mod http;
pub mod index;
pub mod ingest;
pub mod retriever;
pub mod source;

pub use error::{Error, Result};
