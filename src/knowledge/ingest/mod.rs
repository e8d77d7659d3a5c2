//! Chunking, hashing, and indexing of source documents.

pub mod chunker;
pub mod hashing;
pub mod indexer;

pub use chunker::{Chunker, document_header};
pub use hashing::content_hash;
pub use indexer::{DocumentStatus, IndexAllReport, IndexOutcome, IndexStatus, Indexer};
