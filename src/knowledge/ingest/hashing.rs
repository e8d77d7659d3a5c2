//! Content hashing used to detect whether a document needs re-indexing.

use sha2::{Digest, Sha256};

use crate::knowledge::core::document::Document;

/// SHA-256 hex digest of `title + summary + body`.
#[must_use]
pub fn content_hash(document: &Document) -> String {
    let mut hasher = Sha256::new();
    hasher.update(document.title.as_bytes());
    hasher.update(document.summary.as_bytes());
    hasher.update(document.body.as_bytes());
    hex::encode(hasher.finalize())
}
