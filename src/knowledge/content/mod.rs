//! Content source abstraction.

pub mod content_source;

pub use content_source::{ContentSource, SourceFuture, SqliteContentSource};
