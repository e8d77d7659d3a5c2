//! Persistent index storage.

pub mod index_store;
pub mod sqlite_vec_loader;

pub use index_store::{IndexStore, SqliteIndexStore, StoreFuture, build_match_query};
pub use sqlite_vec_loader::init_sqlite_vec_extension;
