//! Read-only access to the documents being indexed.

use std::future::Future;
use std::pin::Pin;

use rusqlite::OptionalExtension;
use tokio_rusqlite::Connection;

use crate::knowledge::core::config::StorageConfig;
use crate::knowledge::core::document::Document;
use crate::knowledge::core::errors::{KnowledgeError, KnowledgeResult};

/// Boxed future type for content source operations.
pub type SourceFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// Supplies documents by slug.
pub trait ContentSource: Send + Sync {
    /// Fetch a document by slug.
    ///
    /// # Errors
    /// Returns `KnowledgeError::NotFound` if the slug is unknown, or a storage error.
    fn get_document(&self, slug: &str) -> SourceFuture<'_, KnowledgeResult<Document>>;
    /// List all document slugs in the source's own order.
    ///
    /// # Errors
    /// Returns an error if the source cannot be enumerated.
    fn list_documents(&self) -> SourceFuture<'_, KnowledgeResult<Vec<String>>>;
}

/// Content source backed by a `SQLite` table
/// `(slug TEXT PRIMARY KEY, title TEXT, body TEXT, summary TEXT)`.
pub struct SqliteContentSource {
    conn: Connection,
    table: String,
}

impl SqliteContentSource {
    /// Open the content source at the configured database path, creating an empty
    /// documents table if none exists.
    ///
    /// # Errors
    /// Returns an error if the database cannot be opened.
    pub async fn new(config: &StorageConfig) -> KnowledgeResult<Self> {
        let conn = Connection::open(&config.sqlite_path).await?;
        let table = config.documents_table.clone();
        conn.call(move |conn| {
            conn.execute(
                &format!(
                    "CREATE TABLE IF NOT EXISTS {table} (
                        slug TEXT PRIMARY KEY,
                        title TEXT NOT NULL,
                        body TEXT NOT NULL,
                        summary TEXT
                    )"
                ),
                [],
            )?;
            Ok(())
        })
        .await?;
        Ok(Self::from_connection(conn, &config.documents_table))
    }

    /// Use an existing connection.
    #[must_use]
    pub fn from_connection(conn: Connection, table: &str) -> Self {
        Self {
            conn,
            table: table.to_string(),
        }
    }
}

impl ContentSource for SqliteContentSource {
    fn get_document(&self, slug: &str) -> SourceFuture<'_, KnowledgeResult<Document>> {
        let slug = slug.to_string();
        Box::pin(async move {
            let table = self.table.clone();
            let key = slug.clone();
            let row = self
                .conn
                .call(move |conn| {
                    let row = conn
                        .query_row(
                            &format!(
                                "SELECT title, body, COALESCE(summary, '') FROM {table} WHERE slug = ?1"
                            ),
                            rusqlite::params![key],
                            |row| {
                                Ok(Document {
                                    title: row.get(0)?,
                                    body: row.get(1)?,
                                    summary: row.get(2)?,
                                })
                            },
                        )
                        .optional()?;
                    Ok(row)
                })
                .await?;

            row.ok_or(KnowledgeError::NotFound { slug })
        })
    }

    fn list_documents(&self) -> SourceFuture<'_, KnowledgeResult<Vec<String>>> {
        Box::pin(async move {
            let table = self.table.clone();
            let slugs = self
                .conn
                .call(move |conn| {
                    let mut stmt = conn.prepare(&format!("SELECT slug FROM {table} ORDER BY rowid"))?;
                    let slugs = stmt
                        .query_map([], |row| row.get::<_, String>(0))?
                        .collect::<Result<Vec<_>, rusqlite::Error>>()?;
                    Ok(slugs)
                })
                .await?;
            Ok(slugs)
        })
    }
}
