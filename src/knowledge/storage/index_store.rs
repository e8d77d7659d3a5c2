//! Document and chunk index backed by `SQLite`, sqlite-vec, and FTS5.
//!
//! Two logical tables are kept: one embedding row per document and many chunk rows
//! per document. Chunk vectors live in a `vec0` table keyed by the chunk row id and
//! chunk text is mirrored into an external-content FTS5 table by triggers.

use std::future::Future;
use std::pin::Pin;

use chrono::{TimeZone, Utc};
use rusqlite::OptionalExtension;
use tokio_rusqlite::Connection;

use crate::knowledge::core::config::KnowledgeConfig;
use crate::knowledge::core::document::{
    Chunk, ChunkMetadata, DocumentEmbedding, IndexedDocument, NewChunk, RetrievedChunk,
};
use crate::knowledge::core::errors::{KnowledgeError, KnowledgeResult};
use crate::knowledge::storage::sqlite_vec_loader::init_sqlite_vec_extension;

/// Boxed future type for index store operations.
pub type StoreFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// Persistence for document embeddings and chunks.
pub trait IndexStore: Send + Sync {
    /// Insert or overwrite the embedding row for a document.
    ///
    /// # Errors
    /// Returns an error if the row cannot be written.
    fn upsert_document_embedding(
        &self,
        row: DocumentEmbedding,
    ) -> StoreFuture<'_, KnowledgeResult<()>>;
    /// Load the embedding row for a document.
    ///
    /// # Errors
    /// Returns an error if storage access fails.
    fn document_embedding(
        &self,
        slug: &str,
    ) -> StoreFuture<'_, KnowledgeResult<Option<DocumentEmbedding>>>;
    /// List every indexed document without vectors.
    ///
    /// # Errors
    /// Returns an error if storage access fails.
    fn list_document_embeddings(&self) -> StoreFuture<'_, KnowledgeResult<Vec<IndexedDocument>>>;
    /// Atomically replace all chunks of `slug` with `chunks`.
    ///
    /// # Errors
    /// Returns an error if the transaction fails; previous chunks are then kept.
    fn replace_chunks(
        &self,
        slug: &str,
        chunks: Vec<NewChunk>,
    ) -> StoreFuture<'_, KnowledgeResult<()>>;
    /// Load the chunks of `slug` ordered by chunk index.
    ///
    /// # Errors
    /// Returns an error if storage access fails.
    fn chunks_for(&self, slug: &str) -> StoreFuture<'_, KnowledgeResult<Vec<Chunk>>>;
    /// Delete the embedding row and all chunks of `slug`. Idempotent.
    ///
    /// # Errors
    /// Returns an error if the transaction fails.
    fn delete_document(&self, slug: &str) -> StoreFuture<'_, KnowledgeResult<()>>;
    /// Nearest chunks by cosine distance, scored `1 - distance`, best first.
    ///
    /// # Errors
    /// Returns an error if the query fails or the vector has the wrong size.
    fn vector_search(
        &self,
        vector: Vec<f32>,
        limit: usize,
    ) -> StoreFuture<'_, KnowledgeResult<Vec<RetrievedChunk>>>;
    /// Chunks ranked by full-text relevance to `query`, best first.
    ///
    /// # Errors
    /// Returns an error if the query fails.
    fn lexical_search(
        &self,
        query: &str,
        limit: usize,
    ) -> StoreFuture<'_, KnowledgeResult<Vec<RetrievedChunk>>>;
}

/// Build an FTS5 `MATCH` expression from the alphanumeric tokens of `query`.
///
/// Tokens are quoted and joined with `OR`; returns `None` when nothing is searchable.
#[must_use]
pub fn build_match_query(query: &str) -> Option<String> {
    let mut tokens: Vec<String> = Vec::new();
    for token in query
        .split(|c: char| !c.is_alphanumeric())
        .filter(|t| !t.is_empty())
    {
        let token = token.to_lowercase();
        if !tokens.contains(&token) {
            tokens.push(token);
        }
    }

    if tokens.is_empty() {
        return None;
    }

    Some(
        tokens
            .iter()
            .map(|t| format!("\"{t}\""))
            .collect::<Vec<_>>()
            .join(" OR "),
    )
}

/// `SQLite` implementation of the index store.
pub struct SqliteIndexStore {
    conn: Connection,
    embeddings_table: String,
    chunks_table: String,
    ndims: usize,
}

impl SqliteIndexStore {
    /// Open the store at the configured database path and create its schema.
    ///
    /// # Errors
    /// Returns an error if the database cannot be opened or sqlite-vec is missing.
    pub async fn new(config: &KnowledgeConfig) -> KnowledgeResult<Self> {
        init_sqlite_vec_extension();
        let conn = Connection::open(&config.storage.sqlite_path).await?;
        Self::from_connection(conn, config).await
    }

    /// Open a private in-memory store.
    ///
    /// # Errors
    /// Returns an error if the schema cannot be created or sqlite-vec is missing.
    pub async fn open_in_memory(config: &KnowledgeConfig) -> KnowledgeResult<Self> {
        init_sqlite_vec_extension();
        let conn = Connection::open_in_memory().await?;
        Self::from_connection(conn, config).await
    }

    /// Use an existing connection. sqlite-vec must already be registered.
    ///
    /// # Errors
    /// Returns an error if the schema cannot be created or sqlite-vec is missing.
    pub async fn from_connection(conn: Connection, config: &KnowledgeConfig) -> KnowledgeResult<Self> {
        let has_vec = conn
            .call(|conn| {
                Ok(conn
                    .query_row("SELECT vec_version()", [], |row| row.get::<_, String>(0))
                    .is_ok())
            })
            .await?;
        if !has_vec {
            return Err(KnowledgeError::SqliteVecUnavailable);
        }

        let embeddings_table = config.storage.embeddings_table.clone();
        let chunks_table = config.storage.chunks_table.clone();
        let ndims = config.embedding.ndims;

        let emb = embeddings_table.clone();
        let chunks = chunks_table.clone();
        conn.call(move |conn| {
            conn.execute_batch(&format!(
                "CREATE TABLE IF NOT EXISTS {emb} (
                    slug TEXT PRIMARY KEY,
                    content_hash TEXT NOT NULL,
                    embedding TEXT NOT NULL,
                    updated_at INTEGER NOT NULL
                );
                CREATE TABLE IF NOT EXISTS {chunks} (
                    id INTEGER PRIMARY KEY AUTOINCREMENT,
                    slug TEXT NOT NULL,
                    chunk_index INTEGER NOT NULL,
                    content TEXT NOT NULL,
                    metadata_json TEXT NOT NULL,
                    UNIQUE (slug, chunk_index)
                );
                CREATE VIRTUAL TABLE IF NOT EXISTS {chunks}_fts USING fts5(
                    content,
                    content='{chunks}',
                    content_rowid='id',
                    tokenize='porter unicode61'
                );
                CREATE TRIGGER IF NOT EXISTS {chunks}_ai AFTER INSERT ON {chunks} BEGIN
                    INSERT INTO {chunks}_fts(rowid, content) VALUES (NEW.id, NEW.content);
                END;
                CREATE TRIGGER IF NOT EXISTS {chunks}_ad AFTER DELETE ON {chunks} BEGIN
                    INSERT INTO {chunks}_fts({chunks}_fts, rowid, content)
                        VALUES ('delete', OLD.id, OLD.content);
                END;
                CREATE TRIGGER IF NOT EXISTS {chunks}_au AFTER UPDATE ON {chunks} BEGIN
                    INSERT INTO {chunks}_fts({chunks}_fts, rowid, content)
                        VALUES ('delete', OLD.id, OLD.content);
                    INSERT INTO {chunks}_fts(rowid, content) VALUES (NEW.id, NEW.content);
                END;
                CREATE VIRTUAL TABLE IF NOT EXISTS {chunks}_vec USING vec0(
                    embedding float[{ndims}] distance_metric=cosine
                );"
            ))?;
            Ok(())
        })
        .await?;

        Ok(Self {
            conn,
            embeddings_table,
            chunks_table,
            ndims,
        })
    }

    fn check_dims(&self, vector: &[f32]) -> KnowledgeResult<()> {
        if vector.len() == self.ndims {
            Ok(())
        } else {
            Err(KnowledgeError::DimensionMismatch {
                expected: self.ndims,
                actual: vector.len(),
            })
        }
    }
}

fn millis_to_datetime(ms: i64) -> KnowledgeResult<chrono::DateTime<Utc>> {
    Utc.timestamp_millis_opt(ms)
        .single()
        .ok_or_else(|| KnowledgeError::InvalidRow(format!("invalid updated_at timestamp {ms}")))
}

fn decode_index(value: i64) -> KnowledgeResult<usize> {
    usize::try_from(value)
        .map_err(|_| KnowledgeError::InvalidRow(format!("invalid chunk index {value}")))
}

/// Delete the vector rows, then the chunk rows (FTS follows via trigger) of `slug`.
fn delete_chunk_rows(
    tx: &rusqlite::Transaction<'_>,
    table: &str,
    slug: &str,
) -> Result<(), rusqlite::Error> {
    let ids = {
        let mut stmt = tx.prepare(&format!("SELECT id FROM {table} WHERE slug = ?1"))?;
        stmt.query_map(rusqlite::params![slug], |row| row.get::<_, i64>(0))?
            .collect::<Result<Vec<_>, rusqlite::Error>>()?
    };

    {
        let mut delete_vec = tx.prepare(&format!("DELETE FROM {table}_vec WHERE rowid = ?1"))?;
        for id in ids {
            delete_vec.execute(rusqlite::params![id])?;
        }
    }

    tx.execute(
        &format!("DELETE FROM {table} WHERE slug = ?1"),
        rusqlite::params![slug],
    )?;
    Ok(())
}

fn decode_retrieved(rows: Vec<(String, String, String, f64)>) -> KnowledgeResult<Vec<RetrievedChunk>> {
    rows.into_iter()
        .map(|(slug, content, metadata_json, score)| {
            let metadata: ChunkMetadata = serde_json::from_str(&metadata_json)?;
            Ok(RetrievedChunk {
                slug,
                title: metadata.title,
                content,
                score,
            })
        })
        .collect()
}

impl IndexStore for SqliteIndexStore {
    fn upsert_document_embedding(
        &self,
        row: DocumentEmbedding,
    ) -> StoreFuture<'_, KnowledgeResult<()>> {
        Box::pin(async move {
            self.check_dims(&row.vector)?;
            let table = self.embeddings_table.clone();
            let embedding = serde_json::to_string(&row.vector)?;
            let updated_at = row.updated_at.timestamp_millis();
            let slug = row.slug;
            let content_hash = row.content_hash;

            self.conn
                .call(move |conn| {
                    conn.execute(
                        &format!(
                            "INSERT INTO {table} (slug, content_hash, embedding, updated_at)
                             VALUES (?1, ?2, ?3, ?4)
                             ON CONFLICT(slug) DO UPDATE SET
                                content_hash = excluded.content_hash,
                                embedding = excluded.embedding,
                                updated_at = excluded.updated_at"
                        ),
                        rusqlite::params![slug, content_hash, embedding, updated_at],
                    )?;
                    Ok(())
                })
                .await?;
            Ok(())
        })
    }

    fn document_embedding(
        &self,
        slug: &str,
    ) -> StoreFuture<'_, KnowledgeResult<Option<DocumentEmbedding>>> {
        let slug = slug.to_string();
        Box::pin(async move {
            let table = self.embeddings_table.clone();
            let key = slug.clone();
            let row = self
                .conn
                .call(move |conn| {
                    let row = conn
                        .query_row(
                            &format!(
                                "SELECT content_hash, embedding, updated_at FROM {table} WHERE slug = ?1"
                            ),
                            rusqlite::params![key],
                            |row| {
                                let content_hash: String = row.get(0)?;
                                let embedding: String = row.get(1)?;
                                let updated_at: i64 = row.get(2)?;
                                Ok((content_hash, embedding, updated_at))
                            },
                        )
                        .optional()?;
                    Ok(row)
                })
                .await?;

            match row {
                Some((content_hash, embedding, updated_at)) => Ok(Some(DocumentEmbedding {
                    slug,
                    content_hash,
                    vector: serde_json::from_str(&embedding)?,
                    updated_at: millis_to_datetime(updated_at)?,
                })),
                None => Ok(None),
            }
        })
    }

    fn list_document_embeddings(&self) -> StoreFuture<'_, KnowledgeResult<Vec<IndexedDocument>>> {
        Box::pin(async move {
            let table = self.embeddings_table.clone();
            let rows = self
                .conn
                .call(move |conn| {
                    let mut stmt = conn.prepare(&format!(
                        "SELECT slug, content_hash, updated_at FROM {table} ORDER BY slug"
                    ))?;
                    let rows = stmt
                        .query_map([], |row| {
                            Ok((
                                row.get::<_, String>(0)?,
                                row.get::<_, String>(1)?,
                                row.get::<_, i64>(2)?,
                            ))
                        })?
                        .collect::<Result<Vec<_>, rusqlite::Error>>()?;
                    Ok(rows)
                })
                .await?;

            rows.into_iter()
                .map(|(slug, content_hash, updated_at)| {
                    Ok(IndexedDocument {
                        slug,
                        content_hash,
                        updated_at: millis_to_datetime(updated_at)?,
                    })
                })
                .collect()
        })
    }

    fn replace_chunks(
        &self,
        slug: &str,
        chunks: Vec<NewChunk>,
    ) -> StoreFuture<'_, KnowledgeResult<()>> {
        let slug = slug.to_string();
        Box::pin(async move {
            let mut rows = Vec::with_capacity(chunks.len());
            for chunk in chunks {
                self.check_dims(&chunk.vector)?;
                let chunk_index = i64::try_from(chunk.chunk_index).map_err(|_| {
                    KnowledgeError::InvalidRow(format!("invalid chunk index {}", chunk.chunk_index))
                })?;
                rows.push((
                    chunk_index,
                    chunk.content,
                    serde_json::to_string(&chunk.metadata)?,
                    serde_json::to_string(&chunk.vector)?,
                ));
            }

            let table = self.chunks_table.clone();
            self.conn
                .call(move |conn| {
                    let tx = conn.transaction()?;
                    delete_chunk_rows(&tx, &table, &slug)?;

                    {
                        let mut insert_chunk = tx.prepare(&format!(
                            "INSERT INTO {table} (slug, chunk_index, content, metadata_json)
                             VALUES (?1, ?2, ?3, ?4)"
                        ))?;
                        let mut insert_vec = tx.prepare(&format!(
                            "INSERT INTO {table}_vec (rowid, embedding) VALUES (?1, ?2)"
                        ))?;
                        for (chunk_index, content, metadata_json, embedding) in rows {
                            let id = insert_chunk.insert(rusqlite::params![
                                slug,
                                chunk_index,
                                content,
                                metadata_json
                            ])?;
                            insert_vec.execute(rusqlite::params![id, embedding])?;
                        }
                    }

                    tx.commit()?;
                    Ok(())
                })
                .await?;
            Ok(())
        })
    }

    fn chunks_for(&self, slug: &str) -> StoreFuture<'_, KnowledgeResult<Vec<Chunk>>> {
        let slug = slug.to_string();
        Box::pin(async move {
            let table = self.chunks_table.clone();
            let key = slug.clone();
            let rows = self
                .conn
                .call(move |conn| {
                    let mut stmt = conn.prepare(&format!(
                        "SELECT c.chunk_index, c.content, c.metadata_json, vec_to_json(v.embedding)
                         FROM {table} c JOIN {table}_vec v ON v.rowid = c.id
                         WHERE c.slug = ?1 ORDER BY c.chunk_index"
                    ))?;
                    let rows = stmt
                        .query_map(rusqlite::params![key], |row| {
                            Ok((
                                row.get::<_, i64>(0)?,
                                row.get::<_, String>(1)?,
                                row.get::<_, String>(2)?,
                                row.get::<_, String>(3)?,
                            ))
                        })?
                        .collect::<Result<Vec<_>, rusqlite::Error>>()?;
                    Ok(rows)
                })
                .await?;

            rows.into_iter()
                .map(|(chunk_index, content, metadata_json, embedding)| {
                    Ok(Chunk {
                        slug: slug.clone(),
                        chunk_index: decode_index(chunk_index)?,
                        content,
                        vector: serde_json::from_str(&embedding)?,
                        metadata: serde_json::from_str(&metadata_json)?,
                    })
                })
                .collect()
        })
    }

    fn delete_document(&self, slug: &str) -> StoreFuture<'_, KnowledgeResult<()>> {
        let slug = slug.to_string();
        Box::pin(async move {
            let chunks = self.chunks_table.clone();
            let embeddings = self.embeddings_table.clone();
            self.conn
                .call(move |conn| {
                    let tx = conn.transaction()?;
                    delete_chunk_rows(&tx, &chunks, &slug)?;
                    tx.execute(
                        &format!("DELETE FROM {embeddings} WHERE slug = ?1"),
                        rusqlite::params![slug],
                    )?;
                    tx.commit()?;
                    Ok(())
                })
                .await?;
            Ok(())
        })
    }

    fn vector_search(
        &self,
        vector: Vec<f32>,
        limit: usize,
    ) -> StoreFuture<'_, KnowledgeResult<Vec<RetrievedChunk>>> {
        Box::pin(async move {
            if limit == 0 {
                return Ok(Vec::new());
            }
            self.check_dims(&vector)?;
            let table = self.chunks_table.clone();
            let query_vector = serde_json::to_string(&vector)?;
            let k = i64::try_from(limit).unwrap_or(i64::MAX);

            let rows = self
                .conn
                .call(move |conn| {
                    let mut stmt = conn.prepare(&format!(
                        "WITH knn AS (
                            SELECT rowid, distance FROM {table}_vec
                            WHERE embedding MATCH ?1 AND k = ?2
                         )
                         SELECT c.slug, c.content, c.metadata_json, knn.distance
                         FROM knn JOIN {table} c ON c.id = knn.rowid
                         ORDER BY knn.distance ASC"
                    ))?;
                    let rows = stmt
                        .query_map(rusqlite::params![query_vector, k], |row| {
                            let distance: f64 = row.get(3)?;
                            Ok((
                                row.get::<_, String>(0)?,
                                row.get::<_, String>(1)?,
                                row.get::<_, String>(2)?,
                                1.0 - distance,
                            ))
                        })?
                        .collect::<Result<Vec<_>, rusqlite::Error>>()?;
                    Ok(rows)
                })
                .await?;

            decode_retrieved(rows)
        })
    }

    fn lexical_search(
        &self,
        query: &str,
        limit: usize,
    ) -> StoreFuture<'_, KnowledgeResult<Vec<RetrievedChunk>>> {
        let match_query = build_match_query(query);
        Box::pin(async move {
            let Some(match_query) = match_query else {
                return Ok(Vec::new());
            };
            if limit == 0 {
                return Ok(Vec::new());
            }
            let table = self.chunks_table.clone();
            let k = i64::try_from(limit).unwrap_or(i64::MAX);

            let rows = self
                .conn
                .call(move |conn| {
                    let mut stmt = conn.prepare(&format!(
                        "SELECT c.slug, c.content, c.metadata_json, -bm25({table}_fts) AS lexical_score
                         FROM {table}_fts JOIN {table} c ON c.id = {table}_fts.rowid
                         WHERE {table}_fts MATCH ?1
                         ORDER BY lexical_score DESC
                         LIMIT ?2"
                    ))?;
                    let rows = stmt
                        .query_map(rusqlite::params![match_query, k], |row| {
                            Ok((
                                row.get::<_, String>(0)?,
                                row.get::<_, String>(1)?,
                                row.get::<_, String>(2)?,
                                row.get::<_, f64>(3)?,
                            ))
                        })?
                        .collect::<Result<Vec<_>, rusqlite::Error>>()?;
                    Ok(rows)
                })
                .await?;

            decode_retrieved(rows)
        })
    }
}
