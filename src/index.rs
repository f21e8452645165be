//! Per-conversation vector collections over SQLite.
//!
//! Each conversation owns an independent namespace keyed by its id; every
//! statement filters on `conversation_id`, so a search in one conversation
//! can never surface chunks ingested under another. Vectors live as
//! little-endian f32 BLOBs next to their chunk text; similarity search is
//! brute-force cosine over the collection's rows, computed in process.

use std::sync::Arc;

use sqlx::{Row, SqlitePool};
use tracing::debug;

use crate::embedding::{blob_to_vec, cosine_distance, vec_to_blob, EmbeddingProvider};
use crate::error::{RagError, Result};
use crate::models::{Chunk, ScoredChunk};

pub struct VectorIndex {
    pool: SqlitePool,
    embedder: Arc<dyn EmbeddingProvider>,
}

impl VectorIndex {
    pub fn new(pool: SqlitePool, embedder: Arc<dyn EmbeddingProvider>) -> Self {
        Self { pool, embedder }
    }

    /// Embed the chunks in one batch and insert them into the
    /// conversation's collection. Runs in a single transaction, so a
    /// concurrent search observes either none or all of the batch.
    pub async fn upsert(&self, conversation_id: &str, chunks: &[Chunk]) -> Result<()> {
        if chunks.is_empty() {
            return Ok(());
        }

        let texts: Vec<String> = chunks.iter().map(|c| c.text.clone()).collect();
        let vectors = self.embedder.embed(&texts).await?;
        if vectors.len() != chunks.len() {
            return Err(RagError::Embedding(format!(
                "expected {} vectors, got {}",
                chunks.len(),
                vectors.len()
            )));
        }

        let mut tx = self.pool.begin().await?;
        for (chunk, vector) in chunks.iter().zip(vectors.iter()) {
            sqlx::query(
                r#"
                INSERT INTO chunks (id, conversation_id, source, chunk_index, text, embedding)
                VALUES (?, ?, ?, ?, ?, ?)
                ON CONFLICT(id) DO UPDATE SET
                    text = excluded.text,
                    embedding = excluded.embedding
                "#,
            )
            .bind(&chunk.id)
            .bind(conversation_id)
            .bind(&chunk.source)
            .bind(chunk.chunk_index)
            .bind(&chunk.text)
            .bind(vec_to_blob(vector))
            .execute(&mut *tx)
            .await?;
        }
        tx.commit().await?;

        debug!(
            conversation_id,
            chunks = chunks.len(),
            model = self.embedder.model_name(),
            "upserted chunks"
        );
        Ok(())
    }

    /// K-nearest chunks for a query, ordered best-first (smallest
    /// distance). An empty collection yields an empty result, not an
    /// error; the query is not even embedded in that case.
    pub async fn search(
        &self,
        conversation_id: &str,
        query_text: &str,
        k: usize,
    ) -> Result<Vec<ScoredChunk>> {
        let rows = sqlx::query(
            r#"
            SELECT id, conversation_id, source, chunk_index, text, embedding
            FROM chunks
            WHERE conversation_id = ?
            "#,
        )
        .bind(conversation_id)
        .fetch_all(&self.pool)
        .await?;

        if rows.is_empty() {
            return Ok(Vec::new());
        }

        let query_vec = self.embedder.embed_query(query_text).await?;

        let mut scored: Vec<ScoredChunk> = rows
            .iter()
            .map(|row| {
                let blob: Vec<u8> = row.get("embedding");
                let vector = blob_to_vec(&blob);
                ScoredChunk {
                    chunk: Chunk {
                        id: row.get("id"),
                        conversation_id: row.get("conversation_id"),
                        source: row.get("source"),
                        chunk_index: row.get("chunk_index"),
                        text: row.get("text"),
                    },
                    distance: cosine_distance(&query_vec, &vector),
                }
            })
            .collect();

        // Ascending distance; ties broken by index then id for a
        // deterministic ordering.
        scored.sort_by(|a, b| {
            a.distance
                .partial_cmp(&b.distance)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then(a.chunk.chunk_index.cmp(&b.chunk.chunk_index))
                .then(a.chunk.id.cmp(&b.chunk.id))
        });
        scored.truncate(k);

        Ok(scored)
    }

    /// Remove the whole collection. Idempotent: deleting a conversation
    /// that was never ingested into is a no-op.
    pub async fn delete_collection(&self, conversation_id: &str) -> Result<()> {
        let result = sqlx::query("DELETE FROM chunks WHERE conversation_id = ?")
            .bind(conversation_id)
            .execute(&self.pool)
            .await?;
        debug!(
            conversation_id,
            removed = result.rows_affected(),
            "deleted collection"
        );
        Ok(())
    }

    /// Number of chunks in the conversation's collection.
    pub async fn count(&self, conversation_id: &str) -> Result<i64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM chunks WHERE conversation_id = ?")
            .bind(conversation_id)
            .fetch_one(&self.pool)
            .await?;
        Ok(count)
    }
}
