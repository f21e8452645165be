//! Document-record store boundary.
//!
//! The pipeline records one row per successfully ingested source and
//! never updates it afterward. The store itself is an external
//! collaborator, held behind [`DocumentStore`] so another backend can be
//! substituted; [`SqliteDocumentStore`] is the shipped implementation.

use async_trait::async_trait;
use sqlx::{Row, SqlitePool};

use crate::error::{RagError, Result};
use crate::models::DocumentRecord;

#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// Insert one write-once record.
    async fn insert_one(&self, record: &DocumentRecord) -> Result<()>;

    /// All records for a conversation, oldest first.
    async fn find_for_conversation(&self, conversation_id: &str) -> Result<Vec<DocumentRecord>>;

    /// Remove a conversation's records. Returns the number removed.
    async fn delete_for_conversation(&self, conversation_id: &str) -> Result<u64>;
}

pub struct SqliteDocumentStore {
    pool: SqlitePool,
}

impl SqliteDocumentStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl DocumentStore for SqliteDocumentStore {
    async fn insert_one(&self, record: &DocumentRecord) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO documents (id, conversation_id, name, kind, chunk_count, processed_at)
            VALUES (?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&record.id)
        .bind(&record.conversation_id)
        .bind(&record.name)
        .bind(&record.kind)
        .bind(record.chunk_count)
        .bind(record.processed_at)
        .execute(&self.pool)
        .await
        .map_err(|e| RagError::Store(e.to_string()))?;
        Ok(())
    }

    async fn find_for_conversation(&self, conversation_id: &str) -> Result<Vec<DocumentRecord>> {
        let rows = sqlx::query(
            r#"
            SELECT id, conversation_id, name, kind, chunk_count, processed_at
            FROM documents
            WHERE conversation_id = ?
            ORDER BY processed_at, id
            "#,
        )
        .bind(conversation_id)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| RagError::Store(e.to_string()))?;

        Ok(rows
            .iter()
            .map(|row| DocumentRecord {
                id: row.get("id"),
                conversation_id: row.get("conversation_id"),
                name: row.get("name"),
                kind: row.get("kind"),
                chunk_count: row.get("chunk_count"),
                processed_at: row.get("processed_at"),
            })
            .collect())
    }

    async fn delete_for_conversation(&self, conversation_id: &str) -> Result<u64> {
        let result = sqlx::query("DELETE FROM documents WHERE conversation_id = ?")
            .bind(conversation_id)
            .execute(&self.pool)
            .await
            .map_err(|e| RagError::Store(e.to_string()))?;
        Ok(result.rows_affected())
    }
}
