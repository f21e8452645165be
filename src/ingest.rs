//! Ingestion pipeline orchestration.
//!
//! Coordinates extraction → chunking → embedding/indexing → document
//! record, in that order. Extraction and index failures abort the input
//! before any record is written. A record-write failure after a
//! successful upsert leaves orphaned vectors behind; that inconsistency
//! is logged and surfaced, not repaired. Orphans are invisible without
//! their record and do not corrupt retrieval for other documents.

use std::sync::Arc;

use tracing::{info, warn};
use uuid::Uuid;

use crate::chunk::chunk_units;
use crate::config::{ChunkingConfig, FetchConfig};
use crate::error::Result;
use crate::extract;
use crate::index::VectorIndex;
use crate::models::{DocumentRecord, SourceInput};
use crate::store::DocumentStore;

pub struct IngestionPipeline {
    index: Arc<VectorIndex>,
    store: Arc<dyn DocumentStore>,
    chunking: ChunkingConfig,
    fetch: FetchConfig,
}

impl IngestionPipeline {
    pub fn new(
        index: Arc<VectorIndex>,
        store: Arc<dyn DocumentStore>,
        chunking: ChunkingConfig,
        fetch: FetchConfig,
    ) -> Self {
        Self {
            index,
            store,
            chunking,
            fetch,
        }
    }

    /// Ingest one file or URL into a conversation's knowledge scope and
    /// return the new document id.
    ///
    /// Errors propagate to the caller; whether to continue with the rest
    /// of a batch is the caller's decision.
    pub async fn ingest(&self, conversation_id: &str, input: &SourceInput) -> Result<String> {
        let units = match input {
            SourceInput::File { path, name } => {
                extract::extract_file(path, name, conversation_id).await?
            }
            SourceInput::Url { url } => {
                extract::extract_url(url, conversation_id, &self.fetch).await?
            }
        };

        let chunks = chunk_units(&units, &self.chunking);
        self.index.upsert(conversation_id, &chunks).await?;

        let record = DocumentRecord {
            id: Uuid::new_v4().to_string(),
            conversation_id: conversation_id.to_string(),
            name: input.display_name().to_string(),
            kind: input.kind_label().to_string(),
            chunk_count: chunks.len() as i64,
            processed_at: chrono::Utc::now().timestamp(),
        };

        if let Err(e) = self.store.insert_one(&record).await {
            warn!(
                conversation_id,
                source = %record.name,
                orphaned_chunks = chunks.len(),
                "document record write failed after vector upsert: {}",
                e
            );
            return Err(e);
        }

        info!(
            conversation_id,
            document_id = %record.id,
            source = %record.name,
            kind = %record.kind,
            chunks = record.chunk_count,
            "ingested"
        );
        Ok(record.id)
    }

    /// Tear down a conversation's knowledge scope: vectors first, then
    /// document records. Ordering across the two stores is best-effort;
    /// there is no cross-store transaction.
    pub async fn delete_conversation(&self, conversation_id: &str) -> Result<()> {
        self.index.delete_collection(conversation_id).await?;
        let removed = self.store.delete_for_conversation(conversation_id).await?;
        info!(conversation_id, records = removed, "conversation forgotten");
        Ok(())
    }
}
