use anyhow::Result;
use sqlx::SqlitePool;

/// Create the schema. Idempotent: safe to run on every startup.
pub async fn run_migrations(pool: &SqlitePool) -> Result<()> {
    // Embedded chunks, one logical collection per conversation
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS chunks (
            id TEXT PRIMARY KEY,
            conversation_id TEXT NOT NULL,
            source TEXT NOT NULL,
            chunk_index INTEGER NOT NULL,
            text TEXT NOT NULL,
            embedding BLOB NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    // Write-once document records
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS documents (
            id TEXT PRIMARY KEY,
            conversation_id TEXT NOT NULL,
            name TEXT NOT NULL,
            kind TEXT NOT NULL,
            chunk_count INTEGER NOT NULL,
            processed_at INTEGER NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        "CREATE INDEX IF NOT EXISTS idx_chunks_conversation_id ON chunks(conversation_id)",
    )
    .execute(pool)
    .await?;
    sqlx::query(
        "CREATE INDEX IF NOT EXISTS idx_documents_conversation_id ON documents(conversation_id)",
    )
    .execute(pool)
    .await?;

    Ok(())
}
