//! v001: documents table — the lifecycle anchor for every upload.

use rusqlite::Connection;

use crate::{to_storage_err, StorageResult};

pub fn migrate(conn: &Connection) -> StorageResult<()> {
    conn.execute_batch(
        "
        CREATE TABLE IF NOT EXISTS documents (
            id            TEXT PRIMARY KEY,
            stored_name   TEXT NOT NULL,
            original_name TEXT NOT NULL,
            mime_type     TEXT NOT NULL DEFAULT 'application/pdf',
            status        TEXT NOT NULL DEFAULT 'queued'
                          CHECK (status IN ('queued','processing','completed','failed','duplicate')),
            task_id       TEXT,
            error_message TEXT,
            created_at    TEXT NOT NULL,
            updated_at    TEXT NOT NULL
        );

        CREATE INDEX IF NOT EXISTS idx_documents_status
            ON documents(status);
        CREATE INDEX IF NOT EXISTS idx_documents_created
            ON documents(created_at DESC);
        ",
    )
    .map_err(|e| to_storage_err(e.to_string()))?;
    Ok(())
}
