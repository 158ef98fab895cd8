//! v004: content-hash keyed idempotency cache.

use rusqlite::Connection;

use crate::{to_storage_err, StorageResult};

pub fn migrate(conn: &Connection) -> StorageResult<()> {
    conn.execute_batch(
        "
        CREATE TABLE IF NOT EXISTS processed_documents (
            content_hash TEXT PRIMARY KEY,
            document_id  TEXT NOT NULL,
            filename     TEXT NOT NULL,
            result_json  TEXT NOT NULL,
            created_at   TEXT NOT NULL
        );
        ",
    )
    .map_err(|e| to_storage_err(e.to_string()))?;
    Ok(())
}
