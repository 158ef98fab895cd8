//! v002: review queue — review_items (one per document) and their
//! extracted_fields.

use rusqlite::Connection;

use crate::{to_storage_err, StorageResult};

pub fn migrate(conn: &Connection) -> StorageResult<()> {
    conn.execute_batch(
        "
        CREATE TABLE IF NOT EXISTS review_items (
            id           TEXT PRIMARY KEY,
            document_id  TEXT NOT NULL UNIQUE,
            filename     TEXT NOT NULL,
            status       TEXT NOT NULL DEFAULT 'pending'
                         CHECK (status IN ('pending','in_review','approved','corrected','rejected')),
            priority     REAL NOT NULL DEFAULT 0,
            sla_deadline TEXT,
            assigned_to  TEXT,
            created_at   TEXT NOT NULL,
            claimed_at   TEXT,
            completed_at TEXT
        );

        CREATE INDEX IF NOT EXISTS idx_review_items_status
            ON review_items(status);
        CREATE INDEX IF NOT EXISTS idx_review_items_priority
            ON review_items(priority DESC);

        CREATE TABLE IF NOT EXISTS extracted_fields (
            id                 TEXT PRIMARY KEY,
            review_item_id     TEXT NOT NULL REFERENCES review_items(id) ON DELETE CASCADE,
            field_name         TEXT NOT NULL,
            value              TEXT,
            confidence         REAL NOT NULL DEFAULT 0,
            manually_corrected INTEGER NOT NULL DEFAULT 0,
            corrected_at       TEXT,
            corrected_by       TEXT,
            locked             INTEGER NOT NULL DEFAULT 0
        );

        CREATE INDEX IF NOT EXISTS idx_extracted_fields_item
            ON extracted_fields(review_item_id);
        ",
    )
    .map_err(|e| to_storage_err(e.to_string()))?;
    Ok(())
}
