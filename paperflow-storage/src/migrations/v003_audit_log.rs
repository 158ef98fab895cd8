//! v003: append-only audit log for review-queue actions.

use rusqlite::Connection;

use crate::{to_storage_err, StorageResult};

pub fn migrate(conn: &Connection) -> StorageResult<()> {
    conn.execute_batch(
        "
        CREATE TABLE IF NOT EXISTS audit_log (
            id         INTEGER PRIMARY KEY AUTOINCREMENT,
            item_id    TEXT NOT NULL,
            action     TEXT NOT NULL
                       CHECK (action IN ('start_review','correction','approval','rejection','auto_assign')),
            field_name TEXT,
            old_value  TEXT,
            new_value  TEXT,
            actor      TEXT,
            created_at TEXT NOT NULL
        );

        CREATE INDEX IF NOT EXISTS idx_audit_log_item
            ON audit_log(item_id);
        ",
    )
    .map_err(|e| to_storage_err(e.to_string()))?;
    Ok(())
}
