//! StorageEngine — owns the write connection and read pool, runs migrations
//! on open.

use std::path::Path;
use std::sync::Arc;

use rusqlite::{Connection, OpenFlags};
use tracing::info;

use crate::migrations;
use crate::pool::{ReadPool, WriteConnection};
use crate::{to_storage_err, StorageResult};

const READ_POOL_SIZE: usize = 4;

/// Handle to one Paperflow database.
pub struct StorageEngine {
    writer: Arc<WriteConnection>,
    readers: Arc<ReadPool>,
}

impl StorageEngine {
    /// Open (or create) a database file, apply pragmas and pending
    /// migrations, and build the read pool.
    pub fn open(path: &Path) -> StorageResult<Self> {
        let writer_conn =
            Connection::open(path).map_err(|e| to_storage_err(format!("open {path:?}: {e}")))?;
        writer_conn
            .execute_batch(
                "PRAGMA journal_mode = WAL;
                 PRAGMA synchronous = NORMAL;
                 PRAGMA busy_timeout = 5000;
                 PRAGMA foreign_keys = ON;",
            )
            .map_err(|e| to_storage_err(format!("pragmas: {e}")))?;

        migrations::run_migrations(&writer_conn)?;

        let mut readers = Vec::with_capacity(READ_POOL_SIZE);
        for _ in 0..READ_POOL_SIZE {
            // Read-write flags even for the pool: WAL readers still need to
            // map the shared-memory index.
            let conn = Connection::open_with_flags(
                path,
                OpenFlags::SQLITE_OPEN_READ_WRITE | OpenFlags::SQLITE_OPEN_NO_MUTEX,
            )
            .map_err(|e| to_storage_err(format!("open reader: {e}")))?;
            conn.execute_batch("PRAGMA busy_timeout = 5000;")
                .map_err(|e| to_storage_err(format!("reader pragmas: {e}")))?;
            readers.push(conn);
        }

        info!(path = %path.display(), "storage engine opened");
        Ok(Self {
            writer: Arc::new(WriteConnection::new(writer_conn)),
            readers: Arc::new(ReadPool::new(readers)),
        })
    }

    /// Open a fresh in-memory database (shared-cache so the read pool sees
    /// the writer's data). Used by tests and ephemeral tooling.
    pub fn open_in_memory() -> StorageResult<Self> {
        let uri = format!(
            "file:paperflow_{}?mode=memory&cache=shared",
            uuid::Uuid::new_v4().simple()
        );
        let flags = OpenFlags::SQLITE_OPEN_READ_WRITE
            | OpenFlags::SQLITE_OPEN_CREATE
            | OpenFlags::SQLITE_OPEN_URI
            | OpenFlags::SQLITE_OPEN_NO_MUTEX;

        let writer_conn = Connection::open_with_flags(&uri, flags)
            .map_err(|e| to_storage_err(format!("open in-memory: {e}")))?;
        writer_conn
            .execute_batch("PRAGMA foreign_keys = ON;")
            .map_err(|e| to_storage_err(format!("pragmas: {e}")))?;

        migrations::run_migrations(&writer_conn)?;

        let mut readers = Vec::with_capacity(2);
        for _ in 0..2 {
            let conn = Connection::open_with_flags(&uri, flags)
                .map_err(|e| to_storage_err(format!("open in-memory reader: {e}")))?;
            readers.push(conn);
        }

        Ok(Self {
            writer: Arc::new(WriteConnection::new(writer_conn)),
            readers: Arc::new(ReadPool::new(readers)),
        })
    }

    pub fn writer(&self) -> Arc<WriteConnection> {
        self.writer.clone()
    }

    pub fn readers(&self) -> Arc<ReadPool> {
        self.readers.clone()
    }
}
