//! Connection handling: one serialized write connection plus a small
//! round-robin pool of read connections.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex as StdMutex;

use rusqlite::Connection;
use tokio::sync::Mutex;

use crate::{to_storage_err, StorageResult};

/// The single write connection. All mutations are serialized through it;
/// multi-statement mutations go through [`WriteConnection::with_txn`].
pub struct WriteConnection {
    conn: Mutex<Connection>,
}

impl WriteConnection {
    pub fn new(conn: Connection) -> Self {
        Self {
            conn: Mutex::new(conn),
        }
    }

    /// Run a closure against the write connection.
    pub async fn with_conn<T>(
        &self,
        f: impl FnOnce(&Connection) -> StorageResult<T>,
    ) -> StorageResult<T> {
        let conn = self.conn.lock().await;
        f(&conn)
    }

    /// Synchronous variant for non-async callers (tests, setup code).
    /// Must not be called from within an async context.
    pub fn with_conn_sync<T>(
        &self,
        f: impl FnOnce(&Connection) -> StorageResult<T>,
    ) -> StorageResult<T> {
        let conn = self.conn.blocking_lock();
        f(&conn)
    }

    /// Run a closure inside a single `BEGIN IMMEDIATE … COMMIT` transaction;
    /// any error rolls back.
    pub async fn with_txn<T>(
        &self,
        f: impl FnOnce(&Connection) -> StorageResult<T>,
    ) -> StorageResult<T> {
        let conn = self.conn.lock().await;
        conn.execute_batch("BEGIN IMMEDIATE")
            .map_err(|e| to_storage_err(format!("begin transaction: {e}")))?;

        match f(&conn) {
            Ok(value) => {
                conn.execute_batch("COMMIT")
                    .map_err(|e| to_storage_err(format!("commit: {e}")))?;
                Ok(value)
            }
            Err(e) => {
                let _ = conn.execute_batch("ROLLBACK");
                Err(e)
            }
        }
    }
}

/// Round-robin pool of read connections.
pub struct ReadPool {
    connections: Vec<StdMutex<Connection>>,
    next: AtomicUsize,
}

impl ReadPool {
    pub fn new(connections: Vec<Connection>) -> Self {
        Self {
            connections: connections.into_iter().map(StdMutex::new).collect(),
            next: AtomicUsize::new(0),
        }
    }

    /// Run a read-only closure against the next connection in rotation.
    pub fn with_conn<T>(
        &self,
        f: impl FnOnce(&Connection) -> StorageResult<T>,
    ) -> StorageResult<T> {
        let idx = self.next.fetch_add(1, Ordering::Relaxed) % self.connections.len();
        let conn = self
            .connections[idx]
            .lock()
            .map_err(|e| to_storage_err(format!("read connection poisoned: {e}")))?;
        f(&conn)
    }
}
