//! Connection management.
//!
//! One mutex-guarded write connection serializes every mutation; reads go
//! to a small ring of read-only connections that WAL keeps unblocked by the
//! writer. In-memory mode carries no ring at all, because separate
//! in-memory connections would be isolated databases; reads then fall back
//! to the writer.

pub mod pragmas;

use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use rusqlite::{Connection, OpenFlags};

use fieldsync_core::errors::FieldsyncResult;

use crate::to_store_err;

pub struct ConnectionPool {
    writer: Mutex<Connection>,
    readers: Vec<Mutex<Connection>>,
    cursor: AtomicUsize,
}

impl ConnectionPool {
    /// Open against a database file with the given number of read
    /// connections (clamped to a sane range).
    pub fn open(path: &Path, readers: usize) -> FieldsyncResult<Self> {
        let writer = Connection::open(path).map_err(|e| to_store_err(e.to_string()))?;
        pragmas::apply_pragmas(&writer)?;

        let mut ring = Vec::with_capacity(readers);
        for _ in 0..readers.clamp(1, 8) {
            let conn = Connection::open_with_flags(
                path,
                OpenFlags::SQLITE_OPEN_READ_ONLY | OpenFlags::SQLITE_OPEN_NO_MUTEX,
            )
            .map_err(|e| to_store_err(e.to_string()))?;
            pragmas::apply_read_pragmas(&conn)?;
            ring.push(Mutex::new(conn));
        }

        Ok(Self {
            writer: Mutex::new(writer),
            readers: ring,
            cursor: AtomicUsize::new(0),
        })
    }

    /// Open an in-memory pool (for testing). No read ring; every access
    /// goes through the writer.
    pub fn open_in_memory() -> FieldsyncResult<Self> {
        let writer = Connection::open_in_memory().map_err(|e| to_store_err(e.to_string()))?;
        pragmas::apply_pragmas(&writer)?;
        Ok(Self {
            writer: Mutex::new(writer),
            readers: Vec::new(),
            cursor: AtomicUsize::new(0),
        })
    }

    /// Run a mutation on the writer. Holds the write lock for the duration
    /// of the closure.
    pub fn with_writer<F, T>(&self, f: F) -> FieldsyncResult<T>
    where
        F: FnOnce(&Connection) -> FieldsyncResult<T>,
    {
        let guard = self
            .writer
            .lock()
            .map_err(|e| to_store_err(format!("write connection lock poisoned: {e}")))?;
        f(&guard)
    }

    /// Run a read on the next ring connection, round-robin; falls back to
    /// the writer when there is no ring.
    pub fn with_reader<F, T>(&self, f: F) -> FieldsyncResult<T>
    where
        F: FnOnce(&Connection) -> FieldsyncResult<T>,
    {
        if self.readers.is_empty() {
            return self.with_writer(f);
        }
        let idx = self.cursor.fetch_add(1, Ordering::Relaxed) % self.readers.len();
        let guard = self.readers[idx]
            .lock()
            .map_err(|e| to_store_err(format!("read connection lock poisoned: {e}")))?;
        f(&guard)
    }
}
