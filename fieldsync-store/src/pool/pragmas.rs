//! PRAGMA configuration applied to every connection.
//!
//! WAL keeps readers unblocked by the writer; NORMAL sync is durable enough
//! for a device-local store that is itself the retry source of truth.

use rusqlite::Connection;

use fieldsync_core::errors::FieldsyncResult;

use crate::to_store_err;

/// Pragmas for the write connection.
pub fn apply_pragmas(conn: &Connection) -> FieldsyncResult<()> {
    conn.execute_batch(
        "
        PRAGMA journal_mode = WAL;
        PRAGMA synchronous = NORMAL;
        PRAGMA busy_timeout = 5000;
        PRAGMA foreign_keys = ON;
        PRAGMA cache_size = -16000;
        ",
    )
    .map_err(|e| to_store_err(e.to_string()))?;
    Ok(())
}

/// Pragmas for read connections.
pub fn apply_read_pragmas(conn: &Connection) -> FieldsyncResult<()> {
    conn.execute_batch(
        "
        PRAGMA busy_timeout = 5000;
        PRAGMA cache_size = -8000;
        ",
    )
    .map_err(|e| to_store_err(e.to_string()))?;
    Ok(())
}
