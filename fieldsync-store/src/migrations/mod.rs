//! Versioned schema migrations, applied in order on the write connection.

pub mod v001_initial;

use rusqlite::Connection;

use fieldsync_core::errors::{FieldsyncError, FieldsyncResult, StoreError};

type Migration = (u32, &'static str, fn(&Connection) -> FieldsyncResult<()>);

const MIGRATIONS: &[Migration] = &[(1, "initial", v001_initial::apply)];

/// Apply all migrations newer than the recorded schema version.
pub fn run_migrations(conn: &Connection) -> FieldsyncResult<()> {
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS schema_version (
            version INTEGER PRIMARY KEY,
            name TEXT NOT NULL,
            applied_at TEXT NOT NULL
        )",
    )
    .map_err(|e| migration_err(0, e.to_string()))?;

    let current: u32 = conn
        .query_row(
            "SELECT COALESCE(MAX(version), 0) FROM schema_version",
            [],
            |row| row.get(0),
        )
        .map_err(|e| migration_err(0, e.to_string()))?;

    for (version, name, apply) in MIGRATIONS {
        if *version <= current {
            continue;
        }
        apply(conn).map_err(|e| migration_err(*version, e.to_string()))?;
        conn.execute(
            "INSERT INTO schema_version (version, name, applied_at) VALUES (?1, ?2, ?3)",
            rusqlite::params![version, name, chrono::Utc::now().to_rfc3339()],
        )
        .map_err(|e| migration_err(*version, e.to_string()))?;
        tracing::info!(version, name, "applied migration");
    }
    Ok(())
}

fn migration_err(version: u32, reason: String) -> FieldsyncError {
    FieldsyncError::Store(StoreError::MigrationFailed { version, reason })
}
