//! SQL per table family. Each module operates on a borrowed connection so
//! the engine decides whether the writer or a reader runs it.

pub mod blob_ops;
pub mod cache_ops;
pub mod id_map_ops;
pub mod op_log;
pub mod record_crud;

use chrono::{DateTime, Utc};

use fieldsync_core::errors::FieldsyncResult;

use crate::to_store_err;

/// Parse an RFC 3339 column back into a UTC timestamp.
pub(crate) fn parse_ts(raw: &str) -> FieldsyncResult<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(raw)
        .map(|t| t.with_timezone(&Utc))
        .map_err(|e| to_store_err(format!("bad timestamp {raw:?}: {e}")))
}
