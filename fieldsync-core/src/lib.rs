//! # fieldsync-core
//!
//! Foundation crate for the Fieldsync offline-first synchronization engine.
//! Defines identifier types, the entity/operation/blob data model, errors,
//! configuration, and the storage + remote-client traits.
//! Every other crate in the workspace depends on this.

pub mod blob;
pub mod config;
pub mod errors;
pub mod id;
pub mod op;
pub mod record;
pub mod traits;

// Re-export the most commonly used types at the crate root.
pub use blob::{BlobRecord, BlobState};
pub use config::SyncConfig;
pub use errors::{FieldsyncError, FieldsyncResult};
pub use id::{BlobId, EntityId, OperationId, RemoteId, TempId};
pub use op::{OpKind, OpStatus, PendingOperation};
pub use record::{EntityRecord, RecordLifecycle, SyncFailure};
