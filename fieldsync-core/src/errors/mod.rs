//! Error types for the whole workspace.

mod remote_error;
mod store_error;

pub use remote_error::RemoteError;
pub use store_error::StoreError;

/// Top-level error. The scheduling loop itself never aborts on these; they
/// are recorded per operation or surfaced to the caller of the facade.
#[derive(Debug, thiserror::Error)]
pub enum FieldsyncError {
    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Remote(#[from] RemoteError),

    #[error("dependency failed for operation {operation_id}: {reason}")]
    DependencyFailed {
        operation_id: String,
        reason: String,
    },

    #[error("unknown entity: {0}")]
    UnknownEntity(String),

    #[error("unknown operation: {0}")]
    UnknownOperation(String),

    #[error("serialization error: {0}")]
    Serialization(String),
}

pub type FieldsyncResult<T> = Result<T, FieldsyncError>;
