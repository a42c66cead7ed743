use serde_json::Value;

use crate::errors::RemoteError;
use crate::id::RemoteId;

/// The remote API client, implemented by the collaborator layer and
/// injected into the engine.
///
/// Must be safely retriable: the engine may call any method more than once
/// for the same operation when a previous attempt's result was ambiguous
/// (crash between dispatch and acknowledgment).
#[async_trait::async_trait]
pub trait RemoteClient: Send + Sync {
    /// Create a record in the given collection; returns the id the system
    /// of record assigned.
    async fn create(&self, entity_type: &str, payload: &Value) -> Result<RemoteId, RemoteError>;

    async fn update(
        &self,
        entity_type: &str,
        remote_id: &RemoteId,
        payload: &Value,
    ) -> Result<(), RemoteError>;

    async fn delete(&self, entity_type: &str, remote_id: &RemoteId) -> Result<(), RemoteError>;

    /// Upload binary content attached to an existing remote record; returns
    /// the remote asset id.
    async fn upload_blob(
        &self,
        entity_type: &str,
        remote_id: &RemoteId,
        bytes: &[u8],
        metadata: &Value,
    ) -> Result<String, RemoteError>;
}
