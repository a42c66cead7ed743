//! Trait seams: the storage contracts implemented by `fieldsync-store` and
//! the remote client injected by the collaborator layer.

mod remote;
mod storage;

pub use remote::RemoteClient;
pub use storage::{
    IBlobStore, ICacheSlots, IIdentityMap, ILocalStore, IOperationLog, IRecordStore,
};
