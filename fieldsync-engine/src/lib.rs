//! # fieldsync-engine
//!
//! The synchronization engine. Drains the pending operation log in
//! dependency order against an injected remote client, classifies outcomes,
//! maintains the identity resolution table, and announces fresher state on
//! the cache invalidation bus.
//!
//! UI collaborators talk to [`SyncService`], which is synchronous against
//! local storage and never touches the network.

pub mod allocator;
pub mod backoff;
pub mod bus;
pub mod engine;
pub mod service;

pub use allocator::TempIdAllocator;
pub use bus::{InvalidationBus, InvalidationScope};
pub use engine::SyncEngine;
pub use service::SyncService;
