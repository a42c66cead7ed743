//! Shared test fixtures: an in-memory store plus a scriptable mock remote.

use std::sync::atomic::{AtomicBool, AtomicU32, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use serde_json::Value;

use fieldsync_core::config::SyncConfig;
use fieldsync_core::errors::RemoteError;
use fieldsync_core::id::RemoteId;
use fieldsync_core::traits::RemoteClient;
use fieldsync_engine::SyncService;
use fieldsync_store::StoreEngine;

/// Scriptable remote: counts every call, can fail the first N creates with
/// a transient error or reject creates outright.
#[derive(Default)]
pub struct MockRemote {
    next_id: AtomicU64,
    transient_create_failures: AtomicU32,
    reject_creates: AtomicBool,
    pub create_calls: AtomicU32,
    pub update_calls: AtomicU32,
    pub delete_calls: AtomicU32,
    pub upload_calls: AtomicU32,
    pub created: Mutex<Vec<(String, Value)>>,
    pub uploaded: Mutex<Vec<(String, usize)>>,
}

impl MockRemote {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn fail_first_creates(self: &Arc<Self>, count: u32) {
        self.transient_create_failures.store(count, Ordering::SeqCst);
    }

    pub fn reject_all_creates(self: &Arc<Self>) {
        self.reject_creates.store(true, Ordering::SeqCst);
    }

    pub fn total_calls(&self) -> u32 {
        self.create_calls.load(Ordering::SeqCst)
            + self.update_calls.load(Ordering::SeqCst)
            + self.delete_calls.load(Ordering::SeqCst)
            + self.upload_calls.load(Ordering::SeqCst)
    }
}

#[async_trait::async_trait]
impl RemoteClient for MockRemote {
    async fn create(&self, entity_type: &str, payload: &Value) -> Result<RemoteId, RemoteError> {
        self.create_calls.fetch_add(1, Ordering::SeqCst);
        if self.reject_creates.load(Ordering::SeqCst) {
            return Err(RemoteError::rejected(422, "payload rejected"));
        }
        let remaining = self.transient_create_failures.load(Ordering::SeqCst);
        if remaining > 0 {
            self.transient_create_failures
                .store(remaining - 1, Ordering::SeqCst);
            return Err(RemoteError::transient("connection reset"));
        }
        let id = 1000 + self.next_id.fetch_add(1, Ordering::SeqCst) + 1;
        self.created
            .lock()
            .unwrap()
            .push((entity_type.to_string(), payload.clone()));
        Ok(RemoteId::new(id.to_string()))
    }

    async fn update(
        &self,
        _entity_type: &str,
        _remote_id: &RemoteId,
        _payload: &Value,
    ) -> Result<(), RemoteError> {
        self.update_calls.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn delete(&self, _entity_type: &str, _remote_id: &RemoteId) -> Result<(), RemoteError> {
        self.delete_calls.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn upload_blob(
        &self,
        _entity_type: &str,
        remote_id: &RemoteId,
        bytes: &[u8],
        _metadata: &Value,
    ) -> Result<String, RemoteError> {
        self.upload_calls.fetch_add(1, Ordering::SeqCst);
        self.uploaded
            .lock()
            .unwrap()
            .push((remote_id.as_str().to_string(), bytes.len()));
        Ok(format!("asset-{remote_id}"))
    }
}

/// Config tuned for tests: backoff floor of zero so retries are
/// immediately eligible on the next pass.
pub fn test_config() -> SyncConfig {
    SyncConfig {
        backoff_floor_secs: 0,
        backoff_ceiling_secs: 0,
        ..SyncConfig::default()
    }
}

pub fn setup(remote: Arc<MockRemote>) -> (Arc<StoreEngine>, SyncService) {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
    let store = Arc::new(StoreEngine::open_in_memory().expect("in-memory store"));
    let service = SyncService::new(store.clone(), remote, test_config());
    (store, service)
}

/// Run enough scheduler passes for queued work and unblocked dependents to
/// settle.
pub async fn drain(service: &SyncService) {
    for _ in 0..5 {
        service.engine().sync_once().await;
    }
}
