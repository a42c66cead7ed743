//! SyncEngine — the background scheduling loop.
//!
//! Wakes on a timer, on an explicit nudge, or when connectivity returns;
//! fetches eligible operations in priority-then-creation order; resolves
//! temporary ids through the identity map; dispatches a bounded number of
//! them concurrently, at most one in flight per target entity; and
//! classifies outcomes into synced, retry-with-backoff, or terminal
//! failure with propagation to dependents.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use chrono::Utc;
use dashmap::DashMap;
use serde_json::Value;
use tokio::sync::{watch, Notify, Semaphore};
use tokio::task::JoinSet;

use fieldsync_core::config::SyncConfig;
use fieldsync_core::errors::{FieldsyncError, FieldsyncResult};
use fieldsync_core::id::{EntityId, RemoteId, TempId};
use fieldsync_core::op::{OpKind, PendingOperation};
use fieldsync_core::record::{RecordLifecycle, SyncFailure};
use fieldsync_core::traits::{ILocalStore, RemoteClient};

use crate::backoff::retry_delay;
use crate::bus::{InvalidationBus, InvalidationScope};

#[derive(Clone)]
pub struct SyncEngine {
    store: Arc<dyn ILocalStore>,
    remote: Arc<dyn RemoteClient>,
    bus: InvalidationBus,
    config: SyncConfig,
    /// Entities with an operation currently in flight. Enforces at most
    /// one concurrent writer per remote record.
    in_flight: Arc<DashMap<String, ()>>,
    /// Woken by `trigger()`.
    nudge: Arc<Notify>,
    /// Bounds concurrent dispatches.
    permits: Arc<Semaphore>,
    stopped: Arc<AtomicBool>,
}

impl SyncEngine {
    pub fn new(
        store: Arc<dyn ILocalStore>,
        remote: Arc<dyn RemoteClient>,
        bus: InvalidationBus,
        config: SyncConfig,
    ) -> Self {
        let permits = Arc::new(Semaphore::new(config.max_concurrent_dispatches.max(1)));
        Self {
            store,
            remote,
            bus,
            config,
            in_flight: Arc::new(DashMap::new()),
            nudge: Arc::new(Notify::new()),
            permits,
            stopped: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Crash resumption: anything the previous process left in flight goes
    /// back to pending. Call once before starting the loop.
    pub fn recover(&self) -> FieldsyncResult<usize> {
        let requeued = self.store.requeue_in_flight()?;
        if requeued > 0 {
            tracing::info!(requeued, "requeued in-flight operations from previous run");
        }
        Ok(requeued)
    }

    /// Best-effort nudge: wake the loop now. Idempotent, never blocks.
    pub fn trigger(&self) {
        self.nudge.notify_one();
    }

    /// Stop the loop after its current pass.
    pub fn stop(&self) {
        self.stopped.store(true, Ordering::Relaxed);
        self.nudge.notify_one();
    }

    /// The scheduling loop. `online` gates only *when* passes run, never
    /// correctness; if its sender goes away the loop degrades to
    /// timer-and-nudge operation.
    pub async fn run(self, mut online: watch::Receiver<bool>) {
        let mut tick =
            tokio::time::interval(std::time::Duration::from_secs(self.config.tick_interval_secs));
        tick.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        let mut connectivity_alive = true;

        loop {
            tokio::select! {
                _ = tick.tick() => {}
                _ = self.nudge.notified() => {}
                changed = online.changed(), if connectivity_alive => {
                    if changed.is_err() {
                        connectivity_alive = false;
                        continue;
                    }
                }
            }
            if self.stopped.load(Ordering::Relaxed) {
                break;
            }
            if connectivity_alive && !*online.borrow() {
                tracing::debug!("offline, skipping sync pass");
                continue;
            }
            self.sync_once().await;
        }
        tracing::debug!("sync loop stopped");
    }

    /// One scheduling pass: dispatch every currently eligible operation and
    /// wait for the batch to settle. Errors never escape; one failing
    /// entity must not stall the rest.
    pub async fn sync_once(&self) {
        let ops = match self.store.eligible(Utc::now(), self.config.dispatch_batch) {
            Ok(ops) => ops,
            Err(e) => {
                tracing::warn!(error = %e, "failed to fetch eligible operations");
                return;
            }
        };
        if ops.is_empty() {
            return;
        }
        tracing::debug!(count = ops.len(), "dispatching eligible operations");

        let mut tasks = JoinSet::new();
        for op in ops {
            // Key on the canonical id so temp- and remote-encoded operations
            // for the same entity share one slot.
            let entity_key = self.canonical_id(&op.target).to_string();
            match self.in_flight.entry(entity_key.clone()) {
                dashmap::mapref::entry::Entry::Occupied(_) => continue,
                dashmap::mapref::entry::Entry::Vacant(slot) => {
                    slot.insert(());
                }
            }

            let permit = match self.permits.clone().acquire_owned().await {
                Ok(permit) => permit,
                Err(_) => return,
            };
            let engine = self.clone();
            tasks.spawn(async move {
                engine.dispatch(op).await;
                engine.in_flight.remove(&entity_key);
                drop(permit);
            });
        }
        while tasks.join_next().await.is_some() {}
    }

    /// Dispatch a single operation and classify the outcome.
    async fn dispatch(&self, op: PendingOperation) {
        let attempts = match self.store.mark_in_flight(&op.operation_id) {
            Ok(attempts) => attempts,
            Err(e) => {
                tracing::warn!(operation_id = %op.operation_id, error = %e,
                    "could not mark operation in flight");
                return;
            }
        };
        // A dispatched create or update moves the record out of local_only.
        // Blob uploads do not touch the record lifecycle: the record's own
        // sync state is independent of its attachments.
        if matches!(op.kind, OpKind::Create | OpKind::Update) {
            if let Err(e) = self.store.set_lifecycle(&op.target, RecordLifecycle::Uploading) {
                tracing::debug!(target = %op.target, error = %e, "lifecycle update skipped");
            }
        }

        match self.attempt(&op).await {
            Ok(()) => {
                tracing::info!(operation_id = %op.operation_id, kind = op.kind.as_str(),
                    attempts, "operation synced");
            }
            Err(FieldsyncError::Remote(remote_err))
                if remote_err.is_retryable() && !self.attempts_exhausted(attempts) =>
            {
                let delay = retry_delay(&self.config, attempts);
                let next = Utc::now() + delay;
                tracing::debug!(operation_id = %op.operation_id, attempts,
                    retry_in_secs = delay.num_seconds(), error = %remote_err,
                    "transient failure, backing off");
                if let Err(e) = self
                    .store
                    .mark_failed(&op.operation_id, &remote_err.to_string(), next, false)
                {
                    tracing::warn!(operation_id = %op.operation_id, error = %e,
                        "failed to record retry state");
                }
            }
            Err(err) => self.fail_terminally(&op, attempts, &err.to_string()),
        }
    }

    fn attempts_exhausted(&self, attempts: u32) -> bool {
        self.config
            .max_attempts
            .map(|cap| attempts >= cap)
            .unwrap_or(false)
    }

    /// Perform the remote call and the success-side bookkeeping.
    async fn attempt(&self, op: &PendingOperation) -> FieldsyncResult<()> {
        match op.kind {
            OpKind::Create => self.attempt_create(op).await,
            OpKind::Update => self.attempt_update(op).await,
            OpKind::Delete => self.attempt_delete(op).await,
            OpKind::UploadBlob => self.attempt_upload(op).await,
        }
    }

    async fn attempt_create(&self, op: &PendingOperation) -> FieldsyncResult<()> {
        let mut payload = op.payload.clone();
        self.resolve_temp_refs(&mut payload)?;

        let remote_id = self.remote.create(&op.entity_type, &payload).await?;

        self.store.mark_synced(&op.operation_id)?;
        if let EntityId::Temp(temp) = &op.target {
            self.store
                .record_mapping(temp, &remote_id, &op.entity_type)?;
            self.store.rewrite_entity_id(temp, &remote_id)?;
        }
        let canonical = EntityId::Remote(remote_id);
        self.store
            .set_lifecycle(&canonical, RecordLifecycle::Uploaded)?;
        self.publish(op, &canonical);
        Ok(())
    }

    async fn attempt_update(&self, op: &PendingOperation) -> FieldsyncResult<()> {
        let remote_id = self.require_remote_target(op)?;
        let mut payload = op.payload.clone();
        self.resolve_temp_refs(&mut payload)?;

        self.remote
            .update(&op.entity_type, &remote_id, &payload)
            .await?;

        self.store.mark_synced(&op.operation_id)?;
        let canonical = EntityId::Remote(remote_id);
        // A successful write against the known remote id confirms server
        // state for this record.
        self.store
            .set_lifecycle(&canonical, RecordLifecycle::Verified)?;
        self.publish(op, &canonical);
        Ok(())
    }

    async fn attempt_delete(&self, op: &PendingOperation) -> FieldsyncResult<()> {
        let remote_id = self.require_remote_target(op)?;

        self.remote.delete(&op.entity_type, &remote_id).await?;

        self.store.mark_synced(&op.operation_id)?;
        let canonical = EntityId::Remote(remote_id);
        self.store.delete_record(&canonical)?;
        self.store.remove_blobs_for_entity(&canonical)?;
        self.publish(op, &canonical);
        Ok(())
    }

    async fn attempt_upload(&self, op: &PendingOperation) -> FieldsyncResult<()> {
        let blob_id = op.blob_id.ok_or_else(|| {
            FieldsyncError::UnknownOperation(format!(
                "upload operation {} carries no blob id",
                op.operation_id
            ))
        })?;
        let bytes = self
            .store
            .blob_bytes(&blob_id)?
            .ok_or_else(|| FieldsyncError::UnknownEntity(format!("blob {blob_id} has no bytes")))?;
        let remote_id = self.require_remote_target(op)?;

        let asset_id = self
            .remote
            .upload_blob(&op.entity_type, &remote_id, &bytes, &op.payload)
            .await?;

        self.store.mark_synced(&op.operation_id)?;
        self.store.release_uploaded(&blob_id, &asset_id)?;
        self.publish(op, &EntityId::Remote(remote_id));
        Ok(())
    }

    /// Terminal failure: park the operation, flag the record, and propagate
    /// to every transitive dependent so none of them is ever dispatched
    /// with a broken reference.
    fn fail_terminally(&self, op: &PendingOperation, attempts: u32, message: &str) {
        tracing::warn!(operation_id = %op.operation_id, kind = op.kind.as_str(),
            attempts, error = message, "operation failed terminally");
        let now = Utc::now();
        if let Err(e) = self.store.mark_failed(&op.operation_id, message, now, true) {
            tracing::warn!(operation_id = %op.operation_id, error = %e,
                "failed to record terminal failure");
        }
        self.flag_record(&op.target, attempts, message);

        let mut to_visit = vec![op.operation_id];
        while let Some(current) = to_visit.pop() {
            let dependents = match self.store.dependents_of(&current) {
                Ok(d) => d,
                Err(e) => {
                    tracing::warn!(error = %e, "failed to load dependents");
                    break;
                }
            };
            for dependent_id in dependents {
                let dependent = match self.store.get_op(&dependent_id) {
                    Ok(Some(dep)) if !dep.status.is_terminal() => dep,
                    Ok(_) => continue,
                    Err(e) => {
                        tracing::warn!(error = %e, "failed to load dependent operation");
                        continue;
                    }
                };
                let reason = format!("dependency {current} failed: {message}");
                if let Err(e) = self
                    .store
                    .mark_failed(&dependent_id, &reason, now, true)
                {
                    tracing::warn!(operation_id = %dependent_id, error = %e,
                        "failed to propagate dependency failure");
                    continue;
                }
                self.flag_record(&dependent.target, dependent.attempt_count, &reason);
                to_visit.push(dependent_id);
            }
        }
    }

    fn flag_record(&self, target: &EntityId, attempts: u32, message: &str) {
        let failure = SyncFailure {
            message: message.to_string(),
            attempts,
            failed_at: Utc::now(),
        };
        // The record may live under the rewritten remote id by now.
        let key = self.canonical_id(target);
        if let Err(e) = self.store.flag_sync_error(&key, &failure) {
            tracing::debug!(target = %target, error = %e, "could not flag record");
        }
    }

    /// Current best-known id for an entity.
    pub fn canonical_id(&self, id: &EntityId) -> EntityId {
        match id {
            EntityId::Temp(temp) => match self.store.resolve(temp) {
                Ok(Some(remote)) => EntityId::Remote(remote),
                _ => id.clone(),
            },
            EntityId::Remote(_) => id.clone(),
        }
    }

    /// Resolve the operation's target to a remote id, or fail: a synced
    /// dependency guarantees the mapping exists, so a miss here means the
    /// dependency graph was wrong and retrying cannot fix it.
    fn require_remote_target(&self, op: &PendingOperation) -> FieldsyncResult<RemoteId> {
        match &op.target {
            EntityId::Remote(remote) => Ok(remote.clone()),
            EntityId::Temp(temp) => {
                self.store
                    .resolve(temp)?
                    .ok_or_else(|| FieldsyncError::DependencyFailed {
                        operation_id: op.operation_id.to_string(),
                        reason: format!("no identity mapping for {temp}"),
                    })
            }
        }
    }

    /// Replace every mapped temporary id embedded in the payload with its
    /// remote counterpart. Unmapped temp strings are left alone; if they
    /// mattered, a dependency edge would have kept this operation waiting.
    fn resolve_temp_refs(&self, value: &mut Value) -> FieldsyncResult<()> {
        match value {
            Value::String(s) => {
                if let Some(temp) = TempId::parse(s) {
                    if let Some(remote) = self.store.resolve(&temp)? {
                        *s = remote.as_str().to_string();
                    }
                }
            }
            Value::Array(items) => {
                for item in items {
                    self.resolve_temp_refs(item)?;
                }
            }
            Value::Object(fields) => {
                for (_, field) in fields.iter_mut() {
                    self.resolve_temp_refs(field)?;
                }
            }
            _ => {}
        }
        Ok(())
    }

    fn publish(&self, op: &PendingOperation, canonical: &EntityId) {
        self.bus.publish(InvalidationScope {
            service_id: op.service_id.clone(),
            entity_type: op.entity_type.clone(),
            entity_id: Some(canonical.to_string()),
        });
    }

    pub fn bus(&self) -> &InvalidationBus {
        &self.bus
    }

    pub fn config(&self) -> &SyncConfig {
        &self.config
    }
}
