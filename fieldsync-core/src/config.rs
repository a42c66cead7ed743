//! Engine configuration.

use serde::{Deserialize, Serialize};

pub mod defaults {
    pub const DEFAULT_TICK_INTERVAL_SECS: u64 = 30;
    pub const DEFAULT_DISPATCH_BATCH: usize = 32;
    pub const DEFAULT_MAX_CONCURRENT_DISPATCHES: usize = 4;
    pub const DEFAULT_BACKOFF_FLOOR_SECS: u64 = 2;
    /// 15 minutes. Transient failures hold at this ceiling rather than
    /// giving up.
    pub const DEFAULT_BACKOFF_CEILING_SECS: u64 = 900;
}

/// Synchronization engine configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SyncConfig {
    /// Interval between timer-driven scheduler passes (seconds).
    pub tick_interval_secs: u64,
    /// Maximum eligible operations fetched per pass.
    pub dispatch_batch: usize,
    /// Bound on concurrently dispatched operations.
    pub max_concurrent_dispatches: usize,
    /// Smallest retry delay (seconds).
    pub backoff_floor_secs: u64,
    /// Largest retry delay (seconds); delays double up to here, then hold.
    pub backoff_ceiling_secs: u64,
    /// Attempt cap before a transient failure is treated as terminal.
    /// `None` retries forever at the ceiling.
    pub max_attempts: Option<u32>,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            tick_interval_secs: defaults::DEFAULT_TICK_INTERVAL_SECS,
            dispatch_batch: defaults::DEFAULT_DISPATCH_BATCH,
            max_concurrent_dispatches: defaults::DEFAULT_MAX_CONCURRENT_DISPATCHES,
            backoff_floor_secs: defaults::DEFAULT_BACKOFF_FLOOR_SECS,
            backoff_ceiling_secs: defaults::DEFAULT_BACKOFF_CEILING_SECS,
            max_attempts: None,
        }
    }
}
