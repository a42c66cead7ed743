//! Property tests for the retry delay schedule.

use proptest::prelude::*;

use fieldsync_core::config::SyncConfig;
use fieldsync_engine::backoff::retry_delay;

fn config(floor: u64, ceiling: u64) -> SyncConfig {
    SyncConfig {
        backoff_floor_secs: floor,
        backoff_ceiling_secs: ceiling,
        ..SyncConfig::default()
    }
}

proptest! {
    #[test]
    fn test_delay_stays_within_bounds(
        floor in 1u64..3600,
        ceiling in 1u64..86_400,
        attempt in 1u32..10_000,
    ) {
        let cfg = config(floor, ceiling);
        let delay = retry_delay(&cfg, attempt).num_seconds() as u64;
        let effective_ceiling = ceiling.max(floor);
        prop_assert!(delay >= floor.min(effective_ceiling));
        prop_assert!(delay <= effective_ceiling);
    }

    #[test]
    fn test_delay_is_monotonic_in_attempts(
        floor in 1u64..600,
        ceiling in 1u64..86_400,
        attempt in 1u32..64,
    ) {
        let cfg = config(floor, ceiling);
        let current = retry_delay(&cfg, attempt);
        let next = retry_delay(&cfg, attempt + 1);
        prop_assert!(next >= current);
    }

    #[test]
    fn test_large_attempt_counts_hold_at_ceiling(
        floor in 1u64..600,
        ceiling in 1u64..86_400,
        attempt in 64u32..u32::MAX,
    ) {
        let cfg = config(floor, ceiling);
        let delay = retry_delay(&cfg, attempt).num_seconds() as u64;
        prop_assert_eq!(delay, ceiling.max(floor));
    }
}
