//! Bounded exponential backoff: doubling from the floor, holding at the
//! ceiling. The engine retries transient failures forever at the ceiling
//! unless an attempt cap is configured.

use chrono::Duration;

use fieldsync_core::config::SyncConfig;

/// Delay before the next attempt, given how many attempts have been made.
/// `attempt = 1` is the first failure.
pub fn retry_delay(config: &SyncConfig, attempt: u32) -> Duration {
    let floor = config.backoff_floor_secs;
    let ceiling = config.backoff_ceiling_secs.max(floor);
    // Cap the exponent so the shift cannot overflow; anything past the
    // ceiling saturates there anyway.
    let exponent = attempt.saturating_sub(1).min(32);
    let raw = floor.saturating_mul(1u64 << exponent);
    Duration::seconds(raw.min(ceiling) as i64)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(floor: u64, ceiling: u64) -> SyncConfig {
        SyncConfig {
            backoff_floor_secs: floor,
            backoff_ceiling_secs: ceiling,
            ..SyncConfig::default()
        }
    }

    #[test]
    fn test_doubles_from_floor() {
        let cfg = config(2, 900);
        assert_eq!(retry_delay(&cfg, 1).num_seconds(), 2);
        assert_eq!(retry_delay(&cfg, 2).num_seconds(), 4);
        assert_eq!(retry_delay(&cfg, 3).num_seconds(), 8);
        assert_eq!(retry_delay(&cfg, 4).num_seconds(), 16);
    }

    #[test]
    fn test_holds_at_ceiling() {
        let cfg = config(2, 900);
        assert_eq!(retry_delay(&cfg, 10).num_seconds(), 900);
        assert_eq!(retry_delay(&cfg, 11).num_seconds(), 900);
        assert_eq!(retry_delay(&cfg, 500).num_seconds(), 900);
    }

    #[test]
    fn test_never_below_floor() {
        let cfg = config(5, 60);
        for attempt in 1..20 {
            assert!(retry_delay(&cfg, attempt).num_seconds() >= 5);
        }
    }

    #[test]
    fn test_monotone_nondecreasing() {
        let cfg = config(1, 300);
        let mut last = retry_delay(&cfg, 1);
        for attempt in 2..64 {
            let next = retry_delay(&cfg, attempt);
            assert!(next >= last);
            last = next;
        }
    }

    #[test]
    fn test_ceiling_below_floor_clamps_to_floor() {
        let cfg = config(10, 1);
        assert_eq!(retry_delay(&cfg, 1).num_seconds(), 10);
        assert_eq!(retry_delay(&cfg, 5).num_seconds(), 10);
    }
}
