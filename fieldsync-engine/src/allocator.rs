//! Temporary identity allocation: process-unique placeholder ids from a
//! per-process instance tag plus a monotonic counter. Pure local
//! computation, no failure modes, no coordination.

use std::sync::atomic::{AtomicU64, Ordering};

use fieldsync_core::id::TempId;

pub struct TempIdAllocator {
    /// Random per-process tag; distinguishes ids allocated by different
    /// processes on the same device across restarts.
    instance: String,
    counter: AtomicU64,
}

impl TempIdAllocator {
    pub fn new() -> Self {
        let instance = uuid::Uuid::new_v4().simple().to_string()[..8].to_string();
        Self {
            instance,
            counter: AtomicU64::new(0),
        }
    }

    /// Allocate the next temp id for an entity of the given kind.
    pub fn allocate(&self, kind: &str) -> TempId {
        let n = self.counter.fetch_add(1, Ordering::Relaxed) + 1;
        TempId::from_parts(kind, &self.instance, n)
    }
}

impl Default for TempIdAllocator {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_allocated_ids_are_unique_and_temp() {
        let allocator = TempIdAllocator::new();
        let a = allocator.allocate("room");
        let b = allocator.allocate("room");
        assert_ne!(a, b);
        assert!(a.as_str().starts_with("temp_room_"));
    }

    #[test]
    fn test_different_processes_do_not_collide() {
        let a = TempIdAllocator::new().allocate("visual");
        let b = TempIdAllocator::new().allocate("visual");
        assert_ne!(a, b);
    }
}
