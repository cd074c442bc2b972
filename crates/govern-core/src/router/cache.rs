use super::ResolvedThresholds;
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};
use std::time::{Duration, Instant};

pub const DEFAULT_TTL: Duration = Duration::from_secs(300);

#[derive(Debug, Clone)]
struct Snapshot {
    thresholds: ResolvedThresholds,
    fetched_at: Instant,
}

#[derive(Debug, Default)]
struct Slot {
    /// Bumped by every invalidation. A fetch started under an older
    /// generation is not stored.
    generation: u64,
    snapshot: Option<Snapshot>,
}

/// Cache for the resolved threshold configuration.
///
/// Share one instance between routers with `Arc` to have them agree on a
/// single fetch; construct a fresh one per test for isolation.
#[derive(Debug)]
pub struct ThresholdCache {
    ttl: Option<Duration>,
    slot: RwLock<Slot>,
}

impl Default for ThresholdCache {
    fn default() -> Self {
        Self::new(Some(DEFAULT_TTL))
    }
}

impl ThresholdCache {
    /// `None` keeps a snapshot until [`invalidate`](Self::invalidate) is called.
    pub fn new(ttl: Option<Duration>) -> Self {
        Self {
            ttl,
            slot: RwLock::new(Slot::default()),
        }
    }

    /// Build from the `router.cache_ttl_secs` setting, where 0 means no expiry.
    pub fn from_ttl_secs(secs: u64) -> Self {
        if secs == 0 {
            Self::new(None)
        } else {
            Self::new(Some(Duration::from_secs(secs)))
        }
    }

    pub fn ttl(&self) -> Option<Duration> {
        self.ttl
    }

    // A panic while holding the lock cannot leave a half-written snapshot,
    // so a poisoned lock is still safe to use.
    fn read(&self) -> RwLockReadGuard<'_, Slot> {
        self.slot.read().unwrap_or_else(|e| e.into_inner())
    }

    fn write(&self) -> RwLockWriteGuard<'_, Slot> {
        self.slot.write().unwrap_or_else(|e| e.into_inner())
    }

    fn snapshot_is_fresh(&self, snapshot: &Snapshot) -> bool {
        match self.ttl {
            Some(ttl) => snapshot.fetched_at.elapsed() < ttl,
            None => true,
        }
    }

    /// Current invalidation generation. Capture it before fetching and hand
    /// it back to [`put`](Self::put).
    pub fn generation(&self) -> u64 {
        self.read().generation
    }

    pub fn get(&self) -> Option<ResolvedThresholds> {
        self.read()
            .snapshot
            .as_ref()
            .filter(|s| self.snapshot_is_fresh(s))
            .map(|s| s.thresholds.clone())
    }

    /// Store `thresholds` fetched under `generation`. Returns `false` and
    /// stores nothing when the cache was invalidated since.
    pub fn put(&self, generation: u64, thresholds: ResolvedThresholds) -> bool {
        let mut slot = self.write();
        if slot.generation != generation {
            return false;
        }
        slot.snapshot = Some(Snapshot {
            thresholds,
            fetched_at: Instant::now(),
        });
        true
    }

    pub fn invalidate(&self) {
        let mut slot = self.write();
        slot.generation = slot.generation.wrapping_add(1);
        slot.snapshot = None;
    }

    pub fn is_fresh(&self) -> bool {
        self.read()
            .snapshot
            .as_ref()
            .map(|s| self.snapshot_is_fresh(s))
            .unwrap_or(false)
    }
}
