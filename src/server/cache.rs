use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, TimeDelta, Utc};
use tokio::sync::RwLock;

use crate::clock::Clock;
use crate::model::AggregateSnapshot;

#[derive(Debug)]
struct Stored {
    snapshot: Arc<AggregateSnapshot>,
    stored_at: DateTime<Utc>,
}

/// A snapshot handed out by [`SnapshotCache`], with how long ago it was stored.
#[derive(Debug, Clone)]
pub struct CachedSnapshot {
    pub snapshot: Arc<AggregateSnapshot>,
    pub stored_at: DateTime<Utc>,
    pub age: TimeDelta,
}

impl CachedSnapshot {
    /// Age rounded to whole minutes, as reported to the dashboard.
    pub fn age_minutes(&self) -> i64 {
        (self.age.num_seconds() as f64 / 60.0).round() as i64
    }
}

/// Holds the most recent [`AggregateSnapshot`] for the whole process.
#[derive(Clone)]
pub struct SnapshotCache {
    clock: Arc<dyn Clock>,
    slot: Arc<RwLock<Option<Stored>>>,
}

impl SnapshotCache {
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self {
            clock,
            slot: Arc::new(RwLock::new(None)),
        }
    }

    /// The cached snapshot if it was stored less than `max_age` ago.
    pub async fn get_if_fresh(&self, max_age: Duration) -> Option<CachedSnapshot> {
        let max_age = TimeDelta::from_std(max_age).unwrap_or(TimeDelta::MAX);
        self.latest().await.filter(|cached| cached.age < max_age)
    }

    /// The cached snapshot regardless of age.
    pub async fn latest(&self) -> Option<CachedSnapshot> {
        let now = self.clock.now();
        self.slot.read().await.as_ref().map(|stored| CachedSnapshot {
            snapshot: Arc::clone(&stored.snapshot),
            stored_at: stored.stored_at,
            age: now - stored.stored_at,
        })
    }

    /// Replace the cached snapshot, returning a shared handle to it.
    pub async fn set(&self, snapshot: AggregateSnapshot) -> Arc<AggregateSnapshot> {
        let snapshot = Arc::new(snapshot);
        *self.slot.write().await = Some(Stored {
            snapshot: Arc::clone(&snapshot),
            stored_at: self.clock.now(),
        });
        snapshot
    }

    pub async fn last_update(&self) -> Option<DateTime<Utc>> {
        self.slot.read().await.as_ref().map(|stored| stored.stored_at)
    }
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;

    use super::*;
    use crate::clock::ManualClock;

    fn start() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 3, 1, 9, 0, 0).unwrap()
    }

    #[tokio::test]
    async fn empty_cache_has_nothing() {
        let cache = SnapshotCache::new(Arc::new(ManualClock::new(start())));
        assert!(cache.get_if_fresh(Duration::from_secs(60)).await.is_none());
        assert!(cache.latest().await.is_none());
        assert!(cache.last_update().await.is_none());
    }

    #[tokio::test]
    async fn snapshot_expires_after_max_age() {
        let clock = Arc::new(ManualClock::new(start()));
        let cache = SnapshotCache::new(clock.clone());
        cache.set(AggregateSnapshot::empty(start())).await;

        clock.advance(TimeDelta::minutes(14));
        let cached = cache
            .get_if_fresh(Duration::from_secs(15 * 60))
            .await
            .expect("still fresh");
        assert_eq!(cached.age_minutes(), 14);

        clock.advance(TimeDelta::minutes(1));
        assert!(cache.get_if_fresh(Duration::from_secs(15 * 60)).await.is_none());

        let stale = cache.latest().await.expect("stale snapshot kept");
        assert_eq!(stale.age, TimeDelta::minutes(15));
        assert_eq!(cache.last_update().await, Some(start()));
    }

    #[tokio::test]
    async fn set_replaces_previous_snapshot() {
        let clock = Arc::new(ManualClock::new(start()));
        let cache = SnapshotCache::new(clock.clone());
        cache.set(AggregateSnapshot::empty(start())).await;
        clock.advance(TimeDelta::minutes(5));
        let later = start() + TimeDelta::minutes(5);
        cache.set(AggregateSnapshot::empty(later)).await;

        let cached = cache.latest().await.unwrap();
        assert_eq!(cached.snapshot.generated_at, later);
        assert_eq!(cached.age, TimeDelta::zero());
    }
}
