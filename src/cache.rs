use std::collections::HashMap;
use std::future::Future;
use std::hash::Hash;
use std::sync::Arc;
use time::OffsetDateTime;
use tokio::sync::{Mutex, RwLock};

pub trait Clock: Send + Sync {
    fn now(&self) -> OffsetDateTime;
}

#[derive(Clone, Copy, Debug, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> OffsetDateTime {
        OffsetDateTime::now_utc()
    }
}

#[derive(Clone, Debug)]
pub struct Snapshot<V> {
    pub timestamp: OffsetDateTime,
    pub payload: V,
}

type Slot<V> = Arc<Mutex<Option<Snapshot<V>>>>;

/// Read-through cache with one time-bounded snapshot per key.
///
/// A slot stays locked while it is being refreshed, so concurrent readers of
/// the same key wait for the running refresh instead of starting their own.
/// Failed refreshes are not cached.
pub struct TtlCache<K, V> {
    ttl: time::Duration,
    clock: Arc<dyn Clock>,
    slots: Mutex<HashMap<K, Slot<V>>>,
}

impl<K, V> TtlCache<K, V>
where
    K: Eq + Hash,
    V: Clone,
{
    pub fn new(ttl: std::time::Duration, clock: Arc<dyn Clock>) -> Self {
        Self {
            ttl: time::Duration::try_from(ttl).unwrap_or(time::Duration::MAX),
            clock,
            slots: Mutex::new(HashMap::new()),
        }
    }

    fn is_fresh(&self, snapshot: &Snapshot<V>, now: OffsetDateTime) -> bool {
        now - snapshot.timestamp < self.ttl
    }

    async fn slot(&self, key: K) -> Slot<V> {
        let now = self.clock.now();
        let mut slots = self.slots.lock().await;
        // drop idle slots holding nothing worth serving
        slots.retain(|_, slot| match slot.try_lock() {
            Ok(snapshot) => snapshot.as_ref().is_some_and(|s| self.is_fresh(s, now)),
            Err(_) => true,
        });
        slots.entry(key).or_default().clone()
    }

    pub async fn get<F, Fut, E>(&self, key: K, refresh: F) -> Result<V, E>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<V, E>>,
    {
        let slot = self.slot(key).await;
        let mut snapshot = slot.lock().await;
        if let Some(s) = snapshot
            .as_ref()
            .filter(|s| self.is_fresh(s, self.clock.now()))
        {
            return Ok(s.payload.clone());
        }
        *snapshot = None;
        let payload = refresh().await?;
        *snapshot = Some(Snapshot {
            timestamp: self.clock.now(),
            payload: payload.clone(),
        });
        Ok(payload)
    }
}

/// Products found per category key by the last completed product scrape.
#[derive(Default)]
pub struct CategoryCounts(RwLock<HashMap<String, usize>>);

impl CategoryCounts {
    pub async fn replace(&self, counts: HashMap<String, usize>) {
        *self.0.write().await = counts;
    }

    pub async fn get(&self, key: &str) -> usize {
        self.0.read().await.get(key).copied().unwrap_or_default()
    }
}

#[cfg(test)]
pub mod test {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    pub struct ManualClock(std::sync::Mutex<OffsetDateTime>);

    impl ManualClock {
        pub fn new() -> Self {
            Self(std::sync::Mutex::new(OffsetDateTime::UNIX_EPOCH))
        }

        pub fn advance(&self, by: Duration) {
            let mut now = self.0.lock().unwrap();
            *now += by;
        }
    }

    impl Clock for ManualClock {
        fn now(&self) -> OffsetDateTime {
            *self.0.lock().unwrap()
        }
    }

    fn cache(clock: &Arc<ManualClock>) -> TtlCache<String, Arc<Vec<u32>>> {
        TtlCache::new(Duration::from_secs(5 * 60), clock.clone())
    }

    async fn fetch(
        cache: &TtlCache<String, Arc<Vec<u32>>>,
        key: &str,
        calls: &AtomicUsize,
    ) -> Result<Arc<Vec<u32>>, anyhow::Error> {
        cache
            .get(key.to_string(), move || async move {
                let n = calls.fetch_add(1, Ordering::SeqCst) as u32;
                Ok(Arc::new(vec![n]))
            })
            .await
    }

    #[tokio::test]
    async fn serves_snapshot_until_ttl_expires() {
        let clock = Arc::new(ManualClock::new());
        let cache = cache(&clock);
        let calls = AtomicUsize::new(0);

        let first = fetch(&cache, "all", &calls).await.unwrap();
        clock.advance(Duration::from_secs(4 * 60 + 59));
        let second = fetch(&cache, "all", &calls).await.unwrap();
        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(1, calls.load(Ordering::SeqCst));

        clock.advance(Duration::from_secs(1));
        let third = fetch(&cache, "all", &calls).await.unwrap();
        assert_eq!(vec![1], *third);
        assert_eq!(2, calls.load(Ordering::SeqCst));
    }

    #[tokio::test]
    async fn keys_are_independent() {
        let clock = Arc::new(ManualClock::new());
        let cache = cache(&clock);
        let calls = AtomicUsize::new(0);

        fetch(&cache, "kaffee", &calls).await.unwrap();
        fetch(&cache, "kaffee,sale", &calls).await.unwrap();
        fetch(&cache, "kaffee", &calls).await.unwrap();
        assert_eq!(2, calls.load(Ordering::SeqCst));
    }

    #[tokio::test]
    async fn failed_refresh_is_not_cached() {
        let clock = Arc::new(ManualClock::new());
        let cache = cache(&clock);
        let counter = AtomicUsize::new(0);
        let calls = &counter;

        let res = cache
            .get("all".to_string(), move || async move {
                calls.fetch_add(1, Ordering::SeqCst);
                Err::<Arc<Vec<u32>>, _>(anyhow::anyhow!("browser failed to start"))
            })
            .await;
        assert!(res.is_err());
        let res = fetch(&cache, "all", &calls).await.unwrap();
        assert_eq!(vec![1], *res);
    }

    #[tokio::test]
    async fn concurrent_misses_refresh_once() {
        let clock = Arc::new(ManualClock::new());
        let cache = cache(&clock);
        let counter = AtomicUsize::new(0);
        let calls = &counter;
        let slow = move || async move {
            tokio::time::sleep(Duration::from_millis(20)).await;
            calls.fetch_add(1, Ordering::SeqCst);
            Ok::<_, anyhow::Error>(Arc::new(vec![7]))
        };

        let (a, b) = tokio::join!(
            cache.get("all".to_string(), slow),
            cache.get("all".to_string(), slow)
        );
        assert_eq!(vec![7], *a.unwrap());
        assert_eq!(vec![7], *b.unwrap());
        assert_eq!(1, calls.load(Ordering::SeqCst));
    }

    #[tokio::test]
    async fn counts_are_replaced_wholesale() {
        let counts = CategoryCounts::default();
        counts
            .replace(HashMap::from([("kaffee".to_string(), 3), ("sale".to_string(), 1)]))
            .await;
        counts.replace(HashMap::from([("sale".to_string(), 2)])).await;
        assert_eq!(0, counts.get("kaffee").await);
        assert_eq!(2, counts.get("sale").await);
        assert_eq!(0, counts.get("unknown").await);
    }
}
