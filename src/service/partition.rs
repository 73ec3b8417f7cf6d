use std::collections::HashMap;
use std::num::NonZeroUsize;
use std::sync::{Arc, Weak};
use std::time::{Duration, Instant};

use lru::LruCache;
use parking_lot::Mutex;

use crate::error::Result;
use crate::partition::{IntervalIndex, PartitionKey, PartitionRange, PartitionSpan};
use crate::service::SeriesService;

/// Floor for the number of weak entries tolerated before a sweep.
const MIN_LIVE_SWEEP: usize = 64;

struct CachedRange {
    range: Arc<PartitionRange>,
    last_access: Instant,
}

/// Cache of resolved partition descriptors and per-series interval indexes.
///
/// Only descriptors are cached; partition bytes are opened per operation.
/// At most `capacity` descriptors are cached, and idle ones are dropped from
/// the cold end on every miss. While any caller still holds a descriptor, a
/// reload of the same key returns that instance, so every user of a partition
/// shares one lock even across evictions. Interval indexes hold keys and
/// time ranges only, never descriptors.
pub struct PartitionService {
    series: Arc<SeriesService>,
    cache: Mutex<LruCache<PartitionKey, CachedRange>>,
    live: Mutex<HashMap<PartitionKey, Weak<PartitionRange>>>,
    maps: Mutex<HashMap<String, Arc<IntervalIndex>>>,
    capacity: usize,
    idle: Duration,
}

impl PartitionService {
    pub fn new(series: Arc<SeriesService>, capacity: usize, idle: Duration) -> Self {
        let capacity = NonZeroUsize::new(capacity).unwrap_or(NonZeroUsize::MIN);
        Self {
            series,
            cache: Mutex::new(LruCache::new(capacity)),
            live: Mutex::new(HashMap::new()),
            maps: Mutex::new(HashMap::new()),
            capacity: capacity.get(),
            idle,
        }
    }

    pub fn series(&self) -> &Arc<SeriesService> {
        &self.series
    }

    /// Descriptor for `key`, resolving it on a miss or after idle expiry.
    pub fn range(&self, key: &PartitionKey) -> Result<Arc<PartitionRange>> {
        let now = Instant::now();
        {
            let mut cache = self.cache.lock();
            if let Some(entry) = cache.get_mut(key) {
                if now.duration_since(entry.last_access) < self.idle {
                    entry.last_access = now;
                    return Ok(entry.range.clone());
                }
                cache.pop(key);
            }
            self.sweep_expired(&mut cache, now);
        }

        let range = self.resolve(key)?;
        self.cache.lock().put(
            key.clone(),
            CachedRange {
                range: range.clone(),
                last_access: now,
            },
        );
        Ok(range)
    }

    /// Descriptor of the partition of `series_id` holding `timestamp_ms`.
    pub fn range_at(&self, series_id: &str, timestamp_ms: i64) -> Result<Arc<PartitionRange>> {
        let file = self.series.get(series_id)?;
        let key = PartitionKey::for_timestamp(series_id, file.definition.partition, timestamp_ms)?;
        self.range(&key)
    }

    fn resolve(&self, key: &PartitionKey) -> Result<Arc<PartitionRange>> {
        let mut live = self.live.lock();
        if let Some(range) = live.get(key).and_then(Weak::upgrade) {
            return Ok(range);
        }
        let file = self.series.get(&key.series_id)?;
        let range = Arc::new(PartitionRange::new(&file.definition, &key.partition_id)?);
        if live.len() >= self.capacity.saturating_mul(2).max(MIN_LIVE_SWEEP) {
            live.retain(|_, range| range.strong_count() > 0);
        }
        live.insert(key.clone(), Arc::downgrade(&range));
        log::trace!("resolved partition {key}");
        Ok(range)
    }

    /// Pops entries idle past the limit from the cold end of the LRU.
    fn sweep_expired(&self, cache: &mut LruCache<PartitionKey, CachedRange>, now: Instant) {
        loop {
            let expired = match cache.peek_lru() {
                Some((_, entry)) => now.duration_since(entry.last_access) >= self.idle,
                None => false,
            };
            if !expired {
                break;
            }
            cache.pop_lru();
        }
    }

    /// Time-ordered index over the stored partitions of `series_id`.
    ///
    /// Built on first use and kept until a partition of the series is
    /// created or the series is invalidated.
    pub fn range_map(&self, series_id: &str) -> Result<Arc<IntervalIndex>> {
        let mut maps = self.maps.lock();
        if let Some(index) = maps.get(series_id) {
            return Ok(index.clone());
        }
        let file = self.series.get(series_id)?;
        let period = file.definition.partition;
        let spans = self
            .series
            .store()
            .list_partitions(&file)?
            .into_iter()
            .map(|key| PartitionSpan::new(key, period))
            .collect::<Result<Vec<_>>>()?;
        let index = Arc::new(IntervalIndex::new(spans));
        log::debug!("indexed {} partitions of {series_id}", index.len());
        maps.insert(series_id.to_string(), index.clone());
        Ok(index)
    }

    /// Drops the cached index of the key's series so the next lookup sees the new partition.
    pub fn mark_partition_created(&self, key: &PartitionKey) {
        self.maps.lock().remove(&key.series_id);
    }

    /// Forgets every descriptor and index of `series_id`.
    pub fn invalidate_series(&self, series_id: &str) {
        self.maps.lock().remove(series_id);
        let mut cache = self.cache.lock();
        let stale: Vec<PartitionKey> = cache
            .iter()
            .filter(|(key, _)| key.series_id == series_id)
            .map(|(key, _)| key.clone())
            .collect();
        for key in &stale {
            cache.pop(key);
        }
        drop(cache);
        self.live.lock().retain(|key, _| key.series_id != series_id);
        log::debug!("invalidated {} cached partitions of {series_id}", stale.len());
    }

    /// Evicts descriptors idle for longer than the configured duration.
    ///
    /// Misses already sweep the cold end; this also reaches idle entries
    /// behind a recently used one and drops dead weak entries.
    pub fn evict_idle(&self) -> usize {
        let now = Instant::now();
        let mut cache = self.cache.lock();
        let expired: Vec<PartitionKey> = cache
            .iter()
            .filter(|(_, entry)| now.duration_since(entry.last_access) >= self.idle)
            .map(|(key, _)| key.clone())
            .collect();
        for key in &expired {
            cache.pop(key);
        }
        drop(cache);
        self.live.lock().retain(|_, range| range.strong_count() > 0);
        if !expired.is_empty() {
            log::debug!("evicted {} idle partition descriptors", expired.len());
        }
        expired.len()
    }

    pub fn cache_len(&self) -> usize {
        self.cache.lock().len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::NumberType;
    use crate::error::Error;
    use crate::partition::{PartitionPeriod, DAY_MS, HOUR_MS};
    use crate::series::SeriesDefinition;
    use crate::storage::MemoryStore;

    fn service(capacity: usize, idle: Duration) -> PartitionService {
        let series = SeriesService::load(Arc::new(MemoryStore::new(false))).unwrap();
        series
            .create(SeriesDefinition::new("s", NumberType::Int2, HOUR_MS, PartitionPeriod::Day))
            .unwrap();
        PartitionService::new(Arc::new(series), capacity, idle)
    }

    #[test]
    fn ranges_are_cached() {
        let service = service(8, Duration::from_secs(60));
        let key = PartitionKey::new("s", "20240101");
        let a = service.range(&key).unwrap();
        let b = service.range(&key).unwrap();
        assert!(Arc::ptr_eq(&a, &b));
        assert_eq!(service.cache_len(), 1);
        assert_eq!(a.size(), 24);
        assert!(matches!(
            service.range(&PartitionKey::new("ghost", "20240101")),
            Err(Error::SeriesNotFound(_))
        ));
        assert!(service.range(&PartitionKey::new("s", "202401")).is_err());
    }

    #[test]
    fn held_descriptors_survive_eviction() {
        let service = service(1, Duration::ZERO);
        let key = PartitionKey::new("s", "20240101");
        let held = service.range(&key).unwrap();
        assert_eq!(service.evict_idle(), 1);
        assert_eq!(service.cache_len(), 0);
        let reloaded = service.range(&key).unwrap();
        assert!(Arc::ptr_eq(&held, &reloaded));

        // capacity 1 pushes the first key out
        service.range(&PartitionKey::new("s", "20240102")).unwrap();
        assert!(Arc::ptr_eq(&held, &service.range(&key).unwrap()));

        drop(held);
        drop(reloaded);
        service.evict_idle();
        let fresh = service.range(&key).unwrap();
        assert_eq!(fresh.key(), &key);
    }

    #[test]
    fn range_map_tracks_created_partitions() {
        let service = service(8, Duration::from_secs(60));
        assert!(service.range_map("s").unwrap().is_empty());

        let key = PartitionKey::new("s", "20240102");
        service.series().store().create_partition(&key, 48).unwrap();
        // stale until told
        assert!(service.range_map("s").unwrap().is_empty());
        service.mark_partition_created(&key);
        let index = service.range_map("s").unwrap();
        assert_eq!(index.len(), 1);
        assert!(index.find(1_704_153_600_000).is_some());
    }

    #[test]
    fn weak_entries_stay_bounded() {
        let service = service(4, Duration::from_secs(60));
        let jan_1 = PartitionPeriod::Day.parse_start("20240101").unwrap();
        for day in 0..5000 {
            let key = PartitionKey::for_timestamp("s", PartitionPeriod::Day, jan_1 + day * DAY_MS).unwrap();
            service.range(&key).unwrap();
        }
        assert_eq!(service.cache_len(), 4);
        assert!(service.live.lock().len() <= MIN_LIVE_SWEEP);
    }

    #[test]
    fn idle_entries_are_swept_on_miss() {
        let service = service(8, Duration::ZERO);
        service.range(&PartitionKey::new("s", "20240101")).unwrap();
        service.range(&PartitionKey::new("s", "20240102")).unwrap();
        service.range(&PartitionKey::new("s", "20240103")).unwrap();
        assert_eq!(service.cache_len(), 1);
    }

    #[test]
    fn range_map_does_not_pin_descriptors() {
        let service = service(1, Duration::ZERO);
        let jan_1 = PartitionPeriod::Day.parse_start("20240101").unwrap();
        for day in 0..50 {
            let key = PartitionKey::for_timestamp("s", PartitionPeriod::Day, jan_1 + day * DAY_MS).unwrap();
            service.series().store().create_partition(&key, 48).unwrap();
        }
        let index = service.range_map("s").unwrap();
        assert_eq!(index.len(), 50);
        assert_eq!(service.cache_len(), 0);
        assert!(service.live.lock().is_empty());

        let span = index.find(jan_1 + 10 * DAY_MS).unwrap();
        let range = service.range(&span.key).unwrap();
        assert_eq!(range.start(), span.start);
        assert_eq!(range.end(), span.end);
        drop(range);
        service.evict_idle();
        assert_eq!(service.cache_len(), 0);
        assert!(service.live.lock().is_empty());
    }

    #[test]
    fn invalidate_series_drops_entries() {
        let service = service(8, Duration::from_secs(60));
        service.range(&PartitionKey::new("s", "20240101")).unwrap();
        service.range(&PartitionKey::new("s", "20240102")).unwrap();
        service.invalidate_series("s");
        assert_eq!(service.cache_len(), 0);
    }
}
