// Read-through cache of metric series with time-based expiry
use crate::application::metric_source::MetricSource;
use crate::domain::error::DashboardError;
use crate::domain::metric::{DeviceFilter, MetricSeries, MetricType};
use std::collections::HashMap;
use std::sync::{Arc, Weak};
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};

pub const DEFAULT_TTL: Duration = Duration::from_secs(5 * 60);
pub const DEFAULT_SWEEP_INTERVAL: Duration = Duration::from_secs(60);

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey {
    pub metric_type: MetricType,
    pub device_filter: DeviceFilter,
    pub selected_day: String,
}

impl CacheKey {
    pub fn new(metric_type: MetricType, device_filter: DeviceFilter, selected_day: &str) -> Self {
        Self {
            metric_type,
            device_filter,
            selected_day: selected_day.to_string(),
        }
    }
}

#[derive(Debug, Clone)]
struct CacheEntry {
    series: Arc<MetricSeries>,
    created_at: Instant,
    expires_at: Instant,
}

impl CacheEntry {
    fn is_expired(&self, now: Instant) -> bool {
        now >= self.expires_at
    }
}

pub struct DerivedDataCache {
    source: Arc<dyn MetricSource>,
    ttl: Duration,
    // Held across the fetch so concurrent misses on one key fetch once.
    entries: Mutex<HashMap<CacheKey, CacheEntry>>,
}

impl DerivedDataCache {
    pub fn new(source: Arc<dyn MetricSource>, ttl: Duration) -> Self {
        Self {
            source,
            ttl,
            entries: Mutex::new(HashMap::new()),
        }
    }

    pub fn source(&self) -> &Arc<dyn MetricSource> {
        &self.source
    }

    pub async fn get(
        &self,
        metric_type: MetricType,
        device_filter: DeviceFilter,
        selected_day: &str,
    ) -> Result<Arc<MetricSeries>, DashboardError> {
        let key = CacheKey::new(metric_type, device_filter, selected_day);
        let mut entries = self.entries.lock().await;
        let now = Instant::now();

        if let Some(entry) = entries.get(&key) {
            if !entry.is_expired(now) {
                tracing::debug!(
                    "Cache hit for {}/{}/{} (age {:?})",
                    metric_type,
                    device_filter,
                    selected_day,
                    now - entry.created_at
                );
                return Ok(Arc::clone(&entry.series));
            }
            entries.remove(&key);
        }

        tracing::debug!("Cache miss for {}/{}/{}", metric_type, device_filter, selected_day);
        let series = self.source.get_series(metric_type).await?;
        let created_at = Instant::now();
        entries.insert(
            key,
            CacheEntry {
                series: Arc::clone(&series),
                created_at,
                expires_at: created_at + self.ttl,
            },
        );

        Ok(series)
    }

    /// Drops every expired entry and returns how many were removed.
    pub async fn sweep_expired(&self) -> usize {
        let mut entries = self.entries.lock().await;
        let now = Instant::now();
        let before = entries.len();
        entries.retain(|_, entry| !entry.is_expired(now));
        let removed = before - entries.len();
        if removed > 0 {
            tracing::debug!("Cache sweep removed {} expired entries", removed);
        }
        removed
    }

    pub async fn len(&self) -> usize {
        self.entries.lock().await.len()
    }

    /// Sweeps periodically until the cache is dropped.
    pub fn spawn_sweeper(self: &Arc<Self>, interval: Duration) -> JoinHandle<()> {
        let cache: Weak<Self> = Arc::downgrade(self);
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval_at(Instant::now() + interval, interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                ticker.tick().await;
                let Some(cache) = cache.upgrade() else {
                    break;
                };
                cache.sweep_expired().await;
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::metric::DailyMetric;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct CountingSource {
        fetches: AtomicUsize,
        latency: Duration,
        users: Arc<MetricSeries>,
    }

    impl CountingSource {
        fn new() -> Self {
            Self {
                fetches: AtomicUsize::new(0),
                latency: Duration::ZERO,
                users: Arc::new(MetricSeries::new(
                    1000.0,
                    vec![DailyMetric::new("2025-02-01", 10, 6, 4)],
                )),
            }
        }

        fn with_latency(latency: Duration) -> Self {
            Self { latency, ..Self::new() }
        }

        fn fetches(&self) -> usize {
            self.fetches.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl MetricSource for CountingSource {
        async fn get_series(&self, metric_type: MetricType) -> Result<Arc<MetricSeries>, DashboardError> {
            self.fetches.fetch_add(1, Ordering::SeqCst);
            if !self.latency.is_zero() {
                tokio::time::sleep(self.latency).await;
            }
            match metric_type {
                MetricType::Users => Ok(Arc::clone(&self.users)),
                other => Err(DashboardError::UnknownMetricType(other.to_string())),
            }
        }

        async fn available_days(&self) -> Vec<String> {
            self.users.dates().map(str::to_string).collect()
        }
    }

    fn cache_with(source: &Arc<CountingSource>) -> DerivedDataCache {
        let source: Arc<dyn MetricSource> = source.clone();
        DerivedDataCache::new(source, DEFAULT_TTL)
    }

    #[tokio::test(start_paused = true)]
    async fn test_hit_within_ttl_returns_same_instance() {
        let source = Arc::new(CountingSource::new());
        let cache = cache_with(&source);

        let first = cache.get(MetricType::Users, DeviceFilter::Total, "2025-02-01").await.unwrap();
        tokio::time::advance(Duration::from_secs(299)).await;
        let second = cache.get(MetricType::Users, DeviceFilter::Total, "2025-02-01").await.unwrap();

        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(source.fetches(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_concurrent_misses_fetch_once() {
        let source = Arc::new(CountingSource::with_latency(Duration::from_millis(100)));
        let cache = cache_with(&source);

        let (first, second) = tokio::join!(
            cache.get(MetricType::Users, DeviceFilter::Total, "2025-02-01"),
            cache.get(MetricType::Users, DeviceFilter::Total, "2025-02-01"),
        );

        assert!(Arc::ptr_eq(&first.unwrap(), &second.unwrap()));
        assert_eq!(source.fetches(), 1);
        assert_eq!(cache.len().await, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_key_includes_filter_and_day() {
        let source = Arc::new(CountingSource::new());
        let cache = cache_with(&source);

        cache.get(MetricType::Users, DeviceFilter::Total, "2025-02-01").await.unwrap();
        cache.get(MetricType::Users, DeviceFilter::Mobile, "2025-02-01").await.unwrap();
        cache.get(MetricType::Users, DeviceFilter::Total, "2025-02-02").await.unwrap();

        assert_eq!(source.fetches(), 3);
        assert_eq!(cache.len().await, 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_expired_entry_is_fetched_once_more() {
        let source = Arc::new(CountingSource::new());
        let cache = cache_with(&source);

        cache.get(MetricType::Users, DeviceFilter::Total, "2025-02-01").await.unwrap();
        tokio::time::advance(DEFAULT_TTL).await;
        cache.get(MetricType::Users, DeviceFilter::Total, "2025-02-01").await.unwrap();
        cache.get(MetricType::Users, DeviceFilter::Total, "2025-02-01").await.unwrap();

        assert_eq!(source.fetches(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_unknown_metric_type_is_not_cached() {
        let source = Arc::new(CountingSource::new());
        let cache = cache_with(&source);

        let result = cache.get(MetricType::PageViews, DeviceFilter::Total, "2025-02-01").await;
        assert_eq!(
            result,
            Err(DashboardError::UnknownMetricType("pageViews".to_string()))
        );
        assert_eq!(cache.len().await, 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_sweeper_removes_expired_entries() {
        let source = Arc::new(CountingSource::new());
        let cache = Arc::new(cache_with(&source));
        let sweeper = cache.spawn_sweeper(DEFAULT_SWEEP_INTERVAL);

        cache.get(MetricType::Users, DeviceFilter::Total, "2025-02-01").await.unwrap();
        tokio::time::sleep(Duration::from_secs(4 * 60)).await;
        assert_eq!(cache.len().await, 1);

        tokio::time::sleep(Duration::from_secs(2 * 60)).await;
        assert_eq!(cache.len().await, 0);

        sweeper.abort();
    }
}
