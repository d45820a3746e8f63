// Dashboard context - The explicitly constructed root of the reactive core
use crate::application::animation::AnimationScheduler;
use crate::application::cache::DerivedDataCache;
use crate::application::error_sink::ErrorSink;
use crate::application::metric_source::MetricSource;
use crate::application::snapshot_repository::SnapshotRepository;
use crate::application::snapshot_writer::SnapshotWriter;
use crate::application::state_store::DashboardStore;
use crate::domain::error::DashboardError;
use crate::domain::metric::{DeviceFilter, MetricSeries, MetricType};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CoreTimings {
    pub cache_ttl: Duration,
    pub cache_sweep_interval: Duration,
    pub persist_debounce: Duration,
    pub widget_debounce: Duration,
    pub frame_interval: Duration,
}

impl Default for CoreTimings {
    fn default() -> Self {
        Self {
            cache_ttl: crate::application::cache::DEFAULT_TTL,
            cache_sweep_interval: crate::application::cache::DEFAULT_SWEEP_INTERVAL,
            persist_debounce: crate::application::snapshot_writer::DEFAULT_PERSIST_DEBOUNCE,
            widget_debounce: crate::application::widget_coordinator::DEFAULT_UPDATE_DEBOUNCE,
            frame_interval: crate::application::animation::DEFAULT_FRAME_INTERVAL,
        }
    }
}

pub struct DashboardContext {
    pub store: Arc<DashboardStore>,
    pub cache: Arc<DerivedDataCache>,
    pub scheduler: AnimationScheduler,
    pub error_sink: Arc<dyn ErrorSink>,
    pub widget_debounce: Duration,
}

impl DashboardContext {
    pub fn new(
        store: Arc<DashboardStore>,
        cache: Arc<DerivedDataCache>,
        error_sink: Arc<dyn ErrorSink>,
        timings: CoreTimings,
    ) -> Self {
        Self {
            store,
            cache,
            scheduler: AnimationScheduler::new(timings.frame_interval),
            error_sink,
            widget_debounce: timings.widget_debounce,
        }
    }

    /// Series for a widget; a metric the source cannot supply degrades to an empty series.
    pub async fn metric_data(
        &self,
        metric_type: MetricType,
        device_filter: DeviceFilter,
        selected_day: &str,
    ) -> Arc<MetricSeries> {
        match self.cache.get(metric_type, device_filter, selected_day).await {
            Ok(series) => series,
            Err(DashboardError::UnknownMetricType(name)) => {
                tracing::warn!("No series for metric type {}, showing zeroes", name);
                Arc::new(MetricSeries::empty())
            }
            Err(e) => {
                tracing::warn!("Metric lookup failed, showing zeroes: {}", e);
                Arc::new(MetricSeries::empty())
            }
        }
    }
}

/// Timer-driven tasks owned by the application root; aborted on drop.
#[derive(Default)]
pub struct BackgroundTasks {
    handles: Vec<JoinHandle<()>>,
}

impl BackgroundTasks {
    pub fn push(&mut self, handle: JoinHandle<()>) {
        self.handles.push(handle);
    }

    pub fn len(&self) -> usize {
        self.handles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handles.is_empty()
    }
}

impl Drop for BackgroundTasks {
    fn drop(&mut self) {
        for handle in &self.handles {
            handle.abort();
        }
    }
}

/// A running core: the context plus what keeps it persisted and swept.
pub struct Dashboard {
    pub context: Arc<DashboardContext>,
    pub writer: SnapshotWriter,
    pub tasks: BackgroundTasks,
}

/// Builds the core, restores the persisted snapshot and starts its background tasks.
///
/// An absent or invalid snapshot leaves the default state in place.
pub async fn bootstrap(
    source: Arc<dyn MetricSource>,
    snapshots: Arc<dyn SnapshotRepository>,
    error_sink: Arc<dyn ErrorSink>,
    default_day: String,
    timings: CoreTimings,
) -> Dashboard {
    let store = Arc::new(DashboardStore::new(default_day));

    match snapshots.load().await {
        Ok(Some(blob)) => match store.restore_from_blob(&blob) {
            Ok(()) => tracing::info!("Restored dashboard snapshot"),
            Err(e) => tracing::warn!("Discarding persisted dashboard state: {}", e),
        },
        Ok(None) => tracing::info!("No persisted dashboard state, starting with defaults"),
        Err(e) => tracing::warn!("Could not load dashboard snapshot: {:#}", e),
    }

    let cache = Arc::new(DerivedDataCache::new(source, timings.cache_ttl));
    let writer = SnapshotWriter::new(store.clone(), snapshots, timings.persist_debounce);

    let mut tasks = BackgroundTasks::default();
    tasks.push(cache.spawn_sweeper(timings.cache_sweep_interval));
    tasks.push(writer.spawn());

    let context = Arc::new(DashboardContext::new(store, cache, error_sink, timings));
    Dashboard {
        context,
        writer,
        tasks,
    }
}
