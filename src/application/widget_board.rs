// Widget board - Keeps one mounted coordinator per widget in the store
use crate::application::context::DashboardContext;
use crate::application::widget_coordinator::{WidgetCoordinator, WidgetFrames, WidgetHandle, WidgetReadout};
use crate::domain::widget::{DisplayMode, WidgetId};
use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};
use tokio::task::JoinHandle;

pub struct WidgetBoard {
    ctx: Arc<DashboardContext>,
    mounted: Mutex<HashMap<WidgetId, WidgetHandle>>,
}

impl WidgetBoard {
    pub fn new(ctx: Arc<DashboardContext>) -> Self {
        Self {
            ctx,
            mounted: Mutex::new(HashMap::new()),
        }
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<WidgetId, WidgetHandle>> {
        self.mounted.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Mounts widgets new to the store and unmounts those it no longer holds.
    ///
    /// A widget moving between collections keeps its coordinator and animation state.
    pub fn reconcile(&self) {
        let snapshot = self.ctx.store.snapshot();
        let present: HashSet<WidgetId> = snapshot
            .widgets(DisplayMode::Regular)
            .iter()
            .chain(snapshot.widgets(DisplayMode::Expanded))
            .map(|w| w.id)
            .collect();

        let mut mounted = self.lock();
        mounted.retain(|id, _| {
            let keep = present.contains(id);
            if !keep {
                tracing::debug!("Unmounting widget {}", id);
            }
            keep
        });
        for id in present {
            mounted
                .entry(id)
                .or_insert_with(|| WidgetCoordinator::mount(self.ctx.clone(), id));
        }
    }

    pub fn mounted_ids(&self) -> Vec<WidgetId> {
        let mut ids: Vec<WidgetId> = self.lock().keys().copied().collect();
        ids.sort_unstable();
        ids
    }

    pub fn readout(&self, id: WidgetId) -> Option<WidgetReadout> {
        self.lock().get(&id).map(WidgetHandle::readout)
    }

    /// Readouts in display order, regular widgets first.
    pub fn readouts(&self) -> Vec<WidgetReadout> {
        let snapshot = self.ctx.store.snapshot();
        let mounted = self.lock();
        snapshot
            .regular_widgets
            .iter()
            .chain(&snapshot.expanded_widgets)
            .filter_map(|w| mounted.get(&w.id).map(WidgetHandle::readout))
            .collect()
    }

    pub fn frames(&self, id: WidgetId) -> Option<WidgetFrames> {
        self.lock().get(&id).map(WidgetHandle::frames)
    }

    /// Reconciles after every change to either widget collection, until the board is dropped.
    pub fn spawn_reconciler(self: &Arc<Self>) -> JoinHandle<()> {
        let board: Weak<Self> = Arc::downgrade(self);
        let mut regular = self.ctx.store.subscribe_widgets(DisplayMode::Regular);
        let mut expanded = self.ctx.store.subscribe_widgets(DisplayMode::Expanded);
        self.reconcile();

        tokio::spawn(async move {
            loop {
                let alive = tokio::select! {
                    r = regular.changed() => r.is_ok(),
                    r = expanded.changed() => r.is_ok(),
                };
                let Some(board) = board.upgrade().filter(|_| alive) else {
                    break;
                };
                board.reconcile();
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::cache::DerivedDataCache;
    use crate::application::context::CoreTimings;
    use crate::application::error_sink::TracingErrorSink;
    use crate::application::state_store::DashboardStore;
    use crate::domain::metric::{DailyMetric, MetricSeries, MetricType};
    use crate::infrastructure::metric_store::StaticMetricSource;
    use std::time::Duration;

    fn board() -> Arc<WidgetBoard> {
        let source = StaticMetricSource::new().with_series(
            MetricType::Users,
            MetricSeries::new(100.0, vec![DailyMetric::new("2025-02-01", 40, 30, 10)]),
        );
        let timings = CoreTimings::default();
        let store = Arc::new(DashboardStore::new("2025-02-01"));
        let cache = Arc::new(DerivedDataCache::new(Arc::new(source), timings.cache_ttl));
        let ctx = Arc::new(DashboardContext::new(store, cache, Arc::new(TracingErrorSink), timings));
        Arc::new(WidgetBoard::new(ctx))
    }

    #[tokio::test(start_paused = true)]
    async fn test_reconciler_follows_store() {
        let board = board();
        let store = board.ctx.store.clone();
        let reconciler = board.spawn_reconciler();

        let a = store.add_widget(DisplayMode::Regular, MetricType::Users);
        let b = store.add_widget(DisplayMode::Expanded, MetricType::Users);
        tokio::time::sleep(Duration::from_millis(10)).await;
        assert_eq!(board.mounted_ids(), vec![a, b]);

        store.remove_widget(a);
        tokio::time::sleep(Duration::from_millis(10)).await;
        assert_eq!(board.mounted_ids(), vec![b]);
        assert!(board.readout(a).is_none());

        reconciler.abort();
    }

    #[tokio::test(start_paused = true)]
    async fn test_readouts_follow_display_order() {
        let board = board();
        let store = board.ctx.store.clone();

        let a = store.add_widget(DisplayMode::Expanded, MetricType::Users);
        let b = store.add_widget(DisplayMode::Regular, MetricType::Users);
        board.reconcile();
        tokio::time::sleep(Duration::from_secs(2)).await;

        let readouts = board.readouts();
        assert_eq!(readouts.iter().map(|r| r.id).collect::<Vec<_>>(), vec![b, a]);
        assert!(readouts.iter().all(|r| r.display_value == 40.0));
    }
}
