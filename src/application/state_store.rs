// Dashboard state store - Single source of truth for filters and widget layout
//
// Every slice is a watch channel and only publishes when its value actually changes.
// Mutations and snapshot reads are serialized by one mutex, so a combined read never
// observes a multi-slice mutation (e.g. a move between collections) half applied.
use crate::domain::error::DashboardError;
use crate::domain::metric::{DeviceFilter, MetricType};
use crate::domain::snapshot::DashboardSnapshot;
use crate::domain::widget::{DisplayMode, WidgetConfig, WidgetId};
use std::collections::HashSet;
use std::sync::{Mutex, MutexGuard, PoisonError};
use tokio::sync::watch;

#[derive(Debug)]
struct StoreInner {
    next_id: WidgetId,
}

pub struct DashboardStore {
    inner: Mutex<StoreInner>,
    device_filter: watch::Sender<DeviceFilter>,
    selected_day: watch::Sender<String>,
    regular_widgets: watch::Sender<Vec<WidgetConfig>>,
    expanded_widgets: watch::Sender<Vec<WidgetConfig>>,
    revision: watch::Sender<u64>,
}

impl DashboardStore {
    /// Default state: total filter, `default_day` selected, no widgets.
    pub fn new(default_day: impl Into<String>) -> Self {
        Self {
            inner: Mutex::new(StoreInner { next_id: 1 }),
            device_filter: watch::Sender::new(DeviceFilter::Total),
            selected_day: watch::Sender::new(default_day.into()),
            regular_widgets: watch::Sender::new(Vec::new()),
            expanded_widgets: watch::Sender::new(Vec::new()),
            revision: watch::Sender::new(0),
        }
    }

    fn lock(&self) -> MutexGuard<'_, StoreInner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn collection(&self, mode: DisplayMode) -> &watch::Sender<Vec<WidgetConfig>> {
        match mode {
            DisplayMode::Regular => &self.regular_widgets,
            DisplayMode::Expanded => &self.expanded_widgets,
        }
    }

    fn bump_revision(&self) {
        self.revision.send_modify(|revision| *revision += 1);
    }

    fn publish_scalar<T: PartialEq>(sender: &watch::Sender<T>, value: T) -> bool {
        sender.send_if_modified(|current| {
            if *current == value {
                return false;
            }
            *current = value;
            true
        })
    }

    fn publish_widgets(&self, mode: DisplayMode, widgets: Vec<WidgetConfig>) -> bool {
        Self::publish_scalar(self.collection(mode), widgets)
    }

    // --- Reads -------------------------------------------------------------

    pub fn device_filter(&self) -> DeviceFilter {
        *self.device_filter.borrow()
    }

    pub fn selected_day(&self) -> String {
        self.selected_day.borrow().clone()
    }

    pub fn widgets(&self, mode: DisplayMode) -> Vec<WidgetConfig> {
        self.collection(mode).borrow().clone()
    }

    /// Linear lookup across both collections.
    pub fn get_widget(&self, id: WidgetId) -> Option<(DisplayMode, WidgetConfig)> {
        let _guard = self.lock();
        self.find(id)
    }

    fn find(&self, id: WidgetId) -> Option<(DisplayMode, WidgetConfig)> {
        [DisplayMode::Regular, DisplayMode::Expanded]
            .into_iter()
            .find_map(|mode| {
                self.collection(mode)
                    .borrow()
                    .iter()
                    .find(|w| w.id == id)
                    .map(|w| (mode, *w))
            })
    }

    /// Consistent view of all four slices.
    pub fn snapshot(&self) -> DashboardSnapshot {
        let _guard = self.lock();
        DashboardSnapshot {
            device_filter: self.device_filter(),
            selected_day: self.selected_day(),
            regular_widgets: self.widgets(DisplayMode::Regular),
            expanded_widgets: self.widgets(DisplayMode::Expanded),
        }
    }

    // --- Subscriptions -----------------------------------------------------

    pub fn subscribe_device_filter(&self) -> watch::Receiver<DeviceFilter> {
        self.device_filter.subscribe()
    }

    pub fn subscribe_selected_day(&self) -> watch::Receiver<String> {
        self.selected_day.subscribe()
    }

    pub fn subscribe_widgets(&self, mode: DisplayMode) -> watch::Receiver<Vec<WidgetConfig>> {
        self.collection(mode).subscribe()
    }

    /// Bumped once per published mutation; the persistence dirty flag.
    pub fn subscribe_revisions(&self) -> watch::Receiver<u64> {
        self.revision.subscribe()
    }

    /// Combined subscription over every slice.
    pub fn changes(&self) -> StateChanges {
        StateChanges {
            device_filter: self.subscribe_device_filter(),
            selected_day: self.subscribe_selected_day(),
            regular_widgets: self.subscribe_widgets(DisplayMode::Regular),
            expanded_widgets: self.subscribe_widgets(DisplayMode::Expanded),
        }
    }

    // --- Mutations ---------------------------------------------------------

    pub fn set_device_filter(&self, filter: DeviceFilter) -> bool {
        let _guard = self.lock();
        let changed = Self::publish_scalar(&self.device_filter, filter);
        if changed {
            tracing::debug!("Device filter set to {}", filter);
            self.bump_revision();
        }
        changed
    }

    /// The day is trusted to be an ISO date; callers validate at their boundary.
    pub fn set_selected_day(&self, day: impl Into<String>) -> bool {
        let _guard = self.lock();
        let day = day.into();
        let changed = Self::publish_scalar(&self.selected_day, day.clone());
        if changed {
            tracing::debug!("Selected day set to {}", day);
            self.bump_revision();
        }
        changed
    }

    /// Appends a new widget and returns its id. Ids are never reused.
    pub fn add_widget(&self, mode: DisplayMode, metric_type: MetricType) -> WidgetId {
        let mut inner = self.lock();
        let id = inner.next_id;
        inner.next_id += 1;

        let mut widgets = self.widgets(mode);
        widgets.push(WidgetConfig::new(id, metric_type));
        self.publish_widgets(mode, widgets);
        self.bump_revision();

        tracing::debug!("Added {} widget {} ({})", mode, id, metric_type);
        id
    }

    /// Returns false when no collection holds `id`.
    pub fn remove_widget(&self, id: WidgetId) -> bool {
        let _guard = self.lock();
        let Some((mode, _)) = self.find(id) else {
            return false;
        };

        let mut widgets = self.widgets(mode);
        widgets.retain(|w| w.id != id);
        self.publish_widgets(mode, widgets);
        self.bump_revision();

        tracing::debug!("Removed {} widget {}", mode, id);
        true
    }

    /// Toggles a widget between the regular and expanded collections.
    pub fn move_widget(&self, id: WidgetId) -> bool {
        let _guard = self.lock();
        match self.find(id) {
            Some((mode, widget)) => self.transfer(widget, mode, mode.other()),
            None => false,
        }
    }

    /// Moves a widget to `target`; a no-op when it already lives there.
    pub fn set_widget_mode(&self, id: WidgetId, target: DisplayMode) -> bool {
        let _guard = self.lock();
        match self.find(id) {
            Some((mode, widget)) if mode != target => self.transfer(widget, mode, target),
            _ => false,
        }
    }

    fn transfer(&self, widget: WidgetConfig, from: DisplayMode, to: DisplayMode) -> bool {
        let mut source = self.widgets(from);
        source.retain(|w| w.id != widget.id);
        let mut target = self.widgets(to);
        target.push(widget);

        self.publish_widgets(from, source);
        self.publish_widgets(to, target);
        self.bump_revision();

        tracing::debug!("Moved widget {} from {} to {}", widget.id, from, to);
        true
    }

    /// Changes a widget's metric type in place.
    pub fn set_widget_type(&self, id: WidgetId, metric_type: MetricType) -> bool {
        let _guard = self.lock();
        let Some((mode, _)) = self.find(id) else {
            return false;
        };

        let widgets = self
            .widgets(mode)
            .into_iter()
            .map(|w| if w.id == id { WidgetConfig::new(id, metric_type) } else { w })
            .collect();
        let changed = self.publish_widgets(mode, widgets);
        if changed {
            self.bump_revision();
        }
        changed
    }

    pub fn toggle_metric_type(&self, id: WidgetId) -> bool {
        match self.get_widget(id) {
            Some((_, widget)) => self.set_widget_type(id, widget.metric_type.toggled()),
            None => false,
        }
    }

    /// Replaces a collection's order.
    ///
    /// `new_order` must be a permutation of the collection's current widgets with matching
    /// types; anything else is rejected and leaves the collection untouched.
    pub fn reorder_widgets(
        &self,
        mode: DisplayMode,
        new_order: Vec<WidgetConfig>,
    ) -> Result<bool, DashboardError> {
        let _guard = self.lock();
        let current = self.widgets(mode);
        validate_permutation(mode, &current, &new_order)?;

        let changed = self.publish_widgets(mode, new_order);
        if changed {
            self.bump_revision();
        }
        Ok(changed)
    }

    // --- Restore -----------------------------------------------------------

    /// Validates a persisted blob and applies it whole.
    ///
    /// On error nothing is applied and the current state stays in place.
    pub fn restore_from_blob(&self, blob: &str) -> Result<(), DashboardError> {
        let snapshot = DashboardSnapshot::from_blob(blob)?;
        self.restore(snapshot);
        Ok(())
    }

    pub fn restore(&self, snapshot: DashboardSnapshot) {
        let mut inner = self.lock();
        // Ids handed out before the restore stay retired.
        let restored_next = snapshot
            .max_widget_id()
            .and_then(|max| max.checked_add(1))
            .unwrap_or(1);
        inner.next_id = inner.next_id.max(restored_next);

        let mut changed = Self::publish_scalar(&self.device_filter, snapshot.device_filter);
        changed |= Self::publish_scalar(&self.selected_day, snapshot.selected_day);
        changed |= self.publish_widgets(DisplayMode::Regular, snapshot.regular_widgets);
        changed |= self.publish_widgets(DisplayMode::Expanded, snapshot.expanded_widgets);
        if changed {
            self.bump_revision();
        }

        tracing::debug!("Restored dashboard state, next widget id {}", inner.next_id);
    }
}

fn validate_permutation(
    mode: DisplayMode,
    current: &[WidgetConfig],
    new_order: &[WidgetConfig],
) -> Result<(), DashboardError> {
    let reject = |reason: String| DashboardError::InvalidReorder {
        collection: mode,
        reason,
    };

    if current.len() != new_order.len() {
        return Err(reject(format!(
            "expected {} widgets, got {}",
            current.len(),
            new_order.len()
        )));
    }

    let mut seen = HashSet::new();
    for widget in new_order {
        if !seen.insert(widget.id) {
            return Err(reject(format!("widget {} appears twice", widget.id)));
        }
        match current.iter().find(|w| w.id == widget.id) {
            Some(existing) if existing.metric_type == widget.metric_type => {}
            Some(existing) => {
                return Err(reject(format!(
                    "widget {} changes type from {} to {}",
                    widget.id, existing.metric_type, widget.metric_type
                )));
            }
            None => return Err(reject(format!("widget {} is not in this collection", widget.id))),
        }
    }

    Ok(())
}

/// Receivers for every store slice, awaited together.
pub struct StateChanges {
    device_filter: watch::Receiver<DeviceFilter>,
    selected_day: watch::Receiver<String>,
    regular_widgets: watch::Receiver<Vec<WidgetConfig>>,
    expanded_widgets: watch::Receiver<Vec<WidgetConfig>>,
}

impl StateChanges {
    /// Waits for the next published change to any slice.
    ///
    /// Returns false once the store has been dropped.
    pub async fn changed(&mut self) -> bool {
        let result = tokio::select! {
            r = self.device_filter.changed() => r,
            r = self.selected_day.changed() => r,
            r = self.regular_widgets.changed() => r,
            r = self.expanded_widgets.changed() => r,
        };
        result.is_ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store_with_widgets() -> (DashboardStore, WidgetId, WidgetId, WidgetId) {
        let store = DashboardStore::new("2025-02-28");
        let a = store.add_widget(DisplayMode::Regular, MetricType::Users);
        let b = store.add_widget(DisplayMode::Regular, MetricType::PageViews);
        let c = store.add_widget(DisplayMode::Regular, MetricType::Users);
        (store, a, b, c)
    }

    #[test]
    fn test_defaults() {
        let store = DashboardStore::new("2025-02-28");
        let snapshot = store.snapshot();
        assert_eq!(snapshot.device_filter, DeviceFilter::Total);
        assert_eq!(snapshot.selected_day, "2025-02-28");
        assert!(snapshot.regular_widgets.is_empty());
        assert!(snapshot.expanded_widgets.is_empty());
    }

    #[test]
    fn test_ids_are_never_reused() {
        let store = DashboardStore::new("2025-02-28");
        let first = store.add_widget(DisplayMode::Regular, MetricType::Users);
        assert!(store.remove_widget(first));
        let second = store.add_widget(DisplayMode::Regular, MetricType::Users);
        assert_ne!(first, second);
        assert!(second > first);
    }

    #[test]
    fn test_remove_absent_widget_is_noop() {
        let (store, ..) = store_with_widgets();
        let revisions = store.subscribe_revisions();
        assert!(!store.remove_widget(99));
        assert!(!revisions.has_changed().unwrap());
        assert_eq!(store.widgets(DisplayMode::Regular).len(), 3);
    }

    #[test]
    fn test_only_changes_are_published() {
        let store = DashboardStore::new("2025-02-28");
        let mut filter = store.subscribe_device_filter();
        let day = store.subscribe_selected_day();

        assert!(!store.set_device_filter(DeviceFilter::Total));
        assert!(!filter.has_changed().unwrap());

        assert!(store.set_device_filter(DeviceFilter::Mobile));
        assert!(filter.has_changed().unwrap());
        assert_eq!(*filter.borrow_and_update(), DeviceFilter::Mobile);

        assert!(!store.set_selected_day("2025-02-28"));
        assert!(!day.has_changed().unwrap());
    }

    #[test]
    fn test_selected_day_change_is_published() {
        let store = DashboardStore::new("2025-02-28");
        let day = store.subscribe_selected_day();

        assert!(store.set_selected_day("2025-02-14"));
        assert!(day.has_changed().unwrap());
        assert_eq!(*day.borrow(), "2025-02-14");
        assert_eq!(*store.subscribe_revisions().borrow(), 1);
    }

    #[test]
    fn test_move_widget_toggles_collection() {
        let (store, a, b, c) = store_with_widgets();

        assert!(store.move_widget(b));
        assert_eq!(
            store.get_widget(b),
            Some((DisplayMode::Expanded, WidgetConfig::new(b, MetricType::PageViews)))
        );
        assert_eq!(
            store.widgets(DisplayMode::Regular).iter().map(|w| w.id).collect::<Vec<_>>(),
            vec![a, c]
        );

        assert!(store.move_widget(b));
        assert_eq!(store.get_widget(b).map(|(mode, _)| mode), Some(DisplayMode::Regular));
        assert_eq!(store.widgets(DisplayMode::Regular).last().map(|w| w.id), Some(b));

        assert!(!store.move_widget(42));
    }

    #[test]
    fn test_set_widget_mode() {
        let (store, a, ..) = store_with_widgets();
        assert!(!store.set_widget_mode(a, DisplayMode::Regular));
        assert!(store.set_widget_mode(a, DisplayMode::Expanded));
        assert_eq!(store.widgets(DisplayMode::Expanded), vec![WidgetConfig::new(a, MetricType::Users)]);
    }

    #[test]
    fn test_type_change_keeps_position() {
        let (store, a, b, c) = store_with_widgets();
        assert!(store.toggle_metric_type(b));
        assert_eq!(
            store.widgets(DisplayMode::Regular),
            vec![
                WidgetConfig::new(a, MetricType::Users),
                WidgetConfig::new(b, MetricType::Users),
                WidgetConfig::new(c, MetricType::Users),
            ]
        );
        assert!(!store.set_widget_type(b, MetricType::Users));
        assert!(!store.toggle_metric_type(77));
    }

    #[test]
    fn test_valid_reorder() {
        let (store, a, b, c) = store_with_widgets();
        let reversed = vec![
            WidgetConfig::new(c, MetricType::Users),
            WidgetConfig::new(b, MetricType::PageViews),
            WidgetConfig::new(a, MetricType::Users),
        ];
        assert_eq!(store.reorder_widgets(DisplayMode::Regular, reversed.clone()), Ok(true));
        assert_eq!(store.widgets(DisplayMode::Regular), reversed);
    }

    #[test]
    fn test_invalid_reorders_leave_state_unchanged() {
        let (store, a, b, c) = store_with_widgets();
        let before = store.widgets(DisplayMode::Regular);
        let revisions = store.subscribe_revisions();

        let missing = vec![
            WidgetConfig::new(c, MetricType::Users),
            WidgetConfig::new(a, MetricType::Users),
        ];
        let duplicate = vec![
            WidgetConfig::new(a, MetricType::Users),
            WidgetConfig::new(a, MetricType::Users),
            WidgetConfig::new(b, MetricType::PageViews),
        ];
        let retyped = vec![
            WidgetConfig::new(a, MetricType::PageViews),
            WidgetConfig::new(b, MetricType::PageViews),
            WidgetConfig::new(c, MetricType::Users),
        ];
        let foreign = vec![
            WidgetConfig::new(a, MetricType::Users),
            WidgetConfig::new(b, MetricType::PageViews),
            WidgetConfig::new(9, MetricType::Users),
        ];

        for order in [missing, duplicate, retyped, foreign] {
            let result = store.reorder_widgets(DisplayMode::Regular, order);
            assert!(matches!(result, Err(DashboardError::InvalidReorder { .. })));
            assert_eq!(store.widgets(DisplayMode::Regular), before);
        }
        assert!(!revisions.has_changed().unwrap());
    }

    #[test]
    fn test_restore_rejects_bogus_snapshot() {
        let store = DashboardStore::new("2025-02-28");
        let blob = r#"{"deviceFilter":"bogus","selectedDay":"2025-02-03","regularWidgets":[{"id":5,"type":"users"}],"expandedWidgets":[]}"#;

        assert!(matches!(
            store.restore_from_blob(blob),
            Err(DashboardError::InvalidSnapshot(_))
        ));
        let snapshot = store.snapshot();
        assert_eq!(snapshot.device_filter, DeviceFilter::Total);
        assert_eq!(snapshot.selected_day, "2025-02-28");
        assert!(snapshot.regular_widgets.is_empty());
        assert!(snapshot.expanded_widgets.is_empty());
    }

    #[test]
    fn test_restore_recomputes_next_id() {
        let store = DashboardStore::new("2025-02-28");
        let blob = r#"{"deviceFilter":"desktop","selectedDay":"2025-02-10","regularWidgets":[{"id":3,"type":"users"}],"expandedWidgets":[{"id":8,"type":"pageViews"}]}"#;

        store.restore_from_blob(blob).unwrap();
        assert_eq!(store.device_filter(), DeviceFilter::Desktop);
        assert_eq!(store.selected_day(), "2025-02-10");
        assert_eq!(store.add_widget(DisplayMode::Regular, MetricType::Users), 9);
    }

    #[test]
    fn test_restore_never_lowers_next_id() {
        let store = DashboardStore::new("2025-02-28");
        for _ in 0..5 {
            store.add_widget(DisplayMode::Regular, MetricType::Users);
        }
        let blob = r#"{"deviceFilter":"total","selectedDay":"2025-02-28","regularWidgets":[{"id":1,"type":"users"}],"expandedWidgets":[]}"#;

        store.restore_from_blob(blob).unwrap();
        assert_eq!(store.widgets(DisplayMode::Regular), vec![WidgetConfig::new(1, MetricType::Users)]);
        assert_eq!(store.add_widget(DisplayMode::Regular, MetricType::Users), 6);
    }

    #[test]
    fn test_restore_rejects_exhausted_id_space() {
        let store = DashboardStore::new("2025-02-28");
        let blob = r#"{"deviceFilter":"mobile","selectedDay":"2025-02-01","regularWidgets":[{"id":18446744073709551615,"type":"users"}],"expandedWidgets":[]}"#;

        assert!(matches!(
            store.restore_from_blob(blob),
            Err(DashboardError::InvalidSnapshot(_))
        ));
        assert_eq!(store.device_filter(), DeviceFilter::Total);
        assert_eq!(store.add_widget(DisplayMode::Regular, MetricType::Users), 1);
    }

    #[tokio::test]
    async fn test_state_changes_wakes_on_any_slice() {
        let store = DashboardStore::new("2025-02-28");
        let mut changes = store.changes();

        store.add_widget(DisplayMode::Expanded, MetricType::Users);
        assert!(changes.changed().await);

        store.set_selected_day("2025-02-01");
        assert!(changes.changed().await);
    }
}
