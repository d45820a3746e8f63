// Widget update coordinator - Recomputes one widget when the state it depends on changes
use crate::application::animation::{AnimatedValue, AnimationOptions, AnimationStyle, Easing};
use crate::application::context::DashboardContext;
use crate::application::state_store::StateChanges;
use crate::domain::calculations::{self, MetricSummary, TrendPoint, TREND_DAYS};
use crate::domain::error::DashboardError;
use crate::domain::metric::{DeviceFilter, MetricType};
use crate::domain::snapshot::DashboardSnapshot;
use crate::domain::widget::{DisplayMode, WidgetConfig, WidgetId};
use futures::FutureExt;
use serde::Serialize;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;

pub const DEFAULT_UPDATE_DEBOUNCE: Duration = Duration::from_millis(50);

/// A rise of more than this fraction of the previous value gets the overshoot easing.
const SIGNIFICANT_INCREASE: f64 = 0.1;

/// Latest computation outcome of a widget, apart from its animated fields.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WidgetStatus {
    pub metric_type: Option<MetricType>,
    pub mode: Option<DisplayMode>,
    pub summary: Option<MetricSummary>,
    /// Recent days for the trend chart; only expanded widgets carry one.
    pub trend: Vec<TrendPoint>,
    pub error: Option<String>,
}

/// What the presentation layer reads for one widget on a frame.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WidgetReadout {
    pub id: WidgetId,
    pub display_value: f64,
    pub display_cumulative_value: f64,
    pub display_progress_percentage: f64,
    #[serde(flatten)]
    pub status: WidgetStatus,
}

/// Receivers for everything a widget renders.
#[derive(Debug, Clone)]
pub struct WidgetFrames {
    id: WidgetId,
    status: watch::Receiver<WidgetStatus>,
    current: watch::Receiver<f64>,
    cumulative: watch::Receiver<f64>,
    progress: watch::Receiver<f64>,
}

impl WidgetFrames {
    pub fn readout(&self) -> WidgetReadout {
        WidgetReadout {
            id: self.id,
            display_value: *self.current.borrow(),
            display_cumulative_value: *self.cumulative.borrow(),
            display_progress_percentage: *self.progress.borrow(),
            status: self.status.borrow().clone(),
        }
    }

    /// Waits for the next frame or status change; false once the widget is unmounted.
    pub async fn changed(&mut self) -> bool {
        let result = tokio::select! {
            r = self.status.changed() => r,
            r = self.current.changed() => r,
            r = self.cumulative.changed() => r,
            r = self.progress.changed() => r,
        };
        result.is_ok()
    }
}

/// A mounted widget. Unmounting (or dropping) stops updates and cancels its animations.
#[derive(Debug)]
pub struct WidgetHandle {
    id: WidgetId,
    task: JoinHandle<()>,
    frames: WidgetFrames,
}

impl WidgetHandle {
    pub fn id(&self) -> WidgetId {
        self.id
    }

    pub fn readout(&self) -> WidgetReadout {
        self.frames.readout()
    }

    pub fn frames(&self) -> WidgetFrames {
        self.frames.clone()
    }

    pub fn unmount(self) {}
}

impl Drop for WidgetHandle {
    fn drop(&mut self) {
        self.task.abort();
    }
}

struct WidgetFields {
    current: AnimatedValue,
    cumulative: AnimatedValue,
    progress: AnimatedValue,
}

/// The state slices one computation read.
#[derive(Debug, Clone, PartialEq)]
struct ComputeInputs {
    device_filter: DeviceFilter,
    selected_day: String,
    mode: DisplayMode,
    widget: WidgetConfig,
}

pub struct WidgetCoordinator {
    ctx: Arc<DashboardContext>,
    id: WidgetId,
    fields: WidgetFields,
    status: watch::Sender<WidgetStatus>,
    computed_for: Option<ComputeInputs>,
}

impl WidgetCoordinator {
    /// Computes the widget once, then again after every debounced burst of state changes.
    pub fn mount(ctx: Arc<DashboardContext>, id: WidgetId) -> WidgetHandle {
        let fields = WidgetFields {
            current: AnimatedValue::new(),
            cumulative: AnimatedValue::new(),
            progress: AnimatedValue::new(),
        };
        let (status, status_rx) = watch::channel(WidgetStatus::default());
        let frames = WidgetFrames {
            id,
            status: status_rx,
            current: fields.current.subscribe(),
            cumulative: fields.cumulative.subscribe(),
            progress: fields.progress.subscribe(),
        };

        let changes = ctx.store.changes();
        let coordinator = WidgetCoordinator {
            ctx,
            id,
            fields,
            status,
            computed_for: None,
        };
        let task = tokio::spawn(coordinator.run(changes));

        tracing::debug!("Mounted widget {}", id);
        WidgetHandle { id, task, frames }
    }

    async fn run(mut self, mut changes: StateChanges) {
        self.refresh().await;

        while changes.changed().await {
            loop {
                tokio::select! {
                    alive = changes.changed() => {
                        if !alive {
                            return;
                        }
                    }
                    _ = tokio::time::sleep(self.ctx.widget_debounce) => break,
                }
            }
            self.refresh().await;
        }
    }

    async fn refresh(&mut self) {
        let snapshot = self.ctx.store.snapshot();
        let Some((mode, widget)) = snapshot.widget(self.id) else {
            tracing::debug!("Widget {} no longer present, skipping update", self.id);
            return;
        };

        // Changes to sibling widgets wake every coordinator; only our own inputs matter.
        let inputs = ComputeInputs {
            device_filter: snapshot.device_filter,
            selected_day: snapshot.selected_day.clone(),
            mode,
            widget,
        };
        if self.computed_for.as_ref() == Some(&inputs) {
            tracing::trace!("Widget {} inputs unchanged, skipping update", self.id);
            return;
        }

        let outcome = AssertUnwindSafe(self.compute(&snapshot, mode, widget))
            .catch_unwind()
            .await
            .unwrap_or_else(|panic| Err(DashboardError::ComputationPanicked(panic_message(&*panic))));
        self.computed_for = Some(inputs);

        match outcome {
            Ok((summary, trend)) => {
                self.apply(&summary);
                self.status.send_replace(WidgetStatus {
                    metric_type: Some(widget.metric_type),
                    mode: Some(mode),
                    summary: Some(summary),
                    trend,
                    error: None,
                });
            }
            Err(error) => {
                tracing::warn!("Widget {} keeps its previous values: {}", self.id, error);
                self.ctx
                    .error_sink
                    .report_error(&format!("widget {}", self.id), &error);
                self.status.send_modify(|status| {
                    status.metric_type = Some(widget.metric_type);
                    status.mode = Some(mode);
                    status.error = Some(error.to_string());
                });
            }
        }
    }

    async fn compute(
        &self,
        snapshot: &DashboardSnapshot,
        mode: DisplayMode,
        widget: WidgetConfig,
    ) -> Result<(MetricSummary, Vec<TrendPoint>), DashboardError> {
        let day = snapshot.selected_day.as_str();
        let filter = snapshot.device_filter;
        let series = self.ctx.metric_data(widget.metric_type, filter, day).await;
        let summary = calculations::summarize(&series, day, filter)?;
        let trend = match mode {
            DisplayMode::Expanded => calculations::trend(&series, day, filter, TREND_DAYS),
            DisplayMode::Regular => Vec::new(),
        };
        Ok((summary, trend))
    }

    fn apply(&mut self, summary: &MetricSummary) {
        let scheduler = &self.ctx.scheduler;

        let current = summary.current_value as f64;
        let previous = self.fields.current.last_value();
        let current_options = if current - previous > previous * SIGNIFICANT_INCREASE {
            AnimationOptions::default()
                .easing(Easing::EaseOutBack)
                .duration(Duration::from_millis(1000))
        } else {
            AnimationOptions::default()
                .easing(Easing::EaseOutExpo)
                .duration(Duration::from_millis(750))
        };
        self.fields
            .current
            .retarget(scheduler, current, AnimationStyle::Value(current_options));

        let cumulative_options = AnimationOptions::default()
            .easing(Easing::EaseInOutQuad)
            .duration(Duration::from_millis(1000));
        self.fields.cumulative.retarget(
            scheduler,
            summary.cumulative_value as f64,
            AnimationStyle::Value(cumulative_options),
        );

        self.fields.progress.retarget(
            scheduler,
            summary.progress_percentage,
            AnimationStyle::Percentage(AnimationOptions::default()),
        );
    }
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        message.to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic".to_string()
    }
}
