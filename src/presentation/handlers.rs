// HTTP request handlers
use crate::application::widget_coordinator::WidgetReadout;
use crate::domain::error::DashboardError;
use crate::domain::metric::{DeviceFilter, MetricType};
use crate::domain::snapshot::DashboardSnapshot;
use crate::domain::widget::{DisplayMode, WidgetConfig, WidgetId};
use crate::infrastructure::chunked_json::stream_widget_frames;
use crate::presentation::app_state::AppState;
use axum::{
    extract::{Path, State},
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use serde_json::json;

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeviceFilterRequest {
    pub device_filter: DeviceFilter,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SelectedDayRequest {
    pub selected_day: String,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AddWidgetRequest {
    #[serde(default = "default_mode")]
    pub mode: DisplayMode,
    pub metric_type: MetricType,
}

fn default_mode() -> DisplayMode {
    DisplayMode::Regular
}

#[derive(Debug, Serialize, PartialEq)]
pub struct AddWidgetResponse {
    pub id: WidgetId,
}

/// Health check endpoint
pub async fn health_check() -> &'static str {
    "ok"
}

/// Current dashboard state
pub async fn get_dashboard(State(state): State<AppState>) -> Json<DashboardSnapshot> {
    Json(state.context.store.snapshot())
}

/// Days available to the day selector
pub async fn list_days(State(state): State<AppState>) -> Json<Vec<String>> {
    Json(state.context.cache.source().available_days().await)
}

pub async fn set_device_filter(
    State(state): State<AppState>,
    Json(request): Json<DeviceFilterRequest>,
) -> StatusCode {
    state.context.store.set_device_filter(request.device_filter);
    StatusCode::NO_CONTENT
}

/// The store trusts its callers, so the date format is checked here
pub async fn set_selected_day(
    State(state): State<AppState>,
    Json(request): Json<SelectedDayRequest>,
) -> StatusCode {
    if NaiveDate::parse_from_str(&request.selected_day, "%Y-%m-%d").is_err() {
        return StatusCode::BAD_REQUEST;
    }
    state.context.store.set_selected_day(request.selected_day);
    StatusCode::NO_CONTENT
}

pub async fn add_widget(
    State(state): State<AppState>,
    Json(request): Json<AddWidgetRequest>,
) -> (StatusCode, Json<AddWidgetResponse>) {
    let id = state.context.store.add_widget(request.mode, request.metric_type);
    state.board.reconcile();
    (StatusCode::CREATED, Json(AddWidgetResponse { id }))
}

pub async fn remove_widget(State(state): State<AppState>, Path(id): Path<WidgetId>) -> StatusCode {
    if state.context.store.remove_widget(id) {
        state.board.reconcile();
        StatusCode::NO_CONTENT
    } else {
        StatusCode::NOT_FOUND
    }
}

pub async fn toggle_widget_mode(State(state): State<AppState>, Path(id): Path<WidgetId>) -> StatusCode {
    if state.context.store.move_widget(id) {
        StatusCode::NO_CONTENT
    } else {
        StatusCode::NOT_FOUND
    }
}

pub async fn toggle_widget_type(State(state): State<AppState>, Path(id): Path<WidgetId>) -> StatusCode {
    if state.context.store.toggle_metric_type(id) {
        StatusCode::NO_CONTENT
    } else {
        StatusCode::NOT_FOUND
    }
}

pub async fn reorder_widgets(
    State(state): State<AppState>,
    Path(mode): Path<DisplayMode>,
    Json(order): Json<Vec<WidgetConfig>>,
) -> Response {
    match state.context.store.reorder_widgets(mode, order) {
        Ok(_) => Json(state.context.store.widgets(mode)).into_response(),
        Err(e @ DashboardError::InvalidReorder { .. }) => (
            StatusCode::UNPROCESSABLE_ENTITY,
            Json(json!({ "error": e.to_string() })),
        )
            .into_response(),
        Err(e) => {
            tracing::error!("Unexpected reorder failure: {}", e);
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}

/// Interpolated values of every mounted widget, in display order
pub async fn list_widgets(State(state): State<AppState>) -> Json<Vec<WidgetReadout>> {
    Json(state.board.readouts())
}

pub async fn get_widget(
    State(state): State<AppState>,
    Path(id): Path<WidgetId>,
) -> Result<Json<WidgetReadout>, StatusCode> {
    state.board.readout(id).map(Json).ok_or(StatusCode::NOT_FOUND)
}

/// Stream a widget's readouts as they change (progressive rendering)
pub async fn stream_widget(
    Path(id): Path<WidgetId>,
    headers: HeaderMap,
    State(state): State<AppState>,
) -> Response {
    // Check if client accepts Brotli compression
    let compress = headers
        .get("accept-encoding")
        .and_then(|v| v.to_str().ok())
        .map(|s| s.contains("br"))
        .unwrap_or(false);

    match state.board.frames(id) {
        Some(frames) => stream_widget_frames(frames, compress).await.into_response(),
        None => StatusCode::NOT_FOUND.into_response(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::cache::DerivedDataCache;
    use crate::application::context::{CoreTimings, DashboardContext};
    use crate::application::error_sink::TracingErrorSink;
    use crate::application::state_store::DashboardStore;
    use crate::application::widget_board::WidgetBoard;
    use crate::infrastructure::metric_store::StaticMetricSource;
    use std::sync::Arc;

    fn app_state() -> AppState {
        let timings = CoreTimings::default();
        let store = Arc::new(DashboardStore::new("2025-02-28"));
        let cache = Arc::new(DerivedDataCache::new(
            Arc::new(StaticMetricSource::new()),
            timings.cache_ttl,
        ));
        let context = Arc::new(DashboardContext::new(store, cache, Arc::new(TracingErrorSink), timings));
        let board = Arc::new(WidgetBoard::new(context.clone()));
        AppState { context, board }
    }

    #[tokio::test]
    async fn test_selected_day_must_be_iso_date() {
        let state = app_state();

        let status = set_selected_day(
            State(state.clone()),
            Json(SelectedDayRequest { selected_day: "Feb 3".to_string() }),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(state.context.store.selected_day(), "2025-02-28");

        let status = set_selected_day(
            State(state.clone()),
            Json(SelectedDayRequest { selected_day: "2025-02-03".to_string() }),
        )
        .await;
        assert_eq!(status, StatusCode::NO_CONTENT);
        assert_eq!(state.context.store.selected_day(), "2025-02-03");
    }

    #[tokio::test]
    async fn test_added_widget_is_mounted() {
        let state = app_state();

        let (status, Json(body)) = add_widget(
            State(state.clone()),
            Json(AddWidgetRequest { mode: DisplayMode::Expanded, metric_type: MetricType::Users }),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(body, AddWidgetResponse { id: 1 });
        assert!(get_widget(State(state.clone()), Path(1)).await.is_ok());

        assert_eq!(remove_widget(State(state.clone()), Path(1)).await, StatusCode::NO_CONTENT);
        assert_eq!(remove_widget(State(state.clone()), Path(1)).await, StatusCode::NOT_FOUND);
        assert!(get_widget(State(state), Path(1)).await.is_err());
    }

    #[tokio::test]
    async fn test_invalid_reorder_is_unprocessable() {
        let state = app_state();
        state.context.store.add_widget(DisplayMode::Regular, MetricType::Users);

        let response = reorder_widgets(
            State(state.clone()),
            Path(DisplayMode::Regular),
            Json(vec![WidgetConfig::new(1, MetricType::PageViews)]),
        )
        .await;
        assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
    }
}
