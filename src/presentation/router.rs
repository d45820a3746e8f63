// Route table for the dashboard HTTP surface
use crate::presentation::app_state::AppState;
use crate::presentation::handlers::{
    add_widget, get_dashboard, get_widget, health_check, list_days, list_widgets, remove_widget,
    reorder_widgets, set_device_filter, set_selected_day, stream_widget, toggle_widget_mode,
    toggle_widget_type,
};
use axum::{
    routing::{get, post, put},
    Router,
};
use tower_http::trace::TraceLayer;

// Frame chunks are compressed individually in the response builder,
// so no CompressionLayer sits on this router.
pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/healthz", get(health_check))
        .route("/dashboard", get(get_dashboard))
        .route("/dashboard/device-filter", put(set_device_filter))
        .route("/dashboard/selected-day", put(set_selected_day))
        .route("/days", get(list_days))
        .route("/widgets", get(list_widgets).post(add_widget))
        .route("/widgets/order/:mode", put(reorder_widgets))
        .route("/widgets/:id", get(get_widget).delete(remove_widget))
        .route("/widgets/:id/toggle-mode", post(toggle_widget_mode))
        .route("/widgets/:id/toggle-type", post(toggle_widget_type))
        .route("/widgets/:id/frames", get(stream_widget))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
