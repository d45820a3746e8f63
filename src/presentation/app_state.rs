// Application state for HTTP handlers
use crate::application::context::DashboardContext;
use crate::application::widget_board::WidgetBoard;
use std::sync::Arc;

#[derive(Clone)]
pub struct AppState {
    pub context: Arc<DashboardContext>,
    pub board: Arc<WidgetBoard>,
}
