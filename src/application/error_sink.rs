// Shared sink for per-widget failures
use crate::domain::error::DashboardError;

pub trait ErrorSink: Send + Sync {
    fn report_error(&self, context: &str, error: &DashboardError);
}

/// Logs reported errors; the presentation layer decides how to surface them.
#[derive(Debug, Clone, Default)]
pub struct TracingErrorSink;

impl ErrorSink for TracingErrorSink {
    fn report_error(&self, context: &str, error: &DashboardError) {
        tracing::error!(context, %error, "Widget update failed");
    }
}
