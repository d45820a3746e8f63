// Read-only data source for metric series
use crate::domain::error::DashboardError;
use crate::domain::metric::{MetricSeries, MetricType};
use async_trait::async_trait;
use std::sync::Arc;

#[async_trait]
pub trait MetricSource: Send + Sync {
    /// Series for one metric type; the returned data is never mutated.
    async fn get_series(&self, metric_type: MetricType) -> Result<Arc<MetricSeries>, DashboardError>;

    /// Dates a day selector can offer, oldest first.
    async fn available_days(&self) -> Vec<String>;
}
