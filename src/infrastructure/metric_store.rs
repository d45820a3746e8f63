// In-memory metric source loaded from a JSON data file
use crate::application::metric_source::MetricSource;
use crate::domain::error::DashboardError;
use crate::domain::metric::{MetricSeries, MetricType};
use anyhow::{Context, Result};
use async_trait::async_trait;
use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;

#[derive(Debug, Clone, Default)]
pub struct StaticMetricSource {
    series: HashMap<MetricType, Arc<MetricSeries>>,
}

impl StaticMetricSource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_series(mut self, metric_type: MetricType, series: MetricSeries) -> Self {
        self.series.insert(metric_type, Arc::new(series));
        self
    }

    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read metrics data from {}", path.display()))?;
        Self::from_json_str(&raw).with_context(|| format!("Invalid metrics data in {}", path.display()))
    }

    /// Parses `{ "users": {...}, "pageViews": {...} }`. Unknown metric keys are skipped.
    pub fn from_json_str(raw: &str) -> Result<Self> {
        let entries: HashMap<String, MetricSeries> =
            serde_json::from_str(raw).context("Failed to parse metrics JSON")?;

        let mut source = Self::new();
        for (key, series) in entries {
            let Ok(metric_type) = key.parse::<MetricType>() else {
                tracing::warn!("Skipping unknown metric type {:?} in data file", key);
                continue;
            };

            if !series.is_strictly_increasing() {
                anyhow::bail!("Dates of metric {} are not strictly increasing", key);
            }

            let inconsistent = series.daily_data.iter().filter(|d| !d.is_consistent()).count();
            if inconsistent > 0 {
                tracing::warn!(
                    "{} days of metric {} have total != desktop + mobile",
                    inconsistent,
                    key
                );
            }

            source = source.with_series(metric_type, series);
        }

        Ok(source)
    }

    /// Last date of any loaded series, preferring users.
    pub fn last_day(&self) -> Option<String> {
        MetricType::ALL
            .iter()
            .filter_map(|m| self.series.get(m))
            .find_map(|s| s.last_date().map(str::to_string))
    }
}

#[async_trait]
impl MetricSource for StaticMetricSource {
    async fn get_series(&self, metric_type: MetricType) -> Result<Arc<MetricSeries>, DashboardError> {
        self.series
            .get(&metric_type)
            .cloned()
            .ok_or_else(|| DashboardError::UnknownMetricType(metric_type.to_string()))
    }

    async fn available_days(&self) -> Vec<String> {
        MetricType::ALL
            .iter()
            .filter_map(|m| self.series.get(m))
            .next()
            .map(|s| s.dates().map(str::to_string).collect())
            .unwrap_or_default()
    }
}
