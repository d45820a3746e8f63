// Metric domain models
use super::error::ParseKindError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum MetricType {
    Users,
    PageViews,
}

impl MetricType {
    pub const ALL: [MetricType; 2] = [MetricType::Users, MetricType::PageViews];

    pub fn as_str(&self) -> &'static str {
        match self {
            MetricType::Users => "users",
            MetricType::PageViews => "pageViews",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            MetricType::Users => "Users",
            MetricType::PageViews => "Page Views",
        }
    }

    /// The other tracked metric, used by the widget type toggle.
    pub fn toggled(&self) -> Self {
        match self {
            MetricType::Users => MetricType::PageViews,
            MetricType::PageViews => MetricType::Users,
        }
    }
}

impl fmt::Display for MetricType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for MetricType {
    type Err = ParseKindError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "users" => Ok(MetricType::Users),
            "pageViews" => Ok(MetricType::PageViews),
            _ => Err(ParseKindError::new("metric type", s)),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DeviceFilter {
    #[default]
    Total,
    Desktop,
    Mobile,
}

impl DeviceFilter {
    pub fn as_str(&self) -> &'static str {
        match self {
            DeviceFilter::Total => "total",
            DeviceFilter::Desktop => "desktop",
            DeviceFilter::Mobile => "mobile",
        }
    }
}

impl fmt::Display for DeviceFilter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DeviceFilter {
    type Err = ParseKindError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "total" => Ok(DeviceFilter::Total),
            "desktop" => Ok(DeviceFilter::Desktop),
            "mobile" => Ok(DeviceFilter::Mobile),
            _ => Err(ParseKindError::new("device filter", s)),
        }
    }
}

/// One day of counts. `total == desktop + mobile` is expected but not enforced.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DailyMetric {
    pub date: String,
    pub total: u64,
    pub desktop: u64,
    pub mobile: u64,
}

impl DailyMetric {
    pub fn new(date: impl Into<String>, total: u64, desktop: u64, mobile: u64) -> Self {
        Self {
            date: date.into(),
            total,
            desktop,
            mobile,
        }
    }

    pub fn value(&self, filter: DeviceFilter) -> u64 {
        match filter {
            DeviceFilter::Total => self.total,
            DeviceFilter::Desktop => self.desktop,
            DeviceFilter::Mobile => self.mobile,
        }
    }

    pub fn is_consistent(&self) -> bool {
        self.desktop.checked_add(self.mobile) == Some(self.total)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MetricSeries {
    pub monthly_target: f64,
    pub daily_data: Vec<DailyMetric>,
}

impl MetricSeries {
    pub fn new(monthly_target: f64, daily_data: Vec<DailyMetric>) -> Self {
        Self {
            monthly_target,
            daily_data,
        }
    }

    /// Stand-in for a metric the data source cannot supply.
    pub fn empty() -> Self {
        Self {
            monthly_target: 0.0,
            daily_data: Vec::new(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.daily_data.is_empty()
    }

    pub fn last_date(&self) -> Option<&str> {
        self.daily_data.last().map(|d| d.date.as_str())
    }

    pub fn dates(&self) -> impl Iterator<Item = &str> {
        self.daily_data.iter().map(|d| d.date.as_str())
    }

    /// Dates must be strictly increasing for window and cumulative lookups to hold.
    pub fn is_strictly_increasing(&self) -> bool {
        self.daily_data.windows(2).all(|w| w[0].date < w[1].date)
    }
}
