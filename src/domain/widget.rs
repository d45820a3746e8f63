// Widget configuration domain model
use super::error::ParseKindError;
use super::metric::MetricType;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

pub type WidgetId = u64;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct WidgetConfig {
    pub id: WidgetId,
    #[serde(rename = "type")]
    pub metric_type: MetricType,
}

impl WidgetConfig {
    pub fn new(id: WidgetId, metric_type: MetricType) -> Self {
        Self { id, metric_type }
    }
}

/// Which of the two ordered widget collections a widget lives in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DisplayMode {
    Regular,
    Expanded,
}

impl DisplayMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            DisplayMode::Regular => "regular",
            DisplayMode::Expanded => "expanded",
        }
    }

    pub fn other(&self) -> Self {
        match self {
            DisplayMode::Regular => DisplayMode::Expanded,
            DisplayMode::Expanded => DisplayMode::Regular,
        }
    }
}

impl fmt::Display for DisplayMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DisplayMode {
    type Err = ParseKindError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "regular" => Ok(DisplayMode::Regular),
            "expanded" => Ok(DisplayMode::Expanded),
            _ => Err(ParseKindError::new("display mode", s)),
        }
    }
}
