// Dashboard error taxonomy
use super::widget::DisplayMode;

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum DashboardError {
    /// The requested date has no entry in the series.
    #[error("no data found for day {0}")]
    DayNotFound(String),

    /// The data source cannot supply a series for this metric type.
    #[error("unknown metric type: {0}")]
    UnknownMetricType(String),

    #[error("invalid reorder of {collection} widgets: {reason}")]
    InvalidReorder {
        collection: DisplayMode,
        reason: String,
    },

    #[error("invalid dashboard snapshot: {0}")]
    InvalidSnapshot(String),

    #[error("widget computation panicked: {0}")]
    ComputationPanicked(String),
}

/// Failure to parse one of the dashboard's string-keyed enumerations.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unrecognized {kind}: {value:?}")]
pub struct ParseKindError {
    pub kind: &'static str,
    pub value: String,
}

impl ParseKindError {
    pub fn new(kind: &'static str, value: &str) -> Self {
        Self {
            kind,
            value: value.to_string(),
        }
    }
}
