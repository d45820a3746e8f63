// Persisted projection of dashboard state
use super::error::DashboardError;
use super::metric::{DeviceFilter, MetricType};
use super::widget::{DisplayMode, WidgetConfig, WidgetId};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::HashSet;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DashboardSnapshot {
    pub device_filter: DeviceFilter,
    pub selected_day: String,
    pub regular_widgets: Vec<WidgetConfig>,
    pub expanded_widgets: Vec<WidgetConfig>,
}

impl DashboardSnapshot {
    pub fn widgets(&self, mode: DisplayMode) -> &[WidgetConfig] {
        match mode {
            DisplayMode::Regular => &self.regular_widgets,
            DisplayMode::Expanded => &self.expanded_widgets,
        }
    }

    /// Finds a widget in either collection together with the collection holding it.
    pub fn widget(&self, id: WidgetId) -> Option<(DisplayMode, WidgetConfig)> {
        [DisplayMode::Regular, DisplayMode::Expanded]
            .into_iter()
            .find_map(|mode| {
                self.widgets(mode)
                    .iter()
                    .find(|w| w.id == id)
                    .map(|w| (mode, *w))
            })
    }

    pub fn max_widget_id(&self) -> Option<WidgetId> {
        self.regular_widgets
            .iter()
            .chain(&self.expanded_widgets)
            .map(|w| w.id)
            .max()
    }

    pub fn to_blob(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    /// Parses and validates a persisted blob field by field.
    ///
    /// A snapshot is accepted whole or not at all: any wrong scalar type, unknown enum value,
    /// malformed widget or duplicate widget id rejects the entire blob.
    pub fn from_blob(blob: &str) -> Result<Self, DashboardError> {
        let value: Value = serde_json::from_str(blob)
            .map_err(|e| invalid(format!("not valid JSON: {}", e)))?;
        let object = value
            .as_object()
            .ok_or_else(|| invalid("snapshot is not a JSON object"))?;

        let device_filter = required_str(object, "deviceFilter")?
            .parse::<DeviceFilter>()
            .map_err(|e| invalid(e.to_string()))?;
        let selected_day = required_str(object, "selectedDay")?.to_string();
        let regular_widgets = widget_list(object, "regularWidgets")?;
        let expanded_widgets = widget_list(object, "expandedWidgets")?;

        let mut seen = HashSet::new();
        for widget in regular_widgets.iter().chain(&expanded_widgets) {
            if !seen.insert(widget.id) {
                return Err(invalid(format!("duplicate widget id {}", widget.id)));
            }
        }

        Ok(Self {
            device_filter,
            selected_day,
            regular_widgets,
            expanded_widgets,
        })
    }
}

fn invalid(reason: impl Into<String>) -> DashboardError {
    DashboardError::InvalidSnapshot(reason.into())
}

fn required_str<'a>(object: &'a Map<String, Value>, field: &str) -> Result<&'a str, DashboardError> {
    match object.get(field) {
        Some(Value::String(s)) => Ok(s),
        Some(other) => Err(invalid(format!("{} must be a string, got {}", field, other))),
        None => Err(invalid(format!("missing field {}", field))),
    }
}

fn widget_list(object: &Map<String, Value>, field: &str) -> Result<Vec<WidgetConfig>, DashboardError> {
    let items = match object.get(field) {
        Some(Value::Array(items)) => items,
        Some(_) => return Err(invalid(format!("{} must be an array", field))),
        None => return Err(invalid(format!("missing field {}", field))),
    };

    items
        .iter()
        .enumerate()
        .map(|(index, item)| {
            parse_widget(item).map_err(|reason| invalid(format!("{}[{}]: {}", field, index, reason)))
        })
        .collect()
}

fn parse_widget(item: &Value) -> Result<WidgetConfig, String> {
    let widget = item.as_object().ok_or("widget is not an object")?;
    let id = widget
        .get("id")
        .and_then(Value::as_u64)
        .ok_or("id must be a non-negative integer")?;
    // The next id after a restore must still be representable.
    if id.checked_add(1).is_none() {
        return Err(format!("id {} leaves no room for new widgets", id));
    }
    let metric_type = widget
        .get("type")
        .and_then(Value::as_str)
        .ok_or("type must be a string")?
        .parse::<MetricType>()
        .map_err(|e| e.to_string())?;
    Ok(WidgetConfig::new(id, metric_type))
}

#[cfg(test)]
mod tests {
    use super::*;

    const VALID: &str = r#"{
        "deviceFilter": "mobile",
        "selectedDay": "2025-02-14",
        "regularWidgets": [{"id": 1, "type": "users"}, {"id": 4, "type": "pageViews"}],
        "expandedWidgets": [{"id": 2, "type": "pageViews"}]
    }"#;

    #[test]
    fn test_valid_snapshot() {
        let snapshot = DashboardSnapshot::from_blob(VALID).unwrap();
        assert_eq!(snapshot.device_filter, DeviceFilter::Mobile);
        assert_eq!(snapshot.selected_day, "2025-02-14");
        assert_eq!(snapshot.regular_widgets.len(), 2);
        assert_eq!(snapshot.max_widget_id(), Some(4));
        assert_eq!(
            snapshot.widget(2),
            Some((DisplayMode::Expanded, WidgetConfig::new(2, MetricType::PageViews)))
        );
        assert_eq!(snapshot.widget(3), None);
    }

    #[test]
    fn test_blob_survives_save_and_load() {
        let snapshot = DashboardSnapshot::from_blob(VALID).unwrap();
        let blob = snapshot.to_blob().unwrap();
        assert_eq!(DashboardSnapshot::from_blob(&blob).unwrap(), snapshot);
    }

    #[test]
    fn test_rejects_unknown_device_filter() {
        let blob = r#"{"deviceFilter":"bogus","selectedDay":"2025-02-01","regularWidgets":[],"expandedWidgets":[]}"#;
        assert!(matches!(
            DashboardSnapshot::from_blob(blob),
            Err(DashboardError::InvalidSnapshot(_))
        ));
    }

    #[test]
    fn test_rejects_malformed_widgets() {
        let cases = [
            // unknown metric type
            r#"{"deviceFilter":"total","selectedDay":"d","regularWidgets":[{"id":1,"type":"sessions"}],"expandedWidgets":[]}"#,
            // id as string
            r#"{"deviceFilter":"total","selectedDay":"d","regularWidgets":[{"id":"1","type":"users"}],"expandedWidgets":[]}"#,
            // duplicate id across collections
            r#"{"deviceFilter":"total","selectedDay":"d","regularWidgets":[{"id":1,"type":"users"}],"expandedWidgets":[{"id":1,"type":"users"}]}"#,
            // list is not an array
            r#"{"deviceFilter":"total","selectedDay":"d","regularWidgets":{},"expandedWidgets":[]}"#,
            // missing field
            r#"{"deviceFilter":"total","regularWidgets":[],"expandedWidgets":[]}"#,
            // id at the top of the id space
            r#"{"deviceFilter":"total","selectedDay":"d","regularWidgets":[{"id":18446744073709551615,"type":"users"}],"expandedWidgets":[]}"#,
            // wrong scalar type
            r#"{"deviceFilter":"total","selectedDay":20250201,"regularWidgets":[],"expandedWidgets":[]}"#,
            "[]",
            "not json",
        ];

        for blob in cases {
            assert!(
                DashboardSnapshot::from_blob(blob).is_err(),
                "expected rejection of {}",
                blob
            );
        }
    }
}
