// Metric calculations over a daily series
//
// All functions are pure. Ratio-style comparisons return 0 when no meaningful
// comparison exists (short window, zero base) instead of failing.
use super::error::DashboardError;
use super::metric::{DeviceFilter, MetricSeries};
use chrono::NaiveDate;
use serde::Serialize;

/// Days preceding the selected day included in a comparison window.
pub const DEFAULT_LOOKBACK_DAYS: usize = 29;

/// Window entries needed before a week-over-week comparison is meaningful.
const WEEK_WINDOW: usize = 8;

/// Days shown in an expanded widget's trend.
pub const TREND_DAYS: usize = 7;

/// One day of a widget's trend, labelled for a chart axis.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TrendPoint {
    pub date: String,
    pub label: String,
    pub value: u64,
}

/// Everything a widget displays for one (series, day, filter) combination.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MetricSummary {
    pub current_value: u64,
    pub cumulative_value: u64,
    pub progress_percentage: f64,
    pub week_over_week_change: f64,
    pub trailing_average_change: f64,
    pub target_reached: bool,
}

pub fn value_for_day(
    series: &MetricSeries,
    date: &str,
    filter: DeviceFilter,
) -> Result<u64, DashboardError> {
    series
        .daily_data
        .iter()
        .find(|d| d.date == date)
        .map(|d| d.value(filter))
        .ok_or_else(|| DashboardError::DayNotFound(date.to_string()))
}

/// Sum of the selected field over every entry dated on or before `date`.
///
/// ISO dates compare chronologically as strings, so no parsing is needed.
pub fn cumulative_to_date(series: &MetricSeries, date: &str, filter: DeviceFilter) -> u64 {
    series
        .daily_data
        .iter()
        .filter(|d| d.date.as_str() <= date)
        .map(|d| d.value(filter))
        .sum()
}

/// Uncapped progress toward the monthly target; display code clamps if it needs to.
pub fn progress_percentage(series: &MetricSeries, date: &str, filter: DeviceFilter) -> f64 {
    if series.monthly_target <= 0.0 {
        return 0.0;
    }
    cumulative_to_date(series, date, filter) as f64 / series.monthly_target * 100.0
}

/// Percent change of the last value against the value seven entries earlier.
pub fn week_over_week_change(window: &[u64]) -> f64 {
    if window.len() < WEEK_WINDOW {
        return 0.0;
    }
    let today = window[window.len() - 1] as f64;
    let last_week = window[window.len() - WEEK_WINDOW] as f64;
    percent_change(today, last_week)
}

/// Percent change of the last value against the mean of all preceding values.
pub fn trailing_average_comparison(window: &[u64]) -> f64 {
    let Some((&today, previous)) = window.split_last() else {
        return 0.0;
    };
    if previous.is_empty() {
        return 0.0;
    }
    let average = previous.iter().sum::<u64>() as f64 / previous.len() as f64;
    percent_change(today as f64, average)
}

/// Up to `lookback_days + 1` consecutive values ending at `date`, clipped at the series start.
///
/// Empty when `date` is absent from the series.
pub fn comparison_window(
    series: &MetricSeries,
    date: &str,
    filter: DeviceFilter,
    lookback_days: usize,
) -> Vec<u64> {
    let Some(end) = series.daily_data.iter().position(|d| d.date == date) else {
        return Vec::new();
    };
    let start = end.saturating_sub(lookback_days);
    series.daily_data[start..=end]
        .iter()
        .map(|d| d.value(filter))
        .collect()
}

/// The last `days` entries up to and including `date`, clipped at the series start.
///
/// Empty when `date` is absent from the series or `days` is 0.
pub fn trend(series: &MetricSeries, date: &str, filter: DeviceFilter, days: usize) -> Vec<TrendPoint> {
    let Some(lookback) = days.checked_sub(1) else {
        return Vec::new();
    };
    let Some(end) = series.daily_data.iter().position(|d| d.date == date) else {
        return Vec::new();
    };
    series.daily_data[end.saturating_sub(lookback)..=end]
        .iter()
        .map(|d| TrendPoint {
            date: d.date.clone(),
            label: axis_label(&d.date),
            value: d.value(filter),
        })
        .collect()
}

/// "Feb 3" for an ISO date; anything unparseable is shown as is.
fn axis_label(date: &str) -> String {
    NaiveDate::parse_from_str(date, "%Y-%m-%d")
        .map(|d| d.format("%b %-d").to_string())
        .unwrap_or_else(|_| date.to_string())
}

/// Runs every calculation a widget needs.
///
/// An empty series (a metric the data source could not supply) summarizes to zeroes.
pub fn summarize(
    series: &MetricSeries,
    date: &str,
    filter: DeviceFilter,
) -> Result<MetricSummary, DashboardError> {
    if series.is_empty() {
        return Ok(MetricSummary::default());
    }

    let current_value = value_for_day(series, date, filter)?;
    let cumulative_value = cumulative_to_date(series, date, filter);
    let progress = progress_percentage(series, date, filter);
    let window = comparison_window(series, date, filter, DEFAULT_LOOKBACK_DAYS);

    Ok(MetricSummary {
        current_value,
        cumulative_value,
        progress_percentage: progress,
        week_over_week_change: week_over_week_change(&window),
        trailing_average_change: trailing_average_comparison(&window),
        target_reached: progress >= 100.0,
    })
}

fn percent_change(value: f64, base: f64) -> f64 {
    if base == 0.0 {
        return 0.0;
    }
    let change = (value - base) / base * 100.0;
    if change.is_finite() { change.round() } else { 0.0 }
}
