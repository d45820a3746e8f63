use crate::application::context::CoreTimings;
use serde::Deserialize;
use std::time::Duration;

#[derive(Debug, Deserialize, Clone)]
pub struct DashboardConfig {
    pub server: ServerSettings,
    pub data: DataSettings,
    pub cache: CacheSettings,
    pub state: StateSettings,
    pub widgets: WidgetSettings,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerSettings {
    pub bind_addr: String,
}

#[derive(Debug, Deserialize, Clone)]
pub struct DataSettings {
    pub metrics_path: String,
    pub snapshot_path: String,
}

#[derive(Debug, Deserialize, Clone)]
pub struct CacheSettings {
    pub ttl_secs: u64,
    pub sweep_interval_secs: u64,
}

#[derive(Debug, Deserialize, Clone)]
pub struct StateSettings {
    pub persist_debounce_ms: u64,
    /// Falls back to the last day of the loaded data when unset.
    #[serde(default)]
    pub default_day: Option<String>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct WidgetSettings {
    pub update_debounce_ms: u64,
    pub frame_interval_ms: u64,
}

impl DashboardConfig {
    /// Periods that drive tokio intervals must be non-zero.
    pub fn validate(&self) -> anyhow::Result<()> {
        let periods = [
            ("cache.ttl_secs", self.cache.ttl_secs),
            ("cache.sweep_interval_secs", self.cache.sweep_interval_secs),
            ("widgets.frame_interval_ms", self.widgets.frame_interval_ms),
        ];
        for (key, value) in periods {
            if value == 0 {
                anyhow::bail!("{} must be greater than zero", key);
            }
        }
        Ok(())
    }

    pub fn timings(&self) -> CoreTimings {
        CoreTimings {
            cache_ttl: Duration::from_secs(self.cache.ttl_secs),
            cache_sweep_interval: Duration::from_secs(self.cache.sweep_interval_secs),
            persist_debounce: Duration::from_millis(self.state.persist_debounce_ms),
            widget_debounce: Duration::from_millis(self.widgets.update_debounce_ms),
            frame_interval: Duration::from_millis(self.widgets.frame_interval_ms),
        }
    }
}

fn builder_with_defaults() -> anyhow::Result<config::ConfigBuilder<config::builder::DefaultState>> {
    Ok(config::Config::builder()
        .set_default("server.bind_addr", "0.0.0.0:8080")?
        .set_default("data.metrics_path", "data/metrics.json")?
        .set_default("data.snapshot_path", "state/dashboard.json")?
        .set_default("cache.ttl_secs", 300)?
        .set_default("cache.sweep_interval_secs", 60)?
        .set_default("state.persist_debounce_ms", 300)?
        .set_default("widgets.update_debounce_ms", 50)?
        .set_default("widgets.frame_interval_ms", 16)?)
}

/// Defaults, then `config/dashboard.*` if present, then `DASHBOARD__*` environment variables.
pub fn load_dashboard_config() -> anyhow::Result<DashboardConfig> {
    let settings = builder_with_defaults()?
        .add_source(config::File::with_name("config/dashboard").required(false))
        .add_source(config::Environment::with_prefix("DASHBOARD").separator("__"))
        .build()?;

    let config: DashboardConfig = settings.try_deserialize()?;
    config.validate()?;
    Ok(config)
}
