//! Operator configuration
//!
//! Loaded from an optional TOML file (`OPERATOR_CONFIG_FILE`, default
//! `operator.toml`) overlaid with `OPERATOR_*` environment variables.
//! Nested keys use `__`, e.g. `OPERATOR_SCALING__BOUNDS__MAX=8`.

use anyhow::{Context, Result};
use operator_lib::placement::PlacementConfig;
use operator_lib::scaling::ScalingConfig;
use operator_lib::{EngineMode, LoopConfig};
use serde::Deserialize;
use std::path::PathBuf;
use std::time::Duration;

/// Environment variable naming the config file
pub const CONFIG_FILE_ENV: &str = "OPERATOR_CONFIG_FILE";
const DEFAULT_CONFIG_FILE: &str = "operator.toml";

/// Operator configuration
#[derive(Debug, Clone, Deserialize)]
pub struct OperatorConfig {
    /// Identity attached to structured log events
    #[serde(default = "default_operator_name")]
    pub operator_name: String,

    /// API server port for health/metrics/decision log
    #[serde(default = "default_api_port")]
    pub api_port: u16,

    /// Control loops to run
    #[serde(default = "default_modes")]
    pub modes: Vec<EngineMode>,

    /// Location of the redb decision store
    #[serde(default = "default_store_path")]
    pub store_path: PathBuf,

    /// Prometheus server used for battery telemetry and kafka-exporter lag
    #[serde(default = "default_prometheus_url")]
    pub prometheus_url: String,

    #[serde(default)]
    pub battery: BatterySettings,

    #[serde(default)]
    pub carbon: CarbonSettings,

    #[serde(default)]
    pub queue_reader: QueueReaderKind,

    #[serde(default)]
    pub intervals: IntervalSettings,

    #[serde(default)]
    pub placement: PlacementConfig,

    #[serde(default)]
    pub scaling: ScalingConfig,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct BatterySettings {
    /// PromQL selecting the battery percentage per node
    pub query: String,
    /// Range used to classify the trend
    pub lookback_secs: u64,
    pub step_secs: u64,
}

impl Default for BatterySettings {
    fn default() -> Self {
        Self {
            query: "node_solar_battery_level".to_string(),
            lookback_secs: 300,
            step_secs: 60,
        }
    }
}

impl BatterySettings {
    pub fn lookback(&self) -> Duration {
        Duration::from_secs(self.lookback_secs)
    }

    pub fn step(&self) -> Duration {
        Duration::from_secs(self.step_secs)
    }
}

/// Where carbon intensity data comes from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CarbonSourceKind {
    /// Fixed 24-hour profile
    #[default]
    Static,
    /// ElectricityMaps carbon-intensity history
    ElectricityMaps,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct CarbonSettings {
    pub source: CarbonSourceKind,
    pub base_url: String,
    pub zone: String,
    /// Falls back to `ELECTRICITY_MAPS_AUTH_TOKEN`
    pub auth_token: Option<String>,
    /// 24 hourly values for the static source; empty selects the reference profile
    pub profile: Vec<f64>,
}

impl Default for CarbonSettings {
    fn default() -> Self {
        Self {
            source: CarbonSourceKind::default(),
            base_url: operator_lib::carbon::DEFAULT_ELECTRICITY_MAPS_URL.to_string(),
            zone: "SK".to_string(),
            auth_token: None,
            profile: Vec::new(),
        }
    }
}

impl CarbonSettings {
    pub fn auth_token(&self) -> Option<String> {
        self.auth_token
            .clone()
            .or_else(|| std::env::var("ELECTRICITY_MAPS_AUTH_TOKEN").ok())
            .filter(|t| !t.is_empty())
    }
}

/// How consumer-group lag is read
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QueueReaderKind {
    /// kafka-exporter series through Prometheus
    #[default]
    Exporter,
    /// Broker watermarks and committed offsets (needs the `kafka` feature)
    Kafka,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct IntervalSettings {
    pub placement_secs: u64,
    pub scaling_secs: u64,
    pub align_to_hour: bool,
}

impl Default for IntervalSettings {
    fn default() -> Self {
        Self {
            placement_secs: 60,
            scaling_secs: 3600,
            align_to_hour: true,
        }
    }
}

impl IntervalSettings {
    pub fn loop_config(&self) -> LoopConfig {
        LoopConfig {
            placement_interval: Duration::from_secs(self.placement_secs),
            scaling_interval: Duration::from_secs(self.scaling_secs),
            align_to_hour: self.align_to_hour,
        }
    }
}

fn default_operator_name() -> String {
    std::env::var("POD_NAME").unwrap_or_else(|_| "energy-operator".to_string())
}

fn default_api_port() -> u16 {
    8080
}

fn default_modes() -> Vec<EngineMode> {
    vec![EngineMode::NodeAffinity, EngineMode::QueueScaling]
}

fn default_store_path() -> PathBuf {
    PathBuf::from("/var/lib/energy-operator/decisions.redb")
}

fn default_prometheus_url() -> String {
    "http://monitoring-kube-prometheus-prometheus.monitoring:9090/".to_string()
}

impl OperatorConfig {
    /// Load configuration from the config file and environment
    pub fn load() -> Result<Self> {
        let file = std::env::var(CONFIG_FILE_ENV).unwrap_or_else(|_| DEFAULT_CONFIG_FILE.to_string());
        Self::load_from(&file)
    }

    /// Load with an explicit config file path; a missing file is not an error
    pub fn load_from(file: &str) -> Result<Self> {
        let config = config::Config::builder()
            .add_source(config::File::with_name(file).required(false))
            .add_source(
                config::Environment::with_prefix("OPERATOR")
                    .prefix_separator("_")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()
            .with_context(|| format!("failed to read configuration from {}", file))?;

        let config: OperatorConfig = config
            .try_deserialize()
            .context("invalid operator configuration")?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.modes.is_empty() {
            anyhow::bail!("at least one engine mode must be enabled");
        }
        if self.intervals.placement_secs == 0 || self.intervals.scaling_secs == 0 {
            anyhow::bail!("loop intervals must be greater than zero");
        }
        if self.battery.step_secs == 0 {
            anyhow::bail!("battery.step_secs must be greater than zero");
        }
        self.scaling.bounds.validate()?;
        self.scaling.window_policy.validate()?;
        if !self.carbon.profile.is_empty()
            && self.carbon.profile.len() != operator_lib::HOURS_PER_DAY
        {
            anyhow::bail!(
                "carbon.profile needs {} values, got {}",
                operator_lib::HOURS_PER_DAY,
                self.carbon.profile.len()
            );
        }
        if self.carbon.source == CarbonSourceKind::ElectricityMaps && self.carbon.auth_token().is_none() {
            anyhow::bail!("carbon.auth_token or ELECTRICITY_MAPS_AUTH_TOKEN is required for electricity_maps");
        }
        Ok(())
    }

    /// Comma-separated mode names for logging
    pub fn mode_list(&self) -> String {
        self.modes
            .iter()
            .map(|m| m.as_str())
            .collect::<Vec<_>>()
            .join(",")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_defaults_from_missing_file() {
        let config = OperatorConfig::load_from("/nonexistent/operator.toml").unwrap();

        assert_eq!(config.api_port, 8080);
        assert_eq!(config.modes.len(), 2);
        assert_eq!(config.scaling.target.namespace, "testing");
        assert_eq!(config.scaling.target.deployment, "kafka-task-runner");
        assert_eq!((config.scaling.bounds.min, config.scaling.bounds.max), (0, 5));
        assert_eq!(config.scaling.thresholds.queue_size_threshold, 30);
        assert_eq!(config.scaling.window_policy.percentile, 30);
        assert_eq!(config.scaling.window_policy.min_run_length, 2);
        assert_eq!(config.scaling.window_policy.max_windows, 3);
        assert_eq!(config.placement.selector_key, "kubernetes.io/hostname");
        assert_eq!(config.placement.base_threshold, 20.0);
        assert_eq!(config.battery.query, "node_solar_battery_level");
        assert_eq!(config.intervals.scaling_secs, 3600);
        assert_eq!(config.queue_reader, QueueReaderKind::Exporter);
    }

    #[test]
    fn test_file_overrides_nested_fields() {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        writeln!(
            file,
            r#"
api_port = 9191
modes = ["queue_scaling"]

[scaling.bounds]
max = 8

[scaling.thresholds]
queue_size_threshold = 100

[placement]
namespaces = ["batch", "web"]
"#
        )
        .unwrap();

        let config = OperatorConfig::load_from(file.path().to_str().unwrap()).unwrap();

        assert_eq!(config.api_port, 9191);
        assert_eq!(config.modes, vec![EngineMode::QueueScaling]);
        assert_eq!((config.scaling.bounds.min, config.scaling.bounds.max), (0, 8));
        assert_eq!(config.scaling.thresholds.queue_size_threshold, 100);
        assert_eq!(config.placement.namespaces, vec!["batch", "web"]);
        assert_eq!(config.placement.solar_label_value, "solar");
    }

    #[test]
    fn test_invalid_bounds_rejected() {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        writeln!(file, "[scaling.bounds]\nmin = 6\nmax = 5").unwrap();

        assert!(OperatorConfig::load_from(file.path().to_str().unwrap()).is_err());
    }

    #[test]
    fn test_loop_config_conversion() {
        let loop_config = IntervalSettings::default().loop_config();
        assert_eq!(loop_config.placement_interval, Duration::from_secs(60));
        assert!(loop_config.align_to_hour);
    }
}
