//! Service configuration
//!
//! YAML file merged with `LORASRV_`-prefixed environment variables
//! (double underscore as the section separator, e.g.
//! `LORASRV_POLLING__MAX_RETRIES=3`).

use std::collections::HashSet;
use std::time::Duration;

use figment::{
    providers::{Env, Format, Yaml},
    Figment,
};
use serde::{Deserialize, Serialize};

use lora_proto::NodeId;

use crate::error::{LoraSrvError, Result};
use crate::poll::PollPolicy;

/// Default configuration constants
pub mod defaults {
    /// Minimum gap between two poll starts (milliseconds)
    pub const POLL_INTERVAL_MS: u64 = 5000;
    /// Maximum wait for a reply (milliseconds)
    pub const RESPONSE_TIMEOUT_MS: u64 = 1500;
    /// Transmissions per node per cycle before giving up
    pub const MAX_RETRIES: u32 = 2;
    /// Cadence of the cooperative scheduling loop (milliseconds)
    pub const PASS_INTERVAL_MS: u64 = 50;
    /// Serial modem baud rate
    pub const BAUD_RATE: u32 = 115_200;
}

/// Top-level service configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ServiceConfig {
    #[serde(default)]
    pub service: ServiceSection,
    /// Ordered node roster; order fixes the round-robin sequence
    #[serde(default)]
    pub nodes: Vec<String>,
    #[serde(default)]
    pub polling: PollingConfig,
    #[serde(default)]
    pub channel: ChannelSection,
    #[serde(default)]
    pub sinks: SinkSection,
}

/// Service identity and logging
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServiceSection {
    #[serde(default = "default_service_name")]
    pub name: String,
    /// Console log level (overridden by RUST_LOG)
    #[serde(default = "default_log_level")]
    pub log_level: String,
    /// Log directory; unset disables file logging
    #[serde(default)]
    pub log_dir: Option<String>,
}

impl Default for ServiceSection {
    fn default() -> Self {
        Self {
            name: default_service_name(),
            log_level: default_log_level(),
            log_dir: None,
        }
    }
}

/// Polling cadence and retry budget
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PollingConfig {
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,
    #[serde(default = "default_response_timeout_ms")]
    pub response_timeout_ms: u64,
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    #[serde(default = "default_pass_interval_ms")]
    pub pass_interval_ms: u64,
}

impl Default for PollingConfig {
    fn default() -> Self {
        Self {
            poll_interval_ms: default_poll_interval_ms(),
            response_timeout_ms: default_response_timeout_ms(),
            max_retries: default_max_retries(),
            pass_interval_ms: default_pass_interval_ms(),
        }
    }
}

/// Channel selection and parameters
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ChannelSection {
    #[serde(default)]
    pub mode: ChannelMode,
    #[serde(default)]
    pub serial: SerialSection,
    #[serde(default)]
    pub sim: SimSection,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChannelMode {
    /// In-process simulated network (no hardware)
    #[default]
    Sim,
    /// AT-style LoRa modem on a serial port
    Serial,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SerialSection {
    /// Serial device path, required in serial mode
    #[serde(default)]
    pub device: Option<String>,
    #[serde(default = "default_baud_rate")]
    pub baud_rate: u32,
}

impl Default for SerialSection {
    fn default() -> Self {
        Self {
            device: None,
            baud_rate: default_baud_rate(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SimSection {
    #[serde(default = "default_drop_rate")]
    pub drop_rate: f64,
    #[serde(default = "default_alert_rate")]
    pub alert_rate: f64,
    #[serde(default = "default_reply_delay_ms")]
    pub reply_delay_ms: u64,
}

impl Default for SimSection {
    fn default() -> Self {
        Self {
            drop_rate: default_drop_rate(),
            alert_rate: default_alert_rate(),
            reply_delay_ms: default_reply_delay_ms(),
        }
    }
}

/// Sink selection
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SinkSection {
    #[serde(default = "default_true")]
    pub console: bool,
    #[serde(default)]
    pub csv: CsvSection,
}

impl Default for SinkSection {
    fn default() -> Self {
        Self {
            console: true,
            csv: CsvSection::default(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CsvSection {
    #[serde(default)]
    pub enabled: bool,
    #[serde(default = "default_csv_path")]
    pub path: String,
}

impl Default for CsvSection {
    fn default() -> Self {
        Self {
            enabled: false,
            path: default_csv_path(),
        }
    }
}

// Default value functions for serde
fn default_service_name() -> String {
    "lorasrv".to_string()
}
fn default_log_level() -> String {
    "info".to_string()
}
fn default_poll_interval_ms() -> u64 {
    defaults::POLL_INTERVAL_MS
}
fn default_response_timeout_ms() -> u64 {
    defaults::RESPONSE_TIMEOUT_MS
}
fn default_max_retries() -> u32 {
    defaults::MAX_RETRIES
}
fn default_pass_interval_ms() -> u64 {
    defaults::PASS_INTERVAL_MS
}
fn default_baud_rate() -> u32 {
    defaults::BAUD_RATE
}
fn default_drop_rate() -> f64 {
    0.1
}
fn default_alert_rate() -> f64 {
    0.02
}
fn default_reply_delay_ms() -> u64 {
    150
}
fn default_csv_path() -> String {
    "telemetry_log.csv".to_string()
}
fn default_true() -> bool {
    true
}

impl ServiceConfig {
    /// Load from a YAML file (missing file falls back to defaults) merged
    /// with `LORASRV_`-prefixed environment variables.
    pub fn load(path: &str) -> Result<Self> {
        let config: ServiceConfig = Figment::new()
            .merge(Yaml::file(path))
            .merge(Env::prefixed("LORASRV_").split("__"))
            .extract()?;
        Ok(config)
    }

    /// Reject configurations the poll engine cannot run with.
    pub fn validate(&self) -> Result<()> {
        if self.nodes.is_empty() {
            return Err(LoraSrvError::config("node roster is empty"));
        }
        let mut seen = HashSet::new();
        for node in &self.nodes {
            if !seen.insert(node.as_str()) {
                return Err(LoraSrvError::config(format!("duplicate node id: {node}")));
            }
        }
        if self.polling.max_retries == 0 {
            return Err(LoraSrvError::config("polling.max_retries must be at least 1"));
        }
        if self.polling.response_timeout_ms == 0 {
            return Err(LoraSrvError::config("polling.response_timeout_ms must be non-zero"));
        }
        if self.polling.pass_interval_ms == 0 {
            return Err(LoraSrvError::config("polling.pass_interval_ms must be non-zero"));
        }
        for (name, rate) in [
            ("channel.sim.drop_rate", self.channel.sim.drop_rate),
            ("channel.sim.alert_rate", self.channel.sim.alert_rate),
        ] {
            if !(0.0..=1.0).contains(&rate) {
                return Err(LoraSrvError::config(format!(
                    "{name} must be within [0, 1], got {rate}"
                )));
            }
        }
        if self.channel.mode == ChannelMode::Serial && self.channel.serial.device.is_none() {
            return Err(LoraSrvError::config(
                "channel.serial.device is required in serial mode",
            ));
        }
        Ok(())
    }

    pub fn node_ids(&self) -> Vec<NodeId> {
        self.nodes.iter().map(|label| NodeId::new(label)).collect()
    }

    pub fn poll_policy(&self) -> PollPolicy {
        PollPolicy {
            poll_interval: Duration::from_millis(self.polling.poll_interval_ms),
            response_timeout: Duration::from_millis(self.polling.response_timeout_ms),
            max_retries: self.polling.max_retries,
        }
    }

    pub fn pass_interval(&self) -> Duration {
        Duration::from_millis(self.polling.pass_interval_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn write_config(content: &str) -> (tempfile::TempDir, String) {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("lorasrv.yaml");
        let mut file = std::fs::File::create(&path).unwrap();
        file.write_all(content.as_bytes()).unwrap();
        (dir, path.to_string_lossy().into_owned())
    }

    #[test]
    fn test_defaults_when_file_is_missing() {
        let config = ServiceConfig::load("/nonexistent/lorasrv.yaml").unwrap();
        assert_eq!(config.service.name, "lorasrv");
        assert_eq!(config.polling.poll_interval_ms, 5000);
        assert_eq!(config.polling.response_timeout_ms, 1500);
        assert_eq!(config.polling.max_retries, 2);
        assert_eq!(config.channel.mode, ChannelMode::Sim);
        assert!(config.sinks.console);
        assert!(!config.sinks.csv.enabled);
        assert!(config.nodes.is_empty());
    }

    #[test]
    fn test_load_full_file() {
        let (_dir, path) = write_config(
            r#"
service:
  name: lorasrv
  log_level: debug
nodes: [NODE1, NODE2, NODE3]
polling:
  poll_interval_ms: 2000
  response_timeout_ms: 800
  max_retries: 3
channel:
  mode: serial
  serial:
    device: /dev/ttyUSB0
    baud_rate: 57600
sinks:
  csv:
    enabled: true
    path: /tmp/readings.csv
"#,
        );
        let config = ServiceConfig::load(&path).unwrap();
        config.validate().unwrap();
        assert_eq!(config.nodes, ["NODE1", "NODE2", "NODE3"]);
        assert_eq!(config.polling.max_retries, 3);
        assert_eq!(config.channel.mode, ChannelMode::Serial);
        assert_eq!(config.channel.serial.baud_rate, 57600);
        assert!(config.sinks.csv.enabled);

        let policy = config.poll_policy();
        assert_eq!(policy.poll_interval, Duration::from_millis(2000));
        assert_eq!(policy.response_timeout, Duration::from_millis(800));
    }

    #[test]
    fn test_env_overrides_file() {
        let (_dir, path) = write_config("nodes: [NODE1]\n");
        std::env::set_var("LORASRV_POLLING__MAX_RETRIES", "7");
        let config = ServiceConfig::load(&path).unwrap();
        std::env::remove_var("LORASRV_POLLING__MAX_RETRIES");
        assert_eq!(config.polling.max_retries, 7);
    }

    #[test]
    fn test_validation_rejects_bad_rosters() {
        let mut config = ServiceConfig::default();
        assert!(config.validate().is_err());

        config.nodes = vec!["NODE1".into(), "NODE1".into()];
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("duplicate"));
    }

    #[test]
    fn test_validation_rejects_zero_retries() {
        let mut config = ServiceConfig::default();
        config.nodes = vec!["NODE1".into()];
        config.polling.max_retries = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validation_rejects_serial_without_device() {
        let mut config = ServiceConfig::default();
        config.nodes = vec!["NODE1".into()];
        config.channel.mode = ChannelMode::Serial;
        assert!(config.validate().is_err());

        config.channel.serial.device = Some("/dev/ttyUSB0".into());
        config.validate().unwrap();
    }

    #[test]
    fn test_validation_rejects_out_of_range_rates() {
        let mut config = ServiceConfig::default();
        config.nodes = vec!["NODE1".into()];
        config.channel.sim.drop_rate = 1.5;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_node_ids_preserve_order() {
        let mut config = ServiceConfig::default();
        config.nodes = vec!["B".into(), "A".into(), "C".into()];
        let ids: Vec<_> = config.node_ids().iter().map(ToString::to_string).collect();
        assert_eq!(ids, ["B", "A", "C"]);
    }
}
