use crate::error::{AppError, Result};
use crate::mqtt::topics::is_valid_device_id;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::Path;

/// Number of hourly averages kept per device, one per UTC hour.
pub const HOURS_PER_DAY: usize = 24;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub mqtt: MqttConfig,
    pub server: ServerConfig,
    #[serde(default)]
    pub auth: AuthConfig,
    pub monitor: MonitorConfig,
    #[serde(default)]
    pub graph: GraphConfig,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MqttTransport {
    Tcp,
    Websocket,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MqttConfig {
    pub host: String,
    pub port: u16,
    #[serde(default = "default_transport")]
    pub transport: MqttTransport,
    /// Path of the broker's websocket listener, only used with the websocket transport
    #[serde(default = "default_ws_path")]
    pub path: String,
    #[serde(default = "default_client_id_prefix")]
    pub client_id_prefix: String,
    pub username: Option<String>,
    pub password: Option<String>,
    #[serde(default = "default_keep_alive")]
    pub keep_alive_secs: u64,
    #[serde(default = "default_qos")]
    pub qos: u8,
    #[serde(default)]
    pub reconnect: ReconnectConfig,
}

fn default_transport() -> MqttTransport {
    MqttTransport::Websocket
}

fn default_ws_path() -> String {
    "/mqtt".into()
}

fn default_client_id_prefix() -> String {
    "power-monitor".into()
}

fn default_keep_alive() -> u64 {
    30
}

fn default_qos() -> u8 {
    1
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReconnectConfig {
    #[serde(default = "default_initial_ms")]
    pub initial_ms: u64,
    #[serde(default = "default_max_ms")]
    pub max_ms: u64,
    /// None keeps retrying forever (with the delay capped at `max_ms`)
    #[serde(default)]
    pub max_attempts: Option<u32>,
}

fn default_initial_ms() -> u64 {
    500
}

fn default_max_ms() -> u64 {
    30_000
}

impl Default for ReconnectConfig {
    fn default() -> Self {
        Self {
            initial_ms: default_initial_ms(),
            max_ms: default_max_ms(),
            max_attempts: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub max_connections: usize,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AuthConfig {
    /// HS256 secret; when absent the dashboard is served without authentication
    #[serde(default)]
    pub jwt_secret: Option<String>,
}

impl AuthConfig {
    /// The configured secret, ignoring an empty value or a placeholder left unexpanded.
    pub fn secret(&self) -> Option<&str> {
        self.jwt_secret
            .as_deref()
            .filter(|s| !s.is_empty() && !s.starts_with("$("))
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MonitorConfig {
    /// Device shown on the single-device page. Not validated here:
    /// an empty id is reported to the page as an alert instead of failing startup.
    #[serde(default)]
    pub device_id: String,
    #[serde(default = "default_pending_timeout")]
    pub pending_timeout_secs: u64,
    #[serde(default = "default_clock_interval")]
    pub clock_interval_ms: u64,
}

fn default_pending_timeout() -> u64 {
    10
}

fn default_clock_interval() -> u64 {
    500
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GraphConfig {
    #[serde(default)]
    pub devices: Vec<GraphDevice>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GraphDevice {
    pub id: String,
    pub label: String,
    /// Hourly average wattage indexed by UTC hour
    pub averages: Vec<f64>,
}

impl Config {
    /// Load configuration from a YAML file with environment variable substitution
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_yaml(&content)
    }

    /// Parse configuration from YAML text, expanding `$(VAR)` placeholders first
    pub fn from_yaml(content: &str) -> Result<Self> {
        let expanded = expand_env_vars(content);

        let config: Config = serde_yaml::from_str(&expanded)?;

        config.validate()?;

        Ok(config)
    }

    /// Validate configuration values
    fn validate(&self) -> Result<()> {
        if self.mqtt.host.is_empty() {
            return Err(AppError::Config("MQTT host cannot be empty".to_string()));
        }

        if self.mqtt.port == 0 {
            return Err(AppError::Config("MQTT port cannot be 0".to_string()));
        }

        if self.mqtt.qos > 2 {
            return Err(AppError::Config(format!(
                "MQTT qos must be 0, 1 or 2 (got {})",
                self.mqtt.qos
            )));
        }

        let reconnect = &self.mqtt.reconnect;
        if reconnect.initial_ms == 0 || reconnect.initial_ms > reconnect.max_ms {
            return Err(AppError::Config(format!(
                "reconnect.initial_ms must be in 1..={} (got {})",
                reconnect.max_ms, reconnect.initial_ms
            )));
        }

        if self.server.port == 0 {
            return Err(AppError::Config("Server port cannot be 0".to_string()));
        }

        if self.monitor.clock_interval_ms == 0 {
            return Err(AppError::Config(
                "monitor.clock_interval_ms cannot be 0".to_string(),
            ));
        }

        let mut seen = HashSet::new();
        for device in &self.graph.devices {
            if !is_valid_device_id(&device.id) {
                return Err(AppError::Config(format!(
                    "graph device '{}' has an unusable id '{}'",
                    device.label, device.id
                )));
            }
            if !seen.insert(device.id.as_str()) {
                return Err(AppError::Config(format!(
                    "graph device id '{}' is listed twice",
                    device.id
                )));
            }
            if device.averages.len() != HOURS_PER_DAY {
                return Err(AppError::Config(format!(
                    "graph device '{}' needs {} hourly averages, got {}",
                    device.id,
                    HOURS_PER_DAY,
                    device.averages.len()
                )));
            }
            if device.averages.iter().any(|v| !v.is_finite()) {
                return Err(AppError::Config(format!(
                    "graph device '{}' has a non-finite average",
                    device.id
                )));
            }
        }

        Ok(())
    }
}

/// Expand environment variables in the format $(VAR_NAME)
fn expand_env_vars(content: &str) -> String {
    let mut result = content.to_string();

    // Find all $(VAR_NAME) patterns
    let re = regex::Regex::new(r"\$\(([A-Z_][A-Z0-9_]*)\)").expect("placeholder regex is valid");

    for cap in re.captures_iter(content) {
        let full_match = &cap[0];
        let var_name = &cap[1];

        if let Ok(value) = std::env::var(var_name) {
            result = result.replace(full_match, &value);
        }
    }

    result
}
