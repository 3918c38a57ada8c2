use std::time::Duration;

use serde::Deserialize;

/// The upstream API asks for at least one second between calls.
pub const MIN_REQUEST_DELAY_MS: u64 = 1000;
pub const MIN_TIMEOUT_SECS: u64 = 1;

fn default_port() -> u16 { 8080 }
fn default_base_url() -> String { "https://developer.nrel.gov/api/nsrdb/v2/solar".to_string() }
fn default_attributes() -> Vec<String> {
    ["ghi", "dni", "dhi", "air_temperature", "wind_speed"]
        .iter()
        .map(|s| s.to_string())
        .collect()
}
fn default_interval() -> u32 { 60 }
fn default_request_delay_ms() -> u64 { MIN_REQUEST_DELAY_MS }
fn default_timeout_secs() -> u64 { 30 }
fn default_efficiency() -> f64 { 0.2 }
fn default_albedo() -> f64 { 0.25 }

#[derive(Debug, Deserialize, Clone, Default)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub nsrdb: NsrdbConfig,
    #[serde(default)]
    pub estimator: EstimatorConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    #[serde(default = "default_port")]
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self { port: default_port() }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct NsrdbConfig {
    #[serde(default = "default_base_url")]
    pub base_url: String,
    /// Attributes requested for every block, e.g. `ghi,dni,dhi`
    #[serde(default = "default_attributes")]
    pub attributes: Vec<String>,
    /// Sampling interval in minutes
    #[serde(default = "default_interval")]
    pub interval: u32,
    #[serde(default)]
    pub include_leap_day: bool,
    #[serde(default = "default_request_delay_ms")]
    pub request_delay_ms: u64,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for NsrdbConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            attributes: default_attributes(),
            interval: default_interval(),
            include_leap_day: false,
            request_delay_ms: default_request_delay_ms(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

impl NsrdbConfig {
    /// Spacing between consecutive sub-requests, never below one second.
    pub fn request_delay(&self) -> Duration {
        Duration::from_millis(self.request_delay_ms.max(MIN_REQUEST_DELAY_MS))
    }

    /// Per-call HTTP timeout, never below one second.
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs.max(MIN_TIMEOUT_SECS))
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct EstimatorConfig {
    /// PV efficiency used when a request leaves it out
    #[serde(default = "default_efficiency")]
    pub default_efficiency: f64,
    /// Ground reflectance for the plane-of-array transposition
    #[serde(default = "default_albedo")]
    pub albedo: f64,
}

impl Default for EstimatorConfig {
    fn default() -> Self {
        Self {
            default_efficiency: default_efficiency(),
            albedo: default_albedo(),
        }
    }
}

impl Config {
    pub fn load(path: &str) -> Result<Self, Box<dyn std::error::Error>> {
        let content = std::fs::read_to_string(path)?;
        let config = serde_json::from_str(&content)?;
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partial_file_uses_defaults() {
        let cfg: Config = serde_json::from_str(r#"{"server": {"port": 9000}}"#).unwrap();
        assert_eq!(cfg.server.port, 9000);
        assert_eq!(cfg.nsrdb.interval, 60);
        assert_eq!(cfg.nsrdb.attributes, vec!["ghi", "dni", "dhi", "air_temperature", "wind_speed"]);
        assert_eq!(cfg.nsrdb.timeout(), Duration::from_secs(30));
        assert_eq!(cfg.estimator.default_efficiency, 0.2);
        assert_eq!(cfg.estimator.albedo, 0.25);
    }

    #[test]
    fn test_request_delay_has_floor() {
        let cfg: NsrdbConfig = serde_json::from_str(r#"{"request_delay_ms": 250}"#).unwrap();
        assert_eq!(cfg.request_delay(), Duration::from_secs(1));

        let cfg: NsrdbConfig = serde_json::from_str(r#"{"request_delay_ms": 2500}"#).unwrap();
        assert_eq!(cfg.request_delay(), Duration::from_millis(2500));
    }

    #[test]
    fn test_timeout_has_floor() {
        let cfg: NsrdbConfig = serde_json::from_str(r#"{"timeout_secs": 0}"#).unwrap();
        assert_eq!(cfg.timeout(), Duration::from_secs(1));

        let cfg: NsrdbConfig = serde_json::from_str(r#"{"timeout_secs": 5}"#).unwrap();
        assert_eq!(cfg.timeout(), Duration::from_secs(5));
    }

    #[test]
    fn test_missing_file_is_error() {
        assert!(Config::load("definitely/not/here.json").is_err());
    }
}
