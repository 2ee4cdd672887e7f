use serde::Deserialize;
use std::env;

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub server: ServerConfig,
    pub retry: RetryConfig,
    pub alert: AlertConfig,
    pub sandbox: SandboxConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    pub port: u16,
}

#[derive(Debug, Deserialize, Clone)]
pub struct RetryConfig {
    pub delay_min_ms: u64,
    pub delay_max_ms: u64,
    #[serde(default = "default_session_reset_every")]
    pub session_reset_every: u64,
}

fn default_session_reset_every() -> u64 { 500 }

#[derive(Debug, Deserialize, Clone)]
pub struct AlertConfig {
    #[serde(default = "default_alert_interval_ms")]
    pub interval_ms: u64,
    #[serde(default)]
    pub bell: bool,
}

fn default_alert_interval_ms() -> u64 { 1000 }

#[derive(Debug, Deserialize, Clone)]
pub struct SandboxConfig {
    pub seat_probability: f64,
    pub special_seat_probability: f64,
    #[serde(default = "default_trains_per_search")]
    pub trains_per_search: u32,
    #[serde(default = "default_payments_succeed")]
    pub payments_succeed: bool,
}

fn default_trains_per_search() -> u32 { 10 }
fn default_payments_succeed() -> bool { true }

impl Config {
    pub fn load() -> Result<Self, config::ConfigError> {
        let run_mode = env::var("RUN_MODE").unwrap_or_else(|_| "development".into());

        let s = config::Config::builder()
            .add_source(config::File::with_name("config/default"))
            // Per-environment overrides, optional
            .add_source(config::File::with_name(&format!("config/{}", run_mode)).required(false))
            // Local overrides, not checked in
            .add_source(config::File::with_name("config/local").required(false))
            // Eg.. `RAILHOLD__RETRY__DELAY_MIN_MS=800`
            .add_source(config::Environment::with_prefix("RAILHOLD").separator("__"))
            .build()?;

        s.try_deserialize()
    }

    /// Parse a TOML document directly, without the file/env layering
    pub fn from_toml(source: &str) -> Result<Self, config::ConfigError> {
        config::Config::builder()
            .add_source(config::File::from_str(source, config::FileFormat::Toml))
            .build()?
            .try_deserialize()
    }
}
