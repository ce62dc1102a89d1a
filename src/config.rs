use config::{Config, File};
pub use config::ConfigError;
use serde::Deserialize;

use crate::grid::config::StrategyConfig;

/// Main configuration struct
#[derive(Debug, Deserialize)]
pub struct Settings {
    /// Instrument pair, grid, signal, execution, hedge and telemetry parameters
    pub strategy: StrategyConfig,
    /// Logging configuration
    #[serde(default)]
    pub log: LogConfig,
}

#[derive(Debug, Deserialize)]
pub struct LogConfig {
    /// Log level: "error", "warn", "info", "debug", "trace"
    #[serde(default = "default_log_level")]
    pub level: String,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Settings {
    /// Load settings from a configuration file
    pub fn new(config_path: &str) -> Result<Self, ConfigError> {
        let s = Config::builder()
            .add_source(File::with_name(config_path))
            // Environment overrides the file,
            // e.g. APP_STRATEGY__GRID_CONFIG__GRID_NUM=6
            .add_source(config::Environment::with_prefix("APP").separator("__"))
            .build()?;

        s.try_deserialize()
    }
}
