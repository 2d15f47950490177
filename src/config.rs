use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

use crate::classification::ConfidenceJitter;

/// Main application configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Pipeline behaviour
    #[serde(default)]
    pub pipeline: PipelineConfig,

    /// Decision table source
    #[serde(default)]
    pub tables: TablesConfig,

    /// Observability configuration
    #[serde(default)]
    pub observability: ObservabilityConfig,
}

impl Config {
    /// Load configuration from the embedded defaults, an optional file and the environment
    pub fn load() -> Result<Self, config::ConfigError> {
        let config_path =
            std::env::var("TRIAGE_CONFIG_PATH").unwrap_or_else(|_| "config/triage.toml".to_string());

        config::Config::builder()
            // Start with default values
            .add_source(config::File::from_str(
                include_str!("../config/default.toml"),
                config::FileFormat::Toml,
            ))
            // Override with config file if it exists
            .add_source(config::File::with_name(&config_path).required(false))
            // Override with environment variables (TRIAGE__PIPELINE__STAGE_RETRIES=0)
            .add_source(
                config::Environment::with_prefix("TRIAGE")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?
            .try_deserialize()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineConfig {
    /// Retries at a stage boundary after a recoverable failure; 0 or 1,
    /// larger values are capped at 1
    #[serde(default = "default_stage_retries")]
    pub stage_retries: u32,

    /// Approval wait in seconds; absent or zero waits indefinitely
    #[serde(default)]
    pub approval_timeout_secs: Option<u64>,

    /// Seed for classifier confidence jitter
    #[serde(default)]
    pub classifier_seed: u64,

    /// Maximum jitter applied to classifier confidence; zero disables it
    #[serde(default)]
    pub classifier_jitter: u8,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            stage_retries: default_stage_retries(),
            approval_timeout_secs: None,
            classifier_seed: 0,
            classifier_jitter: 0,
        }
    }
}

impl PipelineConfig {
    pub fn approval_timeout(&self) -> Option<Duration> {
        self.approval_timeout_secs
            .filter(|secs| *secs > 0)
            .map(Duration::from_secs)
    }

    pub fn jitter(&self) -> Option<ConfidenceJitter> {
        (self.classifier_jitter > 0)
            .then(|| ConfidenceJitter::new(self.classifier_seed, self.classifier_jitter))
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TablesConfig {
    /// YAML file with decision tables; built-in tables when absent
    pub path: Option<PathBuf>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ObservabilityConfig {
    /// Log level
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// Enable JSON logging
    #[serde(default)]
    pub json_logs: bool,

    /// Register Prometheus metrics at startup
    #[serde(default = "default_true")]
    pub prometheus_enabled: bool,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
            json_logs: false,
            prometheus_enabled: true,
        }
    }
}

fn default_stage_retries() -> u32 {
    1
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_true() -> bool {
    true
}
