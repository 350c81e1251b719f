// Server configuration: defaults, file, environment

use ecovision_eye::models::DevicePreference;
use ecovision_eye::VisionConfig;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use thiserror::Error;

const LOG_LEVELS: [&str; 5] = ["trace", "debug", "info", "warn", "error"];

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    IoError(String),

    #[error("Parse error: {0}")]
    ParseError(String),

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

/// Log output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Text,
    Json,
}

impl FromStr for LogFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "text" => Ok(LogFormat::Text),
            "json" => Ok(LogFormat::Json),
            other => Err(format!("Unknown log format '{}', expected text or json", other)),
        }
    }
}

impl fmt::Display for LogFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LogFormat::Text => write!(f, "text"),
            LogFormat::Json => write!(f, "json"),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub log_level: String,
    pub log_format: LogFormat,
    /// Largest accepted request body
    pub max_upload_bytes: usize,
    pub vision: VisionConfig,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8000,
            log_level: "info".to_string(),
            log_format: LogFormat::Text,
            max_upload_bytes: 20 * 1024 * 1024,
            vision: VisionConfig::default(),
        }
    }
}

impl ServerConfig {
    /// Load configuration from a TOML or YAML file
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .map_err(|e| ConfigError::IoError(format!("{}: {}", path.display(), e)))?;
        Self::from_str(&content)
    }

    /// Parse configuration text, trying TOML first and then YAML
    pub fn from_str(content: &str) -> Result<Self, ConfigError> {
        let toml_err = match toml::from_str::<ServerConfig>(content) {
            Ok(config) => return Ok(config),
            Err(e) => e,
        };

        serde_yaml::from_str::<ServerConfig>(content).map_err(|yaml_err| {
            ConfigError::ParseError(format!("not TOML ({}) nor YAML ({})", toml_err.message(), yaml_err))
        })
    }

    /// Apply `ECOVISION_*` overrides from the process environment
    pub fn apply_env(&mut self) -> Result<(), ConfigError> {
        self.apply_vars(|key| std::env::var(key).ok())
    }

    /// Apply overrides from any variable source
    pub fn apply_vars<F>(&mut self, lookup: F) -> Result<(), ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(host) = lookup("ECOVISION_HOST") {
            self.host = host;
        }

        if let Some(port) = lookup("ECOVISION_PORT") {
            self.port = port
                .trim()
                .parse()
                .map_err(|_| ConfigError::Invalid(format!("ECOVISION_PORT is not a port: {:?}", port)))?;
        }

        if let Some(level) = lookup("ECOVISION_LOG_LEVEL") {
            self.log_level = level;
        }

        if let Some(dir) = lookup("ECOVISION_MODEL_DIR") {
            self.vision.model_dir = PathBuf::from(dir);
        }

        if let Some(device) = lookup("ECOVISION_DEVICE") {
            self.vision.device = DevicePreference::from_str(&device).map_err(ConfigError::Invalid)?;
        }

        Ok(())
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.host.trim().is_empty() {
            return Err(ConfigError::Invalid("host must not be empty".to_string()));
        }

        if !LOG_LEVELS.contains(&self.log_level.to_lowercase().as_str()) {
            return Err(ConfigError::Invalid(format!(
                "log_level must be one of {}, got {:?}",
                LOG_LEVELS.join(", "),
                self.log_level
            )));
        }

        if self.max_upload_bytes == 0 {
            return Err(ConfigError::Invalid("max_upload_bytes must be positive".to_string()));
        }

        self.vision.validate().map_err(ConfigError::Invalid)
    }

    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}
