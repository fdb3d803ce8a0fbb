//! Configuration loading: TOML file with environment variable overrides.
//!
//! Looks for `ampio.toml` in the working directory, or the path given in
//! `AMPIO_CONFIG`. Every field has a sensible default so the file is
//! optional. Environment variables take precedence over file values.

use serde::Deserialize;

use ampio_adapter_mqtt::MqttConfig;
use ampio_app::BridgeConfig;

/// Top-level configuration.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Broker connection settings.
    pub mqtt: MqttConfig,
    /// Bridge behaviour settings.
    pub bridge: BridgeConfig,
    /// Logging settings.
    pub logging: LoggingConfig,
}

/// Logging configuration.
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Filter directive (`RUST_LOG` syntax).
    pub filter: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            filter: "ampiod=info,ampio_app=info,ampio_adapter_mqtt=info".to_string(),
        }
    }
}

impl Config {
    /// Load configuration from the config file (if present) then apply
    /// environment-variable overrides.
    ///
    /// # Errors
    ///
    /// Returns an error if the TOML file exists but is malformed, or if the
    /// resulting configuration is invalid.
    pub fn load() -> Result<Self, ConfigError> {
        let path = std::env::var("AMPIO_CONFIG").unwrap_or_else(|_| "ampio.toml".to_string());
        let mut config = Self::from_file(&path)?;
        config.apply_env_overrides();
        config.validate()?;
        Ok(config)
    }

    fn from_file(path: &str) -> Result<Self, ConfigError> {
        match std::fs::read_to_string(path) {
            Ok(content) => toml::from_str(&content).map_err(ConfigError::Parse),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(Self::default()),
            Err(err) => Err(ConfigError::Io(err)),
        }
    }

    fn apply_env_overrides(&mut self) {
        if let Ok(val) = std::env::var("AMPIO_BROKER_HOST") {
            self.mqtt.broker_host = val;
        }
        if let Ok(val) = std::env::var("AMPIO_BROKER_PORT")
            && let Ok(port) = val.parse()
        {
            self.mqtt.broker_port = port;
        }
        if let Ok(val) = std::env::var("AMPIO_USERNAME") {
            self.mqtt.username = Some(val);
        }
        if let Ok(val) = std::env::var("AMPIO_PASSWORD") {
            self.mqtt.password = Some(val);
        }
        if let Ok(val) = std::env::var("AMPIO_PREFIX") {
            self.bridge.prefix = val;
        }
        if let Ok(val) = std::env::var("AMPIO_LOG") {
            self.logging.filter = val;
        }
        if let Ok(val) = std::env::var("RUST_LOG") {
            self.logging.filter = val;
        }
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.mqtt.broker_port == 0 {
            return Err(ConfigError::Validation(
                "broker port must be non-zero".to_string(),
            ));
        }
        if self.mqtt.client_id.is_empty() {
            return Err(ConfigError::Validation(
                "client id must not be empty".to_string(),
            ));
        }
        let prefix = &self.bridge.prefix;
        if prefix.is_empty() || prefix.contains(['#', '+']) || prefix.ends_with('/') {
            return Err(ConfigError::Validation(format!(
                "invalid topic prefix {prefix:?}"
            )));
        }
        if self.bridge.command_timeout_secs == 0 {
            return Err(ConfigError::Validation(
                "command timeout must be non-zero".to_string(),
            ));
        }
        if self.bridge.silence_timeout_secs == 0 {
            return Err(ConfigError::Validation(
                "silence timeout must be non-zero".to_string(),
            ));
        }
        if !self.bridge.tolerances.temperature.is_finite()
            || self.bridge.tolerances.temperature < 0.0
        {
            return Err(ConfigError::Validation(
                "temperature tolerance must be a non-negative number".to_string(),
            ));
        }
        Ok(())
    }
}

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// TOML parse failure.
    #[error("failed to parse config file")]
    Parse(#[from] toml::de::Error),
    /// File I/O failure.
    #[error("failed to read config file")]
    Io(#[from] std::io::Error),
    /// Semantic validation failure.
    #[error("invalid configuration: {0}")]
    Validation(String),
}
