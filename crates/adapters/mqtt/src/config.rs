//! MQTT connection configuration.

use std::time::Duration;

use serde::Deserialize;

/// Configuration for the broker connection.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct MqttConfig {
    /// MQTT broker hostname or IP address.
    pub broker_host: String,
    /// MQTT broker port.
    pub broker_port: u16,
    /// MQTT client identifier.
    pub client_id: String,
    /// Broker user, if the broker requires authentication.
    pub username: Option<String>,
    /// Broker password, only used together with `username`.
    pub password: Option<String>,
    /// Keep-alive interval in seconds.
    pub keep_alive_secs: u16,
    /// Capacity of the client request queue and of the inbound channel.
    pub channel_capacity: usize,
    /// Delay before polling again after a connection error, in milliseconds.
    pub reconnect_delay_ms: u64,
}

impl Default for MqttConfig {
    fn default() -> Self {
        Self {
            broker_host: "localhost".to_string(),
            broker_port: 1883,
            client_id: "ampio-bridge".to_string(),
            username: None,
            password: None,
            keep_alive_secs: 60,
            channel_capacity: 256,
            reconnect_delay_ms: 1000,
        }
    }
}

impl MqttConfig {
    #[must_use]
    pub fn keep_alive(&self) -> Duration {
        Duration::from_secs(u64::from(self.keep_alive_secs.max(5)))
    }

    #[must_use]
    pub fn reconnect_delay(&self) -> Duration {
        Duration::from_millis(self.reconnect_delay_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn should_have_sensible_defaults() {
        let config = MqttConfig::default();
        assert_eq!(config.broker_host, "localhost");
        assert_eq!(config.broker_port, 1883);
        assert_eq!(config.client_id, "ampio-bridge");
        assert!(config.username.is_none());
        assert_eq!(config.keep_alive(), Duration::from_secs(60));
        assert_eq!(config.reconnect_delay(), Duration::from_secs(1));
    }

    #[test]
    fn should_deserialize_from_toml() {
        let toml = r#"
            broker_host = "192.168.1.10"
            broker_port = 8883
            client_id = "garage"
            username = "ampio"
            password = "secret"
            keep_alive_secs = 30
            channel_capacity = 64
        "#;
        let config: MqttConfig = toml::from_str(toml).unwrap();
        assert_eq!(config.broker_host, "192.168.1.10");
        assert_eq!(config.broker_port, 8883);
        assert_eq!(config.client_id, "garage");
        assert_eq!(config.username.as_deref(), Some("ampio"));
        assert_eq!(config.password.as_deref(), Some("secret"));
        assert_eq!(config.keep_alive_secs, 30);
        assert_eq!(config.channel_capacity, 64);
    }

    #[test]
    fn should_use_defaults_for_missing_fields() {
        let toml = r#"broker_host = "broker.lan""#;
        let config: MqttConfig = toml::from_str(toml).unwrap();
        assert_eq!(config.broker_host, "broker.lan");
        assert_eq!(config.broker_port, 1883);
        assert_eq!(config.client_id, "ampio-bridge");
    }

    #[test]
    fn should_clamp_keep_alive_to_broker_minimum() {
        let config = MqttConfig {
            keep_alive_secs: 1,
            ..MqttConfig::default()
        };
        assert_eq!(config.keep_alive(), Duration::from_secs(5));
    }
}
