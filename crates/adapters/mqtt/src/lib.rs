//! # ampio-adapter-mqtt
//!
//! MQTT adapter: connects the bridge to the broker the Ampio gateway
//! publishes to.
//!
//! ## How it works
//!
//! [`connect`] builds a rumqttc client and spawns its event loop. Every
//! `Publish` packet is forwarded, untouched, into the inbound stream the
//! bridge consumes. On each `ConnAck` the loop subscribes again to the
//! whole prefix, since the broker forgets subscriptions of a clean session.
//! Connection errors are logged and polling resumes after a short delay,
//! which is how rumqttc reconnects.
//!
//! ## Dependency rule
//!
//! Same as other adapters: depends on `ampio-app` and `ampio-domain`.

mod config;
mod error;
mod transport;

pub use config::MqttConfig;
pub use error::MqttError;
pub use transport::{MqttPublisher, connect};
