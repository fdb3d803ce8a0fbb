//! Transport port: the broker collaborator seen from the bridge.
//!
//! Inbound traffic arrives as a stream of [`InboundMessage`]; the bridge
//! never learns how it was received. Outbound traffic goes through
//! [`Publisher`], which is fire-and-forget: delivery is only ever confirmed
//! by a matching state change coming back in.

use std::future::Future;

use ampio_domain::error::AmpioError;

/// One message received from the broker.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InboundMessage {
    pub topic: String,
    pub payload: Vec<u8>,
}

impl InboundMessage {
    #[must_use]
    pub fn new(topic: impl Into<String>, payload: impl Into<Vec<u8>>) -> Self {
        Self {
            topic: topic.into(),
            payload: payload.into(),
        }
    }
}

/// One message the bridge wants published.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutboundMessage {
    pub topic: String,
    pub payload: Vec<u8>,
}

impl OutboundMessage {
    #[must_use]
    pub fn new(topic: impl Into<String>, payload: impl Into<Vec<u8>>) -> Self {
        Self {
            topic: topic.into(),
            payload: payload.into(),
        }
    }

    /// Payload as text, for logging.
    #[must_use]
    pub fn payload_str(&self) -> std::borrow::Cow<'_, str> {
        String::from_utf8_lossy(&self.payload)
    }
}

/// Hands outbound messages to the broker.
pub trait Publisher: Send + Sync {
    /// Publish one message.
    fn publish(
        &self,
        message: OutboundMessage,
    ) -> impl Future<Output = Result<(), AmpioError>> + Send;
}

impl<T: Publisher> Publisher for std::sync::Arc<T> {
    fn publish(
        &self,
        message: OutboundMessage,
    ) -> impl Future<Output = Result<(), AmpioError>> + Send {
        (**self).publish(message)
    }
}
