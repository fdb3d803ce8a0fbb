//! Broker connection: the rumqttc event loop and the outbound publisher.

use std::future::Future;
use std::time::Duration;

use rumqttc::{AsyncClient, Event, EventLoop, MqttOptions, Packet, QoS};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_stream::wrappers::ReceiverStream;

use ampio_app::ports::{InboundMessage, OutboundMessage, Publisher};
use ampio_domain::error::AmpioError;
use ampio_domain::topic;

use crate::config::MqttConfig;
use crate::error::MqttError;

/// Connect to the broker and start receiving everything under `prefix`.
///
/// Returns the publisher, the inbound message stream and the event loop
/// task. The task ends once the stream is dropped.
#[must_use]
pub fn connect(
    config: &MqttConfig,
    prefix: &str,
) -> (MqttPublisher, ReceiverStream<InboundMessage>, JoinHandle<()>) {
    let mut options = MqttOptions::new(
        config.client_id.clone(),
        config.broker_host.clone(),
        config.broker_port,
    );
    options.set_keep_alive(config.keep_alive());
    if let Some(username) = &config.username {
        options.set_credentials(
            username.clone(),
            config.password.clone().unwrap_or_default(),
        );
    }

    let capacity = config.channel_capacity.max(1);
    let (client, eventloop) = AsyncClient::new(options, capacity);
    let (tx, rx) = mpsc::channel(capacity);

    tracing::info!(
        host = %config.broker_host,
        port = config.broker_port,
        client_id = %config.client_id,
        "connecting to MQTT broker"
    );

    let task = EventLoopTask {
        eventloop,
        client: client.clone(),
        subscription: topic::subscription(prefix),
        inbound: tx,
        reconnect_delay: config.reconnect_delay(),
    };
    let handle = tokio::spawn(task.run());

    (MqttPublisher { client }, ReceiverStream::new(rx), handle)
}

struct EventLoopTask {
    eventloop: EventLoop,
    client: AsyncClient,
    subscription: String,
    inbound: mpsc::Sender<InboundMessage>,
    reconnect_delay: Duration,
}

impl EventLoopTask {
    async fn poll(&mut self) -> Result<Event, MqttError> {
        self.eventloop.poll().await.map_err(MqttError::Connection)
    }

    async fn run(mut self) {
        loop {
            match self.poll().await {
                Ok(Event::Incoming(Packet::ConnAck(_))) => {
                    tracing::info!(subscription = %self.subscription, "connected to MQTT broker");
                    // the request queue is drained by this loop: never await it here
                    if let Err(err) = self
                        .client
                        .try_subscribe(self.subscription.as_str(), QoS::AtLeastOnce)
                    {
                        tracing::warn!(%err, "failed to subscribe");
                    }
                }
                Ok(Event::Incoming(Packet::Publish(publish))) => {
                    let message = InboundMessage::new(publish.topic, publish.payload.to_vec());
                    tracing::trace!(topic = %message.topic, "message received");
                    if self.inbound.send(message).await.is_err() {
                        tracing::debug!("inbound stream dropped, stopping MQTT event loop");
                        break;
                    }
                }
                Ok(_) => {}
                Err(err) => {
                    let cause = std::error::Error::source(&err).map(ToString::to_string);
                    tracing::warn!(%err, ?cause, "MQTT connection lost, retrying");
                    tokio::time::sleep(self.reconnect_delay).await;
                }
            }
        }
    }
}

/// Outbound side of the broker connection.
#[derive(Clone)]
pub struct MqttPublisher {
    client: AsyncClient,
}

impl MqttPublisher {
    /// Ask the broker for a clean disconnect.
    ///
    /// # Errors
    ///
    /// Returns [`MqttError::Client`] when the event loop is already gone.
    pub async fn disconnect(&self) -> Result<(), MqttError> {
        self.client.disconnect().await?;
        Ok(())
    }
}

impl Publisher for MqttPublisher {
    fn publish(
        &self,
        message: OutboundMessage,
    ) -> impl Future<Output = Result<(), AmpioError>> + Send {
        async move {
            tracing::debug!(
                topic = %message.topic,
                payload = %message.payload_str(),
                "publishing"
            );
            self.client
                .publish(message.topic, QoS::AtLeastOnce, false, message.payload)
                .await
                .map_err(|err| MqttError::Client(err).into_domain())
        }
    }
}
