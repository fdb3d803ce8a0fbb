//! In-process event bus backed by a tokio broadcast channel.

use std::future::Future;

use tokio::sync::broadcast;

use ampio_domain::error::AmpioError;
use ampio_domain::event::BridgeEvent;

use crate::ports::EventPublisher;

/// In-process event bus using a tokio [`broadcast`] channel.
///
/// Publishing succeeds even when there are no active subscribers
/// (the event is simply dropped). Slow subscribers lag and lose the
/// oldest events rather than stalling the bridge.
pub struct InProcessEventBus {
    sender: broadcast::Sender<BridgeEvent>,
}

impl InProcessEventBus {
    /// Create a new event bus with the given channel capacity.
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self { sender }
    }

    /// Subscribe to events on this bus.
    ///
    /// Returns a receiver that will get all events published *after*
    /// the subscription is created.
    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<BridgeEvent> {
        self.sender.subscribe()
    }

    /// Number of live subscribers.
    #[must_use]
    pub fn receiver_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl EventPublisher for InProcessEventBus {
    fn publish(&self, event: BridgeEvent) -> impl Future<Output = Result<(), AmpioError>> + Send {
        // only fails with zero receivers
        let _ = self.sender.send(event);
        async { Ok(()) }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ampio_domain::device::Address;
    use ampio_domain::module::ModuleType;

    fn created(address: &str) -> BridgeEvent {
        BridgeEvent::DeviceCreated {
            address: Address::parse(address).unwrap(),
            module: ModuleType::RelayPack,
        }
    }

    #[tokio::test]
    async fn should_deliver_event_to_subscriber() {
        let bus = InProcessEventBus::new(16);
        let mut rx = bus.subscribe();

        bus.publish(created("1")).await.unwrap();

        let received = rx.recv().await.unwrap();
        assert_eq!(received, created("1"));
    }

    #[tokio::test]
    async fn should_deliver_event_to_multiple_subscribers() {
        let bus = InProcessEventBus::new(16);
        let mut rx1 = bus.subscribe();
        let mut rx2 = bus.subscribe();

        bus.publish(created("2")).await.unwrap();

        assert_eq!(rx1.recv().await.unwrap(), created("2"));
        assert_eq!(rx2.recv().await.unwrap(), created("2"));
    }

    #[tokio::test]
    async fn should_succeed_when_no_subscribers() {
        let bus = InProcessEventBus::new(16);
        assert!(bus.publish(created("3")).await.is_ok());
        assert_eq!(bus.receiver_count(), 0);
    }

    #[tokio::test]
    async fn should_not_deliver_events_published_before_subscription() {
        let bus = InProcessEventBus::new(16);
        bus.publish(created("4")).await.unwrap();

        let mut rx = bus.subscribe();
        bus.publish(created("5")).await.unwrap();

        assert_eq!(rx.recv().await.unwrap(), created("5"));
    }
}
