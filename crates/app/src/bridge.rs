//! Bridge orchestrator: wires router, codecs, discovery, registry and
//! dispatcher to the transport.
//!
//! One task consumes the inbound stream together with a periodic tick that
//! drives both the silence sweep and the command timeout sweep. Messages are
//! processed one at a time, so a device's updates are applied in arrival
//! order. A second task drains the dispatcher every `flush_interval` and
//! awaits the publisher, so a burst of commands never stalls intake.
//!
//! The bridge state sits behind a single [`std::sync::Mutex`] held only for
//! synchronous sections; nothing awaits while holding it.

use std::future::Future;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use serde::Deserialize;
use tokio::sync::{broadcast, watch};
use tokio::time::MissedTickBehavior;
use tokio_stream::{Stream, StreamExt as _};

use ampio_domain::catalog;
use ampio_domain::codec;
use ampio_domain::device::{Address, DeviceView};
use ampio_domain::error::{AmpioError, CommandError};
use ampio_domain::event::{BridgeEvent, DeviceEvent, StateChange};
use ampio_domain::time::{self, Timestamp};
use ampio_domain::topic::{
    self, CATALOG_REQUEST_PAYLOAD, DESCRIPTION_REQUEST_PAYLOAD, Route, VERSION_REQUEST_PAYLOAD,
};
use ampio_domain::value::{ChannelValue, Tolerances};

use crate::discovery::DiscoveryEngine;
use crate::dispatcher::{CommandDispatcher, CommandHandle, Drained};
use crate::event_bus::InProcessEventBus;
use crate::ports::{EventPublisher, InboundMessage, OutboundMessage, Publisher};
use crate::registry::DeviceRegistry;

/// Bridge behaviour settings.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct BridgeConfig {
    /// Topic prefix shared by every Ampio topic.
    pub prefix: String,
    /// Devices silent for longer than this are removed, in seconds.
    pub silence_timeout_secs: u64,
    /// Commands not corroborated within this delay time out, in seconds.
    /// Long enough for a roller to travel end to end.
    pub command_timeout_secs: u64,
    /// Period of the silence and timeout sweeps, in seconds.
    pub sweep_interval_secs: u64,
    /// Period of the outbound flush, in milliseconds. Also the debounce window.
    pub flush_interval_ms: u64,
    /// Capacity of the event bus.
    pub event_capacity: usize,
    /// Ask the gateway for its version and module list on startup, then for
    /// the item names of every listed module.
    pub request_catalog: bool,
    /// Acknowledgement tolerances.
    pub tolerances: Tolerances,
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            prefix: "ampio".to_string(),
            silence_timeout_secs: 300,
            command_timeout_secs: 60,
            sweep_interval_secs: 5,
            flush_interval_ms: 100,
            event_capacity: 256,
            request_catalog: true,
            tolerances: Tolerances::default(),
        }
    }
}

impl BridgeConfig {
    #[must_use]
    pub fn silence_timeout(&self) -> Duration {
        Duration::from_secs(self.silence_timeout_secs)
    }

    #[must_use]
    pub fn command_timeout(&self) -> Duration {
        Duration::from_secs(self.command_timeout_secs)
    }

    #[must_use]
    pub fn sweep_interval(&self) -> Duration {
        Duration::from_secs(self.sweep_interval_secs.max(1))
    }

    #[must_use]
    pub fn flush_interval(&self) -> Duration {
        Duration::from_millis(self.flush_interval_ms.max(1))
    }
}

struct State {
    registry: DeviceRegistry,
    discovery: DiscoveryEngine,
    dispatcher: CommandDispatcher,
    /// Gateway requests waiting for the next flush.
    outbox: Vec<OutboundMessage>,
    gateway_version: Option<String>,
}

/// State shared between the bridge tasks and host handles.
struct Shared {
    config: BridgeConfig,
    state: Mutex<State>,
    events: InProcessEventBus,
}

impl Shared {
    fn lock(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    async fn emit(&self, events: Vec<BridgeEvent>) {
        for event in events {
            // the in-process bus never fails
            let _ = self.events.publish(event).await;
        }
    }

    /// Route, decode and apply one message.
    fn process(
        &self,
        message: &InboundMessage,
        now: Timestamp,
    ) -> Result<Vec<BridgeEvent>, AmpioError> {
        let topic = match topic::route(&self.config.prefix, &message.topic)? {
            Route::Outbound => return Ok(Vec::new()),
            Route::Catalog => {
                let modules = catalog::parse(&message.payload)?;
                let count = modules.len();
                let mut guard = self.lock();
                let state = &mut *guard;
                if self.config.request_catalog {
                    let prefix = &self.config.prefix;
                    state.outbox.extend(modules.iter().map(|info| {
                        OutboundMessage::new(
                            topic::description_request_topic(prefix, &info.address),
                            DESCRIPTION_REQUEST_PAYLOAD,
                        )
                    }));
                }
                let enriched = state.discovery.learn(&mut state.registry, modules);
                tracing::info!(count, enriched, "module list received");
                return Ok(Vec::new());
            }
            Route::Description(address) => {
                let items = catalog::parse_descriptions(&message.payload)?;
                let count = items.len();
                let mut guard = self.lock();
                let state = &mut *guard;
                let labelled = state
                    .discovery
                    .describe(&mut state.registry, &address, items);
                tracing::info!(%address, count, ?labelled, "module item names received");
                return Ok(labelled
                    .map(|labelled| BridgeEvent::DeviceDescribed { address, labelled })
                    .into_iter()
                    .collect());
            }
            Route::Version => {
                let version = catalog::parse_version(&message.payload)?;
                let shown = version.as_deref().unwrap_or("unknown");
                tracing::info!(version = shown, "gateway version received");
                self.lock().gateway_version = version;
                return Ok(Vec::new());
            }
            Route::State(topic) => topic,
        };
        let decoded = codec::decode(topic.module, topic.facet, topic.channel, &message.payload)?;

        let mut guard = self.lock();
        let state = &mut *guard;
        let observation = state
            .discovery
            .observe(&mut state.registry, &topic, decoded, now)?;

        let mut events = Vec::with_capacity(observation.changes.len() + 1);
        if observation.event == DeviceEvent::Created {
            events.push(BridgeEvent::DeviceCreated {
                address: topic.address.clone(),
                module: topic.module,
            });
        }
        events.extend(observation.changes.into_iter().map(BridgeEvent::StateChanged));
        for (channel, value) in &observation.observed {
            if let Some(settled) = state
                .dispatcher
                .acknowledge(&topic.address, *channel, value)
            {
                tracing::debug!(
                    id = %settled.id,
                    address = %settled.address,
                    channel,
                    "command acknowledged"
                );
                events.push(BridgeEvent::CommandSettled(settled));
            }
        }
        Ok(events)
    }

    fn sweep(&self, now: Timestamp) -> Vec<BridgeEvent> {
        let mut guard = self.lock();
        let state = &mut *guard;
        let removed = state.discovery.sweep(&mut state.registry, now);
        let timed_out = state.dispatcher.timeout_sweep(now);
        removed
            .into_iter()
            .map(BridgeEvent::DeviceRemoved)
            .chain(timed_out.into_iter().map(BridgeEvent::CommandSettled))
            .collect()
    }

    /// Pending gateway requests first, then the encoded commands.
    fn drain(&self) -> Drained {
        let mut guard = self.lock();
        let state = &mut *guard;
        let mut drained = state.dispatcher.drain(&state.registry, &self.config.prefix);
        if !state.outbox.is_empty() {
            let mut messages = std::mem::take(&mut state.outbox);
            messages.append(&mut drained.messages);
            drained.messages = messages;
        }
        drained
    }

    fn submit(
        &self,
        address: &Address,
        channel: usize,
        target: ChannelValue,
        now: Timestamp,
    ) -> Result<(CommandHandle, Option<BridgeEvent>), AmpioError> {
        let mut guard = self.lock();
        let state = &mut *guard;
        let device = state
            .registry
            .get(address)
            .ok_or_else(|| CommandError::UnknownDevice(address.to_string()))?;
        let submission = state.dispatcher.submit(device, channel, target, now)?;
        Ok((
            submission.handle,
            submission.superseded.map(BridgeEvent::CommandSettled),
        ))
    }
}

/// The running bridge, generic over the outbound transport.
pub struct Bridge<P> {
    shared: Arc<Shared>,
    publisher: Arc<P>,
}

impl<P> Clone for Bridge<P> {
    fn clone(&self) -> Self {
        Self {
            shared: Arc::clone(&self.shared),
            publisher: Arc::clone(&self.publisher),
        }
    }
}

impl<P: Publisher + 'static> Bridge<P> {
    /// Create a bridge publishing through `publisher`.
    pub fn new(config: BridgeConfig, publisher: P) -> Self {
        let state = State {
            registry: DeviceRegistry::new(),
            discovery: DiscoveryEngine::new(time::delta(config.silence_timeout())),
            dispatcher: CommandDispatcher::new(
                time::delta(config.command_timeout()),
                config.tolerances,
            ),
            outbox: Vec::new(),
            gateway_version: None,
        };
        let events = InProcessEventBus::new(config.event_capacity);
        Self {
            shared: Arc::new(Shared {
                config,
                state: Mutex::new(state),
                events,
            }),
            publisher: Arc::new(publisher),
        }
    }

    #[must_use]
    pub fn config(&self) -> &BridgeConfig {
        &self.shared.config
    }

    /// Host-facing handle sharing this bridge's state.
    #[must_use]
    pub fn handle(&self) -> BridgeHandle {
        BridgeHandle {
            shared: Arc::clone(&self.shared),
        }
    }

    /// Process one inbound message.
    ///
    /// # Errors
    ///
    /// Returns the parse, decode, catalog or registry error that caused the
    /// message to be dropped. The registry is left untouched in that case.
    #[tracing::instrument(skip_all, fields(topic = %message.topic))]
    pub async fn handle_message(&self, message: InboundMessage) -> Result<(), AmpioError> {
        let events = self.shared.process(&message, time::now())?;
        self.shared.emit(events).await;
        Ok(())
    }

    /// Run the periodic sweeps: silent devices and expired commands.
    pub async fn tick(&self, now: Timestamp) {
        let events = self.shared.sweep(now);
        self.shared.emit(events).await;
    }

    /// Encode queued commands and hand them, with any pending gateway
    /// requests, to the publisher.
    ///
    /// Returns how many messages were published. Publish failures are logged;
    /// the affected command stays sent and eventually times out.
    pub async fn flush(&self) -> usize {
        let Drained { messages, settled } = self.shared.drain();
        let mut published = 0;
        for message in messages {
            let topic = message.topic.clone();
            match self.publisher.publish(message).await {
                Ok(()) => published += 1,
                Err(err) => tracing::warn!(%err, %topic, "failed to publish"),
            }
        }
        self.shared
            .emit(settled.into_iter().map(BridgeEvent::CommandSettled).collect())
            .await;
        published
    }

    /// Ask the gateway to publish its version.
    ///
    /// # Errors
    ///
    /// Returns the publisher's error.
    pub async fn request_version(&self) -> Result<(), AmpioError> {
        let prefix = &self.shared.config.prefix;
        self.publisher
            .publish(OutboundMessage::new(
                topic::version_request_topic(prefix),
                VERSION_REQUEST_PAYLOAD,
            ))
            .await
    }

    /// Ask the gateway to publish its module list.
    ///
    /// # Errors
    ///
    /// Returns the publisher's error.
    pub async fn request_catalog(&self) -> Result<(), AmpioError> {
        let prefix = &self.shared.config.prefix;
        self.publisher
            .publish(OutboundMessage::new(
                topic::catalog_request_topic(prefix),
                CATALOG_REQUEST_PAYLOAD,
            ))
            .await
    }

    /// Consume `inbound` until it ends or `shutdown` resolves.
    ///
    /// The module list request and the periodic flush run on their own task,
    /// so a slow publisher never delays inbound processing. Queued commands
    /// are flushed one last time before returning.
    pub async fn run<S>(self, inbound: S, shutdown: impl Future<Output = ()> + Send)
    where
        S: Stream<Item = InboundMessage> + Send + Unpin,
    {
        let (stop, stopped) = watch::channel(false);
        let flusher = tokio::spawn(self.clone().flush_loop(stopped));

        let mut sweep = tokio::time::interval(self.shared.config.sweep_interval());
        sweep.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let mut inbound = inbound;
        tokio::pin!(shutdown);

        loop {
            tokio::select! {
                () = &mut shutdown => {
                    tracing::info!("shutdown requested");
                    break;
                }
                message = inbound.next() => {
                    let Some(message) = message else {
                        tracing::info!("inbound stream closed");
                        break;
                    };
                    if let Err(err) = self.handle_message(message).await {
                        tracing::warn!(%err, "inbound message dropped");
                    }
                }
                _ = sweep.tick() => self.tick(time::now()).await,
            }
        }

        let _ = stop.send(true);
        if let Err(err) = flusher.await {
            tracing::warn!(%err, "flush task ended abnormally");
        }
        self.flush().await;
    }

    /// Outbound side of [`Bridge::run`]. Publishing never blocks intake.
    async fn flush_loop(self, mut stopped: watch::Receiver<bool>) {
        if self.shared.config.request_catalog {
            if let Err(err) = self.request_version().await {
                tracing::warn!(%err, "failed to request gateway version");
            }
            if let Err(err) = self.request_catalog().await {
                tracing::warn!(%err, "failed to request module list");
            }
        }

        let mut interval = tokio::time::interval(self.shared.config.flush_interval());
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
        loop {
            tokio::select! {
                _ = interval.tick() => {
                    self.flush().await;
                }
                changed = stopped.changed() => {
                    if changed.is_err() || *stopped.borrow() {
                        break;
                    }
                }
            }
        }
    }
}

/// Narrow interface offered to the host integration.
#[derive(Clone)]
pub struct BridgeHandle {
    shared: Arc<Shared>,
}

impl BridgeHandle {
    /// Read-only copies of every known device.
    #[must_use]
    pub fn list_devices(&self) -> Vec<DeviceView> {
        self.shared.lock().registry.list()
    }

    #[must_use]
    pub fn device(&self, address: &Address) -> Option<DeviceView> {
        self.shared.lock().registry.snapshot(address)
    }

    /// Register a callback invoked synchronously after every applied change.
    ///
    /// The callback runs while the bridge state is locked and must not call
    /// back into this handle.
    pub fn on_state_changed(&self, callback: impl Fn(&StateChange) + Send + Sync + 'static) {
        self.shared.lock().registry.subscribe(callback);
    }

    /// Version reported by the gateway, once received.
    #[must_use]
    pub fn gateway_version(&self) -> Option<String> {
        self.shared.lock().gateway_version.clone()
    }

    /// Subscribe to every bridge event published from now on.
    #[must_use]
    pub fn events(&self) -> broadcast::Receiver<BridgeEvent> {
        self.shared.events.subscribe()
    }

    /// Queue a target value for one channel.
    ///
    /// The command is encoded on the next flush; a newer submission for the
    /// same channel before then replaces it.
    ///
    /// # Errors
    ///
    /// Returns [`AmpioError::Command`] when the device or channel is unknown
    /// or the target is invalid for the channel.
    pub async fn submit_command(
        &self,
        address: &Address,
        channel: usize,
        target: ChannelValue,
    ) -> Result<CommandHandle, AmpioError> {
        let (handle, superseded) = self.shared.submit(address, channel, target, time::now())?;
        if let Some(event) = superseded {
            self.shared.emit(vec![event]).await;
        }
        Ok(handle)
    }
}
