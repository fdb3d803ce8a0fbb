//! Discovery engine: creates devices on first sight and evicts silent ones.

use std::collections::HashMap;

use chrono::TimeDelta;

use ampio_domain::catalog::{ItemName, ModuleInfo};
use ampio_domain::codec::{Decoded, unpack_flags};
use ampio_domain::device::{Address, Device};
use ampio_domain::error::RegistryError;
use ampio_domain::event::{DeviceEvent, DeviceRemoved, StateChange};
use ampio_domain::module::Facet;
use ampio_domain::time::Timestamp;
use ampio_domain::topic::Topic;
use ampio_domain::value::{ChannelValue, ColorParts};

use crate::registry::DeviceRegistry;

/// Outcome of [`DiscoveryEngine::observe`].
#[derive(Debug, Clone, PartialEq)]
pub struct Observation {
    pub event: DeviceEvent,
    /// Every complete value carried by the message, applied or not.
    pub observed: Vec<(usize, ChannelValue)>,
    /// The values that actually changed, in application order.
    pub changes: Vec<StateChange>,
}

/// Tracks liveness and pending partial updates of discovered devices.
pub struct DiscoveryEngine {
    silence_timeout: TimeDelta,
    last_seen: HashMap<Address, Timestamp>,
    partial_colors: HashMap<(Address, usize), ColorParts>,
    catalog: HashMap<Address, ModuleInfo>,
    descriptions: HashMap<Address, Vec<ItemName>>,
}

impl DiscoveryEngine {
    #[must_use]
    pub fn new(silence_timeout: TimeDelta) -> Self {
        Self {
            silence_timeout,
            last_seen: HashMap::new(),
            partial_colors: HashMap::new(),
            catalog: HashMap::new(),
            descriptions: HashMap::new(),
        }
    }

    #[must_use]
    pub fn last_seen(&self, address: &Address) -> Option<Timestamp> {
        self.last_seen.get(address).copied()
    }

    /// Upsert the device addressed by `topic` and apply the decoded delta.
    ///
    /// Values equal to what the registry already holds are not re-applied,
    /// so retained-message replays do not produce change notifications.
    ///
    /// # Errors
    ///
    /// Returns [`RegistryError::ModuleMismatch`] when the address is already
    /// known as another module type; nothing is touched in that case.
    pub fn observe(
        &mut self,
        registry: &mut DeviceRegistry,
        topic: &Topic,
        decoded: Decoded,
        now: Timestamp,
    ) -> Result<Observation, RegistryError> {
        let address = &topic.address;
        if let Some(known) = registry.get(address)
            && known.module != topic.module
        {
            return Err(RegistryError::ModuleMismatch {
                address: address.to_string(),
                known: known.module,
                claimed: topic.module,
            });
        }

        let created = !registry.contains(address);
        if created {
            let mut device = Device::new(address.clone(), topic.module, now);
            device.info = self.catalog.get(address).cloned();
            if let Some(items) = self.descriptions.get(address) {
                device.label(items);
            }
            registry.insert(device);
            tracing::info!(%address, module = %topic.module, "device discovered");
        }
        self.last_seen.insert(address.clone(), now);

        let observed = self.expand(topic, decoded);
        let mut changes = Vec::new();
        for (index, value) in &observed {
            let Some((facet, old)) = registry
                .get(address)
                .and_then(|device| device.channel(*index))
                .map(|channel| (channel.facet, channel.value.clone()))
            else {
                continue;
            };
            if old.as_ref() == Some(value) {
                continue;
            }
            let revision = registry.apply(address, *index, value.clone(), now)?;
            changes.push(StateChange {
                address: address.clone(),
                module: topic.module,
                channel: *index,
                facet,
                old,
                new: value.clone(),
                revision,
                at: now,
            });
        }

        let event = if created {
            DeviceEvent::Created
        } else if changes.is_empty() {
            DeviceEvent::Unchanged
        } else {
            DeviceEvent::Updated
        };
        Ok(Observation {
            event,
            observed,
            changes,
        })
    }

    /// Turn a decoded payload into per-channel values.
    fn expand(&mut self, topic: &Topic, decoded: Decoded) -> Vec<(usize, ChannelValue)> {
        match decoded {
            Decoded::Single(value) => match topic.slot() {
                Some(channel) => {
                    if topic.facet == Facet::Color {
                        self.partial_colors
                            .remove(&(topic.address.clone(), channel));
                    }
                    vec![(channel, value)]
                }
                None => Vec::new(),
            },
            Decoded::Bits { mask, width } => unpack_flags(mask, width)
                .filter_map(|(output, bit)| {
                    topic
                        .module
                        .slot_of(Facet::Flag, output)
                        .map(|slot| (slot.index, ChannelValue::Bool(bit)))
                })
                .collect(),
            Decoded::PartialColor(parts) => {
                let Some(channel) = topic.slot() else {
                    return Vec::new();
                };
                let key = (topic.address.clone(), channel);
                let merged = self
                    .partial_colors
                    .remove(&key)
                    .unwrap_or_default()
                    .merge(parts);
                match merged.complete() {
                    Some(rgbw) => vec![(channel, ChannelValue::Color(rgbw))],
                    None => {
                        tracing::debug!(
                            address = %topic.address,
                            channel,
                            "colour tuple incomplete, waiting"
                        );
                        self.partial_colors.insert(key, merged);
                        Vec::new()
                    }
                }
            }
        }
    }

    /// Evict every device silent for longer than the timeout.
    ///
    /// Each device is reported exactly once; a later message re-creates it
    /// with all channels back at unknown.
    pub fn sweep(&mut self, registry: &mut DeviceRegistry, now: Timestamp) -> Vec<DeviceRemoved> {
        let expired: Vec<(Address, Timestamp)> = self
            .last_seen
            .iter()
            .filter(|(_, seen)| now - **seen > self.silence_timeout)
            .map(|(address, seen)| (address.clone(), *seen))
            .collect();

        let mut removed = Vec::with_capacity(expired.len());
        for (address, last_seen) in expired {
            self.last_seen.remove(&address);
            self.partial_colors.retain(|(owner, _), _| *owner != address);
            if let Some(device) = registry.remove(&address) {
                tracing::info!(
                    %address,
                    module = %device.module,
                    %last_seen,
                    "device went silent, removed"
                );
                removed.push(DeviceRemoved {
                    address,
                    module: device.module,
                    last_seen,
                });
            }
        }
        removed
    }

    /// Record catalog entries and enrich already known devices.
    ///
    /// Catalog entries never create devices: only traffic does.
    pub fn learn(&mut self, registry: &mut DeviceRegistry, modules: Vec<ModuleInfo>) -> usize {
        let mut enriched = 0;
        for info in modules {
            if registry.set_info(info.clone()) {
                enriched += 1;
            }
            self.catalog.insert(info.address.clone(), info);
        }
        enriched
    }

    /// Record the item names of one module and label it if already known.
    ///
    /// Returns the number of labelled channels, `None` while the device has
    /// not been seen yet. The names are kept for later re-creations.
    pub fn describe(
        &mut self,
        registry: &mut DeviceRegistry,
        address: &Address,
        items: Vec<ItemName>,
    ) -> Option<usize> {
        let labelled = registry.label(address, &items);
        self.descriptions.insert(address.clone(), items);
        labelled
    }

    #[must_use]
    pub fn catalog_len(&self) -> usize {
        self.catalog.len()
    }
}
