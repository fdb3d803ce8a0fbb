//! Device registry: the single owner of discovered devices and channel state.
//!
//! All mutation goes through [`DeviceRegistry::apply`]. Subscribers are
//! invoked synchronously once the mutation is complete, so they always see
//! the post-apply state. Revisions come from one registry-wide counter: they
//! strictly increase per channel and are never reused, even when a device is
//! evicted and later re-created.

use std::collections::HashMap;

use ampio_domain::catalog::{ItemName, ModuleInfo};
use ampio_domain::device::{Address, Device, DeviceView, Revision};
use ampio_domain::error::RegistryError;
use ampio_domain::event::StateChange;
use ampio_domain::time::Timestamp;
use ampio_domain::value::ChannelValue;

/// Callback invoked after every applied change.
///
/// Runs while the bridge state is locked: it must not call back into the bridge.
pub type StateCallback = Box<dyn Fn(&StateChange) + Send + Sync>;

/// In-memory store of every known device.
#[derive(Default)]
pub struct DeviceRegistry {
    devices: HashMap<Address, Device>,
    revision: Revision,
    subscribers: Vec<StateCallback>,
}

impl DeviceRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn contains(&self, address: &Address) -> bool {
        self.devices.contains_key(address)
    }

    #[must_use]
    pub fn get(&self, address: &Address) -> Option<&Device> {
        self.devices.get(address)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.devices.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.devices.is_empty()
    }

    /// Register a freshly discovered device, replacing any previous entry.
    pub fn insert(&mut self, device: Device) {
        self.devices.insert(device.address.clone(), device);
    }

    pub fn remove(&mut self, address: &Address) -> Option<Device> {
        self.devices.remove(address)
    }

    /// Attach catalog information to a known device.
    pub fn set_info(&mut self, info: ModuleInfo) -> bool {
        match self.devices.get_mut(&info.address) {
            Some(device) => {
                device.info = Some(info);
                true
            }
            None => false,
        }
    }

    /// Name the channels of a known device from its item descriptions.
    ///
    /// Returns the number of labelled channels, `None` for an unknown device.
    pub fn label(&mut self, address: &Address, items: &[ItemName]) -> Option<usize> {
        self.devices
            .get_mut(address)
            .map(|device| device.label(items))
    }

    /// Apply a value to one channel and notify subscribers.
    ///
    /// # Errors
    ///
    /// - [`RegistryError::UnknownDevice`] when `address` is not registered.
    /// - [`RegistryError::UnknownChannel`] when `channel` is out of bounds.
    /// - [`RegistryError::KindMismatch`] when `value` does not match the
    ///   channel's kind. No revision is consumed in that case.
    pub fn apply(
        &mut self,
        address: &Address,
        channel: usize,
        value: ChannelValue,
        now: Timestamp,
    ) -> Result<Revision, RegistryError> {
        let device = self
            .devices
            .get_mut(address)
            .ok_or_else(|| RegistryError::UnknownDevice(address.to_string()))?;
        let module = device.module;
        let slot = device
            .channel_mut(channel)
            .ok_or_else(|| RegistryError::UnknownChannel {
                address: address.to_string(),
                channel,
            })?;

        let revision = self.revision.next();
        let old = slot.set(value.clone(), revision, now)?;
        self.revision = revision;

        let change = StateChange {
            address: address.clone(),
            module,
            channel,
            facet: slot.facet,
            old,
            new: value,
            revision,
            at: now,
        };
        for subscriber in &self.subscribers {
            subscriber(&change);
        }
        Ok(revision)
    }

    /// Read-only copy of one device.
    #[must_use]
    pub fn snapshot(&self, address: &Address) -> Option<DeviceView> {
        self.devices.get(address).map(Device::view)
    }

    /// Read-only copies of every device, ordered by address.
    #[must_use]
    pub fn list(&self) -> Vec<DeviceView> {
        let mut views: Vec<_> = self.devices.values().map(Device::view).collect();
        views.sort_by(|a, b| a.address.cmp(&b.address));
        views
    }

    /// Full current channel vector of one device.
    #[must_use]
    pub fn values(&self, address: &Address) -> Option<Vec<Option<ChannelValue>>> {
        self.devices.get(address).map(Device::values)
    }

    pub fn subscribe(&mut self, callback: impl Fn(&StateChange) + Send + Sync + 'static) {
        self.subscribers.push(Box::new(callback));
    }

    /// Last revision handed out.
    #[must_use]
    pub fn revision(&self) -> Revision {
        self.revision
    }
}

#[cfg(test)]
mod tests {
    use std::sync::{Arc, Mutex};

    use super::*;
    use ampio_domain::module::ModuleType;
    use ampio_domain::time::now;

    fn address(raw: &str) -> Address {
        Address::parse(raw).unwrap()
    }

    fn registry_with(module: ModuleType, raw: &str) -> DeviceRegistry {
        let mut registry = DeviceRegistry::new();
        registry.insert(Device::new(address(raw), module, now()));
        registry
    }

    #[test]
    fn should_bump_revision_on_every_apply() {
        let mut registry = registry_with(ModuleType::MultiDimmer, "5");
        let addr = address("5");
        let mut previous = Revision::ZERO;
        for level in [10, 10, 20, 30] {
            let revision = registry
                .apply(&addr, 8, ChannelValue::Level(level), now())
                .unwrap();
            assert!(revision > previous);
            previous = revision;
        }
    }

    #[test]
    fn should_never_reuse_revisions_after_recreation() {
        let mut registry = registry_with(ModuleType::RelayPack, "5");
        let addr = address("5");
        let first = registry
            .apply(&addr, 0, ChannelValue::Bool(true), now())
            .unwrap();

        registry.remove(&addr);
        registry.insert(Device::new(addr.clone(), ModuleType::RelayPack, now()));
        let second = registry
            .apply(&addr, 0, ChannelValue::Bool(true), now())
            .unwrap();
        assert!(second > first);
    }

    #[test]
    fn should_notify_subscribers_after_mutation() {
        let mut registry = registry_with(ModuleType::RelayPack, "5");
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        registry.subscribe(move |change| {
            sink.lock().unwrap().push(change.clone());
        });

        let addr = address("5");
        registry
            .apply(&addr, 1, ChannelValue::Bool(true), now())
            .unwrap();
        registry
            .apply(&addr, 1, ChannelValue::Bool(false), now())
            .unwrap();

        let seen = seen.lock().unwrap();
        assert_eq!(seen.len(), 2);
        assert_eq!(seen[0].old, None);
        assert_eq!(seen[1].old, Some(ChannelValue::Bool(true)));
        assert_eq!(seen[1].new, ChannelValue::Bool(false));
        assert!(seen[1].revision > seen[0].revision);
    }

    #[test]
    fn should_reject_kind_mismatch_without_consuming_revision() {
        let mut registry = registry_with(ModuleType::RelayPack, "5");
        let before = registry.revision();
        let err = registry
            .apply(&address("5"), 0, ChannelValue::Percentage(3), now())
            .unwrap_err();
        assert!(matches!(err, RegistryError::KindMismatch { .. }));
        assert_eq!(registry.revision(), before);
    }

    #[test]
    fn should_reject_unknown_device_and_channel() {
        let mut registry = registry_with(ModuleType::Contactor, "5");
        assert!(matches!(
            registry.apply(&address("6"), 0, ChannelValue::Bool(true), now()),
            Err(RegistryError::UnknownDevice(_))
        ));
        assert!(matches!(
            registry.apply(&address("5"), 6, ChannelValue::Bool(true), now()),
            Err(RegistryError::UnknownChannel { channel: 6, .. })
        ));
    }

    #[test]
    fn should_hand_out_independent_snapshots() {
        let mut registry = registry_with(ModuleType::RelayPack, "5");
        let addr = address("5");
        let before = registry.snapshot(&addr).unwrap();
        registry
            .apply(&addr, 0, ChannelValue::Bool(true), now())
            .unwrap();
        assert_eq!(before.value(0), None);
        assert_eq!(
            registry.snapshot(&addr).unwrap().value(0),
            Some(&ChannelValue::Bool(true))
        );
    }

    #[test]
    fn should_list_devices_by_address() {
        let mut registry = registry_with(ModuleType::RelayPack, "B");
        registry.insert(Device::new(address("A"), ModuleType::Sensor, now()));
        let addresses: Vec<_> = registry
            .list()
            .into_iter()
            .map(|view| view.address.to_string())
            .collect();
        assert_eq!(addresses, vec!["A", "B"]);
    }
}
