//! Device: one physical Ampio module and its channels.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::catalog::{ItemName, ModuleInfo};
use crate::error::{ParseError, RegistryError};
use crate::module::{ChannelSlot, Facet, ModuleType, ValueKind};
use crate::time::Timestamp;
use crate::value::ChannelValue;

/// Stable module address parsed from the topic, normalized to uppercase.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Address(String);

impl Address {
    /// Validate and normalize an address token.
    ///
    /// # Errors
    ///
    /// Returns [`ParseError::InvalidAddress`] when the token is empty or not
    /// ASCII alphanumeric.
    pub fn parse(raw: &str) -> Result<Self, ParseError> {
        if raw.is_empty() || !raw.bytes().all(|b| b.is_ascii_alphanumeric()) {
            return Err(ParseError::InvalidAddress(raw.to_string()));
        }
        Ok(Self(raw.to_ascii_uppercase()))
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl std::str::FromStr for Address {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

/// Registry-wide change counter. Zero means the channel was never applied.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct Revision(u64);

impl Revision {
    pub const ZERO: Self = Self(0);

    #[must_use]
    pub fn new(value: u64) -> Self {
        Self(value)
    }

    #[must_use]
    pub fn next(self) -> Self {
        Self(self.0 + 1)
    }

    #[must_use]
    pub fn get(self) -> u64 {
        self.0
    }
}

impl fmt::Display for Revision {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// One observable or controllable sub-unit of a module.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Channel {
    pub index: usize,
    pub facet: Facet,
    pub output: u8,
    pub kind: ValueKind,
    /// `None` until the module reports a value.
    pub value: Option<ChannelValue>,
    pub revision: Revision,
    pub updated_at: Option<Timestamp>,
    /// Name given to the item in the module description.
    pub name: Option<String>,
    pub device_class: Option<String>,
}

impl Channel {
    fn unknown(slot: ChannelSlot) -> Self {
        Self {
            index: slot.index,
            facet: slot.facet,
            output: slot.output,
            kind: slot.facet.kind(),
            value: None,
            revision: Revision::ZERO,
            updated_at: None,
            name: None,
            device_class: None,
        }
    }

    #[must_use]
    pub fn slot(&self) -> ChannelSlot {
        ChannelSlot {
            index: self.index,
            facet: self.facet,
            output: self.output,
        }
    }

    /// Store a new value, returning the previous one.
    ///
    /// # Errors
    ///
    /// Returns [`RegistryError::KindMismatch`] when `value` is not of the
    /// channel's fixed kind. The channel is left untouched.
    pub fn set(
        &mut self,
        value: ChannelValue,
        revision: Revision,
        now: Timestamp,
    ) -> Result<Option<ChannelValue>, RegistryError> {
        if value.kind() != self.kind {
            return Err(RegistryError::KindMismatch {
                channel: self.index,
                expected: self.kind,
                actual: value.kind(),
            });
        }
        self.revision = revision;
        self.updated_at = Some(now);
        Ok(self.value.replace(value))
    }
}

/// A discovered module with its full channel vector.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Device {
    pub address: Address,
    pub module: ModuleType,
    pub info: Option<ModuleInfo>,
    pub created_at: Timestamp,
    channels: Vec<Channel>,
}

impl Device {
    /// Create a device with every channel at the unknown sentinel.
    #[must_use]
    pub fn new(address: Address, module: ModuleType, now: Timestamp) -> Self {
        Self {
            address,
            module,
            info: None,
            created_at: now,
            channels: module.slots().map(Channel::unknown).collect(),
        }
    }

    #[must_use]
    pub fn channels(&self) -> &[Channel] {
        &self.channels
    }

    #[must_use]
    pub fn channel(&self, index: usize) -> Option<&Channel> {
        self.channels.get(index)
    }

    pub fn channel_mut(&mut self, index: usize) -> Option<&mut Channel> {
        self.channels.get_mut(index)
    }

    /// Current value of every channel, in index order.
    #[must_use]
    pub fn values(&self) -> Vec<Option<ChannelValue>> {
        self.channels
            .iter()
            .map(|channel| channel.value.clone())
            .collect()
    }

    /// Name the channels backed by the described items.
    ///
    /// Returns how many channels received a name. Items with no matching
    /// channel on this module are ignored.
    pub fn label(&mut self, items: &[ItemName]) -> usize {
        let mut labelled = 0;
        for item in items {
            let Ok(output) = u8::try_from(item.output) else {
                continue;
            };
            for facet in item.kind.facets() {
                let Some(slot) = self.module.slot_of(*facet, output) else {
                    continue;
                };
                if let Some(channel) = self.channels.get_mut(slot.index) {
                    channel.name = Some(item.name.clone());
                    channel.device_class.clone_from(&item.device_class);
                    labelled += 1;
                }
            }
        }
        labelled
    }

    /// Display name: the catalog name when known, the part number otherwise.
    #[must_use]
    pub fn name(&self) -> String {
        match &self.info {
            Some(info) if !info.name.is_empty() => info.name.clone(),
            _ => format!("{} {}", self.module.part_number(), self.address),
        }
    }

    #[must_use]
    pub fn view(&self) -> DeviceView {
        DeviceView {
            address: self.address.clone(),
            module: self.module,
            name: self.name(),
            info: self.info.clone(),
            channels: self.channels.clone(),
        }
    }
}

/// Read-only copy of a device handed to external collaborators.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DeviceView {
    pub address: Address,
    pub module: ModuleType,
    pub name: String,
    pub info: Option<ModuleInfo>,
    pub channels: Vec<Channel>,
}

impl DeviceView {
    #[must_use]
    pub fn value(&self, index: usize) -> Option<&ChannelValue> {
        self.channels.get(index).and_then(|c| c.value.as_ref())
    }
}
