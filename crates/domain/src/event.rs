//! Events emitted by the bridge towards the host integration.

use serde::Serialize;

use crate::command::CommandOutcome;
use crate::device::{Address, Revision};
use crate::id::CommandId;
use crate::module::{Facet, ModuleType};
use crate::time::Timestamp;
use crate::value::ChannelValue;

/// Immutable delta delivered after every applied channel change.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StateChange {
    pub address: Address,
    pub module: ModuleType,
    pub channel: usize,
    pub facet: Facet,
    pub old: Option<ChannelValue>,
    pub new: ChannelValue,
    pub revision: Revision,
    pub at: Timestamp,
}

/// What an inbound message did to the device it addressed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DeviceEvent {
    Created,
    Updated,
    Unchanged,
}

/// A device evicted after staying silent longer than the configured timeout.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DeviceRemoved {
    pub address: Address,
    pub module: ModuleType,
    pub last_seen: Timestamp,
}

/// A command that reached a terminal state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CommandSettled {
    pub id: CommandId,
    pub address: Address,
    pub channel: usize,
    pub outcome: CommandOutcome,
}

/// Everything observable on the bridge's event bus.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum BridgeEvent {
    DeviceCreated {
        address: Address,
        module: ModuleType,
    },
    StateChanged(StateChange),
    /// Item names arrived for a known device; `labelled` channels got a name.
    DeviceDescribed {
        address: Address,
        labelled: usize,
    },
    DeviceRemoved(DeviceRemoved),
    CommandSettled(CommandSettled),
}

impl BridgeEvent {
    /// Address of the device the event concerns.
    #[must_use]
    pub fn address(&self) -> &Address {
        match self {
            Self::DeviceCreated { address, .. } => address,
            Self::StateChanged(change) => &change.address,
            Self::DeviceDescribed { address, .. } => address,
            Self::DeviceRemoved(removed) => &removed.address,
            Self::CommandSettled(settled) => &settled.address,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn should_serialize_with_type_tag() {
        let event = BridgeEvent::DeviceCreated {
            address: Address::parse("1f").unwrap(),
            module: ModuleType::RelayPack,
        };
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(
            json,
            serde_json::json!({"type": "device_created", "address": "1F", "module": "relay_pack"})
        );
    }

    #[test]
    fn should_expose_address_of_any_event() {
        let address = Address::parse("7").unwrap();
        let event = BridgeEvent::CommandSettled(CommandSettled {
            id: CommandId::new(),
            address: address.clone(),
            channel: 0,
            outcome: CommandOutcome::Acked,
        });
        assert_eq!(event.address(), &address);
    }
}
