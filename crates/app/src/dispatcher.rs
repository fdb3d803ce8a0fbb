//! Command dispatcher: debounces intents and tracks their acknowledgement.
//!
//! At most one command is outstanding per `(address, channel)`. Submitting
//! again before the first one is acknowledged supersedes it. Encoding is
//! deferred to [`CommandDispatcher::drain`], so any number of submissions
//! between two drains results in a single outbound payload carrying the
//! latest target.

use std::collections::HashMap;

use chrono::TimeDelta;
use tokio::sync::oneshot;

use ampio_domain::codec::{self, CommandTarget};
use ampio_domain::command::{CommandEvent, CommandOutcome, PendingCommand};
use ampio_domain::device::{Address, Device};
use ampio_domain::error::CommandError;
use ampio_domain::event::CommandSettled;
use ampio_domain::id::CommandId;
use ampio_domain::time::Timestamp;
use ampio_domain::topic;
use ampio_domain::value::{ChannelValue, Tolerances};

use crate::ports::OutboundMessage;
use crate::registry::DeviceRegistry;

type Key = (Address, usize);

struct Entry {
    command: PendingCommand,
    notify: Option<oneshot::Sender<CommandOutcome>>,
}

impl Entry {
    /// Drive the state machine, reporting the outcome once terminal.
    fn apply(&mut self, event: CommandEvent) -> Option<CommandSettled> {
        let outcome = self.command.apply(event)?;
        if let Some(notify) = self.notify.take() {
            // the submitter may have dropped its handle
            let _ = notify.send(outcome);
        }
        Some(CommandSettled {
            id: self.command.id,
            address: self.command.address.clone(),
            channel: self.command.slot.index,
            outcome,
        })
    }
}

/// Returned by [`CommandDispatcher::submit`].
#[derive(Debug)]
pub struct Submission {
    pub handle: CommandHandle,
    /// The command this submission replaced, if any.
    pub superseded: Option<CommandSettled>,
}

/// Returned by [`CommandDispatcher::drain`].
#[derive(Debug, Default)]
pub struct Drained {
    pub messages: Vec<OutboundMessage>,
    /// Commands acknowledged on send because the channel already matched.
    pub settled: Vec<CommandSettled>,
}

/// Caller-side view of a submitted command.
#[derive(Debug)]
pub struct CommandHandle {
    pub id: CommandId,
    pub address: Address,
    pub channel: usize,
    outcome: oneshot::Receiver<CommandOutcome>,
}

impl CommandHandle {
    /// Wait for the command to settle.
    ///
    /// A superseded command is not a failure: a newer target replaced it.
    ///
    /// # Errors
    ///
    /// Returns the retriable [`CommandError::Timeout`] when no corroborating
    /// state was observed in time, or when the bridge shut down first.
    pub async fn outcome(self) -> Result<CommandOutcome, CommandError> {
        match self.outcome.await {
            Ok(CommandOutcome::TimedOut) | Err(_) => Err(CommandError::Timeout {
                address: self.address.to_string(),
                channel: self.channel,
            }),
            Ok(outcome) => Ok(outcome),
        }
    }
}

/// Per-channel command state machines.
pub struct CommandDispatcher {
    timeout: TimeDelta,
    tolerances: Tolerances,
    pending: HashMap<Key, Entry>,
}

impl CommandDispatcher {
    #[must_use]
    pub fn new(timeout: TimeDelta, tolerances: Tolerances) -> Self {
        Self {
            timeout,
            tolerances,
            pending: HashMap::new(),
        }
    }

    /// Validate and queue a target for one channel of `device`.
    ///
    /// # Errors
    ///
    /// - [`CommandError::UnknownChannel`] when `channel` is out of bounds.
    /// - [`CommandError::Rejected`] when the target is invalid for the channel.
    pub fn submit(
        &mut self,
        device: &Device,
        channel: usize,
        target: ChannelValue,
        now: Timestamp,
    ) -> Result<Submission, CommandError> {
        let slot = device
            .module
            .slot(channel)
            .ok_or_else(|| CommandError::UnknownChannel {
                address: device.address.to_string(),
                channel,
            })?;
        let target = codec::normalize(device.module, slot.facet, target)?;

        let key = (device.address.clone(), channel);
        let superseded = self
            .pending
            .remove(&key)
            .and_then(|mut prior| prior.apply(CommandEvent::Superseded));
        if let Some(prior) = &superseded {
            tracing::debug!(
                id = %prior.id,
                address = %device.address,
                channel,
                "command superseded"
            );
        }

        let command = PendingCommand::new(device.address.clone(), device.module, slot, target, now);
        let (notify, outcome) = oneshot::channel();
        let handle = CommandHandle {
            id: command.id,
            address: device.address.clone(),
            channel,
            outcome,
        };
        self.pending.insert(
            key,
            Entry {
                command,
                notify: Some(notify),
            },
        );
        Ok(Submission { handle, superseded })
    }

    /// Match an observed value against the outstanding command, if any.
    pub fn acknowledge(
        &mut self,
        address: &Address,
        channel: usize,
        observed: &ChannelValue,
    ) -> Option<CommandSettled> {
        let key = (address.clone(), channel);
        let entry = self.pending.get_mut(&key)?;
        if !observed.approximates(&entry.command.target, &self.tolerances) {
            return None;
        }
        let settled = entry.apply(CommandEvent::Observed)?;
        self.pending.remove(&key);
        Some(settled)
    }

    /// Time out every command older than the deadline. Nothing is retried.
    pub fn timeout_sweep(&mut self, now: Timestamp) -> Vec<CommandSettled> {
        let timeout = self.timeout;
        let mut settled = Vec::new();
        self.pending.retain(|_, entry| {
            if !entry.command.is_expired(now, timeout) {
                return true;
            }
            if let Some(done) = entry.apply(CommandEvent::Expired) {
                tracing::warn!(
                    id = %done.id,
                    address = %done.address,
                    channel = done.channel,
                    "command timed out"
                );
                settled.push(done);
            }
            false
        });
        settled
    }

    /// Encode every command not yet sent.
    ///
    /// Bit-packed encodes read the device's channel vector overlaid with the
    /// targets of commands already sent but not yet acknowledged, then with
    /// the targets encoded earlier in this drain, so flag commands for the
    /// same panel never revert each other. Commands for devices no longer in
    /// the registry stay queued until they time out. A command whose device
    /// came back as another module is settled as timed out.
    pub fn drain(&mut self, registry: &DeviceRegistry, prefix: &str) -> Drained {
        let mut keys: Vec<Key> = self
            .pending
            .iter()
            .filter(|(_, entry)| !entry.command.is_sent())
            .map(|(key, _)| key.clone())
            .collect();
        keys.sort();

        let mut overlays: HashMap<Address, Vec<Option<ChannelValue>>> = HashMap::new();
        let mut drained = Drained::default();
        for key in keys {
            let Some(device) = registry.get(&key.0) else {
                continue;
            };
            let Some(entry) = self.pending.get_mut(&key) else {
                continue;
            };
            if entry.command.module != device.module {
                tracing::warn!(
                    id = %entry.command.id,
                    address = %device.address,
                    expected = %entry.command.module,
                    actual = %device.module,
                    "device changed module, dropping command"
                );
                if let Some(settled) = entry.apply(CommandEvent::Expired) {
                    drained.settled.push(settled);
                }
                self.pending.remove(&key);
                continue;
            }

            let current = overlays
                .entry(key.0.clone())
                .or_insert_with(|| in_flight_values(&self.pending, device));
            let Some(entry) = self.pending.get_mut(&key) else {
                continue;
            };
            let command = &entry.command;

            let encoded =
                match codec::encode(device.module, command.slot, &command.target, current) {
                    Ok(encoded) => encoded,
                    Err(err) => {
                        tracing::error!(
                            %err,
                            id = %command.id,
                            "failed to encode validated command, dropping"
                        );
                        self.pending.remove(&key);
                        continue;
                    }
                };
            let Some(slot_value) = current.get_mut(command.slot.index) else {
                self.pending.remove(&key);
                continue;
            };
            let already_there = slot_value
                .as_ref()
                .is_some_and(|value| value.approximates(&command.target, &self.tolerances));
            *slot_value = Some(command.target.clone());

            let topic = match encoded.target {
                CommandTarget::Channel { channel, facet } => {
                    topic::command_topic(prefix, device.module, &device.address, channel, facet)
                }
                CommandTarget::Raw => topic::raw_topic(prefix, device.module, &device.address),
            };
            tracing::debug!(
                id = %command.id,
                %topic,
                payload = %encoded.payload,
                "command encoded"
            );
            drained
                .messages
                .push(OutboundMessage::new(topic, encoded.payload));

            entry.apply(CommandEvent::Sent);
            if already_there && let Some(settled) = entry.apply(CommandEvent::Observed) {
                self.pending.remove(&key);
                drained.settled.push(settled);
            }
        }
        drained
    }

    #[must_use]
    pub fn pending(&self, address: &Address, channel: usize) -> Option<&PendingCommand> {
        self.pending
            .get(&(address.clone(), channel))
            .map(|entry| &entry.command)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.pending.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }
}

/// The device's channel vector with the targets of sent, unacknowledged
/// commands laid over it.
fn in_flight_values(pending: &HashMap<Key, Entry>, device: &Device) -> Vec<Option<ChannelValue>> {
    let mut values = device.values();
    let in_flight = pending.values().map(|entry| &entry.command).filter(|command| {
        command.is_sent() && command.address == device.address && command.module == device.module
    });
    for command in in_flight {
        if let Some(value) = values.get_mut(command.slot.index) {
            *value = Some(command.target.clone());
        }
    }
    values
}
