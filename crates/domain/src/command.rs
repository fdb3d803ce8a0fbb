//! Command lifecycle: one finite state machine per `(address, channel)`.
//!
//! ```text
//!            submit
//!   Idle ───────────▶ Submitted{sent: false} ──Sent──▶ Submitted{sent: true}
//!                          │    │                          │    │    │
//!                 Superseded  Expired           Superseded  Expired  Observed
//!                          ▼    ▼                          ▼    ▼    ▼
//!                  Superseded  TimedOut            Superseded TimedOut Acked
//! ```
//!
//! Terminal states absorb every further event; the dispatcher drops the
//! command once it is terminal, which returns the channel to `Idle`.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::device::Address;
use crate::id::CommandId;
use crate::module::{ChannelSlot, ModuleType};
use crate::time::Timestamp;
use crate::value::ChannelValue;

/// Acknowledgement state of an outstanding command.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CommandState {
    /// Accepted; `sent` once the payload was handed to the publisher.
    Submitted { sent: bool },
    Acked,
    TimedOut,
    /// Replaced by a newer submission for the same channel.
    Superseded,
}

/// Inputs driving [`CommandState::transition`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommandEvent {
    Sent,
    /// The module reported a value matching the target.
    Observed,
    Expired,
    Superseded,
}

/// Final result delivered to whoever submitted the command.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CommandOutcome {
    Acked,
    Superseded,
    TimedOut,
}

impl CommandState {
    /// Apply one event.
    #[must_use]
    pub fn transition(self, event: CommandEvent) -> Self {
        use CommandEvent as E;

        match (self, event) {
            (Self::Submitted { sent: false }, E::Sent) => Self::Submitted { sent: true },
            (Self::Submitted { sent: true }, E::Observed) => Self::Acked,
            (Self::Submitted { .. }, E::Expired) => Self::TimedOut,
            (Self::Submitted { .. }, E::Superseded) => Self::Superseded,
            // feedback can't corroborate a payload that never left
            (Self::Submitted { sent: false }, E::Observed)
            | (Self::Submitted { sent: true }, E::Sent)
            | (Self::Acked | Self::TimedOut | Self::Superseded, _) => self,
        }
    }

    #[must_use]
    pub fn is_terminal(self) -> bool {
        self.outcome().is_some()
    }

    #[must_use]
    pub fn outcome(self) -> Option<CommandOutcome> {
        match self {
            Self::Submitted { .. } => None,
            Self::Acked => Some(CommandOutcome::Acked),
            Self::TimedOut => Some(CommandOutcome::TimedOut),
            Self::Superseded => Some(CommandOutcome::Superseded),
        }
    }
}

impl fmt::Display for CommandOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Acked => "acked",
            Self::Superseded => "superseded",
            Self::TimedOut => "timed out",
        })
    }
}

/// The single outstanding command for one channel.
#[derive(Debug, Clone, PartialEq)]
pub struct PendingCommand {
    pub id: CommandId,
    pub address: Address,
    /// Module the slot was resolved against.
    pub module: ModuleType,
    pub slot: ChannelSlot,
    pub target: ChannelValue,
    pub submitted_at: Timestamp,
    pub state: CommandState,
}

impl PendingCommand {
    #[must_use]
    pub fn new(
        address: Address,
        module: ModuleType,
        slot: ChannelSlot,
        target: ChannelValue,
        now: Timestamp,
    ) -> Self {
        Self {
            id: CommandId::new(),
            address,
            module,
            slot,
            target,
            submitted_at: now,
            state: CommandState::Submitted { sent: false },
        }
    }

    /// Move to the next state, returning the outcome if it became terminal.
    pub fn apply(&mut self, event: CommandEvent) -> Option<CommandOutcome> {
        self.state = self.state.transition(event);
        self.state.outcome()
    }

    #[must_use]
    pub fn is_sent(&self) -> bool {
        matches!(self.state, CommandState::Submitted { sent: true })
    }

    #[must_use]
    pub fn is_expired(&self, now: Timestamp, deadline: chrono::Duration) -> bool {
        now - self.submitted_at >= deadline
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SUBMITTED: CommandState = CommandState::Submitted { sent: false };
    const SENT: CommandState = CommandState::Submitted { sent: true };

    #[test]
    fn should_ack_only_after_send() {
        assert_eq!(SUBMITTED.transition(CommandEvent::Observed), SUBMITTED);
        let sent = SUBMITTED.transition(CommandEvent::Sent);
        assert_eq!(sent, SENT);
        assert_eq!(sent.transition(CommandEvent::Observed), CommandState::Acked);
    }

    #[test]
    fn should_supersede_from_either_submitted_state() {
        assert_eq!(
            SUBMITTED.transition(CommandEvent::Superseded),
            CommandState::Superseded
        );
        assert_eq!(
            SENT.transition(CommandEvent::Superseded),
            CommandState::Superseded
        );
    }

    #[test]
    fn should_time_out_from_either_submitted_state() {
        assert_eq!(SUBMITTED.transition(CommandEvent::Expired), CommandState::TimedOut);
        assert_eq!(SENT.transition(CommandEvent::Expired), CommandState::TimedOut);
    }

    #[test]
    fn should_absorb_events_in_terminal_states() {
        for terminal in [
            CommandState::Acked,
            CommandState::TimedOut,
            CommandState::Superseded,
        ] {
            for event in [
                CommandEvent::Sent,
                CommandEvent::Observed,
                CommandEvent::Expired,
                CommandEvent::Superseded,
            ] {
                assert_eq!(terminal.transition(event), terminal);
            }
        }
    }

    #[test]
    fn should_never_ack_a_superseded_command() {
        let state = SENT
            .transition(CommandEvent::Superseded)
            .transition(CommandEvent::Observed);
        assert_eq!(state.outcome(), Some(CommandOutcome::Superseded));
    }

    #[test]
    fn should_report_expiry_against_deadline() {
        let now = crate::time::now();
        let slot = ModuleType::RelayPack.slot(0).unwrap();
        let command = PendingCommand::new(
            Address::parse("5").unwrap(),
            ModuleType::RelayPack,
            slot,
            ChannelValue::Bool(true),
            now,
        );
        let deadline = chrono::Duration::seconds(10);
        assert!(!command.is_expired(now + chrono::Duration::seconds(9), deadline));
        assert!(command.is_expired(now + chrono::Duration::seconds(10), deadline));
    }
}
