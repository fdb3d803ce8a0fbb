//! Command identifiers.
//!
//! Modules are addressed by their hardware address; only commands need a
//! generated identity.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Identifier handed back for every submitted
/// [`PendingCommand`](crate::command::PendingCommand).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CommandId(uuid::Uuid);

impl Default for CommandId {
    fn default() -> Self {
        Self(uuid::Uuid::new_v4())
    }
}

impl CommandId {
    /// Generate a new random identifier.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

impl fmt::Display for CommandId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn should_generate_unique_ids_when_called_twice() {
        assert_ne!(CommandId::new(), CommandId::new());
    }

    #[test]
    fn should_display_as_hyphenated_uuid() {
        let id = CommandId::new().to_string();
        assert_eq!(id.len(), 36);
        assert!(uuid::Uuid::parse_str(&id).is_ok());
    }
}
