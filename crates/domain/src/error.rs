//! Common error types used across the workspace.
//!
//! Each failure is scoped to a single inbound message or a single command.
//! None of them is fatal to the bridge: the caller logs and moves on.

use crate::module::{Facet, ModuleType, ValueKind};

/// Top-level error type shared by every crate in the workspace.
#[derive(Debug, thiserror::Error)]
pub enum AmpioError {
    #[error("topic error")]
    Parse(#[from] ParseError),

    #[error("payload decode error")]
    Decode(#[from] DecodeError),

    #[error("command encode error")]
    Encode(#[from] EncodeError),

    #[error("command error")]
    Command(#[from] CommandError),

    #[error("registry error")]
    Registry(#[from] RegistryError),

    #[error("module catalog error")]
    Catalog(#[from] CatalogError),

    /// Failure reported by the transport collaborator (broker client).
    #[error("transport error")]
    Transport(#[source] Box<dyn std::error::Error + Send + Sync>),
}

impl AmpioError {
    /// Whether the caller may reasonably submit the same request again.
    #[must_use]
    pub fn is_retriable(&self) -> bool {
        match self {
            Self::Command(err) => err.is_retriable(),
            Self::Transport(_) => true,
            _ => false,
        }
    }
}

/// A topic that does not follow the `<prefix>/<module>/<address>/<output>/<facet>` grammar.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ParseError {
    #[error("unrecognized topic {topic:?}")]
    UnrecognizedTopic { topic: String },

    #[error("invalid module address {0:?}")]
    InvalidAddress(String),

    #[error("{module} has no {facet} output {output}")]
    UnknownChannel {
        module: ModuleType,
        facet: Facet,
        output: u8,
    },

    #[error("{module} does not expose {facet}")]
    UnsupportedFacet { module: ModuleType, facet: Facet },
}

/// A payload that does not match the encoding expected for its facet.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DecodeError {
    #[error("payload is not valid UTF-8")]
    NotUtf8,

    #[error("malformed {facet} payload {payload:?}")]
    Malformed { facet: Facet, payload: String },

    #[error("{facet} value {value} outside 0..={max}")]
    OutOfRange { facet: Facet, value: i64, max: i64 },

    #[error("{module} does not expose {facet}")]
    UnsupportedFacet { module: ModuleType, facet: Facet },
}

/// A requested target that cannot be turned into a command.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum EncodeError {
    #[error("{0} is read-only")]
    ReadOnly(Facet),

    #[error("{facet} expects a {expected} value, got {actual}")]
    KindMismatch {
        facet: Facet,
        expected: ValueKind,
        actual: ValueKind,
    },

    #[error("{facet} target {value} is outside the accepted domain")]
    OutOfDomain { facet: Facet, value: String },

    #[error("{facet} cannot be driven to {value}")]
    Unsupported { facet: Facet, value: String },

    #[error("{module} does not expose {facet}")]
    UnsupportedFacet { module: ModuleType, facet: Facet },
}

/// Failures surfaced by the command dispatcher.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum CommandError {
    #[error("unknown device {0}")]
    UnknownDevice(String),

    #[error("device {address} has no channel {channel}")]
    UnknownChannel { address: String, channel: usize },

    #[error("command rejected")]
    Rejected(#[from] EncodeError),

    /// No corroborating state was observed before the deadline.
    #[error("command for {address} channel {channel} timed out")]
    Timeout { address: String, channel: usize },
}

impl CommandError {
    /// Timeouts may be retried by the caller; everything else is a rejection.
    #[must_use]
    pub fn is_retriable(&self) -> bool {
        matches!(self, Self::Timeout { .. })
    }
}

/// Failures raised while mutating the device registry.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RegistryError {
    #[error("unknown device {0}")]
    UnknownDevice(String),

    #[error("device {address} has no channel {channel}")]
    UnknownChannel { address: String, channel: usize },

    #[error("channel {channel} holds {expected} values, got {actual}")]
    KindMismatch {
        channel: usize,
        expected: ValueKind,
        actual: ValueKind,
    },

    #[error("device {address} is a {known}, message claims {claimed}")]
    ModuleMismatch {
        address: String,
        known: ModuleType,
        claimed: ModuleType,
    },
}

/// Failures raised while reading the firmware module list.
#[derive(Debug, thiserror::Error)]
pub enum CatalogError {
    #[error("failed to parse module list")]
    Json(#[from] serde_json::Error),

    #[error("module list entry has an invalid address {0:?}")]
    InvalidAddress(String),
}
