//! Codec registry: per-module payload encodings.
//!
//! Dispatch is keyed by `(ModuleType, Facet)`. Both directions are pure:
//! bit-packed encodes receive the device's full current channel vector as an
//! explicit argument instead of reading shared state.
//!
//! | Facet | Inbound payload | Outbound payload |
//! |-------|-----------------|------------------|
//! | switch / input | `0` / `1` | `0` / `1`, dimmers send a level |
//! | flag | `0` / `1`, or u32 mask on `all` | full u32 mask on `all` |
//! | level | `0..=255` | `0..=255` (clamped) |
//! | position / tilt | `0..=100` | motion `2`/`1` at the ends, raw frame otherwise |
//! | motion | `0` stop, `1` close, `2` open | same |
//! | temperature / measurement | decimal | read-only |
//! | setpoint | decimal | `{:.1}` in `5.0..=35.0` |
//! | color | `r,g,b[,w]`, fields may be empty | `r,g,b[,w]` |
//! | zone | state name or `0..=4` | raw arm / disarm frame |
//! | display | UTF-8 text | UTF-8 text |

mod decode;
mod encode;

pub use decode::{decode, unpack_flags};
pub use encode::{encode, normalize, SETPOINT_MAX, SETPOINT_MIN};

use crate::module::Facet;
use crate::topic::ChannelRef;
use crate::value::{ChannelValue, ColorParts};

/// Highest brightness step accepted by dimmers.
pub const MAX_LEVEL: u16 = 255;

/// Result of decoding one inbound payload.
#[derive(Debug, Clone, PartialEq)]
pub enum Decoded {
    /// A single channel value for the topic's output.
    Single(ChannelValue),
    /// Bit-packed booleans: bit `n` maps to output `n + 1`.
    Bits { mask: u32, width: u8 },
    /// Colour components that do not yet form a full tuple.
    PartialColor(ColorParts),
}

/// Where an encoded command must be published.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommandTarget {
    /// `<prefix>/<module>/<address>/<output>/<facet>/cmd`
    Channel { channel: ChannelRef, facet: Facet },
    /// `<prefix>/<module>/<address>/raw`, hex-encoded CAN frame.
    Raw,
}

/// Outbound command payload produced by [`encode`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Encoded {
    pub target: CommandTarget,
    pub payload: String,
}
