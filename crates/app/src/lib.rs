//! # ampio-app
//!
//! Bridge core: runtime state and **port definitions** (traits).
//!
//! ## Responsibilities
//! - Define **port traits** that adapters must implement:
//!   - `Publisher`: hand an outbound message to the broker
//!   - `EventPublisher`: report bridge events to the host
//! - Own the **device registry**, the single store of channel state
//! - Run **discovery**: create devices on first sight, evict silent ones
//! - Run the **command dispatcher**: debounce, encode, acknowledge, time out
//! - Provide the **bridge** loop and the handle the host integration uses
//! - Provide **in-process infrastructure** (event bus) that doesn't need IO
//!
//! ## Dependency rule
//! Depends on `ampio-domain` only (plus `tokio` for channels and timers).
//! Never imports adapter crates. Adapters depend on *this* crate, not the reverse.

pub mod bridge;
pub mod discovery;
pub mod dispatcher;
pub mod event_bus;
pub mod ports;
pub mod registry;

pub use bridge::{Bridge, BridgeConfig, BridgeHandle};
