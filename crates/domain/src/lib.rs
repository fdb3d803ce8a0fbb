//! # ampio-domain
//!
//! Pure domain model for the Ampio MQTT bridge.
//!
//! ## Responsibilities
//! - Foundational types: command identifiers, error taxonomy, timestamps
//! - Define **module types**, their **facets** and fixed channel layouts
//! - Define typed **channel values** and acknowledgement tolerances
//! - Define **devices** and **channels** with their kind invariant
//! - Parse and format **topics** (the firmware's segment grammar)
//! - Provide the **codec registry**: per-module payload decode and encode
//! - Define the per-channel **command state machine**
//! - Parse the gateway's **module catalog**
//! - Define the **events** the bridge reports to its host
//!
//! ## Dependency rule
//! This crate has **no internal dependencies**.
//! It must never import anything from `app`, adapters, or external IO crates.
//! All IO boundaries are expressed as traits in the `app` crate (ports).

pub mod error;
pub mod id;
pub mod time;

pub mod catalog;
pub mod codec;
pub mod command;
pub mod device;
pub mod event;
pub mod module;
pub mod topic;
pub mod value;
