//! Topic grammar.
//!
//! | Direction | Topic |
//! |-----------|-------|
//! | state (in) | `<prefix>/<module>/<address>/<output>/<facet>` |
//! | module-wide state (in) | `<prefix>/<module>/<address>/all/<facet>` |
//! | command (out) | `<prefix>/<module>/<address>/<output>/<facet>/cmd` |
//! | raw frame (out) | `<prefix>/<module>/<address>/raw` |
//! | module list request (out) | `<prefix>/to/can/dev/list` |
//! | module list (in) | `<prefix>/from/can/dev/list` |
//! | item names request (out) | `<prefix>/to/<address>/description` |
//! | item names (in) | `<prefix>/from/<address>/description` |
//! | gateway version request (out) | `<prefix>/to/info/version` |
//! | gateway version (in) | `<prefix>/from/info/version` |
//!
//! Every segment is a non-empty ASCII alphanumeric token. Outputs are
//! 1-based; `all` is only meaningful for bit-packed facets.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::device::Address;
use crate::error::ParseError;
use crate::module::{Facet, ModuleType};

/// Payload asking the gateway to publish its module list.
pub const CATALOG_REQUEST_PAYLOAD: &str = "1";
/// Payload asking the gateway for one module's item names.
pub const DESCRIPTION_REQUEST_PAYLOAD: &str = "1";
/// Payload asking the gateway for its version.
pub const VERSION_REQUEST_PAYLOAD: &str = "";

const DESCRIPTION: &str = "description";

const WILDCARD: &str = "all";

/// Output segment of a topic.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChannelRef {
    Output(u8),
    All,
}

impl fmt::Display for ChannelRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Output(output) => output.fmt(f),
            Self::All => f.write_str(WILDCARD),
        }
    }
}

/// Parsed state topic.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Topic {
    pub module: ModuleType,
    pub address: Address,
    pub channel: ChannelRef,
    pub facet: Facet,
}

impl Topic {
    /// Parse a state topic published under `prefix`.
    ///
    /// # Errors
    ///
    /// - [`ParseError::UnrecognizedTopic`] for a foreign prefix, wrong segment
    ///   count, unknown module or facet tag, or a malformed output segment.
    /// - [`ParseError::InvalidAddress`] for a non-alphanumeric address.
    /// - [`ParseError::UnsupportedFacet`] when the module has no such facet.
    /// - [`ParseError::UnknownChannel`] when the output is outside the facet group.
    pub fn parse(prefix: &str, topic: &str) -> Result<Self, ParseError> {
        let unrecognized = || ParseError::UnrecognizedTopic {
            topic: topic.to_string(),
        };

        let rest = strip_prefix(prefix, topic).ok_or_else(unrecognized)?;
        let segments: Vec<&str> = rest.split('/').collect();
        let [module, address, channel, facet] = segments.as_slice() else {
            return Err(unrecognized());
        };

        let module = ModuleType::from_tag(module).ok_or_else(unrecognized)?;
        let address = Address::parse(address)?;
        let facet = Facet::from_tag(facet).ok_or_else(unrecognized)?;
        if !module.supports(facet) {
            return Err(ParseError::UnsupportedFacet { module, facet });
        }

        let channel = if *channel == WILDCARD {
            if facet != Facet::Flag {
                return Err(unrecognized());
            }
            ChannelRef::All
        } else {
            if channel.is_empty() || !channel.bytes().all(|b| b.is_ascii_digit()) {
                return Err(unrecognized());
            }
            let output = channel.parse::<u8>().unwrap_or(u8::MAX);
            if output == 0 || output > module.outputs(facet) {
                return Err(ParseError::UnknownChannel {
                    module,
                    facet,
                    output,
                });
            }
            ChannelRef::Output(output)
        };

        Ok(Self {
            module,
            address,
            channel,
            facet,
        })
    }

    /// Flat channel index, `None` for module-wide topics.
    #[must_use]
    pub fn slot(&self) -> Option<usize> {
        match self.channel {
            ChannelRef::Output(output) => self
                .module
                .slot_of(self.facet, output)
                .map(|slot| slot.index),
            ChannelRef::All => None,
        }
    }

    /// Render this topic as published under `prefix`.
    #[must_use]
    pub fn state_topic(&self, prefix: &str) -> String {
        format!(
            "{prefix}/{}/{}/{}/{}",
            self.module.tag(),
            self.address,
            self.channel,
            self.facet.tag()
        )
    }
}

/// Classification of an inbound topic.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Route {
    State(Topic),
    /// The gateway's module list.
    Catalog,
    /// Item names of the module at this address.
    Description(Address),
    /// The gateway's version.
    Version,
    /// An echo of something the bridge itself publishes.
    Outbound,
}

/// Classify an inbound topic.
///
/// # Errors
///
/// Returns the [`ParseError`] of [`Topic::parse`] for anything that is
/// neither gateway information nor one of the bridge's own outbound topics.
/// A description topic with an invalid address gives
/// [`ParseError::InvalidAddress`].
pub fn route(prefix: &str, topic: &str) -> Result<Route, ParseError> {
    if topic == catalog_topic(prefix) {
        return Ok(Route::Catalog);
    }
    if topic == version_topic(prefix) {
        return Ok(Route::Version);
    }
    if let Some(address) = strip_prefix(prefix, topic)
        .and_then(|rest| rest.strip_prefix("from/"))
        .and_then(|rest| rest.strip_suffix(DESCRIPTION))
        .and_then(|rest| rest.strip_suffix('/'))
    {
        return Address::parse(address).map(Route::Description);
    }
    if let Some(rest) = strip_prefix(prefix, topic)
        && (rest.starts_with("to/") || rest.ends_with("/cmd") || rest.ends_with("/raw"))
    {
        return Ok(Route::Outbound);
    }
    Topic::parse(prefix, topic).map(Route::State)
}

#[must_use]
pub fn command_topic(
    prefix: &str,
    module: ModuleType,
    address: &Address,
    channel: ChannelRef,
    facet: Facet,
) -> String {
    format!(
        "{prefix}/{}/{address}/{channel}/{}/cmd",
        module.tag(),
        facet.tag()
    )
}

#[must_use]
pub fn raw_topic(prefix: &str, module: ModuleType, address: &Address) -> String {
    format!("{prefix}/{}/{address}/raw", module.tag())
}

#[must_use]
pub fn catalog_topic(prefix: &str) -> String {
    format!("{prefix}/from/can/dev/list")
}

#[must_use]
pub fn catalog_request_topic(prefix: &str) -> String {
    format!("{prefix}/to/can/dev/list")
}

#[must_use]
pub fn description_request_topic(prefix: &str, address: &Address) -> String {
    format!("{prefix}/to/{address}/{DESCRIPTION}")
}

#[must_use]
pub fn version_topic(prefix: &str) -> String {
    format!("{prefix}/from/info/version")
}

#[must_use]
pub fn version_request_topic(prefix: &str) -> String {
    format!("{prefix}/to/info/version")
}

/// Topic filter covering everything the bridge consumes.
#[must_use]
pub fn subscription(prefix: &str) -> String {
    format!("{prefix}/#")
}

fn strip_prefix<'a>(prefix: &str, topic: &'a str) -> Option<&'a str> {
    topic
        .strip_prefix(prefix)
        .and_then(|rest| rest.strip_prefix('/'))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn should_parse_state_topic() {
        let topic = Topic::parse("ampio", "ampio/mrol/5/2/p").unwrap();
        assert_eq!(topic.module, ModuleType::RollerShutter);
        assert_eq!(topic.address.as_str(), "5");
        assert_eq!(topic.channel, ChannelRef::Output(2));
        assert_eq!(topic.facet, Facet::Position);
        assert_eq!(topic.slot(), Some(1));
    }

    #[test]
    fn should_parse_prefix_with_slashes() {
        let topic = Topic::parse("home/ampio", "home/ampio/mpr/1f/3/o").unwrap();
        assert_eq!(topic.address.as_str(), "1F");
        assert_eq!(topic.slot(), Some(2));
    }

    #[test]
    fn should_parse_module_wide_flags() {
        let topic = Topic::parse("ampio", "ampio/flags/9/all/f").unwrap();
        assert_eq!(topic.channel, ChannelRef::All);
        assert_eq!(topic.slot(), None);
    }

    #[test]
    fn should_reject_unknown_module_tag() {
        let err = Topic::parse("ampio", "ampio/toaster/5/1/o").unwrap_err();
        assert!(matches!(err, ParseError::UnrecognizedTopic { .. }));
    }

    #[test]
    fn should_reject_wrong_segment_count() {
        let err = Topic::parse("ampio", "ampio/mpr/5/1").unwrap_err();
        assert!(matches!(err, ParseError::UnrecognizedTopic { .. }));
    }

    #[test]
    fn should_reject_foreign_prefix() {
        let err = Topic::parse("ampio", "other/mpr/5/1/o").unwrap_err();
        assert!(matches!(err, ParseError::UnrecognizedTopic { .. }));
    }

    #[test]
    fn should_reject_output_outside_group() {
        let err = Topic::parse("ampio", "ampio/mserv/5/4/o").unwrap_err();
        assert!(matches!(err, ParseError::UnknownChannel { output: 4, .. }));
    }

    #[test]
    fn should_reject_facet_module_does_not_expose() {
        let err = Topic::parse("ampio", "ampio/mpr/5/1/rgbw").unwrap_err();
        assert!(matches!(err, ParseError::UnsupportedFacet { .. }));
    }

    #[test]
    fn should_reject_wildcard_on_non_flag_facet() {
        let err = Topic::parse("ampio", "ampio/mpr/5/all/o").unwrap_err();
        assert!(matches!(err, ParseError::UnrecognizedTopic { .. }));
    }

    #[test]
    fn should_route_catalog_and_echoes() {
        assert_eq!(route("ampio", "ampio/from/can/dev/list").unwrap(), Route::Catalog);
        assert_eq!(route("ampio", "ampio/to/can/dev/list").unwrap(), Route::Outbound);
        assert_eq!(route("ampio", "ampio/mpr/5/1/o/cmd").unwrap(), Route::Outbound);
        assert_eq!(route("ampio", "ampio/mrol/5/raw").unwrap(), Route::Outbound);
        assert!(matches!(
            route("ampio", "ampio/mpr/5/1/o").unwrap(),
            Route::State(_)
        ));
    }

    #[test]
    fn should_route_gateway_information() {
        assert_eq!(route("ampio", "ampio/from/info/version").unwrap(), Route::Version);
        assert_eq!(
            route("ampio", "ampio/from/1b88/description").unwrap(),
            Route::Description(Address::parse("1B88").unwrap())
        );
        assert_eq!(route("ampio", "ampio/to/1B88/description").unwrap(), Route::Outbound);
        assert!(matches!(
            route("ampio", "ampio/from/a-b/description"),
            Err(ParseError::InvalidAddress(_))
        ));
    }

    #[test]
    fn should_format_gateway_requests() {
        let address = Address::parse("1b88").unwrap();
        assert_eq!(
            description_request_topic("ampio", &address),
            "ampio/to/1B88/description"
        );
        assert_eq!(version_request_topic("ampio"), "ampio/to/info/version");
    }

    #[test]
    fn should_format_outbound_topics() {
        let address = Address::parse("5").unwrap();
        assert_eq!(
            command_topic(
                "ampio",
                ModuleType::RollerShutter,
                &address,
                ChannelRef::Output(2),
                Facet::Motion
            ),
            "ampio/mrol/5/2/mv/cmd"
        );
        assert_eq!(
            raw_topic("ampio", ModuleType::RollerShutter, &address),
            "ampio/mrol/5/raw"
        );
    }

    #[test]
    fn should_render_state_topic_back() {
        let raw = "ampio/flags/9/all/f";
        let topic = Topic::parse("ampio", raw).unwrap();
        assert_eq!(topic.state_topic("ampio"), raw);
    }
}
