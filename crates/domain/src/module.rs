//! Module types, facets and channel layouts.
//!
//! Every Ampio module class exposes a fixed, ordered set of channels. The
//! layout is described as a list of facet groups: a group is one facet
//! repeated `count` times, addressed on the wire by its 1-based output
//! number. A channel index is the flat position of an output across all
//! groups of the layout.
//!
//! | Module | Tag | Layout |
//! |--------|-----|--------|
//! | Flags | `flags` | flag × 32 |
//! | MCON (Satel) | `mcon` | zone × 32 |
//! | MSENS | `msens` | temperature × 1, measurement × 5 |
//! | MROL-4s | `mrol` | position × 4, tilt × 4, motion × 4 |
//! | MPR-8s | `mpr` | switch × 8, input × 8 |
//! | MSERV-3s | `mserv` | switch × 3, input × 3 |
//! | MRT-16s | `mrt` | temperature × 16, setpoint × 16 |
//! | MLED-1 | `mled` | switch × 1, level × 1 |
//! | MDIM-8s | `mdim` | switch × 8, level × 8 |
//! | MRGBu-1 | `mrgb` | color × 1 |
//! | MDOT-2/4/9/15LCD | `mdot2`… | input × n, display × 1 |

use std::fmt;

use serde::{Deserialize, Serialize};

/// Closed set of hardware classes understood by the bridge.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ModuleType {
    FlagPanel,
    SatelController,
    Sensor,
    RollerShutter,
    RelayPack,
    Contactor,
    Thermostat,
    SingleDimmer,
    MultiDimmer,
    RgbController,
    Mdot2,
    Mdot4,
    Mdot9,
    Mdot15Lcd,
}

/// One facet repeated over consecutive outputs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FacetGroup {
    pub facet: Facet,
    pub count: u8,
}

const fn group(facet: Facet, count: u8) -> FacetGroup {
    FacetGroup { facet, count }
}

/// Position of a channel inside a module layout.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ChannelSlot {
    /// Flat channel index, `0..channel_count`.
    pub index: usize,
    pub facet: Facet,
    /// 1-based output number within the facet group.
    pub output: u8,
}

impl ModuleType {
    pub const ALL: [Self; 14] = [
        Self::FlagPanel,
        Self::SatelController,
        Self::Sensor,
        Self::RollerShutter,
        Self::RelayPack,
        Self::Contactor,
        Self::Thermostat,
        Self::SingleDimmer,
        Self::MultiDimmer,
        Self::RgbController,
        Self::Mdot2,
        Self::Mdot4,
        Self::Mdot9,
        Self::Mdot15Lcd,
    ];

    /// Topic segment identifying the module class.
    #[must_use]
    pub fn tag(self) -> &'static str {
        match self {
            Self::FlagPanel => "flags",
            Self::SatelController => "mcon",
            Self::Sensor => "msens",
            Self::RollerShutter => "mrol",
            Self::RelayPack => "mpr",
            Self::Contactor => "mserv",
            Self::Thermostat => "mrt",
            Self::SingleDimmer => "mled",
            Self::MultiDimmer => "mdim",
            Self::RgbController => "mrgb",
            Self::Mdot2 => "mdot2",
            Self::Mdot4 => "mdot4",
            Self::Mdot9 => "mdot9",
            Self::Mdot15Lcd => "mdot15",
        }
    }

    #[must_use]
    pub fn from_tag(tag: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|module| module.tag() == tag)
    }

    /// Firmware type code reported in the module list, if the class has one.
    #[must_use]
    pub fn type_code(self) -> Option<u8> {
        match self {
            Self::FlagPanel => None,
            Self::SatelController => Some(25),
            Self::Sensor => Some(44),
            Self::RollerShutter => Some(3),
            Self::RelayPack => Some(4),
            Self::Contactor => Some(10),
            Self::Thermostat => Some(22),
            Self::SingleDimmer => Some(17),
            Self::MultiDimmer => Some(5),
            Self::RgbController => Some(12),
            Self::Mdot2 => Some(33),
            Self::Mdot4 => Some(8),
            Self::Mdot9 => Some(11),
            Self::Mdot15Lcd => Some(27),
        }
    }

    #[must_use]
    pub fn from_type_code(code: u8) -> Option<Self> {
        Self::ALL
            .into_iter()
            .find(|module| module.type_code() == Some(code))
    }

    /// Vendor part number.
    #[must_use]
    pub fn part_number(self) -> &'static str {
        match self {
            Self::FlagPanel => "Flags",
            Self::SatelController => "MCON",
            Self::Sensor => "MSENS",
            Self::RollerShutter => "MROL-4s",
            Self::RelayPack => "MPR-8s",
            Self::Contactor => "MSERV-3s",
            Self::Thermostat => "MRT-16s",
            Self::SingleDimmer => "MLED-1",
            Self::MultiDimmer => "MDIM-8s",
            Self::RgbController => "MRGBu-1",
            Self::Mdot2 => "MDOT-2",
            Self::Mdot4 => "MDOT-4",
            Self::Mdot9 => "MDOT-9",
            Self::Mdot15Lcd => "MDOT-15LCD",
        }
    }

    /// Ordered facet groups making up the module's channels.
    #[must_use]
    pub fn layout(self) -> &'static [FacetGroup] {
        use Facet::{
            Color, Display, Flag, Input, Level, Measurement, Motion, Position, Setpoint, Switch,
            Temperature, Tilt, Zone,
        };

        match self {
            Self::FlagPanel => const { &[group(Flag, 32)] },
            Self::SatelController => const { &[group(Zone, 32)] },
            Self::Sensor => const { &[group(Temperature, 1), group(Measurement, 5)] },
            Self::RollerShutter => const {
                &[group(Position, 4), group(Tilt, 4), group(Motion, 4)]
            },
            Self::RelayPack => const { &[group(Switch, 8), group(Input, 8)] },
            Self::Contactor => const { &[group(Switch, 3), group(Input, 3)] },
            Self::Thermostat => const { &[group(Temperature, 16), group(Setpoint, 16)] },
            Self::SingleDimmer => const { &[group(Switch, 1), group(Level, 1)] },
            Self::MultiDimmer => const { &[group(Switch, 8), group(Level, 8)] },
            Self::RgbController => const { &[group(Color, 1)] },
            Self::Mdot2 => const { &[group(Input, 2), group(Display, 1)] },
            Self::Mdot4 => const { &[group(Input, 4), group(Display, 1)] },
            Self::Mdot9 => const { &[group(Input, 9), group(Display, 1)] },
            Self::Mdot15Lcd => const { &[group(Input, 15), group(Display, 1)] },
        }
    }

    #[must_use]
    pub fn channel_count(self) -> usize {
        self.layout()
            .iter()
            .map(|group| usize::from(group.count))
            .sum()
    }

    /// Number of outputs exposing `facet`, zero when unsupported.
    #[must_use]
    pub fn outputs(self, facet: Facet) -> u8 {
        self.layout()
            .iter()
            .find(|group| group.facet == facet)
            .map_or(0, |group| group.count)
    }

    #[must_use]
    pub fn supports(self, facet: Facet) -> bool {
        self.outputs(facet) > 0
    }

    /// Whether switch outputs are backed by a brightness level.
    #[must_use]
    pub fn is_dimmer(self) -> bool {
        matches!(self, Self::SingleDimmer | Self::MultiDimmer)
    }

    /// Iterate over every channel slot in layout order.
    pub fn slots(self) -> impl Iterator<Item = ChannelSlot> {
        self.layout()
            .iter()
            .flat_map(|group| (1..=group.count).map(move |output| (group.facet, output)))
            .enumerate()
            .map(|(index, (facet, output))| ChannelSlot {
                index,
                facet,
                output,
            })
    }

    /// Slot at a flat channel index.
    #[must_use]
    pub fn slot(self, index: usize) -> Option<ChannelSlot> {
        self.slots().nth(index)
    }

    /// Slot addressed by `facet` and 1-based `output`.
    #[must_use]
    pub fn slot_of(self, facet: Facet, output: u8) -> Option<ChannelSlot> {
        self.slots()
            .find(|slot| slot.facet == facet && slot.output == output)
    }
}

impl fmt::Display for ModuleType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.part_number())
    }
}

/// Named attribute of a channel's state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Facet {
    Switch,
    Input,
    Level,
    Position,
    Tilt,
    Motion,
    Flag,
    Temperature,
    Measurement,
    Setpoint,
    Color,
    Zone,
    Display,
}

impl Facet {
    pub const ALL: [Self; 13] = [
        Self::Switch,
        Self::Input,
        Self::Level,
        Self::Position,
        Self::Tilt,
        Self::Motion,
        Self::Flag,
        Self::Temperature,
        Self::Measurement,
        Self::Setpoint,
        Self::Color,
        Self::Zone,
        Self::Display,
    ];

    /// Topic segment identifying the facet.
    #[must_use]
    pub fn tag(self) -> &'static str {
        match self {
            Self::Switch => "o",
            Self::Input => "i",
            Self::Level => "a",
            Self::Position => "p",
            Self::Tilt => "tilt",
            Self::Motion => "mv",
            Self::Flag => "f",
            Self::Temperature => "t",
            Self::Measurement => "au",
            Self::Setpoint => "sp",
            Self::Color => "rgbw",
            Self::Zone => "z",
            Self::Display => "lcd",
        }
    }

    #[must_use]
    pub fn from_tag(tag: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|facet| facet.tag() == tag)
    }

    /// Value kind held by every channel of this facet.
    #[must_use]
    pub fn kind(self) -> ValueKind {
        match self {
            Self::Switch | Self::Input | Self::Flag => ValueKind::Bool,
            Self::Level => ValueKind::Level,
            Self::Position | Self::Tilt => ValueKind::Percentage,
            Self::Motion => ValueKind::Motion,
            Self::Temperature | Self::Setpoint => ValueKind::Temperature,
            Self::Measurement => ValueKind::Numeric,
            Self::Color => ValueKind::Color,
            Self::Zone => ValueKind::Alarm,
            Self::Display => ValueKind::Text,
        }
    }

    /// Whether commands may target this facet.
    #[must_use]
    pub fn is_writable(self) -> bool {
        !matches!(self, Self::Input | Self::Temperature | Self::Measurement)
    }

    fn name(self) -> &'static str {
        match self {
            Self::Switch => "switch",
            Self::Input => "input",
            Self::Level => "level",
            Self::Position => "position",
            Self::Tilt => "tilt",
            Self::Motion => "motion",
            Self::Flag => "flag",
            Self::Temperature => "temperature",
            Self::Measurement => "measurement",
            Self::Setpoint => "setpoint",
            Self::Color => "color",
            Self::Zone => "zone",
            Self::Display => "display",
        }
    }
}

impl fmt::Display for Facet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Variant tag of a [`ChannelValue`](crate::value::ChannelValue).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ValueKind {
    Bool,
    Percentage,
    Level,
    Color,
    Temperature,
    Numeric,
    Alarm,
    Motion,
    Text,
}

impl fmt::Display for ValueKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Bool => "bool",
            Self::Percentage => "percentage",
            Self::Level => "level",
            Self::Color => "color",
            Self::Temperature => "temperature",
            Self::Numeric => "numeric",
            Self::Alarm => "alarm",
            Self::Motion => "motion",
            Self::Text => "text",
        })
    }
}
