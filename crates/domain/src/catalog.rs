//! Static information the gateway publishes about its modules.
//!
//! The module list arrives on `<prefix>/from/can/dev/list`:
//!
//! ```json
//! {"s": 1, "d": [{"mac": "0011aa", "user_mac": "1f", "typ": 3, "pcb": 2,
//!   "soft_ver": 11, "protocol": 1, "date_prod": "2019-01-01",
//!   "i": 0, "o": 4, "a": 0, "au": 0, "f": 0, "name": "U2Fsb24="}]}
//! ```
//!
//! Per-item names of one module arrive on `<prefix>/from/<address>/description`:
//!
//! ```json
//! {"s": 1, "d": [{"t": 12, "n": 0, "d": "TDpTYWxvbg=="}]}
//! ```
//!
//! `t` is the item type, `n` the 0-based item number. A name may carry a
//! `<class>:` prefix, e.g. `L:Salon` is a light called `Salon`.
//!
//! Names are base64; old firmware writes them in the Windows-1250 code
//! page, which is the fallback whenever the bytes are not UTF-8.

use base64::Engine as _;
use serde::{Deserialize, Serialize};

use crate::device::Address;
use crate::error::CatalogError;
use crate::module::{Facet, ModuleType};

/// Static description of one module, as reported by the gateway.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModuleInfo {
    /// Address used in state topics (the user MAC).
    pub address: Address,
    /// Factory CAN MAC.
    pub mac: String,
    pub type_code: u8,
    pub module: Option<ModuleType>,
    pub part_number: String,
    pub pcb: u32,
    pub software: u32,
    pub protocol: u32,
    pub produced: String,
    pub name: String,
}

impl ModuleInfo {
    /// `PART [MAC/USERMAC]`
    #[must_use]
    pub fn model(&self) -> String {
        format!("{} [{}/{}]", self.part_number, self.mac, self.address)
    }
}

#[derive(Debug, Deserialize)]
struct RawList {
    #[serde(rename = "s")]
    _status: i64,
    #[serde(rename = "d", default)]
    devices: Vec<RawModule>,
}

#[derive(Debug, Deserialize)]
struct RawModule {
    mac: String,
    user_mac: String,
    typ: u8,
    #[serde(default)]
    pcb: u32,
    #[serde(default)]
    soft_ver: u32,
    #[serde(default)]
    protocol: u32,
    #[serde(default)]
    date_prod: String,
    #[serde(default)]
    name: String,
}

/// Parse the gateway's module list.
///
/// # Errors
///
/// - [`CatalogError::Json`] when the payload is not the expected JSON shape.
/// - [`CatalogError::InvalidAddress`] when an entry's user MAC is not a valid address.
pub fn parse(payload: &[u8]) -> Result<Vec<ModuleInfo>, CatalogError> {
    let list: RawList = serde_json::from_slice(payload)?;
    list.devices.into_iter().map(ModuleInfo::try_from).collect()
}

impl TryFrom<RawModule> for ModuleInfo {
    type Error = CatalogError;

    fn try_from(raw: RawModule) -> Result<Self, Self::Error> {
        let address = Address::parse(&raw.user_mac)
            .map_err(|_| CatalogError::InvalidAddress(raw.user_mac.clone()))?;
        let module = ModuleType::from_type_code(raw.typ);
        let part_number = module.map_or_else(
            || raw.typ.to_string(),
            |module| module.part_number().to_string(),
        );
        Ok(Self {
            address,
            mac: raw.mac.to_ascii_uppercase(),
            type_code: raw.typ,
            module,
            part_number,
            pcb: raw.pcb,
            software: raw.soft_ver,
            protocol: raw.protocol,
            produced: raw.date_prod,
            name: decode_name(&raw.name),
        })
    }
}

fn decode_name(encoded: &str) -> String {
    let Ok(bytes) = base64::engine::general_purpose::STANDARD.decode(encoded.trim()) else {
        return encoded.trim().to_string();
    };
    match String::from_utf8(bytes) {
        Ok(name) => name.trim().to_string(),
        Err(err) => {
            let (name, _) = encoding_rs::WINDOWS_1250.decode_without_bom_handling(err.as_bytes());
            name.trim().to_string()
        }
    }
}

/// Offset of the second bank of items, numbered from 255.
const UPPER_BANK: u16 = 254;

/// Kind of item a module description names.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ItemKind {
    Temperature,
    Flag,
    BinaryInput,
    BinaryOutput,
    AnalogInput,
    AnalogOutput,
}

impl ItemKind {
    /// Resolve a wire type code into the kind and its numbering offset.
    #[must_use]
    pub fn from_code(code: u16) -> Option<(Self, u16)> {
        match code {
            3 => Some((Self::Temperature, 0)),
            6 => Some((Self::Flag, 0)),
            10 => Some((Self::BinaryInput, 0)),
            11 => Some((Self::BinaryInput, UPPER_BANK)),
            12 => Some((Self::BinaryOutput, 0)),
            13 => Some((Self::BinaryOutput, UPPER_BANK)),
            14 => Some((Self::AnalogInput, 0)),
            15 => Some((Self::AnalogInput, UPPER_BANK)),
            16 => Some((Self::AnalogOutput, 0)),
            17 => Some((Self::AnalogOutput, UPPER_BANK)),
            _ => None,
        }
    }

    /// Facets whose channel of the same output carries this item's name.
    #[must_use]
    pub fn facets(self) -> &'static [Facet] {
        match self {
            Self::Temperature => &[Facet::Temperature],
            Self::Flag => &[Facet::Flag],
            Self::BinaryInput => &[Facet::Input],
            Self::BinaryOutput => &[Facet::Switch, Facet::Position, Facet::Tilt, Facet::Motion],
            Self::AnalogInput => &[Facet::Measurement],
            Self::AnalogOutput => &[Facet::Level, Facet::Zone],
        }
    }
}

/// Device class named by a description prefix.
#[must_use]
pub fn device_class(prefix: &str) -> Option<&'static str> {
    let class = match prefix {
        "B" => "battery",
        "BC" => "battery_charging",
        "C" => "cold",
        "CO" => "connectivity",
        "D" => "door",
        "GD" => "garage_door",
        "GA" => "gas",
        "HE" => "heat",
        "L" => "light",
        "LO" => "lock",
        "MI" => "moisture",
        "M" => "motion",
        "MV" => "moving",
        "OC" => "occupancy",
        "O" => "opening",
        "P" => "plug",
        "PW" => "power",
        "PR" => "presence",
        "PB" => "problem",
        "S" => "safety",
        "SO" => "sound",
        "V" => "vibration",
        "W" => "window",
        "OU" => "outlet",
        "T" => "temperature",
        "H" => "humidity",
        "I" => "illuminance",
        "SS" => "signal_strength",
        "PS" => "pressure",
        "TS" => "timestamp",
        "VA" => "valve",
        "G" => "garage",
        "BL" => "blind",
        _ => return None,
    };
    Some(class)
}

/// User-given name of one item of a module.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ItemName {
    pub kind: ItemKind,
    /// 1-based output number, as in state topics.
    pub output: u16,
    pub name: String,
    pub device_class: Option<String>,
}

impl ItemName {
    /// Split a decoded description into its name and optional class prefix.
    ///
    /// Any text before the first `:` is dropped from the name, whether or not
    /// it names a known class.
    #[must_use]
    pub fn new(kind: ItemKind, output: u16, description: &str) -> Self {
        let mut parts = description.split(':');
        let head = parts.next().unwrap_or_default();
        let rest: Vec<&str> = parts.collect();
        let (name, device_class) = if rest.is_empty() {
            (head.to_string(), None)
        } else {
            (rest.concat(), device_class(head).map(str::to_string))
        };
        Self {
            kind,
            output,
            name,
            device_class,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum Code {
    Number(u16),
    Text(String),
}

impl Code {
    fn value(&self) -> Option<u16> {
        match self {
            Self::Number(code) => Some(*code),
            Self::Text(code) => code.trim().parse().ok(),
        }
    }
}

#[derive(Debug, Deserialize)]
struct RawDescriptions {
    #[serde(rename = "s")]
    _status: i64,
    #[serde(rename = "d", default)]
    items: Vec<RawItem>,
}

#[derive(Debug, Deserialize)]
struct RawItem {
    #[serde(rename = "t")]
    kind: Code,
    #[serde(rename = "n")]
    number: Code,
    #[serde(rename = "d")]
    description: String,
}

/// Parse the item descriptions of one module.
///
/// Items of a type the bridge has no channel for are skipped.
///
/// # Errors
///
/// Returns [`CatalogError::Json`] when the payload is not the expected JSON shape.
pub fn parse_descriptions(payload: &[u8]) -> Result<Vec<ItemName>, CatalogError> {
    let raw: RawDescriptions = serde_json::from_slice(payload)?;
    Ok(raw
        .items
        .into_iter()
        .filter_map(|item| {
            let (kind, offset) = item.kind.value().and_then(ItemKind::from_code)?;
            let number = item.number.value()?;
            let output = number.checked_add(offset)?.checked_add(1)?;
            Some(ItemName::new(kind, output, &decode_name(&item.description)))
        })
        .collect())
}

#[derive(Debug, Deserialize)]
struct RawVersion {
    #[serde(default)]
    version: Option<String>,
}

/// Parse the gateway's version reply; `None` when it carries no version.
///
/// # Errors
///
/// Returns [`CatalogError::Json`] when the payload is not a JSON object.
pub fn parse_version(payload: &[u8]) -> Result<Option<String>, CatalogError> {
    let raw: RawVersion = serde_json::from_slice(payload)?;
    Ok(raw.version)
}
