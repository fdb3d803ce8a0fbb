//! Typed channel values.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::module::ValueKind;

/// Current value of a channel. The variant is fixed by the channel's facet.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum ChannelValue {
    Bool(bool),
    /// 0–100 %.
    Percentage(u8),
    /// 0–255 brightness. Wider on input so out-of-range targets can be clamped.
    Level(u16),
    Color(Rgbw),
    /// Degrees Celsius.
    Temperature(f64),
    Numeric(f64),
    Alarm(AlarmState),
    Motion(Motion),
    Text(String),
}

impl ChannelValue {
    #[must_use]
    pub fn kind(&self) -> ValueKind {
        match self {
            Self::Bool(_) => ValueKind::Bool,
            Self::Percentage(_) => ValueKind::Percentage,
            Self::Level(_) => ValueKind::Level,
            Self::Color(_) => ValueKind::Color,
            Self::Temperature(_) => ValueKind::Temperature,
            Self::Numeric(_) => ValueKind::Numeric,
            Self::Alarm(_) => ValueKind::Alarm,
            Self::Motion(_) => ValueKind::Motion,
            Self::Text(_) => ValueKind::Text,
        }
    }

    /// Whether an observed value corroborates a commanded target.
    ///
    /// Hardware feedback resolution may be coarser than command resolution,
    /// so percentages, levels and temperatures are compared with a tolerance.
    #[must_use]
    pub fn approximates(&self, target: &Self, tolerances: &Tolerances) -> bool {
        match (self, target) {
            (Self::Percentage(a), Self::Percentage(b)) => a.abs_diff(*b) <= tolerances.percentage,
            (Self::Level(a), Self::Level(b)) => a.abs_diff(*b) <= tolerances.level,
            (Self::Temperature(a), Self::Temperature(b)) => {
                (a - b).abs() <= tolerances.temperature + f64::EPSILON * 16.0
            }
            _ => self == target,
        }
    }
}

impl fmt::Display for ChannelValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Bool(value) => write!(f, "{}", if *value { "on" } else { "off" }),
            Self::Percentage(value) => write!(f, "{value}%"),
            Self::Level(value) => write!(f, "{value}"),
            Self::Color(rgbw) => write!(f, "{rgbw}"),
            Self::Temperature(value) => write!(f, "{value}°C"),
            Self::Numeric(value) => write!(f, "{value}"),
            Self::Alarm(state) => write!(f, "{state}"),
            Self::Motion(motion) => write!(f, "{motion}"),
            Self::Text(text) => write!(f, "{text:?}"),
        }
    }
}

/// Red, green, blue and optional white components.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Rgbw {
    pub r: u8,
    pub g: u8,
    pub b: u8,
    pub w: Option<u8>,
}

impl Rgbw {
    #[must_use]
    pub fn rgb(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b, w: None }
    }

    #[must_use]
    pub fn rgbw(r: u8, g: u8, b: u8, w: u8) -> Self {
        Self { r, g, b, w: Some(w) }
    }
}

impl fmt::Display for Rgbw {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{},{},{}", self.r, self.g, self.b)?;
        if let Some(w) = self.w {
            write!(f, ",{w}")?;
        }
        Ok(())
    }
}

/// Colour components received so far. A colour is only applied once red,
/// green and blue are all known.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ColorParts {
    pub r: Option<u8>,
    pub g: Option<u8>,
    pub b: Option<u8>,
    pub w: Option<u8>,
}

impl ColorParts {
    /// Overlay the components present in `newer`.
    #[must_use]
    pub fn merge(self, newer: Self) -> Self {
        Self {
            r: newer.r.or(self.r),
            g: newer.g.or(self.g),
            b: newer.b.or(self.b),
            w: newer.w.or(self.w),
        }
    }

    #[must_use]
    pub fn complete(&self) -> Option<Rgbw> {
        Some(Rgbw {
            r: self.r?,
            g: self.g?,
            b: self.b?,
            w: self.w,
        })
    }
}

/// Satel zone state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AlarmState {
    Disarmed,
    Armed,
    Arming,
    Pending,
    Triggered,
}

impl AlarmState {
    const ALL: [Self; 5] = [
        Self::Disarmed,
        Self::Armed,
        Self::Arming,
        Self::Pending,
        Self::Triggered,
    ];

    #[must_use]
    pub fn name(self) -> &'static str {
        match self {
            Self::Disarmed => "disarmed",
            Self::Armed => "armed",
            Self::Arming => "arming",
            Self::Pending => "pending",
            Self::Triggered => "triggered",
        }
    }

    #[must_use]
    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL
            .into_iter()
            .find(|state| state.name().eq_ignore_ascii_case(name))
    }

    #[must_use]
    pub fn from_code(code: u8) -> Option<Self> {
        Self::ALL.get(usize::from(code)).copied()
    }
}

impl fmt::Display for AlarmState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Roller travel direction, matching the firmware's stop/close/open vocabulary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Motion {
    Stopped,
    Closing,
    Opening,
}

impl Motion {
    #[must_use]
    pub fn code(self) -> u8 {
        match self {
            Self::Stopped => 0,
            Self::Closing => 1,
            Self::Opening => 2,
        }
    }

    #[must_use]
    pub fn from_code(code: u8) -> Option<Self> {
        match code {
            0 => Some(Self::Stopped),
            1 => Some(Self::Closing),
            2 => Some(Self::Opening),
            _ => None,
        }
    }
}

impl fmt::Display for Motion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Stopped => "stopped",
            Self::Closing => "closing",
            Self::Opening => "opening",
        })
    }
}

/// Acknowledgement tolerances used when matching feedback against targets.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Tolerances {
    /// Percentage points for position and tilt.
    pub percentage: u8,
    /// Brightness steps.
    pub level: u16,
    /// Degrees Celsius.
    pub temperature: f64,
}

impl Default for Tolerances {
    fn default() -> Self {
        Self {
            percentage: 1,
            level: 1,
            temperature: 0.1,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn should_accept_position_within_tolerance() {
        let tolerances = Tolerances::default();
        let target = ChannelValue::Percentage(100);
        assert!(ChannelValue::Percentage(99).approximates(&target, &tolerances));
        assert!(!ChannelValue::Percentage(98).approximates(&target, &tolerances));
    }

    #[test]
    fn should_accept_temperature_within_tenth_of_degree() {
        let tolerances = Tolerances::default();
        let target = ChannelValue::Temperature(21.5);
        assert!(ChannelValue::Temperature(21.4).approximates(&target, &tolerances));
        assert!(!ChannelValue::Temperature(21.3).approximates(&target, &tolerances));
    }

    #[test]
    fn should_require_exact_match_for_booleans() {
        let tolerances = Tolerances::default();
        assert!(ChannelValue::Bool(true).approximates(&ChannelValue::Bool(true), &tolerances));
        assert!(!ChannelValue::Bool(false).approximates(&ChannelValue::Bool(true), &tolerances));
    }

    #[test]
    fn should_complete_color_across_messages() {
        let first = ColorParts {
            r: Some(10),
            g: Some(20),
            ..ColorParts::default()
        };
        assert!(first.complete().is_none());

        let merged = first.merge(ColorParts {
            b: Some(30),
            ..ColorParts::default()
        });
        assert_eq!(merged.complete(), Some(Rgbw::rgb(10, 20, 30)));
    }

    #[test]
    fn should_prefer_newer_components_when_merging() {
        let older = ColorParts {
            r: Some(1),
            g: Some(2),
            b: Some(3),
            w: None,
        };
        let newer = ColorParts {
            r: Some(9),
            ..ColorParts::default()
        };
        assert_eq!(older.merge(newer).complete(), Some(Rgbw::rgb(9, 2, 3)));
    }

    #[test]
    fn should_parse_alarm_state_by_name_and_code() {
        assert_eq!(AlarmState::from_name("Armed"), Some(AlarmState::Armed));
        assert_eq!(AlarmState::from_code(4), Some(AlarmState::Triggered));
        assert_eq!(AlarmState::from_code(5), None);
    }

    #[test]
    fn should_serialize_value_with_kind_tag() {
        let json = serde_json::to_value(ChannelValue::Percentage(40)).unwrap();
        assert_eq!(json, serde_json::json!({"kind": "percentage", "value": 40}));
    }
}
