//! Inbound payload decoding.

use crate::error::DecodeError;
use crate::module::{Facet, ModuleType};
use crate::topic::ChannelRef;
use crate::value::{AlarmState, ChannelValue, ColorParts, Motion};

use super::{Decoded, MAX_LEVEL};

/// Decode a raw payload received for `(module, facet, channel)`.
///
/// # Errors
///
/// - [`DecodeError::UnsupportedFacet`] when the module has no such facet.
/// - [`DecodeError::NotUtf8`] when the payload is not text.
/// - [`DecodeError::Malformed`] when the text does not follow the facet encoding.
/// - [`DecodeError::OutOfRange`] when a numeric value exceeds the facet domain.
pub fn decode(
    module: ModuleType,
    facet: Facet,
    channel: ChannelRef,
    payload: &[u8],
) -> Result<Decoded, DecodeError> {
    if !module.supports(facet) {
        return Err(DecodeError::UnsupportedFacet { module, facet });
    }
    let text = std::str::from_utf8(payload).map_err(|_| DecodeError::NotUtf8)?;

    match (module, facet, channel) {
        (_, Facet::Flag, ChannelRef::All) => {
            let mask = text
                .trim()
                .parse::<u32>()
                .map_err(|_| malformed(facet, text))?;
            Ok(Decoded::Bits {
                mask,
                width: module.outputs(Facet::Flag),
            })
        }
        (_, Facet::Switch | Facet::Input | Facet::Flag, _) => {
            bounded(facet, text, 1).map(|raw| Decoded::Single(ChannelValue::Bool(raw == 1)))
        }
        (_, Facet::Level, _) => bounded(facet, text, i64::from(MAX_LEVEL))
            .map(|raw| Decoded::Single(ChannelValue::Level(narrow(raw)))),
        (_, Facet::Position | Facet::Tilt, _) => bounded(facet, text, 100)
            .map(|raw| Decoded::Single(ChannelValue::Percentage(narrow(raw)))),
        (_, Facet::Motion, _) => {
            let raw = bounded(facet, text, 2)?;
            Motion::from_code(narrow(raw))
                .map(|motion| Decoded::Single(ChannelValue::Motion(motion)))
                .ok_or_else(|| malformed(facet, text))
        }
        (_, Facet::Temperature | Facet::Setpoint, _) => {
            float(facet, text).map(|value| Decoded::Single(ChannelValue::Temperature(value)))
        }
        (_, Facet::Measurement, _) => {
            float(facet, text).map(|value| Decoded::Single(ChannelValue::Numeric(value)))
        }
        (_, Facet::Zone, _) => alarm(text).map(|state| Decoded::Single(ChannelValue::Alarm(state))),
        (_, Facet::Color, _) => color(text),
        (_, Facet::Display, _) => Ok(Decoded::Single(ChannelValue::Text(text.to_string()))),
    }
}

/// Expand a module-wide mask into `(output, bit)` pairs.
pub fn unpack_flags(mask: u32, width: u8) -> impl Iterator<Item = (u8, bool)> {
    (1..=width.min(32)).map(move |output| (output, mask & (1 << (output - 1)) != 0))
}

fn malformed(facet: Facet, text: &str) -> DecodeError {
    DecodeError::Malformed {
        facet,
        payload: text.to_string(),
    }
}

fn bounded(facet: Facet, text: &str, max: i64) -> Result<i64, DecodeError> {
    let value = text
        .trim()
        .parse::<i64>()
        .map_err(|_| malformed(facet, text))?;
    if !(0..=max).contains(&value) {
        return Err(DecodeError::OutOfRange { facet, value, max });
    }
    Ok(value)
}

fn narrow<T: TryFrom<i64> + Default>(value: i64) -> T {
    T::try_from(value).unwrap_or_default()
}

fn float(facet: Facet, text: &str) -> Result<f64, DecodeError> {
    text.trim()
        .parse::<f64>()
        .ok()
        .filter(|value| value.is_finite())
        .ok_or_else(|| malformed(facet, text))
}

fn alarm(text: &str) -> Result<AlarmState, DecodeError> {
    let trimmed = text.trim();
    let state = match trimmed.parse::<u8>() {
        Ok(code) => AlarmState::from_code(code),
        Err(_) => AlarmState::from_name(trimmed),
    };
    state.ok_or_else(|| malformed(Facet::Zone, text))
}

fn color(text: &str) -> Result<Decoded, DecodeError> {
    let fields: Vec<&str> = text.trim().split(',').collect();
    if fields.len() > 4 {
        return Err(malformed(Facet::Color, text));
    }

    let mut components = [None; 4];
    for (slot, field) in components.iter_mut().zip(&fields) {
        let field = field.trim();
        if field.is_empty() {
            continue;
        }
        *slot = Some(narrow(bounded(Facet::Color, field, 255)?));
    }

    let [r, g, b, w] = components;
    let parts = ColorParts { r, g, b, w };
    Ok(match parts.complete() {
        Some(rgbw) => Decoded::Single(ChannelValue::Color(rgbw)),
        None => Decoded::PartialColor(parts),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::value::Rgbw;

    fn single(module: ModuleType, facet: Facet, payload: &str) -> ChannelValue {
        match decode(module, facet, ChannelRef::Output(1), payload.as_bytes()).unwrap() {
            Decoded::Single(value) => value,
            other => panic!("expected a single value, got {other:?}"),
        }
    }

    #[test]
    fn should_decode_relay_state() {
        assert_eq!(
            single(ModuleType::RelayPack, Facet::Switch, "1"),
            ChannelValue::Bool(true)
        );
        assert_eq!(
            single(ModuleType::RelayPack, Facet::Input, "0"),
            ChannelValue::Bool(false)
        );
    }

    #[test]
    fn should_reject_non_binary_switch_value() {
        let err = decode(ModuleType::RelayPack, Facet::Switch, ChannelRef::Output(1), b"2")
            .unwrap_err();
        assert!(matches!(err, DecodeError::OutOfRange { max: 1, .. }));
    }

    #[test]
    fn should_reject_out_of_range_dimmer_level() {
        let err = decode(ModuleType::MultiDimmer, Facet::Level, ChannelRef::Output(1), b"300")
            .unwrap_err();
        assert_eq!(
            err,
            DecodeError::OutOfRange {
                facet: Facet::Level,
                value: 300,
                max: 255
            }
        );
    }

    #[test]
    fn should_decode_flag_mask_on_wildcard() {
        let decoded = decode(ModuleType::FlagPanel, Facet::Flag, ChannelRef::All, b"5").unwrap();
        assert_eq!(decoded, Decoded::Bits { mask: 5, width: 32 });
    }

    #[test]
    fn should_unpack_flag_bits_to_outputs() {
        let bits: Vec<_> = unpack_flags(0b101, 3).collect();
        assert_eq!(bits, vec![(1, true), (2, false), (3, true)]);
    }

    #[test]
    fn should_decode_roller_position_and_motion() {
        assert_eq!(
            single(ModuleType::RollerShutter, Facet::Position, "40"),
            ChannelValue::Percentage(40)
        );
        assert_eq!(
            single(ModuleType::RollerShutter, Facet::Motion, "2"),
            ChannelValue::Motion(Motion::Opening)
        );
        assert!(matches!(
            decode(ModuleType::RollerShutter, Facet::Position, ChannelRef::Output(1), b"101"),
            Err(DecodeError::OutOfRange { .. })
        ));
    }

    #[test]
    fn should_decode_sensor_values() {
        assert_eq!(
            single(ModuleType::Sensor, Facet::Temperature, "21.5"),
            ChannelValue::Temperature(21.5)
        );
        assert_eq!(
            single(ModuleType::Sensor, Facet::Measurement, " 1013 "),
            ChannelValue::Numeric(1013.0)
        );
        assert!(matches!(
            decode(ModuleType::Sensor, Facet::Temperature, ChannelRef::Output(1), b"NaN"),
            Err(DecodeError::Malformed { .. })
        ));
    }

    #[test]
    fn should_decode_zone_by_name_or_code() {
        assert_eq!(
            single(ModuleType::SatelController, Facet::Zone, "armed"),
            ChannelValue::Alarm(AlarmState::Armed)
        );
        assert_eq!(
            single(ModuleType::SatelController, Facet::Zone, "4"),
            ChannelValue::Alarm(AlarmState::Triggered)
        );
    }

    #[test]
    fn should_decode_complete_color() {
        assert_eq!(
            single(ModuleType::RgbController, Facet::Color, "10,20,30,40"),
            ChannelValue::Color(Rgbw::rgbw(10, 20, 30, 40))
        );
    }

    #[test]
    fn should_defer_incomplete_color() {
        let decoded =
            decode(ModuleType::RgbController, Facet::Color, ChannelRef::Output(1), b"10,,30")
                .unwrap();
        assert_eq!(
            decoded,
            Decoded::PartialColor(ColorParts {
                r: Some(10),
                g: None,
                b: Some(30),
                w: None
            })
        );
    }

    #[test]
    fn should_reject_color_with_too_many_fields() {
        assert!(matches!(
            decode(ModuleType::RgbController, Facet::Color, ChannelRef::Output(1), b"1,2,3,4,5"),
            Err(DecodeError::Malformed { .. })
        ));
    }

    #[test]
    fn should_keep_display_text_opaque() {
        assert_eq!(
            single(ModuleType::Mdot4, Facet::Display, "Hello 21°"),
            ChannelValue::Text("Hello 21°".to_string())
        );
    }

    #[test]
    fn should_reject_invalid_utf8() {
        let err = decode(ModuleType::Mdot4, Facet::Display, ChannelRef::Output(1), &[0xff, 0xfe])
            .unwrap_err();
        assert_eq!(err, DecodeError::NotUtf8);
    }

    #[test]
    fn should_reject_facet_module_does_not_expose() {
        let err = decode(ModuleType::RelayPack, Facet::Color, ChannelRef::Output(1), b"1")
            .unwrap_err();
        assert!(matches!(err, DecodeError::UnsupportedFacet { .. }));
    }
}
