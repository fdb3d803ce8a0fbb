//! Outbound command encoding.

use std::fmt::Write as _;

use crate::error::EncodeError;
use crate::module::{ChannelSlot, Facet, ModuleType};
use crate::topic::ChannelRef;
use crate::value::{AlarmState, ChannelValue, Motion};

use super::{CommandTarget, Encoded, MAX_LEVEL};

/// Lowest accepted thermostat setpoint, °C.
pub const SETPOINT_MIN: f64 = 5.0;
/// Highest accepted thermostat setpoint, °C.
pub const SETPOINT_MAX: f64 = 35.0;

const ROLLER_POSITION_FRAME: &str = "0001";
const ROLLER_TILT_FRAME: &str = "0002";
/// Keeps the slats where they are while the roller travels.
const ROLLER_KEEP_TILT: u8 = 0x66;
const SATEL_ARM_FRAME: &str = "1E0080";
const SATEL_DISARM_FRAME: &str = "1E0084";

/// Validate a target for `(module, facet)` and bring it into its domain.
///
/// Levels above 255 are clamped; every other out-of-domain target is rejected.
///
/// # Errors
///
/// - [`EncodeError::UnsupportedFacet`] when the module has no such facet.
/// - [`EncodeError::ReadOnly`] for sensor facets.
/// - [`EncodeError::KindMismatch`] when the value is not of the facet's kind.
/// - [`EncodeError::OutOfDomain`] for percentages above 100 and setpoints
///   outside `SETPOINT_MIN..=SETPOINT_MAX`.
/// - [`EncodeError::Unsupported`] for zone states other than armed/disarmed.
pub fn normalize(
    module: ModuleType,
    facet: Facet,
    value: ChannelValue,
) -> Result<ChannelValue, EncodeError> {
    if !module.supports(facet) {
        return Err(EncodeError::UnsupportedFacet { module, facet });
    }
    if !facet.is_writable() {
        return Err(EncodeError::ReadOnly(facet));
    }
    if value.kind() != facet.kind() {
        return Err(EncodeError::KindMismatch {
            facet,
            expected: facet.kind(),
            actual: value.kind(),
        });
    }

    match value {
        ChannelValue::Level(level) => Ok(ChannelValue::Level(level.min(MAX_LEVEL))),
        ChannelValue::Percentage(pct) if pct > 100 => Err(EncodeError::OutOfDomain {
            facet,
            value: value.to_string(),
        }),
        ChannelValue::Temperature(t) if !(SETPOINT_MIN..=SETPOINT_MAX).contains(&t) => {
            Err(EncodeError::OutOfDomain {
                facet,
                value: value.to_string(),
            })
        }
        ChannelValue::Alarm(state)
            if !matches!(state, AlarmState::Armed | AlarmState::Disarmed) =>
        {
            Err(EncodeError::Unsupported {
                facet,
                value: value.to_string(),
            })
        }
        other => Ok(other),
    }
}

/// Encode a target for one channel into a module command.
///
/// `current` is the device's full channel vector, indexed like
/// [`ModuleType::slots`]. It is read for bit-packed facets, which are always
/// sent whole, and for dimmers switching back on to their last level.
///
/// # Errors
///
/// Returns the [`EncodeError`] of [`normalize`].
pub fn encode(
    module: ModuleType,
    slot: ChannelSlot,
    value: &ChannelValue,
    current: &[Option<ChannelValue>],
) -> Result<Encoded, EncodeError> {
    let value = normalize(module, slot.facet, value.clone())?;
    let output = ChannelRef::Output(slot.output);
    let on_channel = |facet: Facet, payload: String| Encoded {
        target: CommandTarget::Channel {
            channel: output,
            facet,
        },
        payload,
    };
    let raw = |payload: String| Encoded {
        target: CommandTarget::Raw,
        payload,
    };

    let encoded = match (slot.facet, value) {
        (Facet::Flag, ChannelValue::Bool(on)) => {
            let bit = 1u32 << (slot.output - 1);
            let mask = pack_flags(module, current);
            let mask = if on { mask | bit } else { mask & !bit };
            Encoded {
                target: CommandTarget::Channel {
                    channel: ChannelRef::All,
                    facet: Facet::Flag,
                },
                payload: mask.to_string(),
            }
        }
        (Facet::Switch, ChannelValue::Bool(on)) if module.is_dimmer() => {
            let level = if on { resume_level(module, slot, current) } else { 0 };
            on_channel(Facet::Level, level.to_string())
        }
        (Facet::Switch, ChannelValue::Bool(on)) => on_channel(Facet::Switch, bit(on).to_string()),
        (Facet::Level, ChannelValue::Level(level)) => on_channel(Facet::Level, level.to_string()),
        (Facet::Position, ChannelValue::Percentage(100)) => {
            on_channel(Facet::Motion, Motion::Opening.code().to_string())
        }
        (Facet::Position, ChannelValue::Percentage(0)) => {
            on_channel(Facet::Motion, Motion::Closing.code().to_string())
        }
        (Facet::Position, ChannelValue::Percentage(pct)) => raw(format!(
            "{ROLLER_POSITION_FRAME}{:02x}{pct:02x}{ROLLER_KEEP_TILT:02x}",
            output_mask(slot)
        )),
        (Facet::Tilt, ChannelValue::Percentage(pct)) => raw(format!(
            "{ROLLER_TILT_FRAME}{:02x}{pct:02x}",
            output_mask(slot)
        )),
        (Facet::Motion, ChannelValue::Motion(motion)) => {
            on_channel(Facet::Motion, motion.code().to_string())
        }
        (Facet::Setpoint, ChannelValue::Temperature(t)) => {
            on_channel(Facet::Setpoint, format!("{t:.1}"))
        }
        (Facet::Color, ChannelValue::Color(rgbw)) => on_channel(Facet::Color, rgbw.to_string()),
        (Facet::Zone, ChannelValue::Alarm(state)) => {
            let frame = if state == AlarmState::Armed {
                SATEL_ARM_FRAME
            } else {
                SATEL_DISARM_FRAME
            };
            raw(format!("{frame}{}", zone_mask(slot)))
        }
        (Facet::Display, ChannelValue::Text(text)) => on_channel(Facet::Display, text),
        (facet, value) => {
            return Err(EncodeError::Unsupported {
                facet,
                value: value.to_string(),
            });
        }
    };
    Ok(encoded)
}

fn bit(on: bool) -> u8 {
    u8::from(on)
}

/// Repack the known flag bits; unknown bits are sent as cleared.
fn pack_flags(module: ModuleType, current: &[Option<ChannelValue>]) -> u32 {
    module
        .slots()
        .filter(|slot| slot.facet == Facet::Flag)
        .filter(|slot| matches!(current.get(slot.index), Some(Some(ChannelValue::Bool(true)))))
        .fold(0, |mask, slot| mask | (1u32 << (slot.output - 1)))
}

fn resume_level(module: ModuleType, slot: ChannelSlot, current: &[Option<ChannelValue>]) -> u16 {
    module
        .slot_of(Facet::Level, slot.output)
        .and_then(|level| current.get(level.index))
        .and_then(|value| match value {
            Some(ChannelValue::Level(level)) if *level > 0 => Some((*level).min(MAX_LEVEL)),
            _ => None,
        })
        .unwrap_or(MAX_LEVEL)
}

fn output_mask(slot: ChannelSlot) -> u8 {
    1u8.checked_shl(u32::from(slot.output) - 1).unwrap_or(0)
}

/// Zone bit as four little-endian bytes, upper-case hex.
fn zone_mask(slot: ChannelSlot) -> String {
    let mask = 1u32.checked_shl(u32::from(slot.output) - 1).unwrap_or(0);
    mask.to_le_bytes()
        .iter()
        .fold(String::with_capacity(8), |mut out, byte| {
            let _ = write!(out, "{byte:02X}");
            out
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::{Decoded, decode};
    use crate::value::Rgbw;

    fn slot(module: ModuleType, facet: Facet, output: u8) -> ChannelSlot {
        module.slot_of(facet, output).unwrap()
    }

    fn unknown(module: ModuleType) -> Vec<Option<ChannelValue>> {
        vec![None; module.channel_count()]
    }

    #[test]
    fn should_open_roller_when_target_is_fully_open() {
        let module = ModuleType::RollerShutter;
        let encoded = encode(
            module,
            slot(module, Facet::Position, 2),
            &ChannelValue::Percentage(100),
            &unknown(module),
        )
        .unwrap();
        assert_eq!(
            encoded.target,
            CommandTarget::Channel {
                channel: ChannelRef::Output(2),
                facet: Facet::Motion
            }
        );
        assert_eq!(encoded.payload, "2");
    }

    #[test]
    fn should_close_roller_when_target_is_zero() {
        let module = ModuleType::RollerShutter;
        let encoded = encode(
            module,
            slot(module, Facet::Position, 1),
            &ChannelValue::Percentage(0),
            &unknown(module),
        )
        .unwrap();
        assert_eq!(encoded.payload, "1");
    }

    #[test]
    fn should_send_raw_frame_for_intermediate_position() {
        let module = ModuleType::RollerShutter;
        let encoded = encode(
            module,
            slot(module, Facet::Position, 3),
            &ChannelValue::Percentage(40),
            &unknown(module),
        )
        .unwrap();
        assert_eq!(encoded.target, CommandTarget::Raw);
        assert_eq!(encoded.payload, "0001042866");
    }

    #[test]
    fn should_send_raw_frame_for_tilt() {
        let module = ModuleType::RollerShutter;
        let encoded = encode(
            module,
            slot(module, Facet::Tilt, 1),
            &ChannelValue::Percentage(100),
            &unknown(module),
        )
        .unwrap();
        assert_eq!(encoded.payload, "00020164");
    }

    #[test]
    fn should_merge_flag_bit_into_current_mask() {
        let module = ModuleType::FlagPanel;
        let mut current = unknown(module);
        current[0] = Some(ChannelValue::Bool(true));
        current[1] = Some(ChannelValue::Bool(false));
        current[2] = Some(ChannelValue::Bool(true));

        let encoded = encode(
            module,
            slot(module, Facet::Flag, 2),
            &ChannelValue::Bool(true),
            &current,
        )
        .unwrap();
        assert_eq!(
            encoded.target,
            CommandTarget::Channel {
                channel: ChannelRef::All,
                facet: Facet::Flag
            }
        );
        assert_eq!(encoded.payload, "7");
    }

    #[test]
    fn should_clear_flag_bit_without_touching_others() {
        let module = ModuleType::FlagPanel;
        let mut current = unknown(module);
        current[0] = Some(ChannelValue::Bool(true));
        current[2] = Some(ChannelValue::Bool(true));

        let encoded = encode(
            module,
            slot(module, Facet::Flag, 1),
            &ChannelValue::Bool(false),
            &current,
        )
        .unwrap();
        assert_eq!(encoded.payload, "4");
    }

    #[test]
    fn should_clamp_dimmer_level() {
        let module = ModuleType::MultiDimmer;
        let encoded = encode(
            module,
            slot(module, Facet::Level, 1),
            &ChannelValue::Level(300),
            &unknown(module),
        )
        .unwrap();
        assert_eq!(encoded.payload, "255");
    }

    #[test]
    fn should_resume_last_level_when_dimmer_switched_on() {
        let module = ModuleType::MultiDimmer;
        let mut current = unknown(module);
        let level = slot(module, Facet::Level, 2);
        current[level.index] = Some(ChannelValue::Level(80));

        let encoded = encode(
            module,
            slot(module, Facet::Switch, 2),
            &ChannelValue::Bool(true),
            &current,
        )
        .unwrap();
        assert_eq!(
            encoded.target,
            CommandTarget::Channel {
                channel: ChannelRef::Output(2),
                facet: Facet::Level
            }
        );
        assert_eq!(encoded.payload, "80");
    }

    #[test]
    fn should_use_full_level_when_dimmer_was_off() {
        let module = ModuleType::SingleDimmer;
        let mut current = unknown(module);
        current[1] = Some(ChannelValue::Level(0));
        let encoded = encode(
            module,
            slot(module, Facet::Switch, 1),
            &ChannelValue::Bool(true),
            &current,
        )
        .unwrap();
        assert_eq!(encoded.payload, "255");
    }

    #[test]
    fn should_arm_and_disarm_satel_zone() {
        let module = ModuleType::SatelController;
        let zone = slot(module, Facet::Zone, 9);
        let armed = encode(
            module,
            zone,
            &ChannelValue::Alarm(AlarmState::Armed),
            &unknown(module),
        )
        .unwrap();
        assert_eq!(armed.target, CommandTarget::Raw);
        assert_eq!(armed.payload, "1E008000010000");

        let disarmed = encode(
            module,
            zone,
            &ChannelValue::Alarm(AlarmState::Disarmed),
            &unknown(module),
        )
        .unwrap();
        assert_eq!(disarmed.payload, "1E008400010000");
    }

    #[test]
    fn should_reject_triggering_a_zone() {
        let err = normalize(
            ModuleType::SatelController,
            Facet::Zone,
            ChannelValue::Alarm(AlarmState::Triggered),
        )
        .unwrap_err();
        assert!(matches!(err, EncodeError::Unsupported { .. }));
    }

    #[test]
    fn should_reject_setpoint_outside_domain() {
        let err = normalize(
            ModuleType::Thermostat,
            Facet::Setpoint,
            ChannelValue::Temperature(40.0),
        )
        .unwrap_err();
        assert!(matches!(err, EncodeError::OutOfDomain { .. }));
    }

    #[test]
    fn should_reject_read_only_facet() {
        let err = normalize(ModuleType::RelayPack, Facet::Input, ChannelValue::Bool(true))
            .unwrap_err();
        assert_eq!(err, EncodeError::ReadOnly(Facet::Input));
    }

    #[test]
    fn should_reject_value_of_wrong_kind() {
        let err = normalize(
            ModuleType::RollerShutter,
            Facet::Position,
            ChannelValue::Bool(true),
        )
        .unwrap_err();
        assert!(matches!(err, EncodeError::KindMismatch { .. }));
    }

    #[test]
    fn should_reject_percentage_above_hundred() {
        let err = normalize(
            ModuleType::RollerShutter,
            Facet::Tilt,
            ChannelValue::Percentage(101),
        )
        .unwrap_err();
        assert!(matches!(err, EncodeError::OutOfDomain { .. }));
    }

    #[test]
    fn should_roundtrip_channel_addressed_facets() {
        let cases = [
            (ModuleType::RelayPack, Facet::Switch, ChannelValue::Bool(true)),
            (ModuleType::MultiDimmer, Facet::Level, ChannelValue::Level(128)),
            (
                ModuleType::RollerShutter,
                Facet::Motion,
                ChannelValue::Motion(Motion::Stopped),
            ),
            (
                ModuleType::Thermostat,
                Facet::Setpoint,
                ChannelValue::Temperature(21.5),
            ),
            (
                ModuleType::RgbController,
                Facet::Color,
                ChannelValue::Color(Rgbw::rgbw(1, 2, 3, 4)),
            ),
            (
                ModuleType::Mdot9,
                Facet::Display,
                ChannelValue::Text("Salon".to_string()),
            ),
        ];

        for (module, facet, value) in cases {
            let target = slot(module, facet, 1);
            let encoded = encode(module, target, &value, &unknown(module)).unwrap();
            let CommandTarget::Channel { channel, facet } = encoded.target else {
                panic!("{module} {facet} should address a channel");
            };
            let decoded = decode(module, facet, channel, encoded.payload.as_bytes()).unwrap();
            assert_eq!(decoded, Decoded::Single(value), "{module} {facet}");
        }
    }
}
