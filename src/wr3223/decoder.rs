//! Decoders for the bitfield registers (`Ta`, `Tf`, `RL`, `ER`) and for
//! plain catalog reads.
//!
//! Nothing in here does I/O. A payload that doesn't parse yields
//! [`DriverError::Decode`] and the caller drops just that field.

use crate::error::DriverError;
use crate::wr3223::catalog::{CommandSpec, CommandType, ValueKind};
use crate::wr3223::commands::Wr3223Command;
use crate::wr3223::value::Value;

const STATUS_MASK: i32 = 0b111_0000;

/// Trim, cut off a fractional suffix (`"12.0"` becomes `"12"`) and parse as an integer.
pub fn parse_integer(command: Wr3223Command, payload: &str) -> Result<i32, DriverError> {
    let trimmed = payload.trim();
    let integer = match trimmed.find('.') {
        Some(dot) if dot > 0 => &trimmed[..dot],
        _ => trimmed,
    };

    integer.trim().parse().map_err(|_| DriverError::Decode {
        command,
        payload: payload.to_string(),
    })
}

fn is_bit_set(value: i32, mask: i32) -> bool {
    value & mask == mask
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct DecodedStatus {
    pub malfunction: bool,
    pub heat_pump_running: bool,
    pub additional_heater_running: bool,
}

impl DecodedStatus {
    /// The controller reports `Ta` negated, so the sign is flipped before masking.
    pub fn decode(payload: &str) -> Result<Self, DriverError> {
        let value = parse_integer(Wr3223Command::Ta, payload)?.wrapping_neg() & STATUS_MASK;

        Ok(Self {
            malfunction: is_bit_set(value, 16),
            heat_pump_running: is_bit_set(value, 32),
            additional_heater_running: is_bit_set(value, 64),
        })
    }

    pub fn flags(&self) -> [(CommandType, bool); 3] {
        [
            (CommandType::Malfunction, self.malfunction),
            (CommandType::HeatPumpStatus, self.heat_pump_running),
            (CommandType::AdditionalHeaterStatus, self.additional_heater_running),
        ]
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct DecodedEvuBlockade {
    pub blockade: bool,
}

impl DecodedEvuBlockade {
    pub fn decode(payload: &str) -> Result<Self, DriverError> {
        let value = parse_integer(Wr3223Command::Tf, payload)?.wrapping_neg();

        Ok(Self {
            blockade: is_bit_set(value, 1),
        })
    }

    pub fn flags(&self) -> [(CommandType, bool); 1] {
        [(CommandType::EvuBlockade, self.blockade)]
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct DecodedRelay {
    pub compressor: bool,
    pub additional_heater: bool,
    pub earth_heat_exchanger: bool,
    pub bypass: bool,
    pub preheating_radiator: bool,
    pub bypass_relay: bool,
    pub control_device_active: bool,
    pub remote_interface_active: bool,
    pub ventilation_level_available: bool,
    pub warm_water_post_heater: bool,
    pub magnet_valve: bool,
    pub preheating_radiator_active: bool,
}

impl DecodedRelay {
    pub fn decode(payload: &str) -> Result<Self, DriverError> {
        let value = parse_integer(Wr3223Command::RL, payload)?;

        Ok(Self {
            compressor: is_bit_set(value, 1),
            additional_heater: is_bit_set(value, 2),
            earth_heat_exchanger: is_bit_set(value, 4),
            bypass: is_bit_set(value, 8),
            preheating_radiator: is_bit_set(value, 16),
            bypass_relay: is_bit_set(value, 32),
            control_device_active: is_bit_set(value, 64),
            remote_interface_active: is_bit_set(value, 128),
            ventilation_level_available: is_bit_set(value, 256),
            warm_water_post_heater: is_bit_set(value, 512),
            magnet_valve: is_bit_set(value, 2048),
            preheating_radiator_active: is_bit_set(value, 4096),
        })
    }

    /// A local control panel has taken over; the driver must not write.
    pub fn manual_override(&self) -> bool {
        self.control_device_active
    }

    /// Flags as published. The bypass contact is active-low so it goes out inverted.
    pub fn flags(&self) -> [(CommandType, bool); 12] {
        [
            (CommandType::Compressor, self.compressor),
            (CommandType::AdditionalHeaterRelay, self.additional_heater),
            (CommandType::EarthHeatExchanger, self.earth_heat_exchanger),
            (CommandType::Bypass, !self.bypass),
            (CommandType::PreheatingRadiator, self.preheating_radiator),
            (CommandType::BypassRelay, self.bypass_relay),
            (CommandType::ControlDeviceActive, self.control_device_active),
            (CommandType::RemoteInterfaceActive, self.remote_interface_active),
            (CommandType::VentilationLevelAvailable, self.ventilation_level_available),
            (CommandType::WarmWaterPostHeater, self.warm_water_post_heater),
            (CommandType::MagnetValve, self.magnet_valve),
            (CommandType::PreheatingRadiatorActive, self.preheating_radiator_active),
        ]
    }
}

// Error codes are tested with a plain AND against each code. Several codes
// share bits (132 = 128 + 4) so one raw value can raise more than one flag.
const ERROR_CODES: [(CommandType, i32); 13] = [
    (CommandType::ErrorTempSensorShort, 1),
    (CommandType::ErrorOffset, 2),
    (CommandType::ErrorTempSensorInterrupt, 3),
    (CommandType::ErrorHighPressure, 4),
    (CommandType::ErrorSysRam, 61),
    (CommandType::ErrorSysRom, 62),
    (CommandType::ErrorSysEe, 65),
    (CommandType::ErrorSysIo, 66),
    (CommandType::ErrorSys67Ad, 67),
    (CommandType::ErrorSupplyAir, 128),
    (CommandType::ErrorOutgoingAir, 132),
    (CommandType::ErrorCondenser, 130),
    (CommandType::ErrorPreheating, 133),
];

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct DecodedError {
    raw: i32,
}

impl DecodedError {
    pub fn decode(payload: &str) -> Result<Self, DriverError> {
        Ok(Self {
            raw: parse_integer(Wr3223Command::ER, payload)?,
        })
    }

    pub fn is_set(&self, flag: CommandType) -> bool {
        ERROR_CODES
            .iter()
            .any(|(t, code)| *t == flag && is_bit_set(self.raw, *code))
    }

    pub fn flags(&self) -> [(CommandType, bool); 13] {
        ERROR_CODES.map(|(t, code)| (t, is_bit_set(self.raw, code)))
    }
}

/// Decode a plain register read according to its catalog entry.
pub fn decode_value(spec: &CommandSpec, payload: &str) -> Result<Value, DriverError> {
    let trimmed = payload.trim();
    match spec.kind {
        ValueKind::Numeric => trimmed
            .parse::<f64>()
            .ok()
            .filter(|n| n.is_finite())
            .map(Value::Number)
            .ok_or_else(|| DriverError::Decode {
                command: spec.command,
                payload: payload.to_string(),
            }),
        ValueKind::Boolean => Ok(Value::Switch(
            trimmed.eq_ignore_ascii_case("true") || trimmed == "1" || trimmed == "1.",
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn integer_parsing_strips_fraction() {
        assert_eq!(parse_integer(Wr3223Command::T1, " 12.0 ").unwrap(), 12);
        assert_eq!(parse_integer(Wr3223Command::T1, "-48.").unwrap(), -48);
        assert_eq!(parse_integer(Wr3223Command::T1, "7").unwrap(), 7);
        // leading dot is not a fractional suffix
        assert!(parse_integer(Wr3223Command::T1, ".5").is_err());
        assert!(matches!(
            parse_integer(Wr3223Command::RL, "abc"),
            Err(DriverError::Decode { command: Wr3223Command::RL, .. })
        ));
    }

    #[test]
    fn status_is_negated_and_masked() {
        let status = DecodedStatus::decode("-48").unwrap();
        assert!(status.malfunction);
        assert!(status.heat_pump_running);
        assert!(!status.additional_heater_running);

        // bits outside the mask are ignored
        let status = DecodedStatus::decode("-64.0").unwrap();
        assert_eq!(
            status,
            DecodedStatus {
                additional_heater_running: true,
                ..Default::default()
            }
        );
        assert_eq!(DecodedStatus::decode("-15").unwrap(), DecodedStatus::default());
    }

    #[test]
    fn relay_bits() {
        let relay = DecodedRelay::decode("9").unwrap();
        assert_eq!(
            relay,
            DecodedRelay {
                compressor: true,
                bypass: true,
                ..Default::default()
            }
        );
        assert!(!relay.manual_override());

        let relay = DecodedRelay::decode("64").unwrap();
        assert!(relay.manual_override());

        let relay = DecodedRelay::decode("6144").unwrap();
        assert!(relay.magnet_valve);
        assert!(relay.preheating_radiator_active);
        assert!(!relay.compressor);
    }

    #[test]
    fn relay_flags_invert_bypass() {
        let flags = DecodedRelay::decode("0").unwrap().flags();
        assert!(flags.contains(&(CommandType::Bypass, true)));
        assert!(flags.contains(&(CommandType::Compressor, false)));

        let flags = DecodedRelay::decode("8").unwrap().flags();
        assert!(flags.contains(&(CommandType::Bypass, false)));
    }

    #[test]
    fn error_codes_overlap() {
        let error = DecodedError::decode("132").unwrap();
        assert!(error.is_set(CommandType::ErrorOutgoingAir));
        assert!(error.is_set(CommandType::ErrorSupplyAir));
        assert!(error.is_set(CommandType::ErrorHighPressure));
        assert!(!error.is_set(CommandType::ErrorCondenser));
        assert!(!error.is_set(CommandType::ErrorTempSensorShort));

        let error = DecodedError::decode("130").unwrap();
        assert!(error.is_set(CommandType::ErrorCondenser));
        assert!(error.is_set(CommandType::ErrorOffset));
        assert!(!error.is_set(CommandType::ErrorOutgoingAir));

        let error = DecodedError::decode("0").unwrap();
        assert!(error.flags().iter().all(|(_, set)| !set));
    }

    #[test]
    fn evu_blockade() {
        assert!(DecodedEvuBlockade::decode("-1").unwrap().blockade);
        assert!(!DecodedEvuBlockade::decode("0").unwrap().blockade);
    }

    #[test]
    fn plain_values() {
        let temperature = CommandType::TemperatureOutside.spec();
        assert_eq!(decode_value(temperature, " 21.5").unwrap(), Value::Number(21.5));
        assert!(decode_value(temperature, "x").is_err());

        let heat_pump = CommandType::HeatPumpOpen.spec();
        assert_eq!(decode_value(heat_pump, "1.").unwrap(), Value::Switch(true));
        assert_eq!(decode_value(heat_pump, "TRUE").unwrap(), Value::Switch(true));
        assert_eq!(decode_value(heat_pump, "0").unwrap(), Value::Switch(false));
    }
}
