use crate::error::DriverError;
use crate::wr3223::commands::Wr3223Command;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Direction {
    Read,
    Write,
    ReadWrite,
}

impl Direction {
    pub fn readable(&self) -> bool {
        matches!(self, Direction::Read | Direction::ReadWrite)
    }

    pub fn writable(&self) -> bool {
        matches!(self, Direction::Write | Direction::ReadWrite)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ValueKind {
    Numeric,
    Boolean,
}

impl std::fmt::Display for ValueKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ValueKind::Numeric => write!(f, "numeric"),
            ValueKind::Boolean => write!(f, "boolean"),
        }
    }
}

/// Logical values exposed by the bridge.
///
/// Discriminants index into [`CATALOG`], keep both in the same order.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum CommandType {
    // registers
    TemperatureEvaporator,
    TemperatureCondenser,
    TemperatureOutside,
    TemperatureOutgoingAir,
    TemperatureAfterHeatExchanger,
    TemperatureSupplyAir,
    TemperatureAfterBrinePreheating,
    TemperatureAfterPreheating,
    VentilationLevel,
    RotationSpeedSupplyAirMotor,
    RotationSpeedExhaustAirMotor,
    OperationMode,
    TemperatureSupplyAirTarget,
    HeatFeedbackRate,
    SpeedDeviationMaxLevel1,
    SpeedDeviationMaxLevel2,
    SpeedDeviationMaxLevel3,
    SpeedIncreaseEarthHeatExchangerLevel1,
    SpeedIncreaseEarthHeatExchangerLevel2,
    SpeedIncreaseEarthHeatExchangerLevel3,
    AirExchangeDecreaseOutsideTemperature,
    VentilationSpeedLevel1,
    VentilationSpeedLevel2,
    VentilationSpeedLevel3,
    SummerEarthHeatExchangerActivationTemperature,
    WinterEarthHeatExchangerActivationTemperature,
    DefrostingStartTemperature,
    DefrostingEndTemperature,
    DefrostingVentilationLevel,
    DefrostingHoldOffTime,
    DefrostingOvertravelTime,
    DefrostingHeatFeedbackRate,
    SolarMax,
    SolarUsage,
    DeltaTOff,
    DeltaTOn,
    TemperatureCondenserMax,
    IdleTimePressureReduction,
    SupportFanLevel1EarthHeatExchanger,
    SupportFanLevel2EarthHeatExchanger,
    SupportFanLevel3EarthHeatExchanger,
    ControlVoltageOutgoingAir,
    ControlVoltageSupplyAir,
    WarmWaterTargetTemperature,
    HeatPumpOpen,
    AdditionalHeaterOpen,

    // keep-alive fields
    HeatPumpActivate,
    AdditionalHeaterActivate,
    CoolingModeActivate,

    // Ta
    Malfunction,
    HeatPumpStatus,
    AdditionalHeaterStatus,

    // Tf
    EvuBlockade,

    // RL
    Compressor,
    AdditionalHeaterRelay,
    EarthHeatExchanger,
    Bypass,
    PreheatingRadiator,
    BypassRelay,
    ControlDeviceActive,
    RemoteInterfaceActive,
    VentilationLevelAvailable,
    WarmWaterPostHeater,
    MagnetValve,
    PreheatingRadiatorActive,

    // ER
    ErrorTempSensorShort,
    ErrorOffset,
    ErrorTempSensorInterrupt,
    ErrorHighPressure,
    ErrorSysRam,
    ErrorSysRom,
    ErrorSysEe,
    ErrorSysIo,
    ErrorSys67Ad,
    ErrorSupplyAir,
    ErrorOutgoingAir,
    ErrorCondenser,
    ErrorPreheating,
}

impl CommandType {
    pub fn spec(self) -> &'static CommandSpec {
        &CATALOG[self as usize]
    }

    pub fn name(self) -> &'static str {
        self.spec().name
    }

    /// Values carried by the `SW` keep-alive write instead of their own register.
    pub fn is_keep_alive(self) -> bool {
        matches!(
            self,
            CommandType::VentilationLevel
                | CommandType::HeatPumpActivate
                | CommandType::AdditionalHeaterActivate
                | CommandType::CoolingModeActivate
        )
    }
}

impl std::fmt::Display for CommandType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name())
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct CommandSpec {
    pub command_type: CommandType,
    pub name: &'static str,
    pub command: Wr3223Command,
    pub direction: Direction,
    pub kind: ValueKind,
    pub bounds: Option<(i32, i32)>,
}

impl CommandSpec {
    const fn new(
        command_type: CommandType,
        name: &'static str,
        command: Wr3223Command,
        direction: Direction,
        kind: ValueKind,
        bounds: Option<(i32, i32)>,
    ) -> Self {
        Self {
            command_type,
            name,
            command,
            direction,
            kind,
            bounds,
        }
    }

    pub fn bounds_check(&self, value: i32) -> Result<(), DriverError> {
        match self.bounds {
            Some((min, max)) if value < min || value > max => Err(DriverError::OutOfRange {
                name: self.name,
                value,
                min,
                max,
            }),
            _ => Ok(()),
        }
    }
}

pub fn spec_for(command_type: CommandType) -> &'static CommandSpec {
    command_type.spec()
}

/// Look up a catalog entry by its public name, eg `ventilation_level`.
pub fn lookup(name: &str) -> Option<&'static CommandSpec> {
    CATALOG.iter().find(|spec| spec.name == name)
}

pub fn bounds_check(command_type: CommandType, value: i32) -> Result<(), DriverError> {
    command_type.spec().bounds_check(value)
}

/// Registers polled at the end of every tick.
pub const READ_REGISTERS: [CommandType; 46] = {
    use CommandType::*;
    [
        TemperatureEvaporator,
        TemperatureCondenser,
        TemperatureOutside,
        TemperatureOutgoingAir,
        TemperatureAfterHeatExchanger,
        TemperatureSupplyAir,
        TemperatureAfterBrinePreheating,
        TemperatureAfterPreheating,
        VentilationLevel,
        RotationSpeedSupplyAirMotor,
        RotationSpeedExhaustAirMotor,
        OperationMode,
        TemperatureSupplyAirTarget,
        HeatFeedbackRate,
        SpeedDeviationMaxLevel1,
        SpeedDeviationMaxLevel2,
        SpeedDeviationMaxLevel3,
        SpeedIncreaseEarthHeatExchangerLevel1,
        SpeedIncreaseEarthHeatExchangerLevel2,
        SpeedIncreaseEarthHeatExchangerLevel3,
        AirExchangeDecreaseOutsideTemperature,
        VentilationSpeedLevel1,
        VentilationSpeedLevel2,
        VentilationSpeedLevel3,
        SummerEarthHeatExchangerActivationTemperature,
        WinterEarthHeatExchangerActivationTemperature,
        DefrostingStartTemperature,
        DefrostingEndTemperature,
        DefrostingVentilationLevel,
        DefrostingHoldOffTime,
        DefrostingOvertravelTime,
        DefrostingHeatFeedbackRate,
        SolarMax,
        SolarUsage,
        DeltaTOff,
        DeltaTOn,
        TemperatureCondenserMax,
        IdleTimePressureReduction,
        SupportFanLevel1EarthHeatExchanger,
        SupportFanLevel2EarthHeatExchanger,
        SupportFanLevel3EarthHeatExchanger,
        ControlVoltageOutgoingAir,
        ControlVoltageSupplyAir,
        WarmWaterTargetTemperature,
        HeatPumpOpen,
        AdditionalHeaterOpen,
    ]
};

/// Registers written through their own command during reconciliation.
pub const WRITE_REGISTERS: [CommandType; 31] = {
    use CommandType::*;
    [
        OperationMode,
        TemperatureSupplyAirTarget,
        SpeedDeviationMaxLevel1,
        SpeedDeviationMaxLevel2,
        SpeedDeviationMaxLevel3,
        SpeedIncreaseEarthHeatExchangerLevel1,
        SpeedIncreaseEarthHeatExchangerLevel2,
        SpeedIncreaseEarthHeatExchangerLevel3,
        AirExchangeDecreaseOutsideTemperature,
        VentilationSpeedLevel1,
        VentilationSpeedLevel2,
        VentilationSpeedLevel3,
        SummerEarthHeatExchangerActivationTemperature,
        WinterEarthHeatExchangerActivationTemperature,
        DefrostingStartTemperature,
        DefrostingEndTemperature,
        DefrostingVentilationLevel,
        DefrostingHoldOffTime,
        DefrostingOvertravelTime,
        DefrostingHeatFeedbackRate,
        SolarMax,
        DeltaTOff,
        DeltaTOn,
        TemperatureCondenserMax,
        IdleTimePressureReduction,
        SupportFanLevel1EarthHeatExchanger,
        SupportFanLevel2EarthHeatExchanger,
        SupportFanLevel3EarthHeatExchanger,
        WarmWaterTargetTemperature,
        HeatPumpOpen,
        AdditionalHeaterOpen,
    ]
};

use CommandType as C;
use Direction::{Read as R, ReadWrite as RW, Write as W};
use ValueKind::{Boolean as B, Numeric as N};
use Wr3223Command as Wc;

// Only the ventilation levels carry bounds here. Other set-points are range
// checked by the controller itself, which NAKs values it won't take.
pub static CATALOG: [CommandSpec; 78] = [
    CommandSpec::new(C::TemperatureEvaporator, "temperature_evaporator", Wc::T1, R, N, None),
    CommandSpec::new(C::TemperatureCondenser, "temperature_condenser", Wc::T2, R, N, None),
    CommandSpec::new(C::TemperatureOutside, "temperature_outside", Wc::T3, R, N, None),
    CommandSpec::new(C::TemperatureOutgoingAir, "temperature_outgoing_air", Wc::T4, R, N, None),
    CommandSpec::new(C::TemperatureAfterHeatExchanger, "temperature_after_heat_exchanger", Wc::T5, R, N, None),
    CommandSpec::new(C::TemperatureSupplyAir, "temperature_supply_air", Wc::T6, R, N, None),
    CommandSpec::new(C::TemperatureAfterBrinePreheating, "temperature_after_brine_preheating", Wc::T7, R, N, None),
    CommandSpec::new(C::TemperatureAfterPreheating, "temperature_after_preheating", Wc::T8, R, N, None),
    CommandSpec::new(C::VentilationLevel, "ventilation_level", Wc::LS, RW, N, Some((0, 3))),
    CommandSpec::new(C::RotationSpeedSupplyAirMotor, "rotation_speed_supply_air_motor", Wc::NZ, R, N, None),
    CommandSpec::new(C::RotationSpeedExhaustAirMotor, "rotation_speed_exhaust_air_motor", Wc::NA, R, N, None),
    CommandSpec::new(C::OperationMode, "operation_mode", Wc::MD, RW, N, None),
    CommandSpec::new(C::TemperatureSupplyAirTarget, "temperature_supply_air_target", Wc::SP, RW, N, None),
    CommandSpec::new(C::HeatFeedbackRate, "heat_feedback_rate", Wc::RA, R, N, None),
    CommandSpec::new(C::SpeedDeviationMaxLevel1, "speed_deviation_max_level_1", Wc::E1, RW, N, None),
    CommandSpec::new(C::SpeedDeviationMaxLevel2, "speed_deviation_max_level_2", Wc::E2, RW, N, None),
    CommandSpec::new(C::SpeedDeviationMaxLevel3, "speed_deviation_max_level_3", Wc::E3, RW, N, None),
    CommandSpec::new(C::SpeedIncreaseEarthHeatExchangerLevel1, "speed_increase_earth_heat_exchanger_level_1", Wc::E5, RW, N, None),
    CommandSpec::new(C::SpeedIncreaseEarthHeatExchangerLevel2, "speed_increase_earth_heat_exchanger_level_2", Wc::E6, RW, N, None),
    CommandSpec::new(C::SpeedIncreaseEarthHeatExchangerLevel3, "speed_increase_earth_heat_exchanger_level_3", Wc::E7, RW, N, None),
    CommandSpec::new(C::AirExchangeDecreaseOutsideTemperature, "air_exchange_decrease_outside_temperature", Wc::E8, RW, N, None),
    CommandSpec::new(C::VentilationSpeedLevel1, "ventilation_speed_level_1", Wc::L1, RW, N, None),
    CommandSpec::new(C::VentilationSpeedLevel2, "ventilation_speed_level_2", Wc::L2, RW, N, None),
    CommandSpec::new(C::VentilationSpeedLevel3, "ventilation_speed_level_3", Wc::L3, RW, N, None),
    CommandSpec::new(C::SummerEarthHeatExchangerActivationTemperature, "summer_earth_heat_exchanger_activation_temperature", Wc::ES, RW, N, None),
    CommandSpec::new(C::WinterEarthHeatExchangerActivationTemperature, "winter_earth_heat_exchanger_activation_temperature", Wc::EW, RW, N, None),
    CommandSpec::new(C::DefrostingStartTemperature, "defrosting_start_temperature", Wc::AE, RW, N, None),
    CommandSpec::new(C::DefrostingEndTemperature, "defrosting_end_temperature", Wc::AA, RW, N, None),
    CommandSpec::new(C::DefrostingVentilationLevel, "defrosting_ventilation_level", Wc::Az, RW, N, Some((0, 3))),
    CommandSpec::new(C::DefrostingHoldOffTime, "defrosting_hold_off_time", Wc::AP, RW, N, None),
    CommandSpec::new(C::DefrostingOvertravelTime, "defrosting_overtravel_time", Wc::AN, RW, N, None),
    CommandSpec::new(C::DefrostingHeatFeedbackRate, "defrosting_heat_feedback_rate", Wc::AR, RW, N, None),
    CommandSpec::new(C::SolarMax, "solar_max", Wc::SM, RW, N, None),
    CommandSpec::new(C::SolarUsage, "solar_usage", Wc::SN, R, N, None),
    CommandSpec::new(C::DeltaTOff, "delta_t_off", Wc::DA, RW, N, None),
    CommandSpec::new(C::DeltaTOn, "delta_t_on", Wc::DE, RW, N, None),
    CommandSpec::new(C::TemperatureCondenserMax, "temperature_condenser_max", Wc::KM, RW, N, None),
    CommandSpec::new(C::IdleTimePressureReduction, "idle_time_pressure_reduction", Wc::PA, RW, N, None),
    CommandSpec::new(C::SupportFanLevel1EarthHeatExchanger, "support_fan_level_1_earth_heat_exchanger", Wc::S1, RW, N, None),
    CommandSpec::new(C::SupportFanLevel2EarthHeatExchanger, "support_fan_level_2_earth_heat_exchanger", Wc::S2, RW, N, None),
    CommandSpec::new(C::SupportFanLevel3EarthHeatExchanger, "support_fan_level_3_earth_heat_exchanger", Wc::S3, RW, N, None),
    CommandSpec::new(C::ControlVoltageOutgoingAir, "control_voltage_outgoing_air", Wc::VA, R, N, None),
    CommandSpec::new(C::ControlVoltageSupplyAir, "control_voltage_supply_air", Wc::VZ, R, N, None),
    CommandSpec::new(C::WarmWaterTargetTemperature, "warm_water_target_temperature", Wc::WW, RW, N, None),
    CommandSpec::new(C::HeatPumpOpen, "heat_pump_open", Wc::WP, RW, B, None),
    CommandSpec::new(C::AdditionalHeaterOpen, "additional_heater_open", Wc::ZH, RW, B, None),
    CommandSpec::new(C::HeatPumpActivate, "heat_pump_activate", Wc::SW, W, B, None),
    CommandSpec::new(C::AdditionalHeaterActivate, "additional_heater_activate", Wc::SW, W, B, None),
    CommandSpec::new(C::CoolingModeActivate, "cooling_mode_activate", Wc::SW, W, B, None),
    CommandSpec::new(C::Malfunction, "malfunction", Wc::Ta, R, B, None),
    CommandSpec::new(C::HeatPumpStatus, "heat_pump_status", Wc::Ta, R, B, None),
    CommandSpec::new(C::AdditionalHeaterStatus, "additional_heater_status", Wc::Ta, R, B, None),
    CommandSpec::new(C::EvuBlockade, "evu_blockade", Wc::Tf, R, B, None),
    CommandSpec::new(C::Compressor, "compressor", Wc::RL, R, B, None),
    CommandSpec::new(C::AdditionalHeaterRelay, "additional_heater_relay", Wc::RL, R, B, None),
    CommandSpec::new(C::EarthHeatExchanger, "earth_heat_exchanger", Wc::RL, R, B, None),
    CommandSpec::new(C::Bypass, "bypass", Wc::RL, R, B, None),
    CommandSpec::new(C::PreheatingRadiator, "preheating_radiator", Wc::RL, R, B, None),
    CommandSpec::new(C::BypassRelay, "bypass_relay", Wc::RL, R, B, None),
    CommandSpec::new(C::ControlDeviceActive, "control_device_active", Wc::RL, R, B, None),
    CommandSpec::new(C::RemoteInterfaceActive, "remote_interface_active", Wc::RL, R, B, None),
    CommandSpec::new(C::VentilationLevelAvailable, "ventilation_level_available", Wc::RL, R, B, None),
    CommandSpec::new(C::WarmWaterPostHeater, "warm_water_post_heater", Wc::RL, R, B, None),
    CommandSpec::new(C::MagnetValve, "magnet_valve", Wc::RL, R, B, None),
    CommandSpec::new(C::PreheatingRadiatorActive, "preheating_radiator_active", Wc::RL, R, B, None),
    CommandSpec::new(C::ErrorTempSensorShort, "error_temp_sensor_short", Wc::ER, R, B, None),
    CommandSpec::new(C::ErrorOffset, "error_offset", Wc::ER, R, B, None),
    CommandSpec::new(C::ErrorTempSensorInterrupt, "error_temp_sensor_interrupt", Wc::ER, R, B, None),
    CommandSpec::new(C::ErrorHighPressure, "error_high_pressure", Wc::ER, R, B, None),
    CommandSpec::new(C::ErrorSysRam, "error_sys_ram", Wc::ER, R, B, None),
    CommandSpec::new(C::ErrorSysRom, "error_sys_rom", Wc::ER, R, B, None),
    CommandSpec::new(C::ErrorSysEe, "error_sys_ee", Wc::ER, R, B, None),
    CommandSpec::new(C::ErrorSysIo, "error_sys_io", Wc::ER, R, B, None),
    CommandSpec::new(C::ErrorSys67Ad, "error_sys_67_ad", Wc::ER, R, B, None),
    CommandSpec::new(C::ErrorSupplyAir, "error_supply_air", Wc::ER, R, B, None),
    CommandSpec::new(C::ErrorOutgoingAir, "error_outgoing_air", Wc::ER, R, B, None),
    CommandSpec::new(C::ErrorCondenser, "error_condenser", Wc::ER, R, B, None),
    CommandSpec::new(C::ErrorPreheating, "error_preheating", Wc::ER, R, B, None),
];

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn catalog_order_matches_command_type() {
        for (i, spec) in CATALOG.iter().enumerate() {
            assert_eq!(spec.command_type as usize, i, "{} is out of place", spec.name);
        }
    }

    #[test]
    fn names_are_unique() {
        for spec in CATALOG.iter() {
            assert_eq!(lookup(spec.name).map(|s| s.command_type), Some(spec.command_type));
        }
    }

    #[test]
    fn read_registers_are_readable() {
        for command_type in READ_REGISTERS {
            assert!(command_type.spec().direction.readable(), "{}", command_type);
        }
    }

    #[test]
    fn write_registers_cover_writable_reads() {
        let writable: Vec<_> = READ_REGISTERS
            .iter()
            .copied()
            .filter(|t| t.spec().direction.writable() && !t.is_keep_alive())
            .collect();
        assert_eq!(writable, WRITE_REGISTERS.to_vec());
    }

    #[test]
    fn bounds() {
        assert!(bounds_check(CommandType::VentilationLevel, 3).is_ok());
        assert!(matches!(
            bounds_check(CommandType::VentilationLevel, 5),
            Err(DriverError::OutOfRange { min: 0, max: 3, value: 5, .. })
        ));
        assert!(bounds_check(CommandType::DefrostingVentilationLevel, 0).is_ok());
        assert!(bounds_check(CommandType::DefrostingVentilationLevel, 4).is_err());
        // left to the controller
        assert!(bounds_check(CommandType::TemperatureSupplyAirTarget, 35).is_ok());
        assert!(bounds_check(CommandType::SolarMax, 99).is_ok());
        // no declared bounds
        assert!(bounds_check(CommandType::TemperatureOutside, 1000).is_ok());
    }

    #[test]
    fn lookup_by_name() {
        let spec = lookup("ventilation_level").unwrap();
        assert_eq!(spec.command, Wr3223Command::LS);
        assert_eq!(spec.kind, ValueKind::Numeric);
        assert!(lookup("no_such_thing").is_none());
    }
}
