/// Aggregate state sent with the `SW` keep-alive write every tick.
///
/// The controller drops back to local operation when it stops seeing these,
/// so the same value is resent even when nothing changed.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct KeepAliveState {
    pub heat_pump_on: bool,
    pub ventilation_level: u8,
    pub additional_heating_on: bool,
    pub cooling_on: bool,
}

impl Default for KeepAliveState {
    fn default() -> Self {
        Self {
            heat_pump_on: false,
            ventilation_level: 2,
            additional_heating_on: false,
            cooling_on: false,
        }
    }
}

impl KeepAliveState {
    /// Level must already be bounds checked against 0..=3.
    pub fn set_ventilation_level(&mut self, level: u8) {
        self.ventilation_level = level;
    }

    pub fn set_heat_pump_on(&mut self, on: bool) {
        self.heat_pump_on = on;
    }

    pub fn set_additional_heating_on(&mut self, on: bool) {
        self.additional_heating_on = on;
    }

    pub fn set_cooling_on(&mut self, on: bool) {
        self.cooling_on = on;
    }

    // bits are "off" flags apart from the two ventilation level bits
    pub fn status_value(&self) -> u8 {
        let mut value = 0;
        if !self.heat_pump_on {
            value += 1;
        }
        if matches!(self.ventilation_level, 1 | 2) {
            value += 2;
        }
        if matches!(self.ventilation_level, 1 | 3) {
            value += 4;
        }
        if !self.additional_heating_on {
            value += 8;
        }
        if self.ventilation_level == 0 {
            value += 16;
        }
        if !self.cooling_on {
            value += 32;
        }
        value
    }

    /// Payload of the `SW` write.
    pub fn encode(&self) -> String {
        self.status_value().to_string()
    }
}
