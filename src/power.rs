//! Battery Monitoring
//!
//! Converts the battery sense reading into the 0..=4 gauge shown in the
//! corner of the display.

use crate::config::{
    ADC_VREF, BATTERY_DIVIDER_RATIO, BATTERY_EMPTY_VOLTS, BATTERY_FULL_VOLTS, BATTERY_LEVELS,
    DEFAULT_BATTERY_LEVEL,
};

/// Battery voltage reading
#[derive(Clone, Copy, Debug)]
pub struct BatteryVoltage {
    /// Raw ADC reading (12-bit)
    raw: u16,
    /// Voltage divider ratio
    divider_ratio: f32,
    /// Reference voltage
    vref: f32,
}

impl BatteryVoltage {
    /// Create from ADC reading
    #[must_use]
    pub const fn from_adc(raw: u16, divider_ratio: f32, vref: f32) -> Self {
        Self {
            raw,
            divider_ratio,
            vref,
        }
    }

    /// Create from ADC reading with the board divider and reference
    #[must_use]
    pub const fn from_board_adc(raw: u16) -> Self {
        Self::from_adc(raw, BATTERY_DIVIDER_RATIO, ADC_VREF)
    }

    /// Get voltage in volts
    #[must_use]
    pub fn voltage(&self) -> f32 {
        (f32::from(self.raw) / 4095.0) * self.vref * self.divider_ratio
    }

    /// Gauge level, 0 (empty) to 4 (full)
    #[must_use]
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    pub fn level(&self) -> u8 {
        let fraction = (self.voltage() - BATTERY_EMPTY_VOLTS) / (BATTERY_FULL_VOLTS - BATTERY_EMPTY_VOLTS);
        let fraction = fraction.clamp(0.0, 1.0);
        ((fraction * f32::from(BATTERY_LEVELS)) as u8).min(BATTERY_LEVELS)
    }
}

#[cfg(feature = "embedded")]
impl defmt::Format for BatteryVoltage {
    fn format(&self, f: defmt::Formatter) {
        let v = self.voltage();
        let whole = v as u32;
        let frac = ((v - whole as f32) * 100.0) as u32;
        defmt::write!(f, "{}.{:02}V", whole, frac);
    }
}

/// Gauge level for an optional battery sense reading
///
/// Boards without a sense input report [`DEFAULT_BATTERY_LEVEL`].
#[must_use]
pub fn battery_level(raw: Option<u16>) -> u8 {
    raw.map_or(DEFAULT_BATTERY_LEVEL, |raw| BatteryVoltage::from_board_adc(raw).level())
}
