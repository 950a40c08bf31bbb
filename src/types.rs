//! Shared types used across the LCR meter firmware
//!
//! This module defines the hardware tables (reference ranges and drive
//! frequencies) and the small domain enums shared between the measurement
//! engine, the display and the diagnostic stream.

use core::fmt;

/// Reference resistor selected by the range multiplexer
///
/// The reference resistor is the known leg of the measurement voltage
/// divider. Ranges 0..=4 are measurement ranges; the remaining channels are
/// used only during calibration.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Range {
    /// 100.7 ohm
    R100 = 0,
    /// 2.005 kohm
    R2k = 1,
    /// 20.02 kohm
    R20k = 2,
    /// 199.4 kohm
    R200k = 3,
    /// 1.977 Mohm
    R2M = 4,
    /// Unpopulated multiplexer channel
    Unused = 5,
    /// Both terminal inputs shorted to ground
    Short = 6,
    /// 198.7 ohm fixture reference
    Fixture = 7,
}

impl Range {
    /// Lowest measurement range
    pub const LOWEST: Self = Self::R100;

    /// Highest measurement range
    pub const HIGHEST: Self = Self::R2M;

    /// Reference resistor values in ohm, indexed by multiplexer channel
    pub const REFERENCE_OHMS: [f32; 8] = [100.7, 2005.0, 20020.0, 199_400.0, 1_977_000.0, 0.0, 0.0, 198.7];

    /// Get the range from a multiplexer channel index
    #[must_use]
    pub const fn from_index(index: u8) -> Option<Self> {
        match index {
            0 => Some(Self::R100),
            1 => Some(Self::R2k),
            2 => Some(Self::R20k),
            3 => Some(Self::R200k),
            4 => Some(Self::R2M),
            5 => Some(Self::Unused),
            6 => Some(Self::Short),
            7 => Some(Self::Fixture),
            _ => None,
        }
    }

    /// Multiplexer channel index
    #[must_use]
    pub const fn index(self) -> u8 {
        self as u8
    }

    /// Reference resistance in ohm
    #[must_use]
    pub const fn reference_ohms(self) -> f32 {
        Self::REFERENCE_OHMS[self as usize]
    }

    /// Next smaller measurement range, if any
    #[must_use]
    pub const fn lower(self) -> Option<Self> {
        match self {
            Self::R2k => Some(Self::R100),
            Self::R20k => Some(Self::R2k),
            Self::R200k => Some(Self::R20k),
            Self::R2M => Some(Self::R200k),
            _ => None,
        }
    }

    /// Next larger measurement range, if any
    #[must_use]
    pub const fn higher(self) -> Option<Self> {
        match self {
            Self::R100 => Some(Self::R2k),
            Self::R2k => Some(Self::R20k),
            Self::R20k => Some(Self::R200k),
            Self::R200k => Some(Self::R2M),
            _ => None,
        }
    }
}

#[cfg(feature = "embedded")]
impl defmt::Format for Range {
    fn format(&self, f: defmt::Formatter) {
        defmt::write!(f, "Range{}", self.index());
    }
}

/// Drive frequency selection
///
/// Each entry fixes how many sine periods fit in one 32-entry DAC table, so
/// that a capture always spans an integer number of excitation periods.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum FrequencyIndex {
    /// 50 Hz
    Hz50 = 0,
    /// 100 Hz
    Hz100 = 1,
    /// 200 Hz
    Hz200 = 2,
    /// 500 Hz
    Hz500 = 3,
    /// 1 kHz
    Hz1k = 4,
    /// 2 kHz
    Hz2k = 5,
    /// 5 kHz
    Hz5k = 6,
    /// 10 kHz
    Hz10k = 7,
    /// 20 kHz
    Hz20k = 8,
    /// 50 kHz
    Hz50k = 9,
    /// 100 kHz
    Hz100k = 10,
}

impl FrequencyIndex {
    /// Get the drive frequency in Hz
    #[must_use]
    pub const fn as_hz(self) -> u32 {
        match self {
            Self::Hz50 => 50,
            Self::Hz100 => 100,
            Self::Hz200 => 200,
            Self::Hz500 => 500,
            Self::Hz1k => 1_000,
            Self::Hz2k => 2_000,
            Self::Hz5k => 5_000,
            Self::Hz10k => 10_000,
            Self::Hz20k => 20_000,
            Self::Hz50k => 50_000,
            Self::Hz100k => 100_000,
        }
    }

    /// Sine periods contained in one DAC table
    #[must_use]
    pub const fn periods_per_table(self) -> u8 {
        match self {
            Self::Hz50k => 2,
            Self::Hz100k => 4,
            _ => 1,
        }
    }

    /// Effective sample rate of a capture at this frequency
    #[must_use]
    pub fn sample_rate_hz(self) -> f32 {
        self.as_hz() as f32 / f32::from(self.periods_per_table()) * crate::config::SIN_TABLE_SIZE as f32
    }

    /// Short display label
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::Hz50 => "50Hz",
            Self::Hz100 => "100Hz",
            Self::Hz200 => "200Hz",
            Self::Hz500 => "500Hz",
            Self::Hz1k => "1kHz",
            Self::Hz2k => "2kHz",
            Self::Hz5k => "5kHz",
            Self::Hz10k => "10kHz",
            Self::Hz20k => "20kHz",
            Self::Hz50k => "50kHz",
            Self::Hz100k => "100kHz",
        }
    }
}

impl fmt::Display for FrequencyIndex {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

#[cfg(feature = "embedded")]
impl defmt::Format for FrequencyIndex {
    fn format(&self, f: defmt::Formatter) {
        defmt::write!(f, "{=str}", self.label());
    }
}

/// Input multiplexer selection for the measured channel
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum InputSelect {
    /// Leave the current selection untouched
    #[default]
    Unchanged,
    /// Input 1
    Input1,
    /// Input 2 (generator loopback, used for DC calibration)
    Input2,
    /// Input 3 (component terminal)
    Input3,
}

#[cfg(feature = "embedded")]
impl defmt::Format for InputSelect {
    fn format(&self, f: defmt::Formatter) {
        match self {
            Self::Unchanged => defmt::write!(f, "Unchanged"),
            Self::Input1 => defmt::write!(f, "Input1"),
            Self::Input2 => defmt::write!(f, "Input2"),
            Self::Input3 => defmt::write!(f, "Input3"),
        }
    }
}

/// Component classification of the device under test
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum ComponentType {
    /// Nothing classified yet (or nothing connected)
    #[default]
    Undetermined,
    /// Resistor
    Resistor,
    /// Capacitor
    Capacitor,
    /// Inductor
    Inductor,
}

impl ComponentType {
    /// Unit symbol for the base unit of this component
    #[must_use]
    pub const fn unit(self) -> &'static str {
        match self {
            Self::Undetermined => "",
            Self::Resistor => "R",
            Self::Capacitor => "F",
            Self::Inductor => "H",
        }
    }
}

#[cfg(feature = "embedded")]
impl defmt::Format for ComponentType {
    fn format(&self, f: defmt::Formatter) {
        match self {
            Self::Undetermined => defmt::write!(f, "Undetermined"),
            Self::Resistor => defmt::write!(f, "Resistor"),
            Self::Capacitor => defmt::write!(f, "Capacitor"),
            Self::Inductor => defmt::write!(f, "Inductor"),
        }
    }
}

/// Validity of a computed value
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum Validity {
    /// Degenerate divider ratio
    #[default]
    Error,
    /// No component connected
    Open,
    /// Value is usable
    Valid,
}

#[cfg(feature = "embedded")]
impl defmt::Format for Validity {
    fn format(&self, f: defmt::Formatter) {
        match self {
            Self::Error => defmt::write!(f, "Error"),
            Self::Open => defmt::write!(f, "Open"),
            Self::Valid => defmt::write!(f, "Valid"),
        }
    }
}

#[cfg(all(test, feature = "std"))]
mod tests {
    use super::*;

    #[test]
    fn test_range_steps_stay_within_measurement_ranges() {
        assert_eq!(Range::LOWEST.lower(), None);
        assert_eq!(Range::HIGHEST.higher(), None);
        assert_eq!(Range::R20k.lower(), Some(Range::R2k));
        assert_eq!(Range::R20k.higher(), Some(Range::R200k));
        assert_eq!(Range::Fixture.higher(), None);
    }

    #[test]
    fn test_range_index_roundtrip() {
        for i in 0..8 {
            let range = Range::from_index(i).unwrap();
            assert_eq!(range.index(), i);
        }
        assert!(Range::from_index(8).is_none());
    }

    #[test]
    fn test_sample_rate_keeps_integer_periods() {
        assert!((FrequencyIndex::Hz1k.sample_rate_hz() - 32_000.0).abs() < 0.5);
        assert!((FrequencyIndex::Hz50k.sample_rate_hz() - 800_000.0).abs() < 1.0);
        assert!((FrequencyIndex::Hz100k.sample_rate_hz() - 800_000.0).abs() < 1.0);
    }

    #[test]
    fn test_frequency_ordering() {
        assert!(FrequencyIndex::Hz50 < FrequencyIndex::Hz1k);
        assert!(FrequencyIndex::Hz50k > FrequencyIndex::Hz1k);
    }
}
