//! Signal front-end interface
//!
//! The front-end drives the excitation into the voltage divider and
//! captures one burst of the reference and measured channels. The DAC
//! replays a 32-entry table; a capture holds `DATA_SIZE` samples, which is
//! always a whole number of table periods.

use core::f32::consts::PI;

#[cfg(feature = "embedded")]
use micromath::F32Ext;

use crate::config::{DAC_MID_SCALE, DATA_SIZE, SIN_TABLE_SIZE};
use crate::types::{FrequencyIndex, InputSelect, Range};

/// One captured channel
pub type SampleBuffer = [i16; DATA_SIZE];

/// Hardware collaborator consumed by the measurement engine
pub trait SignalFrontEnd {
    /// Start capturing one burst (non-blocking)
    fn trigger_capture(&mut self);

    /// Check whether the last triggered capture is complete
    fn capture_ready(&mut self) -> bool;

    /// Reference channel samples of the last capture
    fn reference_samples(&self) -> &SampleBuffer;

    /// Measured channel samples of the last capture
    fn measured_samples(&self) -> &SampleBuffer;

    /// Program a sine excitation
    fn set_ac_output(&mut self, frequency: FrequencyIndex, amplitude: i16, input: InputSelect);

    /// Program a constant excitation level
    fn set_dc_output(&mut self, level: i16, input: InputSelect);

    /// Switch the reference resistor multiplexer
    fn select_range(&mut self, range: Range);

    /// Offset subtracted from every subsequently generated table entry
    fn set_dac_offset(&mut self, offset: i16);

    /// Drive frequency actually produced for `frequency` (Hz)
    ///
    /// A sample clock derived from an integer divider rarely hits the
    /// nominal rate; hardware reports the rate it achieved.
    fn drive_hz(&self, frequency: FrequencyIndex) -> f32 {
        frequency.as_hz() as f32
    }

    /// Raw battery sense reading, if the board has one
    fn battery_raw(&mut self) -> Option<u16> {
        None
    }
}

/// Integer timer divider for a sample clock
///
/// The timer counts `(prescaler + 1) * (reload + 1)` input cycles per
/// sample. Both fields are register values.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SampleClock {
    /// Timer input clock (Hz)
    pub input_hz: u32,
    /// Prescaler register value
    pub prescaler: u16,
    /// Auto-reload register value
    pub reload: u16,
}

impl SampleClock {
    /// Closest divider to `rate_hz` from an `input_hz` timer clock
    #[must_use]
    #[allow(
        clippy::cast_possible_truncation,
        clippy::cast_sign_loss,
        clippy::cast_precision_loss
    )]
    pub fn new(input_hz: u32, rate_hz: f32) -> Self {
        let cycles = (input_hz as f32 / rate_hz).round().max(1.0) as u32;
        let prescale = cycles.div_ceil(1 << 16).max(1);
        let reload = ((cycles as f32 / prescale as f32).round() as u32).clamp(1, 1 << 16);
        Self {
            input_hz,
            prescaler: (prescale - 1) as u16,
            reload: (reload - 1) as u16,
        }
    }

    /// Divider for the capture sample rate of a drive frequency
    #[must_use]
    pub fn for_drive(input_hz: u32, frequency: FrequencyIndex) -> Self {
        Self::new(input_hz, frequency.sample_rate_hz())
    }

    /// Sample rate this divider produces (Hz)
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn rate_hz(&self) -> f32 {
        let divider = (u32::from(self.prescaler) + 1) * (u32::from(self.reload) + 1);
        self.input_hz as f32 / divider as f32
    }

    /// Drive frequency produced when `frequency`'s table is replayed at this rate
    #[must_use]
    pub fn drive_hz(&self, frequency: FrequencyIndex) -> f32 {
        self.rate_hz() * f32::from(frequency.periods_per_table()) / SIN_TABLE_SIZE as f32
    }
}

/// DAC output table for one excitation setting
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SineTable {
    entries: [u16; SIN_TABLE_SIZE],
}

impl SineTable {
    /// Sine table holding `periods_per_table` periods of the drive frequency
    #[must_use]
    pub fn ac(frequency: FrequencyIndex, amplitude: i16, dac_offset: i16) -> Self {
        let periods = f32::from(frequency.periods_per_table());
        let mut entries = [0u16; SIN_TABLE_SIZE];
        for (i, entry) in entries.iter_mut().enumerate() {
            let phase = i as f32 / SIN_TABLE_SIZE as f32 * 2.0 * PI * periods;
            let sample = (phase.sin() * f32::from(amplitude)) as i32;
            *entry = to_dac_code(sample, dac_offset);
        }
        Self { entries }
    }

    /// Constant table at `level` counts from mid-scale
    #[must_use]
    pub fn dc(level: i16, dac_offset: i16) -> Self {
        Self {
            entries: [to_dac_code(i32::from(level), dac_offset); SIN_TABLE_SIZE],
        }
    }

    /// Table entries as 12-bit DAC codes
    #[must_use]
    pub const fn entries(&self) -> &[u16; SIN_TABLE_SIZE] {
        &self.entries
    }

    /// Entry replayed for capture sample `n`
    #[must_use]
    pub const fn sample(&self, n: usize) -> u16 {
        self.entries[n % SIN_TABLE_SIZE]
    }
}

impl Default for SineTable {
    fn default() -> Self {
        Self::dc(0, 0)
    }
}

#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
fn to_dac_code(sample: i32, dac_offset: i16) -> u16 {
    (sample + i32::from(DAC_MID_SCALE) - i32::from(dac_offset)).clamp(0, 4095) as u16
}
