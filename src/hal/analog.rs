//! Analog Front-End
//!
//! Drives the excitation DAC, the reference-resistor and input multiplexers,
//! and captures the reference and measured channels on ADC1/ADC2.
//!
//! Generator and digitizers share the TIM6 sample clock (see
//! [`Sampler`]), so a capture is always a whole number of table periods
//! regardless of what the core is doing. The generator free-runs; the
//! engine's settle delays cover the divider transient.

use embassy_stm32::adc::{Adc, AdcChannel, SampleTime};
use embassy_stm32::dac::{DacChannel, TriggerSel};
use embassy_stm32::gpio::{Level, Output};
use embassy_stm32::peripherals::{ADC1, ADC2, DAC1};

use super::sampler::Sampler;
use crate::config::DATA_SIZE;
use crate::frontend::{SampleBuffer, SampleClock, SignalFrontEnd, SineTable};
use crate::types::{FrequencyIndex, InputSelect, Range};
/// Multiplexer select lines
pub struct SelectPins<'d, const BITS: usize> {
    pins: [Output<'d>; BITS],
}

impl<'d, const BITS: usize> SelectPins<'d, BITS> {
    /// Select lines, least significant bit first
    #[must_use]
    pub const fn new(pins: [Output<'d>; BITS]) -> Self {
        Self { pins }
    }

    /// Drive the binary code `value`
    pub fn select(&mut self, value: u8) {
        for (bit, pin) in self.pins.iter_mut().enumerate() {
            pin.set_level(Level::from(value & (1 << bit) != 0));
        }
    }
}

/// On-chip analog front-end
pub struct AnalogFrontEnd<'d> {
    _reference_adc: Adc<'d, ADC1>,
    _measured_adc: Adc<'d, ADC2>,
    _dac: DacChannel<'d, DAC1, 1>,
    sampler: Sampler<'d>,
    range_select: SelectPins<'d, 3>,
    input_select: SelectPins<'d, 2>,
    dac_offset: i16,
    reference: SampleBuffer,
    measured: SampleBuffer,
}

impl<'d> AnalogFrontEnd<'d> {
    /// Assemble the front-end from configured peripherals
    ///
    /// One blocking read per channel programs its sequence slot and sample
    /// time; every later conversion is started by the sample clock.
    #[must_use]
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        mut reference_adc: Adc<'d, ADC1>,
        mut measured_adc: Adc<'d, ADC2>,
        mut reference_pin: impl AdcChannel<ADC1>,
        mut measured_pin: impl AdcChannel<ADC2>,
        mut dac: DacChannel<'d, DAC1, 1>,
        sampler: Sampler<'d>,
        range_select: SelectPins<'d, 3>,
        input_select: SelectPins<'d, 2>,
    ) -> Self {
        reference_adc.set_sample_time(SampleTime::CYCLES6_5);
        measured_adc.set_sample_time(SampleTime::CYCLES6_5);
        reference_adc.blocking_read(&mut reference_pin);
        measured_adc.blocking_read(&mut measured_pin);

        dac.set_trigger(TriggerSel::Tim6);
        dac.set_triggering(true);
        dac.set_enable(true);

        let mut frontend = Self {
            _reference_adc: reference_adc,
            _measured_adc: measured_adc,
            _dac: dac,
            sampler,
            range_select,
            input_select,
            dac_offset: 0,
            reference: [0; DATA_SIZE],
            measured: [0; DATA_SIZE],
        };
        frontend.sampler.load_table(&SineTable::default());
        frontend
    }

    fn select_input(&mut self, input: InputSelect) {
        let code = match input {
            InputSelect::Unchanged => return,
            InputSelect::Input1 => 1,
            InputSelect::Input2 => 2,
            InputSelect::Input3 => 3,
        };
        self.input_select.select(code);
    }
}

impl SignalFrontEnd for AnalogFrontEnd<'_> {
    fn trigger_capture(&mut self) {
        self.sampler.arm();
    }

    fn capture_ready(&mut self) -> bool {
        if !self.sampler.is_complete() {
            return false;
        }
        self.sampler.collect(&mut self.reference, &mut self.measured);
        true
    }

    fn reference_samples(&self) -> &SampleBuffer {
        &self.reference
    }

    fn measured_samples(&self) -> &SampleBuffer {
        &self.measured
    }

    fn set_ac_output(&mut self, frequency: FrequencyIndex, amplitude: i16, input: InputSelect) {
        let clock = SampleClock::for_drive(self.sampler.input_hz(), frequency);
        self.sampler.load_table(&SineTable::ac(frequency, amplitude, self.dac_offset));
        if clock != self.sampler.clock() {
            self.sampler.set_clock(clock);
        }
        self.select_input(input);
    }

    fn set_dc_output(&mut self, level: i16, input: InputSelect) {
        self.sampler.load_table(&SineTable::dc(level, self.dac_offset));
        self.select_input(input);
    }

    fn select_range(&mut self, range: Range) {
        self.range_select.select(range.index());
    }

    fn set_dac_offset(&mut self, offset: i16) {
        self.dac_offset = offset;
    }

    fn drive_hz(&self, frequency: FrequencyIndex) -> f32 {
        SampleClock::for_drive(self.sampler.input_hz(), frequency).drive_hz(frequency)
    }
}
