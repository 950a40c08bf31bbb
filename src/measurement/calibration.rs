//! Boot-time self-calibration
//!
//! Runs once before the first measurement:
//!
//! 1. reset constants to neutral
//! 2. settle a DC baseline
//! 3. zero points of the source and the digitizer
//! 4. fixture series resistance
//! 5. per-bucket linearity correction
//! 6. fixture series resistance again, now with corrected samples
//!
//! Every loop has a fixed iteration bound. A loop that does not converge
//! keeps its last value; calibration always completes.

use super::engine::MeasurementEngine;
use crate::config::{
    ADC_OFFSET_ITERATIONS, CORRECTION_STEP, CORRECTION_VALUES, DAC_OFFSET_ITERATIONS,
    DC_BASELINE_SETTLE_TICKS, FIXTURE_AVERAGES, FIXTURE_FREQUENCY, FIXTURE_FUDGE_OHMS,
};
use crate::dsp::correction::{CorrectionTable, NEUTRAL_FACTOR, ZERO_BUCKET};
use crate::dsp::CorrectionTables;
use crate::frontend::{SampleBuffer, SignalFrontEnd};
use crate::types::{InputSelect, Range};
use crate::{log_info, log_warn};

/// Calibration constants shared by every measurement
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Calibration {
    /// Fixture resistance in series with the device under test (ohm)
    pub series_resistance: f32,
    /// Digitizer offset removed from measured samples (counts)
    pub adc_offset: i16,
    /// Source offset removed from every generated table entry (counts)
    pub dac_offset: i16,
    /// Mean sensitivity the linearity tables were normalised by
    pub linearity_scale: f32,
}

impl Calibration {
    /// Zero offsets, zero series resistance
    #[must_use]
    pub const fn neutral() -> Self {
        Self {
            series_resistance: 0.0,
            adc_offset: 0,
            dac_offset: 0,
            linearity_scale: NEUTRAL_FACTOR,
        }
    }
}

impl Default for Calibration {
    fn default() -> Self {
        Self::neutral()
    }
}

#[cfg(feature = "embedded")]
impl defmt::Format for Calibration {
    fn format(&self, f: defmt::Formatter) {
        defmt::write!(
            f,
            "Rs={} adc={} dac={}",
            self.series_resistance,
            self.adc_offset,
            self.dac_offset
        );
    }
}

/// Integer mean, truncated toward zero
#[must_use]
#[allow(clippy::cast_possible_truncation, clippy::cast_possible_wrap)]
pub fn mean(samples: &[i16]) -> i32 {
    if samples.is_empty() {
        return 0;
    }
    let sum: i32 = samples.iter().map(|&s| i32::from(s)).sum();
    sum / samples.len() as i32
}

/// Next source offset: `(old + mean) / 2`, rounded half up
#[must_use]
#[allow(clippy::cast_possible_truncation)]
pub fn next_dac_offset(old: i16, mean: i32) -> i16 {
    (i32::from(old) + mean + 1)
        .div_euclid(2)
        .clamp(i32::from(i16::MIN), i32::from(i16::MAX)) as i16
}

/// Fixture series resistance from the fixture range magnitudes
#[must_use]
pub fn series_resistance(reference: f32, measured: f32) -> f32 {
    let fixture = Range::Fixture.reference_ohms();
    fixture * reference / measured * 2.0 - fixture - FIXTURE_FUDGE_OHMS
}

/// DC level driven for ladder rung `k` (negative rungs below zero)
#[must_use]
pub const fn ladder_level(k: i16) -> i16 {
    k * CORRECTION_STEP
}

/// Fit correction factors to the DC ladder responses
///
/// `responses[ZERO_BUCKET + k]` holds the response to [`ladder_level`]`(k)`
/// for `k` in `-15..=15`. The zero-level response is removed, each rung is
/// normalised by its expected level, and the 30 sensitivities are divided
/// by their mean. The zero bucket and the bucket below the ladder stay
/// neutral. A ladder without any response leaves the whole table neutral.
/// Returns the table and the mean sensitivity.
#[must_use]
#[allow(clippy::cast_possible_truncation, clippy::cast_possible_wrap)]
pub fn fit_linearity(responses: &[f32; CORRECTION_VALUES]) -> (CorrectionTable, f32) {
    let zero = responses[ZERO_BUCKET];
    let mut sensitivity = [NEUTRAL_FACTOR; CORRECTION_VALUES];
    let mut sum = 0.0f32;
    let mut rungs = 0u8;

    for k in 1..ZERO_BUCKET {
        let level = f32::from(ladder_level(k as i16));
        for (bucket, expected) in [(ZERO_BUCKET + k, level), (ZERO_BUCKET - k, -level)] {
            let s = (responses[bucket] - zero) / expected;
            sensitivity[bucket] = s;
            sum += s;
            rungs += 1;
        }
    }

    let scale = sum / f32::from(rungs);
    if !scale.is_normal() {
        return (CorrectionTable::neutral(), NEUTRAL_FACTOR);
    }

    let mut factors = [NEUTRAL_FACTOR; CORRECTION_VALUES];
    for k in 1..ZERO_BUCKET {
        factors[ZERO_BUCKET + k] = sensitivity[ZERO_BUCKET + k] / scale;
        factors[ZERO_BUCKET - k] = sensitivity[ZERO_BUCKET - k] / scale;
    }
    (CorrectionTable::from_factors(factors), scale)
}

/// Which captured channel to average
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Channel {
    Reference,
    Measured,
}

impl<F: SignalFrontEnd> MeasurementEngine<'_, F> {
    /// Run the full calibration sequence
    pub async fn calibrate(&mut self) {
        log_info!("calibrating");
        self.reset_calibration();
        self.initialise_dc().await;
        self.calibrate_zero_point().await;
        self.calibrate_series_resistance().await;
        self.calibrate_linearity().await;
        self.calibrate_series_resistance().await;
        log_info!(
            "calibration done: Rs={} adc={} dac={}",
            self.calibration.series_resistance,
            self.calibration.adc_offset,
            self.calibration.dac_offset
        );
    }

    fn reset_calibration(&mut self) {
        self.calibration = Calibration::neutral();
        self.corrections = CorrectionTables::neutral();
        self.frontend.set_dac_offset(0);
    }

    async fn initialise_dc(&mut self) {
        self.select_range(Range::R20k).await;
        self.set_dc_output(0, InputSelect::Input2).await;
        self.capture().await;
        self.kernel.sleep(DC_BASELINE_SETTLE_TICKS).await;
    }

    /// Capture once and average one raw channel
    async fn capture_mean(&mut self, channel: Channel) -> i32 {
        if !self.capture().await {
            return 0;
        }
        let samples: &SampleBuffer = match channel {
            Channel::Reference => self.frontend.reference_samples(),
            Channel::Measured => self.frontend.measured_samples(),
        };
        mean(samples)
    }

    #[allow(clippy::cast_possible_truncation)]
    async fn calibrate_zero_point(&mut self) {
        // digitizer offset with both inputs shorted
        self.select_range(Range::Short).await;
        self.set_dc_output(0, InputSelect::Unchanged).await;
        self.calibration.adc_offset = self.capture_mean(Channel::Measured).await as i16;

        // source offset
        self.select_range(Range::Short).await;
        let mut dac_offset = 0i16;
        for iteration in 1..=DAC_OFFSET_ITERATIONS {
            self.frontend.set_dac_offset(dac_offset);
            self.set_dc_output(-dac_offset, InputSelect::Input2).await;
            let value = self.capture_mean(Channel::Reference).await;
            dac_offset = next_dac_offset(dac_offset, value);
            if value == 0 {
                break;
            }
            if iteration == DAC_OFFSET_ITERATIONS {
                log_warn!("source offset did not converge ({})", value);
            }
        }
        self.calibration.dac_offset = dac_offset.saturating_sub(self.calibration.adc_offset);
        self.frontend.set_dac_offset(self.calibration.dac_offset);

        // digitizer offset including the input amplifier
        self.select_range(Range::Fixture).await;
        for _ in 0..ADC_OFFSET_ITERATIONS {
            self.set_dc_output(0, InputSelect::Unchanged).await;
            let value = self.capture_mean(Channel::Measured).await;
            self.calibration.adc_offset = value as i16;
            if value == 0 {
                break;
            }
        }

        log_info!(
            "zero point: dac={} adc={}",
            self.calibration.dac_offset,
            self.calibration.adc_offset
        );
    }

    #[allow(clippy::float_cmp)]
    async fn calibrate_series_resistance(&mut self) {
        self.select_range(Range::Fixture).await;
        self.set_ac_output(FIXTURE_FREQUENCY, InputSelect::Input2).await;
        self.measure_once().await;
        let averaged = self.measure_averaged(FIXTURE_AVERAGES).await;

        if averaged.is_signal_lost() || averaged.measured == 0.0 {
            log_warn!("fixture measurement lost signal, keeping Rs={}", self.calibration.series_resistance);
            return;
        }
        self.calibration.series_resistance = series_resistance(averaged.reference, averaged.measured);
        log_info!("series resistance {}", self.calibration.series_resistance);
    }

    /// Mean reference response to a DC level, digitizer offset removed
    #[allow(clippy::cast_precision_loss)]
    async fn measure_dc(&mut self, level: i16) -> f32 {
        self.set_dc_output(level, InputSelect::Input2).await;
        if !self.capture().await {
            return 0.0;
        }
        let offset = i32::from(self.calibration.adc_offset);
        let samples = self.frontend.reference_samples();
        let sum: i32 = samples.iter().map(|&s| i32::from(s) - offset).sum();
        sum as f32 / samples.len() as f32
    }

    #[allow(clippy::cast_possible_truncation, clippy::cast_possible_wrap)]
    async fn calibrate_linearity(&mut self) {
        let mut responses = [0.0f32; CORRECTION_VALUES];
        for k in 0..ZERO_BUCKET {
            let level = ladder_level(k as i16);
            responses[ZERO_BUCKET + k] = self.measure_dc(level).await;
            responses[ZERO_BUCKET - k] = self.measure_dc(-level).await;
        }

        let (table, scale) = fit_linearity(&responses);
        self.corrections = CorrectionTables {
            reference: table,
            measured: table,
        };
        self.calibration.linearity_scale = scale;
        log_info!("linearity scale {}", scale);
    }
}
