//! Measurement state machine
//!
//! Runs inside one kernel task. Every wait goes through [`Kernel::sleep`];
//! every retry loop is bounded.
//!
//! ```text
//! Init -> WaitForComponent -> AdjustRangeAndFrequency -> Measure1 -> Measure2
//! ```
//!
//! `WaitForComponent` stays put while the input is open. `Measure2` repeats
//! while consecutive passes agree. Disagreement or a lost signal in either
//! pass falls back to `WaitForComponent`.
//!
//! [`MeasurementEngine::measure`] advances the machine until it reaches a
//! point where the driver should calculate and display: an open input, the
//! end of `Measure1`, or the end of `Measure2`.

use core::cmp::Ordering;

#[cfg(feature = "embedded")]
use micromath::F32Ext;

use super::attempt::{Accumulator, Attempt, Snapshot};
use super::calibration::Calibration;
use super::impedance;
use crate::config::{
    AGREEMENT_THRESHOLD, CAPTURE_POLL_LIMIT, CLASSIFY_FREQUENCY, CLASSIFY_MARGIN, DAC_AMPLITUDE,
    DEFAULT_FREQUENCY, FIRST_PASS_AVERAGES, HIGHEST_FREQUENCY, LOWEST_FREQUENCY, OUTPUT_SETTLE_TICKS,
    RANGE_SEARCH_LIMIT, RANGE_SETTLE_TICKS, RATIO_OVER_RANGE, RATIO_UNDER_RANGE,
    RATIO_UNDER_RANGE_LOW_FREQUENCY, SECOND_PASS_AVERAGES,
};
use crate::dsp::{CorrectionTables, Goertzel};
use crate::frontend::SignalFrontEnd;
use crate::kernel::Kernel;
use crate::types::{ComponentType, FrequencyIndex, InputSelect, Range, Validity};
use crate::{log_debug, log_info, log_warn};

/// Terminal input used for all component measurements
const TERMINAL_INPUT: InputSelect = InputSelect::Input3;

/// Measurement state machine states
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum MeterState {
    /// Reset the attempt to the default setting
    #[default]
    Init,
    /// Wait for a component to load the divider
    WaitForComponent,
    /// Search range and frequency, then classify
    AdjustRangeAndFrequency,
    /// First averaged pass
    Measure1,
    /// Second averaged pass, repeated while the component stays put
    Measure2,
}

#[cfg(feature = "embedded")]
impl defmt::Format for MeterState {
    fn format(&self, f: defmt::Formatter) {
        match self {
            Self::Init => defmt::write!(f, "Init"),
            Self::WaitForComponent => defmt::write!(f, "WaitForComponent"),
            Self::AdjustRangeAndFrequency => defmt::write!(f, "AdjustRangeAndFrequency"),
            Self::Measure1 => defmt::write!(f, "Measure1"),
            Self::Measure2 => defmt::write!(f, "Measure2"),
        }
    }
}

/// Calibration and measurement engine
///
/// Exclusively owns the front-end, the calibration constants, the
/// correction tables and the live attempt. Other tasks only ever see a
/// [`Snapshot`].
pub struct MeasurementEngine<'k, F> {
    pub(super) kernel: &'k Kernel,
    pub(super) frontend: F,
    pub(super) calibration: Calibration,
    pub(super) corrections: CorrectionTables,
    drive: FrequencyIndex,
    attempt: Attempt,
    state: MeterState,
    first_pass_ratio: f32,
}

impl<'k, F: SignalFrontEnd> MeasurementEngine<'k, F> {
    /// Create an uncalibrated engine
    pub fn new(kernel: &'k Kernel, frontend: F) -> Self {
        Self {
            kernel,
            frontend,
            calibration: Calibration::neutral(),
            corrections: CorrectionTables::neutral(),
            drive: DEFAULT_FREQUENCY,
            attempt: Attempt::new(),
            state: MeterState::Init,
            first_pass_ratio: 0.0,
        }
    }

    /// Current state machine state
    #[must_use]
    pub const fn state(&self) -> MeterState {
        self.state
    }

    /// The live attempt
    #[must_use]
    pub const fn attempt(&self) -> &Attempt {
        &self.attempt
    }

    /// Field-complete copy of the live attempt
    #[must_use]
    pub const fn snapshot(&self) -> Snapshot {
        self.attempt.snapshot()
    }

    /// Calibration constants
    #[must_use]
    pub const fn calibration(&self) -> &Calibration {
        &self.calibration
    }

    /// Linearity correction tables
    #[must_use]
    pub const fn corrections(&self) -> &CorrectionTables {
        &self.corrections
    }

    /// Drive frequency currently programmed into the generator
    #[must_use]
    pub const fn drive(&self) -> FrequencyIndex {
        self.drive
    }

    /// Signal front-end
    pub fn frontend(&self) -> &F {
        &self.frontend
    }

    /// Signal front-end, mutably
    pub fn frontend_mut(&mut self) -> &mut F {
        &mut self.frontend
    }

    /// Switch the reference range and let it settle
    pub(super) async fn select_range(&mut self, range: Range) {
        self.frontend.select_range(range);
        self.kernel.sleep(RANGE_SETTLE_TICKS).await;
    }

    /// Program a sine drive and let it settle
    pub(super) async fn set_ac_output(&mut self, frequency: FrequencyIndex, input: InputSelect) {
        self.drive = frequency;
        self.frontend.set_ac_output(frequency, DAC_AMPLITUDE, input);
        self.kernel.sleep(OUTPUT_SETTLE_TICKS).await;
    }

    /// Program a DC level and let it settle
    pub(super) async fn set_dc_output(&mut self, level: i16, input: InputSelect) {
        self.frontend.set_dc_output(level, input);
        self.kernel.sleep(OUTPUT_SETTLE_TICKS).await;
    }

    /// Trigger a capture and wait for it, one tick per poll
    ///
    /// Returns `false` if the capture did not complete within
    /// `CAPTURE_POLL_LIMIT` polls.
    pub async fn capture(&mut self) -> bool {
        self.frontend.trigger_capture();
        for _ in 0..CAPTURE_POLL_LIMIT {
            if self.frontend.capture_ready() {
                return true;
            }
            self.kernel.sleep(1).await;
        }
        log_warn!("capture timed out");
        false
    }

    /// One corrected capture reduced to drive-frequency magnitudes
    ///
    /// A capture timeout yields zero magnitudes.
    pub async fn measure_once(&mut self) -> Accumulator {
        if !self.capture().await {
            return Accumulator::default();
        }

        let mut reference = *self.frontend.reference_samples();
        let mut measured = *self.frontend.measured_samples();
        self.corrections.reference.apply(&mut reference, 0);
        self.corrections
            .measured
            .apply(&mut measured, self.calibration.adc_offset);

        let filter = Goertzel::for_drive(self.drive);
        Accumulator::single(filter.magnitude(&reference), filter.magnitude(&measured))
    }

    /// Sum up to `count` captures
    ///
    /// Stops at the first capture with a zero reference magnitude and
    /// returns the sums collected so far.
    pub async fn measure_averaged(&mut self, count: u8) -> Accumulator {
        let mut total = Accumulator::default();
        for _ in 0..count {
            let capture = self.measure_once().await;
            if capture.is_signal_lost() {
                log_warn!("signal lost after {} captures", total.count);
                break;
            }
            total.add(&capture);
        }
        total
    }

    /// Advance the state machine to its next reporting point
    pub async fn measure(&mut self) {
        loop {
            match self.state {
                MeterState::Init => {
                    self.attempt.reset(DEFAULT_FREQUENCY);
                    self.apply_attempt_setting().await;
                    self.enter(MeterState::WaitForComponent);
                }
                MeterState::WaitForComponent => {
                    self.attempt.reset(DEFAULT_FREQUENCY);
                    self.apply_attempt_setting().await;
                    self.attempt.accumulator = self.measure_once().await;
                    if self.attempt.accumulator.ratio() < RATIO_OVER_RANGE {
                        self.enter(MeterState::AdjustRangeAndFrequency);
                    } else {
                        self.attempt.value = 0.0;
                        self.attempt.component = ComponentType::Undetermined;
                        self.attempt.validity = Validity::Open;
                        return;
                    }
                }
                MeterState::AdjustRangeAndFrequency => {
                    self.attempt.reset(self.attempt.frequency);
                    self.apply_attempt_setting().await;
                    self.find_range().await;
                    let ratio = self.attempt.accumulator.ratio();
                    self.attempt.component = self.classify(ratio).await;
                    log_info!(
                        "classified {:?} at {:?} {:?}",
                        self.attempt.component,
                        self.attempt.frequency,
                        self.attempt.range
                    );
                    self.enter(MeterState::Measure1);
                }
                MeterState::Measure1 => {
                    self.attempt.accumulator = self.measure_averaged(FIRST_PASS_AVERAGES).await;
                    if self.discard_if_signal_lost() {
                        return;
                    }
                    self.first_pass_ratio = self.attempt.accumulator.ratio();
                    self.attempt.validity = Validity::Valid;
                    self.enter(MeterState::Measure2);
                    return;
                }
                MeterState::Measure2 => {
                    self.attempt.accumulator = self.measure_averaged(SECOND_PASS_AVERAGES).await;
                    if self.discard_if_signal_lost() {
                        return;
                    }
                    let ratio = self.attempt.accumulator.ratio();
                    if (self.first_pass_ratio - ratio).abs() > AGREEMENT_THRESHOLD {
                        log_info!("component changed ({} -> {})", self.first_pass_ratio, ratio);
                        self.enter(MeterState::WaitForComponent);
                    } else {
                        self.attempt.validity = Validity::Valid;
                    }
                    return;
                }
            }
            self.kernel.sleep(1).await;
        }
    }

    /// Compute the attempt value from its accumulated magnitudes
    pub fn calculate(&mut self) {
        let accumulator = self.attempt.accumulator;
        let total_ohms = self.attempt.range.reference_ohms() + self.calibration.series_resistance;
        let frequency_hz = self.frontend.drive_hz(self.attempt.frequency);

        match impedance::evaluate(
            self.attempt.component,
            accumulator.reference,
            accumulator.measured,
            total_ohms,
            frequency_hz,
        ) {
            Some(evaluation) => {
                self.attempt.value = evaluation.value;
                self.attempt.validity = evaluation.validity;
            }
            None => self.attempt.value = 0.0,
        }
    }

    fn enter(&mut self, state: MeterState) {
        log_debug!("state {:?} -> {:?}", self.state, state);
        self.state = state;
    }

    fn discard_if_signal_lost(&mut self) -> bool {
        if self.attempt.accumulator.is_signal_lost() {
            self.attempt.validity = Validity::Error;
            self.enter(MeterState::WaitForComponent);
            true
        } else {
            false
        }
    }

    async fn apply_attempt_setting(&mut self) {
        self.select_range(self.attempt.range).await;
        self.set_ac_output(self.attempt.frequency, TERMINAL_INPUT).await;
    }

    async fn retune(&mut self, frequency: FrequencyIndex) {
        self.attempt.frequency = frequency;
        self.set_ac_output(frequency, TERMINAL_INPUT).await;
    }

    /// Bring the measured amplitude into range, re-measuring after each step
    async fn find_range(&mut self) {
        for _ in 0..RANGE_SEARCH_LIMIT {
            self.attempt.accumulator = self.measure_once().await;
            let ratio = self.attempt.accumulator.ratio();
            let range = self.attempt.range;

            if let (true, Some(lower)) = (ratio < RATIO_UNDER_RANGE, range.lower()) {
                self.attempt.range = lower;
                self.select_range(lower).await;
            } else if let (true, Some(higher)) = (ratio > RATIO_OVER_RANGE, range.higher()) {
                self.attempt.range = higher;
                self.select_range(higher).await;
            } else if ratio < RATIO_UNDER_RANGE
                && range == Range::LOWEST
                && self.attempt.frequency == DEFAULT_FREQUENCY
            {
                self.retune(LOWEST_FREQUENCY).await;
            } else if ratio < RATIO_UNDER_RANGE_LOW_FREQUENCY && self.attempt.frequency == LOWEST_FREQUENCY {
                self.retune(HIGHEST_FREQUENCY).await;
            } else {
                return;
            }
        }
        log_warn!("range search did not settle");
    }

    /// Classify from the final drive frequency, re-measuring low when at the default
    async fn classify(&mut self, ratio: f32) -> ComponentType {
        match self.attempt.frequency.cmp(&DEFAULT_FREQUENCY) {
            Ordering::Less => ComponentType::Capacitor,
            Ordering::Greater => ComponentType::Inductor,
            Ordering::Equal => {
                let original = self.attempt.frequency;
                self.retune(CLASSIFY_FREQUENCY).await;
                self.attempt.accumulator = self.measure_once().await;
                let low_ratio = self.attempt.accumulator.ratio();

                let (component, frequency) = if low_ratio < ratio - CLASSIFY_MARGIN {
                    (ComponentType::Inductor, original)
                } else if low_ratio > ratio + CLASSIFY_MARGIN {
                    (ComponentType::Capacitor, original)
                } else {
                    (ComponentType::Resistor, CLASSIFY_FREQUENCY)
                };
                self.retune(frequency).await;
                component
            }
        }
    }
}
