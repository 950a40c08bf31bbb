//! Shared host test support
//!
//! - a simulated analog front-end modelling the reference-resistor divider
//! - helpers that drive the real kernel tick by tick

#![allow(dead_code)]

use core::future::Future;
use core::pin::pin;

use lcr_meter::config::{DAC_MID_SCALE, DATA_SIZE, FIXTURE_FUDGE_OHMS};
use lcr_meter::export::DiagnosticSink;
use lcr_meter::frontend::{SampleBuffer, SignalFrontEnd, SineTable};
use lcr_meter::kernel::{Kernel, Scheduler, TaskHandle, TaskState};
use lcr_meter::types::{FrequencyIndex, InputSelect, Range};

/// Scheduler steps allowed within one tick before the clock is advanced
pub const STEP_LIMIT: usize = 10_000;

/// Tick budget large enough for a full calibration plus several cycles
pub const LONG_RUN: u32 = 200_000;

// =============================================================================
// Simulated front-end
// =============================================================================

/// Component connected to the terminals
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum Load {
    /// Nothing connected
    Open,
    /// Resistance in ohm
    Resistor(f32),
    /// Capacitance in farad
    Capacitor(f32),
    /// Inductance in henry
    Inductor(f32),
}

/// Voltage divider simulation
///
/// The reference channel sees the generator output (plus a reference-path
/// offset). The measured channel sees twice the divider output
/// `|Z| / |Z + R_range + mux|`, plus the digitizer offset.
pub struct SimFrontEnd {
    pub load: Load,
    pub range: Range,
    pub input: InputSelect,
    pub frequency: FrequencyIndex,
    pub dc: bool,
    pub dac_offset: i16,
    table: SineTable,

    /// Offset on the reference path (counts)
    pub reference_offset: i16,
    /// Offset on the measured path (counts)
    pub adc_offset: i16,
    /// Multiplexer resistance in series with every range (ohm)
    pub mux_ohms: f32,
    /// Polls a capture needs before it reports ready
    pub capture_polls: u32,
    /// Captures never complete
    pub stalled: bool,
    /// Capture number (1-based) whose reference channel reads zero
    pub lose_signal_on: Option<usize>,
    /// Compress reference amplitudes above 700 counts
    pub nonlinear: bool,
    /// Battery sense reading
    pub battery: Option<u16>,
    /// Ratio of the produced drive frequency to the nominal one
    pub clock_scale: f32,
    /// Capture number (1-based) from which the load reads as open
    pub disconnect_on: Option<usize>,

    pub captures: usize,
    pending_polls: u32,
    reference: SampleBuffer,
    measured: SampleBuffer,
}

impl SimFrontEnd {
    pub fn new(load: Load) -> Self {
        Self {
            load,
            range: Range::R2M,
            input: InputSelect::Unchanged,
            frequency: FrequencyIndex::Hz1k,
            dc: true,
            dac_offset: 0,
            table: SineTable::default(),
            reference_offset: 0,
            adc_offset: 0,
            mux_ohms: 5.0,
            capture_polls: 0,
            stalled: false,
            lose_signal_on: None,
            nonlinear: false,
            battery: None,
            clock_scale: 1.0,
            disconnect_on: None,
            captures: 0,
            pending_polls: 0,
            reference: [0; DATA_SIZE],
            measured: [0; DATA_SIZE],
        }
    }

    /// Ideal front-end: no offsets, no multiplexer resistance
    pub fn ideal(load: Load) -> Self {
        Self {
            mux_ohms: 0.0,
            ..Self::new(load)
        }
    }

    /// Divider value seen by the measured channel
    pub fn divider(&self) -> f32 {
        let load = match self.disconnect_on {
            Some(n) if self.captures >= n => Load::Open,
            _ => self.load,
        };
        let fixture = Range::Fixture.reference_ohms();
        match self.range {
            Range::Short | Range::Unused => 0.0,
            Range::Fixture => fixture / (fixture + self.mux_ohms + FIXTURE_FUDGE_OHMS),
            range => {
                let total = range.reference_ohms() + self.mux_ohms;
                let w = 2.0 * core::f32::consts::PI * self.drive_hz(self.frequency);
                let reactance = |x: f32| x / (total * total + x * x).sqrt();
                match (load, self.dc) {
                    (Load::Open, _) | (Load::Capacitor(_), true) => 1.0,
                    (Load::Inductor(_), true) => 0.0,
                    (Load::Resistor(r), _) => r / (r + total),
                    (Load::Capacitor(c), false) => reactance(1.0 / (w * c)),
                    (Load::Inductor(l), false) => reactance(w * l),
                }
            }
        }
    }

    fn reference_sample(&self, x: f32) -> f32 {
        let x = x + f32::from(self.reference_offset);
        if self.nonlinear && x.abs() > 700.0 {
            x.signum() * (700.0 + (x.abs() - 700.0) * 0.8)
        } else {
            x
        }
    }

    fn fill(&mut self) {
        let v = self.divider();
        let shorted = matches!(self.range, Range::Short | Range::Unused);
        let lost = self.lose_signal_on == Some(self.captures);

        for n in 0..DATA_SIZE {
            let x = f32::from(self.table.sample(n) as i16 - DAC_MID_SCALE);
            self.reference[n] = if lost {
                0
            } else {
                self.reference_sample(x).round() as i16
            };
            self.measured[n] = if shorted {
                self.adc_offset
            } else {
                (2.0 * v * x).round() as i16 + self.adc_offset
            };
        }
    }
}

impl SignalFrontEnd for SimFrontEnd {
    fn trigger_capture(&mut self) {
        self.captures += 1;
        self.pending_polls = self.capture_polls;
        self.fill();
    }

    fn capture_ready(&mut self) -> bool {
        if self.stalled {
            return false;
        }
        if self.pending_polls == 0 {
            true
        } else {
            self.pending_polls -= 1;
            false
        }
    }

    fn reference_samples(&self) -> &SampleBuffer {
        &self.reference
    }

    fn measured_samples(&self) -> &SampleBuffer {
        &self.measured
    }

    fn set_ac_output(&mut self, frequency: FrequencyIndex, amplitude: i16, input: InputSelect) {
        self.frequency = frequency;
        self.dc = false;
        self.table = SineTable::ac(frequency, amplitude, self.dac_offset);
        if input != InputSelect::Unchanged {
            self.input = input;
        }
    }

    fn set_dc_output(&mut self, level: i16, input: InputSelect) {
        self.dc = true;
        self.table = SineTable::dc(level, self.dac_offset);
        if input != InputSelect::Unchanged {
            self.input = input;
        }
    }

    fn select_range(&mut self, range: Range) {
        self.range = range;
    }

    fn set_dac_offset(&mut self, offset: i16) {
        self.dac_offset = offset;
    }

    fn drive_hz(&self, frequency: FrequencyIndex) -> f32 {
        frequency.as_hz() as f32 * self.clock_scale
    }

    fn battery_raw(&mut self) -> Option<u16> {
        self.battery
    }
}

// =============================================================================
// Diagnostic sink
// =============================================================================

/// Sink that keeps every line
#[derive(Default)]
pub struct RecordingSink {
    pub lines: Vec<String>,
}

impl DiagnosticSink for RecordingSink {
    fn write_line(&mut self, line: &str) {
        self.lines.push(line.to_owned());
    }
}

// =============================================================================
// Kernel drivers
// =============================================================================

/// Step until the idle slot is selected, then advance the clock; `ticks` times
pub fn run_ticks(kernel: &Kernel, scheduler: &mut Scheduler<'_, '_>, ticks: u32) {
    for _ in 0..ticks {
        for _ in 0..STEP_LIMIT {
            if scheduler.step().is_idle() {
                break;
            }
        }
        kernel.on_tick();
    }
}

/// Run until `task` has finished; returns the ticks it took
pub fn run_until_stopped(
    kernel: &Kernel,
    scheduler: &mut Scheduler<'_, '_>,
    task: TaskHandle,
    tick_limit: u32,
) -> u32 {
    for tick in 0..tick_limit {
        for _ in 0..STEP_LIMIT {
            if scheduler.step().is_idle() {
                break;
            }
        }
        if kernel.task_state(task) == Some(TaskState::Stopped) {
            return tick;
        }
        kernel.on_tick();
    }
    panic!("task did not finish within {tick_limit} ticks");
}

/// Run a future as the only task on `kernel` and return its output
pub fn block_on<T>(kernel: &Kernel, future: impl Future<Output = T>, tick_limit: u32) -> T {
    let mut output = None;
    {
        let mut task = pin!(async {
            output = Some(future.await);
        });
        let mut scheduler = Scheduler::new(kernel);
        let handle = scheduler.register(task.as_mut()).expect("free task slot");
        run_until_stopped(kernel, &mut scheduler, handle, tick_limit);
    }
    output.expect("task produced no output")
}
