//! Measurement task driver
//!
//! Calibrates once, then cycles forever:
//! measure, calculate, display, report, battery.

use super::engine::MeasurementEngine;
use crate::config::DRIVER_CYCLE_TICKS;
use crate::export::{self, DiagnosticSink};
use crate::frontend::SignalFrontEnd;
use crate::kernel::{Kernel, Mailbox};
use crate::power;
use crate::types::Validity;
use crate::ui::DisplayCommand;

/// The measurement task
pub struct MeterTask<'k, F, S> {
    engine: MeasurementEngine<'k, F>,
    display: &'k Mailbox<DisplayCommand>,
    sink: S,
    cycles: u32,
}

impl<'k, F: SignalFrontEnd, S: DiagnosticSink> MeterTask<'k, F, S> {
    /// Create the task around an uncalibrated front-end
    pub fn new(kernel: &'k Kernel, frontend: F, display: &'k Mailbox<DisplayCommand>, sink: S) -> Self {
        Self {
            engine: MeasurementEngine::new(kernel, frontend),
            display,
            sink,
            cycles: 0,
        }
    }

    /// Measurement engine
    #[must_use]
    pub const fn engine(&self) -> &MeasurementEngine<'k, F> {
        &self.engine
    }

    /// Measurement engine, mutably
    pub fn engine_mut(&mut self) -> &mut MeasurementEngine<'k, F> {
        &mut self.engine
    }

    /// Diagnostic sink
    #[must_use]
    pub const fn sink(&self) -> &S {
        &self.sink
    }

    /// Completed measurement cycles
    #[must_use]
    pub const fn cycles(&self) -> u32 {
        self.cycles
    }

    async fn show(&self, command: DisplayCommand) {
        // a dropped command is logged by the mailbox; the next cycle redraws
        self.display.post(self.engine.kernel, command).await.ok();
    }

    async fn pause(&self) {
        self.engine.kernel.sleep(DRIVER_CYCLE_TICKS).await;
    }

    /// Boot sequence: banner, calibration, calibration report, main screen
    pub async fn start(&mut self) {
        self.show(DisplayCommand::Intro).await;
        self.engine.calibrate().await;
        export::write_calibration(&mut self.sink, self.engine.calibration(), self.engine.corrections());
        self.show(DisplayCommand::MainScreen).await;
        self.pause().await;
    }

    /// One measurement cycle
    pub async fn cycle(&mut self) {
        self.engine.measure().await;
        self.pause().await;

        self.engine.calculate();
        self.pause().await;

        let snapshot = self.engine.snapshot();
        let command = match snapshot.validity {
            Validity::Error => DisplayCommand::MeasurementError,
            Validity::Open => DisplayCommand::InputOpen,
            Validity::Valid => DisplayCommand::UpdateMeasurement(snapshot),
        };
        self.show(command).await;
        self.pause().await;

        self.sink.write_line(&export::measured_data_line("", &snapshot));
        self.pause().await;

        let level = power::battery_level(self.engine.frontend_mut().battery_raw());
        self.show(DisplayCommand::Battery(level)).await;
        self.pause().await;

        self.cycles = self.cycles.wrapping_add(1);
    }

    /// Task body; never returns
    pub async fn run(mut self) {
        self.start().await;
        loop {
            self.cycle().await;
        }
    }
}
