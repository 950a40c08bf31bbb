//! Calibration and Measurement Engine
//!
//! The engine owns the signal front-end, the calibration constants, the
//! linearity tables and the single live measurement attempt. Everything
//! runs inside one kernel task driven by [`driver::MeterTask`].

pub mod attempt;
pub mod calibration;
pub mod driver;
pub mod engine;
pub mod impedance;

pub use attempt::{Accumulator, Attempt, Snapshot};
pub use calibration::Calibration;
pub use driver::MeterTask;
pub use engine::{MeasurementEngine, MeterState};
pub use impedance::Evaluation;
