//! Digital Signal Processing
//!
//! Spectral extraction and sample correction for the measurement engine:
//! - Goertzel single-bin magnitude at the drive frequency
//! - Amplitude-bucketed linearity correction

pub mod correction;
pub mod goertzel;

pub use correction::{CorrectionTable, CorrectionTables};
pub use goertzel::Goertzel;
