//! LCR Meter Firmware Library
//!
//! This library provides the measurement core for an STM32G474-based
//! handheld LCR meter. A sine excitation drives a voltage divider formed by
//! a switchable reference resistor and the component under test; both ends
//! of the divider are captured and reduced to amplitudes at the drive
//! frequency, from which resistance, capacitance or inductance follows.
//!
//! # Architecture
//!
//! The firmware is organized in layers:
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                    APPLICATION LAYER                         │
//! │  Measurement Task  │  Display Task  │  Diagnostic Export     │
//! ├─────────────────────────────────────────────────────────────┤
//! │                 MEASUREMENT / DSP LAYER                      │
//! │  Calibration  │  State Machine  │  Goertzel  │  Impedance    │
//! ├─────────────────────────────────────────────────────────────┤
//! │                   HAL / DRIVER LAYER                         │
//! │  Analog Front-End (ADC/DAC/mux)  │  SSD1306  │  UART         │
//! ├─────────────────────────────────────────────────────────────┤
//! │                    KERNEL / SCHEDULER                        │
//! │        cooperative tick-driven round-robin scheduler         │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Design Principles
//!
//! - **Single owner**: the measurement task owns the front-end, the
//!   calibration and the live attempt; other tasks receive snapshots
//! - **Bounded waits**: every retry and poll loop has a fixed iteration bound
//! - **No unsafe in application code**: all unsafe isolated in HAL/PAC crates
//! - **Functional core, imperative shell**: pure math separated from I/O
//! - **Failures are values**: a bad reading becomes `Error`/`Open`, never a panic

#![cfg_attr(feature = "embedded", no_std)]
#![deny(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

// Re-export dependencies needed by applications (only in embedded mode)
#[cfg(feature = "embedded")]
pub use embassy_stm32;
#[cfg(feature = "embedded")]
pub use embassy_time;

/// Logging macros
///
/// `defmt` on target, stdout on host builds.
#[macro_use]
pub mod logging;

/// Hardware Abstraction Layer
///
/// Analog front-end built on STM32G474 peripherals.
#[cfg(feature = "embedded")]
pub mod hal;

/// Peripheral Drivers
///
/// High-level drivers for external ICs (SSD1306 display).
#[cfg(feature = "embedded")]
pub mod drivers;

/// Cooperative Kernel
///
/// Task registry, tick-driven sleeping and the round-robin scheduler.
pub mod kernel;

/// Signal Front-End Interface
///
/// Excitation tables and the capture collaborator trait.
pub mod frontend;

/// Digital Signal Processing
///
/// Single-bin Goertzel extraction and linearity correction.
pub mod dsp;

/// Calibration and Measurement
///
/// Self-calibration, the measurement state machine and value computation.
pub mod measurement;

/// User Interface
///
/// Display commands, value formatting and the display task.
pub mod ui;

/// Diagnostic Export
///
/// Fixed-width text lines for the diagnostic serial stream.
pub mod export;

/// Power Management
///
/// Battery monitoring.
pub mod power;

/// Shared types used across modules
pub mod types;

/// System configuration and constants
pub mod config;

/// Prelude module for common imports
#[cfg(feature = "embedded")]
pub mod prelude {
    //! Convenient re-exports for common types and traits.

    pub use crate::config::*;
    pub use crate::types::*;

    pub use crate::kernel::{Kernel, Mailbox, Scheduler, TaskFuture};
    pub use crate::measurement::MeterTask;
    pub use crate::ui::{display_task, DisplayCommand};

    // Common traits
    pub use embedded_hal::digital::OutputPin;

    // Embassy
    pub use embassy_time::{Duration, Instant};

    // Error handling
    pub use core::result::Result;

    // Logging
    pub use defmt::{debug, error, info, trace, warn};
}
