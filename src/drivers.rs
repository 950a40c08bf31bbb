//! Peripheral Drivers
//!
//! High-level drivers for external ICs.

pub mod display;

pub use display::Ssd1306;
