//! Hardware Abstraction Layer
//!
//! Provides safe abstractions over STM32G474 peripherals.
//! This module isolates hardware-specific code behind the
//! [`SignalFrontEnd`](crate::frontend::SignalFrontEnd) trait.

pub mod analog;
pub mod sampler;

pub use analog::{AnalogFrontEnd, SelectPins};
pub use sampler::Sampler;
