//! System configuration and hardware constants
//!
//! This module defines compile-time constants for the LCR meter.
//! Kernel sizing, signal-chain geometry, thresholds and retry bounds are
//! centralized here.

use crate::types::{FrequencyIndex, Range};

/// System clock frequency (STM32G474 @ 170MHz)
pub const SYSTEM_CLOCK_HZ: u32 = 170_000_000;

/// Kernel tick rate (one tick per millisecond)
pub const TICK_RATE_HZ: u32 = 1_000;

/// Maximum number of tasks, including the idle task in slot 0
pub const MAX_TASKS: usize = 7;

/// Number of entries in one period of the DAC output table
pub const SIN_TABLE_SIZE: usize = 32;

/// Samples per captured buffer (five table periods)
pub const DATA_SIZE: usize = 5 * SIN_TABLE_SIZE;

/// DAC mid-scale code (0 V output)
pub const DAC_MID_SCALE: i16 = 2047;

/// Sine amplitude in DAC codes for AC measurements
pub const DAC_AMPLITUDE: i16 = 1230;

/// Number of amplitude buckets in each linearity correction table
pub const CORRECTION_VALUES: usize = 32;

/// Width of one correction bucket in ADC counts
pub const CORRECTION_STEP: i16 = 95;

/// Ratio below which the range is decreased (measured/reference)
pub const RATIO_UNDER_RANGE: f32 = 0.1;

/// Ratio above which the range is increased, and the open-circuit threshold
pub const RATIO_OVER_RANGE: f32 = 1.3;

/// Ratio below which the lowest frequency is still under-ranged
pub const RATIO_UNDER_RANGE_LOW_FREQUENCY: f32 = 0.051;

/// Divider value above which the input is considered open
pub const DIVIDER_OPEN_THRESHOLD: f32 = 1.1;

/// Ratio margin separating a reactive response from a resistive one
pub const CLASSIFY_MARGIN: f32 = 0.01;

/// Maximum ratio difference between two averaged passes of one component
pub const AGREEMENT_THRESHOLD: f32 = 0.1;

/// Captures averaged in the first measurement pass
pub const FIRST_PASS_AVERAGES: u8 = 5;

/// Captures averaged in the second measurement pass
pub const SECOND_PASS_AVERAGES: u8 = 10;

/// Captures averaged when measuring the fixture resistance
pub const FIXTURE_AVERAGES: u8 = 10;

/// Iteration bound for the source offset search
pub const DAC_OFFSET_ITERATIONS: u8 = 5;

/// Iteration bound for the digitizer offset refinement
pub const ADC_OFFSET_ITERATIONS: u8 = 25;

/// Upper bound on re-measurements during the range and frequency search
pub const RANGE_SEARCH_LIMIT: u8 = 16;

/// Empirical fixture correction subtracted from the series resistance (ohm)
pub const FIXTURE_FUDGE_OHMS: f32 = 99.9;

/// Ticks to wait after reprogramming the generator output
pub const OUTPUT_SETTLE_TICKS: u32 = 10;

/// Ticks to wait after switching the reference range
pub const RANGE_SETTLE_TICKS: u32 = 1;

/// Ticks to let the DC baseline settle before calibration
pub const DC_BASELINE_SETTLE_TICKS: u32 = 750;

/// Maximum one-tick polls while waiting for a capture to complete
pub const CAPTURE_POLL_LIMIT: u32 = 200;

/// Maximum one-tick polls while waiting for a free mailbox slot
pub const MAILBOX_POST_LIMIT: u32 = 500;

/// Ticks between the steps of the measurement driver cycle
pub const DRIVER_CYCLE_TICKS: u32 = 10;

/// Range selected when a new attempt starts
pub const DEFAULT_RANGE: Range = Range::R2M;

/// Drive frequency selected when a new attempt starts
pub const DEFAULT_FREQUENCY: FrequencyIndex = FrequencyIndex::Hz1k;

/// Low frequency used to tell reactive loads from resistive ones
pub const CLASSIFY_FREQUENCY: FrequencyIndex = FrequencyIndex::Hz200;

/// Lowest frequency used for large capacitors
pub const LOWEST_FREQUENCY: FrequencyIndex = FrequencyIndex::Hz50;

/// Highest frequency used for small inductors
pub const HIGHEST_FREQUENCY: FrequencyIndex = FrequencyIndex::Hz50k;

/// Frequency used to measure the fixture series resistance
pub const FIXTURE_FREQUENCY: FrequencyIndex = FrequencyIndex::Hz200;

/// Display width in pixels
pub const DISPLAY_WIDTH: u32 = 128;

/// Display height in pixels
pub const DISPLAY_HEIGHT: u32 = 32;

/// SSD1306 display I2C address
pub const DISPLAY_I2C_ADDR: u8 = 0x3C;

/// I2C bus frequency for the display
pub const I2C_FREQUENCY_HZ: u32 = 400_000;

/// Diagnostic UART baud rate
pub const EXPORT_BAUD_RATE: u32 = 115_200;

/// Diagnostic line buffer size
pub const EXPORT_LINE_SIZE: usize = 96;

/// Battery voltage divider ratio
pub const BATTERY_DIVIDER_RATIO: f32 = 2.0;

/// ADC reference voltage
pub const ADC_VREF: f32 = 3.3;

/// Battery voltage reported as an empty gauge (V)
pub const BATTERY_EMPTY_VOLTS: f32 = 3.3;

/// Battery voltage reported as a full gauge (V)
pub const BATTERY_FULL_VOLTS: f32 = 4.2;

/// Highest battery gauge level
pub const BATTERY_LEVELS: u8 = 4;

/// Battery level reported when no battery sense input exists
pub const DEFAULT_BATTERY_LEVEL: u8 = 2;

/// Pin assignments for GPIO
pub mod pins {
    //! GPIO pin assignments matching the schematic

    /// Range multiplexer select bit 0
    pub const RANGE_SEL0: &str = "PC0";

    /// Range multiplexer select bit 1
    pub const RANGE_SEL1: &str = "PC1";

    /// Range multiplexer select bit 2
    pub const RANGE_SEL2: &str = "PC2";

    /// Input multiplexer select bit 0
    pub const INPUT_SEL0: &str = "PC3";

    /// Input multiplexer select bit 1
    pub const INPUT_SEL1: &str = "PC4";

    /// Generator DAC output
    pub const GENERATOR_DAC: &str = "PA4";

    /// Reference channel ADC input
    pub const REFERENCE_ADC: &str = "PA0";

    /// Measured channel ADC input (selected by the input mux)
    pub const MEASURED_ADC: &str = "PA1";

    /// I2C1 SCL (display)
    pub const I2C1_SCL: &str = "PB8";

    /// I2C1 SDA (display)
    pub const I2C1_SDA: &str = "PB9";

    /// Diagnostic UART TX
    pub const EXPORT_TX: &str = "PA2";
}

