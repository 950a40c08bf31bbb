//! Measurement attempt record and its read-only snapshot

use crate::config::{DEFAULT_FREQUENCY, DEFAULT_RANGE};
use crate::types::{ComponentType, FrequencyIndex, Range, Validity};

/// Summed spectral magnitudes of one or more captures
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct Accumulator {
    /// Reference channel magnitude sum
    pub reference: f32,
    /// Measured channel magnitude sum
    pub measured: f32,
    /// Number of captures summed
    pub count: u8,
}

impl Accumulator {
    /// Result of one capture
    #[must_use]
    pub const fn single(reference: f32, measured: f32) -> Self {
        Self {
            reference,
            measured,
            count: 1,
        }
    }

    /// Add one capture
    pub fn add(&mut self, capture: &Self) {
        self.reference += capture.reference;
        self.measured += capture.measured;
        self.count = self.count.saturating_add(capture.count);
    }

    /// Raw channel ratio `measured / reference`
    #[must_use]
    pub fn ratio(&self) -> f32 {
        self.measured / self.reference
    }

    /// A zero reference magnitude marks a lost signal
    #[must_use]
    #[allow(clippy::float_cmp)]
    pub fn is_signal_lost(&self) -> bool {
        self.reference == 0.0
    }
}

/// The single live measurement attempt
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Attempt {
    /// Selected reference range
    pub range: Range,
    /// Selected drive frequency
    pub frequency: FrequencyIndex,
    /// Accumulated magnitudes of the latest (averaged) measurement
    pub accumulator: Accumulator,
    /// Computed component value in base units
    pub value: f32,
    /// Component classification
    pub component: ComponentType,
    /// Validity of `value`
    pub validity: Validity,
}

impl Attempt {
    /// Fresh attempt at the default range and drive frequency
    #[must_use]
    pub const fn new() -> Self {
        Self {
            range: DEFAULT_RANGE,
            frequency: DEFAULT_FREQUENCY,
            accumulator: Accumulator {
                reference: 0.0,
                measured: 0.0,
                count: 0,
            },
            value: 0.0,
            component: ComponentType::Undetermined,
            validity: Validity::Error,
        }
    }

    /// Reset everything except validity, selecting `frequency`
    pub fn reset(&mut self, frequency: FrequencyIndex) {
        *self = Self {
            frequency,
            validity: self.validity,
            ..Self::new()
        };
    }

    /// Field-complete copy for other tasks
    #[must_use]
    pub const fn snapshot(&self) -> Snapshot {
        Snapshot {
            range: self.range,
            frequency: self.frequency,
            reference: self.accumulator.reference,
            measured: self.accumulator.measured,
            value: self.value,
            component: self.component,
            validity: self.validity,
        }
    }
}

impl Default for Attempt {
    fn default() -> Self {
        Self::new()
    }
}

/// Immutable copy of the public attempt fields
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Snapshot {
    /// Reference range
    pub range: Range,
    /// Drive frequency
    pub frequency: FrequencyIndex,
    /// Reference magnitude sum
    pub reference: f32,
    /// Measured magnitude sum
    pub measured: f32,
    /// Component value in base units
    pub value: f32,
    /// Component classification
    pub component: ComponentType,
    /// Validity of `value`
    pub validity: Validity,
}

impl Snapshot {
    /// Raw channel ratio `measured / reference`
    #[must_use]
    pub fn ratio(&self) -> f32 {
        self.measured / self.reference
    }
}

impl Default for Snapshot {
    fn default() -> Self {
        Attempt::new().snapshot()
    }
}

#[cfg(feature = "embedded")]
impl defmt::Format for Snapshot {
    fn format(&self, f: defmt::Formatter) {
        defmt::write!(
            f,
            "{:?} {:?} {} @ {:?} {:?}",
            self.component,
            self.validity,
            self.value,
            self.frequency,
            self.range
        );
    }
}
