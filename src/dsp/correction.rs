//! Amplitude-bucketed linearity correction
//!
//! Each raw sample is assigned a bucket from its amplitude; the corrected
//! value is `(raw - offset) * factor[bucket]`. The bucket always comes from
//! the raw sample, before the offset is removed.

use crate::config::{CORRECTION_STEP, CORRECTION_VALUES};

/// Neutral correction factor
pub const NEUTRAL_FACTOR: f32 = 1.0;

/// Index of the bucket that holds samples around zero
pub const ZERO_BUCKET: usize = CORRECTION_VALUES / 2;

/// Bucket of a raw sample
#[must_use]
#[allow(clippy::cast_possible_truncation, clippy::cast_possible_wrap, clippy::cast_sign_loss)]
pub fn bucket(raw: i16) -> usize {
    let index = i32::from(raw / CORRECTION_STEP) + ZERO_BUCKET as i32;
    index.clamp(0, CORRECTION_VALUES as i32 - 1) as usize
}

/// Per-bucket correction factors for one signal path
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct CorrectionTable {
    factors: [f32; CORRECTION_VALUES],
}

impl CorrectionTable {
    /// All factors at unity
    #[must_use]
    pub const fn neutral() -> Self {
        Self {
            factors: [NEUTRAL_FACTOR; CORRECTION_VALUES],
        }
    }

    /// Build from explicit factors
    #[must_use]
    pub const fn from_factors(factors: [f32; CORRECTION_VALUES]) -> Self {
        Self { factors }
    }

    /// All factors
    #[must_use]
    pub const fn factors(&self) -> &[f32; CORRECTION_VALUES] {
        &self.factors
    }

    /// Factor of one bucket
    #[must_use]
    pub fn factor(&self, bucket: usize) -> f32 {
        self.factors.get(bucket).copied().unwrap_or(NEUTRAL_FACTOR)
    }

    /// Correct a single sample
    #[must_use]
    #[allow(clippy::cast_possible_truncation)]
    pub fn correct(&self, raw: i16, offset: i16) -> i16 {
        let shifted = f32::from(raw) - f32::from(offset);
        (shifted * self.factors[bucket(raw)]) as i16
    }

    /// Correct a buffer in place
    pub fn apply(&self, samples: &mut [i16], offset: i16) {
        for sample in samples.iter_mut() {
            *sample = self.correct(*sample, offset);
        }
    }
}

impl Default for CorrectionTable {
    fn default() -> Self {
        Self::neutral()
    }
}

/// Reference and measured path tables
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct CorrectionTables {
    /// Reference channel
    pub reference: CorrectionTable,
    /// Measured channel
    pub measured: CorrectionTable,
}

impl CorrectionTables {
    /// Both paths neutral
    #[must_use]
    pub const fn neutral() -> Self {
        Self {
            reference: CorrectionTable::neutral(),
            measured: CorrectionTable::neutral(),
        }
    }
}
