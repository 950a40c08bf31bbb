//! Single-bin spectral magnitude
//!
//! Second-order recursive DFT evaluated at the drive frequency. The
//! capture must span a whole number of drive periods; no window is applied.

use core::f32::consts::PI;

#[cfg(feature = "embedded")]
use micromath::F32Ext;

use crate::types::FrequencyIndex;

/// Goertzel filter tuned to one frequency
#[derive(Clone, Copy, Debug)]
pub struct Goertzel {
    coeff: f32,
    sine: f32,
    cosine: f32,
}

impl Goertzel {
    /// Tune to `frequency_hz` at `sample_rate_hz`
    #[must_use]
    pub fn new(frequency_hz: f32, sample_rate_hz: f32) -> Self {
        let omega = 2.0 * PI * frequency_hz / sample_rate_hz;
        let cosine = omega.cos();
        Self {
            coeff: 2.0 * cosine,
            sine: omega.sin(),
            cosine,
        }
    }

    /// Tune to a drive frequency at its capture sample rate
    #[must_use]
    pub fn for_drive(frequency: FrequencyIndex) -> Self {
        Self::new(frequency.as_hz() as f32, frequency.sample_rate_hz())
    }

    /// Feedback coefficient `2 cos(omega)`
    #[must_use]
    pub const fn coeff(&self) -> f32 {
        self.coeff
    }

    /// Magnitude of the tuned bin over the whole buffer
    #[must_use]
    pub fn magnitude(&self, samples: &[i16]) -> f32 {
        let (s1, s2) = samples.iter().fold((0.0f32, 0.0f32), |(s1, s2), &x| {
            (f32::from(x) + self.coeff * s1 - s2, s1)
        });

        let real = s1 - s2 * self.cosine;
        let imag = s2 * self.sine;
        (real * real + imag * imag).sqrt()
    }
}
