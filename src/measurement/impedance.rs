//! Closed-form impedance computation
//!
//! The device under test forms a voltage divider with the reference
//! resistor (plus the fixture series resistance). With `v` the divider
//! value `measured / (2 * reference)`:
//!
//! ```text
//! R = v * Rt / (1 - v)
//! C = sqrt(a^2 - b^2),  a = 1 / (Rt * v * w),  b = 1 / (Rt * w)
//! L = sqrt(Rt^2 / (w^2 / v^2 - w^2))
//! ```
//!
//! where `Rt` is the total reference resistance and `w = 2 * pi * f`.
//! Reactive loads are treated as pure reactances.

use core::f32::consts::PI;

#[cfg(feature = "embedded")]
use micromath::F32Ext;

use crate::config::DIVIDER_OPEN_THRESHOLD;
use crate::types::{ComponentType, Validity};

/// Computed value with its validity
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Evaluation {
    /// Value in ohm, farad or henry (0 unless valid)
    pub value: f32,
    /// Validity of the value
    pub validity: Validity,
}

impl Evaluation {
    const fn rejected(validity: Validity) -> Self {
        Self { value: 0.0, validity }
    }
}

/// Divider value from channel magnitudes
#[must_use]
pub fn divider_value(reference: f32, measured: f32) -> f32 {
    measured / reference / 2.0
}

/// Resistance for divider value `v` in (0, 1)
#[must_use]
pub fn resistance(v: f32, total_reference_ohms: f32) -> f32 {
    v * total_reference_ohms / (1.0 - v)
}

/// Capacitance for divider value `v` in (0, 1)
#[must_use]
pub fn capacitance(v: f32, total_reference_ohms: f32, frequency_hz: f32) -> f32 {
    let w = 2.0 * PI * frequency_hz;
    let a = 1.0 / (total_reference_ohms * v * w);
    let b = 1.0 / (total_reference_ohms * w);
    (a * a - b * b).sqrt()
}

/// Inductance for divider value `v` in (0, 1)
#[must_use]
pub fn inductance(v: f32, total_reference_ohms: f32, frequency_hz: f32) -> f32 {
    let w = 2.0 * PI * frequency_hz;
    let w2 = w * w;
    let r2 = total_reference_ohms * total_reference_ohms;
    (r2 / (w2 / (v * v) - w2)).sqrt()
}

/// Compute the value of a classified component
///
/// Returns `None` for [`ComponentType::Undetermined`]. A divider value of
/// exactly 1.0 is an Error, above the open threshold is Open, and a
/// non-finite result is an Error.
#[must_use]
#[allow(clippy::float_cmp)]
pub fn evaluate(
    component: ComponentType,
    reference: f32,
    measured: f32,
    total_reference_ohms: f32,
    frequency_hz: f32,
) -> Option<Evaluation> {
    let v = divider_value(reference, measured);

    let value = match component {
        ComponentType::Undetermined => return None,
        _ if 1.0 - v == 0.0 => return Some(Evaluation::rejected(Validity::Error)),
        _ if v > DIVIDER_OPEN_THRESHOLD => return Some(Evaluation::rejected(Validity::Open)),
        ComponentType::Resistor => resistance(v, total_reference_ohms),
        ComponentType::Capacitor => capacitance(v, total_reference_ohms, frequency_hz),
        ComponentType::Inductor => inductance(v, total_reference_ohms, frequency_hz),
    };

    if value.is_finite() {
        Some(Evaluation {
            value,
            validity: Validity::Valid,
        })
    } else {
        Some(Evaluation::rejected(Validity::Error))
    }
}
