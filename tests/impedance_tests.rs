//! Impedance Computation Tests
//!
//! Closed-form R, C and L from channel magnitudes, plus the Error/Open
//! guards.
//! Run with: cargo test --no-default-features --features std --test impedance_tests

use std::f32::consts::PI;

use lcr_meter::measurement::impedance::{
    capacitance, divider_value, evaluate, inductance, resistance,
};
use lcr_meter::types::{ComponentType, Range, Validity};

/// Channel magnitudes that produce divider value `v`
fn magnitudes(v: f32) -> (f32, f32) {
    (10_000.0, 20_000.0 * v)
}

fn close(actual: f32, expected: f32, tolerance: f32) -> bool {
    ((actual - expected) / expected).abs() < tolerance
}

// =============================================================================
// Resistance
// =============================================================================

#[test]
fn test_resistance_worked_example() {
    let (reference, measured) = magnitudes(0.4);
    let evaluation = evaluate(
        ComponentType::Resistor,
        reference,
        measured,
        Range::R2k.reference_ohms(),
        1000.0,
    )
    .unwrap();

    assert_eq!(evaluation.validity, Validity::Valid);
    assert!(close(evaluation.value, 1336.67, 1e-4), "got {}", evaluation.value);
}

#[test]
fn test_resistance_monotonic_in_divider_value() {
    let mut previous = 0.0;
    for step in 1..20 {
        let v = step as f32 * 0.05;
        let r = resistance(v, 2005.0);
        assert!(r > previous, "not increasing at v={v}");
        previous = r;
    }
}

#[test]
fn test_divider_value_halves_ratio() {
    assert!((divider_value(100.0, 80.0) - 0.4).abs() < 1e-6);
}

// =============================================================================
// Reactive components
// =============================================================================

#[test]
fn test_capacitance_inverts_divider() {
    let c = 100e-9;
    let f = 1000.0;
    let total = 20_025.0;
    let x = 1.0 / (2.0 * PI * f * c);
    let v = x / (total * total + x * x).sqrt();

    assert!(close(capacitance(v, total, f), c, 1e-3));
}

#[test]
fn test_inductance_inverts_divider() {
    let l = 10e-3;
    let f = 1000.0;
    let total = 105.7;
    let x = 2.0 * PI * f * l;
    let v = x / (total * total + x * x).sqrt();

    assert!(close(inductance(v, total, f), l, 1e-3));
}

#[test]
fn test_capacitance_decreases_with_divider_value() {
    let small = capacitance(0.2, 2005.0, 1000.0);
    let large = capacitance(0.6, 2005.0, 1000.0);
    assert!(small > large);
}

#[test]
fn test_inductance_increases_with_divider_value() {
    let small = inductance(0.2, 2005.0, 1000.0);
    let large = inductance(0.6, 2005.0, 1000.0);
    assert!(small < large);
}

// =============================================================================
// Guards
// =============================================================================

#[test]
fn test_unit_divider_value_is_error() {
    for component in [
        ComponentType::Resistor,
        ComponentType::Capacitor,
        ComponentType::Inductor,
    ] {
        let evaluation = evaluate(component, 100.0, 200.0, 2005.0, 1000.0).unwrap();
        assert_eq!(evaluation.validity, Validity::Error);
        assert!(evaluation.value.abs() < f32::EPSILON);
    }
}

#[test]
fn test_divider_value_above_threshold_is_open() {
    let (reference, measured) = magnitudes(1.2);
    let evaluation = evaluate(ComponentType::Resistor, reference, measured, 2005.0, 1000.0).unwrap();
    assert_eq!(evaluation.validity, Validity::Open);
}

#[test]
fn test_guard_uses_exact_equality() {
    // just below 1.0 is still evaluated
    let (reference, measured) = magnitudes(0.999);
    let evaluation = evaluate(ComponentType::Resistor, reference, measured, 2005.0, 1000.0).unwrap();
    assert_eq!(evaluation.validity, Validity::Valid);
    assert!(evaluation.value > 1.0e6);
}

#[test]
fn test_zero_reference_is_error() {
    let evaluation = evaluate(ComponentType::Capacitor, 0.0, 0.0, 2005.0, 1000.0).unwrap();
    assert_eq!(evaluation.validity, Validity::Error);
}

#[test]
fn test_undetermined_component_has_no_value() {
    assert!(evaluate(ComponentType::Undetermined, 100.0, 80.0, 2005.0, 1000.0).is_none());
}
