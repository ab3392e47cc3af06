#![no_main]

use arbitrary::Arbitrary;
use libfuzzer_sys::fuzz_target;
use zsim_integrate::{ToleranceValue, validate_tol};

#[derive(Debug, Arbitrary)]
struct ValidateTolInput {
    n: u8,
    rtol: f64,
    atol_vector: bool,
    atol_values: Vec<f64>,
}

fuzz_target!(|input: ValidateTolInput| {
    let clipped: Vec<f64> = input.atol_values.iter().copied().take(8).collect();
    let atol = if input.atol_vector {
        ToleranceValue::Vector(clipped)
    } else {
        ToleranceValue::Scalar(clipped.first().copied().unwrap_or(0.0))
    };
    if let Ok(validated) = validate_tol(ToleranceValue::Scalar(input.rtol), atol, usize::from(input.n)) {
        assert!(validated.rtol.component(0) >= zsim_integrate::MIN_RTOL);
    }
});
