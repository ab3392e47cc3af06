#![no_main]

use arbitrary::Arbitrary;
use libfuzzer_sys::fuzz_target;
use zsim_model::{DiscreteIntegrator, Forcing, Parameters, State, ValidityPolicy};

#[derive(Debug, Arbitrary)]
struct DiscreteRunInput {
    params: [f64; 8],
    initial: [f64; 4],
    steps: u8,
    dt: f64,
    clamp: bool,
    pulse_magnitude: f64,
    pulse_interval: u8,
}

fuzz_target!(|input: DiscreteRunInput| {
    let Ok(params) = Parameters::from_slice(&input.params) else {
        return;
    };
    let Ok(integrator) = DiscreteIntegrator::new(input.dt) else {
        return;
    };
    let policy = if input.clamp {
        ValidityPolicy::Clamp
    } else {
        ValidityPolicy::Abort
    };
    let forcing = Forcing::dampening(input.pulse_magnitude, u64::from(input.pulse_interval));
    let initial = State::from_array(input.initial);
    if let Ok(traj) = integrator.with_policy(policy).run(
        &initial,
        &params,
        usize::from(input.steps),
        Some(&forcing),
    ) {
        assert_eq!(traj.len(), usize::from(input.steps) + 1);
        assert!(traj.is_valid());
    }
});
