//! End-to-end scenarios for both schemes.
//!
//! Convention: test_{module}_{function}_{scenario}

use zsim_model::{
    Compartment, ConfigurationError, DiscreteIntegrator, Forcing, Horizon, InstabilityReason,
    Parameters, ScenarioConfig, Scheme, SimulationError, SimulationRunner, State, TimePoint,
    Trajectory, ValidityPolicy, attrition, net_growth, pulse, rates,
};
use zsim_runtime::{LogResult, assert_close, assert_close_slice};

const COEXISTENCE_START: State = State::new(48.0, 2.0, 50.0, 0.0);

fn infection_only(beta_cz: f64) -> Parameters {
    Parameters {
        alpha: 0.0,
        beta: 0.0,
        beta_cz,
        epsilon_cz: 0.0,
        beta_mz: 0.0,
        gamma_mz: 0.0,
        enlistment: 0.0,
        rho: 0.0,
    }
}

fn final_of(result: &Result<Trajectory, SimulationError>) -> State {
    *result
        .as_ref()
        .expect("scheme should succeed")
        .final_state()
        .expect("non-empty trajectory")
}

// ═══════════════════════════════════════════════════════════════
// Coexistence: both schemes valid and in agreement
// ═══════════════════════════════════════════════════════════════

#[test]
fn test_runner_execute_coexistence_schemes_agree() {
    let outcome = SimulationRunner::new()
        .execute(
            &Parameters::coexistence(),
            &COEXISTENCE_START,
            Horizon::new(1500, 1.0),
            None,
        )
        .expect("valid configuration");

    assert!(outcome.both_succeeded());
    for result in [&outcome.discrete, &outcome.continuous] {
        let traj = result.as_ref().expect("scheme succeeds");
        assert!(traj.is_valid());
        assert_eq!(traj.len(), 1501);
        assert_eq!(traj.initial(), Some(&COEXISTENCE_START));
        assert_eq!(traj.times().last(), Some(&1500.0));
    }

    let divergence = outcome.final_divergence().expect("both succeeded");
    for (c, d) in Compartment::ALL.into_iter().zip(divergence) {
        assert!(d < 0.02, "{c} diverges by {d}");
    }

    let d = final_of(&outcome.discrete);
    let c = final_of(&outcome.continuous);
    assert_close_slice(&c.to_array(), &d.to_array(), 0.0, 0.02);
    assert_close(d.civilians, 69.43, 0.01, 0.0);
    assert_close(d.military, 9.98, 0.01, 0.0);
}

#[test]
fn test_runner_execute_is_deterministic() {
    let runner = SimulationRunner::new();
    let forcing = Forcing::additive(Compartment::Military, 10.0, 300);
    let run = || {
        runner
            .execute(
                &Parameters::coexistence(),
                &COEXISTENCE_START,
                Horizon::new(600, 1.0),
                Some(&forcing),
            )
            .expect("valid configuration")
    };
    assert_eq!(run(), run());
}

// ═══════════════════════════════════════════════════════════════
// Field identities along real trajectories
// ═══════════════════════════════════════════════════════════════

#[test]
fn test_field_identities_hold_along_trajectory() {
    let params = Parameters::coexistence();
    let traj = DiscreteIntegrator::default()
        .run(&COEXISTENCE_START, &params, 500, None)
        .expect("coexistence run");
    for state in traj.states() {
        let split = attrition(state, &params);
        assert_close(split.reanimated + split.to_dead, split.total, 1e-12, 1e-12);
        let d = rates(state, &params);
        assert_close(d.total(), net_growth(state, &params), 1e-9, 1e-12);
    }
}

#[test]
fn test_discrete_run_total_grows_by_births_only() {
    let params = Parameters::coexistence();
    let traj = DiscreteIntegrator::default()
        .run(&COEXISTENCE_START, &params, 200, None)
        .expect("coexistence run");
    for pair in traj.states().windows(2) {
        let births = params.alpha * pair[0].civilians;
        assert_close(pair[1].total() - pair[0].total(), births, 1e-9, 1e-12);
    }
}

#[test]
fn test_discrete_run_reduced_model_matches_two_compartment_update() {
    let (alpha, beta, rho, gamma, delta) = (0.03, 0.01, 0.2, 0.002, 0.001);
    let params = Parameters::civilian_zombie(alpha, beta, rho, gamma, delta);
    let traj = DiscreteIntegrator::default()
        .run(&State::new(100.0, 1.0, 0.0, 0.0), &params, 50, None)
        .expect("reduced run");

    let (mut l, mut z) = (100.0_f64, 1.0_f64);
    for state in traj.states().iter().skip(1) {
        let dl = (alpha - beta) * l - gamma * l * z;
        let dz = (gamma - delta) * l * z + rho * beta * l;
        l += dl;
        z += dz;
        assert_close(state.civilians, l, 1e-9, 1e-10);
        assert_close(state.zombies, z, 1e-9, 1e-10);
        assert_eq!(state.military, 0.0);
    }
}

// ═══════════════════════════════════════════════════════════════
// Forcing
// ═══════════════════════════════════════════════════════════════

#[test]
fn test_forcing_pulse_timing_every_ten() {
    let fired: Vec<i64> = (0..=30).filter(|&t| pulse(t, 1.0, 10) != 0.0).collect();
    assert_eq!(fired, vec![10, 20, 30]);
}

#[test]
fn test_runner_execute_with_baseline_military_pulse_raises_final_military() {
    let forcing = Forcing::additive(Compartment::Military, 10.0, 300);
    let comparison = SimulationRunner::new()
        .execute_with_baseline(
            &Parameters::coexistence(),
            &COEXISTENCE_START,
            Horizon::new(1500, 1.0),
            &forcing,
        )
        .expect("valid configuration");

    assert!(comparison.forced.both_succeeded());
    assert!(comparison.baseline.both_succeeded());
    for scheme in [Scheme::Discrete, Scheme::Continuous] {
        let forced = final_of(comparison.forced.scheme(scheme));
        let baseline = final_of(comparison.baseline.scheme(scheme));
        assert!(
            forced.military > baseline.military,
            "{scheme}: forced {} <= baseline {}",
            forced.military,
            baseline.military
        );
    }
}

#[test]
fn test_runner_execute_subtractive_cull_lowers_zombies() {
    let forcing = Forcing::subtractive(Compartment::Zombies, 0.5, 50);
    let comparison = SimulationRunner::new()
        .execute_with_baseline(
            &Parameters::coexistence(),
            &COEXISTENCE_START,
            Horizon::new(300, 1.0),
            &forcing,
        )
        .expect("valid configuration");
    for scheme in [Scheme::Discrete, Scheme::Continuous] {
        let forced = final_of(comparison.forced.scheme(scheme));
        let baseline = final_of(comparison.baseline.scheme(scheme));
        assert!(forced.zombies < baseline.zombies, "{scheme}");
    }
}

#[test]
fn test_continuous_run_dampening_lowers_zombies() {
    let forcing = Forcing::dampening(0.5, 1);
    let comparison = SimulationRunner::new()
        .execute_with_baseline(
            &Parameters::coexistence(),
            &COEXISTENCE_START,
            Horizon::new(20, 1.0),
            &forcing,
        )
        .expect("valid configuration");
    let forced = final_of(&comparison.forced.continuous);
    let baseline = final_of(&comparison.baseline.continuous);
    assert!(forced.zombies < baseline.zombies);
    assert!(forced.civilians > baseline.civilians);
}

#[test]
fn test_discrete_run_dampening_spares_infections_first_step() {
    let params = Parameters::coexistence();
    let forcing = Forcing::dampening(0.1, 1);
    let base = DiscreteIntegrator::default()
        .run(&COEXISTENCE_START, &params, 1, None)
        .expect("baseline");
    let damped = DiscreteIntegrator::default()
        .run(&COEXISTENCE_START, &params, 1, Some(&forcing))
        .expect("damped");
    let spared = 0.1 * params.beta_cz * 48.0 * 2.0;
    let (base, damped) = (base.states()[1], damped.states()[1]);
    assert_close(damped.civilians, base.civilians + spared, 1e-12, 1e-12);
    assert_close(damped.zombies, base.zombies - spared, 1e-12, 1e-12);
}

// ═══════════════════════════════════════════════════════════════
// Invalid trajectories
// ═══════════════════════════════════════════════════════════════

#[test]
fn test_discrete_run_detects_zombies_negative_on_first_step() {
    let params = Parameters {
        beta_cz: 0.01,
        epsilon_cz: 0.1,
        ..infection_only(0.0)
    };
    let err = DiscreteIntegrator::default()
        .run(&State::new(50.0, 5.0, 0.0, 0.0), &params, 100, None)
        .expect_err("zombies wiped out past zero");
    assert_eq!(err.at(), Some(TimePoint::Step(1)));
    assert!(matches!(
        err,
        SimulationError::InvalidTrajectory {
            compartment: Compartment::Zombies,
            ..
        }
    ));
}

#[test]
fn test_runner_execute_keeps_continuous_when_discrete_fails() {
    let outcome = SimulationRunner::new()
        .execute(
            &infection_only(0.2),
            &State::new(10.0, 1.0, 0.0, 0.0),
            Horizon::new(5, 1.0),
            None,
        )
        .expect("valid configuration");

    let err = outcome.discrete.as_ref().expect_err("discrete overshoots");
    assert_eq!(err.scheme(), Some(Scheme::Discrete));
    assert_eq!(err.at(), Some(TimePoint::Step(3)));

    let traj = outcome.continuous.as_ref().expect("continuous stays positive");
    assert!(traj.is_valid());
    // C + Z is conserved by the infection-only model
    for state in traj.states() {
        assert_close(state.civilians + state.zombies, 11.0, 1e-6, 0.0);
    }
    assert_eq!(outcome.log_entry("partial").result, Some(LogResult::Partial));
}

#[test]
fn test_runner_execute_clamp_policy_completes_where_abort_fails() {
    let params = infection_only(0.2);
    let initial = State::new(10.0, 1.0, 0.0, 0.0);
    let horizon = Horizon::new(5, 1.0);

    let aborted = SimulationRunner::new()
        .execute(&params, &initial, horizon, None)
        .expect("valid configuration");
    assert!(aborted.discrete.is_err());

    let clamped = SimulationRunner::new()
        .with_policy(ValidityPolicy::Clamp)
        .execute(&params, &initial, horizon, None)
        .expect("valid configuration");
    let traj = clamped.discrete.as_ref().expect("clamp completes");
    assert_eq!(traj.len(), 6);
    assert!(traj.states().iter().all(|s| s.first_negative().is_none()));
}

#[test]
fn test_continuous_run_tiny_budget_reports_instability() {
    let runner = SimulationRunner::new().with_continuous(
        zsim_model::ContinuousIntegrator::new()
            .with_max_step(0.5)
            .with_max_steps(5),
    );
    let outcome = runner
        .execute(
            &Parameters::coexistence(),
            &COEXISTENCE_START,
            Horizon::new(100, 1.0),
            None,
        )
        .expect("valid configuration");
    assert!(outcome.discrete.is_ok());
    assert!(matches!(
        outcome.continuous,
        Err(SimulationError::NumericInstability {
            reason: InstabilityReason::StepBudgetExhausted { max_steps: 5 },
            ..
        })
    ));
}

#[test]
fn test_runner_execute_huge_dt_with_unit_pulse_stops_on_budget() {
    let forcing = Forcing::additive(Compartment::Military, 1e-4, 1);
    let outcome = SimulationRunner::new()
        .execute(
            &Parameters::coexistence(),
            &COEXISTENCE_START,
            Horizon::new(2, 5e8),
            Some(&forcing),
        )
        .expect("valid configuration");
    assert!(matches!(
        outcome.continuous,
        Err(SimulationError::NumericInstability {
            scheme: Scheme::Continuous,
            ..
        })
    ));
}

#[test]
fn test_runner_execute_rejects_absurd_step_count() {
    let err = SimulationRunner::new()
        .execute(
            &Parameters::coexistence(),
            &COEXISTENCE_START,
            Horizon::new(usize::MAX, 1.0),
            None,
        )
        .expect_err("too many steps");
    assert!(matches!(err, ConfigurationError::TooManySteps { .. }));
}

// ═══════════════════════════════════════════════════════════════
// Grids, ensembles and configuration
// ═══════════════════════════════════════════════════════════════

#[test]
fn test_runner_execute_fractional_dt_grid() {
    let outcome = SimulationRunner::new()
        .execute(
            &Parameters::coexistence(),
            &COEXISTENCE_START,
            Horizon::new(40, 0.25),
            None,
        )
        .expect("valid configuration");
    for result in [&outcome.discrete, &outcome.continuous] {
        let traj = result.as_ref().expect("scheme succeeds");
        assert_eq!(traj.times(), Horizon::new(40, 0.25).grid().as_slice());
    }
}

#[test]
fn test_runner_execute_ensemble_one_outcome_per_initial() {
    let initials = [
        State::new(48.0, 2.0, 50.0, 0.0),
        State::new(100.0, 1.0, 10.0, 0.0),
        State::new(60.0, 1.0, 30.0, 0.0),
    ];
    let outcomes = SimulationRunner::new()
        .execute_ensemble(
            &Parameters::coexistence(),
            &initials,
            Horizon::new(50, 1.0),
            None,
        )
        .expect("valid configuration");
    assert_eq!(outcomes.len(), 3);
    for (outcome, initial) in outcomes.iter().zip(&initials) {
        let traj = outcome.discrete.as_ref().expect("discrete succeeds");
        assert_eq!(traj.initial(), Some(initial));
    }
}

#[test]
fn test_runner_execute_ensemble_rejects_any_bad_initial() {
    let err = SimulationRunner::new()
        .execute_ensemble(
            &Parameters::coexistence(),
            &[COEXISTENCE_START, State::new(1.0, 1.0, -1.0, 0.0)],
            Horizon::new(10, 1.0),
            None,
        )
        .expect_err("negative military");
    assert_eq!(
        err,
        ConfigurationError::InvalidInitialState {
            compartment: Compartment::Military,
            value: -1.0
        }
    );
}

#[test]
fn test_config_run_from_json_scenario() {
    let config = ScenarioConfig::from_json_str(
        r#"{
            "initial": { "civilians": 48, "zombies": 2, "military": 50, "dead": 0 },
            "horizon": { "steps": 120, "dt": 1.0 },
            "forcing": { "magnitude": 0.5, "interval": 40, "mode": "subtractive", "target": "zombies" }
        }"#,
    )
    .expect("scenario parses");
    let outcome = config.run().expect("valid scenario");
    assert!(outcome.both_succeeded());
    let series = outcome
        .continuous
        .as_ref()
        .expect("continuous succeeds")
        .series();
    assert_eq!(series.labels, ["Civilians", "Zombies", "Military", "Dead"]);
    assert_eq!(series.time_grid.len(), 121);
}
