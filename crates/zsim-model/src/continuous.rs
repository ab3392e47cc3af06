#![forbid(unsafe_code)]

//! Adaptive Runge-Kutta integration of the model ODE.
//!
//! Forcing is piecewise constant in time: the pulse for index `k` is active
//! on `[k, k + 1)`. The span is cut at every switch time and the solver is
//! restarted on each piece, so no adaptive step ever straddles a pulse edge.

use tracing::{debug, warn};
use zsim_integrate::{
    IntegrateValidationError, SolveIvpOptions, SolverKind, StepFailure, ToleranceValue,
    solve_ivp, validate_max_step, validate_t_eval, validate_tol,
};

use crate::error::{ConfigurationError, InstabilityReason, Scheme, SimulationError, TimePoint};
use crate::field::rates;
use crate::forcing::Forcing;
use crate::params::{Parameters, State};
use crate::trajectory::Trajectory;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ContinuousIntegrator {
    rtol: f64,
    atol: f64,
    method: SolverKind,
    max_step: f64,
    max_steps: usize,
}

impl Default for ContinuousIntegrator {
    fn default() -> Self {
        Self {
            rtol: 1e-6,
            atol: 1e-9,
            method: SolverKind::Rk45,
            max_step: f64::INFINITY,
            max_steps: 200_000,
        }
    }
}

fn state_of(y: &[f64]) -> State {
    State::new(y[0], y[1], y[2], y[3])
}

fn check_sample(t: f64, state: &State) -> Result<(), SimulationError> {
    if let Some(compartment) = state.first_non_finite() {
        warn!(t, %compartment, "continuous state is not finite");
        return Err(SimulationError::NumericInstability {
            scheme: Scheme::Continuous,
            at: TimePoint::Time(t),
            reason: InstabilityReason::NonFinite { compartment },
        });
    }
    if let Some((compartment, value)) = state.first_negative() {
        warn!(t, %compartment, value, "continuous trajectory went negative");
        return Err(SimulationError::InvalidTrajectory {
            scheme: Scheme::Continuous,
            at: TimePoint::Time(t),
            compartment,
            value,
        });
    }
    Ok(())
}

impl ContinuousIntegrator {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_tolerances(mut self, rtol: f64, atol: f64) -> Self {
        self.rtol = rtol;
        self.atol = atol;
        self
    }

    #[must_use]
    pub fn with_method(mut self, method: SolverKind) -> Self {
        self.method = method;
        self
    }

    #[must_use]
    pub fn with_max_step(mut self, max_step: f64) -> Self {
        self.max_step = max_step;
        self
    }

    /// Accepted-step budget shared by all pieces of one run.
    #[must_use]
    pub fn with_max_steps(mut self, max_steps: usize) -> Self {
        self.max_steps = max_steps;
        self
    }

    #[must_use]
    pub fn rtol(&self) -> f64 {
        self.rtol
    }

    #[must_use]
    pub fn atol(&self) -> f64 {
        self.atol
    }

    #[must_use]
    pub fn method(&self) -> SolverKind {
        self.method
    }

    #[must_use]
    pub fn max_step(&self) -> f64 {
        self.max_step
    }

    #[must_use]
    pub fn max_steps(&self) -> usize {
        self.max_steps
    }

    pub fn validate(&self) -> Result<(), ConfigurationError> {
        validate_tol(
            ToleranceValue::Scalar(self.rtol),
            ToleranceValue::Scalar(self.atol),
            4,
        )?;
        validate_max_step(self.max_step)?;
        if self.max_steps == 0 {
            return Err(IntegrateValidationError::StepBudgetMustBePositive.into());
        }
        Ok(())
    }

    /// Check a span and evaluation grid without integrating.
    pub fn validate_grid(t_span: (f64, f64), eval_grid: &[f64]) -> Result<(), ConfigurationError> {
        let (t0, tf) = t_span;
        if !t0.is_finite() || !tf.is_finite() || tf < t0 {
            return Err(ConfigurationError::InvalidSpan(t0, tf));
        }
        if eval_grid.is_empty() {
            return Err(ConfigurationError::EmptyGrid);
        }
        validate_t_eval(eval_grid, t_span)?;
        Ok(())
    }

    /// Integrate from `initial` at `t_span.0` and sample at every point of
    /// `eval_grid`, which must be strictly ascending inside `t_span`.
    pub fn run(
        &self,
        initial: &State,
        params: &Parameters,
        t_span: (f64, f64),
        eval_grid: &[f64],
        forcing: Option<&Forcing>,
    ) -> Result<Trajectory, SimulationError> {
        self.validate()?;
        params.validate()?;
        initial.validate_initial()?;
        if let Some(forcing) = forcing {
            forcing.validate()?;
        }
        Self::validate_grid(t_span, eval_grid)?;

        let (t0, tf) = t_span;
        let edges = forcing
            .map(|f| f.pulse.switch_edges(t0, tf))
            .into_iter()
            .flatten()
            .chain(std::iter::once(tf));

        debug!(
            t0,
            tf,
            samples = eval_grid.len(),
            forced = forcing.is_some(),
            method = ?self.method,
            "continuous run start"
        );

        let mut times = Vec::with_capacity(eval_grid.len());
        let mut states = Vec::with_capacity(eval_grid.len());
        let mut cursor = 0;
        if eval_grid[0] == t0 {
            times.push(t0);
            states.push(*initial);
            cursor = 1;
        }

        let mut y = initial.to_array();
        let mut steps_used = 0_usize;
        let mut nfev = 0_usize;

        let mut piece_start = t0;
        for b in edges {
            let a = piece_start;
            if b <= a {
                continue;
            }
            piece_start = b;

            let remaining = self.max_steps.saturating_sub(steps_used);
            if remaining == 0 {
                warn!(t = a, max_steps = self.max_steps, "continuous step budget exhausted");
                return Err(SimulationError::NumericInstability {
                    scheme: Scheme::Continuous,
                    at: TimePoint::Time(a),
                    reason: InstabilityReason::StepBudgetExhausted {
                        max_steps: self.max_steps,
                    },
                });
            }

            let mut piece_eval = Vec::new();
            while cursor < eval_grid.len() && eval_grid[cursor] <= b {
                piece_eval.push(eval_grid[cursor]);
                cursor += 1;
            }
            let recorded = piece_eval.len();
            if piece_eval.last() != Some(&b) {
                piece_eval.push(b);
            }

            let index = a.floor() as i64;
            let active = forcing.filter(|f| f.pulse.fires_at(index));
            let mut rhs = |_t: f64, y: &[f64]| {
                let state = state_of(y);
                let mut d = rates(&state, params);
                if let Some(forcing) = active {
                    d = d + forcing.contribution(index, &state, params);
                }
                d.to_array().to_vec()
            };

            let result = solve_ivp(
                &mut rhs,
                &SolveIvpOptions {
                    t_span: (a, b),
                    y0: &y,
                    method: self.method,
                    t_eval: Some(piece_eval.as_slice()),
                    rtol: self.rtol,
                    atol: ToleranceValue::Scalar(self.atol),
                    first_step: None,
                    max_step: self.max_step,
                    max_steps: remaining,
                },
            )
            .map_err(ConfigurationError::from)?;
            steps_used += result.nsteps;
            nfev += result.nfev;

            for (i, (&t, sample)) in result.t.iter().zip(&result.y).enumerate() {
                let state = state_of(sample);
                check_sample(t, &state)?;
                if i < recorded {
                    times.push(t);
                    states.push(state);
                }
            }

            if !result.success {
                let reason = match result.failure {
                    Some(StepFailure::StepSizeTooSmall) => InstabilityReason::StepSizeTooSmall,
                    Some(StepFailure::StepBudgetExhausted { .. }) => {
                        InstabilityReason::StepBudgetExhausted {
                            max_steps: self.max_steps,
                        }
                    }
                    Some(StepFailure::NonFiniteState) => InstabilityReason::NonFiniteDerivative,
                    Some(StepFailure::RuntimeError(message)) => {
                        InstabilityReason::SolverStopped(message)
                    }
                    None => InstabilityReason::SolverStopped("solver stopped without a cause"),
                };
                warn!(t = result.t_last, %reason, "continuous solver failed");
                return Err(SimulationError::NumericInstability {
                    scheme: Scheme::Continuous,
                    at: TimePoint::Time(result.t_last),
                    reason,
                });
            }

            if let Some(end) = result.y.last() {
                y = [end[0], end[1], end[2], end[3]];
            }
        }

        debug!(steps = steps_used, nfev, "continuous run finished");
        Ok(Trajectory::new(Scheme::Continuous, times, states))
    }
}
