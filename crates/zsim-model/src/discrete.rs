#![forbid(unsafe_code)]

//! Explicit Euler recurrence `x[k] = x[k-1] + dt·F(x[k-1]) + forcing(k)`.

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::error::{ConfigurationError, InstabilityReason, Scheme, SimulationError, TimePoint};
use crate::field::rates;
use crate::forcing::Forcing;
use crate::params::{Parameters, State};
use crate::trajectory::Trajectory;

/// Largest step count a single run accepts; every step is stored.
pub const MAX_STEP_COUNT: usize = 10_000_000;

pub(crate) fn check_step_count(steps: usize) -> Result<(), ConfigurationError> {
    if steps > MAX_STEP_COUNT {
        return Err(ConfigurationError::TooManySteps {
            steps,
            limit: MAX_STEP_COUNT,
        });
    }
    Ok(())
}

/// What to do when a step produces a negative compartment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ValidityPolicy {
    /// Stop at the first offending step.
    #[default]
    Abort,
    /// Floor negative compartments to zero and continue.
    Clamp,
}

impl ValidityPolicy {
    pub fn parse(name: &str) -> Option<Self> {
        match name.to_ascii_lowercase().as_str() {
            "abort" => Some(Self::Abort),
            "clamp" => Some(Self::Clamp),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DiscreteIntegrator {
    dt: f64,
    policy: ValidityPolicy,
}

impl Default for DiscreteIntegrator {
    fn default() -> Self {
        Self {
            dt: 1.0,
            policy: ValidityPolicy::Abort,
        }
    }
}

impl DiscreteIntegrator {
    pub fn new(dt: f64) -> Result<Self, ConfigurationError> {
        if !dt.is_finite() || dt <= 0.0 {
            return Err(ConfigurationError::InvalidTimeStep(dt));
        }
        Ok(Self {
            dt,
            ..Self::default()
        })
    }

    #[must_use]
    pub fn with_policy(mut self, policy: ValidityPolicy) -> Self {
        self.policy = policy;
        self
    }

    #[must_use]
    pub fn dt(&self) -> f64 {
        self.dt
    }

    #[must_use]
    pub fn policy(&self) -> ValidityPolicy {
        self.policy
    }

    /// Advance `step_count` steps from `initial`.
    ///
    /// `step_count` may not exceed [`MAX_STEP_COUNT`].
    ///
    /// The trajectory holds `step_count + 1` states, the first being
    /// `initial`. Impulse forcing is added unscaled; rate forcing is scaled
    /// by `dt` together with the field.
    pub fn run(
        &self,
        initial: &State,
        params: &Parameters,
        step_count: usize,
        forcing: Option<&Forcing>,
    ) -> Result<Trajectory, SimulationError> {
        check_step_count(step_count)?;
        params.validate()?;
        initial.validate_initial()?;
        if let Some(forcing) = forcing {
            forcing.validate()?;
        }

        debug!(steps = step_count, dt = self.dt, policy = ?self.policy, "discrete run start");

        let mut times = Vec::with_capacity(step_count + 1);
        let mut states = Vec::with_capacity(step_count + 1);
        times.push(0.0);
        states.push(*initial);

        let mut state = *initial;
        for k in 1..=step_count {
            let mut next = state + rates(&state, params) * self.dt;
            if let Some(forcing) = forcing {
                let index = i64::try_from(k).unwrap_or(i64::MAX);
                let kick = forcing.contribution(index, &state, params);
                next = if forcing.is_rate() {
                    next + kick * self.dt
                } else {
                    next + kick
                };
            }

            if let Some(compartment) = next.first_non_finite() {
                warn!(step = k, %compartment, "discrete state is not finite");
                return Err(SimulationError::NumericInstability {
                    scheme: Scheme::Discrete,
                    at: TimePoint::Step(k),
                    reason: InstabilityReason::NonFinite { compartment },
                });
            }

            if let Some((compartment, value)) = next.first_negative() {
                match self.policy {
                    ValidityPolicy::Abort => {
                        warn!(step = k, %compartment, value, "discrete trajectory went negative");
                        return Err(SimulationError::InvalidTrajectory {
                            scheme: Scheme::Discrete,
                            at: TimePoint::Step(k),
                            compartment,
                            value,
                        });
                    }
                    ValidityPolicy::Clamp => next = next.clamp_non_negative(),
                }
            }

            state = next;
            times.push(k as f64 * self.dt);
            states.push(state);
        }

        debug!(steps = step_count, "discrete run finished");
        Ok(Trajectory::new(Scheme::Discrete, times, states))
    }
}
