#![forbid(unsafe_code)]

//! Runs both schemes over the same grid and collects their results side by
//! side. A scheme that fails never hides the other scheme's trajectory.

use std::fmt;

use serde::{Deserialize, Serialize};
use tracing::info;
use zsim_runtime::{LogEntry, LogLevel, LogResult, relative_difference};

use crate::continuous::ContinuousIntegrator;
use crate::discrete::{DiscreteIntegrator, ValidityPolicy, check_step_count};
use crate::error::{ConfigurationError, Scheme, SimulationError};
use crate::forcing::Forcing;
use crate::params::{COMPARTMENT_LABELS, Parameters, State};
use crate::trajectory::Trajectory;

/// Number of steps and step size; the grid is `t_k = k·dt, k = 0..=steps`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Horizon {
    pub steps: usize,
    pub dt: f64,
}

impl Default for Horizon {
    fn default() -> Self {
        Self {
            steps: 1500,
            dt: 1.0,
        }
    }
}

impl Horizon {
    #[must_use]
    pub const fn new(steps: usize, dt: f64) -> Self {
        Self { steps, dt }
    }

    pub fn validate(&self) -> Result<(), ConfigurationError> {
        if !self.dt.is_finite() || self.dt <= 0.0 {
            return Err(ConfigurationError::InvalidTimeStep(self.dt));
        }
        check_step_count(self.steps)
    }

    #[must_use]
    pub fn end(&self) -> f64 {
        self.steps as f64 * self.dt
    }

    #[must_use]
    pub fn grid(&self) -> Vec<f64> {
        (0..=self.steps).map(|k| k as f64 * self.dt).collect()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct SimulationOutcome {
    pub discrete: Result<Trajectory, SimulationError>,
    pub continuous: Result<Trajectory, SimulationError>,
}

impl SimulationOutcome {
    #[must_use]
    pub fn both_succeeded(&self) -> bool {
        self.discrete.is_ok() && self.continuous.is_ok()
    }

    #[must_use]
    pub fn scheme(&self, scheme: Scheme) -> &Result<Trajectory, SimulationError> {
        match scheme {
            Scheme::Discrete => &self.discrete,
            Scheme::Continuous => &self.continuous,
        }
    }

    /// Per-compartment relative difference between the final states, when
    /// both schemes succeeded.
    #[must_use]
    pub fn final_divergence(&self) -> Option<[f64; 4]> {
        let d = self.discrete.as_ref().ok()?.final_state()?.to_array();
        let c = self.continuous.as_ref().ok()?.final_state()?.to_array();
        Some(std::array::from_fn(|i| relative_difference(d[i], c[i])))
    }

    #[must_use]
    pub fn report(&self) -> [SchemeReport; 2] {
        [Scheme::Discrete, Scheme::Continuous].map(|scheme| SchemeReport {
            scheme,
            outcome: match self.scheme(scheme) {
                Ok(traj) => Ok(traj.final_state().copied().unwrap_or(State::ZERO)),
                Err(err) => Err(err.clone()),
            },
        })
    }

    /// One-line JSON summary of this outcome.
    #[must_use]
    pub fn log_entry(&self, event_id: &str) -> LogEntry {
        let (level, result) = match (self.discrete.is_ok(), self.continuous.is_ok()) {
            (true, true) => (LogLevel::Info, LogResult::Pass),
            (false, false) => (LogLevel::Error, LogResult::Fail),
            _ => (LogLevel::Warn, LogResult::Partial),
        };
        let mut entry = LogEntry::new(event_id, "zsim_model::runner", "simulation finished")
            .with_level(level)
            .with_result(result);
        for report in self.report() {
            let value = match &report.outcome {
                Ok(state) => serde_json::json!({
                    "civilians": state.civilians,
                    "zombies": state.zombies,
                    "military": state.military,
                    "dead": state.dead,
                }),
                Err(err) => serde_json::Value::String(err.to_string()),
            };
            entry = entry.with_field(report.scheme.to_string(), value);
        }
        if let Some(divergence) = self.final_divergence() {
            entry = entry.with_field("final_divergence", divergence.to_vec());
        }
        entry
    }
}

/// Final values of one scheme, or why it has none.
#[derive(Debug, Clone, PartialEq)]
pub struct SchemeReport {
    pub scheme: Scheme,
    pub outcome: Result<State, SimulationError>,
}

impl fmt::Display for SchemeReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "[{}]", self.scheme)?;
        match &self.outcome {
            Ok(state) => {
                for (label, value) in COMPARTMENT_LABELS.iter().zip(state.to_array()) {
                    writeln!(f, "{label}: {value:.2}")?;
                }
                Ok(())
            }
            Err(err) => writeln!(f, "failed: {err}"),
        }
    }
}

/// Forced run next to the same run without forcing.
#[derive(Debug, Clone, PartialEq)]
pub struct BaselineComparison {
    pub forced: SimulationOutcome,
    pub baseline: SimulationOutcome,
}

#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct SimulationRunner {
    policy: ValidityPolicy,
    continuous: ContinuousIntegrator,
}

impl SimulationRunner {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Policy for the discrete scheme. The continuous scheme always rejects
    /// negative samples.
    #[must_use]
    pub fn with_policy(mut self, policy: ValidityPolicy) -> Self {
        self.policy = policy;
        self
    }

    #[must_use]
    pub fn with_continuous(mut self, continuous: ContinuousIntegrator) -> Self {
        self.continuous = continuous;
        self
    }

    #[must_use]
    pub fn policy(&self) -> ValidityPolicy {
        self.policy
    }

    #[must_use]
    pub fn continuous(&self) -> &ContinuousIntegrator {
        &self.continuous
    }

    fn validate(
        &self,
        params: &Parameters,
        initial: &State,
        horizon: &Horizon,
        forcing: Option<&Forcing>,
    ) -> Result<(), ConfigurationError> {
        params.validate()?;
        initial.validate_initial()?;
        horizon.validate()?;
        if let Some(forcing) = forcing {
            forcing.validate()?;
        }
        self.continuous.validate()
    }

    /// Run both schemes. Bad inputs fail the whole call before anything is
    /// integrated; integration failures are kept per scheme.
    pub fn execute(
        &self,
        params: &Parameters,
        initial: &State,
        horizon: Horizon,
        forcing: Option<&Forcing>,
    ) -> Result<SimulationOutcome, ConfigurationError> {
        self.validate(params, initial, &horizon, forcing)?;
        let discrete = DiscreteIntegrator::new(horizon.dt)?.with_policy(self.policy);
        let grid = horizon.grid();
        ContinuousIntegrator::validate_grid((0.0, horizon.end()), &grid)?;

        let outcome = SimulationOutcome {
            discrete: discrete.run(initial, params, horizon.steps, forcing),
            continuous: self
                .continuous
                .run(initial, params, (0.0, horizon.end()), &grid, forcing),
        };
        info!(
            steps = horizon.steps,
            dt = horizon.dt,
            forced = forcing.is_some(),
            discrete_ok = outcome.discrete.is_ok(),
            continuous_ok = outcome.continuous.is_ok(),
            "simulation finished"
        );
        Ok(outcome)
    }

    pub fn execute_with_baseline(
        &self,
        params: &Parameters,
        initial: &State,
        horizon: Horizon,
        forcing: &Forcing,
    ) -> Result<BaselineComparison, ConfigurationError> {
        Ok(BaselineComparison {
            forced: self.execute(params, initial, horizon, Some(forcing))?,
            baseline: self.execute(params, initial, horizon, None)?,
        })
    }

    /// One outcome per initial condition, in order.
    pub fn execute_ensemble(
        &self,
        params: &Parameters,
        initials: &[State],
        horizon: Horizon,
        forcing: Option<&Forcing>,
    ) -> Result<Vec<SimulationOutcome>, ConfigurationError> {
        initials
            .iter()
            .map(|initial| self.execute(params, initial, horizon, forcing))
            .collect()
    }
}
