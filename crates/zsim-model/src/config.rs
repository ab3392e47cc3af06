#![forbid(unsafe_code)]

//! JSON scenario files.
//!
//! Every field is optional. A missing field takes its default, and the
//! defaults together describe the coexistence scenario.

use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};
use zsim_integrate::SolverKind;

use crate::continuous::ContinuousIntegrator;
use crate::discrete::ValidityPolicy;
use crate::error::ConfigurationError;
use crate::forcing::Forcing;
use crate::params::{Parameters, State};
use crate::runner::{Horizon, SimulationOutcome, SimulationRunner};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SolverMethod {
    Rk23,
    #[default]
    Rk45,
}

impl From<SolverMethod> for SolverKind {
    fn from(method: SolverMethod) -> Self {
        match method {
            SolverMethod::Rk23 => Self::Rk23,
            SolverMethod::Rk45 => Self::Rk45,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SolverConfig {
    pub method: SolverMethod,
    pub rtol: f64,
    pub atol: f64,
    /// Unbounded when absent.
    pub max_step: Option<f64>,
    pub max_steps: usize,
}

impl Default for SolverConfig {
    fn default() -> Self {
        let defaults = ContinuousIntegrator::default();
        Self {
            method: SolverMethod::Rk45,
            rtol: defaults.rtol(),
            atol: defaults.atol(),
            max_step: None,
            max_steps: defaults.max_steps(),
        }
    }
}

impl SolverConfig {
    #[must_use]
    pub fn integrator(&self) -> ContinuousIntegrator {
        ContinuousIntegrator::new()
            .with_method(self.method.into())
            .with_tolerances(self.rtol, self.atol)
            .with_max_step(self.max_step.unwrap_or(f64::INFINITY))
            .with_max_steps(self.max_steps)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ScenarioConfig {
    pub parameters: Parameters,
    pub initial: State,
    pub horizon: Horizon,
    pub forcing: Option<Forcing>,
    pub policy: ValidityPolicy,
    pub solver: SolverConfig,
}

impl Default for ScenarioConfig {
    fn default() -> Self {
        Self {
            parameters: Parameters::coexistence(),
            initial: State::new(48.0, 2.0, 50.0, 0.0),
            horizon: Horizon::default(),
            forcing: None,
            policy: ValidityPolicy::Abort,
            solver: SolverConfig::default(),
        }
    }
}

impl ScenarioConfig {
    pub fn from_json_str(text: &str) -> Result<Self, ConfigurationError> {
        serde_json::from_str(text).map_err(|err| ConfigurationError::Parse(err.to_string()))
    }

    pub fn load(path: &Path) -> Result<Self, ConfigurationError> {
        let text = fs::read_to_string(path).map_err(|err| ConfigurationError::Io {
            path: path.display().to_string(),
            reason: err.to_string(),
        })?;
        Self::from_json_str(&text)
    }

    /// Runner configured from the policy and solver sections. Validates
    /// everything the runner would reject.
    pub fn build_runner(&self) -> Result<SimulationRunner, ConfigurationError> {
        self.parameters.validate()?;
        self.initial.validate_initial()?;
        self.horizon.validate()?;
        if let Some(forcing) = &self.forcing {
            forcing.validate()?;
        }
        let continuous = self.solver.integrator();
        continuous.validate()?;
        Ok(SimulationRunner::new()
            .with_policy(self.policy)
            .with_continuous(continuous))
    }

    pub fn run(&self) -> Result<SimulationOutcome, ConfigurationError> {
        self.build_runner()?.execute(
            &self.parameters,
            &self.initial,
            self.horizon,
            self.forcing.as_ref(),
        )
    }
}
