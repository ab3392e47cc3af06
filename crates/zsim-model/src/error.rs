#![forbid(unsafe_code)]

use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use zsim_integrate::IntegrateValidationError;

use crate::params::Compartment;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Scheme {
    Discrete,
    Continuous,
}

impl fmt::Display for Scheme {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Discrete => "discrete",
            Self::Continuous => "continuous",
        })
    }
}

/// Where along a trajectory something happened: a step index for the
/// discrete scheme, a time value for the continuous one.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum TimePoint {
    Step(usize),
    Time(f64),
}

impl fmt::Display for TimePoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Step(k) => write!(f, "step {k}"),
            Self::Time(t) => write!(f, "t = {t}"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InstabilityReason {
    NonFinite { compartment: Compartment },
    /// The field itself evaluated to NaN or an infinity.
    NonFiniteDerivative,
    StepSizeTooSmall,
    StepBudgetExhausted { max_steps: usize },
    SolverStopped(&'static str),
}

impl fmt::Display for InstabilityReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NonFinite { compartment } => write!(f, "{compartment} is not finite"),
            Self::NonFiniteDerivative => f.write_str("derivative is not finite"),
            Self::StepSizeTooSmall => f.write_str("required step size fell below machine precision"),
            Self::StepBudgetExhausted { max_steps } => {
                write!(f, "step budget of {max_steps} exhausted")
            }
            Self::SolverStopped(message) => f.write_str(message),
        }
    }
}

/// Invalid inputs, detected before any integration starts.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ConfigurationError {
    #[error("expected {expected} {what}, got {actual}")]
    WrongArity {
        what: &'static str,
        expected: usize,
        actual: usize,
    },
    #[error("parameter `{name}` must be finite, got {value}")]
    NonFiniteParameter { name: &'static str, value: f64 },
    #[error("initial {compartment} must be finite and non-negative, got {value}")]
    InvalidInitialState {
        compartment: Compartment,
        value: f64,
    },
    #[error("time step must be finite and positive, got {0}")]
    InvalidTimeStep(f64),
    #[error("step count {steps} exceeds the limit of {limit}")]
    TooManySteps { steps: usize, limit: usize },
    #[error("pulse magnitude must be finite, got {0}")]
    NonFinitePulse(f64),
    #[error("evaluation grid must not be empty")]
    EmptyGrid,
    #[error("time span must run forward with finite endpoints, got ({0}, {1})")]
    InvalidSpan(f64, f64),
    #[error("solver configuration rejected: {0}")]
    Solver(#[from] IntegrateValidationError),
    #[error("cannot read scenario `{path}`: {reason}")]
    Io { path: String, reason: String },
    #[error("malformed scenario: {0}")]
    Parse(String),
}

/// A run that started but could not produce a valid trajectory.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum SimulationError {
    #[error("{scheme} trajectory invalid at {at}: {compartment} = {value}")]
    InvalidTrajectory {
        scheme: Scheme,
        at: TimePoint,
        compartment: Compartment,
        value: f64,
    },
    #[error("{scheme} integration unstable at {at}: {reason}")]
    NumericInstability {
        scheme: Scheme,
        at: TimePoint,
        reason: InstabilityReason,
    },
    #[error(transparent)]
    Configuration(#[from] ConfigurationError),
}

impl SimulationError {
    #[must_use]
    pub fn scheme(&self) -> Option<Scheme> {
        match self {
            Self::InvalidTrajectory { scheme, .. } | Self::NumericInstability { scheme, .. } => {
                Some(*scheme)
            }
            Self::Configuration(_) => None,
        }
    }

    #[must_use]
    pub fn at(&self) -> Option<TimePoint> {
        match self {
            Self::InvalidTrajectory { at, .. } | Self::NumericInstability { at, .. } => Some(*at),
            Self::Configuration(_) => None,
        }
    }
}
