#![forbid(unsafe_code)]

//! Civilian/zombie/military/dead population model.
//!
//! The same vector field is advanced by an explicit Euler recurrence and by
//! an adaptive Runge-Kutta solver, optionally with a periodic pulse applied
//! to one compartment, and every produced state is checked for negative or
//! non-finite populations.
//!
//! ## Module layout
//!
//! | Module       | Contents                                                       |
//! |--------------|----------------------------------------------------------------|
//! | `params`     | [`Parameters`], [`State`], [`Compartment`]                     |
//! | `field`      | [`rates`], attrition split, phase-plane sampling               |
//! | `forcing`    | [`pulse`], [`PulseSpec`], [`Forcing`] and its injection modes  |
//! | `discrete`   | [`DiscreteIntegrator`], [`ValidityPolicy`]                     |
//! | `continuous` | [`ContinuousIntegrator`] on top of `zsim-integrate`            |
//! | `trajectory` | [`Trajectory`] and its labeled [`Series`] view                 |
//! | `runner`     | [`SimulationRunner`], [`Horizon`], [`SimulationOutcome`]       |
//! | `config`     | [`ScenarioConfig`] JSON scenarios                              |
//! | `error`      | [`SimulationError`], [`ConfigurationError`]                    |

pub mod config;
pub mod continuous;
pub mod discrete;
pub mod error;
pub mod field;
pub mod forcing;
pub mod params;
pub mod runner;
pub mod trajectory;

pub use config::{ScenarioConfig, SolverConfig, SolverMethod};
pub use continuous::ContinuousIntegrator;
pub use discrete::{DiscreteIntegrator, MAX_STEP_COUNT, ValidityPolicy};
pub use error::{ConfigurationError, InstabilityReason, Scheme, SimulationError, TimePoint};
pub use field::{Attrition, PhaseSample, attrition, net_growth, phase_plane, rates};
pub use forcing::{Forcing, ForcingMode, PulseSpec, pulse};
pub use params::{COMPARTMENT_LABELS, Compartment, PARAMETER_NAMES, Parameters, State};
pub use runner::{BaselineComparison, Horizon, SchemeReport, SimulationOutcome, SimulationRunner};
pub use trajectory::{Series, Trajectory};
