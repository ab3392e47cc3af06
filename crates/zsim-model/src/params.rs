#![forbid(unsafe_code)]

use std::fmt;
use std::ops::{Add, Mul};

use serde::{Deserialize, Serialize};

use crate::error::ConfigurationError;

/// Display labels, in compartment order.
pub const COMPARTMENT_LABELS: [&str; 4] = ["Civilians", "Zombies", "Military", "Dead"];

pub const PARAMETER_NAMES: [&str; 8] = [
    "alpha",
    "beta",
    "beta_cz",
    "epsilon_cz",
    "beta_mz",
    "gamma_mz",
    "enlistment",
    "rho",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Compartment {
    Civilians,
    Zombies,
    Military,
    Dead,
}

impl Compartment {
    pub const ALL: [Self; 4] = [Self::Civilians, Self::Zombies, Self::Military, Self::Dead];

    #[must_use]
    pub const fn index(self) -> usize {
        match self {
            Self::Civilians => 0,
            Self::Zombies => 1,
            Self::Military => 2,
            Self::Dead => 3,
        }
    }

    #[must_use]
    pub const fn label(self) -> &'static str {
        COMPARTMENT_LABELS[self.index()]
    }

    pub fn parse(name: &str) -> Option<Self> {
        match name.to_ascii_lowercase().as_str() {
            "civilians" | "c" => Some(Self::Civilians),
            "zombies" | "z" => Some(Self::Zombies),
            "military" | "m" => Some(Self::Military),
            "dead" | "d" => Some(Self::Dead),
            _ => None,
        }
    }
}

impl fmt::Display for Compartment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Rate constants of the C/Z/M/D model.
///
/// No sign constraint is imposed: combinations that drive a compartment
/// negative are caught while integrating, not here.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Parameters {
    /// Civilian birth rate.
    pub alpha: f64,
    /// Background attrition of civilians and military.
    pub beta: f64,
    /// Civilian infection on contact with zombies.
    pub beta_cz: f64,
    /// Zombies destroyed by civilians.
    pub epsilon_cz: f64,
    /// Military infection on contact with zombies.
    pub beta_mz: f64,
    /// Zombies destroyed by the military.
    pub gamma_mz: f64,
    /// Civilians enlisting into the military.
    pub enlistment: f64,
    /// Share of attrition that rises again as zombies.
    pub rho: f64,
}

impl Default for Parameters {
    fn default() -> Self {
        Self::coexistence()
    }
}

impl Parameters {
    /// The reference parameter set under which all four populations coexist.
    #[must_use]
    pub const fn coexistence() -> Self {
        Self {
            alpha: 0.033,
            beta: 0.009,
            beta_cz: 0.009,
            epsilon_cz: 0.006,
            beta_mz: 0.0009,
            gamma_mz: 0.022,
            enlistment: 0.0015,
            rho: 0.009,
        }
    }

    /// Two-compartment civilian/zombie model: no military, infection rate
    /// `gamma`, zombies destroyed at rate `delta`.
    #[must_use]
    pub const fn civilian_zombie(alpha: f64, beta: f64, rho: f64, gamma: f64, delta: f64) -> Self {
        Self {
            alpha,
            beta,
            beta_cz: gamma,
            epsilon_cz: delta,
            beta_mz: 0.0,
            gamma_mz: 0.0,
            enlistment: 0.0,
            rho,
        }
    }

    /// Build from eight values in declaration order.
    pub fn from_slice(values: &[f64]) -> Result<Self, ConfigurationError> {
        let &[
            alpha,
            beta,
            beta_cz,
            epsilon_cz,
            beta_mz,
            gamma_mz,
            enlistment,
            rho,
        ] = values
        else {
            return Err(ConfigurationError::WrongArity {
                what: "parameters",
                expected: PARAMETER_NAMES.len(),
                actual: values.len(),
            });
        };
        let params = Self {
            alpha,
            beta,
            beta_cz,
            epsilon_cz,
            beta_mz,
            gamma_mz,
            enlistment,
            rho,
        };
        params.validate()?;
        Ok(params)
    }

    #[must_use]
    pub const fn to_array(&self) -> [f64; 8] {
        [
            self.alpha,
            self.beta,
            self.beta_cz,
            self.epsilon_cz,
            self.beta_mz,
            self.gamma_mz,
            self.enlistment,
            self.rho,
        ]
    }

    pub fn validate(&self) -> Result<(), ConfigurationError> {
        match PARAMETER_NAMES
            .iter()
            .zip(self.to_array())
            .find(|(_, value)| !value.is_finite())
        {
            Some((&name, value)) => Err(ConfigurationError::NonFiniteParameter { name, value }),
            None => Ok(()),
        }
    }
}

/// Population of each compartment at one instant.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct State {
    pub civilians: f64,
    pub zombies: f64,
    pub military: f64,
    pub dead: f64,
}

impl State {
    pub const ZERO: Self = Self::new(0.0, 0.0, 0.0, 0.0);

    #[must_use]
    pub const fn new(civilians: f64, zombies: f64, military: f64, dead: f64) -> Self {
        Self {
            civilians,
            zombies,
            military,
            dead,
        }
    }

    pub fn from_slice(values: &[f64]) -> Result<Self, ConfigurationError> {
        match *values {
            [civilians, zombies, military, dead] => {
                Ok(Self::new(civilians, zombies, military, dead))
            }
            _ => Err(ConfigurationError::WrongArity {
                what: "compartments",
                expected: 4,
                actual: values.len(),
            }),
        }
    }

    #[must_use]
    pub const fn from_array(values: [f64; 4]) -> Self {
        Self::new(values[0], values[1], values[2], values[3])
    }

    #[must_use]
    pub const fn to_array(self) -> [f64; 4] {
        [self.civilians, self.zombies, self.military, self.dead]
    }

    #[must_use]
    pub const fn get(&self, compartment: Compartment) -> f64 {
        match compartment {
            Compartment::Civilians => self.civilians,
            Compartment::Zombies => self.zombies,
            Compartment::Military => self.military,
            Compartment::Dead => self.dead,
        }
    }

    #[must_use]
    pub const fn with(mut self, compartment: Compartment, value: f64) -> Self {
        match compartment {
            Compartment::Civilians => self.civilians = value,
            Compartment::Zombies => self.zombies = value,
            Compartment::Military => self.military = value,
            Compartment::Dead => self.dead = value,
        }
        self
    }

    #[must_use]
    pub fn total(&self) -> f64 {
        self.to_array().iter().sum()
    }

    /// First compartment holding NaN or an infinity.
    #[must_use]
    pub fn first_non_finite(&self) -> Option<Compartment> {
        Compartment::ALL
            .into_iter()
            .find(|&c| !self.get(c).is_finite())
    }

    /// First compartment below zero, with its value.
    #[must_use]
    pub fn first_negative(&self) -> Option<(Compartment, f64)> {
        Compartment::ALL
            .into_iter()
            .map(|c| (c, self.get(c)))
            .find(|&(_, value)| value < 0.0)
    }

    #[must_use]
    pub fn clamp_non_negative(self) -> Self {
        Self::from_array(self.to_array().map(|v| v.max(0.0)))
    }

    /// Initial states must be finite and non-negative.
    pub fn validate_initial(&self) -> Result<(), ConfigurationError> {
        match Compartment::ALL
            .into_iter()
            .map(|c| (c, self.get(c)))
            .find(|&(_, value)| !value.is_finite() || value < 0.0)
        {
            Some((compartment, value)) => Err(ConfigurationError::InvalidInitialState {
                compartment,
                value,
            }),
            None => Ok(()),
        }
    }
}

impl Add for State {
    type Output = Self;

    fn add(self, rhs: Self) -> Self {
        Self::new(
            self.civilians + rhs.civilians,
            self.zombies + rhs.zombies,
            self.military + rhs.military,
            self.dead + rhs.dead,
        )
    }
}

impl Mul<f64> for State {
    type Output = Self;

    fn mul(self, rhs: f64) -> Self {
        Self::from_array(self.to_array().map(|v| v * rhs))
    }
}
