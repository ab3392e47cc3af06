#![forbid(unsafe_code)]

//! Periodic exogenous pulses.
//!
//! A pulse fires at every positive integer time index that is a multiple of
//! the interval. What a firing pulse does to the state is chosen by the
//! [`ForcingMode`]; both integrators apply the result at the same point,
//! after the base field and before the step is accepted.

use serde::{Deserialize, Serialize};

use crate::error::ConfigurationError;
use crate::params::{Compartment, Parameters, State};

/// `magnitude` when `interval > 0`, `t > 0` and `t` is a multiple of
/// `interval`; zero otherwise.
#[must_use]
pub fn pulse(t: i64, magnitude: f64, interval: u64) -> f64 {
    if interval > 0 && t > 0 && t.unsigned_abs().is_multiple_of(interval) {
        magnitude
    } else {
        0.0
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PulseSpec {
    pub magnitude: f64,
    /// Steps between pulses; zero disables the pulse.
    pub interval: u64,
}

impl PulseSpec {
    #[must_use]
    pub const fn new(magnitude: f64, interval: u64) -> Self {
        Self {
            magnitude,
            interval,
        }
    }

    #[must_use]
    pub fn at(&self, t: i64) -> f64 {
        pulse(t, self.magnitude, self.interval)
    }

    #[must_use]
    pub fn fires_at(&self, t: i64) -> bool {
        self.magnitude != 0.0 && self.at(t) != 0.0
    }

    /// Times in the open interval `(t0, tf)` where the pulse switches on or
    /// off, ascending and produced on demand.
    pub fn switch_edges(&self, t0: f64, tf: f64) -> impl Iterator<Item = f64> + use<> {
        let active = self.interval != 0 && self.magnitude != 0.0 && tf > t0;
        let interval = self.interval as f64;
        let first = if active {
            ((t0 - 1.0) / interval).floor().max(1.0)
        } else {
            0.0
        };
        let mut last = f64::NEG_INFINITY;
        (0_u64..)
            .map(move |i| (first + i as f64) * interval)
            .take_while(move |&on| active && on < tf)
            .flat_map(|on| [on, on + 1.0])
            .filter(move |&edge| {
                let keep = edge > t0 && edge < tf && edge > last;
                if keep {
                    last = edge;
                }
                keep
            })
    }

    /// [`switch_edges`](Self::switch_edges), collected.
    #[must_use]
    pub fn switch_times(&self, t0: f64, tf: f64) -> Vec<f64> {
        self.switch_edges(t0, tf).collect()
    }
}

/// How a firing pulse changes the state.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum ForcingMode {
    /// Adds `magnitude` to the target.
    Additive { target: Compartment },
    /// Removes the fraction `magnitude` of the target.
    Subtractive { target: Compartment },
    /// Scales the infection coefficient β_CZ by `1 − magnitude`.
    MultiplicativeDampening,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Forcing {
    #[serde(flatten)]
    pub pulse: PulseSpec,
    #[serde(flatten)]
    pub mode: ForcingMode,
}

impl Forcing {
    #[must_use]
    pub const fn additive(target: Compartment, magnitude: f64, interval: u64) -> Self {
        Self {
            pulse: PulseSpec::new(magnitude, interval),
            mode: ForcingMode::Additive { target },
        }
    }

    #[must_use]
    pub const fn subtractive(target: Compartment, fraction: f64, interval: u64) -> Self {
        Self {
            pulse: PulseSpec::new(fraction, interval),
            mode: ForcingMode::Subtractive { target },
        }
    }

    #[must_use]
    pub const fn dampening(factor: f64, interval: u64) -> Self {
        Self {
            pulse: PulseSpec::new(factor, interval),
            mode: ForcingMode::MultiplicativeDampening,
        }
    }

    pub fn validate(&self) -> Result<(), ConfigurationError> {
        if self.pulse.magnitude.is_finite() {
            Ok(())
        } else {
            Err(ConfigurationError::NonFinitePulse(self.pulse.magnitude))
        }
    }

    /// True when the contribution is a rate to be scaled by the step size
    /// rather than an impulse.
    #[must_use]
    pub const fn is_rate(&self) -> bool {
        matches!(self.mode, ForcingMode::MultiplicativeDampening)
    }

    /// Change in state contributed at time index `t`.
    #[must_use]
    pub fn contribution(&self, t: i64, state: &State, params: &Parameters) -> State {
        let magnitude = self.pulse.at(t);
        if magnitude == 0.0 {
            return State::ZERO;
        }
        match self.mode {
            ForcingMode::Additive { target } => State::ZERO.with(target, magnitude),
            ForcingMode::Subtractive { target } => {
                State::ZERO.with(target, -magnitude * state.get(target))
            }
            ForcingMode::MultiplicativeDampening => {
                let spared = magnitude * params.beta_cz * state.civilians * state.zombies;
                State::ZERO
                    .with(Compartment::Civilians, spared)
                    .with(Compartment::Zombies, -spared)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_forcing_pulse_fires_on_positive_multiples_only() {
        let fired: Vec<i64> = (0..=30).filter(|&t| pulse(t, 5.0, 10) != 0.0).collect();
        assert_eq!(fired, vec![10, 20, 30]);
        assert_eq!(pulse(20, 5.0, 10), 5.0);
    }

    #[test]
    fn test_forcing_pulse_zero_interval_and_non_positive_t() {
        assert!((0..100).all(|t| pulse(t, 5.0, 0) == 0.0));
        assert_eq!(pulse(0, 5.0, 1), 0.0);
        assert_eq!(pulse(-10, 5.0, 10), 0.0);
        assert_eq!(pulse(1, 5.0, 1), 5.0);
    }

    #[test]
    fn test_forcing_switch_times_bracket_each_pulse() {
        let spec = PulseSpec::new(1.0, 10);
        assert_eq!(spec.switch_times(0.0, 30.0), vec![10.0, 11.0, 20.0, 21.0]);
        assert_eq!(spec.switch_times(0.0, 30.5), vec![10.0, 11.0, 20.0, 21.0, 30.0]);
        assert_eq!(spec.switch_times(10.5, 25.0), vec![11.0, 20.0, 21.0]);
    }

    #[test]
    fn test_forcing_switch_times_unit_interval_merges_edges() {
        let spec = PulseSpec::new(1.0, 1);
        assert_eq!(spec.switch_times(0.0, 4.0), vec![1.0, 2.0, 3.0]);
        assert!(PulseSpec::new(0.0, 1).switch_times(0.0, 4.0).is_empty());
        assert!(PulseSpec::new(1.0, 0).switch_times(0.0, 4.0).is_empty());
    }

    #[test]
    fn test_forcing_switch_edges_are_lazy_on_huge_spans() {
        let mut edges = PulseSpec::new(1.0, 1).switch_edges(0.0, 1e15);
        assert_eq!(edges.by_ref().take(4).collect::<Vec<_>>(), vec![1.0, 2.0, 3.0, 4.0]);
        assert_eq!(edges.next(), Some(5.0));
        assert_eq!(PulseSpec::new(1.0, 0).switch_edges(0.0, 1e15).next(), None);
    }

    #[test]
    fn test_forcing_contribution_by_mode() {
        let params = Parameters::coexistence();
        let state = State::new(40.0, 10.0, 20.0, 0.0);

        let add = Forcing::additive(Compartment::Military, 10.0, 5);
        assert_eq!(add.contribution(5, &state, &params), State::new(0.0, 0.0, 10.0, 0.0));
        assert_eq!(add.contribution(4, &state, &params), State::ZERO);

        let cull = Forcing::subtractive(Compartment::Zombies, 0.5, 5);
        assert_eq!(cull.contribution(10, &state, &params), State::new(0.0, -5.0, 0.0, 0.0));

        let damp = Forcing::dampening(0.5, 5);
        let spared = 0.5 * params.beta_cz * 40.0 * 10.0;
        assert_eq!(
            damp.contribution(15, &state, &params),
            State::new(spared, -spared, 0.0, 0.0)
        );
        assert!(damp.is_rate());
        assert!(!add.is_rate());
    }

    #[test]
    fn test_forcing_validate_rejects_non_finite_magnitude() {
        let forcing = Forcing::additive(Compartment::Civilians, f64::NAN, 10);
        assert!(matches!(
            forcing.validate(),
            Err(ConfigurationError::NonFinitePulse(_))
        ));
    }

    #[test]
    fn test_forcing_serde_flat_layout() {
        let forcing = Forcing::additive(Compartment::Military, 10.0, 300);
        let json = serde_json::to_value(forcing).expect("serialize");
        assert_eq!(
            json,
            serde_json::json!({
                "magnitude": 10.0,
                "interval": 300,
                "mode": "additive",
                "target": "military"
            })
        );
        let back: Forcing = serde_json::from_value(json).expect("deserialize");
        assert_eq!(back, forcing);

        let damp: Forcing = serde_json::from_str(
            r#"{"magnitude": 0.3, "interval": 7, "mode": "multiplicative_dampening"}"#,
        )
        .expect("dampening parses");
        assert_eq!(damp, Forcing::dampening(0.3, 7));
    }
}
