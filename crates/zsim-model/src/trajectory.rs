#![forbid(unsafe_code)]

use serde::Serialize;

use crate::error::Scheme;
use crate::params::{COMPARTMENT_LABELS, Compartment, State};

/// Time-ordered states produced by one scheme. Read-only once built.
#[derive(Debug, Clone, PartialEq)]
pub struct Trajectory {
    scheme: Scheme,
    times: Vec<f64>,
    states: Vec<State>,
    valid: bool,
}

impl Trajectory {
    /// `times` and `states` must have equal length.
    pub(crate) fn new(scheme: Scheme, times: Vec<f64>, states: Vec<State>) -> Self {
        debug_assert_eq!(times.len(), states.len());
        let valid = states
            .iter()
            .all(|s| s.first_non_finite().is_none() && s.first_negative().is_none());
        Self {
            scheme,
            times,
            states,
            valid,
        }
    }

    #[must_use]
    pub fn scheme(&self) -> Scheme {
        self.scheme
    }

    #[must_use]
    pub fn times(&self) -> &[f64] {
        &self.times
    }

    #[must_use]
    pub fn states(&self) -> &[State] {
        &self.states
    }

    /// True iff every state is finite and non-negative.
    #[must_use]
    pub fn is_valid(&self) -> bool {
        self.valid
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.states.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.states.is_empty()
    }

    #[must_use]
    pub fn initial(&self) -> Option<&State> {
        self.states.first()
    }

    #[must_use]
    pub fn final_state(&self) -> Option<&State> {
        self.states.last()
    }

    /// Values of one compartment over time.
    #[must_use]
    pub fn column(&self, compartment: Compartment) -> Vec<f64> {
        self.states.iter().map(|s| s.get(compartment)).collect()
    }

    /// Labeled view for plotting or reporting collaborators.
    #[must_use]
    pub fn series(&self) -> Series<'_> {
        Series {
            scheme: self.scheme,
            labels: COMPARTMENT_LABELS,
            time_grid: &self.times,
            states: &self.states,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Series<'a> {
    pub scheme: Scheme,
    pub labels: [&'static str; 4],
    pub time_grid: &'a [f64],
    pub states: &'a [State],
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_trajectory_validity_computed_once() {
        let ok = Trajectory::new(
            Scheme::Discrete,
            vec![0.0, 1.0],
            vec![State::new(1.0, 0.0, 0.0, 0.0), State::new(0.5, 0.5, 0.0, 0.0)],
        );
        assert!(ok.is_valid());
        assert_eq!(ok.len(), 2);
        assert_eq!(ok.column(Compartment::Zombies), vec![0.0, 0.5]);

        let bad = Trajectory::new(
            Scheme::Continuous,
            vec![0.0, 1.0],
            vec![State::ZERO, State::new(0.0, -1e-3, 0.0, 0.0)],
        );
        assert!(!bad.is_valid());
    }

    #[test]
    fn test_trajectory_series_serializes_labels() {
        let traj = Trajectory::new(Scheme::Discrete, vec![0.0], vec![State::new(1.0, 2.0, 3.0, 4.0)]);
        let json = serde_json::to_value(traj.series()).expect("series serializes");
        assert_eq!(json["scheme"], "discrete");
        assert_eq!(json["labels"][2], "Military");
        assert_eq!(json["states"][0]["dead"], 4.0);
    }
}
