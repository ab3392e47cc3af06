#![forbid(unsafe_code)]

//! Right-hand side of the C/Z/M/D model, shared by both integrators.
//!
//! ```text
//! dC = (α − β − E)·C − β_CZ·C·Z
//! dZ = (β_CZ − ε_CZ)·C·Z + ρ·β·(C + M) + (β_MZ − γ_MZ)·Z·M
//! dM = E·C − β·M − β_MZ·Z·M
//! dD = (1 − ρ)·β·(C + M) + ε_CZ·C·Z + γ_MZ·Z·M
//! ```

use serde::Serialize;

use crate::params::{Compartment, Parameters, State};

/// Instantaneous rate of change of every compartment.
#[must_use]
pub fn rates(state: &State, params: &Parameters) -> State {
    let State {
        civilians: c,
        zombies: z,
        military: m,
        dead: _,
    } = *state;
    let attrition = attrition(state, params);
    let cz = c * z;
    let zm = z * m;

    State {
        civilians: (params.alpha - params.beta - params.enlistment) * c - params.beta_cz * cz,
        zombies: (params.beta_cz - params.epsilon_cz) * cz
            + attrition.reanimated
            + (params.beta_mz - params.gamma_mz) * zm,
        military: params.enlistment * c - params.beta * m - params.beta_mz * zm,
        dead: attrition.to_dead + params.epsilon_cz * cz + params.gamma_mz * zm,
    }
}

/// Split of the attrition flow β·(C + M).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Attrition {
    pub total: f64,
    /// Share rising again as zombies, ρ·β·(C + M).
    pub reanimated: f64,
    /// Share staying dead, (1 − ρ)·β·(C + M).
    pub to_dead: f64,
}

#[must_use]
pub fn attrition(state: &State, params: &Parameters) -> Attrition {
    let total = params.beta * (state.civilians + state.military);
    Attrition {
        total,
        reanimated: params.rho * total,
        to_dead: (1.0 - params.rho) * total,
    }
}

/// Rate of change of the total population. Only civilian births change it.
#[must_use]
pub fn net_growth(state: &State, params: &Parameters) -> f64 {
    params.alpha * state.civilians
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct PhaseSample {
    pub x: f64,
    pub y: f64,
    pub dx: f64,
    pub dy: f64,
}

/// Sample the field over a grid of two compartments, holding the other two
/// at their values in `fixed`.
#[must_use]
pub fn phase_plane(
    params: &Parameters,
    axes: (Compartment, Compartment),
    fixed: &State,
    xs: &[f64],
    ys: &[f64],
) -> Vec<PhaseSample> {
    let (x_axis, y_axis) = axes;
    let mut samples = Vec::with_capacity(xs.len() * ys.len());
    for &y in ys {
        for &x in xs {
            let point = fixed.with(x_axis, x).with(y_axis, y);
            let d = rates(&point, params);
            samples.push(PhaseSample {
                x,
                y,
                dx: d.get(x_axis),
                dy: d.get(y_axis),
            });
        }
    }
    samples
}
