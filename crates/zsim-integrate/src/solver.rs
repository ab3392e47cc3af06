#![forbid(unsafe_code)]

use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OdeSolverState {
    Running,
    Finished,
    Failed,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StepOutcome {
    pub message: Option<String>,
    pub state: OdeSolverState,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StepFailure {
    #[error("{0}")]
    RuntimeError(&'static str),
    #[error("required step size is less than spacing between numbers.")]
    StepSizeTooSmall,
    #[error("solver produced a non-finite state.")]
    NonFiniteState,
    #[error("step budget of {max_steps} steps exhausted.")]
    StepBudgetExhausted { max_steps: usize },
}

/// Stage derivatives of the last accepted step together with the
/// interpolation matrix of the method that produced them.
///
/// Row `j` of `p` holds the coefficients of `x, x^2, ...` weighting stage
/// `k[j]`, so `y(t_old + x h) = y_old + h * sum_j k[j] * sum_m p[j][m] x^(m+1)`.
#[derive(Debug, Clone, Copy)]
pub struct RkStages<'a> {
    pub k: &'a [Vec<f64>],
    pub p: &'static [&'static [f64]],
}

/// Interpolant over the last accepted step.
///
/// Uses the method's own continuous extension when stages are available
/// and falls back to cubic Hermite interpolation of the endpoint values and
/// derivatives otherwise.
#[derive(Debug, Clone, Copy)]
pub struct DenseSegment<'a> {
    pub t_old: f64,
    pub t: f64,
    pub y_old: &'a [f64],
    pub f_old: &'a [f64],
    pub y: &'a [f64],
    pub f: &'a [f64],
    pub stages: Option<RkStages<'a>>,
}

impl DenseSegment<'_> {
    /// Evaluate the interpolant at `te`, which should lie between `t_old` and `t`.
    #[must_use]
    pub fn eval(&self, te: f64) -> Vec<f64> {
        let h = self.t - self.t_old;
        if h == 0.0 {
            return self.y.to_vec();
        }
        let x = (te - self.t_old) / h;
        match self.stages {
            Some(stages) if !stages.p.is_empty() => self.eval_stages(&stages, h, x),
            _ => self.eval_hermite(h, x),
        }
    }

    fn eval_stages(&self, stages: &RkStages<'_>, h: f64, x: f64) -> Vec<f64> {
        let mut out = self.y_old.to_vec();
        for (kj, row) in stages.k.iter().zip(stages.p) {
            let mut power = 1.0;
            let mut weight = 0.0;
            for &coeff in *row {
                power *= x;
                weight += coeff * power;
            }
            if weight != 0.0 {
                for (o, v) in out.iter_mut().zip(kj) {
                    *o += h * weight * v;
                }
            }
        }
        out
    }

    fn eval_hermite(&self, h: f64, s: f64) -> Vec<f64> {
        let s2 = s * s;
        let s3 = s2 * s;
        let h00 = 2.0 * s3 - 3.0 * s2 + 1.0;
        let h10 = s3 - 2.0 * s2 + s;
        let h01 = -2.0 * s3 + 3.0 * s2;
        let h11 = s3 - s2;
        (0..self.y.len())
            .map(|i| {
                h00 * self.y_old[i]
                    + h10 * h * self.f_old[i]
                    + h01 * self.y[i]
                    + h11 * h * self.f[i]
            })
            .collect()
    }
}

pub trait OdeSolver {
    fn state(&self) -> OdeSolverState;

    fn t(&self) -> f64;

    fn y(&self) -> &[f64];

    /// Advance by one accepted step, evaluating the right-hand side through `fun`.
    fn step_with<F>(&mut self, fun: &mut F) -> Result<StepOutcome, StepFailure>
    where
        F: FnMut(f64, &[f64]) -> Vec<f64>;

    /// Interpolant over the most recent accepted step, if any.
    fn dense_segment(&self) -> Option<DenseSegment<'_>>;
}
