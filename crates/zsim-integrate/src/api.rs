#![forbid(unsafe_code)]

use crate::rk::{ButcherTableau, RK23_TABLEAU, RK45_TABLEAU, RkSolver, RkSolverConfig};
use crate::solver::{OdeSolver, OdeSolverState, StepFailure};
use crate::validation::{ToleranceValue, validate_t_eval};
use crate::{IntegrateValidationError, validate_first_step, validate_max_step};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SolverKind {
    Rk23,
    #[default]
    Rk45,
}

impl SolverKind {
    #[must_use]
    pub fn tableau(self) -> &'static ButcherTableau {
        match self {
            Self::Rk23 => &RK23_TABLEAU,
            Self::Rk45 => &RK45_TABLEAU,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct SolveIvpOptions<'a> {
    pub t_span: (f64, f64),
    pub y0: &'a [f64],
    pub method: SolverKind,
    /// Sample points; when `None` every accepted step is reported.
    pub t_eval: Option<&'a [f64]>,
    pub rtol: f64,
    pub atol: ToleranceValue,
    pub first_step: Option<f64>,
    pub max_step: f64,
    /// Upper bound on accepted steps before the solve is abandoned.
    pub max_steps: usize,
}

impl Default for SolveIvpOptions<'_> {
    fn default() -> Self {
        Self {
            t_span: (0.0, 0.0),
            y0: &[],
            method: SolverKind::Rk45,
            t_eval: None,
            rtol: 1e-3,
            atol: ToleranceValue::Scalar(1e-6),
            first_step: None,
            max_step: f64::INFINITY,
            max_steps: 100_000,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct SolveIvpResult {
    pub t: Vec<f64>,
    pub y: Vec<Vec<f64>>,
    pub nfev: usize,
    pub nsteps: usize,
    pub status: i32,
    pub message: String,
    pub success: bool,
    /// Why the solve stopped early, if it did.
    pub failure: Option<StepFailure>,
    /// Time reached by the last accepted step.
    pub t_last: f64,
}

const MSG_SUCCESS: &str = "The solver successfully reached the end of the integration interval.";

/// Solve an initial value problem for a system of ODEs.
///
/// Input problems (bad tolerances, step bounds or `t_eval`) are returned as
/// `Err`. Failures during integration are reported in the result with
/// `success == false`, keeping the samples produced before the failure.
pub fn solve_ivp<F>(
    fun: &mut F,
    options: &SolveIvpOptions<'_>,
) -> Result<SolveIvpResult, IntegrateValidationError>
where
    F: FnMut(f64, &[f64]) -> Vec<f64>,
{
    let (t0, tf) = options.t_span;

    validate_max_step(options.max_step)?;
    if let Some(first_step) = options.first_step {
        validate_first_step(first_step, t0, tf)?;
    }
    if let Some(t_eval) = options.t_eval {
        validate_t_eval(t_eval, options.t_span)?;
    } else if !t0.is_finite() || !tf.is_finite() {
        return Err(IntegrateValidationError::SpanNotFinite);
    }
    if options.max_steps == 0 {
        return Err(IntegrateValidationError::StepBudgetMustBePositive);
    }

    let mut solver = RkSolver::new(
        fun,
        RkSolverConfig {
            t0,
            y0: options.y0,
            t_bound: tf,
            rtol: options.rtol,
            atol: options.atol.clone(),
            max_step: options.max_step,
            first_step: options.first_step,
            tableau: options.method.tableau(),
        },
    )?;

    let direction = if tf >= t0 { 1.0 } else { -1.0 };
    let mut ts = Vec::new();
    let mut ys: Vec<Vec<f64>> = Vec::new();
    let mut cursor = 0;

    match options.t_eval {
        None => {
            ts.push(t0);
            ys.push(options.y0.to_vec());
        }
        Some(t_eval) => {
            while cursor < t_eval.len() && t_eval[cursor] == t0 {
                ts.push(t0);
                ys.push(options.y0.to_vec());
                cursor += 1;
            }
        }
    }

    let mut failure = None;
    while solver.state() == OdeSolverState::Running {
        if solver.nsteps() >= options.max_steps {
            failure = Some(StepFailure::StepBudgetExhausted {
                max_steps: options.max_steps,
            });
            break;
        }
        if let Err(err) = solver.step_with(fun) {
            failure = Some(err);
            break;
        }

        match options.t_eval {
            None => {
                ts.push(solver.t());
                ys.push(solver.y().to_vec());
            }
            Some(t_eval) => {
                let Some(segment) = solver.dense_segment() else {
                    continue;
                };
                while cursor < t_eval.len() && direction * (t_eval[cursor] - segment.t) <= 0.0 {
                    let te = t_eval[cursor];
                    let value = if te == segment.t {
                        segment.y.to_vec()
                    } else {
                        segment.eval(te)
                    };
                    ts.push(te);
                    ys.push(value);
                    cursor += 1;
                }
            }
        }
    }

    let (status, message, success) = match &failure {
        None => (0, MSG_SUCCESS.to_owned(), true),
        Some(err) => (-1, format!("Integration step failed: {err}"), false),
    };

    Ok(SolveIvpResult {
        t: ts,
        y: ys,
        nfev: solver.nfev(),
        nsteps: solver.nsteps(),
        status,
        message,
        success,
        failure,
        t_last: solver.t(),
    })
}
