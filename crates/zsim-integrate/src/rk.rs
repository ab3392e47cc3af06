#![forbid(unsafe_code)]

//! Explicit Runge-Kutta ODE solvers (RK23 and RK45).
//!
//! Dormand-Prince RK5(4) and Bogacki-Shampine RK3(2) pairs with the usual
//! error-per-step control: local extrapolation, RMS error norm against
//! `atol + rtol * max(|y|, |y_new|)`, and a safety-factored step update.

use crate::solver::{DenseSegment, OdeSolver, OdeSolverState, RkStages, StepFailure, StepOutcome};
use crate::step_size::{InitialStepRequest, select_initial_step};
use crate::validation::{ToleranceValue, validate_tol};
use crate::{IntegrateValidationError, validate_first_step, validate_max_step};

const SAFETY: f64 = 0.9;
const MIN_FACTOR: f64 = 0.2;
const MAX_FACTOR: f64 = 10.0;

/// Butcher tableau for an explicit Runge-Kutta method.
pub struct ButcherTableau {
    /// A coefficients (lower-triangular, row-major, n_stages × n_stages).
    pub a: &'static [&'static [f64]],
    /// B coefficients (weights for combining stages, length n_stages).
    pub b: &'static [f64],
    /// C coefficients (time increments, length n_stages).
    pub c: &'static [f64],
    /// E coefficients (error estimation, length n_stages + 1).
    pub e: &'static [f64],
    /// Continuous-extension coefficients (n_stages + 1 rows).
    pub p: &'static [&'static [f64]],
    pub n_stages: usize,
    pub order: usize,
    pub error_estimator_order: usize,
}

// ═══════════════════════════════════════════════════════════════
// RK45: Dormand-Prince 5(4)
// ═══════════════════════════════════════════════════════════════

static RK45_C: &[f64] = &[0.0, 1.0 / 5.0, 3.0 / 10.0, 4.0 / 5.0, 8.0 / 9.0, 1.0];

static RK45_A: &[&[f64]] = &[
    &[],
    &[1.0 / 5.0],
    &[3.0 / 40.0, 9.0 / 40.0],
    &[44.0 / 45.0, -56.0 / 15.0, 32.0 / 9.0],
    &[
        19372.0 / 6561.0,
        -25360.0 / 2187.0,
        64448.0 / 6561.0,
        -212.0 / 729.0,
    ],
    &[
        9017.0 / 3168.0,
        -355.0 / 33.0,
        46732.0 / 5247.0,
        49.0 / 176.0,
        -5103.0 / 18656.0,
    ],
];

static RK45_B: &[f64] = &[
    35.0 / 384.0,
    0.0,
    500.0 / 1113.0,
    125.0 / 192.0,
    -2187.0 / 6784.0,
    11.0 / 84.0,
];

static RK45_E: &[f64] = &[
    -71.0 / 57600.0,
    0.0,
    71.0 / 16695.0,
    -71.0 / 1920.0,
    17253.0 / 339200.0,
    -22.0 / 525.0,
    1.0 / 40.0,
];

// Dense output of Dormand & Prince (1986), fourth order in the step.
static RK45_P: &[&[f64]] = &[
    &[
        1.0,
        -8048581381.0 / 2820520608.0,
        8663915743.0 / 2820520608.0,
        -12715105075.0 / 11282082432.0,
    ],
    &[0.0, 0.0, 0.0, 0.0],
    &[
        0.0,
        131558114200.0 / 32700410799.0,
        -68118460800.0 / 10900136933.0,
        87487479700.0 / 32700410799.0,
    ],
    &[
        0.0,
        -1754552775.0 / 470086768.0,
        14199869525.0 / 1410260304.0,
        -10690763975.0 / 1880347072.0,
    ],
    &[
        0.0,
        127303824393.0 / 49829197408.0,
        -318862633887.0 / 49829197408.0,
        701980252875.0 / 199316789632.0,
    ],
    &[
        0.0,
        -282668133.0 / 205662961.0,
        2019193451.0 / 616988883.0,
        -1453857185.0 / 822651844.0,
    ],
    &[
        0.0,
        40617522.0 / 29380423.0,
        -110615467.0 / 29380423.0,
        69997945.0 / 29380423.0,
    ],
];

pub static RK45_TABLEAU: ButcherTableau = ButcherTableau {
    a: RK45_A,
    b: RK45_B,
    c: RK45_C,
    e: RK45_E,
    p: RK45_P,
    n_stages: 6,
    order: 5,
    error_estimator_order: 4,
};

// ═══════════════════════════════════════════════════════════════
// RK23: Bogacki-Shampine 3(2)
// ═══════════════════════════════════════════════════════════════

static RK23_C: &[f64] = &[0.0, 1.0 / 2.0, 3.0 / 4.0];

static RK23_A: &[&[f64]] = &[&[], &[1.0 / 2.0], &[0.0, 3.0 / 4.0]];

static RK23_B: &[f64] = &[2.0 / 9.0, 1.0 / 3.0, 4.0 / 9.0];

static RK23_E: &[f64] = &[5.0 / 72.0, -1.0 / 12.0, -1.0 / 9.0, 1.0 / 8.0];

// Bogacki-Shampine interpolant; equals the cubic Hermite fit of the step.
static RK23_P: &[&[f64]] = &[
    &[1.0, -4.0 / 3.0, 5.0 / 9.0],
    &[0.0, 1.0, -2.0 / 3.0],
    &[0.0, 4.0 / 3.0, -8.0 / 9.0],
    &[0.0, -1.0, 1.0],
];

pub static RK23_TABLEAU: ButcherTableau = ButcherTableau {
    a: RK23_A,
    b: RK23_B,
    c: RK23_C,
    e: RK23_E,
    p: RK23_P,
    n_stages: 3,
    order: 3,
    error_estimator_order: 2,
};

/// `y + h * Σ coeffs[j] * k[j]`, skipping zero coefficients.
fn combine(y: &[f64], h: f64, coeffs: &[f64], k: &[Vec<f64>]) -> Vec<f64> {
    let mut out = y.to_vec();
    for (kj, &c) in k.iter().zip(coeffs) {
        if c != 0.0 {
            for (o, v) in out.iter_mut().zip(kj) {
                *o += h * c * v;
            }
        }
    }
    out
}

/// Perform a single explicit Runge-Kutta step.
///
/// Returns `(y_new, f_new)` where `f_new = fun(t + h, y_new)`.
/// `k` is filled with the stage derivatives (k[0] = f, k[n_stages] = f_new).
fn rk_step<F>(
    fun: &mut F,
    t: f64,
    y: &[f64],
    f: &[f64],
    h: f64,
    tableau: &ButcherTableau,
    k: &mut [Vec<f64>],
) -> (Vec<f64>, Vec<f64>)
where
    F: FnMut(f64, &[f64]) -> Vec<f64>,
{
    k[0] = f.to_vec();
    for s in 1..tableau.n_stages {
        let y_stage = combine(y, h, tableau.a[s], &k[..s]);
        k[s] = fun(t + tableau.c[s] * h, &y_stage);
    }
    let y_new = combine(y, h, tableau.b, &k[..tableau.n_stages]);
    let f_new = fun(t + h, &y_new);
    k[tableau.n_stages] = f_new.clone();
    (y_new, f_new)
}

/// RMS of `h * Σ e[s] k[s] / scale`.
fn error_norm(k: &[Vec<f64>], e: &[f64], h: f64, scale: &[f64]) -> f64 {
    let n = scale.len();
    if n == 0 {
        return 0.0;
    }
    let err = combine(&vec![0.0; n], h, e, k);
    let sum_sq: f64 = err
        .iter()
        .zip(scale)
        .map(|(e, s)| (e / s) * (e / s))
        .sum();
    (sum_sq / n as f64).sqrt()
}

/// Configuration for constructing an RK solver.
pub struct RkSolverConfig<'a> {
    pub t0: f64,
    pub y0: &'a [f64],
    pub t_bound: f64,
    pub rtol: f64,
    pub atol: ToleranceValue,
    pub max_step: f64,
    pub first_step: Option<f64>,
    pub tableau: &'static ButcherTableau,
}

/// An explicit Runge-Kutta ODE solver with adaptive step-size control.
pub struct RkSolver {
    state: OdeSolverState,
    tableau: &'static ButcherTableau,
    n: usize,
    t: f64,
    y: Vec<f64>,
    f: Vec<f64>,
    t_old: Option<f64>,
    y_old: Vec<f64>,
    f_old: Vec<f64>,
    t_bound: f64,
    direction: f64,
    rtol: f64,
    atol: ToleranceValue,
    max_step: f64,
    h_abs: f64,
    error_exponent: f64,
    k: Vec<Vec<f64>>,
    /// `k` holds the stages of the step ending at `t`.
    stages_current: bool,
    nfev: usize,
    nsteps: usize,
}

impl RkSolver {
    /// Create a new RK solver from configuration.
    ///
    /// Validates tolerances and step bounds, evaluates `fun` at the initial
    /// point and picks a first step when none is given.
    pub fn new<F>(fun: &mut F, config: RkSolverConfig<'_>) -> Result<Self, IntegrateValidationError>
    where
        F: FnMut(f64, &[f64]) -> Vec<f64>,
    {
        let n = config.y0.len();
        let tol = validate_tol(
            ToleranceValue::Scalar(config.rtol),
            config.atol.clone(),
            n,
        )?;
        let rtol = tol.rtol.component(0);
        let max_step = validate_max_step(config.max_step)?;

        let direction = if config.t_bound != config.t0 {
            (config.t_bound - config.t0).signum()
        } else {
            1.0
        };

        let f0 = fun(config.t0, config.y0);
        let mut nfev = 1;

        let h_abs = match config.first_step {
            Some(first_step) => validate_first_step(first_step, config.t0, config.t_bound)?,
            None => {
                nfev += 1;
                select_initial_step(
                    fun,
                    &InitialStepRequest {
                        t0: config.t0,
                        y0: config.y0,
                        t_bound: config.t_bound,
                        max_step,
                        f0: &f0,
                        direction,
                        order: config.tableau.error_estimator_order as f64,
                        rtol,
                        atol: tol.atol.clone(),
                    },
                )
            }
        };

        Ok(Self {
            state: OdeSolverState::Running,
            tableau: config.tableau,
            n,
            t: config.t0,
            y: config.y0.to_vec(),
            f: f0,
            t_old: None,
            y_old: Vec::new(),
            f_old: Vec::new(),
            t_bound: config.t_bound,
            direction,
            rtol,
            atol: tol.atol,
            max_step,
            h_abs,
            error_exponent: -1.0 / (config.tableau.error_estimator_order as f64 + 1.0),
            k: vec![vec![0.0; n]; config.tableau.n_stages + 1],
            stages_current: false,
            nfev,
            nsteps: 0,
        })
    }

    /// Number of right-hand side evaluations so far.
    pub fn nfev(&self) -> usize {
        self.nfev
    }

    /// Number of accepted steps so far.
    pub fn nsteps(&self) -> usize {
        self.nsteps
    }

    pub fn t_old(&self) -> Option<f64> {
        self.t_old
    }

    /// Error scale: atol + max(|y|, |y_new|) * rtol.
    fn compute_scale(&self, y_new: &[f64]) -> Vec<f64> {
        self.y
            .iter()
            .zip(y_new)
            .enumerate()
            .map(|(i, (yi, yni))| self.atol.component(i) + yi.abs().max(yni.abs()) * self.rtol)
            .collect()
    }

    fn finish(&mut self, state: OdeSolverState) -> StepOutcome {
        self.state = state;
        StepOutcome {
            message: None,
            state,
        }
    }
}

impl OdeSolver for RkSolver {
    fn state(&self) -> OdeSolverState {
        self.state
    }

    fn t(&self) -> f64 {
        self.t
    }

    fn y(&self) -> &[f64] {
        &self.y
    }

    fn step_with<F>(&mut self, fun: &mut F) -> Result<StepOutcome, StepFailure>
    where
        F: FnMut(f64, &[f64]) -> Vec<f64>,
    {
        if self.state != OdeSolverState::Running {
            return Err(StepFailure::RuntimeError(
                "Attempt to step on a finished or failed solver.",
            ));
        }

        if self.n == 0 || self.t == self.t_bound {
            self.t_old = Some(self.t);
            self.y_old = self.y.clone();
            self.f_old = self.f.clone();
            self.t = self.t_bound;
            self.stages_current = false;
            return Ok(self.finish(OdeSolverState::Finished));
        }

        let t = self.t;
        let min_step = 10.0 * (next_after(t, self.direction * f64::INFINITY) - t).abs();
        let mut h_abs = self.h_abs.clamp(min_step, self.max_step.max(min_step));
        let mut step_rejected = false;

        loop {
            if h_abs.is_nan() || h_abs < min_step {
                self.state = OdeSolverState::Failed;
                return Err(StepFailure::StepSizeTooSmall);
            }

            let mut t_new = t + h_abs * self.direction;
            if self.direction * (t_new - self.t_bound) > 0.0 {
                t_new = self.t_bound;
            }
            let h = t_new - t;
            h_abs = h.abs();

            self.stages_current = false;
            let (y_new, f_new) = rk_step(fun, t, &self.y, &self.f, h, self.tableau, &mut self.k);
            self.nfev += self.tableau.n_stages;

            let scale = self.compute_scale(&y_new);
            let err_norm = error_norm(&self.k, self.tableau.e, h, &scale);

            if !err_norm.is_finite() {
                if !self.y.iter().chain(&self.f).all(|v| v.is_finite()) {
                    self.state = OdeSolverState::Failed;
                    return Err(StepFailure::NonFiniteState);
                }
                h_abs *= MIN_FACTOR;
                step_rejected = true;
                continue;
            }

            if err_norm < 1.0 {
                let mut factor = if err_norm == 0.0 {
                    MAX_FACTOR
                } else {
                    MAX_FACTOR.min(SAFETY * err_norm.powf(self.error_exponent))
                };
                if step_rejected {
                    factor = factor.min(1.0);
                }

                self.t_old = Some(t);
                self.y_old = std::mem::replace(&mut self.y, y_new);
                self.f_old = std::mem::replace(&mut self.f, f_new);
                self.t = t_new;
                self.h_abs = h_abs * factor;
                self.stages_current = true;
                self.nsteps += 1;
                break;
            }

            h_abs *= MIN_FACTOR.max(SAFETY * err_norm.powf(self.error_exponent));
            step_rejected = true;
        }

        if self.direction * (self.t - self.t_bound) >= 0.0 {
            return Ok(self.finish(OdeSolverState::Finished));
        }
        Ok(StepOutcome {
            message: None,
            state: self.state,
        })
    }

    fn dense_segment(&self) -> Option<DenseSegment<'_>> {
        let t_old = self.t_old?;
        Some(DenseSegment {
            t_old,
            t: self.t,
            y_old: &self.y_old,
            f_old: &self.f_old,
            y: &self.y,
            f: &self.f,
            stages: self.stages_current.then_some(RkStages {
                k: &self.k,
                p: self.tableau.p,
            }),
        })
    }
}

/// The next representable f64 after `from` in the direction of `toward`.
fn next_after(from: f64, toward: f64) -> f64 {
    if from == toward {
        return from;
    }
    if from.is_nan() || toward.is_nan() {
        return f64::NAN;
    }
    if from == 0.0 {
        let tiny = f64::from_bits(1);
        return if toward > 0.0 { tiny } else { -tiny };
    }
    let bits = from.to_bits();
    let next_bits = if (toward > from) == (from > 0.0) {
        bits + 1
    } else {
        bits - 1
    };
    f64::from_bits(next_bits)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config<'a>(y0: &'a [f64], t_bound: f64, tableau: &'static ButcherTableau) -> RkSolverConfig<'a> {
        RkSolverConfig {
            t0: 0.0,
            y0,
            t_bound,
            rtol: 1e-8,
            atol: ToleranceValue::Scalar(1e-10),
            max_step: f64::INFINITY,
            first_step: None,
            tableau,
        }
    }

    fn drive<F>(solver: &mut RkSolver, fun: &mut F, limit: usize)
    where
        F: FnMut(f64, &[f64]) -> Vec<f64>,
    {
        let mut steps = 0;
        while solver.state() == OdeSolverState::Running {
            solver.step_with(fun).expect("step should succeed");
            steps += 1;
            assert!(steps <= limit, "too many steps");
        }
    }

    #[test]
    fn test_rk_step_rk45_exponential() {
        let mut k = vec![vec![0.0; 1]; RK45_TABLEAU.n_stages + 1];
        let (y_new, _) = rk_step(
            &mut |_t, y| vec![-0.5 * y[0]],
            0.0,
            &[2.0],
            &[-1.0],
            0.1,
            &RK45_TABLEAU,
            &mut k,
        );
        assert!((y_new[0] - 2.0 * (-0.05_f64).exp()).abs() < 1e-6);
    }

    #[test]
    fn test_rk_step_rk23_exponential() {
        let mut k = vec![vec![0.0; 1]; RK23_TABLEAU.n_stages + 1];
        let (y_new, _) = rk_step(
            &mut |_t, y| vec![-0.5 * y[0]],
            0.0,
            &[2.0],
            &[-1.0],
            0.1,
            &RK23_TABLEAU,
            &mut k,
        );
        assert!((y_new[0] - 2.0 * (-0.05_f64).exp()).abs() < 1e-4);
    }

    #[test]
    fn test_rk_solver_exponential_decay() {
        let mut fun = |_t: f64, y: &[f64]| vec![-y[0]];
        let mut solver =
            RkSolver::new(&mut fun, config(&[1.0], 1.0, &RK45_TABLEAU)).expect("solver");
        drive(&mut solver, &mut fun, 1000);
        assert_eq!(solver.state(), OdeSolverState::Finished);
        assert!((solver.y()[0] - (-1.0_f64).exp()).abs() < 1e-6);
        assert!(solver.nsteps() > 0);
    }

    #[test]
    fn test_rk_solver_harmonic_oscillator_half_period() {
        let mut fun = |_t: f64, y: &[f64]| vec![y[1], -y[0]];
        let mut solver = RkSolver::new(
            &mut fun,
            config(&[1.0, 0.0], std::f64::consts::PI, &RK45_TABLEAU),
        )
        .expect("solver");
        drive(&mut solver, &mut fun, 1000);
        assert!((solver.y()[0] + 1.0).abs() < 1e-6);
        assert!(solver.y()[1].abs() < 1e-5);
    }

    #[test]
    fn test_rk_solver_rk23_exponential() {
        let mut fun = |_t: f64, y: &[f64]| vec![-y[0]];
        let mut cfg = config(&[1.0], 1.0, &RK23_TABLEAU);
        cfg.rtol = 1e-6;
        cfg.atol = ToleranceValue::Scalar(1e-8);
        let mut solver = RkSolver::new(&mut fun, cfg).expect("solver");
        drive(&mut solver, &mut fun, 5000);
        assert!((solver.y()[0] - (-1.0_f64).exp()).abs() < 1e-4);
    }

    #[test]
    fn test_rk_solver_respects_max_step() {
        let mut fun = |_t: f64, _y: &[f64]| vec![0.0];
        let mut cfg = config(&[1.0], 10.0, &RK45_TABLEAU);
        cfg.max_step = 0.5;
        let mut solver = RkSolver::new(&mut fun, cfg).expect("solver");
        drive(&mut solver, &mut fun, 1000);
        assert!(solver.nsteps() >= 20, "nsteps = {}", solver.nsteps());
    }

    #[test]
    fn test_rk_solver_dense_segment_tracks_last_step() {
        let mut fun = |_t: f64, y: &[f64]| vec![-y[0]];
        let mut solver =
            RkSolver::new(&mut fun, config(&[1.0], 1.0, &RK45_TABLEAU)).expect("solver");
        assert!(solver.dense_segment().is_none());
        solver.step_with(&mut fun).expect("step");
        let seg = solver.dense_segment().expect("segment after a step");
        let mid = 0.5 * (seg.t_old + seg.t);
        assert!((seg.eval(mid)[0] - (-mid).exp()).abs() < 1e-5);
    }

    #[test]
    fn test_rk_solver_rk45_stage_interpolant_beats_hermite() {
        let mut fun = |_t: f64, y: &[f64]| vec![-y[0]];
        let mut solver = RkSolver::new(
            &mut fun,
            RkSolverConfig {
                rtol: 1e-3,
                first_step: Some(0.5),
                ..config(&[1.0], 1.0, &RK45_TABLEAU)
            },
        )
        .expect("solver");
        solver.step_with(&mut fun).expect("step");
        let seg = solver.dense_segment().expect("segment after a step");
        assert!(seg.stages.is_some());
        assert_eq!(seg.t, 0.5);
        let hermite = DenseSegment {
            stages: None,
            ..seg
        };
        for x in [0.25, 0.5, 0.75] {
            let te = x * seg.t;
            let exact = (-te).exp();
            let stage_err = (seg.eval(te)[0] - exact).abs();
            assert!(stage_err < 2.5e-5, "x={x}: stage error {stage_err}");
            let hermite_err = (hermite.eval(te)[0] - exact).abs();
            assert!(hermite_err > stage_err, "x={x}: {hermite_err} <= {stage_err}");
        }
        let mid = 0.25;
        assert!((hermite.eval(mid)[0] - (-mid).exp()).abs() > 1e-4);
    }

    #[test]
    fn test_rk_solver_rk23_interpolant_matches_endpoints() {
        let mut fun = |_t: f64, y: &[f64]| vec![-y[0]];
        let mut solver = RkSolver::new(
            &mut fun,
            RkSolverConfig {
                rtol: 1e-2,
                first_step: Some(0.2),
                ..config(&[1.0], 1.0, &RK23_TABLEAU)
            },
        )
        .expect("solver");
        solver.step_with(&mut fun).expect("step");
        let seg = solver.dense_segment().expect("segment after a step");
        assert!((seg.eval(seg.t_old)[0] - seg.y_old[0]).abs() < 1e-15);
        assert!((seg.eval(seg.t)[0] - seg.y[0]).abs() < 1e-15);
    }

    #[test]
    fn test_rk_solver_non_finite_state_fails() {
        let mut fun = |_t: f64, y: &[f64]| vec![f64::NAN * y[0]];
        let mut solver = RkSolver::new(
            &mut fun,
            RkSolverConfig {
                first_step: Some(0.1),
                ..config(&[1.0], 1.0, &RK45_TABLEAU)
            },
        )
        .expect("solver");
        let err = solver.step_with(&mut fun).expect_err("NaN field must fail");
        assert_eq!(err, StepFailure::NonFiniteState);
        assert_eq!(solver.state(), OdeSolverState::Failed);
    }

    #[test]
    fn test_rk_solver_step_after_finish_is_error() {
        let mut fun = |_t: f64, _y: &[f64]| vec![];
        let mut solver = RkSolver::new(&mut fun, config(&[], 1.0, &RK45_TABLEAU)).expect("solver");
        let outcome = solver.step_with(&mut fun).expect("empty system finishes");
        assert_eq!(outcome.state, OdeSolverState::Finished);
        assert!(matches!(
            solver.step_with(&mut fun),
            Err(StepFailure::RuntimeError(_))
        ));
    }

    #[test]
    fn test_rk_next_after_basic() {
        let x = next_after(1.0, 2.0);
        assert!(x > 1.0 && x < 1.0 + 1e-15);
        assert!(next_after(1.0, 0.0) < 1.0);
        assert!(next_after(0.0, 1.0) > 0.0);
    }
}
