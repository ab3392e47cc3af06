#![forbid(unsafe_code)]

use thiserror::Error;

pub const EPS: f64 = f64::EPSILON;
pub const MIN_RTOL: f64 = 100.0 * EPS;

#[derive(Debug, Clone, PartialEq)]
pub enum ToleranceValue {
    Scalar(f64),
    Vector(Vec<f64>),
}

impl ToleranceValue {
    fn map(self, mut f: impl FnMut(f64) -> f64) -> Self {
        match self {
            Self::Scalar(value) => Self::Scalar(f(value)),
            Self::Vector(values) => Self::Vector(values.into_iter().map(f).collect()),
        }
    }

    fn any(&self, mut predicate: impl FnMut(f64) -> bool) -> bool {
        match self {
            Self::Scalar(value) => predicate(*value),
            Self::Vector(values) => values.iter().copied().any(predicate),
        }
    }

    fn len_if_vector(&self) -> Option<usize> {
        match self {
            Self::Scalar(_) => None,
            Self::Vector(values) => Some(values.len()),
        }
    }

    /// Component `i` of the tolerance, broadcasting scalars.
    #[must_use]
    pub fn component(&self, i: usize) -> f64 {
        match self {
            Self::Scalar(value) => *value,
            Self::Vector(values) => values[i],
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum ToleranceWarning {
    RtolClamped { minimum: f64 },
}

#[derive(Debug, Clone, PartialEq)]
pub struct ValidatedTolerance {
    pub rtol: ToleranceValue,
    pub atol: ToleranceValue,
    pub warnings: Vec<ToleranceWarning>,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum IntegrateValidationError {
    #[error("`first_step` must be positive.")]
    FirstStepMustBePositive,
    #[error("`first_step` exceeds bounds.")]
    FirstStepExceedsBounds,
    #[error("`max_step` must be positive.")]
    MaxStepMustBePositive,
    #[error("`atol` has wrong shape.")]
    AtolWrongShape { expected: usize, actual: usize },
    #[error("`atol` must be positive.")]
    AtolMustBePositive,
    #[error("tolerances must not be NaN.")]
    ToleranceIsNan,
    #[error("`t_span` endpoints must be finite.")]
    SpanNotFinite,
    #[error("values in `t_eval` are not within `t_span`.")]
    TEvalOutOfSpan,
    #[error("values in `t_eval` are not properly sorted.")]
    TEvalNotSorted,
    #[error("`max_steps` must be at least 1.")]
    StepBudgetMustBePositive,
}

pub fn validate_first_step(
    first_step: f64,
    t0: f64,
    t_bound: f64,
) -> Result<f64, IntegrateValidationError> {
    if first_step.is_nan() || first_step <= 0.0 {
        return Err(IntegrateValidationError::FirstStepMustBePositive);
    }
    if first_step > (t_bound - t0).abs() {
        return Err(IntegrateValidationError::FirstStepExceedsBounds);
    }
    Ok(first_step)
}

pub fn validate_max_step(max_step: f64) -> Result<f64, IntegrateValidationError> {
    if max_step.is_nan() || max_step <= 0.0 {
        return Err(IntegrateValidationError::MaxStepMustBePositive);
    }
    Ok(max_step)
}

/// Check tolerances against a system of dimension `n`.
///
/// `rtol` below [`MIN_RTOL`] is clamped with a warning rather than rejected.
pub fn validate_tol(
    rtol: ToleranceValue,
    atol: ToleranceValue,
    n: usize,
) -> Result<ValidatedTolerance, IntegrateValidationError> {
    if rtol.any(f64::is_nan) || atol.any(f64::is_nan) {
        return Err(IntegrateValidationError::ToleranceIsNan);
    }

    let mut warnings = Vec::new();
    let rtol = if rtol.any(|x| x < MIN_RTOL) {
        warnings.push(ToleranceWarning::RtolClamped { minimum: MIN_RTOL });
        rtol.map(|x| x.max(MIN_RTOL))
    } else {
        rtol
    };

    if let Some(len) = atol.len_if_vector()
        && len != n
    {
        return Err(IntegrateValidationError::AtolWrongShape {
            expected: n,
            actual: len,
        });
    }

    if atol.any(|x| x < 0.0) {
        return Err(IntegrateValidationError::AtolMustBePositive);
    }

    Ok(ValidatedTolerance {
        rtol,
        atol,
        warnings,
    })
}

/// `t_eval` must lie inside `t_span` and be strictly monotone in the
/// integration direction.
pub fn validate_t_eval(t_eval: &[f64], t_span: (f64, f64)) -> Result<(), IntegrateValidationError> {
    let (t0, tf) = t_span;
    if !t0.is_finite() || !tf.is_finite() {
        return Err(IntegrateValidationError::SpanNotFinite);
    }
    let (t_min, t_max) = (t0.min(tf), t0.max(tf));
    if t_eval.iter().any(|&te| !(t_min..=t_max).contains(&te)) {
        return Err(IntegrateValidationError::TEvalOutOfSpan);
    }
    let forward = tf >= t0;
    let sorted = t_eval
        .windows(2)
        .all(|w| if forward { w[1] > w[0] } else { w[1] < w[0] });
    if !sorted {
        return Err(IntegrateValidationError::TEvalNotSorted);
    }
    Ok(())
}
