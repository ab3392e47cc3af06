#![forbid(unsafe_code)]

use crate::ToleranceValue;

#[derive(Debug, Clone, PartialEq)]
pub struct InitialStepRequest<'a> {
    pub t0: f64,
    pub y0: &'a [f64],
    pub t_bound: f64,
    pub max_step: f64,
    pub f0: &'a [f64],
    pub direction: f64,
    pub order: f64,
    pub rtol: f64,
    pub atol: ToleranceValue,
}

fn scaled_rms(values: impl Iterator<Item = f64>, n: usize) -> f64 {
    if n == 0 {
        return 0.0;
    }
    (values.map(|v| v * v).sum::<f64>() / n as f64).sqrt()
}

/// Empirical first step from Hairer, Nørsett & Wanner, "Solving Ordinary
/// Differential Equations I", sec. II.4.
///
/// Costs one extra right-hand side evaluation. The result is positive and
/// never exceeds the interval length or `max_step`.
pub fn select_initial_step<F>(fun: &mut F, request: &InitialStepRequest<'_>) -> f64
where
    F: FnMut(f64, &[f64]) -> Vec<f64>,
{
    let n = request.y0.len();
    if n == 0 {
        return f64::INFINITY;
    }
    let interval_length = (request.t_bound - request.t0).abs();
    if interval_length == 0.0 {
        return 0.0;
    }

    let scale: Vec<f64> = request
        .y0
        .iter()
        .enumerate()
        .map(|(i, y)| request.atol.component(i) + y.abs() * request.rtol)
        .collect();

    let d0 = scaled_rms(request.y0.iter().zip(&scale).map(|(y, s)| y / s), n);
    let d1 = scaled_rms(request.f0.iter().zip(&scale).map(|(f, s)| f / s), n);

    let h0 = if d0 < 1e-5 || d1 < 1e-5 {
        1e-6
    } else {
        0.01 * d0 / d1
    };
    let h0 = h0.min(interval_length);

    let y1: Vec<f64> = request
        .y0
        .iter()
        .zip(request.f0)
        .map(|(y, f)| y + h0 * request.direction * f)
        .collect();
    let f1 = fun(request.t0 + h0 * request.direction, &y1);

    let d2 = scaled_rms(
        f1.iter()
            .zip(request.f0)
            .zip(&scale)
            .map(|((a, b), s)| (a - b) / s),
        n,
    ) / h0;

    let h1 = if d1 <= 1e-15 && d2 <= 1e-15 {
        (h0 * 1e-3).max(1e-6)
    } else {
        (0.01 / d1.max(d2)).powf(1.0 / (request.order + 1.0))
    };

    (100.0 * h0)
        .min(h1)
        .min(interval_length)
        .min(request.max_step)
}
