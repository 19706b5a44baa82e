//! Internal optimization utilities for conditional-variance fitting.

use std::time::Instant;

/// Configuration for the Nelder-Mead simplex optimizer.
pub(crate) struct NelderMeadConfig {
    /// Maximum number of iterations.
    pub max_iter: usize,
    /// Convergence threshold on simplex diameter.
    pub diameter_tol: f64,
    /// Convergence threshold on objective value spread.
    pub fvalue_tol: f64,
    /// Optional wall-clock deadline, checked once per iteration.
    pub deadline: Option<Instant>,
}

/// Why the optimizer stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum SimplexStop {
    /// Simplex collapsed below tolerance.
    Converged,
    /// Iteration budget exhausted before convergence.
    MaxIter,
    /// Wall-clock deadline hit before convergence.
    Deadline,
}

/// Result of a Nelder-Mead optimization.
pub(crate) struct NelderMeadResult {
    /// Best vertex found.
    pub x: Vec<f64>,
    /// Objective value at the best vertex.
    pub fval: f64,
    /// Iterations performed.
    pub iterations: usize,
    pub stop: SimplexStop,
}

/// Minimize `objective(x)` in n dimensions using the Nelder-Mead simplex
/// method.
///
/// Starts from `x0` with per-coordinate initial perturbations `steps` forming
/// the n+1 initial vertices. Returns the best vertex found together with the
/// stopping reason, so callers can distinguish convergence from an exhausted
/// iteration budget or deadline.
pub(crate) fn nelder_mead<F>(
    objective: F,
    x0: &[f64],
    steps: &[f64],
    config: &NelderMeadConfig,
) -> NelderMeadResult
where
    F: Fn(&[f64]) -> f64,
{
    let n = x0.len();
    debug_assert_eq!(n, steps.len());

    let mut simplex: Vec<Vec<f64>> = Vec::with_capacity(n + 1);
    simplex.push(x0.to_vec());
    for i in 0..n {
        let mut v = x0.to_vec();
        v[i] += steps[i];
        simplex.push(v);
    }
    let mut f_vals: Vec<f64> = simplex.iter().map(|v| objective(v)).collect();

    let mut iterations = 0;
    let mut stop = SimplexStop::MaxIter;

    for iter in 0..config.max_iter {
        iterations = iter + 1;

        if let Some(deadline) = config.deadline {
            if Instant::now() >= deadline {
                stop = SimplexStop::Deadline;
                break;
            }
        }

        // Sort vertices by objective value
        let mut idx: Vec<usize> = (0..=n).collect();
        idx.sort_by(|&a, &b| {
            f_vals[a]
                .partial_cmp(&f_vals[b])
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        simplex = idx.iter().map(|&i| simplex[i].clone()).collect();
        f_vals = idx.iter().map(|&i| f_vals[i]).collect();

        // Check convergence
        let diameter = simplex
            .iter()
            .flat_map(|a| {
                simplex.iter().map(move |b| {
                    a.iter()
                        .zip(b.iter())
                        .map(|(x, y)| (x - y).powi(2))
                        .sum::<f64>()
                        .sqrt()
                })
            })
            .fold(0.0_f64, f64::max);
        let f_spread = f_vals[n] - f_vals[0];

        if diameter < config.diameter_tol || f_spread < config.fvalue_tol {
            stop = SimplexStop::Converged;
            break;
        }

        // Centroid of all vertices except the worst
        let centroid: Vec<f64> = (0..n)
            .map(|d| simplex[..n].iter().map(|v| v[d]).sum::<f64>() / n as f64)
            .collect();

        let worst = simplex[n].clone();
        let f_worst = f_vals[n];

        // Reflection
        let reflected: Vec<f64> = centroid
            .iter()
            .zip(worst.iter())
            .map(|(c, w)| c + (c - w))
            .collect();
        let f_reflected = objective(&reflected);

        if f_reflected < f_vals[n - 1] && f_reflected >= f_vals[0] {
            simplex[n] = reflected;
            f_vals[n] = f_reflected;
        } else if f_reflected < f_vals[0] {
            // Expansion
            let expanded: Vec<f64> = centroid
                .iter()
                .zip(reflected.iter())
                .map(|(c, r)| c + 2.0 * (r - c))
                .collect();
            let f_expanded = objective(&expanded);
            if f_expanded < f_reflected {
                simplex[n] = expanded;
                f_vals[n] = f_expanded;
            } else {
                simplex[n] = reflected;
                f_vals[n] = f_reflected;
            }
        } else {
            // Contraction, toward the better of reflected/worst
            let toward = if f_reflected < f_worst {
                &reflected
            } else {
                &worst
            };
            let contracted: Vec<f64> = centroid
                .iter()
                .zip(toward.iter())
                .map(|(c, t)| c + 0.5 * (t - c))
                .collect();
            let f_contracted = objective(&contracted);
            if f_contracted < f_worst.min(f_reflected) {
                simplex[n] = contracted;
                f_vals[n] = f_contracted;
            } else {
                // Shrink toward best vertex
                let best = simplex[0].clone();
                for v in simplex.iter_mut().skip(1) {
                    for (x, b) in v.iter_mut().zip(best.iter()) {
                        *x = b + 0.5 * (*x - b);
                    }
                }
                for (i, v) in simplex.iter().enumerate().skip(1) {
                    f_vals[i] = objective(v);
                }
            }
        }
    }

    // Return best vertex
    let best_idx = f_vals
        .iter()
        .enumerate()
        .min_by(|(_, a), (_, b)| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal))
        .map(|(i, _)| i)
        .unwrap_or(0);

    NelderMeadResult {
        x: simplex[best_idx].clone(),
        fval: f_vals[best_idx],
        iterations,
        stop,
    }
}
