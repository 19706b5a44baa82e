//! Conditional-heteroskedasticity volatility estimation (GARCH family).
//!
//! Fits a conditional-variance model to a return series by Gaussian
//! quasi-maximum-likelihood and extracts the fitted in-sample
//! conditional-volatility path. Two variants:
//!
//! - **Symmetric** (GARCH(p,q), Bollerslev 1986):
//!
//!   ```text
//!   σ²ₜ = ω + Σᵢ αᵢ·ε²ₜ₋ᵢ + Σⱼ βⱼ·σ²ₜ₋ⱼ
//!   ```
//!
//! - **AsymmetricLogVariance** (EGARCH(p,q), Nelson 1991):
//!
//!   ```text
//!   ln σ²ₜ = ω + Σᵢ [αᵢ·(|zₜ₋ᵢ| − √(2/π)) + γᵢ·zₜ₋ᵢ] + Σⱼ βⱼ·ln σ²ₜ₋ⱼ
//!   ```
//!
//! The numerical optimization is delegated through the [`VarianceSolver`]
//! trait; this module's own responsibility is pre-processing (dropping
//! non-finite returns), invoking the fit, the asymmetric variant's scale
//! correction, and annualization.
//!
//! # Asymmetric scale correction
//!
//! The asymmetric variant's raw conditional-vol path comes out on a different
//! numeric scale than the symmetric one and is divided by a fixed constant
//! (default 10⁴) before annualization. This is a real quirk of the variant's
//! output convention, carried deliberately and exposed as an explicit knob;
//! after the correction both variants annualize to percent identically.

use std::sync::Arc;
use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};

use crate::error::{FitFailureReason, Result, VolBackError};
use crate::estimators::VolatilityEstimator;
use crate::optim::{nelder_mead, NelderMeadConfig, SimplexStop};
use crate::series::{ReturnSeries, TimeSeries, VolatilityEstimate};
use crate::types::Annualization;
use crate::validate::validate_positive;

/// Division applied to the asymmetric variant's raw conditional vol before
/// annualization.
pub const DEFAULT_ASYMMETRIC_SCALE: f64 = 10_000.0;

/// Which conditional-variance recursion to fit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ConditionalVariant {
    /// GARCH(p,q): variance responds symmetrically to shocks.
    Symmetric,
    /// EGARCH(p,q): log-variance recursion with a sign-sensitive shock term.
    AsymmetricLogVariance,
}

impl ConditionalVariant {
    fn model_name(&self) -> &'static str {
        match self {
            ConditionalVariant::Symmetric => "GARCH",
            ConditionalVariant::AsymmetricLogVariance => "EGARCH",
        }
    }
}

/// Output of a conditional-variance fit.
#[derive(Debug, Clone)]
pub struct FittedVarianceModel {
    /// Fitted coefficient vector, in the recursion's parameter order
    /// (`[ω, α₁..α_p, β₁..β_q]` for the symmetric variant,
    /// `[ω, α₁..α_p, γ₁..γ_p, β₁..β_q]` for the asymmetric one).
    pub coefficients: Vec<f64>,
    /// In-sample conditional volatility σₜ per input return, raw (per-sample,
    /// un-annualized, un-corrected).
    pub conditional_vol: Vec<f64>,
    /// Gaussian log-likelihood at the optimum.
    pub log_likelihood: f64,
}

/// Numerical capability that fits a conditional-variance model.
///
/// Injected into [`ConditionalVol`] so the estimator's contract (shapes,
/// scale correction, annualization) stays independent of the optimizer's
/// internals, and so parallel grid cells can each hold their own solver
/// state.
pub trait VarianceSolver: Send + Sync {
    /// Fit `variant` with orders `(p, q)` to a series of finite returns.
    ///
    /// # Errors
    /// Returns [`VolBackError::FitFailure`] on non-convergence, or with
    /// [`FitFailureReason::Timeout`] if `budget` elapses first.
    fn fit(
        &self,
        returns: &[f64],
        variant: ConditionalVariant,
        p: usize,
        q: usize,
        budget: Option<Duration>,
    ) -> Result<FittedVarianceModel>;
}

/// Default solver: Gaussian quasi-MLE via the crate's Nelder-Mead simplex.
#[derive(Debug, Clone, Copy)]
pub struct NelderMeadSolver {
    /// Simplex iteration budget.
    pub max_iter: usize,
}

impl Default for NelderMeadSolver {
    fn default() -> Self {
        Self { max_iter: 2_000 }
    }
}

impl VarianceSolver for NelderMeadSolver {
    fn fit(
        &self,
        returns: &[f64],
        variant: ConditionalVariant,
        p: usize,
        q: usize,
        budget: Option<Duration>,
    ) -> Result<FittedVarianceModel> {
        let model = variant.model_name();
        let n = returns.len() as f64;
        let mean = returns.iter().sum::<f64>() / n;
        let residuals: Vec<f64> = returns.iter().map(|r| r - mean).collect();
        let sample_var = residuals.iter().map(|e| e * e).sum::<f64>() / n;

        if sample_var <= 0.0 {
            return Err(VolBackError::FitFailure {
                message: "returns have zero variance, likelihood is degenerate".into(),
                model,
                reason: FitFailureReason::NonConvergence,
            });
        }

        let (x0, steps) = starting_point(variant, p, q, sample_var);
        let objective = |params: &[f64]| match variant {
            ConditionalVariant::Symmetric => {
                garch_nll(&residuals, sample_var, params, p, q)
            }
            ConditionalVariant::AsymmetricLogVariance => {
                egarch_nll(&residuals, sample_var, params, p, q)
            }
        };

        let config = NelderMeadConfig {
            max_iter: self.max_iter,
            diameter_tol: 1e-10,
            fvalue_tol: 1e-10,
            deadline: budget.map(|b| Instant::now() + b),
        };
        let result = nelder_mead(objective, &x0, &steps, &config);

        match result.stop {
            SimplexStop::Converged => {}
            SimplexStop::MaxIter => {
                return Err(VolBackError::FitFailure {
                    message: format!(
                        "simplex did not converge after {} iterations (objective {:.6e})",
                        result.iterations, result.fval
                    ),
                    model,
                    reason: FitFailureReason::NonConvergence,
                });
            }
            SimplexStop::Deadline => {
                return Err(VolBackError::FitFailure {
                    message: format!(
                        "wall-clock budget exhausted after {} iterations",
                        result.iterations
                    ),
                    model,
                    reason: FitFailureReason::Timeout,
                });
            }
        }
        if !result.fval.is_finite() || result.fval >= PENALTY {
            return Err(VolBackError::FitFailure {
                message: "optimizer terminated outside the feasible region".into(),
                model,
                reason: FitFailureReason::NonConvergence,
            });
        }

        let variances = match variant {
            ConditionalVariant::Symmetric => {
                garch_variance_path(&residuals, sample_var, &result.x, p, q)
            }
            ConditionalVariant::AsymmetricLogVariance => {
                egarch_variance_path(&residuals, sample_var, &result.x, p, q)
            }
        };

        Ok(FittedVarianceModel {
            coefficients: result.x,
            conditional_vol: variances.iter().map(|v| v.sqrt()).collect(),
            log_likelihood: -result.fval,
        })
    }
}

/// Conditional-volatility estimator: fit, extract, correct, annualize.
#[derive(Clone)]
pub struct ConditionalVol {
    variant: ConditionalVariant,
    p: usize,
    q: usize,
    annualization: Annualization,
    scale_correction: f64,
    timeout: Option<Duration>,
    solver: Arc<dyn VarianceSolver>,
}

impl std::fmt::Debug for ConditionalVol {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConditionalVol")
            .field("variant", &self.variant)
            .field("p", &self.p)
            .field("q", &self.q)
            .field("annualization", &self.annualization)
            .field("scale_correction", &self.scale_correction)
            .field("timeout", &self.timeout)
            .finish_non_exhaustive()
    }
}

impl ConditionalVol {
    /// Create an estimator for `variant` with orders `(p, q)`.
    ///
    /// The asymmetric variant defaults to a scale correction of
    /// [`DEFAULT_ASYMMETRIC_SCALE`]; the symmetric one to 1.
    ///
    /// # Errors
    /// Returns [`VolBackError::InvalidParameter`] if `p == 0` (the recursion
    /// needs at least one shock lag).
    pub fn new(
        variant: ConditionalVariant,
        p: usize,
        q: usize,
        annualization: Annualization,
    ) -> Result<Self> {
        if p == 0 {
            return Err(VolBackError::InvalidParameter {
                message: "shock order p must be at least 1".into(),
            });
        }
        let scale_correction = match variant {
            ConditionalVariant::Symmetric => 1.0,
            ConditionalVariant::AsymmetricLogVariance => DEFAULT_ASYMMETRIC_SCALE,
        };
        Ok(Self {
            variant,
            p,
            q,
            annualization,
            scale_correction,
            timeout: None,
            solver: Arc::new(NelderMeadSolver::default()),
        })
    }

    /// Replace the injected solver.
    pub fn with_solver(mut self, solver: Arc<dyn VarianceSolver>) -> Self {
        self.solver = solver;
        self
    }

    /// Bound the fit by a wall-clock budget; exceeding it surfaces
    /// [`FitFailureReason::Timeout`].
    pub fn with_timeout(mut self, budget: Duration) -> Self {
        self.timeout = Some(budget);
        self
    }

    /// Override the variant's raw-output scale divisor.
    ///
    /// # Errors
    /// Returns [`VolBackError::InvalidParameter`] unless positive and finite.
    pub fn with_scale_correction(mut self, divisor: f64) -> Result<Self> {
        self.scale_correction = validate_positive(divisor, "scale correction")?;
        Ok(self)
    }

    /// Fitted conditional-volatility path, annualized to percent.
    ///
    /// Non-finite returns are dropped before the fit (mirroring the NaN-drop
    /// a differencing step leaves behind); output timestamps are those of the
    /// returns that entered the fit.
    ///
    /// # Errors
    /// - [`VolBackError::InsufficientData`] with fewer than `max(p, q) + 2`
    ///   finite returns.
    /// - [`VolBackError::FitFailure`] if the solver fails to converge or runs
    ///   out of budget. The grid evaluator records this per cell rather than
    ///   aborting the sweep.
    pub fn estimate(&self, returns: &ReturnSeries) -> Result<VolatilityEstimate> {
        let finite: Vec<(chrono::DateTime<chrono::Utc>, f64)> = returns
            .iter()
            .filter(|(_, v)| v.is_finite())
            .map(|(ts, v)| (ts, *v))
            .collect();

        let min_len = self.p.max(self.q) + 2;
        if finite.len() < min_len {
            return Err(VolBackError::InsufficientData {
                message: format!(
                    "{}({},{}) fit needs at least {min_len} finite returns, got {}",
                    self.variant.model_name(),
                    self.p,
                    self.q,
                    finite.len()
                ),
            });
        }

        let values: Vec<f64> = finite.iter().map(|(_, v)| *v).collect();
        let fitted = self
            .solver
            .fit(&values, self.variant, self.p, self.q, self.timeout)?;

        let points = finite
            .iter()
            .zip(fitted.conditional_vol.iter())
            .map(|(&(ts, _), &sigma)| {
                (ts, self.annualization.to_percent(sigma / self.scale_correction))
            })
            .collect();
        TimeSeries::from_sorted(points)
    }
}

impl VolatilityEstimator for ConditionalVol {
    fn estimate(&self, returns: &ReturnSeries) -> Result<VolatilityEstimate> {
        ConditionalVol::estimate(self, returns)
    }

    fn name(&self) -> &'static str {
        "conditional"
    }
}

// --- Likelihoods -----------------------------------------------------------

/// Objective value for infeasible parameter vectors. Finite so the simplex
/// can still order vertices.
const PENALTY: f64 = 1e12;

const LN_2PI: f64 = 1.837_877_066_409_345_5;

/// Gaussian negative log-likelihood of GARCH(p,q) parameters
/// `[ω, α₁..α_p, β₁..β_q]`.
fn garch_nll(residuals: &[f64], presample_var: f64, params: &[f64], p: usize, q: usize) -> f64 {
    let omega = params[0];
    let alphas = &params[1..1 + p];
    let betas = &params[1 + p..1 + p + q];

    if omega <= 0.0
        || alphas.iter().any(|a| *a < 0.0)
        || betas.iter().any(|b| *b < 0.0)
        || alphas.iter().sum::<f64>() + betas.iter().sum::<f64>() >= 1.0
    {
        return PENALTY;
    }

    let variances = garch_variance_path(residuals, presample_var, params, p, q);
    let mut nll = 0.0;
    for (e, v) in residuals.iter().zip(variances.iter()) {
        if *v <= 0.0 {
            return PENALTY;
        }
        nll += 0.5 * (LN_2PI + v.ln() + e * e / v);
    }
    if nll.is_finite() {
        nll
    } else {
        PENALTY
    }
}

/// Conditional-variance recursion for GARCH(p,q). Pre-sample ε² and σ² lags
/// are seeded with the sample variance.
fn garch_variance_path(
    residuals: &[f64],
    presample_var: f64,
    params: &[f64],
    p: usize,
    q: usize,
) -> Vec<f64> {
    let omega = params[0];
    let alphas = &params[1..1 + p];
    let betas = &params[1 + p..1 + p + q];

    let mut variances = Vec::with_capacity(residuals.len());
    for t in 0..residuals.len() {
        let mut v = omega;
        for (i, alpha) in alphas.iter().enumerate() {
            let eps_sq = if t > i {
                residuals[t - 1 - i].powi(2)
            } else {
                presample_var
            };
            v += alpha * eps_sq;
        }
        for (j, beta) in betas.iter().enumerate() {
            let lag_var = if t > j {
                variances[t - 1 - j]
            } else {
                presample_var
            };
            v += beta * lag_var;
        }
        variances.push(v);
    }
    variances
}

/// Gaussian negative log-likelihood of EGARCH(p,q) parameters
/// `[ω, α₁..α_p, γ₁..γ_p, β₁..β_q]`.
fn egarch_nll(residuals: &[f64], presample_var: f64, params: &[f64], p: usize, q: usize) -> f64 {
    let betas = &params[1 + 2 * p..1 + 2 * p + q];
    if betas.iter().map(|b| b.abs()).sum::<f64>() >= 1.0 {
        return PENALTY;
    }

    let variances = egarch_variance_path(residuals, presample_var, params, p, q);
    let mut nll = 0.0;
    for (e, v) in residuals.iter().zip(variances.iter()) {
        if !v.is_finite() || *v <= 0.0 {
            return PENALTY;
        }
        nll += 0.5 * (LN_2PI + v.ln() + e * e / v);
    }
    if nll.is_finite() {
        nll
    } else {
        PENALTY
    }
}

/// Log-variance recursion for EGARCH(p,q). Pre-sample ln σ² lags are seeded
/// with ln(sample variance); pre-sample standardized shocks with 0.
fn egarch_variance_path(
    residuals: &[f64],
    presample_var: f64,
    params: &[f64],
    p: usize,
    q: usize,
) -> Vec<f64> {
    let omega = params[0];
    let alphas = &params[1..1 + p];
    let gammas = &params[1 + p..1 + 2 * p];
    let betas = &params[1 + 2 * p..1 + 2 * p + q];

    // E|z| for standard normal z.
    let abs_z_mean = (2.0 / std::f64::consts::PI).sqrt();
    let ln_presample = presample_var.ln();

    let mut log_vars: Vec<f64> = Vec::with_capacity(residuals.len());
    let mut variances: Vec<f64> = Vec::with_capacity(residuals.len());
    for t in 0..residuals.len() {
        let mut lv = omega;
        for i in 0..p {
            let z = if t > i {
                let sigma = variances[t - 1 - i].sqrt();
                if sigma > 0.0 {
                    residuals[t - 1 - i] / sigma
                } else {
                    0.0
                }
            } else {
                0.0
            };
            lv += alphas[i] * (z.abs() - abs_z_mean) + gammas[i] * z;
        }
        for (j, beta) in betas.iter().enumerate() {
            let lag = if t > j { log_vars[t - 1 - j] } else { ln_presample };
            lv += beta * lag;
        }
        // Clamp so a wandering simplex vertex cannot overflow exp().
        let lv = lv.clamp(-700.0, 700.0);
        log_vars.push(lv);
        variances.push(lv.exp());
    }
    variances
}

/// Starting vertex and per-coordinate simplex steps for the fit.
fn starting_point(
    variant: ConditionalVariant,
    p: usize,
    q: usize,
    sample_var: f64,
) -> (Vec<f64>, Vec<f64>) {
    match variant {
        ConditionalVariant::Symmetric => {
            let alpha0 = 0.10 / p as f64;
            let beta0 = 0.80 / q.max(1) as f64;
            let omega0 = sample_var * 0.10;
            let mut x0 = vec![omega0];
            x0.extend(std::iter::repeat(alpha0).take(p));
            x0.extend(std::iter::repeat(beta0).take(q));
            let steps = x0.iter().map(|v| (v.abs() * 0.5).max(1e-12)).collect();
            (x0, steps)
        }
        ConditionalVariant::AsymmetricLogVariance => {
            let beta0 = 0.90 / q.max(1) as f64;
            let omega0 = sample_var.ln() * (1.0 - 0.90);
            let mut x0 = vec![omega0];
            x0.extend(std::iter::repeat(0.10).take(p)); // alphas
            x0.extend(std::iter::repeat(0.0).take(p)); // gammas
            x0.extend(std::iter::repeat(beta0).take(q));
            let mut steps = vec![(omega0.abs() * 0.5).max(0.01)];
            steps.extend(std::iter::repeat(0.05).take(2 * p));
            steps.extend(std::iter::repeat(0.05).take(q));
            (x0, steps)
        }
    }
}
