//! Heston-type stochastic-volatility Monte Carlo simulation.
//!
//! Price and instantaneous variance evolve as coupled processes:
//!
//! ```text
//! dS = μ·S·dt + √V·S·dW₁
//! dV = κ·(θ − V)·dt + σ·√V·dW₂
//! dW₁·dW₂ = ρ dt
//! ```
//!
//! discretized by an explicit Euler scheme with correlated Gaussian
//! increments. Drift and initial variance are estimated from the supplied
//! return series; κ, σ, ρ are caller-supplied constants. No calibration is
//! performed.
//!
//! # Variance floor
//!
//! The Euler step can take the variance negative; this scheme takes the
//! absolute value after each update. That is an explicit approximation, not a
//! proof-grade non-negativity scheme: it biases the variance process upward
//! near zero. Known modeling limitation, carried deliberately.

use chrono::{DateTime, Duration, Utc};
use rand::rngs::StdRng;
use rand::SeedableRng;
use rand_distr::{Distribution, StandardNormal};
use serde::{Deserialize, Serialize};

use crate::error::{Result, VolBackError};
use crate::series::{ReturnSeries, TimeSeries};
use crate::validate::{validate_correlation, validate_non_negative, validate_positive};

/// Heston model constants. Defaults are the conventional research values for
/// this pipeline: moderate mean reversion, low vol-of-vol, strongly negative
/// spot-vol correlation.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct HestonParams {
    /// Mean-reversion speed κ ≥ 0.
    pub kappa: f64,
    /// Vol-of-vol σ ≥ 0 (σ = 0 makes the variance path deterministic).
    pub sigma: f64,
    /// Spot-variance correlation ρ ∈ (−1, 1).
    pub rho: f64,
    /// Long-run variance θ. `None` defaults to the initial variance estimated
    /// from the return series.
    pub theta: Option<f64>,
}

impl Default for HestonParams {
    fn default() -> Self {
        Self {
            kappa: 2.0,
            sigma: 0.1,
            rho: -0.7,
            theta: None,
        }
    }
}

impl HestonParams {
    fn validate(&self) -> Result<()> {
        validate_non_negative(self.kappa, "kappa")?;
        validate_non_negative(self.sigma, "sigma")?;
        validate_correlation(self.rho, "rho")?;
        if let Some(theta) = self.theta {
            validate_non_negative(theta, "theta")?;
        }
        Ok(())
    }
}

/// One simulated path: times in years plus the price and variance arrays,
/// each of length `steps`. Variances are in percent (×100, applied once at
/// the end of the recursion).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HestonPath {
    pub times: Vec<f64>,
    pub prices: Vec<f64>,
    pub variances: Vec<f64>,
}

impl HestonPath {
    /// Lay the variance path (percent) onto wall-clock timestamps starting
    /// at `origin`, with each simulation time `t` (years) mapped to
    /// `origin + t · 365 days`.
    ///
    /// This is the bridge from the simulator's own time grid into the
    /// resample/align layer. Sub-millisecond step spacings collapse onto the
    /// same timestamp and are averaged away by the next resample.
    pub fn variance_series(&self, origin: DateTime<Utc>) -> TimeSeries<f64> {
        const MS_PER_YEAR: f64 = 365.0 * 24.0 * 3600.0 * 1000.0;
        TimeSeries::from_unordered(
            self.times
                .iter()
                .zip(self.variances.iter())
                .map(|(&t, &v)| (origin + Duration::milliseconds((t * MS_PER_YEAR) as i64), v))
                .collect(),
        )
    }
}

/// Simulate one correlated price/variance path.
///
/// Internal parameter estimation: initial variance `V0` is the population
/// variance of the finite returns, drift `μ` their mean, and `θ` defaults to
/// `V0` unless overridden. The random stream is a fresh `StdRng` seeded from
/// `seed`, never a shared generator, so the same seed, parameters, and step
/// count always reproduce the same path, and concurrent simulations cannot
/// interfere.
///
/// A constant price series gives `V0 = 0`: every `√V` term vanishes and the
/// path is a valid deterministic trajectory, not an error.
///
/// # Errors
/// [`VolBackError::InvalidParameter`] if `steps < 1`, a parameter is out of
/// range, or `last_price`/`horizon_years` is not positive-finite;
/// [`VolBackError::InsufficientData`] if no finite returns are supplied.
pub fn simulate(
    returns: &ReturnSeries,
    last_price: f64,
    params: &HestonParams,
    horizon_years: f64,
    steps: usize,
    seed: u64,
) -> Result<HestonPath> {
    params.validate()?;
    validate_positive(last_price, "last price")?;
    validate_positive(horizon_years, "horizon")?;
    if steps < 1 {
        return Err(VolBackError::InvalidParameter {
            message: "step count must be at least 1".into(),
        });
    }

    let finite: Vec<f64> = returns.values().copied().filter(|v| v.is_finite()).collect();
    if finite.is_empty() {
        return Err(VolBackError::InsufficientData {
            message: "heston parameter estimation needs at least 1 finite return".into(),
        });
    }
    let n = finite.len() as f64;
    let mu = finite.iter().sum::<f64>() / n;
    // Population variance (n denominator).
    let v0 = finite.iter().map(|r| (r - mu).powi(2)).sum::<f64>() / n;
    let theta = params.theta.unwrap_or(v0);

    let dt = horizon_years / steps as f64;
    let sqrt_dt = dt.sqrt();
    let rho = params.rho;
    let rho_orth = (1.0 - rho * rho).sqrt();

    let mut rng = StdRng::seed_from_u64(seed);
    let mut prices = Vec::with_capacity(steps);
    let mut variances = Vec::with_capacity(steps);
    prices.push(last_price);
    variances.push(v0);

    for i in 1..steps {
        let z1: f64 = StandardNormal.sample(&mut rng);
        let z2: f64 = StandardNormal.sample(&mut rng);
        let w1 = sqrt_dt * z1;
        let w2 = sqrt_dt * (rho * z1 + rho_orth * z2);

        let prev_price = prices[i - 1];
        let prev_var = variances[i - 1];
        prices.push(prev_price * ((mu - 0.5 * prev_var) * dt + prev_var.sqrt() * w1).exp());
        variances.push(
            (prev_var + params.kappa * (theta - prev_var) * dt + params.sigma * prev_var.sqrt() * w2)
                .abs(),
        );
    }

    // Percent scale, applied once at the end so the recursion itself stays in
    // raw variance units.
    for v in &mut variances {
        *v *= 100.0;
    }

    let times = if steps == 1 {
        vec![0.0]
    } else {
        (0..steps)
            .map(|i| horizon_years * i as f64 / (steps - 1) as f64)
            .collect()
    };

    Ok(HestonPath {
        times,
        prices,
        variances,
    })
}
