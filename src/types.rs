//! Core domain types shared across estimators and the grid evaluator.
//!
//! # Volatility unit convention
//!
//! Every [`VolatilityEstimate`](crate::series::VolatilityEstimate) produced by
//! this crate is an **annualized percentage**: the per-sample standard
//! deviation is multiplied by `sqrt(samples_per_year)` and then by 100,
//! exactly once, inside the estimator that produced it. The implied-vol
//! benchmark is quoted on the same percent scale, so grid cells compare like
//! with like. A mismatched annualization constant between two estimators
//! invalidates any MSE comparison between them, which is why the constant is
//! a validated shared type rather than a per-call bare integer.

use serde::{Deserialize, Serialize};

use crate::error::{Result, VolBackError};

/// Validated annualization constant: the number of raw sampling intervals in
/// one year.
///
/// For the 10-second sampling of the original data feed this is
/// `365 * 24 * 60 * 6 = 3_153_600`.
///
/// # Examples
/// ```
/// use volback::types::Annualization;
/// let ann = Annualization::new(365 * 24 * 60 * 6).unwrap();
/// assert!(ann.factor() > 1775.0 && ann.factor() < 1776.0);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "u32", into = "u32")]
pub struct Annualization {
    samples_per_year: u32,
}

impl Annualization {
    /// Create an annualization constant.
    ///
    /// # Errors
    /// Returns [`VolBackError::InvalidParameter`] if `samples_per_year` is 0.
    pub fn new(samples_per_year: u32) -> Result<Self> {
        if samples_per_year == 0 {
            return Err(VolBackError::InvalidParameter {
                message: "annualization constant must be a positive sample count".into(),
            });
        }
        Ok(Self { samples_per_year })
    }

    /// Number of raw sampling intervals per year.
    pub fn samples_per_year(&self) -> u32 {
        self.samples_per_year
    }

    /// `sqrt(samples_per_year)`: multiplies a per-sample standard deviation
    /// into an annualized one.
    pub fn factor(&self) -> f64 {
        f64::from(self.samples_per_year).sqrt()
    }

    /// Annualize a per-sample standard deviation and express it in percent.
    pub fn to_percent(&self, per_sample_sigma: f64) -> f64 {
        per_sample_sigma * self.factor() * 100.0
    }
}

impl TryFrom<u32> for Annualization {
    type Error = VolBackError;

    fn try_from(samples_per_year: u32) -> Result<Self> {
        Self::new(samples_per_year)
    }
}

impl From<Annualization> for u32 {
    fn from(a: Annualization) -> u32 {
        a.samples_per_year
    }
}

/// Which estimator family produced a grid row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EstimatorKind {
    /// Rolling-window standard deviation of log-returns.
    Historical,
    /// Fitted conditional-heteroskedasticity model (GARCH / EGARCH family).
    Conditional,
    /// Heston-type stochastic-volatility Monte Carlo path.
    Heston,
}

impl EstimatorKind {
    /// Short display label used in reports.
    pub fn label(&self) -> &'static str {
        match self {
            EstimatorKind::Historical => "historical",
            EstimatorKind::Conditional => "conditional",
            EstimatorKind::Heston => "heston",
        }
    }
}
