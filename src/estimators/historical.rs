//! Rolling historical volatility.
//!
//! The simplest estimator: annualized sample standard deviation of
//! log-returns over a trailing window. Deterministic and parameter-light,
//! it is the baseline every other estimator is judged against.

use serde::{Deserialize, Serialize};

use crate::error::{Result, VolBackError};
use crate::estimators::VolatilityEstimator;
use crate::series::{ReturnSeries, TimeSeries, VolatilityEstimate};
use crate::types::Annualization;

/// Rolling-window historical volatility estimator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct HistoricalVol {
    lookback_samples: usize,
    annualization: Annualization,
}

impl HistoricalVol {
    /// Create an estimator with a trailing window of `lookback_samples`
    /// returns.
    ///
    /// # Errors
    /// Returns [`VolBackError::InvalidParameter`] if `lookback_samples <= 1`:
    /// a one-sample window has zero variance by construction and would score
    /// as a degenerate perfect-calm estimate.
    pub fn new(lookback_samples: usize, annualization: Annualization) -> Result<Self> {
        if lookback_samples <= 1 {
            return Err(VolBackError::InvalidParameter {
                message: format!(
                    "lookback window must exceed 1 sample, got {lookback_samples}"
                ),
            });
        }
        Ok(Self {
            lookback_samples,
            annualization,
        })
    }

    /// Trailing window length in raw samples.
    pub fn lookback_samples(&self) -> usize {
        self.lookback_samples
    }

    /// Annualized volatility (percent) at each position with a full window.
    ///
    /// For each position `i >= lookback - 1` the output holds the sample
    /// standard deviation (n−1 denominator) of the trailing `lookback`
    /// returns, annualized. Positions without a full window produce no row.
    /// A NaN anywhere in a window makes that window's output NaN; later
    /// windows without the NaN recover.
    ///
    /// # Errors
    /// Returns [`VolBackError::InsufficientData`] if the return series is
    /// shorter than the window.
    pub fn estimate(&self, returns: &ReturnSeries) -> Result<VolatilityEstimate> {
        let lookback = self.lookback_samples;
        if returns.len() < lookback {
            return Err(VolBackError::InsufficientData {
                message: format!(
                    "rolling window of {lookback} needs at least {lookback} returns, got {}",
                    returns.len()
                ),
            });
        }

        let timestamps: Vec<_> = returns.timestamps().collect();
        let values: Vec<f64> = returns.values().copied().collect();
        let mut points = Vec::with_capacity(returns.len() - lookback + 1);
        for i in (lookback - 1)..values.len() {
            let window = &values[i + 1 - lookback..=i];
            let sigma = sample_std(window);
            points.push((timestamps[i], self.annualization.to_percent(sigma)));
        }

        TimeSeries::from_sorted(points)
    }
}

impl VolatilityEstimator for HistoricalVol {
    fn estimate(&self, returns: &ReturnSeries) -> Result<VolatilityEstimate> {
        HistoricalVol::estimate(self, returns)
    }

    fn name(&self) -> &'static str {
        "historical"
    }
}

/// Sample standard deviation with n−1 denominator.
///
/// Two-pass so a NaN only poisons the windows it actually sits in.
fn sample_std(window: &[f64]) -> f64 {
    let n = window.len() as f64;
    let mean = window.iter().sum::<f64>() / n;
    let var = window.iter().map(|r| (r - mean).powi(2)).sum::<f64>() / (n - 1.0);
    var.sqrt()
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;
    use chrono::{DateTime, TimeZone, Utc};

    fn ts(secs: i64) -> DateTime<Utc> {
        Utc.timestamp_opt(1_721_260_800 + secs, 0).unwrap()
    }

    fn returns(values: &[f64]) -> ReturnSeries {
        TimeSeries::from_sorted(
            values
                .iter()
                .enumerate()
                .map(|(i, &v)| (ts(10 * i as i64), v))
                .collect(),
        )
        .unwrap()
    }

    fn ann() -> Annualization {
        Annualization::new(3_153_600).unwrap()
    }

    #[test]
    fn rejects_degenerate_window() {
        assert!(matches!(
            HistoricalVol::new(1, ann()),
            Err(VolBackError::InvalidParameter { .. })
        ));
        assert!(matches!(
            HistoricalVol::new(0, ann()),
            Err(VolBackError::InvalidParameter { .. })
        ));
    }

    #[test]
    fn output_count_is_returns_minus_window_plus_one() {
        let est = HistoricalVol::new(3, ann()).unwrap();
        let r = returns(&[0.01, -0.02, 0.03, 0.01, -0.01]);
        let vol = est.estimate(&r).unwrap();
        assert_eq!(vol.len(), 3);
        // Timestamps of the windows' trailing returns.
        assert_eq!(vol.get(0).unwrap().0, ts(20));
        assert_eq!(vol.get(2).unwrap().0, ts(40));
    }

    #[test]
    fn matches_hand_computed_stdev() {
        // Window [0.01, -0.02, 0.03]: mean = 0.004, sample var = 0.00063, sd = sqrt.
        let ann = Annualization::new(100).unwrap();
        let est = HistoricalVol::new(3, ann).unwrap();
        let vol = est.estimate(&returns(&[0.01, -0.02, 0.03])).unwrap();
        assert_eq!(vol.len(), 1);
        let expected = 0.000_63_f64.sqrt() * 10.0 * 100.0;
        assert_abs_diff_eq!(*vol.get(0).unwrap().1, expected, epsilon = 1e-9);
    }

    #[test]
    fn deterministic_for_identical_inputs() {
        let est = HistoricalVol::new(4, ann()).unwrap();
        let r = returns(&[0.01, -0.02, 0.03, 0.01, -0.01, 0.02]);
        let a = est.estimate(&r).unwrap();
        let b = est.estimate(&r).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn insufficient_history_is_an_error() {
        let est = HistoricalVol::new(5, ann()).unwrap();
        assert!(matches!(
            est.estimate(&returns(&[0.01, 0.02])),
            Err(VolBackError::InsufficientData { .. })
        ));
    }

    #[test]
    fn zero_returns_give_zero_vol() {
        let est = HistoricalVol::new(3, ann()).unwrap();
        let vol = est.estimate(&returns(&[0.0, 0.0, 0.0, 0.0])).unwrap();
        for v in vol.values() {
            assert_eq!(*v, 0.0);
        }
    }

    #[test]
    fn nan_poisons_only_its_windows() {
        let est = HistoricalVol::new(2, ann()).unwrap();
        let vol = est
            .estimate(&returns(&[0.01, f64::NAN, 0.02, 0.01]))
            .unwrap();
        assert_eq!(vol.len(), 3);
        assert!(vol.get(0).unwrap().1.is_nan());
        assert!(vol.get(1).unwrap().1.is_nan());
        assert!(vol.get(2).unwrap().1.is_finite());
    }
}
