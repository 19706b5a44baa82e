//! Property-based tests using proptest.
//!
//! These verify invariant properties across random inputs rather than fixed
//! examples: return-series shape, resampling idempotence, estimator
//! determinism, simulator reproducibility, and the squared-error surface of
//! the scaling axis.

use chrono::{DateTime, Duration, TimeZone, Utc};
use proptest::prelude::*;
use std::collections::BTreeMap;
use volback::estimators::{heston, HestonParams, HistoricalVol};
use volback::grid::{self, CellOutcome, LookbackInput};
use volback::returns::log_returns;
use volback::series::resample;
use volback::{Annualization, EstimatorKind, TimeSeries};

fn base() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 7, 18, 0, 0, 0).unwrap()
}

fn uniform_series(values: &[f64]) -> TimeSeries<f64> {
    TimeSeries::from_sorted(
        values
            .iter()
            .enumerate()
            .map(|(i, &v)| (base() + Duration::seconds(10 * i as i64), v))
            .collect(),
    )
    .unwrap()
}

// --- Property 1: log-return shape and invertibility ---

proptest! {
    /// For strictly positive prices, output length is input length - 1 and
    /// exponentiating each return recovers the price ratio.
    #[test]
    fn log_returns_shape_and_ratio(
        prices in prop::collection::vec(0.01_f64..1000.0, 2..200),
    ) {
        let series = uniform_series(&prices);
        let returns = log_returns(&series).unwrap();
        prop_assert_eq!(returns.len(), prices.len() - 1);
        for (i, r) in returns.values().enumerate() {
            let ratio = prices[i + 1] / prices[i];
            prop_assert!((r.exp() - ratio).abs() < 1e-9 * ratio.abs());
        }
    }
}

// --- Property 2: resampling is idempotent at the same width ---

proptest! {
    /// Resampling an already-resampled series at the same bucket width
    /// returns the same series (every bucket is then a singleton).
    #[test]
    fn resample_idempotent(
        values in prop::collection::vec(-100.0_f64..100.0, 1..150),
        gaps in prop::collection::vec(1_i64..500, 1..150),
        bucket_secs in 10_i64..600,
    ) {
        let n = values.len().min(gaps.len());
        let mut t = 0;
        let mut points = Vec::with_capacity(n);
        for i in 0..n {
            t += gaps[i];
            points.push((base() + Duration::seconds(t), values[i]));
        }
        let series = TimeSeries::from_sorted(points).unwrap();

        let bucket = Duration::seconds(bucket_secs);
        let once = resample(&series, bucket).unwrap();
        let twice = resample(&once, bucket).unwrap();

        prop_assert_eq!(once.len(), twice.len());
        for (a, b) in once.iter().zip(twice.iter()) {
            prop_assert_eq!(a.0, b.0);
            prop_assert!((a.1 - b.1).abs() <= 1e-9 * a.1.abs().max(1.0));
        }
    }
}

// --- Property 3: rolling estimator output count and determinism ---

proptest! {
    /// The rolling estimator emits exactly returns - L + 1 points and is
    /// deterministic for identical input.
    #[test]
    fn historical_output_count_and_determinism(
        returns in prop::collection::vec(-0.05_f64..0.05, 10..150),
        lookback in 2_usize..9,
    ) {
        prop_assume!(returns.len() >= lookback);
        let series = uniform_series(&returns);
        let estimator =
            HistoricalVol::new(lookback, Annualization::new(3_153_600).unwrap()).unwrap();
        let a = estimator.estimate(&series).unwrap();
        let b = estimator.estimate(&series).unwrap();
        prop_assert_eq!(a.len(), returns.len() - lookback + 1);
        prop_assert_eq!(a, b);
    }
}

// --- Property 4: simulator reproducibility ---

proptest! {
    /// Same seed, parameters, and step count always reproduce the same path;
    /// every variance stays non-negative under the absolute-value floor.
    #[test]
    fn heston_seed_reproducibility(
        seed in any::<u64>(),
        steps in 2_usize..256,
        kappa in 0.0_f64..5.0,
        sigma in 0.0_f64..2.0,
        rho in -0.95_f64..0.95,
    ) {
        let returns = uniform_series(&[0.001, -0.002, 0.0015, -0.0005, 0.002, -0.001]);
        let params = HestonParams { kappa, sigma, rho, theta: None };
        let a = heston::simulate(&returns, 1.0, &params, 1.0, steps, seed).unwrap();
        let b = heston::simulate(&returns, 1.0, &params, 1.0, steps, seed).unwrap();
        prop_assert_eq!(&a, &b);
        prop_assert!(a.variances.iter().all(|v| *v >= 0.0));
    }
}

// --- Property 5: the scaling axis traces a quadratic error surface ---

proptest! {
    /// With the benchmark equal to the unscaled estimate, scoring at scale k
    /// gives MSE = (k-1)^2 x mean-square of the estimate: zero at k = 1 and
    /// growing quadratically away from it.
    #[test]
    fn grid_mse_is_quadratic_in_scale(
        values in prop::collection::vec(1.0_f64..100.0, 2..50),
        k in 0.1_f64..5.0,
    ) {
        let estimate = uniform_series(&values);
        let mut inputs = BTreeMap::new();
        inputs.insert(
            1,
            LookbackInput {
                estimate: Ok(estimate.clone()),
                benchmark: estimate.clone(),
            },
        );
        let report = grid::evaluate(EstimatorKind::Historical, &inputs, &[k]);
        let mean_square = values.iter().map(|v| v * v).sum::<f64>() / values.len() as f64;
        let expected = (k - 1.0) * (k - 1.0) * mean_square;
        match report.cells()[0].outcome {
            CellOutcome::Scored { mse, .. } => {
                prop_assert!((mse - expected).abs() <= 1e-9 * expected.max(1.0));
            }
            ref other => prop_assert!(false, "expected scored cell, got {:?}", other),
        }
    }
}
