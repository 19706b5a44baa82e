//! The backtest harness: configuration surface plus the repeated
//! filter / estimate / resample / score pipeline, centralized.
//!
//! Every estimator run follows the same shape: filter both series from an
//! optional start date, difference prices into log-returns, build each
//! lookback's estimate, resample estimate and benchmark onto that lookback's
//! bucket grid, and hand the lot to the grid evaluator. [`Backtest`] owns
//! that recurrence so per-estimator call sites don't each re-implement the
//! alignment semantics.
//!
//! Lookbacks are configured in **minutes** and converted to raw-sample
//! windows via the explicit `samples_per_minute` constant; the same minute
//! figure is the resampling bucket width. The annualization constant is
//! shared by every estimator in a run; mixing constants would make the
//! MSE comparison between cells meaningless.

use std::collections::BTreeMap;
use std::time::Duration as StdDuration;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{Result, VolBackError};
use crate::estimators::{
    heston, ConditionalVariant, ConditionalVol, HestonParams, HistoricalVol,
};
use crate::grid::{evaluate, GridReport, LookbackInput};
use crate::returns::log_returns;
use crate::series::{resample, resample_anchored, PriceSeries, ReturnSeries, TimeSeries};
use crate::types::{Annualization, EstimatorKind};

/// Conditional-variance model configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ConditionalConfig {
    pub variant: ConditionalVariant,
    pub p: usize,
    pub q: usize,
    /// Override for the asymmetric variant's raw-output divisor.
    pub scale_correction: Option<f64>,
    /// Wall-clock budget per fit, in seconds.
    pub timeout_secs: Option<u64>,
}

impl Default for ConditionalConfig {
    fn default() -> Self {
        Self {
            variant: ConditionalVariant::Symmetric,
            p: 1,
            q: 1,
            scale_correction: None,
            timeout_secs: None,
        }
    }
}

/// Heston simulation configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct HestonConfig {
    #[serde(flatten)]
    pub params: HestonParams,
    pub horizon_years: f64,
    pub steps: usize,
    pub seed: u64,
}

impl Default for HestonConfig {
    fn default() -> Self {
        Self {
            params: HestonParams::default(),
            horizon_years: 1.0,
            steps: 8_192,
            seed: 42,
        }
    }
}

/// Full configuration surface for a backtest run.
///
/// Defaults mirror the stock research setup: 10-second sampling
/// (6 samples per minute, 3,153,600 per year), lookbacks of 200/300/400
/// minutes, scaling factors 1–2.5.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BacktestConfig {
    /// Lookback periods in minutes; each is both the rolling-window span and
    /// the resampling bucket width.
    pub lookback_minutes: Vec<u32>,
    /// Multiplicative corrections tested per lookback, in reporting order.
    pub scaling_factors: Vec<f64>,
    /// Raw sampling intervals per year (annualization constant).
    pub samples_per_year: u32,
    /// Raw sampling intervals per minute (lookback conversion constant).
    pub samples_per_minute: u32,
    /// Drop data before this instant, if set.
    pub start: Option<DateTime<Utc>>,
    pub conditional: ConditionalConfig,
    pub heston: HestonConfig,
}

impl Default for BacktestConfig {
    fn default() -> Self {
        Self {
            lookback_minutes: vec![200, 300, 400],
            scaling_factors: vec![1.0, 1.5, 2.0, 2.5],
            samples_per_year: 365 * 24 * 60 * 6,
            samples_per_minute: 6,
            start: None,
            conditional: ConditionalConfig::default(),
            heston: HestonConfig::default(),
        }
    }
}

/// A validated backtest over one price series and one benchmark series.
#[derive(Debug, Clone)]
pub struct Backtest {
    config: BacktestConfig,
    annualization: Annualization,
}

impl Backtest {
    /// Validate a configuration into a runnable backtest.
    ///
    /// # Errors
    /// Returns [`VolBackError::InvalidParameter`] for empty lookback/scaling
    /// axes, a zero conversion constant, a zero lookback, or a malformed
    /// annualization constant.
    pub fn new(config: BacktestConfig) -> Result<Self> {
        if config.lookback_minutes.is_empty() {
            return Err(VolBackError::InvalidParameter {
                message: "at least one lookback period is required".into(),
            });
        }
        if config.scaling_factors.is_empty() {
            return Err(VolBackError::InvalidParameter {
                message: "at least one scaling factor is required".into(),
            });
        }
        if config.samples_per_minute == 0 {
            return Err(VolBackError::InvalidParameter {
                message: "samples per minute must be positive".into(),
            });
        }
        if let Some(&bad) = config.lookback_minutes.iter().find(|&&l| l == 0) {
            return Err(VolBackError::InvalidParameter {
                message: format!("lookback periods must be positive, got {bad}"),
            });
        }
        let annualization = Annualization::new(config.samples_per_year)?;
        Ok(Self {
            config,
            annualization,
        })
    }

    /// The shared annualization constant.
    pub fn annualization(&self) -> Annualization {
        self.annualization
    }

    /// Rolling historical volatility across the lookback x scaling grid.
    pub fn run_historical(
        &self,
        prices: &PriceSeries,
        benchmark: &TimeSeries<f64>,
    ) -> Result<GridReport> {
        let returns = self.prepare_returns(prices)?;
        let benchmark = self.prepare_benchmark(benchmark);
        let inputs = self.lookback_inputs(&benchmark, |lookback| {
            let window = lookback as usize * self.config.samples_per_minute as usize;
            let estimator = HistoricalVol::new(window, self.annualization)?;
            estimator.estimate(&returns)
        })?;
        Ok(evaluate(
            EstimatorKind::Historical,
            &inputs,
            &self.config.scaling_factors,
        ))
    }

    /// Conditional (GARCH-family) volatility across the grid. A fit failure
    /// for one lookback becomes failed cells for that lookback only.
    pub fn run_conditional(
        &self,
        prices: &PriceSeries,
        benchmark: &TimeSeries<f64>,
    ) -> Result<GridReport> {
        let returns = self.prepare_returns(prices)?;
        let benchmark = self.prepare_benchmark(benchmark);
        let cfg = &self.config.conditional;
        let inputs = self.lookback_inputs(&benchmark, |_| {
            let mut estimator =
                ConditionalVol::new(cfg.variant, cfg.p, cfg.q, self.annualization)?;
            if let Some(divisor) = cfg.scale_correction {
                estimator = estimator.with_scale_correction(divisor)?;
            }
            if let Some(secs) = cfg.timeout_secs {
                estimator = estimator.with_timeout(StdDuration::from_secs(secs));
            }
            estimator.estimate(&returns)
        })?;
        Ok(evaluate(
            EstimatorKind::Conditional,
            &inputs,
            &self.config.scaling_factors,
        ))
    }

    /// Simulated Heston variance path (percent) across the grid.
    ///
    /// The path is simulated once (it does not depend on the lookback) and
    /// laid onto the filtered price series' time axis from its first
    /// timestamp; each lookback then resamples it at that lookback's bucket
    /// width like any other estimate.
    pub fn run_heston(
        &self,
        prices: &PriceSeries,
        benchmark: &TimeSeries<f64>,
    ) -> Result<GridReport> {
        let prices = self.filter(prices);
        let returns = log_returns(&prices)?;
        let benchmark = self.prepare_benchmark(benchmark);
        let (origin, last_price) = match (prices.first(), prices.last()) {
            (Some((origin, _)), Some((_, &last_price))) => (origin, last_price),
            _ => {
                return Err(VolBackError::InsufficientData {
                    message: "price series is empty after start-date filtering".into(),
                })
            }
        };

        let cfg = &self.config.heston;
        let path = heston::simulate(
            &returns,
            last_price,
            &cfg.params,
            cfg.horizon_years,
            cfg.steps,
            cfg.seed,
        )?;
        let estimate = path.variance_series(origin);

        let inputs = self.lookback_inputs(&benchmark, |_| Ok(estimate.clone()))?;
        Ok(evaluate(
            EstimatorKind::Heston,
            &inputs,
            &self.config.scaling_factors,
        ))
    }

    /// All three estimator families, merged into one report.
    pub fn run_all(
        &self,
        prices: &PriceSeries,
        benchmark: &TimeSeries<f64>,
    ) -> Result<GridReport> {
        Ok(GridReport::merged([
            self.run_historical(prices, benchmark)?,
            self.run_conditional(prices, benchmark)?,
            self.run_heston(prices, benchmark)?,
        ]))
    }

    fn filter(&self, series: &TimeSeries<f64>) -> TimeSeries<f64> {
        match self.config.start {
            Some(start) => series.clone().filter_from(start),
            None => series.clone(),
        }
    }

    fn prepare_returns(&self, prices: &PriceSeries) -> Result<ReturnSeries> {
        log_returns(&self.filter(prices))
    }

    fn prepare_benchmark(&self, benchmark: &TimeSeries<f64>) -> TimeSeries<f64> {
        self.filter(benchmark)
    }

    /// Build per-lookback inputs: run `estimate` for each lookback (its
    /// failure lands in that lookback's cells) and resample both sides at the
    /// lookback's bucket width.
    ///
    /// The estimate's bucket edges are anchored at the benchmark's first
    /// timestamp. An estimate series typically starts a few samples into the
    /// data (returns lose one point, rolling windows more), and a self-anchored
    /// grid shifted by a fraction of a bucket would never join the benchmark's.
    fn lookback_inputs(
        &self,
        benchmark: &TimeSeries<f64>,
        mut estimate: impl FnMut(u32) -> Result<TimeSeries<f64>>,
    ) -> Result<BTreeMap<u32, LookbackInput>> {
        let anchor = benchmark.first().map(|(ts, _)| ts);
        let mut inputs = BTreeMap::new();
        for &lookback in &self.config.lookback_minutes {
            let bucket = Duration::minutes(i64::from(lookback));
            let estimate = estimate(lookback).and_then(|series| match anchor {
                Some(anchor) => resample_anchored(&series, bucket, anchor),
                None => resample(&series, bucket),
            });
            let benchmark = resample(benchmark, bucket)?;
            inputs.insert(lookback, LookbackInput { estimate, benchmark });
        }
        Ok(inputs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::grid::CellOutcome;
    use chrono::TimeZone;

    fn ts(secs: i64) -> DateTime<Utc> {
        Utc.timestamp_opt(1_721_260_800 + secs, 0).unwrap()
    }

    /// 10-second prices with a mild oscillation, 2 hours of data.
    fn prices() -> PriceSeries {
        TimeSeries::from_sorted(
            (0..720)
                .map(|i| {
                    let wobble = 0.002 * ((i % 7) as f64 - 3.0);
                    (ts(10 * i), 1.0 + wobble + 0.0001 * i as f64)
                })
                .collect(),
        )
        .unwrap()
    }

    /// Minutely benchmark over the same span.
    fn benchmark() -> TimeSeries<f64> {
        TimeSeries::from_sorted((0..120).map(|i| (ts(60 * i), 60.0)).collect()).unwrap()
    }

    fn small_config() -> BacktestConfig {
        BacktestConfig {
            lookback_minutes: vec![5, 10],
            scaling_factors: vec![1.0, 2.0],
            heston: HestonConfig {
                steps: 128,
                ..HestonConfig::default()
            },
            ..BacktestConfig::default()
        }
    }

    #[test]
    fn config_validation_rejects_empty_axes() {
        let mut config = small_config();
        config.lookback_minutes.clear();
        assert!(Backtest::new(config).is_err());

        let mut config = small_config();
        config.scaling_factors.clear();
        assert!(Backtest::new(config).is_err());

        let mut config = small_config();
        config.lookback_minutes = vec![5, 0];
        assert!(Backtest::new(config).is_err());

        let mut config = small_config();
        config.samples_per_minute = 0;
        assert!(Backtest::new(config).is_err());

        let mut config = small_config();
        config.samples_per_year = 0;
        assert!(Backtest::new(config).is_err());
    }

    #[test]
    fn historical_grid_has_full_shape_and_scores() {
        let backtest = Backtest::new(small_config()).unwrap();
        let report = backtest.run_historical(&prices(), &benchmark()).unwrap();
        assert_eq!(report.cells().len(), 4);
        for cell in report.cells() {
            assert!(
                matches!(cell.outcome, CellOutcome::Scored { .. }),
                "unexpected outcome {:?}",
                cell.outcome
            );
        }
        assert!(report.best_fit().is_some());
    }

    #[test]
    fn conditional_grid_tolerates_per_lookback_failure() {
        let mut config = small_config();
        // Zero-second budget: every fit times out, every cell records it.
        config.conditional.timeout_secs = Some(0);
        let backtest = Backtest::new(config).unwrap();
        let report = backtest.run_conditional(&prices(), &benchmark()).unwrap();
        assert_eq!(report.cells().len(), 4);
        for cell in report.cells() {
            match &cell.outcome {
                CellOutcome::Failed { message } => assert!(message.contains("budget")),
                other => panic!("expected failed cell, got {other:?}"),
            }
        }
    }

    #[test]
    fn heston_grid_scores_against_benchmark() {
        let backtest = Backtest::new(small_config()).unwrap();
        let report = backtest.run_heston(&prices(), &benchmark()).unwrap();
        assert_eq!(report.cells().len(), 4);
        // The simulated path starts at the price series' origin, so the
        // early buckets overlap the benchmark.
        assert!(report.scored().count() > 0);
    }

    #[test]
    fn start_date_filter_drops_early_history() {
        let mut config = small_config();
        config.start = Some(ts(3600));
        let backtest = Backtest::new(config).unwrap();
        let report = backtest.run_historical(&prices(), &benchmark()).unwrap();
        // Only one hour of returns remains: the 10-minute lookback needs
        // 600 samples but only ~360 remain, so its cells fail; the 5-minute
        // lookback (300 samples) still scores.
        let by_lookback: Vec<(u32, bool)> = report
            .cells()
            .iter()
            .map(|c| (c.lookback, matches!(c.outcome, CellOutcome::Scored { .. })))
            .collect();
        assert!(by_lookback.iter().any(|&(l, ok)| l == 5 && ok));
        assert!(by_lookback.iter().all(|&(l, ok)| l != 10 || !ok));
    }

    #[test]
    fn run_all_merges_three_kinds() {
        let backtest = Backtest::new(small_config()).unwrap();
        let report = backtest.run_all(&prices(), &benchmark()).unwrap();
        assert_eq!(report.cells().len(), 12);
        let kinds: std::collections::BTreeSet<&str> =
            report.cells().iter().map(|c| c.kind.label()).collect();
        assert_eq!(kinds.len(), 3);
    }

    #[test]
    fn config_deserializes_with_defaults() {
        let config: BacktestConfig = serde_json::from_str(r#"{"lookback_minutes": [150]}"#).unwrap();
        assert_eq!(config.lookback_minutes, vec![150]);
        assert_eq!(config.scaling_factors, vec![1.0, 1.5, 2.0, 2.5]);
        assert_eq!(config.samples_per_minute, 6);
        assert_eq!(config.heston.seed, 42);
        assert_eq!(config.conditional.p, 1);
    }
}
