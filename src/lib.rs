//! # volback
//!
//! Short-horizon volatility estimation and backtesting against a
//! market-observed implied-volatility benchmark.
//!
//! Given a traded price-ratio series and an at-the-money implied-vol series,
//! the crate answers: which volatility estimator, under which lookback window
//! and multiplicative scaling correction, tracks the options market best?
//!
//! ## Architecture
//!
//! - **`series`**: timestamped series, fixed-width resampling, inner-join
//!   alignment
//! - **`returns`**: log-return computation
//! - **`estimators`**: rolling historical, GARCH / EGARCH conditional,
//!   Heston-type Monte Carlo simulation
//! - **`grid`**: lookback x scaling evaluation against the benchmark via
//!   MSE/RMSE
//! - **`backtest`**: configuration surface and the end-to-end harness
//!
//! ## Design
//!
//! - **Sorted by construction.** Rolling statistics over an unsorted series
//!   are meaningless, so [`TimeSeries`] enforces ascending timestamps in its
//!   constructors and everything downstream relies on it.
//! - **Batch, not streaming.** The engine processes closed historical
//!   windows; there is no incremental update path.
//! - **No panics.** Every fallible operation returns [`Result`]. Library
//!   code never calls `unwrap()` or `expect()` on user-reachable paths.
//! - **Partial failure.** One failed conditional fit marks its own grid
//!   cells failed and the sweep continues; an empty overlap is reported as
//!   `NoOverlap`, never conflated with a perfect-fit MSE of 0.
//! - **Reproducible randomness.** The Heston simulator owns a per-call
//!   seeded generator; identical seeds reproduce identical paths, and
//!   concurrent simulations cannot interfere.
//! - **Thread-safe.** Estimators are `Send + Sync`; with
//!   `feature = "parallel"` the grid is evaluated on the rayon pool.
//!
//! ## Example
//!
//! ```
//! use chrono::{TimeZone, Utc};
//! use volback::backtest::{Backtest, BacktestConfig};
//! use volback::series::TimeSeries;
//!
//! let base = Utc.with_ymd_and_hms(2024, 7, 18, 0, 0, 0).unwrap();
//! let prices = TimeSeries::from_sorted(
//!     (0..600)
//!         .map(|i| {
//!             let wobble = 0.003 * ((i % 5) as f64 - 2.0);
//!             (base + chrono::Duration::seconds(10 * i), 1.0 + wobble)
//!         })
//!         .collect(),
//! )?;
//! let benchmark = TimeSeries::from_sorted(
//!     (0..100)
//!         .map(|i| (base + chrono::Duration::minutes(i), 65.0))
//!         .collect(),
//! )?;
//!
//! let config = BacktestConfig {
//!     lookback_minutes: vec![5, 10],
//!     scaling_factors: vec![1.0, 1.5, 2.0],
//!     ..BacktestConfig::default()
//! };
//! let report = Backtest::new(config)?.run_historical(&prices, &benchmark)?;
//! if let Some(best) = report.best_fit() {
//!     println!("best: lookback {} x{}", best.lookback, best.scaling);
//! }
//! # Ok::<(), volback::VolBackError>(())
//! ```

pub mod backtest;
pub mod error;
pub mod estimators;
pub mod grid;
pub mod returns;
pub mod series;
pub mod types;

mod optim;
mod validate;

#[doc(inline)]
pub use error::{FitFailureReason, Result, VolBackError};
#[doc(inline)]
pub use estimators::VolatilityEstimator;
#[doc(inline)]
pub use grid::{CellOutcome, GridReport};
#[doc(inline)]
pub use series::{PriceSeries, ReturnSeries, TimeSeries, VolatilityEstimate};
#[doc(inline)]
pub use types::{Annualization, EstimatorKind};
