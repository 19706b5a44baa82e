//! Volatility estimators.
//!
//! Three families, all consuming the same [`ReturnSeries`]:
//!
//! - [`HistoricalVol`]: rolling-window standard deviation, annualized
//! - [`ConditionalVol`]: fitted GARCH / EGARCH conditional-vol path
//! - [`heston`]: Heston-type Monte Carlo price/variance simulation
//!
//! The first two implement [`VolatilityEstimator`] and slot directly into
//! the grid harness; the Heston simulator produces a path on its own time
//! grid and is bridged to a timestamped series by the harness.

pub mod conditional;
pub mod heston;
pub mod historical;

pub use conditional::{
    ConditionalVariant, ConditionalVol, FittedVarianceModel, NelderMeadSolver, VarianceSolver,
    DEFAULT_ASYMMETRIC_SCALE,
};
pub use heston::{simulate, HestonParams, HestonPath};
pub use historical::HistoricalVol;

use crate::error::Result;
use crate::series::{ReturnSeries, VolatilityEstimate};

/// A volatility estimator producing an annualized-percent series from
/// log-returns.
///
/// # Thread Safety
/// Implementations must be `Send + Sync`: grid cells may run the same
/// estimator concurrently, and each call must be self-contained (own solver
/// state, no shared mutable state).
pub trait VolatilityEstimator: Send + Sync {
    /// Annualized volatility (percent) per return timestamp with enough
    /// history.
    fn estimate(&self, returns: &ReturnSeries) -> Result<VolatilityEstimate>;

    /// Short label for reports.
    fn name(&self) -> &'static str;
}
