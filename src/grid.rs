//! Grid evaluation: scoring estimator x lookback x scaling combinations
//! against the implied-vol benchmark.
//!
//! Each cell scales one lookback's estimate by one factor, inner-joins it
//! with that lookback's resampled benchmark, and scores the overlap by
//! MSE/RMSE. Cells are independent; iteration is lookback-major and
//! scaling-minor, and the order is deterministic for reproducible reporting.
//! With `feature = "parallel"` the lookbacks are evaluated on the rayon pool
//! with an order-preserving collect.
//!
//! Partial failure is the rule, not the exception: a failed conditional fit
//! for one lookback marks that lookback's cells [`CellOutcome::Failed`] and
//! the sweep continues. An empty overlap is [`CellOutcome::NoOverlap`],
//! never an MSE of 0, which would be indistinguishable from a perfect fit.
//! An MSE that comes out NaN (poisoned by a non-positive price upstream) is
//! reported as NaN; [`GridReport::best_fit`] skips non-finite scores.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

#[cfg(feature = "parallel")]
use rayon::prelude::*;

use crate::error::Result;
use crate::series::{align, TimeSeries, VolatilityEstimate};
use crate::types::EstimatorKind;

/// Outcome of one grid cell.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum CellOutcome {
    /// Estimate and benchmark overlapped; scores may still be NaN if a NaN
    /// reached the overlap.
    Scored { mse: f64, rmse: f64 },
    /// The aligned intersection was empty: no comparable data.
    NoOverlap,
    /// The estimate for this lookback could not be produced (e.g. a fit
    /// failure); the diagnostic is preserved.
    Failed { message: String },
}

/// One row of the evaluation grid, keyed by (estimator, lookback, scaling).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GridCell {
    pub kind: EstimatorKind,
    /// Lookback period, in the caller's period unit (minutes in the stock
    /// pipeline).
    pub lookback: u32,
    /// Multiplicative correction applied uniformly to the estimate.
    pub scaling: f64,
    pub outcome: CellOutcome,
    /// The scaled-estimate/benchmark pairs that were scored. `None` unless
    /// the cell was scored.
    pub aligned: Option<TimeSeries<(f64, f64)>>,
}

impl GridCell {
    /// RMSE if this cell was scored and the score is finite.
    pub fn finite_rmse(&self) -> Option<f64> {
        match self.outcome {
            CellOutcome::Scored { rmse, .. } if rmse.is_finite() => Some(rmse),
            _ => None,
        }
    }
}

/// The full evaluation grid, in deterministic lookback-major order.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GridReport {
    cells: Vec<GridCell>,
}

impl GridReport {
    /// All cells, lookback-major, scaling-minor.
    pub fn cells(&self) -> &[GridCell] {
        &self.cells
    }

    /// Cells with a finite score.
    pub fn scored(&self) -> impl Iterator<Item = &GridCell> + '_ {
        self.cells.iter().filter(|c| c.finite_rmse().is_some())
    }

    /// The cell with the lowest finite RMSE, if any cell scored.
    pub fn best_fit(&self) -> Option<&GridCell> {
        self.scored().min_by(|a, b| {
            let ra = a.finite_rmse().unwrap_or(f64::INFINITY);
            let rb = b.finite_rmse().unwrap_or(f64::INFINITY);
            ra.partial_cmp(&rb).unwrap_or(std::cmp::Ordering::Equal)
        })
    }

    /// Scored cells sorted by RMSE ascending, for "best fit" reporting.
    pub fn sorted_by_rmse(&self) -> Vec<&GridCell> {
        let mut cells: Vec<&GridCell> = self.scored().collect();
        cells.sort_by(|a, b| {
            let ra = a.finite_rmse().unwrap_or(f64::INFINITY);
            let rb = b.finite_rmse().unwrap_or(f64::INFINITY);
            ra.partial_cmp(&rb).unwrap_or(std::cmp::Ordering::Equal)
        });
        cells
    }

    /// Merge several reports (e.g. one per estimator kind) into one.
    pub fn merged(reports: impl IntoIterator<Item = GridReport>) -> GridReport {
        GridReport {
            cells: reports.into_iter().flat_map(|r| r.cells).collect(),
        }
    }
}

/// Estimate and benchmark for one lookback, both already resampled onto the
/// same bucket grid. The estimate is a `Result` so per-lookback failures
/// (one bad fit) flow into the grid as failed cells instead of aborting the
/// sweep.
pub struct LookbackInput {
    pub estimate: Result<VolatilityEstimate>,
    pub benchmark: VolatilityEstimate,
}

/// Mean squared difference of estimate vs benchmark over aligned rows.
///
/// NaN anywhere in the overlap poisons the result to NaN; callers treat a
/// non-finite score as a failed cell.
pub fn mse(aligned: &TimeSeries<(f64, f64)>) -> f64 {
    let n = aligned.len();
    if n == 0 {
        return f64::NAN;
    }
    aligned
        .values()
        .map(|(estimate, benchmark)| (estimate - benchmark).powi(2))
        .sum::<f64>()
        / n as f64
}

/// Evaluate the full lookback x scaling grid for one estimator kind.
///
/// Scaling is a pure multiplicative correction on the estimate, uniform
/// across timestamps, never re-estimated. Cells are mutually independent;
/// the result order is deterministic regardless of execution order.
pub fn evaluate(
    kind: EstimatorKind,
    inputs: &BTreeMap<u32, LookbackInput>,
    scaling_factors: &[f64],
) -> GridReport {
    #[cfg(feature = "parallel")]
    let cells = inputs
        .par_iter()
        .map(|(&lookback, input)| evaluate_lookback(kind, lookback, input, scaling_factors))
        .flatten()
        .collect();

    #[cfg(not(feature = "parallel"))]
    let cells = inputs
        .iter()
        .flat_map(|(&lookback, input)| evaluate_lookback(kind, lookback, input, scaling_factors))
        .collect();

    GridReport { cells }
}

fn evaluate_lookback(
    kind: EstimatorKind,
    lookback: u32,
    input: &LookbackInput,
    scaling_factors: &[f64],
) -> Vec<GridCell> {
    let estimate = match &input.estimate {
        Ok(estimate) => estimate,
        Err(err) => {
            return scaling_factors
                .iter()
                .map(|&scaling| GridCell {
                    kind,
                    lookback,
                    scaling,
                    outcome: CellOutcome::Failed {
                        message: err.to_string(),
                    },
                    aligned: None,
                })
                .collect();
        }
    };

    scaling_factors
        .iter()
        .map(|&scaling| {
            let aligned = align(&estimate.scaled(scaling), &input.benchmark);
            if aligned.is_empty() {
                GridCell {
                    kind,
                    lookback,
                    scaling,
                    outcome: CellOutcome::NoOverlap,
                    aligned: None,
                }
            } else {
                let mse = mse(&aligned);
                GridCell {
                    kind,
                    lookback,
                    scaling,
                    outcome: CellOutcome::Scored {
                        mse,
                        rmse: mse.sqrt(),
                    },
                    aligned: Some(aligned),
                }
            }
        })
        .collect()
}
