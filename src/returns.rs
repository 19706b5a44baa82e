//! Log-return computation.
//!
//! The first stage of every estimator: a price series becomes a series of
//! natural-log ratios of consecutive prices. The output is one point shorter
//! than the input (no return exists for the first price).

use crate::error::{Result, VolBackError};
use crate::series::{PriceSeries, ReturnSeries, TimeSeries};

/// Compute log-returns `r[i] = ln(price[i] / price[i-1])`.
///
/// Each return carries the timestamp of the *later* price. Non-positive
/// prices produce non-finite values (NaN or infinities) which are propagated,
/// not filtered; they poison downstream rolling statistics by design so the
/// caller can see the bad cell rather than a silently cleaned series.
///
/// # Errors
/// Returns [`VolBackError::InsufficientData`] if the series has fewer than
/// 2 points.
pub fn log_returns(prices: &PriceSeries) -> Result<ReturnSeries> {
    if prices.len() < 2 {
        return Err(VolBackError::InsufficientData {
            message: format!(
                "log returns need at least 2 prices, got {}",
                prices.len()
            ),
        });
    }

    let mut points = Vec::with_capacity(prices.len() - 1);
    for ((_, prev), (ts, curr)) in prices.iter().zip(prices.iter().skip(1)) {
        points.push((ts, (curr / prev).ln()));
    }

    // Price timestamps are ascending, so the derived timestamps are too.
    TimeSeries::from_sorted(points)
}
