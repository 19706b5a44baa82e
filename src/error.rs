//! Error types for the volback library.
//!
//! All fallible operations return `Result<T, VolBackError>` rather than
//! panicking, providing meaningful diagnostics for failed model fits, invalid
//! inputs, and series with too little history.
//!
//! Note that an empty overlap between an estimate and the benchmark is *not*
//! an error: the grid evaluator reports it as
//! [`CellOutcome::NoOverlap`](crate::grid::CellOutcome) so callers can tell
//! "no comparable data" apart from a genuinely perfect fit.

use thiserror::Error;

/// Convenience type alias for results in this crate.
pub type Result<T> = std::result::Result<T, VolBackError>;

/// Why a conditional-variance fit was abandoned.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FitFailureReason {
    /// The optimizer exhausted its iteration budget without converging.
    NonConvergence,
    /// The optional wall-clock budget for the fit was exceeded.
    Timeout,
}

/// Errors that can occur during volatility estimation and backtesting.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum VolBackError {
    /// A series is too short for the requested computation
    /// (e.g., a rolling window longer than the return series).
    #[error("insufficient data: {message}")]
    InsufficientData { message: String },

    /// A parameter is out of range (non-positive window, zero step count,
    /// malformed annualization constant, correlation outside (-1, 1), ...).
    /// Aborts the single call; never retried.
    #[error("invalid parameter: {message}")]
    InvalidParameter { message: String },

    /// A conditional-variance model fit failed.
    ///
    /// The grid evaluator catches this per cell and records a failed cell
    /// instead of aborting the whole lookback x scaling sweep.
    #[error("fit failed ({model}): {message}")]
    FitFailure {
        message: String,
        /// Model that failed (e.g., "GARCH", "EGARCH").
        model: &'static str,
        reason: FitFailureReason,
    },
}
