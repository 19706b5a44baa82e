//! Input validation helpers.
//!
//! Standardizes validation across the crate using `!is_finite()` to reject
//! NaN, +Inf, and -Inf uniformly.

use crate::error::VolBackError;

/// Validate that a value is strictly positive and finite (rejects NaN, Inf, zero, negatives).
pub(crate) fn validate_positive(value: f64, name: &str) -> crate::error::Result<f64> {
    if !value.is_finite() || value <= 0.0 {
        return Err(VolBackError::InvalidParameter {
            message: format!("{name} must be positive and finite, got {value}"),
        });
    }
    Ok(value)
}

/// Validate that a value is non-negative and finite (rejects NaN, Inf, negatives).
pub(crate) fn validate_non_negative(value: f64, name: &str) -> crate::error::Result<f64> {
    if !value.is_finite() || value < 0.0 {
        return Err(VolBackError::InvalidParameter {
            message: format!("{name} must be non-negative and finite, got {value}"),
        });
    }
    Ok(value)
}

/// Validate that a correlation lies strictly inside (-1, 1).
pub(crate) fn validate_correlation(value: f64, name: &str) -> crate::error::Result<f64> {
    if value.is_nan() || value.abs() >= 1.0 {
        return Err(VolBackError::InvalidParameter {
            message: format!("{name} must be in (-1, 1), got {value}"),
        });
    }
    Ok(value)
}
