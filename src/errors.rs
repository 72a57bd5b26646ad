//! Error types and validation functions for surrogate significance testing.
//!
//! Only configuration and input problems are errors. Degenerate numerical
//! outcomes (zero-power denominators, empty band masks, empty trimmed
//! remainders) resolve to sentinel values inside the estimators instead.

use thiserror::Error;

/// Error types for spectral estimation and surrogate testing.
#[derive(Error, Debug, Clone, PartialEq)]
#[non_exhaustive]
pub enum SurrogateTestError {
    /// Insufficient data for the requested operation.
    #[error("Insufficient data: need at least {required} points, got {actual}")]
    InsufficientData {
        /// Minimum required data points
        required: usize,
        /// Actual number of data points provided
        actual: usize,
    },

    /// Invalid parameter value in a test configuration or call.
    #[error("Invalid parameter: {parameter} = {value}, expected {constraint}")]
    InvalidParameter {
        /// Parameter name
        parameter: String,
        /// Invalid value provided
        value: f64,
        /// Valid range or constraint description
        constraint: String,
    },

    /// Non-finite input or a numerical failure inside an estimator.
    #[error("Numerical computation failed: {reason}")]
    NumericalError {
        /// Detailed reason for numerical failure
        reason: String,
        /// Operation that failed
        operation: Option<String>,
    },

    /// FFT planning failure.
    #[error("FFT computation failed: input size {size} not supported")]
    FftError {
        /// Input size that caused the FFT failure
        size: usize,
    },

    /// Serialization/deserialization error.
    #[error("Serialization failed: {format}")]
    SerializationError {
        /// Format that failed (JSON, CSV)
        format: String,
    },
}

/// Result type for surrogate testing operations.
pub type SurrogateResult<T> = Result<T, SurrogateTestError>;

impl SurrogateTestError {
    /// Shorthand for an [`SurrogateTestError::InvalidParameter`].
    pub fn invalid(parameter: &str, value: f64, constraint: impl Into<String>) -> Self {
        SurrogateTestError::InvalidParameter {
            parameter: parameter.to_string(),
            value,
            constraint: constraint.into(),
        }
    }

    /// True for errors caused by user configuration rather than data.
    pub fn is_invalid_parameter(&self) -> bool {
        matches!(self, SurrogateTestError::InvalidParameter { .. })
    }
}

/// Validates that data has sufficient length for analysis.
///
/// # Example
/// ```rust
/// use surrogate_coherence::errors::validate_data_length;
///
/// let data = vec![1.0, 2.0, 3.0];
/// assert!(validate_data_length(&data, 2).is_ok());
/// assert!(validate_data_length(&data, 5).is_err());
/// ```
pub fn validate_data_length(data: &[f64], min_required: usize) -> SurrogateResult<()> {
    if data.len() < min_required {
        Err(SurrogateTestError::InsufficientData {
            required: min_required,
            actual: data.len(),
        })
    } else {
        Ok(())
    }
}

/// Validates that a parameter is within `[min, max]`.
///
/// # Example
/// ```rust
/// use surrogate_coherence::errors::validate_parameter;
///
/// assert!(validate_parameter(0.1, 0.0, 0.5, "trim").is_ok());
/// assert!(validate_parameter(0.7, 0.0, 0.5, "trim").is_err());
/// ```
pub fn validate_parameter(value: f64, min: f64, max: f64, name: &str) -> SurrogateResult<()> {
    if value.is_nan() {
        return Err(SurrogateTestError::invalid(name, value, "must not be NaN"));
    }

    if min.is_nan() || max.is_nan() || min > max {
        return Err(SurrogateTestError::NumericalError {
            reason: format!(
                "Invalid bounds for parameter {}: min={}, max={}",
                name, min, max
            ),
            operation: None,
        });
    }

    if value < min || value > max {
        Err(SurrogateTestError::invalid(
            name,
            value,
            format!("[{}, {}]", min, max),
        ))
    } else {
        Ok(())
    }
}

/// Validates that a value is finite and not NaN.
pub fn validate_finite(value: f64, name: &str) -> SurrogateResult<()> {
    if !value.is_finite() {
        Err(SurrogateTestError::NumericalError {
            reason: format!("{} is not finite: {}", name, value),
            operation: None,
        })
    } else {
        Ok(())
    }
}

/// Validates that all values in a slice are finite.
///
/// Returns on the first non-finite value with its index in the message.
pub fn validate_all_finite(data: &[f64], name: &str) -> SurrogateResult<()> {
    if let Some((i, &value)) = data.iter().enumerate().find(|(_, v)| !v.is_finite()) {
        let value_desc = if value.is_nan() {
            "NaN".to_string()
        } else if value.is_sign_positive() {
            "Infinity".to_string()
        } else {
            "-Infinity".to_string()
        };

        return Err(SurrogateTestError::NumericalError {
            reason: format!(
                "{} contains non-finite value at index {}: {}",
                name, i, value_desc
            ),
            operation: None,
        });
    }

    Ok(())
}

/// Validates that a series pair has matching lengths.
pub fn validate_equal_length(x: &[f64], y: &[f64]) -> SurrogateResult<()> {
    if x.len() != y.len() {
        return Err(SurrogateTestError::invalid(
            "series_lengths",
            x.len() as f64,
            format!("must match second series length of {}", y.len()),
        ));
    }
    Ok(())
}
