//! Bound correction for string lengths and numeric ranges
//!
//! Contradictory bounds are repaired and recorded as lint violations; only an
//! unusable `minLength`/`maxLength` value is rejected outright.

use crate::error::{ContractError, Result};
use crate::lint::{LintLog, LintRule, LintViolation};

/// Default ceiling for declared string lengths (4 MiB).
pub const DEFAULT_MAX_STRING_LENGTH: usize = 4 * 1024 * 1024;

/// Corrected string length bounds.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LengthBounds {
    pub min: Option<usize>,
    pub max: Option<usize>,
    /// `min` was clamped to the ceiling rather than declared
    pub min_downsampled: bool,
    /// `max` was clamped to the ceiling rather than declared
    pub max_downsampled: bool,
}

/// Validate and repair `minLength`/`maxLength`.
///
/// # Errors
///
/// Returns [`ContractError::BadValue`] when `minLength` is below 1 or
/// `maxLength` is negative.
pub fn normalize_length(
    min_length: Option<i64>,
    max_length: Option<i64>,
    ceiling: usize,
    breadcrumb: &str,
    lints: &mut LintLog,
) -> Result<LengthBounds> {
    if let Some(min) = min_length.filter(|m| *m < 1) {
        return Err(ContractError::BadValue {
            breadcrumb: breadcrumb.to_string(),
            message: format!("minLength must be at least 1, found {min}"),
        });
    }
    if let Some(max) = max_length.filter(|m| *m < 0) {
        return Err(ContractError::BadValue {
            breadcrumb: breadcrumb.to_string(),
            message: format!("maxLength cannot be negative, found {max}"),
        });
    }

    let (min, min_downsampled) = clamp_length("minLength", min_length, ceiling, breadcrumb, lints);
    let (mut max, max_downsampled) =
        clamp_length("maxLength", max_length, ceiling, breadcrumb, lints);

    if let (Some(lo), Some(hi)) = (min, max) {
        if hi < lo {
            lints.record(LintViolation::new(
                LintRule::ConflictingConstraints,
                breadcrumb,
                format!("maxLength {hi} is less than minLength {lo}; ignoring maxLength"),
            ));
            max = None;
        }
    }

    Ok(LengthBounds {
        min,
        max,
        min_downsampled,
        max_downsampled: max_downsampled && max.is_some(),
    })
}

fn clamp_length(
    keyword: &str,
    declared: Option<i64>,
    ceiling: usize,
    breadcrumb: &str,
    lints: &mut LintLog,
) -> (Option<usize>, bool) {
    let Some(declared) = declared else {
        return (None, false);
    };
    let declared = usize::try_from(declared).unwrap_or(usize::MAX);
    if declared > ceiling {
        lints.record(LintViolation::new(
            LintRule::LengthDownsampled,
            breadcrumb,
            format!("{keyword} {declared} exceeds {ceiling}; downsampled to {ceiling}"),
        ));
        (Some(ceiling), true)
    } else {
        (Some(declared), false)
    }
}

/// Numeric bounds with exclusivity flags.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct NumericBounds {
    pub minimum: Option<f64>,
    pub maximum: Option<f64>,
    pub exclusive_minimum: bool,
    pub exclusive_maximum: bool,
}

impl NumericBounds {
    /// Lowest value considered in range when checking for conflicts.
    #[must_use]
    pub fn effective_min(&self) -> Option<f64> {
        self.minimum
            .map(|m| if self.exclusive_minimum { m + 1.0 } else { m })
    }

    /// Highest value considered in range when checking for conflicts.
    #[must_use]
    pub fn effective_max(&self) -> Option<f64> {
        self.maximum
            .map(|m| if self.exclusive_maximum { m - 1.0 } else { m })
    }
}

/// Repair a numeric range whose maximum lies below its minimum.
///
/// The declared minimum is kept; the maximum becomes `minimum + 1`
/// (inclusive).
pub fn normalize_numeric(bounds: NumericBounds, breadcrumb: &str, lints: &mut LintLog) -> NumericBounds {
    let (Some(lo), Some(hi)) = (bounds.effective_min(), bounds.effective_max()) else {
        return bounds;
    };
    if hi >= lo {
        return bounds;
    }
    let (Some(minimum), Some(maximum)) = (bounds.minimum, bounds.maximum) else {
        return bounds;
    };
    let repaired = minimum + 1.0;
    lints.record(LintViolation::new(
        LintRule::ConflictingConstraints,
        breadcrumb,
        format!("maximum {maximum} is less than minimum {minimum}; using maximum {repaired}"),
    ));
    NumericBounds {
        maximum: Some(repaired),
        exclusive_maximum: false,
        ..bounds
    }
}
