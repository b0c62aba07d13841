//! # Validation Module
//!
//! Business rule validation for settlement requests.
//!
//! ## Validation Strategy
//! ```text
//! Layer 1: Caller (UI/API)       - format checks, immediate feedback
//! Layer 2: THIS MODULE           - business rule validation, runs
//!                                  BEFORE any write (nothing to roll back)
//! Layer 3: Database (SQLite)     - NOT NULL / FK / CHECK constraints
//! ```
//!
//! A request that fails validation is rejected without opening a
//! transaction; storage failures after validation abort the whole
//! unit of work instead.

use crate::error::ValidationError;
use crate::types::{CartLine, PointsRequest};
use crate::{MAX_CART_LINES, MAX_LINE_QUANTITY};

/// Result type for validation operations.
pub type ValidationResult<T> = Result<T, ValidationError>;

/// Validates the cart lines of a checkout or edit request.
///
/// Emptiness is the coordinator's concern (`CoreError::EmptyCart`);
/// this checks the lines themselves.
pub fn validate_cart_lines(lines: &[CartLine]) -> ValidationResult<()> {
    if lines.len() > MAX_CART_LINES {
        return Err(ValidationError::OutOfRange {
            field: "cart".to_string(),
            min: 1,
            max: MAX_CART_LINES as i64,
        });
    }

    for line in lines {
        if line.medicine_id.trim().is_empty() {
            return Err(ValidationError::Required {
                field: "medicine_id".to_string(),
            });
        }

        if line.quantity <= 0 {
            return Err(ValidationError::MustBePositive {
                field: "quantity".to_string(),
            });
        }

        if line.quantity > MAX_LINE_QUANTITY {
            return Err(ValidationError::OutOfRange {
                field: "quantity".to_string(),
                min: 1,
                max: MAX_LINE_QUANTITY,
            });
        }

        if line.unit_price_cents < 0 {
            return Err(ValidationError::MustBePositive {
                field: "unit_price_cents".to_string(),
            });
        }
    }

    Ok(())
}

/// Validates the points portion of a checkout or edit request.
pub fn validate_points_request(points: &PointsRequest) -> ValidationResult<()> {
    if !points.used.is_finite() {
        return Err(ValidationError::NotFinite {
            field: "points.used".to_string(),
        });
    }

    if points.used < 0.0 {
        return Err(ValidationError::MustBePositive {
            field: "points.used".to_string(),
        });
    }

    if !points.multiplier.is_finite() || points.multiplier < 0.0 {
        return Err(ValidationError::NotFinite {
            field: "points.multiplier".to_string(),
        });
    }

    Ok(())
}

/// Validates a manual point adjustment delta.
///
/// Zero and non-finite adjustments are rejected before any write.
pub fn validate_manual_delta(delta: f64) -> ValidationResult<()> {
    if !delta.is_finite() {
        return Err(ValidationError::NotFinite {
            field: "points".to_string(),
        });
    }

    if delta == 0.0 {
        return Err(ValidationError::ZeroAdjustment);
    }

    Ok(())
}

// =============================================================================
// Unit Tests
// =============================================================================
