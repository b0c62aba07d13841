//! # Error Types
//!
//! Domain-specific error types for farma-core.
//!
//! ## Error Hierarchy
//! ```text
//! farma-core errors (this file)
//! ├── CoreError        - Business rule violations
//! └── ValidationError  - Input validation failures (pre-write rejection)
//!
//! farma-db errors (separate crate)
//! └── DbError          - Storage failures; wraps CoreError transparently
//! ```
//!
//! ## Design Principles
//! 1. Use `thiserror` for derive macros (not manual impl)
//! 2. Include context in error messages (sale id, medicine id, etc.)
//! 3. Errors are enum variants, never String

use thiserror::Error;

// =============================================================================
// Core Error
// =============================================================================

/// Core business logic errors.
///
/// These errors represent business rule violations raised by the
/// settlement, void, and edit paths. Validation errors are rejected
/// before any write; the remaining variants abort the whole unit of
/// work with no partial effect.
#[derive(Debug, Error)]
pub enum CoreError {
    /// Checkout was attempted with no cart lines.
    #[error("Cart is empty")]
    EmptyCart,

    /// Sale cannot be found.
    #[error("Sale not found: {0}")]
    SaleNotFound(String),

    /// The sale was already voided; voiding or editing it again is rejected.
    ///
    /// A sale's status transitions Completed → Voided exactly once.
    #[error("Sale {0} is already voided")]
    AlreadyVoided(String),

    /// Insufficient stock to complete a sale.
    ///
    /// Only raised when the allocation policy has backorders disabled;
    /// the default policy never blocks a checkout and lets batch
    /// quantities go negative instead.
    #[error("Insufficient stock for medicine {medicine_id}: available {available}, requested {requested}")]
    InsufficientStock {
        medicine_id: String,
        available: i64,
        requested: i64,
    },

    /// Validation error (wraps ValidationError).
    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),
}

// =============================================================================
// Validation Error
// =============================================================================

/// Input validation errors.
///
/// These occur when a request doesn't meet requirements. Used for early
/// validation before any write happens, so there is nothing to roll back.
#[derive(Debug, Error)]
pub enum ValidationError {
    /// A required field is missing or empty.
    #[error("{field} is required")]
    Required { field: String },

    /// Value must be positive.
    #[error("{field} must be positive")]
    MustBePositive { field: String },

    /// Numeric value is out of range.
    #[error("{field} must be between {min} and {max}")]
    OutOfRange { field: String, min: i64, max: i64 },

    /// Floating-point value is NaN or infinite.
    #[error("{field} must be a finite number")]
    NotFinite { field: String },

    /// Manual point adjustments of zero are meaningless and rejected.
    #[error("Point adjustment must be non-zero")]
    ZeroAdjustment,
}

// =============================================================================
// Result Type Alias
// =============================================================================

/// Convenience type alias for Results with CoreError.
pub type CoreResult<T> = Result<T, CoreError>;

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_messages() {
        let err = CoreError::InsufficientStock {
            medicine_id: "med-1".to_string(),
            available: 3,
            requested: 5,
        };
        assert_eq!(
            err.to_string(),
            "Insufficient stock for medicine med-1: available 3, requested 5"
        );

        let err = CoreError::AlreadyVoided("sale-9".to_string());
        assert_eq!(err.to_string(), "Sale sale-9 is already voided");
    }

    #[test]
    fn test_validation_error_messages() {
        let err = ValidationError::MustBePositive {
            field: "quantity".to_string(),
        };
        assert_eq!(err.to_string(), "quantity must be positive");

        let err = ValidationError::NotFinite {
            field: "points.used".to_string(),
        };
        assert_eq!(err.to_string(), "points.used must be a finite number");
    }

    #[test]
    fn test_validation_converts_to_core_error() {
        let validation_err = ValidationError::ZeroAdjustment;
        let core_err: CoreError = validation_err.into();
        assert!(matches!(core_err, CoreError::Validation(_)));
    }
}
