//! # Points Math
//!
//! Pure loyalty-points calculations. The storage layer records the
//! results in the points ledger and the yearly balance cache; nothing
//! here touches I/O.
//!
//! ## The Rules
//! ```text
//! Earning:     points = final_total / 200        (fractional, not floored)
//! Redemption:  requested = used × multiplier
//!              deducted  = min(current_balance, requested)
//! Balance:     always clamped at zero, never negative
//! ```
//!
//! Earned points are deliberately kept fractional and rounded only at
//! display time. Redemption can never drive a balance negative - the
//! ledger records the *actual* deducted amount, signed negative.

use crate::money::Money;
use crate::EARN_DIVISOR;

/// Points earned for a sale with the given final total.
///
/// ## Example
/// ```rust
/// use farma_core::money::Money;
/// use farma_core::points::earn_for_total;
///
/// // 400.00 at 1 point per 200.00 → 2.0 points
/// assert_eq!(earn_for_total(Money::from_cents(40_000)), 2.0);
/// // 500.00 → 2.5 points, kept fractional
/// assert_eq!(earn_for_total(Money::from_cents(50_000)), 2.5);
/// ```
#[inline]
pub fn earn_for_total(final_total: Money) -> f64 {
    final_total.to_major_units() / EARN_DIVISOR
}

/// The deduction a redemption request asks for.
///
/// A zero multiplier falls back to 1 (a missing multiplier in the
/// request means "no multiplier", not "redeem nothing").
#[inline]
pub fn requested_deduction(used: f64, multiplier: f64) -> f64 {
    let multiplier = if multiplier == 0.0 { 1.0 } else { multiplier };
    used * multiplier
}

/// Clamps a requested redemption to the available balance.
///
/// Redemption never drives the balance negative: the actual deduction is
/// `min(balance, requested)`.
#[inline]
pub fn clamp_redemption(balance: f64, requested: f64) -> f64 {
    requested.min(balance)
}

/// Clamps a yearly balance at zero.
///
/// The clamped deficit is not tracked - a deliberate simplification.
#[inline]
pub fn clamp_balance(points: f64) -> f64 {
    if points < 0.0 {
        0.0
    } else {
        points
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
