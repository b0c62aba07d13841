//! # farma-core: Pure Business Logic for Farma POS
//!
//! This crate is the **heart** of the pharmacy POS back end. It contains all
//! business logic as pure functions with zero I/O dependencies.
//!
//! ## Architecture Position
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────┐
//! │                       Farma POS Architecture                        │
//! │                                                                     │
//! │  ┌───────────────────────────────────────────────────────────────┐ │
//! │  │                  Caller (UI / API layer)                      │ │
//! │  │          checkout, void sale, edit sale, adjust points        │ │
//! │  └─────────────────────────────┬─────────────────────────────────┘ │
//! │                                │                                    │
//! │  ┌─────────────────────────────▼─────────────────────────────────┐ │
//! │  │               ★ farma-core (THIS CRATE) ★                     │ │
//! │  │                                                               │ │
//! │  │   ┌───────────┐  ┌───────────┐  ┌───────────┐  ┌───────────┐ │ │
//! │  │   │   types   │  │   money   │  │  points   │  │ validation│ │ │
//! │  │   │ Sale/Item │  │   Money   │  │ earn/clamp│  │   rules   │ │ │
//! │  │   │  Ledger   │  │  (cents)  │  │   math    │  │  checks   │ │ │
//! │  │   └───────────┘  └───────────┘  └───────────┘  └───────────┘ │ │
//! │  │                                                               │ │
//! │  │   NO I/O • NO DATABASE • NO NETWORK • PURE FUNCTIONS          │ │
//! │  └─────────────────────────────┬─────────────────────────────────┘ │
//! │                                │                                    │
//! │  ┌─────────────────────────────▼─────────────────────────────────┐ │
//! │  │                  farma-db (Storage Layer)                     │ │
//! │  │    SQLite repositories, settlement/void/edit transactions     │ │
//! │  └───────────────────────────────────────────────────────────────┘ │
//! └─────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Modules
//!
//! - [`types`] - Domain types (Sale, SaleItem, InventoryBatch, ledger entries)
//! - [`money`] - Money type with integer arithmetic (no floating point!)
//! - [`points`] - Loyalty-points math (earning, redemption clamping)
//! - [`error`] - Domain error types
//! - [`validation`] - Business rule validation
//!
//! ## Design Principles
//!
//! 1. **Pure Functions**: Every function is deterministic
//! 2. **No I/O**: Database, network, file system access is FORBIDDEN here
//! 3. **Integer Money**: All monetary values are in cents (i64)
//! 4. **Explicit Errors**: All errors are typed, never strings or panics
//!
//! Loyalty points are the one deliberately fractional quantity in the
//! system: a sale earns `final_total / 200` points, kept exact as `f64`
//! and rounded only at display time.

// =============================================================================
// Module Declarations
// =============================================================================

pub mod error;
pub mod money;
pub mod points;
pub mod types;
pub mod validation;

// =============================================================================
// Re-exports for Convenience
// =============================================================================

pub use error::{CoreError, CoreResult, ValidationError};
pub use money::Money;
pub use types::*;

// =============================================================================
// Crate-Level Constants
// =============================================================================

/// Currency units of `final_total` required to earn one loyalty point.
///
/// ## Business Rule
/// A customer earns `final_total / 200` points per sale, fractional.
/// Example: a 400.00 sale earns 2.0 points; a 500.00 sale earns 2.5.
pub const EARN_DIVISOR: f64 = 200.0;

/// Maximum line items allowed in a single cart.
///
/// Prevents runaway carts and keeps a settlement transaction bounded.
pub const MAX_CART_LINES: usize = 100;

/// Maximum quantity of a single line item.
///
/// Prevents accidental over-ordering (e.g., typing 1000 instead of 10).
pub const MAX_LINE_QUANTITY: i64 = 999;
