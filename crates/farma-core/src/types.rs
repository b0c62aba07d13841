//! # Domain Types
//!
//! Core domain types for the pharmacy POS back end.
//!
//! ## Type Hierarchy
//! ```text
//! ┌──────────────────────────────────────────────────────────────────────┐
//! │                          Domain Types                                │
//! │                                                                      │
//! │  ┌───────────────┐   ┌────────────────┐   ┌──────────────────────┐  │
//! │  │   Medicine    │   │      Sale      │   │  PointsLedgerEntry   │  │
//! │  │  ───────────  │   │  ────────────  │   │  ──────────────────  │  │
//! │  │  id (UUID)    │   │  id (UUID)     │   │  id (UUID)           │  │
//! │  │  price1/2     │◄──┤  customer_id?  │◄──┤  related_sale_id?    │  │
//! │  │  is_archived  │   │  final_total   │   │  points (signed f64) │  │
//! │  └───────▲───────┘   │  status        │   │  kind                │  │
//! │          │           └───────▲────────┘   └──────────────────────┘  │
//! │  ┌───────┴────────┐  ┌───────┴────────┐   ┌──────────────────────┐  │
//! │  │ InventoryBatch │◄─┤    SaleItem    │   │ YearlyPointsBalance  │  │
//! │  │  quantity (±)  │  │  batch_id      │   │  (customer, year)    │  │
//! │  │  expiry_date?  │  │  price_at_sale │   │  points ≥ 0          │  │
//! │  └────────────────┘  └────────────────┘   └──────────────────────┘  │
//! └──────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Reference Discipline
//! `Sale.customer_id` and `SaleItem.medicine_id` / `batch_id` are weak,
//! foreign-key-style identifiers: the core never deletes a customer or a
//! medicine, it only reads them. `SaleItem.sale_id` is strong ownership -
//! items are deleted and reinserted when a sale is edited.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::money::Money;

// =============================================================================
// Medicine (external catalog, read-only during settlement)
// =============================================================================

/// A catalog medicine. Treated as immutable reference data by the
/// settlement engine; catalog CRUD lives outside this system.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct Medicine {
    /// Unique identifier (UUID v4).
    pub id: String,

    /// Display name shown on receipts.
    pub name: String,

    /// Retail price in cents.
    pub price1_cents: i64,

    /// Wholesale price in cents.
    pub price2_cents: i64,

    /// Whether the medicine is archived (soft delete).
    pub is_archived: bool,

    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Medicine {
    /// Returns the price for the given price type as Money.
    pub fn price(&self, price_type: PriceType) -> Money {
        match price_type {
            PriceType::Retail => Money::from_cents(self.price1_cents),
            PriceType::Wholesale => Money::from_cents(self.price2_cents),
        }
    }
}

// =============================================================================
// Inventory Batch
// =============================================================================

/// A discrete receipt of inventory for one medicine.
///
/// Many batches per medicine. `quantity` is **signed**: the allocation
/// policy never blocks a checkout, so an oversold batch goes negative
/// and is surfaced to operators via reporting instead.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct InventoryBatch {
    pub id: String,
    pub medicine_id: String,
    /// On-hand quantity; negative means oversold/backordered.
    pub quantity: i64,
    /// Optional expiry date. The base allocation policy is first-fit,
    /// not lowest-expiry.
    pub expiry_date: Option<NaiveDate>,
    pub created_at: DateTime<Utc>,
}

// =============================================================================
// Sale Status
// =============================================================================

/// The status of a sale transaction.
///
/// Transitions exactly once, Completed → Voided; never back.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "lowercase"))]
#[serde(rename_all = "snake_case")]
pub enum SaleStatus {
    /// Sale has been settled and committed.
    Completed,
    /// Sale was reversed; kept visible for audit.
    Voided,
}

// =============================================================================
// Payment Method
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "snake_case"))]
#[serde(rename_all = "snake_case")]
pub enum PaymentMethod {
    /// Physical cash payment.
    Cash,
    /// Card payment on external terminal.
    ExternalCard,
}

impl Default for PaymentMethod {
    fn default() -> Self {
        PaymentMethod::Cash
    }
}

// =============================================================================
// Price Type & Sale Unit
// =============================================================================

/// Which catalog price a line was sold at.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "snake_case"))]
#[serde(rename_all = "snake_case")]
pub enum PriceType {
    /// price1 - retail.
    Retail,
    /// price2 - wholesale.
    Wholesale,
}

/// Unit a line was sold in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "snake_case"))]
#[serde(rename_all = "snake_case")]
pub enum SaleUnit {
    Piece,
    Box,
}

impl Default for SaleUnit {
    fn default() -> Self {
        SaleUnit::Piece
    }
}

// =============================================================================
// Sale
// =============================================================================

/// A committed sale transaction.
///
/// Created once per checkout. Edit replaces the header fields in place
/// and re-derives line items and points - it never changes the id.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct Sale {
    pub id: String,
    /// Weak reference; None for walk-in customers.
    pub customer_id: Option<String>,
    pub purchased_date: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
    pub total_cents: i64,
    pub professional_fee_cents: i64,
    pub discount_cents: i64,
    pub final_total_cents: i64,
    pub money_given_cents: i64,
    pub change_cents: i64,
    pub payment_method: PaymentMethod,
    /// Points the customer asked to redeem (before the multiplier).
    pub points_used: f64,
    /// Redemption multiplier; points deducted = used × multiplier.
    pub points_multiplier: f64,
    /// Monetary discount granted for the redeemed points.
    pub points_discount_cents: i64,
    pub status: SaleStatus,
}

impl Sale {
    /// Returns the final total as Money.
    #[inline]
    pub fn final_total(&self) -> Money {
        Money::from_cents(self.final_total_cents)
    }
}

// =============================================================================
// Sale Item
// =============================================================================

/// A line item in a sale.
///
/// Uses the snapshot pattern: `price_at_sale_cents` freezes the catalog
/// price at checkout time. `batch_id` records exactly which inventory
/// batch the line drew from, so a void can restore the same batch.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct SaleItem {
    pub id: String,
    pub sale_id: String,
    pub medicine_id: String,
    pub quantity: i64,
    /// Unit price in cents at time of sale (frozen).
    pub price_at_sale_cents: i64,
    pub price_type: PriceType,
    /// The inventory batch this line deducted from.
    pub batch_id: String,
    pub sale_unit: SaleUnit,
    pub created_at: DateTime<Utc>,
}

impl SaleItem {
    /// Returns the frozen unit price as Money.
    #[inline]
    pub fn price_at_sale(&self) -> Money {
        Money::from_cents(self.price_at_sale_cents)
    }
}

// =============================================================================
// Points Ledger
// =============================================================================

/// What kind of point event a ledger entry records.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "snake_case"))]
#[serde(rename_all = "snake_case")]
pub enum PointsEntryKind {
    /// Points earned from a settled sale.
    Sale,
    /// Points redeemed against a sale (stored negative).
    Redeem,
    /// Manual addition by an operator.
    ManualAdd,
    /// Manual deduction by an operator.
    ManualDeduct,
    /// Compensation for a reversed Redeem (void).
    RedeemReturned,
    /// Compensation for reversed sale earnings (void).
    EarnVoided,
}

/// One immutable, signed record of a point gain or loss.
///
/// Append-only: entries are never mutated. Void adds compensating
/// entries; only Edit's destructive correction deletes entries tied to
/// the sale being rewritten.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct PointsLedgerEntry {
    pub id: String,
    pub customer_id: String,
    /// Signed, fractional point delta.
    pub points: f64,
    pub kind: PointsEntryKind,
    pub related_sale_id: Option<String>,
    pub entry_date: DateTime<Utc>,
    pub description: String,
}

// =============================================================================
// Yearly Points Balance
// =============================================================================

/// Materialized point total for a customer for a calendar year.
///
/// Kept in lock-step with the points ledger: every ledger write and the
/// matching balance update happen in the same transaction. Always ≥ 0
/// (clamped; the clamped deficit is not tracked).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct YearlyPointsBalance {
    pub customer_id: String,
    pub year: i32,
    pub points: f64,
}

// =============================================================================
// Settlement Requests
// =============================================================================

/// One requested cart line at checkout.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CartLine {
    pub medicine_id: String,
    pub quantity: i64,
    /// Unit price the cashier is charging, in cents.
    pub unit_price_cents: i64,
    pub price_type: PriceType,
    pub sale_unit: SaleUnit,
}

/// Monetary breakdown of a checkout, computed by the caller.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Pricing {
    pub subtotal_cents: i64,
    pub professional_fee_cents: i64,
    pub discount_cents: i64,
    pub final_total_cents: i64,
    pub money_given_cents: i64,
    pub change_cents: i64,
    #[serde(default)]
    pub payment_method: PaymentMethod,
}

/// Points portion of a checkout request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PointsRequest {
    /// Points the customer wants to redeem. Zero means no redemption.
    pub used: f64,
    /// Redemption multiplier; zero falls back to 1.
    pub multiplier: f64,
    /// Monetary discount granted for the redeemed points, in cents.
    pub discount_cents: i64,
}

impl Default for PointsRequest {
    fn default() -> Self {
        PointsRequest {
            used: 0.0,
            multiplier: 1.0,
            discount_cents: 0,
        }
    }
}

/// A full checkout request, as the UI/API layer hands it to the engine.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SettleRequest {
    pub cart: Vec<CartLine>,
    pub customer_id: Option<String>,
    /// Backdated purchase date; defaults to now.
    pub purchased_date: Option<DateTime<Utc>>,
    pub pricing: Pricing,
    #[serde(default)]
    pub points: PointsRequest,
}

/// Replacement header fields for an in-place sale edit.
///
/// The sale id, customer, and created_at are preserved; everything else
/// is re-derived from this update and the new cart lines.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SaleUpdate {
    pub purchased_date: Option<DateTime<Utc>>,
    pub pricing: Pricing,
    #[serde(default)]
    pub points: PointsRequest,
}

// =============================================================================
// Unit Tests
// =============================================================================
