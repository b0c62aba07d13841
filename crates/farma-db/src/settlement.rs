//! # Settlement Engine
//!
//! The transactional coordinator for the sale lifecycle. Every public
//! operation is one unit of work: it opens a transaction, drives the
//! repository collaborators on that connection, and commits or aborts
//! as a whole. No partial sale, half-updated batch, or orphaned ledger
//! entry can ever be observed.
//!
//! ## Operations
//! ```text
//! settle ──► header + items + batch deductions + redeem/earn entries
//! void   ──► release batches + compensating entries + status flip
//! edit   ──► release + delete items, correct ledger, overwrite header,
//!            re-allocate + re-earn
//! adjust ──► one manual ledger entry + balance delta
//! ```
//!
//! ## Ordering Inside Settle
//! Redemption is applied before the earn for the same sale, so the
//! points earned by a purchase can never fund its own redemption.

use chrono::{Datelike, Utc};
use sqlx::SqlitePool;
use tracing::info;
use uuid::Uuid;

use crate::error::DbResult;
use crate::repository::batch::{AllocationPolicy, InventoryAllocator};
use crate::repository::{points, sale};
use farma_core::validation::{
    validate_cart_lines, validate_manual_delta, validate_points_request,
};
use farma_core::{
    CartLine, CoreError, Money, Sale, SaleItem, SaleStatus, SaleUpdate, SettleRequest,
};

// =============================================================================
// Configuration
// =============================================================================

/// How an edit corrects the point effects of the previous sale version.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CorrectionStrategy {
    /// Delete the old sale's ledger entries and subtract their summed
    /// effect from the balance. The default; matches treating an edit
    /// as "this sale never looked like that".
    Destructive,
    /// Append compensating entries instead, preserving the old version
    /// in the ledger as audit trail.
    Compensating,
}

/// Settlement engine configuration.
#[derive(Debug, Clone, Copy)]
pub struct EngineConfig {
    /// Inventory allocation policy.
    pub allocation: AllocationPolicy,
    /// Ledger correction strategy used by edit.
    pub edit_correction: CorrectionStrategy,
}

impl Default for EngineConfig {
    fn default() -> Self {
        EngineConfig {
            allocation: AllocationPolicy::default(),
            edit_correction: CorrectionStrategy::Destructive,
        }
    }
}

// =============================================================================
// Engine
// =============================================================================

/// Coordinates sale settlement, void, edit, and manual point
/// adjustments as atomic units of work.
#[derive(Debug, Clone)]
pub struct SettlementEngine {
    pool: SqlitePool,
    allocator: InventoryAllocator,
    edit_correction: CorrectionStrategy,
}

impl SettlementEngine {
    /// Creates an engine over the given pool.
    pub fn new(pool: SqlitePool, config: EngineConfig) -> Self {
        SettlementEngine {
            pool,
            allocator: InventoryAllocator::new(config.allocation),
            edit_correction: config.edit_correction,
        }
    }

    /// Settles a checkout: persists the sale header and line items,
    /// deducts inventory, and applies the customer's point effects.
    ///
    /// Returns the new sale's id. Validation runs before the
    /// transaction opens, so a rejected request writes nothing.
    pub async fn settle(&self, req: SettleRequest) -> DbResult<String> {
        if req.cart.is_empty() {
            return Err(CoreError::EmptyCart.into());
        }
        validate_cart_lines(&req.cart).map_err(CoreError::from)?;
        validate_points_request(&req.points).map_err(CoreError::from)?;

        let now = Utc::now();
        let sale_id = Uuid::new_v4().to_string();

        let header = Sale {
            id: sale_id.clone(),
            customer_id: req.customer_id.clone(),
            purchased_date: req.purchased_date.unwrap_or(now),
            created_at: now,
            total_cents: req.pricing.subtotal_cents,
            professional_fee_cents: req.pricing.professional_fee_cents,
            discount_cents: req.pricing.discount_cents,
            final_total_cents: req.pricing.final_total_cents,
            money_given_cents: req.pricing.money_given_cents,
            change_cents: req.pricing.change_cents,
            payment_method: req.pricing.payment_method,
            points_used: req.points.used,
            points_multiplier: req.points.multiplier,
            points_discount_cents: req.points.discount_cents,
            status: SaleStatus::Completed,
        };

        let mut tx = self.pool.begin().await?;

        sale::insert_sale(&mut tx, &header).await?;

        for line in &req.cart {
            let batch_id = self
                .allocator
                .allocate(&mut tx, &line.medicine_id, line.quantity)
                .await?;

            let item = SaleItem {
                id: Uuid::new_v4().to_string(),
                sale_id: sale_id.clone(),
                medicine_id: line.medicine_id.clone(),
                quantity: line.quantity,
                price_at_sale_cents: line.unit_price_cents,
                price_type: line.price_type,
                batch_id,
                sale_unit: line.sale_unit,
                created_at: now,
            };
            sale::insert_item(&mut tx, &item).await?;
        }

        if let Some(customer_id) = &req.customer_id {
            let year = now.year();

            // Redeem first: the points earned by this sale can never
            // fund its own redemption.
            if req.points.used > 0.0 {
                let balance = points::fetch_balance(&mut tx, customer_id, year).await?;
                let (deducted, _) = points::record_redeem(
                    &mut tx,
                    customer_id,
                    &sale_id,
                    req.points.used,
                    req.points.multiplier,
                    balance,
                    now,
                )
                .await?;
                points::apply_delta(&mut tx, customer_id, year, -deducted).await?;
            }

            let final_total = Money::from_cents(req.pricing.final_total_cents);
            let earned = points::record_earn(&mut tx, customer_id, &sale_id, final_total, now)
                .await?;
            points::apply_delta(&mut tx, customer_id, year, earned.points).await?;
        }

        tx.commit().await?;

        info!(
            sale_id = %sale_id,
            final_total = %req.pricing.final_total_cents,
            lines = %req.cart.len(),
            "Sale settled"
        );
        Ok(sale_id)
    }

    /// Voids a completed sale.
    ///
    /// Restores inventory to the exact batches the items drew from,
    /// appends compensating ledger entries, and flips the status to
    /// Voided. The sale, its items, and the original ledger entries
    /// stay visible for audit. Voiding twice is rejected.
    pub async fn void(&self, sale_id: &str) -> DbResult<()> {
        let now = Utc::now();
        let mut tx = self.pool.begin().await?;

        let sale = sale::fetch_sale(&mut tx, sale_id)
            .await?
            .ok_or_else(|| CoreError::SaleNotFound(sale_id.to_string()))?;
        if sale.status == SaleStatus::Voided {
            return Err(CoreError::AlreadyVoided(sale_id.to_string()).into());
        }

        for item in sale::fetch_items(&mut tx, sale_id).await? {
            self.allocator
                .release(&mut tx, &item.batch_id, item.quantity)
                .await?;
        }

        let year = now.year();
        for compensation in points::reverse_for_sale(&mut tx, sale_id, now).await? {
            points::apply_delta(&mut tx, &compensation.customer_id, year, compensation.points)
                .await?;
        }

        // The status guard re-checks under the write; a concurrent void
        // between fetch and here still loses.
        if !sale::mark_voided(&mut tx, sale_id).await? {
            return Err(CoreError::AlreadyVoided(sale_id.to_string()).into());
        }

        tx.commit().await?;

        info!(sale_id = %sale_id, "Sale voided");
        Ok(())
    }

    /// Edits a completed sale in place.
    ///
    /// The old line items are unwound (inventory released, items
    /// deleted) and the old point effects corrected per the configured
    /// [`CorrectionStrategy`]; then the header is overwritten and
    /// items, allocations, and point effects are re-derived from the
    /// new cart. The sale id and created_at never change.
    pub async fn edit(
        &self,
        sale_id: &str,
        update: SaleUpdate,
        cart: Vec<CartLine>,
    ) -> DbResult<()> {
        if cart.is_empty() {
            return Err(CoreError::EmptyCart.into());
        }
        validate_cart_lines(&cart).map_err(CoreError::from)?;
        validate_points_request(&update.points).map_err(CoreError::from)?;

        let now = Utc::now();
        let mut tx = self.pool.begin().await?;

        let sale = sale::fetch_sale(&mut tx, sale_id)
            .await?
            .ok_or_else(|| CoreError::SaleNotFound(sale_id.to_string()))?;
        if sale.status == SaleStatus::Voided {
            return Err(CoreError::AlreadyVoided(sale_id.to_string()).into());
        }

        // Unwind the previous version: inventory back to its batches,
        // line items deleted.
        for item in sale::fetch_items(&mut tx, sale_id).await? {
            self.allocator
                .release(&mut tx, &item.batch_id, item.quantity)
                .await?;
        }
        sale::delete_items(&mut tx, sale_id).await?;

        let year = now.year();
        if let Some(customer_id) = &sale.customer_id {
            match self.edit_correction {
                CorrectionStrategy::Destructive => {
                    let removed = points::delete_for_sale(&mut tx, sale_id).await?;
                    points::apply_delta(&mut tx, customer_id, year, -removed).await?;
                }
                CorrectionStrategy::Compensating => {
                    for compensation in points::reverse_for_sale(&mut tx, sale_id, now).await? {
                        points::apply_delta(&mut tx, customer_id, year, compensation.points)
                            .await?;
                    }
                }
            }
        }

        let purchased_date = update.purchased_date.unwrap_or(sale.purchased_date);
        sale::overwrite_header(&mut tx, sale_id, &update, purchased_date).await?;

        for line in &cart {
            let batch_id = self
                .allocator
                .allocate(&mut tx, &line.medicine_id, line.quantity)
                .await?;

            let item = SaleItem {
                id: Uuid::new_v4().to_string(),
                sale_id: sale_id.to_string(),
                medicine_id: line.medicine_id.clone(),
                quantity: line.quantity,
                price_at_sale_cents: line.unit_price_cents,
                price_type: line.price_type,
                batch_id,
                sale_unit: line.sale_unit,
                created_at: now,
            };
            sale::insert_item(&mut tx, &item).await?;
        }

        if let Some(customer_id) = &sale.customer_id {
            if update.points.used > 0.0 {
                let balance = points::fetch_balance(&mut tx, customer_id, year).await?;
                let (deducted, _) = points::record_redeem(
                    &mut tx,
                    customer_id,
                    sale_id,
                    update.points.used,
                    update.points.multiplier,
                    balance,
                    now,
                )
                .await?;
                points::apply_delta(&mut tx, customer_id, year, -deducted).await?;
            }

            let final_total = Money::from_cents(update.pricing.final_total_cents);
            let earned =
                points::record_earn(&mut tx, customer_id, sale_id, final_total, now).await?;
            points::apply_delta(&mut tx, customer_id, year, earned.points).await?;
        }

        tx.commit().await?;

        info!(sale_id = %sale_id, correction = ?self.edit_correction, "Sale edited");
        Ok(())
    }

    /// Applies a manual point adjustment for a customer.
    ///
    /// Appends one signed ledger entry and updates the current year's
    /// balance in the same transaction. Returns the new balance.
    pub async fn adjust_points(
        &self,
        customer_id: &str,
        delta: f64,
        note: Option<&str>,
    ) -> DbResult<f64> {
        validate_manual_delta(delta).map_err(CoreError::from)?;

        let now = Utc::now();
        let mut tx = self.pool.begin().await?;

        points::record_manual(&mut tx, customer_id, delta, note, now).await?;
        let balance = points::apply_delta(&mut tx, customer_id, now.year(), delta).await?;

        tx.commit().await?;

        info!(customer_id = %customer_id, delta = %delta, balance = %balance, "Manual points adjustment");
        Ok(balance)
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::DbError;
    use crate::pool::{Database, DbConfig};
    use farma_core::{
        InventoryBatch, Medicine, PointsEntryKind, PointsRequest, PriceType, Pricing, SaleUnit,
    };

    async fn test_db() -> Database {
        let _ = tracing_subscriber::fmt()
            .with_test_writer()
            .with_env_filter("farma_db=debug")
            .try_init();
        Database::new(DbConfig::in_memory()).await.unwrap()
    }

    async fn seed_medicine(db: &Database, id: &str) {
        let now = Utc::now();
        db.medicines()
            .insert(&Medicine {
                id: id.to_string(),
                name: format!("Medicine {id}"),
                price1_cents: 1000,
                price2_cents: 800,
                is_archived: false,
                created_at: now,
                updated_at: now,
            })
            .await
            .unwrap();
    }

    async fn seed_batch(db: &Database, medicine_id: &str, quantity: i64) -> String {
        let id = Uuid::new_v4().to_string();
        db.batches()
            .insert(&InventoryBatch {
                id: id.clone(),
                medicine_id: medicine_id.to_string(),
                quantity,
                expiry_date: None,
                created_at: Utc::now(),
            })
            .await
            .unwrap();
        id
    }

    fn line(medicine_id: &str, quantity: i64) -> CartLine {
        CartLine {
            medicine_id: medicine_id.to_string(),
            quantity,
            unit_price_cents: 1000,
            price_type: PriceType::Retail,
            sale_unit: SaleUnit::Piece,
        }
    }

    fn request(cart: Vec<CartLine>, customer: Option<&str>, final_total_cents: i64) -> SettleRequest {
        SettleRequest {
            cart,
            customer_id: customer.map(str::to_string),
            purchased_date: None,
            pricing: Pricing {
                subtotal_cents: final_total_cents,
                final_total_cents,
                money_given_cents: final_total_cents,
                ..Default::default()
            },
            points: PointsRequest::default(),
        }
    }

    fn assert_close(actual: f64, expected: f64) {
        assert!(
            (actual - expected).abs() < 1e-9,
            "expected {expected}, got {actual}"
        );
    }

    #[tokio::test]
    async fn test_settle_persists_sale_and_items() {
        let db = test_db().await;
        seed_medicine(&db, "med-1").await;
        let batch = seed_batch(&db, "med-1", 10).await;

        let sale_id = db
            .settlement()
            .settle(request(vec![line("med-1", 3)], None, 300_00))
            .await
            .unwrap();

        let sale = db.sales().get_by_id(&sale_id).await.unwrap().unwrap();
        assert_eq!(sale.status, SaleStatus::Completed);
        assert_eq!(sale.final_total_cents, 300_00);

        let items = db.sales().items_for_sale(&sale_id).await.unwrap();
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].batch_id, batch);
        assert_eq!(items[0].quantity, 3);

        assert_eq!(
            db.batches().get_by_id(&batch).await.unwrap().unwrap().quantity,
            7
        );
    }

    #[tokio::test]
    async fn test_settle_redeems_before_earning() {
        let db = test_db().await;
        seed_medicine(&db, "med-1").await;
        seed_batch(&db, "med-1", 10).await;

        let engine = db.settlement();
        engine.adjust_points("cust-1", 10.0, None).await.unwrap();

        // Redeem 20 against a balance of 10, then earn 400 / 200 = 2.
        let mut req = request(vec![line("med-1", 1)], Some("cust-1"), 400_00);
        req.points = PointsRequest {
            used: 20.0,
            multiplier: 1.0,
            discount_cents: 20_00,
        };
        let sale_id = engine.settle(req).await.unwrap();

        let year = Utc::now().year();
        assert_close(db.points().yearly_balance("cust-1", year).await.unwrap(), 2.0);

        let entries = db.points().ledger_for_sale(&sale_id).await.unwrap();
        assert_eq!(entries.len(), 2);
        let redeem = entries
            .iter()
            .find(|e| e.kind == PointsEntryKind::Redeem)
            .unwrap();
        assert_close(redeem.points, -10.0); // clamped to the balance
        let earn = entries
            .iter()
            .find(|e| e.kind == PointsEntryKind::Sale)
            .unwrap();
        assert_close(earn.points, 2.0);
    }

    #[tokio::test]
    async fn test_earn_keeps_fractional_points() {
        let db = test_db().await;
        seed_medicine(&db, "med-1").await;
        seed_batch(&db, "med-1", 5).await;

        // 250 / 200 = 1.25, never floored.
        db.settlement()
            .settle(request(vec![line("med-1", 1)], Some("cust-1"), 250_00))
            .await
            .unwrap();

        let year = Utc::now().year();
        assert_close(
            db.points().yearly_balance("cust-1", year).await.unwrap(),
            1.25,
        );
    }

    #[tokio::test]
    async fn test_multiplier_zero_falls_back_to_one() {
        let db = test_db().await;
        seed_medicine(&db, "med-1").await;
        seed_batch(&db, "med-1", 5).await;

        let engine = db.settlement();
        engine.adjust_points("cust-1", 10.0, None).await.unwrap();

        let mut req = request(vec![line("med-1", 1)], Some("cust-1"), 200_00);
        req.points = PointsRequest {
            used: 5.0,
            multiplier: 0.0,
            discount_cents: 5_00,
        };
        let sale_id = engine.settle(req).await.unwrap();

        let entries = db.points().ledger_for_sale(&sale_id).await.unwrap();
        let redeem = entries
            .iter()
            .find(|e| e.kind == PointsEntryKind::Redeem)
            .unwrap();
        assert_close(redeem.points, -5.0);
    }

    #[tokio::test]
    async fn test_oversell_commits_with_negative_batch() {
        let db = test_db().await;
        seed_medicine(&db, "med-1").await;
        let batch = seed_batch(&db, "med-1", 3).await;

        let sale_id = db
            .settlement()
            .settle(request(vec![line("med-1", 5)], None, 500_00))
            .await
            .unwrap();

        let sale = db.sales().get_by_id(&sale_id).await.unwrap().unwrap();
        assert_eq!(sale.status, SaleStatus::Completed);
        assert_eq!(
            db.batches().get_by_id(&batch).await.unwrap().unwrap().quantity,
            -2
        );
    }

    #[tokio::test]
    async fn test_settle_without_customer_writes_no_ledger() {
        let db = test_db().await;
        seed_medicine(&db, "med-1").await;
        seed_batch(&db, "med-1", 5).await;

        let sale_id = db
            .settlement()
            .settle(request(vec![line("med-1", 1)], None, 100_00))
            .await
            .unwrap();

        assert!(db.points().ledger_for_sale(&sale_id).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_empty_cart_rejected() {
        let db = test_db().await;

        let err = db
            .settlement()
            .settle(request(vec![], Some("cust-1"), 100_00))
            .await
            .unwrap_err();

        assert!(matches!(err, DbError::Core(CoreError::EmptyCart)));
    }

    #[tokio::test]
    async fn test_failed_settle_writes_nothing() {
        let db = test_db().await;
        seed_medicine(&db, "med-1").await;
        let batch = seed_batch(&db, "med-1", 10).await;

        // Second line references a medicine the catalog doesn't have;
        // the backorder insert trips the FK and aborts the whole unit
        // of work, including the first line's deduction.
        let err = db
            .settlement()
            .settle(request(
                vec![line("med-1", 3), line("no-such-med", 1)],
                Some("cust-1"),
                400_00,
            ))
            .await
            .unwrap_err();
        assert!(matches!(err, DbError::ForeignKeyViolation { .. }));

        assert_eq!(
            db.batches().get_by_id(&batch).await.unwrap().unwrap().quantity,
            10
        );
        assert!(db.sales().list_recent(10).await.unwrap().is_empty());
        assert!(db
            .points()
            .ledger_for_customer("cust-1")
            .await
            .unwrap()
            .is_empty());
    }

    #[tokio::test]
    async fn test_void_restores_inventory_and_compensates_points() {
        let db = test_db().await;
        seed_medicine(&db, "med-1").await;
        let batch = seed_batch(&db, "med-1", 10).await;

        let engine = db.settlement();
        let sale_id = engine
            .settle(request(vec![line("med-1", 4)], Some("cust-1"), 600_00))
            .await
            .unwrap();

        let year = Utc::now().year();
        assert_close(db.points().yearly_balance("cust-1", year).await.unwrap(), 3.0);

        engine.void(&sale_id).await.unwrap();

        let sale = db.sales().get_by_id(&sale_id).await.unwrap().unwrap();
        assert_eq!(sale.status, SaleStatus::Voided);

        // Inventory back to the exact batch it came from.
        assert_eq!(
            db.batches().get_by_id(&batch).await.unwrap().unwrap().quantity,
            10
        );

        // Items stay visible for audit.
        assert_eq!(db.sales().items_for_sale(&sale_id).await.unwrap().len(), 1);

        // Original earn preserved, compensation appended, balance back to zero.
        let entries = db.points().ledger_for_sale(&sale_id).await.unwrap();
        assert_eq!(entries.len(), 2);
        assert!(entries.iter().any(|e| e.kind == PointsEntryKind::Sale));
        let voided = entries
            .iter()
            .find(|e| e.kind == PointsEntryKind::EarnVoided)
            .unwrap();
        assert_close(voided.points, -3.0);
        assert_close(db.points().yearly_balance("cust-1", year).await.unwrap(), 0.0);
    }

    #[tokio::test]
    async fn test_void_returns_redeemed_points() {
        let db = test_db().await;
        seed_medicine(&db, "med-1").await;
        seed_batch(&db, "med-1", 10).await;

        let engine = db.settlement();
        engine.adjust_points("cust-1", 10.0, None).await.unwrap();

        let mut req = request(vec![line("med-1", 1)], Some("cust-1"), 400_00);
        req.points = PointsRequest {
            used: 10.0,
            multiplier: 1.0,
            discount_cents: 10_00,
        };
        let sale_id = engine.settle(req).await.unwrap();

        let year = Utc::now().year();
        assert_close(db.points().yearly_balance("cust-1", year).await.unwrap(), 2.0);

        engine.void(&sale_id).await.unwrap();

        // Redeemed 10 returned, earned 2 removed: back to the manual 10.
        assert_close(db.points().yearly_balance("cust-1", year).await.unwrap(), 10.0);

        let entries = db.points().ledger_for_sale(&sale_id).await.unwrap();
        let returned = entries
            .iter()
            .find(|e| e.kind == PointsEntryKind::RedeemReturned)
            .unwrap();
        assert_close(returned.points, 10.0);
    }

    #[tokio::test]
    async fn test_double_void_rejected() {
        let db = test_db().await;
        seed_medicine(&db, "med-1").await;
        seed_batch(&db, "med-1", 10).await;

        let engine = db.settlement();
        let sale_id = engine
            .settle(request(vec![line("med-1", 1)], None, 100_00))
            .await
            .unwrap();

        engine.void(&sale_id).await.unwrap();
        let err = engine.void(&sale_id).await.unwrap_err();
        assert!(matches!(err, DbError::Core(CoreError::AlreadyVoided(_))));
    }

    #[tokio::test]
    async fn test_void_unknown_sale_rejected() {
        let db = test_db().await;

        let err = db.settlement().void("no-such-sale").await.unwrap_err();
        assert!(matches!(err, DbError::Core(CoreError::SaleNotFound(_))));
    }

    #[tokio::test]
    async fn test_edit_destructive_rewrites_sale() {
        let db = test_db().await;
        seed_medicine(&db, "med-1").await;
        seed_medicine(&db, "med-2").await;
        let batch1 = seed_batch(&db, "med-1", 10).await;
        let batch2 = seed_batch(&db, "med-2", 10).await;

        let engine = db.settlement();
        let sale_id = engine
            .settle(request(vec![line("med-1", 4)], Some("cust-1"), 600_00))
            .await
            .unwrap();

        let update = SaleUpdate {
            purchased_date: None,
            pricing: Pricing {
                subtotal_cents: 800_00,
                final_total_cents: 800_00,
                money_given_cents: 800_00,
                ..Default::default()
            },
            points: PointsRequest::default(),
        };
        engine
            .edit(&sale_id, update, vec![line("med-2", 2)])
            .await
            .unwrap();

        // Old batch fully restored, new batch deducted.
        assert_eq!(
            db.batches().get_by_id(&batch1).await.unwrap().unwrap().quantity,
            10
        );
        assert_eq!(
            db.batches().get_by_id(&batch2).await.unwrap().unwrap().quantity,
            8
        );

        // Items re-derived from the new cart.
        let items = db.sales().items_for_sale(&sale_id).await.unwrap();
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].medicine_id, "med-2");

        let sale = db.sales().get_by_id(&sale_id).await.unwrap().unwrap();
        assert_eq!(sale.final_total_cents, 800_00);
        assert_eq!(sale.status, SaleStatus::Completed);

        // Destructive correction: the old earn is gone, only the fresh
        // one remains, and the balance equals it.
        let entries = db.points().ledger_for_sale(&sale_id).await.unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].kind, PointsEntryKind::Sale);
        assert_close(entries[0].points, 4.0);

        let year = Utc::now().year();
        assert_close(db.points().yearly_balance("cust-1", year).await.unwrap(), 4.0);
    }

    #[tokio::test]
    async fn test_edit_compensating_keeps_audit_trail() {
        let db = test_db().await;
        seed_medicine(&db, "med-1").await;
        seed_batch(&db, "med-1", 10).await;

        let engine = db.settlement_with(EngineConfig {
            allocation: AllocationPolicy::default(),
            edit_correction: CorrectionStrategy::Compensating,
        });
        let sale_id = engine
            .settle(request(vec![line("med-1", 2)], Some("cust-1"), 600_00))
            .await
            .unwrap();

        let update = SaleUpdate {
            purchased_date: None,
            pricing: Pricing {
                subtotal_cents: 800_00,
                final_total_cents: 800_00,
                money_given_cents: 800_00,
                ..Default::default()
            },
            points: PointsRequest::default(),
        };
        engine
            .edit(&sale_id, update, vec![line("med-1", 2)])
            .await
            .unwrap();

        // Old earn (+3), its compensation (-3), fresh earn (+4).
        let entries = db.points().ledger_for_sale(&sale_id).await.unwrap();
        assert_eq!(entries.len(), 3);
        assert!(entries.iter().any(|e| e.kind == PointsEntryKind::EarnVoided));

        let year = Utc::now().year();
        assert_close(db.points().yearly_balance("cust-1", year).await.unwrap(), 4.0);
    }

    #[tokio::test]
    async fn test_void_after_compensating_edit_reverses_net_effect() {
        let db = test_db().await;
        seed_medicine(&db, "med-1").await;
        seed_batch(&db, "med-1", 10).await;

        let engine = db.settlement_with(EngineConfig {
            allocation: AllocationPolicy::default(),
            edit_correction: CorrectionStrategy::Compensating,
        });
        let year = Utc::now().year();

        engine.adjust_points("cust-1", 10.0, None).await.unwrap();

        // Earn +3, then edit compensates it (-3) and earns +4.
        let sale_id = engine
            .settle(request(vec![line("med-1", 2)], Some("cust-1"), 600_00))
            .await
            .unwrap();
        let update = SaleUpdate {
            purchased_date: None,
            pricing: Pricing {
                subtotal_cents: 800_00,
                final_total_cents: 800_00,
                money_given_cents: 800_00,
                ..Default::default()
            },
            points: PointsRequest::default(),
        };
        engine
            .edit(&sale_id, update, vec![line("med-1", 2)])
            .await
            .unwrap();
        assert_close(db.points().yearly_balance("cust-1", year).await.unwrap(), 14.0);

        // Void must reverse only the live +4, not re-reverse the old
        // earn the edit already countered.
        engine.void(&sale_id).await.unwrap();
        assert_close(db.points().yearly_balance("cust-1", year).await.unwrap(), 10.0);

        let entries = db.points().ledger_for_sale(&sale_id).await.unwrap();
        assert_eq!(entries.len(), 4);
        let net: f64 = entries.iter().map(|e| e.points).sum();
        assert_close(net, 0.0);
        let void_comp = entries
            .iter()
            .filter(|e| e.kind == PointsEntryKind::EarnVoided)
            .map(|e| e.points)
            .fold(f64::INFINITY, f64::min);
        assert_close(void_comp, -4.0);
    }

    #[tokio::test]
    async fn test_edit_voided_sale_rejected() {
        let db = test_db().await;
        seed_medicine(&db, "med-1").await;
        seed_batch(&db, "med-1", 10).await;

        let engine = db.settlement();
        let sale_id = engine
            .settle(request(vec![line("med-1", 1)], None, 100_00))
            .await
            .unwrap();
        engine.void(&sale_id).await.unwrap();

        let update = SaleUpdate {
            purchased_date: None,
            pricing: Pricing::default(),
            points: PointsRequest::default(),
        };
        let err = engine
            .edit(&sale_id, update, vec![line("med-1", 1)])
            .await
            .unwrap_err();
        assert!(matches!(err, DbError::Core(CoreError::AlreadyVoided(_))));
    }

    #[tokio::test]
    async fn test_manual_adjustments_accumulate() {
        let db = test_db().await;
        let engine = db.settlement();

        let after_add = engine
            .adjust_points("cust-1", 5.0, Some("Goodwill credit"))
            .await
            .unwrap();
        assert_close(after_add, 5.0);

        let after_deduct = engine.adjust_points("cust-1", -3.0, None).await.unwrap();
        assert_close(after_deduct, 2.0);

        let entries = db.points().ledger_for_customer("cust-1").await.unwrap();
        assert_eq!(entries.len(), 2);
        assert!(entries.iter().any(|e| e.kind == PointsEntryKind::ManualAdd
            && e.description == "Goodwill credit"));
        assert!(entries
            .iter()
            .any(|e| e.kind == PointsEntryKind::ManualDeduct && e.description == "Manual deduction"));
    }

    #[tokio::test]
    async fn test_zero_manual_adjustment_rejected() {
        let db = test_db().await;

        let err = db
            .settlement()
            .adjust_points("cust-1", 0.0, None)
            .await
            .unwrap_err();
        assert!(matches!(err, DbError::Core(CoreError::Validation(_))));
    }

    #[tokio::test]
    async fn test_manual_deduction_clamps_at_zero() {
        let db = test_db().await;
        let engine = db.settlement();

        engine.adjust_points("cust-1", 2.0, None).await.unwrap();
        let balance = engine.adjust_points("cust-1", -5.0, None).await.unwrap();

        // The ledger keeps the full -5; the balance clamps and the
        // deficit is not tracked.
        assert_close(balance, 0.0);
        assert_close(db.points().lifetime_points("cust-1").await.unwrap(), -3.0);
    }

    #[tokio::test]
    async fn test_rebuild_repairs_corrupted_balance() {
        let db = test_db().await;
        seed_medicine(&db, "med-1").await;
        seed_batch(&db, "med-1", 5).await;

        db.settlement()
            .settle(request(vec![line("med-1", 1)], Some("cust-1"), 600_00))
            .await
            .unwrap();

        let year = Utc::now().year();

        // Simulate aggregate drift.
        sqlx::query("UPDATE yearly_points SET points = 999.0 WHERE customer_id = 'cust-1'")
            .execute(db.pool())
            .await
            .unwrap();
        assert_close(db.points().yearly_balance("cust-1", year).await.unwrap(), 999.0);

        let rebuilt = db
            .points()
            .rebuild_yearly_balance("cust-1", year)
            .await
            .unwrap();
        assert_close(rebuilt, 3.0);
        assert_close(db.points().yearly_balance("cust-1", year).await.unwrap(), 3.0);
    }
}
