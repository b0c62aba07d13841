//! # Sale Repository
//!
//! Storage for sale headers and line items.
//!
//! ## Sale Lifecycle
//! ```text
//! Settle ──► Sale { status: Completed } + SaleItems + points effects
//!    │
//!    ├── Void ──► status: Voided, inventory restored, points compensated
//!    │           (header and items stay visible for audit)
//!    │
//!    └── Edit ──► same id, header overwritten, items deleted + reinserted,
//!                points re-derived
//! ```
//!
//! The pool-backed `SaleRepository` serves read paths that run outside a
//! unit of work. The module-level functions take the settlement engine's
//! transaction connection so every mutation commits or aborts together.

use sqlx::{SqliteConnection, SqlitePool};
use tracing::debug;

use crate::error::DbResult;
use farma_core::{Sale, SaleItem, SaleUpdate};

const SALE_COLUMNS: &str = "id, customer_id, purchased_date, created_at, total_cents, \
     professional_fee_cents, discount_cents, final_total_cents, money_given_cents, \
     change_cents, payment_method, points_used, points_multiplier, points_discount_cents, status";

const ITEM_COLUMNS: &str = "id, sale_id, medicine_id, quantity, price_at_sale_cents, \
     price_type, batch_id, sale_unit, created_at";

// =============================================================================
// Read Paths (outside units of work)
// =============================================================================

/// Repository for sale read paths.
#[derive(Debug, Clone)]
pub struct SaleRepository {
    pool: SqlitePool,
}

impl SaleRepository {
    /// Creates a new SaleRepository.
    pub fn new(pool: SqlitePool) -> Self {
        SaleRepository { pool }
    }

    /// Gets a sale by ID.
    pub async fn get_by_id(&self, id: &str) -> DbResult<Option<Sale>> {
        let sql = format!("SELECT {SALE_COLUMNS} FROM sales WHERE id = ?1");
        let sale = sqlx::query_as::<_, Sale>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(sale)
    }

    /// Gets all line items for a sale.
    pub async fn items_for_sale(&self, sale_id: &str) -> DbResult<Vec<SaleItem>> {
        let sql =
            format!("SELECT {ITEM_COLUMNS} FROM sale_items WHERE sale_id = ?1 ORDER BY created_at, id");
        let items = sqlx::query_as::<_, SaleItem>(&sql)
            .bind(sale_id)
            .fetch_all(&self.pool)
            .await?;

        Ok(items)
    }

    /// Lists the most recent sales, newest first.
    pub async fn list_recent(&self, limit: u32) -> DbResult<Vec<Sale>> {
        let sql = format!("SELECT {SALE_COLUMNS} FROM sales ORDER BY created_at DESC LIMIT ?1");
        let sales = sqlx::query_as::<_, Sale>(&sql)
            .bind(limit)
            .fetch_all(&self.pool)
            .await?;

        Ok(sales)
    }

    /// Lists a customer's sales, newest first.
    pub async fn list_for_customer(&self, customer_id: &str) -> DbResult<Vec<Sale>> {
        let sql =
            format!("SELECT {SALE_COLUMNS} FROM sales WHERE customer_id = ?1 ORDER BY created_at DESC");
        let sales = sqlx::query_as::<_, Sale>(&sql)
            .bind(customer_id)
            .fetch_all(&self.pool)
            .await?;

        Ok(sales)
    }
}

// =============================================================================
// Unit-of-Work Collaborators
// =============================================================================
// These run on the settlement engine's transaction connection.

/// Fetches a sale inside a unit of work.
pub(crate) async fn fetch_sale(conn: &mut SqliteConnection, id: &str) -> DbResult<Option<Sale>> {
    let sql = format!("SELECT {SALE_COLUMNS} FROM sales WHERE id = ?1");
    let sale = sqlx::query_as::<_, Sale>(&sql)
        .bind(id)
        .fetch_optional(&mut *conn)
        .await?;

    Ok(sale)
}

/// Fetches a sale's items inside a unit of work.
pub(crate) async fn fetch_items(
    conn: &mut SqliteConnection,
    sale_id: &str,
) -> DbResult<Vec<SaleItem>> {
    let sql = format!("SELECT {ITEM_COLUMNS} FROM sale_items WHERE sale_id = ?1 ORDER BY created_at, id");
    let items = sqlx::query_as::<_, SaleItem>(&sql)
        .bind(sale_id)
        .fetch_all(&mut *conn)
        .await?;

    Ok(items)
}

/// Inserts a sale header.
pub(crate) async fn insert_sale(conn: &mut SqliteConnection, sale: &Sale) -> DbResult<()> {
    debug!(id = %sale.id, final_total = %sale.final_total_cents, "Inserting sale");

    sqlx::query(
        "INSERT INTO sales ( \
            id, customer_id, purchased_date, created_at, total_cents, \
            professional_fee_cents, discount_cents, final_total_cents, \
            money_given_cents, change_cents, payment_method, \
            points_used, points_multiplier, points_discount_cents, status \
        ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15)",
    )
    .bind(&sale.id)
    .bind(&sale.customer_id)
    .bind(sale.purchased_date)
    .bind(sale.created_at)
    .bind(sale.total_cents)
    .bind(sale.professional_fee_cents)
    .bind(sale.discount_cents)
    .bind(sale.final_total_cents)
    .bind(sale.money_given_cents)
    .bind(sale.change_cents)
    .bind(sale.payment_method)
    .bind(sale.points_used)
    .bind(sale.points_multiplier)
    .bind(sale.points_discount_cents)
    .bind(sale.status)
    .execute(&mut *conn)
    .await?;

    Ok(())
}

/// Inserts a line item referencing the batch it drew from.
pub(crate) async fn insert_item(conn: &mut SqliteConnection, item: &SaleItem) -> DbResult<()> {
    debug!(sale_id = %item.sale_id, medicine_id = %item.medicine_id, batch_id = %item.batch_id, "Inserting sale item");

    sqlx::query(
        "INSERT INTO sale_items ( \
            id, sale_id, medicine_id, quantity, price_at_sale_cents, \
            price_type, batch_id, sale_unit, created_at \
        ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
    )
    .bind(&item.id)
    .bind(&item.sale_id)
    .bind(&item.medicine_id)
    .bind(item.quantity)
    .bind(item.price_at_sale_cents)
    .bind(item.price_type)
    .bind(&item.batch_id)
    .bind(item.sale_unit)
    .bind(item.created_at)
    .execute(&mut *conn)
    .await?;

    Ok(())
}

/// Deletes all line items for a sale (edit re-derives them).
pub(crate) async fn delete_items(conn: &mut SqliteConnection, sale_id: &str) -> DbResult<u64> {
    let result = sqlx::query("DELETE FROM sale_items WHERE sale_id = ?1")
        .bind(sale_id)
        .execute(&mut *conn)
        .await?;

    Ok(result.rows_affected())
}

/// Flips a completed sale to voided.
///
/// The status guard in the WHERE clause makes the transition one-way:
/// a sale that is already voided is left untouched.
pub(crate) async fn mark_voided(conn: &mut SqliteConnection, sale_id: &str) -> DbResult<bool> {
    let result =
        sqlx::query("UPDATE sales SET status = 'voided' WHERE id = ?1 AND status = 'completed'")
            .bind(sale_id)
            .execute(&mut *conn)
            .await?;

    Ok(result.rows_affected() > 0)
}

/// Overwrites a sale header in place (edit path).
///
/// The id, customer, and created_at are preserved; everything else is
/// replaced from the update.
pub(crate) async fn overwrite_header(
    conn: &mut SqliteConnection,
    sale_id: &str,
    update: &SaleUpdate,
    purchased_date: chrono::DateTime<chrono::Utc>,
) -> DbResult<()> {
    debug!(sale_id = %sale_id, final_total = %update.pricing.final_total_cents, "Overwriting sale header");

    sqlx::query(
        "UPDATE sales SET \
            purchased_date = ?2, \
            total_cents = ?3, \
            professional_fee_cents = ?4, \
            discount_cents = ?5, \
            final_total_cents = ?6, \
            money_given_cents = ?7, \
            change_cents = ?8, \
            payment_method = ?9, \
            points_used = ?10, \
            points_multiplier = ?11, \
            points_discount_cents = ?12 \
        WHERE id = ?1",
    )
    .bind(sale_id)
    .bind(purchased_date)
    .bind(update.pricing.subtotal_cents)
    .bind(update.pricing.professional_fee_cents)
    .bind(update.pricing.discount_cents)
    .bind(update.pricing.final_total_cents)
    .bind(update.pricing.money_given_cents)
    .bind(update.pricing.change_cents)
    .bind(update.pricing.payment_method)
    .bind(update.points.used)
    .bind(update.points.multiplier)
    .bind(update.points.discount_cents)
    .execute(&mut *conn)
    .await?;

    Ok(())
}
