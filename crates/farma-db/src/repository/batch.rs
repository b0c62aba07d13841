//! # Inventory Batches & Allocator
//!
//! Batch storage plus the allocation policy the settlement engine uses
//! to pick which batch a cart line deducts from.
//!
//! ## Allocation Policy
//! ```text
//! allocate(medicine, qty)
//!      │
//!      ▼
//! first batch with quantity ≥ qty?  ──── yes ──► deduct it (first-fit)
//!      │ no
//!      ▼
//! any batch at all?  ── yes ──► deduct the first one (goes negative)
//!      │ no
//!      ▼
//! insert a synthetic backorder batch with -qty
//! ```
//!
//! The base policy **never blocks a checkout**: oversold stock is
//! surfaced to operators via reporting, not prevented here. Setting
//! `allow_backorder: false` turns the two fallback arms into
//! `InsufficientStock` instead.
//!
//! `release` is the compensating half used by void/edit: it adds a
//! quantity back to the exact batch a sale item drew from.

use chrono::Utc;
use sqlx::{SqliteConnection, SqlitePool};
use tracing::{debug, warn};
use uuid::Uuid;

use crate::error::DbResult;
use farma_core::{CoreError, InventoryBatch};

// =============================================================================
// Batch Repository (pool reads + seeding)
// =============================================================================

/// Repository for inventory batch reads and seeding.
#[derive(Debug, Clone)]
pub struct BatchRepository {
    pool: SqlitePool,
}

impl BatchRepository {
    /// Creates a new BatchRepository.
    pub fn new(pool: SqlitePool) -> Self {
        BatchRepository { pool }
    }

    /// Gets a batch by ID.
    pub async fn get_by_id(&self, id: &str) -> DbResult<Option<InventoryBatch>> {
        let batch = sqlx::query_as::<_, InventoryBatch>(
            "SELECT id, medicine_id, quantity, expiry_date, created_at \
             FROM inventory_batches WHERE id = ?1",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(batch)
    }

    /// Lists all batches for a medicine, oldest first.
    pub async fn list_for_medicine(&self, medicine_id: &str) -> DbResult<Vec<InventoryBatch>> {
        let batches = sqlx::query_as::<_, InventoryBatch>(
            "SELECT id, medicine_id, quantity, expiry_date, created_at \
             FROM inventory_batches WHERE medicine_id = ?1 ORDER BY created_at, id",
        )
        .bind(medicine_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(batches)
    }

    /// Total on-hand quantity across all batches of a medicine.
    ///
    /// Can be negative when the medicine is oversold.
    pub async fn total_quantity(&self, medicine_id: &str) -> DbResult<i64> {
        let total: Option<i64> = sqlx::query_scalar(
            "SELECT SUM(quantity) FROM inventory_batches WHERE medicine_id = ?1",
        )
        .bind(medicine_id)
        .fetch_one(&self.pool)
        .await?;

        Ok(total.unwrap_or(0))
    }

    /// Inserts a batch (receiving/seeding).
    pub async fn insert(&self, batch: &InventoryBatch) -> DbResult<()> {
        debug!(id = %batch.id, medicine_id = %batch.medicine_id, quantity = %batch.quantity, "Inserting batch");

        sqlx::query(
            "INSERT INTO inventory_batches (id, medicine_id, quantity, expiry_date, created_at) \
             VALUES (?1, ?2, ?3, ?4, ?5)",
        )
        .bind(&batch.id)
        .bind(&batch.medicine_id)
        .bind(batch.quantity)
        .bind(batch.expiry_date)
        .bind(batch.created_at)
        .execute(&self.pool)
        .await?;

        Ok(())
    }
}

// =============================================================================
// Allocation Policy
// =============================================================================

/// Named inventory policy for the allocator.
#[derive(Debug, Clone, Copy)]
pub struct AllocationPolicy {
    /// When true (default), a checkout is never blocked by stock:
    /// batches may go negative and a missing batch is synthesized.
    pub allow_backorder: bool,
}

impl Default for AllocationPolicy {
    fn default() -> Self {
        AllocationPolicy {
            allow_backorder: true,
        }
    }
}

// =============================================================================
// Inventory Allocator
// =============================================================================

/// Selects and mutates inventory batches inside a settlement unit of work.
///
/// All methods take the caller's transaction connection; the allocator
/// never commits on its own.
#[derive(Debug, Clone, Copy, Default)]
pub struct InventoryAllocator {
    policy: AllocationPolicy,
}

impl InventoryAllocator {
    /// Creates an allocator with the given policy.
    pub fn new(policy: AllocationPolicy) -> Self {
        InventoryAllocator { policy }
    }

    /// Allocates `quantity` units of a medicine and deducts the stock.
    ///
    /// Returns the id of the batch the deduction was taken from, which
    /// the sale item must record so a later void can restore it.
    ///
    /// First-fit over the medicine's batches (not lowest-expiry). With
    /// backorders allowed the fallback deducts from the first batch or
    /// synthesizes a new negative batch; with backorders disallowed the
    /// fallback is `CoreError::InsufficientStock`.
    pub async fn allocate(
        &self,
        conn: &mut SqliteConnection,
        medicine_id: &str,
        quantity: i64,
    ) -> DbResult<String> {
        let batches = sqlx::query_as::<_, InventoryBatch>(
            "SELECT id, medicine_id, quantity, expiry_date, created_at \
             FROM inventory_batches WHERE medicine_id = ?1 ORDER BY created_at, id",
        )
        .bind(medicine_id)
        .fetch_all(&mut *conn)
        .await?;

        // First-fit: the first batch that can cover the whole line.
        if let Some(batch) = batches.iter().find(|b| b.quantity >= quantity) {
            self.deduct(conn, &batch.id, quantity).await?;
            debug!(batch_id = %batch.id, medicine_id = %medicine_id, quantity = %quantity, "Allocated from batch");
            return Ok(batch.id.clone());
        }

        if !self.policy.allow_backorder {
            let available: i64 = batches.iter().map(|b| b.quantity).sum();
            return Err(CoreError::InsufficientStock {
                medicine_id: medicine_id.to_string(),
                available,
                requested: quantity,
            }
            .into());
        }

        // Oversell: draw from the first existing batch, letting it go
        // negative rather than rejecting the sale.
        if let Some(batch) = batches.first() {
            self.deduct(conn, &batch.id, quantity).await?;
            debug!(batch_id = %batch.id, medicine_id = %medicine_id, quantity = %quantity, "Oversold batch");
            return Ok(batch.id.clone());
        }

        // No batch exists at all: synthesize a backorder batch.
        let batch_id = Uuid::new_v4().to_string();
        sqlx::query(
            "INSERT INTO inventory_batches (id, medicine_id, quantity, expiry_date, created_at) \
             VALUES (?1, ?2, ?3, NULL, ?4)",
        )
        .bind(&batch_id)
        .bind(medicine_id)
        .bind(-quantity)
        .bind(Utc::now())
        .execute(&mut *conn)
        .await?;

        debug!(batch_id = %batch_id, medicine_id = %medicine_id, quantity = %quantity, "Created backorder batch");
        Ok(batch_id)
    }

    /// Adds `quantity` back to the named batch, regardless of sign.
    ///
    /// Used by the compensation engine when a sale is voided or edited.
    /// A missing batch id is a warning no-op, never a business rejection;
    /// only transactional failures propagate.
    pub async fn release(
        &self,
        conn: &mut SqliteConnection,
        batch_id: &str,
        quantity: i64,
    ) -> DbResult<()> {
        let result =
            sqlx::query("UPDATE inventory_batches SET quantity = quantity + ?2 WHERE id = ?1")
                .bind(batch_id)
                .bind(quantity)
                .execute(&mut *conn)
                .await?;

        if result.rows_affected() == 0 {
            warn!(batch_id = %batch_id, quantity = %quantity, "Release targeted a missing batch; skipping");
        } else {
            debug!(batch_id = %batch_id, quantity = %quantity, "Released quantity back to batch");
        }

        Ok(())
    }

    async fn deduct(
        &self,
        conn: &mut SqliteConnection,
        batch_id: &str,
        quantity: i64,
    ) -> DbResult<()> {
        sqlx::query("UPDATE inventory_batches SET quantity = quantity - ?2 WHERE id = ?1")
            .bind(batch_id)
            .bind(quantity)
            .execute(&mut *conn)
            .await?;

        Ok(())
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
