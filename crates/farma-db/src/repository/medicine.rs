//! # Medicine Repository
//!
//! Read access to the external medicine catalog.
//!
//! Catalog CRUD is out of scope for this system: the settlement engine
//! treats medicines as immutable reference data. `insert` exists so
//! tests and seed tooling can populate the catalog.

use sqlx::SqlitePool;
use tracing::debug;

use crate::error::DbResult;
use farma_core::Medicine;

/// Repository for catalog reads and seeding.
#[derive(Debug, Clone)]
pub struct MedicineRepository {
    pool: SqlitePool,
}

impl MedicineRepository {
    /// Creates a new MedicineRepository.
    pub fn new(pool: SqlitePool) -> Self {
        MedicineRepository { pool }
    }

    /// Gets a medicine by ID.
    pub async fn get_by_id(&self, id: &str) -> DbResult<Option<Medicine>> {
        let medicine = sqlx::query_as::<_, Medicine>(
            "SELECT id, name, price1_cents, price2_cents, is_archived, created_at, updated_at \
             FROM medicines WHERE id = ?1",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(medicine)
    }

    /// Lists non-archived medicines sorted by name.
    pub async fn list_active(&self, limit: u32) -> DbResult<Vec<Medicine>> {
        let medicines = sqlx::query_as::<_, Medicine>(
            "SELECT id, name, price1_cents, price2_cents, is_archived, created_at, updated_at \
             FROM medicines WHERE is_archived = 0 ORDER BY name LIMIT ?1",
        )
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        Ok(medicines)
    }

    /// Inserts a catalog medicine (seed/test tooling).
    pub async fn insert(&self, medicine: &Medicine) -> DbResult<()> {
        debug!(id = %medicine.id, name = %medicine.name, "Inserting medicine");

        sqlx::query(
            "INSERT INTO medicines \
             (id, name, price1_cents, price2_cents, is_archived, created_at, updated_at) \
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
        )
        .bind(&medicine.id)
        .bind(&medicine.name)
        .bind(medicine.price1_cents)
        .bind(medicine.price2_cents)
        .bind(medicine.is_archived)
        .bind(medicine.created_at)
        .bind(medicine.updated_at)
        .execute(&self.pool)
        .await?;

        Ok(())
    }
}
