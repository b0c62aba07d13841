//! # Points Ledger & Yearly Balance Cache
//!
//! The loyalty-points side of settlement: an append-only journal of
//! signed point events plus a denormalized per-customer-per-year
//! balance kept in lock-step with it.
//!
//! ## The Mirrored-Aggregate Pattern
//! ```text
//! ┌──────────────────────┐   same transaction   ┌─────────────────────┐
//! │    points_ledger     │ ◄──────────────────► │    yearly_points    │
//! │  (append-only truth) │   journal-append +   │ (clamped aggregate) │
//! │                      │   aggregate-update   │                     │
//! └──────────────────────┘                      └─────────────────────┘
//! ```
//! The aggregate is never derived lazily from a full scan on the hot
//! path; `rebuild_yearly_balance` is the offline repair procedure for
//! drift recovery.
//!
//! ## Correction Discipline
//! Void restores correctness with *compensating entries* (originals stay
//! as audit trail). Only the edit path's destructive correction deletes
//! entries, via [`delete_for_sale`].

use chrono::{DateTime, Datelike, Utc};
use sqlx::{SqliteConnection, SqlitePool};
use tracing::debug;
use uuid::Uuid;

use crate::error::DbResult;
use farma_core::points::{clamp_balance, clamp_redemption, requested_deduction};
use farma_core::{Money, PointsEntryKind, PointsLedgerEntry};

const ENTRY_COLUMNS: &str =
    "id, customer_id, points, kind, related_sale_id, entry_date, description";

// =============================================================================
// Read Paths (outside units of work)
// =============================================================================

/// Repository for points read paths and offline repair.
#[derive(Debug, Clone)]
pub struct PointsRepository {
    pool: SqlitePool,
}

impl PointsRepository {
    /// Creates a new PointsRepository.
    pub fn new(pool: SqlitePool) -> Self {
        PointsRepository { pool }
    }

    /// All ledger entries for a customer, newest first.
    pub async fn ledger_for_customer(
        &self,
        customer_id: &str,
    ) -> DbResult<Vec<PointsLedgerEntry>> {
        let sql = format!(
            "SELECT {ENTRY_COLUMNS} FROM points_ledger \
             WHERE customer_id = ?1 ORDER BY entry_date DESC, id"
        );
        let entries = sqlx::query_as::<_, PointsLedgerEntry>(&sql)
            .bind(customer_id)
            .fetch_all(&self.pool)
            .await?;

        Ok(entries)
    }

    /// All ledger entries tied to a sale (originals and compensations).
    pub async fn ledger_for_sale(&self, sale_id: &str) -> DbResult<Vec<PointsLedgerEntry>> {
        let sql = format!(
            "SELECT {ENTRY_COLUMNS} FROM points_ledger \
             WHERE related_sale_id = ?1 ORDER BY entry_date, id"
        );
        let entries = sqlx::query_as::<_, PointsLedgerEntry>(&sql)
            .bind(sale_id)
            .fetch_all(&self.pool)
            .await?;

        Ok(entries)
    }

    /// Current materialized balance for a customer/year; zero if absent.
    pub async fn yearly_balance(&self, customer_id: &str, year: i32) -> DbResult<f64> {
        let points: Option<f64> =
            sqlx::query_scalar("SELECT points FROM yearly_points WHERE customer_id = ?1 AND year = ?2")
                .bind(customer_id)
                .bind(year)
                .fetch_optional(&self.pool)
                .await?;

        Ok(points.unwrap_or(0.0))
    }

    /// Lifetime signed point total straight from the ledger.
    pub async fn lifetime_points(&self, customer_id: &str) -> DbResult<f64> {
        let total: Option<f64> =
            sqlx::query_scalar("SELECT SUM(points) FROM points_ledger WHERE customer_id = ?1")
                .bind(customer_id)
                .fetch_one(&self.pool)
                .await?;

        Ok(total.unwrap_or(0.0))
    }

    /// Recomputes a yearly balance from the ledger and overwrites the
    /// cached aggregate. Offline repair tool for drift recovery, not
    /// part of the hot path.
    pub async fn rebuild_yearly_balance(&self, customer_id: &str, year: i32) -> DbResult<f64> {
        let entries = self.ledger_for_customer(customer_id).await?;
        let sum: f64 = entries
            .iter()
            .filter(|e| e.entry_date.year() == year)
            .map(|e| e.points)
            .sum();
        let rebuilt = clamp_balance(sum);

        let mut tx = self.pool.begin().await?;
        upsert_balance(&mut tx, customer_id, year, rebuilt).await?;
        tx.commit().await?;

        debug!(customer_id = %customer_id, year = %year, points = %rebuilt, "Rebuilt yearly balance from ledger");
        Ok(rebuilt)
    }
}

// =============================================================================
// Unit-of-Work Collaborators
// =============================================================================
// Everything below runs on the settlement engine's transaction
// connection: a ledger append and its matching balance update always
// commit or abort together.

/// Current balance for a customer/year, read inside the unit of work.
pub(crate) async fn fetch_balance(
    conn: &mut SqliteConnection,
    customer_id: &str,
    year: i32,
) -> DbResult<f64> {
    let points: Option<f64> =
        sqlx::query_scalar("SELECT points FROM yearly_points WHERE customer_id = ?1 AND year = ?2")
            .bind(customer_id)
            .bind(year)
            .fetch_optional(&mut *conn)
            .await?;

    Ok(points.unwrap_or(0.0))
}

/// Applies a signed delta to the yearly balance, clamping at zero.
///
/// Returns the new balance. Must run in the same transaction as the
/// ledger write that produced `delta`.
pub(crate) async fn apply_delta(
    conn: &mut SqliteConnection,
    customer_id: &str,
    year: i32,
    delta: f64,
) -> DbResult<f64> {
    let current = fetch_balance(conn, customer_id, year).await?;
    let new_balance = clamp_balance(current + delta);

    upsert_balance(conn, customer_id, year, new_balance).await?;

    debug!(customer_id = %customer_id, year = %year, delta = %delta, balance = %new_balance, "Applied points delta");
    Ok(new_balance)
}

async fn upsert_balance(
    conn: &mut SqliteConnection,
    customer_id: &str,
    year: i32,
    points: f64,
) -> DbResult<()> {
    sqlx::query(
        "INSERT INTO yearly_points (customer_id, year, points) VALUES (?1, ?2, ?3) \
         ON CONFLICT(customer_id, year) DO UPDATE SET points = excluded.points",
    )
    .bind(customer_id)
    .bind(year)
    .bind(points)
    .execute(&mut *conn)
    .await?;

    Ok(())
}

/// Records points earned from a settled sale: `final_total / 200`,
/// fractional. Returns the appended entry.
pub(crate) async fn record_earn(
    conn: &mut SqliteConnection,
    customer_id: &str,
    sale_id: &str,
    final_total: Money,
    now: DateTime<Utc>,
) -> DbResult<PointsLedgerEntry> {
    let earned = farma_core::points::earn_for_total(final_total);

    let entry = PointsLedgerEntry {
        id: Uuid::new_v4().to_string(),
        customer_id: customer_id.to_string(),
        points: earned,
        kind: PointsEntryKind::Sale,
        related_sale_id: Some(sale_id.to_string()),
        entry_date: now,
        description: format!("Earned {earned:.2} points from sale {sale_id}"),
    };

    insert_entry(conn, &entry).await?;
    Ok(entry)
}

/// Records a redemption clamped to the available balance.
///
/// The entry always stores the *actual* deducted amount, signed
/// negative; redemption never drives the balance itself negative.
/// Returns `(deducted, entry)`.
pub(crate) async fn record_redeem(
    conn: &mut SqliteConnection,
    customer_id: &str,
    sale_id: &str,
    used: f64,
    multiplier: f64,
    current_balance: f64,
    now: DateTime<Utc>,
) -> DbResult<(f64, PointsLedgerEntry)> {
    let requested = requested_deduction(used, multiplier);
    let deducted = clamp_redemption(current_balance, requested);

    let entry = PointsLedgerEntry {
        id: Uuid::new_v4().to_string(),
        customer_id: customer_id.to_string(),
        points: -deducted,
        kind: PointsEntryKind::Redeem,
        related_sale_id: Some(sale_id.to_string()),
        entry_date: now,
        description: format!("Redeemed {used} points × {multiplier} = {deducted}"),
    };

    insert_entry(conn, &entry).await?;
    Ok((deducted, entry))
}

/// Records a manual operator adjustment (positive or negative).
pub(crate) async fn record_manual(
    conn: &mut SqliteConnection,
    customer_id: &str,
    delta: f64,
    note: Option<&str>,
    now: DateTime<Utc>,
) -> DbResult<PointsLedgerEntry> {
    let kind = if delta > 0.0 {
        PointsEntryKind::ManualAdd
    } else {
        PointsEntryKind::ManualDeduct
    };

    let description = match note {
        Some(note) if !note.trim().is_empty() => note.to_string(),
        _ if delta > 0.0 => "Manual add".to_string(),
        _ => "Manual deduction".to_string(),
    };

    let entry = PointsLedgerEntry {
        id: Uuid::new_v4().to_string(),
        customer_id: customer_id.to_string(),
        points: delta,
        kind,
        related_sale_id: None,
        entry_date: now,
        description,
    };

    insert_entry(conn, &entry).await?;
    Ok(entry)
}

/// Emits compensating entries for a sale's live point effects (void path).
///
/// Reversed redemptions come back as `RedeemReturned` (+|points|),
/// reversed earnings as `EarnVoided` (−points). The originals are left
/// in place as an audit trail. Returns the compensating entries; the
/// caller applies their deltas to the yearly balance.
///
/// Earlier compensations for the same sale (a compensating edit) count
/// against the originals: only the *net* live effect of each kind is
/// reversed, so an already-countered entry is never reversed twice.
pub(crate) async fn reverse_for_sale(
    conn: &mut SqliteConnection,
    sale_id: &str,
    now: DateTime<Utc>,
) -> DbResult<Vec<PointsLedgerEntry>> {
    let sql = format!(
        "SELECT {ENTRY_COLUMNS} FROM points_ledger \
         WHERE related_sale_id = ?1 ORDER BY entry_date, id"
    );
    let entries = sqlx::query_as::<_, PointsLedgerEntry>(&sql)
        .bind(sale_id)
        .fetch_all(&mut *conn)
        .await?;

    let Some(customer_id) = entries.first().map(|e| e.customer_id.clone()) else {
        return Ok(Vec::new());
    };

    // Net live effect per kind: redeems net against redeem_returned,
    // earns against earn_voided.
    let redeem_net: f64 = entries
        .iter()
        .filter(|e| {
            matches!(
                e.kind,
                PointsEntryKind::Redeem | PointsEntryKind::RedeemReturned
            )
        })
        .map(|e| e.points)
        .sum();
    let earn_net: f64 = entries
        .iter()
        .filter(|e| matches!(e.kind, PointsEntryKind::Sale | PointsEntryKind::EarnVoided))
        .map(|e| e.points)
        .sum();

    let mut compensations = Vec::new();

    if redeem_net < 0.0 {
        let returned = -redeem_net;
        compensations.push(PointsLedgerEntry {
            id: Uuid::new_v4().to_string(),
            customer_id: customer_id.clone(),
            points: returned,
            kind: PointsEntryKind::RedeemReturned,
            related_sale_id: Some(sale_id.to_string()),
            entry_date: now,
            description: format!("Returned {returned} points from voided sale {sale_id}"),
        });
    }

    if earn_net > 0.0 {
        compensations.push(PointsLedgerEntry {
            id: Uuid::new_v4().to_string(),
            customer_id,
            points: -earn_net,
            kind: PointsEntryKind::EarnVoided,
            related_sale_id: Some(sale_id.to_string()),
            entry_date: now,
            description: format!("Removed {earn_net} earned points from voided sale {sale_id}"),
        });
    }

    for compensation in &compensations {
        insert_entry(conn, compensation).await?;
    }

    Ok(compensations)
}

/// Deletes every ledger entry tied to a sale and returns their summed
/// point effect (destructive correction, edit path only).
pub(crate) async fn delete_for_sale(conn: &mut SqliteConnection, sale_id: &str) -> DbResult<f64> {
    let removed: Option<f64> =
        sqlx::query_scalar("SELECT SUM(points) FROM points_ledger WHERE related_sale_id = ?1")
            .bind(sale_id)
            .fetch_one(&mut *conn)
            .await?;

    sqlx::query("DELETE FROM points_ledger WHERE related_sale_id = ?1")
        .bind(sale_id)
        .execute(&mut *conn)
        .await?;

    Ok(removed.unwrap_or(0.0))
}

/// Appends one immutable ledger entry.
async fn insert_entry(conn: &mut SqliteConnection, entry: &PointsLedgerEntry) -> DbResult<()> {
    debug!(
        customer_id = %entry.customer_id,
        points = %entry.points,
        kind = ?entry.kind,
        "Appending points ledger entry"
    );

    sqlx::query(
        "INSERT INTO points_ledger \
         (id, customer_id, points, kind, related_sale_id, entry_date, description) \
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
    )
    .bind(&entry.id)
    .bind(&entry.customer_id)
    .bind(entry.points)
    .bind(entry.kind)
    .bind(&entry.related_sale_id)
    .bind(entry.entry_date)
    .bind(&entry.description)
    .execute(&mut *conn)
    .await?;

    Ok(())
}
