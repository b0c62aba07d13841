//! # farma-db: Storage & Settlement Layer for Farma POS
//!
//! This crate provides database access and the transactional settlement
//! engine for the pharmacy POS back end. It uses SQLite for local
//! storage with sqlx for async operations.
//!
//! ## Architecture Position
//! ```text
//! ┌──────────────────────────────────────────────────────────────────────┐
//! │                        Farma POS Data Flow                           │
//! │                                                                      │
//! │  Caller (checkout / void / edit / adjust points)                    │
//! │       │                                                              │
//! │       ▼                                                              │
//! │  ┌────────────────────────────────────────────────────────────────┐ │
//! │  │                     farma-db (THIS CRATE)                      │ │
//! │  │                                                                │ │
//! │  │  ┌──────────────┐   ┌──────────────────┐   ┌───────────────┐  │ │
//! │  │  │   Database   │   │ SettlementEngine │   │  Migrations   │  │ │
//! │  │  │  (pool.rs)   │   │ (settlement.rs)  │   │  (embedded)   │  │ │
//! │  │  │              │   │                  │   │               │  │ │
//! │  │  │ SqlitePool   │◄──│ one transaction  │   │ 001_initial_  │  │ │
//! │  │  │ WAL + FKs    │   │ per operation    │   │ schema.sql    │  │ │
//! │  │  └──────▲───────┘   └────────┬─────────┘   └───────────────┘  │ │
//! │  │         │                    │                                 │ │
//! │  │  ┌──────┴────────────────────▼─────────────────────────────┐  │ │
//! │  │  │  Repositories: medicine, batch (+allocator), sale,      │  │ │
//! │  │  │  points (ledger + yearly balance cache)                 │  │ │
//! │  │  └──────────────────────────────────────────────────────────┘ │ │
//! │  └────────────────────────────────────────────────────────────────┘ │
//! │       │                                                              │
//! │       ▼                                                              │
//! │                    SQLite Database (farma.db)                        │
//! └──────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Module Organization
//!
//! - [`pool`] - Connection pool creation and configuration
//! - [`migrations`] - Embedded database migrations
//! - [`error`] - Database and engine error types
//! - [`repository`] - Repository implementations (medicine, batch, sale, points)
//! - [`settlement`] - The transactional settlement/void/edit engine
//!
//! ## Usage
//!
//! ```rust,ignore
//! use farma_db::{Database, DbConfig};
//!
//! let db = Database::new(DbConfig::new("path/to/farma.db")).await?;
//!
//! // Settle a checkout as one unit of work
//! let sale_id = db.settlement().settle(request).await?;
//!
//! // Later: reverse it, restoring stock and compensating points
//! db.settlement().void(&sale_id).await?;
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod error;
pub mod migrations;
pub mod pool;
pub mod repository;
pub mod settlement;

// =============================================================================
// Re-exports
// =============================================================================

pub use error::{DbError, DbResult};
pub use pool::{Database, DbConfig};
pub use settlement::{CorrectionStrategy, EngineConfig, SettlementEngine};

// Repository re-exports for convenience
pub use repository::batch::{AllocationPolicy, BatchRepository, InventoryAllocator};
pub use repository::medicine::MedicineRepository;
pub use repository::points::PointsRepository;
pub use repository::sale::SaleRepository;
