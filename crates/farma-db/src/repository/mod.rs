//! # Repository Modules
//!
//! Each repository owns the SQL for one collection.
//!
//! Pool-backed repository structs serve read paths and seeding; the
//! module-level functions taking `&mut SqliteConnection` are the
//! collaborators the settlement engine calls *inside* a unit of work,
//! so every mutation shares the caller's transaction.

pub mod batch;
pub mod medicine;
pub mod points;
pub mod sale;
