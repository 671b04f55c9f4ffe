//! Document-table storage shared by every department module.
//!
//! Each table stores the full JSON document in a `data` TEXT column, with
//! indexed columns extracted for filtering and uniqueness:
//!
//! ```sql
//! CREATE TABLE sales_orders (
//!     id TEXT PRIMARY KEY,
//!     data TEXT NOT NULL,
//!     number TEXT UNIQUE,
//!     customer_id TEXT,
//!     status TEXT,
//!     created_at TEXT,
//!     updated_at TEXT
//! );
//! ```
//!
//! All helpers are generic over [`Executor`] so a workflow can run them on
//! the store or inside an open transaction.

pub mod history;
pub mod integrity;
pub mod migrate;
pub mod numbering;
pub mod reset;
pub mod table;

use garment_core::ServiceError;
use garment_sql::{SQLError, SQLStore, Transaction};

pub use garment_sql::{Executor, Value};
pub use history::HistoryEntry;
pub use integrity::{Finding, IntegrityReport, Severity};
pub use migrate::{AppliedMigration, Migration};

/// Map a storage error to a service error. Unique/foreign-key violations
/// become `Conflict`, everything else is `Storage`.
pub fn storage_err(e: SQLError) -> ServiceError {
    match e {
        SQLError::Constraint(msg) => ServiceError::Conflict(msg),
        other => ServiceError::Storage(other.to_string()),
    }
}

/// Begin a write transaction on the store.
pub fn begin(db: &dyn SQLStore) -> Result<Box<dyn Transaction + '_>, ServiceError> {
    db.begin().map_err(storage_err)
}

/// Commit a transaction opened with [`begin`].
pub fn commit(tx: Box<dyn Transaction + '_>) -> Result<(), ServiceError> {
    tx.commit().map_err(storage_err)
}
