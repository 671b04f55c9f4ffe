//! Human-facing document numbers: `SO-2026-00042`.
//!
//! Counters live in the `sequences` table, one row per (prefix, year), and
//! are bumped inside the caller's transaction so a rolled-back document does
//! not consume a number.

use chrono::Datelike;

use garment_core::ServiceError;
use garment_sql::{Executor, Value};

use crate::storage_err;

/// Allocate the next number for `prefix` in the current year.
pub fn next_number<E>(db: &E, prefix: &str) -> Result<String, ServiceError>
where
    E: Executor + ?Sized,
{
    next_number_for_year(db, prefix, chrono::Utc::now().year())
}

pub fn next_number_for_year<E>(db: &E, prefix: &str, year: i32) -> Result<String, ServiceError>
where
    E: Executor + ?Sized,
{
    let params = [Value::Text(prefix.to_string()), Value::Integer(year as i64)];
    db.exec(
        "INSERT INTO sequences (prefix, year, value) VALUES (?1, ?2, 1) \
         ON CONFLICT(prefix, year) DO UPDATE SET value = value + 1",
        &params,
    )
    .map_err(storage_err)?;

    let rows = db
        .query(
            "SELECT value FROM sequences WHERE prefix = ?1 AND year = ?2",
            &params,
        )
        .map_err(storage_err)?;
    let value = rows
        .first()
        .and_then(|r| r.get_i64("value"))
        .ok_or_else(|| ServiceError::Storage(format!("sequence {prefix}/{year} missing")))?;

    Ok(format!("{prefix}-{year}-{value:05}"))
}
