//! Versioned schema migrations.
//!
//! Each module ships an ordered `&[Migration]`. Pending migrations are
//! applied in order, each in its own transaction, and recorded in
//! `schema_migrations` so a half-applied schema can't happen.

use std::collections::HashSet;

use serde::Serialize;
use tracing::info;

use garment_core::{now_rfc3339, ServiceError};
use garment_sql::{Executor, SQLStore, Value};

use crate::{begin, commit, storage_err};

/// One schema change owned by a module.
#[derive(Debug, Clone, Copy)]
pub struct Migration {
    pub module: &'static str,
    pub version: u32,
    pub name: &'static str,
    pub sql: &'static str,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AppliedMigration {
    pub module: String,
    pub version: u32,
    pub name: String,
    pub applied_at: String,
}

const MIGRATIONS_TABLE: &str = "CREATE TABLE IF NOT EXISTS schema_migrations (
    module TEXT NOT NULL,
    version INTEGER NOT NULL,
    name TEXT NOT NULL,
    applied_at TEXT NOT NULL,
    PRIMARY KEY (module, version)
)";

/// Tables shared by every module: document sequences and status history.
pub const BASE: &[Migration] = &[Migration {
    module: "store",
    version: 1,
    name: "sequences and status history",
    sql: "
CREATE TABLE IF NOT EXISTS sequences (
    prefix TEXT NOT NULL,
    year INTEGER NOT NULL,
    value INTEGER NOT NULL,
    PRIMARY KEY (prefix, year)
);
CREATE TABLE IF NOT EXISTS status_history (
    id TEXT PRIMARY KEY,
    data TEXT NOT NULL,
    entity TEXT NOT NULL,
    entity_id TEXT NOT NULL,
    created_at TEXT,
    updated_at TEXT
);
CREATE INDEX IF NOT EXISTS idx_status_history_entity ON status_history(entity, entity_id);
",
}];

/// Apply every pending migration. Returns the ones applied by this call.
pub fn apply(db: &dyn SQLStore, migrations: &[Migration]) -> Result<Vec<AppliedMigration>, ServiceError> {
    validate_order(migrations)?;
    db.exec_batch(MIGRATIONS_TABLE).map_err(storage_err)?;

    let done: HashSet<(String, u32)> = applied(db)?
        .into_iter()
        .map(|m| (m.module, m.version))
        .collect();

    let mut newly = Vec::new();
    for m in migrations {
        if done.contains(&(m.module.to_string(), m.version)) {
            continue;
        }

        let tx = begin(db)?;
        tx.exec_batch(m.sql).map_err(|e| {
            ServiceError::Storage(format!("migration {}/{} ({}): {e}", m.module, m.version, m.name))
        })?;
        let record = AppliedMigration {
            module: m.module.to_string(),
            version: m.version,
            name: m.name.to_string(),
            applied_at: now_rfc3339(),
        };
        tx.exec(
            "INSERT INTO schema_migrations (module, version, name, applied_at) VALUES (?1, ?2, ?3, ?4)",
            &[
                Value::Text(record.module.clone()),
                Value::Integer(record.version as i64),
                Value::Text(record.name.clone()),
                Value::Text(record.applied_at.clone()),
            ],
        )
        .map_err(storage_err)?;
        commit(tx)?;

        info!(module = m.module, version = m.version, name = m.name, "applied migration");
        newly.push(record);
    }
    Ok(newly)
}

/// Every applied migration, ordered by module then version.
pub fn applied<E>(db: &E) -> Result<Vec<AppliedMigration>, ServiceError>
where
    E: Executor + ?Sized,
{
    db.exec_batch(MIGRATIONS_TABLE).map_err(storage_err)?;
    let rows = db
        .query(
            "SELECT module, version, name, applied_at FROM schema_migrations ORDER BY module, version",
            &[],
        )
        .map_err(storage_err)?;
    Ok(rows
        .iter()
        .map(|r| AppliedMigration {
            module: r.get_str("module").unwrap_or_default().to_string(),
            version: r.get_i64("version").unwrap_or(0) as u32,
            name: r.get_str("name").unwrap_or_default().to_string(),
            applied_at: r.get_str("applied_at").unwrap_or_default().to_string(),
        })
        .collect())
}

/// Within one module, versions must strictly increase in declaration order.
fn validate_order(migrations: &[Migration]) -> Result<(), ServiceError> {
    let mut last: Vec<(&str, u32)> = Vec::new();
    for m in migrations {
        match last.iter_mut().find(|(module, _)| *module == m.module) {
            Some((_, version)) if m.version <= *version => {
                return Err(ServiceError::Internal(format!(
                    "migration {}/{} declared after version {}",
                    m.module, m.version, version
                )));
            }
            Some((_, version)) => *version = m.version,
            None => last.push((m.module, m.version)),
        }
    }
    Ok(())
}
