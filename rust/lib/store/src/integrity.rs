//! Integrity findings.
//!
//! Every module contributes checks that look for data the workflows should
//! never produce: orphaned references, ledgers out of balance, quantities
//! past their limits. The server and the operations CLI aggregate them into
//! one [`IntegrityReport`].

use serde::Serialize;

use garment_core::{now_rfc3339, ServiceError};
use garment_sql::Executor;

use crate::storage_err;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Severity {
    Error,
    Warning,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Finding {
    /// Stable check name, e.g. `inventory.balance_mismatch`.
    pub check: String,
    pub severity: Severity,
    pub entity: String,
    pub entity_id: String,
    pub message: String,
}

impl Finding {
    pub fn error(check: &str, entity: &str, entity_id: &str, message: impl Into<String>) -> Self {
        Self {
            check: check.to_string(),
            severity: Severity::Error,
            entity: entity.to_string(),
            entity_id: entity_id.to_string(),
            message: message.into(),
        }
    }

    pub fn warning(check: &str, entity: &str, entity_id: &str, message: impl Into<String>) -> Self {
        Self {
            severity: Severity::Warning,
            ..Self::error(check, entity, entity_id, message)
        }
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct IntegrityReport {
    pub generated_at: String,
    pub errors: usize,
    pub warnings: usize,
    pub findings: Vec<Finding>,
}

impl IntegrityReport {
    pub fn from_findings(findings: Vec<Finding>) -> Self {
        let errors = findings.iter().filter(|f| f.severity == Severity::Error).count();
        Self {
            generated_at: now_rfc3339(),
            errors,
            warnings: findings.len() - errors,
            findings,
        }
    }

    pub fn is_clean(&self) -> bool {
        self.findings.is_empty()
    }
}

/// Ids of rows in `child` whose non-null `fk_column` points at no row of `parent`.
pub fn orphans<E>(db: &E, child: &str, fk_column: &str, parent: &str) -> Result<Vec<(String, String)>, ServiceError>
where
    E: Executor + ?Sized,
{
    let sql = format!(
        "SELECT c.id AS id, c.{fk_column} AS fk FROM {child} c \
         LEFT JOIN {parent} p ON p.id = c.{fk_column} \
         WHERE c.{fk_column} IS NOT NULL AND c.{fk_column} != '' AND p.id IS NULL \
         ORDER BY c.id"
    );
    let rows = db.query(&sql, &[]).map_err(storage_err)?;
    Ok(rows
        .iter()
        .map(|r| {
            (
                r.get_str("id").unwrap_or_default().to_string(),
                r.get_str("fk").unwrap_or_default().to_string(),
            )
        })
        .collect())
}

/// [`orphans`] turned into error findings.
pub fn orphan_findings<E>(
    db: &E,
    check: &str,
    child: &str,
    fk_column: &str,
    parent: &str,
) -> Result<Vec<Finding>, ServiceError>
where
    E: Executor + ?Sized,
{
    Ok(orphans(db, child, fk_column, parent)?
        .into_iter()
        .map(|(id, fk)| {
            Finding::error(
                check,
                child,
                &id,
                format!("{fk_column} '{fk}' does not exist in {parent}"),
            )
        })
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use garment_sql::SqliteStore;

    #[test]
    fn finds_orphaned_rows() {
        let db = SqliteStore::open_in_memory().unwrap();
        db.exec_batch(
            "CREATE TABLE orders (id TEXT PRIMARY KEY);
             CREATE TABLE lines (id TEXT PRIMARY KEY, order_id TEXT);
             INSERT INTO orders (id) VALUES ('o1');
             INSERT INTO lines (id, order_id) VALUES ('l1', 'o1'), ('l2', 'gone'), ('l3', NULL);",
        )
        .unwrap();

        let found = orphan_findings(&db, "test.orphan_line", "lines", "order_id", "orders").unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].entity_id, "l2");
        assert_eq!(found[0].severity, Severity::Error);

        let report = IntegrityReport::from_findings(vec![
            found[0].clone(),
            Finding::warning("test.soft", "lines", "l3", "no order"),
        ]);
        assert_eq!(report.errors, 1);
        assert_eq!(report.warnings, 1);
        assert!(!report.is_clean());
    }
}
