//! Bulk truncation used by the operations CLI to reset a database.

use tracing::warn;

use garment_core::ServiceError;
use garment_sql::SQLStore;

use crate::{begin, commit, storage_err};

/// Delete every row from `tables` in one transaction. Returns rows removed.
///
/// Tables are emptied in the given order, so list children before parents.
pub fn truncate(db: &dyn SQLStore, tables: &[&str]) -> Result<u64, ServiceError> {
    let tx = begin(db)?;
    let mut removed = 0;
    for table in tables {
        let n = tx
            .exec(&format!("DELETE FROM {table}"), &[])
            .map_err(storage_err)?;
        warn!(table, rows = n, "truncated table");
        removed += n;
    }
    commit(tx)?;
    Ok(removed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use garment_sql::{Executor, SqliteStore};

    #[test]
    fn empties_all_listed_tables() {
        let db = SqliteStore::open_in_memory().unwrap();
        db.exec_batch(
            "CREATE TABLE a (id TEXT); CREATE TABLE b (id TEXT); CREATE TABLE keep (id TEXT);
             INSERT INTO a VALUES ('1'), ('2'); INSERT INTO b VALUES ('3'); INSERT INTO keep VALUES ('4');",
        )
        .unwrap();

        assert_eq!(truncate(&db, &["a", "b"]).unwrap(), 3);
        let kept = db.query("SELECT COUNT(*) AS cnt FROM keep", &[]).unwrap();
        assert_eq!(kept[0].get_i64("cnt"), Some(1));
    }
}
