//! Everything the server and the operations CLI do across all modules:
//! migrations, integrity checks and resets.

use garment_core::ServiceError;
use garment_sql::SQLStore;
use garment_store::{migrate, reset, AppliedMigration, Executor, IntegrityReport, Migration};

/// Module migrations in dependency order. Auth runs separately so it can
/// seed its built-in roles.
pub const MIGRATIONS: &[&[Migration]] = &[
    migrate::BASE,
    garment_inventory::schema::MIGRATIONS,
    garment_sales::schema::MIGRATIONS,
    garment_procurement::schema::MIGRATIONS,
    garment_manufacturing::schema::MIGRATIONS,
    garment_shipment::schema::MIGRATIONS,
    garment_finance::schema::MIGRATIONS,
];

/// Shared tables emptied together with the transactional ones.
const SHARED_TABLES: &[&str] = &["status_history", "sequences"];

pub fn migrate_all(db: &dyn SQLStore) -> Result<Vec<AppliedMigration>, ServiceError> {
    let mut applied = Vec::new();
    for set in MIGRATIONS {
        applied.extend(migrate::apply(db, set)?);
    }
    applied.extend(garment_auth::schema::migrate(db)?);
    Ok(applied)
}

/// Run every module's integrity checks.
pub fn integrity_report<E>(db: &E) -> Result<IntegrityReport, ServiceError>
where
    E: Executor + ?Sized,
{
    let mut findings = Vec::new();
    findings.extend(garment_inventory::integrity::check(db)?);
    findings.extend(garment_sales::integrity::check(db)?);
    findings.extend(garment_procurement::integrity::check(db)?);
    findings.extend(garment_manufacturing::integrity::check(db)?);
    findings.extend(garment_shipment::integrity::check(db)?);
    findings.extend(garment_finance::integrity::check(db)?);
    Ok(IntegrityReport::from_findings(findings))
}

/// Tables a reset empties, children before parents.
pub fn reset_tables(keep_master_data: bool) -> Vec<&'static str> {
    let mut tables: Vec<&'static str> = Vec::new();
    tables.extend(garment_finance::schema::TRANSACTIONAL_TABLES);
    tables.extend(garment_shipment::schema::TRANSACTIONAL_TABLES);
    tables.extend(garment_manufacturing::schema::TRANSACTIONAL_TABLES);
    tables.extend(garment_procurement::schema::TRANSACTIONAL_TABLES);
    tables.extend(garment_sales::schema::TRANSACTIONAL_TABLES);
    tables.extend(garment_inventory::schema::TRANSACTIONAL_TABLES);
    tables.extend(garment_auth::schema::TRANSACTIONAL_TABLES);
    tables.extend(SHARED_TABLES);
    if !keep_master_data {
        tables.extend(garment_procurement::schema::MASTER_TABLES);
        tables.extend(garment_sales::schema::MASTER_TABLES);
        tables.extend(garment_inventory::schema::MASTER_TABLES);
        tables.extend(garment_manufacturing::schema::MASTER_TABLES);
        tables.extend(garment_shipment::schema::MASTER_TABLES);
        tables.extend(garment_finance::schema::MASTER_TABLES);
        tables.extend(garment_auth::schema::MASTER_TABLES);
    }
    tables
}

/// Empty the database. Roles and schema versions survive.
pub fn reset(db: &dyn SQLStore, keep_master_data: bool) -> Result<u64, ServiceError> {
    reset::truncate(db, &reset_tables(keep_master_data))
}

#[cfg(test)]
mod tests {
    use super::*;
    use garment_sql::SqliteStore;
    use garment_store::table;

    #[test]
    fn fresh_store_is_clean() {
        let db = SqliteStore::open_in_memory().unwrap();
        let applied = migrate_all(&db).unwrap();
        assert!(applied.iter().any(|m| m.module == "auth"));
        assert!(applied.iter().any(|m| m.module == "finance"));
        assert!(integrity_report(&db).unwrap().is_clean());
    }

    #[test]
    fn reset_keeps_master_data_on_request() {
        let db = SqliteStore::open_in_memory().unwrap();
        migrate_all(&db).unwrap();
        db.exec_batch(
            "INSERT INTO customers (id, data, code, name) VALUES ('c1', '{}', 'C1', 'Alpine');
             INSERT INTO sales_orders (id, data, number, customer_id, status) VALUES ('s1', '{}', 'SO-1', 'c1', 'DRAFT');",
        )
        .unwrap();

        reset(&db, true).unwrap();
        assert_eq!(table::count(&db, garment_sales::schema::ORDERS, &[]).unwrap(), 0);
        assert_eq!(table::count(&db, garment_sales::schema::CUSTOMERS, &[]).unwrap(), 1);

        reset(&db, false).unwrap();
        assert_eq!(table::count(&db, garment_sales::schema::CUSTOMERS, &[]).unwrap(), 0);
        assert!(table::count(&db, garment_auth::schema::ROLES, &[]).unwrap() > 0);
    }
}
