//! Schema, integrity and reset commands. They work on the database file
//! directly; stop `garmentd` before a reset.

use anyhow::Result;
use tracing::info;

use garment_inventory::InventoryService;
use garment_sql::SQLStore;
use garment_store::{migrate, IntegrityReport, Severity};
use garmentd::registry;

pub fn migrate(db: &dyn SQLStore) -> Result<()> {
    let newly = registry::migrate_all(db)?;
    info!(applied = newly.len(), "migrations run");
    if newly.is_empty() {
        println!("Schema is up to date.");
    }
    for m in &newly {
        println!("applied {}/{} {}", m.module, m.version, m.name);
    }
    println!();
    println!("{:16} {:8} {:40} APPLIED", "MODULE", "VERSION", "NAME");
    for m in migrate::applied(db)? {
        println!("{:16} {:<8} {:40} {}", m.module, m.version, m.name, m.applied_at);
    }
    Ok(())
}

/// Print the integrity report. With `fix`, balances are first rewritten
/// from the movement ledger. Returns the report after any fix.
pub fn check(db: std::sync::Arc<dyn SQLStore>, fix: bool, json: bool) -> Result<IntegrityReport> {
    if fix {
        let fixes = InventoryService::new(db.clone()).recompute_balances()?;
        info!(fixed = fixes.len(), "stock balances recomputed from ledger");
        for f in &fixes {
            println!("fixed {}@{}: {} -> {}", f.item_id, f.location, f.recorded, f.ledger);
        }
        if fixes.is_empty() {
            println!("No balances needed fixing.");
        }
    }

    let report = registry::integrity_report(db.as_ref())?;
    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
        return Ok(report);
    }
    for f in &report.findings {
        let level = match f.severity {
            Severity::Error => "ERROR",
            Severity::Warning => "WARN ",
        };
        println!("{level} {:32} {}/{}: {}", f.check, f.entity, f.entity_id, f.message);
    }
    println!("{} error(s), {} warning(s)", report.errors, report.warnings);
    Ok(report)
}

pub fn reset(db: &dyn SQLStore, keep_master_data: bool) -> Result<u64> {
    let removed = registry::reset(db, keep_master_data)?;
    info!(removed, keep_master_data, "database reset");
    println!(
        "Removed {removed} row(s){}.",
        if keep_master_data { ", master data kept" } else { "" }
    );
    Ok(removed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use garment_core::Principal;
    use garment_inventory::service::{AdjustStock, CreateItem};
    use garment_inventory::{ItemCategory, MAIN_LOCATION};
    use garment_sql::SqliteStore;
    use rust_decimal::Decimal;

    #[test]
    fn check_fix_repairs_drifted_balances() {
        let db = SqliteStore::open_in_memory().unwrap();
        registry::migrate_all(&db).unwrap();
        let db: Arc<dyn SQLStore> = Arc::new(db);

        let inventory = InventoryService::new(db.clone());
        let item = inventory
            .create_item(CreateItem {
                code: "FAB-TWILL".into(),
                name: "Cotton twill".into(),
                category: ItemCategory::Fabric,
                uom: "m".into(),
                reorder_level: Decimal::ZERO,
                attributes: serde_json::Value::Null,
            })
            .unwrap();
        inventory
            .adjust(
                AdjustStock {
                    item_id: item.id.clone(),
                    location: MAIN_LOCATION.into(),
                    quantity: Decimal::new(5, 0),
                    note: "opening stock".into(),
                },
                &Principal::system(),
            )
            .unwrap();
        db.exec("UPDATE stock_balances SET data = json_set(data, '$.onHand', '99')", &[]).unwrap();

        let before = check(db.clone(), false, false).unwrap();
        assert!(before.findings.iter().any(|f| f.check == "inventory.balance_mismatch"));
        let after = check(db, true, false).unwrap();
        assert!(after.is_clean());
    }
}
