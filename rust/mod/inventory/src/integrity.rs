use std::collections::BTreeMap;

use rust_decimal::Decimal;

use garment_core::{now_rfc3339, ServiceError};
use garment_store::integrity::orphan_findings;
use garment_store::{table, Executor, Finding, Value};

use crate::model::{BalanceFix, StockBalance, StockMovement};
use crate::schema::{BALANCES, ITEMS, MOVEMENTS};

/// Sum of movements per (item, location).
fn ledger_totals<E>(db: &E) -> Result<BTreeMap<(String, String), Decimal>, ServiceError>
where
    E: Executor + ?Sized,
{
    let movements: Vec<StockMovement> = table::select(db, MOVEMENTS, &[])?;
    let mut totals = BTreeMap::new();
    for m in movements {
        *totals.entry((m.item_id, m.location)).or_insert(Decimal::ZERO) += m.quantity;
    }
    Ok(totals)
}

/// Balances that disagree with the ledger, including ledger keys with no
/// balance row at all.
fn mismatches<E>(db: &E) -> Result<Vec<BalanceFix>, ServiceError>
where
    E: Executor + ?Sized,
{
    let mut totals = ledger_totals(db)?;
    let balances: Vec<StockBalance> = table::select(db, BALANCES, &[])?;

    let mut out = Vec::new();
    for b in balances {
        let ledger = totals
            .remove(&(b.item_id.clone(), b.location.clone()))
            .unwrap_or_default();
        if ledger != b.on_hand {
            out.push(BalanceFix {
                item_id: b.item_id,
                location: b.location,
                recorded: b.on_hand,
                ledger,
            });
        }
    }
    for ((item_id, location), ledger) in totals {
        if !ledger.is_zero() {
            out.push(BalanceFix { item_id, location, recorded: Decimal::ZERO, ledger });
        }
    }
    Ok(out)
}

pub fn check<E>(db: &E) -> Result<Vec<Finding>, ServiceError>
where
    E: Executor + ?Sized,
{
    let mut findings = Vec::new();

    let balances: Vec<StockBalance> = table::select(db, BALANCES, &[])?;
    for b in balances.iter().filter(|b| b.on_hand < Decimal::ZERO) {
        findings.push(Finding::error(
            "inventory.negative_balance",
            BALANCES,
            &format!("{}@{}", b.item_id, b.location),
            format!("on hand is {}", b.on_hand),
        ));
    }

    for fix in mismatches(db)? {
        findings.push(Finding::error(
            "inventory.balance_mismatch",
            BALANCES,
            &format!("{}@{}", fix.item_id, fix.location),
            format!("recorded {} but movements sum to {}", fix.recorded, fix.ledger),
        ));
    }

    findings.extend(orphan_findings(db, "inventory.orphan_movement", MOVEMENTS, "item_id", ITEMS)?);
    findings.extend(orphan_findings(db, "inventory.orphan_balance", BALANCES, "item_id", ITEMS)?);
    Ok(findings)
}

/// Overwrite drifted balances with their ledger totals.
pub fn recompute_balances<E>(db: &E) -> Result<Vec<BalanceFix>, ServiceError>
where
    E: Executor + ?Sized,
{
    let fixes = mismatches(db)?;
    for fix in &fixes {
        let id = format!("{}@{}", fix.item_id, fix.location);
        let balance = StockBalance {
            item_id: fix.item_id.clone(),
            location: fix.location.clone(),
            on_hand: fix.ledger,
            updated_at: now_rfc3339(),
        };
        if table::find::<_, StockBalance>(db, BALANCES, &id)?.is_some() {
            table::update(db, BALANCES, &id, &balance, &[])?;
        } else {
            table::insert(
                db,
                BALANCES,
                &id,
                &balance,
                &[
                    ("item_id", Value::Text(balance.item_id.clone())),
                    ("location", Value::Text(balance.location.clone())),
                ],
            )?;
        }
    }
    Ok(fixes)
}
