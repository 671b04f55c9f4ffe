use std::collections::HashMap;

use rust_decimal::Decimal;

use garment_core::ServiceError;
use garment_store::integrity::orphan_findings;
use garment_store::{table, Executor, Finding};

use crate::model::{GoodsReceiptNote, GrnStatus, PurchaseOrder};
use crate::schema::{GRNS, PURCHASE_ORDERS, VENDORS, VENDOR_REQUESTS};

pub fn check<E>(db: &E) -> Result<Vec<Finding>, ServiceError>
where
    E: Executor + ?Sized,
{
    let mut findings = Vec::new();
    findings.extend(orphan_findings(db, "procurement.orphan_po", PURCHASE_ORDERS, "vendor_id", VENDORS)?);
    findings.extend(orphan_findings(db, "procurement.orphan_grn", GRNS, "purchase_order_id", PURCHASE_ORDERS)?);
    findings.extend(orphan_findings(db, "procurement.orphan_vendor_request", VENDOR_REQUESTS, "grn_id", GRNS)?);

    // Received quantity on each PO line must equal what approved GRNs accepted.
    let grns: Vec<GoodsReceiptNote> = table::select(db, GRNS, &[])?;
    let mut accepted: HashMap<(String, u32), Decimal> = HashMap::new();
    for grn in grns.iter().filter(|g| g.status == GrnStatus::Approved) {
        for line in &grn.lines {
            *accepted
                .entry((grn.purchase_order_id.clone(), line.po_line_no))
                .or_default() += line.accepted_quantity;
        }
    }

    let orders: Vec<PurchaseOrder> = table::select(db, PURCHASE_ORDERS, &[])?;
    for po in &orders {
        for line in &po.lines {
            let from_grns = accepted
                .get(&(po.id.clone(), line.line_no))
                .copied()
                .unwrap_or_default();
            if from_grns != line.received_quantity {
                findings.push(Finding::error(
                    "procurement.received_mismatch",
                    PURCHASE_ORDERS,
                    &po.id,
                    format!(
                        "{} line {}: received {} but approved GRNs accepted {}",
                        po.number, line.line_no, line.received_quantity, from_grns
                    ),
                ));
            }
        }
    }
    Ok(findings)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::documents;
    use crate::testing::Fixture;
    use rust_decimal_macros::dec;

    #[test]
    fn received_quantities_reconcile() {
        let f = Fixture::new();
        f.shortage_request(dec!(100), dec!(60));
        assert!(check(f.db.as_ref()).unwrap().is_empty());

        let mut po: PurchaseOrder = table::select(f.db.as_ref(), PURCHASE_ORDERS, &[]).unwrap().remove(0);
        po.lines[0].received_quantity = dec!(75);
        documents::save_purchase_order(f.db.as_ref(), &po).unwrap();

        let findings = check(f.db.as_ref()).unwrap();
        assert_eq!(findings.len(), 1);
        assert_eq!(findings[0].check, "procurement.received_mismatch");
    }
}
