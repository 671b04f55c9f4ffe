use rust_decimal::Decimal;

use garment_core::ServiceError;
use garment_inventory::{ledger, MovementKind};
use garment_store::integrity::orphan_findings;
use garment_store::{table, Executor, Finding};

use crate::model::Shipment;
use crate::schema::SHIPMENTS;

pub fn check<E>(db: &E) -> Result<Vec<Finding>, ServiceError>
where
    E: Executor + ?Sized,
{
    let mut findings = orphan_findings(
        db,
        "shipment.orphan_shipment",
        SHIPMENTS,
        "sales_order_id",
        garment_sales::schema::ORDERS,
    )?;

    // Every shipment that left the warehouse must have issued exactly its quantity.
    let shipments: Vec<Shipment> = table::select(db, SHIPMENTS, &[])?;
    for shipment in shipments.iter().filter(|s| s.status.has_left()) {
        let issued: Decimal = ledger::movements_for(db, &shipment.id)?
            .iter()
            .filter(|m| m.kind == MovementKind::ShipmentOut)
            .map(|m| -m.quantity)
            .sum();
        if issued != shipment.total_quantity() {
            findings.push(Finding::error(
                "shipment.missing_movements",
                SHIPMENTS,
                &shipment.id,
                format!(
                    "{} shipped {} but stock movements issued {}",
                    shipment.number,
                    shipment.total_quantity(),
                    issued
                ),
            ));
        }
    }
    Ok(findings)
}
