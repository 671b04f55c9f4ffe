use std::collections::HashMap;

use garment_core::ServiceError;
use garment_store::integrity::orphan_findings;
use garment_store::{table, Executor, Finding};

use crate::model::{ProductionOrder, ProductionOrderStatus, ProductionStage};
use crate::schema::{MRNS, PRODUCTION_ORDERS, STAGES};

pub fn check<E>(db: &E) -> Result<Vec<Finding>, ServiceError>
where
    E: Executor + ?Sized,
{
    let mut findings = Vec::new();
    findings.extend(orphan_findings(db, "manufacturing.orphan_stage", STAGES, "production_order_id", PRODUCTION_ORDERS)?);
    findings.extend(orphan_findings(db, "manufacturing.orphan_mrn", MRNS, "production_order_id", PRODUCTION_ORDERS)?);
    findings.extend(orphan_findings(
        db,
        "manufacturing.orphan_production_order",
        PRODUCTION_ORDERS,
        "sales_order_id",
        garment_sales::schema::ORDERS,
    )?);

    let stages: Vec<ProductionStage> = table::select(db, STAGES, &[])?;
    let mut open: HashMap<&str, usize> = HashMap::new();
    for stage in stages.iter().filter(|s| !s.status.is_done()) {
        *open.entry(stage.production_order_id.as_str()).or_default() += 1;
    }
    let orders: Vec<ProductionOrder> = table::select(db, PRODUCTION_ORDERS, &[])?;
    for order in orders.iter().filter(|o| o.status == ProductionOrderStatus::Completed) {
        if let Some(n) = open.get(order.id.as_str()) {
            findings.push(Finding::error(
                "manufacturing.unfinished_stages",
                PRODUCTION_ORDERS,
                &order.id,
                format!("{} is COMPLETED with {n} stage(s) not completed or skipped", order.number),
            ));
        }
    }
    Ok(findings)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::documents;
    use crate::model::StageStatus;
    use crate::testing::Fixture;
    use rust_decimal_macros::dec;

    #[test]
    fn completed_order_with_open_stage() {
        let f = Fixture::new();
        let order = f.ready_order(None, dec!(12));
        f.run_all_stages(&order);
        assert!(check(f.db.as_ref()).unwrap().is_empty());

        let mut stage = documents::stages_of(f.db.as_ref(), &order.id).unwrap().remove(1);
        stage.status = StageStatus::InProgress;
        documents::save_stage(f.db.as_ref(), &stage).unwrap();

        let findings = check(f.db.as_ref()).unwrap();
        assert_eq!(findings.len(), 1);
        assert_eq!(findings[0].check, "manufacturing.unfinished_stages");
    }
}
