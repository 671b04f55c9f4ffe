use garment_core::ServiceError;
use garment_store::integrity::orphan_findings;
use garment_store::{table, Executor, Finding};

use crate::model::SalesOrder;
use crate::schema::{CUSTOMERS, ORDERS};

pub fn check<E>(db: &E) -> Result<Vec<Finding>, ServiceError>
where
    E: Executor + ?Sized,
{
    let mut findings = orphan_findings(db, "sales.orphan_order", ORDERS, "customer_id", CUSTOMERS)?;

    let orders: Vec<SalesOrder> = table::select(db, ORDERS, &[])?;
    for order in &orders {
        for line in order.lines.iter().filter(|l| l.shipped_quantity > l.quantity) {
            findings.push(Finding::error(
                "sales.over_shipped",
                ORDERS,
                &order.id,
                format!(
                    "{} line {}: shipped {} of {}",
                    order.number, line.line_no, line.shipped_quantity, line.quantity
                ),
            ));
        }
        if order.status.is_open() && order.lines.is_empty() {
            findings.push(Finding::warning(
                "sales.empty_order",
                ORDERS,
                &order.id,
                format!("{} is {} with no lines", order.number, order.status),
            ));
        }
    }
    Ok(findings)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::orders;
    use crate::testing::{draft_order, store};
    use rust_decimal_macros::dec;

    #[test]
    fn over_shipment_is_reported() {
        let db = store();
        let mut so = draft_order(&db, &[dec!(5)]);
        assert!(check(&db).unwrap().is_empty());

        so.lines[0].shipped_quantity = dec!(6);
        orders::save(&db, &so).unwrap();
        let findings = check(&db).unwrap();
        assert_eq!(findings.len(), 1);
        assert_eq!(findings[0].check, "sales.over_shipped");
    }
}
