//! Sales-order steps driven by other departments.
//!
//! Manufacturing and shipment call these with their own transaction so the
//! order's status moves together with the production or shipment document
//! that caused it.

use rust_decimal::Decimal;
use tracing::info;

use garment_core::{Principal, ServiceError};
use garment_store::{history, table, Executor, Value};

use crate::model::{SalesOrder, SalesOrderStatus};
use crate::schema::ORDERS;

pub fn get_order<E>(db: &E, id: &str) -> Result<SalesOrder, ServiceError>
where
    E: Executor + ?Sized,
{
    table::get(db, ORDERS, id)
}

/// Persist `order` after moving it to `next`, with a history row.
pub(crate) fn save_transition<E>(
    db: &E,
    order: &mut SalesOrder,
    next: SalesOrderStatus,
    actor: &Principal,
    note: Option<&str>,
) -> Result<(), ServiceError>
where
    E: Executor + ?Sized,
{
    let from = history::advance(db, &order.id, &order.number, &mut order.status, next, actor, note)?;
    order.updated_at = garment_core::now_rfc3339();
    save(db, order)?;
    info!(number = %order.number, from = %from, to = %next, "sales order status changed");
    Ok(())
}

pub(crate) fn save<E>(db: &E, order: &SalesOrder) -> Result<(), ServiceError>
where
    E: Executor + ?Sized,
{
    table::update(
        db,
        ORDERS,
        &order.id,
        order,
        &[("status", Value::Text(order.status.to_string()))],
    )
}

/// First production activity on the order. Repeated calls are no-ops.
pub fn mark_in_production<E>(db: &E, id: &str, actor: &Principal) -> Result<SalesOrder, ServiceError>
where
    E: Executor + ?Sized,
{
    let mut order = get_order(db, id)?;
    if order.status != SalesOrderStatus::InProduction {
        save_transition(db, &mut order, SalesOrderStatus::InProduction, actor, None)?;
    }
    Ok(order)
}

/// All goods for the order are available. Repeated calls are no-ops.
pub fn mark_ready_to_ship<E>(db: &E, id: &str, actor: &Principal) -> Result<SalesOrder, ServiceError>
where
    E: Executor + ?Sized,
{
    let mut order = get_order(db, id)?;
    if order.status != SalesOrderStatus::ReadyToShip {
        save_transition(db, &mut order, SalesOrderStatus::ReadyToShip, actor, None)?;
    }
    Ok(order)
}

/// Add dispatched quantities to the order lines and move the order to
/// PARTIALLY_SHIPPED or SHIPPED.
pub fn record_shipped<E>(
    db: &E,
    id: &str,
    shipped: &[(u32, Decimal)],
    actor: &Principal,
) -> Result<SalesOrder, ServiceError>
where
    E: Executor + ?Sized,
{
    let mut order = get_order(db, id)?;
    if !matches!(
        order.status,
        SalesOrderStatus::ReadyToShip | SalesOrderStatus::PartiallyShipped
    ) {
        return Err(ServiceError::InvalidState(format!(
            "sales order {} is {} and cannot ship",
            order.number, order.status
        )));
    }

    for (line_no, qty) in shipped {
        let line = order
            .lines
            .iter_mut()
            .find(|l| l.line_no == *line_no)
            .ok_or_else(|| {
                ServiceError::Validation(format!("sales order {} has no line {line_no}", order.number))
            })?;
        if line.shipped_quantity + *qty > line.quantity {
            return Err(ServiceError::Validation(format!(
                "line {line_no} of {}: shipping {qty} exceeds unshipped {}",
                order.number,
                line.unshipped()
            )));
        }
        line.shipped_quantity += *qty;
    }

    let next = if order.fully_shipped() {
        SalesOrderStatus::Shipped
    } else {
        SalesOrderStatus::PartiallyShipped
    };
    if next == order.status {
        save(db, &order)?;
    } else {
        save_transition(db, &mut order, next, actor, None)?;
    }
    Ok(order)
}

pub fn record_delivered<E>(db: &E, id: &str, actor: &Principal) -> Result<SalesOrder, ServiceError>
where
    E: Executor + ?Sized,
{
    let mut order = get_order(db, id)?;
    save_transition(db, &mut order, SalesOrderStatus::Delivered, actor, None)?;
    Ok(order)
}
