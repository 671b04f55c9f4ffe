//! Load/save helpers and the status moves every manufacturing workflow shares.

use tracing::info;

use garment_core::{now_rfc3339, Principal, ServiceError};
use garment_store::{history, table, Executor, Value};

use crate::model::*;
use crate::schema::{MRNS, PRODUCTION_ORDERS, STAGES};

pub fn get_order<E: Executor + ?Sized>(db: &E, id: &str) -> Result<ProductionOrder, ServiceError> {
    table::get(db, PRODUCTION_ORDERS, id)
}

pub fn get_stage<E: Executor + ?Sized>(db: &E, id: &str) -> Result<ProductionStage, ServiceError> {
    table::get(db, STAGES, id)
}

pub fn get_mrn<E: Executor + ?Sized>(db: &E, id: &str) -> Result<MaterialRequest, ServiceError> {
    table::get(db, MRNS, id)
}

/// Stages of an order in sequence.
pub fn stages_of<E: Executor + ?Sized>(db: &E, order_id: &str) -> Result<Vec<ProductionStage>, ServiceError> {
    let mut stages: Vec<ProductionStage> =
        table::select(db, STAGES, &[("production_order_id", Value::Text(order_id.to_string()))])?;
    stages.sort_by_key(|s| s.sequence);
    Ok(stages)
}

/// Every production order raised for a sales order.
pub fn orders_for_sales_order<E>(db: &E, sales_order_id: &str) -> Result<Vec<ProductionOrder>, ServiceError>
where
    E: Executor + ?Sized,
{
    table::select(db, PRODUCTION_ORDERS, &[("sales_order_id", Value::Text(sales_order_id.to_string()))])
}

pub(crate) fn save_order<E: Executor + ?Sized>(db: &E, order: &ProductionOrder) -> Result<(), ServiceError> {
    table::update(db, PRODUCTION_ORDERS, &order.id, order, &[("status", Value::Text(order.status.to_string()))])
}

pub(crate) fn save_stage<E: Executor + ?Sized>(db: &E, stage: &ProductionStage) -> Result<(), ServiceError> {
    table::update(
        db,
        STAGES,
        &stage.id,
        stage,
        &[
            ("status", Value::Text(stage.status.to_string())),
            ("vendor_id", Value::opt_text(stage.vendor_id.as_deref())),
        ],
    )
}

pub(crate) fn save_mrn<E: Executor + ?Sized>(db: &E, mrn: &MaterialRequest) -> Result<(), ServiceError> {
    table::update(db, MRNS, &mrn.id, mrn, &[("status", Value::Text(mrn.status.to_string()))])
}

pub(crate) fn move_order<E: Executor + ?Sized>(
    db: &E,
    order: &mut ProductionOrder,
    next: ProductionOrderStatus,
    actor: &Principal,
    note: Option<&str>,
) -> Result<(), ServiceError> {
    let from = history::advance(db, &order.id, &order.number, &mut order.status, next, actor, note)?;
    order.updated_at = now_rfc3339();
    save_order(db, order)?;
    info!(number = %order.number, from = %from, to = %next, "production order status changed");
    Ok(())
}

pub(crate) fn move_stage<E: Executor + ?Sized>(
    db: &E,
    stage: &mut ProductionStage,
    order_number: &str,
    next: StageStatus,
    actor: &Principal,
    note: Option<&str>,
) -> Result<(), ServiceError> {
    let label = stage.label(order_number);
    let from = history::advance(db, &stage.id, &label, &mut stage.status, next, actor, note)?;
    stage.updated_at = now_rfc3339();
    save_stage(db, stage)?;
    info!(stage = %label, from = %from, to = %next, "production stage status changed");
    Ok(())
}

pub(crate) fn move_mrn<E: Executor + ?Sized>(
    db: &E,
    mrn: &mut MaterialRequest,
    next: MrnStatus,
    actor: &Principal,
    note: Option<&str>,
) -> Result<(), ServiceError> {
    let from = history::advance(db, &mrn.id, &mrn.number, &mut mrn.status, next, actor, note)?;
    mrn.updated_at = now_rfc3339();
    save_mrn(db, mrn)?;
    info!(number = %mrn.number, from = %from, to = %next, "material request status changed");
    Ok(())
}
