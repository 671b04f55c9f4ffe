use rust_decimal::Decimal;
use serde::Deserialize;
use tracing::info;

use garment_core::{ensure_non_negative, now_rfc3339, Principal, ServiceError};
use garment_inventory::{ledger, MovementKind, Reference, MAIN_LOCATION};
use garment_store::{begin, commit, Executor};

use super::production::{sales_order_produced, sales_order_started};
use super::ManufacturingService;
use crate::documents::{self, move_order, move_stage, save_order};
use crate::model::*;

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StageOutput {
    pub completed_quantity: Decimal,
    #[serde(default)]
    pub rejected_quantity: Decimal,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OutsourceStage {
    pub vendor_id: String,
    #[serde(default)]
    pub note: Option<String>,
}

impl ManufacturingService {
    pub fn list_stages(&self, order_id: &str) -> Result<Vec<ProductionStage>, ServiceError> {
        let order = documents::get_order(self.db.as_ref(), order_id)?;
        documents::stages_of(self.db.as_ref(), &order.id)
    }

    pub fn start_stage(&self, stage_id: &str, actor: &Principal) -> Result<ProductionStage, ServiceError> {
        let tx = begin(self.db.as_ref())?;
        let stage = open_stage(&*tx, stage_id, StageStatus::InProgress, actor, None)?;
        commit(tx)?;
        Ok(stage)
    }

    /// Hand a pending stage to an outside vendor (embroidery, washing, ...).
    pub fn outsource_stage(
        &self,
        stage_id: &str,
        input: OutsourceStage,
        actor: &Principal,
    ) -> Result<ProductionStage, ServiceError> {
        let tx = begin(self.db.as_ref())?;
        let vendor = garment_procurement::documents::require_vendor(&*tx, &input.vendor_id, None)?;
        let stage = open_stage(&*tx, stage_id, StageStatus::Outsourced, actor, Some((vendor.id, input.note)))?;
        commit(tx)?;
        info!(stage_id = %stage.id, vendor = %vendor.code, "stage outsourced");
        Ok(stage)
    }

    pub fn complete_stage(
        &self,
        stage_id: &str,
        output: StageOutput,
        actor: &Principal,
    ) -> Result<ProductionStage, ServiceError> {
        let tx = begin(self.db.as_ref())?;
        let stage = close_stage(&*tx, stage_id, StageStatus::InProgress, output, actor)?;
        commit(tx)?;
        Ok(stage)
    }

    /// Goods are back from the outside vendor.
    pub fn return_outsourced_stage(
        &self,
        stage_id: &str,
        output: StageOutput,
        actor: &Principal,
    ) -> Result<ProductionStage, ServiceError> {
        let tx = begin(self.db.as_ref())?;
        let stage = close_stage(&*tx, stage_id, StageStatus::Outsourced, output, actor)?;
        commit(tx)?;
        Ok(stage)
    }

    pub fn skip_stage(&self, stage_id: &str, reason: Option<String>, actor: &Principal) -> Result<ProductionStage, ServiceError> {
        let tx = begin(self.db.as_ref())?;
        let mut stage = documents::get_stage(&*tx, stage_id)?;
        let mut order = documents::get_order(&*tx, &stage.production_order_id)?;
        ensure_workable(&order)?;
        stage.completed_at = Some(now_rfc3339());
        move_stage(&*tx, &mut stage, &order.number, StageStatus::Skipped, actor, reason.as_deref())?;
        finish_if_done(&*tx, &mut order, actor)?;
        commit(tx)?;
        Ok(stage)
    }
}

fn ensure_workable(order: &ProductionOrder) -> Result<(), ServiceError> {
    if !order.status.allows_stage_work() {
        return Err(ServiceError::InvalidState(format!(
            "production order {} is {}; stages can only be worked while MATERIAL_READY or IN_PRODUCTION",
            order.number, order.status
        )));
    }
    Ok(())
}

/// Start a stage in-house or at a vendor. Earlier stages must be finished;
/// the input is what the previous performed stage completed.
fn open_stage<E>(
    db: &E,
    stage_id: &str,
    next: StageStatus,
    actor: &Principal,
    outsource: Option<(String, Option<String>)>,
) -> Result<ProductionStage, ServiceError>
where
    E: Executor + ?Sized,
{
    let mut stage = documents::get_stage(db, stage_id)?;
    let mut order = documents::get_order(db, &stage.production_order_id)?;
    ensure_workable(&order)?;

    let stages = documents::stages_of(db, &order.id)?;
    let earlier: Vec<&ProductionStage> = stages.iter().filter(|s| s.sequence < stage.sequence).collect();
    if let Some(open) = earlier.iter().find(|s| !s.status.is_done()) {
        return Err(ServiceError::InvalidState(format!(
            "{} is {}; earlier stages must be completed or skipped first",
            open.label(&order.number),
            open.status
        )));
    }
    stage.input_quantity = earlier
        .iter()
        .rev()
        .find(|s| s.status == StageStatus::Completed)
        .map(|s| s.completed_quantity)
        .unwrap_or(order.quantity);
    stage.started_at = Some(now_rfc3339());
    if let Some((vendor_id, note)) = outsource {
        stage.vendor_id = Some(vendor_id);
        stage.outsource_note = note;
    }
    move_stage(db, &mut stage, &order.number, next, actor, None)?;

    if order.status == ProductionOrderStatus::MaterialReady {
        move_order(db, &mut order, ProductionOrderStatus::InProduction, actor, Some(&stage.name))?;
        if let Some(so_id) = &order.sales_order_id {
            sales_order_started(db, so_id, actor)?;
        }
    }
    Ok(stage)
}

fn close_stage<E>(
    db: &E,
    stage_id: &str,
    expected: StageStatus,
    output: StageOutput,
    actor: &Principal,
) -> Result<ProductionStage, ServiceError>
where
    E: Executor + ?Sized,
{
    let mut stage = documents::get_stage(db, stage_id)?;
    let mut order = documents::get_order(db, &stage.production_order_id)?;
    ensure_workable(&order)?;
    if stage.status != expected {
        return Err(ServiceError::InvalidState(format!(
            "{} is {}, expected {expected}",
            stage.label(&order.number),
            stage.status
        )));
    }
    ensure_non_negative("completedQuantity", output.completed_quantity)?;
    ensure_non_negative("rejectedQuantity", output.rejected_quantity)?;
    if output.completed_quantity + output.rejected_quantity != stage.input_quantity {
        return Err(ServiceError::Validation(format!(
            "{}: completed {} + rejected {} must equal input {}",
            stage.label(&order.number),
            output.completed_quantity,
            output.rejected_quantity,
            stage.input_quantity
        )));
    }

    stage.completed_quantity = output.completed_quantity;
    stage.rejected_quantity = output.rejected_quantity;
    stage.completed_at = Some(now_rfc3339());
    move_stage(db, &mut stage, &order.number, StageStatus::Completed, actor, None)?;

    order.rejected_quantity += output.rejected_quantity;
    finish_if_done(db, &mut order, actor)?;
    Ok(stage)
}

/// Complete the order once every stage is done: book the output into stock
/// and release the sales order when it was the last one outstanding.
fn finish_if_done<E>(db: &E, order: &mut ProductionOrder, actor: &Principal) -> Result<(), ServiceError>
where
    E: Executor + ?Sized,
{
    let stages = documents::stages_of(db, &order.id)?;
    if !stages.iter().all(|s| s.status.is_done()) {
        order.updated_at = now_rfc3339();
        return save_order(db, order);
    }
    let last = stages
        .iter()
        .rev()
        .find(|s| s.status == StageStatus::Completed)
        .ok_or_else(|| {
            ServiceError::Validation(format!(
                "production order {}: at least one stage must be performed",
                order.number
            ))
        })?;
    order.produced_quantity = last.completed_quantity;
    move_order(db, order, ProductionOrderStatus::Completed, actor, None)?;

    if order.produced_quantity > Decimal::ZERO {
        ledger::receive(
            db,
            &order.product_item_id,
            MAIN_LOCATION,
            order.produced_quantity,
            MovementKind::ProductionOutput,
            Some(Reference::new("production_order", &order.id, &order.number)),
            actor,
        )?;
    }
    info!(number = %order.number, produced = %order.produced_quantity, rejected = %order.rejected_quantity, "production order completed");

    if let Some(so_id) = &order.sales_order_id {
        sales_order_produced(db, so_id, actor)?;
    }
    Ok(())
}
