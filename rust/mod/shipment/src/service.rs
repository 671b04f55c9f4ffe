use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use rust_decimal::Decimal;
use serde::Deserialize;
use tracing::info;

use garment_core::{
    ensure_not_blank, ensure_positive, new_id, now_rfc3339, ListParams, ListResult, Principal, ServiceError,
};
use garment_inventory::{ledger, MovementKind, Reference, MAIN_LOCATION};
use garment_sales::{orders, SalesOrderStatus};
use garment_sql::SQLStore;
use garment_store::{begin, commit, history, numbering, table, Executor, Value};

use crate::model::*;
use crate::schema::SHIPMENTS;

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ShipmentLineInput {
    pub so_line_no: u32,
    pub quantity: Decimal,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateShipment {
    pub sales_order_id: String,
    pub lines: Vec<ShipmentLineInput>,
    #[serde(default)]
    pub location: Option<String>,
    #[serde(default)]
    pub carrier: Option<String>,
    #[serde(default)]
    pub tracking_number: Option<String>,
    #[serde(default)]
    pub notes: Option<String>,
}

/// Carrier details, accepted when packing or dispatching.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CarrierInfo {
    #[serde(default)]
    pub carrier: Option<String>,
    #[serde(default)]
    pub tracking_number: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ShipmentFilters {
    pub status: Option<ShipmentStatus>,
    pub sales_order_id: Option<String>,
    pub customer_id: Option<String>,
}

pub struct ShipmentService {
    db: Arc<dyn SQLStore>,
}

impl ShipmentService {
    pub fn new(db: Arc<dyn SQLStore>) -> Self {
        Self { db }
    }

    /// Plan a shipment against a sales order that is ready to ship. Quantities
    /// may not exceed what is unshipped and not already on another pending
    /// shipment.
    pub fn create_shipment(&self, input: CreateShipment, actor: &Principal) -> Result<Shipment, ServiceError> {
        if input.lines.is_empty() {
            return Err(ServiceError::Validation("a shipment needs at least one line".into()));
        }
        let location = input.location.unwrap_or_else(|| MAIN_LOCATION.to_string());
        ensure_not_blank("location", &location)?;

        let tx = begin(self.db.as_ref())?;
        let so = orders::get_order(&*tx, &input.sales_order_id)?;
        if !matches!(so.status, SalesOrderStatus::ReadyToShip | SalesOrderStatus::PartiallyShipped) {
            return Err(ServiceError::InvalidState(format!(
                "sales order {} is {}; shipments need READY_TO_SHIP or PARTIALLY_SHIPPED",
                so.number, so.status
            )));
        }

        let reserved = pending_quantities(&*tx, &so.id)?;
        let mut seen = HashSet::new();
        let mut lines = Vec::with_capacity(input.lines.len());
        for l in &input.lines {
            ensure_positive("quantity", l.quantity)?;
            if !seen.insert(l.so_line_no) {
                return Err(ServiceError::Validation(format!("line {} appears twice", l.so_line_no)));
            }
            let so_line = so.line(l.so_line_no).ok_or_else(|| {
                ServiceError::Validation(format!("sales order {} has no line {}", so.number, l.so_line_no))
            })?;
            let available = so_line.unshipped() - reserved.get(&l.so_line_no).copied().unwrap_or_default();
            if l.quantity > available {
                return Err(ServiceError::Validation(format!(
                    "line {} of {}: shipping {} exceeds available {}",
                    l.so_line_no, so.number, l.quantity, available
                )));
            }
            lines.push(ShipmentLine {
                so_line_no: l.so_line_no,
                item_id: so_line.item_id.clone(),
                quantity: l.quantity,
            });
        }

        let now = now_rfc3339();
        let shipment = Shipment {
            id: new_id(),
            number: numbering::next_number(&*tx, "SHP")?,
            sales_order_id: so.id.clone(),
            customer_id: so.customer_id.clone(),
            lines,
            location,
            carrier: input.carrier,
            tracking_number: input.tracking_number,
            status: ShipmentStatus::Draft,
            notes: input.notes,
            cancel_reason: None,
            return_reason: None,
            shipped_at: None,
            delivered_at: None,
            created_by: actor.user_id.clone(),
            created_at: now.clone(),
            updated_at: now,
        };
        table::insert(
            &*tx,
            SHIPMENTS,
            &shipment.id,
            &shipment,
            &[
                ("number", Value::Text(shipment.number.clone())),
                ("sales_order_id", Value::Text(shipment.sales_order_id.clone())),
                ("customer_id", Value::Text(shipment.customer_id.clone())),
                ("status", Value::Text(shipment.status.to_string())),
            ],
        )?;
        history::record(&*tx, &shipment.id, None, shipment.status, actor, None)?;
        commit(tx)?;
        info!(number = %shipment.number, sales_order = %so.number, "shipment created");
        Ok(shipment)
    }

    pub fn get_shipment(&self, id: &str) -> Result<Shipment, ServiceError> {
        table::get(self.db.as_ref(), SHIPMENTS, id)
    }

    pub fn list_shipments(&self, filters: &ShipmentFilters, params: &ListParams) -> Result<ListResult<Shipment>, ServiceError> {
        let mut conds = Vec::new();
        if let Some(s) = filters.status {
            conds.push(("status", Value::Text(s.to_string())));
        }
        if let Some(so) = &filters.sales_order_id {
            conds.push(("sales_order_id", Value::Text(so.clone())));
        }
        if let Some(c) = &filters.customer_id {
            conds.push(("customer_id", Value::Text(c.clone())));
        }
        table::list(self.db.as_ref(), SHIPMENTS, &conds, &["number"], params)
    }

    pub fn pack(&self, id: &str, carrier: CarrierInfo, actor: &Principal) -> Result<Shipment, ServiceError> {
        let tx = begin(self.db.as_ref())?;
        let mut shipment: Shipment = table::get(&*tx, SHIPMENTS, id)?;
        apply_carrier(&mut shipment, carrier);
        move_shipment(&*tx, &mut shipment, ShipmentStatus::Packed, actor, None)?;
        commit(tx)?;
        Ok(shipment)
    }

    /// Goods leave the warehouse: issue stock and record the shipped
    /// quantities on the sales order.
    pub fn dispatch(&self, id: &str, carrier: CarrierInfo, actor: &Principal) -> Result<Shipment, ServiceError> {
        let tx = begin(self.db.as_ref())?;
        let mut shipment: Shipment = table::get(&*tx, SHIPMENTS, id)?;
        apply_carrier(&mut shipment, carrier);
        shipment.shipped_at = Some(now_rfc3339());
        move_shipment(&*tx, &mut shipment, ShipmentStatus::Dispatched, actor, None)?;

        let reference = Reference::new("shipment", &shipment.id, &shipment.number);
        for line in &shipment.lines {
            ledger::issue(
                &*tx,
                &line.item_id,
                &shipment.location,
                line.quantity,
                MovementKind::ShipmentOut,
                Some(reference.clone()),
                actor,
            )?;
        }
        let shipped: Vec<(u32, Decimal)> = shipment.lines.iter().map(|l| (l.so_line_no, l.quantity)).collect();
        let so = orders::record_shipped(&*tx, &shipment.sales_order_id, &shipped, actor)?;
        commit(tx)?;
        info!(number = %shipment.number, sales_order = %so.number, so_status = %so.status, "shipment dispatched");
        Ok(shipment)
    }

    pub fn mark_in_transit(&self, id: &str, actor: &Principal) -> Result<Shipment, ServiceError> {
        let tx = begin(self.db.as_ref())?;
        let mut shipment: Shipment = table::get(&*tx, SHIPMENTS, id)?;
        move_shipment(&*tx, &mut shipment, ShipmentStatus::InTransit, actor, None)?;
        commit(tx)?;
        Ok(shipment)
    }

    /// Proof of delivery. The sales order is DELIVERED once it is fully
    /// shipped and none of its remaining shipments is still on the way.
    pub fn deliver(&self, id: &str, actor: &Principal) -> Result<Shipment, ServiceError> {
        let tx = begin(self.db.as_ref())?;
        let mut shipment: Shipment = table::get(&*tx, SHIPMENTS, id)?;
        shipment.delivered_at = Some(now_rfc3339());
        move_shipment(&*tx, &mut shipment, ShipmentStatus::Delivered, actor, None)?;
        deliver_sales_order_if_done(&*tx, &shipment.sales_order_id, actor)?;
        commit(tx)?;
        Ok(shipment)
    }

    /// The carrier brought the goods back. They are booked into stock again
    /// at the shipping location.
    pub fn return_shipment(&self, id: &str, reason: &str, actor: &Principal) -> Result<Shipment, ServiceError> {
        ensure_not_blank("reason", reason)?;
        let tx = begin(self.db.as_ref())?;
        let mut shipment: Shipment = table::get(&*tx, SHIPMENTS, id)?;
        shipment.return_reason = Some(reason.to_string());
        move_shipment(&*tx, &mut shipment, ShipmentStatus::Returned, actor, Some(reason))?;

        let reference = Reference::new("shipment", &shipment.id, &shipment.number);
        for line in &shipment.lines {
            ledger::receive(
                &*tx,
                &line.item_id,
                &shipment.location,
                line.quantity,
                MovementKind::Return,
                Some(reference.clone()),
                actor,
            )?;
        }
        deliver_sales_order_if_done(&*tx, &shipment.sales_order_id, actor)?;
        commit(tx)?;
        info!(number = %shipment.number, reason, "shipment returned to stock");
        Ok(shipment)
    }

    pub fn cancel(&self, id: &str, reason: &str, actor: &Principal) -> Result<Shipment, ServiceError> {
        ensure_not_blank("reason", reason)?;
        let tx = begin(self.db.as_ref())?;
        let mut shipment: Shipment = table::get(&*tx, SHIPMENTS, id)?;
        shipment.cancel_reason = Some(reason.to_string());
        move_shipment(&*tx, &mut shipment, ShipmentStatus::Cancelled, actor, Some(reason))?;
        commit(tx)?;
        Ok(shipment)
    }

    pub fn summary(&self) -> Result<ShipmentSummary, ServiceError> {
        let db = self.db.as_ref();
        let count = |s: ShipmentStatus| table::count(db, SHIPMENTS, &[("status", Value::Text(s.to_string()))]);
        Ok(ShipmentSummary {
            by_status: table::count_by(db, SHIPMENTS, "status")?,
            awaiting_dispatch: count(ShipmentStatus::Draft)? + count(ShipmentStatus::Packed)?,
            in_transit: count(ShipmentStatus::Dispatched)? + count(ShipmentStatus::InTransit)?,
        })
    }
}

fn apply_carrier(shipment: &mut Shipment, info: CarrierInfo) {
    if info.carrier.is_some() {
        shipment.carrier = info.carrier;
    }
    if info.tracking_number.is_some() {
        shipment.tracking_number = info.tracking_number;
    }
}

/// A fully shipped order is DELIVERED once every shipment that wasn't
/// cancelled or returned has arrived, and at least one did.
fn deliver_sales_order_if_done<E>(db: &E, sales_order_id: &str, actor: &Principal) -> Result<(), ServiceError>
where
    E: Executor + ?Sized,
{
    let so = orders::get_order(db, sales_order_id)?;
    if so.status != SalesOrderStatus::Shipped {
        return Ok(());
    }
    let siblings: Vec<Shipment> =
        table::select(db, SHIPMENTS, &[("sales_order_id", Value::Text(so.id.clone()))])?;
    let mut live = siblings
        .iter()
        .filter(|s| !matches!(s.status, ShipmentStatus::Cancelled | ShipmentStatus::Returned))
        .peekable();
    if live.peek().is_some() && live.all(|s| s.status == ShipmentStatus::Delivered) {
        orders::record_delivered(db, &so.id, actor)?;
        info!(sales_order = %so.number, "sales order delivered");
    }
    Ok(())
}

/// Quantities per sales-order line on shipments not yet dispatched.
fn pending_quantities<E>(db: &E, sales_order_id: &str) -> Result<HashMap<u32, Decimal>, ServiceError>
where
    E: Executor + ?Sized,
{
    let shipments: Vec<Shipment> =
        table::select(db, SHIPMENTS, &[("sales_order_id", Value::Text(sales_order_id.to_string()))])?;
    let mut reserved: HashMap<u32, Decimal> = HashMap::new();
    for line in shipments.iter().filter(|s| s.status.is_pending()).flat_map(|s| &s.lines) {
        *reserved.entry(line.so_line_no).or_default() += line.quantity;
    }
    Ok(reserved)
}

fn move_shipment<E: Executor + ?Sized>(
    db: &E,
    shipment: &mut Shipment,
    next: ShipmentStatus,
    actor: &Principal,
    note: Option<&str>,
) -> Result<(), ServiceError> {
    let from = history::advance(db, &shipment.id, &shipment.number, &mut shipment.status, next, actor, note)?;
    shipment.updated_at = now_rfc3339();
    table::update(db, SHIPMENTS, &shipment.id, shipment, &[("status", Value::Text(shipment.status.to_string()))])?;
    info!(number = %shipment.number, from = %from, to = %next, "shipment status changed");
    Ok(())
}
