//! Load/save helpers shared by the services, plus the steps other
//! departments drive inside their own transactions.

use tracing::info;

use garment_core::{now_rfc3339, Principal, ServiceError};
use garment_store::{history, table, Executor, Value};

use crate::model::*;
use crate::schema::{GRNS, PURCHASE_ORDERS, VENDORS, VENDOR_REQUESTS};

pub fn get_vendor<E: Executor + ?Sized>(db: &E, id: &str) -> Result<Vendor, ServiceError> {
    table::get(db, VENDORS, id)
}

pub fn get_purchase_order<E: Executor + ?Sized>(db: &E, id: &str) -> Result<PurchaseOrder, ServiceError> {
    table::get(db, PURCHASE_ORDERS, id)
}

pub fn get_grn<E: Executor + ?Sized>(db: &E, id: &str) -> Result<GoodsReceiptNote, ServiceError> {
    table::get(db, GRNS, id)
}

pub fn get_vendor_request<E: Executor + ?Sized>(db: &E, id: &str) -> Result<VendorRequest, ServiceError> {
    table::get(db, VENDOR_REQUESTS, id)
}

/// An active vendor, optionally one that offers `service`.
pub fn require_vendor<E>(db: &E, id: &str, service: Option<VendorService>) -> Result<Vendor, ServiceError>
where
    E: Executor + ?Sized,
{
    let vendor = get_vendor(db, id)?;
    if !vendor.active {
        return Err(ServiceError::Validation(format!("vendor {} is inactive", vendor.code)));
    }
    if let Some(s) = service {
        if !vendor.offers(s) {
            return Err(ServiceError::Validation(format!("vendor {} does not offer {s}", vendor.code)));
        }
    }
    Ok(vendor)
}

pub(crate) fn save_purchase_order<E: Executor + ?Sized>(db: &E, po: &PurchaseOrder) -> Result<(), ServiceError> {
    table::update(
        db,
        PURCHASE_ORDERS,
        &po.id,
        po,
        &[
            ("status", Value::Text(po.status.to_string())),
            ("sales_order_id", Value::opt_text(po.sales_order_id.as_deref())),
        ],
    )
}

pub(crate) fn save_grn<E: Executor + ?Sized>(db: &E, grn: &GoodsReceiptNote) -> Result<(), ServiceError> {
    table::update(db, GRNS, &grn.id, grn, &[("status", Value::Text(grn.status.to_string()))])
}

pub(crate) fn save_vendor_request<E: Executor + ?Sized>(db: &E, req: &VendorRequest) -> Result<(), ServiceError> {
    table::update(db, VENDOR_REQUESTS, &req.id, req, &[("status", Value::Text(req.status.to_string()))])
}

pub(crate) fn move_purchase_order<E: Executor + ?Sized>(
    db: &E,
    po: &mut PurchaseOrder,
    next: PurchaseOrderStatus,
    actor: &Principal,
    note: Option<&str>,
) -> Result<(), ServiceError> {
    let from = history::advance(db, &po.id, &po.number, &mut po.status, next, actor, note)?;
    po.updated_at = now_rfc3339();
    save_purchase_order(db, po)?;
    info!(number = %po.number, from = %from, to = %next, "purchase order status changed");
    Ok(())
}

pub(crate) fn move_grn<E: Executor + ?Sized>(
    db: &E,
    grn: &mut GoodsReceiptNote,
    next: GrnStatus,
    actor: &Principal,
    note: Option<&str>,
) -> Result<(), ServiceError> {
    let from = history::advance(db, &grn.id, &grn.number, &mut grn.status, next, actor, note)?;
    grn.updated_at = now_rfc3339();
    save_grn(db, grn)?;
    info!(number = %grn.number, from = %from, to = %next, "GRN status changed");
    Ok(())
}

pub(crate) fn move_vendor_request<E: Executor + ?Sized>(
    db: &E,
    req: &mut VendorRequest,
    next: VendorRequestStatus,
    actor: &Principal,
    note: Option<&str>,
) -> Result<(), ServiceError> {
    let from = history::advance(db, &req.id, &req.number, &mut req.status, next, actor, note)?;
    req.updated_at = now_rfc3339();
    save_vendor_request(db, req)?;
    info!(number = %req.number, from = %from, to = %next, "vendor request status changed");
    Ok(())
}

/// Close a vendor request with a credit note. An OPEN request is
/// acknowledged on the way.
pub fn resolve_with_credit_note<E>(
    db: &E,
    request_id: &str,
    credit_note_id: &str,
    actor: &Principal,
) -> Result<VendorRequest, ServiceError>
where
    E: Executor + ?Sized,
{
    let mut req = get_vendor_request(db, request_id)?;
    if let Some(existing) = &req.credit_note_id {
        return Err(ServiceError::Conflict(format!(
            "vendor request {} already has credit note {existing}",
            req.number
        )));
    }
    if req.status == VendorRequestStatus::Open {
        move_vendor_request(db, &mut req, VendorRequestStatus::Acknowledged, actor, None)?;
    }
    req.resolution = Some(Resolution::CreditNote);
    req.credit_note_id = Some(credit_note_id.to_string());
    move_vendor_request(db, &mut req, VendorRequestStatus::Resolved, actor, Some("credit note"))?;
    Ok(req)
}
