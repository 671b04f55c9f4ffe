use std::collections::HashSet;

use rust_decimal::Decimal;
use serde::Deserialize;
use tracing::info;

use garment_core::{
    ensure_non_negative, ensure_not_blank, new_id, now_rfc3339, Lifecycle, ListParams, ListResult, Principal,
    ServiceError,
};
use garment_inventory::{ledger, MovementKind, Reference, MAIN_LOCATION};
use garment_store::{begin, commit, history, numbering, table, Executor, Value};

use super::ProcurementService;
use crate::documents::{self, move_grn, move_purchase_order, move_vendor_request, save_grn, save_purchase_order};
use crate::model::*;
use crate::schema::{GRNS, VENDOR_REQUESTS};

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GrnLineInput {
    pub po_line_no: u32,
    pub received_quantity: Decimal,
    #[serde(default)]
    pub remarks: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateGrn {
    pub purchase_order_id: String,
    #[serde(default)]
    pub location: Option<String>,
    pub lines: Vec<GrnLineInput>,
    #[serde(default)]
    pub remarks: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GrnFilters {
    pub status: Option<GrnStatus>,
    pub purchase_order_id: Option<String>,
}

impl ProcurementService {
    /// Start a receipt against a PO that is out with the vendor.
    pub fn create_grn(&self, input: CreateGrn, actor: &Principal) -> Result<GoodsReceiptNote, ServiceError> {
        let tx = begin(self.db.as_ref())?;
        let po = documents::get_purchase_order(&*tx, &input.purchase_order_id)?;
        if !matches!(po.status, PurchaseOrderStatus::Sent | PurchaseOrderStatus::PartiallyReceived) {
            return Err(ServiceError::InvalidState(format!(
                "purchase order {} is {}; goods can only be received against SENT or PARTIALLY_RECEIVED orders",
                po.number, po.status
            )));
        }
        let lines = build_lines(&po, &input.lines)?;
        let location = input.location.unwrap_or_else(|| MAIN_LOCATION.to_string());
        ensure_not_blank("location", &location)?;

        let now = now_rfc3339();
        let grn = GoodsReceiptNote {
            id: new_id(),
            number: numbering::next_number(&*tx, "GRN")?,
            purchase_order_id: po.id.clone(),
            vendor_id: po.vendor_id.clone(),
            location,
            lines,
            overage_decision: None,
            status: GrnStatus::Draft,
            remarks: input.remarks,
            received_by: None,
            verified_by: None,
            approved_by: None,
            rejection_reason: None,
            created_by: actor.user_id.clone(),
            created_at: now.clone(),
            updated_at: now,
        };
        table::insert(
            &*tx,
            GRNS,
            &grn.id,
            &grn,
            &[
                ("number", Value::Text(grn.number.clone())),
                ("purchase_order_id", Value::Text(grn.purchase_order_id.clone())),
                ("vendor_id", Value::Text(grn.vendor_id.clone())),
                ("status", Value::Text(grn.status.to_string())),
            ],
        )?;
        history::record(&*tx, &grn.id, None, grn.status, actor, None)?;
        commit(tx)?;
        info!(number = %grn.number, po = %po.number, "GRN created");
        Ok(grn)
    }

    pub fn get_grn(&self, id: &str) -> Result<GoodsReceiptNote, ServiceError> {
        documents::get_grn(self.db.as_ref(), id)
    }

    pub fn list_grns(&self, filters: &GrnFilters, params: &ListParams) -> Result<ListResult<GoodsReceiptNote>, ServiceError> {
        let mut conds = Vec::new();
        if let Some(s) = filters.status {
            conds.push(("status", Value::Text(s.to_string())));
        }
        if let Some(po) = &filters.purchase_order_id {
            conds.push(("purchase_order_id", Value::Text(po.clone())));
        }
        table::list(self.db.as_ref(), GRNS, &conds, &["number"], params)
    }

    /// Replace the counted lines of a DRAFT receipt.
    pub fn update_grn_lines(&self, id: &str, lines: Vec<GrnLineInput>) -> Result<GoodsReceiptNote, ServiceError> {
        let tx = begin(self.db.as_ref())?;
        let mut grn = documents::get_grn(&*tx, id)?;
        if grn.status != GrnStatus::Draft {
            return Err(ServiceError::InvalidState(format!(
                "GRN {} is {}; received quantities are frozen",
                grn.number, grn.status
            )));
        }
        let po = documents::get_purchase_order(&*tx, &grn.purchase_order_id)?;
        grn.lines = build_lines(&po, &lines)?;
        grn.updated_at = now_rfc3339();
        save_grn(&*tx, &grn)?;
        commit(tx)?;
        Ok(grn)
    }

    /// DRAFT → RECEIVED: the counted quantities are final.
    pub fn receive_grn(&self, id: &str, actor: &Principal) -> Result<GoodsReceiptNote, ServiceError> {
        let tx = begin(self.db.as_ref())?;
        let mut grn = documents::get_grn(&*tx, id)?;
        grn.received_by = Some(actor.user_id.clone());
        move_grn(&*tx, &mut grn, GrnStatus::Received, actor, None)?;
        commit(tx)?;
        Ok(grn)
    }

    /// RECEIVED → VERIFIED: compare against what the PO still expects.
    pub fn verify_grn(&self, id: &str, actor: &Principal) -> Result<GoodsReceiptNote, ServiceError> {
        let tx = begin(self.db.as_ref())?;
        let mut grn = documents::get_grn(&*tx, id)?;
        let po = documents::get_purchase_order(&*tx, &grn.purchase_order_id)?;
        reconcile(&mut grn, &po)?;
        grn.verified_by = Some(actor.user_id.clone());
        move_grn(&*tx, &mut grn, GrnStatus::Verified, actor, None)?;
        commit(tx)?;
        Ok(grn)
    }

    /// VERIFIED → APPROVED. Receives accepted stock, updates the PO and
    /// opens vendor requests for shortages and returned excess, all in one
    /// transaction.
    ///
    /// Expectations are recomputed here as well, so two receipts against the
    /// same PO can't both claim the same outstanding quantity.
    pub fn approve_grn(
        &self,
        id: &str,
        decision: Option<OverageDecision>,
        actor: &Principal,
    ) -> Result<GoodsReceiptNote, ServiceError> {
        let tx = begin(self.db.as_ref())?;
        let mut grn = documents::get_grn(&*tx, id)?;
        if grn.status != GrnStatus::Verified {
            // Surface the lifecycle error before doing any work.
            grn.status.transition(GrnStatus::Approved, &grn.number)?;
        }
        let mut po = documents::get_purchase_order(&*tx, &grn.purchase_order_id)?;
        reconcile(&mut grn, &po)?;

        if grn.has_overage() && decision.is_none() {
            return Err(ServiceError::Validation(format!(
                "GRN {} has overage; overageDecision (ACCEPT or RETURN) is required",
                grn.number
            )));
        }
        let decision = decision.unwrap_or(OverageDecision::Accept);
        grn.overage_decision = grn.has_overage().then_some(decision);

        let reference = Reference::new("grn", &grn.id, &grn.number);
        for line in grn.lines.iter_mut() {
            line.accepted_quantity = match decision {
                OverageDecision::Accept => line.received_quantity,
                OverageDecision::Return => line.received_quantity.min(line.expected_quantity),
            };
            if line.accepted_quantity > Decimal::ZERO {
                ledger::receive(
                    &*tx,
                    &line.item_id,
                    &grn.location,
                    line.accepted_quantity,
                    MovementKind::Receipt,
                    Some(reference.clone()),
                    actor,
                )?;
            }
            if let Some(po_line) = po.lines.iter_mut().find(|l| l.line_no == line.po_line_no) {
                po_line.received_quantity += line.accepted_quantity;
            }
        }

        let next = if po.fully_received() {
            PurchaseOrderStatus::Received
        } else {
            PurchaseOrderStatus::PartiallyReceived
        };
        if next == po.status {
            po.updated_at = now_rfc3339();
            save_purchase_order(&*tx, &po)?;
        } else {
            move_purchase_order(&*tx, &mut po, next, actor, Some(&grn.number))?;
        }

        let claimed = settle_shortages(&*tx, &grn, actor)?;
        let shortage: Vec<VendorRequestLine> = grn
            .lines
            .iter()
            .map(|l| {
                let already = claimed.iter().filter(|(no, _)| *no == l.po_line_no).map(|(_, q)| *q).sum::<Decimal>();
                (l, l.shortage_quantity - already)
            })
            .filter(|(_, qty)| *qty > Decimal::ZERO)
            .map(|(l, qty)| request_line(&po, l, qty))
            .collect();
        if !shortage.is_empty() {
            open_request(&*tx, &grn, VendorRequestKind::Shortage, shortage, actor)?;
        }
        if decision == OverageDecision::Return {
            let excess: Vec<VendorRequestLine> = grn
                .lines
                .iter()
                .filter(|l| l.overage_quantity > Decimal::ZERO)
                .map(|l| request_line(&po, l, l.overage_quantity))
                .collect();
            if !excess.is_empty() {
                open_request(&*tx, &grn, VendorRequestKind::ReturnExcess, excess, actor)?;
            }
        }

        grn.approved_by = Some(actor.user_id.clone());
        move_grn(&*tx, &mut grn, GrnStatus::Approved, actor, None)?;
        commit(tx)?;
        info!(number = %grn.number, po = %po.number, po_status = %po.status, "GRN approved");
        Ok(grn)
    }

    pub fn reject_grn(&self, id: &str, reason: &str, actor: &Principal) -> Result<GoodsReceiptNote, ServiceError> {
        ensure_not_blank("reason", reason)?;
        let tx = begin(self.db.as_ref())?;
        let mut grn = documents::get_grn(&*tx, id)?;
        grn.rejection_reason = Some(reason.to_string());
        move_grn(&*tx, &mut grn, GrnStatus::Rejected, actor, Some(reason))?;
        commit(tx)?;
        Ok(grn)
    }
}

fn build_lines(po: &PurchaseOrder, input: &[GrnLineInput]) -> Result<Vec<GrnLine>, ServiceError> {
    if input.is_empty() {
        return Err(ServiceError::Validation("a GRN needs at least one line".into()));
    }
    let mut seen = HashSet::new();
    input
        .iter()
        .map(|l| {
            ensure_non_negative("receivedQuantity", l.received_quantity)?;
            if !seen.insert(l.po_line_no) {
                return Err(ServiceError::Validation(format!("PO line {} listed twice", l.po_line_no)));
            }
            let po_line = po.line(l.po_line_no).ok_or_else(|| {
                ServiceError::Validation(format!("purchase order {} has no line {}", po.number, l.po_line_no))
            })?;
            let mut line = GrnLine {
                po_line_no: l.po_line_no,
                item_id: po_line.item_id.clone(),
                expected_quantity: Decimal::ZERO,
                received_quantity: l.received_quantity,
                accepted_quantity: Decimal::ZERO,
                shortage_quantity: Decimal::ZERO,
                overage_quantity: Decimal::ZERO,
                remarks: l.remarks.clone(),
            };
            line.reconcile(po_line.outstanding());
            Ok(line)
        })
        .collect()
}

fn reconcile(grn: &mut GoodsReceiptNote, po: &PurchaseOrder) -> Result<(), ServiceError> {
    for line in grn.lines.iter_mut() {
        let po_line = po.line(line.po_line_no).ok_or_else(|| {
            ServiceError::Internal(format!("GRN {} references missing PO line {}", grn.number, line.po_line_no))
        })?;
        line.reconcile(po_line.outstanding());
    }
    Ok(())
}

fn request_line(po: &PurchaseOrder, line: &GrnLine, quantity: Decimal) -> VendorRequestLine {
    VendorRequestLine {
        po_line_no: line.po_line_no,
        item_id: line.item_id.clone(),
        quantity,
        unit_price: po.line(line.po_line_no).map(|l| l.unit_price).unwrap_or_default(),
    }
}

/// Count this receipt's accepted quantities against shortages still
/// outstanding on the same PO, oldest request first. A request with nothing
/// left is resolved as a replacement delivered on this GRN.
///
/// Returns the quantity per PO line that open requests still claim, so the
/// new receipt only raises what nobody has asked the vendor for yet.
fn settle_shortages<E>(db: &E, grn: &GoodsReceiptNote, actor: &Principal) -> Result<Vec<(u32, Decimal)>, ServiceError>
where
    E: Executor + ?Sized,
{
    let mut requests: Vec<VendorRequest> = table::select(
        db,
        VENDOR_REQUESTS,
        &[
            ("purchase_order_id", Value::Text(grn.purchase_order_id.clone())),
            ("kind", Value::Text(VendorRequestKind::Shortage.to_string())),
        ],
    )?;
    requests.retain(|r| matches!(r.status, VendorRequestStatus::Open | VendorRequestStatus::Acknowledged));
    requests.sort_by(|a, b| a.number.cmp(&b.number));

    let mut arrived: Vec<(u32, Decimal)> = grn
        .lines
        .iter()
        .filter(|l| l.accepted_quantity > Decimal::ZERO)
        .map(|l| (l.po_line_no, l.accepted_quantity))
        .collect();
    let mut claimed = Vec::new();
    for mut req in requests {
        let mut touched = false;
        for line in req.lines.iter_mut() {
            if let Some((_, qty)) = arrived.iter_mut().find(|(no, q)| *no == line.po_line_no && *q > Decimal::ZERO) {
                let covered = line.quantity.min(*qty);
                if covered > Decimal::ZERO {
                    line.quantity -= covered;
                    *qty -= covered;
                    touched = true;
                }
            }
        }
        claimed.extend(req.lines.iter().filter(|l| l.quantity > Decimal::ZERO).map(|l| (l.po_line_no, l.quantity)));
        if !touched {
            continue;
        }
        if req.lines.iter().any(|l| l.quantity > Decimal::ZERO) {
            req.updated_at = now_rfc3339();
            documents::save_vendor_request(db, &req)?;
            continue;
        }
        if req.status == VendorRequestStatus::Open {
            move_vendor_request(db, &mut req, VendorRequestStatus::Acknowledged, actor, Some(&grn.number))?;
        }
        req.resolution = Some(Resolution::Replacement);
        req.notes = Some(format!("balance delivered on {}", grn.number));
        move_vendor_request(db, &mut req, VendorRequestStatus::Resolved, actor, Some(&grn.number))?;
    }
    Ok(claimed)
}

fn open_request<E>(
    db: &E,
    grn: &GoodsReceiptNote,
    kind: VendorRequestKind,
    lines: Vec<VendorRequestLine>,
    actor: &Principal,
) -> Result<VendorRequest, ServiceError>
where
    E: Executor + ?Sized,
{
    let now = now_rfc3339();
    let req = VendorRequest {
        id: new_id(),
        number: numbering::next_number(db, "VR")?,
        vendor_id: grn.vendor_id.clone(),
        purchase_order_id: grn.purchase_order_id.clone(),
        grn_id: grn.id.clone(),
        kind,
        lines,
        status: VendorRequestStatus::Open,
        resolution: None,
        credit_note_id: None,
        notes: None,
        created_at: now.clone(),
        updated_at: now,
    };
    table::insert(
        db,
        VENDOR_REQUESTS,
        &req.id,
        &req,
        &[
            ("number", Value::Text(req.number.clone())),
            ("vendor_id", Value::Text(req.vendor_id.clone())),
            ("purchase_order_id", Value::Text(req.purchase_order_id.clone())),
            ("grn_id", Value::Text(req.grn_id.clone())),
            ("kind", Value::Text(req.kind.to_string())),
            ("status", Value::Text(req.status.to_string())),
        ],
    )?;
    history::record(db, &req.id, None, req.status, actor, Some(&grn.number))?;
    info!(number = %req.number, kind = %req.kind, grn = %grn.number, "vendor request opened");
    Ok(req)
}
