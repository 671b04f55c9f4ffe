use std::collections::HashSet;

use rust_decimal::Decimal;
use serde::Deserialize;
use tracing::info;

use garment_core::{
    ensure_non_negative, ensure_not_blank, ensure_positive, new_id, now_rfc3339, ListParams, ListResult, Principal,
    ServiceError,
};
use garment_inventory::{ledger, Item, MovementKind, Reference, MAIN_LOCATION, QUARANTINE_LOCATION};
use garment_store::{begin, commit, history, numbering, table, Executor, Value};

use super::ManufacturingService;
use crate::documents::{self, move_mrn, move_order, save_mrn};
use crate::model::*;
use crate::schema::{DISPATCHES, MRNS, RECEIPTS, VERIFICATIONS};

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MrnLineInput {
    pub item_id: String,
    pub quantity: Decimal,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateMrn {
    #[serde(default)]
    pub production_order_id: Option<String>,
    pub department: String,
    pub lines: Vec<MrnLineInput>,
    #[serde(default)]
    pub notes: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MrnFilters {
    pub status: Option<MrnStatus>,
    pub production_order_id: Option<String>,
    pub department: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DispatchInput {
    /// Store the material is issued from; `MAIN` when omitted.
    #[serde(default)]
    pub location: Option<String>,
    pub lines: Vec<DispatchLine>,
    #[serde(default)]
    pub notes: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReceiptInput {
    pub lines: Vec<ReceiptLine>,
    #[serde(default)]
    pub notes: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VerificationInput {
    pub lines: Vec<VerificationLine>,
}

impl ManufacturingService {
    pub fn create_mrn(&self, input: CreateMrn, actor: &Principal) -> Result<MaterialRequest, ServiceError> {
        ensure_not_blank("department", &input.department)?;
        if input.lines.is_empty() {
            return Err(ServiceError::Validation("a material request needs at least one line".into()));
        }

        let tx = begin(self.db.as_ref())?;
        let mut seen = HashSet::new();
        let mut lines = Vec::with_capacity(input.lines.len());
        for l in &input.lines {
            ensure_positive("quantity", l.quantity)?;
            let item: Item = table::get(&*tx, garment_inventory::schema::ITEMS, &l.item_id)?;
            if !item.active {
                return Err(ServiceError::Validation(format!("item {} is inactive", item.code)));
            }
            if !seen.insert(item.id.clone()) {
                return Err(ServiceError::Validation(format!("item {} is requested twice", item.code)));
            }
            lines.push(MrnLine {
                item_id: item.id,
                requested_quantity: l.quantity,
                dispatched_quantity: Decimal::ZERO,
                received_quantity: Decimal::ZERO,
                accepted_quantity: Decimal::ZERO,
                rejected_quantity: Decimal::ZERO,
            });
        }

        let mut order = match &input.production_order_id {
            Some(id) => Some(documents::get_order(&*tx, id)?),
            None => None,
        };
        if let Some(order) = &order {
            if !order.status.accepts_material_requests() {
                return Err(ServiceError::InvalidState(format!(
                    "production order {} is {} and cannot request material",
                    order.number, order.status
                )));
            }
        }

        let now = now_rfc3339();
        let mrn = MaterialRequest {
            id: new_id(),
            number: numbering::next_number(&*tx, "MRN")?,
            production_order_id: input.production_order_id,
            department: input.department.trim().to_string(),
            requested_by: actor.user_id.clone(),
            lines,
            status: MrnStatus::Pending,
            notes: input.notes,
            cancel_reason: None,
            approved_by: None,
            created_at: now.clone(),
            updated_at: now,
        };
        table::insert(
            &*tx,
            MRNS,
            &mrn.id,
            &mrn,
            &[
                ("number", Value::Text(mrn.number.clone())),
                ("production_order_id", Value::opt_text(mrn.production_order_id.as_deref())),
                ("department", Value::Text(mrn.department.clone())),
                ("status", Value::Text(mrn.status.to_string())),
            ],
        )?;
        history::record(&*tx, &mrn.id, None, mrn.status, actor, None)?;

        if let Some(order) = order.as_mut() {
            if order.status == ProductionOrderStatus::Planned {
                move_order(&*tx, order, ProductionOrderStatus::MaterialRequested, actor, Some(&mrn.number))?;
            }
        }
        commit(tx)?;
        info!(number = %mrn.number, department = %mrn.department, lines = mrn.lines.len(), "material request created");
        Ok(mrn)
    }

    pub fn get_mrn(&self, id: &str) -> Result<MaterialRequest, ServiceError> {
        documents::get_mrn(self.db.as_ref(), id)
    }

    pub fn list_mrns(&self, filters: &MrnFilters, params: &ListParams) -> Result<ListResult<MaterialRequest>, ServiceError> {
        let mut conds = Vec::new();
        if let Some(s) = filters.status {
            conds.push(("status", Value::Text(s.to_string())));
        }
        if let Some(p) = &filters.production_order_id {
            conds.push(("production_order_id", Value::Text(p.clone())));
        }
        if let Some(d) = &filters.department {
            conds.push(("department", Value::Text(d.clone())));
        }
        table::list(self.db.as_ref(), MRNS, &conds, &["number"], params)
    }

    pub fn cancel_mrn(&self, id: &str, reason: &str, actor: &Principal) -> Result<MaterialRequest, ServiceError> {
        ensure_not_blank("reason", reason)?;
        let tx = begin(self.db.as_ref())?;
        let mut mrn = documents::get_mrn(&*tx, id)?;
        mrn.cancel_reason = Some(reason.to_string());
        move_mrn(&*tx, &mut mrn, MrnStatus::Cancelled, actor, Some(reason))?;
        if let Some(order_id) = &mrn.production_order_id {
            material_settled(&*tx, order_id, &mrn.number, actor)?;
        }
        commit(tx)?;
        Ok(mrn)
    }

    /// Issue stock against the request. Several dispatches may fill one MRN;
    /// none may exceed what is still outstanding.
    pub fn dispatch_mrn(&self, id: &str, input: DispatchInput, actor: &Principal) -> Result<MaterialDispatch, ServiceError> {
        if input.lines.is_empty() {
            return Err(ServiceError::Validation("a dispatch needs at least one line".into()));
        }
        let location = input.location.unwrap_or_else(|| MAIN_LOCATION.to_string());
        ensure_not_blank("location", &location)?;

        let tx = begin(self.db.as_ref())?;
        let mut mrn = documents::get_mrn(&*tx, id)?;
        if !matches!(mrn.status, MrnStatus::Pending | MrnStatus::PartiallyDispatched) {
            return Err(ServiceError::InvalidState(format!(
                "material request {} is {} and cannot be dispatched",
                mrn.number, mrn.status
            )));
        }

        let mut seen = HashSet::new();
        for l in &input.lines {
            ensure_positive("quantity", l.quantity)?;
            if !seen.insert(l.item_id.as_str()) {
                return Err(ServiceError::Validation(format!("item {} is dispatched twice", l.item_id)));
            }
            let line = mrn_line_mut(&mut mrn, &l.item_id)?;
            if l.quantity > line.outstanding() {
                return Err(ServiceError::Validation(format!(
                    "item {}: dispatching {} exceeds outstanding {}",
                    l.item_id,
                    l.quantity,
                    line.outstanding()
                )));
            }
            line.dispatched_quantity += l.quantity;
        }

        let now = now_rfc3339();
        let dispatch = MaterialDispatch {
            id: new_id(),
            number: numbering::next_number(&*tx, "MD")?,
            mrn_id: mrn.id.clone(),
            location,
            lines: input.lines,
            dispatched_by: actor.user_id.clone(),
            notes: input.notes,
            created_at: now.clone(),
            updated_at: now,
        };
        let reference = Reference::new("material_dispatch", &dispatch.id, &dispatch.number);
        for l in &dispatch.lines {
            ledger::issue(&*tx, &l.item_id, &dispatch.location, l.quantity, MovementKind::Issue, Some(reference.clone()), actor)?;
        }
        insert_child(&*tx, DISPATCHES, &dispatch.id, &dispatch.number, &mrn.id, &dispatch)?;

        let next = if mrn.fully_dispatched() {
            MrnStatus::Dispatched
        } else {
            MrnStatus::PartiallyDispatched
        };
        if next == mrn.status {
            mrn.updated_at = now_rfc3339();
            save_mrn(&*tx, &mrn)?;
        } else {
            move_mrn(&*tx, &mut mrn, next, actor, Some(&dispatch.number))?;
        }
        commit(tx)?;
        info!(number = %dispatch.number, mrn = %mrn.number, "material dispatched");
        Ok(dispatch)
    }

    /// Count what arrived. Items left out of `lines` arrived as zero.
    pub fn receive_mrn(&self, id: &str, input: ReceiptInput, actor: &Principal) -> Result<MaterialReceipt, ServiceError> {
        let tx = begin(self.db.as_ref())?;
        let mut mrn = documents::get_mrn(&*tx, id)?;
        if mrn.status != MrnStatus::Dispatched {
            return Err(ServiceError::InvalidState(format!(
                "material request {} is {}; material can only be received once fully dispatched",
                mrn.number, mrn.status
            )));
        }

        let mut seen = HashSet::new();
        for l in &input.lines {
            ensure_non_negative("receivedQuantity", l.received_quantity)?;
            if !seen.insert(l.item_id.as_str()) {
                return Err(ServiceError::Validation(format!("item {} is received twice", l.item_id)));
            }
            let line = mrn_line_mut(&mut mrn, &l.item_id)?;
            if l.received_quantity > line.dispatched_quantity {
                return Err(ServiceError::Validation(format!(
                    "item {}: received {} exceeds dispatched {}",
                    l.item_id, l.received_quantity, line.dispatched_quantity
                )));
            }
            line.received_quantity = l.received_quantity;
        }

        let now = now_rfc3339();
        let receipt = MaterialReceipt {
            id: new_id(),
            number: numbering::next_number(&*tx, "MRC")?,
            mrn_id: mrn.id.clone(),
            lines: input.lines,
            received_by: actor.user_id.clone(),
            notes: input.notes,
            created_at: now.clone(),
            updated_at: now,
        };
        insert_child(&*tx, RECEIPTS, &receipt.id, &receipt.number, &mrn.id, &receipt)?;
        move_mrn(&*tx, &mut mrn, MrnStatus::Received, actor, Some(&receipt.number))?;
        commit(tx)?;
        Ok(receipt)
    }

    /// Split each received quantity into accepted and rejected. Rejected
    /// material goes back into stock at QUARANTINE.
    pub fn verify_mrn(
        &self,
        id: &str,
        input: VerificationInput,
        actor: &Principal,
    ) -> Result<MaterialVerification, ServiceError> {
        let tx = begin(self.db.as_ref())?;
        let mut mrn = documents::get_mrn(&*tx, id)?;
        if mrn.status != MrnStatus::Received {
            return Err(ServiceError::InvalidState(format!(
                "material request {} is {}; only RECEIVED requests can be verified",
                mrn.number, mrn.status
            )));
        }

        let mut seen = HashSet::new();
        for l in &input.lines {
            ensure_non_negative("acceptedQuantity", l.accepted_quantity)?;
            ensure_non_negative("rejectedQuantity", l.rejected_quantity)?;
            if !seen.insert(l.item_id.as_str()) {
                return Err(ServiceError::Validation(format!("item {} is verified twice", l.item_id)));
            }
            let line = mrn_line_mut(&mut mrn, &l.item_id)?;
            line.accepted_quantity = l.accepted_quantity;
            line.rejected_quantity = l.rejected_quantity;
        }
        for line in &mrn.lines {
            if line.accepted_quantity + line.rejected_quantity != line.received_quantity {
                return Err(ServiceError::Validation(format!(
                    "item {}: accepted {} + rejected {} must equal received {}",
                    line.item_id, line.accepted_quantity, line.rejected_quantity, line.received_quantity
                )));
            }
        }

        let now = now_rfc3339();
        let verification = MaterialVerification {
            id: new_id(),
            number: numbering::next_number(&*tx, "MV")?,
            mrn_id: mrn.id.clone(),
            lines: input.lines,
            verified_by: actor.user_id.clone(),
            created_at: now.clone(),
            updated_at: now,
        };
        let reference = Reference::new("material_verification", &verification.id, &verification.number);
        for l in verification.lines.iter().filter(|l| l.rejected_quantity > Decimal::ZERO) {
            ledger::receive(
                &*tx,
                &l.item_id,
                QUARANTINE_LOCATION,
                l.rejected_quantity,
                MovementKind::Return,
                Some(reference.clone()),
                actor,
            )?;
        }
        insert_child(&*tx, VERIFICATIONS, &verification.id, &verification.number, &mrn.id, &verification)?;
        move_mrn(&*tx, &mut mrn, MrnStatus::Verified, actor, Some(&verification.number))?;
        commit(tx)?;
        Ok(verification)
    }

    /// Sign off the request. The production order becomes MATERIAL_READY
    /// when no other request for it is still open.
    pub fn approve_mrn(&self, id: &str, actor: &Principal) -> Result<MaterialRequest, ServiceError> {
        let tx = begin(self.db.as_ref())?;
        let mut mrn = documents::get_mrn(&*tx, id)?;
        mrn.approved_by = Some(actor.user_id.clone());
        move_mrn(&*tx, &mut mrn, MrnStatus::Approved, actor, None)?;

        if let Some(order_id) = &mrn.production_order_id {
            material_settled(&*tx, order_id, &mrn.number, actor)?;
        }
        commit(tx)?;
        Ok(mrn)
    }

    pub fn list_dispatches(&self, mrn_id: &str) -> Result<Vec<MaterialDispatch>, ServiceError> {
        self.children(DISPATCHES, mrn_id)
    }

    pub fn list_receipts(&self, mrn_id: &str) -> Result<Vec<MaterialReceipt>, ServiceError> {
        self.children(RECEIPTS, mrn_id)
    }

    pub fn list_verifications(&self, mrn_id: &str) -> Result<Vec<MaterialVerification>, ServiceError> {
        self.children(VERIFICATIONS, mrn_id)
    }

    fn children<T: serde::de::DeserializeOwned>(&self, table_name: &str, mrn_id: &str) -> Result<Vec<T>, ServiceError> {
        let mrn = documents::get_mrn(self.db.as_ref(), mrn_id)?;
        table::select(self.db.as_ref(), table_name, &[("mrn_id", Value::Text(mrn.id))])
    }
}

/// Mark the production order MATERIAL_READY once none of its requests is
/// open and at least one was approved. `trigger` is the MRN that settled it.
fn material_settled<E>(db: &E, order_id: &str, trigger: &str, actor: &Principal) -> Result<(), ServiceError>
where
    E: Executor + ?Sized,
{
    let mut order = documents::get_order(db, order_id)?;
    if order.status != ProductionOrderStatus::MaterialRequested {
        return Ok(());
    }
    let requests: Vec<MaterialRequest> =
        table::select(db, MRNS, &[("production_order_id", Value::Text(order_id.to_string()))])?;
    let waiting = requests.iter().any(|m| m.status.is_open());
    let approved = requests.iter().any(|m| m.status == MrnStatus::Approved);
    if !waiting && approved {
        move_order(db, &mut order, ProductionOrderStatus::MaterialReady, actor, Some(trigger))?;
    }
    Ok(())
}

fn mrn_line_mut<'a>(mrn: &'a mut MaterialRequest, item_id: &str) -> Result<&'a mut MrnLine, ServiceError> {
    let number = mrn.number.clone();
    mrn.lines
        .iter_mut()
        .find(|l| l.item_id == item_id)
        .ok_or_else(|| ServiceError::Validation(format!("material request {number} has no line for item {item_id}")))
}

fn insert_child<E, T>(db: &E, table_name: &str, id: &str, number: &str, mrn_id: &str, doc: &T) -> Result<(), ServiceError>
where
    E: Executor + ?Sized,
    T: serde::Serialize,
{
    table::insert(
        db,
        table_name,
        id,
        doc,
        &[("number", Value::Text(number.to_string())), ("mrn_id", Value::Text(mrn_id.to_string()))],
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::Fixture;
    use rust_decimal_macros::dec;

    #[test]
    fn full_flow_marks_order_material_ready() {
        let f = Fixture::new();
        let who = Principal::system();
        let order = f.order(None, dec!(100));
        let mrn = f.request(Some(&order.id), dec!(250));
        assert_eq!(f.svc.get_production_order(&order.id).unwrap().status, ProductionOrderStatus::MaterialRequested);

        let early = f.svc.receive_mrn(&mrn.id, ReceiptInput { lines: vec![], notes: None }, &who);
        assert!(matches!(early, Err(ServiceError::InvalidState(_))));

        let first = f.dispatch(&mrn.id, dec!(150)).unwrap();
        assert!(first.number.starts_with("MD-"));
        assert_eq!(f.svc.get_mrn(&mrn.id).unwrap().status, MrnStatus::PartiallyDispatched);
        let over = f.dispatch(&mrn.id, dec!(101));
        assert!(matches!(over, Err(ServiceError::Validation(_))));
        f.dispatch(&mrn.id, dec!(100)).unwrap();
        assert_eq!(f.svc.get_mrn(&mrn.id).unwrap().status, MrnStatus::Dispatched);
        assert_eq!(f.svc.list_dispatches(&mrn.id).unwrap().len(), 2);
        assert_eq!(ledger::on_hand(f.db.as_ref(), &f.fabric, MAIN_LOCATION).unwrap(), dec!(750));

        let too_many = f.svc.receive_mrn(
            &mrn.id,
            ReceiptInput { lines: vec![ReceiptLine { item_id: f.fabric.clone(), received_quantity: dec!(251) }], notes: None },
            &who,
        );
        assert!(matches!(too_many, Err(ServiceError::Validation(_))));
        f.svc
            .receive_mrn(
                &mrn.id,
                ReceiptInput { lines: vec![ReceiptLine { item_id: f.fabric.clone(), received_quantity: dec!(250) }], notes: None },
                &who,
            )
            .unwrap();

        let unbalanced = f.svc.verify_mrn(
            &mrn.id,
            VerificationInput {
                lines: vec![VerificationLine {
                    item_id: f.fabric.clone(),
                    accepted_quantity: dec!(240),
                    rejected_quantity: dec!(5),
                    remarks: None,
                }],
            },
            &who,
        );
        assert!(matches!(unbalanced, Err(ServiceError::Validation(_))));
        let verification = f
            .svc
            .verify_mrn(
                &mrn.id,
                VerificationInput {
                    lines: vec![VerificationLine {
                        item_id: f.fabric.clone(),
                        accepted_quantity: dec!(240),
                        rejected_quantity: dec!(10),
                        remarks: Some("shade variation".into()),
                    }],
                },
                &who,
            )
            .unwrap();
        assert!(verification.number.starts_with("MV-"));
        assert_eq!(ledger::on_hand(f.db.as_ref(), &f.fabric, QUARANTINE_LOCATION).unwrap(), dec!(10));

        let approved = f.svc.approve_mrn(&mrn.id, &who).unwrap();
        assert_eq!(approved.status, MrnStatus::Approved);
        assert_eq!(approved.lines[0].accepted_quantity, dec!(240));
        assert_eq!(f.svc.get_production_order(&order.id).unwrap().status, ProductionOrderStatus::MaterialReady);

        let history = garment_store::history::list(f.db.as_ref(), "material_request", &mrn.id).unwrap();
        let to: Vec<&str> = history.iter().map(|h| h.to_status.as_str()).collect();
        assert_eq!(to, vec!["PENDING", "PARTIALLY_DISPATCHED", "DISPATCHED", "RECEIVED", "VERIFIED", "APPROVED"]);
    }

    #[test]
    fn dispatch_needs_stock() {
        let f = Fixture::new();
        let mrn = f.request(None, dec!(5000));
        let err = f.dispatch(&mrn.id, dec!(5000)).unwrap_err();
        assert!(matches!(err, ServiceError::Validation(_)));
        let mrn = f.svc.get_mrn(&mrn.id).unwrap();
        assert_eq!(mrn.status, MrnStatus::Pending);
        assert_eq!(mrn.lines[0].dispatched_quantity, dec!(0));
    }

    #[test]
    fn order_waits_for_every_open_request() {
        let f = Fixture::new();
        let order = f.order(None, dec!(10));
        let first = f.request(Some(&order.id), dec!(20));
        let second = f.request(Some(&order.id), dec!(5));
        f.approve_all(&first, dec!(20));
        assert_eq!(f.svc.get_production_order(&order.id).unwrap().status, ProductionOrderStatus::MaterialRequested);
        f.approve_all(&second, dec!(5));
        assert_eq!(f.svc.get_production_order(&order.id).unwrap().status, ProductionOrderStatus::MaterialReady);
    }

    #[test]
    fn cancelling_the_last_open_request_releases_the_order() {
        let f = Fixture::new();
        let who = Principal::system();
        let order = f.order(None, dec!(10));
        let first = f.request(Some(&order.id), dec!(20));
        let second = f.request(Some(&order.id), dec!(5));
        f.approve_all(&first, dec!(20));
        assert_eq!(f.svc.get_production_order(&order.id).unwrap().status, ProductionOrderStatus::MaterialRequested);

        f.svc.cancel_mrn(&second.id, "covered by the first request", &who).unwrap();
        assert_eq!(f.svc.get_production_order(&order.id).unwrap().status, ProductionOrderStatus::MaterialReady);
    }

    #[test]
    fn cancelling_every_request_keeps_the_order_waiting() {
        let f = Fixture::new();
        let who = Principal::system();
        let order = f.order(None, dec!(10));
        let only = f.request(Some(&order.id), dec!(20));
        f.svc.cancel_mrn(&only.id, "wrong fabric", &who).unwrap();
        assert_eq!(f.svc.get_production_order(&order.id).unwrap().status, ProductionOrderStatus::MaterialRequested);
    }

    #[test]
    fn request_validation() {
        let f = Fixture::new();
        let who = Principal::system();
        let dup = f.svc.create_mrn(
            CreateMrn {
                production_order_id: None,
                department: "cutting".into(),
                lines: vec![
                    MrnLineInput { item_id: f.fabric.clone(), quantity: dec!(1) },
                    MrnLineInput { item_id: f.fabric.clone(), quantity: dec!(2) },
                ],
                notes: None,
            },
            &who,
        );
        assert!(matches!(dup, Err(ServiceError::Validation(_))));

        let mrn = f.request(None, dec!(3));
        let cancelled = f.svc.cancel_mrn(&mrn.id, "duplicate request", &who).unwrap();
        assert_eq!(cancelled.status, MrnStatus::Cancelled);
        assert!(f.dispatch(&mrn.id, dec!(3)).is_err());
    }
}
