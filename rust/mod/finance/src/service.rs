use std::collections::HashSet;
use std::sync::Arc;

use rust_decimal::Decimal;
use serde::Deserialize;
use tracing::info;

use garment_core::{
    ensure_non_negative, ensure_not_blank, ensure_positive, new_id, now_rfc3339, ListParams, ListResult, Principal,
    ServiceError,
};
use garment_inventory::Item;
use garment_procurement::documents as procurement;
use garment_procurement::{PurchaseOrderStatus, VendorRequestStatus};
use garment_sales::{orders, Customer, SalesOrderStatus};
use garment_sql::SQLStore;
use garment_store::{begin, commit, history, numbering, table, Executor, Value};

use crate::model::*;
use crate::schema::CREDIT_NOTES;

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreditLineInput {
    pub item_id: String,
    #[serde(default)]
    pub description: Option<String>,
    pub quantity: Decimal,
    pub unit_price: Decimal,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateCreditNote {
    pub party: Party,
    pub party_id: String,
    #[serde(default)]
    pub sales_order_id: Option<String>,
    pub lines: Vec<CreditLineInput>,
    pub reason: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreditNoteFilters {
    pub status: Option<CreditNoteStatus>,
    pub party: Option<Party>,
    pub party_id: Option<String>,
    pub vendor_request_id: Option<String>,
}

pub struct FinanceService {
    db: Arc<dyn SQLStore>,
}

impl FinanceService {
    pub fn new(db: Arc<dyn SQLStore>) -> Self {
        Self { db }
    }

    pub fn create_credit_note(&self, input: CreateCreditNote, actor: &Principal) -> Result<CreditNote, ServiceError> {
        ensure_not_blank("reason", &input.reason)?;
        let tx = begin(self.db.as_ref())?;
        match input.party {
            Party::Vendor => {
                if input.sales_order_id.is_some() {
                    return Err(ServiceError::Validation("a vendor credit note cannot reference a sales order".into()));
                }
                procurement::get_vendor(&*tx, &input.party_id)?;
            }
            Party::Customer => {
                let _: Customer = table::get(&*tx, garment_sales::schema::CUSTOMERS, &input.party_id)?;
                if let Some(so_id) = &input.sales_order_id {
                    let so = orders::get_order(&*tx, so_id)?;
                    if so.customer_id != input.party_id {
                        return Err(ServiceError::Validation(format!(
                            "sales order {} belongs to another customer",
                            so.number
                        )));
                    }
                }
            }
        }
        let lines = build_lines(&*tx, &input.lines)?;
        let note = insert_note(
            &*tx,
            NewNote {
                party: input.party,
                party_id: input.party_id,
                vendor_request_id: None,
                sales_order_id: input.sales_order_id,
                lines,
                reason: input.reason,
            },
            actor,
        )?;
        commit(tx)?;
        Ok(note)
    }

    /// Settle a shortage or returned overage with a credit from the vendor.
    /// Lines are priced from the purchase order, and the request is resolved
    /// in the same transaction.
    pub fn create_from_vendor_request(
        &self,
        request_id: &str,
        reason: Option<String>,
        actor: &Principal,
    ) -> Result<CreditNote, ServiceError> {
        let tx = begin(self.db.as_ref())?;
        let req = procurement::get_vendor_request(&*tx, request_id)?;
        if !matches!(req.status, VendorRequestStatus::Open | VendorRequestStatus::Acknowledged) {
            return Err(ServiceError::InvalidState(format!(
                "vendor request {} is {} and cannot be credited",
                req.number, req.status
            )));
        }
        let existing: Option<CreditNote> =
            table::find_by(&*tx, CREDIT_NOTES, "vendor_request_id", Value::Text(req.id.clone()))?;
        if let Some(cn) = existing {
            return Err(ServiceError::Conflict(format!(
                "vendor request {} already has credit note {}",
                req.number, cn.number
            )));
        }

        let po = procurement::get_purchase_order(&*tx, &req.purchase_order_id)?;
        let lines: Vec<CreditNoteLine> = req
            .lines
            .iter()
            .filter(|l| l.quantity > Decimal::ZERO)
            .map(|l| {
                let unit_price = po.line(l.po_line_no).map(|p| p.unit_price).unwrap_or(l.unit_price);
                CreditNoteLine {
                    item_id: l.item_id.clone(),
                    description: Some(format!("{} line {}", po.number, l.po_line_no)),
                    quantity: l.quantity,
                    unit_price,
                    amount: l.quantity * unit_price,
                }
            })
            .collect();
        if lines.is_empty() {
            return Err(ServiceError::Validation(format!(
                "vendor request {} has nothing left to credit",
                req.number
            )));
        }

        let note = insert_note(
            &*tx,
            NewNote {
                party: Party::Vendor,
                party_id: req.vendor_id.clone(),
                vendor_request_id: Some(req.id.clone()),
                sales_order_id: None,
                lines,
                reason: reason.unwrap_or_else(|| format!("{} on {}", req.kind, req.number)),
            },
            actor,
        )?;
        procurement::resolve_with_credit_note(&*tx, &req.id, &note.id, actor)?;
        commit(tx)?;
        info!(credit_note = %note.number, vendor_request = %req.number, "vendor request settled by credit note");
        Ok(note)
    }

    pub fn get_credit_note(&self, id: &str) -> Result<CreditNote, ServiceError> {
        table::get(self.db.as_ref(), CREDIT_NOTES, id)
    }

    pub fn list_credit_notes(
        &self,
        filters: &CreditNoteFilters,
        params: &ListParams,
    ) -> Result<ListResult<CreditNote>, ServiceError> {
        let mut conds = Vec::new();
        if let Some(s) = filters.status {
            conds.push(("status", Value::Text(s.to_string())));
        }
        if let Some(p) = filters.party {
            conds.push(("party", Value::Text(p.to_string())));
        }
        if let Some(id) = &filters.party_id {
            conds.push(("party_id", Value::Text(id.clone())));
        }
        if let Some(id) = &filters.vendor_request_id {
            conds.push(("vendor_request_id", Value::Text(id.clone())));
        }
        table::list(self.db.as_ref(), CREDIT_NOTES, &conds, &["number"], params)
    }

    pub fn issue(&self, id: &str, actor: &Principal) -> Result<CreditNote, ServiceError> {
        self.transition(id, CreditNoteStatus::Issued, actor, None, |cn| {
            cn.issued_by = Some(actor.user_id.clone());
            cn.issued_at = Some(now_rfc3339());
        })
    }

    pub fn apply(&self, id: &str, actor: &Principal) -> Result<CreditNote, ServiceError> {
        self.transition(id, CreditNoteStatus::Applied, actor, None, |cn| {
            cn.applied_at = Some(now_rfc3339());
        })
    }

    pub fn cancel(&self, id: &str, reason: &str, actor: &Principal) -> Result<CreditNote, ServiceError> {
        ensure_not_blank("reason", reason)?;
        self.transition(id, CreditNoteStatus::Cancelled, actor, Some(reason), |cn| {
            cn.cancel_reason = Some(reason.to_string());
        })
    }

    fn transition(
        &self,
        id: &str,
        next: CreditNoteStatus,
        actor: &Principal,
        note: Option<&str>,
        stamp: impl FnOnce(&mut CreditNote),
    ) -> Result<CreditNote, ServiceError> {
        let tx = begin(self.db.as_ref())?;
        let mut cn: CreditNote = table::get(&*tx, CREDIT_NOTES, id)?;
        let from = history::advance(&*tx, &cn.id, &cn.number, &mut cn.status, next, actor, note)?;
        stamp(&mut cn);
        cn.updated_at = now_rfc3339();
        table::update(&*tx, CREDIT_NOTES, &cn.id, &cn, &[("status", Value::Text(cn.status.to_string()))])?;
        commit(tx)?;
        info!(number = %cn.number, from = %from, to = %next, "credit note status changed");
        Ok(cn)
    }

    pub fn summary(&self) -> Result<FinanceSummary, ServiceError> {
        let db = self.db.as_ref();

        let mut payables = Decimal::ZERO;
        for status in PurchaseOrderStatus::ALL.iter().filter(|s| s.is_committed()) {
            let pos: Vec<garment_procurement::PurchaseOrder> = table::select(
                db,
                garment_procurement::schema::PURCHASE_ORDERS,
                &[("status", Value::Text(status.to_string()))],
            )?;
            payables += pos.iter().map(|p| p.total_amount).sum::<Decimal>();
        }

        let mut receivables = Decimal::ZERO;
        for status in SalesOrderStatus::ALL.iter().filter(|s| s.is_open()) {
            let sos: Vec<garment_sales::SalesOrder> = table::select(
                db,
                garment_sales::schema::ORDERS,
                &[("status", Value::Text(status.to_string()))],
            )?;
            receivables += sos
                .iter()
                .flat_map(|o| o.lines.iter())
                .map(|l| l.unshipped() * l.unit_price)
                .sum::<Decimal>();
        }

        let notes: Vec<CreditNote> = table::select(db, CREDIT_NOTES, &[])?;
        let credits = |party: Party| -> Decimal {
            notes
                .iter()
                .filter(|n| n.party == party && n.status.is_effective())
                .map(|n| n.amount)
                .sum()
        };

        Ok(FinanceSummary {
            payables,
            receivables,
            vendor_credits: credits(Party::Vendor),
            customer_credits: credits(Party::Customer),
            credit_notes_by_status: table::count_by(db, CREDIT_NOTES, "status")?,
        })
    }
}

struct NewNote {
    party: Party,
    party_id: String,
    vendor_request_id: Option<String>,
    sales_order_id: Option<String>,
    lines: Vec<CreditNoteLine>,
    reason: String,
}

fn insert_note<E>(db: &E, new: NewNote, actor: &Principal) -> Result<CreditNote, ServiceError>
where
    E: Executor + ?Sized,
{
    if new.lines.is_empty() {
        return Err(ServiceError::Validation("a credit note needs at least one line".into()));
    }
    let now = now_rfc3339();
    let note = CreditNote {
        id: new_id(),
        number: numbering::next_number(db, "CN")?,
        amount: new.lines.iter().map(|l| l.amount).sum(),
        party: new.party,
        party_id: new.party_id,
        vendor_request_id: new.vendor_request_id,
        sales_order_id: new.sales_order_id,
        lines: new.lines,
        reason: new.reason,
        status: CreditNoteStatus::Draft,
        cancel_reason: None,
        issued_by: None,
        issued_at: None,
        applied_at: None,
        created_by: actor.user_id.clone(),
        created_at: now.clone(),
        updated_at: now,
    };
    table::insert(
        db,
        CREDIT_NOTES,
        &note.id,
        &note,
        &[
            ("number", Value::Text(note.number.clone())),
            ("party", Value::Text(note.party.to_string())),
            ("party_id", Value::Text(note.party_id.clone())),
            ("vendor_request_id", Value::opt_text(note.vendor_request_id.as_deref())),
            ("sales_order_id", Value::opt_text(note.sales_order_id.as_deref())),
            ("status", Value::Text(note.status.to_string())),
        ],
    )?;
    history::record(db, &note.id, None, note.status, actor, None)?;
    info!(number = %note.number, party = %note.party, amount = %note.amount, "credit note created");
    Ok(note)
}

fn build_lines<E>(db: &E, input: &[CreditLineInput]) -> Result<Vec<CreditNoteLine>, ServiceError>
where
    E: Executor + ?Sized,
{
    let mut seen = HashSet::new();
    let mut lines = Vec::with_capacity(input.len());
    for l in input {
        ensure_positive("quantity", l.quantity)?;
        ensure_non_negative("unitPrice", l.unit_price)?;
        let item: Item = table::get(db, garment_inventory::schema::ITEMS, &l.item_id)?;
        if !seen.insert(item.id.clone()) {
            return Err(ServiceError::Validation(format!("item {} appears twice", item.code)));
        }
        lines.push(CreditNoteLine {
            item_id: item.id,
            description: l.description.clone().or(Some(item.name)),
            quantity: l.quantity,
            unit_price: l.unit_price,
            amount: l.quantity * l.unit_price,
        });
    }
    Ok(lines)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::Fixture;
    use garment_procurement::model::Resolution;
    use garment_procurement::service::{CreateGrn, GrnLineInput};
    use garment_sales::service::{CreateSalesOrder, OrderLineInput};
    use garment_sales::SalesService;
    use rust_decimal_macros::dec;

    #[test]
    fn vendor_request_settled_once() {
        let f = Fixture::new();
        let who = Principal::system();
        let req = f.shortage_request(dec!(100), dec!(90));

        let cn = f.svc.create_from_vendor_request(&req.id, None, &who).unwrap();
        assert_eq!(cn.party, Party::Vendor);
        assert_eq!(cn.party_id, req.vendor_id);
        assert_eq!(cn.lines[0].quantity, dec!(10));
        assert_eq!(cn.amount, dec!(25.00));
        assert_eq!(cn.status, CreditNoteStatus::Draft);

        let resolved = procurement::get_vendor_request(f.db.as_ref(), &req.id).unwrap();
        assert_eq!(resolved.status, VendorRequestStatus::Resolved);
        assert_eq!(resolved.resolution, Some(Resolution::CreditNote));
        assert_eq!(resolved.credit_note_id.as_deref(), Some(cn.id.as_str()));

        let again = f.svc.create_from_vendor_request(&req.id, None, &who);
        assert!(matches!(again, Err(ServiceError::InvalidState(_))));
    }

    #[test]
    fn cancelled_request_cannot_be_credited() {
        let f = Fixture::new();
        let who = Principal::system();
        let req = f.shortage_request(dec!(50), dec!(40));
        f.procurement.cancel_vendor_request(&req.id, "replacement shipped", &who).unwrap();
        let err = f.svc.create_from_vendor_request(&req.id, None, &who).unwrap_err();
        assert!(matches!(err, ServiceError::InvalidState(_)));
        assert_eq!(f.svc.list_credit_notes(&Default::default(), &Default::default()).unwrap().total, 0);
    }

    #[test]
    fn delivered_balance_is_not_credited() {
        let f = Fixture::new();
        let who = Principal::system();
        let req = f.shortage_request(dec!(100), dec!(80));
        let grn = f
            .procurement
            .create_grn(
                CreateGrn {
                    purchase_order_id: req.purchase_order_id.clone(),
                    location: None,
                    lines: vec![GrnLineInput { po_line_no: 1, received_quantity: dec!(20), remarks: None }],
                    remarks: None,
                },
                &who,
            )
            .unwrap();
        f.procurement.receive_grn(&grn.id, &who).unwrap();
        f.procurement.verify_grn(&grn.id, &who).unwrap();
        f.procurement.approve_grn(&grn.id, None, &who).unwrap();

        let settled = procurement::get_vendor_request(f.db.as_ref(), &req.id).unwrap();
        assert_eq!(settled.status, VendorRequestStatus::Resolved);
        let err = f.svc.create_from_vendor_request(&req.id, None, &who).unwrap_err();
        assert!(matches!(err, ServiceError::InvalidState(_)));
        assert_eq!(f.svc.summary().unwrap().vendor_credits, dec!(0));
    }

    #[test]
    fn customer_note_lifecycle() {
        let f = Fixture::new();
        let who = Principal::system();
        let cn = f
            .svc
            .create_credit_note(
                CreateCreditNote {
                    party: Party::Customer,
                    party_id: f.customer.clone(),
                    sales_order_id: None,
                    lines: vec![CreditLineInput {
                        item_id: f.fabric.clone(),
                        description: None,
                        quantity: dec!(4),
                        unit_price: dec!(3.25),
                    }],
                    reason: "damaged in transit".into(),
                },
                &who,
            )
            .unwrap();
        assert_eq!(cn.amount, dec!(13.00));
        assert!(cn.number.starts_with("CN-"));

        let issued = f.svc.issue(&cn.id, &who).unwrap();
        assert_eq!(issued.issued_by.as_deref(), Some("system"));
        assert!(matches!(f.svc.cancel(&cn.id, "oops", &who), Err(ServiceError::InvalidState(_))));
        let applied = f.svc.apply(&cn.id, &who).unwrap();
        assert!(applied.applied_at.is_some());

        let summary = f.svc.summary().unwrap();
        assert_eq!(summary.customer_credits, dec!(13.00));
        assert_eq!(summary.vendor_credits, dec!(0));
    }

    #[test]
    fn party_must_exist() {
        let f = Fixture::new();
        let err = f
            .svc
            .create_credit_note(
                CreateCreditNote {
                    party: Party::Vendor,
                    party_id: "missing".into(),
                    sales_order_id: None,
                    lines: vec![],
                    reason: "goodwill".into(),
                },
                &Principal::system(),
            )
            .unwrap_err();
        assert!(matches!(err, ServiceError::NotFound(_)));
    }

    #[test]
    fn summary_counts_committed_orders() {
        let f = Fixture::new();
        let po = f.sent_po(dec!(40));
        let summary = f.svc.summary().unwrap();
        assert_eq!(summary.payables, po.total_amount);
        assert_eq!(summary.receivables, dec!(0));
    }

    #[test]
    fn receivables_count_only_unshipped_goods() {
        let f = Fixture::new();
        let who = Principal::system();
        let sales = SalesService::new(f.db.clone());
        let so = sales
            .create_order(
                CreateSalesOrder {
                    customer_id: f.customer.clone(),
                    order_date: None,
                    delivery_date: None,
                    lines: vec![OrderLineInput {
                        item_id: f.fabric.clone(),
                        description: None,
                        quantity: dec!(10),
                        unit_price: dec!(12.00),
                    }],
                    notes: None,
                },
                &who,
            )
            .unwrap();
        // Drafts are not receivable yet.
        assert_eq!(f.svc.summary().unwrap().receivables, dec!(0));

        sales.confirm(&so.id, &who).unwrap();
        assert_eq!(f.svc.summary().unwrap().receivables, dec!(120.00));

        orders::mark_ready_to_ship(f.db.as_ref(), &so.id, &who).unwrap();
        let partly = orders::record_shipped(f.db.as_ref(), &so.id, &[(1, dec!(4))], &who).unwrap();
        assert_eq!(partly.status, SalesOrderStatus::PartiallyShipped);
        assert_eq!(f.svc.summary().unwrap().receivables, dec!(72.00));
    }
}
