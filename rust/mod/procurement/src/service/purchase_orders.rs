use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::Deserialize;
use tracing::info;

use garment_core::{
    ensure_non_negative, ensure_not_blank, ensure_positive, new_id, now_rfc3339, ListParams, ListResult,
    Principal, ServiceError,
};
use garment_inventory::Item;
use garment_store::{begin, commit, history, numbering, table, Executor, Value};

use super::ProcurementService;
use crate::documents::{self, move_purchase_order, save_purchase_order};
use crate::model::*;
use crate::schema::{GRNS, PURCHASE_ORDERS};

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PoLineInput {
    pub item_id: String,
    #[serde(default)]
    pub description: Option<String>,
    pub quantity: Decimal,
    pub unit_price: Decimal,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreatePurchaseOrder {
    pub vendor_id: String,
    #[serde(default)]
    pub sales_order_id: Option<String>,
    #[serde(default)]
    pub order_date: Option<NaiveDate>,
    #[serde(default)]
    pub expected_date: Option<NaiveDate>,
    pub lines: Vec<PoLineInput>,
    #[serde(default)]
    pub notes: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdatePurchaseOrder {
    #[serde(default)]
    pub expected_date: Option<NaiveDate>,
    #[serde(default)]
    pub lines: Option<Vec<PoLineInput>>,
    #[serde(default)]
    pub notes: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PoFilters {
    pub status: Option<PurchaseOrderStatus>,
    pub vendor_id: Option<String>,
    pub sales_order_id: Option<String>,
}

impl ProcurementService {
    pub fn create_purchase_order(
        &self,
        input: CreatePurchaseOrder,
        actor: &Principal,
    ) -> Result<PurchaseOrder, ServiceError> {
        let tx = begin(self.db.as_ref())?;
        let vendor = documents::require_vendor(&*tx, &input.vendor_id, None)?;
        if let Some(so) = &input.sales_order_id {
            garment_sales::orders::get_order(&*tx, so)?;
        }
        let lines = build_lines(&*tx, &input.lines)?;

        let now = now_rfc3339();
        let po = PurchaseOrder {
            id: new_id(),
            number: numbering::next_number(&*tx, "PO")?,
            vendor_id: vendor.id,
            sales_order_id: input.sales_order_id,
            order_date: input.order_date.unwrap_or_else(|| chrono::Utc::now().date_naive()),
            expected_date: input.expected_date,
            total_amount: lines.iter().map(|l| l.amount).sum(),
            lines,
            status: PurchaseOrderStatus::Draft,
            notes: input.notes,
            cancel_reason: None,
            created_by: actor.user_id.clone(),
            approved_by: None,
            created_at: now.clone(),
            updated_at: now,
        };
        table::insert(
            &*tx,
            PURCHASE_ORDERS,
            &po.id,
            &po,
            &[
                ("number", Value::Text(po.number.clone())),
                ("vendor_id", Value::Text(po.vendor_id.clone())),
                ("sales_order_id", Value::opt_text(po.sales_order_id.as_deref())),
                ("status", Value::Text(po.status.to_string())),
            ],
        )?;
        history::record(&*tx, &po.id, None, po.status, actor, None)?;
        commit(tx)?;
        info!(number = %po.number, vendor = %vendor.code, total = %po.total_amount, "purchase order created");
        Ok(po)
    }

    pub fn get_purchase_order(&self, id: &str) -> Result<PurchaseOrder, ServiceError> {
        documents::get_purchase_order(self.db.as_ref(), id)
    }

    pub fn list_purchase_orders(
        &self,
        filters: &PoFilters,
        params: &ListParams,
    ) -> Result<ListResult<PurchaseOrder>, ServiceError> {
        let mut conds = Vec::new();
        if let Some(s) = filters.status {
            conds.push(("status", Value::Text(s.to_string())));
        }
        if let Some(v) = &filters.vendor_id {
            conds.push(("vendor_id", Value::Text(v.clone())));
        }
        if let Some(so) = &filters.sales_order_id {
            conds.push(("sales_order_id", Value::Text(so.clone())));
        }
        table::list(self.db.as_ref(), PURCHASE_ORDERS, &conds, &["number"], params)
    }

    pub fn update_purchase_order(&self, id: &str, input: UpdatePurchaseOrder) -> Result<PurchaseOrder, ServiceError> {
        let tx = begin(self.db.as_ref())?;
        let mut po = documents::get_purchase_order(&*tx, id)?;
        if po.status != PurchaseOrderStatus::Draft {
            return Err(ServiceError::InvalidState(format!(
                "purchase order {} is {}; only drafts can be edited",
                po.number, po.status
            )));
        }
        if let Some(lines) = &input.lines {
            po.lines = build_lines(&*tx, lines)?;
            po.total_amount = po.lines.iter().map(|l| l.amount).sum();
        }
        if input.expected_date.is_some() {
            po.expected_date = input.expected_date;
        }
        if input.notes.is_some() {
            po.notes = input.notes;
        }
        po.updated_at = now_rfc3339();
        save_purchase_order(&*tx, &po)?;
        commit(tx)?;
        Ok(po)
    }

    pub fn submit_purchase_order(&self, id: &str, actor: &Principal) -> Result<PurchaseOrder, ServiceError> {
        self.move_po(id, PurchaseOrderStatus::PendingApproval, actor, None)
    }

    pub fn approve_purchase_order(&self, id: &str, actor: &Principal) -> Result<PurchaseOrder, ServiceError> {
        let tx = begin(self.db.as_ref())?;
        let mut po = documents::get_purchase_order(&*tx, id)?;
        po.approved_by = Some(actor.user_id.clone());
        move_purchase_order(&*tx, &mut po, PurchaseOrderStatus::Approved, actor, None)?;
        commit(tx)?;
        Ok(po)
    }

    pub fn send_purchase_order(&self, id: &str, actor: &Principal) -> Result<PurchaseOrder, ServiceError> {
        self.move_po(id, PurchaseOrderStatus::Sent, actor, None)
    }

    /// Only before anything was received and with no receipt in progress.
    pub fn cancel_purchase_order(&self, id: &str, reason: &str, actor: &Principal) -> Result<PurchaseOrder, ServiceError> {
        ensure_not_blank("reason", reason)?;
        let tx = begin(self.db.as_ref())?;
        let mut po = documents::get_purchase_order(&*tx, id)?;
        if po.anything_received() {
            return Err(ServiceError::InvalidState(format!(
                "purchase order {} has received material and cannot be cancelled",
                po.number
            )));
        }
        let grns: Vec<GoodsReceiptNote> =
            table::select(&*tx, GRNS, &[("purchase_order_id", Value::Text(po.id.clone()))])?;
        if let Some(open) = grns.iter().find(|g| g.is_open()) {
            return Err(ServiceError::InvalidState(format!(
                "purchase order {} has receipt {} in progress",
                po.number, open.number
            )));
        }
        po.cancel_reason = Some(reason.to_string());
        move_purchase_order(&*tx, &mut po, PurchaseOrderStatus::Cancelled, actor, Some(reason))?;
        commit(tx)?;
        Ok(po)
    }

    /// Close a received PO, or short-close a partially received one.
    pub fn close_purchase_order(&self, id: &str, actor: &Principal) -> Result<PurchaseOrder, ServiceError> {
        self.move_po(id, PurchaseOrderStatus::Closed, actor, None)
    }

    fn move_po(
        &self,
        id: &str,
        next: PurchaseOrderStatus,
        actor: &Principal,
        note: Option<&str>,
    ) -> Result<PurchaseOrder, ServiceError> {
        let tx = begin(self.db.as_ref())?;
        let mut po = documents::get_purchase_order(&*tx, id)?;
        move_purchase_order(&*tx, &mut po, next, actor, note)?;
        commit(tx)?;
        Ok(po)
    }
}

fn build_lines<E>(db: &E, input: &[PoLineInput]) -> Result<Vec<PurchaseOrderLine>, ServiceError>
where
    E: Executor + ?Sized,
{
    if input.is_empty() {
        return Err(ServiceError::Validation("a purchase order needs at least one line".into()));
    }
    input
        .iter()
        .enumerate()
        .map(|(i, l)| {
            ensure_positive("quantity", l.quantity)?;
            ensure_non_negative("unitPrice", l.unit_price)?;
            let item: Item = table::get(db, garment_inventory::schema::ITEMS, &l.item_id)?;
            if !item.active {
                return Err(ServiceError::Validation(format!("item {} is inactive", item.code)));
            }
            Ok(PurchaseOrderLine {
                line_no: i as u32 + 1,
                item_id: item.id,
                description: l.description.clone().or(Some(item.name)),
                quantity: l.quantity,
                unit_price: l.unit_price,
                amount: l.quantity * l.unit_price,
                received_quantity: Decimal::ZERO,
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::Fixture;
    use rust_decimal_macros::dec;

    #[test]
    fn approval_chain() {
        let f = Fixture::new();
        let who = Principal::system();
        let po = f.draft_po(&[dec!(100)]);
        assert_eq!(po.total_amount, dec!(250));

        let err = f.svc.send_purchase_order(&po.id, &who).unwrap_err();
        assert!(matches!(err, ServiceError::InvalidState(_)));

        f.svc.submit_purchase_order(&po.id, &who).unwrap();
        let approved = f.svc.approve_purchase_order(&po.id, &who).unwrap();
        assert_eq!(approved.approved_by.as_deref(), Some("system"));
        let sent = f.svc.send_purchase_order(&po.id, &who).unwrap();
        assert_eq!(sent.status, PurchaseOrderStatus::Sent);

        let edit = f.svc.update_purchase_order(&po.id, UpdatePurchaseOrder::default());
        assert!(matches!(edit, Err(ServiceError::InvalidState(_))));

        let cancelled = f.svc.cancel_purchase_order(&po.id, "vendor out of stock", &who).unwrap();
        assert_eq!(cancelled.status, PurchaseOrderStatus::Cancelled);
    }

    #[test]
    fn draft_edits_recompute_total() {
        let f = Fixture::new();
        let po = f.draft_po(&[dec!(10)]);
        let edited = f
            .svc
            .update_purchase_order(
                &po.id,
                UpdatePurchaseOrder {
                    lines: Some(vec![
                        PoLineInput { item_id: f.fabric.clone(), description: None, quantity: dec!(10), unit_price: dec!(3) },
                        PoLineInput { item_id: f.trim.clone(), description: None, quantity: dec!(200), unit_price: dec!(0.05) },
                    ]),
                    ..Default::default()
                },
            )
            .unwrap();
        assert_eq!(edited.lines.len(), 2);
        assert_eq!(edited.total_amount, dec!(40));
    }

    #[test]
    fn inactive_vendor_rejected() {
        let f = Fixture::new();
        f.svc.update_vendor(&f.vendor.id, serde_json::json!({"active": false})).unwrap();
        let err = f
            .svc
            .create_purchase_order(
                CreatePurchaseOrder {
                    vendor_id: f.vendor.id.clone(),
                    sales_order_id: None,
                    order_date: None,
                    expected_date: None,
                    lines: vec![PoLineInput { item_id: f.fabric.clone(), description: None, quantity: dec!(1), unit_price: dec!(1) }],
                    notes: None,
                },
                &Principal::system(),
            )
            .unwrap_err();
        assert!(matches!(err, ServiceError::Validation(_)));
    }
}
