use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::Deserialize;
use tracing::info;

use garment_core::{
    ensure_not_blank, ensure_positive, new_id, now_rfc3339, ListParams, ListResult, Principal, ServiceError,
};
use garment_inventory::Item;
use garment_sales::SalesOrderStatus;
use garment_store::{begin, commit, history, numbering, table, Executor, Value};

use super::ManufacturingService;
use crate::documents::{self, move_mrn, move_order};
use crate::model::*;
use crate::schema::{MRNS, PRODUCTION_ORDERS, STAGES};

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateProductionOrder {
    #[serde(default)]
    pub sales_order_id: Option<String>,
    pub product_item_id: String,
    pub quantity: Decimal,
    #[serde(default)]
    pub priority: Option<Priority>,
    #[serde(default)]
    pub planned_start: Option<NaiveDate>,
    #[serde(default)]
    pub planned_end: Option<NaiveDate>,
    /// Stage names in order; the standard routing when absent.
    #[serde(default)]
    pub stages: Option<Vec<String>>,
    #[serde(default)]
    pub notes: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderFilters {
    pub status: Option<ProductionOrderStatus>,
    pub priority: Option<Priority>,
    pub sales_order_id: Option<String>,
}

impl ManufacturingService {
    pub fn create_production_order(
        &self,
        input: CreateProductionOrder,
        actor: &Principal,
    ) -> Result<ProductionOrder, ServiceError> {
        ensure_positive("quantity", input.quantity)?;
        if let (Some(start), Some(end)) = (input.planned_start, input.planned_end) {
            if end < start {
                return Err(ServiceError::Validation(format!(
                    "plannedEnd {end} is before plannedStart {start}"
                )));
            }
        }
        let names = stage_names(input.stages)?;

        let tx = begin(self.db.as_ref())?;
        let item: Item = table::get(&*tx, garment_inventory::schema::ITEMS, &input.product_item_id)?;
        if !item.active {
            return Err(ServiceError::Validation(format!("item {} is inactive", item.code)));
        }
        if let Some(so_id) = &input.sales_order_id {
            let so = garment_sales::orders::get_order(&*tx, so_id)?;
            if !matches!(so.status, SalesOrderStatus::Confirmed | SalesOrderStatus::InProduction) {
                return Err(ServiceError::InvalidState(format!(
                    "sales order {} is {}; production can only be planned for CONFIRMED or IN_PRODUCTION orders",
                    so.number, so.status
                )));
            }
            if !so.lines.iter().any(|l| l.item_id == item.id) {
                return Err(ServiceError::Validation(format!(
                    "sales order {} does not order item {}",
                    so.number, item.code
                )));
            }
        }

        let now = now_rfc3339();
        let order = ProductionOrder {
            id: new_id(),
            number: numbering::next_number(&*tx, "PRD")?,
            sales_order_id: input.sales_order_id,
            product_item_id: item.id,
            quantity: input.quantity,
            produced_quantity: Decimal::ZERO,
            rejected_quantity: Decimal::ZERO,
            priority: input.priority.unwrap_or_default(),
            planned_start: input.planned_start,
            planned_end: input.planned_end,
            status: ProductionOrderStatus::Planned,
            stages: names.len() as u32,
            notes: input.notes,
            hold_reason: None,
            cancel_reason: None,
            created_by: actor.user_id.clone(),
            created_at: now.clone(),
            updated_at: now.clone(),
        };
        table::insert(
            &*tx,
            PRODUCTION_ORDERS,
            &order.id,
            &order,
            &[
                ("number", Value::Text(order.number.clone())),
                ("sales_order_id", Value::opt_text(order.sales_order_id.as_deref())),
                ("product_item_id", Value::Text(order.product_item_id.clone())),
                ("priority", Value::Text(order.priority.to_string())),
                ("status", Value::Text(order.status.to_string())),
            ],
        )?;
        history::record(&*tx, &order.id, None, order.status, actor, None)?;

        for (i, name) in names.into_iter().enumerate() {
            let stage = ProductionStage {
                id: new_id(),
                production_order_id: order.id.clone(),
                sequence: i as u32 + 1,
                name,
                status: StageStatus::Pending,
                input_quantity: Decimal::ZERO,
                completed_quantity: Decimal::ZERO,
                rejected_quantity: Decimal::ZERO,
                vendor_id: None,
                outsource_note: None,
                started_at: None,
                completed_at: None,
                created_at: now.clone(),
                updated_at: now.clone(),
            };
            table::insert(
                &*tx,
                STAGES,
                &stage.id,
                &stage,
                &[
                    ("production_order_id", Value::Text(stage.production_order_id.clone())),
                    ("sequence", Value::Integer(stage.sequence as i64)),
                    ("status", Value::Text(stage.status.to_string())),
                ],
            )?;
        }
        commit(tx)?;
        info!(number = %order.number, quantity = %order.quantity, stages = order.stages, "production order created");
        Ok(order)
    }

    pub fn get_production_order(&self, id: &str) -> Result<ProductionOrder, ServiceError> {
        documents::get_order(self.db.as_ref(), id)
    }

    pub fn list_production_orders(
        &self,
        filters: &OrderFilters,
        params: &ListParams,
    ) -> Result<ListResult<ProductionOrder>, ServiceError> {
        let mut conds = Vec::new();
        if let Some(s) = filters.status {
            conds.push(("status", Value::Text(s.to_string())));
        }
        if let Some(p) = filters.priority {
            conds.push(("priority", Value::Text(p.to_string())));
        }
        if let Some(so) = &filters.sales_order_id {
            conds.push(("sales_order_id", Value::Text(so.clone())));
        }
        table::list(self.db.as_ref(), PRODUCTION_ORDERS, &conds, &["number"], params)
    }

    pub fn hold_production_order(&self, id: &str, reason: &str, actor: &Principal) -> Result<ProductionOrder, ServiceError> {
        ensure_not_blank("reason", reason)?;
        let tx = begin(self.db.as_ref())?;
        let mut order = documents::get_order(&*tx, id)?;
        order.hold_reason = Some(reason.to_string());
        move_order(&*tx, &mut order, ProductionOrderStatus::OnHold, actor, Some(reason))?;
        commit(tx)?;
        Ok(order)
    }

    pub fn resume_production_order(&self, id: &str, actor: &Principal) -> Result<ProductionOrder, ServiceError> {
        let tx = begin(self.db.as_ref())?;
        let mut order = documents::get_order(&*tx, id)?;
        order.hold_reason = None;
        move_order(&*tx, &mut order, ProductionOrderStatus::InProduction, actor, None)?;
        commit(tx)?;
        Ok(order)
    }

    /// Cancel the order. Material requests still PENDING for it are
    /// cancelled with it; anything already dispatched stays on record.
    pub fn cancel_production_order(
        &self,
        id: &str,
        reason: &str,
        actor: &Principal,
    ) -> Result<ProductionOrder, ServiceError> {
        ensure_not_blank("reason", reason)?;
        let tx = begin(self.db.as_ref())?;
        let mut order = documents::get_order(&*tx, id)?;
        order.cancel_reason = Some(reason.to_string());
        move_order(&*tx, &mut order, ProductionOrderStatus::Cancelled, actor, Some(reason))?;

        let pending: Vec<MaterialRequest> = table::select(
            &*tx,
            MRNS,
            &[
                ("production_order_id", Value::Text(order.id.clone())),
                ("status", Value::Text(MrnStatus::Pending.to_string())),
            ],
        )?;
        for mut mrn in pending {
            mrn.cancel_reason = Some(format!("production order {} cancelled", order.number));
            move_mrn(&*tx, &mut mrn, MrnStatus::Cancelled, actor, Some(reason))?;
        }
        if let Some(so_id) = &order.sales_order_id {
            sales_order_produced(&*tx, so_id, actor)?;
        }
        commit(tx)?;
        Ok(order)
    }
}

fn stage_names(input: Option<Vec<String>>) -> Result<Vec<String>, ServiceError> {
    let names: Vec<String> = match input {
        Some(names) => names.into_iter().map(|n| n.trim().to_string()).collect(),
        None => DEFAULT_STAGES.iter().map(|n| n.to_string()).collect(),
    };
    if names.is_empty() {
        return Err(ServiceError::Validation("a production order needs at least one stage".into()));
    }
    for name in &names {
        ensure_not_blank("stage name", name)?;
    }
    Ok(names)
}

/// Move a sales order into production when its first order starts.
pub(crate) fn sales_order_started<E>(db: &E, sales_order_id: &str, actor: &Principal) -> Result<(), ServiceError>
where
    E: Executor + ?Sized,
{
    let so = garment_sales::orders::get_order(db, sales_order_id)?;
    if so.status == SalesOrderStatus::Confirmed {
        garment_sales::orders::mark_in_production(db, sales_order_id, actor)?;
    }
    Ok(())
}

/// Mark the sales order ready to ship once none of its production orders is
/// still outstanding and at least one of them produced something.
pub(crate) fn sales_order_produced<E>(db: &E, sales_order_id: &str, actor: &Principal) -> Result<(), ServiceError>
where
    E: Executor + ?Sized,
{
    let orders = documents::orders_for_sales_order(db, sales_order_id)?;
    let mut live = orders.iter().filter(|o| o.status != ProductionOrderStatus::Cancelled).peekable();
    let done = live.peek().is_some() && live.all(|o| o.status == ProductionOrderStatus::Completed);
    if !done {
        return Ok(());
    }
    let so = garment_sales::orders::get_order(db, sales_order_id)?;
    if matches!(so.status, SalesOrderStatus::Confirmed | SalesOrderStatus::InProduction) {
        garment_sales::orders::mark_ready_to_ship(db, sales_order_id, actor)?;
        info!(sales_order = %so.number, "all production complete; sales order ready to ship");
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::service::StageOutput;
    use crate::testing::Fixture;
    use rust_decimal_macros::dec;

    #[test]
    fn create_with_default_routing() {
        let f = Fixture::new();
        let order = f.order(None, dec!(500));
        assert_eq!(order.status, ProductionOrderStatus::Planned);
        assert_eq!(order.priority, Priority::Normal);
        assert!(order.number.starts_with("PRD-"));

        let stages = f.svc.list_stages(&order.id).unwrap();
        let names: Vec<&str> = stages.iter().map(|s| s.name.as_str()).collect();
        assert_eq!(names, DEFAULT_STAGES);
        assert!(stages.iter().all(|s| s.status == StageStatus::Pending));
    }

    #[test]
    fn create_validates_input() {
        let f = Fixture::new();
        let who = Principal::system();
        let base = CreateProductionOrder {
            sales_order_id: None,
            product_item_id: f.product.clone(),
            quantity: dec!(10),
            priority: Some(Priority::High),
            planned_start: NaiveDate::from_ymd_opt(2026, 3, 10),
            planned_end: NaiveDate::from_ymd_opt(2026, 3, 1),
            stages: None,
            notes: None,
        };
        let err = f.svc.create_production_order(base.clone(), &who).unwrap_err();
        assert!(matches!(err, ServiceError::Validation(_)));

        let blank_stage = CreateProductionOrder { planned_end: None, stages: Some(vec!["Cut".into(), " ".into()]), ..base.clone() };
        assert!(f.svc.create_production_order(blank_stage, &who).is_err());

        let wrong_item = CreateProductionOrder {
            planned_end: None,
            product_item_id: f.fabric.clone(),
            sales_order_id: Some(f.confirmed_sales_order(dec!(10)).id),
            ..base
        };
        let err = f.svc.create_production_order(wrong_item, &who).unwrap_err();
        assert!(matches!(err, ServiceError::Validation(_)));
    }

    #[test]
    fn hold_resume_and_cancel() {
        let f = Fixture::new();
        let who = Principal::system();
        let order = f.ready_order(None, dec!(20));
        let stages = f.svc.list_stages(&order.id).unwrap();
        f.svc.start_stage(&stages[0].id, &who).unwrap();

        let held = f.svc.hold_production_order(&order.id, "machine down", &who).unwrap();
        assert_eq!(held.status, ProductionOrderStatus::OnHold);
        let blocked = f.svc.complete_stage(
            &stages[0].id,
            StageOutput { completed_quantity: dec!(20), rejected_quantity: dec!(0) },
            &who,
        );
        assert!(matches!(blocked, Err(ServiceError::InvalidState(_))));

        let resumed = f.svc.resume_production_order(&order.id, &who).unwrap();
        assert_eq!(resumed.status, ProductionOrderStatus::InProduction);
        assert!(resumed.hold_reason.is_none());

        let err = f.svc.cancel_production_order(&order.id, "customer cancelled", &who).unwrap_err();
        assert!(matches!(err, ServiceError::InvalidState(_)));
        f.svc.hold_production_order(&order.id, "waiting", &who).unwrap();
        let cancelled = f.svc.cancel_production_order(&order.id, "customer cancelled", &who).unwrap();
        assert_eq!(cancelled.cancel_reason.as_deref(), Some("customer cancelled"));
    }

    #[test]
    fn cancel_withdraws_pending_requests() {
        let f = Fixture::new();
        let who = Principal::system();
        let order = f.order(None, dec!(20));
        let mrn = f.request(Some(&order.id), dec!(40));
        f.svc.cancel_production_order(&order.id, "design changed", &who).unwrap();
        assert_eq!(f.svc.get_mrn(&mrn.id).unwrap().status, MrnStatus::Cancelled);
    }
}
