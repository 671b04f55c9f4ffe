use std::sync::Arc;

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::Deserialize;
use tracing::info;

use garment_core::{
    apply_patch, ensure_non_negative, ensure_not_blank, ensure_positive, new_id, now_rfc3339,
    ListParams, ListResult, Principal, ServiceError,
};
use garment_inventory::Item;
use garment_sql::SQLStore;
use garment_store::{begin, commit, history, numbering, table, Executor, Value};

use crate::model::*;
use crate::orders::{self, save, save_transition};
use crate::schema::{CUSTOMERS, ORDERS};

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateCustomer {
    pub code: String,
    pub name: String,
    #[serde(default)]
    pub contact_name: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub phone: Option<String>,
    #[serde(default)]
    pub address: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderLineInput {
    pub item_id: String,
    #[serde(default)]
    pub description: Option<String>,
    pub quantity: Decimal,
    pub unit_price: Decimal,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateSalesOrder {
    pub customer_id: String,
    #[serde(default)]
    pub order_date: Option<NaiveDate>,
    #[serde(default)]
    pub delivery_date: Option<NaiveDate>,
    pub lines: Vec<OrderLineInput>,
    #[serde(default)]
    pub notes: Option<String>,
}

/// Draft edits. Omitted fields are left unchanged.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateSalesOrder {
    #[serde(default)]
    pub delivery_date: Option<NaiveDate>,
    #[serde(default)]
    pub lines: Option<Vec<OrderLineInput>>,
    #[serde(default)]
    pub notes: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderFilters {
    pub status: Option<SalesOrderStatus>,
    pub customer_id: Option<String>,
}

pub struct SalesService {
    db: Arc<dyn SQLStore>,
}

impl SalesService {
    pub fn new(db: Arc<dyn SQLStore>) -> Self {
        Self { db }
    }

    // ── Customers ───────────────────────────────────────────────────

    pub fn create_customer(&self, input: CreateCustomer) -> Result<Customer, ServiceError> {
        ensure_not_blank("code", &input.code)?;
        ensure_not_blank("name", &input.name)?;
        let now = now_rfc3339();
        let customer = Customer {
            id: new_id(),
            code: input.code.trim().to_string(),
            name: input.name.trim().to_string(),
            contact_name: input.contact_name,
            email: input.email,
            phone: input.phone,
            address: input.address,
            active: true,
            created_at: now.clone(),
            updated_at: now,
        };
        table::insert(self.db.as_ref(), CUSTOMERS, &customer.id, &customer, &customer_indexes(&customer))
            .map_err(|e| match e {
                ServiceError::Conflict(_) => {
                    ServiceError::Conflict(format!("customer code '{}' already exists", customer.code))
                }
                other => other,
            })?;
        info!(code = %customer.code, "customer created");
        Ok(customer)
    }

    pub fn get_customer(&self, id: &str) -> Result<Customer, ServiceError> {
        table::get(self.db.as_ref(), CUSTOMERS, id)
    }

    pub fn list_customers(&self, active: Option<bool>, params: &ListParams) -> Result<ListResult<Customer>, ServiceError> {
        let mut conds = Vec::new();
        if let Some(a) = active {
            conds.push(("active", Value::Integer(a as i64)));
        }
        table::list(self.db.as_ref(), CUSTOMERS, &conds, &["code", "name"], params)
    }

    pub fn update_customer(&self, id: &str, patch: serde_json::Value) -> Result<Customer, ServiceError> {
        let current = self.get_customer(id)?;
        let updated: Customer = apply_patch(&current, patch, &["code"])?;
        ensure_not_blank("name", &updated.name)?;
        table::update(self.db.as_ref(), CUSTOMERS, id, &updated, &customer_indexes(&updated))?;
        Ok(updated)
    }

    /// Customers with orders can only be deactivated.
    pub fn delete_customer(&self, id: &str) -> Result<(), ServiceError> {
        let customer = self.get_customer(id)?;
        let orders = table::count(self.db.as_ref(), ORDERS, &[("customer_id", Value::Text(customer.id.clone()))])?;
        if orders > 0 {
            return Err(ServiceError::InvalidState(format!(
                "customer {} has {orders} sales orders; deactivate it instead",
                customer.code
            )));
        }
        table::delete(self.db.as_ref(), CUSTOMERS, id)
    }

    // ── Orders ──────────────────────────────────────────────────────

    pub fn create_order(&self, input: CreateSalesOrder, actor: &Principal) -> Result<SalesOrder, ServiceError> {
        let tx = begin(self.db.as_ref())?;
        let customer: Customer = table::get(&*tx, CUSTOMERS, &input.customer_id)?;
        if !customer.active {
            return Err(ServiceError::Validation(format!("customer {} is inactive", customer.code)));
        }
        let lines = build_lines(&*tx, &input.lines)?;
        if let (Some(order_date), Some(delivery)) = (input.order_date, input.delivery_date) {
            if delivery < order_date {
                return Err(ServiceError::Validation("deliveryDate is before orderDate".into()));
            }
        }

        let now = now_rfc3339();
        let order = SalesOrder {
            id: new_id(),
            number: numbering::next_number(&*tx, "SO")?,
            customer_id: customer.id,
            order_date: input.order_date.unwrap_or_else(|| chrono::Utc::now().date_naive()),
            delivery_date: input.delivery_date,
            total_amount: total(&lines),
            lines,
            status: SalesOrderStatus::Draft,
            notes: input.notes,
            cancel_reason: None,
            created_by: actor.user_id.clone(),
            created_at: now.clone(),
            updated_at: now,
        };
        table::insert(
            &*tx,
            ORDERS,
            &order.id,
            &order,
            &[
                ("number", Value::Text(order.number.clone())),
                ("customer_id", Value::Text(order.customer_id.clone())),
                ("status", Value::Text(order.status.to_string())),
            ],
        )?;
        history::record(&*tx, &order.id, None, order.status, actor, None)?;
        commit(tx)?;
        info!(number = %order.number, customer = %customer.code, total = %order.total_amount, "sales order created");
        Ok(order)
    }

    pub fn get_order(&self, id: &str) -> Result<SalesOrder, ServiceError> {
        orders::get_order(self.db.as_ref(), id)
    }

    pub fn list_orders(&self, filters: &OrderFilters, params: &ListParams) -> Result<ListResult<SalesOrder>, ServiceError> {
        let mut conds = Vec::new();
        if let Some(s) = filters.status {
            conds.push(("status", Value::Text(s.to_string())));
        }
        if let Some(c) = &filters.customer_id {
            conds.push(("customer_id", Value::Text(c.clone())));
        }
        table::list(self.db.as_ref(), ORDERS, &conds, &["number"], params)
    }

    /// Only drafts are editable. Replacing lines recomputes the total.
    pub fn update_order(&self, id: &str, input: UpdateSalesOrder) -> Result<SalesOrder, ServiceError> {
        let tx = begin(self.db.as_ref())?;
        let mut order = orders::get_order(&*tx, id)?;
        if order.status != SalesOrderStatus::Draft {
            return Err(ServiceError::InvalidState(format!(
                "sales order {} is {}; only drafts can be edited",
                order.number, order.status
            )));
        }
        if let Some(lines) = &input.lines {
            order.lines = build_lines(&*tx, lines)?;
            order.total_amount = total(&order.lines);
        }
        if let Some(d) = input.delivery_date {
            if d < order.order_date {
                return Err(ServiceError::Validation("deliveryDate is before orderDate".into()));
            }
            order.delivery_date = Some(d);
        }
        if input.notes.is_some() {
            order.notes = input.notes;
        }
        order.updated_at = now_rfc3339();
        save(&*tx, &order)?;
        commit(tx)?;
        Ok(order)
    }

    pub fn confirm(&self, id: &str, actor: &Principal) -> Result<SalesOrder, ServiceError> {
        self.transition(id, SalesOrderStatus::Confirmed, actor, None)
    }

    pub fn cancel(&self, id: &str, reason: &str, actor: &Principal) -> Result<SalesOrder, ServiceError> {
        ensure_not_blank("reason", reason)?;
        let tx = begin(self.db.as_ref())?;
        let mut order = orders::get_order(&*tx, id)?;
        order.cancel_reason = Some(reason.to_string());
        save_transition(&*tx, &mut order, SalesOrderStatus::Cancelled, actor, Some(reason))?;
        commit(tx)?;
        Ok(order)
    }

    /// For orders fulfilled from stock, without production.
    pub fn mark_ready_to_ship(&self, id: &str, actor: &Principal) -> Result<SalesOrder, ServiceError> {
        self.transition(id, SalesOrderStatus::ReadyToShip, actor, None)
    }

    fn transition(
        &self,
        id: &str,
        next: SalesOrderStatus,
        actor: &Principal,
        note: Option<&str>,
    ) -> Result<SalesOrder, ServiceError> {
        let tx = begin(self.db.as_ref())?;
        let mut order = orders::get_order(&*tx, id)?;
        save_transition(&*tx, &mut order, next, actor, note)?;
        commit(tx)?;
        Ok(order)
    }

    pub fn summary(&self) -> Result<SalesSummary, ServiceError> {
        let db = self.db.as_ref();
        let mut open_order_value = Decimal::ZERO;
        for status in SalesOrderStatus::ALL.iter().filter(|s| s.is_open()) {
            let open: Vec<SalesOrder> = table::select(db, ORDERS, &[("status", Value::Text(status.to_string()))])?;
            open_order_value += open.iter().map(|o| o.total_amount).sum::<Decimal>();
        }
        Ok(SalesSummary {
            customers: table::count(db, CUSTOMERS, &[])?,
            orders_by_status: table::count_by(db, ORDERS, "status")?,
            open_order_value,
        })
    }
}

fn customer_indexes(c: &Customer) -> Vec<(&'static str, Value)> {
    vec![
        ("code", Value::Text(c.code.clone())),
        ("name", Value::Text(c.name.clone())),
        ("active", Value::Integer(c.active as i64)),
    ]
}

fn build_lines<E>(db: &E, input: &[OrderLineInput]) -> Result<Vec<SalesOrderLine>, ServiceError>
where
    E: Executor + ?Sized,
{
    if input.is_empty() {
        return Err(ServiceError::Validation("a sales order needs at least one line".into()));
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
            Ok(SalesOrderLine {
                line_no: i as u32 + 1,
                item_id: item.id,
                description: l.description.clone().or(Some(item.name)),
                quantity: l.quantity,
                unit_price: l.unit_price,
                amount: l.quantity * l.unit_price,
                shipped_quantity: Decimal::ZERO,
            })
        })
        .collect()
}

fn total(lines: &[SalesOrderLine]) -> Decimal {
    lines.iter().map(|l| l.amount).sum()
}
