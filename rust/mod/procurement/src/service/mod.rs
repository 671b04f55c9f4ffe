mod grn;
mod purchase_orders;
mod vendor_requests;

use std::sync::Arc;

use rust_decimal::Decimal;
use serde::Deserialize;
use tracing::info;

use garment_core::{apply_patch, ensure_not_blank, new_id, now_rfc3339, ListParams, ListResult, ServiceError};
use garment_sql::SQLStore;
use garment_store::{table, Value};

pub use grn::{CreateGrn, GrnFilters, GrnLineInput};
pub use purchase_orders::{CreatePurchaseOrder, PoFilters, PoLineInput, UpdatePurchaseOrder};
pub use vendor_requests::RequestFilters;

use crate::documents;
use crate::model::*;
use crate::schema::{GRNS, PURCHASE_ORDERS, VENDORS, VENDOR_REQUESTS};

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateVendor {
    pub code: String,
    pub name: String,
    pub services: Vec<VendorService>,
    #[serde(default)]
    pub contact_name: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub phone: Option<String>,
    #[serde(default)]
    pub address: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VendorFilters {
    pub active: Option<bool>,
    pub service: Option<VendorService>,
}

/// Vendors, purchase orders, goods receipts and vendor requests.
pub struct ProcurementService {
    db: Arc<dyn SQLStore>,
}

impl ProcurementService {
    pub fn new(db: Arc<dyn SQLStore>) -> Self {
        Self { db }
    }

    // ── Vendors ─────────────────────────────────────────────────────

    pub fn create_vendor(&self, input: CreateVendor) -> Result<Vendor, ServiceError> {
        ensure_not_blank("code", &input.code)?;
        ensure_not_blank("name", &input.name)?;
        if input.services.is_empty() {
            return Err(ServiceError::Validation("a vendor needs at least one service".into()));
        }
        let now = now_rfc3339();
        let vendor = Vendor {
            id: new_id(),
            code: input.code.trim().to_string(),
            name: input.name.trim().to_string(),
            services: input.services,
            contact_name: input.contact_name,
            email: input.email,
            phone: input.phone,
            address: input.address,
            active: true,
            created_at: now.clone(),
            updated_at: now,
        };
        table::insert(self.db.as_ref(), VENDORS, &vendor.id, &vendor, &vendor_indexes(&vendor))
            .map_err(|e| match e {
                ServiceError::Conflict(_) => {
                    ServiceError::Conflict(format!("vendor code '{}' already exists", vendor.code))
                }
                other => other,
            })?;
        info!(code = %vendor.code, "vendor created");
        Ok(vendor)
    }

    pub fn get_vendor(&self, id: &str) -> Result<Vendor, ServiceError> {
        documents::get_vendor(self.db.as_ref(), id)
    }

    pub fn list_vendors(&self, filters: &VendorFilters, params: &ListParams) -> Result<ListResult<Vendor>, ServiceError> {
        let mut conds = Vec::new();
        if let Some(a) = filters.active {
            conds.push(("active", Value::Integer(a as i64)));
        }
        let mut page: ListResult<Vendor> = table::list(self.db.as_ref(), VENDORS, &conds, &["code", "name"], params)?;
        // Services live in the JSON document; filter after the fact.
        if let Some(s) = filters.service {
            page.items.retain(|v| v.offers(s));
            page.total = page.items.len();
        }
        Ok(page)
    }

    pub fn update_vendor(&self, id: &str, patch: serde_json::Value) -> Result<Vendor, ServiceError> {
        let current = self.get_vendor(id)?;
        let updated: Vendor = apply_patch(&current, patch, &["code"])?;
        ensure_not_blank("name", &updated.name)?;
        if updated.services.is_empty() {
            return Err(ServiceError::Validation("a vendor needs at least one service".into()));
        }
        table::update(self.db.as_ref(), VENDORS, id, &updated, &vendor_indexes(&updated))?;
        Ok(updated)
    }

    /// Vendors with purchase orders can only be deactivated.
    pub fn delete_vendor(&self, id: &str) -> Result<(), ServiceError> {
        let vendor = self.get_vendor(id)?;
        let orders = table::count(self.db.as_ref(), PURCHASE_ORDERS, &[("vendor_id", Value::Text(vendor.id.clone()))])?;
        if orders > 0 {
            return Err(ServiceError::InvalidState(format!(
                "vendor {} has {orders} purchase orders; deactivate it instead",
                vendor.code
            )));
        }
        table::delete(self.db.as_ref(), VENDORS, id)
    }

    pub fn summary(&self) -> Result<ProcurementSummary, ServiceError> {
        let db = self.db.as_ref();
        let mut committed_value = Decimal::ZERO;
        for status in PurchaseOrderStatus::ALL.iter().filter(|s| s.is_committed()) {
            let orders: Vec<PurchaseOrder> =
                table::select(db, PURCHASE_ORDERS, &[("status", Value::Text(status.to_string()))])?;
            committed_value += orders.iter().map(|o| o.total_amount).sum::<Decimal>();
        }
        let open_requests = table::count(db, VENDOR_REQUESTS, &[("status", Value::Text("OPEN".into()))])?
            + table::count(db, VENDOR_REQUESTS, &[("status", Value::Text("ACKNOWLEDGED".into()))])?;
        Ok(ProcurementSummary {
            vendors: table::count(db, VENDORS, &[])?,
            orders_by_status: table::count_by(db, PURCHASE_ORDERS, "status")?,
            committed_value,
            grns_by_status: table::count_by(db, GRNS, "status")?,
            open_vendor_requests: open_requests,
        })
    }
}

fn vendor_indexes(v: &Vendor) -> Vec<(&'static str, Value)> {
    vec![
        ("code", Value::Text(v.code.clone())),
        ("name", Value::Text(v.name.clone())),
        ("active", Value::Integer(v.active as i64)),
    ]
}
