//! Procurement: vendors, purchase orders, goods receipts and vendor requests.
//!
//! ```text
//! PO:  DRAFT ─► PENDING_APPROVAL ─► APPROVED ─► SENT ─► PARTIALLY_RECEIVED ─► RECEIVED ─► CLOSED
//! GRN: DRAFT ─► RECEIVED ─► VERIFIED ─► APPROVED | REJECTED
//! ```
//!
//! Approving a GRN is the only way procured material enters stock. Shortages
//! and returned overage are followed up with the vendor as vendor requests,
//! which finance can settle with a credit note.

pub mod api;
pub mod documents;
pub mod integrity;
pub mod model;
pub mod schema;
pub mod service;

use std::sync::Arc;

use axum::Router;
use garment_core::{Authenticator, Module};
use garment_sql::SQLStore;

pub use model::{
    GoodsReceiptNote, GrnStatus, OverageDecision, PurchaseOrder, PurchaseOrderStatus, Vendor, VendorRequest,
    VendorRequestKind, VendorRequestStatus, VendorService,
};
pub use service::ProcurementService;

pub struct ProcurementModule {
    service: Arc<ProcurementService>,
    auth: Arc<dyn Authenticator>,
}

impl ProcurementModule {
    pub fn new(db: Arc<dyn SQLStore>, auth: Arc<dyn Authenticator>) -> Self {
        Self {
            service: Arc::new(ProcurementService::new(db)),
            auth,
        }
    }
}

impl Module for ProcurementModule {
    fn name(&self) -> &str {
        "procurement"
    }

    fn routes(&self) -> Router {
        api::router(api::AppState {
            svc: self.service.clone(),
            auth: self.auth.clone(),
        })
    }
}

#[cfg(test)]
pub(crate) mod testing {
    use std::sync::Arc;

    use garment_core::{new_id, now_rfc3339, Principal};
    use garment_inventory::{Item, ItemCategory};
    use garment_sql::SqliteStore;
    use garment_store::{migrate, table, Value};
    use rust_decimal::Decimal;

    use crate::model::*;
    use crate::service::*;

    /// A migrated in-memory store with one MATERIAL vendor and two items.
    pub struct Fixture {
        pub db: Arc<SqliteStore>,
        pub svc: ProcurementService,
        pub vendor: Vendor,
        pub fabric: String,
        pub trim: String,
    }

    impl Fixture {
        pub fn new() -> Self {
            let db = SqliteStore::open_in_memory().unwrap();
            migrate::apply(&db, migrate::BASE).unwrap();
            migrate::apply(&db, garment_inventory::schema::MIGRATIONS).unwrap();
            migrate::apply(&db, garment_sales::schema::MIGRATIONS).unwrap();
            migrate::apply(&db, crate::schema::MIGRATIONS).unwrap();
            let db = Arc::new(db);

            let fabric = item(&db, "FAB-TWILL", ItemCategory::Fabric, "m");
            let trim = item(&db, "TRM-BTN", ItemCategory::Trim, "pcs");

            let svc = ProcurementService::new(db.clone());
            let vendor = svc
                .create_vendor(CreateVendor {
                    code: "V-MILL".into(),
                    name: "Riverside Mills".into(),
                    services: vec![VendorService::Material],
                    contact_name: None,
                    email: None,
                    phone: None,
                    address: None,
                })
                .unwrap();

            Self { db, svc, vendor, fabric: fabric.id, trim: trim.id }
        }

        /// A DRAFT PO for fabric at 2.50 a metre, one line per quantity.
        pub fn draft_po(&self, quantities: &[Decimal]) -> PurchaseOrder {
            let lines = quantities
                .iter()
                .map(|q| PoLineInput {
                    item_id: self.fabric.clone(),
                    description: None,
                    quantity: *q,
                    unit_price: Decimal::new(250, 2),
                })
                .collect();
            self.svc
                .create_purchase_order(
                    CreatePurchaseOrder {
                        vendor_id: self.vendor.id.clone(),
                        sales_order_id: None,
                        order_date: None,
                        expected_date: None,
                        lines,
                        notes: None,
                    },
                    &Principal::system(),
                )
                .unwrap()
        }

        /// A PO that has been approved and sent to the vendor.
        pub fn sent_po(&self, quantities: &[Decimal]) -> PurchaseOrder {
            let who = Principal::system();
            let po = self.draft_po(quantities);
            self.svc.submit_purchase_order(&po.id, &who).unwrap();
            self.svc.approve_purchase_order(&po.id, &who).unwrap();
            self.svc.send_purchase_order(&po.id, &who).unwrap()
        }

        /// Receive `received` against a single-line PO for `ordered` and
        /// return the SHORTAGE request the approval opened.
        pub fn shortage_request(&self, ordered: Decimal, received: Decimal) -> VendorRequest {
            let who = Principal::system();
            let po = self.sent_po(&[ordered]);
            let grn = self
                .svc
                .create_grn(
                    CreateGrn {
                        purchase_order_id: po.id.clone(),
                        location: None,
                        lines: vec![GrnLineInput { po_line_no: 1, received_quantity: received, remarks: None }],
                        remarks: None,
                    },
                    &who,
                )
                .unwrap();
            self.svc.receive_grn(&grn.id, &who).unwrap();
            self.svc.verify_grn(&grn.id, &who).unwrap();
            self.svc.approve_grn(&grn.id, None, &who).unwrap();

            let mut found = self
                .svc
                .list_vendor_requests(
                    &RequestFilters { grn_id: Some(grn.id), ..Default::default() },
                    &Default::default(),
                )
                .unwrap();
            assert_eq!(found.total, 1);
            found.items.remove(0)
        }
    }

    fn item(db: &SqliteStore, code: &str, category: ItemCategory, uom: &str) -> Item {
        let item = Item {
            id: new_id(),
            code: code.to_string(),
            name: code.to_string(),
            category,
            uom: uom.into(),
            reorder_level: Decimal::ZERO,
            attributes: serde_json::Value::Null,
            active: true,
            created_at: now_rfc3339(),
            updated_at: now_rfc3339(),
        };
        table::insert(db, garment_inventory::schema::ITEMS, &item.id, &item, &[("code", Value::Text(item.code.clone()))])
            .unwrap();
        item
    }
}
