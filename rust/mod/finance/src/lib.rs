//! Finance: credit notes and a money view over the other departments.
//!
//! ```text
//! DRAFT ─► ISSUED ─► APPLIED
//!   └────► CANCELLED
//! ```
//!
//! A credit note created from a vendor request resolves that request in the
//! same transaction; each request yields at most one note.

pub mod api;
pub mod integrity;
pub mod model;
pub mod schema;
pub mod service;

use std::sync::Arc;

use axum::Router;
use garment_core::{Authenticator, Module};
use garment_sql::SQLStore;

pub use model::{CreditNote, CreditNoteLine, CreditNoteStatus, FinanceSummary, Party};
pub use service::FinanceService;

pub struct FinanceModule {
    service: Arc<FinanceService>,
    auth: Arc<dyn Authenticator>,
}

impl FinanceModule {
    pub fn new(db: Arc<dyn SQLStore>, auth: Arc<dyn Authenticator>) -> Self {
        Self {
            service: Arc::new(FinanceService::new(db)),
            auth,
        }
    }
}

impl Module for FinanceModule {
    fn name(&self) -> &str {
        "finance"
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
    use garment_procurement::service::{
        CreateGrn, CreatePurchaseOrder, CreateVendor, GrnLineInput, PoLineInput, RequestFilters,
    };
    use garment_procurement::{ProcurementService, PurchaseOrder, VendorRequest, VendorService};
    use garment_sales::service::CreateCustomer;
    use garment_sales::SalesService;
    use garment_sql::SqliteStore;
    use garment_store::{migrate, table, Value};
    use rust_decimal::Decimal;

    use crate::service::FinanceService;

    /// Every upstream schema, a fabric item bought at 2.50 a metre from one
    /// mill, and one customer.
    pub struct Fixture {
        pub db: Arc<SqliteStore>,
        pub svc: FinanceService,
        pub procurement: ProcurementService,
        pub vendor: String,
        pub customer: String,
        pub fabric: String,
    }

    impl Fixture {
        pub fn new() -> Self {
            let db = SqliteStore::open_in_memory().unwrap();
            migrate::apply(&db, migrate::BASE).unwrap();
            migrate::apply(&db, garment_inventory::schema::MIGRATIONS).unwrap();
            migrate::apply(&db, garment_sales::schema::MIGRATIONS).unwrap();
            migrate::apply(&db, garment_procurement::schema::MIGRATIONS).unwrap();
            migrate::apply(&db, crate::schema::MIGRATIONS).unwrap();
            let db = Arc::new(db);

            let fabric = Item {
                id: new_id(),
                code: "FAB-OXFORD".into(),
                name: "Oxford shirting".into(),
                category: ItemCategory::Fabric,
                uom: "m".into(),
                reorder_level: Decimal::ZERO,
                attributes: serde_json::Value::Null,
                active: true,
                created_at: now_rfc3339(),
                updated_at: now_rfc3339(),
            };
            table::insert(
                db.as_ref(),
                garment_inventory::schema::ITEMS,
                &fabric.id,
                &fabric,
                &[("code", Value::Text(fabric.code.clone()))],
            )
            .unwrap();

            let procurement = ProcurementService::new(db.clone());
            let vendor = procurement
                .create_vendor(CreateVendor {
                    code: "V-WEAVE".into(),
                    name: "Delta Weavers".into(),
                    services: vec![VendorService::Material],
                    contact_name: None,
                    email: None,
                    phone: None,
                    address: None,
                })
                .unwrap();
            let customer = SalesService::new(db.clone())
                .create_customer(CreateCustomer {
                    code: "C-ALPINE".into(),
                    name: "Alpine Outdoor".into(),
                    contact_name: None,
                    email: None,
                    phone: None,
                    address: None,
                })
                .unwrap();

            Self {
                svc: FinanceService::new(db.clone()),
                procurement,
                db,
                vendor: vendor.id,
                customer: customer.id,
                fabric: fabric.id,
            }
        }

        pub fn sent_po(&self, quantity: Decimal) -> PurchaseOrder {
            let who = Principal::system();
            let po = self
                .procurement
                .create_purchase_order(
                    CreatePurchaseOrder {
                        vendor_id: self.vendor.clone(),
                        sales_order_id: None,
                        order_date: None,
                        expected_date: None,
                        lines: vec![PoLineInput {
                            item_id: self.fabric.clone(),
                            description: None,
                            quantity,
                            unit_price: Decimal::new(250, 2),
                        }],
                        notes: None,
                    },
                    &who,
                )
                .unwrap();
            self.procurement.submit_purchase_order(&po.id, &who).unwrap();
            self.procurement.approve_purchase_order(&po.id, &who).unwrap();
            self.procurement.send_purchase_order(&po.id, &who).unwrap()
        }

        /// The SHORTAGE request opened by receiving `received` of `ordered`.
        pub fn shortage_request(&self, ordered: Decimal, received: Decimal) -> VendorRequest {
            let who = Principal::system();
            let po = self.sent_po(ordered);
            let grn = self
                .procurement
                .create_grn(
                    CreateGrn {
                        purchase_order_id: po.id,
                        location: None,
                        lines: vec![GrnLineInput { po_line_no: 1, received_quantity: received, remarks: None }],
                        remarks: None,
                    },
                    &who,
                )
                .unwrap();
            self.procurement.receive_grn(&grn.id, &who).unwrap();
            self.procurement.verify_grn(&grn.id, &who).unwrap();
            self.procurement.approve_grn(&grn.id, None, &who).unwrap();
            self.procurement
                .list_vendor_requests(&RequestFilters { grn_id: Some(grn.id), ..Default::default() }, &Default::default())
                .unwrap()
                .items
                .remove(0)
        }
    }
}
