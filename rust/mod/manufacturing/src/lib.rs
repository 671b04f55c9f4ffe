//! Manufacturing: production orders, their stages, and material requests.
//!
//! ```text
//! MRN:   PENDING ─► PARTIALLY_DISPATCHED ─► DISPATCHED ─► RECEIVED ─► VERIFIED ─► APPROVED
//! Order: PLANNED ─► MATERIAL_REQUESTED ─► MATERIAL_READY ─► IN_PRODUCTION ─► COMPLETED
//!                                                              ▲     │
//!                                                              └─ ON_HOLD
//! ```
//!
//! Raising an MRN for a planned order moves it to MATERIAL_REQUESTED; approving
//! the last open MRN makes it MATERIAL_READY. Starting the first stage puts the
//! order (and its sales order) into production, and completing the last stage
//! books the output into stock.

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
    MaterialRequest, MrnStatus, Priority, ProductionOrder, ProductionOrderStatus, ProductionStage, StageStatus,
};
pub use service::ManufacturingService;

pub struct ManufacturingModule {
    service: Arc<ManufacturingService>,
    auth: Arc<dyn Authenticator>,
}

impl ManufacturingModule {
    pub fn new(db: Arc<dyn SQLStore>, auth: Arc<dyn Authenticator>) -> Self {
        Self {
            service: Arc::new(ManufacturingService::new(db)),
            auth,
        }
    }
}

impl Module for ManufacturingModule {
    fn name(&self) -> &str {
        "manufacturing"
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

    use garment_core::{new_id, now_rfc3339, Principal, ServiceError};
    use garment_inventory::{ledger, Item, ItemCategory, MovementKind, MAIN_LOCATION};
    use garment_procurement::service::CreateVendor;
    use garment_procurement::{ProcurementService, VendorService};
    use garment_sales::service::{CreateCustomer, CreateSalesOrder, OrderLineInput};
    use garment_sales::{SalesOrder, SalesService};
    use garment_sql::SqliteStore;
    use garment_store::{migrate, table, Value};
    use rust_decimal::Decimal;

    use crate::model::*;
    use crate::service::*;

    /// Migrated store with a finished-good product, 1000 m of fabric at MAIN
    /// and an embroidery vendor.
    pub struct Fixture {
        pub db: Arc<SqliteStore>,
        pub svc: ManufacturingService,
        pub product: String,
        pub fabric: String,
        pub embroiderer: String,
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

            let product = item(&db, "FG-POLO-M", ItemCategory::FinishedGood, "pcs");
            let fabric = item(&db, "FAB-PIQUE", ItemCategory::Fabric, "m");
            ledger::receive(
                db.as_ref(),
                &fabric.id,
                MAIN_LOCATION,
                Decimal::from(1000),
                MovementKind::Receipt,
                None,
                &Principal::system(),
            )
            .unwrap();

            let embroiderer = ProcurementService::new(db.clone())
                .create_vendor(CreateVendor {
                    code: "V-EMB".into(),
                    name: "Stitchcraft".into(),
                    services: vec![VendorService::Embroidery],
                    contact_name: None,
                    email: None,
                    phone: None,
                    address: None,
                })
                .unwrap();

            Self {
                svc: ManufacturingService::new(db.clone()),
                db,
                product: product.id,
                fabric: fabric.id,
                embroiderer: embroiderer.id,
            }
        }

        pub fn order(&self, sales_order_id: Option<&str>, quantity: Decimal) -> ProductionOrder {
            self.svc
                .create_production_order(
                    CreateProductionOrder {
                        sales_order_id: sales_order_id.map(str::to_string),
                        product_item_id: self.product.clone(),
                        quantity,
                        priority: None,
                        planned_start: None,
                        planned_end: None,
                        stages: None,
                        notes: None,
                    },
                    &Principal::system(),
                )
                .unwrap()
        }

        /// An MRN for `quantity` of fabric.
        pub fn request(&self, order_id: Option<&str>, quantity: Decimal) -> MaterialRequest {
            self.svc
                .create_mrn(
                    CreateMrn {
                        production_order_id: order_id.map(str::to_string),
                        department: "cutting".into(),
                        lines: vec![MrnLineInput { item_id: self.fabric.clone(), quantity }],
                        notes: None,
                    },
                    &Principal::system(),
                )
                .unwrap()
        }

        pub fn dispatch(&self, mrn_id: &str, quantity: Decimal) -> Result<MaterialDispatch, ServiceError> {
            self.svc.dispatch_mrn(
                mrn_id,
                DispatchInput {
                    location: None,
                    lines: vec![DispatchLine { item_id: self.fabric.clone(), quantity }],
                    notes: None,
                },
                &Principal::system(),
            )
        }

        /// Dispatch, receive, verify (all accepted) and approve.
        pub fn approve_all(&self, mrn: &MaterialRequest, quantity: Decimal) {
            let who = Principal::system();
            self.dispatch(&mrn.id, quantity).unwrap();
            self.svc
                .receive_mrn(
                    &mrn.id,
                    ReceiptInput {
                        lines: vec![ReceiptLine { item_id: self.fabric.clone(), received_quantity: quantity }],
                        notes: None,
                    },
                    &who,
                )
                .unwrap();
            self.svc
                .verify_mrn(
                    &mrn.id,
                    VerificationInput {
                        lines: vec![VerificationLine {
                            item_id: self.fabric.clone(),
                            accepted_quantity: quantity,
                            rejected_quantity: Decimal::ZERO,
                            remarks: None,
                        }],
                    },
                    &who,
                )
                .unwrap();
            self.svc.approve_mrn(&mrn.id, &who).unwrap();
        }

        /// A MATERIAL_READY order.
        pub fn ready_order(&self, sales_order_id: Option<&str>, quantity: Decimal) -> ProductionOrder {
            let order = self.order(sales_order_id, quantity);
            let mrn = self.request(Some(&order.id), Decimal::from(10));
            self.approve_all(&mrn, Decimal::from(10));
            self.svc.get_production_order(&order.id).unwrap()
        }

        /// Start and complete every stage with no rejects.
        pub fn run_all_stages(&self, order: &ProductionOrder) {
            let who = Principal::system();
            for stage in self.svc.list_stages(&order.id).unwrap() {
                let started = self.svc.start_stage(&stage.id, &who).unwrap();
                self.svc
                    .complete_stage(
                        &stage.id,
                        StageOutput { completed_quantity: started.input_quantity, rejected_quantity: Decimal::ZERO },
                        &who,
                    )
                    .unwrap();
            }
        }

        /// A CONFIRMED sales order for `quantity` of the product.
        pub fn confirmed_sales_order(&self, quantity: Decimal) -> SalesOrder {
            let who = Principal::system();
            let sales = SalesService::new(self.db.clone());
            let customer = sales
                .create_customer(CreateCustomer {
                    code: format!("C-{}", &new_id()[..8]),
                    name: "Harbour Outfitters".into(),
                    contact_name: None,
                    email: None,
                    phone: None,
                    address: None,
                })
                .unwrap();
            let order = sales
                .create_order(
                    CreateSalesOrder {
                        customer_id: customer.id,
                        order_date: None,
                        delivery_date: None,
                        lines: vec![OrderLineInput {
                            item_id: self.product.clone(),
                            description: None,
                            quantity,
                            unit_price: Decimal::from(12),
                        }],
                        notes: None,
                    },
                    &who,
                )
                .unwrap();
            sales.confirm(&order.id, &who).unwrap()
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
