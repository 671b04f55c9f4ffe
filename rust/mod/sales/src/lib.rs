//! Sales: customers and sales orders.
//!
//! ```text
//! DRAFT ─► CONFIRMED ─► IN_PRODUCTION ─► READY_TO_SHIP ─► PARTIALLY_SHIPPED ─► SHIPPED ─► DELIVERED
//! ```
//!
//! Drafts and confirmed orders can be cancelled. Orders filled from stock go
//! straight from CONFIRMED to READY_TO_SHIP, and a single shipment can take
//! READY_TO_SHIP straight to SHIPPED.

pub mod api;
pub mod integrity;
pub mod model;
pub mod orders;
pub mod schema;
pub mod service;

use std::sync::Arc;

use axum::Router;
use garment_core::{Authenticator, Module};
use garment_sql::SQLStore;

pub use model::{Customer, SalesOrder, SalesOrderLine, SalesOrderStatus};
pub use service::SalesService;

pub struct SalesModule {
    service: Arc<SalesService>,
    auth: Arc<dyn Authenticator>,
}

impl SalesModule {
    pub fn new(db: Arc<dyn SQLStore>, auth: Arc<dyn Authenticator>) -> Self {
        Self {
            service: Arc::new(SalesService::new(db)),
            auth,
        }
    }
}

impl Module for SalesModule {
    fn name(&self) -> &str {
        "sales"
    }

    fn routes(&self) -> Router {
        api::router(api::AppState {
            svc: self.service.clone(),
            auth: self.auth.clone(),
        })
    }
}
