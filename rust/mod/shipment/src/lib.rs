//! Shipment: outbound deliveries against sales orders.
//!
//! ```text
//! DRAFT ─► PACKED ─► DISPATCHED ─► IN_TRANSIT ─► DELIVERED
//!   │        │            └──────────────────────► DELIVERED
//!   └────────┴─► CANCELLED                 └─────► RETURNED
//! ```
//!
//! Dispatch issues the stock and records shipped quantities on the sales
//! order. A return books the goods back into the shipping location.

pub mod api;
pub mod integrity;
pub mod model;
pub mod schema;
pub mod service;

use std::sync::Arc;

use axum::Router;
use garment_core::{Authenticator, Module};
use garment_sql::SQLStore;

pub use model::{Shipment, ShipmentLine, ShipmentStatus, ShipmentSummary};
pub use service::ShipmentService;

pub struct ShipmentModule {
    service: Arc<ShipmentService>,
    auth: Arc<dyn Authenticator>,
}

impl ShipmentModule {
    pub fn new(db: Arc<dyn SQLStore>, auth: Arc<dyn Authenticator>) -> Self {
        Self {
            service: Arc::new(ShipmentService::new(db)),
            auth,
        }
    }
}

impl Module for ShipmentModule {
    fn name(&self) -> &str {
        "shipment"
    }

    fn routes(&self) -> Router {
        api::router(api::AppState {
            svc: self.service.clone(),
            auth: self.auth.clone(),
        })
    }
}
