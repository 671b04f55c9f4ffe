//! Inventory: items, per-location balances and the stock movement ledger.
//!
//! Other departments never write balances directly. They call
//! [`ledger::receive`], [`ledger::issue`] or [`ledger::post_movement`] with
//! their own open transaction.

pub mod api;
pub mod integrity;
pub mod ledger;
pub mod model;
pub mod schema;
pub mod service;

use std::sync::Arc;

use axum::Router;
use garment_core::{Authenticator, Module};
use garment_sql::SQLStore;

pub use model::{Item, ItemCategory, MovementKind, Reference, StockBalance, StockMovement, MAIN_LOCATION, QUARANTINE_LOCATION};
pub use service::InventoryService;

pub struct InventoryModule {
    service: Arc<InventoryService>,
    auth: Arc<dyn Authenticator>,
}

impl InventoryModule {
    pub fn new(db: Arc<dyn SQLStore>, auth: Arc<dyn Authenticator>) -> Self {
        Self {
            service: Arc::new(InventoryService::new(db)),
            auth,
        }
    }

    pub fn service(&self) -> Arc<InventoryService> {
        self.service.clone()
    }
}

impl Module for InventoryModule {
    fn name(&self) -> &str {
        "inventory"
    }

    fn routes(&self) -> Router {
        api::router(api::AppState {
            svc: self.service.clone(),
            auth: self.auth.clone(),
        })
    }
}
