mod materials;
mod production;
mod stages;

use std::sync::Arc;

use rust_decimal::Decimal;

use garment_core::ServiceError;
use garment_sql::SQLStore;
use garment_store::{table, Value};

pub use materials::{CreateMrn, DispatchInput, MrnFilters, MrnLineInput, ReceiptInput, VerificationInput};
pub use production::{CreateProductionOrder, OrderFilters};
pub use stages::{OutsourceStage, StageOutput};

use crate::model::*;
use crate::schema::{MRNS, PRODUCTION_ORDERS, STAGES};

/// Production orders, their stages, and the material request flow feeding them.
pub struct ManufacturingService {
    db: Arc<dyn SQLStore>,
}

impl ManufacturingService {
    pub fn new(db: Arc<dyn SQLStore>) -> Self {
        Self { db }
    }

    pub fn summary(&self) -> Result<ManufacturingSummary, ServiceError> {
        let db = self.db.as_ref();
        let completed: Vec<ProductionOrder> = table::select(
            db,
            PRODUCTION_ORDERS,
            &[("status", Value::Text(ProductionOrderStatus::Completed.to_string()))],
        )?;
        Ok(ManufacturingSummary {
            orders_by_status: table::count_by(db, PRODUCTION_ORDERS, "status")?,
            orders_by_priority: table::count_by(db, PRODUCTION_ORDERS, "priority")?,
            stages_in_progress: table::count(db, STAGES, &[("status", Value::Text(StageStatus::InProgress.to_string()))])?,
            stages_outsourced: table::count(db, STAGES, &[("status", Value::Text(StageStatus::Outsourced.to_string()))])?,
            mrns_by_status: table::count_by(db, MRNS, "status")?,
            units_produced: completed.iter().map(|o| o.produced_quantity).sum::<Decimal>(),
        })
    }
}
