use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use garment_core::{status_enum, Lifecycle};

status_enum! {
    pub enum ShipmentStatus {
        Draft => "DRAFT",
        Packed => "PACKED",
        Dispatched => "DISPATCHED",
        InTransit => "IN_TRANSIT",
        Delivered => "DELIVERED",
        Returned => "RETURNED",
        Cancelled => "CANCELLED",
    }
}

impl Lifecycle for ShipmentStatus {
    const ENTITY: &'static str = "shipment";

    fn next_states(&self) -> &'static [Self] {
        use ShipmentStatus::*;
        match self {
            Draft => &[Packed, Cancelled],
            Packed => &[Dispatched, Cancelled],
            // Local deliveries skip the carrier leg.
            Dispatched => &[InTransit, Delivered],
            InTransit => &[Delivered, Returned],
            Delivered | Returned | Cancelled => &[],
        }
    }
}

impl ShipmentStatus {
    /// Created but stock not yet issued; its quantities are spoken for.
    pub fn is_pending(&self) -> bool {
        matches!(self, Self::Draft | Self::Packed)
    }

    /// Stock has left the warehouse.
    pub fn has_left(&self) -> bool {
        matches!(self, Self::Dispatched | Self::InTransit | Self::Delivered | Self::Returned)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ShipmentLine {
    pub so_line_no: u32,
    pub item_id: String,
    pub quantity: Decimal,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Shipment {
    pub id: String,
    pub number: String,
    pub sales_order_id: String,
    pub customer_id: String,
    pub lines: Vec<ShipmentLine>,
    pub location: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub carrier: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tracking_number: Option<String>,
    pub status: ShipmentStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cancel_reason: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub return_reason: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub shipped_at: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub delivered_at: Option<String>,
    pub created_by: String,
    pub created_at: String,
    pub updated_at: String,
}

impl Shipment {
    pub fn total_quantity(&self) -> Decimal {
        self.lines.iter().map(|l| l.quantity).sum()
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ShipmentSummary {
    pub by_status: Vec<(String, i64)>,
    pub awaiting_dispatch: i64,
    pub in_transit: i64,
}
