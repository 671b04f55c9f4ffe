use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use garment_core::{status_enum, Lifecycle};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Customer {
    pub id: String,
    pub code: String,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub contact_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub address: Option<String>,
    pub active: bool,
    pub created_at: String,
    pub updated_at: String,
}

status_enum! {
    pub enum SalesOrderStatus {
        Draft => "DRAFT",
        Confirmed => "CONFIRMED",
        InProduction => "IN_PRODUCTION",
        ReadyToShip => "READY_TO_SHIP",
        PartiallyShipped => "PARTIALLY_SHIPPED",
        Shipped => "SHIPPED",
        Delivered => "DELIVERED",
        Cancelled => "CANCELLED",
    }
}

impl Lifecycle for SalesOrderStatus {
    const ENTITY: &'static str = "sales_order";

    fn next_states(&self) -> &'static [Self] {
        use SalesOrderStatus::*;
        match self {
            Draft => &[Confirmed, Cancelled],
            // Stock-fulfilled orders skip production.
            Confirmed => &[InProduction, ReadyToShip, Cancelled],
            InProduction => &[ReadyToShip],
            ReadyToShip => &[PartiallyShipped, Shipped],
            PartiallyShipped => &[Shipped],
            Shipped => &[Delivered],
            Delivered | Cancelled => &[],
        }
    }
}

impl SalesOrderStatus {
    /// Confirmed and not yet fully shipped: counts toward open order value.
    pub fn is_open(&self) -> bool {
        matches!(
            self,
            Self::Confirmed | Self::InProduction | Self::ReadyToShip | Self::PartiallyShipped
        )
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SalesOrderLine {
    pub line_no: u32,
    pub item_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub quantity: Decimal,
    pub unit_price: Decimal,
    pub amount: Decimal,
    #[serde(default)]
    pub shipped_quantity: Decimal,
}

impl SalesOrderLine {
    pub fn unshipped(&self) -> Decimal {
        self.quantity - self.shipped_quantity
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SalesOrder {
    pub id: String,
    pub number: String,
    pub customer_id: String,
    pub order_date: NaiveDate,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub delivery_date: Option<NaiveDate>,
    pub lines: Vec<SalesOrderLine>,
    pub total_amount: Decimal,
    pub status: SalesOrderStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cancel_reason: Option<String>,
    pub created_by: String,
    pub created_at: String,
    pub updated_at: String,
}

impl SalesOrder {
    pub fn line(&self, line_no: u32) -> Option<&SalesOrderLine> {
        self.lines.iter().find(|l| l.line_no == line_no)
    }

    pub fn fully_shipped(&self) -> bool {
        self.lines.iter().all(|l| l.shipped_quantity >= l.quantity)
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SalesSummary {
    pub customers: i64,
    pub orders_by_status: Vec<(String, i64)>,
    pub open_order_value: Decimal,
}
