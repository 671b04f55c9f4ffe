use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use garment_core::status_enum;

/// Where stock lives unless a caller says otherwise.
pub const MAIN_LOCATION: &str = "MAIN";

/// Holding location for material rejected on verification.
pub const QUARANTINE_LOCATION: &str = "QUARANTINE";

status_enum! {
    pub enum ItemCategory {
        Fabric => "FABRIC",
        Trim => "TRIM",
        Accessory => "ACCESSORY",
        Packaging => "PACKAGING",
        FinishedGood => "FINISHED_GOOD",
        SemiFinished => "SEMI_FINISHED",
    }
}

status_enum! {
    /// Why a balance changed. Inbound kinds carry positive quantities,
    /// outbound kinds negative ones; adjustments may be either.
    pub enum MovementKind {
        Receipt => "RECEIPT",
        Issue => "ISSUE",
        Adjustment => "ADJUSTMENT",
        TransferIn => "TRANSFER_IN",
        TransferOut => "TRANSFER_OUT",
        ProductionOutput => "PRODUCTION_OUTPUT",
        ShipmentOut => "SHIPMENT_OUT",
        Return => "RETURN",
    }
}

impl MovementKind {
    /// The sign a quantity of this kind must have, `None` for either.
    pub fn direction(&self) -> Option<bool> {
        match self {
            Self::Receipt | Self::TransferIn | Self::ProductionOutput | Self::Return => Some(true),
            Self::Issue | Self::TransferOut | Self::ShipmentOut => Some(false),
            Self::Adjustment => None,
        }
    }
}

/// A stockable item: raw material, trim, packaging or finished garment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Item {
    pub id: String,
    pub code: String,
    pub name: String,
    pub category: ItemCategory,
    /// Unit of measure: `m`, `pcs`, `kg`, ...
    pub uom: String,
    #[serde(default)]
    pub reorder_level: Decimal,
    /// Free-form attributes such as color, size or GSM.
    #[serde(default, skip_serializing_if = "serde_json::Value::is_null")]
    pub attributes: serde_json::Value,
    pub active: bool,
    pub created_at: String,
    pub updated_at: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StockBalance {
    pub item_id: String,
    pub location: String,
    pub on_hand: Decimal,
    pub updated_at: String,
}

/// The document a movement was posted for.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Reference {
    /// `grn`, `material_dispatch`, `shipment`, ...
    pub kind: String,
    pub id: String,
    pub number: String,
}

impl Reference {
    pub fn new(kind: &str, id: &str, number: &str) -> Self {
        Self {
            kind: kind.to_string(),
            id: id.to_string(),
            number: number.to_string(),
        }
    }
}

/// One ledger row. The quantity is signed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StockMovement {
    pub id: String,
    pub item_id: String,
    pub item_code: String,
    pub location: String,
    pub quantity: Decimal,
    pub balance_after: Decimal,
    pub kind: MovementKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reference: Option<Reference>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub note: Option<String>,
    pub created_by: String,
    pub created_at: String,
}

/// Per-item view: every location plus the total.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ItemStock {
    pub item: Item,
    pub balances: Vec<StockBalance>,
    pub total: Decimal,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LowStockLine {
    pub item_id: String,
    pub code: String,
    pub name: String,
    pub on_hand: Decimal,
    pub reorder_level: Decimal,
    pub shortfall: Decimal,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct InventorySummary {
    pub items: i64,
    pub active_items: i64,
    pub locations: Vec<String>,
    pub low_stock: usize,
    pub movements_by_kind: Vec<(String, i64)>,
}

/// A balance rewritten from its movements by [`crate::integrity::recompute_balances`].
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BalanceFix {
    pub item_id: String,
    pub location: String,
    pub recorded: Decimal,
    pub ledger: Decimal,
}
