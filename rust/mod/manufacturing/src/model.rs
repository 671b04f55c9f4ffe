use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use garment_core::{status_enum, Lifecycle};

/// Stage names used when a production order is created without its own routing.
pub const DEFAULT_STAGES: &[&str] = &["Cutting", "Stitching", "Finishing", "Quality Check", "Packing"];

// ── Production orders ───────────────────────────────────────────────

status_enum! {
    pub enum Priority {
        Low => "LOW",
        Normal => "NORMAL",
        High => "HIGH",
        Urgent => "URGENT",
    }
}

impl Default for Priority {
    fn default() -> Self {
        Self::Normal
    }
}

status_enum! {
    pub enum ProductionOrderStatus {
        Planned => "PLANNED",
        MaterialRequested => "MATERIAL_REQUESTED",
        MaterialReady => "MATERIAL_READY",
        InProduction => "IN_PRODUCTION",
        OnHold => "ON_HOLD",
        Completed => "COMPLETED",
        Cancelled => "CANCELLED",
    }
}

impl Lifecycle for ProductionOrderStatus {
    const ENTITY: &'static str = "production_order";

    fn next_states(&self) -> &'static [Self] {
        use ProductionOrderStatus::*;
        match self {
            Planned => &[MaterialRequested, Cancelled],
            MaterialRequested => &[MaterialReady, Cancelled],
            MaterialReady => &[InProduction, Cancelled],
            InProduction => &[Completed, OnHold],
            OnHold => &[InProduction, Cancelled],
            Completed | Cancelled => &[],
        }
    }
}

impl ProductionOrderStatus {
    /// Stages can be worked on.
    pub fn allows_stage_work(&self) -> bool {
        matches!(self, Self::MaterialReady | Self::InProduction)
    }

    /// Material can still be requested for the order.
    pub fn accepts_material_requests(&self) -> bool {
        matches!(
            self,
            Self::Planned | Self::MaterialRequested | Self::MaterialReady | Self::InProduction
        )
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProductionOrder {
    pub id: String,
    pub number: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sales_order_id: Option<String>,
    pub product_item_id: String,
    pub quantity: Decimal,
    pub produced_quantity: Decimal,
    pub rejected_quantity: Decimal,
    pub priority: Priority,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub planned_start: Option<NaiveDate>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub planned_end: Option<NaiveDate>,
    pub status: ProductionOrderStatus,
    /// Number of stages in the routing.
    pub stages: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hold_reason: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cancel_reason: Option<String>,
    pub created_by: String,
    pub created_at: String,
    pub updated_at: String,
}

// ── Stages ──────────────────────────────────────────────────────────

status_enum! {
    pub enum StageStatus {
        Pending => "PENDING",
        InProgress => "IN_PROGRESS",
        Outsourced => "OUTSOURCED",
        Completed => "COMPLETED",
        Skipped => "SKIPPED",
    }
}

impl Lifecycle for StageStatus {
    const ENTITY: &'static str = "production_stage";

    fn next_states(&self) -> &'static [Self] {
        use StageStatus::*;
        match self {
            Pending => &[InProgress, Outsourced, Skipped],
            InProgress | Outsourced => &[Completed],
            Completed | Skipped => &[],
        }
    }
}

impl StageStatus {
    pub fn is_done(&self) -> bool {
        matches!(self, Self::Completed | Self::Skipped)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProductionStage {
    pub id: String,
    pub production_order_id: String,
    pub sequence: u32,
    pub name: String,
    pub status: StageStatus,
    pub input_quantity: Decimal,
    pub completed_quantity: Decimal,
    pub rejected_quantity: Decimal,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub vendor_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub outsource_note: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub started_at: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<String>,
    pub created_at: String,
    pub updated_at: String,
}

impl ProductionStage {
    /// `"PRD-2026-00001 #2 Stitching"`, used in messages and history.
    pub fn label(&self, order_number: &str) -> String {
        format!("{order_number} #{} {}", self.sequence, self.name)
    }
}

// ── Material requests ───────────────────────────────────────────────

status_enum! {
    pub enum MrnStatus {
        Pending => "PENDING",
        PartiallyDispatched => "PARTIALLY_DISPATCHED",
        Dispatched => "DISPATCHED",
        Received => "RECEIVED",
        Verified => "VERIFIED",
        Approved => "APPROVED",
        Cancelled => "CANCELLED",
    }
}

impl Lifecycle for MrnStatus {
    const ENTITY: &'static str = "material_request";

    fn next_states(&self) -> &'static [Self] {
        use MrnStatus::*;
        match self {
            Pending => &[PartiallyDispatched, Dispatched, Cancelled],
            PartiallyDispatched => &[Dispatched],
            Dispatched => &[Received],
            Received => &[Verified],
            Verified => &[Approved],
            Approved | Cancelled => &[],
        }
    }
}

impl MrnStatus {
    /// Not yet approved or cancelled.
    pub fn is_open(&self) -> bool {
        !self.is_terminal()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MrnLine {
    pub item_id: String,
    pub requested_quantity: Decimal,
    pub dispatched_quantity: Decimal,
    pub received_quantity: Decimal,
    pub accepted_quantity: Decimal,
    pub rejected_quantity: Decimal,
}

impl MrnLine {
    /// Requested but not yet dispatched.
    pub fn outstanding(&self) -> Decimal {
        self.requested_quantity - self.dispatched_quantity
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MaterialRequest {
    pub id: String,
    pub number: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub production_order_id: Option<String>,
    pub department: String,
    pub requested_by: String,
    pub lines: Vec<MrnLine>,
    pub status: MrnStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cancel_reason: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub approved_by: Option<String>,
    pub created_at: String,
    pub updated_at: String,
}

impl MaterialRequest {
    pub fn line(&self, item_id: &str) -> Option<&MrnLine> {
        self.lines.iter().find(|l| l.item_id == item_id)
    }

    pub fn fully_dispatched(&self) -> bool {
        self.lines.iter().all(|l| l.outstanding() <= Decimal::ZERO)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DispatchLine {
    pub item_id: String,
    pub quantity: Decimal,
}

/// Stock issued from inventory against an MRN.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MaterialDispatch {
    pub id: String,
    pub number: String,
    pub mrn_id: String,
    pub location: String,
    pub lines: Vec<DispatchLine>,
    pub dispatched_by: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
    pub created_at: String,
    pub updated_at: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReceiptLine {
    pub item_id: String,
    pub received_quantity: Decimal,
}

/// What the requesting department counted on arrival.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MaterialReceipt {
    pub id: String,
    pub number: String,
    pub mrn_id: String,
    pub lines: Vec<ReceiptLine>,
    pub received_by: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
    pub created_at: String,
    pub updated_at: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VerificationLine {
    pub item_id: String,
    pub accepted_quantity: Decimal,
    pub rejected_quantity: Decimal,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub remarks: Option<String>,
}

/// Quality split of received material. Rejected quantities go to quarantine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MaterialVerification {
    pub id: String,
    pub number: String,
    pub mrn_id: String,
    pub lines: Vec<VerificationLine>,
    pub verified_by: String,
    pub created_at: String,
    pub updated_at: String,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ManufacturingSummary {
    pub orders_by_status: Vec<(String, i64)>,
    pub orders_by_priority: Vec<(String, i64)>,
    pub stages_in_progress: i64,
    pub stages_outsourced: i64,
    pub mrns_by_status: Vec<(String, i64)>,
    pub units_produced: Decimal,
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn hold_and_resume_edges() {
        use ProductionOrderStatus::*;
        assert!(InProduction.can_transition_to(OnHold));
        assert!(OnHold.can_transition_to(InProduction));
        assert!(OnHold.can_transition_to(Cancelled));
        assert!(!InProduction.can_transition_to(Cancelled));
        assert!(!Planned.can_transition_to(InProduction));
    }

    #[test]
    fn stage_paths() {
        use StageStatus::*;
        assert!(Pending.can_transition_to(Outsourced));
        assert!(Outsourced.can_transition_to(Completed));
        assert!(!Skipped.can_transition_to(InProgress));
        assert!(Skipped.is_done() && Completed.is_done() && !InProgress.is_done());
    }

    #[test]
    fn mrn_dispatch_progress() {
        let mut mrn = MaterialRequest {
            id: "m".into(),
            number: "MRN-2026-00001".into(),
            production_order_id: None,
            department: "cutting".into(),
            requested_by: "u".into(),
            lines: vec![MrnLine {
                item_id: "fab".into(),
                requested_quantity: dec!(120),
                dispatched_quantity: dec!(80),
                received_quantity: dec!(0),
                accepted_quantity: dec!(0),
                rejected_quantity: dec!(0),
            }],
            status: MrnStatus::PartiallyDispatched,
            notes: None,
            cancel_reason: None,
            approved_by: None,
            created_at: String::new(),
            updated_at: String::new(),
        };
        assert_eq!(mrn.lines[0].outstanding(), dec!(40));
        assert!(!mrn.fully_dispatched());
        mrn.lines[0].dispatched_quantity = dec!(120);
        assert!(mrn.fully_dispatched());
        assert!(MrnStatus::Pending.can_transition_to(MrnStatus::Dispatched));
        assert!(!MrnStatus::Approved.is_open());
    }

    #[test]
    fn priority_defaults_to_normal() {
        assert_eq!(Priority::default(), Priority::Normal);
        assert_eq!(serde_json::to_string(&Priority::Urgent).unwrap(), "\"URGENT\"");
    }
}
