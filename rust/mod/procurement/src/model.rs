use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use garment_core::{status_enum, Lifecycle};

// ── Vendors ─────────────────────────────────────────────────────────

status_enum! {
    /// What a vendor can be engaged for. Material vendors supply stock;
    /// the rest take outsourced production stages.
    pub enum VendorService {
        Material => "MATERIAL",
        Embroidery => "EMBROIDERY",
        Printing => "PRINTING",
        Stitching => "STITCHING",
        Washing => "WASHING",
        Finishing => "FINISHING",
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Vendor {
    pub id: String,
    pub code: String,
    pub name: String,
    pub services: Vec<VendorService>,
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

impl Vendor {
    pub fn offers(&self, service: VendorService) -> bool {
        self.services.contains(&service)
    }
}

// ── Purchase orders ─────────────────────────────────────────────────

status_enum! {
    pub enum PurchaseOrderStatus {
        Draft => "DRAFT",
        PendingApproval => "PENDING_APPROVAL",
        Approved => "APPROVED",
        Sent => "SENT",
        PartiallyReceived => "PARTIALLY_RECEIVED",
        Received => "RECEIVED",
        Closed => "CLOSED",
        Cancelled => "CANCELLED",
    }
}

impl Lifecycle for PurchaseOrderStatus {
    const ENTITY: &'static str = "purchase_order";

    fn next_states(&self) -> &'static [Self] {
        use PurchaseOrderStatus::*;
        match self {
            Draft => &[PendingApproval, Cancelled],
            PendingApproval => &[Approved, Cancelled],
            Approved => &[Sent, Cancelled],
            Sent => &[PartiallyReceived, Received, Cancelled],
            // Short-close when the balance will never arrive.
            PartiallyReceived => &[Received, Closed],
            Received => &[Closed],
            Closed | Cancelled => &[],
        }
    }
}

impl PurchaseOrderStatus {
    /// Approved and not finished: counts toward committed spend.
    pub fn is_committed(&self) -> bool {
        matches!(self, Self::Approved | Self::Sent | Self::PartiallyReceived)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PurchaseOrderLine {
    pub line_no: u32,
    pub item_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub quantity: Decimal,
    pub unit_price: Decimal,
    pub amount: Decimal,
    #[serde(default)]
    pub received_quantity: Decimal,
}

impl PurchaseOrderLine {
    /// Still expected from the vendor; never negative.
    pub fn outstanding(&self) -> Decimal {
        (self.quantity - self.received_quantity).max(Decimal::ZERO)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PurchaseOrder {
    pub id: String,
    pub number: String,
    pub vendor_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sales_order_id: Option<String>,
    pub order_date: NaiveDate,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expected_date: Option<NaiveDate>,
    pub lines: Vec<PurchaseOrderLine>,
    pub total_amount: Decimal,
    pub status: PurchaseOrderStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cancel_reason: Option<String>,
    pub created_by: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub approved_by: Option<String>,
    pub created_at: String,
    pub updated_at: String,
}

impl PurchaseOrder {
    pub fn line(&self, line_no: u32) -> Option<&PurchaseOrderLine> {
        self.lines.iter().find(|l| l.line_no == line_no)
    }

    pub fn fully_received(&self) -> bool {
        self.lines.iter().all(|l| l.received_quantity >= l.quantity)
    }

    pub fn anything_received(&self) -> bool {
        self.lines.iter().any(|l| l.received_quantity > Decimal::ZERO)
    }
}

// ── Goods receipt notes ─────────────────────────────────────────────

status_enum! {
    pub enum GrnStatus {
        Draft => "DRAFT",
        Received => "RECEIVED",
        Verified => "VERIFIED",
        Approved => "APPROVED",
        Rejected => "REJECTED",
    }
}

impl Lifecycle for GrnStatus {
    const ENTITY: &'static str = "goods_receipt_note";

    fn next_states(&self) -> &'static [Self] {
        use GrnStatus::*;
        match self {
            Draft => &[Received, Rejected],
            Received => &[Verified, Rejected],
            Verified => &[Approved, Rejected],
            Approved | Rejected => &[],
        }
    }
}

status_enum! {
    /// What to do with material received beyond the PO quantity.
    pub enum OverageDecision {
        Accept => "ACCEPT",
        Return => "RETURN",
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GrnLine {
    pub po_line_no: u32,
    pub item_id: String,
    /// Ordered minus already received, as of the last verification.
    pub expected_quantity: Decimal,
    pub received_quantity: Decimal,
    #[serde(default)]
    pub accepted_quantity: Decimal,
    #[serde(default)]
    pub shortage_quantity: Decimal,
    #[serde(default)]
    pub overage_quantity: Decimal,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub remarks: Option<String>,
}

impl GrnLine {
    /// Recompute shortage and overage against `expected`.
    pub fn reconcile(&mut self, expected: Decimal) {
        self.expected_quantity = expected;
        self.shortage_quantity = (expected - self.received_quantity).max(Decimal::ZERO);
        self.overage_quantity = (self.received_quantity - expected).max(Decimal::ZERO);
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GoodsReceiptNote {
    pub id: String,
    pub number: String,
    pub purchase_order_id: String,
    pub vendor_id: String,
    /// Stock location the accepted material is received into.
    pub location: String,
    pub lines: Vec<GrnLine>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub overage_decision: Option<OverageDecision>,
    pub status: GrnStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub remarks: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub received_by: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub verified_by: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub approved_by: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rejection_reason: Option<String>,
    pub created_by: String,
    pub created_at: String,
    pub updated_at: String,
}

impl GoodsReceiptNote {
    pub fn has_overage(&self) -> bool {
        self.lines.iter().any(|l| l.overage_quantity > Decimal::ZERO)
    }

    /// Still in progress; blocks cancelling the PO.
    pub fn is_open(&self) -> bool {
        !self.status.is_terminal()
    }
}

// ── Vendor requests ─────────────────────────────────────────────────

status_enum! {
    pub enum VendorRequestKind {
        /// Vendor delivered less than ordered.
        Shortage => "SHORTAGE",
        /// Material over the PO quantity is going back to the vendor.
        ReturnExcess => "RETURN_EXCESS",
    }
}

status_enum! {
    pub enum VendorRequestStatus {
        Open => "OPEN",
        Acknowledged => "ACKNOWLEDGED",
        Resolved => "RESOLVED",
        Cancelled => "CANCELLED",
    }
}

impl Lifecycle for VendorRequestStatus {
    const ENTITY: &'static str = "vendor_request";

    fn next_states(&self) -> &'static [Self] {
        use VendorRequestStatus::*;
        match self {
            Open => &[Acknowledged, Cancelled],
            Acknowledged => &[Resolved, Cancelled],
            Resolved | Cancelled => &[],
        }
    }
}

status_enum! {
    pub enum Resolution {
        Replacement => "REPLACEMENT",
        CreditNote => "CREDIT_NOTE",
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VendorRequestLine {
    pub po_line_no: u32,
    pub item_id: String,
    pub quantity: Decimal,
    pub unit_price: Decimal,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VendorRequest {
    pub id: String,
    pub number: String,
    pub vendor_id: String,
    pub purchase_order_id: String,
    pub grn_id: String,
    pub kind: VendorRequestKind,
    pub lines: Vec<VendorRequestLine>,
    pub status: VendorRequestStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resolution: Option<Resolution>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub credit_note_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
    pub created_at: String,
    pub updated_at: String,
}

impl VendorRequest {
    pub fn amount(&self) -> Decimal {
        self.lines.iter().map(|l| l.quantity * l.unit_price).sum()
    }
}

// ── Summary ─────────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProcurementSummary {
    pub vendors: i64,
    pub orders_by_status: Vec<(String, i64)>,
    pub committed_value: Decimal,
    pub grns_by_status: Vec<(String, i64)>,
    pub open_vendor_requests: i64,
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn line(received: Decimal) -> GrnLine {
        GrnLine {
            po_line_no: 1,
            item_id: "i".into(),
            expected_quantity: Decimal::ZERO,
            received_quantity: received,
            accepted_quantity: Decimal::ZERO,
            shortage_quantity: Decimal::ZERO,
            overage_quantity: Decimal::ZERO,
            remarks: None,
        }
    }

    #[test]
    fn reconcile_short_and_over() {
        let mut short = line(dec!(80));
        short.reconcile(dec!(100));
        assert_eq!(short.shortage_quantity, dec!(20));
        assert_eq!(short.overage_quantity, dec!(0));

        let mut over = line(dec!(105.5));
        over.reconcile(dec!(100));
        assert_eq!(over.shortage_quantity, dec!(0));
        assert_eq!(over.overage_quantity, dec!(5.5));
    }

    #[test]
    fn grn_cannot_skip_verification() {
        assert!(!GrnStatus::Received.can_transition_to(GrnStatus::Approved));
        assert!(GrnStatus::Verified.can_transition_to(GrnStatus::Rejected));
        assert!(GrnStatus::Approved.is_terminal());
    }

    #[test]
    fn po_cancel_only_before_receipt() {
        assert!(PurchaseOrderStatus::Sent.can_transition_to(PurchaseOrderStatus::Cancelled));
        assert!(!PurchaseOrderStatus::PartiallyReceived.can_transition_to(PurchaseOrderStatus::Cancelled));
        assert!(PurchaseOrderStatus::PartiallyReceived.can_transition_to(PurchaseOrderStatus::Closed));
    }
}
