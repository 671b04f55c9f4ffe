use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use garment_core::{status_enum, Lifecycle};

status_enum! {
    /// Who the credit is owed to or by.
    pub enum Party {
        Vendor => "VENDOR",
        Customer => "CUSTOMER",
    }
}

status_enum! {
    pub enum CreditNoteStatus {
        Draft => "DRAFT",
        Issued => "ISSUED",
        Applied => "APPLIED",
        Cancelled => "CANCELLED",
    }
}

impl Lifecycle for CreditNoteStatus {
    const ENTITY: &'static str = "credit_note";

    fn next_states(&self) -> &'static [Self] {
        use CreditNoteStatus::*;
        match self {
            Draft => &[Issued, Cancelled],
            Issued => &[Applied],
            Applied | Cancelled => &[],
        }
    }
}

impl CreditNoteStatus {
    /// Issued or applied: the amount counts against the party's balance.
    pub fn is_effective(&self) -> bool {
        matches!(self, Self::Issued | Self::Applied)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreditNoteLine {
    pub item_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub quantity: Decimal,
    pub unit_price: Decimal,
    pub amount: Decimal,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreditNote {
    pub id: String,
    pub number: String,
    pub party: Party,
    pub party_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub vendor_request_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sales_order_id: Option<String>,
    pub lines: Vec<CreditNoteLine>,
    pub amount: Decimal,
    pub reason: String,
    pub status: CreditNoteStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cancel_reason: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub issued_by: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub issued_at: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub applied_at: Option<String>,
    pub created_by: String,
    pub created_at: String,
    pub updated_at: String,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FinanceSummary {
    /// Value of approved purchase orders not yet closed.
    pub payables: Decimal,
    /// Value of confirmed sales orders not yet fully shipped.
    pub receivables: Decimal,
    pub vendor_credits: Decimal,
    pub customer_credits: Decimal,
    pub credit_notes_by_status: Vec<(String, i64)>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_drafts_cancel() {
        use CreditNoteStatus::*;
        assert!(Draft.can_transition_to(Cancelled));
        assert!(!Issued.can_transition_to(Cancelled));
        assert!(Applied.is_terminal());
        assert!(Issued.is_effective() && !Draft.is_effective());
        assert_eq!(Party::parse("VENDOR"), Some(Party::Vendor));
    }
}
