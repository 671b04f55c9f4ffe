use serde::Deserialize;

use garment_core::{ensure_not_blank, ListParams, ListResult, Principal, ServiceError};
use garment_store::{begin, commit, table, Value};

use super::ProcurementService;
use crate::documents::{self, move_vendor_request};
use crate::model::*;
use crate::schema::VENDOR_REQUESTS;

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RequestFilters {
    pub status: Option<VendorRequestStatus>,
    pub kind: Option<VendorRequestKind>,
    pub vendor_id: Option<String>,
    pub grn_id: Option<String>,
}

impl ProcurementService {
    pub fn get_vendor_request(&self, id: &str) -> Result<VendorRequest, ServiceError> {
        documents::get_vendor_request(self.db.as_ref(), id)
    }

    pub fn list_vendor_requests(
        &self,
        filters: &RequestFilters,
        params: &ListParams,
    ) -> Result<ListResult<VendorRequest>, ServiceError> {
        let mut conds = Vec::new();
        if let Some(s) = filters.status {
            conds.push(("status", Value::Text(s.to_string())));
        }
        if let Some(k) = filters.kind {
            conds.push(("kind", Value::Text(k.to_string())));
        }
        if let Some(v) = &filters.vendor_id {
            conds.push(("vendor_id", Value::Text(v.clone())));
        }
        if let Some(g) = &filters.grn_id {
            conds.push(("grn_id", Value::Text(g.clone())));
        }
        table::list(self.db.as_ref(), VENDOR_REQUESTS, &conds, &["number"], params)
    }

    pub fn acknowledge_vendor_request(&self, id: &str, actor: &Principal) -> Result<VendorRequest, ServiceError> {
        let tx = begin(self.db.as_ref())?;
        let mut req = documents::get_vendor_request(&*tx, id)?;
        move_vendor_request(&*tx, &mut req, VendorRequestStatus::Acknowledged, actor, None)?;
        commit(tx)?;
        Ok(req)
    }

    /// The vendor ships replacement material; it arrives on a new GRN.
    pub fn resolve_with_replacement(
        &self,
        id: &str,
        note: Option<String>,
        actor: &Principal,
    ) -> Result<VendorRequest, ServiceError> {
        let tx = begin(self.db.as_ref())?;
        let mut req = documents::get_vendor_request(&*tx, id)?;
        req.resolution = Some(Resolution::Replacement);
        if note.is_some() {
            req.notes = note;
        }
        let note = req.notes.clone();
        move_vendor_request(&*tx, &mut req, VendorRequestStatus::Resolved, actor, note.as_deref())?;
        commit(tx)?;
        Ok(req)
    }

    pub fn cancel_vendor_request(&self, id: &str, reason: &str, actor: &Principal) -> Result<VendorRequest, ServiceError> {
        ensure_not_blank("reason", reason)?;
        let tx = begin(self.db.as_ref())?;
        let mut req = documents::get_vendor_request(&*tx, id)?;
        move_vendor_request(&*tx, &mut req, VendorRequestStatus::Cancelled, actor, Some(reason))?;
        commit(tx)?;
        Ok(req)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::Fixture;
    use rust_decimal_macros::dec;

    #[test]
    fn acknowledge_then_replace() {
        let f = Fixture::new();
        let who = Principal::system();
        let req = f.shortage_request(dec!(100), dec!(70));
        assert_eq!(req.status, VendorRequestStatus::Open);

        let early = f.svc.resolve_with_replacement(&req.id, None, &who);
        assert!(matches!(early, Err(ServiceError::InvalidState(_))));

        f.svc.acknowledge_vendor_request(&req.id, &who).unwrap();
        let done = f
            .svc
            .resolve_with_replacement(&req.id, Some("re-shipping 30m on Friday".into()), &who)
            .unwrap();
        assert_eq!(done.status, VendorRequestStatus::Resolved);
        assert_eq!(done.resolution, Some(Resolution::Replacement));

        let cancel = f.svc.cancel_vendor_request(&req.id, "late", &who);
        assert!(matches!(cancel, Err(ServiceError::InvalidState(_))));
    }

    #[test]
    fn credit_note_resolution_is_once_only() {
        let f = Fixture::new();
        let who = Principal::system();
        let req = f.shortage_request(dec!(100), dec!(90));
        assert_eq!(req.amount(), dec!(25));

        let resolved = documents::resolve_with_credit_note(f.db.as_ref(), &req.id, "cn-1", &who).unwrap();
        assert_eq!(resolved.status, VendorRequestStatus::Resolved);
        assert_eq!(resolved.credit_note_id.as_deref(), Some("cn-1"));

        let again = documents::resolve_with_credit_note(f.db.as_ref(), &req.id, "cn-2", &who);
        assert!(matches!(again, Err(ServiceError::Conflict(_))));

        let history = garment_store::history::list(f.db.as_ref(), "vendor_request", &req.id).unwrap();
        let to: Vec<&str> = history.iter().map(|h| h.to_status.as_str()).collect();
        assert_eq!(to, vec!["OPEN", "ACKNOWLEDGED", "RESOLVED"]);
    }
}
