use rust_decimal::Decimal;

use garment_core::ServiceError;
use garment_procurement::documents as procurement;
use garment_store::integrity::orphan_findings;
use garment_store::{table, Executor, Finding};

use crate::model::CreditNote;
use crate::schema::CREDIT_NOTES;

pub fn check<E>(db: &E) -> Result<Vec<Finding>, ServiceError>
where
    E: Executor + ?Sized,
{
    let mut findings = orphan_findings(
        db,
        "finance.orphan_credit_note",
        CREDIT_NOTES,
        "vendor_request_id",
        garment_procurement::schema::VENDOR_REQUESTS,
    )?;

    let notes: Vec<CreditNote> = table::select(db, CREDIT_NOTES, &[])?;
    for cn in &notes {
        let total: Decimal = cn.lines.iter().map(|l| l.amount).sum();
        if total != cn.amount {
            findings.push(Finding::error(
                "finance.amount_mismatch",
                CREDIT_NOTES,
                &cn.id,
                format!("{} amount {} but lines sum to {total}", cn.number, cn.amount),
            ));
        }
        let Some(req_id) = &cn.vendor_request_id else { continue };
        // Orphans are reported above.
        let Ok(req) = procurement::get_vendor_request(db, req_id) else { continue };
        if req.credit_note_id.as_deref() != Some(cn.id.as_str()) {
            findings.push(Finding::warning(
                "finance.unlinked_credit_note",
                CREDIT_NOTES,
                &cn.id,
                format!("{} settles {} but the request does not point back to it", cn.number, req.number),
            ));
        }
    }
    Ok(findings)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::Fixture;
    use garment_core::Principal;
    use garment_store::Value;
    use rust_decimal_macros::dec;

    #[test]
    fn tampered_amount_is_reported() {
        let f = Fixture::new();
        let req = f.shortage_request(dec!(20), dec!(15));
        let mut cn = f.svc.create_from_vendor_request(&req.id, None, &Principal::system()).unwrap();
        assert!(check(f.db.as_ref()).unwrap().is_empty());

        cn.amount = dec!(1);
        table::update(f.db.as_ref(), CREDIT_NOTES, &cn.id, &cn, &[("status", Value::Text(cn.status.to_string()))])
            .unwrap();
        let findings = check(f.db.as_ref()).unwrap();
        assert_eq!(findings.len(), 1);
        assert_eq!(findings[0].check, "finance.amount_mismatch");
    }
}
