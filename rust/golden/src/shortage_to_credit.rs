use rust_decimal::Decimal;
use serde_json::{json, Value};

use crate::harness::{dec, id, Harness};

#[tokio::test]
async fn short_delivery_becomes_a_vendor_credit() {
    let h = Harness::new().await;
    let thread = h.item("TRM-THREAD", "TRIM", "cone").await;
    let vendor = id(
        &h.ok("POST", "/procurement/vendors", json!({"code": "V-THREADCO", "name": "ThreadCo", "services": ["MATERIAL"]}))
            .await,
    );

    let po = h
        .ok(
            "POST",
            "/procurement/purchase-orders",
            json!({"vendorId": vendor, "lines": [{"itemId": thread, "quantity": "80", "unitPrice": "2.50"}]}),
        )
        .await;
    let po_id = id(&po);
    for action in ["@submit", "@approve", "@send"] {
        h.ok("POST", &format!("/procurement/purchase-orders/{po_id}/{action}"), Value::Null).await;
    }

    let grn = h
        .ok(
            "POST",
            "/procurement/grns",
            json!({"purchaseOrderId": po_id, "lines": [{"poLineNo": 1, "receivedQuantity": "60"}]}),
        )
        .await;
    let grn_id = id(&grn);
    assert_eq!(grn["status"], "DRAFT");
    h.ok("POST", &format!("/procurement/grns/{grn_id}/@receive"), Value::Null).await;
    h.ok("POST", &format!("/procurement/grns/{grn_id}/@verify"), Value::Null).await;
    let grn = h.ok("POST", &format!("/procurement/grns/{grn_id}/@approve"), json!({})).await;
    assert_eq!(grn["status"], "APPROVED");
    assert_eq!(h.on_hand(&thread).await, Decimal::from(60));

    let po = h.ok("GET", &format!("/procurement/purchase-orders/{po_id}"), Value::Null).await;
    assert_eq!(po["status"], "PARTIALLY_RECEIVED");

    let requests = h.ok("GET", &format!("/procurement/vendor-requests?grnId={grn_id}"), Value::Null).await;
    assert_eq!(requests["total"], 1);
    let req = &requests["items"][0];
    assert_eq!(req["kind"], "SHORTAGE");
    assert_eq!(req["status"], "OPEN");
    let req_id = id(req);

    let cn = h
        .ok("POST", &format!("/finance/credit-notes/from-vendor-request/{req_id}"), Value::Null)
        .await;
    assert_eq!(dec(&cn["amount"]), Decimal::new(5000, 2));
    let cn = h.ok("POST", &format!("/finance/credit-notes/{}/@issue", id(&cn)), Value::Null).await;
    assert_eq!(cn["status"], "ISSUED");

    let req = h.ok("GET", &format!("/procurement/vendor-requests/{req_id}"), Value::Null).await;
    assert_eq!(req["status"], "RESOLVED");
    assert_eq!(req["creditNoteId"], cn["id"]);

    // A second credit for the same request is refused.
    let (status, _) = h
        .call(
            "POST",
            &format!("/finance/credit-notes/from-vendor-request/{req_id}"),
            Some(&h.root),
            Value::Null,
        )
        .await;
    assert!(status.is_client_error());

    let summary = h.ok("GET", "/finance/summary", Value::Null).await;
    assert_eq!(dec(&summary["vendorCredits"]), Decimal::new(5000, 2));
    let summary = h.ok("GET", "/procurement/summary", Value::Null).await;
    assert_eq!(summary["openVendorRequests"], 0);

    let report = h.ok("GET", "/admin/integrity", Value::Null).await;
    assert_eq!(report["errors"], 0, "{report}");
}
