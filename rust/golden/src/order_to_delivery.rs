use rust_decimal::Decimal;
use serde_json::{json, Value};

use crate::harness::{dec, id, Harness};

#[tokio::test]
async fn sales_order_is_made_shipped_and_delivered() {
    let h = Harness::new().await;

    let fabric = h.item("FAB-DENIM", "FABRIC", "m").await;
    let jeans = h.item("FG-JEANS-32", "FINISHED_GOOD", "pcs").await;
    h.ok(
        "POST",
        "/inventory/adjustments",
        json!({"itemId": fabric, "quantity": "500", "note": "opening stock"}),
    )
    .await;

    let customer = id(&h.ok("POST", "/sales/customers", json!({"code": "C-ACME", "name": "Acme Retail"})).await);
    let so = h
        .ok(
            "POST",
            "/sales/orders",
            json!({"customerId": customer, "lines": [{"itemId": jeans, "quantity": "100", "unitPrice": "12.50"}]}),
        )
        .await;
    let so_id = id(&so);
    assert_eq!(dec(&so["totalAmount"]), Decimal::new(125000, 2));
    let so = h.ok("POST", &format!("/sales/orders/{so_id}/@confirm"), Value::Null).await;
    assert_eq!(so["status"], "CONFIRMED");

    // Production with two stages, fed by one material request.
    let po = h
        .ok(
            "POST",
            "/manufacturing/production-orders",
            json!({
                "salesOrderId": so_id,
                "productItemId": jeans,
                "quantity": "100",
                "stages": ["Cutting", "Stitching"]
            }),
        )
        .await;
    let po_id = id(&po);
    assert_eq!(po["status"], "PLANNED");

    let mrn = h
        .ok(
            "POST",
            "/manufacturing/mrns",
            json!({
                "productionOrderId": po_id,
                "department": "cutting",
                "lines": [{"itemId": fabric, "quantity": "150"}]
            }),
        )
        .await;
    let mrn_id = id(&mrn);
    let po = h.ok("GET", &format!("/manufacturing/production-orders/{po_id}"), Value::Null).await;
    assert_eq!(po["status"], "MATERIAL_REQUESTED");

    let lines = json!([{"itemId": fabric, "quantity": "150"}]);
    h.ok("POST", &format!("/manufacturing/mrns/{mrn_id}/@dispatch"), json!({"lines": lines})).await;
    h.ok(
        "POST",
        &format!("/manufacturing/mrns/{mrn_id}/@receive"),
        json!({"lines": [{"itemId": fabric, "receivedQuantity": "150"}]}),
    )
    .await;
    h.ok(
        "POST",
        &format!("/manufacturing/mrns/{mrn_id}/@verify"),
        json!({"lines": [{"itemId": fabric, "acceptedQuantity": "150", "rejectedQuantity": "0"}]}),
    )
    .await;
    let mrn = h.ok("POST", &format!("/manufacturing/mrns/{mrn_id}/@approve"), Value::Null).await;
    assert_eq!(mrn["status"], "APPROVED");
    assert_eq!(h.on_hand(&fabric).await, Decimal::from(350));

    let po = h.ok("GET", &format!("/manufacturing/production-orders/{po_id}"), Value::Null).await;
    assert_eq!(po["status"], "MATERIAL_READY");

    let stages = h.ok("GET", &format!("/manufacturing/production-orders/{po_id}/stages"), Value::Null).await;
    let stages = stages.as_array().unwrap().clone();
    assert_eq!(stages.len(), 2);
    assert_eq!(stages[0]["name"], "Cutting");

    for (i, stage) in stages.iter().enumerate() {
        let stage_id = id(stage);
        h.ok("POST", &format!("/manufacturing/stages/{stage_id}/@start"), Value::Null).await;
        if i == 0 {
            let so = h.ok("GET", &format!("/sales/orders/{so_id}"), Value::Null).await;
            assert_eq!(so["status"], "IN_PRODUCTION");
        }
        let done = h
            .ok(
                "POST",
                &format!("/manufacturing/stages/{stage_id}/@complete"),
                json!({"completedQuantity": "100"}),
            )
            .await;
        assert_eq!(done["status"], "COMPLETED");
    }

    let po = h.ok("GET", &format!("/manufacturing/production-orders/{po_id}"), Value::Null).await;
    assert_eq!(po["status"], "COMPLETED");
    let so = h.ok("GET", &format!("/sales/orders/{so_id}"), Value::Null).await;
    assert_eq!(so["status"], "READY_TO_SHIP");
    assert_eq!(h.on_hand(&jeans).await, Decimal::from(100));

    // Two partial shipments.
    let mut shipments = Vec::new();
    for (qty, expected) in [("60", "PARTIALLY_SHIPPED"), ("40", "SHIPPED")] {
        let sh = h
            .ok(
                "POST",
                "/shipment/shipments",
                json!({"salesOrderId": so_id, "lines": [{"soLineNo": 1, "quantity": qty}]}),
            )
            .await;
        let sh_id = id(&sh);
        h.ok("POST", &format!("/shipment/shipments/{sh_id}/@pack"), Value::Null).await;
        let sh = h
            .ok(
                "POST",
                &format!("/shipment/shipments/{sh_id}/@dispatch"),
                json!({"carrier": "BlueDart", "trackingNumber": format!("BD-{qty}")}),
            )
            .await;
        assert_eq!(sh["status"], "DISPATCHED");
        assert_eq!(sh["carrier"], "BlueDart");

        let so = h.ok("GET", &format!("/sales/orders/{so_id}"), Value::Null).await;
        assert_eq!(so["status"], expected);
        shipments.push(sh_id);
    }
    assert_eq!(h.on_hand(&jeans).await, Decimal::ZERO);

    // Over-shipping is refused once everything is out.
    let (status, err) = h
        .call(
            "POST",
            "/shipment/shipments",
            Some(&h.root),
            json!({"salesOrderId": so_id, "lines": [{"soLineNo": 1, "quantity": "1"}]}),
        )
        .await;
    assert!(status.is_client_error(), "{err}");

    h.ok("POST", &format!("/shipment/shipments/{}/@deliver", shipments[0]), Value::Null).await;
    let so = h.ok("GET", &format!("/sales/orders/{so_id}"), Value::Null).await;
    assert_eq!(so["status"], "SHIPPED");
    h.ok("POST", &format!("/shipment/shipments/{}/@deliver", shipments[1]), Value::Null).await;
    let so = h.ok("GET", &format!("/sales/orders/{so_id}"), Value::Null).await;
    assert_eq!(so["status"], "DELIVERED");
    assert_eq!(dec(&so["lines"][0]["shippedQuantity"]), Decimal::from(100));

    let report = h.ok("GET", "/admin/integrity", Value::Null).await;
    assert_eq!(report["errors"], 0, "{report}");

    let trail = h.ok("GET", &format!("/admin/history?entity=sales_order&id={so_id}"), Value::Null).await;
    let statuses: Vec<&str> = trail
        .as_array()
        .unwrap()
        .iter()
        .map(|e| e["toStatus"].as_str().unwrap())
        .collect();
    assert_eq!(statuses.first(), Some(&"DRAFT"));
    assert_eq!(statuses.last(), Some(&"DELIVERED"));
    assert!(statuses.contains(&"READY_TO_SHIP"));
}
