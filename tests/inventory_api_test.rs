mod common;

use axum::http::StatusCode;
use common::TestApp;
use serde_json::json;

#[tokio::test]
async fn health_endpoint_reports_ok() {
    let app = TestApp::new().await;
    let (status, body) = app.get_json("/health").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ok");
}

#[tokio::test]
async fn adjust_endpoint_applies_stock_in() {
    let app = TestApp::new().await;
    app.seed_product("P1", "Widget", 0).await;
    let wh = app.seed_warehouse("WH-001", "Main").await;

    let (status, body) = app
        .post_json(
            "/api/v1/inventory/adjust",
            json!({
                "product_sku": "P1",
                "warehouse_id": wh.id,
                "movement_type": "IN",
                "quantity": 10,
                "reason": "initial restock",
                "reference_number": "REF-1",
                "performed_by": "alice"
            }),
        )
        .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["product_sku"], "P1");
    assert_eq!(body["warehouse_code"], "WH-001");
    assert_eq!(body["previous_quantity"], 0);
    assert_eq!(body["new_quantity"], 10);
    assert_eq!(body["difference"], 10);
    assert_eq!(body["movement_type"], "IN");

    let (status, body) = app.get_json("/api/v1/inventory/product/P1/total").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!(10));
}

#[tokio::test]
async fn adjust_without_movement_type_defaults_to_absolute_set() {
    let app = TestApp::new().await;
    app.seed_product("P1", "Widget", 0).await;
    let wh = app.seed_warehouse("WH-001", "Main").await;

    let (status, body) = app
        .post_json(
            "/api/v1/inventory/adjust",
            json!({
                "product_sku": "P1",
                "warehouse_id": wh.id,
                "quantity": 42,
                "reason": "recount"
            }),
        )
        .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["movement_type"], "ADJUST");
    assert_eq!(body["new_quantity"], 42);
}

#[tokio::test]
async fn adjustment_alias_is_accepted_and_junk_type_is_not() {
    let app = TestApp::new().await;
    app.seed_product("P1", "Widget", 0).await;
    let wh = app.seed_warehouse("WH-001", "Main").await;

    let (status, body) = app
        .post_json(
            "/api/v1/inventory/adjust",
            json!({
                "product_sku": "P1",
                "warehouse_id": wh.id,
                "movement_type": "adjustment",
                "quantity": 5,
                "reason": "recount"
            }),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["movement_type"], "ADJUST");

    let (status, body) = app
        .post_json(
            "/api/v1/inventory/adjust",
            json!({
                "product_sku": "P1",
                "warehouse_id": wh.id,
                "movement_type": "TELEPORT",
                "quantity": 5,
                "reason": "recount"
            }),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "Bad Request");
    assert!(body["message"]
        .as_str()
        .unwrap()
        .contains("Invalid movement type"));
}

#[tokio::test]
async fn reduce_beyond_stock_maps_to_conflict() {
    let app = TestApp::new().await;
    app.seed_product("P1", "Widget", 0).await;
    let wh = app.seed_warehouse("WH-001", "Main").await;
    app.post_json(
        "/api/v1/inventory/adjust",
        json!({
            "product_sku": "P1",
            "warehouse_id": wh.id,
            "movement_type": "IN",
            "quantity": 10,
            "reason": "restock"
        }),
    )
    .await;

    let (status, body) = app
        .post_json(
            "/api/v1/inventory/reduce",
            json!({
                "product_sku": "P1",
                "warehouse_id": wh.id,
                "quantity": 15,
                "reason": "oversold order"
            }),
        )
        .await;

    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["error"], "Conflict");
    assert!(body["message"]
        .as_str()
        .unwrap()
        .contains("Insufficient stock"));

    let (_, total) = app.get_json("/api/v1/inventory/product/P1/total").await;
    assert_eq!(total, serde_json::json!(10));
}

#[tokio::test]
async fn unknown_product_maps_to_not_found() {
    let app = TestApp::new().await;
    app.seed_warehouse("WH-001", "Main").await;

    let (status, body) = app
        .post_json(
            "/api/v1/inventory/adjust",
            json!({
                "product_sku": "GHOST",
                "warehouse_id": 1,
                "movement_type": "IN",
                "quantity": 1,
                "reason": "restock"
            }),
        )
        .await;

    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"], "Not Found");
    assert!(body["message"]
        .as_str()
        .unwrap()
        .contains("Product not found"));
}

#[tokio::test]
async fn validation_failures_map_to_bad_request() {
    let app = TestApp::new().await;
    app.seed_product("P1", "Widget", 0).await;
    let wh = app.seed_warehouse("WH-001", "Main").await;

    // Empty reason.
    let (status, _) = app
        .post_json(
            "/api/v1/inventory/adjust",
            json!({
                "product_sku": "P1",
                "warehouse_id": wh.id,
                "movement_type": "IN",
                "quantity": 1,
                "reason": ""
            }),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    // Negative quantity.
    let (status, _) = app
        .post_json(
            "/api/v1/inventory/adjust",
            json!({
                "product_sku": "P1",
                "warehouse_id": wh.id,
                "movement_type": "IN",
                "quantity": -3,
                "reason": "restock"
            }),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    // Zero-quantity transfer.
    let (status, _) = app
        .post_json(
            "/api/v1/inventory/transfer",
            json!({
                "product_sku": "P1",
                "from_warehouse_id": wh.id,
                "to_warehouse_id": wh.id + 1,
                "quantity": 0,
                "reference": "REF-0"
            }),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn transfer_roundtrip_over_http() {
    let app = TestApp::new().await;
    app.seed_product("P1", "Widget", 0).await;
    let wh1 = app.seed_warehouse("WH-001", "Main").await;
    let wh2 = app.seed_warehouse("WH-002", "Overflow").await;
    app.post_json(
        "/api/v1/inventory/adjust",
        json!({
            "product_sku": "P1",
            "warehouse_id": wh1.id,
            "movement_type": "IN",
            "quantity": 6,
            "reason": "restock"
        }),
    )
    .await;

    let (status, body) = app
        .post_json(
            "/api/v1/inventory/transfer",
            json!({
                "product_sku": "P1",
                "from_warehouse_id": wh1.id,
                "to_warehouse_id": wh2.id,
                "quantity": 6,
                "reference": "REF-3",
                "performed_by": "bob"
            }),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "SUCCESS");
    assert_eq!(body["quantity"], 6);

    let (_, in_source) = app
        .get_json(&format!(
            "/api/v1/inventory/product/P1/warehouse/{}",
            wh1.id
        ))
        .await;
    assert_eq!(in_source, json!(0));
    let (_, in_dest) = app
        .get_json(&format!(
            "/api/v1/inventory/product/P1/warehouse/{}",
            wh2.id
        ))
        .await;
    assert_eq!(in_dest, json!(6));

    let (status, movements) = app
        .get_json("/api/v1/inventory/movements?reference_number=REF-3")
        .await;
    assert_eq!(status, StatusCode::OK);
    let legs = movements.as_array().expect("movement list");
    assert_eq!(legs.len(), 2);
    assert_eq!(legs[0]["movement_type"], "TRANSFER_OUT");
    assert_eq!(legs[0]["performed_by"], "bob");
    assert_eq!(legs[1]["movement_type"], "TRANSFER_IN");
}

#[tokio::test]
async fn movement_filters_narrow_by_warehouse() {
    let app = TestApp::new().await;
    app.seed_product("P1", "Widget", 0).await;
    let wh1 = app.seed_warehouse("WH-001", "Main").await;
    let wh2 = app.seed_warehouse("WH-002", "Overflow").await;
    for (wh, qty) in [(wh1.id, 4), (wh2.id, 9)] {
        app.post_json(
            "/api/v1/inventory/adjust",
            json!({
                "product_sku": "P1",
                "warehouse_id": wh,
                "movement_type": "IN",
                "quantity": qty,
                "reason": "restock"
            }),
        )
        .await;
    }

    let (status, movements) = app
        .get_json(&format!(
            "/api/v1/inventory/movements?warehouse_id={}",
            wh2.id
        ))
        .await;
    assert_eq!(status, StatusCode::OK);
    let rows = movements.as_array().expect("movement list");
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0]["difference"], 9);
    assert_eq!(rows[0]["warehouse_code"], "WH-002");
}

#[tokio::test]
async fn export_and_summary_endpoints_return_projections() {
    let app = TestApp::new().await;
    app.seed_product("P1", "Widget", 0).await;
    let wh = app.seed_warehouse("WH-001", "Main").await;
    app.post_json(
        "/api/v1/inventory/adjust",
        json!({
            "product_sku": "P1",
            "warehouse_id": wh.id,
            "movement_type": "IN",
            "quantity": 3,
            "reason": "restock",
            "reference_number": "REF-1"
        }),
    )
    .await;

    let (status, rows) = app.get_json("/api/v1/inventory/export").await;
    assert_eq!(status, StatusCode::OK);
    let rows = rows.as_array().expect("export rows");
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0]["product_name"], "Widget");
    assert_eq!(rows[0]["quantity"], 3);

    let (status, summary) = app
        .get_json("/api/v1/inventory/movements/summary?months=6")
        .await;
    assert_eq!(status, StatusCode::OK);
    let summary = summary.as_array().expect("summary rows");
    assert_eq!(summary.len(), 1);
    assert_eq!(summary[0]["movement_type"], "IN");
    // The analytics projection drops the performer.
    assert!(summary[0].get("performed_by").is_none());
}

#[tokio::test]
async fn low_stock_endpoint_lists_products_under_threshold() {
    let app = TestApp::new().await;
    app.seed_product("P1", "Widget", 5).await;
    app.seed_product("P2", "Gadget", 5).await;
    let wh = app.seed_warehouse("WH-001", "Main").await;
    app.post_json(
        "/api/v1/inventory/adjust",
        json!({
            "product_sku": "P1",
            "warehouse_id": wh.id,
            "movement_type": "IN",
            "quantity": 2,
            "reason": "restock"
        }),
    )
    .await;
    app.post_json(
        "/api/v1/inventory/adjust",
        json!({
            "product_sku": "P2",
            "warehouse_id": wh.id,
            "movement_type": "IN",
            "quantity": 8,
            "reason": "restock"
        }),
    )
    .await;

    let (status, rows) = app.get_json("/api/v1/inventory/low-stock").await;
    assert_eq!(status, StatusCode::OK);
    let rows = rows.as_array().expect("low-stock rows");
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0]["product_sku"], "P1");
    assert_eq!(rows[0]["quantity"], 2);
    assert_eq!(rows[0]["min_stock"], 5);
}
