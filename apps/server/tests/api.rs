//! End-to-end tests against a running server.

mod common;

use reqwest::{Method, StatusCode};
use serde_json::{json, Value};

use common::TestServer;

#[tokio::test]
async fn test_health() {
    let server = TestServer::spawn().await;
    let resp = server.client.get(server.url("/health")).send().await.unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    assert_eq!(resp.text().await.unwrap(), "OK");
}

#[tokio::test]
async fn test_sale_is_all_or_nothing() {
    let server = TestServer::spawn().await;
    let a = server.product("Widget A", 5, 300).await;
    let b = server.product("Widget B", 2, 150).await;

    let resp = server
        .request(Method::POST, "/api/sales")
        .json(&json!({
            "items": [
                {"productId": a, "quantity": 3},
                {"productId": b, "quantity": 5}
            ]
        }))
        .send()
        .await
        .unwrap();

    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(
        body["detail"],
        "Insufficient stock for Widget B. Available: 2, Requested: 5"
    );
    assert_eq!(body["success"], false);

    assert_eq!(server.quantity(&a).await, 5);
    assert_eq!(server.quantity(&b).await, 2);
}

#[tokio::test]
async fn test_create_then_delete_restores_stock() {
    let server = TestServer::spawn().await;
    let a = server.product("Coffee", 8, 450).await;

    let resp = server
        .request(Method::POST, "/api/sales")
        .json(&json!({"items": [{"productId": a, "quantity": 3}]}))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::CREATED);
    let receipt: Value = resp.json().await.unwrap();
    assert_eq!(receipt["totalCents"], 1350);
    assert_eq!(receipt["items"][0]["productName"], "Coffee");
    assert_eq!(server.quantity(&a).await, 5);

    let sale_id = receipt["id"].as_str().unwrap().to_string();

    let fetched: Value = server
        .request(Method::GET, &format!("/api/sales/{}", sale_id))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(fetched["id"], sale_id.as_str());

    let resp = server
        .request(
            Method::DELETE,
            &format!("/api/sales/{}?restoreInventory=true", sale_id),
        )
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    let deletion: Value = resp.json().await.unwrap();
    assert_eq!(deletion["restored"], 1);
    assert_eq!(deletion["restoreFailures"], json!([]));
    assert_eq!(server.quantity(&a).await, 8);

    let resp = server
        .request(Method::GET, &format!("/api/sales/{}", sale_id))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_lookup_and_validation_errors() {
    let server = TestServer::spawn().await;
    let a = server.product("Tea", 3, 200).await;

    let resp = server
        .request(Method::POST, "/api/sales")
        .json(&json!({"items": [{"productId": "missing", "quantity": 1}]}))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["detail"], "Product not found: missing");

    let resp = server
        .request(Method::POST, "/api/sales")
        .json(&json!({"items": []}))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);

    let resp = server
        .request(Method::POST, "/api/sales")
        .json(&json!({"items": [{"productId": a, "quantity": 0}]}))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);

    let resp = server
        .request(Method::POST, "/api/sales")
        .header("content-type", "application/json")
        .body("{not json")
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["success"], false);

    assert_eq!(server.quantity(&a).await, 3);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_sales_never_oversell() {
    let server = TestServer::spawn().await;
    let a = server.product("Limited", 10, 100).await;

    let mut tasks = Vec::new();
    for _ in 0..20 {
        let client = server.client.clone();
        let url = server.url("/api/pos/sale");
        let body = json!({"items": [{"productId": a, "quantity": 3}]});
        tasks.push(tokio::spawn(async move {
            client.post(url).json(&body).send().await.unwrap().status()
        }));
    }

    let mut created = 0;
    let mut rejected = 0;
    for task in tasks {
        match task.await.unwrap() {
            StatusCode::CREATED => created += 1,
            StatusCode::BAD_REQUEST => rejected += 1,
            other => panic!("unexpected status {}", other),
        }
    }

    assert_eq!(created, 3);
    assert_eq!(rejected, 17);
    assert_eq!(server.quantity(&a).await, 1);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_overlapping_sales_do_not_deadlock() {
    let server = TestServer::spawn().await;
    let a = server.product("A", 100, 100).await;
    let b = server.product("B", 100, 100).await;

    let mut tasks = Vec::new();
    for i in 0..20 {
        let client = server.client.clone();
        let url = server.url("/api/pos/sale");
        // Half the sales list A first, half list B first
        let items = if i % 2 == 0 {
            json!([{"productId": a, "quantity": 1}, {"productId": b, "quantity": 2}])
        } else {
            json!([{"productId": b, "quantity": 2}, {"productId": a, "quantity": 1}])
        };
        tasks.push(tokio::spawn(async move {
            client
                .post(url)
                .json(&json!({"items": items}))
                .send()
                .await
                .unwrap()
                .status()
        }));
    }

    let run = async {
        for task in tasks {
            assert_eq!(task.await.unwrap(), StatusCode::CREATED);
        }
    };
    tokio::time::timeout(std::time::Duration::from_secs(30), run)
        .await
        .expect("sales deadlocked");

    assert_eq!(server.quantity(&a).await, 80);
    assert_eq!(server.quantity(&b).await, 60);
}

#[tokio::test]
async fn test_queue_partial_failure_and_idempotent_drain() {
    let server = TestServer::spawn().await;
    let a = server.product("Bread", 10, 250).await;
    let gone = server.product("Discontinued", 10, 100).await;
    server.db.products().soft_delete(&gone).await.unwrap();

    for product_id in [&a, &gone, &a] {
        let payload = json!({"items": [{"productId": product_id, "quantity": 2}]}).to_string();
        let resp = server
            .request(Method::POST, "/api/sync/queue")
            .json(&json!({"transactionType": "sale", "payload": payload}))
            .send()
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::CREATED);
        let entry: Value = resp.json().await.unwrap();
        assert_eq!(entry["status"], "pending");
    }

    let summary: Value = server
        .request(Method::POST, "/api/sync/process")
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(summary["message"], "Sync complete. Processed: 2, Failed: 1");
    assert_eq!(summary["processed"], 2);
    assert_eq!(summary["failed"], 1);
    assert_eq!(summary["success"], false);
    assert_eq!(server.quantity(&a).await, 6);

    let failed: Value = server
        .request(Method::GET, "/api/sync/queue?statusFilter=failed")
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    let failed = failed.as_array().unwrap();
    assert_eq!(failed.len(), 1);
    assert_eq!(
        failed[0]["errorMessage"],
        format!("Product not found: {}", gone).as_str()
    );

    // Second drain finds nothing and deducts nothing
    let again: Value = server
        .request(Method::POST, "/api/sync/process")
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(again["message"], "No pending items to sync");
    assert_eq!(server.quantity(&a).await, 6);

    let all: Value = server
        .request(Method::GET, "/api/sync/queue")
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(all.as_array().unwrap().len(), 3);

    let resp = server
        .request(Method::GET, "/api/sync/queue?statusFilter=bogus")
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_inventory_endpoints() {
    let server = TestServer::spawn().await;
    let a = server.product("Soap", 4, 259).await;
    let b = server.product("Towels", 40, 449).await;

    let low: Value = server
        .request(Method::GET, "/api/inventory?lowStock=true")
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(low.as_array().unwrap().len(), 0);

    let updated: Value = server
        .request(Method::PUT, &format!("/api/inventory/{}", a))
        .json(&json!({"minStockLevel": 5}))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(updated["minStockLevel"], 5);
    assert_eq!(updated["quantity"], 4);

    let low: Value = server
        .request(Method::GET, "/api/inventory?lowStock=true")
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(low.as_array().unwrap().len(), 1);
    assert_eq!(low[0]["id"], a.as_str());

    let adjusted: Value = server
        .request(Method::POST, &format!("/api/inventory/{}/adjust", b))
        .json(&json!({"delta": -15}))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(adjusted["quantity"], 25);

    let resp = server
        .request(Method::POST, &format!("/api/inventory/{}/adjust", b))
        .json(&json!({"delta": -30}))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["detail"], "Adjustment would result in negative inventory (-5)");
    assert_eq!(server.quantity(&b).await, 25);

    let resp = server
        .request(Method::POST, &format!("/api/inventory/{}/adjust", b))
        .json(&json!({"delta": i64::MIN}))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["detail"], "Validation error: delta is out of range");
    assert_eq!(server.quantity(&b).await, 25);

    let resp = server
        .request(Method::GET, "/api/inventory/unknown")
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_void_sale() {
    let server = TestServer::spawn().await;
    let a = server.product("Juice", 6, 349).await;

    let receipt: Value = server
        .request(Method::POST, "/api/sales")
        .json(&json!({"items": [{"productId": a, "quantity": 2}]}))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    let sale_id = receipt["id"].as_str().unwrap().to_string();

    let voided: Value = server
        .request(Method::POST, &format!("/api/sales/{}/void", sale_id))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(voided["status"], "voided");
    assert_eq!(server.quantity(&a).await, 6);

    let resp = server
        .request(Method::POST, &format!("/api/sales/{}/void", sale_id))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["detail"], format!("Sale {} is already voided", sale_id).as_str());
}

#[tokio::test]
async fn test_bearer_token_gate() {
    let server = TestServer::spawn_with_token(Some("s3cret")).await;
    let a = server.product("Gum", 5, 99).await;

    let resp = server.client.get(server.url("/api/sales")).send().await.unwrap();
    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["detail"], "Not authenticated");

    let resp = server
        .client
        .get(server.url("/api/sales"))
        .bearer_auth("wrong")
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);

    let resp = server.request(Method::GET, "/api/sales").send().await.unwrap();
    assert_eq!(resp.status(), StatusCode::OK);

    // Terminals sell without a token
    let resp = server
        .client
        .post(server.url("/api/pos/sale"))
        .json(&json!({"items": [{"productId": a, "quantity": 1}]}))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::CREATED);
    assert_eq!(server.quantity(&a).await, 4);
}
