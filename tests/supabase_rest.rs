//! Exercises the Supabase store against an in-process stub speaking the
//! PostgREST conventions: per-table routes, `eq.` filters, and
//! `return=representation` responses.

use axum::{
    Json, Router,
    extract::RawQuery,
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::{delete, get},
};
use cheqledger::{
    db::{Database, SupabaseDb},
    error::DbError,
    types::Customer,
};
use rust_decimal_macros::dec;
use serde_json::{Value, json};
use tokio::net::TcpListener;

async fn list_customers(RawQuery(query): RawQuery) -> Json<Value> {
    let query = query.unwrap_or_default();
    if query.contains("customer_id=eq.404") {
        return Json(json!([]));
    }
    Json(json!([
        {
            "customer_id": 1,
            "customer_name": "Alice",
            "fee_percentage": "2.50"
        },
        {
            "customer_id": 2,
            "customer_name": "Bob",
            "contact_info": "bob@example.com",
            "fee_percentage": "1.75"
        }
    ]))
}

async fn insert_customer(headers: HeaderMap, Json(payload): Json<Value>) -> Response {
    // The serial primary key must not travel in the insert payload.
    assert!(payload.get("customer_id").is_none());
    assert_eq!(
        headers.get("Prefer").and_then(|v| v.to_str().ok()),
        Some("return=representation")
    );
    let mut row = payload;
    row["customer_id"] = json!(7);
    Json(json!([row])).into_response()
}

async fn delete_transaction(RawQuery(query): RawQuery) -> Json<Value> {
    let query = query.unwrap_or_default();
    if query.contains("transaction_id=eq.1") {
        Json(json!([{ "transaction_id": 1 }]))
    } else {
        Json(json!([]))
    }
}

async fn serve_stub() -> String {
    let app = Router::new()
        .route(
            "/rest/v1/customers",
            get(list_customers).post(insert_customer),
        )
        .route("/rest/v1/cheque_transactions", delete(delete_transaction));
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    format!("http://{addr}")
}

fn customer(name: &str) -> Customer {
    Customer {
        customer_id: 0,
        customer_name: name.to_owned(),
        contact_info: None,
        fee_percentage: dec!(2.0),
        created_at: None,
        updated_at: None,
    }
}

#[tokio::test]
async fn initialize_probes_and_unlocks_the_store() {
    let base = serve_stub().await;
    let db = SupabaseDb::new();

    assert!(db.initialize(&base, "anon-key").await);
    let customers = db.get_customers().await;
    assert_eq!(customers.len(), 2);
    assert_eq!(customers[0].customer_name, "Alice");
    assert_eq!(customers[0].fee_percentage, dec!(2.50));
    assert_eq!(
        customers[1].contact_info.as_deref(),
        Some("bob@example.com")
    );
}

#[tokio::test]
async fn insert_returns_the_persisted_row() {
    let base = serve_stub().await;
    let db = SupabaseDb::new();
    assert!(db.initialize(&base, "anon-key").await);

    let created = db.add_customer(customer("Carol")).await.unwrap();
    assert_eq!(created.customer_id, 7);
    assert_eq!(created.customer_name, "Carol");
}

#[tokio::test]
async fn delete_reports_false_when_nothing_matched() {
    let base = serve_stub().await;
    let db = SupabaseDb::new();
    assert!(db.initialize(&base, "anon-key").await);

    assert!(db.delete_transaction(1).await);
    assert!(!db.delete_transaction(99).await);
}

#[tokio::test]
async fn missing_single_row_comes_back_as_none() {
    let base = serve_stub().await;
    let db = SupabaseDb::new();
    assert!(db.initialize(&base, "anon-key").await);

    assert!(db.get_customer_by_id(404).await.is_none());
    assert!(db.get_customer_by_id(1).await.is_some());
}

#[tokio::test]
async fn rejected_probe_keeps_the_store_locked() {
    let app = Router::new().route(
        "/rest/v1/customers",
        get(|| async { StatusCode::UNAUTHORIZED }),
    );
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    let db = SupabaseDb::new();
    assert!(!db.initialize(&format!("http://{addr}"), "bad-key").await);
    assert!(db.get_customers().await.is_empty());
    assert!(matches!(
        db.add_customer(customer("Eve")).await,
        Err(DbError::Uninitialized)
    ));
}

#[tokio::test]
async fn unreachable_backend_fails_the_probe() {
    // Bind then drop, so the port refuses connections.
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);

    let db = SupabaseDb::new();
    assert!(!db.initialize(&format!("http://{addr}"), "anon-key").await);
    assert!(db.get_customer_by_id(1).await.is_none());
    assert!(!db.delete_customer(1).await);
}

#[tokio::test]
async fn store_degrades_before_initialization() {
    let db = SupabaseDb::new();

    assert!(db.get_customers().await.is_empty());
    assert!(db.get_customer_by_id(1).await.is_none());
    assert!(!db.delete_customer(1).await);
    assert!(matches!(
        db.add_customer(customer("Dana")).await,
        Err(DbError::Uninitialized)
    ));
}
