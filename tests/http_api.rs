//! End-to-end checks of the HTTP surface over a real socket, with the mock
//! assistant and the in-memory store behind it.

use std::sync::Arc;

use cheqledger::{
    assistant::{AiAssistant, MockAssistant},
    db::{Database, InMemoryDb},
    http::{AppState, router},
};
use serde_json::{Value, json};
use tokio::net::TcpListener;

async fn serve_app() -> (String, Arc<InMemoryDb>) {
    let assistant = Arc::new(MockAssistant::default());
    assistant.initialize("key", "model").await;
    let db = Arc::new(InMemoryDb::default());

    let app = router(AppState {
        assistant,
        db: db.clone(),
    });
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    (format!("http://{addr}"), db)
}

#[tokio::test]
async fn health_answers_ok() {
    let (base, _db) = serve_app().await;
    let body = reqwest::get(format!("{base}/health"))
        .await
        .unwrap()
        .text()
        .await
        .unwrap();
    assert_eq!(body, "ok");
}

#[tokio::test]
async fn chat_round_trips_through_the_assistant() {
    let (base, _db) = serve_app().await;
    let client = reqwest::Client::new();

    let reply: Value = client
        .post(format!("{base}/chat"))
        .json(&json!({ "message": "how much profit?" }))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(reply["reply"], "Mock reply to: how much profit?");
}

#[tokio::test]
async fn text_extraction_returns_a_transaction_record() {
    let (base, _db) = serve_app().await;
    let client = reqwest::Client::new();

    let transaction: Value = client
        .post(format!("{base}/transactions/extract"))
        .json(&json!({ "description": "cheque 42 for $250" }))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(transaction["cheque_number"], "MOCK-TEXT");
    assert_eq!(transaction["cheque_amount"], "250.00");
}

#[tokio::test]
async fn image_extraction_rejects_bad_base64() {
    let (base, _db) = serve_app().await;
    let client = reqwest::Client::new();

    let response = client
        .post(format!("{base}/transactions/extract-image"))
        .json(&json!({ "image": "not base64!!!" }))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), reqwest::StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn unknown_report_type_comes_back_as_the_literal_message() {
    let (base, _db) = serve_app().await;
    let client = reqwest::Client::new();

    let reply: Value = client
        .post(format!("{base}/reports"))
        .json(&json!({ "report_type": "payroll" }))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(
        reply["report"],
        "Unsupported report type. Available types: customer, transaction, profit"
    );
}

#[tokio::test]
async fn customers_can_be_created_and_listed() {
    let (base, db) = serve_app().await;
    let client = reqwest::Client::new();

    let response = client
        .post(format!("{base}/customers"))
        .json(&json!({ "customer_name": "Alice", "fee_percentage": "2.5" }))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), reqwest::StatusCode::CREATED);
    let created: Value = response.json().await.unwrap();
    assert_eq!(created["customer_name"], "Alice");

    let listed: Value = reqwest::get(format!("{base}/customers"))
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(listed.as_array().unwrap().len(), 1);
    assert_eq!(db.get_customers().await.len(), 1);
}
