use std::sync::Arc;

use axum::{
    Json, Router,
    extract::State,
    http::StatusCode,
    routing::{get, post},
};
use base64::Engine as _;
use base64::engine::general_purpose::STANDARD;
use serde::{Deserialize, Serialize};
use tower_http::trace::TraceLayer;

use crate::{
    assistant::AiAssistant,
    db::Database,
    error::AssistantError,
    types::{ChequeTransaction, Customer},
};

#[derive(Clone)]
pub struct AppState {
    pub assistant: Arc<dyn AiAssistant>,
    pub db: Arc<dyn Database>,
}

#[derive(Debug, Deserialize)]
pub struct ChatRequest {
    pub message: String,
}

#[derive(Debug, Serialize)]
pub struct ChatReply {
    pub reply: String,
}

#[derive(Debug, Deserialize)]
pub struct ExtractRequest {
    pub description: String,
}

#[derive(Debug, Deserialize)]
pub struct ExtractImageRequest {
    /// Base64-encoded JPEG bytes.
    pub image: String,
}

#[derive(Debug, Deserialize)]
pub struct AnalyzeRequest {
    pub query: String,
}

#[derive(Debug, Deserialize)]
pub struct ReportRequest {
    pub report_type: String,
    #[serde(default)]
    pub parameters: String,
}

#[derive(Debug, Serialize)]
pub struct ReportReply {
    pub report: String,
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/chat", post(chat))
        .route("/transactions", get(list_transactions))
        .route("/transactions/extract", post(extract_from_text))
        .route("/transactions/extract-image", post(extract_from_image))
        .route("/analyze", post(analyze))
        .route("/reports", post(report))
        .route("/customers", get(list_customers).post(add_customer))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn health() -> &'static str {
    "ok"
}

async fn chat(
    State(state): State<AppState>,
    Json(request): Json<ChatRequest>,
) -> Result<Json<ChatReply>, (StatusCode, String)> {
    let reply = state
        .assistant
        .process_query(&request.message)
        .await
        .map_err(assistant_error)?;
    Ok(Json(ChatReply { reply }))
}

async fn list_transactions(State(state): State<AppState>) -> Json<Vec<ChequeTransaction>> {
    Json(state.db.get_transactions().await)
}

async fn extract_from_text(
    State(state): State<AppState>,
    Json(request): Json<ExtractRequest>,
) -> Result<Json<ChequeTransaction>, (StatusCode, String)> {
    let transaction = state
        .assistant
        .create_transaction_from_text(&request.description)
        .await
        .map_err(assistant_error)?;
    Ok(Json(transaction))
}

async fn extract_from_image(
    State(state): State<AppState>,
    Json(request): Json<ExtractImageRequest>,
) -> Result<Json<ChequeTransaction>, (StatusCode, String)> {
    let image = STANDARD
        .decode(&request.image)
        .map_err(|error| (StatusCode::BAD_REQUEST, error.to_string()))?;
    let transaction = state
        .assistant
        .extract_data_from_image(&image)
        .await
        .map_err(assistant_error)?;
    Ok(Json(transaction))
}

async fn analyze(
    State(state): State<AppState>,
    Json(request): Json<AnalyzeRequest>,
) -> Result<Json<ChatReply>, (StatusCode, String)> {
    let reply = state
        .assistant
        .analyze_transactions(&request.query)
        .await
        .map_err(assistant_error)?;
    Ok(Json(ChatReply { reply }))
}

async fn report(
    State(state): State<AppState>,
    Json(request): Json<ReportRequest>,
) -> Result<Json<ReportReply>, (StatusCode, String)> {
    let report = state
        .assistant
        .generate_report(&request.report_type, &request.parameters)
        .await
        .map_err(assistant_error)?;
    Ok(Json(ReportReply { report }))
}

async fn list_customers(State(state): State<AppState>) -> Json<Vec<Customer>> {
    Json(state.db.get_customers().await)
}

async fn add_customer(
    State(state): State<AppState>,
    Json(customer): Json<Customer>,
) -> Result<(StatusCode, Json<Customer>), (StatusCode, String)> {
    let created = state
        .db
        .add_customer(customer)
        .await
        .map_err(|error| (StatusCode::INTERNAL_SERVER_ERROR, error.to_string()))?;
    Ok((StatusCode::CREATED, Json(created)))
}

fn assistant_error(error: AssistantError) -> (StatusCode, String) {
    // The only error the assistant seam lets through is the missing
    // initialization probe, which is a service-availability condition.
    (StatusCode::SERVICE_UNAVAILABLE, error.to_string())
}
