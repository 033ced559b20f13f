use std::sync::Arc;

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use finsight_core::{ResolvedTransaction, UserId};
use finsight_extract::{ExtractionPipeline, FeedbackMessage, Outcome, RejectReason};
use finsight_storage::{get_transactions_by_user, DbPool, StorageError};
use serde::{Deserialize, Serialize};
use tower_http::trace::TraceLayer;

#[derive(Clone)]
pub struct AppState {
    pub pipeline: Arc<ExtractionPipeline>,
    pub db: DbPool,
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/api/v1/transactions", post(create_transaction))
        .route("/api/v1/transactions/user/{user_id}", get(list_transactions))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

// ── Errors ───────────────────────────────────────────────────────────────────

#[derive(Debug)]
pub enum ApiError {
    BadRequest(String),
    Storage(StorageError),
}

impl From<StorageError> for ApiError {
    fn from(err: StorageError) -> Self {
        ApiError::Storage(err)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg),
            ApiError::Storage(err) => {
                tracing::error!(error = %err, "storage failure");
                (StatusCode::INTERNAL_SERVER_ERROR, "Internal storage error".to_string())
            }
        };
        (status, Json(serde_json::json!({ "error": message }))).into_response()
    }
}

fn parse_user_id(raw: &str) -> Result<UserId, ApiError> {
    raw.parse()
        .map_err(|_| ApiError::BadRequest(format!("Invalid user id: '{raw}'")))
}

// ── Handlers ─────────────────────────────────────────────────────────────────

async fn health() -> Json<serde_json::Value> {
    Json(serde_json::json!({ "status": "ok" }))
}

#[derive(Debug, Deserialize)]
pub struct CreateTransactionRequest {
    /// Kept as text so a malformed id is a 400 rather than a body rejection.
    pub user_id: String,
    pub input_text: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct CreateTransactionResponse {
    pub success: bool,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub transaction: Option<ResolvedTransaction>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<RejectReason>,
}

fn status_for(feedback: &FeedbackMessage) -> StatusCode {
    match &feedback.outcome {
        Outcome::Recorded { .. } => StatusCode::CREATED,
        Outcome::Rejected {
            reason: RejectReason::PersistenceFailure,
            ..
        } => StatusCode::INTERNAL_SERVER_ERROR,
        Outcome::Rejected { .. } => StatusCode::UNPROCESSABLE_ENTITY,
    }
}

async fn create_transaction(
    State(state): State<AppState>,
    Json(req): Json<CreateTransactionRequest>,
) -> Result<(StatusCode, Json<CreateTransactionResponse>), ApiError> {
    let user_id = parse_user_id(&req.user_id)?;
    let feedback = state.pipeline.extract_and_record(&req.input_text, user_id).await;
    let status = status_for(&feedback);

    let (transaction, reason) = match feedback.outcome {
        Outcome::Recorded { transaction, .. } => (Some(transaction), None),
        Outcome::Rejected { reason, .. } => (None, Some(reason)),
    };
    Ok((
        status,
        Json(CreateTransactionResponse {
            success: transaction.is_some(),
            message: feedback.text,
            transaction,
            reason,
        }),
    ))
}

async fn list_transactions(
    State(state): State<AppState>,
    Path(user_id): Path<String>,
) -> Result<Json<Vec<ResolvedTransaction>>, ApiError> {
    let user_id = parse_user_id(&user_id)?;
    let transactions = get_transactions_by_user(&state.db, user_id).await?;
    Ok(Json(transactions))
}
