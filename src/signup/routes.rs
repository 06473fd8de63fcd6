//! REST endpoints driving signup sessions.

use std::sync::Arc;

use axum::{
    Json, Router,
    extract::{Path, State},
    http::StatusCode,
    routing::{get, patch, post},
};
use serde_json::{Value, json};
use tracing::warn;
use uuid::Uuid;

use super::draft::{Domain, DraftPatch, Gender, Persona};
use super::flow::SignupFlow;
use super::sessions::SessionStore;
use crate::error::{FlowError, SignupError};

type ApiResponse = (StatusCode, Json<Value>);
type ApiResult = Result<ApiResponse, ApiResponse>;

/// Shared state for signup routes.
#[derive(Clone)]
pub struct SignupRouteState {
    pub sessions: Arc<SessionStore>,
}

/// Build the signup REST routes.
pub fn signup_routes(sessions: Arc<SessionStore>) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/api/signup/catalog", get(catalog))
        .route("/api/signup", post(start_signup))
        .route("/api/signup/{id}", get(get_status))
        .route("/api/signup/{id}/draft", patch(update_draft))
        .route("/api/signup/{id}/advance", post(advance))
        .route("/api/signup/{id}/retreat", post(retreat))
        .route("/api/signup/{id}/complete", post(complete))
        .with_state(SignupRouteState { sessions })
}

fn error(status: StatusCode, message: impl Into<String>) -> ApiResponse {
    (status, Json(json!({ "error": message.into() })))
}

/// Map a flow error to a response. `blocked` is the status used when a
/// step gate refused the operation.
fn flow_error(err: FlowError, blocked: StatusCode) -> ApiResponse {
    let status = match &err {
        FlowError::FieldNotEditable { .. } => StatusCode::UNPROCESSABLE_ENTITY,
        FlowError::Blocked { .. } => blocked,
        FlowError::NotAtFinalStep(_) => StatusCode::UNPROCESSABLE_ENTITY,
        FlowError::AlreadyCompleted => StatusCode::CONFLICT,
        FlowError::Signup(SignupError::Validation(_)) => StatusCode::UNPROCESSABLE_ENTITY,
        FlowError::Signup(SignupError::AccountCreation(_)) => StatusCode::BAD_GATEWAY,
    };
    match &err {
        FlowError::Blocked { step, reason } => (
            status,
            Json(json!({ "error": reason.to_string(), "step": step })),
        ),
        // Shown to the user as the backend worded it.
        FlowError::Signup(SignupError::AccountCreation(msg)) => error(status, msg.clone()),
        FlowError::Signup(SignupError::Validation(e)) => error(status, e.to_string()),
        _ => error(status, err.to_string()),
    }
}

async fn find_flow(state: &SignupRouteState, id: &str) -> Result<Arc<SignupFlow>, ApiResponse> {
    let id = Uuid::parse_str(id).map_err(|_| error(StatusCode::BAD_REQUEST, "Invalid signup ID"))?;
    state
        .sessions
        .get(id)
        .await
        .ok_or_else(|| error(StatusCode::NOT_FOUND, "Signup session not found"))
}

fn ok<T: serde::Serialize>(value: T) -> ApiResponse {
    (StatusCode::OK, Json(json!(value)))
}

// ── Health ──────────────────────────────────────────────────────────────

async fn health() -> Json<Value> {
    Json(json!({
        "status": "ok",
        "service": "twindle-signup"
    }))
}

// ── Catalog ─────────────────────────────────────────────────────────────

async fn catalog() -> Json<Value> {
    let domains: Vec<Value> = Domain::ALL
        .iter()
        .map(|d| {
            json!({
                "name": d.label(),
                "specializations": d.specializations(),
            })
        })
        .collect();
    Json(json!({
        "personas": Persona::ALL.iter().map(Persona::label).collect::<Vec<_>>(),
        "domains": domains,
        "genders": Gender::ALL,
    }))
}

// ── Sessions ────────────────────────────────────────────────────────────

async fn start_signup(State(state): State<SignupRouteState>) -> ApiResponse {
    let flow = state.sessions.create().await;
    let status = flow.status().await;
    (
        StatusCode::CREATED,
        Json(json!({ "id": flow.id(), "status": status })),
    )
}

async fn get_status(State(state): State<SignupRouteState>, Path(id): Path<String>) -> ApiResult {
    let flow = find_flow(&state, &id).await?;
    Ok(ok(flow.status().await))
}

async fn update_draft(
    State(state): State<SignupRouteState>,
    Path(id): Path<String>,
    Json(patch): Json<DraftPatch>,
) -> ApiResult {
    let flow = find_flow(&state, &id).await?;
    flow.update(patch)
        .await
        .map(ok)
        .map_err(|e| flow_error(e, StatusCode::CONFLICT))
}

async fn advance(State(state): State<SignupRouteState>, Path(id): Path<String>) -> ApiResult {
    let flow = find_flow(&state, &id).await?;
    flow.advance()
        .await
        .map(ok)
        .map_err(|e| flow_error(e, StatusCode::CONFLICT))
}

async fn retreat(State(state): State<SignupRouteState>, Path(id): Path<String>) -> ApiResult {
    let flow = find_flow(&state, &id).await?;
    flow.retreat()
        .await
        .map(ok)
        .map_err(|e| flow_error(e, StatusCode::CONFLICT))
}

async fn complete(State(state): State<SignupRouteState>, Path(id): Path<String>) -> ApiResult {
    let flow = find_flow(&state, &id).await?;
    match flow.complete().await {
        Ok(report) => {
            state.sessions.remove(flow.id()).await;
            Ok((StatusCode::CREATED, Json(json!(report))))
        }
        Err(e) => {
            if let FlowError::Signup(SignupError::AccountCreation(msg)) = &e {
                warn!(flow_id = %flow.id(), error = %msg, "Signup rejected by backend");
            }
            Err(flow_error(e, StatusCode::UNPROCESSABLE_ENTITY))
        }
    }
}
