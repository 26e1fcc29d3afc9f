use std::sync::Arc;

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use sandbox_manager::{AcquireRequest, Credentials, ProjectStore, SandboxManager};
use serde_json::json;
use tower_http::trace::TraceLayer;
use tracing::{error, info, warn};

use crate::error::RunnerError;
use crate::executor::{self, ExecuteRequest};
use crate::types::{Operation, SandboxRequest};

#[derive(Clone)]
pub struct AppState {
    pub manager: Arc<SandboxManager>,
    pub store: Arc<dyn ProjectStore>,
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route(
            "/api/projects/:project_id/sandbox",
            post(sandbox_operation).delete(kill_sandbox),
        )
        .route("/healthz", get(health))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("{0}")]
    BadRequest(&'static str),

    #[error(transparent)]
    Runner(#[from] RunnerError),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        // Backend and store details stay in the logs.
        let (status, message) = match &self {
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, *msg),
            ApiError::Runner(RunnerError::Manager(_)) => {
                (StatusCode::BAD_GATEWAY, "Failed to get sandbox")
            }
            ApiError::Runner(RunnerError::Sandbox(_)) => {
                (StatusCode::BAD_GATEWAY, "Sandbox operation failed")
            }
            ApiError::Runner(_) => (StatusCode::INTERNAL_SERVER_ERROR, "Internal error"),
        };
        if status != StatusCode::BAD_REQUEST {
            error!(error = %self, "request failed");
        }
        (status, Json(json!({ "error": message }))).into_response()
    }
}

async fn sandbox_operation(
    State(state): State<AppState>,
    Path(project_id): Path<String>,
    Json(req): Json<SandboxRequest>,
) -> Result<Response, ApiError> {
    let operation = req.operation.unwrap_or_default();
    info!(
        project_id = %project_id,
        user_id = ?req.user_id,
        operation = ?operation,
        "project sandbox operation"
    );
    let credentials = req.access_token.map(Credentials::new);

    match operation {
        Operation::Pause => {
            let outcome = state.manager.pause(&project_id).await;
            for failure in outcome.soft_failures() {
                warn!(project_id = %project_id, failure = %failure, "pause incomplete");
            }
            Ok(Json(json!({ "success": true, "consistent": outcome.is_clean() })).into_response())
        }
        Operation::Resume => {
            let template = req
                .template
                .or_else(|| req.fragment.map(|f| f.template))
                .ok_or(ApiError::BadRequest("Template required"))?;
            let mut acquire = AcquireRequest::new(project_id, template);
            if let Some(team_id) = req.team_id {
                acquire = acquire.with_team(team_id);
            }
            if let Some(creds) = credentials {
                acquire = acquire.with_credentials(creds);
            }
            let acquired = state
                .manager
                .get_or_create(&acquire)
                .await
                .map_err(RunnerError::from)?;
            Ok(Json(json!({
                "sbxId": acquired.handle.id(),
                "source": acquired.source,
            }))
            .into_response())
        }
        Operation::Execute => {
            let fragment = req.fragment.ok_or(ApiError::BadRequest("Fragment required"))?;
            let result = executor::execute(
                &state.manager,
                state.store.as_ref(),
                &project_id,
                ExecuteRequest {
                    fragment,
                    team_id: req.team_id,
                    credentials,
                },
            )
            .await?;
            Ok(Json(result).into_response())
        }
    }
}

async fn kill_sandbox(
    State(state): State<AppState>,
    Path(project_id): Path<String>,
) -> Json<serde_json::Value> {
    info!(project_id = %project_id, "killing project sandbox");
    let outcome = state.manager.kill(&project_id).await;
    for failure in outcome.soft_failures() {
        warn!(project_id = %project_id, failure = %failure, "kill incomplete");
    }
    Json(json!({ "success": true, "consistent": outcome.is_clean() }))
}

async fn health(State(state): State<AppState>) -> Json<serde_json::Value> {
    Json(json!({
        "status": "ok",
        "cachedSandboxes": state.manager.cached_projects().len(),
    }))
}
