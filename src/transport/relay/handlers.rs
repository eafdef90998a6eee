use super::AppState;
use super::types::{
    EnqueueRequest, EnqueueResponse, ErrorResponse, MessageResponse, PendingCommands,
    ResultSubmission,
};
use crate::error::BridgeError;
use axum::{
    extract::{Path, State, rejection::JsonRejection},
    http::StatusCode,
    response::{IntoResponse, Json, Response},
};

impl IntoResponse for BridgeError {
    fn into_response(self) -> Response {
        let status = match &self {
            BridgeError::Validation(_) => StatusCode::BAD_REQUEST,
            BridgeError::NotFound(_) => StatusCode::NOT_FOUND,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };
        let error = match self {
            BridgeError::Validation(message) | BridgeError::NotFound(message) => message,
            other => other.to_string(),
        };
        (status, Json(ErrorResponse { error })).into_response()
    }
}

fn invalid_json_response(rejection: &JsonRejection) -> Response {
    tracing::warn!(error = %rejection.body_text(), "relay.invalid_json");
    BridgeError::Validation(format!("Invalid JSON payload: {}", rejection.body_text()))
        .into_response()
}

/// GET /: status page with store counters
pub(super) async fn handle_status(State(state): State<AppState>) -> impl IntoResponse {
    let stats = state.store.stats();
    Json(serde_json::json!({
        "status": "online",
        "timestamp": chrono::Utc::now().to_rfc3339(),
        "uptime": state.started_at.elapsed().as_secs_f64(),
        "queued_commands": stats.queued_commands,
        "stored_results": stats.stored_results,
        "endpoints": {
            "POST /api/command": "Submit new command",
            "GET /api/commands/{serverId}": "Get pending commands for server",
            "POST /api/result": "Submit command result",
            "GET /api/result/{commandId}": "Get command result",
        },
    }))
}

/// GET /health: liveness probe
pub(super) async fn handle_health() -> impl IntoResponse {
    Json(serde_json::json!({
        "status": "ok",
        "timestamp": chrono::Utc::now().timestamp_millis(),
    }))
}

/// POST /api/command: queue a command from the Discord bot
pub(super) async fn handle_enqueue(
    State(state): State<AppState>,
    payload: Result<Json<EnqueueRequest>, JsonRejection>,
) -> Response {
    let Json(request) = match payload {
        Ok(payload) => payload,
        Err(rejection) => return invalid_json_response(&rejection),
    };

    match state.store.enqueue(request) {
        Ok(command) => {
            tracing::info!(
                command_id = %command.id,
                verb = %command.command,
                server_id = command.server_id.as_deref().unwrap_or("*"),
                roblox_user_id = %command.roblox_user_id,
                "relay.enqueue"
            );
            Json(EnqueueResponse {
                command_id: command.id,
                message: "Command queued successfully".into(),
            })
            .into_response()
        }
        Err(error) => {
            tracing::warn!(error = %error, "relay.enqueue_rejected");
            error.into_response()
        }
    }
}

/// GET /api/commands/{serverId}: game server pulls its pending commands
pub(super) async fn handle_pending_for_server(
    State(state): State<AppState>,
    Path(server_id): Path<String>,
) -> Json<PendingCommands> {
    take_pending(&state, Some(server_id.as_str()))
}

/// GET /api/commands: pending commands for every server
pub(super) async fn handle_pending_all(State(state): State<AppState>) -> Json<PendingCommands> {
    take_pending(&state, None)
}

fn take_pending(state: &AppState, server_id: Option<&str>) -> Json<PendingCommands> {
    let commands = state.store.take_pending(server_id);
    if !commands.is_empty() {
        tracing::info!(
            server_id = server_id.unwrap_or("*"),
            count = commands.len(),
            "relay.dequeue"
        );
    }
    Json(PendingCommands { commands })
}

/// POST /api/result: game server reports an execution result
pub(super) async fn handle_submit_result(
    State(state): State<AppState>,
    payload: Result<Json<ResultSubmission>, JsonRejection>,
) -> Response {
    let Json(submission) = match payload {
        Ok(payload) => payload,
        Err(rejection) => return invalid_json_response(&rejection),
    };
    let command_id = submission.command_id.clone().unwrap_or_default();
    let success = submission.success;

    match state.store.record_result(submission) {
        Ok(()) => {
            tracing::info!(command_id = %command_id, success, "relay.result");
            Json(MessageResponse {
                message: "Result received".into(),
            })
            .into_response()
        }
        Err(error) => error.into_response(),
    }
}

/// GET /api/result/{commandId}: bot polls for a result
pub(super) async fn handle_get_result(
    State(state): State<AppState>,
    Path(command_id): Path<String>,
) -> Response {
    tracing::debug!(command_id = %command_id, "relay.result_lookup");
    match state.store.result(&command_id) {
        Some(result) => Json(result).into_response(),
        None => BridgeError::NotFound("Result not found".into()).into_response(),
    }
}
