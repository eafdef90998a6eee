use super::handlers::{
    handle_enqueue, handle_get_result, handle_health, handle_pending_all,
    handle_pending_for_server, handle_status, handle_submit_result,
};
use super::*;
use crate::error::BridgeError;
use axum::{
    body::to_bytes,
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Json, Response},
};
use serde_json::Value;

fn test_state() -> AppState {
    AppState::new(Arc::new(CommandStore::default()))
}

async fn body_json(response: Response) -> Value {
    let bytes = to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("response body should be readable");
    serde_json::from_slice(&bytes).expect("response body should be JSON")
}

fn ban_request() -> EnqueueRequest {
    EnqueueRequest {
        discord_user_id: Some("1252626721522454574".into()),
        roblox_user_id: Some(RobloxUserId::Numeric(1_346_667_455)),
        command: Some("ban".into()),
        args: Some(vec!["reason".into()]),
        server_id: Some("main".into()),
    }
}

async fn enqueue(state: &AppState, request: EnqueueRequest) -> String {
    let response = handle_enqueue(State(state.clone()), Ok(Json(request))).await;
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["message"], "Command queued successfully");
    body["commandId"]
        .as_str()
        .expect("commandId should be a string")
        .to_string()
}

#[test]
fn security_body_limit_is_64kb() {
    assert_eq!(MAX_BODY_SIZE, 65_536);
}

#[test]
fn security_timeout_is_30_seconds() {
    assert_eq!(REQUEST_TIMEOUT_SECS, 30);
}

#[test]
fn app_state_is_clone() {
    fn assert_clone<T: Clone>() {}
    assert_clone::<AppState>();
}

#[test]
fn validation_error_maps_to_400_json() {
    let response = BridgeError::Validation("Missing required fields".into()).into_response();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn enqueue_then_dequeue_scenario() {
    let state = test_state();
    let id = enqueue(&state, ban_request()).await;

    let Json(first) =
        handle_pending_for_server(State(state.clone()), Path("main".to_string())).await;
    assert_eq!(first.commands.len(), 1);
    assert_eq!(first.commands[0].id, id);
    assert!(first.commands[0].executed);
    assert_eq!(first.commands[0].args, vec!["reason".to_string()]);

    let Json(second) =
        handle_pending_for_server(State(state.clone()), Path("main".to_string())).await;
    assert!(second.commands.is_empty());
}

#[tokio::test]
async fn dequeue_for_other_server_leaves_command_pending() {
    let state = test_state();
    let id = enqueue(&state, ban_request()).await;

    let Json(other) =
        handle_pending_for_server(State(state.clone()), Path("lobby".to_string())).await;
    assert!(other.commands.is_empty());

    let Json(all) = handle_pending_all(State(state.clone())).await;
    assert_eq!(all.commands.len(), 1);
    assert_eq!(all.commands[0].id, id);
}

#[tokio::test]
async fn enqueue_missing_fields_is_400_and_not_stored() {
    let state = test_state();

    let mut missing_verb = ban_request();
    missing_verb.command = None;
    let response = handle_enqueue(State(state.clone()), Ok(Json(missing_verb))).await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(body_json(response).await["error"], "Missing required fields");

    let mut missing_target = ban_request();
    missing_target.roblox_user_id = None;
    let response = handle_enqueue(State(state.clone()), Ok(Json(missing_target))).await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    assert_eq!(state.store.stats().queued_commands, 0);
}

#[tokio::test]
async fn result_roundtrip_and_missing_result_is_404() {
    let state = test_state();
    let id = enqueue(&state, ban_request()).await;

    let missing = handle_get_result(State(state.clone()), Path(id.clone())).await;
    assert_eq!(missing.status(), StatusCode::NOT_FOUND);
    assert_eq!(body_json(missing).await["error"], "Result not found");

    let submission = ResultSubmission {
        command_id: Some(id.clone()),
        success: true,
        result: Some("ok".into()),
        error: None,
    };
    let response = handle_submit_result(State(state.clone()), Ok(Json(submission))).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_json(response).await["message"], "Result received");

    let found = handle_get_result(State(state.clone()), Path(id)).await;
    assert_eq!(found.status(), StatusCode::OK);
    let body = body_json(found).await;
    assert_eq!(body["success"], true);
    assert_eq!(body["result"], "ok");
}

#[tokio::test]
async fn result_for_unknown_command_is_accepted() {
    let state = test_state();
    let submission = ResultSubmission {
        command_id: Some("not-a-real-id".into()),
        success: false,
        result: None,
        error: Some("no such player".into()),
    };
    let response = handle_submit_result(State(state.clone()), Ok(Json(submission))).await;
    assert_eq!(response.status(), StatusCode::OK);

    let found = handle_get_result(State(state), Path("not-a-real-id".into())).await;
    assert_eq!(body_json(found).await["error"], "no such player");
}

#[tokio::test]
async fn structured_results_are_stored_verbatim() {
    let state = test_state();
    let id = enqueue(&state, ban_request()).await;

    let submission: ResultSubmission = serde_json::from_value(serde_json::json!({
        "commandId": id,
        "success": true,
        "result": {"kicked": 3, "names": ["a", "b"]},
    }))
    .expect("object results should parse");
    let response = handle_submit_result(State(state.clone()), Ok(Json(submission))).await;
    assert_eq!(response.status(), StatusCode::OK);

    let body = body_json(handle_get_result(State(state), Path(id)).await).await;
    assert_eq!(body["result"], serde_json::json!({"kicked": 3, "names": ["a", "b"]}));
}

#[tokio::test]
async fn status_reports_store_counters() {
    let state = test_state();
    enqueue(&state, ban_request()).await;

    let body = body_json(handle_status(State(state)).await.into_response()).await;
    assert_eq!(body["status"], "online");
    assert_eq!(body["queued_commands"], 1);
    assert_eq!(body["stored_results"], 0);
    assert!(body["uptime"].as_f64().is_some());
    assert!(body["endpoints"]["POST /api/command"].is_string());
}

#[tokio::test]
async fn health_is_ok() {
    let body = body_json(handle_health().await.into_response()).await;
    assert_eq!(body["status"], "ok");
    assert!(body["timestamp"].as_i64().is_some());
}
