use crate::support::RelayTestServer;
use reqwest::StatusCode;
use serde_json::{Value, json};

async fn post_json(client: &reqwest::Client, url: String, body: &Value) -> (StatusCode, Value) {
    let response = client
        .post(url)
        .json(body)
        .send()
        .await
        .expect("relay request should succeed");
    let status = response.status();
    let body = response.json().await.expect("relay response should be JSON");
    (status, body)
}

async fn get_json(client: &reqwest::Client, url: String) -> (StatusCode, Value) {
    let response = client
        .get(url)
        .send()
        .await
        .expect("relay request should succeed");
    let status = response.status();
    let body = response.json().await.expect("relay response should be JSON");
    (status, body)
}

fn ban_command(server_id: &str) -> Value {
    json!({
        "discordUserId": "1252626721522454574",
        "robloxUserId": 1_346_667_455_u64,
        "command": "ban",
        "args": ["player1", "griefing"],
        "serverId": server_id,
    })
}

#[tokio::test]
async fn command_round_trip_through_http() {
    let server = RelayTestServer::start().await;
    let client = reqwest::Client::new();

    let (status, queued) = post_json(&client, server.url("/api/command"), &ban_command("main")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(queued["message"], "Command queued successfully");
    let command_id = queued["commandId"].as_str().unwrap().to_string();

    let (status, pending) = get_json(&client, server.url("/api/commands/main")).await;
    assert_eq!(status, StatusCode::OK);
    let commands = pending["commands"].as_array().unwrap();
    assert_eq!(commands.len(), 1);
    assert_eq!(commands[0]["id"], command_id.as_str());
    assert_eq!(commands[0]["args"], json!(["player1", "griefing"]));
    assert_eq!(commands[0]["executed"], true);

    let (_, again) = get_json(&client, server.url("/api/commands/main")).await;
    assert!(again["commands"].as_array().unwrap().is_empty());

    let (status, _) = get_json(&client, server.url(&format!("/api/result/{command_id}"))).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, ack) = post_json(
        &client,
        server.url("/api/result"),
        &json!({"commandId": command_id, "success": true, "result": "Banned player1"}),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(ack["message"], "Result received");

    let (status, result) = get_json(&client, server.url(&format!("/api/result/{command_id}"))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(result["success"], true);
    assert_eq!(result["result"], "Banned player1");
    assert!(result["timestamp"].as_i64().unwrap() > 0);
}

#[tokio::test]
async fn non_string_results_are_accepted() {
    let server = RelayTestServer::start().await;
    let client = reqwest::Client::new();

    let (status, _) = post_json(
        &client,
        server.url("/api/result"),
        &json!({"commandId": "c1", "success": true, "result": {"kicked": 3}}),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    let (status, _) = post_json(
        &client,
        server.url("/api/result"),
        &json!({"commandId": "c2", "success": false, "error": 42}),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    let (_, first) = get_json(&client, server.url("/api/result/c1")).await;
    assert_eq!(first["result"], json!({"kicked": 3}));
    let (_, second) = get_json(&client, server.url("/api/result/c2")).await;
    assert_eq!(second["error"], 42);
}

#[tokio::test]
async fn pending_is_scoped_per_server() {
    let server = RelayTestServer::start().await;
    let client = reqwest::Client::new();

    post_json(&client, server.url("/api/command"), &ban_command("alpha")).await;
    post_json(&client, server.url("/api/command"), &ban_command("beta")).await;

    let (_, alpha) = get_json(&client, server.url("/api/commands/alpha")).await;
    assert_eq!(alpha["commands"].as_array().unwrap().len(), 1);
    assert_eq!(alpha["commands"][0]["serverId"], "alpha");

    let (_, all) = get_json(&client, server.url("/api/commands")).await;
    let remaining = all["commands"].as_array().unwrap();
    assert_eq!(remaining.len(), 1);
    assert_eq!(remaining[0]["serverId"], "beta");
}

#[tokio::test]
async fn malformed_submissions_are_rejected() {
    let server = RelayTestServer::start().await;
    let client = reqwest::Client::new();

    let (status, body) = post_json(
        &client,
        server.url("/api/command"),
        &json!({"discordUserId": "1", "args": []}),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "Missing required fields");

    let (status, body) = post_json(&client, server.url("/api/result"), &json!({"success": true})).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["error"].as_str().is_some());
}

#[tokio::test]
async fn unknown_result_is_404_with_error_body() {
    let server = RelayTestServer::start().await;
    let client = reqwest::Client::new();

    let (status, body) = get_json(&client, server.url("/api/result/does-not-exist")).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body, json!({"error": "Result not found"}));
}

#[tokio::test]
async fn status_reports_counters_and_cors_is_open() {
    let server = RelayTestServer::start().await;
    let client = reqwest::Client::new();

    post_json(&client, server.url("/api/command"), &ban_command("main")).await;

    let response = client
        .get(server.url("/"))
        .header("Origin", "https://example.org")
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert!(response.headers().contains_key("access-control-allow-origin"));

    let body: Value = response.json().await.unwrap();
    assert_eq!(body["status"], "online");
    assert_eq!(body["queued_commands"], 1);
    assert_eq!(body["stored_results"], 0);
    assert!(body["uptime"].as_f64().is_some());
}
