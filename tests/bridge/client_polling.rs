use crate::support::RelayTestServer;
use cmdr_bridge::BridgeError;
use cmdr_bridge::bridge::{AccountLinks, CommandRelay, PollSettings, RelayClient, Submission};
use serde_json::{Value, json};
use std::collections::HashMap;
use std::time::Duration;

fn links() -> AccountLinks {
    AccountLinks::new(
        HashMap::from([("1252626721522454574".to_string(), 1_346_667_455)]),
        HashMap::new(),
        "main_server",
    )
}

fn client_for(server: &RelayTestServer, timeout: Duration) -> RelayClient {
    RelayClient::new(
        server.base_url(),
        links(),
        PollSettings {
            interval: Duration::from_millis(50),
            timeout,
        },
    )
    .expect("relay client should build")
}

fn kick(server_id: &str) -> Submission<'_> {
    Submission {
        discord_user_id: "1252626721522454574",
        verb: "kick",
        args: Some("player1  afk"),
        server_id: Some(server_id),
    }
}

#[tokio::test]
async fn bot_submission_reaches_game_server_and_result_comes_back() {
    let server = RelayTestServer::start().await;
    let relay = client_for(&server, Duration::from_secs(5));

    let command_id = relay.submit(kick("main_server")).await.unwrap();

    let http = reqwest::Client::new();
    let pending: Value = http
        .get(server.url("/api/commands/main_server"))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    let command = &pending["commands"][0];
    assert_eq!(command["id"], command_id.as_str());
    assert_eq!(command["robloxUserId"], 1_346_667_455_u64);
    assert_eq!(command["command"], "kick");
    assert_eq!(command["args"], json!(["player1", "afk"]));

    let result_url = server.url("/api/result");
    let id = command_id.clone();
    let game_server = tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(200)).await;
        reqwest::Client::new()
            .post(result_url)
            .json(&json!({"commandId": id, "success": false, "error": "Player not found"}))
            .send()
            .await
            .unwrap();
    });

    let result = relay.await_result(&command_id).await.unwrap();
    game_server.await.unwrap();

    assert!(!result.success);
    assert_eq!(result.display_text(), "Player not found");
}

#[tokio::test]
async fn unanswered_command_times_out() {
    let server = RelayTestServer::start().await;
    let relay = client_for(&server, Duration::from_millis(300));

    let command_id = relay.submit(kick("main_server")).await.unwrap();
    let err = relay.await_result(&command_id).await.unwrap_err();

    assert!(matches!(err, BridgeError::CommandTimeout { .. }));
}

#[tokio::test]
async fn unlinked_user_never_reaches_the_relay() {
    let server = RelayTestServer::start().await;
    let relay = client_for(&server, Duration::from_millis(300));

    let err = relay
        .submit(Submission {
            discord_user_id: "999",
            verb: "kick",
            args: None,
            server_id: None,
        })
        .await
        .unwrap_err();
    assert!(matches!(err, BridgeError::UnlinkedAccount { .. }));

    let status: Value = reqwest::get(server.url("/"))
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(status["queued_commands"], 0);
}
