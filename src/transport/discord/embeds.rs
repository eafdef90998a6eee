//! Embed payloads for interaction replies.

use super::types::{MAX_EMBED_FIELD_LENGTH, colors};
use crate::transport::relay::CommandResult;
use serde_json::json;

fn timestamp() -> String {
    chrono::Utc::now().to_rfc3339()
}

fn field_value(text: &str) -> String {
    if text.chars().count() <= MAX_EMBED_FIELD_LENGTH {
        return text.to_string();
    }
    let mut truncated: String = text.chars().take(MAX_EMBED_FIELD_LENGTH - 3).collect();
    truncated.push_str("...");
    truncated
}

pub fn command_sent(invocation: &str, command_id: &str, server: &str) -> serde_json::Value {
    json!({
        "title": "🔄 Command Sent",
        "color": colors::PENDING,
        "description": format!("Command: `{invocation}`"),
        "fields": [
            {"name": "Command ID", "value": command_id, "inline": true},
            {"name": "Server", "value": server, "inline": true}
        ],
        "timestamp": timestamp(),
    })
}

pub fn command_result(invocation: &str, result: &CommandResult) -> serde_json::Value {
    let (title, color) = if result.success {
        ("✅ Command Executed", colors::SUCCESS)
    } else {
        ("❌ Command Failed", colors::FAILURE)
    };
    json!({
        "title": title,
        "color": color,
        "description": format!("Command: `{invocation}`"),
        "fields": [
            {"name": "Result", "value": field_value(&result.display_text()), "inline": false}
        ],
        "timestamp": timestamp(),
    })
}

pub fn command_timeout(waited_secs: u64) -> serde_json::Value {
    json!({
        "title": "⏰ Command Timeout",
        "color": colors::TIMEOUT,
        "description": format!(
            "Command was sent but no response received within {waited_secs} seconds"
        ),
        "timestamp": timestamp(),
    })
}

pub fn error(message: &str) -> serde_json::Value {
    json!({
        "title": "❌ Error",
        "color": colors::FAILURE,
        "description": message,
        "timestamp": timestamp(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn result(success: bool, text: Option<&str>) -> CommandResult {
        CommandResult {
            success,
            result: text.map(Into::into),
            error: None,
            timestamp: 0,
        }
    }

    #[test]
    fn sent_embed_lists_id_and_server() {
        let embed = command_sent("ban bob", "cmd-1", "main_server");
        assert_eq!(embed["description"], "Command: `ban bob`");
        assert_eq!(embed["fields"][0]["value"], "cmd-1");
        assert_eq!(embed["fields"][1]["value"], "main_server");
        assert_eq!(embed["color"], colors::PENDING);
    }

    #[test]
    fn result_embed_reflects_success() {
        let ok = command_result("kick", &result(true, Some("kicked")));
        assert_eq!(ok["title"], "✅ Command Executed");
        assert_eq!(ok["fields"][0]["value"], "kicked");

        let failed = command_result("kick", &result(false, None));
        assert_eq!(failed["title"], "❌ Command Failed");
        assert_eq!(failed["fields"][0]["value"], "No output");
    }

    #[test]
    fn long_results_are_truncated_to_field_limit() {
        let long = "x".repeat(MAX_EMBED_FIELD_LENGTH + 50);
        let embed = command_result("dump", &result(true, Some(&long)));
        let value = embed["fields"][0]["value"].as_str().unwrap();
        assert_eq!(value.chars().count(), MAX_EMBED_FIELD_LENGTH);
        assert!(value.ends_with("..."));
    }

    #[test]
    fn timeout_embed_mentions_window() {
        let embed = command_timeout(10);
        assert!(embed["description"].as_str().unwrap().contains("10 seconds"));
    }
}
