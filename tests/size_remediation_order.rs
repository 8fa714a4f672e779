//! Integration test: oversized `conversationState` payloads are remediated
//! in the documented stage order (history floor, inner truncation, tool
//! drop, emergency floor), stopping as soon as the budget is met.
//!
//! Each stage's expected output is measured by building the corresponding
//! already-remediated state directly (not guessed from byte counts), then
//! used as the exact `max_request_size` threshold for the real, oversized
//! request. This way the assertions hold regardless of JSON serialization
//! overhead.

use std::time::Duration;

use kiro_gateway::config::GatewayConfig;
use kiro_gateway::convert::request::build_kiro_payload;
use kiro_gateway::{Message, MessageContent, MessagesRequest, Role, Tool};

const EMERGENCY_MARKER: &str = "\n...[已截断]";

fn config_with(max_request_size: usize) -> GatewayConfig {
    GatewayConfig {
        oauth_creds_dir_path: None,
        oauth_creds_file_path: None,
        oauth_creds_base64: None,
        request_timeout: Duration::from_secs(5),
        max_retries: 3,
        base_retry_delay: Duration::from_millis(1),
        cron_near_minutes: 10,
        use_system_proxy: false,
        max_history: 25,
        max_message_length: 1_000_000,
        max_tools: 12,
        disable_tools: false,
        max_request_size,
        base_url_override: None,
    }
}

fn echo_tool() -> Tool {
    Tool {
        name: "Echo".to_string(),
        description: Some("echoes input".to_string()),
        input_schema: serde_json::json!({"type": "object"}),
    }
}

/// `history_contents.len()` history messages (alternating user/assistant,
/// starting with user), followed by one short final user message.
fn request_with(history_contents: &[String]) -> MessagesRequest {
    let mut req = MessagesRequest::new("claude-sonnet-4-5", 1024);
    for (i, content) in history_contents.iter().enumerate() {
        req.messages.push(Message {
            role: if i % 2 == 0 { Role::User } else { Role::Assistant },
            content: MessageContent::Text(content.clone()),
        });
    }
    req.messages.push(Message {
        role: Role::User,
        content: MessageContent::Text("go".to_string()),
    });
    req.tools = Some(vec![echo_tool()]);
    req
}

fn history_array(payload: &serde_json::Value) -> Vec<serde_json::Value> {
    payload["conversationState"]["history"]
        .as_array()
        .cloned()
        .unwrap_or_default()
}

fn entry_content(entry: &serde_json::Value) -> String {
    entry["userInputMessage"]["content"]
        .as_str()
        .or_else(|| entry["assistantResponseMessage"]["content"].as_str())
        .unwrap_or_default()
        .to_string()
}

fn tools_field(payload: &serde_json::Value) -> serde_json::Value {
    payload["conversationState"]["currentMessage"]["userInputMessage"]["userInputMessageContext"]
        ["tools"]
        .clone()
}

fn serialized_len(payload: &serde_json::Value) -> usize {
    serde_json::to_vec(payload).unwrap().len()
}

#[test]
fn no_remediation_below_budget() {
    let contents: Vec<String> = (0..19).map(|_| "h".repeat(3000)).collect();
    let request = request_with(&contents);
    let payload = build_kiro_payload(&request, "m", None, &config_with(usize::MAX)).unwrap();

    let history = history_array(&payload);
    assert_eq!(history.len(), 19);
    assert!(entry_content(&history[0]) == "h".repeat(3000));
    assert!(tools_field(&payload).is_array());
}

#[test]
fn history_floor_alone_satisfies_budget() {
    let contents: Vec<String> = (0..19).map(|_| "h".repeat(3000)).collect();
    let request = request_with(&contents);

    // Measure the exact size of "shrunk to the floor, nothing else touched".
    let floor_contents: Vec<String> = (0..5).map(|_| "h".repeat(3000)).collect();
    let floor_payload =
        build_kiro_payload(&request_with(&floor_contents), "m", None, &config_with(usize::MAX)).unwrap();
    let floor_len = serialized_len(&floor_payload);

    let payload = build_kiro_payload(&request, "m", None, &config_with(floor_len)).unwrap();

    let history = history_array(&payload);
    assert_eq!(history.len(), 5, "should stop exactly at the history floor");
    for entry in &history {
        assert_eq!(entry_content(entry), "h".repeat(3000), "content untouched at this stage");
    }
    assert!(tools_field(&payload).is_array(), "tools untouched at this stage");
}

#[test]
fn inner_truncation_engages_when_floor_is_not_enough() {
    let contents: Vec<String> = (0..19).map(|_| "h".repeat(3000)).collect();
    let request = request_with(&contents);

    let truncated = format!("{}{}", "h".repeat(2000), EMERGENCY_MARKER);
    let truncated_contents: Vec<String> = (0..5).map(|_| truncated.clone()).collect();
    let truncated_payload =
        build_kiro_payload(&request_with(&truncated_contents), "m", None, &config_with(usize::MAX)).unwrap();
    let truncated_len = serialized_len(&truncated_payload);

    let payload = build_kiro_payload(&request, "m", None, &config_with(truncated_len)).unwrap();

    let history = history_array(&payload);
    assert_eq!(history.len(), 5);
    for entry in &history {
        let content = entry_content(entry);
        assert!(content.ends_with(EMERGENCY_MARKER), "expected truncation marker, got {content:?}");
        assert_eq!(content.len(), 2000 + EMERGENCY_MARKER.len());
    }
    assert!(tools_field(&payload).is_array(), "tools untouched at this stage");
}

#[test]
fn tools_dropped_when_truncation_is_not_enough() {
    let contents: Vec<String> = (0..19).map(|_| "h".repeat(3000)).collect();
    let request = request_with(&contents);

    let truncated = format!("{}{}", "h".repeat(2000), EMERGENCY_MARKER);
    let truncated_contents: Vec<String> = (0..5).map(|_| truncated.clone()).collect();
    let mut no_tools_payload =
        build_kiro_payload(&request_with(&truncated_contents), "m", None, &config_with(usize::MAX)).unwrap();
    no_tools_payload["conversationState"]["currentMessage"]["userInputMessage"]["userInputMessageContext"]
        ["tools"] = serde_json::Value::Null;
    let no_tools_len = serialized_len(&no_tools_payload);

    let payload = build_kiro_payload(&request, "m", None, &config_with(no_tools_len)).unwrap();

    let history = history_array(&payload);
    assert_eq!(history.len(), 5, "history floor already reached, not yet emergency-trimmed");
    for entry in &history {
        assert!(entry_content(entry).ends_with(EMERGENCY_MARKER));
    }
    assert_eq!(tools_field(&payload), serde_json::Value::Null);
}

#[test]
fn emergency_floor_engages_when_everything_else_is_not_enough() {
    let contents: Vec<String> = (0..19).map(|_| "h".repeat(3000)).collect();
    let request = request_with(&contents);

    let truncated = format!("{}{}", "h".repeat(2000), EMERGENCY_MARKER);
    let emergency_contents: Vec<String> = (0..3).map(|_| truncated.clone()).collect();
    let mut emergency_payload =
        build_kiro_payload(&request_with(&emergency_contents), "m", None, &config_with(usize::MAX)).unwrap();
    emergency_payload["conversationState"]["currentMessage"]["userInputMessage"]["userInputMessageContext"]
        ["tools"] = serde_json::Value::Null;
    let emergency_len = serialized_len(&emergency_payload);

    let payload = build_kiro_payload(&request, "m", None, &config_with(emergency_len)).unwrap();

    let history = history_array(&payload);
    assert_eq!(history.len(), 3, "should fall all the way to the emergency floor");
    for entry in &history {
        assert!(entry_content(entry).ends_with(EMERGENCY_MARKER));
    }
    assert_eq!(tools_field(&payload), serde_json::Value::Null);
}
