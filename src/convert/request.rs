//! Translate a C-style `MessagesRequest` into a Kiro `conversationState` payload.
//!
//! Implements the eight-step shaping pipeline: sanitize, history cap,
//! per-message cap, tool filtering, system-prompt placement, history
//! assembly, current-message construction, and staged size enforcement.

use tracing::{debug, warn};
use uuid::Uuid;

use crate::config::{
    API_ORIGIN, CORE_TOOLS, NON_CORE_DESCRIPTION_DROP_THRESHOLD, SIZE_REMEDIATION_EMERGENCY_FLOOR,
    SIZE_REMEDIATION_HISTORY_FLOOR, SIZE_REMEDIATION_INNER_TRUNCATE_LENGTH,
    TOOL_DESCRIPTION_TRUNCATE_LENGTH,
};
use crate::config::GatewayConfig;
use crate::convert::content;
use crate::convert::schema::sanitize_json_schema;
use crate::error::{Error, Result};
use crate::models::kiro::{InputSchema, KiroToolSpec, ToolSpecification};
use crate::models::request::{ContentBlock, Message, MessageContent, MessagesRequest, Role, Tool};

const TRUNCATE_MARKER: &str = "\n...[内容已截断]";
const EMERGENCY_TRUNCATE_MARKER: &str = "\n...[已截断]";

/// Convert a `MessagesRequest` into a Kiro API JSON payload.
pub fn build_kiro_payload(
    request: &MessagesRequest,
    model_id: &str,
    profile_arn: Option<&str>,
    config: &GatewayConfig,
) -> Result<serde_json::Value> {
    if request.messages.is_empty() {
        return Err(Error::EmptyMessages);
    }

    // 1. Sanitize every text segment.
    let mut messages: Vec<Message> = request.messages.iter().map(sanitize_message).collect();

    // 2. History cap.
    if messages.len() > config.max_history {
        let dropped = messages.len() - config.max_history;
        debug!(dropped, cap = config.max_history, "history cap truncated messages");
        messages = messages.split_off(dropped);
    }

    // 3. Per-message cap.
    for msg in &mut messages {
        truncate_message(msg, config.max_message_length);
    }

    // 4. Tool filtering.
    let (kiro_tools, tool_names_dropped) = filter_tools(
        request.tools.as_deref().unwrap_or(&[]),
        config.max_tools,
        config.disable_tools,
    );
    if !tool_names_dropped.is_empty() {
        debug!(dropped = ?tool_names_dropped, "tools dropped during filtering");
    }

    // 5. System-prompt placement.
    let system_text = request.system.as_ref().map(|s| s.text()).unwrap_or_default();
    if !system_text.is_empty() {
        place_system_prompt(&mut messages, &system_text);
    }

    // 6/7. History assembly + current-message construction.
    let conversation_id = format_conversation_id(Uuid::new_v4());

    let last = messages.pop().ok_or(Error::EmptyMessages)?;
    let (mut current_message, trailing_history) = build_current_message(last, model_id);

    let mut history: Vec<serde_json::Value> = messages
        .iter()
        .map(|m| content::message_to_history_entry(m, model_id))
        .collect();
    history.extend(trailing_history);

    if !kiro_tools.is_empty() {
        attach_tools(&mut current_message, &kiro_tools);
    }

    let mut payload = serde_json::json!({
        "conversationState": {
            "chatTriggerType": "MANUAL",
            "conversationId": conversation_id,
            "currentMessage": current_message,
        }
    });
    if !history.is_empty() {
        payload["conversationState"]["history"] = serde_json::Value::Array(history);
    }
    if let Some(arn) = profile_arn {
        payload["profileArn"] = serde_json::Value::String(arn.to_string());
    }

    // 8. Size enforcement.
    enforce_size_budget(&mut payload, config.max_request_size);

    Ok(payload)
}

fn format_conversation_id(id: Uuid) -> String {
    id.simple().to_string()
}

/// Strip `<system-reminder>...</system-reminder>` (case-insensitive,
/// multi-line) and the literal marker `[Request interrupted by user]`; trim.
fn sanitize_text(text: &str) -> String {
    use std::sync::OnceLock;
    static REMINDER_RE: OnceLock<regex_lite::Regex> = OnceLock::new();
    let re = REMINDER_RE.get_or_init(|| {
        regex_lite::Regex::new(r"(?is)<system-reminder>.*?</system-reminder>").unwrap()
    });
    let without_reminder = re.replace_all(text, "");
    without_reminder
        .replace("[Request interrupted by user]", "")
        .trim()
        .to_string()
}

fn sanitize_message(msg: &Message) -> Message {
    let content = match &msg.content {
        MessageContent::Text(t) => MessageContent::Text(sanitize_text(t)),
        MessageContent::Blocks(blocks) => {
            MessageContent::Blocks(blocks.iter().map(sanitize_block).collect())
        }
    };
    Message { role: msg.role, content }
}

fn sanitize_block(block: &ContentBlock) -> ContentBlock {
    match block {
        ContentBlock::Text { text } => ContentBlock::Text { text: sanitize_text(text) },
        ContentBlock::ToolResult { tool_use_id, content, is_error } => {
            use crate::models::request::ToolResultContent;
            let sanitized = match content {
                ToolResultContent::Text(t) => ToolResultContent::Text(sanitize_text(t)),
                ToolResultContent::Blocks(blocks) => {
                    ToolResultContent::Blocks(blocks.iter().map(sanitize_block).collect())
                }
            };
            ContentBlock::ToolResult {
                tool_use_id: tool_use_id.clone(),
                content: sanitized,
                is_error: *is_error,
            }
        }
        other => other.clone(),
    }
}

/// Truncate every text segment in `msg` exceeding `max_len` characters,
/// appending [`TRUNCATE_MARKER`].
fn truncate_message(msg: &mut Message, max_len: usize) {
    match &mut msg.content {
        MessageContent::Text(t) => truncate_in_place(t, max_len, TRUNCATE_MARKER),
        MessageContent::Blocks(blocks) => {
            for block in blocks {
                truncate_block(block, max_len);
            }
        }
    }
}

fn truncate_block(block: &mut ContentBlock, max_len: usize) {
    match block {
        ContentBlock::Text { text } => truncate_in_place(text, max_len, TRUNCATE_MARKER),
        ContentBlock::ToolResult { content, .. } => {
            use crate::models::request::ToolResultContent;
            match content {
                ToolResultContent::Text(t) => truncate_in_place(t, max_len, TRUNCATE_MARKER),
                ToolResultContent::Blocks(blocks) => {
                    for b in blocks {
                        truncate_block(b, max_len);
                    }
                }
            }
        }
        _ => {}
    }
}

fn truncate_in_place(s: &mut String, max_len: usize, marker: &str) {
    if s.chars().count() > max_len {
        let truncated: String = s.chars().take(max_len).collect();
        *s = format!("{}{}", truncated, marker);
    }
}

/// Whitelist `CORE_TOOLS`, drop non-core tools with descriptions over
/// `NON_CORE_DESCRIPTION_DROP_THRESHOLD` characters, cap at `max_tools`, and
/// truncate surviving descriptions to `TOOL_DESCRIPTION_TRUNCATE_LENGTH`.
fn filter_tools(tools: &[Tool], max_tools: usize, disable_tools: bool) -> (Vec<KiroToolSpec>, Vec<String>) {
    if disable_tools {
        return (Vec::new(), tools.iter().map(|t| t.name.clone()).collect());
    }

    let mut dropped = Vec::new();
    let mut kept: Vec<&Tool> = Vec::new();

    for tool in tools {
        let description_len = tool.description.as_deref().unwrap_or_default().len();
        let is_core = CORE_TOOLS.contains(&tool.name.as_str());
        if !is_core && description_len > NON_CORE_DESCRIPTION_DROP_THRESHOLD {
            dropped.push(tool.name.clone());
            continue;
        }
        kept.push(tool);
    }

    if kept.len() > max_tools {
        for extra in &kept[max_tools..] {
            dropped.push(extra.name.clone());
        }
        kept.truncate(max_tools);
    }

    let specs = kept
        .into_iter()
        .map(|tool| {
            let mut description = tool.description.clone().unwrap_or_default();
            if description.chars().count() > TOOL_DESCRIPTION_TRUNCATE_LENGTH {
                description = description
                    .chars()
                    .take(TOOL_DESCRIPTION_TRUNCATE_LENGTH)
                    .collect();
            }
            KiroToolSpec {
                tool_specification: ToolSpecification {
                    name: tool.name.clone(),
                    description,
                    input_schema: InputSchema {
                        json: sanitize_json_schema(&tool.input_schema),
                    },
                },
            }
        })
        .collect();

    (specs, dropped)
}

/// If the first message is from the user, prepend `system_text` to it
/// (separated by `\n\n`); otherwise push a synthetic first user message
/// containing only the system text.
fn place_system_prompt(messages: &mut Vec<Message>, system_text: &str) {
    match messages.first_mut() {
        Some(first) if first.role == Role::User => {
            let existing = first.content.text();
            let merged = if existing.is_empty() {
                system_text.to_string()
            } else {
                format!("{}\n\n{}", system_text, existing)
            };
            first.content = match &first.content {
                MessageContent::Blocks(blocks) => {
                    let mut rest: Vec<ContentBlock> = blocks
                        .iter()
                        .filter(|b| !matches!(b, ContentBlock::Text { .. }))
                        .cloned()
                        .collect();
                    rest.insert(0, ContentBlock::Text { text: merged });
                    MessageContent::Blocks(rest)
                }
                MessageContent::Text(_) => MessageContent::Text(merged),
            };
        }
        _ => {
            messages.insert(
                0,
                Message {
                    role: Role::User,
                    content: MessageContent::Text(system_text.to_string()),
                },
            );
        }
    }
}

/// Build `currentMessage` from the last ingress message. If that message is
/// assistant-role, it is returned as an extra trailing history entry and a
/// synthetic `"Continue"` user message is built instead.
fn build_current_message(
    last: Message,
    model_id: &str,
) -> (serde_json::Value, Vec<serde_json::Value>) {
    let (current_msg, trailing_history) = if last.role == Role::Assistant {
        let trailing = content::message_to_history_entry(&last, model_id);
        (
            Message {
                role: Role::User,
                content: MessageContent::Text("Continue".to_string()),
            },
            vec![trailing],
        )
    } else {
        (last, Vec::new())
    };

    let text = content::extract_text(&current_msg.content);
    let images = content::extract_images(&current_msg.content);
    let tool_results = content::extract_tool_results(&current_msg.content);
    let tool_uses_present = !content::extract_tool_uses(&current_msg.content).is_empty();

    let content_text = if text.is_empty() && tool_results.is_empty() && !tool_uses_present {
        "Continue".to_string()
    } else {
        text
    };

    let mut value = serde_json::json!({
        "userInputMessage": {
            "content": content_text,
            "modelId": model_id,
            "origin": API_ORIGIN,
        }
    });

    if !images.is_empty() {
        value["userInputMessage"]["images"] = serde_json::to_value(&images).unwrap_or_default();
    }
    if !tool_results.is_empty() {
        value["userInputMessage"]["userInputMessageContext"] = serde_json::json!({
            "toolResults": serde_json::to_value(&tool_results).unwrap_or_default(),
        });
    }

    (value, trailing_history)
}

fn attach_tools(current_message: &mut serde_json::Value, tools: &[KiroToolSpec]) {
    let tools_value = serde_json::to_value(tools).unwrap_or_default();
    let ctx = &mut current_message["userInputMessage"]["userInputMessageContext"];
    if ctx.is_null() {
        *ctx = serde_json::json!({ "tools": tools_value });
    } else {
        ctx["tools"] = tools_value;
    }
}

/// Apply staged remediation in order, re-serializing after each step,
/// stopping as soon as the payload is under `max_size`.
fn enforce_size_budget(payload: &mut serde_json::Value, max_size: usize) {
    if serialized_len(payload) <= max_size {
        return;
    }

    let history = payload["conversationState"]["history"].as_array_mut();
    if let Some(history) = history {
        // a. Shift oldest history entries off while len(history) > floor.
        while history.len() > SIZE_REMEDIATION_HISTORY_FLOOR {
            history.remove(0);
            if serialized_len(payload) <= max_size {
                return;
            }
        }
    }
    if serialized_len(payload) <= max_size {
        return;
    }

    // b. Re-truncate history text content to 2000 chars.
    if let Some(history) = payload["conversationState"]["history"].as_array_mut() {
        for entry in history.iter_mut() {
            retruncate_history_entry(entry, SIZE_REMEDIATION_INNER_TRUNCATE_LENGTH);
        }
    }
    if serialized_len(payload) <= max_size {
        return;
    }

    // c. Drop tools from the current message context.
    payload["conversationState"]["currentMessage"]["userInputMessage"]
        ["userInputMessageContext"]["tools"] = serde_json::Value::Null;
    if serialized_len(payload) <= max_size {
        return;
    }

    // d. Emergency: keep only the last N history entries.
    if let Some(history) = payload["conversationState"]["history"].as_array_mut() {
        if history.len() > SIZE_REMEDIATION_EMERGENCY_FLOOR {
            let keep_from = history.len() - SIZE_REMEDIATION_EMERGENCY_FLOOR;
            history.drain(0..keep_from);
        }
    }

    if serialized_len(payload) > max_size {
        warn!(size = serialized_len(payload), max_size, "payload still oversized after remediation");
    }
}

fn retruncate_history_entry(entry: &mut serde_json::Value, max_len: usize) {
    if let Some(content) = entry["userInputMessage"]["content"].as_str() {
        let mut s = content.to_string();
        truncate_in_place(&mut s, max_len, EMERGENCY_TRUNCATE_MARKER);
        entry["userInputMessage"]["content"] = serde_json::Value::String(s);
    }
    if let Some(content) = entry["assistantResponseMessage"]["content"].as_str() {
        let mut s = content.to_string();
        truncate_in_place(&mut s, max_len, EMERGENCY_TRUNCATE_MARKER);
        entry["assistantResponseMessage"]["content"] = serde_json::Value::String(s);
    }
}

fn serialized_len(payload: &serde_json::Value) -> usize {
    serde_json::to_vec(payload).map(|v| v.len()).unwrap_or(usize::MAX)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::request::{Message, MessageContent, MessagesRequest, Role};

    fn minimal_request(text: &str) -> MessagesRequest {
        let mut req = MessagesRequest::new("claude-sonnet-4-5", 1024);
        req.messages.push(Message {
            role: Role::User,
            content: MessageContent::Text(text.to_string()),
        });
        req
    }

    #[test]
    fn sanitize_strips_system_reminder_and_interruption_marker() {
        let text = "hello <system-reminder>secret stuff\nmore</system-reminder> world[Request interrupted by user]";
        let cleaned = sanitize_text(text);
        assert!(!cleaned.contains("system-reminder"));
        assert!(!cleaned.contains("secret stuff"));
        assert!(!cleaned.contains("interrupted"));
        assert!(cleaned.contains("hello"));
        assert!(cleaned.contains("world"));
    }

    #[test]
    fn build_kiro_payload_minimal() {
        let request = minimal_request("Hello");
        let config = GatewayConfig::default();
        let payload = build_kiro_payload(&request, "CLAUDE_SONNET_4_5", None, &config).unwrap();
        let current = &payload["conversationState"]["currentMessage"]["userInputMessage"];
        assert_eq!(current["content"].as_str().unwrap(), "Hello");
        assert_eq!(current["modelId"].as_str().unwrap(), "CLAUDE_SONNET_4_5");
        assert_eq!(
            payload["conversationState"]["chatTriggerType"].as_str().unwrap(),
            "MANUAL"
        );
    }

    #[test]
    fn last_assistant_message_pushed_to_history_with_continue() {
        let mut request = minimal_request("Hi");
        request.messages.push(Message {
            role: Role::Assistant,
            content: MessageContent::Text("Hey there".to_string()),
        });
        let config = GatewayConfig::default();
        let payload = build_kiro_payload(&request, "m", None, &config).unwrap();
        let current = &payload["conversationState"]["currentMessage"]["userInputMessage"];
        assert_eq!(current["content"].as_str().unwrap(), "Continue");
        let history = payload["conversationState"]["history"].as_array().unwrap();
        assert!(history
            .iter()
            .any(|e| e["assistantResponseMessage"]["content"] == "Hey there"));
    }

    #[test]
    fn system_prompt_prepended_to_first_user_message() {
        let mut request = minimal_request("question");
        request.system = Some(crate::models::request::SystemPrompt::Text("be terse".into()));
        let config = GatewayConfig::default();
        let payload = build_kiro_payload(&request, "m", None, &config).unwrap();
        let current = payload["conversationState"]["currentMessage"]["userInputMessage"]["content"]
            .as_str()
            .unwrap();
        assert!(current.starts_with("be terse"));
        assert!(current.contains("question"));
    }

    #[test]
    fn history_cap_drops_oldest_messages() {
        let mut request = minimal_request("last");
        for i in 0..20 {
            request.messages.insert(
                0,
                Message {
                    role: if i % 2 == 0 { Role::Assistant } else { Role::User },
                    content: MessageContent::Text(format!("msg-{i}")),
                },
            );
        }
        let mut config = GatewayConfig::default();
        config.max_history = 5;
        let payload = build_kiro_payload(&request, "m", None, &config).unwrap();
        let history = payload["conversationState"]["history"].as_array().cloned().unwrap_or_default();
        assert!(history.len() <= 5);
    }

    #[test]
    fn per_message_cap_truncates_with_marker() {
        let long = "a".repeat(50);
        let request = minimal_request(&long);
        let mut config = GatewayConfig::default();
        config.max_message_length = 10;
        let payload = build_kiro_payload(&request, "m", None, &config).unwrap();
        let content = payload["conversationState"]["currentMessage"]["userInputMessage"]["content"]
            .as_str()
            .unwrap();
        assert!(content.contains("[内容已截断]"));
    }

    #[test]
    fn size_enforcement_keeps_payload_under_budget() {
        let mut request = minimal_request(&"x".repeat(5000));
        for i in 0..20 {
            request.messages.insert(
                0,
                Message {
                    role: if i % 2 == 0 { Role::Assistant } else { Role::User },
                    content: MessageContent::Text("y".repeat(3000)),
                },
            );
        }
        let mut config = GatewayConfig::default();
        config.max_history = 100;
        config.max_message_length = 100_000;
        config.max_request_size = 20_000;
        let payload = build_kiro_payload(&request, "m", None, &config).unwrap();
        assert!(serialized_len(&payload) <= 20_000 || {
            let history = payload["conversationState"]["history"].as_array().unwrap();
            history.len() <= SIZE_REMEDIATION_EMERGENCY_FLOOR
        });
    }
}
