//! Build the non-streaming response and the synthesized pseudo-stream from
//! a [`ParsedResponse`]. The upstream is never actually streamed to us; this
//! module fabricates the event sequence a streaming caller expects.

use uuid::Uuid;

use crate::models::response::{MessagesResponse, ResponseContentBlock, StopReason, Usage};
use crate::models::stream::{ContentDelta, MessageDelta, PartialMessage, StreamEvent};

use super::event_parser::ParsedResponse;

/// Build the complete non-streaming `MessagesResponse`.
pub fn build_response(parsed: &ParsedResponse, model: &str) -> MessagesResponse {
    let output_tokens = estimate_output_tokens(parsed);

    let (content, stop_reason) = if !parsed.tool_calls.is_empty() {
        let blocks = parsed
            .tool_calls
            .iter()
            .map(|call| ResponseContentBlock::ToolUse {
                id: call.id.clone(),
                name: call.name.clone(),
                input: serde_json::Value::String(call.arguments.clone()),
            })
            .collect();
        (blocks, StopReason::ToolUse)
    } else {
        (
            vec![ResponseContentBlock::Text { text: parsed.text.clone() }],
            StopReason::EndTurn,
        )
    };

    MessagesResponse {
        id: format!("msg_{}", Uuid::new_v4().simple()),
        response_type: "message".to_string(),
        role: "assistant".to_string(),
        content,
        model: model.to_string(),
        stop_reason: Some(stop_reason),
        stop_sequence: None,
        usage: Usage {
            input_tokens: 0,
            output_tokens,
            cache_creation_input_tokens: None,
            cache_read_input_tokens: None,
        },
    }
}

/// Build the deterministic pseudo-stream event sequence for a fully-parsed
/// response: tool-use blocks first, then the text block, then the closing
/// `message_delta`/`message_stop` pair.
pub fn build_pseudo_stream(parsed: &ParsedResponse, model: &str) -> Vec<StreamEvent> {
    let output_tokens = estimate_output_tokens(parsed);
    let message_id = format!("msg_{}", Uuid::new_v4().simple());
    let has_tool_calls = !parsed.tool_calls.is_empty();

    let mut events = vec![StreamEvent::MessageStart {
        message: PartialMessage {
            id: message_id,
            message_type: "message".to_string(),
            role: "assistant".to_string(),
            model: model.to_string(),
            usage: Usage {
                input_tokens: 0,
                output_tokens: 0,
                cache_creation_input_tokens: None,
                cache_read_input_tokens: None,
            },
        },
    }];

    let mut index = 0usize;
    for call in &parsed.tool_calls {
        events.push(StreamEvent::ContentBlockStart {
            index,
            content_block: ResponseContentBlock::ToolUse {
                id: call.id.clone(),
                name: call.name.clone(),
                input: serde_json::Value::Object(serde_json::Map::new()),
            },
        });
        events.push(StreamEvent::ContentBlockDelta {
            index,
            delta: ContentDelta::InputJsonDelta { partial_json: call.arguments.clone() },
        });
        events.push(StreamEvent::ContentBlockStop { index });
        index += 1;
    }

    if !parsed.text.is_empty() {
        events.push(StreamEvent::ContentBlockStart {
            index,
            content_block: ResponseContentBlock::Text { text: String::new() },
        });
        events.push(StreamEvent::ContentBlockDelta {
            index,
            delta: ContentDelta::TextDelta { text: parsed.text.clone() },
        });
        events.push(StreamEvent::ContentBlockStop { index });
    }

    let stop_reason = if has_tool_calls { StopReason::ToolUse } else { StopReason::EndTurn };
    events.push(StreamEvent::MessageDelta {
        delta: MessageDelta { stop_reason: Some(stop_reason), stop_sequence: None },
        usage: Some(Usage {
            input_tokens: 0,
            output_tokens,
            cache_creation_input_tokens: None,
            cache_read_input_tokens: None,
        }),
    });
    events.push(StreamEvent::MessageStop);

    events
}

/// `ceil(total_chars / 4)`, summed across text and every tool call's
/// argument string.
fn estimate_output_tokens(parsed: &ParsedResponse) -> u32 {
    let mut total_len: usize = parsed.text.chars().count();
    for call in &parsed.tool_calls {
        total_len += call.arguments.chars().count();
    }
    total_len.div_ceil(4).max(if total_len > 0 { 1 } else { 0 }) as u32
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stream::event_parser::ToolCall;

    #[test]
    fn non_streaming_text_only_response() {
        let parsed = ParsedResponse { text: "hello world".to_string(), tool_calls: vec![] };
        let response = build_response(&parsed, "claude-sonnet-4-5");
        assert_eq!(response.stop_reason, Some(StopReason::EndTurn));
        assert_eq!(response.content.len(), 1);
    }

    #[test]
    fn non_streaming_tool_use_response() {
        let parsed = ParsedResponse {
            text: String::new(),
            tool_calls: vec![ToolCall {
                id: "call_abc12345".to_string(),
                name: "search".to_string(),
                arguments: "{\"q\":\"x\"}".to_string(),
            }],
        };
        let response = build_response(&parsed, "m");
        assert_eq!(response.stop_reason, Some(StopReason::ToolUse));
        assert_eq!(response.content.len(), 1);
    }

    #[test]
    fn pseudo_stream_orders_tool_use_before_text() {
        let parsed = ParsedResponse {
            text: "done".to_string(),
            tool_calls: vec![ToolCall {
                id: "call_1".to_string(),
                name: "search".to_string(),
                arguments: "{}".to_string(),
            }],
        };
        let events = build_pseudo_stream(&parsed, "m");
        let kinds: Vec<&str> = events
            .iter()
            .map(|e| match e {
                StreamEvent::MessageStart { .. } => "message_start",
                StreamEvent::ContentBlockStart { .. } => "content_block_start",
                StreamEvent::ContentBlockDelta { .. } => "content_block_delta",
                StreamEvent::ContentBlockStop { .. } => "content_block_stop",
                StreamEvent::MessageDelta { .. } => "message_delta",
                StreamEvent::MessageStop => "message_stop",
                StreamEvent::Ping => "ping",
                StreamEvent::Error { .. } => "error",
            })
            .collect();
        assert_eq!(
            kinds,
            vec![
                "message_start",
                "content_block_start",
                "content_block_delta",
                "content_block_stop",
                "content_block_start",
                "content_block_delta",
                "content_block_stop",
                "message_delta",
                "message_stop",
            ]
        );
    }
}
