//! Parse the upstream's binary-framed event buffer into text and tool calls.
//!
//! The buffer holds concatenated AWS event-stream frames. Two grammars are
//! tried in order to pull JSON objects out of it, then a second pass scans
//! whatever text survives for bracket-syntax tool calls
//! (`[Called NAME with args: {...}]`).

use std::collections::{HashMap, HashSet};

use tracing::warn;
use uuid::Uuid;

const PRIMARY_MARKER: &str = ":message-typeevent";
const FALLBACK_MARKER: &str = "event";

/// A tool call extracted from either structured events or bracket syntax.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ToolCall {
    pub id: String,
    pub name: String,
    pub arguments: String,
}

/// The result of parsing one upstream response buffer.
#[derive(Debug, Clone, Default)]
pub struct ParsedResponse {
    pub text: String,
    pub tool_calls: Vec<ToolCall>,
}

/// Parse the full upstream buffer.
pub fn parse_buffer(buffer: &str) -> ParsedResponse {
    let events = extract_events(buffer);

    let mut text = String::new();
    let mut builders: HashMap<String, ToolCallBuilder> = HashMap::new();
    let mut order: Vec<String> = Vec::new();

    for event in events {
        if let Some(tool_use_id) = event.get("toolUseId").and_then(|v| v.as_str()) {
            if !builders.contains_key(tool_use_id) {
                let Some(name) = event.get("name").and_then(|v| v.as_str()) else {
                    warn!(tool_use_id, "tool-use event without a builder and no name, skipping");
                    continue;
                };
                order.push(tool_use_id.to_string());
                builders.insert(tool_use_id.to_string(), ToolCallBuilder::new(tool_use_id, name));
            }
            let builder = builders.get_mut(tool_use_id).expect("just inserted");
            if let Some(input) = event.get("input").and_then(|v| v.as_str()) {
                builder.arguments.push_str(input);
            }
            if event.get("stop").and_then(|v| v.as_bool()).unwrap_or(false) {
                builder.stopped = true;
            }
            continue;
        }

        if event.get("followupPrompt").is_some() {
            continue;
        }
        if let Some(content) = event.get("content").and_then(|v| v.as_str()) {
            text.push_str(&unescape_literal_newlines(content));
        }
    }

    let mut tool_calls: Vec<ToolCall> = order
        .into_iter()
        .filter_map(|id| builders.remove(&id))
        .filter(|b| b.stopped)
        .map(|b| b.finish())
        .collect();

    let (stripped_text, bracket_calls) = extract_bracket_calls(&text, buffer);

    // Merge with the structured calls above, deduplicated by (name,
    // arguments) across both sources — a model can echo a call it already
    // emitted as a structured event back in its own bracket-syntax text.
    let mut seen: HashSet<(String, String)> = tool_calls
        .iter()
        .map(|c| (c.name.clone(), c.arguments.clone()))
        .collect();
    for call in bracket_calls {
        if seen.insert((call.name.clone(), call.arguments.clone())) {
            tool_calls.push(call);
        }
    }

    ParsedResponse { text: stripped_text, tool_calls }
}

struct ToolCallBuilder {
    tool_use_id: String,
    name: String,
    arguments: String,
    stopped: bool,
}

impl ToolCallBuilder {
    fn new(tool_use_id: &str, name: &str) -> Self {
        Self {
            tool_use_id: tool_use_id.to_string(),
            name: name.to_string(),
            arguments: String::new(),
            stopped: false,
        }
    }

    fn finish(self) -> ToolCall {
        if serde_json::from_str::<serde_json::Value>(&self.arguments).is_err() {
            warn!(
                tool_use_id = self.tool_use_id.as_str(),
                name = self.name.as_str(),
                "tool call arguments are not valid JSON, keeping raw string"
            );
        }
        ToolCall {
            id: self.tool_use_id,
            name: self.name,
            arguments: self.arguments,
        }
    }
}

/// Replace literal two-character `\n` sequences (not preceded by a backslash)
/// with a real newline.
fn unescape_literal_newlines(s: &str) -> String {
    let chars: Vec<char> = s.chars().collect();
    let mut out = String::with_capacity(s.len());
    let mut i = 0;
    while i < chars.len() {
        if chars[i] == '\\' && chars.get(i + 1) == Some(&'n') {
            let preceded_by_backslash = i > 0 && chars[i - 1] == '\\';
            if !preceded_by_backslash {
                out.push('\n');
                i += 2;
                continue;
            }
        }
        out.push(chars[i]);
        i += 1;
    }
    out
}

/// Extract JSON event objects from the buffer, trying the primary grammar
/// first and falling back only if it found nothing.
fn extract_events(buffer: &str) -> Vec<serde_json::Value> {
    let mut events: Vec<serde_json::Value> = candidate_spans(buffer, PRIMARY_MARKER)
        .iter()
        .filter_map(|span| shortest_valid_json(span))
        .collect();

    if events.is_empty() {
        events = candidate_spans(buffer, FALLBACK_MARKER)
            .iter()
            .filter_map(|span| shortest_valid_json(span))
            .collect();
    }

    events
}

/// Split `buffer` on every occurrence of `marker`, returning the text
/// between each occurrence and the next (or end-of-buffer).
fn candidate_spans<'a>(buffer: &'a str, marker: &str) -> Vec<&'a str> {
    let mut spans = Vec::new();
    let mut search_from = 0usize;

    while let Some(rel) = buffer[search_from..].find(marker) {
        let content_start = search_from + rel + marker.len();
        let next = buffer[content_start..]
            .find(marker)
            .map(|i| content_start + i)
            .unwrap_or(buffer.len());
        spans.push(&buffer[content_start..next]);
        search_from = content_start;
    }

    spans
}

/// Find the first `{` in `span` and return the shortest prefix ending in a
/// `}` that parses as valid JSON.
fn shortest_valid_json(span: &str) -> Option<serde_json::Value> {
    let brace_start = span.find('{')?;
    let rest = &span[brace_start..];
    for (i, c) in rest.char_indices() {
        if c == '}' {
            let candidate = &rest[..=i];
            if let Ok(value) = serde_json::from_str::<serde_json::Value>(candidate) {
                return Some(value);
            }
        }
    }
    None
}

const BRACKET_PREFIX: &str = "[Called ";

/// Scan `text` (the event-derived accumulator) and `raw_buffer` (the
/// untouched upstream buffer) for `[Called NAME with args: {...}]` spans.
/// Calls found in either source are merged, deduplicated by `(name,
/// arguments)` with first occurrence winning, and every matched span is
/// stripped from `text`.
fn extract_bracket_calls(text: &str, raw_buffer: &str) -> (String, Vec<ToolCall>) {
    let mut seen: HashMap<(String, String), ()> = HashMap::new();
    let mut calls = Vec::new();

    for (name, args, _span) in scan_bracket_calls(text) {
        let key = (name.clone(), args.clone());
        if seen.insert(key, ()).is_none() {
            calls.push(ToolCall { id: format!("call_{}", short_hex()), name, arguments: args });
        }
    }
    for (name, args, _span) in scan_bracket_calls(raw_buffer) {
        let key = (name.clone(), args.clone());
        if seen.insert(key, ()).is_none() {
            calls.push(ToolCall { id: format!("call_{}", short_hex()), name, arguments: args });
        }
    }

    let stripped = strip_bracket_spans(text);
    (stripped, calls)
}

fn short_hex() -> String {
    Uuid::new_v4().simple().to_string()[..8].to_string()
}

/// Balanced-bracket, string-aware scan for `[Called NAME with args: {...}]`.
/// Returns `(name, repaired_json_args, matched_span)` triples.
fn scan_bracket_calls(text: &str) -> Vec<(String, String, String)> {
    let mut results = Vec::new();
    let bytes: Vec<char> = text.chars().collect();
    let mut i = 0;

    while i < bytes.len() {
        if matches_at(&bytes, i, BRACKET_PREFIX) {
            if let Some((name, args_raw, end)) = parse_bracket_call(&bytes, i) {
                if let Some(repaired) = repair_json(&args_raw) {
                    let span: String = bytes[i..=end].iter().collect();
                    results.push((name, repaired, span));
                }
                i = end + 1;
                continue;
            }
        }
        i += 1;
    }

    results
}

fn matches_at(chars: &[char], pos: usize, pattern: &str) -> bool {
    let pat: Vec<char> = pattern.chars().collect();
    if pos + pat.len() > chars.len() {
        return false;
    }
    chars[pos..pos + pat.len()] == pat[..]
}

/// Parse one `[Called NAME with args: {...}]` call starting at `start`
/// (the index of the opening `[`). Returns `(name, raw_args, end_index)`
/// where `end_index` is the index of the closing `]`.
fn parse_bracket_call(chars: &[char], start: usize) -> Option<(String, String, usize)> {
    let after_prefix = start + BRACKET_PREFIX.chars().count();
    let with_marker = " with args: ";
    let with_pos = find_substring(chars, with_marker, after_prefix)?;
    let name: String = chars[after_prefix..with_pos].iter().collect();
    let name = name.trim().to_string();
    if name.is_empty() {
        return None;
    }

    let args_start = with_pos + with_marker.chars().count();
    if chars.get(args_start) != Some(&'{') {
        return None;
    }

    let mut depth = 0i32;
    let mut in_string = false;
    let mut escaped = false;
    let mut i = args_start;
    let mut args_end = None;

    while i < chars.len() {
        let c = chars[i];
        if in_string {
            if escaped {
                escaped = false;
            } else if c == '\\' {
                escaped = true;
            } else if c == '"' {
                in_string = false;
            }
        } else {
            match c {
                '"' => in_string = true,
                '{' => depth += 1,
                '}' => {
                    depth -= 1;
                    if depth == 0 {
                        args_end = Some(i);
                        break;
                    }
                }
                _ => {}
            }
        }
        i += 1;
    }

    let args_end = args_end?;
    if chars.get(args_end + 1) != Some(&']') {
        return None;
    }

    let raw_args: String = chars[args_start..=args_end].iter().collect();
    Some((name, raw_args, args_end + 1))
}

fn find_substring(chars: &[char], needle: &str, from: usize) -> Option<usize> {
    let needle: Vec<char> = needle.chars().collect();
    if needle.is_empty() {
        return Some(from);
    }
    let mut i = from;
    while i + needle.len() <= chars.len() {
        if chars[i..i + needle.len()] == needle[..] {
            return Some(i);
        }
        i += 1;
    }
    None
}

/// Repair common malformations (trailing commas, bare keys/values) and
/// return canonical JSON text if the result parses.
fn repair_json(raw: &str) -> Option<String> {
    let repaired = quote_bare_identifiers(&strip_trailing_commas(raw));
    let value: serde_json::Value = serde_json::from_str(&repaired).ok()?;
    serde_json::to_string(&value).ok()
}

fn strip_trailing_commas(raw: &str) -> String {
    use std::sync::OnceLock;
    static TRAILING_COMMA_RE: OnceLock<regex_lite::Regex> = OnceLock::new();
    let re = TRAILING_COMMA_RE.get_or_init(|| regex_lite::Regex::new(r",\s*([}\]])").unwrap());
    re.replace_all(raw, "$1").to_string()
}

/// Quote bare identifier keys (`foo:` -> `"foo":`) and bare identifier
/// string values (`: bar` -> `: "bar"`, where `bar` is not a number, bool,
/// null, string, object, or array).
fn quote_bare_identifiers(raw: &str) -> String {
    use std::sync::OnceLock;
    static BARE_KEY_RE: OnceLock<regex_lite::Regex> = OnceLock::new();
    let key_re =
        BARE_KEY_RE.get_or_init(|| regex_lite::Regex::new(r#"([{,]\s*)([A-Za-z_][A-Za-z0-9_]*)\s*:"#).unwrap());
    let with_keys = key_re.replace_all(raw, r#"$1"$2":"#).to_string();

    static BARE_VALUE_RE: OnceLock<regex_lite::Regex> = OnceLock::new();
    let value_re = BARE_VALUE_RE.get_or_init(|| {
        regex_lite::Regex::new(r#":\s*([A-Za-z_][A-Za-z0-9_]*)\s*([,}])"#).unwrap()
    });
    value_re
        .replace_all(&with_keys, |caps: &regex_lite::Captures| {
            let word = &caps[1];
            let delim = &caps[2];
            if matches!(word, "true" | "false" | "null") {
                format!(": {}{}", word, delim)
            } else {
                format!(": \"{}\"{}", word, delim)
            }
        })
        .to_string()
}

/// Remove every matched bracket span from `text`, then collapse whitespace
/// and trim.
fn strip_bracket_spans(text: &str) -> String {
    let chars: Vec<char> = text.chars().collect();
    let mut out = String::new();
    let mut i = 0;

    while i < chars.len() {
        if matches_at(&chars, i, BRACKET_PREFIX) {
            if let Some((_, _, end)) = parse_bracket_call(&chars, i) {
                i = end + 1;
                out.push(' ');
                continue;
            }
        }
        out.push(chars[i]);
        i += 1;
    }

    let collapsed: Vec<&str> = out.split_whitespace().collect();
    collapsed.join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unescape_replaces_unescaped_literal_newline() {
        assert_eq!(unescape_literal_newlines(r"a\nb"), "a\nb");
        // An escaped backslash followed by a literal "n" is left alone.
        assert_eq!(unescape_literal_newlines(r"a\\nb"), r"a\\nb");
    }

    #[test]
    fn parses_primary_grammar_content_event() {
        let buffer = format!("{}{{\"content\":\"hello\"}}", PRIMARY_MARKER);
        let parsed = parse_buffer(&buffer);
        assert_eq!(parsed.text, "hello");
        assert!(parsed.tool_calls.is_empty());
    }

    #[test]
    fn parses_structured_tool_use_event_across_chunks() {
        let frame1 = format!(
            r#"{}{{"name":"get_weather","toolUseId":"t1","input":"part-one-"}}"#,
            PRIMARY_MARKER
        );
        let frame2 = format!(
            r#"{}{{"toolUseId":"t1","input":"part-two"}}"#,
            PRIMARY_MARKER
        );
        let frame3 = format!(r#"{}{{"toolUseId":"t1","stop":true}}"#, PRIMARY_MARKER);
        let buffer = format!("{frame1}{frame2}{frame3}");
        let parsed = parse_buffer(&buffer);
        assert_eq!(parsed.tool_calls.len(), 1);
        assert_eq!(parsed.tool_calls[0].name, "get_weather");
        assert_eq!(parsed.tool_calls[0].arguments, "part-one-part-two");
    }

    #[test]
    fn extracts_bracket_tool_call_and_strips_it() {
        let text = "Sure. [Called search with args: {query: test, limit: 5}] done.";
        let (stripped, calls) = extract_bracket_calls(text, text);
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].name, "search");
        assert!(serde_json::from_str::<serde_json::Value>(&calls[0].arguments).is_ok());
        assert!(!stripped.contains("[Called"));
    }

    #[test]
    fn dedups_bracket_calls_across_sources() {
        let event_text = "[Called search with args: {\"q\":\"x\"}]";
        let raw = "noise [Called search with args: {\"q\":\"x\"}] noise";
        let (_, calls) = extract_bracket_calls(event_text, raw);
        assert_eq!(calls.len(), 1);
    }

    #[test]
    fn dedups_bracket_call_against_structured_event_with_same_name_and_args() {
        let frame = format!(
            r#"{}{{"name":"search","toolUseId":"t1","input":"{{\"q\":\"x\"}}","stop":true}}"#,
            PRIMARY_MARKER
        );
        let echo = format!(r#"{}{{"content":"[Called search with args: {{\"q\":\"x\"}}]"}}"#, PRIMARY_MARKER);
        let buffer = format!("{frame}{echo}");
        let parsed = parse_buffer(&buffer);
        assert_eq!(parsed.tool_calls.len(), 1);
        assert_eq!(parsed.tool_calls[0].name, "search");
    }

    #[test]
    fn repairs_trailing_comma_and_bare_identifiers() {
        let repaired = repair_json(r#"{foo: bar, baz: 1,}"#).unwrap();
        let value: serde_json::Value = serde_json::from_str(&repaired).unwrap();
        assert_eq!(value["foo"], "bar");
        assert_eq!(value["baz"], 1);
    }
}
