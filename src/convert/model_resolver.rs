//! Model name resolution: a closed table, not free-form normalization.
//!
//! Translates public model names (e.g. `claude-sonnet-4-5`) to the upstream
//! CodeWhisperer model identifier (e.g. `CLAUDE_SONNET_4_5_20250929_V1_0`),
//! filtered by an allowlist, falling back to a configured default.

use std::collections::HashMap;
use tracing::debug;

use crate::config::DEFAULT_MODEL_ID;

/// Static public-name -> upstream-identifier table.
fn model_table() -> &'static HashMap<&'static str, &'static str> {
    use std::sync::OnceLock;
    static TABLE: OnceLock<HashMap<&'static str, &'static str>> = OnceLock::new();
    TABLE.get_or_init(|| {
        HashMap::from([
            ("claude-opus-4-5", "CLAUDE_OPUS_4_5_20251101_V1_0"),
            ("claude-sonnet-4-5", "CLAUDE_SONNET_4_5_20250929_V1_0"),
            ("claude-sonnet-4", "CLAUDE_SONNET_4_20250514_V1_0"),
            ("claude-haiku-4-5", "CLAUDE_HAIKU_4_5_20251001_V1_0"),
            ("claude-3-7-sonnet", "CLAUDE_3_7_SONNET_20250219_V1_0"),
            ("amazonq-developer", "AMAZON_Q_DEVELOPER_V1_0"),
        ])
    })
}

/// Public model names this adapter will actually resolve; everything else
/// falls back to [`DEFAULT_MODEL_ID`] regardless of whether the table
/// happens to contain a matching key.
fn allowlist() -> &'static [&'static str] {
    &[
        "claude-opus-4-5",
        "claude-sonnet-4-5",
        "claude-sonnet-4",
        "claude-haiku-4-5",
        "claude-3-7-sonnet",
        "amazonq-developer",
    ]
}

/// Resolves public model names to upstream model identifiers.
#[derive(Debug, Default)]
pub struct ModelResolver;

impl ModelResolver {
    pub fn new() -> Self {
        Self
    }

    /// Look up `name` in the filtered table; on miss, fall back to
    /// [`DEFAULT_MODEL_ID`].
    pub fn resolve(&self, name: &str) -> String {
        if allowlist().contains(&name) {
            if let Some(id) = model_table().get(name) {
                debug!(name, resolved = *id, "model resolved");
                return id.to_string();
            }
        }
        debug!(name, fallback = DEFAULT_MODEL_ID, "model not in allowlist, using default");
        DEFAULT_MODEL_ID.to_string()
    }
}

/// Whether a public model name should route to `SendMessageStreaming`
/// instead of `generateAssistantResponse`.
pub fn is_amazonq_model(public_name: &str) -> bool {
    public_name.starts_with("amazonq")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resolves_known_model() {
        let r = ModelResolver::new();
        assert_eq!(r.resolve("claude-sonnet-4-5"), "CLAUDE_SONNET_4_5_20250929_V1_0");
    }

    #[test]
    fn falls_back_to_default_on_miss() {
        let r = ModelResolver::new();
        assert_eq!(r.resolve("some-unknown-model"), DEFAULT_MODEL_ID);
    }

    #[test]
    fn amazonq_prefix_detected() {
        assert!(is_amazonq_model("amazonq-developer"));
        assert!(!is_amazonq_model("claude-sonnet-4-5"));
    }
}
