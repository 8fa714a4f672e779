//! Configuration constants, URL templates, and environment knobs.

use std::time::Duration;

/// Default AWS region, assumed when no credential source supplies one.
pub const DEFAULT_REGION: &str = "us-east-1";

/// Window before `expiresAt` in which a token is treated as "near expiry".
pub const CRON_NEAR_MINUTES: i64 = 10;

/// Maximum number of retry attempts for 429/5xx/network conditions.
pub const MAX_RETRIES: u32 = 3;

/// Base delay between retry attempts (exponential backoff: delay * 2^attempt).
pub const BASE_RETRY_DELAY: Duration = Duration::from_secs(1);

/// Connect timeout for HTTP requests.
pub const CONNECT_TIMEOUT: Duration = Duration::from_secs(30);

/// Default request timeout, covering headers + body of the upstream POST.
pub const REQUEST_TIMEOUT: Duration = Duration::from_secs(300);

/// Cap on retained history messages before remediation.
pub const KIRO_MAX_HISTORY: usize = 15;

/// Per-message character cap.
pub const KIRO_MAX_MESSAGE_LENGTH: usize = 8000;

/// Cap on tool definitions attached to a request.
pub const KIRO_MAX_TOOLS: usize = 12;

/// When true, tools are stripped from every shaped request.
pub const KIRO_DISABLE_TOOLS_DEFAULT: bool = false;

/// Total byte budget for a serialized `conversationState` payload.
pub const KIRO_MAX_REQUEST_SIZE: usize = 100_000;

/// Core tool whitelist: always retained regardless of `KIRO_MAX_TOOLS`.
pub const CORE_TOOLS: &[&str] = &[
    "Read",
    "Write",
    "Edit",
    "Glob",
    "Grep",
    "Bash",
    "WebFetch",
    "WebSearch",
    "AskUserQuestion",
];

/// Non-core tool descriptions longer than this are dropped during filtering.
pub const NON_CORE_DESCRIPTION_DROP_THRESHOLD: usize = 1000;

/// Surviving tool descriptions are truncated to this length.
pub const TOOL_DESCRIPTION_TRUNCATE_LENGTH: usize = 300;

/// Size-enforcement stage (a): history is shifted until this many entries remain.
pub const SIZE_REMEDIATION_HISTORY_FLOOR: usize = 5;

/// Size-enforcement stage (b): inner history-text truncation length.
pub const SIZE_REMEDIATION_INNER_TRUNCATE_LENGTH: usize = 2000;

/// Size-enforcement stage (d): emergency history floor.
pub const SIZE_REMEDIATION_EMERGENCY_FLOOR: usize = 3;

/// `conversationState.currentMessage.userInputMessage.origin`.
pub const API_ORIGIN: &str = "AI_EDITOR";

/// Model identifier used when a public model name has no mapping entry.
pub const DEFAULT_MODEL_ID: &str = "claude-opus-4-5";

/// Kiro Desktop ("social") refresh URL template. `{region}` substituted at runtime.
pub const KIRO_REFRESH_URL_TEMPLATE: &str =
    "https://prod.{region}.auth.desktop.kiro.dev/refreshToken";

/// AWS SSO OIDC ("idc") token URL template.
pub const AWS_SSO_OIDC_URL_TEMPLATE: &str = "https://oidc.{region}.amazonaws.com/token";

/// CodeWhisperer host template.
pub const CODEWHISPERER_HOST_TEMPLATE: &str = "https://codewhisperer.{region}.amazonaws.com";

/// Returns the Kiro Desktop ("social") refresh URL for the given region, or
/// `{base}/refreshToken` when `base_override` is set.
pub fn kiro_refresh_url(region: &str, base_override: Option<&str>) -> String {
    match base_override {
        Some(base) => format!("{}/refreshToken", base.trim_end_matches('/')),
        None => KIRO_REFRESH_URL_TEMPLATE.replace("{region}", region),
    }
}

/// Returns the AWS SSO OIDC ("idc") token URL for the given region, or
/// `{base}/token` when `base_override` is set.
pub fn aws_sso_oidc_url(region: &str, base_override: Option<&str>) -> String {
    match base_override {
        Some(base) => format!("{}/token", base.trim_end_matches('/')),
        None => AWS_SSO_OIDC_URL_TEMPLATE.replace("{region}", region),
    }
}

/// Returns the `generateAssistantResponse` URL for the given region, or
/// `{base}/generateAssistantResponse` when `base_override` is set.
pub fn generate_assistant_response_url(region: &str, base_override: Option<&str>) -> String {
    let host = base_override
        .map(|b| b.trim_end_matches('/').to_string())
        .unwrap_or_else(|| CODEWHISPERER_HOST_TEMPLATE.replace("{region}", region));
    format!("{}/generateAssistantResponse", host)
}

/// Returns the `SendMessageStreaming` URL for the given region, or
/// `{base}/SendMessageStreaming` when `base_override` is set.
///
/// Used instead of `generateAssistantResponse` when the public model name
/// begins with `amazonq`.
pub fn send_message_streaming_url(region: &str, base_override: Option<&str>) -> String {
    let host = base_override
        .map(|b| b.trim_end_matches('/').to_string())
        .unwrap_or_else(|| CODEWHISPERER_HOST_TEMPLATE.replace("{region}", region));
    format!("{}/SendMessageStreaming", host)
}

/// Resolved, process-wide gateway configuration.
///
/// Collected once at client-build time from environment variables, mirroring
/// the constants above; request handling reads from this struct rather than
/// re-reading the environment per call.
#[derive(Debug, Clone)]
pub struct GatewayConfig {
    pub oauth_creds_dir_path: Option<String>,
    pub oauth_creds_file_path: Option<String>,
    pub oauth_creds_base64: Option<String>,
    pub request_timeout: Duration,
    pub max_retries: u32,
    pub base_retry_delay: Duration,
    pub cron_near_minutes: i64,
    pub use_system_proxy: bool,
    pub max_history: usize,
    pub max_message_length: usize,
    pub max_tools: usize,
    pub disable_tools: bool,
    pub max_request_size: usize,
    /// Overrides the `codewhisperer`/refresh-endpoint hosts with a single base
    /// URL (all three endpoints become `{base}/<path>`). Not read from the
    /// environment in production use; set directly on a [`GatewayConfig`] to
    /// point the whole adapter at a mock server in tests.
    pub base_url_override: Option<String>,
}

impl GatewayConfig {
    /// Build configuration from environment variables, falling back to the
    /// defaults named in each constant above.
    pub fn from_env() -> Self {
        Self {
            oauth_creds_dir_path: env_string("KIRO_OAUTH_CREDS_DIR_PATH"),
            oauth_creds_file_path: env_string("KIRO_OAUTH_CREDS_FILE_PATH"),
            oauth_creds_base64: env_string("KIRO_OAUTH_CREDS_BASE64"),
            request_timeout: env_duration_secs("KIRO_REQUEST_TIMEOUT", REQUEST_TIMEOUT),
            max_retries: env_u32("REQUEST_MAX_RETRIES", MAX_RETRIES),
            base_retry_delay: env_duration_millis("REQUEST_BASE_DELAY", BASE_RETRY_DELAY),
            cron_near_minutes: env_i64("CRON_NEAR_MINUTES", CRON_NEAR_MINUTES),
            use_system_proxy: env_bool("USE_SYSTEM_PROXY_KIRO", false),
            max_history: env_usize("KIRO_MAX_HISTORY", KIRO_MAX_HISTORY),
            max_message_length: env_usize("KIRO_MAX_MESSAGE_LENGTH", KIRO_MAX_MESSAGE_LENGTH),
            max_tools: env_usize("KIRO_MAX_TOOLS", KIRO_MAX_TOOLS),
            disable_tools: env_bool("KIRO_DISABLE_TOOLS", KIRO_DISABLE_TOOLS_DEFAULT),
            max_request_size: env_usize("KIRO_MAX_REQUEST_SIZE", KIRO_MAX_REQUEST_SIZE),
            base_url_override: None,
        }
    }
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self::from_env()
    }
}

fn env_string(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.is_empty())
}

fn env_bool(key: &str, default: bool) -> bool {
    std::env::var(key)
        .ok()
        .map(|v| matches!(v.as_str(), "1" | "true" | "TRUE" | "True"))
        .unwrap_or(default)
}

fn env_usize(key: &str, default: usize) -> usize {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

fn env_u32(key: &str, default: u32) -> u32 {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

fn env_i64(key: &str, default: i64) -> i64 {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

fn env_duration_secs(key: &str, default: Duration) -> Duration {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse::<u64>().ok())
        .map(Duration::from_secs)
        .unwrap_or(default)
}

fn env_duration_millis(key: &str, default: Duration) -> Duration {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse::<u64>().ok())
        .map(Duration::from_millis)
        .unwrap_or(default)
}
