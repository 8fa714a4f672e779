//! Error types for the Kiro gateway.

use std::path::Path;
use std::time::Duration;

/// Result alias used throughout the crate.
pub type Result<T> = std::result::Result<T, Error>;

/// All errors the Kiro adapter can produce.
///
/// Variants map onto the error-kind table the adapter is specified against:
/// `Configuration`, `AuthExpired`, `RateLimited`, `ServerTransient`,
/// `ProtocolParse`, and `Fatal`. `ProtocolParse` failures are handled inline
/// (logged, raw value preserved) and never surface as this error — see
/// `convert::request` and `stream::event_parser`.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// No access token and no usable refresh token after merging all credential sources.
    #[error("not authenticated: no access or refresh token available")]
    NotAuthenticated,

    /// A credential field required by the configured auth method was missing.
    #[error("missing credential: {0}")]
    MissingCredential(String),

    /// The access token is expired and could not be refreshed in time.
    #[error("token expired and refresh unavailable")]
    TokenExpired,

    /// A refresh request to the social or IdC endpoint failed.
    #[error("token refresh failed: {0}")]
    RefreshFailed(String),

    /// Upstream returned a non-retryable HTTP status.
    #[error("upstream returned {status}: {message}")]
    Api { status: u16, message: String },

    /// Upstream returned 429; retries were exhausted or no `Retry-After` could be honored.
    #[error("rate limited{}", retry_after.map(|d| format!(", retry after {:?}", d)).unwrap_or_default())]
    RateLimited { retry_after: Option<Duration> },

    /// All retry attempts were exhausted.
    #[error("request failed after {attempts} attempts: {message}")]
    RetriesExhausted { attempts: u32, message: String },

    /// The request shaper was given zero messages.
    #[error("messages list is empty")]
    EmptyMessages,

    /// A payload exceeded `KIRO_MAX_REQUEST_SIZE` even after staged remediation.
    ///
    /// Non-fatal: callers send the oversized payload anyway per the adapter's
    /// best-effort remediation contract. Kept as a variant so the condition
    /// can be logged and inspected, not raised as an error path.
    #[error("payload still oversized after remediation: {size} bytes")]
    OversizePayload { size: usize },

    /// Filesystem error reading or writing a credential/storage file.
    #[error("storage I/O error at {path}: {message}")]
    StorageIo { path: std::path::PathBuf, message: String },

    /// A stored credential file failed to deserialize.
    #[error("storage deserialization error: {0}")]
    StorageSerialization(String),

    /// Generic storage backend failure.
    #[error("storage error: {0}")]
    Storage(String),

    /// Transport-level failure reading/writing the response body or stream.
    #[error("stream error: {0}")]
    Stream(String),

    /// Invalid configuration (bad URL template, missing region, etc).
    #[error("configuration error: {0}")]
    Config(String),

    /// Request timed out.
    #[error("request timed out")]
    Timeout,

    /// Network-level transport failure.
    #[error("network error: {0}")]
    Network(#[from] reqwest::Error),

    /// JSON (de)serialization failure outside the protocol parser's own recovery path.
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    /// Filesystem I/O failure not already wrapped as `StorageIo`.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    /// Build a [`Error::StorageIo`] from a path and a displayable message.
    pub fn storage_io(path: impl AsRef<Path>, message: impl std::fmt::Display) -> Self {
        Error::StorageIo {
            path: path.as_ref().to_path_buf(),
            message: message.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_includes_context() {
        let e = Error::Api { status: 429, message: "slow down".into() };
        assert!(e.to_string().contains("429"));
        assert!(e.to_string().contains("slow down"));
    }
}
