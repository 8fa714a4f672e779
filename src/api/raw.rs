//! Raw Kiro API access (escape hatch).
//!
//! Use this when you need to send payloads directly in Kiro's native format,
//! bypassing the Anthropic Messages API abstraction.

use crate::error::{Error, Result};

/// Send a raw Kiro payload to `generateAssistantResponse` and get the full
/// response text.
pub async fn raw_request(
    http: &crate::transport::http::KiroHttpClient,
    region: &str,
    payload: &serde_json::Value,
) -> Result<String> {
    let url = crate::config::generate_assistant_response_url(region, None);
    let response = http.post_with_retry(&url, payload).await?;
    response
        .text()
        .await
        .map_err(|e| Error::Stream(format!("failed to read response body: {}", e)))
}

/// Send a raw Kiro payload and get the unconsumed streaming response.
pub async fn raw_request_stream(
    http: &crate::transport::http::KiroHttpClient,
    region: &str,
    payload: &serde_json::Value,
) -> Result<reqwest::Response> {
    let url = crate::config::send_message_streaming_url(region, None);
    http.post_streaming(&url, payload).await
}
