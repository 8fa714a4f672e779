//! Kiro API header construction.

use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use uuid::Uuid;

use crate::auth::constants;

/// Build the standard headers for a Kiro API request.
///
/// The upstream expects `max=1` on `amz-sdk-request` regardless of our own
/// retry loop — it is not an SDK-level attempt counter from its point of view.
pub fn kiro_api_headers(access_token: &str, fingerprint: &str) -> HeaderMap {
    let mut headers = HeaderMap::new();

    headers.insert(
        reqwest::header::AUTHORIZATION,
        HeaderValue::from_str(&format!("Bearer {}", access_token))
            .unwrap_or_else(|_| HeaderValue::from_static("Bearer invalid")),
    );

    headers.insert(
        reqwest::header::CONTENT_TYPE,
        HeaderValue::from_static("application/json"),
    );

    headers.insert(reqwest::header::ACCEPT, HeaderValue::from_static("application/json"));

    headers.insert(
        reqwest::header::USER_AGENT,
        HeaderValue::from_str(&constants::user_agent(fingerprint))
            .unwrap_or_else(|_| HeaderValue::from_static("kiro-gateway")),
    );

    headers.insert(
        HeaderName::from_static("x-amz-user-agent"),
        HeaderValue::from_str(&constants::amz_user_agent(fingerprint))
            .unwrap_or_else(|_| HeaderValue::from_static("kiro-gateway")),
    );

    headers.insert(
        HeaderName::from_static("x-amzn-kiro-agent-mode"),
        HeaderValue::from_static("vibe"),
    );

    headers.insert(
        HeaderName::from_static("amz-sdk-invocation-id"),
        HeaderValue::from_str(&Uuid::new_v4().to_string())
            .unwrap_or_else(|_| HeaderValue::from_static("00000000-0000-0000-0000-000000000000")),
    );

    headers.insert(
        HeaderName::from_static("amz-sdk-request"),
        HeaderValue::from_static("attempt=1; max=1"),
    );

    headers
}

/// Headers for the `SendMessageStreaming` endpoint (`amazonq`-prefixed
/// models), which the upstream leaves its connection open longer for.
pub fn kiro_streaming_headers(access_token: &str, fingerprint: &str) -> HeaderMap {
    let mut headers = kiro_api_headers(access_token, fingerprint);
    headers.insert(reqwest::header::CONNECTION, HeaderValue::from_static("close"));
    headers
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn amz_sdk_request_uses_max_one() {
        let headers = kiro_api_headers("tok", "fingerprint");
        assert_eq!(
            headers.get("amz-sdk-request").unwrap().to_str().unwrap(),
            "attempt=1; max=1"
        );
    }
}
