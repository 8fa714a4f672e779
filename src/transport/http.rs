//! HTTP client with retry logic for the Kiro API.

use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, warn};

use crate::auth::CredentialStore;
use crate::config::GatewayConfig;
use crate::error::{Error, Result};
use crate::transport::headers;

/// HTTP client for the Kiro API with retry and refresh logic.
pub struct KiroHttpClient {
    client: reqwest::Client,
    auth: Arc<CredentialStore>,
    max_retries: u32,
    base_retry_delay: Duration,
}

impl KiroHttpClient {
    /// Create a new HTTP client backed by `auth`, with retry knobs from `config`.
    pub fn new(auth: Arc<CredentialStore>, config: &GatewayConfig) -> Self {
        let client = reqwest::Client::builder()
            .connect_timeout(crate::config::CONNECT_TIMEOUT)
            .timeout(config.request_timeout)
            .build()
            .expect("failed to build HTTP client");

        Self {
            client,
            auth,
            max_retries: config.max_retries,
            base_retry_delay: config.base_retry_delay,
        }
    }

    /// Create with a custom reqwest client (e.g. a caller-supplied proxy config).
    pub fn with_client(client: reqwest::Client, auth: Arc<CredentialStore>, config: &GatewayConfig) -> Self {
        Self {
            client,
            auth,
            max_retries: config.max_retries,
            base_retry_delay: config.base_retry_delay,
        }
    }

    /// Send a POST request, applying the retry matrix:
    ///
    /// - HTTP 403, first occurrence only: force-refresh then retry once; the
    ///   retry itself cannot re-trigger this branch.
    /// - HTTP 429 / 5xx / network error: exponential backoff, up to `max_retries`.
    /// - Other 4xx: surface immediately.
    pub async fn post_with_retry(&self, url: &str, body: &serde_json::Value) -> Result<reqwest::Response> {
        let mut last_error = None;
        let mut reauth_attempted = false;
        let mut attempt = 0u32;

        loop {
            if self.auth.is_expiry_near().await {
                if let Err(e) = self.auth.refresh_if_needed().await {
                    warn!(error = %e, "pre-send refresh failed");
                }
            }

            let token = self.auth.get_access_token().await?;
            let fingerprint = self.auth.fingerprint();
            let hdrs = headers::kiro_api_headers(&token, fingerprint);

            let send_result = self.client.post(url).headers(hdrs).json(body).send().await;

            match send_result {
                Ok(response) if response.status().is_success() => return Ok(response),
                Ok(response) => {
                    let status = response.status().as_u16();
                    match status {
                        403 if !reauth_attempted => {
                            reauth_attempted = true;
                            warn!("got 403, forcing credential refresh and retrying once");
                            if let Err(e) = self.auth.force_refresh().await {
                                warn!(error = %e, "refresh after 403 failed");
                            }
                            last_error = Some(Error::Api {
                                status,
                                message: "forbidden, token may be expired".into(),
                            });
                            continue;
                        }
                        429 => {
                            let retry_after = response
                                .headers()
                                .get("retry-after")
                                .and_then(|v| v.to_str().ok())
                                .and_then(|v| v.parse::<u64>().ok())
                                .map(Duration::from_secs);
                            last_error = Some(Error::RateLimited { retry_after });
                        }
                        500..=599 => {
                            let body_text = response.text().await.unwrap_or_default();
                            warn!(status, body = body_text.as_str(), "server error, retrying");
                            last_error = Some(Error::Api { status, message: body_text });
                        }
                        _ => {
                            let body_text = response.text().await.unwrap_or_default();
                            return Err(Error::Api { status, message: body_text });
                        }
                    }
                }
                Err(e) => {
                    if e.is_timeout() {
                        warn!(attempt, "request timed out");
                        last_error = Some(Error::Timeout);
                    } else {
                        warn!(attempt, error = %e, "network error, retrying");
                        last_error = Some(Error::Network(e));
                    }
                }
            }

            if attempt >= self.max_retries {
                break;
            }
            let delay = self.base_retry_delay * 2u32.pow(attempt);
            debug!(attempt, delay_ms = delay.as_millis(), "backing off before retry");
            tokio::time::sleep(delay).await;
            attempt += 1;
        }

        Err(Error::RetriesExhausted {
            attempts: self.max_retries,
            message: last_error.map(|e| e.to_string()).unwrap_or_else(|| "unknown error".into()),
        })
    }

    /// Send a streaming POST request (`SendMessageStreaming`), returning the
    /// raw response. Same 403-reauth rule; no backoff retries since the
    /// response is consumed as a single buffered body regardless.
    pub async fn post_streaming(&self, url: &str, body: &serde_json::Value) -> Result<reqwest::Response> {
        let mut reauth_attempted = false;

        loop {
            if self.auth.is_expiry_near().await {
                if let Err(e) = self.auth.refresh_if_needed().await {
                    warn!(error = %e, "pre-send refresh failed");
                }
            }

            let token = self.auth.get_access_token().await?;
            let fingerprint = self.auth.fingerprint();
            let hdrs = headers::kiro_streaming_headers(&token, fingerprint);

            let response = self
                .client
                .post(url)
                .headers(hdrs)
                .json(body)
                .send()
                .await
                .map_err(|e| if e.is_timeout() { Error::Timeout } else { Error::Network(e) })?;

            if response.status().is_success() {
                return Ok(response);
            }

            let status = response.status().as_u16();
            if status == 403 && !reauth_attempted {
                reauth_attempted = true;
                warn!("got 403 on stream, forcing refresh and retrying once");
                self.auth.force_refresh().await?;
                continue;
            }

            let body_text = response.text().await.unwrap_or_default();
            return Err(Error::Api { status, message: body_text });
        }
    }
}

impl std::fmt::Debug for KiroHttpClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KiroHttpClient").finish_non_exhaustive()
    }
}

