//! Kiro Desktop ("social") token refresh.

use tracing::{debug, info};

use crate::config::kiro_refresh_url;
use crate::error::{Error, Result};
use crate::models::auth::{KiroCredentials, SocialRefreshResponse};

/// Refresh a token via the Kiro Desktop Auth endpoint.
///
/// POST `https://prod.{region}.auth.desktop.kiro.dev/refreshToken`
/// Body: `{"refreshToken": "..."}`
pub async fn refresh_token(
    client: &reqwest::Client,
    creds: &KiroCredentials,
    base_url_override: Option<&str>,
) -> Result<SocialRefreshResponse> {
    if creds.refresh_token.is_empty() {
        return Err(Error::MissingCredential("refreshToken".into()));
    }

    let url = kiro_refresh_url(&creds.region, base_url_override);
    info!("refreshing token via Kiro Desktop Auth");

    let payload = serde_json::json!({ "refreshToken": creds.refresh_token });

    let response = client
        .post(&url)
        .header("Content-Type", "application/json")
        .json(&payload)
        .send()
        .await
        .map_err(|e| Error::RefreshFailed(format!("Kiro Desktop request failed: {}", e)))?;

    if !response.status().is_success() {
        let status = response.status().as_u16();
        let body = response.text().await.unwrap_or_default();
        return Err(Error::RefreshFailed(format!(
            "Kiro Desktop Auth returned {}: {}",
            status, body
        )));
    }

    let data: SocialRefreshResponse = response
        .json()
        .await
        .map_err(|e| Error::RefreshFailed(format!("failed to parse refresh response: {}", e)))?;

    if data.access_token.is_empty() {
        return Err(Error::RefreshFailed(
            "response does not contain accessToken".into(),
        ));
    }

    debug!("token refreshed via Kiro Desktop Auth");
    Ok(data)
}
