//! AWS SSO OIDC ("idc") token refresh.

use tracing::{debug, info};

use crate::config::aws_sso_oidc_url;
use crate::error::{Error, Result};
use crate::models::auth::{IdcRefreshResponse, KiroCredentials};

/// Refresh a token via the AWS SSO OIDC endpoint.
///
/// POST `https://oidc.{region}.amazonaws.com/token`
/// Body: `{"grantType":"refresh_token","clientId":"...","clientSecret":"...","refreshToken":"..."}`
pub async fn refresh_token(
    client: &reqwest::Client,
    creds: &KiroCredentials,
    base_url_override: Option<&str>,
) -> Result<IdcRefreshResponse> {
    if creds.refresh_token.is_empty() {
        return Err(Error::MissingCredential("refreshToken".into()));
    }
    let client_id = creds
        .client_id
        .as_deref()
        .ok_or_else(|| Error::MissingCredential("clientId (required for idc)".into()))?;
    let client_secret = creds
        .client_secret
        .as_deref()
        .ok_or_else(|| Error::MissingCredential("clientSecret (required for idc)".into()))?;

    let url = aws_sso_oidc_url(&creds.region, base_url_override);
    info!(region = %creds.region, "refreshing token via AWS SSO OIDC");

    let payload = serde_json::json!({
        "grantType": "refresh_token",
        "clientId": client_id,
        "clientSecret": client_secret,
        "refreshToken": creds.refresh_token,
    });

    let response = client
        .post(&url)
        .header("Content-Type", "application/json")
        .json(&payload)
        .send()
        .await
        .map_err(|e| Error::RefreshFailed(format!("AWS SSO OIDC request failed: {}", e)))?;

    if !response.status().is_success() {
        let status = response.status().as_u16();
        let body = response.text().await.unwrap_or_default();
        return Err(Error::RefreshFailed(format!(
            "AWS SSO OIDC returned {}: {}",
            status, body
        )));
    }

    let data: IdcRefreshResponse = response
        .json()
        .await
        .map_err(|e| Error::RefreshFailed(format!("failed to parse OIDC response: {}", e)))?;

    if data.access_token.is_empty() {
        return Err(Error::RefreshFailed(
            "OIDC response does not contain accessToken".into(),
        ));
    }

    debug!("token refreshed via AWS SSO OIDC");
    Ok(data)
}
