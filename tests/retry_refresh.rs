//! Integration test: a 403 from `generateAssistantResponse` forces a
//! credential refresh and a single retry, against a mocked upstream.

use std::io::Write as _;
use std::time::Duration;

use kiro_gateway::config::GatewayConfig;
use kiro_gateway::KiroClientBuilder;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn write_credentials_file(dir: &tempfile::TempDir, expires_at: chrono::DateTime<chrono::Utc>) -> std::path::PathBuf {
    let path = dir.path().join("kiro-auth-token.json");
    let body = serde_json::json!({
        "accessToken": "stale",
        "refreshToken": "r1",
        "authMethod": "social",
        "region": "us-east-1",
        "expiresAt": expires_at.to_rfc3339(),
    });
    let mut f = std::fs::File::create(&path).unwrap();
    f.write_all(serde_json::to_string(&body).unwrap().as_bytes()).unwrap();
    path
}

#[tokio::test]
async fn forbidden_response_triggers_refresh_then_retry() {
    let mock_server = MockServer::start().await;
    let dir = tempfile::tempdir().unwrap();

    // Not near expiry, so the pre-send check never fires a refresh on its
    // own — the single refresh call below must come from the 403 handler
    // bypassing the store's near-expiry check, not from the clock.
    let creds_path = write_credentials_file(&dir, chrono::Utc::now() + chrono::Duration::hours(1));

    Mock::given(method("POST"))
        .and(path("/refreshToken"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "accessToken": "new",
            "refreshToken": "r2",
            "expiresIn": 3600,
        })))
        .expect(1)
        .mount(&mock_server)
        .await;

    Mock::given(method("POST"))
        .and(path("/generateAssistantResponse"))
        .respond_with(ResponseTemplate::new(403))
        .up_to_n_times(1)
        .mount(&mock_server)
        .await;

    Mock::given(method("POST"))
        .and(path("/generateAssistantResponse"))
        .respond_with(ResponseTemplate::new(200).set_body_string(r#"event{"content":"ok"}"#))
        .mount(&mock_server)
        .await;

    let config = GatewayConfig {
        oauth_creds_dir_path: None,
        oauth_creds_file_path: Some(creds_path.to_string_lossy().into_owned()),
        oauth_creds_base64: None,
        request_timeout: Duration::from_secs(5),
        max_retries: 3,
        base_retry_delay: Duration::from_millis(1),
        cron_near_minutes: 10,
        use_system_proxy: false,
        max_history: 15,
        max_message_length: 8000,
        max_tools: 12,
        disable_tools: false,
        max_request_size: 100_000,
        base_url_override: Some(mock_server.uri()),
    };

    let client = KiroClientBuilder::new()
        .config(config)
        .build()
        .await
        .expect("client should build against the mocked refresh endpoint");

    let response = client
        .messages()
        .model("claude-sonnet-4-5")
        .max_tokens(256)
        .user_message("hi")
        .send()
        .await
        .expect("request should succeed after the single 403-triggered retry");

    assert_eq!(response.text(), "ok");

    let persisted: serde_json::Value =
        serde_json::from_slice(&std::fs::read(&creds_path).unwrap()).unwrap();
    assert_eq!(persisted["accessToken"], "new");
}
