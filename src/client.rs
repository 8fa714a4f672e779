//! Main client entry point.

use std::pin::Pin;
use std::sync::Arc;

use async_stream::try_stream;
use futures::Stream;
use tracing::{debug, info};

use crate::api::messages::MessagesRequestBuilder;
use crate::auth::CredentialStore;
use crate::config::GatewayConfig;
use crate::convert::model_resolver::{is_amazonq_model, ModelResolver};
use crate::convert::request::build_kiro_payload;
use crate::error::{Error, Result};
use crate::models::request::MessagesRequest;
use crate::models::response::MessagesResponse;
use crate::models::stream::StreamEvent;
use crate::stream;
use crate::transport::http::KiroHttpClient;

/// Kiro API client.
///
/// Provides both an Anthropic Messages API surface and raw Kiro API access.
///
/// # Examples
///
/// ```rust,no_run
/// use kiro_gateway::{KiroClient, KiroClientBuilder};
///
/// # async fn example() -> kiro_gateway::Result<()> {
/// let client = KiroClientBuilder::new()
///     .credentials_file("~/.aws/sso/cache/kiro-auth-token.json")
///     .build()
///     .await?;
///
/// let response = client.messages()
///     .model("claude-sonnet-4-5")
///     .max_tokens(1024)
///     .user_message("Hello, Claude!")
///     .send()
///     .await?;
///
/// println!("{}", response.text());
/// # Ok(())
/// # }
/// ```
pub struct KiroClient {
    auth: Arc<CredentialStore>,
    http: Arc<KiroHttpClient>,
    model_resolver: Arc<ModelResolver>,
    config: GatewayConfig,
}

impl KiroClient {
    /// Create a builder for configuring the client.
    pub fn builder() -> KiroClientBuilder {
        KiroClientBuilder::new()
    }

    /// Start building a Messages API request.
    pub fn messages(&self) -> MessagesRequestBuilder<'_> {
        MessagesRequestBuilder::new(self)
    }

    /// Send a Messages API request and get a complete response.
    pub async fn send_messages(&self, request: MessagesRequest) -> Result<MessagesResponse> {
        let model_id = self.model_resolver.resolve(&request.model);
        let region = self.auth.region().await;
        let profile_arn = self.auth.profile_arn().await;

        let payload = build_kiro_payload(&request, &model_id, profile_arn.as_deref(), &self.config)?;
        let url = self.resolve_url(&request.model, &region);

        debug!(model = model_id.as_str(), "sending Messages request");

        let response = self.http.post_with_retry(&url, &payload).await?;
        let body = response
            .text()
            .await
            .map_err(|e| Error::Stream(format!("failed to read response body: {}", e)))?;

        let parsed = stream::parse_buffer(&body);
        Ok(stream::build_response(&parsed, &request.model))
    }

    /// Send a Messages API request and get a synthesized pseudo-stream.
    ///
    /// The upstream never truly streams tokens to us; the response is fully
    /// buffered, then [`stream::build_pseudo_stream`] replays it as the
    /// event sequence a streaming caller expects.
    pub async fn send_messages_stream(
        &self,
        request: MessagesRequest,
    ) -> Result<Pin<Box<dyn Stream<Item = Result<StreamEvent>> + Send>>> {
        let model_id = self.model_resolver.resolve(&request.model);
        let region = self.auth.region().await;
        let profile_arn = self.auth.profile_arn().await;

        let payload = build_kiro_payload(&request, &model_id, profile_arn.as_deref(), &self.config)?;
        let url = self.resolve_url(&request.model, &region);

        debug!(model = model_id.as_str(), "sending streaming Messages request");

        let response = self.http.post_streaming(&url, &payload).await?;
        let body = response
            .text()
            .await
            .map_err(|e| Error::Stream(format!("failed to read response body: {}", e)))?;

        let parsed = stream::parse_buffer(&body);
        let events = stream::build_pseudo_stream(&parsed, &request.model);

        Ok(Box::pin(try_stream! {
            for event in events {
                yield event;
            }
        }))
    }

    /// Send a raw Kiro API payload.
    pub async fn raw_request(&self, payload: &serde_json::Value) -> Result<String> {
        let region = self.auth.region().await;
        crate::api::raw::raw_request(&self.http, &region, payload).await
    }

    /// Send a raw Kiro API payload and get the unconsumed streaming response.
    pub async fn raw_request_stream(&self, payload: &serde_json::Value) -> Result<reqwest::Response> {
        let region = self.auth.region().await;
        crate::api::raw::raw_request_stream(&self.http, &region, payload).await
    }

    /// Get a reference to the credential store.
    pub fn auth(&self) -> &CredentialStore {
        &self.auth
    }

    /// Get a reference to the model resolver.
    pub fn model_resolver(&self) -> &ModelResolver {
        &self.model_resolver
    }

    fn resolve_url(&self, public_model_name: &str, region: &str) -> String {
        let base_override = self.auth.base_url_override();
        if is_amazonq_model(public_model_name) {
            crate::config::send_message_streaming_url(region, base_override)
        } else {
            crate::config::generate_assistant_response_url(region, base_override)
        }
    }
}

/// Builder for [`KiroClient`].
pub struct KiroClientBuilder {
    oauth_creds_dir_path: Option<String>,
    oauth_creds_file_path: Option<String>,
    oauth_creds_base64: Option<String>,
    force_refresh: bool,
    reqwest_client: Option<reqwest::Client>,
    config: Option<GatewayConfig>,
}

impl KiroClientBuilder {
    /// Create a new builder.
    pub fn new() -> Self {
        Self {
            oauth_creds_dir_path: None,
            oauth_creds_file_path: None,
            oauth_creds_base64: None,
            force_refresh: false,
            reqwest_client: None,
            config: None,
        }
    }

    /// Load credentials from an explicit JSON file path, overriding whatever
    /// `KIRO_OAUTH_CREDS_FILE_PATH` would resolve to.
    pub fn credentials_file(mut self, path: impl Into<String>) -> Self {
        self.oauth_creds_file_path = Some(path.into());
        self
    }

    /// Look for the primary credentials file (and its siblings) under this
    /// directory, overriding `KIRO_OAUTH_CREDS_DIR_PATH`.
    pub fn credentials_dir(mut self, path: impl Into<String>) -> Self {
        self.oauth_creds_dir_path = Some(path.into());
        self
    }

    /// Merge in a base64-encoded JSON credential blob (source #1, highest priority).
    pub fn credentials_base64(mut self, blob: impl Into<String>) -> Self {
        self.oauth_creds_base64 = Some(blob.into());
        self
    }

    /// Force a credential refresh during `build()` regardless of expiry.
    pub fn force_refresh(mut self, force: bool) -> Self {
        self.force_refresh = force;
        self
    }

    /// Use an explicit [`GatewayConfig`] instead of one read from the environment.
    pub fn config(mut self, config: GatewayConfig) -> Self {
        self.config = Some(config);
        self
    }

    /// Set a custom reqwest client (e.g. for a system proxy).
    pub fn reqwest_client(mut self, client: reqwest::Client) -> Self {
        self.reqwest_client = Some(client);
        self
    }

    /// Build the client, loading and validating credentials.
    pub async fn build(self) -> Result<KiroClient> {
        let mut config = self.config.unwrap_or_else(GatewayConfig::from_env);
        if self.oauth_creds_dir_path.is_some() {
            config.oauth_creds_dir_path = self.oauth_creds_dir_path;
        }
        if self.oauth_creds_file_path.is_some() {
            config.oauth_creds_file_path = self.oauth_creds_file_path;
        }
        if self.oauth_creds_base64.is_some() {
            config.oauth_creds_base64 = self.oauth_creds_base64;
        }

        let reqwest_client = self.reqwest_client.unwrap_or_default();

        let store = Arc::new(CredentialStore::new(&config, reqwest_client.clone()));
        store
            .initialize(self.force_refresh, config.oauth_creds_base64.as_deref())
            .await?;

        let http = Arc::new(KiroHttpClient::with_client(reqwest_client, Arc::clone(&store), &config));
        let model_resolver = Arc::new(ModelResolver::new());

        info!("KiroClient initialized");
        Ok(KiroClient { auth: store, http, model_resolver, config })
    }
}

impl Default for KiroClientBuilder {
    fn default() -> Self {
        Self::new()
    }
}
