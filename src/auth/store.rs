//! Credential lifecycle: load, merge, refresh, persist.

use std::path::PathBuf;
use std::sync::Arc;

use chrono::Utc;
use tokio::sync::{Mutex, RwLock};
use tracing::{debug, info, warn};

use crate::config::GatewayConfig;
use crate::error::{Error, Result};
use crate::models::auth::{AuthMethod, KiroCredentials};

use super::{constants, credentials, idc, social};

/// Loads, merges, refreshes, and persists the OAuth credential record used
/// to authenticate every upstream call.
///
/// Guards its mutable state behind a `RwLock`, with a `Mutex<()>`
/// single-flight guard so concurrent callers that all observe a near-expiry
/// token collapse into a single refresh (double-checked after acquiring the
/// write lock).
pub struct CredentialStore {
    state: RwLock<KiroCredentials>,
    refresh_lock: Mutex<()>,
    primary_path: PathBuf,
    client: reqwest::Client,
    cron_near_minutes: i64,
    base_url_override: Option<String>,
}

impl CredentialStore {
    /// Build a store from a [`GatewayConfig`], without loading anything yet.
    pub fn new(config: &GatewayConfig, client: reqwest::Client) -> Self {
        let primary_path = credentials::resolve_primary_path(
            config.oauth_creds_dir_path.as_deref(),
            config.oauth_creds_file_path.as_deref(),
        );
        Self {
            state: RwLock::new(KiroCredentials::default()),
            refresh_lock: Mutex::new(()),
            primary_path,
            client,
            cron_near_minutes: config.cron_near_minutes,
            base_url_override: config.base_url_override.clone(),
        }
    }

    /// Merge every source, derive the region default, and refresh if
    /// `force_refresh` is set or no access token resulted from the merge.
    pub async fn initialize(&self, force_refresh: bool, base64_blob: Option<&str>) -> Result<()> {
        let mut merged = KiroCredentials::default();

        if let Some(blob) = base64_blob {
            match credentials::load_from_base64(blob) {
                Ok(rec) => merged.merge_primary(rec),
                Err(e) => warn!(error = %e, "failed to decode base64 credential blob"),
            }
        }

        match credentials::load_primary_file(&self.primary_path) {
            Ok(rec) => merged.merge_primary(rec),
            Err(e) => debug!(path = %self.primary_path.display(), error = %e, "primary credentials file not loaded"),
        }

        for sibling in credentials::load_sibling_files(&self.primary_path) {
            merged.merge_sibling(sibling);
        }

        if merged.region.trim().is_empty() {
            warn!(
                default = crate::config::DEFAULT_REGION,
                "no region found in any credential source, assuming default"
            );
            merged.region = crate::config::DEFAULT_REGION.to_string();
        }

        {
            let mut state = self.state.write().await;
            *state = merged;
        }

        let needs_refresh = {
            let state = self.state.read().await;
            force_refresh || (state.access_token.is_empty() && !state.refresh_token.is_empty())
        };

        if needs_refresh {
            self.refresh(force_refresh).await?;
        }

        let state = self.state.read().await;
        if state.access_token.is_empty() {
            return Err(Error::NotAuthenticated);
        }
        Ok(())
    }

    /// `true` iff `now + cron_near_minutes >= expiresAt`. Parse failure (no
    /// `expiresAt` present) returns `false` — never pre-emptively refresh on
    /// garbage.
    pub async fn is_expiry_near(&self) -> bool {
        let state = self.state.read().await;
        match state.expires_at {
            Some(expires_at) => Utc::now() + chrono::Duration::minutes(self.cron_near_minutes) >= expires_at,
            None => false,
        }
    }

    /// Current access token, without triggering a refresh.
    pub async fn get_access_token(&self) -> Result<String> {
        let state = self.state.read().await;
        if state.access_token.is_empty() {
            return Err(Error::NotAuthenticated);
        }
        Ok(state.access_token.clone())
    }

    /// Current region.
    pub async fn region(&self) -> String {
        self.state.read().await.region.clone()
    }

    /// Current profile ARN, present only for `social` auth.
    pub async fn profile_arn(&self) -> Option<String> {
        let state = self.state.read().await;
        match state.effective_auth_method() {
            AuthMethod::Social => state.profile_arn.clone(),
            AuthMethod::Idc => None,
        }
    }

    /// Machine fingerprint used in the User-Agent headers.
    pub fn fingerprint(&self) -> &'static str {
        constants::machine_fingerprint()
    }

    /// The configured base-URL override, if any (test seam; see [`GatewayConfig::base_url_override`]).
    pub fn base_url_override(&self) -> Option<&str> {
        self.base_url_override.as_deref()
    }

    /// Force a refresh regardless of expiry, bypassing the double-check —
    /// for use when the *upstream*, not the clock, just rejected the token
    /// (e.g. a 403 response).
    pub async fn force_refresh(&self) -> Result<()> {
        self.refresh(true).await
    }

    /// Refresh only if the token looks stale, no-op otherwise — safe to call
    /// speculatively before every send.
    pub async fn refresh_if_needed(&self) -> Result<()> {
        self.refresh(false).await
    }

    /// POST the refresh request appropriate to the current `authMethod`,
    /// then read-modify-write the merged result back to the primary file.
    ///
    /// `force` bypasses the double-check-locking short-circuit below: a
    /// caller reacting to a confirmed-stale signal from upstream (a 403)
    /// must always hit the refresh endpoint, never silently no-op just
    /// because another task refreshed moments ago for an unrelated reason.
    async fn refresh(&self, force: bool) -> Result<()> {
        let _guard = self.refresh_lock.lock().await;

        if !force {
            // Double-check: another task may have refreshed while we waited.
            if !self.is_expiry_near().await {
                let state = self.state.read().await;
                if !state.access_token.is_empty() {
                    return Ok(());
                }
            }
        }

        let snapshot = self.state.read().await.clone();

        let base_override = self.base_url_override.as_deref();
        let (access_token, refresh_token, profile_arn, expires_in) = match snapshot.effective_auth_method() {
            AuthMethod::Social => {
                let resp = social::refresh_token(&self.client, &snapshot, base_override).await?;
                (resp.access_token, resp.refresh_token, resp.profile_arn, resp.expires_in)
            }
            AuthMethod::Idc => {
                let resp = idc::refresh_token(&self.client, &snapshot, base_override).await?;
                (resp.access_token, resp.refresh_token, None, resp.expires_in)
            }
        };

        let mut updated = snapshot;
        updated.access_token = access_token;
        if let Some(rt) = refresh_token.filter(|s| !s.is_empty()) {
            updated.refresh_token = rt;
        }
        if let Some(arn) = profile_arn.filter(|s| !s.is_empty()) {
            updated.profile_arn = Some(arn);
        }
        updated.expires_at = Some(Utc::now() + chrono::Duration::milliseconds(expires_in * 1000));

        self.persist_merged(&updated);

        {
            let mut state = self.state.write().await;
            *state = updated;
        }

        info!("credentials refreshed");
        Ok(())
    }

    /// Read-modify-write: re-read the primary file (treating a missing file
    /// as empty), overlay the just-refreshed fields, and write back.
    fn persist_merged(&self, updated: &KiroCredentials) {
        let mut on_disk = credentials::load_primary_file(&self.primary_path).unwrap_or_default();
        on_disk.merge_primary(updated.clone());

        let body = match serde_json::to_vec_pretty(&on_disk) {
            Ok(b) => b,
            Err(e) => {
                warn!(error = %e, "failed to serialize refreshed credentials");
                return;
            }
        };

        if let Some(parent) = self.primary_path.parent() {
            if let Err(e) = std::fs::create_dir_all(parent) {
                warn!(path = %parent.display(), error = %e, "failed to create credentials directory");
                return;
            }
        }

        if let Err(e) = std::fs::write(&self.primary_path, body) {
            warn!(path = %self.primary_path.display(), error = %e, "failed to persist refreshed credentials");
        }
    }
}

/// Shared handle, the shape callers are expected to clone around tasks.
pub type SharedCredentialStore = Arc<CredentialStore>;
