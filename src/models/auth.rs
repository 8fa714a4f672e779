//! Authentication-related types.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Authentication method associated with a credential record.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuthMethod {
    /// Kiro Desktop ("social") login.
    /// Refreshes against `https://prod.{region}.auth.desktop.kiro.dev/refreshToken`.
    #[default]
    Social,
    /// AWS SSO OIDC ("idc") login.
    /// Refreshes against `https://oidc.{region}.amazonaws.com/token`.
    Idc,
}

impl std::fmt::Display for AuthMethod {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Social => write!(f, "social"),
            Self::Idc => write!(f, "idc"),
        }
    }
}

/// A merged OAuth credential record.
///
/// Built by [`crate::auth::credentials`] out of a base64 blob, a primary
/// credentials file, and sibling `*.json` files in the same directory;
/// mutated only by [`crate::auth::store::CredentialStore::refresh`].
#[derive(Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct KiroCredentials {
    #[serde(default)]
    pub access_token: String,
    #[serde(default)]
    pub refresh_token: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub client_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub client_secret: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub auth_method: Option<AuthMethod>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expires_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub profile_arn: Option<String>,
    #[serde(default = "default_region")]
    pub region: String,
}

impl std::fmt::Debug for KiroCredentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KiroCredentials")
            .field("access_token", &redacted(&self.access_token))
            .field("refresh_token", &redacted(&self.refresh_token))
            .field("client_id", &self.client_id.as_ref().map(|_| "[REDACTED]"))
            .field("client_secret", &self.client_secret.as_ref().map(|_| "[REDACTED]"))
            .field("auth_method", &self.auth_method)
            .field("expires_at", &self.expires_at)
            .field("profile_arn", &self.profile_arn)
            .field("region", &self.region)
            .finish()
    }
}

fn redacted(s: &str) -> &'static str {
    if s.is_empty() {
        "<empty>"
    } else {
        "[REDACTED]"
    }
}

fn default_region() -> String {
    crate::config::DEFAULT_REGION.to_string()
}

impl Default for KiroCredentials {
    fn default() -> Self {
        Self {
            access_token: String::new(),
            refresh_token: String::new(),
            client_id: None,
            client_secret: None,
            auth_method: None,
            expires_at: None,
            profile_arn: None,
            region: default_region(),
        }
    }
}

impl KiroCredentials {
    /// The auth method to act on: `auth_method` if the record explicitly
    /// carries one, `AuthMethod::Social` otherwise.
    pub fn effective_auth_method(&self) -> AuthMethod {
        self.auth_method.unwrap_or_default()
    }

    /// Merge a sibling supplement file into `self`: every non-empty/`Some`
    /// field overwrites, except `expiresAt`, which is never taken from
    /// siblings. `authMethod` only overwrites when the sibling file actually
    /// names one — a sidecar file that omits it (the common case for a plain
    /// client-id/secret file) must not silently demote a primary `Idc`
    /// credential back to the default `Social`.
    pub fn merge_sibling(&mut self, other: KiroCredentials) {
        if !other.access_token.is_empty() {
            self.access_token = other.access_token;
        }
        if !other.refresh_token.is_empty() {
            self.refresh_token = other.refresh_token;
        }
        if other.client_id.is_some() {
            self.client_id = other.client_id;
        }
        if other.client_secret.is_some() {
            self.client_secret = other.client_secret;
        }
        if other.profile_arn.is_some() {
            self.profile_arn = other.profile_arn;
        }
        if !other.region.is_empty() && other.region != default_region() {
            self.region = other.region;
        }
        if other.auth_method.is_some() {
            self.auth_method = other.auth_method;
        }
    }

    /// Merge the primary target file into `self`, overwriting every field
    /// including `expiresAt`.
    pub fn merge_primary(&mut self, other: KiroCredentials) {
        let keep_expiry_if_missing = self.expires_at;
        *self = other;
        if self.expires_at.is_none() {
            self.expires_at = keep_expiry_if_missing;
        }
    }
}

/// Response from the Kiro Desktop ("social") refresh endpoint.
#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SocialRefreshResponse {
    pub access_token: String,
    #[serde(default)]
    pub refresh_token: Option<String>,
    #[serde(default = "default_expires_in")]
    pub expires_in: i64,
    #[serde(default)]
    pub profile_arn: Option<String>,
}

impl std::fmt::Debug for SocialRefreshResponse {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SocialRefreshResponse")
            .field("access_token", &"[REDACTED]")
            .field("refresh_token", &self.refresh_token.as_ref().map(|_| "[REDACTED]"))
            .field("expires_in", &self.expires_in)
            .field("profile_arn", &self.profile_arn)
            .finish()
    }
}

/// Response from the AWS SSO OIDC ("idc") token endpoint.
#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IdcRefreshResponse {
    pub access_token: String,
    #[serde(default)]
    pub refresh_token: Option<String>,
    #[serde(default = "default_expires_in")]
    pub expires_in: i64,
}

impl std::fmt::Debug for IdcRefreshResponse {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("IdcRefreshResponse")
            .field("access_token", &"[REDACTED]")
            .field("refresh_token", &self.refresh_token.as_ref().map(|_| "[REDACTED]"))
            .field("expires_in", &self.expires_in)
            .finish()
    }
}

fn default_expires_in() -> i64 {
    3600
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn debug_redacts_secrets() {
        let creds = KiroCredentials {
            access_token: "secret-token".into(),
            refresh_token: "secret-refresh".into(),
            ..Default::default()
        };
        let dbg = format!("{:?}", creds);
        assert!(!dbg.contains("secret-token"));
        assert!(!dbg.contains("secret-refresh"));
    }

    #[test]
    fn merge_sibling_preserves_expiry() {
        let now = Utc::now();
        let mut primary = KiroCredentials {
            expires_at: Some(now),
            ..Default::default()
        };
        let sibling = KiroCredentials {
            client_id: Some("id".into()),
            client_secret: Some("secret".into()),
            expires_at: Some(now + chrono::Duration::hours(1)),
            ..Default::default()
        };
        primary.merge_sibling(sibling);
        assert_eq!(primary.expires_at, Some(now));
        assert_eq!(primary.client_id.as_deref(), Some("id"));
    }

    #[test]
    fn merge_sibling_does_not_clobber_auth_method_when_sibling_omits_it() {
        let mut primary = KiroCredentials {
            auth_method: Some(AuthMethod::Idc),
            ..Default::default()
        };
        let sibling = KiroCredentials {
            client_id: Some("id".into()),
            client_secret: Some("secret".into()),
            auth_method: None,
            ..Default::default()
        };
        primary.merge_sibling(sibling);
        assert_eq!(primary.auth_method, Some(AuthMethod::Idc));
    }
}
