//! Credential loading: base64 blob, primary file, sibling-file merge.

use std::path::{Path, PathBuf};

use chrono::DateTime;
use tracing::{debug, warn};

use crate::error::{Error, Result};
use crate::models::auth::KiroCredentials;

/// Parse a single JSON credential record from raw bytes.
fn parse_record(bytes: &[u8]) -> Result<KiroCredentials> {
    let value: serde_json::Value =
        serde_json::from_slice(bytes).map_err(|e| Error::StorageSerialization(e.to_string()))?;
    record_from_value(value)
}

/// Build a [`KiroCredentials`] from a loosely-typed JSON object, tolerating
/// fields the strict `camelCase` deserializer would reject (e.g. a
/// string-typed `expiresAt` that isn't valid RFC3339).
fn record_from_value(value: serde_json::Value) -> Result<KiroCredentials> {
    let mut creds: KiroCredentials = serde_json::from_value(value.clone()).unwrap_or_default();

    if let Some(raw) = value.get("expiresAt").and_then(|v| v.as_str()) {
        creds.expires_at = parse_timestamp(raw);
    }

    Ok(creds)
}

fn parse_timestamp(raw: &str) -> Option<DateTime<chrono::Utc>> {
    DateTime::parse_from_rfc3339(raw)
        .ok()
        .or_else(|| {
            raw.replace('Z', "+00:00")
                .parse::<DateTime<chrono::FixedOffset>>()
                .ok()
        })
        .map(|dt| dt.with_timezone(&chrono::Utc))
}

/// Decode a base64-encoded JSON credential blob (source #1).
///
/// Consumed once by the caller and discarded; this function performs no
/// caching of its own.
pub fn load_from_base64(blob: &str) -> Result<KiroCredentials> {
    use base64::Engine;
    let decoded = base64::engine::general_purpose::STANDARD
        .decode(blob.trim())
        .map_err(|e| Error::Config(format!("invalid base64 credential blob: {}", e)))?;
    parse_record(&decoded)
}

/// Load the primary target file: either an explicit path, or
/// `<credPath>/kiro-auth-token.json`.
pub fn load_primary_file(path: &Path) -> Result<KiroCredentials> {
    if !path.exists() {
        return Err(Error::storage_io(path, "credentials file not found"));
    }
    let bytes = std::fs::read(path).map_err(|e| Error::storage_io(path, e))?;
    parse_record(&bytes)
}

/// Resolve the primary target file path given an explicit file path and/or
/// directory path (the directory's default filename is used only when no
/// explicit file path is given).
pub fn resolve_primary_path(dir_path: Option<&str>, file_path: Option<&str>) -> PathBuf {
    if let Some(f) = file_path {
        return PathBuf::from(f);
    }
    let dir = dir_path.map(PathBuf::from).unwrap_or_else(default_cred_dir);
    dir.join("kiro-auth-token.json")
}

fn default_cred_dir() -> PathBuf {
    dirs::home_dir()
        .map(|h| h.join(".aws").join("sso").join("cache"))
        .unwrap_or_else(|| PathBuf::from("."))
}

/// Load every other `*.json` file alongside `primary_path`, merged in file
/// name order. `expiresAt` is never taken from these — see
/// [`KiroCredentials::merge_sibling`].
pub fn load_sibling_files(primary_path: &Path) -> Vec<KiroCredentials> {
    let Some(dir) = primary_path.parent() else {
        return Vec::new();
    };
    let Ok(entries) = std::fs::read_dir(dir) else {
        debug!(dir = %dir.display(), "credential directory not found, skipping siblings");
        return Vec::new();
    };

    let mut siblings: Vec<_> = entries
        .filter_map(|e| e.ok())
        .map(|e| e.path())
        .filter(|p| p != primary_path && p.extension().and_then(|e| e.to_str()) == Some("json"))
        .collect();
    siblings.sort();

    siblings
        .into_iter()
        .filter_map(|p| match std::fs::read(&p) {
            Ok(bytes) => match parse_record(&bytes) {
                Ok(rec) => Some(rec),
                Err(e) => {
                    warn!(path = %p.display(), error = %e, "skipping unparseable sibling credential file");
                    None
                }
            },
            Err(e) => {
                debug!(path = %p.display(), error = %e, "skipping unreadable sibling credential file");
                None
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn record_from_value_parses_expires_at() {
        let v = serde_json::json!({
            "accessToken": "at",
            "refreshToken": "rt",
            "expiresAt": "2030-01-01T00:00:00Z",
        });
        let rec = record_from_value(v).unwrap();
        assert_eq!(rec.access_token, "at");
        assert!(rec.expires_at.is_some());
    }

    #[test]
    fn load_from_base64_roundtrips() {
        use base64::Engine;
        let json = r#"{"accessToken":"at","refreshToken":"rt"}"#;
        let blob = base64::engine::general_purpose::STANDARD.encode(json);
        let rec = load_from_base64(&blob).unwrap();
        assert_eq!(rec.access_token, "at");
        assert_eq!(rec.refresh_token, "rt");
    }

    #[test]
    fn resolve_primary_path_prefers_explicit_file() {
        let p = resolve_primary_path(Some("/tmp/dir"), Some("/tmp/explicit.json"));
        assert_eq!(p, PathBuf::from("/tmp/explicit.json"));
        let p = resolve_primary_path(Some("/tmp/dir"), None);
        assert_eq!(p, PathBuf::from("/tmp/dir/kiro-auth-token.json"));
    }
}
