//! Auth constants: User-Agent strings, machine fingerprint generation.

use sha2::{Digest, Sha256};
use std::sync::OnceLock;

/// Kiro IDE version string used in User-Agent.
pub const KIRO_IDE_VERSION: &str = "KiroIDE-0.1.25";

/// AWS SDK version string used in User-Agent.
pub const AWS_SDK_VERSION: &str = "aws-sdk-js/1.0.7";

/// SHA-256 of the first non-internal, non-zero MAC address found on the
/// machine, computed once per process. Falls back to the hash of
/// `00:00:00:00:00:00` when no such interface exists.
pub fn machine_fingerprint() -> &'static str {
    static FINGERPRINT: OnceLock<String> = OnceLock::new();
    FINGERPRINT.get_or_init(|| {
        let mac = first_mac_address().unwrap_or_else(|| "00:00:00:00:00:00".to_string());
        let hash = Sha256::digest(mac.as_bytes());
        hash.iter().map(|b| format!("{:02x}", b)).collect()
    })
}

/// Scan `/sys/class/net/*/address` for the first interface whose MAC is
/// present, skipping the loopback interface and all-zero addresses.
fn first_mac_address() -> Option<String> {
    let entries = std::fs::read_dir("/sys/class/net").ok()?;
    let mut ifaces: Vec<_> = entries.filter_map(|e| e.ok()).collect();
    ifaces.sort_by_key(|e| e.file_name());

    for entry in ifaces {
        let name = entry.file_name();
        let name = name.to_string_lossy();
        if name == "lo" {
            continue;
        }
        let addr_path = entry.path().join("address");
        if let Ok(raw) = std::fs::read_to_string(&addr_path) {
            let mac = raw.trim().to_lowercase();
            if !mac.is_empty() && mac != "00:00:00:00:00:00" {
                return Some(mac);
            }
        }
    }
    None
}

/// Build the `user-agent` header value.
pub fn user_agent(fingerprint: &str) -> String {
    format!("{} {}-{}", AWS_SDK_VERSION, KIRO_IDE_VERSION, fingerprint)
}

/// Build the `x-amz-user-agent` header value.
pub fn amz_user_agent(fingerprint: &str) -> String {
    format!("{} {}-{}", AWS_SDK_VERSION, KIRO_IDE_VERSION, fingerprint)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fingerprint_is_stable_sha256_hex() {
        let fp = machine_fingerprint();
        assert_eq!(fp.len(), 64);
        assert!(fp.chars().all(|c| c.is_ascii_hexdigit()));
        assert_eq!(fp, machine_fingerprint());
    }

    #[test]
    fn user_agent_contains_versions() {
        let ua = user_agent("deadbeef");
        assert!(ua.contains(AWS_SDK_VERSION));
        assert!(ua.contains(KIRO_IDE_VERSION));
        assert!(ua.contains("deadbeef"));
    }
}
