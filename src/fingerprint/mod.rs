//! Device fingerprinting and session tracking.
//!
//! A fingerprint is a stable identifier derived from client-observable
//! attributes, used to recognize a recurring device without a persistent
//! cookie. It is a recognizability heuristic, not a security boundary:
//! the hash is deliberately non-cryptographic and unsalted so that the
//! same attribute tuple always maps to the same value.

pub mod registry;
pub mod store;

use serde::{Deserialize, Serialize};

pub use registry::{
    FingerprintRegistry, NewSession, RegistryError, StartedSession, UserFootprint,
};
pub use store::{DeviceSession, InMemorySessionStore, SessionStore};

/// Client-reported device attributes.
///
/// All fields default to empty so a partial report still fingerprints
/// deterministically.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DeviceInfo {
    pub browser: String,
    pub browser_version: String,
    pub os: String,
    pub os_version: String,
    pub device_type: String,
    pub screen_resolution: String,
    pub timezone: String,
    pub language: String,
}

/// Client-reported location attributes, all optional.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct LocationInfo {
    pub country: Option<String>,
    pub region: Option<String>,
    pub city: Option<String>,
}

/// Number of leading user-agent characters mixed into the fingerprint.
const USER_AGENT_PREFIX_CHARS: usize = 50;

/// Compute a stable device fingerprint from reported attributes.
///
/// Pure function: the attribute fields plus the first 50 characters of
/// the user agent are joined with `|` and run through a 31-multiplier
/// wrapping 32-bit hash, rendered in base-36. Identical inputs always
/// produce identical output; collisions are tolerated.
pub fn compute_fingerprint(device: &DeviceInfo, user_agent: &str) -> String {
    let ua_prefix: String = user_agent.chars().take(USER_AGENT_PREFIX_CHARS).collect();
    let material = [
        device.browser.as_str(),
        device.browser_version.as_str(),
        device.os.as_str(),
        device.os_version.as_str(),
        device.device_type.as_str(),
        device.screen_resolution.as_str(),
        device.timezone.as_str(),
        device.language.as_str(),
        ua_prefix.as_str(),
    ]
    .join("|");

    let mut hash: i32 = 0;
    for byte in material.bytes() {
        hash = hash.wrapping_mul(31).wrapping_add(byte as i32);
    }
    to_base36(hash.unsigned_abs() as u64)
}

fn to_base36(mut n: u64) -> String {
    const DIGITS: &[u8] = b"0123456789abcdefghijklmnopqrstuvwxyz";
    if n == 0 {
        return "0".to_string();
    }
    let mut out = Vec::new();
    while n > 0 {
        out.push(DIGITS[(n % 36) as usize]);
        n /= 36;
    }
    out.reverse();
    String::from_utf8(out).expect("base36 digits are ASCII")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_device() -> DeviceInfo {
        DeviceInfo {
            browser: "Firefox".to_string(),
            browser_version: "128.0".to_string(),
            os: "Linux".to_string(),
            os_version: "6.9".to_string(),
            device_type: "desktop".to_string(),
            screen_resolution: "2560x1440".to_string(),
            timezone: "Europe/Berlin".to_string(),
            language: "de-DE".to_string(),
        }
    }

    const UA: &str = "Mozilla/5.0 (X11; Linux x86_64; rv:128.0) Gecko/20100101 Firefox/128.0";

    #[test]
    fn fingerprint_is_deterministic() {
        let device = sample_device();
        assert_eq!(
            compute_fingerprint(&device, UA),
            compute_fingerprint(&device, UA)
        );
    }

    #[test]
    fn changing_one_field_changes_fingerprint() {
        let device = sample_device();
        let mut other = sample_device();
        other.screen_resolution = "1920x1080".to_string();
        assert_ne!(
            compute_fingerprint(&device, UA),
            compute_fingerprint(&other, UA)
        );
    }

    #[test]
    fn changing_user_agent_changes_fingerprint() {
        let device = sample_device();
        assert_ne!(
            compute_fingerprint(&device, UA),
            compute_fingerprint(&device, "curl/8.5.0")
        );
    }

    #[test]
    fn only_user_agent_prefix_matters() {
        let device = sample_device();
        let long_a = format!("{}{}", "a".repeat(USER_AGENT_PREFIX_CHARS), "tail-one");
        let long_b = format!("{}{}", "a".repeat(USER_AGENT_PREFIX_CHARS), "tail-two");
        assert_eq!(
            compute_fingerprint(&device, &long_a),
            compute_fingerprint(&device, &long_b)
        );
    }

    #[test]
    fn fingerprint_is_base36() {
        let fp = compute_fingerprint(&sample_device(), UA);
        assert!(!fp.is_empty());
        assert!(fp.chars().all(|c| c.is_ascii_digit() || c.is_ascii_lowercase()));
    }

    #[test]
    fn empty_attributes_still_fingerprint() {
        let fp = compute_fingerprint(&DeviceInfo::default(), "");
        assert!(!fp.is_empty());
    }

    #[test]
    fn base36_rendering() {
        assert_eq!(to_base36(0), "0");
        assert_eq!(to_base36(35), "z");
        assert_eq!(to_base36(36), "10");
        assert_eq!(to_base36(46655), "zzz");
    }
}
