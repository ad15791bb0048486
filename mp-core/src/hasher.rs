//! Identity Hasher
//!
//! Reduces a feature vector to a printable digest.
//!
//! - Primary: SHA-256 over the canonical JSON, rendered as 64 lowercase hex chars
//! - Degraded: 32-bit rolling hash (`h * 31 + unit`), absolute value in base-36
//! - Last resort: `fallback_<millis>_<random>`; not stable across sessions

use sha2::{Digest, Sha256};
use std::time::{SystemTime, UNIX_EPOCH};
use tracing::{debug, warn};

use crate::constants::identity;
use crate::error::{MenupiError, Result};
use crate::identity::HardwareIdentity;
use crate::probe::FeatureVector;

/// Which digest primitive the hasher may use
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DigestBackend {
    #[default]
    Sha256,
    /// No cryptographic digest available; use the rolling hash
    Unavailable,
}

/// Derives device uids from feature vectors
#[derive(Debug, Clone, Copy, Default)]
pub struct IdentityHasher {
    backend: DigestBackend,
}

impl IdentityHasher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_backend(backend: DigestBackend) -> Self {
        Self { backend }
    }

    pub fn backend(&self) -> DigestBackend {
        self.backend
    }

    /// Derive a device uid; never fails.
    ///
    /// Falls back to a time-based identity if the vector cannot be serialized.
    pub fn derive(&self, features: &FeatureVector) -> HardwareIdentity {
        match self.try_derive(features) {
            Ok(uid) => uid,
            Err(e) => {
                let uid = fallback_identity();
                warn!(error = %e, uid = %uid, "Hashing failed, using unstable fallback identity");
                uid
            }
        }
    }

    /// Derive a device uid, surfacing serialization failures
    pub fn try_derive(&self, features: &FeatureVector) -> Result<HardwareIdentity> {
        let canonical = canonical_string(features)?;
        Ok(self.digest(&canonical))
    }

    /// Digest an already-canonical string with the configured backend
    pub fn digest(&self, canonical: &str) -> HardwareIdentity {
        match self.backend {
            DigestBackend::Sha256 => HardwareIdentity::from_digest(sha256_hex(canonical)),
            DigestBackend::Unavailable => {
                debug!("No cryptographic digest available, using rolling hash");
                HardwareIdentity::from_digest(rolling_hash_base36(canonical))
            }
        }
    }
}

/// Compact JSON of the vector in its fixed field order
pub fn canonical_string(features: &FeatureVector) -> Result<String> {
    serde_json::to_string(features)
        .map_err(|e| MenupiError::Hashing(format!("cannot serialize feature vector: {}", e)))
}

/// SHA-256 of the UTF-8 bytes as lowercase hex
pub fn sha256_hex(input: &str) -> String {
    let digest = Sha256::digest(input.as_bytes());
    digest.iter().map(|b| format!("{:02x}", b)).collect()
}

/// 32-bit rolling hash over UTF-16 code units, absolute value in base-36
pub fn rolling_hash_base36(input: &str) -> String {
    let hash = input
        .encode_utf16()
        .fold(0i32, |h, unit| h.wrapping_mul(31).wrapping_add(i32::from(unit)));
    to_base36(u128::from(hash.unsigned_abs()))
}

/// Non-deterministic identity used only when hashing itself fails
pub fn fallback_identity() -> HardwareIdentity {
    let millis = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis())
        .unwrap_or(0);
    let suffix: String = to_base36(uuid::Uuid::new_v4().as_u128())
        .chars()
        .take(identity::FALLBACK_SUFFIX_LEN)
        .collect();
    HardwareIdentity::from_digest(format!("{}{}_{}", identity::FALLBACK_PREFIX, millis, suffix))
}

fn to_base36(mut n: u128) -> String {
    const DIGITS: &[u8; 36] = b"0123456789abcdefghijklmnopqrstuvwxyz";
    if n == 0 {
        return "0".to_string();
    }
    let mut out = Vec::new();
    while n > 0 {
        out.push(DIGITS[(n % 36) as usize]);
        n /= 36;
    }
    out.reverse();
    String::from_utf8(out).unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn vector() -> FeatureVector {
        FeatureVector {
            user_agent: "Mozilla/5.0 (SMART-TV; Linux; Tizen 6.0)".to_string(),
            platform: "Linux armv7l".to_string(),
            hardware_concurrency: 4,
            device_memory: 2.0,
            screen_width: 1920,
            screen_height: 1080,
            screen_color_depth: 24,
            screen_pixel_depth: 24,
            ..Default::default()
        }
    }

    #[test]
    fn test_sha256_known_vector() {
        assert_eq!(
            sha256_hex("abc"),
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
    }

    #[test]
    fn test_rolling_hash_known_values() {
        assert_eq!(rolling_hash_base36(""), "0");
        assert_eq!(rolling_hash_base36("abc"), "22ci");
    }

    #[test]
    fn test_rolling_hash_wraps_without_panicking() {
        let long = "x".repeat(10_000);
        let h = rolling_hash_base36(&long);
        assert!(!h.is_empty());
        assert!(h.chars().all(|c| c.is_ascii_digit() || c.is_ascii_lowercase()));
        assert_eq!(h, rolling_hash_base36(&long));
    }

    #[test]
    fn test_derive_is_deterministic() {
        let hasher = IdentityHasher::new();
        let a = hasher.derive(&vector());
        let b = hasher.derive(&vector());
        assert_eq!(a, b);
        assert_eq!(a.as_str().len(), identity::SHA256_HEX_LEN);
        assert!(a.as_str().chars().all(|c| c.is_ascii_hexdigit() && !c.is_ascii_uppercase()));
    }

    #[test]
    fn test_derive_changes_with_signals() {
        let hasher = IdentityHasher::new();
        let mut other = vector();
        other.screen_width = 1280;
        assert_ne!(hasher.derive(&vector()), hasher.derive(&other));
    }

    #[test]
    fn test_unavailable_backend_uses_rolling_hash() {
        let hasher = IdentityHasher::with_backend(DigestBackend::Unavailable);
        let a = hasher.derive(&vector());
        let b = hasher.derive(&vector());
        assert_eq!(a, b);
        let canonical = canonical_string(&vector()).unwrap();
        assert_eq!(a.as_str(), rolling_hash_base36(&canonical));
    }

    #[test]
    fn test_non_finite_memory_serializes_as_null() {
        let mut v = vector();
        v.device_memory = f64::NAN;
        let canonical = canonical_string(&v).unwrap();
        assert!(canonical.contains(r#""deviceMemory":null"#));
        assert!(canonical.contains(r#""hardwareConcurrency":4"#));

        v.device_memory = 0.5;
        assert!(canonical_string(&v).unwrap().contains(r#""deviceMemory":0.5"#));
        assert_eq!(IdentityHasher::new().derive(&v).as_str().len(), identity::SHA256_HEX_LEN);
    }

    #[test]
    fn test_fallback_identity_shape() {
        let uid = fallback_identity();
        let rest = uid.as_str().strip_prefix(identity::FALLBACK_PREFIX).unwrap();
        let (millis, suffix) = rest.split_once('_').unwrap();
        assert!(millis.parse::<u128>().is_ok());
        assert_eq!(suffix.len(), identity::FALLBACK_SUFFIX_LEN);
        assert!(uid.is_fallback());
    }
}
