//! Device identity types and the get-or-create identity store
//!
//! Three identifier families live side by side and are deliberately distinct
//! types:
//!
//! - [`HardwareIdentity`]: the permanent `device_uid`, a pure function of the
//!   environment, so it survives reinstalls
//! - [`InstallationId`]: UUID-shaped, regenerated whenever local state is lost
//! - [`ProvisioningCode`]: the server-issued `tv_` code family
//!
//! None converts into another.

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::OnceLock;
use tracing::{debug, info, warn};

use crate::constants::{identity, storage};
use crate::error::{MenupiError, Result};
use crate::hasher::IdentityHasher;
use crate::probe::PlatformProbe;
use crate::storage::{KeyValueStore, MemoryStore};

// ============================================================================
// Identifier Types
// ============================================================================

/// Permanent, signal-derived device identity (`device_uid`)
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct HardwareIdentity(String);

impl HardwareIdentity {
    pub(crate) fn from_digest(digest: String) -> Self {
        Self(digest)
    }

    /// Accept a persisted value if it clears the length floor; no format check
    pub fn from_persisted(value: &str) -> Option<Self> {
        if value.len() >= identity::MIN_PERSISTED_UID_LEN {
            Some(Self(value.to_string()))
        } else {
            None
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Produced by the last-resort path; not stable across sessions
    pub fn is_fallback(&self) -> bool {
        self.0.starts_with(identity::FALLBACK_PREFIX)
    }

    pub fn into_string(self) -> String {
        self.0
    }
}

impl fmt::Display for HardwareIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Per-installation identity in UUID v4 shape
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct InstallationId(String);

impl InstallationId {
    /// New random id from the OS CSPRNG
    pub fn generate() -> Self {
        Self(uuid::Uuid::new_v4().to_string())
    }

    pub fn from_persisted(value: &str) -> Option<Self> {
        let value = value.trim();
        if value.is_empty() {
            None
        } else {
            Some(Self(value.to_string()))
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// 8-4-4-4-12 hex groups with version 4 and an RFC 4122 variant
    pub fn is_uuid_v4_shaped(&self) -> bool {
        let s = self.0.as_str();
        if s.len() != identity::UUID_LEN {
            return false;
        }
        let parts: Vec<&str> = s.split('-').collect();
        let expected_lens = [8, 4, 4, 4, 12];
        if parts.len() != expected_lens.len() {
            return false;
        }
        for (part, &expected_len) in parts.iter().zip(expected_lens.iter()) {
            if part.len() != expected_len || !part.chars().all(|c| c.is_ascii_hexdigit()) {
                return false;
            }
        }
        parts[2].starts_with('4') && matches!(parts[3].chars().next(), Some('8' | '9' | 'a' | 'b'))
    }
}

impl fmt::Display for InstallationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Server-issued short code of the `tv_` family
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ProvisioningCode(String);

impl ProvisioningCode {
    pub fn parse(value: &str) -> Result<Self> {
        if is_valid_device_id(value) {
            Ok(Self(value.to_string()))
        } else {
            Err(MenupiError::InvalidIdentity(format!(
                "provisioning code must start with '{}' and be {}-{} chars",
                identity::PROVISIONING_CODE_PREFIX,
                identity::PROVISIONING_CODE_MIN_LEN,
                identity::PROVISIONING_CODE_MAX_LEN
            )))
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for ProvisioningCode {
    type Error = MenupiError;

    fn try_from(value: String) -> Result<Self> {
        Self::parse(&value)
    }
}

impl From<ProvisioningCode> for String {
    fn from(code: ProvisioningCode) -> Self {
        code.0
    }
}

impl fmt::Display for ProvisioningCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Validates the server-issued `tv_` code family. Not a `device_uid` check.
pub fn is_valid_device_id(id: &str) -> bool {
    id.starts_with(identity::PROVISIONING_CODE_PREFIX)
        && (identity::PROVISIONING_CODE_MIN_LEN..=identity::PROVISIONING_CODE_MAX_LEN)
            .contains(&id.len())
}

/// Both identities of this client
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceIdentity {
    pub device_uid: HardwareIdentity,
    pub installation_id: InstallationId,
}

// ============================================================================
// Identity Store
// ============================================================================

/// Get-or-create persistence for both identities.
///
/// Storage is best-effort: when the backing store fails, identities are kept
/// in a session-only store for the life of this value and a warning is logged.
pub struct IdentityStore<S, P> {
    store: S,
    probe: P,
    hasher: IdentityHasher,
    device_uid: OnceLock<HardwareIdentity>,
    session: MemoryStore,
    create_lock: Mutex<()>,
}

impl<S: KeyValueStore, P: PlatformProbe> IdentityStore<S, P> {
    pub fn new(store: S, probe: P) -> Self {
        Self::with_hasher(store, probe, IdentityHasher::new())
    }

    pub fn with_hasher(store: S, probe: P, hasher: IdentityHasher) -> Self {
        Self {
            store,
            probe,
            hasher,
            device_uid: OnceLock::new(),
            session: MemoryStore::new(),
            create_lock: Mutex::new(()),
        }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    /// Permanent device uid; computed and persisted on first need, then cached
    pub fn device_uid(&self) -> HardwareIdentity {
        self.device_uid
            .get_or_init(|| {
                let _guard = self.create_lock.lock();
                if let Some(uid) = self
                    .read(storage::DEVICE_UID_KEY)
                    .as_deref()
                    .and_then(HardwareIdentity::from_persisted)
                {
                    debug!("Using persisted device uid");
                    return uid;
                }

                let uid = self.hasher.derive(&self.probe.collect());
                self.write(storage::DEVICE_UID_KEY, uid.as_str());
                info!(uid = %uid, "Derived new device uid");
                uid
            })
            .clone()
    }

    /// Installation id; regenerated whenever the persisted value is missing
    pub fn installation_id(&self) -> InstallationId {
        let _guard = self.create_lock.lock();
        if let Some(id) = self
            .read(storage::INSTALLATION_ID_KEY)
            .as_deref()
            .and_then(InstallationId::from_persisted)
        {
            return id;
        }

        let id = InstallationId::generate();
        self.write(storage::INSTALLATION_ID_KEY, id.as_str());
        info!(installation_id = %id, "Generated new installation id");
        id
    }

    pub fn identity(&self) -> DeviceIdentity {
        DeviceIdentity {
            device_uid: self.device_uid(),
            installation_id: self.installation_id(),
        }
    }

    /// Forget the installation id only; the device uid is untouched
    pub fn reset_installation(&self) {
        let _guard = self.create_lock.lock();
        if let Err(e) = self.store.remove(storage::INSTALLATION_ID_KEY) {
            warn!(error = %e, "Failed to remove installation id from storage");
        }
        let _ = self.session.remove(storage::INSTALLATION_ID_KEY);
    }

    fn read(&self, key: &str) -> Option<String> {
        // A value whose write failed lives only in the session store
        let persisted = self.store.get(key).unwrap_or_else(|e| {
            warn!(key = %key, error = %e, "Storage read failed, using session identity");
            None
        });
        persisted.or_else(|| self.session.get(key).ok().flatten())
    }

    fn write(&self, key: &str, value: &str) {
        if let Err(e) = self.store.set(key, value) {
            warn!(key = %key, error = %e, "Storage write failed, identity kept for this session only");
            let _ = self.session.set(key, value);
        }
    }
}
