//! Menupi Core Library
//!
//! Device identity and screen pairing for Menupi display clients.
//!
//! # Features
//!
//! - **Platform Probe**: Ordered feature vector of ambient environment signals
//! - **Identity Hasher**: SHA-256 device uid with a rolling-hash degraded mode
//! - **Identity Store**: Get-or-create persistence of the device uid and installation id
//! - **Pairing**: Binds an identity to a Screen by selection or short code
//! - **Outcome**: Classifies pairing replies for display
//!
//! # Module Structure
//!
//! - `probe` → `hasher` → `identity` (with `storage`) produce a stable `device_uid`
//! - `pairing` submits it, `outcome` interprets the reply
//!
//! # Example
//!
//! ```no_run
//! use mp_core::{FileStore, HostProbe, HttpPairingApi, IdentityStore, PairingSession};
//! use std::time::Duration;
//!
//! # async fn run() -> mp_core::Result<()> {
//! let ids = IdentityStore::new(FileStore::open_default()?, HostProbe::new());
//! let api = HttpPairingApi::new("https://app.example", Duration::from_secs(10))?;
//! let session = PairingSession::new(api).with_installation_id(ids.installation_id());
//!
//! session.set_code("1a2b3c");
//! let outcome = session.submit(ids.device_uid().as_str()).await?;
//! # Ok(())
//! # }
//! ```

pub mod constants;
pub mod error;
pub mod hasher;
pub mod identity;
pub mod outcome;
pub mod pairing;
pub mod probe;
pub mod settings;
pub mod storage;

// Re-export error types
pub use error::{MenupiError, Result};

// Re-export probe types
pub use probe::{
    FeatureVector, PlatformProbe, RendererInfo, RenderingBackend,
    HostProbe, StaticProbe, DrmRenderingBackend, NoRenderingBackend,
};

// Re-export hashing
pub use hasher::{DigestBackend, IdentityHasher, canonical_string, rolling_hash_base36, sha256_hex};

// Re-export identity types and store
pub use identity::{
    DeviceIdentity, HardwareIdentity, IdentityStore, InstallationId, ProvisioningCode,
    is_valid_device_id,
};
pub use storage::{FileStore, KeyValueStore, MemoryStore};

// Re-export pairing
pub use pairing::{
    HttpPairingApi, PairingApi, PairingForm, PairingSession, PairingState, SubmissionMeta,
};
pub use outcome::{interpret, parse_connected_name, OutcomeDisplay, PairingOutcome};

// Re-export settings
pub use settings::{AgentSettings, get_settings_path, load_settings, load_settings_from, save_settings};

// Wire types used in this crate's public API
pub use mp_protocol::{PairReply, PairRequest, PairResponseBody, ScreenSummary};
