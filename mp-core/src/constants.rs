//! Constants and configuration values for the Menupi device agent
//!
//! Centralizes storage key names, identity rules, pairing copy and network
//! defaults. Add new tunables here instead of inlining literals elsewhere.

use std::time::Duration;

/// File system paths
pub mod paths {
    /// Application directory name under the user config dir
    pub const APP_DIR: &str = "menupi";

    /// Settings file name
    pub const SETTINGS_FILE: &str = "settings.json";

    /// Identity key-value store file name
    pub const STORE_FILE: &str = "storage.json";

    /// DRM class directory (connectors and cards)
    pub const DRM_CLASS: &str = "/sys/class/drm";

    /// Memory info for the device memory hint
    pub const MEMINFO: &str = "/proc/meminfo";

    /// User configuration directory.
    ///
    /// Resolution order: `XDG_CONFIG_HOME`, `$HOME/.config`, then the
    /// platform default from `dirs`.
    pub fn user_config_dir() -> Option<std::path::PathBuf> {
        let config_base = if let Ok(xdg) = std::env::var("XDG_CONFIG_HOME") {
            Some(std::path::PathBuf::from(xdg))
        } else if let Ok(home) = std::env::var("HOME") {
            Some(std::path::PathBuf::from(home).join(".config"))
        } else {
            dirs::config_dir()
        };

        config_base.map(|p| p.join(APP_DIR))
    }
}

/// Persisted key names
pub mod storage {
    /// Prefix a key name with the product namespace
    macro_rules! namespaced {
        ($name:literal) => {
            concat!("menupi_", $name)
        };
    }

    /// Permanent hardware-derived identity
    pub const DEVICE_UID_KEY: &str = namespaced!("device_uid");

    /// Per-installation identity
    pub const INSTALLATION_ID_KEY: &str = namespaced!("installation_id");

    /// Maximum store file size accepted on load (1 MB)
    pub const MAX_STORE_SIZE: u64 = 1024 * 1024;
}

/// Identity rules
pub mod identity {
    /// A persisted device uid shorter than this is treated as absent
    pub const MIN_PERSISTED_UID_LEN: usize = 20;

    /// Length of a SHA-256 digest rendered as hex
    pub const SHA256_HEX_LEN: usize = 64;

    /// Prefix of the non-deterministic last-resort identity
    pub const FALLBACK_PREFIX: &str = "fallback_";

    /// Length of the random base-36 suffix on fallback identities
    pub const FALLBACK_SUFFIX_LEN: usize = 9;

    /// Prefix of server-issued provisioning codes
    pub const PROVISIONING_CODE_PREFIX: &str = "tv_";

    /// Minimum provisioning code length (inclusive)
    pub const PROVISIONING_CODE_MIN_LEN: usize = 6;

    /// Maximum provisioning code length (inclusive)
    pub const PROVISIONING_CODE_MAX_LEN: usize = 50;

    /// Length of a hyphenated UUID
    pub const UUID_LEN: usize = 36;
}

/// Platform probe defaults
pub mod probe {
    /// User agent prefix reported by the host probe
    pub const USER_AGENT_PRODUCT: &str = "menupi-agent";

    /// Device memory buckets in GiB, matching the browser's coarse hint
    pub const DEVICE_MEMORY_BUCKETS: &[f64] = &[0.25, 0.5, 1.0, 2.0, 4.0, 8.0];

    /// Colour and pixel depth reported when a display mode is found
    pub const DEFAULT_COLOR_DEPTH: u32 = 24;

    /// Separator between renderer vendor, renderer and version
    pub const RENDERER_SEPARATOR: char = '~';
}

/// Pairing copy and network defaults
pub mod pairing {
    use super::Duration;

    /// Success sentence the backend sends; the screen name follows it
    pub const CONNECTED_PREFIX: &str = "This TV is now connected to ";

    /// Shown when the request never produced a backend verdict
    pub const GENERIC_FAILURE_MESSAGE: &str = "Failed to pair device. Please try again.";

    /// Default backend base URL
    pub const DEFAULT_API_BASE_URL: &str = "http://localhost:3000";

    /// Default per-request timeout
    pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_millis(10_000);

    /// Lower bound for a configured request timeout
    pub const MIN_REQUEST_TIMEOUT_MS: u64 = 500;

    /// Upper bound for a configured request timeout
    pub const MAX_REQUEST_TIMEOUT_MS: u64 = 120_000;
}

/// Settings limits
pub mod settings {
    /// Maximum settings file size accepted on load (1 MB)
    pub const MAX_SETTINGS_SIZE: u64 = 1024 * 1024;

    /// Overrides the configured backend URL
    pub const ENV_API_URL: &str = "MENUPI_API_URL";

    /// Overrides the configured session cookie
    pub const ENV_SESSION_COOKIE: &str = "MENUPI_SESSION_COOKIE";
}
