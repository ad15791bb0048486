//! Agent Settings
//!
//! Persistent settings stored as JSON in ~/.config/menupi/settings.json,
//! with environment overrides for the backend URL and session cookie.

use serde::{Deserialize, Serialize};
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::debug;

use crate::constants::{pairing, paths, settings as limits};
use crate::error::{MenupiError, Result};

/// Agent settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AgentSettings {
    /// Backend base URL, e.g. `https://app.menupi.com`
    #[serde(default = "default_api_base_url")]
    pub api_base_url: String,

    #[serde(default = "default_request_timeout_ms")]
    pub request_timeout_ms: u64,

    /// Session cookie for the cookie-authenticated screen listing and pairing calls
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub session_cookie: Option<String>,

    /// Identity store location; defaults to the config directory
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub store_path: Option<PathBuf>,
}

fn default_api_base_url() -> String {
    pairing::DEFAULT_API_BASE_URL.to_string()
}

fn default_request_timeout_ms() -> u64 {
    pairing::DEFAULT_REQUEST_TIMEOUT.as_millis() as u64
}

impl Default for AgentSettings {
    fn default() -> Self {
        Self {
            api_base_url: default_api_base_url(),
            request_timeout_ms: default_request_timeout_ms(),
            session_cookie: None,
            store_path: None,
        }
    }
}

impl AgentSettings {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }

    pub fn validate(&self) -> Result<()> {
        let url = self.api_base_url.trim();
        if !(url.starts_with("http://") || url.starts_with("https://")) {
            return Err(MenupiError::InvalidConfig {
                field: "api_base_url".to_string(),
                reason: format!("'{}' is not an http(s) URL", self.api_base_url),
            });
        }

        if !(pairing::MIN_REQUEST_TIMEOUT_MS..=pairing::MAX_REQUEST_TIMEOUT_MS)
            .contains(&self.request_timeout_ms)
        {
            return Err(MenupiError::InvalidConfig {
                field: "request_timeout_ms".to_string(),
                reason: format!(
                    "{} is outside {}-{}",
                    self.request_timeout_ms,
                    pairing::MIN_REQUEST_TIMEOUT_MS,
                    pairing::MAX_REQUEST_TIMEOUT_MS
                ),
            });
        }
        Ok(())
    }

    /// Apply `MENUPI_API_URL` and `MENUPI_SESSION_COOKIE` when set and non-empty
    pub fn apply_env_overrides(&mut self) {
        if let Some(url) = non_empty_env(limits::ENV_API_URL) {
            debug!(url = %url, "Backend URL overridden from environment");
            self.api_base_url = url;
        }
        if let Some(cookie) = non_empty_env(limits::ENV_SESSION_COOKIE) {
            self.session_cookie = Some(cookie);
        }
    }

    /// Identity store path, configured or default
    pub fn resolved_store_path(&self) -> Result<PathBuf> {
        match &self.store_path {
            Some(path) => Ok(path.clone()),
            None => crate::storage::get_store_path(),
        }
    }
}

fn non_empty_env(key: &str) -> Option<String> {
    std::env::var(key)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

/// Get the settings file path
pub fn get_settings_path() -> Result<PathBuf> {
    let menupi_dir = paths::user_config_dir()
        .ok_or_else(|| MenupiError::config("Could not determine config directory"))?;
    Ok(menupi_dir.join(paths::SETTINGS_FILE))
}

/// Load settings from the default path, then apply environment overrides
pub fn load_settings() -> Result<AgentSettings> {
    let mut settings = load_settings_from(&get_settings_path()?)?;
    settings.apply_env_overrides();
    settings.validate()?;
    Ok(settings)
}

/// Load settings from a file; a missing file yields defaults
pub fn load_settings_from(path: &Path) -> Result<AgentSettings> {
    if !path.exists() {
        return Ok(AgentSettings::default());
    }

    let metadata = fs::metadata(path).map_err(|source| MenupiError::FileRead {
        path: path.to_path_buf(),
        source,
    })?;
    if metadata.len() > limits::MAX_SETTINGS_SIZE {
        return Err(MenupiError::FileTooLarge {
            path: path.to_path_buf(),
            size: metadata.len(),
            max_size: limits::MAX_SETTINGS_SIZE,
        });
    }

    let content = fs::read_to_string(path).map_err(|source| MenupiError::FileRead {
        path: path.to_path_buf(),
        source,
    })?;
    serde_json::from_str(&content)
        .map_err(|e| MenupiError::config(format!("Failed to parse settings JSON: {}", e)))
}

/// Save settings to the default path
pub fn save_settings(settings: &AgentSettings) -> Result<()> {
    save_settings_to(&get_settings_path()?, settings)
}

/// Atomic write: temp file, fsync, rename
pub fn save_settings_to(path: &Path, settings: &AgentSettings) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).map_err(|e| {
            MenupiError::config(format!("Failed to create config directory: {}", e))
        })?;
    }

    let json = serde_json::to_string_pretty(settings)?;
    let temp_path = path.with_extension("json.tmp");

    let mut file = fs::File::create(&temp_path)
        .map_err(|e| MenupiError::config(format!("Failed to create temp file: {}", e)))?;
    file.write_all(json.as_bytes())
        .map_err(|e| MenupiError::config(format!("Failed to write to temp file: {}", e)))?;
    file.sync_all()
        .map_err(|e| MenupiError::config(format!("Failed to sync temp file: {}", e)))?;
    drop(file);

    fs::rename(&temp_path, path)
        .map_err(|e| MenupiError::config(format!("Failed to rename temp file: {}", e)))?;
    Ok(())
}
