//! Unified error handling for the Menupi device agent
//!
//! This crate provides a single error type used across all Menupi components.
//! It uses thiserror for ergonomic error definitions with proper Display and Error trait impls.

use std::io;
use std::path::PathBuf;

/// Result type alias using MenupiError
pub type Result<T> = std::result::Result<T, MenupiError>;

/// Unified error type for all Menupi operations
#[derive(thiserror::Error, Debug)]
pub enum MenupiError {
    // ============================================================================
    // I/O and File System Errors
    // ============================================================================
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("Failed to read file {path}: {source}")]
    FileRead {
        path: PathBuf,
        source: io::Error,
    },

    #[error("Failed to write file {path}: {source}")]
    FileWrite {
        path: PathBuf,
        source: io::Error,
    },

    #[error("File too large: {path} ({size} bytes, max {max_size} bytes)")]
    FileTooLarge {
        path: PathBuf,
        size: u64,
        max_size: u64,
    },

    // ============================================================================
    // Storage and Serialization Errors
    // ============================================================================
    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Failed to parse JSON: {0}")]
    JsonParse(#[from] serde_json::Error),

    // ============================================================================
    // Configuration Errors
    // ============================================================================
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Invalid configuration value for {field}: {reason}")]
    InvalidConfig {
        field: String,
        reason: String,
    },

    // ============================================================================
    // Identity Errors
    // ============================================================================
    #[error("Invalid identity value: {0}")]
    InvalidIdentity(String),

    #[error("Hashing failed: {0}")]
    Hashing(String),

    // ============================================================================
    // Pairing Errors
    // ============================================================================
    #[error("Pairing requires a selected screen or a pairing code")]
    PairingPrecondition,

    #[error("A pairing request is already in flight")]
    SubmissionInFlight,

    #[error("Pairing rejected (HTTP {status}): {message}")]
    PairingRejected {
        status: u16,
        message: String,
    },

    #[error("Network error: {0}")]
    Network(String),

    #[error("Failed to decode response: {0}")]
    Decode(String),

    // ============================================================================
    // Generic Errors
    // ============================================================================
    #[error("{0}")]
    Generic(String),
}

impl MenupiError {
    /// Create a generic error from a string
    pub fn generic(msg: impl Into<String>) -> Self {
        Self::Generic(msg.into())
    }

    /// Create a config error from a string
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Create a storage error from a string
    pub fn storage(msg: impl Into<String>) -> Self {
        Self::Storage(msg.into())
    }

    /// Create a network error from a string
    pub fn network(msg: impl Into<String>) -> Self {
        Self::Network(msg.into())
    }

    /// Whether this error came from the transport rather than the backend's verdict
    pub fn is_transport(&self) -> bool {
        matches!(self, Self::Network(_) | Self::Decode(_) | Self::Io(_))
    }
}

// Allow converting from String to MenupiError
impl From<String> for MenupiError {
    fn from(s: String) -> Self {
        Self::Generic(s)
    }
}

// Allow converting from &str to MenupiError
impl From<&str> for MenupiError {
    fn from(s: &str) -> Self {
        Self::Generic(s.to_string())
    }
}
