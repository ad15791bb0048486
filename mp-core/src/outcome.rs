//! Pairing Result Interpreter
//!
//! Turns a pairing reply into exactly one [`PairingOutcome`]. Success is
//! decided by the HTTP status alone. The bound screen name comes from the
//! structured `boundScreenName` field when the backend sends one, otherwise
//! it is lifted out of the "connected to" sentence; a sentence that does not
//! match is shown as-is without highlighting.

use regex::Regex;
use serde::{Deserialize, Serialize};
use std::sync::OnceLock;

use mp_protocol::PairReply;

use crate::constants::pairing;

/// Result of one pairing submission
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PairingOutcome {
    pub success: bool,
    /// Only set on success
    pub bound_screen_name: Option<String>,
    /// Human-readable success message, kept for display only
    pub message: Option<String>,
    pub error_message: Option<String>,
}

/// How an outcome should be rendered
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OutcomeDisplay {
    /// `prefix` in normal weight followed by `screen_name` in bold
    Connected { prefix: String, screen_name: String },
    /// Success without a recognisable screen name
    Plain(String),
    /// Error style, text verbatim
    Error(String),
}

impl PairingOutcome {
    pub fn bound(screen_name: Option<String>, message: Option<String>) -> Self {
        Self {
            success: true,
            bound_screen_name: screen_name,
            message,
            error_message: None,
        }
    }

    pub fn failed(error: impl Into<String>) -> Self {
        Self {
            success: false,
            bound_screen_name: None,
            message: None,
            error_message: Some(error.into()),
        }
    }

    /// Failure with no backend verdict (transport error, timeout)
    pub fn network_failure() -> Self {
        Self::failed(pairing::GENERIC_FAILURE_MESSAGE)
    }

    pub fn display(&self) -> OutcomeDisplay {
        if !self.success {
            let text = self
                .error_message
                .clone()
                .unwrap_or_else(|| pairing::GENERIC_FAILURE_MESSAGE.to_string());
            return OutcomeDisplay::Error(text);
        }

        match &self.bound_screen_name {
            Some(name) => OutcomeDisplay::Connected {
                prefix: pairing::CONNECTED_PREFIX.to_string(),
                screen_name: name.clone(),
            },
            None => OutcomeDisplay::Plain(self.message.clone().unwrap_or_default()),
        }
    }
}

fn connected_pattern() -> Option<&'static Regex> {
    static PATTERN: OnceLock<Option<Regex>> = OnceLock::new();
    PATTERN
        .get_or_init(|| {
            let prefix = regex::escape(pairing::CONNECTED_PREFIX.trim_end());
            Regex::new(&format!(r"^{}\s+(.+?)\s*$", prefix)).ok()
        })
        .as_ref()
}

/// Extract `<name>` from "This TV is now connected to <name>"
pub fn parse_connected_name(message: &str) -> Option<String> {
    let caps = connected_pattern()?.captures(message.trim())?;
    let name = caps.get(1)?.as_str().trim();
    if name.is_empty() {
        None
    } else {
        Some(name.to_string())
    }
}

/// Classify a pairing reply
pub fn interpret(reply: &PairReply) -> PairingOutcome {
    let body = &reply.body;

    if reply.is_success() {
        let screen_name = body
            .bound_screen_name
            .as_deref()
            .map(str::trim)
            .filter(|n| !n.is_empty())
            .map(str::to_string)
            .or_else(|| body.message.as_deref().and_then(parse_connected_name));
        return PairingOutcome::bound(screen_name, body.message.clone());
    }

    let error = body
        .error
        .clone()
        .filter(|e| !e.trim().is_empty())
        .or_else(|| body.message.clone().filter(|m| !m.trim().is_empty()))
        .unwrap_or_else(|| format!("Pairing failed (HTTP {})", reply.status));
    PairingOutcome::failed(error)
}
