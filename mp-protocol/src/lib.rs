use serde::{Deserialize, Serialize};

/// Screen listing endpoint used to populate the selector
pub const SCREENS_PATH: &str = "/api/screens";

/// Pairing endpoint
pub const PAIR_PATH: &str = "/api/pair";

/// Per-submission token so the backend can drop duplicate submits
pub const IDEMPOTENCY_KEY_HEADER: &str = "Idempotency-Key";

/// Installation id travels beside the device id so colliding device ids can be told apart
pub const INSTALLATION_ID_HEADER: &str = "X-Installation-Id";

/// Maximum accepted response body (64KB)
pub const MAX_RESPONSE_SIZE: usize = 64 * 1024;

/// A screen as listed by `GET /api/screens`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScreenSummary {
    pub id: String,
    pub name: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ScreensResponse {
    #[serde(default)]
    pub screens: Vec<ScreenSummary>,
}

/// Body of `POST /api/pair`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PairRequest {
    pub device_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub screen_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub public_code: Option<String>,
}

impl PairRequest {
    /// Build a request from raw form input.
    ///
    /// Blank values are dropped, the code is upper-cased, and an explicit
    /// screen selection wins over a code when both are present.
    pub fn new(
        device_id: impl Into<String>,
        screen_id: Option<&str>,
        public_code: Option<&str>,
    ) -> Self {
        let screen_id = screen_id
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_string);
        let public_code = if screen_id.is_some() {
            None
        } else {
            public_code.and_then(normalize_public_code)
        };

        Self {
            device_id: device_id.into(),
            screen_id,
            public_code,
        }
    }

    /// Whether the request names a pairing target at all
    pub fn has_target(&self) -> bool {
        self.screen_id.is_some() || self.public_code.is_some()
    }

    /// Validate request parameters before sending to the backend.
    ///
    /// The device id is an opaque token and the code is judged by the
    /// backend, so only their presence is checked here.
    pub fn validate(&self) -> Result<(), String> {
        if self.device_id.trim().is_empty() {
            return Err("Device id is empty".into());
        }
        if !self.has_target() {
            return Err("Either a screen or a pairing code is required".into());
        }
        Ok(())
    }
}

/// Trim and upper-case a human-entered pairing code; blank input yields `None`
pub fn normalize_public_code(raw: &str) -> Option<String> {
    let code = raw.trim();
    if code.is_empty() {
        None
    } else {
        Some(code.to_ascii_uppercase())
    }
}

/// Response body of `POST /api/pair`.
///
/// Success carries `message` (and, from newer backends, `boundScreenName`);
/// failure carries `error`. Both shapes decode into this one struct.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PairResponseBody {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(
        default,
        rename = "boundScreenName",
        skip_serializing_if = "Option::is_none"
    )]
    pub bound_screen_name: Option<String>,
}

impl PairResponseBody {
    /// Decode a raw body, tolerating empty or non-JSON payloads
    pub fn from_body(raw: &str) -> Self {
        if raw.trim().is_empty() {
            return Self::default();
        }
        serde_json::from_str(raw).unwrap_or_default()
    }
}

/// Status code and decoded body of a pairing response
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PairReply {
    pub status: u16,
    pub body: PairResponseBody,
}

impl PairReply {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}
