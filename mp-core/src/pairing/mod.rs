//! Screen Pairing
//!
//! Binds a client identity to a backend-managed Screen, either by explicit
//! screen selection or by a short code typed by an operator.
//!
//! # State Machine
//!
//! ```text
//! Unbound ──submit──▶ Submitting ──2xx──────────▶ Bound
//!    ▲                    │
//!    │                    └──non-2xx / network──▶ Failed ──submit──▶ Submitting
//!    └────────────────────── reset ──────────────────┘
//! ```
//!
//! Each submit is one request and one outcome: no retries, no queue. A
//! submit while another is in flight is refused.

mod http;
mod session;

pub use http::HttpPairingApi;
pub use session::{PairingForm, PairingSession, PairingState};

use async_trait::async_trait;
use std::sync::Arc;

use mp_protocol::{PairReply, PairRequest, ScreenSummary};

use crate::error::Result;
use crate::identity::InstallationId;

/// Per-submission metadata sent beside the request body
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubmissionMeta {
    /// Fresh for every submit so the backend can drop duplicates
    pub idempotency_key: String,
    pub installation_id: Option<String>,
}

impl SubmissionMeta {
    pub fn new(installation_id: Option<&InstallationId>) -> Self {
        Self {
            idempotency_key: uuid::Uuid::new_v4().to_string(),
            installation_id: installation_id.map(|id| id.as_str().to_string()),
        }
    }
}

/// Backend operations used by the pairing flow
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait PairingApi: Send + Sync {
    /// Screens available for explicit selection
    async fn list_screens(&self) -> Result<Vec<ScreenSummary>>;

    /// Submit one pairing request.
    ///
    /// Any HTTP response is `Ok`, whatever its status; `Err` means no verdict
    /// was received.
    async fn pair(&self, request: &PairRequest, meta: &SubmissionMeta) -> Result<PairReply>;
}

#[async_trait]
impl<A: PairingApi + ?Sized> PairingApi for Arc<A> {
    async fn list_screens(&self) -> Result<Vec<ScreenSummary>> {
        (**self).list_screens().await
    }

    async fn pair(&self, request: &PairRequest, meta: &SubmissionMeta) -> Result<PairReply> {
        (**self).pair(request, meta).await
    }
}
