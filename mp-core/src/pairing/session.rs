//! Pairing session: form input, state machine and submission

use parking_lot::Mutex;
use tracing::{debug, info, warn};

use mp_protocol::{normalize_public_code, PairRequest, ScreenSummary};

use super::{PairingApi, SubmissionMeta};
use crate::error::{MenupiError, Result};
use crate::identity::InstallationId;
use crate::outcome::{interpret, PairingOutcome};

/// Current state of a pairing session
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum PairingState {
    #[default]
    Unbound,
    Submitting,
    Bound {
        screen_name: Option<String>,
        message: Option<String>,
    },
    /// Last attempt failed; the form is kept and may be resubmitted
    Failed { message: String },
}

impl PairingState {
    /// Whether a new submission may start from this state
    pub fn accepts_submission(&self) -> bool {
        matches!(self, Self::Unbound | Self::Failed { .. })
    }
}

/// Operator input: a screen selection and/or a typed code
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct PairingForm {
    pub selected_screen_id: Option<String>,
    /// Stored normalized: trimmed and upper-case
    pub public_code: Option<String>,
}

impl PairingForm {
    pub fn select_screen(&mut self, screen_id: Option<&str>) {
        self.selected_screen_id = screen_id
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_string);
    }

    pub fn set_code(&mut self, raw: &str) {
        self.public_code = normalize_public_code(raw);
    }

    /// A screen is selected or a non-empty code was entered
    pub fn can_submit(&self) -> bool {
        self.selected_screen_id.is_some() || self.public_code.is_some()
    }

    pub fn to_request(&self, device_id: &str) -> PairRequest {
        PairRequest::new(
            device_id,
            self.selected_screen_id.as_deref(),
            self.public_code.as_deref(),
        )
    }
}

/// Drives one client's pairing flow against a [`PairingApi`]
pub struct PairingSession<A> {
    api: A,
    installation_id: Option<InstallationId>,
    state: Mutex<PairingState>,
    form: Mutex<PairingForm>,
    screens: Mutex<Vec<ScreenSummary>>,
}

impl<A: PairingApi> PairingSession<A> {
    pub fn new(api: A) -> Self {
        Self {
            api,
            installation_id: None,
            state: Mutex::new(PairingState::Unbound),
            form: Mutex::new(PairingForm::default()),
            screens: Mutex::new(Vec::new()),
        }
    }

    /// Send this installation id with every submission
    pub fn with_installation_id(mut self, installation_id: InstallationId) -> Self {
        self.installation_id = Some(installation_id);
        self
    }

    pub fn api(&self) -> &A {
        &self.api
    }

    pub fn state(&self) -> PairingState {
        self.state.lock().clone()
    }

    pub fn form(&self) -> PairingForm {
        self.form.lock().clone()
    }

    pub fn screens(&self) -> Vec<ScreenSummary> {
        self.screens.lock().clone()
    }

    pub fn select_screen(&self, screen_id: Option<&str>) {
        self.form.lock().select_screen(screen_id);
    }

    pub fn set_code(&self, raw: &str) {
        self.form.lock().set_code(raw);
    }

    /// Whether the submit control should be enabled
    pub fn can_submit(&self) -> bool {
        self.form.lock().can_submit() && self.state.lock().accepts_submission()
    }

    /// Populate the screen selector. On failure the selector is left empty.
    pub async fn load_screens(&self) -> Result<Vec<ScreenSummary>> {
        match self.api.list_screens().await {
            Ok(screens) => {
                *self.screens.lock() = screens.clone();
                Ok(screens)
            }
            Err(e) => {
                warn!(error = %e, "Failed to load screens");
                self.screens.lock().clear();
                Err(e)
            }
        }
    }

    /// Back to Unbound; the form is kept
    pub fn reset(&self) {
        *self.state.lock() = PairingState::Unbound;
    }

    /// Submit the current form on behalf of `device_id`.
    ///
    /// `device_id` is an opaque token, usually the device uid. Returns
    /// `PairingPrecondition` without touching the network when the form names
    /// no target, and `SubmissionInFlight` while another submit is pending.
    pub async fn submit(&self, device_id: &str) -> Result<PairingOutcome> {
        let request = self.form.lock().to_request(device_id);
        if !request.has_target() {
            return Err(MenupiError::PairingPrecondition);
        }

        {
            let mut state = self.state.lock();
            match &*state {
                PairingState::Submitting => return Err(MenupiError::SubmissionInFlight),
                PairingState::Bound { .. } => {
                    return Err(MenupiError::generic(
                        "Device is already paired; reset the session to pair again",
                    ))
                }
                PairingState::Unbound | PairingState::Failed { .. } => {}
            }

            if let Err(reason) = request.validate() {
                debug!(reason = %reason, "Pairing request failed local validation");
                let outcome = PairingOutcome::failed(reason);
                *state = outcome_state(&outcome);
                return Ok(outcome);
            }
            *state = PairingState::Submitting;
        }

        let guard = InFlight { state: &self.state };
        let meta = SubmissionMeta::new(self.installation_id.as_ref());

        let outcome = match self.api.pair(&request, &meta).await {
            Ok(reply) => interpret(&reply),
            Err(e) => {
                warn!(error = %e, "Pairing request did not complete");
                PairingOutcome::network_failure()
            }
        };

        if outcome.success {
            info!(screen = ?outcome.bound_screen_name, "Device paired");
        } else {
            info!(error = ?outcome.error_message, "Pairing failed");
        }
        guard.finish(outcome_state(&outcome));
        Ok(outcome)
    }
}

fn outcome_state(outcome: &PairingOutcome) -> PairingState {
    if outcome.success {
        PairingState::Bound {
            screen_name: outcome.bound_screen_name.clone(),
            message: outcome.message.clone(),
        }
    } else {
        PairingState::Failed {
            message: outcome.error_message.clone().unwrap_or_default(),
        }
    }
}

/// Leaves Submitting when dropped, so a cancelled submit never wedges the session
struct InFlight<'a> {
    state: &'a Mutex<PairingState>,
}

impl InFlight<'_> {
    fn finish(self, next: PairingState) {
        *self.state.lock() = next;
        std::mem::forget(self);
    }
}

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        let mut state = self.state.lock();
        if *state == PairingState::Submitting {
            *state = PairingState::Unbound;
        }
    }
}
