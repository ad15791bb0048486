/*
 * End-to-end identity and pairing scenarios
 *
 * These tests wire the probe, hasher, identity store and pairing session
 * together the way a display client does, with a recording fake backend.
 */

use async_trait::async_trait;
use mp_core::constants::storage::{DEVICE_UID_KEY, INSTALLATION_ID_KEY};
use mp_core::{
    DigestBackend, FeatureVector, FileStore, IdentityHasher, IdentityStore, KeyValueStore,
    MemoryStore, OutcomeDisplay, PairReply, PairRequest, PairResponseBody, PairingApi,
    PairingSession, PairingState, Result, ScreenSummary, StaticProbe, SubmissionMeta,
};
use parking_lot::Mutex;
use std::sync::Arc;
use tempfile::TempDir;

/// Fake backend that records every pairing request and answers with a canned reply
struct RecordingApi {
    status: u16,
    body: &'static str,
    calls: Mutex<Vec<(PairRequest, SubmissionMeta)>>,
}

impl RecordingApi {
    fn replying(status: u16, body: &'static str) -> Self {
        Self {
            status,
            body,
            calls: Mutex::new(Vec::new()),
        }
    }

    fn calls(&self) -> Vec<(PairRequest, SubmissionMeta)> {
        self.calls.lock().clone()
    }
}

#[async_trait]
impl PairingApi for RecordingApi {
    async fn list_screens(&self) -> Result<Vec<ScreenSummary>> {
        Ok(vec![ScreenSummary {
            id: "scr_patio".to_string(),
            name: "Patio Screen".to_string(),
        }])
    }

    async fn pair(&self, request: &PairRequest, meta: &SubmissionMeta) -> Result<PairReply> {
        self.calls.lock().push((request.clone(), meta.clone()));
        Ok(PairReply {
            status: self.status,
            body: PairResponseBody::from_body(self.body),
        })
    }
}

fn tv_features() -> FeatureVector {
    FeatureVector {
        user_agent: "Mozilla/5.0 (Linux; Android 11; BRAVIA 4K VH2) AppleWebKit/537.36".to_string(),
        platform: "Linux armv8l".to_string(),
        hardware_concurrency: 4,
        device_memory: 2.0,
        max_touch_points: 0,
        screen_width: 1920,
        screen_height: 1080,
        screen_color_depth: 24,
        screen_pixel_depth: 24,
        rendering_backend_fingerprint: "ARM~Mali-G52~OpenGL ES 3.2".to_string(),
    }
}

#[test]
fn fresh_client_gets_same_hex_uid_twice() {
    let dir = TempDir::new().unwrap();
    let store = FileStore::new(dir.path().join("storage.json"));
    let ids = IdentityStore::new(store, StaticProbe(tv_features()));

    let first = ids.device_uid();
    let second = ids.device_uid();

    assert_eq!(first, second);
    assert_eq!(first.as_str().len(), 64);
    assert!(first.as_str().chars().all(|c| matches!(c, '0'..='9' | 'a'..='f')));

    // Survives a restart with the same storage
    let reopened = IdentityStore::new(
        FileStore::new(dir.path().join("storage.json")),
        StaticProbe(tv_features()),
    );
    assert_eq!(reopened.device_uid(), first);
}

#[test]
fn rolling_hash_fallback_is_repeatable() {
    let hasher = IdentityHasher::with_backend(DigestBackend::Unavailable);
    let a = hasher.derive(&tv_features());
    let b = hasher.derive(&tv_features());

    assert_eq!(a, b);
    assert!(!a.as_str().is_empty());
    assert!(a.as_str().chars().all(|c| c.is_ascii_digit() || c.is_ascii_lowercase()));
}

#[test]
fn reinstall_keeps_device_uid_but_not_installation_id() {
    let store = Arc::new(MemoryStore::new());
    let ids = IdentityStore::new(store.clone(), StaticProbe(tv_features()));
    let identity = ids.identity();
    assert_eq!(store.get(INSTALLATION_ID_KEY).unwrap().as_deref(), Some(identity.installation_id.as_str()));

    // Fresh install: all local state gone
    store.remove(DEVICE_UID_KEY).unwrap();
    store.remove(INSTALLATION_ID_KEY).unwrap();

    let reinstalled = IdentityStore::new(store.clone(), StaticProbe(tv_features())).identity();
    assert_eq!(reinstalled.device_uid, identity.device_uid);
    assert_ne!(reinstalled.installation_id, identity.installation_id);
    assert!(reinstalled.installation_id.is_uuid_v4_shaped());
}

#[tokio::test]
async fn code_pairing_binds_to_patio_screen() {
    let api = Arc::new(RecordingApi::replying(
        200,
        r#"{"message":"This TV is now connected to Patio Screen"}"#,
    ));
    let ids = IdentityStore::new(MemoryStore::new(), StaticProbe(tv_features()));
    let session = PairingSession::new(api.clone()).with_installation_id(ids.installation_id());

    session.set_code("1A2B3C");
    let uid = ids.device_uid();
    let outcome = session.submit(uid.as_str()).await.unwrap();

    assert!(outcome.success);
    assert_eq!(outcome.bound_screen_name.as_deref(), Some("Patio Screen"));
    assert!(matches!(session.state(), PairingState::Bound { .. }));
    assert!(matches!(
        outcome.display(),
        OutcomeDisplay::Connected { ref screen_name, .. } if screen_name == "Patio Screen"
    ));

    let calls = api.calls();
    assert_eq!(calls.len(), 1);
    assert_eq!(calls[0].0.device_id, uid.as_str());
    assert_eq!(calls[0].0.public_code.as_deref(), Some("1A2B3C"));
    assert!(calls[0].1.installation_id.is_some());
}

#[tokio::test]
async fn empty_form_blocks_submission() {
    let api = Arc::new(RecordingApi::replying(200, r#"{"message":"unused"}"#));
    let session = PairingSession::new(api.clone());

    assert!(!session.can_submit());
    assert!(session.submit("any-token").await.is_err());
    assert!(api.calls().is_empty());
}

#[tokio::test]
async fn already_paired_screen_shows_error_verbatim() {
    let api = Arc::new(RecordingApi::replying(409, r#"{"error":"Screen already paired"}"#));
    let session = PairingSession::new(api.clone());

    let screens = session.load_screens().await.unwrap();
    session.select_screen(Some(&screens[0].id));
    let outcome = session.submit("tok").await.unwrap();

    assert!(!outcome.success);
    assert_eq!(
        session.state(),
        PairingState::Failed {
            message: "Screen already paired".to_string()
        }
    );
    assert_eq!(
        outcome.display(),
        OutcomeDisplay::Error("Screen already paired".to_string())
    );
    assert_eq!(api.calls()[0].0.screen_id.as_deref(), Some("scr_patio"));
}

#[tokio::test]
async fn each_submit_carries_a_fresh_idempotency_key() {
    let api = Arc::new(RecordingApi::replying(400, r#"{"error":"Invalid code"}"#));
    let session = PairingSession::new(api.clone());

    session.set_code("ZZZZZZ");
    session.submit("tok").await.unwrap();
    session.submit("tok").await.unwrap();

    let calls = api.calls();
    assert_eq!(calls.len(), 2);
    assert_ne!(calls[0].1.idempotency_key, calls[1].1.idempotency_key);
}
