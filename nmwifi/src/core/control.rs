//! Connection control.
//!
//! Drives at most one connection attempt at a time:
//!
//! ```text
//! Idle --connect--> Attempting --activated--> Idle (record: Connected)
//!                    |  ^   \--all candidates failed--> Idle (record: failure)
//!                    |  |    \--timeout--> Idle (record: ConnectionFailed)
//!                    |  '--candidate failed, more left
//!                    '--no BSSID visible yet: wait for one or for the timeout
//! ```
//!
//! A newer `connect` supersedes the pending attempt without recording
//! anything for it; callbacks for superseded activations are ignored
//! because they no longer match the pending attempt.
//!
//! # Candidates
//!
//! Each visible BSSID of the target network is tried strongest first. Without
//! a key every matching saved profile is tried on it, newest first (or a new
//! keyless profile for open networks without one). With a key, matching
//! saved profiles are deleted up front and a new profile carrying the key is
//! used instead. New profiles that fail are deleted again.

use futures_timer::Delay;
use log::{debug, info, warn};
use secrecy::{ExposeSecret, SecretString};
use std::collections::{HashSet, VecDeque};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;

use super::WifiCore;
use super::bridge::job;
use super::saved::apply_saved_data;
use crate::api::models::{
    AccessPoint, ActiveConnectionState, ConnectionError, EventType, connection_state_reason_to_error,
};
use crate::backend::{ConnectionProfile, NativeAccessPoint, SavedConnection};
use crate::util::utils::read_lock;

#[derive(Debug, Clone, PartialEq, Eq)]
enum ProfileChoice {
    Saved(String),
    Fresh,
}

#[derive(Debug, Clone)]
struct Candidate {
    ap_path: String,
    profile: ProfileChoice,
}

#[derive(Debug)]
struct Activation {
    active_path: String,
    /// Profile created for this activation, deleted if it fails.
    created_profile: Option<String>,
}

/// The in-flight connection attempt.
pub(crate) struct PendingAttempt {
    id: u64,
    target: AccessPoint,
    key: Option<SecretString>,
    saved: Vec<SavedConnection>,
    candidates: VecDeque<Candidate>,
    attempted: HashSet<String>,
    current: Option<Activation>,
    last_failure: Option<EventType>,
    timer: Option<JoinHandle<()>>,
}

impl PendingAttempt {
    /// Queues candidates for a newly visible BSSID. Returns `false` if the
    /// BSSID was already known.
    fn push_native(&mut self, native: &NativeAccessPoint) -> bool {
        if !self.attempted.insert(native.path.clone()) {
            return false;
        }
        let before = self.candidates.len();
        if self.key.is_none() {
            for profile in &self.saved {
                self.candidates.push_back(Candidate {
                    ap_path: native.path.clone(),
                    profile: ProfileChoice::Saved(profile.path.clone()),
                });
            }
        }
        if self.key.is_some() || (self.saved.is_empty() && !self.target.requires_key()) {
            self.candidates.push_back(Candidate {
                ap_path: native.path.clone(),
                profile: ProfileChoice::Fresh,
            });
        }
        if self.candidates.len() == before {
            debug!("No usable profile for {} without a key", self.target);
            self.last_failure = Some(EventType::ConnectionAuthFailed);
        }
        true
    }

    fn note_failure(&mut self, event_type: EventType) {
        self.last_failure = Some(event_type);
    }

    fn forget_key(&mut self) {
        self.key = None;
    }
}

impl Drop for PendingAttempt {
    fn drop(&mut self) {
        self.forget_key();
        if let Some(timer) = self.timer.take() {
            timer.abort();
        }
    }
}

impl std::fmt::Debug for PendingAttempt {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PendingAttempt")
            .field("id", &self.id)
            .field("target", &self.target)
            .field("has_key", &self.key.is_some())
            .field("candidates", &self.candidates.len())
            .field("current", &self.current)
            .field("last_failure", &self.last_failure)
            .finish()
    }
}

/// State owned by the control module.
#[derive(Debug, Default)]
pub(crate) struct ConnectionControl {
    pending: Option<PendingAttempt>,
    next_id: u64,
}

impl ConnectionControl {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn is_pending(&self) -> bool {
        self.pending.is_some()
    }

    /// Whether any key is held in memory.
    #[cfg(test)]
    pub(crate) fn holds_key(&self) -> bool {
        self.pending.as_ref().is_some_and(|p| p.key.is_some())
    }

    pub(crate) fn pending_target(&self) -> Option<&AccessPoint> {
        self.pending.as_ref().map(|p| &p.target)
    }

    fn pending_id(&self) -> Option<u64> {
        self.pending.as_ref().map(|p| p.id)
    }

    fn next_id(&mut self) -> u64 {
        self.next_id += 1;
        self.next_id
    }
}

impl WifiCore {
    /// Starts connecting to `target`, superseding any pending attempt. An
    /// empty key counts as no key.
    ///
    /// `target` may be a snapshot of a network that is no longer visible; the
    /// attempt then waits for it to reappear or for the timeout.
    pub(crate) async fn connect_to_access_point(&self, target: AccessPoint, key: Option<SecretString>) {
        let hash = target.hash();
        let mut ap = self.current_snapshot(&target);
        apply_saved_data(&mut ap, &read_lock(&self.saved));
        let key = key.filter(|k| !k.expose_secret().is_empty());

        match &key {
            Some(k) if !ap.is_valid_key_format(k.expose_secret()) => {
                let error = ConnectionError::InvalidKey(ap.security_type());
                warn!("Not connecting to {ap}: {error}");
                return;
            }
            None if ap.requires_key() && !ap.has_saved_connection() => {
                warn!("{ap} needs a key and has no saved connection, not connecting");
                return;
            }
            _ => {}
        }

        let mut control = self.control.lock().await;

        if key.is_none() && control.pending_target() == Some(&ap) {
            debug!("Already connecting to {ap}");
            return;
        }
        let (connected_elsewhere, already_connected) = {
            let record = read_lock(&self.record);
            let active = record.active_ap();
            (
                active
                    .filter(|active| record.is_connected() && *active != &ap)
                    .cloned(),
                record.is_connected() && active == Some(&ap),
            )
        };
        if already_connected {
            debug!("Already connected to {ap}");
            return;
        }

        if let Some(previous) = control.pending.take() {
            debug!("Superseding connection attempt to {}", previous.target);
            self.abandon(previous).await;
        }
        if let Some(previous) = connected_elsewhere {
            debug!("Disconnecting from {previous} before switching to {ap}");
            if let Err(e) = self.backend.disconnect_device().await {
                warn!("Failed to disconnect device: {e}");
            }
            // Device signals for this teardown arrive while the new attempt
            // is pending and are not mirrored into the record.
            self.record_event(EventType::Disconnected, Some(&previous));
        }

        let mut saved = self.saved_profiles_for(&ap);
        if key.is_some() && !saved.is_empty() {
            debug!("Replacing {} saved profile(s) for {ap}", saved.len());
            self.delete_profiles(&saved).await;
            saved.clear();
        }

        let id = control.next_id();
        let timeout = self.config.connection_timeout;
        let mut attempt = PendingAttempt {
            id,
            target: ap.clone(),
            key,
            saved,
            candidates: VecDeque::new(),
            attempted: HashSet::new(),
            current: None,
            last_failure: None,
            timer: Some(self.start_timer(id, timeout)),
        };

        let natives = read_lock(&self.ap_list).natives(&hash);
        for native in &natives {
            attempt.push_native(native);
        }
        info!("Connecting to {}", ap.ssid());
        self.record_event_if_new(EventType::StartedConnecting, Some(&ap));
        control.pending = Some(attempt);

        if natives.is_empty() {
            debug!("{ap} has no visible BSSID, waiting for one");
            if self.config.scan_on_connect {
                self.scan_access_points().await;
            }
            return;
        }
        self.advance(&mut control.pending).await;
    }

    fn start_timer(&self, id: u64, timeout: Duration) -> JoinHandle<()> {
        let jobs = self.jobs.clone();
        tokio::spawn(async move {
            Delay::new(timeout).await;
            jobs.enqueue(job(move |core: Arc<WifiCore>| async move {
                core.on_timeout(id).await;
            }));
        })
    }

    /// Submits candidates until one is in flight or none are left.
    async fn advance(&self, slot: &mut Option<PendingAttempt>) {
        loop {
            let Some(attempt) = slot.as_mut() else {
                return;
            };
            if attempt.current.is_some() {
                return;
            }
            let Some(candidate) = attempt.candidates.pop_front() else {
                if attempt.attempted.is_empty() {
                    debug!("Waiting for {} to become visible", attempt.target);
                    return;
                }
                if let Some(attempt) = slot.take() {
                    self.fail(attempt);
                }
                return;
            };

            match candidate.profile {
                ProfileChoice::Saved(profile_path) => {
                    debug!("Activating saved profile {profile_path} on {}", candidate.ap_path);
                    match self
                        .backend
                        .activate_saved(&profile_path, &candidate.ap_path)
                        .await
                    {
                        Ok(active_path) => {
                            attempt.current = Some(Activation {
                                active_path,
                                created_profile: None,
                            });
                        }
                        Err(e) => {
                            warn!("activate_connection() failed: {e}");
                            attempt.note_failure(e.event_type());
                        }
                    }
                }
                ProfileChoice::Fresh => {
                    let profile = ConnectionProfile {
                        ssid: attempt.target.ssid().clone(),
                        security: attempt.target.security_type(),
                        key: attempt.key.clone(),
                    };
                    debug!("Creating new profile for {} on {}", profile.ssid, candidate.ap_path);
                    match self
                        .backend
                        .add_and_activate(&profile, &candidate.ap_path)
                        .await
                    {
                        Ok(activation) => {
                            attempt.current = Some(Activation {
                                active_path: activation.active_path,
                                created_profile: Some(activation.profile_path),
                            });
                        }
                        Err(e) => {
                            warn!("add_and_activate_connection() failed: {e}");
                            attempt.note_failure(e.event_type());
                        }
                    }
                }
            }
        }
    }

    /// Records the terminal failure of an attempt.
    fn fail(&self, attempt: PendingAttempt) {
        let event_type = attempt
            .last_failure
            .unwrap_or(EventType::ConnectionFailed);
        warn!("Connection to {} failed: {event_type}", attempt.target.ssid());
        self.record_event(event_type, Some(&attempt.target));
    }

    /// Tears down whatever an attempt has in flight. Records nothing.
    async fn abandon(&self, mut attempt: PendingAttempt) {
        attempt.forget_key();
        if let Some(activation) = attempt.current.take() {
            if let Err(e) = self.backend.deactivate(&activation.active_path).await {
                debug!("Deactivating {} failed: {e}", activation.active_path);
            }
            self.delete_created_profile(activation).await;
        }
    }

    async fn delete_created_profile(&self, activation: Activation) {
        if let Some(profile) = activation.created_profile {
            debug!("Deleting failed profile {profile}");
            if let Err(e) = self.backend.delete_saved_connection(&profile).await {
                warn!("Failed to delete connection {profile}: {e}");
            }
        }
    }

    /// Handles a state change of an active connection. Returns `true` if
    /// it belonged to the pending attempt.
    pub(crate) async fn on_activation_state(
        &self,
        path: &str,
        state: ActiveConnectionState,
        reason: u32,
    ) -> bool {
        let mut control = self.control.lock().await;
        let Some(attempt) = control.pending.as_mut() else {
            return false;
        };
        if !attempt
            .current
            .as_ref()
            .is_some_and(|a| a.active_path == path)
        {
            debug!("Ignoring state {state} of unrelated connection {path}");
            return false;
        }

        match state {
            ActiveConnectionState::Activating => {
                let target = attempt.target.clone();
                self.record_event_if_new(EventType::StartedConnecting, Some(&target));
            }
            ActiveConnectionState::Activated => {
                if let Some(attempt) = control.pending.take() {
                    info!("Connected to {}", attempt.target.ssid());
                    self.mark_connected(&attempt.target);
                    self.record_event(EventType::Connected, Some(&attempt.target));
                }
            }
            ActiveConnectionState::Deactivated => {
                let error = connection_state_reason_to_error(reason);
                debug!("Activation of {} failed: {error}", attempt.target);
                attempt.note_failure(error.event_type());
                if let Some(activation) = attempt.current.take() {
                    self.delete_created_profile(activation).await;
                }
                self.advance(&mut control.pending).await;
            }
            _ => {}
        }
        true
    }

    /// Fires when an attempt's deadline passes.
    pub(crate) async fn on_timeout(&self, id: u64) {
        let mut control = self.control.lock().await;
        if control.pending_id() != Some(id) {
            return;
        }
        let Some(mut attempt) = control.pending.take() else {
            return;
        };
        warn!(
            "Connection to {} timed out after {:?}",
            attempt.target.ssid(),
            self.config.connection_timeout
        );
        let target = attempt.target.clone();
        // The timer task is the one running this job.
        attempt.timer = None;
        self.abandon(attempt).await;
        self.record_event(EventType::ConnectionFailed, Some(&target));
    }

    /// Cancels the pending attempt or closes the active connection.
    pub(crate) async fn disconnect(&self) {
        let mut control = self.control.lock().await;
        if let Some(attempt) = control.pending.take() {
            let target = attempt.target.clone();
            info!("Cancelling connection attempt to {}", target.ssid());
            self.abandon(attempt).await;
            self.record_event(EventType::Disconnected, Some(&target));
            return;
        }

        let (active, live) = {
            let record = read_lock(&self.record);
            (
                record.active_ap().cloned(),
                record.is_connected() || record.is_connecting(),
            )
        };
        if !live {
            debug!("Already disconnected");
            return;
        }
        if let Err(e) = self.backend.disconnect_device().await {
            warn!("Failed to disconnect device: {e}");
        }
        info!("Disconnected");
        self.record_event(EventType::Disconnected, active.as_ref());
    }

    /// Resumes an attempt waiting for the network to become visible.
    pub(crate) async fn signal_ap_added(&self, native: &NativeAccessPoint) {
        let mut control = self.control.lock().await;
        let Some(attempt) = control.pending.as_mut() else {
            return;
        };
        if native.hash() != attempt.target.hash() {
            return;
        }
        if attempt.push_native(native) && attempt.current.is_none() {
            debug!("{} became visible at {}", attempt.target, native.path);
            self.advance(&mut control.pending).await;
        }
    }

    /// The radio went off: nothing can be pending or connected any more.
    pub(crate) async fn signal_wifi_disabled(&self) {
        let mut control = self.control.lock().await;
        if let Some(mut attempt) = control.pending.take() {
            debug!("Dropping connection attempt to {}", attempt.target);
            attempt.forget_key();
            if let Some(activation) = attempt.current.take() {
                self.delete_created_profile(activation).await;
            }
        }
        let (active, live) = {
            let record = read_lock(&self.record);
            (
                record.active_ap().cloned(),
                record.is_connected() || record.is_connecting(),
            )
        };
        if live {
            self.record_event(EventType::Disconnected, active.as_ref());
        }
    }

    /// Whether an attempt is in progress.
    pub(crate) async fn attempt_pending(&self) -> bool {
        self.control.lock().await.is_pending()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::models::{ApMode, SecurityType};
    use crate::backend::{ActivationOutcome, MockNetwork};
    use crate::{NotificationQueue, WifiConfig, WifiService};

    fn service(network: &Arc<MockNetwork>, config: WifiConfig) -> WifiService {
        WifiService::start_with_backend(network.clone(), config, NotificationQueue::new()).unwrap()
    }

    fn holds_key(service: &WifiService) -> bool {
        service.core().control.blocking_lock().holds_key()
    }

    fn pending(service: &WifiService) -> bool {
        service.core().control.blocking_lock().is_pending()
    }

    #[test]
    fn key_is_dropped_after_success() {
        let network = MockNetwork::new();
        network.add_access_point("home-net", ApMode::Infrastructure, SecurityType::Wpa, 40);
        network.set_password("home-net", "rightpass");
        network.set_outcome("home-net", ActivationOutcome::Hang);
        let service = service(&network, WifiConfig::default());
        service.flush();

        let ap = service.ap_list().access_points()[0].clone();
        service.connection().connect_to_access_point(&ap, "rightpass");
        service.flush();
        assert!(holds_key(&service));

        network.resolve_pending(ActivationOutcome::Succeed);
        service.flush();
        assert!(!pending(&service));
        assert!(!holds_key(&service));
        assert!(service.record().is_connected());
    }

    #[test]
    fn key_is_dropped_after_failure_and_cancel() {
        let network = MockNetwork::new();
        network.add_access_point("home-net", ApMode::Infrastructure, SecurityType::Wpa, 40);
        network.set_password("home-net", "rightpass");
        let service = service(&network, WifiConfig::default());
        service.flush();
        let ap = service.ap_list().access_points()[0].clone();

        service.connection().connect_to_access_point(&ap, "wrongpass");
        service.flush();
        assert!(!holds_key(&service));
        assert_eq!(
            service.record().latest_event().map(|e| e.event_type()),
            Some(EventType::ConnectionAuthFailed)
        );

        network.set_outcome("home-net", ActivationOutcome::Hang);
        service.connection().connect_to_access_point(&ap, "rightpass");
        service.flush();
        assert!(holds_key(&service));
        service.connection().disconnect();
        service.flush();
        assert!(!holds_key(&service));
        assert!(!pending(&service));
    }

    #[test]
    fn timeout_records_one_failure_and_ignores_late_callback() {
        let network = MockNetwork::new();
        network.add_access_point("slow", ApMode::Infrastructure, SecurityType::Unsecured, 60);
        network.set_outcome("slow", ActivationOutcome::Hang);
        let config = WifiConfig::default().with_connection_timeout(Duration::from_millis(50));
        let service = service(&network, config);
        service.flush();
        let ap = service.ap_list().access_points()[0].clone();

        service.connection().connect_to_access_point(&ap, "");
        service.flush();
        let active_path = network.pending_activation().unwrap();
        assert!(service.record().is_connecting());

        std::thread::sleep(Duration::from_millis(300));
        service.flush();
        assert!(!pending(&service));
        let failures = service
            .record()
            .events()
            .iter()
            .filter(|e| e.event_type() == EventType::ConnectionFailed)
            .count();
        assert_eq!(failures, 1);

        network.emit_activation_state(&active_path, ActiveConnectionState::Activated, 1);
        service.flush();
        assert!(!service.record().is_connected());
        assert_eq!(
            service.record().latest_event().map(|e| e.event_type()),
            Some(EventType::ConnectionFailed)
        );
    }

    #[test]
    fn newer_connect_supersedes_without_recording_it() {
        let network = MockNetwork::new();
        network.add_access_point("first", ApMode::Infrastructure, SecurityType::Unsecured, 60);
        network.add_access_point("second", ApMode::Infrastructure, SecurityType::Unsecured, 50);
        network.set_outcome("first", ActivationOutcome::Hang);
        let service = service(&network, WifiConfig::default());
        service.flush();
        let first = service
            .ap_list()
            .access_points()
            .into_iter()
            .find(|ap| ap.ssid().to_string() == "first")
            .unwrap();
        let second = service
            .ap_list()
            .access_points()
            .into_iter()
            .find(|ap| ap.ssid().to_string() == "second")
            .unwrap();

        service.connection().connect_to_access_point(&first, "");
        service.flush();
        let stale = network.pending_activation().unwrap();

        service.connection().connect_to_access_point(&second, "");
        service.flush();
        assert_eq!(service.record().active_ap(), Some(second.clone()));
        assert!(service.record().is_connected());

        // A late report for the superseded activation changes nothing.
        network.emit_activation_state(&stale, ActiveConnectionState::Activated, 1);
        service.flush();
        assert_eq!(service.record().active_ap(), Some(second));
        let first_events: Vec<EventType> = service
            .record()
            .events()
            .iter()
            .filter(|e| e.is_for(&first))
            .map(|e| e.event_type())
            .collect();
        assert_eq!(first_events, [EventType::StartedConnecting]);
    }
}
