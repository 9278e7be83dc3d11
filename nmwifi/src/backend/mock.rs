//! In-memory network stack.
//!
//! [`MockNetwork`] behaves like a single-radio NetworkManager: it keeps a
//! set of visible BSSIDs and saved profiles, evaluates activation requests
//! against configured passwords and emits the same event sequences the real
//! stack does. Tests drive it from their own thread while the service runs
//! its network thread against it.

use async_trait::async_trait;
use futures::StreamExt;
use futures::channel::mpsc::{UnboundedSender, unbounded};
use futures::stream::BoxStream;
use log::debug;
use secrecy::ExposeSecret;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::SystemTime;

use super::{
    ActiveConnectionInfo, ConnectionProfile, NativeAccessPoint, NetworkBackend, NetworkEvent,
    NewActivation, SavedConnection,
};
use crate::Result;
use crate::api::models::{
    ActiveConnectionState, ApMode, ConnectionError, DeviceState, SecurityType, Ssid,
};
use crate::types::constants::{connection_reason, device_reason, device_state};
use crate::util::utils::mutex_lock;

/// How the mock resolves an activation request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActivationOutcome {
    /// The connection activates.
    Succeed,
    /// The supplicant rejects the key.
    FailAuth,
    /// Activation fails for a reason unrelated to credentials.
    Fail,
    /// No result is reported until [`MockNetwork::resolve_pending`] is called.
    Hang,
}

#[derive(Debug, Clone)]
struct MockActivation {
    path: String,
    ap_path: String,
    profile_path: String,
}

#[derive(Default)]
struct MockState {
    device_present: bool,
    enabled: bool,
    access_points: Vec<NativeAccessPoint>,
    saved: Vec<SavedConnection>,
    profile_keys: HashMap<String, Option<String>>,
    passwords: HashMap<Ssid, String>,
    outcomes: HashMap<Ssid, ActivationOutcome>,
    active: Option<MockActivation>,
    pending: Vec<MockActivation>,
    subscribers: Vec<UnboundedSender<NetworkEvent>>,
    next_id: u64,
    scan_requests: usize,
    activation_requests: usize,
    deleted_profiles: Vec<String>,
}

impl MockState {
    fn next_id(&mut self) -> u64 {
        self.next_id += 1;
        self.next_id
    }

    fn emit(&mut self, event: NetworkEvent) {
        debug!("mock emits {event:?}");
        self.subscribers
            .retain(|tx| tx.unbounded_send(event.clone()).is_ok());
    }

    fn emit_device(&mut self, new_state: u32, old_state: u32, reason: u32) {
        self.emit(NetworkEvent::DeviceStateChanged {
            new_state: DeviceState::from(new_state),
            old_state: DeviceState::from(old_state),
            reason,
        });
    }

    fn emit_activation(&mut self, path: &str, state: ActiveConnectionState, reason: u32) {
        self.emit(NetworkEvent::ActivationStateChanged {
            path: path.to_string(),
            state,
            reason,
        });
    }

    fn ssid_of(&self, ap_path: &str) -> Option<Ssid> {
        self.access_points
            .iter()
            .find(|ap| ap.path == ap_path)
            .map(|ap| ap.ssid.clone())
    }

    fn outcome_for(&self, ssid: &Ssid, security: SecurityType, key: Option<&str>) -> ActivationOutcome {
        if let Some(outcome) = self.outcomes.get(ssid) {
            return *outcome;
        }
        match self.passwords.get(ssid) {
            Some(expected) if security.secured() && key != Some(expected.as_str()) => {
                ActivationOutcome::FailAuth
            }
            _ => ActivationOutcome::Succeed,
        }
    }

    /// Stops whatever is currently active or activating, as NetworkManager
    /// does before activating something new on the same device.
    fn tear_down(&mut self, reason: u32) {
        let pending = std::mem::take(&mut self.pending);
        for activation in pending {
            self.emit_activation(&activation.path, ActiveConnectionState::Deactivated, reason);
        }
        if let Some(active) = self.active.take() {
            self.emit_device(device_state::DEACTIVATING, device_state::ACTIVATED, device_reason::USER_REQUESTED);
            self.emit_activation(&active.path, ActiveConnectionState::Deactivated, reason);
            self.emit_device(device_state::DISCONNECTED, device_state::DEACTIVATING, device_reason::USER_REQUESTED);
        }
    }

    fn start_activation(&mut self, activation: MockActivation, outcome: ActivationOutcome) {
        self.activation_requests += 1;
        self.tear_down(connection_reason::NONE);
        self.emit_activation(&activation.path, ActiveConnectionState::Activating, connection_reason::NONE);
        self.emit_device(device_state::PREPARE, device_state::DISCONNECTED, device_reason::NONE);
        if outcome == ActivationOutcome::Hang {
            self.pending.push(activation);
        } else {
            self.finish_activation(activation, outcome);
        }
    }

    fn finish_activation(&mut self, activation: MockActivation, outcome: ActivationOutcome) {
        match outcome {
            ActivationOutcome::Succeed | ActivationOutcome::Hang => {
                self.emit_activation(&activation.path, ActiveConnectionState::Activated, connection_reason::NONE);
                self.emit_device(device_state::ACTIVATED, device_state::CONFIG, device_reason::NONE);
                let now = SystemTime::now();
                if let Some(saved) = self
                    .saved
                    .iter_mut()
                    .find(|s| s.path == activation.profile_path)
                {
                    saved.last_connected = Some(now);
                }
                self.active = Some(activation);
            }
            ActivationOutcome::FailAuth => {
                self.emit_device(device_state::FAILED, device_state::CONFIG, device_reason::NO_SECRETS);
                self.emit_activation(&activation.path, ActiveConnectionState::Deactivated, connection_reason::NO_SECRETS);
                self.emit_device(device_state::DISCONNECTED, device_state::FAILED, device_reason::NONE);
            }
            ActivationOutcome::Fail => {
                self.emit_device(device_state::FAILED, device_state::CONFIG, device_reason::SSID_NOT_FOUND);
                self.emit_activation(
                    &activation.path,
                    ActiveConnectionState::Deactivated,
                    connection_reason::DEVICE_DISCONNECTED,
                );
                self.emit_device(device_state::DISCONNECTED, device_state::FAILED, device_reason::NONE);
            }
        }
    }
}

/// A scriptable, in-memory Wi-Fi stack.
///
/// # Example
///
/// ```
/// use nmwifi::{ApMode, MockNetwork, NotificationQueue, SecurityType, WifiConfig, WifiService};
///
/// let network = MockNetwork::new();
/// network.add_access_point("home-net", ApMode::Infrastructure, SecurityType::Wpa, 40);
///
/// let service = WifiService::start_with_backend(
///     network.clone(),
///     WifiConfig::default(),
///     NotificationQueue::new(),
/// )
/// .unwrap();
/// service.flush();
/// assert_eq!(service.ap_list().access_points().len(), 1);
/// ```
pub struct MockNetwork {
    state: Mutex<MockState>,
}

impl MockNetwork {
    /// A network with one enabled Wi-Fi device and nothing in range.
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            state: Mutex::new(MockState {
                device_present: true,
                enabled: true,
                ..MockState::default()
            }),
        })
    }

    /// A system without any Wi-Fi hardware.
    pub fn without_device() -> Arc<Self> {
        Arc::new(Self {
            state: Mutex::new(MockState::default()),
        })
    }

    /// Plugs or unplugs the Wi-Fi device.
    pub fn set_device_present(&self, present: bool) {
        let mut state = mutex_lock(&self.state);
        state.device_present = present;
        if !present {
            state.tear_down(connection_reason::DEVICE_DISCONNECTED);
            state.access_points.clear();
        }
        state.emit(NetworkEvent::DevicesChanged);
    }

    /// Flips the radio as if another program had done it.
    pub fn set_radio(&self, enabled: bool) {
        let mut state = mutex_lock(&self.state);
        Self::apply_radio(&mut state, enabled);
    }

    fn apply_radio(state: &mut MockState, enabled: bool) {
        if state.enabled == enabled {
            return;
        }
        state.enabled = enabled;
        if !enabled {
            state.tear_down(connection_reason::DEVICE_DISCONNECTED);
            let removed: Vec<String> = state.access_points.drain(..).map(|ap| ap.path).collect();
            for path in removed {
                state.emit(NetworkEvent::AccessPointRemoved { path });
            }
        }
        state.emit(NetworkEvent::WirelessEnabledChanged(enabled));
    }

    /// Makes a BSSID visible. Returns its object path.
    ///
    /// While the radio is off the BSSID is only reported by the next scan
    /// after it comes back on.
    pub fn add_access_point(
        &self,
        ssid: impl Into<Ssid>,
        mode: ApMode,
        security: SecurityType,
        strength: u8,
    ) -> String {
        let mut state = mutex_lock(&self.state);
        let id = state.next_id();
        let ap = NativeAccessPoint {
            path: format!("/org/freedesktop/NetworkManager/AccessPoint/{id}"),
            bssid: format!("02:00:00:00:{:02x}:{:02x}", (id >> 8) & 0xff, id & 0xff),
            ssid: ssid.into(),
            mode,
            security,
            strength: strength.min(100),
        };
        let path = ap.path.clone();
        state.access_points.push(ap.clone());
        if state.device_present && state.enabled {
            state.emit(NetworkEvent::AccessPointAdded(ap));
        }
        path
    }

    /// Makes a BSSID invisible. An activation still waiting on it fails.
    pub fn remove_access_point(&self, path: &str) {
        let mut state = mutex_lock(&self.state);
        state.access_points.retain(|ap| ap.path != path);
        let (lost, kept): (Vec<_>, Vec<_>) = std::mem::take(&mut state.pending)
            .into_iter()
            .partition(|a| a.ap_path == path);
        state.pending = kept;
        state.emit(NetworkEvent::AccessPointRemoved {
            path: path.to_string(),
        });
        for activation in lost {
            state.finish_activation(activation, ActivationOutcome::Fail);
        }
    }

    /// Changes the signal strength of a BSSID.
    pub fn set_strength(&self, path: &str, strength: u8) {
        let mut state = mutex_lock(&self.state);
        if let Some(ap) = state.access_points.iter_mut().find(|ap| ap.path == path) {
            ap.strength = strength.min(100);
            state.emit(NetworkEvent::SignalStrengthChanged {
                path: path.to_string(),
                strength: strength.min(100),
            });
        }
    }

    /// Sets the key the network accepts.
    pub fn set_password(&self, ssid: impl Into<Ssid>, key: &str) {
        mutex_lock(&self.state)
            .passwords
            .insert(ssid.into(), key.to_string());
    }

    /// Forces the outcome of every activation on a network.
    pub fn set_outcome(&self, ssid: impl Into<Ssid>, outcome: ActivationOutcome) {
        mutex_lock(&self.state).outcomes.insert(ssid.into(), outcome);
    }

    /// Stores a profile as if it had been created earlier. Returns its path.
    pub fn add_saved_connection(
        &self,
        ssid: impl Into<Ssid>,
        security: SecurityType,
        key: Option<&str>,
        last_connected: Option<SystemTime>,
    ) -> String {
        let mut state = mutex_lock(&self.state);
        let id = state.next_id();
        let path = format!("/org/freedesktop/NetworkManager/Settings/{id}");
        state.saved.push(SavedConnection {
            path: path.clone(),
            ssid: ssid.into(),
            security,
            last_connected,
        });
        state
            .profile_keys
            .insert(path.clone(), key.map(str::to_string));
        state.emit(NetworkEvent::SavedConnectionsChanged);
        path
    }

    /// Resolves the oldest hanging activation. Returns `false` if none was
    /// waiting.
    pub fn resolve_pending(&self, outcome: ActivationOutcome) -> bool {
        let mut state = mutex_lock(&self.state);
        if state.pending.is_empty() {
            return false;
        }
        let activation = state.pending.remove(0);
        state.finish_activation(activation, outcome);
        true
    }

    /// Reports a state change for an arbitrary active connection path,
    /// including ones the mock already forgot about.
    pub fn emit_activation_state(&self, path: &str, state: ActiveConnectionState, reason: u32) {
        mutex_lock(&self.state).emit_activation(path, state, reason);
    }

    /// Drops the established connection as if the peer went away.
    pub fn drop_connection(&self) {
        mutex_lock(&self.state).tear_down(connection_reason::DEVICE_DISCONNECTED);
    }

    /// Activates a BSSID the way another client (nmcli, a settings applet)
    /// would, without going through the service. Returns the active
    /// connection path.
    pub fn activate_elsewhere(&self, ap_path: &str, outcome: ActivationOutcome) -> String {
        let mut state = mutex_lock(&self.state);
        let id = state.next_id();
        let activation = MockActivation {
            path: format!("/org/freedesktop/NetworkManager/ActiveConnection/{id}"),
            ap_path: ap_path.to_string(),
            profile_path: format!("/org/freedesktop/NetworkManager/Settings/{id}"),
        };
        let path = activation.path.clone();
        state.start_activation(activation, outcome);
        path
    }

    /// Saved profiles currently stored.
    pub fn saved_profiles(&self) -> Vec<SavedConnection> {
        mutex_lock(&self.state).saved.clone()
    }

    /// Number of scan requests received.
    pub fn scan_requests(&self) -> usize {
        mutex_lock(&self.state).scan_requests
    }

    /// Number of activation requests received.
    pub fn activation_requests(&self) -> usize {
        mutex_lock(&self.state).activation_requests
    }

    /// Paths of profiles deleted so far.
    pub fn deleted_profiles(&self) -> Vec<String> {
        mutex_lock(&self.state).deleted_profiles.clone()
    }

    /// Whether the radio is on.
    pub fn radio_enabled(&self) -> bool {
        mutex_lock(&self.state).enabled
    }

    /// Path of the connected BSSID, if any.
    pub fn connected_access_point(&self) -> Option<String> {
        mutex_lock(&self.state)
            .active
            .as_ref()
            .map(|a| a.ap_path.clone())
    }

    /// Path of the most recent activation still waiting for a result.
    pub fn pending_activation(&self) -> Option<String> {
        mutex_lock(&self.state)
            .pending
            .last()
            .map(|a| a.path.clone())
    }

    fn require_radio(state: &MockState) -> Result<()> {
        if !state.device_present {
            Err(ConnectionError::NoWifiDevice)
        } else if !state.enabled {
            Err(ConnectionError::Stuck("wireless disabled".into()))
        } else {
            Ok(())
        }
    }
}

#[async_trait]
impl NetworkBackend for MockNetwork {
    async fn wifi_device_exists(&self) -> Result<bool> {
        Ok(mutex_lock(&self.state).device_present)
    }

    async fn wireless_enabled(&self) -> Result<bool> {
        let state = mutex_lock(&self.state);
        Ok(state.device_present && state.enabled)
    }

    async fn set_wireless_enabled(&self, enabled: bool) -> Result<()> {
        let mut state = mutex_lock(&self.state);
        if !state.device_present {
            return Err(ConnectionError::NoWifiDevice);
        }
        Self::apply_radio(&mut state, enabled);
        Ok(())
    }

    async fn request_scan(&self) -> Result<()> {
        let mut state = mutex_lock(&self.state);
        Self::require_radio(&state)?;
        state.scan_requests += 1;
        Ok(())
    }

    async fn access_points(&self) -> Result<Vec<NativeAccessPoint>> {
        let state = mutex_lock(&self.state);
        if !state.device_present || !state.enabled {
            return Ok(Vec::new());
        }
        Ok(state.access_points.clone())
    }

    async fn saved_connections(&self) -> Result<Vec<SavedConnection>> {
        Ok(mutex_lock(&self.state).saved.clone())
    }

    async fn delete_saved_connection(&self, path: &str) -> Result<()> {
        let mut state = mutex_lock(&self.state);
        let before = state.saved.len();
        state.saved.retain(|s| s.path != path);
        if state.saved.len() == before {
            return Err(ConnectionError::NoSavedConnection);
        }
        state.profile_keys.remove(path);
        state.deleted_profiles.push(path.to_string());
        state.emit(NetworkEvent::SavedConnectionsChanged);
        Ok(())
    }

    async fn activate_saved(&self, profile_path: &str, ap_path: &str) -> Result<String> {
        let mut state = mutex_lock(&self.state);
        Self::require_radio(&state)?;
        let ssid = state.ssid_of(ap_path).ok_or(ConnectionError::NotFound)?;
        let saved = state
            .saved
            .iter()
            .find(|s| s.path == profile_path)
            .cloned()
            .ok_or(ConnectionError::NoSavedConnection)?;
        let key = state.profile_keys.get(profile_path).cloned().flatten();
        let outcome = state.outcome_for(&ssid, saved.security, key.as_deref());

        let id = state.next_id();
        let activation = MockActivation {
            path: format!("/org/freedesktop/NetworkManager/ActiveConnection/{id}"),
            ap_path: ap_path.to_string(),
            profile_path: profile_path.to_string(),
        };
        let path = activation.path.clone();
        state.start_activation(activation, outcome);
        Ok(path)
    }

    async fn add_and_activate(
        &self,
        profile: &ConnectionProfile,
        ap_path: &str,
    ) -> Result<NewActivation> {
        let mut state = mutex_lock(&self.state);
        Self::require_radio(&state)?;
        let ssid = state.ssid_of(ap_path).ok_or(ConnectionError::NotFound)?;
        let key = profile.key.as_ref().map(|k| k.expose_secret().to_string());
        let outcome = state.outcome_for(&ssid, profile.security, key.as_deref());

        let id = state.next_id();
        let profile_path = format!("/org/freedesktop/NetworkManager/Settings/{id}");
        state.saved.push(SavedConnection {
            path: profile_path.clone(),
            ssid: profile.ssid.clone(),
            security: profile.security,
            last_connected: None,
        });
        state.profile_keys.insert(profile_path.clone(), key);
        state.emit(NetworkEvent::SavedConnectionsChanged);

        let activation = MockActivation {
            path: format!("/org/freedesktop/NetworkManager/ActiveConnection/{id}"),
            ap_path: ap_path.to_string(),
            profile_path: profile_path.clone(),
        };
        let active_path = activation.path.clone();
        state.start_activation(activation, outcome);
        Ok(NewActivation {
            profile_path,
            active_path,
        })
    }

    async fn deactivate(&self, active_path: &str) -> Result<()> {
        let mut state = mutex_lock(&self.state);
        if let Some(idx) = state.pending.iter().position(|a| a.path == active_path) {
            state.pending.remove(idx);
            state.emit_activation(
                active_path,
                ActiveConnectionState::Deactivated,
                connection_reason::USER_DISCONNECTED,
            );
            state.emit_device(device_state::DISCONNECTED, device_state::CONFIG, device_reason::USER_REQUESTED);
            return Ok(());
        }
        if state.active.as_ref().is_some_and(|a| a.path == active_path) {
            state.tear_down(connection_reason::USER_DISCONNECTED);
            return Ok(());
        }
        Err(ConnectionError::NotFound)
    }

    async fn disconnect_device(&self) -> Result<()> {
        let mut state = mutex_lock(&self.state);
        if !state.device_present {
            return Err(ConnectionError::NoWifiDevice);
        }
        state.tear_down(connection_reason::USER_DISCONNECTED);
        Ok(())
    }

    async fn active_connection(&self) -> Result<Option<ActiveConnectionInfo>> {
        let state = mutex_lock(&self.state);
        if let Some(active) = &state.active {
            return Ok(Some(ActiveConnectionInfo {
                path: active.path.clone(),
                access_point_path: Some(active.ap_path.clone()),
                state: ActiveConnectionState::Activated,
            }));
        }
        Ok(state.pending.last().map(|pending| ActiveConnectionInfo {
            path: pending.path.clone(),
            access_point_path: Some(pending.ap_path.clone()),
            state: ActiveConnectionState::Activating,
        }))
    }

    async fn subscribe(&self) -> Result<BoxStream<'static, NetworkEvent>> {
        let (tx, rx) = unbounded();
        mutex_lock(&self.state).subscribers.push(tx);
        Ok(rx.boxed())
    }
}
