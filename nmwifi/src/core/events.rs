//! Routing of backend signals to the modules.

use futures::StreamExt;
use futures::stream::BoxStream;
use log::debug;
use std::sync::Arc;

use super::WifiCore;
use super::bridge::{Job, job};
use crate::Result;
use crate::api::models::{AccessPoint, DeviceState, EventType, reason_to_error};
use crate::backend::NetworkEvent;
use crate::util::utils::read_lock;

impl WifiCore {
    /// Subscribes to the backend and loads the initial state of every
    /// module. Runs on the network thread before any other job.
    ///
    /// The subscription is made first so that nothing that happens while
    /// loading is missed.
    pub(crate) async fn initialize(&self) -> Result<BoxStream<'static, Job<WifiCore>>> {
        let events = self.backend.subscribe().await?;

        let status = self.update_device_state(false).await;
        self.reload_saved_connections().await;
        if status.enabled {
            self.reload_access_points().await;
        }
        self.seed_record().await;
        debug!(
            "Core initialized: {status:?}, {} access point(s)",
            read_lock(&self.ap_list).len()
        );

        Ok(events
            .map(|event| job(move |core: Arc<WifiCore>| async move { core.handle_event(event).await }))
            .boxed())
    }

    pub(crate) async fn handle_event(&self, event: NetworkEvent) {
        match event {
            NetworkEvent::AccessPointAdded(native) => {
                self.access_point_added(native.clone());
                self.signal_ap_added(&native).await;
            }
            NetworkEvent::AccessPointRemoved { path } => self.access_point_removed(&path),
            NetworkEvent::SignalStrengthChanged { path, strength } => {
                self.access_point_strength_changed(&path, strength)
            }
            NetworkEvent::WirelessEnabledChanged(_) | NetworkEvent::DevicesChanged => {
                self.update_device_state(true).await;
            }
            NetworkEvent::DeviceStateChanged {
                new_state,
                old_state,
                reason,
            } => {
                debug!("Device state {old_state} -> {new_state} (reason {reason})");
                self.device_state_changed(new_state, old_state, reason).await;
            }
            NetworkEvent::ActivationStateChanged {
                path,
                state,
                reason,
            } => {
                self.on_activation_state(&path, state, reason).await;
            }
            NetworkEvent::SavedConnectionsChanged => self.reload_saved_connections().await,
        }
    }

    /// Mirrors connections made or lost outside of this crate into the
    /// record. Attempts started here report through their own activation.
    ///
    /// `DISCONNECTED` reached through `DEACTIVATING` is an orderly
    /// disconnect; reached from anywhere else the connection failed. After
    /// `FAILED` the failure is already recorded.
    async fn device_state_changed(&self, state: DeviceState, old_state: DeviceState, reason: u32) {
        if self.attempt_pending().await {
            return;
        }
        match state {
            DeviceState::Activated => {
                let ap = self.backend_active_ap().await;
                self.record_event_if_new(EventType::Connected, ap.as_ref());
            }
            s if s.is_activating() => {
                let ap = match self.backend_active_ap().await {
                    Some(ap) => Some(ap),
                    None => self.active_ap(),
                };
                self.record_event_if_new(EventType::StartedConnecting, ap.as_ref());
            }
            DeviceState::Disconnected if old_state == DeviceState::Failed => {}
            DeviceState::Disconnected | DeviceState::Unavailable | DeviceState::Unmanaged => {
                let live = {
                    let record = read_lock(&self.record);
                    record.is_connected() || record.is_connecting()
                };
                if !live {
                    return;
                }
                let event_type = match (state, old_state) {
                    (DeviceState::Disconnected, DeviceState::Deactivating) => EventType::Disconnected,
                    (DeviceState::Disconnected, _) => EventType::ConnectionFailed,
                    _ => EventType::Disconnected,
                };
                let ap = self.active_ap();
                self.record_event_if_new(event_type, ap.as_ref());
            }
            DeviceState::Failed => {
                let ap = self.active_ap();
                self.record_event_if_new(reason_to_error(reason).event_type(), ap.as_ref());
            }
            _ => {}
        }
    }

    /// The cached record of the BSSID the device's active connection uses.
    async fn backend_active_ap(&self) -> Option<AccessPoint> {
        match self.backend.active_connection().await {
            Ok(active) => active
                .and_then(|a| a.access_point_path)
                .and_then(|path| read_lock(&self.ap_list).access_point_by_path(&path)),
            Err(e) => {
                debug!("Could not read active connection: {e}");
                None
            }
        }
    }
}
