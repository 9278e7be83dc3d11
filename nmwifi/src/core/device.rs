//! Wi-Fi radio state.
//!
//! Tracks whether a Wi-Fi device exists and whether wireless networking is
//! switched on. An enable/disable request marks the state as changing on
//! the caller's thread right away; the flag clears once the network stack
//! reports the requested value.

use log::{debug, info, warn};

use super::WifiCore;
use crate::api::models::DeviceStatus;
use crate::util::utils::{read_lock, write_lock};

#[derive(Debug, Default)]
pub(crate) struct DeviceModule {
    exists: bool,
    enabled: bool,
    pending_target: Option<bool>,
}

impl DeviceModule {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn status(&self) -> DeviceStatus {
        DeviceStatus {
            exists: self.exists,
            enabled: self.enabled,
            changing: self.pending_target.is_some(),
        }
    }

    /// Records an enable/disable request. Returns `false` if there is
    /// nothing to do: no device, or the radio already is in that state.
    pub(crate) fn begin_change(&mut self, enabled: bool) -> bool {
        if !self.exists {
            return false;
        }
        if self.enabled == enabled && self.pending_target.is_none() {
            return false;
        }
        self.pending_target = Some(enabled);
        true
    }

    pub(crate) fn cancel_change(&mut self) {
        self.pending_target = None;
    }

    /// Stores freshly queried state. Returns the new `enabled` value if it
    /// changed.
    pub(crate) fn apply(&mut self, exists: bool, enabled: bool) -> Option<bool> {
        let enabled = exists && enabled;
        let changed = self.enabled != enabled;
        self.exists = exists;
        self.enabled = enabled;
        if !exists || self.pending_target == Some(enabled) {
            self.pending_target = None;
        }
        changed.then_some(enabled)
    }
}

impl WifiCore {
    /// Queries the backend and updates the cached device state.
    ///
    /// On an enabled/disabled transition, listeners are notified if
    /// `notify` is set and the access point cache is reloaded or cleared.
    /// Returns the resulting status.
    pub(crate) async fn update_device_state(&self, notify: bool) -> DeviceStatus {
        let exists = match self.backend.wifi_device_exists().await {
            Ok(exists) => exists,
            Err(e) => {
                warn!("Failed to look up Wi-Fi device: {e}");
                false
            }
        };
        let enabled = if exists {
            match self.backend.wireless_enabled().await {
                Ok(enabled) => enabled,
                Err(e) => {
                    warn!("Failed to read WirelessEnabled: {e}");
                    false
                }
            }
        } else {
            false
        };

        let (transition, status) = {
            let mut device = write_lock(&self.device);
            let transition = device.apply(exists, enabled);
            (transition, device.status())
        };
        debug!("Device state: {status:?}");

        if let Some(enabled) = transition
            && notify
        {
            info!(
                "Wireless networking {}",
                if enabled { "enabled" } else { "disabled" }
            );
            self.notifier.wireless_changed(enabled);
            if enabled {
                self.reload_access_points().await;
            } else {
                self.clear_access_points();
                self.signal_wifi_disabled().await;
            }
        }
        status
    }

    /// Caller-thread half of an enable/disable request.
    pub(crate) fn signal_device_state_changing(&self, enabled: bool) -> bool {
        let accepted = write_lock(&self.device).begin_change(enabled);
        if !accepted {
            debug!("Ignoring set_enabled({enabled}): no device or already in that state");
        }
        accepted
    }

    /// Network-thread half of an enable/disable request.
    pub(crate) async fn set_wireless_enabled(&self, enabled: bool) {
        if let Err(e) = self.backend.set_wireless_enabled(enabled).await {
            warn!("Failed to set WirelessEnabled={enabled}: {e}");
            write_lock(&self.device).cancel_change();
        }
        self.update_device_state(true).await;
    }

    pub(crate) async fn scan_access_points(&self) {
        let status = read_lock(&self.device).status();
        if !status.exists || !status.enabled {
            debug!("Not scanning: Wi-Fi unavailable");
            return;
        }
        match self.backend.request_scan().await {
            Ok(()) => debug!("Scan requested"),
            Err(e) => warn!("Scan request failed: {e}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn no_device_means_nothing_to_change() {
        let mut device = DeviceModule::new();
        assert_eq!(device.apply(false, true), None);
        assert!(!device.begin_change(true));
        assert_eq!(device.status(), DeviceStatus::default());
    }

    #[test]
    fn changing_flag_clears_when_target_reached() {
        let mut device = DeviceModule::new();
        assert_eq!(device.apply(true, false), None);
        assert!(device.begin_change(true));
        assert!(device.status().changing);

        // Not there yet.
        assert_eq!(device.apply(true, false), None);
        assert!(device.status().changing);

        assert_eq!(device.apply(true, true), Some(true));
        let status = device.status();
        assert!(status.enabled);
        assert!(!status.changing);
    }

    #[test]
    fn transitions_are_reported_once() {
        let mut device = DeviceModule::new();
        assert_eq!(device.apply(true, true), Some(true));
        assert_eq!(device.apply(true, true), None);
        assert_eq!(device.apply(true, false), Some(false));
        assert_eq!(device.apply(false, false), None);
        assert!(!device.status().exists);
    }

    #[test]
    fn request_for_current_state_is_ignored() {
        let mut device = DeviceModule::new();
        device.apply(true, true);
        assert!(!device.begin_change(true));
        assert!(device.begin_change(false));
        // A reversal while pending is accepted.
        assert!(device.begin_change(true));
        device.cancel_change();
        assert!(!device.status().changing);
    }
}
