//! Reader and controller façades.
//!
//! Readers take a read lock for the duration of one method call and return
//! owned snapshots, so no lock outlives the call. Controllers queue work on
//! the network thread and return immediately; the outcome arrives later
//! through listeners and the readers.
//!
//! All façades borrow the [`WifiService`](crate::WifiService) they came
//! from.

use log::debug;
use secrecy::SecretString;
use std::sync::Arc;

use crate::api::models::{AccessPoint, ApHash, ConnectionEvent, DeviceStatus, EventType};
use crate::core::WifiCore;
use crate::core::bridge::NetworkThread;
use crate::util::utils::read_lock;

/// Read access to the visible networks.
#[derive(Clone, Copy)]
pub struct ApListReader<'a> {
    pub(crate) core: &'a WifiCore,
}

impl ApListReader<'_> {
    /// Snapshot of every visible network, in no particular order.
    pub fn access_points(&self) -> Vec<AccessPoint> {
        read_lock(&self.core.ap_list).access_points()
    }

    /// The visible network with identity `hash`, if any.
    pub fn access_point(&self, hash: &ApHash) -> Option<AccessPoint> {
        read_lock(&self.core.ap_list).access_point(hash)
    }

    pub fn len(&self) -> usize {
        read_lock(&self.core.ap_list).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Read access to the Wi-Fi device state.
#[derive(Clone, Copy)]
pub struct DeviceReader<'a> {
    pub(crate) core: &'a WifiCore,
}

impl DeviceReader<'_> {
    /// Whether a managed Wi-Fi device is present.
    pub fn exists(&self) -> bool {
        self.status().exists
    }

    /// Whether wireless networking is switched on.
    pub fn enabled(&self) -> bool {
        self.status().enabled
    }

    /// Whether an enable/disable request is still in progress.
    pub fn is_changing(&self) -> bool {
        self.status().changing
    }

    pub fn status(&self) -> DeviceStatus {
        read_lock(&self.core.device).status()
    }
}

/// Commands for the Wi-Fi device.
#[derive(Clone, Copy)]
pub struct DeviceController<'a> {
    pub(crate) core: &'a WifiCore,
    pub(crate) bridge: &'a NetworkThread<WifiCore>,
}

impl DeviceController<'_> {
    /// Switches wireless networking on or off.
    ///
    /// [`DeviceReader::is_changing`] reports `true` from the moment this
    /// returns until the network stack confirms the new state. Does nothing
    /// without a device or if the radio already is in that state.
    pub fn set_enabled(&self, enabled: bool) {
        if !self.core.signal_device_state_changing(enabled) {
            return;
        }
        self.bridge
            .call_async(move |core: Arc<WifiCore>| async move {
                core.set_wireless_enabled(enabled).await;
            });
    }

    /// Asks the device to scan. Results arrive as access point changes.
    pub fn scan_access_points(&self) {
        self.bridge
            .call_async(|core: Arc<WifiCore>| async move {
                core.scan_access_points().await;
            });
    }

    /// Re-reads the device state from the network stack and returns it.
    ///
    /// Blocks until the network thread has answered. Returns the cached
    /// state if the network thread is not running.
    pub fn update_device_state(&self) -> DeviceStatus {
        self.bridge
            .call(|core: Arc<WifiCore>| async move { core.update_device_state(true).await })
            .unwrap_or_else(|| read_lock(&self.core.device).status())
    }
}

/// Read access to the connection event log.
#[derive(Clone, Copy)]
pub struct RecordReader<'a> {
    pub(crate) core: &'a WifiCore,
}

impl RecordReader<'_> {
    /// The network being connected to or in use.
    pub fn active_ap(&self) -> Option<AccessPoint> {
        self.core.active_ap()
    }

    pub fn is_connected(&self) -> bool {
        read_lock(&self.core.record).is_connected()
    }

    pub fn is_connecting(&self) -> bool {
        read_lock(&self.core.record).is_connecting()
    }

    pub fn latest_event(&self) -> Option<ConnectionEvent> {
        read_lock(&self.core.record).latest_event().cloned()
    }

    /// The latest event for the network `hash`.
    pub fn latest_event_for(&self, hash: &ApHash) -> Option<ConnectionEvent> {
        read_lock(&self.core.record).latest_event_for(hash).cloned()
    }

    /// The latest event of type `event_type`.
    pub fn latest_event_of(&self, event_type: EventType) -> Option<ConnectionEvent> {
        read_lock(&self.core.record)
            .latest_event_of(event_type)
            .cloned()
    }

    /// The latest event of type `event_type` for the network `hash`.
    pub fn latest_event_matching(
        &self,
        hash: &ApHash,
        event_type: EventType,
    ) -> Option<ConnectionEvent> {
        read_lock(&self.core.record)
            .latest_event_matching(hash, event_type)
            .cloned()
    }

    /// Every retained event, oldest first.
    pub fn events(&self) -> Vec<ConnectionEvent> {
        read_lock(&self.core.record).events().to_vec()
    }
}

/// Commands for connections.
#[derive(Clone, Copy)]
pub struct ConnectionController<'a> {
    pub(crate) bridge: &'a NetworkThread<WifiCore>,
}

impl ConnectionController<'_> {
    /// Starts connecting to `ap`, replacing any attempt in progress.
    ///
    /// An empty `key` reuses the network's saved connection, or connects
    /// without one if the network is open. A non-empty `key` replaces any
    /// saved connection for the network. The request is dropped, with a
    /// log message, if the key does not fit the network's security type.
    ///
    /// If `ap` is out of range the device scans for it and the attempt waits
    /// until it shows up or the connection timeout passes.
    pub fn connect_to_access_point(&self, ap: &AccessPoint, key: &str) {
        let target = ap.clone();
        let key = (!key.is_empty()).then(|| SecretString::from(key.to_string()));
        debug!("Queueing connection to {ap}");
        self.bridge
            .call_async(move |core: Arc<WifiCore>| async move {
                core.connect_to_access_point(target, key).await;
            });
    }

    /// Cancels the attempt in progress or closes the active connection.
    /// Safe to call in any state.
    pub fn disconnect(&self) {
        self.bridge
            .call_async(|core: Arc<WifiCore>| async move {
                core.disconnect().await;
            });
    }

    /// Forgets every saved connection for `ap`.
    pub fn remove_saved_connection(&self, ap: &AccessPoint) {
        let target = ap.clone();
        self.bridge
            .call_async(move |core: Arc<WifiCore>| async move {
                core.remove_saved_connection(target).await;
            });
    }
}
