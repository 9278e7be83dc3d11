//! The seam between the connection core and the network stack.
//!
//! [`NetworkBackend`] is everything the core needs from NetworkManager:
//! queries, commands and a stream of typed [`NetworkEvent`]s. All methods
//! are only ever called from the network thread.
//!
//! Two implementations ship with the crate:
//!
//! - [`NmBackend`]: NetworkManager over the system D-Bus
//! - [`MockNetwork`]: an in-memory network for tests and desktop development

use async_trait::async_trait;
use futures::stream::BoxStream;
use secrecy::SecretString;
use std::time::SystemTime;

use crate::Result;
use crate::api::models::{
    AccessPoint, ActiveConnectionState, ApHash, ApMode, DeviceState, SecurityType, Ssid,
};

mod mock;
mod nm;
pub(crate) mod profile;

pub use mock::{ActivationOutcome, MockNetwork};
pub use nm::NmBackend;

/// One BSSID as reported by the network stack.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NativeAccessPoint {
    /// Stack object path, unique per BSSID while it is visible.
    pub path: String,
    /// Hardware address of the BSSID.
    pub bssid: String,
    pub ssid: Ssid,
    pub mode: ApMode,
    pub security: SecurityType,
    /// Signal strength, 0-100.
    pub strength: u8,
}

impl NativeAccessPoint {
    /// Identity of the network this BSSID belongs to.
    pub fn hash(&self) -> ApHash {
        ApHash::new(&self.ssid, self.mode, self.security)
    }

    /// Builds a fresh access point record from this BSSID.
    pub fn to_record(&self) -> AccessPoint {
        AccessPoint::new(self.ssid.clone(), self.mode, self.security, self.strength)
    }
}

/// A stored connection profile.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SavedConnection {
    /// Stack object path of the profile.
    pub path: String,
    pub ssid: Ssid,
    /// Security the profile was created for.
    pub security: SecurityType,
    /// Last successful activation, if any.
    pub last_connected: Option<SystemTime>,
}

impl SavedConnection {
    /// Returns `true` if this profile can be used to join `ap`.
    pub fn matches(&self, ap: &AccessPoint) -> bool {
        self.ssid == *ap.ssid() && ap.security_type().compatible_with(self.security)
    }
}

/// Settings for a profile created on the fly for a new network.
#[derive(Debug, Clone)]
pub struct ConnectionProfile {
    pub ssid: Ssid,
    pub security: SecurityType,
    /// Key for secured networks. Never logged.
    pub key: Option<SecretString>,
}

/// The device's current active connection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActiveConnectionInfo {
    /// Stack object path of the active connection.
    pub path: String,
    /// Path of the BSSID in use, if known.
    pub access_point_path: Option<String>,
    pub state: ActiveConnectionState,
}

/// Result of submitting a new profile for activation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewActivation {
    /// Path of the saved profile the stack created.
    pub profile_path: String,
    /// Path of the active connection to watch.
    pub active_path: String,
}

/// Typed notifications from the network stack.
#[derive(Debug, Clone, PartialEq)]
pub enum NetworkEvent {
    /// A BSSID became visible.
    AccessPointAdded(NativeAccessPoint),
    /// A BSSID is no longer visible.
    AccessPointRemoved { path: String },
    /// A BSSID's signal strength changed.
    SignalStrengthChanged { path: String, strength: u8 },
    /// The global wireless switch changed.
    WirelessEnabledChanged(bool),
    /// A device appeared or disappeared.
    DevicesChanged,
    /// The Wi-Fi device moved through its state machine.
    DeviceStateChanged {
        new_state: DeviceState,
        old_state: DeviceState,
        reason: u32,
    },
    /// An active connection changed state. `reason` is a connection state
    /// reason code.
    ActivationStateChanged {
        path: String,
        state: ActiveConnectionState,
        reason: u32,
    },
    /// Saved profiles were added, removed or updated.
    SavedConnectionsChanged,
}

/// Operations the connection core needs from the network stack.
///
/// Errors are reported as [`ConnectionError`](crate::ConnectionError) and
/// are always handled by the core; none of them reach façade callers.
#[async_trait]
pub trait NetworkBackend: Send + Sync {
    /// Whether a managed Wi-Fi device is present.
    async fn wifi_device_exists(&self) -> Result<bool>;

    /// Whether the wireless radio is switched on.
    async fn wireless_enabled(&self) -> Result<bool>;

    /// Switches the wireless radio on or off.
    async fn set_wireless_enabled(&self, enabled: bool) -> Result<()>;

    /// Asks the Wi-Fi device to scan.
    async fn request_scan(&self) -> Result<()>;

    /// All BSSIDs currently visible.
    async fn access_points(&self) -> Result<Vec<NativeAccessPoint>>;

    /// All stored Wi-Fi profiles.
    async fn saved_connections(&self) -> Result<Vec<SavedConnection>>;

    /// Deletes a stored profile.
    async fn delete_saved_connection(&self, path: &str) -> Result<()>;

    /// Activates a stored profile on the BSSID at `ap_path`. Returns the
    /// active connection path.
    async fn activate_saved(&self, profile_path: &str, ap_path: &str) -> Result<String>;

    /// Creates a profile and activates it on the BSSID at `ap_path`.
    async fn add_and_activate(
        &self,
        profile: &ConnectionProfile,
        ap_path: &str,
    ) -> Result<NewActivation>;

    /// Tears down one active connection.
    async fn deactivate(&self, active_path: &str) -> Result<()>;

    /// Disconnects the Wi-Fi device from whatever it is using.
    async fn disconnect_device(&self) -> Result<()>;

    /// The Wi-Fi device's active connection, if any.
    async fn active_connection(&self) -> Result<Option<ActiveConnectionInfo>>;

    /// Starts delivering [`NetworkEvent`]s. Called once per service.
    async fn subscribe(&self) -> Result<BoxStream<'static, NetworkEvent>>;
}
