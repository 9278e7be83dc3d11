use serde::{Serialize, Serializer};
use std::cmp::Ordering;
use std::fmt::{Display, Formatter};
use std::hash::{Hash, Hasher};
use std::time::SystemTime;
use thiserror::Error;
use uuid::Uuid;

use crate::types::constants::{security_flags, wifi_mode};
use crate::util::utils::decode_ssid_or_hidden;

/// Namespace for access point identity hashes.
const AP_HASH_NAMESPACE: Uuid = Uuid::from_u128(0x6e6d_7769_6669_4170_8000_0000_6170_6873);

/// Raw network name as broadcast by an access point.
///
/// SSIDs are arbitrary byte strings of up to 32 bytes. They are stored
/// verbatim and only decoded for display.
#[derive(Debug, Clone, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub struct Ssid(Vec<u8>);

impl Ssid {
    /// Wraps raw SSID bytes.
    pub fn new(bytes: impl Into<Vec<u8>>) -> Self {
        Self(bytes.into())
    }

    /// The raw SSID bytes.
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    /// Returns `true` for hidden networks that broadcast no name.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl From<&str> for Ssid {
    fn from(value: &str) -> Self {
        Self(value.as_bytes().to_vec())
    }
}

impl From<Vec<u8>> for Ssid {
    fn from(value: Vec<u8>) -> Self {
        Self(value)
    }
}

impl Display for Ssid {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(&decode_ssid_or_hidden(&self.0))
    }
}

/// Basic security protocol used by an access point.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub enum SecurityType {
    /// Open network, no key required.
    Unsecured,
    /// Legacy WEP encryption.
    Wep,
    /// WPA (version 1) with a pre-shared key.
    Wpa,
    /// WPA2/WPA3 (RSN).
    Rsn,
}

impl SecurityType {
    /// Derives the security type from NetworkManager access point flags.
    ///
    /// RSN flags take precedence over WPA flags, which take precedence over
    /// the privacy bit.
    pub fn from_flags(flags: u32, wpa_flags: u32, rsn_flags: u32) -> Self {
        if rsn_flags != 0 {
            Self::Rsn
        } else if wpa_flags != 0 {
            Self::Wpa
        } else if flags & security_flags::WEP != 0 {
            Self::Wep
        } else {
            Self::Unsecured
        }
    }

    /// Returns `true` if a saved profile created for `other` may be used
    /// with this security type. WPA and RSN profiles are interchangeable.
    pub fn compatible_with(self, other: SecurityType) -> bool {
        match (self, other) {
            (Self::Wpa | Self::Rsn, Self::Wpa | Self::Rsn) => true,
            (a, b) => a == b,
        }
    }

    /// Returns `true` if this security type requires a key.
    pub fn secured(self) -> bool {
        self != Self::Unsecured
    }

    /// Returns `true` if `key` has a plausible format for this security type.
    ///
    /// - Unsecured networks take no key.
    /// - WEP keys are 5 or 13 ASCII characters, or 10 or 26 hex digits.
    /// - WPA/RSN passphrases are 8 to 63 characters, or exactly 64 hex digits.
    pub fn is_valid_key_format(self, key: &str) -> bool {
        match self {
            Self::Unsecured => key.is_empty(),
            Self::Wep => match key.len() {
                5 | 13 => key.is_ascii(),
                10 | 26 => is_hex(key),
                _ => false,
            },
            Self::Wpa | Self::Rsn => match key.len() {
                8..=63 => true,
                64 => is_hex(key),
                _ => false,
            },
        }
    }
}

fn is_hex(key: &str) -> bool {
    key.chars().all(|c| c.is_ascii_hexdigit())
}

impl Display for SecurityType {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Unsecured => write!(f, "unsecured"),
            Self::Wep => write!(f, "WEP"),
            Self::Wpa => write!(f, "WPA"),
            Self::Rsn => write!(f, "WPA2"),
        }
    }
}

/// Operating mode of an access point.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub enum ApMode {
    /// Mode not reported.
    Unknown,
    /// Peer-to-peer ad-hoc network.
    Adhoc,
    /// Regular infrastructure access point.
    Infrastructure,
    /// Device running as a hotspot.
    Hotspot,
}

impl From<u32> for ApMode {
    fn from(code: u32) -> Self {
        match code {
            wifi_mode::ADHOC => Self::Adhoc,
            wifi_mode::INFRA => Self::Infrastructure,
            wifi_mode::AP => Self::Hotspot,
            _ => Self::Unknown,
        }
    }
}

impl ApMode {
    fn code(self) -> u8 {
        match self {
            Self::Unknown => 0,
            Self::Adhoc => 1,
            Self::Infrastructure => 2,
            Self::Hotspot => 3,
        }
    }
}

/// Stable identity of an access point record.
///
/// Derived from the SSID, mode and security type, so every BSSID that
/// broadcasts the same network maps to the same hash. The ordering is
/// arbitrary but total and stable across runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ApHash(Uuid);

impl ApHash {
    /// Computes the hash for a network identity.
    pub fn new(ssid: &Ssid, mode: ApMode, security: SecurityType) -> Self {
        let mut name = Vec::with_capacity(ssid.as_bytes().len() + 2);
        name.extend_from_slice(ssid.as_bytes());
        name.push(mode.code());
        name.push(security as u8);
        Self(Uuid::new_v5(&AP_HASH_NAMESPACE, &name))
    }
}

impl Display for ApHash {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0.simple())
    }
}

impl Serialize for ApHash {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

/// Snapshot of one visible Wi-Fi network.
///
/// Several BSSIDs advertising the same network are grouped under one
/// record. Records compare, order and hash by [`ApHash`] only, so a
/// snapshot taken before a signal strength update still equals the
/// current record.
///
/// # Example
///
/// ```
/// use nmwifi::{AccessPoint, ApMode, SecurityType};
///
/// let ap = AccessPoint::new("home-net", ApMode::Infrastructure, SecurityType::Rsn, 40);
/// assert!(ap.is_valid_key_format("correct horse"));
/// assert!(!ap.is_valid_key_format("short"));
/// ```
#[derive(Debug, Clone, Serialize)]
pub struct AccessPoint {
    hash: ApHash,
    ssid: Ssid,
    security: SecurityType,
    mode: ApMode,
    pub(crate) strength: u8,
    pub(crate) has_saved_connection: bool,
    pub(crate) last_connection_time: Option<SystemTime>,
}

impl AccessPoint {
    /// Creates a record with no saved connection data.
    pub fn new(ssid: impl Into<Ssid>, mode: ApMode, security: SecurityType, strength: u8) -> Self {
        let ssid = ssid.into();
        Self {
            hash: ApHash::new(&ssid, mode, security),
            ssid,
            security,
            mode,
            strength: strength.min(100),
            has_saved_connection: false,
            last_connection_time: None,
        }
    }

    /// Identity hash of this network.
    pub fn hash(&self) -> ApHash {
        self.hash
    }

    /// Raw network name.
    pub fn ssid(&self) -> &Ssid {
        &self.ssid
    }

    /// Security protocol of the network.
    pub fn security_type(&self) -> SecurityType {
        self.security
    }

    /// Operating mode of the network.
    pub fn mode(&self) -> ApMode {
        self.mode
    }

    /// Signal strength (0-100) of the strongest visible BSSID.
    pub fn signal_strength(&self) -> u8 {
        self.strength
    }

    /// Whether a saved profile matches this network.
    pub fn has_saved_connection(&self) -> bool {
        self.has_saved_connection
    }

    /// Last time a matching saved profile was used, if ever.
    pub fn last_connection_time(&self) -> Option<SystemTime> {
        self.last_connection_time
    }

    /// Returns `true` if this network needs a key to connect.
    pub fn requires_key(&self) -> bool {
        self.security.secured()
    }

    /// Checks that `key` has the right shape for this network's security.
    pub fn is_valid_key_format(&self, key: &str) -> bool {
        self.security.is_valid_key_format(key)
    }
}

impl PartialEq for AccessPoint {
    fn eq(&self, other: &Self) -> bool {
        self.hash == other.hash
    }
}

impl Eq for AccessPoint {}

impl PartialOrd for AccessPoint {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for AccessPoint {
    fn cmp(&self, other: &Self) -> Ordering {
        self.hash.cmp(&other.hash)
    }
}

impl Hash for AccessPoint {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.hash.hash(state);
    }
}

impl Display for AccessPoint {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} ({}, {}%)", self.ssid, self.security, self.strength)
    }
}

/// Kind of connection event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum EventType {
    /// A connection attempt started.
    StartedConnecting,
    /// A connection was fully activated.
    Connected,
    /// A connection was closed.
    Disconnected,
    /// A connection attempt failed for a reason other than credentials.
    ConnectionFailed,
    /// A connection attempt failed because the key was rejected.
    ConnectionAuthFailed,
}

impl Display for EventType {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::StartedConnecting => write!(f, "started connecting"),
            Self::Connected => write!(f, "connected"),
            Self::Disconnected => write!(f, "disconnected"),
            Self::ConnectionFailed => write!(f, "connection failed"),
            Self::ConnectionAuthFailed => write!(f, "authentication failed"),
        }
    }
}

/// One entry in the connection event log.
#[derive(Debug, Clone, Serialize)]
pub struct ConnectionEvent {
    event_type: EventType,
    access_point: Option<AccessPoint>,
    timestamp: SystemTime,
}

impl ConnectionEvent {
    /// Creates an event stamped with the current time.
    pub fn new(event_type: EventType, access_point: Option<AccessPoint>) -> Self {
        Self {
            event_type,
            access_point,
            timestamp: SystemTime::now(),
        }
    }

    /// Kind of event.
    pub fn event_type(&self) -> EventType {
        self.event_type
    }

    /// Access point the event pertains to, if any.
    ///
    /// This is the snapshot taken when the event was recorded.
    pub fn access_point(&self) -> Option<&AccessPoint> {
        self.access_point.as_ref()
    }

    /// When the event was recorded.
    pub fn timestamp(&self) -> SystemTime {
        self.timestamp
    }

    /// Returns `true` if this event concerns `ap` (compared by hash).
    pub fn is_for(&self, ap: &AccessPoint) -> bool {
        self.access_point.as_ref() == Some(ap)
    }

    /// Returns `true` if both events have the same type and access point.
    pub fn same_as(&self, other: &ConnectionEvent) -> bool {
        self.event_type == other.event_type && self.access_point == other.access_point
    }
}

impl Display for ConnectionEvent {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match &self.access_point {
            Some(ap) => write!(f, "{}: {}", self.event_type, ap.ssid()),
            None => write!(f, "{}", self.event_type),
        }
    }
}

/// Cached state of the Wi-Fi radio.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct DeviceStatus {
    /// A managed Wi-Fi device is present.
    pub exists: bool,
    /// Wireless networking is switched on.
    pub enabled: bool,
    /// An enable/disable command was issued and is not yet confirmed.
    pub changing: bool,
}

/// NetworkManager active connection state.
///
/// These values represent the lifecycle states of an active connection
/// as reported by the NM D-Bus API.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActiveConnectionState {
    /// Connection state is unknown.
    Unknown,
    /// Connection is activating (connecting).
    Activating,
    /// Connection is fully activated (connected).
    Activated,
    /// Connection is deactivating (disconnecting).
    Deactivating,
    /// Connection is fully deactivated (disconnected).
    Deactivated,
    /// Unknown state code not mapped to a specific variant.
    Other(u32),
}

impl From<u32> for ActiveConnectionState {
    fn from(code: u32) -> Self {
        match code {
            0 => Self::Unknown,
            1 => Self::Activating,
            2 => Self::Activated,
            3 => Self::Deactivating,
            4 => Self::Deactivated,
            v => Self::Other(v),
        }
    }
}

impl ActiveConnectionState {
    /// Raw NetworkManager code for this state.
    pub fn code(self) -> u32 {
        match self {
            Self::Unknown => 0,
            Self::Activating => 1,
            Self::Activated => 2,
            Self::Deactivating => 3,
            Self::Deactivated => 4,
            Self::Other(v) => v,
        }
    }
}

impl Display for ActiveConnectionState {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Unknown => write!(f, "unknown"),
            Self::Activating => write!(f, "activating"),
            Self::Activated => write!(f, "activated"),
            Self::Deactivating => write!(f, "deactivating"),
            Self::Deactivated => write!(f, "deactivated"),
            Self::Other(v) => write!(f, "unknown state ({v})"),
        }
    }
}

/// NetworkManager active connection state reason codes.
///
/// These values indicate why an active connection transitioned to its
/// current state. Use `ConnectionStateReason::from(code)` to convert
/// from the raw u32 values returned by NetworkManager signals.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionStateReason {
    /// The reason is unknown.
    Unknown,
    /// No specific reason.
    None,
    /// User disconnected.
    UserDisconnected,
    /// Device disconnected.
    DeviceDisconnected,
    /// The NetworkManager service stopped.
    ServiceStopped,
    /// IP configuration was invalid.
    IpConfigInvalid,
    /// Connection timed out while activating.
    ConnectTimeout,
    /// Service start timed out.
    ServiceStartTimeout,
    /// Service failed to start.
    ServiceStartFailed,
    /// No secrets (password) were provided.
    NoSecrets,
    /// Login/authentication failed.
    LoginFailed,
    /// The connection was removed.
    ConnectionRemoved,
    /// A dependency failed.
    DependencyFailed,
    /// Device realization failed.
    DeviceRealizeFailed,
    /// Device was removed.
    DeviceRemoved,
    /// Unknown reason code not mapped to a specific variant.
    Other(u32),
}

impl From<u32> for ConnectionStateReason {
    fn from(code: u32) -> Self {
        match code {
            0 => Self::Unknown,
            1 => Self::None,
            2 => Self::UserDisconnected,
            3 => Self::DeviceDisconnected,
            4 => Self::ServiceStopped,
            5 => Self::IpConfigInvalid,
            6 => Self::ConnectTimeout,
            7 => Self::ServiceStartTimeout,
            8 => Self::ServiceStartFailed,
            9 => Self::NoSecrets,
            10 => Self::LoginFailed,
            11 => Self::ConnectionRemoved,
            12 => Self::DependencyFailed,
            13 => Self::DeviceRealizeFailed,
            14 => Self::DeviceRemoved,
            v => Self::Other(v),
        }
    }
}

impl Display for ConnectionStateReason {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Unknown => write!(f, "unknown"),
            Self::None => write!(f, "none"),
            Self::UserDisconnected => write!(f, "user disconnected"),
            Self::DeviceDisconnected => write!(f, "device disconnected"),
            Self::ServiceStopped => write!(f, "service stopped"),
            Self::IpConfigInvalid => write!(f, "IP configuration invalid"),
            Self::ConnectTimeout => write!(f, "connection timed out"),
            Self::ServiceStartTimeout => write!(f, "service start timed out"),
            Self::ServiceStartFailed => write!(f, "service start failed"),
            Self::NoSecrets => write!(f, "no secrets (password) provided"),
            Self::LoginFailed => write!(f, "login/authentication failed"),
            Self::ConnectionRemoved => write!(f, "connection was removed"),
            Self::DependencyFailed => write!(f, "dependency failed"),
            Self::DeviceRealizeFailed => write!(f, "device realization failed"),
            Self::DeviceRemoved => write!(f, "device was removed"),
            Self::Other(v) => write!(f, "unknown reason ({v})"),
        }
    }
}

/// Converts a connection state reason code to a specific `ConnectionError`.
///
/// Maps authentication-related failures to `AuthFailed`, timeout issues to `Timeout`,
/// and other failures to the appropriate variant.
pub fn connection_state_reason_to_error(code: u32) -> ConnectionError {
    let reason = ConnectionStateReason::from(code);
    match reason {
        // Authentication failures
        ConnectionStateReason::NoSecrets | ConnectionStateReason::LoginFailed => {
            ConnectionError::AuthFailed
        }

        // Timeout failures
        ConnectionStateReason::ConnectTimeout | ConnectionStateReason::ServiceStartTimeout => {
            ConnectionError::Timeout
        }

        // IP configuration failures (often DHCP)
        ConnectionStateReason::IpConfigInvalid => ConnectionError::DhcpFailed,

        // All other failures
        _ => ConnectionError::ActivationFailed(reason),
    }
}

/// NetworkManager device states.
///
/// Represents the current operational state of a network device.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeviceState {
    /// Device is not managed by NetworkManager.
    Unmanaged,
    /// Device is managed but not yet available (e.g., Wi-Fi disabled).
    Unavailable,
    /// Device is available but not connected.
    Disconnected,
    /// Device is preparing to connect.
    Prepare,
    /// Device is being configured.
    Config,
    /// Device is waiting for secrets.
    NeedAuth,
    /// Device is requesting IP addresses.
    IpConfig,
    /// Device is checking IP connectivity.
    IpCheck,
    /// Device is waiting for secondary connections.
    Secondaries,
    /// Device is fully connected and operational.
    Activated,
    /// Device is disconnecting.
    Deactivating,
    /// Device connection failed.
    Failed,
    /// Unknown or unsupported state with raw code.
    Other(u32),
}

impl From<u32> for DeviceState {
    fn from(value: u32) -> Self {
        match value {
            10 => DeviceState::Unmanaged,
            20 => DeviceState::Unavailable,
            30 => DeviceState::Disconnected,
            40 => DeviceState::Prepare,
            50 => DeviceState::Config,
            60 => DeviceState::NeedAuth,
            70 => DeviceState::IpConfig,
            80 => DeviceState::IpCheck,
            90 => DeviceState::Secondaries,
            100 => DeviceState::Activated,
            110 => DeviceState::Deactivating,
            120 => DeviceState::Failed,
            v => DeviceState::Other(v),
        }
    }
}

impl DeviceState {
    /// Returns `true` for the intermediate states between a connection
    /// request and full activation.
    pub fn is_activating(self) -> bool {
        matches!(
            self,
            Self::Prepare
                | Self::Config
                | Self::NeedAuth
                | Self::IpConfig
                | Self::IpCheck
                | Self::Secondaries
        )
    }
}

impl Display for DeviceState {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            DeviceState::Unmanaged => write!(f, "Unmanaged"),
            DeviceState::Unavailable => write!(f, "Unavailable"),
            DeviceState::Disconnected => write!(f, "Disconnected"),
            DeviceState::Prepare => write!(f, "Preparing"),
            DeviceState::Config => write!(f, "Configuring"),
            DeviceState::NeedAuth => write!(f, "Needs authentication"),
            DeviceState::IpConfig => write!(f, "Requesting IP"),
            DeviceState::IpCheck => write!(f, "Checking IP"),
            DeviceState::Secondaries => write!(f, "Waiting for secondaries"),
            DeviceState::Activated => write!(f, "Activated"),
            DeviceState::Deactivating => write!(f, "Deactivating"),
            DeviceState::Failed => write!(f, "Failed"),
            DeviceState::Other(v) => write!(f, "Other({v})"),
        }
    }
}

/// NetworkManager device state reason codes.
///
/// Only the codes relevant to Wi-Fi activation are named; everything else
/// maps to `Other`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StateReason {
    /// No specific reason given.
    None,
    /// The reason is unknown.
    Unknown,
    /// The device became managed.
    NowManaged,
    /// The device is no longer managed.
    NowUnmanaged,
    /// The device could not be readied for configuration.
    ConfigFailed,
    /// Secrets were required but not provided.
    NoSecrets,
    /// The Wi-Fi supplicant disconnected unexpectedly.
    SupplicantDisconnected,
    /// The Wi-Fi supplicant's configuration failed.
    SupplicantConfigFailed,
    /// The Wi-Fi supplicant failed (authentication issue).
    SupplicantFailed,
    /// The Wi-Fi supplicant timed out during authentication.
    SupplicantTimeout,
    /// DHCP client failed to start.
    DhcpStartFailed,
    /// DHCP client encountered an error.
    DhcpError,
    /// DHCP client failed to obtain an IP address.
    DhcpFailed,
    /// Required firmware is missing for the device.
    FirmwareMissing,
    /// The device was removed from the system.
    DeviceRemoved,
    /// The system is entering sleep mode.
    Sleeping,
    /// The connection profile was removed.
    ConnectionRemoved,
    /// The user requested the operation.
    UserRequested,
    /// The requested SSID was not found.
    SsidNotFound,
    /// A new connection activation was queued.
    NewActivationEnqueued,
    /// Unknown reason code not mapped to a specific variant.
    Other(u32),
}

impl From<u32> for StateReason {
    fn from(code: u32) -> Self {
        match code {
            0 => Self::None,
            1 => Self::Unknown,
            2 => Self::NowManaged,
            3 => Self::NowUnmanaged,
            4 => Self::ConfigFailed,
            7 => Self::NoSecrets,
            8 => Self::SupplicantDisconnected,
            9 => Self::SupplicantConfigFailed,
            10 => Self::SupplicantFailed,
            11 => Self::SupplicantTimeout,
            15 => Self::DhcpStartFailed,
            16 => Self::DhcpError,
            17 => Self::DhcpFailed,
            35 => Self::FirmwareMissing,
            36 => Self::DeviceRemoved,
            37 => Self::Sleeping,
            38 => Self::ConnectionRemoved,
            39 => Self::UserRequested,
            53 => Self::SsidNotFound,
            60 => Self::NewActivationEnqueued,
            v => Self::Other(v),
        }
    }
}

impl Display for StateReason {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::None => write!(f, "none"),
            Self::Unknown => write!(f, "unknown"),
            Self::NowManaged => write!(f, "now managed"),
            Self::NowUnmanaged => write!(f, "now unmanaged"),
            Self::ConfigFailed => write!(f, "configuration failed"),
            Self::NoSecrets => write!(f, "no secrets provided"),
            Self::SupplicantDisconnected => write!(f, "supplicant disconnected"),
            Self::SupplicantConfigFailed => write!(f, "supplicant config failed"),
            Self::SupplicantFailed => write!(f, "supplicant failed"),
            Self::SupplicantTimeout => write!(f, "supplicant timeout"),
            Self::DhcpStartFailed => write!(f, "DHCP start failed"),
            Self::DhcpError => write!(f, "DHCP error"),
            Self::DhcpFailed => write!(f, "DHCP failed"),
            Self::FirmwareMissing => write!(f, "firmware missing"),
            Self::DeviceRemoved => write!(f, "device removed"),
            Self::Sleeping => write!(f, "sleeping"),
            Self::ConnectionRemoved => write!(f, "connection removed"),
            Self::UserRequested => write!(f, "user requested"),
            Self::SsidNotFound => write!(f, "SSID not found"),
            Self::NewActivationEnqueued => write!(f, "new activation enqueued"),
            Self::Other(v) => write!(f, "unknown reason ({v})"),
        }
    }
}

/// Converts a NetworkManager device state reason code to a specific `ConnectionError`.
///
/// Maps authentication-related failures to `AuthFailed`, DHCP issues to `DhcpFailed`,
/// and other failures to the appropriate variant.
pub fn reason_to_error(code: u32) -> ConnectionError {
    let reason = StateReason::from(code);
    match reason {
        // Authentication failures
        StateReason::NoSecrets
        | StateReason::SupplicantFailed
        | StateReason::SupplicantDisconnected => ConnectionError::AuthFailed,

        // Supplicant configuration issues
        StateReason::SupplicantConfigFailed => ConnectionError::SupplicantConfigFailed,

        // Supplicant timeout
        StateReason::SupplicantTimeout => ConnectionError::SupplicantTimeout,

        // DHCP failures
        StateReason::DhcpStartFailed | StateReason::DhcpError | StateReason::DhcpFailed => {
            ConnectionError::DhcpFailed
        }

        // Network not found
        StateReason::SsidNotFound => ConnectionError::NotFound,

        // All other failures
        _ => ConnectionError::DeviceFailed(reason),
    }
}

/// Errors that can occur while talking to the network stack.
///
/// These never cross the public façades: the connection core turns them
/// into [`EventType::ConnectionFailed`] or [`EventType::ConnectionAuthFailed`]
/// entries in the event log, or into safe defaults for queries. They are
/// public so that custom [`NetworkBackend`](crate::backend::NetworkBackend)
/// implementations can report failures.
#[derive(Debug, Error)]
pub enum ConnectionError {
    /// A D-Bus communication error occurred.
    #[error("D-Bus error: {0}")]
    Dbus(#[from] zbus::Error),

    /// The requested network or object was not found.
    #[error("network not found")]
    NotFound,

    /// Authentication with the access point failed (wrong password, rejected credentials).
    #[error("authentication failed")]
    AuthFailed,

    /// The supplicant (wpa_supplicant) encountered a configuration error.
    #[error("supplicant configuration failed")]
    SupplicantConfigFailed,

    /// The supplicant timed out during authentication.
    #[error("supplicant timeout")]
    SupplicantTimeout,

    /// DHCP failed to obtain an IP address.
    #[error("DHCP failed")]
    DhcpFailed,

    /// The connection timed out waiting for activation.
    #[error("connection timeout")]
    Timeout,

    /// The connection is stuck in an unexpected state.
    #[error("connection stuck in state: {0}")]
    Stuck(String),

    /// No Wi-Fi device was found on the system.
    #[error("no Wi-Fi device found")]
    NoWifiDevice,

    /// No saved connection exists for the requested network.
    #[error("no saved connection for network")]
    NoSavedConnection,

    /// The key does not match the network's security type.
    #[error("invalid key for {0} network")]
    InvalidKey(SecurityType),

    /// The network thread is not running.
    #[error("network thread unavailable")]
    BridgeUnavailable,

    /// A general connection failure with a device state reason code.
    #[error("connection failed: {0}")]
    DeviceFailed(StateReason),

    /// A connection activation failure with a connection state reason.
    #[error("connection activation failed: {0}")]
    ActivationFailed(ConnectionStateReason),

    /// The network thread could not be started.
    #[error("failed to start network thread: {0}")]
    Io(#[from] std::io::Error),
}

impl ConnectionError {
    /// Returns `true` if the failure was caused by rejected or missing credentials.
    pub fn is_auth_failure(&self) -> bool {
        matches!(self, Self::AuthFailed | Self::InvalidKey(_))
    }

    /// The event type used to record this failure in the connection log.
    pub fn event_type(&self) -> EventType {
        if self.is_auth_failure() {
            EventType::ConnectionAuthFailed
        } else {
            EventType::ConnectionFailed
        }
    }
}
