//! Constants for NetworkManager D-Bus interface values.
//!
//! These constants correspond to the numeric codes used by NetworkManager's
//! D-Bus API for device types, states, security flags, and other values.

/// NetworkManager device type constants.
pub mod device_type {
    pub const WIFI: u32 = 2;
}

/// NetworkManager device state constants
pub mod device_state {
    pub const DISCONNECTED: u32 = 30;
    pub const PREPARE: u32 = 40;
    pub const CONFIG: u32 = 50;
    pub const ACTIVATED: u32 = 100;
    pub const DEACTIVATING: u32 = 110;
    pub const FAILED: u32 = 120;
}

/// Connection state reason codes used when reporting activation results
pub mod connection_reason {
    pub const NONE: u32 = 1;
    pub const USER_DISCONNECTED: u32 = 2;
    pub const DEVICE_DISCONNECTED: u32 = 3;
    pub const NO_SECRETS: u32 = 9;
}

/// Device state reason codes used when reporting device transitions
pub mod device_reason {
    pub const NONE: u32 = 0;
    pub const NO_SECRETS: u32 = 7;
    pub const USER_REQUESTED: u32 = 39;
    pub const SSID_NOT_FOUND: u32 = 53;
}

/// WiFi security flag constants
pub mod security_flags {
    pub const WEP: u32 = 0x1;
}

/// WiFi mode constants
pub mod wifi_mode {
    pub const ADHOC: u32 = 1;
    pub const INFRA: u32 = 2;
    pub const AP: u32 = 3;
}

/// D-Bus object paths and interface names not covered by generated proxies.
pub mod dbus_names {
    pub const SERVICE: &str = "org.freedesktop.NetworkManager";
    pub const SETTINGS_CONNECTION: &str = "org.freedesktop.NetworkManager.Settings.Connection";
    pub const ACCESS_POINT: &str = "org.freedesktop.NetworkManager.AccessPoint";
    pub const PROPERTIES: &str = "org.freedesktop.DBus.Properties";
    pub const NO_OBJECT: &str = "/";
}

/// Default timing values.
pub mod timeouts {
    use std::time::Duration;

    /// Maximum time to wait for a connection attempt before abandoning it (5 minutes).
    const CONNECTION_TIMEOUT_SECS: u64 = 300;

    /// Returns the default connection attempt timeout.
    pub fn connection_timeout() -> Duration {
        Duration::from_secs(CONNECTION_TIMEOUT_SECS)
    }
}
