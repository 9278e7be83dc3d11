//! Runtime configuration for [`WifiService`](crate::WifiService).

use std::time::Duration;

use crate::types::constants::timeouts;

/// Tunables for the Wi-Fi connection core.
///
/// # Example
///
/// ```
/// use nmwifi::WifiConfig;
/// use std::time::Duration;
///
/// let config = WifiConfig::new()
///     .with_connection_timeout(Duration::from_secs(60))
///     .with_record_capacity(64);
/// assert_eq!(config.connection_timeout, Duration::from_secs(60));
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WifiConfig {
    /// How long a connection attempt may stay unresolved before it is
    /// cancelled and recorded as failed.
    pub connection_timeout: Duration,
    /// Request a scan when the target network has no visible access point.
    pub scan_on_connect: bool,
    /// Number of events kept in the connection log. Older events are
    /// dropped, except the most recent event for each access point.
    pub record_capacity: usize,
    /// Name given to the network thread.
    pub thread_name: String,
}

impl Default for WifiConfig {
    fn default() -> Self {
        Self {
            connection_timeout: timeouts::connection_timeout(),
            scan_on_connect: true,
            record_capacity: 256,
            thread_name: "nmwifi-network".into(),
        }
    }
}

impl WifiConfig {
    /// Creates a configuration with default values.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the connection attempt timeout.
    pub fn with_connection_timeout(mut self, timeout: Duration) -> Self {
        self.connection_timeout = timeout;
        self
    }

    /// Enables or disables scanning for unseen target networks.
    pub fn with_scan_on_connect(mut self, enabled: bool) -> Self {
        self.scan_on_connect = enabled;
        self
    }

    /// Sets the connection log retention. Values below 1 are raised to 1.
    pub fn with_record_capacity(mut self, capacity: usize) -> Self {
        self.record_capacity = capacity.max(1);
        self
    }

    /// Sets the network thread name.
    pub fn with_thread_name(mut self, name: impl Into<String>) -> Self {
        self.thread_name = name.into();
        self
    }
}
