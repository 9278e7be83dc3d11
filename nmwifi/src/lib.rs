//! Wi-Fi connection state tracking and control over NetworkManager, for
//! embedded shells and other single-UI-thread hosts.
//!
//! This crate keeps three pieces of state in sync with the network stack:
//!
//! - the visible networks, one record per SSID/mode/security combination
//! - the Wi-Fi device: present or not, enabled or not, mid-change or not
//! - an append-only log of connection events, from which "connected" and
//!   "connecting" are derived
//!
//! and drives connection attempts: reuse a saved profile or create one
//! from a key, try every visible BSSID, classify failures as
//! authentication or other, and give up after a timeout.
//!
//! # Threads
//!
//! All network-stack access happens on one dedicated thread started by
//! [`WifiService`]. UI code reads state through façades that take short
//! read locks, issues commands that return immediately, and receives
//! notifications through a [`UiDispatcher`], which decides where listener
//! callbacks run.
//!
//! # Example
//!
//! ```
//! use nmwifi::{ApMode, EventType, MockNetwork, NotificationQueue, SecurityType, WifiConfig, WifiService};
//!
//! # fn main() -> nmwifi::Result<()> {
//! let network = MockNetwork::new();
//! network.add_access_point("home-net", ApMode::Infrastructure, SecurityType::Rsn, 70);
//! network.set_password("home-net", "correct horse");
//!
//! let service = WifiService::start_with_backend(
//!     network.clone(),
//!     WifiConfig::default(),
//!     NotificationQueue::new(),
//! )?;
//!
//! let ap = service.ap_list().access_points().remove(0);
//! service.connection().connect_to_access_point(&ap, "correct horse");
//! service.flush();
//!
//! assert!(service.record().is_connected());
//! assert_eq!(
//!     service.record().latest_event().map(|e| e.event_type()),
//!     Some(EventType::Connected)
//! );
//! # Ok(())
//! # }
//! ```
//!
//! # Error Handling
//!
//! Network-stack failures never reach façade callers. They are logged and
//! turned into connection events ([`EventType::ConnectionAuthFailed`] or
//! [`EventType::ConnectionFailed`]) or safe defaults. Only starting the
//! service returns a [`Result`].
//!
//! # Logging
//!
//! This crate uses the [`log`](https://docs.rs/log) facade. Security keys
//! are never logged.

mod core;
mod dbus;
mod types;
mod util;

pub mod api;
pub mod backend;

pub use api::config::WifiConfig;
pub use api::handles::{
    ApListReader, ConnectionController, DeviceController, DeviceReader, RecordReader,
};
pub use api::listeners::{
    ApListListener, ConnectionListener, DeviceListener, NotificationQueue, Subscription,
    UiDispatcher, UiTask,
};
pub use api::models::{
    AccessPoint, ActiveConnectionState, ApHash, ApMode, ConnectionError, ConnectionEvent,
    ConnectionStateReason, DeviceState, DeviceStatus, EventType, SecurityType, Ssid, StateReason,
    connection_state_reason_to_error, reason_to_error,
};
pub use api::service::WifiService;
pub use backend::{ActivationOutcome, MockNetwork, NetworkBackend, NetworkEvent, NmBackend};

/// A specialized `Result` type for network operations.
pub type Result<T> = std::result::Result<T, ConnectionError>;
