//! NetworkManager Settings proxy.

use zbus::{Result, proxy};
use zvariant::OwnedObjectPath;

/// Proxy for the saved connection store.
///
/// Saved profiles are listed here; each profile is then read through a
/// `Settings.Connection` proxy built with
/// [`connection_settings_proxy`](crate::util::utils::connection_settings_proxy).
#[proxy(
    interface = "org.freedesktop.NetworkManager.Settings",
    default_service = "org.freedesktop.NetworkManager",
    default_path = "/org/freedesktop/NetworkManager/Settings"
)]
pub trait NMSettings {
    /// Paths of all saved connection profiles.
    fn list_connections(&self) -> Result<Vec<OwnedObjectPath>>;

    /// Signal emitted when a profile is added.
    #[zbus(signal)]
    fn new_connection(&self, connection: OwnedObjectPath);

    /// Signal emitted when a profile is deleted.
    #[zbus(signal)]
    fn connection_removed(&self, connection: OwnedObjectPath);
}
