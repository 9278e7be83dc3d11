//! NetworkManager Active Connection proxy.

use zbus::{Result, proxy};
use zvariant::OwnedObjectPath;

/// Proxy for an in-progress or established connection.
///
/// Every activation request returns one of these. Its `StateChanged` signal
/// is the authoritative success/failure report for a pending attempt.
#[proxy(
    interface = "org.freedesktop.NetworkManager.Connection.Active",
    default_service = "org.freedesktop.NetworkManager"
)]
pub trait NMActiveConnection {
    /// Current state of the active connection.
    ///
    /// Values:
    /// - 0: Unknown
    /// - 1: Activating
    /// - 2: Activated
    /// - 3: Deactivating
    /// - 4: Deactivated
    #[zbus(property)]
    fn state(&self) -> Result<u32>;

    /// Path to the access point used for this connection.
    #[zbus(property)]
    fn specific_object(&self) -> Result<OwnedObjectPath>;

    /// Signal emitted when the connection activation state changes.
    ///
    /// Named `activation_state_changed` to avoid clashing with the `state`
    /// property's change stream.
    #[zbus(signal, name = "StateChanged")]
    fn activation_state_changed(&self, state: u32, reason: u32);
}
