//! NetworkManager Device proxy.

use zbus::{Result, proxy};
use zvariant::OwnedObjectPath;

/// Proxy for the generic device interface.
///
/// The Wi-Fi backend uses it to identify the wireless device, tear down its
/// active connection and follow its state machine.
///
/// # Signals
///
/// `StateChanged` carries the new state, the previous state and a reason
/// code. The previous state matters: a transition to `DISCONNECTED` from
/// `DEACTIVATING` is an orderly disconnect, anything else is a failure.
#[proxy(
    interface = "org.freedesktop.NetworkManager.Device",
    default_service = "org.freedesktop.NetworkManager"
)]
pub trait NMDevice {
    /// Device type as a numeric code (2 = Wi-Fi).
    #[zbus(property)]
    fn device_type(&self) -> Result<u32>;

    /// Whether NetworkManager manages this device.
    #[zbus(property)]
    fn managed(&self) -> Result<bool>;

    /// Path of the device's active connection ("/" if none).
    #[zbus(property)]
    fn active_connection(&self) -> Result<OwnedObjectPath>;

    /// Disconnects the device and blocks autoconnect until the next
    /// explicit activation.
    fn disconnect(&self) -> Result<()>;

    /// Signal emitted when device state changes.
    #[zbus(signal, name = "StateChanged")]
    fn device_state_changed(&self, new_state: u32, old_state: u32, reason: u32);
}
