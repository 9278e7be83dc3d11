//! Utility functions for SSID decoding, D-Bus proxy construction and
//! lock handling.

use std::borrow::Cow;
use std::sync::{Mutex, MutexGuard, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};
use zbus::Connection;
use zvariant::OwnedObjectPath;

use crate::Result;
use crate::types::constants::dbus_names;

/// Decode SSID bytes for display. Empty SSIDs show as `<Hidden Network>`,
/// invalid UTF-8 is replaced with U+FFFD.
pub(crate) fn decode_ssid_or_hidden(bytes: &[u8]) -> Cow<'_, str> {
    if bytes.is_empty() {
        return Cow::Borrowed("<Hidden Network>");
    }
    String::from_utf8_lossy(bytes)
}

/// Acquires a read guard, recovering the data if a writer panicked.
pub(crate) fn read_lock<T>(lock: &RwLock<T>) -> RwLockReadGuard<'_, T> {
    lock.read().unwrap_or_else(PoisonError::into_inner)
}

/// Acquires a write guard, recovering the data if a writer panicked.
pub(crate) fn write_lock<T>(lock: &RwLock<T>) -> RwLockWriteGuard<'_, T> {
    lock.write().unwrap_or_else(PoisonError::into_inner)
}

/// Locks a mutex, recovering the data if a holder panicked.
pub(crate) fn mutex_lock<T>(lock: &Mutex<T>) -> MutexGuard<'_, T> {
    lock.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Returns `None` for NetworkManager's "no object" path (`/`).
pub(crate) fn non_root_path(path: OwnedObjectPath) -> Option<OwnedObjectPath> {
    if path.as_str() == dbus_names::NO_OBJECT {
        None
    } else {
        Some(path)
    }
}

/// Helper to create a NetworkManager D-Bus proxy for a given path and interface.
///
/// Returns a zbus Proxy instance for the specified path and interface.
pub(crate) async fn nm_proxy<'a, P>(
    conn: &'a Connection,
    path: P,
    interface: &'a str,
) -> Result<zbus::Proxy<'a>>
where
    P: TryInto<OwnedObjectPath>,
    P::Error: Into<zbus::Error>,
{
    let owned_path = path.try_into().map_err(Into::into)?;
    Ok(zbus::proxy::Builder::new(conn)
        .destination(dbus_names::SERVICE)?
        .path(owned_path)?
        .interface(interface)?
        .build()
        .await?)
}

/// Helper to create a Settings.Connection proxy for a specific saved connection.
pub(crate) async fn connection_settings_proxy<'a, P>(
    conn: &'a Connection,
    connection_path: P,
) -> Result<zbus::Proxy<'a>>
where
    P: TryInto<OwnedObjectPath>,
    P::Error: Into<zbus::Error>,
{
    nm_proxy(conn, connection_path, dbus_names::SETTINGS_CONNECTION).await
}

/// Macro to convert Result to Option with error logging.
/// Usage: `try_log!(result, "context message")`
#[macro_export]
macro_rules! try_log {
    ($result:expr, $context:expr) => {
        match $result {
            Ok(value) => value,
            Err(e) => {
                log::warn!("{}: {:?}", $context, e);
                return None;
            }
        }
    };
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_ssid_or_hidden() {
        assert_eq!(decode_ssid_or_hidden(b"MyNetwork"), "MyNetwork");
        assert_eq!(decode_ssid_or_hidden(b""), "<Hidden Network>");
        assert_eq!(decode_ssid_or_hidden(b"Test_SSID-123"), "Test_SSID-123");
        assert_eq!(decode_ssid_or_hidden(&[0xc3, 0x28]), "\u{FFFD}(");
        assert_eq!(decode_ssid_or_hidden(b"cafe\xff"), "cafe\u{FFFD}");
    }

    #[test]
    fn test_poisoned_lock_is_recovered() {
        let lock = std::sync::Arc::new(RwLock::new(5));
        let writer = lock.clone();
        let _ = std::thread::spawn(move || {
            let _guard = writer.write().unwrap();
            panic!("poison the lock");
        })
        .join();
        assert!(lock.is_poisoned());
        assert_eq!(*read_lock(&lock), 5);
        *write_lock(&lock) = 6;
        assert_eq!(*read_lock(&lock), 6);
    }

    #[test]
    fn test_non_root_path() {
        let root = OwnedObjectPath::try_from("/").unwrap();
        let ap = OwnedObjectPath::try_from("/org/freedesktop/NetworkManager/AccessPoint/3").unwrap();
        assert!(non_root_path(root).is_none());
        assert_eq!(
            non_root_path(ap).map(|p| p.to_string()),
            Some("/org/freedesktop/NetworkManager/AccessPoint/3".to_string())
        );
    }
}
