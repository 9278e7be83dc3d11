//! D-Bus proxy interfaces for NetworkManager.
//!
//! This module contains low-level D-Bus proxy definitions for communicating
//! with NetworkManager over the system bus. Only the Wi-Fi backend uses them.

mod access_point;
mod active_connection;
mod device;
mod main_nm;
mod settings;
mod wireless;

pub(crate) use access_point::NMAccessPointProxy;
pub(crate) use active_connection::NMActiveConnectionProxy;
pub(crate) use device::NMDeviceProxy;
pub(crate) use main_nm::NMProxy;
pub(crate) use settings::NMSettingsProxy;
pub(crate) use wireless::NMWirelessProxy;
