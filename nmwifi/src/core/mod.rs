//! Core internal logic for connection management.
//!
//! [`WifiCore`] is the shared context every module operates on. It is owned
//! by the network thread; façades only read its caches (under short-lived
//! locks) and queue jobs for anything that touches the network stack.
//!
//! When several locks are held at once they are taken in the order
//! `saved`, `ap_list`, `record`, `device`. Listener notifications are sent
//! after the locks are released.

pub(crate) mod ap_list;
pub(crate) mod bridge;
pub(crate) mod control;
pub(crate) mod device;
pub(crate) mod events;
pub(crate) mod record;
pub(crate) mod saved;

use std::sync::{Arc, RwLock};

use crate::api::config::WifiConfig;
use crate::api::listeners::{Notifier, UiDispatcher};
use crate::backend::{NetworkBackend, SavedConnection};
use ap_list::ApList;
use bridge::JobSender;
use control::ConnectionControl;
use device::DeviceModule;
use record::ConnectionRecord;

pub(crate) struct WifiCore {
    pub(crate) backend: Arc<dyn NetworkBackend>,
    pub(crate) config: WifiConfig,
    pub(crate) ap_list: RwLock<ApList>,
    pub(crate) device: RwLock<DeviceModule>,
    pub(crate) record: RwLock<ConnectionRecord>,
    pub(crate) saved: RwLock<Vec<SavedConnection>>,
    pub(crate) control: tokio::sync::Mutex<ConnectionControl>,
    pub(crate) notifier: Notifier,
    pub(crate) jobs: JobSender<WifiCore>,
}

impl WifiCore {
    pub(crate) fn new(
        backend: Arc<dyn NetworkBackend>,
        config: WifiConfig,
        dispatcher: Arc<dyn UiDispatcher>,
        jobs: JobSender<WifiCore>,
    ) -> Self {
        let capacity = config.record_capacity;
        Self {
            backend,
            config,
            ap_list: RwLock::new(ApList::new()),
            device: RwLock::new(DeviceModule::new()),
            record: RwLock::new(ConnectionRecord::new(capacity)),
            saved: RwLock::new(Vec::new()),
            control: tokio::sync::Mutex::new(ConnectionControl::new()),
            notifier: Notifier::new(dispatcher),
            jobs,
        }
    }
}
