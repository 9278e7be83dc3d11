use futures::FutureExt;
use log::{debug, info};
use std::sync::Arc;

use crate::Result;
use crate::api::config::WifiConfig;
use crate::api::handles::{
    ApListReader, ConnectionController, DeviceController, DeviceReader, RecordReader,
};
use crate::api::listeners::{
    ApListListener, ConnectionListener, DeviceListener, Subscription, UiDispatcher,
};
use crate::backend::{NetworkBackend, NmBackend};
use crate::core::WifiCore;
use crate::core::bridge::{NetworkThread, job_queue};

/// The Wi-Fi connection core.
///
/// Owns the network thread and the shared modules. Everything a UI needs
/// goes through the façades returned by [`ap_list`](Self::ap_list),
/// [`device`](Self::device), [`device_controller`](Self::device_controller),
/// [`record`](Self::record) and [`connection`](Self::connection), and the
/// `subscribe_*` methods.
///
/// # Example
///
/// ```no_run
/// use nmwifi::{NotificationQueue, WifiService};
///
/// # fn example() -> nmwifi::Result<()> {
/// let ui = NotificationQueue::new();
/// let service = WifiService::start(ui.clone())?;
///
/// for ap in service.ap_list().access_points() {
///     println!("{} ({}%)", ap.ssid(), ap.signal_strength());
/// }
///
/// // Later, on the UI thread's idle hook:
/// ui.run_pending();
/// # Ok(())
/// # }
/// ```
pub struct WifiService {
    pub(crate) core: Arc<WifiCore>,
    bridge: NetworkThread<WifiCore>,
}

impl WifiService {
    /// Connects to NetworkManager on the system bus with the default
    /// configuration.
    pub fn start(dispatcher: Arc<dyn UiDispatcher>) -> Result<Self> {
        Self::with_config(WifiConfig::default(), dispatcher)
    }

    /// Connects to NetworkManager on the system bus.
    pub fn with_config(config: WifiConfig, dispatcher: Arc<dyn UiDispatcher>) -> Result<Self> {
        let backend = futures::executor::block_on(NmBackend::new())?;
        Self::start_with_backend(Arc::new(backend), config, dispatcher)
    }

    /// Starts the core on top of any [`NetworkBackend`].
    ///
    /// Blocks until the network thread has subscribed to the backend and
    /// loaded the device state, visible networks, saved connections and the
    /// current connection.
    pub fn start_with_backend(
        backend: Arc<dyn NetworkBackend>,
        config: WifiConfig,
        dispatcher: Arc<dyn UiDispatcher>,
    ) -> Result<Self> {
        let (jobs, queue) = job_queue();
        let thread_name = config.thread_name.clone();
        let core = Arc::new(WifiCore::new(backend, config, dispatcher, jobs.clone()));

        let bridge = NetworkThread::spawn(&thread_name, core.clone(), jobs, queue, |core| {
            async move { core.initialize().await }.boxed_local()
        })?;
        info!("Wi-Fi service started on thread {thread_name}");
        Ok(Self { core, bridge })
    }

    pub fn ap_list(&self) -> ApListReader<'_> {
        ApListReader { core: &self.core }
    }

    pub fn device(&self) -> DeviceReader<'_> {
        DeviceReader { core: &self.core }
    }

    pub fn device_controller(&self) -> DeviceController<'_> {
        DeviceController {
            core: &self.core,
            bridge: &self.bridge,
        }
    }

    pub fn record(&self) -> RecordReader<'_> {
        RecordReader { core: &self.core }
    }

    pub fn connection(&self) -> ConnectionController<'_> {
        ConnectionController {
            bridge: &self.bridge,
        }
    }

    /// Registers for wireless enabled/disabled notifications.
    pub fn subscribe_device(&self, listener: Arc<dyn DeviceListener>) -> Subscription {
        self.core.notifier.device.subscribe(listener)
    }

    /// Registers for connection events.
    pub fn subscribe_connection(&self, listener: Arc<dyn ConnectionListener>) -> Subscription {
        self.core.notifier.connection.subscribe(listener)
    }

    /// Registers for access point changes.
    pub fn subscribe_ap_list(&self, listener: Arc<dyn ApListListener>) -> Subscription {
        self.core.notifier.ap_list.subscribe(listener)
    }

    /// Waits until every action queued so far, and every backend signal
    /// received so far, has been handled. Returns `false` if the service
    /// is shut down.
    pub fn flush(&self) -> bool {
        self.bridge.flush()
    }

    /// Stops the network thread. Idempotent; also happens on drop.
    ///
    /// Readers keep returning the last known state. Commands are dropped.
    pub fn shutdown(&self) {
        debug!("Shutting down Wi-Fi service");
        self.bridge.shutdown();
    }

    #[cfg(test)]
    pub(crate) fn core(&self) -> &WifiCore {
        &self.core
    }
}

impl std::fmt::Debug for WifiService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WifiService")
            .field("device", &self.device().status())
            .field("access_points", &self.ap_list().len())
            .finish_non_exhaustive()
    }
}
