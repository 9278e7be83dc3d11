//! NetworkManager over the system D-Bus.
//!
//! Queries and commands map one-to-one onto NetworkManager method calls.
//! Events are produced by forwarder tasks that translate D-Bus signals into
//! [`NetworkEvent`]s:
//!
//! - `WirelessEnabled` property changes on the manager object
//! - `DeviceAdded` / `DeviceRemoved`, re-binding to the current Wi-Fi device
//! - `AccessPointAdded` / `AccessPointRemoved` and `StateChanged` on that device
//! - `PropertiesChanged` on access points, filtered down to `Strength`
//! - `NewConnection` / `ConnectionRemoved` on the settings object
//! - `StateChanged` on every active connection this backend starts
//!
//! Forwarders are spawned on the runtime that calls
//! [`NetworkBackend::subscribe`], which is always the network thread.

use async_trait::async_trait;
use futures::channel::mpsc::{UnboundedSender, unbounded};
use futures::stream::{self, BoxStream};
use futures::{Future, StreamExt};
use log::{debug, warn};
use std::collections::HashMap;
use std::sync::Mutex;
use zbus::{Connection, MatchRule, MessageStream};
use zvariant::{OwnedObjectPath, OwnedValue, Value};

use super::profile::{build_wifi_settings, parse_saved_connection};
use super::{
    ActiveConnectionInfo, ConnectionProfile, NativeAccessPoint, NetworkBackend, NetworkEvent,
    NewActivation, SavedConnection,
};
use crate::Result;
use crate::api::models::{
    ActiveConnectionState, ApMode, ConnectionError, DeviceState, SecurityType, Ssid,
};
use crate::dbus::{
    NMAccessPointProxy, NMActiveConnectionProxy, NMDeviceProxy, NMProxy, NMSettingsProxy,
    NMWirelessProxy,
};
use crate::try_log;
use crate::types::constants::{connection_reason, dbus_names, device_type};
use crate::util::utils::{connection_settings_proxy, mutex_lock, non_root_path};

/// NetworkManager backend.
///
/// # Example
///
/// ```no_run
/// use nmwifi::{NmBackend, NotificationQueue, WifiConfig, WifiService};
///
/// # async fn example() -> nmwifi::Result<()> {
/// let backend = NmBackend::new().await?;
/// let service = WifiService::start_with_backend(
///     std::sync::Arc::new(backend),
///     WifiConfig::default(),
///     NotificationQueue::new(),
/// )?;
/// # Ok(())
/// # }
/// ```
pub struct NmBackend {
    conn: Connection,
    events: Mutex<Option<UnboundedSender<NetworkEvent>>>,
}

impl NmBackend {
    /// Connects to the system bus.
    pub async fn new() -> Result<Self> {
        let conn = Connection::system().await?;
        Ok(Self::with_connection(conn))
    }

    /// Uses an existing bus connection.
    pub fn with_connection(conn: Connection) -> Self {
        Self {
            conn,
            events: Mutex::new(None),
        }
    }

    async fn wifi_device(&self) -> Result<Option<OwnedObjectPath>> {
        wifi_device_path(&self.conn).await
    }

    async fn require_wifi_device(&self) -> Result<OwnedObjectPath> {
        self.wifi_device()
            .await?
            .ok_or(ConnectionError::NoWifiDevice)
    }

    fn watch_activation(&self, active_path: OwnedObjectPath) {
        let Some(tx) = mutex_lock(&self.events).clone() else {
            debug!("No subscriber, not watching {active_path}");
            return;
        };
        spawn_forwarder(
            "activation",
            forward_activation(self.conn.clone(), active_path, tx),
        );
    }
}

fn object_path(path: &str) -> Result<OwnedObjectPath> {
    Ok(OwnedObjectPath::try_from(path).map_err(zbus::Error::from)?)
}

/// Finds the first managed Wi-Fi device.
async fn wifi_device_path(conn: &Connection) -> Result<Option<OwnedObjectPath>> {
    let nm = NMProxy::new(conn).await?;
    for path in nm.get_devices().await? {
        let dev = NMDeviceProxy::builder(conn)
            .path(path.clone())?
            .build()
            .await?;
        if dev.device_type().await? != device_type::WIFI {
            continue;
        }
        if !dev.managed().await.unwrap_or(false) {
            debug!("Skipping unmanaged Wi-Fi device {path}");
            continue;
        }
        return Ok(Some(path));
    }
    Ok(None)
}

async fn read_access_point(conn: &Connection, path: OwnedObjectPath) -> Result<NativeAccessPoint> {
    let ap = NMAccessPointProxy::builder(conn)
        .path(path.clone())?
        .build()
        .await?;
    let ssid = Ssid::new(ap.ssid().await?);
    let security = SecurityType::from_flags(
        ap.flags().await?,
        ap.wpa_flags().await?,
        ap.rsn_flags().await?,
    );
    Ok(NativeAccessPoint {
        path: path.to_string(),
        bssid: ap.hw_address().await?,
        ssid,
        mode: ApMode::from(ap.mode().await?),
        security,
        strength: ap.strength().await?.min(100),
    })
}

async fn read_saved_connection(conn: &Connection, path: OwnedObjectPath) -> Option<SavedConnection> {
    let proxy = try_log!(
        connection_settings_proxy(conn, path.clone()).await,
        "Failed to build settings proxy"
    );
    let msg = try_log!(
        proxy.call_method("GetSettings", &()).await,
        format!("Failed to get settings for {path}")
    );
    let body = msg.body();
    let settings: HashMap<String, HashMap<String, Value>> =
        try_log!(body.deserialize(), "Malformed connection settings");
    parse_saved_connection(path.to_string(), &settings)
}

fn spawn_forwarder<F>(name: &'static str, forwarder: F)
where
    F: Future<Output = Result<()>> + Send + 'static,
{
    tokio::spawn(async move {
        match forwarder.await {
            Ok(()) => debug!("{name} forwarder finished"),
            Err(e) => warn!("{name} forwarder stopped: {e}"),
        }
    });
}

fn send(tx: &UnboundedSender<NetworkEvent>, event: NetworkEvent) -> Result<()> {
    tx.unbounded_send(event)
        .map_err(|_| ConnectionError::Stuck("event receiver dropped".into()))
}

async fn forward_wireless_enabled(conn: Connection, tx: UnboundedSender<NetworkEvent>) -> Result<()> {
    let nm = NMProxy::new(&conn).await?;
    let mut changes = nm.receive_wireless_enabled_changed().await;
    while let Some(change) = changes.next().await {
        let enabled = change.get().await?;
        debug!("WirelessEnabled changed to {enabled}");
        send(&tx, NetworkEvent::WirelessEnabledChanged(enabled))?;
    }
    Err(ConnectionError::Stuck("signal stream ended".into()))
}

/// Signals of one Wi-Fi device, as a single event stream.
async fn device_events(
    conn: &Connection,
    path: OwnedObjectPath,
) -> Result<BoxStream<'static, NetworkEvent>> {
    let wifi = NMWirelessProxy::builder(conn)
        .path(path.clone())?
        .build()
        .await?;
    let dev = NMDeviceProxy::builder(conn)
        .path(path.clone())?
        .build()
        .await?;

    let reader = conn.clone();
    let added = wifi
        .receive_access_point_added()
        .await?
        .filter_map(move |signal| {
            let conn = reader.clone();
            async move {
                let path = try_log!(signal.args(), "Bad AccessPointAdded signal").path;
                let ap = try_log!(
                    read_access_point(&conn, path).await,
                    "Failed to read new access point"
                );
                Some(NetworkEvent::AccessPointAdded(ap))
            }
        });

    let removed = wifi
        .receive_access_point_removed()
        .await?
        .filter_map(|signal| async move {
            let args = try_log!(signal.args(), "Bad AccessPointRemoved signal");
            Some(NetworkEvent::AccessPointRemoved {
                path: args.path.to_string(),
            })
        });

    let state = dev
        .receive_device_state_changed()
        .await?
        .filter_map(|signal| async move {
            let args = try_log!(signal.args(), "Bad device StateChanged signal");
            Some(NetworkEvent::DeviceStateChanged {
                new_state: DeviceState::from(args.new_state),
                old_state: DeviceState::from(args.old_state),
                reason: args.reason,
            })
        });

    debug!("Subscribed to Wi-Fi device signals on {path}");
    Ok(stream::select_all([added.boxed(), removed.boxed(), state.boxed()]).boxed())
}

/// Follows the Wi-Fi device across hotplug and forwards its signals.
async fn forward_device(conn: Connection, tx: UnboundedSender<NetworkEvent>) -> Result<()> {
    let nm = NMProxy::new(&conn).await?;
    let mut added = nm.receive_device_added().await?;
    let mut removed = nm.receive_device_removed().await?;

    loop {
        let mut events = match wifi_device_path(&conn).await? {
            Some(path) => device_events(&conn, path).await?,
            None => {
                debug!("No Wi-Fi device, waiting for hotplug");
                stream::pending().boxed()
            }
        };

        loop {
            tokio::select! {
                Some(_) = added.next() => break,
                Some(_) = removed.next() => break,
                Some(event) = events.next() => send(&tx, event)?,
                else => return Err(ConnectionError::Stuck("signal stream ended".into())),
            }
        }

        debug!("Device set changed");
        send(&tx, NetworkEvent::DevicesChanged)?;
    }
}

async fn forward_strength(conn: Connection, tx: UnboundedSender<NetworkEvent>) -> Result<()> {
    let rule = MatchRule::builder()
        .msg_type(zbus::message::Type::Signal)
        .interface(dbus_names::PROPERTIES)?
        .member("PropertiesChanged")?
        .arg(0, dbus_names::ACCESS_POINT)?
        .build();
    let mut messages = MessageStream::for_match_rule(rule, &conn, None).await?;

    while let Some(msg) = messages.next().await {
        let msg = match msg {
            Ok(msg) => msg,
            Err(e) => {
                warn!("Bad PropertiesChanged message: {e}");
                continue;
            }
        };
        let header = msg.header();
        let Some(path) = header.path() else {
            continue;
        };
        let body = msg.body();
        let (_, changed, _): (String, HashMap<String, OwnedValue>, Vec<String>) =
            match body.deserialize() {
                Ok(parts) => parts,
                Err(e) => {
                    warn!("Malformed PropertiesChanged body: {e}");
                    continue;
                }
            };
        if let Some(strength) = changed
            .get("Strength")
            .and_then(|v| u8::try_from(v.clone()).ok())
        {
            send(
                &tx,
                NetworkEvent::SignalStrengthChanged {
                    path: path.to_string(),
                    strength: strength.min(100),
                },
            )?;
        }
    }
    Err(ConnectionError::Stuck("signal stream ended".into()))
}

async fn forward_settings(conn: Connection, tx: UnboundedSender<NetworkEvent>) -> Result<()> {
    let settings = NMSettingsProxy::new(&conn).await?;
    let added = settings.receive_new_connection().await?.map(|_| ());
    let removed = settings.receive_connection_removed().await?.map(|_| ());
    let mut changes = stream::select(added, removed);
    while changes.next().await.is_some() {
        send(&tx, NetworkEvent::SavedConnectionsChanged)?;
    }
    Err(ConnectionError::Stuck("signal stream ended".into()))
}

/// Forwards activation state changes until the connection is gone.
async fn forward_activation(
    conn: Connection,
    active_path: OwnedObjectPath,
    tx: UnboundedSender<NetworkEvent>,
) -> Result<()> {
    let active = NMActiveConnectionProxy::builder(&conn)
        .path(active_path.clone())?
        .build()
        .await?;

    // Subscribe before reading the current state so no transition is lost.
    let mut changes = active.receive_activation_state_changed().await?;
    let path = active_path.to_string();

    let current = ActiveConnectionState::from(active.state().await?);
    send(
        &tx,
        NetworkEvent::ActivationStateChanged {
            path: path.clone(),
            state: current,
            reason: connection_reason::NONE,
        },
    )?;
    if current == ActiveConnectionState::Deactivated {
        return Ok(());
    }

    while let Some(signal) = changes.next().await {
        let args = match signal.args() {
            Ok(args) => args,
            Err(e) => {
                warn!("Failed to parse StateChanged signal args: {e}");
                continue;
            }
        };
        let state = ActiveConnectionState::from(args.state);
        send(
            &tx,
            NetworkEvent::ActivationStateChanged {
                path: path.clone(),
                state,
                reason: args.reason,
            },
        )?;
        if state == ActiveConnectionState::Deactivated {
            return Ok(());
        }
    }
    // The object vanished without a final signal.
    send(
        &tx,
        NetworkEvent::ActivationStateChanged {
            path,
            state: ActiveConnectionState::Deactivated,
            reason: connection_reason::NONE,
        },
    )
}

#[async_trait]
impl NetworkBackend for NmBackend {
    async fn wifi_device_exists(&self) -> Result<bool> {
        Ok(self.wifi_device().await?.is_some())
    }

    async fn wireless_enabled(&self) -> Result<bool> {
        if self.wifi_device().await?.is_none() {
            return Ok(false);
        }
        let nm = NMProxy::new(&self.conn).await?;
        Ok(nm.wireless_enabled().await?)
    }

    async fn set_wireless_enabled(&self, enabled: bool) -> Result<()> {
        self.require_wifi_device().await?;
        let nm = NMProxy::new(&self.conn).await?;
        nm.set_wireless_enabled(enabled).await?;
        debug!("Requested WirelessEnabled={enabled}");
        Ok(())
    }

    async fn request_scan(&self) -> Result<()> {
        let path = self.require_wifi_device().await?;
        let wifi = NMWirelessProxy::builder(&self.conn)
            .path(path)?
            .build()
            .await?;
        wifi.request_scan(HashMap::new()).await?;
        Ok(())
    }

    async fn access_points(&self) -> Result<Vec<NativeAccessPoint>> {
        let Some(path) = self.wifi_device().await? else {
            return Ok(Vec::new());
        };
        let wifi = NMWirelessProxy::builder(&self.conn)
            .path(path)?
            .build()
            .await?;

        let mut result = Vec::new();
        for ap_path in wifi.access_points().await? {
            match read_access_point(&self.conn, ap_path.clone()).await {
                Ok(ap) => result.push(ap),
                // The access point may vanish between listing and reading.
                Err(e) => debug!("Skipping access point {ap_path}: {e}"),
            }
        }
        Ok(result)
    }

    async fn saved_connections(&self) -> Result<Vec<SavedConnection>> {
        let settings = NMSettingsProxy::new(&self.conn).await?;
        let mut result = Vec::new();
        for path in settings.list_connections().await? {
            if let Some(saved) = read_saved_connection(&self.conn, path).await {
                result.push(saved);
            }
        }
        Ok(result)
    }

    async fn delete_saved_connection(&self, path: &str) -> Result<()> {
        let proxy = connection_settings_proxy(&self.conn, object_path(path)?).await?;
        proxy.call_method("Delete", &()).await?;
        debug!("Deleted connection: {path}");
        Ok(())
    }

    async fn activate_saved(&self, profile_path: &str, ap_path: &str) -> Result<String> {
        let device = self.require_wifi_device().await?;
        let nm = NMProxy::new(&self.conn).await?;
        let active = nm
            .activate_connection(object_path(profile_path)?, device, object_path(ap_path)?)
            .await?;
        debug!("activate_connection() succeeded, active connection: {active}");
        let path = active.to_string();
        self.watch_activation(active);
        Ok(path)
    }

    async fn add_and_activate(
        &self,
        profile: &ConnectionProfile,
        ap_path: &str,
    ) -> Result<NewActivation> {
        let device = self.require_wifi_device().await?;
        let nm = NMProxy::new(&self.conn).await?;
        let settings = build_wifi_settings(profile);
        let (profile_path, active) = nm
            .add_and_activate_connection(settings, device, object_path(ap_path)?)
            .await?;
        debug!("Created profile {profile_path}, active connection {active}");
        let result = NewActivation {
            profile_path: profile_path.to_string(),
            active_path: active.to_string(),
        };
        self.watch_activation(active);
        Ok(result)
    }

    async fn deactivate(&self, active_path: &str) -> Result<()> {
        let nm = NMProxy::new(&self.conn).await?;
        nm.deactivate_connection(object_path(active_path)?).await?;
        Ok(())
    }

    async fn disconnect_device(&self) -> Result<()> {
        let path = self.require_wifi_device().await?;
        let dev = NMDeviceProxy::builder(&self.conn)
            .path(path)?
            .build()
            .await?;
        dev.disconnect().await?;
        Ok(())
    }

    async fn active_connection(&self) -> Result<Option<ActiveConnectionInfo>> {
        let Some(path) = self.wifi_device().await? else {
            return Ok(None);
        };
        let dev = NMDeviceProxy::builder(&self.conn)
            .path(path)?
            .build()
            .await?;
        let Some(active_path) = non_root_path(dev.active_connection().await?) else {
            return Ok(None);
        };
        let active = NMActiveConnectionProxy::builder(&self.conn)
            .path(active_path.clone())?
            .build()
            .await?;
        Ok(Some(ActiveConnectionInfo {
            path: active_path.to_string(),
            access_point_path: non_root_path(active.specific_object().await?)
                .map(|p| p.to_string()),
            state: ActiveConnectionState::from(active.state().await?),
        }))
    }

    async fn subscribe(&self) -> Result<BoxStream<'static, NetworkEvent>> {
        let (tx, rx) = unbounded();
        *mutex_lock(&self.events) = Some(tx.clone());

        spawn_forwarder(
            "wireless-enabled",
            forward_wireless_enabled(self.conn.clone(), tx.clone()),
        );
        spawn_forwarder("device", forward_device(self.conn.clone(), tx.clone()));
        spawn_forwarder("strength", forward_strength(self.conn.clone(), tx.clone()));
        spawn_forwarder("settings", forward_settings(self.conn.clone(), tx));

        Ok(rx.boxed())
    }
}
