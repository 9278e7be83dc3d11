//! End-to-end behaviour of the service against the in-memory network.
//!
//! Every test drives `MockNetwork` from the test thread, waits for the
//! network thread with `flush()`, then drains UI notifications with
//! `run_pending()`.

use std::sync::{Arc, Mutex};
use std::time::{Duration, SystemTime};

use futures::executor::block_on;
use nmwifi::{
    AccessPoint, ActivationOutcome, ActiveConnectionState, ApListListener, ApMode,
    ConnectionListener, DeviceListener, EventType, MockNetwork, NetworkBackend, NotificationQueue,
    SecurityType, WifiConfig, WifiService,
};

fn start(network: &Arc<MockNetwork>) -> (WifiService, Arc<NotificationQueue>) {
    let ui = NotificationQueue::new();
    let service =
        WifiService::start_with_backend(network.clone(), WifiConfig::default(), ui.clone())
            .unwrap();
    service.flush();
    (service, ui)
}

fn find(service: &WifiService, ssid: &str) -> AccessPoint {
    service
        .ap_list()
        .access_points()
        .into_iter()
        .find(|ap| ap.ssid().to_string() == ssid)
        .unwrap()
}

fn latest_type(service: &WifiService) -> Option<EventType> {
    service.record().latest_event().map(|e| e.event_type())
}

#[derive(Default)]
struct Log(Mutex<Vec<String>>);

impl Log {
    fn push(&self, entry: String) {
        self.0.lock().unwrap().push(entry);
    }

    fn entries(&self) -> Vec<String> {
        self.0.lock().unwrap().clone()
    }
}

fn name(ap: Option<&AccessPoint>) -> String {
    ap.map(|ap| ap.ssid().to_string()).unwrap_or_default()
}

impl DeviceListener for Log {
    fn wireless_enabled(&self) {
        self.push("enabled".into());
    }

    fn wireless_disabled(&self) {
        self.push("disabled".into());
    }
}

impl ConnectionListener for Log {
    fn started_connecting(&self, ap: Option<&AccessPoint>) {
        self.push(format!("connecting {}", name(ap)));
    }

    fn connected(&self, ap: Option<&AccessPoint>) {
        self.push(format!("connected {}", name(ap)));
    }

    fn disconnected(&self, ap: Option<&AccessPoint>) {
        self.push(format!("disconnected {}", name(ap)));
    }

    fn connection_auth_failed(&self, ap: Option<&AccessPoint>) {
        self.push(format!("auth failed {}", name(ap)));
    }

    fn connection_failed(&self, ap: Option<&AccessPoint>) {
        self.push(format!("failed {}", name(ap)));
    }
}

impl ApListListener for Log {
    fn access_point_added(&self, ap: &AccessPoint) {
        self.push(format!("added {}", ap.ssid()));
    }

    fn access_point_removed(&self, ap: &AccessPoint) {
        self.push(format!("removed {}", ap.ssid()));
    }

    fn signal_strength_changed(&self, ap: &AccessPoint) {
        self.push(format!("strength {} {}", ap.ssid(), ap.signal_strength()));
    }
}

#[test]
fn enabling_without_a_device_does_nothing() {
    let network = MockNetwork::without_device();
    let (service, ui) = start(&network);
    let log = Arc::new(Log::default());
    let _sub = service.subscribe_device(log.clone());

    assert!(!service.device().exists());
    service.device_controller().set_enabled(true);
    assert!(!service.device().is_changing());
    service.flush();
    ui.run_pending();

    assert!(!service.device().exists());
    assert!(!service.device().enabled());
    assert!(log.entries().is_empty());
}

#[test]
fn scanned_network_appears_once() {
    let network = MockNetwork::new();
    let (service, _ui) = start(&network);

    network.add_access_point("home-net", ApMode::Infrastructure, SecurityType::Wpa, 40);
    service.flush();

    let aps = service.ap_list().access_points();
    assert_eq!(aps.len(), 1);
    assert_eq!(aps[0].ssid().to_string(), "home-net");
    assert_eq!(aps[0].signal_strength(), 40);
    assert!(!aps[0].has_saved_connection());
}

#[test]
fn bssids_of_one_network_share_a_record() {
    let network = MockNetwork::new();
    let (service, ui) = start(&network);
    let log = Arc::new(Log::default());
    let _sub = service.subscribe_ap_list(log.clone());

    let weak = network.add_access_point("office", ApMode::Infrastructure, SecurityType::Rsn, 30);
    let strong = network.add_access_point("office", ApMode::Infrastructure, SecurityType::Rsn, 80);
    service.flush();
    let hash = find(&service, "office").hash();
    assert_eq!(service.ap_list().len(), 1);
    assert_eq!(find(&service, "office").signal_strength(), 80);

    network.set_strength(&weak, 90);
    service.flush();
    let record = service.ap_list().access_point(&hash).unwrap();
    assert_eq!(record.hash(), hash);
    assert_eq!(record.signal_strength(), 90);

    network.remove_access_point(&weak);
    service.flush();
    assert_eq!(find(&service, "office").signal_strength(), 80);
    network.remove_access_point(&strong);
    service.flush();
    assert!(service.ap_list().is_empty());

    ui.run_pending();
    assert_eq!(
        log.entries(),
        [
            "added office",
            "strength office 80",
            "strength office 90",
            "strength office 80",
            "removed office",
        ]
    );
}

#[test]
fn wrong_key_then_right_key_then_disconnect() {
    let network = MockNetwork::new();
    network.add_access_point("home-net", ApMode::Infrastructure, SecurityType::Wpa, 40);
    network.set_password("home-net", "rightpass");
    let (service, ui) = start(&network);
    let log = Arc::new(Log::default());
    let _sub = service.subscribe_connection(log.clone());
    let home = find(&service, "home-net");

    service.connection().connect_to_access_point(&home, "wrongpass");
    service.flush();
    let latest = service.record().latest_event().unwrap();
    assert_eq!(latest.event_type(), EventType::ConnectionAuthFailed);
    assert_eq!(latest.access_point(), Some(&home));
    assert!(!service.record().is_connecting());
    assert!(!service.record().is_connected());
    // The profile built from the rejected key is gone again.
    assert!(network.saved_profiles().is_empty());

    service.connection().connect_to_access_point(&home, "rightpass");
    service.flush();
    assert!(service.record().is_connected());
    assert_eq!(service.record().active_ap(), Some(home.clone()));
    assert!(find(&service, "home-net").has_saved_connection());
    assert_eq!(network.saved_profiles().len(), 1);

    // Losing sight of the network does not touch the log.
    let path = network.connected_access_point().unwrap();
    network.remove_access_point(&path);
    service.flush();
    assert!(service.ap_list().is_empty());
    assert!(service.record().latest_event_for(&home.hash()).is_some());
    assert!(service.record().is_connected());

    service.connection().disconnect();
    service.flush();
    assert!(!service.record().is_connected());
    assert_eq!(latest_type(&service), Some(EventType::Disconnected));
    assert!(network.connected_access_point().is_none());

    let events = service.record().events().len();
    service.connection().disconnect();
    service.flush();
    assert_eq!(service.record().events().len(), events);

    ui.run_pending();
    assert_eq!(
        log.entries(),
        [
            "connecting home-net",
            "auth failed home-net",
            "connecting home-net",
            "connected home-net",
            "disconnected home-net",
        ]
    );
}

#[test]
fn disconnect_when_idle_records_nothing() {
    let network = MockNetwork::new();
    let (service, _ui) = start(&network);

    service.connection().disconnect();
    service.connection().disconnect();
    service.flush();
    assert!(service.record().events().is_empty());
    assert!(service.record().active_ap().is_none());
}

#[test]
fn later_connect_wins() {
    let network = MockNetwork::new();
    network.add_access_point("first", ApMode::Infrastructure, SecurityType::Unsecured, 70);
    network.add_access_point("second", ApMode::Infrastructure, SecurityType::Unsecured, 60);
    network.set_outcome("first", ActivationOutcome::Hang);
    let (service, ui) = start(&network);
    let log = Arc::new(Log::default());
    let _sub = service.subscribe_connection(log.clone());
    let first = find(&service, "first");
    let second = find(&service, "second");

    service.connection().connect_to_access_point(&first, "");
    service.connection().connect_to_access_point(&second, "");
    service.flush();
    assert_eq!(service.record().active_ap(), Some(second.clone()));
    assert!(service.record().is_connected());

    ui.run_pending();
    let entries = log.entries();
    assert!(!entries.contains(&"connected first".to_string()));
    assert_eq!(
        entries.iter().filter(|e| e.as_str() == "connected second").count(),
        1
    );
    assert!(service.record().latest_event_matching(&first.hash(), EventType::Connected).is_none());
}

#[test]
fn switching_networks_records_the_disconnect() {
    let network = MockNetwork::new();
    network.add_access_point("lobby", ApMode::Infrastructure, SecurityType::Unsecured, 70);
    network.add_access_point("office", ApMode::Infrastructure, SecurityType::Wpa, 60);
    network.set_password("office", "rightpass");
    let (service, ui) = start(&network);
    let log = Arc::new(Log::default());
    let _sub = service.subscribe_connection(log.clone());
    let lobby = find(&service, "lobby");

    service.connection().connect_to_access_point(&lobby, "");
    service.flush();
    assert!(service.record().is_connected());

    service
        .connection()
        .connect_to_access_point(&find(&service, "office"), "wrongpass");
    service.flush();
    assert!(network.connected_access_point().is_none());
    assert_eq!(
        service
            .record()
            .latest_event_for(&lobby.hash())
            .map(|e| e.event_type()),
        Some(EventType::Disconnected)
    );
    assert!(service.record().active_ap().is_none());

    ui.run_pending();
    assert_eq!(
        log.entries(),
        [
            "connecting lobby",
            "connected lobby",
            "disconnected lobby",
            "connecting office",
            "auth failed office",
        ]
    );
}

#[test]
fn out_of_range_network_is_joined_when_it_reappears() {
    let network = MockNetwork::new();
    let path = network.add_access_point("garden", ApMode::Infrastructure, SecurityType::Unsecured, 30);
    let (service, _ui) = start(&network);
    let garden = find(&service, "garden");

    network.remove_access_point(&path);
    service.flush();
    assert!(service.ap_list().is_empty());

    service.connection().connect_to_access_point(&garden, "");
    service.flush();
    assert_eq!(network.scan_requests(), 1);
    assert_eq!(network.activation_requests(), 0);
    assert!(service.record().is_connecting());
    assert_eq!(service.record().active_ap(), Some(garden.clone()));

    network.add_access_point("garden", ApMode::Infrastructure, SecurityType::Unsecured, 35);
    service.flush();
    assert_eq!(network.activation_requests(), 1);
    assert!(service.record().is_connected());
    assert_eq!(service.record().active_ap(), Some(garden));
}

#[test]
fn out_of_range_network_that_stays_away_times_out() {
    let network = MockNetwork::new();
    let path = network.add_access_point("garden", ApMode::Infrastructure, SecurityType::Unsecured, 30);
    let config = WifiConfig::default().with_connection_timeout(Duration::from_millis(50));
    let service =
        WifiService::start_with_backend(network.clone(), config, NotificationQueue::new()).unwrap();
    service.flush();
    let garden = find(&service, "garden");
    network.remove_access_point(&path);
    service.flush();

    service.connection().connect_to_access_point(&garden, "");
    service.flush();
    assert!(service.record().is_connecting());

    std::thread::sleep(Duration::from_millis(300));
    service.flush();
    assert_eq!(latest_type(&service), Some(EventType::ConnectionFailed));
    assert_eq!(network.activation_requests(), 0);
}

#[test]
fn connection_made_elsewhere_is_mirrored() {
    let network = MockNetwork::new();
    let path = network.add_access_point("home-net", ApMode::Infrastructure, SecurityType::Unsecured, 40);
    let (service, ui) = start(&network);
    let log = Arc::new(Log::default());
    let _sub = service.subscribe_connection(log.clone());
    let home = find(&service, "home-net");

    network.activate_elsewhere(&path, ActivationOutcome::Succeed);
    service.flush();
    assert!(service.record().is_connected());
    assert_eq!(service.record().active_ap(), Some(home.clone()));

    network.drop_connection();
    service.flush();
    assert!(!service.record().is_connected());
    assert_eq!(latest_type(&service), Some(EventType::Disconnected));

    ui.run_pending();
    assert_eq!(
        log.entries(),
        [
            "connecting home-net",
            "connected home-net",
            "disconnected home-net",
        ]
    );
}

#[test]
fn failures_elsewhere_are_classified_by_reason() {
    let network = MockNetwork::new();
    let locked = network.add_access_point("locked", ApMode::Infrastructure, SecurityType::Wpa, 50);
    let flaky = network.add_access_point("flaky", ApMode::Infrastructure, SecurityType::Unsecured, 50);
    let (service, ui) = start(&network);
    let log = Arc::new(Log::default());
    let _sub = service.subscribe_connection(log.clone());

    network.activate_elsewhere(&locked, ActivationOutcome::Hang);
    service.flush();
    assert!(service.record().is_connecting());
    network.resolve_pending(ActivationOutcome::FailAuth);
    service.flush();
    assert_eq!(latest_type(&service), Some(EventType::ConnectionAuthFailed));

    network.activate_elsewhere(&flaky, ActivationOutcome::Hang);
    service.flush();
    network.resolve_pending(ActivationOutcome::Fail);
    service.flush();
    assert_eq!(latest_type(&service), Some(EventType::ConnectionFailed));

    ui.run_pending();
    assert_eq!(
        log.entries(),
        [
            "connecting locked",
            "auth failed locked",
            "connecting flaky",
            "failed flaky",
        ]
    );
}

#[test]
fn activation_dropped_elsewhere_before_finishing_is_a_failure() {
    let network = MockNetwork::new();
    let path = network.add_access_point("cafe", ApMode::Infrastructure, SecurityType::Unsecured, 50);
    let (service, _ui) = start(&network);
    let cafe = find(&service, "cafe");

    let active = network.activate_elsewhere(&path, ActivationOutcome::Hang);
    service.flush();
    assert!(service.record().is_connecting());

    // Straight from configuring to disconnected, without deactivating.
    block_on(network.deactivate(&active)).unwrap();
    service.flush();
    let latest = service.record().latest_event().unwrap();
    assert_eq!(latest.event_type(), EventType::ConnectionFailed);
    assert_eq!(latest.access_point(), Some(&cafe));
}

#[test]
fn saved_connection_is_reused_without_a_key() {
    let network = MockNetwork::new();
    network.add_access_point("cafe", ApMode::Infrastructure, SecurityType::Rsn, 55);
    network.set_password("cafe", "espresso1");
    let profile = network.add_saved_connection(
        "cafe",
        SecurityType::Rsn,
        Some("espresso1"),
        Some(SystemTime::now() - Duration::from_secs(3600)),
    );
    let (service, _ui) = start(&network);
    let cafe = find(&service, "cafe");
    assert!(cafe.has_saved_connection());
    assert!(cafe.last_connection_time().is_some());

    service.connection().connect_to_access_point(&cafe, "");
    service.flush();
    assert!(service.record().is_connected());
    assert_eq!(network.activation_requests(), 1);
    assert_eq!(network.saved_profiles().len(), 1);
    assert_eq!(network.saved_profiles()[0].path, profile);
}

#[test]
fn older_saved_profile_is_tried_after_newer_one_fails() {
    let network = MockNetwork::new();
    network.add_access_point("cafe", ApMode::Infrastructure, SecurityType::Wpa, 55);
    network.set_password("cafe", "espresso1");
    let now = SystemTime::now();
    network.add_saved_connection("cafe", SecurityType::Wpa, Some("espresso1"), Some(now - Duration::from_secs(7200)));
    network.add_saved_connection("cafe", SecurityType::Wpa, Some("stalekey1"), Some(now - Duration::from_secs(60)));
    let (service, _ui) = start(&network);

    service
        .connection()
        .connect_to_access_point(&find(&service, "cafe"), "");
    service.flush();
    assert!(service.record().is_connected());
    assert_eq!(network.activation_requests(), 2);
    // Saved profiles are never deleted just for failing.
    assert!(network.deleted_profiles().is_empty());
}

#[test]
fn new_key_replaces_saved_profiles() {
    let network = MockNetwork::new();
    network.add_access_point("cafe", ApMode::Infrastructure, SecurityType::Wpa, 55);
    network.set_password("cafe", "newpass12");
    let old = network.add_saved_connection("cafe", SecurityType::Wpa, Some("oldpass12"), None);
    let (service, _ui) = start(&network);

    service
        .connection()
        .connect_to_access_point(&find(&service, "cafe"), "newpass12");
    service.flush();
    assert!(service.record().is_connected());
    assert_eq!(network.deleted_profiles(), [old]);
    assert_eq!(network.saved_profiles().len(), 1);
}

#[test]
fn requests_that_cannot_succeed_are_dropped() {
    let network = MockNetwork::new();
    network.add_access_point("locked", ApMode::Infrastructure, SecurityType::Wpa, 50);
    network.add_access_point("old-wep", ApMode::Infrastructure, SecurityType::Wep, 50);
    let (service, _ui) = start(&network);

    // Secured, no key, nothing saved.
    service
        .connection()
        .connect_to_access_point(&find(&service, "locked"), "");
    // WPA keys are at least eight characters.
    service
        .connection()
        .connect_to_access_point(&find(&service, "locked"), "short");
    // WEP keys have fixed lengths.
    service
        .connection()
        .connect_to_access_point(&find(&service, "old-wep"), "abcdef");
    service.flush();

    assert_eq!(network.activation_requests(), 0);
    assert!(service.record().events().is_empty());
}

#[test]
fn non_auth_failure_is_recorded_and_profile_deleted() {
    let network = MockNetwork::new();
    network.add_access_point("flaky", ApMode::Infrastructure, SecurityType::Unsecured, 20);
    network.set_outcome("flaky", ActivationOutcome::Fail);
    let (service, _ui) = start(&network);
    let flaky = find(&service, "flaky");

    service.connection().connect_to_access_point(&flaky, "");
    service.flush();
    assert_eq!(latest_type(&service), Some(EventType::ConnectionFailed));
    assert_eq!(network.deleted_profiles().len(), 1);
    assert!(network.saved_profiles().is_empty());
    assert!(!find(&service, "flaky").has_saved_connection());
}

#[test]
fn every_bssid_is_tried_before_giving_up() {
    let network = MockNetwork::new();
    network.add_access_point("mesh", ApMode::Infrastructure, SecurityType::Unsecured, 40);
    network.add_access_point("mesh", ApMode::Infrastructure, SecurityType::Unsecured, 90);
    network.set_outcome("mesh", ActivationOutcome::Fail);
    let (service, ui) = start(&network);
    let log = Arc::new(Log::default());
    let _sub = service.subscribe_connection(log.clone());

    service
        .connection()
        .connect_to_access_point(&find(&service, "mesh"), "");
    service.flush();
    assert_eq!(network.activation_requests(), 2);
    ui.run_pending();
    assert_eq!(log.entries(), ["connecting mesh", "failed mesh"]);
}

#[test]
fn attempt_times_out_once() {
    let network = MockNetwork::new();
    network.add_access_point("slow", ApMode::Infrastructure, SecurityType::Unsecured, 60);
    network.set_outcome("slow", ActivationOutcome::Hang);
    let ui = NotificationQueue::new();
    let config = WifiConfig::default().with_connection_timeout(Duration::from_millis(50));
    let service = WifiService::start_with_backend(network.clone(), config, ui.clone()).unwrap();
    service.flush();
    let log = Arc::new(Log::default());
    let _sub = service.subscribe_connection(log.clone());

    service
        .connection()
        .connect_to_access_point(&find(&service, "slow"), "");
    service.flush();
    assert!(service.record().is_connecting());

    std::thread::sleep(Duration::from_millis(300));
    service.flush();
    assert!(!service.record().is_connecting());
    assert!(network.pending_activation().is_none());
    assert!(!network.resolve_pending(ActivationOutcome::Succeed));

    ui.run_pending();
    assert_eq!(log.entries(), ["connecting slow", "failed slow"]);
}

#[test]
fn late_callback_for_cancelled_attempt_is_ignored() {
    let network = MockNetwork::new();
    network.add_access_point("slow", ApMode::Infrastructure, SecurityType::Unsecured, 60);
    network.set_outcome("slow", ActivationOutcome::Hang);
    let (service, _ui) = start(&network);

    service
        .connection()
        .connect_to_access_point(&find(&service, "slow"), "");
    service.flush();
    let active = network.pending_activation().unwrap();

    service.connection().disconnect();
    service.flush();
    assert_eq!(latest_type(&service), Some(EventType::Disconnected));

    network.emit_activation_state(&active, ActiveConnectionState::Activated, 0);
    service.flush();
    assert!(!service.record().is_connected());
    assert_eq!(latest_type(&service), Some(EventType::Disconnected));
}

#[test]
fn switching_wifi_off_and_on() {
    let network = MockNetwork::new();
    network.add_access_point("home-net", ApMode::Infrastructure, SecurityType::Unsecured, 40);
    let (service, ui) = start(&network);
    let log = Arc::new(Log::default());
    let _sub = service.subscribe_device(log.clone());

    service.device_controller().set_enabled(false);
    assert!(service.device().is_changing());
    service.flush();
    assert!(!service.device().is_changing());
    assert!(!service.device().enabled());
    assert!(!network.radio_enabled());
    assert!(service.ap_list().is_empty());

    // Asking again for the current state is ignored.
    service.device_controller().set_enabled(false);
    assert!(!service.device().is_changing());

    network.add_access_point("cafe", ApMode::Infrastructure, SecurityType::Unsecured, 40);
    service.device_controller().set_enabled(true);
    service.flush();
    assert!(service.device().enabled());
    // The radio lost its scan results when it went off.
    assert_eq!(service.ap_list().len(), 1);
    find(&service, "cafe");

    ui.run_pending();
    assert_eq!(log.entries(), ["disabled", "enabled"]);
}

#[test]
fn radio_switched_off_elsewhere_ends_connection() {
    let network = MockNetwork::new();
    network.add_access_point("home-net", ApMode::Infrastructure, SecurityType::Unsecured, 40);
    let (service, ui) = start(&network);
    let home = find(&service, "home-net");
    service.connection().connect_to_access_point(&home, "");
    service.flush();
    assert!(service.record().is_connected());

    let log = Arc::new(Log::default());
    let _device = service.subscribe_device(log.clone());
    let _connection = service.subscribe_connection(log.clone());
    network.set_radio(false);
    service.flush();

    assert!(!service.device().enabled());
    assert!(!service.record().is_connected());
    assert!(service.ap_list().is_empty());
    let disconnects = service
        .record()
        .events()
        .iter()
        .filter(|e| e.event_type() == EventType::Disconnected)
        .count();
    assert_eq!(disconnects, 1);

    ui.run_pending();
    assert_eq!(log.entries(), ["disconnected home-net", "disabled"]);
}

#[test]
fn removing_saved_connection_clears_flags() {
    let network = MockNetwork::new();
    network.add_access_point("cafe", ApMode::Infrastructure, SecurityType::Wpa, 55);
    network.add_saved_connection("cafe", SecurityType::Wpa, Some("espresso1"), None);
    network.add_saved_connection("cafe", SecurityType::Rsn, Some("espresso2"), None);
    let (service, _ui) = start(&network);
    let cafe = find(&service, "cafe");
    assert!(cafe.has_saved_connection());

    service.connection().remove_saved_connection(&cafe);
    service.flush();
    assert!(network.saved_profiles().is_empty());
    assert_eq!(network.deleted_profiles().len(), 2);
    assert!(!find(&service, "cafe").has_saved_connection());
}

#[test]
fn scan_request_reaches_the_device() {
    let network = MockNetwork::new();
    let (service, _ui) = start(&network);

    service.device_controller().scan_access_points();
    service.flush();
    assert_eq!(network.scan_requests(), 1);

    network.set_radio(false);
    service.flush();
    service.device_controller().scan_access_points();
    service.flush();
    assert_eq!(network.scan_requests(), 1);
}

#[test]
fn record_is_seeded_from_existing_connection() {
    let network = MockNetwork::new();
    network.add_access_point("home-net", ApMode::Infrastructure, SecurityType::Unsecured, 40);
    {
        let (service, _ui) = start(&network);
        service
            .connection()
            .connect_to_access_point(&find(&service, "home-net"), "");
        service.flush();
        assert!(service.record().is_connected());
    }

    let (service, _ui) = start(&network);
    assert!(service.record().is_connected());
    assert_eq!(service.record().events().len(), 1);
    assert_eq!(
        service.record().active_ap().map(|ap| ap.ssid().to_string()),
        Some("home-net".to_string())
    );
}

#[test]
fn unplugged_device_disables_wifi() {
    let network = MockNetwork::new();
    let (service, _ui) = start(&network);
    assert!(service.device().exists());

    network.set_device_present(false);
    service.flush();
    assert!(!service.device().exists());
    assert!(!service.device().enabled());

    network.set_device_present(true);
    let status = service.device_controller().update_device_state();
    assert!(status.exists);
    assert!(status.enabled);
}

#[test]
fn shut_down_service_keeps_last_state() {
    let network = MockNetwork::new();
    network.add_access_point("home-net", ApMode::Infrastructure, SecurityType::Unsecured, 40);
    let (service, _ui) = start(&network);

    service.shutdown();
    service.shutdown();
    assert!(!service.flush());
    assert_eq!(service.ap_list().len(), 1);

    service
        .connection()
        .connect_to_access_point(&find(&service, "home-net"), "");
    assert_eq!(network.activation_requests(), 0);
    assert!(service.device_controller().update_device_state().enabled);
}
