/// Prints the visible networks, then every change as it happens.
///
/// The main thread plays the role of a UI thread: it drains the
/// notification queue twice a second.
use nmwifi::{
    AccessPoint, ApListListener, ConnectionListener, DeviceListener, NotificationQueue,
    WifiService,
};
use std::sync::Arc;
use std::time::Duration;

struct Printer;

fn describe(ap: Option<&AccessPoint>) -> String {
    ap.map(|ap| ap.ssid().to_string())
        .unwrap_or_else(|| "<unknown>".into())
}

impl DeviceListener for Printer {
    fn wireless_enabled(&self) {
        println!("Wi-Fi on");
    }

    fn wireless_disabled(&self) {
        println!("Wi-Fi off");
    }
}

impl ConnectionListener for Printer {
    fn started_connecting(&self, ap: Option<&AccessPoint>) {
        println!("connecting to {}", describe(ap));
    }

    fn connected(&self, ap: Option<&AccessPoint>) {
        println!("connected to {}", describe(ap));
    }

    fn disconnected(&self, ap: Option<&AccessPoint>) {
        println!("disconnected from {}", describe(ap));
    }

    fn connection_auth_failed(&self, ap: Option<&AccessPoint>) {
        println!("wrong key for {}", describe(ap));
    }

    fn connection_failed(&self, ap: Option<&AccessPoint>) {
        println!("could not connect to {}", describe(ap));
    }
}

impl ApListListener for Printer {
    fn access_point_added(&self, ap: &AccessPoint) {
        println!("+ {:30} {:>3}% {}", ap.ssid().to_string(), ap.signal_strength(), ap.security_type());
    }

    fn access_point_removed(&self, ap: &AccessPoint) {
        println!("- {}", ap.ssid());
    }
}

fn main() -> nmwifi::Result<()> {
    let ui = NotificationQueue::new();
    let service = WifiService::start(ui.clone())?;

    let device = service.device();
    println!(
        "Device present: {}, enabled: {}",
        device.exists(),
        device.enabled()
    );
    for ap in service.ap_list().access_points() {
        println!("  {:30} {:>3}% {}", ap.ssid().to_string(), ap.signal_strength(), ap.security_type());
    }
    if let Some(ap) = service.record().active_ap() {
        println!("Active: {}", ap.ssid());
    }

    let printer = Arc::new(Printer);
    let _device = service.subscribe_device(printer.clone());
    let _connection = service.subscribe_connection(printer.clone());
    let _aps = service.subscribe_ap_list(printer);

    service.device_controller().scan_access_points();
    loop {
        ui.run_pending();
        std::thread::sleep(Duration::from_millis(500));
    }
}
