/// Connects to a network by SSID and reports how it went.
///
/// Usage: `cargo run --example connect -- <ssid> [key]`
///
/// Without a key the saved connection is used (or none, for open networks).
use nmwifi::{EventType, NotificationQueue, WifiConfig, WifiService};
use std::time::{Duration, Instant};

fn main() -> nmwifi::Result<()> {
    let mut args = std::env::args().skip(1);
    let Some(ssid) = args.next() else {
        eprintln!("usage: connect <ssid> [key]");
        std::process::exit(2);
    };
    let key = args.next().unwrap_or_default();

    let config = WifiConfig::new().with_connection_timeout(Duration::from_secs(60));
    let timeout = config.connection_timeout;
    let service = WifiService::with_config(config, NotificationQueue::new())?;

    let Some(ap) = service
        .ap_list()
        .access_points()
        .into_iter()
        .find(|ap| ap.ssid().to_string() == ssid)
    else {
        eprintln!("{ssid} is not in range");
        std::process::exit(1);
    };

    println!("Connecting to {ap}...");
    service.connection().connect_to_access_point(&ap, &key);
    service.flush();

    let deadline = Instant::now() + timeout + Duration::from_secs(5);
    while Instant::now() < deadline {
        std::thread::sleep(Duration::from_millis(250));
        match service
            .record()
            .latest_event_for(&ap.hash())
            .map(|e| e.event_type())
        {
            Some(EventType::Connected) => {
                println!("Connected.");
                return Ok(());
            }
            Some(EventType::ConnectionAuthFailed) => {
                println!("The key was rejected.");
                return Ok(());
            }
            Some(EventType::ConnectionFailed) => {
                println!("Connection failed.");
                return Ok(());
            }
            _ => {}
        }
    }
    println!("Gave up waiting.");
    Ok(())
}
