//! NetworkManager connection settings for Wi-Fi profiles.
//!
//! Builds the nested settings dictionary passed to
//! `AddAndActivateConnection`, and reads saved profiles back from
//! `GetSettings`.
//!
//! # Sections Created
//!
//! - `connection`: type, id, uuid, autoconnect
//! - `802-11-wireless`: ssid, mode, security reference
//! - `802-11-wireless-security`: key management and key, secured networks only
//! - `ipv4` / `ipv6`: "auto" (DHCP)

use secrecy::ExposeSecret;
use std::collections::HashMap;
use std::time::{Duration, UNIX_EPOCH};
use uuid::Uuid;
use zvariant::Value;

use super::{ConnectionProfile, SavedConnection};
use crate::api::models::{SecurityType, Ssid};

pub(crate) type Settings = HashMap<&'static str, HashMap<&'static str, Value<'static>>>;

const WIRELESS: &str = "802-11-wireless";
const WIRELESS_SECURITY: &str = "802-11-wireless-security";

/// Builds a complete Wi-Fi settings dictionary for a new profile.
pub(crate) fn build_wifi_settings(profile: &ConnectionProfile) -> Settings {
    let mut settings: Settings = HashMap::new();

    let mut connection = HashMap::new();
    connection.insert("type", Value::from(WIRELESS));
    connection.insert("id", Value::from(profile.ssid.to_string()));
    connection.insert("uuid", Value::from(Uuid::new_v4().to_string()));
    connection.insert("autoconnect", Value::from(true));
    settings.insert("connection", connection);

    let mut wireless = HashMap::new();
    wireless.insert("ssid", Value::from(profile.ssid.as_bytes().to_vec()));
    wireless.insert("mode", Value::from("infrastructure"));

    if let Some(security) = security_section(profile) {
        wireless.insert("security", Value::from(WIRELESS_SECURITY));
        settings.insert(WIRELESS_SECURITY, security);
    }
    settings.insert(WIRELESS, wireless);

    for ip in ["ipv4", "ipv6"] {
        let mut section = HashMap::new();
        section.insert("method", Value::from("auto"));
        settings.insert(ip, section);
    }

    settings
}

fn security_section(profile: &ConnectionProfile) -> Option<HashMap<&'static str, Value<'static>>> {
    let key = profile
        .key
        .as_ref()
        .map(|k| k.expose_secret().to_owned())
        .unwrap_or_default();

    let mut security = HashMap::new();
    match profile.security {
        SecurityType::Unsecured => return None,
        SecurityType::Wep => {
            security.insert("key-mgmt", Value::from("none"));
            security.insert("auth-alg", Value::from("open"));
            security.insert("wep-key0", Value::from(key));
            // 1 = hex or ASCII key
            security.insert("wep-key-type", Value::from(1u32));
        }
        SecurityType::Wpa | SecurityType::Rsn => {
            security.insert("key-mgmt", Value::from("wpa-psk"));
            security.insert("auth-alg", Value::from("open"));
            security.insert("psk", Value::from(key));
            security.insert("psk-flags", Value::from(0u32));
        }
    }
    Some(security)
}

/// Reads a saved Wi-Fi profile from a `GetSettings` reply.
///
/// Returns `None` for profiles that are not Wi-Fi or have no SSID.
pub(crate) fn parse_saved_connection(
    path: String,
    settings: &HashMap<String, HashMap<String, Value<'_>>>,
) -> Option<SavedConnection> {
    let connection = settings.get("connection")?;
    match connection.get("type") {
        Some(Value::Str(kind)) if kind.as_str() == WIRELESS => {}
        _ => return None,
    }

    let ssid = match settings.get(WIRELESS)?.get("ssid")? {
        Value::Array(arr) => {
            let raw: Vec<u8> = arr
                .iter()
                .filter_map(|v| u8::try_from(v.clone()).ok())
                .collect();
            Ssid::new(raw)
        }
        _ => return None,
    };
    if ssid.is_empty() {
        return None;
    }

    let security = match settings.get(WIRELESS_SECURITY) {
        None => SecurityType::Unsecured,
        Some(section) => match section.get("key-mgmt") {
            Some(Value::Str(mgmt)) if matches!(mgmt.as_str(), "none" | "ieee8021x") => {
                SecurityType::Wep
            }
            Some(Value::Str(mgmt)) if mgmt.as_str() == "sae" => SecurityType::Rsn,
            _ => SecurityType::Wpa,
        },
    };

    let last_connected = match connection.get("timestamp") {
        Some(Value::U64(secs)) if *secs > 0 => Some(UNIX_EPOCH + Duration::from_secs(*secs)),
        _ => None,
    };

    Some(SavedConnection {
        path,
        ssid,
        security,
        last_connected,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use secrecy::SecretString;
    use std::time::SystemTime;

    fn unix_seconds(time: SystemTime) -> u64 {
        time.duration_since(UNIX_EPOCH).unwrap().as_secs()
    }

    fn profile(security: SecurityType, key: Option<&str>) -> ConnectionProfile {
        ConnectionProfile {
            ssid: "home-net".into(),
            security,
            key: key.map(|k| SecretString::from(k.to_string())),
        }
    }

    fn owned(settings: Settings) -> HashMap<String, HashMap<String, Value<'static>>> {
        settings
            .into_iter()
            .map(|(section, values)| {
                (
                    section.to_string(),
                    values.into_iter().map(|(k, v)| (k.to_string(), v)).collect(),
                )
            })
            .collect()
    }

    #[test]
    fn open_profile_has_no_security_section() {
        let settings = build_wifi_settings(&profile(SecurityType::Unsecured, None));
        assert!(settings.contains_key("connection"));
        assert!(settings.contains_key("ipv4"));
        assert!(settings.contains_key("ipv6"));
        assert!(!settings.contains_key(WIRELESS_SECURITY));
        let wireless = settings.get(WIRELESS).unwrap();
        assert_eq!(wireless.get("ssid"), Some(&Value::from(b"home-net".to_vec())));
        assert!(wireless.get("security").is_none());
    }

    #[test]
    fn wpa_profile_carries_psk() {
        let settings = build_wifi_settings(&profile(SecurityType::Rsn, Some("rightpass")));
        let security = settings.get(WIRELESS_SECURITY).unwrap();
        assert_eq!(security.get("key-mgmt"), Some(&Value::from("wpa-psk")));
        assert_eq!(security.get("psk"), Some(&Value::from("rightpass".to_string())));
        assert_eq!(
            settings.get(WIRELESS).unwrap().get("security"),
            Some(&Value::from(WIRELESS_SECURITY))
        );
    }

    #[test]
    fn wep_profile_uses_key_slot_zero() {
        let settings = build_wifi_settings(&profile(SecurityType::Wep, Some("abcde")));
        let security = settings.get(WIRELESS_SECURITY).unwrap();
        assert_eq!(security.get("key-mgmt"), Some(&Value::from("none")));
        assert_eq!(security.get("wep-key0"), Some(&Value::from("abcde".to_string())));
    }

    #[test]
    fn built_profiles_parse_back() {
        let settings = owned(build_wifi_settings(&profile(SecurityType::Wpa, Some("rightpass"))));
        let saved = parse_saved_connection("/settings/4".into(), &settings).unwrap();
        assert_eq!(saved.path, "/settings/4");
        assert_eq!(saved.ssid, Ssid::from("home-net"));
        assert_eq!(saved.security, SecurityType::Wpa);
        assert_eq!(saved.last_connected, None);

        let open = owned(build_wifi_settings(&profile(SecurityType::Unsecured, None)));
        let saved = parse_saved_connection("/settings/5".into(), &open).unwrap();
        assert_eq!(saved.security, SecurityType::Unsecured);
    }

    #[test]
    fn parse_reads_timestamp_and_skips_other_types() {
        let mut settings = owned(build_wifi_settings(&profile(SecurityType::Wep, Some("abcde"))));
        settings
            .get_mut("connection")
            .unwrap()
            .insert("timestamp".into(), Value::from(1_700_000_000u64));
        let saved = parse_saved_connection("/settings/6".into(), &settings).unwrap();
        assert_eq!(saved.security, SecurityType::Wep);
        assert_eq!(saved.last_connected.map(unix_seconds), Some(1_700_000_000));

        settings
            .get_mut("connection")
            .unwrap()
            .insert("type".into(), Value::from("802-3-ethernet"));
        assert!(parse_saved_connection("/settings/6".into(), &settings).is_none());
    }
}
