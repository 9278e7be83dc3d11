//! Cache of visible networks.
//!
//! One [`AccessPoint`] record per [`ApHash`]. Every record owns the list of
//! BSSIDs (native access points) currently advertising it; the record's
//! strength is the strongest of them and the record disappears together
//! with its last BSSID.

use log::{debug, warn};
use std::collections::{BTreeMap, HashMap};

use super::WifiCore;
use super::saved::apply_saved_data;
use crate::api::models::{AccessPoint, ApHash};
use crate::backend::{NativeAccessPoint, SavedConnection};
use crate::util::utils::{read_lock, write_lock};

/// A change to the cache that listeners should hear about.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum ApChange {
    Added(AccessPoint),
    Removed(AccessPoint),
    StrengthChanged(AccessPoint),
}

#[derive(Debug, Default)]
pub(crate) struct ApList {
    records: BTreeMap<ApHash, AccessPoint>,
    natives: HashMap<ApHash, Vec<NativeAccessPoint>>,
    paths: HashMap<String, ApHash>,
}

impl ApList {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Snapshot of all records, ordered by hash.
    pub(crate) fn access_points(&self) -> Vec<AccessPoint> {
        self.records.values().cloned().collect()
    }

    pub(crate) fn access_point(&self, hash: &ApHash) -> Option<AccessPoint> {
        self.records.get(hash).cloned()
    }

    /// The record a BSSID path belongs to.
    pub(crate) fn access_point_by_path(&self, path: &str) -> Option<AccessPoint> {
        self.paths
            .get(path)
            .and_then(|hash| self.records.get(hash))
            .cloned()
    }

    /// BSSIDs of one record, strongest first.
    pub(crate) fn natives(&self, hash: &ApHash) -> Vec<NativeAccessPoint> {
        let mut natives = self.natives.get(hash).cloned().unwrap_or_default();
        natives.sort_by(|a, b| b.strength.cmp(&a.strength));
        natives
    }

    pub(crate) fn len(&self) -> usize {
        self.records.len()
    }

    /// Registers a visible BSSID.
    ///
    /// A BSSID of an already cached network only updates its strength; a
    /// path seen before is treated as a strength report.
    pub(crate) fn ap_added(
        &mut self,
        native: NativeAccessPoint,
        saved: &[SavedConnection],
    ) -> Option<ApChange> {
        if self.paths.contains_key(&native.path) {
            return self
                .signal_strength_changed(&native.path, native.strength)
                .map(ApChange::StrengthChanged);
        }

        let hash = native.hash();
        self.paths.insert(native.path.clone(), hash);
        let natives = self.natives.entry(hash).or_default();
        natives.push(native.clone());

        match self.records.get_mut(&hash) {
            Some(record) => {
                let strongest = strongest(natives);
                if strongest == record.strength {
                    return None;
                }
                record.strength = strongest;
                Some(ApChange::StrengthChanged(record.clone()))
            }
            None => {
                let mut record = native.to_record();
                apply_saved_data(&mut record, saved);
                debug!("Access point added: {record}");
                self.records.insert(hash, record.clone());
                Some(ApChange::Added(record))
            }
        }
    }

    /// Forgets a BSSID. The record goes when its last BSSID goes.
    pub(crate) fn ap_removed(&mut self, path: &str) -> Option<ApChange> {
        let hash = self.paths.remove(path)?;
        let remaining = {
            let natives = self.natives.entry(hash).or_default();
            natives.retain(|n| n.path != path);
            (!natives.is_empty()).then(|| strongest(natives))
        };

        match remaining {
            None => {
                self.natives.remove(&hash);
                let record = self.records.remove(&hash)?;
                debug!("Access point removed: {record}");
                Some(ApChange::Removed(record))
            }
            Some(strongest) => {
                let record = self.records.get_mut(&hash)?;
                if record.strength == strongest {
                    return None;
                }
                record.strength = strongest;
                Some(ApChange::StrengthChanged(record.clone()))
            }
        }
    }

    /// Updates one BSSID's strength. Returns the record if its strength
    /// changed as a result.
    pub(crate) fn signal_strength_changed(&mut self, path: &str, strength: u8) -> Option<AccessPoint> {
        let hash = *self.paths.get(path)?;
        let natives = self.natives.get_mut(&hash)?;
        let native = natives.iter_mut().find(|n| n.path == path)?;
        native.strength = strength.min(100);
        let strongest = strongest(natives);

        let record = self.records.get_mut(&hash)?;
        if record.strength == strongest {
            return None;
        }
        record.strength = strongest;
        Some(record.clone())
    }

    /// Removes everything, returning the removed records.
    pub(crate) fn clear(&mut self) -> Vec<AccessPoint> {
        self.natives.clear();
        self.paths.clear();
        std::mem::take(&mut self.records).into_values().collect()
    }

    /// Reapplies saved-profile data to every record.
    pub(crate) fn refresh_saved_data(&mut self, saved: &[SavedConnection]) {
        for record in self.records.values_mut() {
            apply_saved_data(record, saved);
        }
    }

    pub(crate) fn record_mut(&mut self, hash: &ApHash) -> Option<&mut AccessPoint> {
        self.records.get_mut(hash)
    }
}

fn strongest(natives: &[NativeAccessPoint]) -> u8 {
    natives.iter().map(|n| n.strength).max().unwrap_or(0)
}

impl WifiCore {
    /// Applies a cache change and tells listeners about it.
    pub(crate) fn publish_ap_change(&self, change: Option<ApChange>) {
        match change {
            Some(ApChange::Added(ap)) => self.notifier.access_point_added(ap),
            Some(ApChange::Removed(ap)) => self.notifier.access_point_removed(ap),
            Some(ApChange::StrengthChanged(ap)) => self.notifier.signal_strength_changed(ap),
            None => {}
        }
    }

    pub(crate) fn access_point_added(&self, native: NativeAccessPoint) {
        let change = {
            let saved = read_lock(&self.saved);
            write_lock(&self.ap_list).ap_added(native, &saved)
        };
        self.publish_ap_change(change);
    }

    pub(crate) fn access_point_removed(&self, path: &str) {
        let change = write_lock(&self.ap_list).ap_removed(path);
        self.publish_ap_change(change);
    }

    pub(crate) fn access_point_strength_changed(&self, path: &str, strength: u8) {
        let changed = write_lock(&self.ap_list).signal_strength_changed(path, strength);
        if let Some(ap) = changed {
            self.notifier.signal_strength_changed(ap);
        }
    }

    /// Drops every record, telling listeners about each one.
    pub(crate) fn clear_access_points(&self) {
        let removed = write_lock(&self.ap_list).clear();
        debug!("Cleared {} access point(s)", removed.len());
        for ap in removed {
            self.notifier.access_point_removed(ap);
        }
    }

    /// Reconciles the cache with the backend's current scan results.
    pub(crate) async fn reload_access_points(&self) {
        let natives = match self.backend.access_points().await {
            Ok(natives) => natives,
            Err(e) => {
                warn!("Failed to list access points: {e}");
                return;
            }
        };

        let stale: Vec<String> = {
            let list = read_lock(&self.ap_list);
            list.paths
                .keys()
                .filter(|path| !natives.iter().any(|n| &n.path == *path))
                .cloned()
                .collect()
        };
        for path in stale {
            self.access_point_removed(&path);
        }
        for native in natives {
            self.access_point_added(native);
        }
        debug!(
            "Access point cache holds {} network(s)",
            read_lock(&self.ap_list).len()
        );
    }

    /// The cached copy of `ap`, or `ap` itself if it is no longer visible.
    pub(crate) fn current_snapshot(&self, ap: &AccessPoint) -> AccessPoint {
        read_lock(&self.ap_list)
            .access_point(&ap.hash())
            .unwrap_or_else(|| ap.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::models::{ApMode, SecurityType};
    use std::time::{Duration, UNIX_EPOCH};

    fn native(path: &str, ssid: &str, strength: u8) -> NativeAccessPoint {
        NativeAccessPoint {
            path: path.into(),
            bssid: format!("02:00:00:00:00:{:02x}", path.len()),
            ssid: ssid.into(),
            mode: ApMode::Infrastructure,
            security: SecurityType::Wpa,
            strength,
        }
    }

    #[test]
    fn one_record_per_network() {
        let mut list = ApList::new();
        let added = list.ap_added(native("/ap/1", "home-net", 40), &[]);
        let Some(ApChange::Added(record)) = added else {
            panic!("expected an added record, got {added:?}");
        };
        assert_eq!(record.signal_strength(), 40);
        assert!(!record.has_saved_connection());

        let second = list.ap_added(native("/ap/2", "home-net", 70), &[]);
        assert!(matches!(second, Some(ApChange::StrengthChanged(ref ap)) if ap.signal_strength() == 70));
        assert_eq!(list.len(), 1);
        assert_eq!(list.access_points()[0].hash(), record.hash());

        let weaker = list.ap_added(native("/ap/3", "home-net", 10), &[]);
        assert_eq!(weaker, None);
        assert_eq!(list.natives(&record.hash()).len(), 3);
        assert_eq!(list.natives(&record.hash())[0].path, "/ap/2");
    }

    #[test]
    fn record_survives_until_last_bssid_goes() {
        let mut list = ApList::new();
        list.ap_added(native("/ap/1", "home-net", 40), &[]);
        list.ap_added(native("/ap/2", "home-net", 70), &[]);

        let change = list.ap_removed("/ap/2");
        assert!(matches!(change, Some(ApChange::StrengthChanged(ref ap)) if ap.signal_strength() == 40));
        assert_eq!(list.len(), 1);

        let change = list.ap_removed("/ap/1");
        assert!(matches!(change, Some(ApChange::Removed(_))));
        assert_eq!(list.len(), 0);
        assert_eq!(list.ap_removed("/ap/1"), None);
    }

    #[test]
    fn strength_updates_keep_identity() {
        let mut list = ApList::new();
        list.ap_added(native("/ap/1", "home-net", 40), &[]);
        let hash = list.access_points()[0].hash();

        let updated = list.signal_strength_changed("/ap/1", 85).unwrap();
        assert_eq!(updated.hash(), hash);
        assert_eq!(updated.signal_strength(), 85);
        assert_eq!(list.signal_strength_changed("/ap/1", 85), None);
        assert_eq!(list.signal_strength_changed("/ap/9", 10), None);
        assert_eq!(list.access_point(&hash).unwrap().signal_strength(), 85);
        assert_eq!(
            list.access_point_by_path("/ap/1").map(|ap| ap.hash()),
            Some(hash)
        );
    }

    #[test]
    fn repeated_path_is_a_strength_report() {
        let mut list = ApList::new();
        list.ap_added(native("/ap/1", "home-net", 40), &[]);
        let change = list.ap_added(native("/ap/1", "home-net", 55), &[]);
        assert!(matches!(change, Some(ApChange::StrengthChanged(_))));
        assert_eq!(list.natives(&list.access_points()[0].hash()).len(), 1);
    }

    #[test]
    fn new_records_pick_up_saved_profiles() {
        let saved = [SavedConnection {
            path: "/settings/1".into(),
            ssid: "home-net".into(),
            security: SecurityType::Rsn,
            last_connected: Some(UNIX_EPOCH + Duration::from_secs(1_700_000_000)),
        }];
        let mut list = ApList::new();
        list.ap_added(native("/ap/1", "home-net", 40), &saved);
        list.ap_added(native("/ap/2", "cafe", 40), &saved);

        let home = list.access_point_by_path("/ap/1").unwrap();
        assert!(home.has_saved_connection());
        assert!(home.last_connection_time().is_some());
        assert!(!list.access_point_by_path("/ap/2").unwrap().has_saved_connection());

        list.refresh_saved_data(&[]);
        assert!(!list.access_point_by_path("/ap/1").unwrap().has_saved_connection());
    }

    #[test]
    fn clear_returns_everything() {
        let mut list = ApList::new();
        list.ap_added(native("/ap/1", "a", 40), &[]);
        list.ap_added(native("/ap/2", "b", 40), &[]);
        assert_eq!(list.clear().len(), 2);
        assert_eq!(list.len(), 0);
        assert_eq!(list.access_point_by_path("/ap/1"), None);
    }
}
