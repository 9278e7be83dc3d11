//! Saved connection profiles.
//!
//! The core keeps a copy of the backend's Wi-Fi profiles so that records
//! can carry `has_saved_connection` / `last_connection_time` and so the
//! control module can pick profiles without a round trip.

use log::{debug, info, warn};
use std::time::SystemTime;

use super::WifiCore;
use crate::api::models::AccessPoint;
use crate::backend::SavedConnection;
use crate::util::utils::{read_lock, write_lock};

/// Profiles usable for `ap`, most recently used first.
pub(crate) fn matching_profiles(ap: &AccessPoint, saved: &[SavedConnection]) -> Vec<SavedConnection> {
    let mut matching: Vec<SavedConnection> =
        saved.iter().filter(|s| s.matches(ap)).cloned().collect();
    // `None` sorts before any timestamp, so never-used profiles go last.
    matching.sort_by(|a, b| b.last_connected.cmp(&a.last_connected));
    matching
}

/// Recomputes the saved-profile fields of one record.
pub(crate) fn apply_saved_data(ap: &mut AccessPoint, saved: &[SavedConnection]) {
    let matching = saved.iter().filter(|s| s.matches(ap));
    let mut found = false;
    let mut newest: Option<SystemTime> = None;
    for profile in matching {
        found = true;
        newest = newest.max(profile.last_connected);
    }
    ap.has_saved_connection = found;
    ap.last_connection_time = newest;
}

impl WifiCore {
    /// Profiles usable for `ap`, from the cached profile list.
    pub(crate) fn saved_profiles_for(&self, ap: &AccessPoint) -> Vec<SavedConnection> {
        matching_profiles(ap, &read_lock(&self.saved))
    }

    /// Refetches all profiles and refreshes every cached record.
    pub(crate) async fn reload_saved_connections(&self) {
        let profiles = match self.backend.saved_connections().await {
            Ok(profiles) => profiles,
            Err(e) => {
                warn!("Failed to list saved connections: {e}");
                return;
            }
        };
        debug!("Loaded {} saved Wi-Fi profile(s)", profiles.len());

        let mut saved = write_lock(&self.saved);
        *saved = profiles;
        write_lock(&self.ap_list).refresh_saved_data(&saved);
    }

    /// Marks `ap` as just connected in the cache.
    pub(crate) fn mark_connected(&self, ap: &AccessPoint) {
        if let Some(record) = write_lock(&self.ap_list).record_mut(&ap.hash()) {
            record.has_saved_connection = true;
            record.last_connection_time = Some(SystemTime::now());
        }
    }

    /// Deletes every profile matching `ap`, visible or not.
    pub(crate) async fn remove_saved_connection(&self, ap: AccessPoint) {
        let profiles = self.saved_profiles_for(&ap);
        if profiles.is_empty() {
            debug!("No saved connection for {ap}");
            return;
        }
        self.delete_profiles(&profiles).await;
        info!("Removed {} saved connection(s) for {}", profiles.len(), ap.ssid());
    }

    /// Deletes profiles through the backend and drops them from the cache.
    pub(crate) async fn delete_profiles(&self, profiles: &[SavedConnection]) {
        for profile in profiles {
            if let Err(e) = self.backend.delete_saved_connection(&profile.path).await {
                warn!("Failed to delete connection {}: {e}", profile.path);
            }
        }

        let mut saved = write_lock(&self.saved);
        saved.retain(|s| !profiles.iter().any(|p| p.path == s.path));
        write_lock(&self.ap_list).refresh_saved_data(&saved);
    }
}
