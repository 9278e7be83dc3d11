//! Connection event log.
//!
//! The log is append-only. Connection state (connecting, connected, idle)
//! is derived from it at query time and never stored separately. When the
//! log grows past its capacity the oldest events are dropped, except the
//! newest event of each access point.

use log::{debug, info};
use std::collections::HashSet;

use super::WifiCore;
use crate::api::models::{
    AccessPoint, ActiveConnectionState, ApHash, ConnectionEvent, EventType,
};
use crate::util::utils::{read_lock, write_lock};

#[derive(Debug)]
pub(crate) struct ConnectionRecord {
    events: Vec<ConnectionEvent>,
    capacity: usize,
}

impl ConnectionRecord {
    pub(crate) fn new(capacity: usize) -> Self {
        Self {
            events: Vec::new(),
            capacity: capacity.max(1),
        }
    }

    /// Appends an event.
    pub(crate) fn add_event(&mut self, event: ConnectionEvent) {
        debug!("Recording event: {event}");
        self.events.push(event);
        if self.events.len() > self.capacity {
            self.trim();
        }
    }

    /// Appends an event unless the latest event has the same type and
    /// access point. Returns `true` if it was appended.
    pub(crate) fn add_event_if_not_duplicate(&mut self, event: ConnectionEvent) -> bool {
        if self.latest_event().is_some_and(|latest| latest.same_as(&event)) {
            debug!("Skipping duplicate event: {event}");
            return false;
        }
        self.add_event(event);
        true
    }

    fn trim(&mut self) {
        let mut seen: HashSet<Option<ApHash>> = HashSet::new();
        let keep: Vec<bool> = self
            .events
            .iter()
            .rev()
            .map(|event| seen.insert(event.access_point().map(AccessPoint::hash)))
            .collect::<Vec<_>>()
            .into_iter()
            .rev()
            .collect();

        let mut excess = self.events.len().saturating_sub(self.capacity);
        let mut index = 0;
        self.events.retain(|_| {
            let newest_for_ap = keep[index];
            index += 1;
            if excess > 0 && !newest_for_ap {
                excess -= 1;
                false
            } else {
                true
            }
        });
    }

    pub(crate) fn events(&self) -> &[ConnectionEvent] {
        &self.events
    }

    pub(crate) fn latest_event(&self) -> Option<&ConnectionEvent> {
        self.events.last()
    }

    pub(crate) fn latest_event_for(&self, hash: &ApHash) -> Option<&ConnectionEvent> {
        self.events
            .iter()
            .rev()
            .find(|e| e.access_point().is_some_and(|ap| ap.hash() == *hash))
    }

    pub(crate) fn latest_event_of(&self, event_type: EventType) -> Option<&ConnectionEvent> {
        self.events
            .iter()
            .rev()
            .find(|e| e.event_type() == event_type)
    }

    pub(crate) fn latest_event_matching(
        &self,
        hash: &ApHash,
        event_type: EventType,
    ) -> Option<&ConnectionEvent> {
        self.events.iter().rev().find(|e| {
            e.event_type() == event_type && e.access_point().is_some_and(|ap| ap.hash() == *hash)
        })
    }

    pub(crate) fn is_connected(&self) -> bool {
        self.latest_event()
            .is_some_and(|e| e.event_type() == EventType::Connected)
    }

    pub(crate) fn is_connecting(&self) -> bool {
        self.latest_event()
            .is_some_and(|e| e.event_type() == EventType::StartedConnecting)
    }

    /// The access point being connected to or in use.
    ///
    /// This is the access point of the latest event when that event is
    /// `StartedConnecting` or `Connected`; any later event for the same
    /// connection supersedes it.
    pub(crate) fn active_ap(&self) -> Option<&AccessPoint> {
        self.latest_event()
            .filter(|e| {
                matches!(
                    e.event_type(),
                    EventType::StartedConnecting | EventType::Connected
                )
            })
            .and_then(ConnectionEvent::access_point)
    }
}

impl WifiCore {
    /// Appends an event and notifies connection listeners.
    pub(crate) fn record_event(&self, event_type: EventType, ap: Option<&AccessPoint>) {
        let event = ConnectionEvent::new(event_type, ap.map(|ap| self.current_snapshot(ap)));
        write_lock(&self.record).add_event(event.clone());
        self.announce(&event);
    }

    /// Like [`record_event`](Self::record_event), skipping exact repeats of
    /// the latest event. Returns `true` if the event was recorded.
    pub(crate) fn record_event_if_new(&self, event_type: EventType, ap: Option<&AccessPoint>) -> bool {
        let event = ConnectionEvent::new(event_type, ap.map(|ap| self.current_snapshot(ap)));
        let added = write_lock(&self.record).add_event_if_not_duplicate(event.clone());
        if added {
            self.announce(&event);
        }
        added
    }

    fn announce(&self, event: &ConnectionEvent) {
        match event.event_type() {
            EventType::Connected => info!("Connected: {event}"),
            _ => debug!("Connection event: {event}"),
        }
        self.notifier.connection_event(event);
    }

    /// The record's active access point, cloned.
    pub(crate) fn active_ap(&self) -> Option<AccessPoint> {
        read_lock(&self.record).active_ap().cloned()
    }

    /// Seeds the log from the backend's current active connection.
    pub(crate) async fn seed_record(&self) {
        let active = match self.backend.active_connection().await {
            Ok(Some(active)) => active,
            Ok(None) => return,
            Err(e) => {
                debug!("Could not read active connection: {e}");
                return;
            }
        };
        let ap = active
            .access_point_path
            .as_deref()
            .and_then(|path| read_lock(&self.ap_list).access_point_by_path(path));

        match active.state {
            ActiveConnectionState::Activated => {
                self.record_event_if_new(EventType::Connected, ap.as_ref());
            }
            ActiveConnectionState::Activating => {
                self.record_event_if_new(EventType::StartedConnecting, ap.as_ref());
            }
            _ => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::models::{ApMode, SecurityType};

    fn ap(ssid: &str) -> AccessPoint {
        AccessPoint::new(ssid, ApMode::Infrastructure, SecurityType::Wpa, 40)
    }

    fn event(event_type: EventType, ssid: &str) -> ConnectionEvent {
        ConnectionEvent::new(event_type, Some(ap(ssid)))
    }

    #[test]
    fn latest_event_tracks_every_append() {
        let mut record = ConnectionRecord::new(256);
        let sequence = [
            EventType::StartedConnecting,
            EventType::ConnectionAuthFailed,
            EventType::StartedConnecting,
            EventType::Connected,
            EventType::Disconnected,
        ];
        for (n, event_type) in sequence.into_iter().enumerate() {
            record.add_event(event(event_type, "home-net"));
            assert_eq!(record.events().len(), n + 1);
            assert_eq!(record.latest_event().map(|e| e.event_type()), Some(event_type));
        }
    }

    #[test]
    fn state_is_derived_from_latest_event() {
        let mut record = ConnectionRecord::new(256);
        assert!(!record.is_connected());
        assert!(record.active_ap().is_none());

        record.add_event(event(EventType::StartedConnecting, "home-net"));
        assert!(record.is_connecting());
        assert_eq!(record.active_ap(), Some(&ap("home-net")));

        record.add_event(event(EventType::Connected, "home-net"));
        assert!(record.is_connected());
        assert!(!record.is_connecting());

        record.add_event(event(EventType::Disconnected, "home-net"));
        assert!(!record.is_connected());
        assert!(record.active_ap().is_none());
    }

    #[test]
    fn duplicates_are_skipped() {
        let mut record = ConnectionRecord::new(256);
        assert!(record.add_event_if_not_duplicate(event(EventType::StartedConnecting, "a")));
        assert!(!record.add_event_if_not_duplicate(event(EventType::StartedConnecting, "a")));
        assert!(record.add_event_if_not_duplicate(event(EventType::StartedConnecting, "b")));
        assert!(record.add_event_if_not_duplicate(event(EventType::Connected, "b")));
        assert_eq!(record.events().len(), 3);
    }

    #[test]
    fn filtered_queries() {
        let mut record = ConnectionRecord::new(256);
        record.add_event(event(EventType::ConnectionFailed, "a"));
        record.add_event(event(EventType::Connected, "b"));
        record.add_event(ConnectionEvent::new(EventType::Disconnected, None));

        let a = ap("a").hash();
        let b = ap("b").hash();
        assert_eq!(
            record.latest_event_for(&a).map(|e| e.event_type()),
            Some(EventType::ConnectionFailed)
        );
        assert_eq!(
            record.latest_event_of(EventType::Connected).and_then(|e| e.access_point()),
            Some(&ap("b"))
        );
        assert!(record.latest_event_matching(&b, EventType::Connected).is_some());
        assert!(record.latest_event_matching(&b, EventType::ConnectionFailed).is_none());
        assert!(record.latest_event().unwrap().access_point().is_none());
    }

    #[test]
    fn trimming_keeps_newest_event_per_access_point() {
        let mut record = ConnectionRecord::new(3);
        record.add_event(event(EventType::Connected, "old"));
        for _ in 0..4 {
            record.add_event(event(EventType::StartedConnecting, "busy"));
            record.add_event(event(EventType::ConnectionFailed, "busy"));
        }
        assert!(record.events().len() <= 3);
        let old = ap("old").hash();
        assert_eq!(
            record.latest_event_for(&old).map(|e| e.event_type()),
            Some(EventType::Connected)
        );
        assert_eq!(
            record.latest_event().map(|e| e.event_type()),
            Some(EventType::ConnectionFailed)
        );
    }

    #[test]
    fn trimming_never_drops_below_one_event_per_access_point() {
        let mut record = ConnectionRecord::new(2);
        for ssid in ["a", "b", "c", "d"] {
            record.add_event(event(EventType::Disconnected, ssid));
        }
        assert_eq!(record.events().len(), 4);
    }
}
