//! Push notifications delivered on the UI thread.
//!
//! Listeners are registered on [`WifiService`](crate::WifiService) and stay
//! registered for as long as the returned [`Subscription`] is alive.
//! Notifications are never invoked on the network thread: each batch is
//! handed to the service's [`UiDispatcher`], which runs it wherever the
//! host toolkit runs UI code.

use log::debug;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, Weak};

use crate::api::models::{AccessPoint, ConnectionEvent, EventType};
use crate::util::utils::mutex_lock;

/// Receives Wi-Fi radio transitions.
pub trait DeviceListener: Send + Sync {
    /// Wireless networking was switched on.
    fn wireless_enabled(&self) {}

    /// Wireless networking was switched off.
    fn wireless_disabled(&self) {}
}

/// Receives connection events as they are recorded.
///
/// `ap` is `None` for device-level events that could not be tied to a
/// known access point.
pub trait ConnectionListener: Send + Sync {
    fn started_connecting(&self, _ap: Option<&AccessPoint>) {}

    fn connected(&self, _ap: Option<&AccessPoint>) {}

    fn disconnected(&self, _ap: Option<&AccessPoint>) {}

    fn connection_auth_failed(&self, _ap: Option<&AccessPoint>) {}

    fn connection_failed(&self, _ap: Option<&AccessPoint>) {}
}

/// Receives access point cache changes.
pub trait ApListListener: Send + Sync {
    /// A new network became visible.
    fn access_point_added(&self, _ap: &AccessPoint) {}

    /// The last BSSID of a network disappeared.
    fn access_point_removed(&self, _ap: &AccessPoint) {}

    /// The strongest signal of a network changed.
    fn signal_strength_changed(&self, _ap: &AccessPoint) {}
}

/// A unit of UI work produced by the network thread.
pub type UiTask = Box<dyn FnOnce() + Send>;

/// Hands notification batches to the UI thread.
///
/// GUI hosts implement this with their toolkit's "run on main loop"
/// primitive. [`NotificationQueue`] is a ready-made implementation for
/// hosts that poll.
pub trait UiDispatcher: Send + Sync {
    fn dispatch(&self, task: UiTask);
}

/// A [`UiDispatcher`] that buffers tasks until the UI thread drains them.
///
/// # Example
///
/// ```
/// use nmwifi::{NotificationQueue, UiDispatcher};
/// use std::sync::Arc;
/// use std::sync::atomic::{AtomicBool, Ordering};
///
/// let queue = NotificationQueue::new();
/// let ran = Arc::new(AtomicBool::new(false));
/// let flag = ran.clone();
/// queue.dispatch(Box::new(move || flag.store(true, Ordering::SeqCst)));
///
/// assert!(!ran.load(Ordering::SeqCst));
/// assert_eq!(queue.run_pending(), 1);
/// assert!(ran.load(Ordering::SeqCst));
/// ```
#[derive(Default)]
pub struct NotificationQueue {
    tasks: Mutex<VecDeque<UiTask>>,
}

impl NotificationQueue {
    /// Creates an empty queue.
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Runs every queued task on the calling thread, in dispatch order.
    ///
    /// Tasks queued while draining are run too. Returns the number of
    /// tasks run.
    pub fn run_pending(&self) -> usize {
        let mut ran = 0;
        loop {
            // The lock is released before running the task so listeners may
            // call back into the service.
            let next = mutex_lock(&self.tasks).pop_front();
            match next {
                Some(task) => {
                    task();
                    ran += 1;
                }
                None => return ran,
            }
        }
    }

    /// Number of tasks waiting to run.
    pub fn len(&self) -> usize {
        mutex_lock(&self.tasks).len()
    }

    /// Returns `true` if no task is waiting.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl UiDispatcher for NotificationQueue {
    fn dispatch(&self, task: UiTask) {
        mutex_lock(&self.tasks).push_back(task);
    }
}

/// Keeps a listener registered. Dropping it unregisters the listener.
#[must_use = "the listener is unregistered when the subscription is dropped"]
pub struct Subscription {
    cancel: Option<Box<dyn FnOnce() + Send>>,
}

impl Subscription {
    /// Unregisters the listener now.
    pub fn unsubscribe(mut self) {
        self.cancel_now();
    }

    fn cancel_now(&mut self) {
        if let Some(cancel) = self.cancel.take() {
            cancel();
        }
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.cancel_now();
    }
}

impl std::fmt::Debug for Subscription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Subscription")
            .field("active", &self.cancel.is_some())
            .finish()
    }
}

type Entries<L> = Mutex<Vec<(u64, Arc<L>)>>;

/// Registered listeners of one kind.
pub(crate) struct ListenerSet<L: ?Sized> {
    entries: Arc<Entries<L>>,
    next_id: AtomicU64,
}

impl<L: ?Sized + Send + Sync + 'static> ListenerSet<L> {
    pub(crate) fn new() -> Self {
        Self {
            entries: Arc::new(Mutex::new(Vec::new())),
            next_id: AtomicU64::new(1),
        }
    }

    pub(crate) fn subscribe(&self, listener: Arc<L>) -> Subscription {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        mutex_lock(&self.entries).push((id, listener));

        let entries: Weak<Entries<L>> = Arc::downgrade(&self.entries);
        Subscription {
            cancel: Some(Box::new(move || {
                if let Some(entries) = entries.upgrade() {
                    mutex_lock(&entries).retain(|(entry_id, _)| *entry_id != id);
                }
            })),
        }
    }

    pub(crate) fn snapshot(&self) -> Vec<Arc<L>> {
        mutex_lock(&self.entries)
            .iter()
            .map(|(_, listener)| listener.clone())
            .collect()
    }

    pub(crate) fn len(&self) -> usize {
        mutex_lock(&self.entries).len()
    }
}

/// Fans module notifications out to listeners via the UI dispatcher.
pub(crate) struct Notifier {
    dispatcher: Arc<dyn UiDispatcher>,
    pub(crate) device: ListenerSet<dyn DeviceListener>,
    pub(crate) connection: ListenerSet<dyn ConnectionListener>,
    pub(crate) ap_list: ListenerSet<dyn ApListListener>,
}

impl Notifier {
    pub(crate) fn new(dispatcher: Arc<dyn UiDispatcher>) -> Self {
        Self {
            dispatcher,
            device: ListenerSet::new(),
            connection: ListenerSet::new(),
            ap_list: ListenerSet::new(),
        }
    }

    fn dispatch_to<L, F>(&self, set: &ListenerSet<L>, notify: F)
    where
        L: ?Sized + Send + Sync + 'static,
        F: Fn(&L) + Send + 'static,
    {
        let listeners = set.snapshot();
        if listeners.is_empty() {
            return;
        }
        self.dispatcher.dispatch(Box::new(move || {
            for listener in &listeners {
                notify(listener.as_ref());
            }
        }));
    }

    pub(crate) fn wireless_changed(&self, enabled: bool) {
        debug!("Notifying {} device listener(s), enabled={enabled}", self.device.len());
        self.dispatch_to(&self.device, move |l| {
            if enabled {
                l.wireless_enabled();
            } else {
                l.wireless_disabled();
            }
        });
    }

    pub(crate) fn connection_event(&self, event: &ConnectionEvent) {
        let ap = event.access_point().cloned();
        let event_type = event.event_type();
        self.dispatch_to(&self.connection, move |l| {
            let ap = ap.as_ref();
            match event_type {
                EventType::StartedConnecting => l.started_connecting(ap),
                EventType::Connected => l.connected(ap),
                EventType::Disconnected => l.disconnected(ap),
                EventType::ConnectionAuthFailed => l.connection_auth_failed(ap),
                EventType::ConnectionFailed => l.connection_failed(ap),
            }
        });
    }

    pub(crate) fn access_point_added(&self, ap: AccessPoint) {
        self.dispatch_to(&self.ap_list, move |l| {
            l.access_point_added(&ap)
        });
    }

    pub(crate) fn access_point_removed(&self, ap: AccessPoint) {
        self.dispatch_to(&self.ap_list, move |l| {
            l.access_point_removed(&ap)
        });
    }

    pub(crate) fn signal_strength_changed(&self, ap: AccessPoint) {
        self.dispatch_to(&self.ap_list, move |l| {
            l.signal_strength_changed(&ap)
        });
    }
}
