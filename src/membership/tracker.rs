use super::channel::GroupChannel;
use super::listener::NodeListener;
use super::types::{Address, GroupEvent, ListenerId};

use anyhow::Result;
use dashmap::DashMap;
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::time::Instant;

/// Maps group addresses to announced node names.
///
/// Liveness comes entirely from the channel's views: an address that leaves
/// the view is dropped, an address in the view is only known once it has
/// announced a name. Every view change schedules one announce of our own name
/// so that members who just (re)joined learn who we are.
pub struct MembershipTracker {
    local_name: String,
    channel: Arc<dyn GroupChannel>,
    members: Mutex<HashMap<Address, String>>,
    listeners: DashMap<ListenerId, Arc<dyn NodeListener>>,
    next_listener_id: AtomicU64,
    announce_delay: Duration,
    announce_tx: mpsc::UnboundedSender<Instant>,
    announce_rx: Mutex<Option<mpsc::UnboundedReceiver<Instant>>>,
}

impl MembershipTracker {
    pub fn new(
        local_name: impl Into<String>,
        channel: Arc<dyn GroupChannel>,
        announce_delay: Duration,
    ) -> Arc<Self> {
        let (announce_tx, announce_rx) = mpsc::unbounded_channel();

        Arc::new(Self {
            local_name: local_name.into(),
            channel,
            members: Mutex::new(HashMap::new()),
            listeners: DashMap::new(),
            next_listener_id: AtomicU64::new(1),
            announce_delay,
            announce_tx,
            announce_rx: Mutex::new(Some(announce_rx)),
        })
    }

    /// Connects the channel to `group` and spawns the receive and announce loops.
    pub async fn start(self: Arc<Self>, group: &str) -> Result<()> {
        let announce_rx = self
            .announce_rx
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take()
            .ok_or_else(|| anyhow::anyhow!("Membership tracker already started"))?;

        let events = self.channel.connect(group).await?;
        tracing::info!("'{}' connected to group '{}'", self.local_name, group);

        let _receive_handle = {
            let tracker = self.clone();
            tokio::spawn(async move {
                tracker.receive_loop(events).await;
            })
        };

        let _announce_handle = {
            let tracker = Arc::downgrade(&self);
            tokio::spawn(async move {
                Self::announce_loop(tracker, announce_rx).await;
            })
        };

        Ok(())
    }

    pub fn local_name(&self) -> &str {
        &self.local_name
    }

    pub fn add_node_listener(&self, listener: Arc<dyn NodeListener>) -> ListenerId {
        let id = ListenerId(self.next_listener_id.fetch_add(1, Ordering::Relaxed));
        self.listeners.insert(id, listener);
        id
    }

    pub fn remove_node_listener(&self, id: ListenerId) -> bool {
        self.listeners.remove(&id).is_some()
    }

    /// True for our own name, or for any name currently announced by a member
    /// of the view.
    pub fn is_node_alive(&self, name: &str) -> bool {
        if name == self.local_name {
            return true;
        }

        self.members().values().any(|known| known == name)
    }

    /// Sorted names of the currently announced members.
    pub fn known_nodes(&self) -> Vec<String> {
        let mut names: Vec<String> = self.members().values().cloned().collect();
        names.sort();
        names
    }

    pub fn member_count(&self) -> usize {
        self.members().len()
    }

    /// Applies a new view: entries whose address left are dropped and reported,
    /// the rest are carried over unchanged.
    pub fn on_view_changed(&self, view: Vec<Address>) {
        let current: HashSet<&Address> = view.iter().collect();

        let dropped: Vec<String> = {
            let mut members = self.members();
            let (kept, dropped): (HashMap<Address, String>, HashMap<Address, String>) =
                std::mem::take(&mut *members)
                    .into_iter()
                    .partition(|(address, _)| current.contains(address));
            *members = kept;
            dropped.into_values().collect()
        };

        tracing::debug!(
            "View changed: {} addresses, {} dropped",
            view.len(),
            dropped.len()
        );

        if !dropped.is_empty() {
            let listeners = self.listener_snapshot();
            for name in &dropped {
                tracing::info!("Node '{}' dropped from the cluster", name);
                for listener in &listeners {
                    listener.node_dropped(name);
                }
            }
        }

        self.schedule_announce();
    }

    /// Records the name announced by `from`. Only the first name seen for an
    /// address counts as a join; later announces just refresh the entry.
    pub fn on_message_received(&self, from: Address, name: String) {
        let previous = self.members().insert(from.clone(), name.clone());

        match previous {
            None => {
                tracing::info!("Node '{}' joined the cluster at {}", name, from);
                for listener in self.listener_snapshot() {
                    listener.node_joined(&name);
                }
            }
            Some(old) if old != name => {
                tracing::debug!("{} renamed itself '{}' -> '{}'", from, old, name);
            }
            Some(_) => {
                tracing::trace!("Refreshed '{}' at {}", name, from);
            }
        }
    }

    /// Never held across an await or a listener callback.
    fn members(&self) -> MutexGuard<'_, HashMap<Address, String>> {
        self.members.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn listener_snapshot(&self) -> Vec<Arc<dyn NodeListener>> {
        self.listeners
            .iter()
            .map(|entry| entry.value().clone())
            .collect()
    }

    fn schedule_announce(&self) {
        let due = Instant::now() + self.announce_delay;
        if self.announce_tx.send(due).is_err() {
            tracing::warn!("Announce worker has stopped, not scheduling announce");
        }
    }

    async fn receive_loop(self: Arc<Self>, mut events: mpsc::UnboundedReceiver<GroupEvent>) {
        while let Some(event) = events.recv().await {
            match event {
                GroupEvent::ViewChanged(view) => self.on_view_changed(view),
                GroupEvent::MessageReceived { from, payload } => {
                    self.on_message_received(from, payload)
                }
            }
        }

        tracing::info!("Group channel closed for '{}'", self.local_name);
    }

    /// Single worker: announces go out one at a time, each at its own deadline.
    /// Holds only a weak reference so a dropped tracker ends the loop.
    async fn announce_loop(tracker: Weak<Self>, mut due: mpsc::UnboundedReceiver<Instant>) {
        while let Some(deadline) = due.recv().await {
            tokio::time::sleep_until(deadline).await;

            let Some(live) = tracker.upgrade() else {
                break;
            };

            match live.channel.send(&live.local_name).await {
                Ok(()) => tracing::debug!("Announced '{}'", live.local_name),
                Err(e) => tracing::warn!("Failed to announce '{}': {}", live.local_name, e),
            }
        }
    }
}
