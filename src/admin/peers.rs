//! Simulated Peers
//!
//! Extra members on the node's in-process group hub, each with its own
//! tracker. Lets an operator exercise joins, drops and announces from the
//! admin API without running more processes.

use crate::membership::channel::GroupChannel;
use crate::membership::local::{LocalChannel, LocalGroup};
use crate::membership::tracker::MembershipTracker;
use crate::membership::types::Address;

use anyhow::Result;
use dashmap::DashMap;
use std::sync::Arc;
use std::time::Duration;

struct Peer {
    _tracker: Arc<MembershipTracker>,
    channel: Arc<LocalChannel>,
}

pub struct PeerSimulator {
    hub: Arc<LocalGroup>,
    group: String,
    announce_delay: Duration,
    peers: DashMap<String, Peer>,
}

impl PeerSimulator {
    pub fn new(hub: Arc<LocalGroup>, group: &str, announce_delay: Duration) -> Arc<Self> {
        Arc::new(Self {
            hub,
            group: group.to_string(),
            announce_delay,
            peers: DashMap::new(),
        })
    }

    /// Starts a peer named `name` and connects it to the group.
    pub async fn join(&self, name: &str) -> Result<Address> {
        if self.peers.contains_key(name) {
            anyhow::bail!("Peer '{}' is already running", name);
        }

        let channel = Arc::new(self.hub.channel());
        let tracker = MembershipTracker::new(name, channel.clone(), self.announce_delay);
        tracker.clone().start(&self.group).await?;

        let address = channel
            .address()
            .await
            .ok_or_else(|| anyhow::anyhow!("Peer '{}' has no address after connect", name))?;

        self.peers.insert(
            name.to_string(),
            Peer {
                _tracker: tracker,
                channel,
            },
        );
        tracing::info!("Simulated peer '{}' joined at {}", name, address);

        Ok(address)
    }

    /// Disconnects peer `name`; the rest of the group sees it leave the view.
    pub async fn leave(&self, name: &str) -> Result<()> {
        let (_, peer) = self
            .peers
            .remove(name)
            .ok_or_else(|| anyhow::anyhow!("Unknown peer '{}'", name))?;

        peer.channel.close().await;
        tracing::info!("Simulated peer '{}' left", name);

        Ok(())
    }

    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.peers.iter().map(|e| e.key().clone()).collect();
        names.sort();
        names
    }
}
