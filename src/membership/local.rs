//! In-process Group Hub
//!
//! A loopback implementation of `GroupChannel` used by the demo binary and the
//! tests. Every `LocalChannel` handed out by a `LocalGroup` is one member
//! connection: connecting or closing publishes a new view to everyone in the
//! group, and `send` delivers the payload to every member (sender included),
//! in join order.
//!
//! There is no failure detection here. A member only leaves the view through
//! `LocalChannel::close`.

use super::channel::GroupChannel;
use super::types::{Address, GroupEvent};

use anyhow::Result;
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{Mutex, mpsc};

struct Member {
    address: Address,
    tx: mpsc::UnboundedSender<GroupEvent>,
}

/// Shared hub holding every group's member list.
pub struct LocalGroup {
    groups: Mutex<HashMap<String, Vec<Member>>>,
}

impl LocalGroup {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            groups: Mutex::new(HashMap::new()),
        })
    }

    /// Creates a new, unconnected member channel on this hub.
    pub fn channel(self: &Arc<Self>) -> LocalChannel {
        LocalChannel {
            hub: self.clone(),
            connection: Mutex::new(None),
        }
    }

    /// Current view of `group`, in join order.
    pub async fn view(&self, group: &str) -> Vec<Address> {
        self.groups
            .lock()
            .await
            .get(group)
            .map(|members| members.iter().map(|m| m.address.clone()).collect())
            .unwrap_or_default()
    }

    async fn join(&self, group: &str, tx: mpsc::UnboundedSender<GroupEvent>) -> Address {
        let address = Address::new();
        let mut groups = self.groups.lock().await;
        let members = groups.entry(group.to_string()).or_default();

        members.push(Member {
            address: address.clone(),
            tx,
        });

        tracing::debug!(
            "{} joined group '{}' ({} members)",
            address,
            group,
            members.len()
        );
        Self::publish_view(members);

        address
    }

    async fn leave(&self, group: &str, address: &Address) {
        let mut groups = self.groups.lock().await;

        if let Some(members) = groups.get_mut(group) {
            members.retain(|m| &m.address != address);
            tracing::debug!(
                "{} left group '{}' ({} members)",
                address,
                group,
                members.len()
            );
            Self::publish_view(members);
        }
    }

    async fn broadcast(&self, group: &str, from: &Address, payload: &str) -> Result<()> {
        let groups = self.groups.lock().await;
        let members = groups
            .get(group)
            .ok_or_else(|| anyhow::anyhow!("Unknown group: {}", group))?;

        if !members.iter().any(|m| &m.address == from) {
            anyhow::bail!("{} is not a member of group '{}'", from, group);
        }

        for member in members {
            let event = GroupEvent::MessageReceived {
                from: from.clone(),
                payload: payload.to_string(),
            };
            if member.tx.send(event).is_err() {
                tracing::trace!("Member {} stopped receiving", member.address);
            }
        }

        Ok(())
    }

    fn publish_view(members: &[Member]) {
        let view: Vec<Address> = members.iter().map(|m| m.address.clone()).collect();

        for member in members {
            if member.tx.send(GroupEvent::ViewChanged(view.clone())).is_err() {
                tracing::trace!("Member {} stopped receiving", member.address);
            }
        }
    }
}

/// One member connection on a `LocalGroup`.
pub struct LocalChannel {
    hub: Arc<LocalGroup>,
    connection: Mutex<Option<(String, Address)>>,
}

impl LocalChannel {
    /// Leaves the group; remaining members observe a view without us.
    pub async fn close(&self) {
        if let Some((group, address)) = self.connection.lock().await.take() {
            self.hub.leave(&group, &address).await;
        }
    }
}

#[async_trait]
impl GroupChannel for LocalChannel {
    async fn connect(&self, group: &str) -> Result<mpsc::UnboundedReceiver<GroupEvent>> {
        let mut connection = self.connection.lock().await;
        if let Some((current, address)) = connection.as_ref() {
            anyhow::bail!("{} is already connected to group '{}'", address, current);
        }

        let (tx, rx) = mpsc::unbounded_channel();
        let address = self.hub.join(group, tx).await;
        *connection = Some((group.to_string(), address));

        Ok(rx)
    }

    async fn send(&self, payload: &str) -> Result<()> {
        let (group, address) = self
            .connection
            .lock()
            .await
            .clone()
            .ok_or_else(|| anyhow::anyhow!("Channel is not connected"))?;

        self.hub.broadcast(&group, &address, payload).await
    }

    async fn address(&self) -> Option<Address> {
        self.connection
            .lock()
            .await
            .as_ref()
            .map(|(_, address)| address.clone())
    }
}
