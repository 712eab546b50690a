//! Group Channel Abstraction
//!
//! The transport underneath the tracker: reliable group broadcast plus a
//! failure-detected view of who is reachable. The tracker never implements
//! either, it only consumes the resulting `GroupEvent` stream.

use super::types::{Address, GroupEvent};

use anyhow::Result;
use async_trait::async_trait;
use tokio::sync::mpsc;

#[async_trait]
pub trait GroupChannel: Send + Sync {
    /// Joins `group` and returns the stream of view/message events for this
    /// connection. The first event is normally the view containing us.
    async fn connect(&self, group: &str) -> Result<mpsc::UnboundedReceiver<GroupEvent>>;

    /// Broadcasts `payload` to every member of the connected group.
    async fn send(&self, payload: &str) -> Result<()>;

    /// Our address in the current connection, if connected.
    async fn address(&self) -> Option<Address>;
}
