//! Node Listener Contract
//!
//! Consumers that care about cluster membership (for example a scheduled job
//! runner deciding whether a claimed job was abandoned) implement
//! `NodeListener` and register it with the `MembershipTracker`.
//!
//! Callbacks run on whichever task processed the triggering event, never while
//! the tracker holds its member lock, so implementations may call back into
//! the tracker (including adding or removing listeners).

/// Receives join/drop notifications for named cluster nodes.
pub trait NodeListener: Send + Sync {
    /// A name was announced from an address that had no name yet.
    fn node_joined(&self, name: &str);

    /// An address carrying `name` disappeared from the group view.
    fn node_dropped(&self, name: &str);
}
