use serde::{Deserialize, Serialize};
use std::fmt;

/// Channel-level identity of a group member.
///
/// Assigned by the group channel per connection, so a node that reconnects
/// shows up under a fresh address. Carries no meaning beyond equality.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Address(pub String);

impl Address {
    pub fn new() -> Self {
        Self(uuid::Uuid::new_v4().to_string())
    }
}

impl Default for Address {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Inbound events produced by a group channel.
///
/// - `ViewChanged`: the full set of reachable addresses, as decided by the
///   transport's own failure detection.
/// - `MessageReceived`: a payload broadcast by `from`. The only payload the
///   tracker sends is its node name.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub enum GroupEvent {
    ViewChanged(Vec<Address>),

    MessageReceived { from: Address, payload: String },
}

/// Opaque handle returned when registering a node listener.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerId(pub u64);
