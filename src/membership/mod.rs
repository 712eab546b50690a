//! Membership Tracking Module
//!
//! Keeps track of which named nodes are part of the cluster, driven purely by
//! the view-change and message events of a group-communication channel.
//!
//! ## Core Mechanisms
//! - **View-driven liveness**: An address that disappears from the channel's view is dropped.
//!   No heartbeats or timeouts are kept here; failure detection belongs to the transport.
//! - **Name announces**: Addresses are anonymous until they broadcast their node name. Every
//!   view change schedules one delayed announce of the local name so newcomers learn it.
//! - **Listeners**: `NodeListener`s are told about first sightings and drops, outside the member lock.
//!
//! ## Submodules
//! - **`channel`**: The `GroupChannel` transport contract.
//! - **`listener`**: The `NodeListener` callback contract.
//! - **`local`**: An in-process group hub used by tests and the demo binary.
//! - **`tracker`**: The `MembershipTracker` itself.
//! - **`types`**: Addresses, channel events and listener handles.

pub mod channel;
pub mod listener;
pub mod local;
pub mod tracker;
pub mod types;
