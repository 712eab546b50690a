//! Admin HTTP Module
//!
//! The operator-facing surface of a node: membership queries, resource
//! install/restart/removal, simulated peers and the claim monitor.
//!
//! ## Submodules
//! - **`handlers`**: Axum request handlers.
//! - **`peers`**: Simulated peers on the in-process group hub.
//! - **`protocol`**: Endpoint paths and JSON bodies.
//! - **`resource`**: The demo resource installed through the API.

pub mod handlers;
pub mod peers;
pub mod protocol;
pub mod resource;

#[cfg(test)]
mod tests;

use crate::generation::registry::ServiceRegistry;
use crate::membership::tracker::MembershipTracker;
use crate::scheduler::ClaimMonitor;
use handlers::*;
use peers::PeerSimulator;
use protocol::*;

use axum::{
    Extension, Router,
    routing::{get, post},
};
use std::sync::Arc;

pub fn router(
    tracker: Arc<MembershipTracker>,
    registry: Arc<ServiceRegistry>,
    peers: Arc<PeerSimulator>,
    monitor: Arc<ClaimMonitor>,
) -> Router {
    Router::new()
        .route(ENDPOINT_NODES, get(handle_list_nodes))
        .route(ENDPOINT_NODE_ALIVE, get(handle_node_alive))
        .route(ENDPOINT_RESOURCES, post(handle_install_resource))
        .route(
            ENDPOINT_RESOURCE,
            get(handle_get_resource).delete(handle_remove_resource),
        )
        .route(ENDPOINT_RESOURCE_RESTART, post(handle_restart_resource))
        .route(ENDPOINT_PEER_JOIN, post(handle_peer_join))
        .route(ENDPOINT_PEER_LEAVE, post(handle_peer_leave))
        .route(ENDPOINT_CLAIMS, post(handle_claim))
        .route(ENDPOINT_CLAIMS_ABANDONED, get(handle_abandoned_claims))
        .layer(Extension(tracker))
        .layer(Extension(registry))
        .layer(Extension(peers))
        .layer(Extension(monitor))
}
