//! Admin Module Tests
//!
//! Drives the HTTP handlers directly against a node wired to an in-process
//! group hub.

#[cfg(test)]
mod tests {
    use crate::admin::handlers::*;
    use crate::admin::peers::PeerSimulator;
    use crate::admin::protocol::{ClaimRequest, InstallRequest};
    use crate::admin::router;
    use crate::config::RestartPolicy;
    use crate::generation::coordinator::GenerationCoordinator;
    use crate::generation::registry::ServiceRegistry;
    use crate::generation::types::ServiceState;
    use crate::membership::local::LocalGroup;
    use crate::membership::tracker::MembershipTracker;
    use crate::scheduler::ClaimMonitor;

    use axum::http::StatusCode;
    use axum::{Extension, Json, extract::Path};
    use std::sync::Arc;
    use std::time::Duration;

    const ANNOUNCE_DELAY: Duration = Duration::from_secs(2);

    struct Node {
        tracker: Arc<MembershipTracker>,
        registry: Arc<ServiceRegistry>,
        peers: Arc<PeerSimulator>,
        monitor: Arc<ClaimMonitor>,
    }

    async fn node() -> Node {
        let hub = LocalGroup::new();
        let tracker = MembershipTracker::new("node-a", Arc::new(hub.channel()), ANNOUNCE_DELAY);
        tracker.clone().start("cluster").await.unwrap();

        let registry = ServiceRegistry::new(GenerationCoordinator::new(RestartPolicy::default()));
        let peers = PeerSimulator::new(hub, "cluster", ANNOUNCE_DELAY);
        let monitor = ClaimMonitor::new(&tracker);
        monitor.register().unwrap();

        Node {
            tracker,
            registry,
            peers,
            monitor,
        }
    }

    fn install_request(name: &str, teardown_ms: u64) -> Json<InstallRequest> {
        Json(InstallRequest {
            name: name.to_string(),
            version: "1".to_string(),
            teardown_ms,
        })
    }

    #[tokio::test]
    async fn test_router_builds() {
        let node = node().await;
        let _app = router(node.tracker, node.registry, node.peers, node.monitor);
    }

    #[tokio::test]
    async fn test_local_node_is_alive() {
        let node = node().await;

        let (status, Json(body)) =
            handle_node_alive(Extension(node.tracker.clone()), Path("node-a".to_string())).await;
        assert_eq!(status, StatusCode::OK);
        assert!(body.alive);

        let (_, Json(body)) =
            handle_node_alive(Extension(node.tracker.clone()), Path("ghost".to_string())).await;
        assert!(!body.alive);
    }

    #[tokio::test(start_paused = true)]
    async fn test_simulated_peer_becomes_visible_and_drops() {
        let node = node().await;

        let (status, Json(joined)) =
            handle_peer_join(Extension(node.peers.clone()), Path("node-b".to_string())).await;
        assert_eq!(status, StatusCode::OK);
        assert!(joined.address.is_some());

        let (status, _) =
            handle_peer_join(Extension(node.peers.clone()), Path("node-b".to_string())).await;
        assert_eq!(status, StatusCode::CONFLICT);

        tokio::time::sleep(ANNOUNCE_DELAY + Duration::from_millis(100)).await;
        let (_, Json(nodes)) = handle_list_nodes(Extension(node.tracker.clone())).await;
        assert_eq!(nodes.local, "node-a");
        assert!(nodes.known.contains(&"node-b".to_string()));

        let (status, _) =
            handle_peer_leave(Extension(node.peers.clone()), Path("node-b".to_string())).await;
        assert_eq!(status, StatusCode::OK);
        tokio::time::sleep(Duration::from_millis(10)).await;

        assert!(!node.tracker.is_node_alive("node-b"));
        assert!(node.peers.names().is_empty());

        let (status, _) =
            handle_peer_leave(Extension(node.peers.clone()), Path("node-b".to_string())).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test(start_paused = true)]
    async fn test_resource_lifecycle_over_http() {
        let node = node().await;
        let registry = node.registry.clone();

        let (status, Json(body)) =
            handle_install_resource(Extension(registry.clone()), install_request("catalog", 0))
                .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body.state, Some(ServiceState::Active));
        assert_eq!(body.generation, Some(1));

        let (status, Json(body)) =
            handle_install_resource(Extension(registry.clone()), install_request("catalog", 0))
                .await;
        assert_eq!(status, StatusCode::CONFLICT);
        assert!(body.error.unwrap().contains("already installed"));

        let path = || Path(("catalog".to_string(), "1".to_string()));

        let (status, Json(body)) = handle_restart_resource(Extension(registry.clone()), path()).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body.generation, Some(2));

        let (status, _) = handle_remove_resource(Extension(registry.clone()), path()).await;
        assert_eq!(status, StatusCode::ACCEPTED);
        tokio::time::sleep(Duration::from_millis(10)).await;

        let (status, Json(body)) = handle_get_resource(Extension(registry.clone()), path()).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert!(body.state.is_none());
    }

    #[tokio::test]
    async fn test_unknown_resource_restart_is_not_found() {
        let node = node().await;

        let (status, Json(body)) = handle_restart_resource(
            Extension(node.registry.clone()),
            Path(("orders".to_string(), "9".to_string())),
        )
        .await;

        assert_eq!(status, StatusCode::NOT_FOUND);
        assert!(body.error.unwrap().contains("Unknown resource"));
    }

    #[tokio::test]
    async fn test_claims_by_unknown_owner_are_abandoned() {
        let node = node().await;

        handle_claim(
            Extension(node.monitor.clone()),
            Json(ClaimRequest {
                job: "refresh:orders_mv".to_string(),
                owner: "node-z".to_string(),
            }),
        )
        .await;
        handle_claim(
            Extension(node.monitor.clone()),
            Json(ClaimRequest {
                job: "refresh:customers_mv".to_string(),
                owner: "node-a".to_string(),
            }),
        )
        .await;

        let (status, Json(body)) = handle_abandoned_claims(Extension(node.monitor.clone())).await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body.claims.len(), 1);
        assert_eq!(body.claims[0].owner, "node-z");
    }
}
