use super::peers::PeerSimulator;
use super::protocol::*;
use super::resource::DemoResource;
use crate::generation::registry::ServiceRegistry;
use crate::generation::types::ResourceKey;
use crate::membership::tracker::MembershipTracker;
use crate::scheduler::ClaimMonitor;

use axum::{Extension, Json, extract::Path, http::StatusCode};
use std::sync::Arc;
use std::time::Duration;

pub async fn handle_list_nodes(
    Extension(tracker): Extension<Arc<MembershipTracker>>,
) -> (StatusCode, Json<NodesResponse>) {
    (
        StatusCode::OK,
        Json(NodesResponse {
            local: tracker.local_name().to_string(),
            known: tracker.known_nodes(),
        }),
    )
}

pub async fn handle_node_alive(
    Extension(tracker): Extension<Arc<MembershipTracker>>,
    Path(name): Path<String>,
) -> (StatusCode, Json<AliveResponse>) {
    let alive = tracker.is_node_alive(&name);
    (StatusCode::OK, Json(AliveResponse { name, alive }))
}

pub async fn handle_install_resource(
    Extension(registry): Extension<Arc<ServiceRegistry>>,
    Json(req): Json<InstallRequest>,
) -> (StatusCode, Json<ResourceResponse>) {
    let key = ResourceKey::new(req.name, req.version);
    let resource = Arc::new(DemoResource::new(Duration::from_millis(req.teardown_ms)));

    match registry.install(key.clone(), resource).await {
        Ok(_) => (StatusCode::OK, Json(describe(&registry, key, None))),
        Err(e) => {
            tracing::error!("Failed to install {}: {}", key, e);
            (
                StatusCode::CONFLICT,
                Json(describe(&registry, key, Some(e.to_string()))),
            )
        }
    }
}

pub async fn handle_get_resource(
    Extension(registry): Extension<Arc<ServiceRegistry>>,
    Path((name, version)): Path<(String, String)>,
) -> (StatusCode, Json<ResourceResponse>) {
    let key = ResourceKey::new(name, version);

    let status = if registry.state(&key).is_some() {
        StatusCode::OK
    } else {
        StatusCode::NOT_FOUND
    };
    (status, Json(describe(&registry, key, None)))
}

pub async fn handle_restart_resource(
    Extension(registry): Extension<Arc<ServiceRegistry>>,
    Path((name, version)): Path<(String, String)>,
) -> (StatusCode, Json<ResourceResponse>) {
    let key = ResourceKey::new(name, version);

    match registry.restart(&key).await {
        Ok(generation) => {
            tracing::info!("Restart of {} settled on generation {}", key, generation);
            (StatusCode::OK, Json(describe(&registry, key, None)))
        }
        Err(e) => {
            tracing::error!("Failed to restart {}: {}", key, e);
            (
                failure_status(&registry, &key),
                Json(describe(&registry, key, Some(e.to_string()))),
            )
        }
    }
}

pub async fn handle_remove_resource(
    Extension(registry): Extension<Arc<ServiceRegistry>>,
    Path((name, version)): Path<(String, String)>,
) -> (StatusCode, Json<ResourceResponse>) {
    let key = ResourceKey::new(name, version);

    match registry.request_removal(&key).await {
        Ok(()) => (StatusCode::ACCEPTED, Json(describe(&registry, key, None))),
        Err(e) => {
            tracing::error!("Failed to remove {}: {}", key, e);
            (
                failure_status(&registry, &key),
                Json(describe(&registry, key, Some(e.to_string()))),
            )
        }
    }
}

pub async fn handle_peer_join(
    Extension(peers): Extension<Arc<PeerSimulator>>,
    Path(name): Path<String>,
) -> (StatusCode, Json<PeerResponse>) {
    match peers.join(&name).await {
        Ok(address) => (
            StatusCode::OK,
            Json(PeerResponse {
                name,
                address: Some(address),
                error: None,
            }),
        ),
        Err(e) => {
            tracing::error!("Failed to start peer '{}': {}", name, e);
            (
                StatusCode::CONFLICT,
                Json(PeerResponse {
                    name,
                    address: None,
                    error: Some(e.to_string()),
                }),
            )
        }
    }
}

pub async fn handle_peer_leave(
    Extension(peers): Extension<Arc<PeerSimulator>>,
    Path(name): Path<String>,
) -> (StatusCode, Json<PeerResponse>) {
    match peers.leave(&name).await {
        Ok(()) => (
            StatusCode::OK,
            Json(PeerResponse {
                name,
                address: None,
                error: None,
            }),
        ),
        Err(e) => (
            StatusCode::NOT_FOUND,
            Json(PeerResponse {
                name,
                address: None,
                error: Some(e.to_string()),
            }),
        ),
    }
}

pub async fn handle_claim(
    Extension(monitor): Extension<Arc<ClaimMonitor>>,
    Json(req): Json<ClaimRequest>,
) -> (StatusCode, Json<ClaimsResponse>) {
    monitor.claim(&req.job, &req.owner);

    (
        StatusCode::OK,
        Json(ClaimsResponse {
            claims: monitor.claims(),
            error: None,
        }),
    )
}

pub async fn handle_abandoned_claims(
    Extension(monitor): Extension<Arc<ClaimMonitor>>,
) -> (StatusCode, Json<ClaimsResponse>) {
    match monitor.abandoned() {
        Ok(claims) => (
            StatusCode::OK,
            Json(ClaimsResponse {
                claims,
                error: None,
            }),
        ),
        Err(e) => {
            tracing::error!("Failed to check claims: {}", e);
            (
                StatusCode::SERVICE_UNAVAILABLE,
                Json(ClaimsResponse {
                    claims: Vec::new(),
                    error: Some(e.to_string()),
                }),
            )
        }
    }
}

fn describe(registry: &ServiceRegistry, key: ResourceKey, error: Option<String>) -> ResourceResponse {
    ResourceResponse {
        state: registry.state(&key),
        generation: registry.generation(&key),
        key,
        error,
    }
}

fn failure_status(registry: &ServiceRegistry, key: &ResourceKey) -> StatusCode {
    if registry.state(key).is_some() {
        StatusCode::CONFLICT
    } else {
        StatusCode::NOT_FOUND
    }
}
