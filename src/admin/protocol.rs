//! Admin API Definitions
//!
//! Request and response bodies of the node's HTTP admin surface.

use crate::generation::types::{Generation, ResourceKey, ServiceState};
use crate::membership::types::Address;
use crate::scheduler::Claim;
use serde::{Deserialize, Serialize};

pub const ENDPOINT_NODES: &str = "/nodes";
pub const ENDPOINT_NODE_ALIVE: &str = "/nodes/:name/alive";
pub const ENDPOINT_RESOURCES: &str = "/resources";
pub const ENDPOINT_RESOURCE: &str = "/resources/:name/:version";
pub const ENDPOINT_RESOURCE_RESTART: &str = "/resources/:name/:version/restart";
pub const ENDPOINT_PEER_JOIN: &str = "/sim/:name/join";
pub const ENDPOINT_PEER_LEAVE: &str = "/sim/:name/leave";
pub const ENDPOINT_CLAIMS: &str = "/claims";
pub const ENDPOINT_CLAIMS_ABANDONED: &str = "/claims/abandoned";

#[derive(Debug, Serialize, Deserialize)]
pub struct NodesResponse {
    pub local: String,
    pub known: Vec<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct AliveResponse {
    pub name: String,
    pub alive: bool,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct InstallRequest {
    pub name: String,
    pub version: String,
    /// Simulated teardown time of each generation.
    #[serde(default)]
    pub teardown_ms: u64,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ResourceResponse {
    pub key: ResourceKey,
    pub state: Option<ServiceState>,
    pub generation: Option<Generation>,
    pub error: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct PeerResponse {
    pub name: String,
    pub address: Option<Address>,
    pub error: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ClaimRequest {
    pub job: String,
    pub owner: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ClaimsResponse {
    pub claims: Vec<Claim>,
    pub error: Option<String>,
}
