//! Work Claim Monitor
//!
//! The membership side of a scheduled job runner (e.g. periodic materialized
//! view refreshes). Jobs are claimed by a node name; a claim whose owner is no
//! longer alive in the cluster is considered abandoned and may be picked up by
//! someone else. Who picks it up is left to the caller.

use crate::membership::listener::NodeListener;
use crate::membership::tracker::MembershipTracker;
use crate::membership::types::ListenerId;

use anyhow::Result;
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use std::sync::{Arc, Weak};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Claim {
    pub job: String,
    pub owner: String,
}

pub struct ClaimMonitor {
    tracker: Weak<MembershipTracker>,
    /// Job name -> owning node name.
    claims: DashMap<String, String>,
}

impl ClaimMonitor {
    pub fn new(tracker: &Arc<MembershipTracker>) -> Arc<Self> {
        Arc::new(Self {
            tracker: Arc::downgrade(tracker),
            claims: DashMap::new(),
        })
    }

    /// Subscribes the monitor to node join/drop notifications.
    pub fn register(self: &Arc<Self>) -> Result<ListenerId> {
        let tracker = self.tracker()?;
        Ok(tracker.add_node_listener(self.clone()))
    }

    /// Records `owner` as the owner of `job`, returning the previous owner.
    pub fn claim(&self, job: &str, owner: &str) -> Option<String> {
        let previous = self.claims.insert(job.to_string(), owner.to_string());
        tracing::debug!("Job '{}' claimed by '{}' (was {:?})", job, owner, previous);
        previous
    }

    pub fn release(&self, job: &str) -> bool {
        self.claims.remove(job).is_some()
    }

    pub fn owner(&self, job: &str) -> Option<String> {
        self.claims.get(job).map(|entry| entry.value().clone())
    }

    pub fn claims(&self) -> Vec<Claim> {
        let mut claims: Vec<Claim> = self
            .claims
            .iter()
            .map(|entry| Claim {
                job: entry.key().clone(),
                owner: entry.value().clone(),
            })
            .collect();
        claims.sort_by(|a, b| a.job.cmp(&b.job));
        claims
    }

    /// Claims whose owner is not currently alive.
    pub fn abandoned(&self) -> Result<Vec<Claim>> {
        let tracker = self.tracker()?;

        Ok(self
            .claims()
            .into_iter()
            .filter(|claim| !tracker.is_node_alive(&claim.owner))
            .collect())
    }

    fn tracker(&self) -> Result<Arc<MembershipTracker>> {
        self.tracker
            .upgrade()
            .ok_or_else(|| anyhow::anyhow!("Membership tracker has shut down"))
    }
}

impl NodeListener for ClaimMonitor {
    fn node_joined(&self, name: &str) {
        tracing::debug!("Claim monitor saw '{}' join", name);
    }

    fn node_dropped(&self, name: &str) {
        let orphaned: Vec<String> = self
            .claims
            .iter()
            .filter(|entry| entry.value() == name)
            .map(|entry| entry.key().clone())
            .collect();

        if !orphaned.is_empty() {
            tracing::warn!(
                "Node '{}' dropped while owning {} job(s): {:?}",
                name,
                orphaned.len(),
                orphaned
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::membership::local::LocalGroup;
    use crate::membership::types::Address;
    use std::time::Duration;

    fn tracker(local_name: &str) -> Arc<MembershipTracker> {
        let hub = LocalGroup::new();
        MembershipTracker::new(local_name, Arc::new(hub.channel()), Duration::from_secs(2))
    }

    #[tokio::test]
    async fn test_claims_follow_owner_liveness() {
        // ARRANGE: node-b is announced and owns a job
        let tracker = tracker("node-a");
        let monitor = ClaimMonitor::new(&tracker);
        monitor.register().unwrap();

        let b = Address("B".to_string());
        tracker.on_view_changed(vec![b.clone()]);
        tracker.on_message_received(b, "node-b".into());

        monitor.claim("refresh:orders_mv", "node-b");
        monitor.claim("refresh:customers_mv", "node-a");
        assert!(monitor.abandoned().unwrap().is_empty());

        // ACT: node-b leaves the view
        tracker.on_view_changed(vec![]);

        // ASSERT
        let abandoned = monitor.abandoned().unwrap();
        assert_eq!(
            abandoned,
            vec![Claim {
                job: "refresh:orders_mv".to_string(),
                owner: "node-b".to_string(),
            }]
        );
    }

    #[test]
    fn test_local_claims_are_never_abandoned() {
        let tracker = tracker("node-a");
        let monitor = ClaimMonitor::new(&tracker);

        monitor.claim("refresh:orders_mv", "node-a");

        assert!(monitor.abandoned().unwrap().is_empty());
    }

    #[test]
    fn test_claim_release_and_takeover() {
        let tracker = tracker("node-a");
        let monitor = ClaimMonitor::new(&tracker);

        assert_eq!(monitor.claim("job", "node-b"), None);
        assert_eq!(monitor.claim("job", "node-a"), Some("node-b".to_string()));
        assert_eq!(monitor.owner("job"), Some("node-a".to_string()));

        assert!(monitor.release("job"));
        assert!(!monitor.release("job"));
        assert!(monitor.claims().is_empty());
    }

    #[test]
    fn test_monitor_outliving_tracker_reports_error() {
        let monitor = ClaimMonitor::new(&tracker("node-a"));

        monitor.claim("job", "node-b");

        assert!(monitor.abandoned().is_err());
        assert!(monitor.register().is_err());
    }
}
