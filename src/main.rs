use cluster_switch::admin::{self, peers::PeerSimulator};
use cluster_switch::config::ClusterConfig;
use cluster_switch::generation::coordinator::GenerationCoordinator;
use cluster_switch::generation::registry::ServiceRegistry;
use cluster_switch::membership::local::LocalGroup;
use cluster_switch::membership::tracker::MembershipTracker;
use cluster_switch::scheduler::ClaimMonitor;

use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast::error::RecvError;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args: Vec<String> = std::env::args().collect();
    let config = ClusterConfig::from_args(&args)?;

    tracing_subscriber::fmt()
        .with_max_level(if config.verbose {
            tracing::Level::DEBUG
        } else {
            tracing::Level::INFO
        })
        .init();

    tracing::info!(
        "Starting node '{}' in group '{}'",
        config.node_name,
        config.group
    );

    // 1. Membership:
    let hub = LocalGroup::new();
    let tracker = MembershipTracker::new(
        &config.node_name,
        Arc::new(hub.channel()),
        config.announce_delay,
    );
    tracker.clone().start(&config.group).await?;

    let peers = PeerSimulator::new(hub, &config.group, config.announce_delay);
    for name in &config.peers {
        peers.join(name).await?;
    }

    // 2. Generations:
    let coordinator = GenerationCoordinator::new(config.restart);
    let registry = ServiceRegistry::new(coordinator);

    // 3. Claims:
    let monitor = ClaimMonitor::new(&tracker);
    monitor.register()?;

    // 4. Spawn transition logger:
    let mut transitions = registry.subscribe();
    tokio::spawn(async move {
        loop {
            match transitions.recv().await {
                Ok(t) => tracing::info!(
                    "{} generation {}: {:?} -> {:?}",
                    t.key,
                    t.generation,
                    t.from,
                    t.to
                ),
                Err(RecvError::Lagged(skipped)) => {
                    tracing::warn!("Transition log skipped {} events", skipped)
                }
                Err(RecvError::Closed) => break,
            }
        }
    });

    // 5. Spawn stats reporter:
    let stats_tracker = tracker.clone();
    let stats_registry = registry.clone();
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(Duration::from_secs(5));

        loop {
            interval.tick().await;
            let known = stats_tracker.known_nodes();
            tracing::info!(
                "Cluster stats: {} members in view, {} named",
                stats_tracker.member_count(),
                known.len()
            );
            for name in known {
                tracing::info!("  - {}", name);
            }
            for key in stats_registry.keys() {
                tracing::info!(
                    "  * {} generation={:?} state={:?}",
                    key,
                    stats_registry.generation(&key),
                    stats_registry.state(&key)
                );
            }
        }
    });

    // 6. Start HTTP server:
    let app = admin::router(tracker, registry, peers, monitor);

    tracing::info!("HTTP server listening on {}", config.http_addr);
    tracing::info!("Press Ctrl+C to shutdown");

    let listener = tokio::net::TcpListener::bind(config.http_addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
