//! Resource Service Registry
//!
//! Holds the named resource services of this node and drives each one through
//! `Starting -> Active -> Stopping -> Waiting -> Removing -> Removed`, per
//! generation. Every state change is published on a broadcast channel.
//!
//! The registry is where the generation coordinator gets its callbacks: once a
//! service is stopped (`Waiting`) the coordinator is asked whether to hand over
//! to a new generation, and once a generation's teardown completes the
//! coordinator is told to fire that generation's switch token.

use super::coordinator::GenerationCoordinator;
use super::types::{Generation, ResourceKey, ServiceState, Transition};

use anyhow::Result;
use async_trait::async_trait;
use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use std::sync::Arc;
use tokio::sync::{broadcast, watch};

const TRANSITION_BUFFER: usize = 256;

/// Published once by the restart in flight; `None` until it settles.
type RestartOutcome = Option<std::result::Result<Generation, String>>;

/// The backing instance of a restartable resource.
///
/// `stop` returns once the generation no longer serves requests. `release`
/// runs afterwards in the background and frees whatever the generation still
/// holds (file handles, listeners, caches). A new generation may start before
/// `release` finishes if the restart wait runs out.
#[async_trait]
pub trait ResourceService: Send + Sync {
    async fn start(&self, key: &ResourceKey, generation: Generation) -> Result<()>;

    async fn stop(&self, key: &ResourceKey, generation: Generation) -> Result<()>;

    async fn release(&self, _key: &ResourceKey, _generation: Generation) -> Result<()> {
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Operation {
    Install,
    Restart,
    Removal,
}

struct Registration {
    handle: Arc<dyn ResourceService>,
    generation: Generation,
    state: ServiceState,
    operation: Option<Operation>,
    restart_done: Option<watch::Receiver<RestartOutcome>>,
}

pub struct ServiceRegistry {
    services: DashMap<ResourceKey, Registration>,
    coordinator: Arc<GenerationCoordinator>,
    transitions: broadcast::Sender<Transition>,
}

impl ServiceRegistry {
    pub fn new(coordinator: Arc<GenerationCoordinator>) -> Arc<Self> {
        let (transitions, _) = broadcast::channel(TRANSITION_BUFFER);

        Arc::new(Self {
            services: DashMap::new(),
            coordinator,
            transitions,
        })
    }

    pub fn coordinator(&self) -> &Arc<GenerationCoordinator> {
        &self.coordinator
    }

    /// Every transition published from now on.
    pub fn subscribe(&self) -> broadcast::Receiver<Transition> {
        self.transitions.subscribe()
    }

    pub fn state(&self, key: &ResourceKey) -> Option<ServiceState> {
        self.services.get(key).map(|reg| reg.state)
    }

    pub fn generation(&self, key: &ResourceKey) -> Option<Generation> {
        self.services.get(key).map(|reg| reg.generation)
    }

    pub fn keys(&self) -> Vec<ResourceKey> {
        let mut keys: Vec<ResourceKey> = self.services.iter().map(|e| e.key().clone()).collect();
        keys.sort();
        keys
    }

    /// Registers `handle` under `key` and starts its first generation.
    pub async fn install(
        &self,
        key: ResourceKey,
        handle: Arc<dyn ResourceService>,
    ) -> Result<Generation> {
        let generation = match self.services.entry(key.clone()) {
            Entry::Occupied(mut slot)
                if slot.get().state == ServiceState::Removed && slot.get().operation.is_none() =>
            {
                self.coordinator.forget(&key, slot.get().generation);
                let token = self.coordinator.install_token(&key);
                slot.insert(Registration {
                    handle: handle.clone(),
                    generation: token.generation(),
                    state: ServiceState::Starting,
                    operation: Some(Operation::Install),
                    restart_done: None,
                });
                token.generation()
            }
            Entry::Occupied(_) => anyhow::bail!("{} is already installed", key),
            Entry::Vacant(slot) => {
                let token = self.coordinator.install_token(&key);
                slot.insert(Registration {
                    handle: handle.clone(),
                    generation: token.generation(),
                    state: ServiceState::Starting,
                    operation: Some(Operation::Install),
                    restart_done: None,
                });
                token.generation()
            }
        };
        self.publish(&key, generation, None, ServiceState::Starting);

        if let Err(e) = handle.start(&key, generation).await {
            self.services.remove(&key);
            self.coordinator.signal(&key, generation);
            self.coordinator.forget(&key, generation);
            self.publish(
                &key,
                generation,
                Some(ServiceState::Starting),
                ServiceState::Removed,
            );
            return Err(e.context(format!("Failed to start {}", key)));
        }

        self.set_state(&key, generation, ServiceState::Active);
        self.finish_operation(&key);
        tracing::info!("Installed {} (generation {})", key, generation);

        Ok(generation)
    }

    /// Restarts `key`: stop the running generation, let the coordinator hand
    /// over once the old generation is gone (bounded), start the next one.
    ///
    /// A restart requested while another is in flight is folded into it: the
    /// caller waits for that restart and gets the generation it settled on.
    pub async fn restart(self: &Arc<Self>, key: &ResourceKey) -> Result<Generation> {
        let claimed = {
            let mut reg = self
                .services
                .get_mut(key)
                .ok_or_else(|| anyhow::anyhow!("Unknown resource: {}", key))?;
            let (operation, state) = (reg.operation, reg.state);

            match (operation, state) {
                (Some(Operation::Restart), _) => Err(reg.restart_done.clone()),
                (Some(op), _) => anyhow::bail!("Cannot restart {}: {:?} in progress", key, op),
                (None, ServiceState::Starting | ServiceState::Stopping) => {
                    anyhow::bail!("Cannot restart {} while {:?}", key, state)
                }
                (None, _) => {
                    let (done, done_rx) = watch::channel(None);
                    reg.operation = Some(Operation::Restart);
                    reg.restart_done = Some(done_rx);
                    Ok((reg.handle.clone(), reg.generation, state, done))
                }
            }
        };

        let (handle, generation, state, done) = match claimed {
            Ok(claimed) => claimed,
            Err(in_flight) => return self.join_restart(key, in_flight).await,
        };

        tracing::info!("Restarting {} (generation {})", key, generation);
        let result = self.run_restart(key, handle, generation, state).await;
        self.finish_operation(key);
        done.send_replace(Some(result.as_ref().copied().map_err(|e| format!("{:#}", e))));

        result
    }

    async fn join_restart(
        &self,
        key: &ResourceKey,
        in_flight: Option<watch::Receiver<RestartOutcome>>,
    ) -> Result<Generation> {
        let mut in_flight = in_flight
            .ok_or_else(|| anyhow::anyhow!("Restart of {} in progress without an outcome", key))?;
        tracing::debug!("Restart of {} already in progress, waiting for it", key);

        let outcome = in_flight
            .wait_for(Option::is_some)
            .await
            .map(|outcome| (*outcome).clone())
            .map_err(|_| anyhow::anyhow!("Restart of {} was abandoned", key))?;

        match outcome {
            Some(Ok(generation)) => Ok(generation),
            Some(Err(e)) => anyhow::bail!("Restart of {} failed: {}", key, e),
            None => anyhow::bail!("Restart of {} was abandoned", key),
        }
    }

    async fn run_restart(
        self: &Arc<Self>,
        key: &ResourceKey,
        handle: Arc<dyn ResourceService>,
        generation: Generation,
        state: ServiceState,
    ) -> Result<Generation> {
        if state == ServiceState::Active {
            self.stop_generation(key, &handle, generation).await;
        }
        if matches!(state, ServiceState::Active | ServiceState::Waiting) {
            self.retire_generation(key, &handle, generation);
        }

        let token = self
            .coordinator
            .on_waiting_after_stop(key, true)
            .await?
            .ok_or_else(|| anyhow::anyhow!("No switch token installed for {}", key))?;
        let next = token.generation();

        self.set_state(key, next, ServiceState::Starting);
        if let Err(e) = handle.start(key, next).await {
            self.set_state(key, next, ServiceState::Waiting);
            return Err(e.context(format!("Failed to start generation {} of {}", next, key)));
        }
        self.set_state(key, next, ServiceState::Active);

        tracing::info!("Restarted {} (generation {} -> {})", key, generation, next);
        Ok(next)
    }

    /// Undeploys `key`. Returns once the service is stopped; teardown finishes
    /// in the background and the registration disappears when it does.
    pub async fn request_removal(self: &Arc<Self>, key: &ResourceKey) -> Result<()> {
        let (handle, generation, state) = {
            let mut reg = self
                .services
                .get_mut(key)
                .ok_or_else(|| anyhow::anyhow!("Unknown resource: {}", key))?;

            match (reg.operation, reg.state) {
                (Some(Operation::Removal), _) => return Ok(()),
                (Some(op), _) => anyhow::bail!("Cannot remove {}: {:?} in progress", key, op),
                (None, ServiceState::Starting | ServiceState::Stopping) => {
                    anyhow::bail!("Cannot remove {} while {:?}", key, reg.state)
                }
                (None, _) => {}
            }

            reg.operation = Some(Operation::Removal);
            (reg.handle.clone(), reg.generation, reg.state)
        };

        tracing::info!("Removing {} (generation {})", key, generation);

        match state {
            ServiceState::Active | ServiceState::Waiting => {
                if state == ServiceState::Active {
                    self.stop_generation(key, &handle, generation).await;
                }
                self.coordinator.on_waiting_after_stop(key, false).await?;
                self.retire_generation(key, &handle, generation);
            }
            ServiceState::Removed => {
                self.services.remove(key);
                self.coordinator.forget(key, generation);
                tracing::info!("Removed {}", key);
            }
            // Teardown already running; it drops the registration when done.
            _ => {}
        }

        Ok(())
    }

    async fn stop_generation(
        &self,
        key: &ResourceKey,
        handle: &Arc<dyn ResourceService>,
        generation: Generation,
    ) {
        self.set_state(key, generation, ServiceState::Stopping);

        if let Err(e) = handle.stop(key, generation).await {
            tracing::warn!("Stopping generation {} of {} failed: {}", generation, key, e);
        }

        self.set_state(key, generation, ServiceState::Waiting);
    }

    /// Moves `generation` to `Removing` and runs its teardown in the background.
    fn retire_generation(
        self: &Arc<Self>,
        key: &ResourceKey,
        handle: &Arc<dyn ResourceService>,
        generation: Generation,
    ) {
        self.set_state(key, generation, ServiceState::Removing);
        self.coordinator.request_removal(key);

        let registry = self.clone();
        let handle = handle.clone();
        let key = key.clone();
        tokio::spawn(async move {
            registry.release_generation(key, handle, generation).await;
        });
    }

    async fn release_generation(
        &self,
        key: ResourceKey,
        handle: Arc<dyn ResourceService>,
        generation: Generation,
    ) {
        if let Err(e) = handle.release(&key, generation).await {
            tracing::warn!("Releasing generation {} of {} failed: {}", generation, key, e);
        }

        let dropped = self
            .services
            .remove_if_mut(&key, |_, reg| {
                if reg.generation != generation || reg.state != ServiceState::Removing {
                    return false;
                }
                if reg.operation == Some(Operation::Removal) {
                    return true;
                }
                reg.state = ServiceState::Removed;
                false
            })
            .is_some();

        self.publish(
            &key,
            generation,
            Some(ServiceState::Removing),
            ServiceState::Removed,
        );
        self.coordinator.on_removed(&key, generation);

        if dropped {
            self.coordinator.forget(&key, generation);
            tracing::info!("Removed {}", key);
        }
    }

    fn set_state(&self, key: &ResourceKey, generation: Generation, to: ServiceState) {
        let from = self.services.get_mut(key).map(|mut reg| {
            let from = reg.state;
            reg.state = to;
            reg.generation = generation;
            from
        });

        self.publish(key, generation, from, to);
    }

    fn finish_operation(&self, key: &ResourceKey) {
        if let Some(mut reg) = self.services.get_mut(key)
            && reg.operation != Some(Operation::Removal)
        {
            reg.operation = None;
            reg.restart_done = None;
        }
    }

    fn publish(
        &self,
        key: &ResourceKey,
        generation: Generation,
        from: Option<ServiceState>,
        to: ServiceState,
    ) {
        tracing::debug!("{} generation {}: {:?} -> {:?}", key, generation, from, to);

        // No subscribers is fine.
        let _ = self.transitions.send(Transition {
            key: key.clone(),
            generation,
            from,
            to,
        });
    }
}
