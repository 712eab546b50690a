//! Generation Coordinator
//!
//! Owns one switch token per resource key and uses it to sequence restarts:
//! a new generation of a resource is only started once the previous
//! generation's teardown has signalled, or once the bounded wait has elapsed.
//!
//! ## Token lifecycle
//! `NO_TOKEN -> Active -> Removing -> Removed`. A token is installed on first
//! install and whenever a restart gets past its wait. It fires when the service
//! registry reports that its generation has been fully removed, even if a
//! later generation has superseded it in the meantime.

use super::types::{Generation, ResourceKey, SwitchToken, TokenState};
use crate::config::RestartPolicy;

use anyhow::Result;
use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;

pub struct GenerationCoordinator {
    /// Current token per key. Superseded tokens are dropped from the map.
    tokens: DashMap<ResourceKey, Arc<SwitchToken>>,
    /// Superseded tokens that have not fired yet, until their teardown reports in.
    retired: DashMap<(ResourceKey, Generation), Arc<SwitchToken>>,
    /// Last generation handed out per key, kept after `forget`.
    generations: DashMap<ResourceKey, Generation>,
    policy: RestartPolicy,
}

impl GenerationCoordinator {
    pub fn new(policy: RestartPolicy) -> Arc<Self> {
        Arc::new(Self {
            tokens: DashMap::new(),
            retired: DashMap::new(),
            generations: DashMap::new(),
            policy,
        })
    }

    pub fn policy(&self) -> RestartPolicy {
        self.policy
    }

    /// Installs a fresh `Active` token for `key`, replacing whatever was there.
    pub fn install_token(&self, key: &ResourceKey) -> Arc<SwitchToken> {
        let generation = {
            let mut last = self.generations.entry(key.clone()).or_insert(0);
            *last += 1;
            *last
        };

        let token = SwitchToken::new(key.clone(), generation);

        // Retire under the entry lock so a concurrent signal finds the old
        // token in one of the two maps.
        match self.tokens.entry(key.clone()) {
            Entry::Occupied(mut slot) => {
                let previous = slot.insert(token.clone());
                if !previous.is_signaled() {
                    tracing::debug!(
                        "Generation {} of {} superseded while {:?}",
                        previous.generation(),
                        key,
                        previous.state()
                    );
                    self.retired.insert((key.clone(), previous.generation()), previous);
                }
            }
            Entry::Vacant(slot) => {
                slot.insert(token.clone());
            }
        }

        tracing::info!("Installed switch token for {} (generation {})", key, generation);
        token
    }

    /// Waits up to `timeout` for the current token of `key` to fire, then
    /// installs and returns a new token.
    ///
    /// An elapsed or interrupted wait is treated like a fired token unless the
    /// restart policy is strict, in which case it fails and nothing is installed.
    pub async fn await_previous_then_install(
        &self,
        key: &ResourceKey,
        timeout: Duration,
    ) -> Result<Arc<SwitchToken>> {
        let previous = self.tokens.get(key).map(|entry| entry.value().clone());

        if let Some(previous) = previous {
            let started = Instant::now();

            if previous.wait_removed(timeout).await {
                tracing::debug!(
                    "Generation {} of {} removed after {:?}",
                    previous.generation(),
                    key,
                    started.elapsed()
                );
            } else if self.policy.strict {
                anyhow::bail!(
                    "Generation {} of {} did not finish removal within {:?}",
                    previous.generation(),
                    key,
                    timeout
                );
            } else {
                tracing::warn!(
                    "Generation {} of {} still {:?} after {:?}, proceeding",
                    previous.generation(),
                    key,
                    previous.state(),
                    timeout
                );
            }
        }

        Ok(self.install_token(key))
    }

    /// `Active -> Removing` for the current token. Returns its generation.
    pub fn request_removal(&self, key: &ResourceKey) -> Option<Generation> {
        let token = self.tokens.get(key).map(|entry| entry.value().clone())?;

        if token.begin_removal() {
            tracing::debug!("Removing generation {} of {}", token.generation(), key);
        }

        Some(token.generation())
    }

    /// Fires the token of `generation`, whether it is the current token of
    /// `key` or one superseded after a timed-out wait. Returns false for a
    /// generation with no live token or one that already fired.
    pub fn signal(&self, key: &ResourceKey, generation: Generation) -> bool {
        let current = self
            .tokens
            .get(key)
            .map(|entry| entry.value().clone())
            .filter(|token| token.generation() == generation);

        let token = match current {
            Some(token) => token,
            None => match self.retired.remove(&(key.clone(), generation)) {
                Some((_, token)) => token,
                None => {
                    tracing::debug!(
                        "No switch token for generation {} of {}, ignoring removal signal",
                        generation,
                        key
                    );
                    return false;
                }
            },
        };

        let fired = token.signal();
        self.retired.remove(&(key.clone(), generation));
        if fired {
            tracing::info!("Generation {} of {} removed", generation, key);
        }
        fired
    }

    /// Registry callback for a service that is stopped but not yet removed.
    ///
    /// For a restart this is where the handoff happens: wait for the previous
    /// token, then install the next one. A plain shutdown needs nothing here.
    pub async fn on_waiting_after_stop(
        &self,
        key: &ResourceKey,
        restart_requested: bool,
    ) -> Result<Option<Arc<SwitchToken>>> {
        if !restart_requested {
            return Ok(None);
        }

        self.await_previous_then_install(key, self.policy.wait)
            .await
            .map(Some)
    }

    /// Registry callback for a generation that reached its terminal state.
    pub fn on_removed(&self, key: &ResourceKey, generation: Generation) {
        self.signal(key, generation);
    }

    /// Drops the token of `key` if it still belongs to `generation`.
    pub fn forget(&self, key: &ResourceKey, generation: Generation) -> bool {
        self.tokens
            .remove_if(key, |_, token| token.generation() == generation)
            .is_some()
    }

    pub fn token_state(&self, key: &ResourceKey) -> Option<TokenState> {
        self.tokens.get(key).map(|entry| entry.value().state())
    }

    pub fn current_generation(&self, key: &ResourceKey) -> Option<Generation> {
        self.tokens.get(key).map(|entry| entry.value().generation())
    }
}
