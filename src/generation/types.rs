use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;

/// Sequence number of one install-to-removal lifetime of a resource.
/// Increases per key and is never reused, even across undeploys.
pub type Generation = u64;

/// Identifies a long-lived, restartable resource, e.g. `catalog` version `3`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ResourceKey {
    pub name: String,
    pub version: String,
}

impl ResourceKey {
    pub fn new(name: impl Into<String>, version: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            version: version.into(),
        }
    }
}

impl fmt::Display for ResourceKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.name, self.version)
    }
}

/// Lifecycle of a switch token. `Removed` is terminal.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum TokenState {
    Active,
    Removing,
    Removed,
}

/// One-shot signal guarding the handoff between two generations of a resource.
///
/// The token fires (reaches `Removed`) exactly once, when the generation it
/// belongs to has fully torn down. The next restart of the same key waits on it
/// before installing its own token.
#[derive(Debug)]
pub struct SwitchToken {
    key: ResourceKey,
    generation: Generation,
    state: watch::Sender<TokenState>,
}

impl SwitchToken {
    pub(crate) fn new(key: ResourceKey, generation: Generation) -> Arc<Self> {
        let (state, _) = watch::channel(TokenState::Active);
        Arc::new(Self {
            key,
            generation,
            state,
        })
    }

    pub fn key(&self) -> &ResourceKey {
        &self.key
    }

    pub fn generation(&self) -> Generation {
        self.generation
    }

    pub fn state(&self) -> TokenState {
        *self.state.borrow()
    }

    pub fn is_signaled(&self) -> bool {
        self.state() == TokenState::Removed
    }

    /// `Active -> Removing`. Returns false if removal already started.
    pub(crate) fn begin_removal(&self) -> bool {
        self.state.send_if_modified(|state| {
            if *state == TokenState::Active {
                *state = TokenState::Removing;
                true
            } else {
                false
            }
        })
    }

    /// Moves to `Removed` and wakes every waiter. Returns false if the token
    /// had already fired.
    pub(crate) fn signal(&self) -> bool {
        self.state.send_if_modified(|state| {
            if *state != TokenState::Removed {
                *state = TokenState::Removed;
                true
            } else {
                false
            }
        })
    }

    /// Waits at most `timeout` for the token to fire. Returns whether it did.
    pub async fn wait_removed(&self, timeout: Duration) -> bool {
        let mut rx = self.state.subscribe();
        let waited = tokio::time::timeout(timeout, rx.wait_for(|s| *s == TokenState::Removed)).await;

        matches!(waited, Ok(Ok(_)))
    }
}

/// Lifecycle of a registered resource service, per generation.
///
/// `Waiting` means fully stopped but not yet removed; it is the point where a
/// restart hands over to the generation coordinator.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum ServiceState {
    Starting,
    Active,
    Stopping,
    Waiting,
    Removing,
    Removed,
}

/// A single state change published by the service registry.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Transition {
    pub key: ResourceKey,
    pub generation: Generation,
    /// `None` for a fresh install.
    pub from: Option<ServiceState>,
    pub to: ServiceState,
}
