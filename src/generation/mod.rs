//! Generation Switch Module
//!
//! Sequences restarts of versioned resources so that a new generation never
//! races uncontrolled against the teardown of the one before it.
//!
//! ## Restart flow
//! 1. **Stop**: The registry stops the running generation (`Active -> Stopping -> Waiting`).
//! 2. **Retire**: The old generation moves to `Removing`; its teardown runs in the background
//!    and fires the generation's switch token when done.
//! 3. **Handoff**: The coordinator waits for that token, bounded by the restart policy
//!    (5 s by default), then installs a new token.
//! 4. **Start**: Only then does the registry start the next generation.
//!
//! An elapsed wait is not an error by default: the restart proceeds and the two
//! generations may briefly overlap.
//!
//! ## Submodules
//! - **`coordinator`**: Per-key switch tokens and the bounded handoff.
//! - **`registry`**: The per-key service state machine and its transition feed.
//! - **`types`**: Resource keys, tokens, service states and transitions.

pub mod coordinator;
pub mod registry;
pub mod types;
