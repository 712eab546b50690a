//! Cluster Switch Library
//!
//! This library crate defines the core modules of a cluster node. It serves as
//! the foundation for the binary executable (`main.rs`).
//!
//! ## Architecture Modules
//!
//! - **`membership`**: Tracks which named nodes are alive in a group. Node
//!   names are learned from delayed self-announces after every view change,
//!   and `NodeListener`s hear about joins and drops.
//! - **`generation`**: Sequences restarts of a `(name, version)` resource.
//!   Each generation owns a switch token; a new generation starts only after
//!   the previous one has been removed, or after a bounded wait.
//! - **`scheduler`**: Job claims checked against cluster liveness.
//! - **`admin`**: The HTTP surface of a node.
//! - **`config`**: Command-line configuration and timing constants.

pub mod admin;
pub mod config;
pub mod generation;
pub mod membership;
pub mod scheduler;
