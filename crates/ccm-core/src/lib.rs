//! ccm core: shared types, collaborator traits, errors, and utilities.
//!
//! This crate provides the foundational types used across all ccm crates.
//! It has no internal ccm dependencies (dependency level 0).
//!
//! # Modules
//!
//! - [`error`]: Error types and Result alias
//! - [`node`]: Node handle and lifecycle state machine
//! - [`outcome`]: Result of running a command
//! - [`platform`]: Host platform facts
//! - [`settings`]: Typed configuration values (log levels, workloads)
//! - [`traits`]: Collaborator traits (topology, installation, processes, tools)
//! - [`mock`]: In-memory collaborators for tests
//! - [`util`]: Path and tool discovery utilities
//! - [`version`]: Server version parsing

pub mod error;
pub mod mock;
pub mod node;
pub mod outcome;
pub mod platform;
pub mod settings;
pub mod traits;
pub mod util;
pub mod version;

// Re-export key types at crate root for convenience
pub use error::{Error, Result};
pub use node::{NodeHandle, NodeState};
pub use outcome::Outcome;
pub use platform::{HostPlatform, PlatformFamily};
pub use settings::{LogLevel, Settings, Workload};
pub use traits::{
    Installation, InvocationMode, ProcessControl, ProcessSpec, SignalKind, ToolInvocation,
    ToolInvoker, Topology, WaitStatus,
};
pub use version::ServerVersion;

// Convenience re-exports from util
pub use util::paths::{default_store_dir, discover_tools, expand_tilde};
