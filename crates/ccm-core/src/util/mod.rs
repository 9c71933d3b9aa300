//! Utility modules shared across ccm crates.
//!
//! # Modules
//!
//! - [`paths`]: Path helpers (tilde expansion, store location, tool discovery)

pub mod paths;
