//! ccm cluster: the on-disk cluster store.
//!
//! [`FileCluster`] implements [`ccm_core::Topology`] and
//! [`ccm_core::Installation`] over a ccm-style store directory (by default
//! `~/.ccm`). It reads and rewrites manifests and node configuration files;
//! it does not download or build servers.
//!
//! # Modules
//!
//! - [`manifest`]: `cluster.conf` / `node.conf` formats
//! - [`conf_files`]: server config, commit log and log level edits
//! - [`store`]: the [`FileCluster`] itself

pub mod conf_files;
pub mod manifest;
pub mod store;

pub use conf_files::{parse_settings, parse_yaml_settings};
pub use store::FileCluster;
